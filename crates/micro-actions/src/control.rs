//! Cooperative run/pause/stop control shared between the state machine and
//! the interpreter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::MicroActionError;

struct Flags {
    running: AtomicBool,
    paused: AtomicBool,
    cancel: CancellationToken,
}

/// Shared handle to one session's run/pause flags.
///
/// Pause and stop take effect at the next checkpoint or suspension point,
/// never preemptively mid-primitive.
#[derive(Clone)]
pub struct SessionControl {
    flags: Arc<Flags>,
}

impl SessionControl {
    pub fn new() -> Self {
        Self {
            flags: Arc::new(Flags {
                running: AtomicBool::new(true),
                paused: AtomicBool::new(false),
                cancel: CancellationToken::new(),
            }),
        }
    }

    pub fn is_running(&self) -> bool {
        self.flags.running.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.flags.paused.load(Ordering::SeqCst)
    }

    pub fn pause(&self) {
        self.flags.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.flags.paused.store(false, Ordering::SeqCst);
    }

    /// Mark the session stopped and wake every pending suspension.
    pub fn stop(&self) {
        self.flags.running.store(false, Ordering::SeqCst);
        self.flags.cancel.cancel();
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.flags.cancel
    }

    /// Fail fast when the session stopped or paused since the last check.
    pub fn checkpoint(&self) -> Result<(), MicroActionError> {
        if !self.is_running() {
            return Err(MicroActionError::Interrupted("session stopped".into()));
        }
        if self.is_paused() {
            return Err(MicroActionError::Interrupted("session paused".into()));
        }
        Ok(())
    }

    /// Sleep that honors stop requests immediately and re-checks flags on
    /// wake-up.
    pub async fn sleep(&self, duration: Duration) -> Result<(), MicroActionError> {
        tokio::select! {
            _ = self.flags.cancel.cancelled() => {
                Err(MicroActionError::Interrupted("session stopped".into()))
            }
            _ = tokio::time::sleep(duration) => self.checkpoint(),
        }
    }
}

impl Default for SessionControl {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn checkpoint_reflects_flags() {
        let control = SessionControl::new();
        assert!(control.checkpoint().is_ok());

        control.pause();
        assert!(control.checkpoint().is_err());
        control.resume();
        assert!(control.checkpoint().is_ok());

        control.stop();
        assert!(control.checkpoint().is_err());
    }

    #[tokio::test]
    async fn stop_wakes_pending_sleep() {
        let control = SessionControl::new();
        let sleeper = control.clone();
        let task = tokio::spawn(async move { sleeper.sleep(Duration::from_secs(30)).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        control.stop();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(MicroActionError::Interrupted(_))));
    }

    #[tokio::test]
    async fn pause_is_observed_after_sleep_completes() {
        let control = SessionControl::new();
        control.pause();
        let result = control.sleep(Duration::from_millis(5)).await;
        assert!(matches!(result, Err(MicroActionError::Interrupted(_))));
    }
}
