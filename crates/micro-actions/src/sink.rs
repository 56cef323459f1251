//! External delegation seams for log and screenshot micro-actions.

use async_trait::async_trait;
use tracing::info;

/// Receives fire-and-forget engine events.
///
/// Production adapts this onto the host's logging channel and capture
/// service; persistence is entirely the collaborator's business.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn log_action(&self, action_type: &str, context: serde_json::Value);

    async fn screenshot_captured(&self, bytes: Vec<u8>);
}

/// Default sink that forwards everything to the tracing subscriber.
pub struct TracingSink;

#[async_trait]
impl EventSink for TracingSink {
    async fn log_action(&self, action_type: &str, context: serde_json::Value) {
        info!(action_type, %context, "action logged");
    }

    async fn screenshot_captured(&self, bytes: Vec<u8>) {
        info!(size = bytes.len(), "screenshot captured");
    }
}
