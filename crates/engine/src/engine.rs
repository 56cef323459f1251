//! The session state machine and its run loop.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use element_resolver::{ElementResolver, ResolveCtx, ResolveOptions, ResolvedTarget};
use goal_tracker::GoalTracker;
use humanize::{Entropy, TimingProfile};
use meander_core_types::{PageType, SessionId, TabId};
use meander_scenario::{Action, Scenario, SelectorSet, WebsiteConfig};
use micro_actions::{EventSink, Interpreter, MicroActionError, SessionControl, TracingSink};
use page_adapter::{ElementInfo, PageAdapter, PageChangeNotifier};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::is_fatal_failure;
use crate::{
    ActionSelector, ConditionEnv, EngineError, IdentifierDetector, PageDetector, SessionResult,
    SessionSnapshot, SessionStatus,
};

/// Poll cadence and deadline for an expected page transition.
const TRANSITION_POLL: Duration = Duration::from_millis(500);
const TRANSITION_DEADLINE: Duration = Duration::from_secs(10);

/// Settle time after a recovery back-navigation.
const RECOVERY_SETTLE: Duration = Duration::from_millis(1000);

/// Inter-tick delay after a recoverable failure or when the stay-duration
/// spec cannot be resolved.
const FALLBACK_TICK_DELAY: Duration = Duration::from_secs(2);

struct Active {
    id: SessionId,
    tab: TabId,
    scenario: Arc<Scenario>,
    selectors: Arc<SelectorSet>,
    status: SessionStatus,
    current_page: PageType,
    started_at: chrono::DateTime<Utc>,
    tracker: Arc<GoalTracker>,
    control: SessionControl,
    /// Cancels the pending scheduled tick on pause/stop
    tick_abort: CancellationToken,
    /// Entry actions still owed for the current page arrival
    entry_pending: bool,
    loop_task: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct EngineState {
    active: Option<Active>,
    last_result: Option<SessionResult>,
}

/// Context cloned out of the state cell for one run-loop incarnation.
struct LoopCtx {
    scenario: Arc<Scenario>,
    selectors: Arc<SelectorSet>,
    tracker: Arc<GoalTracker>,
    control: SessionControl,
    tick_abort: CancellationToken,
}

enum TickOutcome {
    /// Schedule the next tick after the given delay
    Continue(Duration),
    /// Session reached a terminal state; loop ends
    Finished,
    /// Pause or stop observed mid-action; loop ends without a state change
    Interrupted,
}

/// Top-level orchestrator. Owns at most one session for its browsing
/// context and is the only component that transitions session status.
pub struct SessionEngine {
    page: Arc<dyn PageAdapter>,
    detector: Arc<dyn PageDetector>,
    sink: Arc<dyn EventSink>,
    entropy: Arc<Entropy>,
    timing: TimingProfile,
    resolver: Arc<ElementResolver>,
    interpreter: Arc<Interpreter>,
    selector: ActionSelector,
    notifier: Option<Arc<dyn PageChangeNotifier>>,
    state: Mutex<EngineState>,
}

impl SessionEngine {
    pub fn new(page: Arc<dyn PageAdapter>) -> Arc<Self> {
        Self::builder(page).build()
    }

    pub fn builder(page: Arc<dyn PageAdapter>) -> SessionEngineBuilder {
        SessionEngineBuilder {
            page,
            entropy: None,
            timing: TimingProfile::default(),
            detector: None,
            sink: None,
            notifier: None,
        }
    }

    /// Start a session: idle -> running. Fails when a session is already
    /// active in this context.
    pub async fn start(
        self: &Arc<Self>,
        scenario_id: &str,
        config: &WebsiteConfig,
        tab: TabId,
    ) -> Result<SessionId, EngineError> {
        let scenario = Arc::new(config.scenario(scenario_id)?.clone());
        if self.state.lock().active.is_some() {
            return Err(EngineError::SessionActive);
        }

        let selectors = Arc::new(config.selectors.clone());
        let tracker = Arc::new(GoalTracker::new(scenario.goals.clone()));
        let id = SessionId::new();

        let current_page = self.detector.detect(&selectors).await;
        tracker.update_current_page(current_page.clone());
        info!(
            session = %id,
            scenario = scenario_id,
            page = %current_page,
            "session starting"
        );

        {
            let mut state = self.state.lock();
            if state.active.is_some() {
                return Err(EngineError::SessionActive);
            }
            state.active = Some(Active {
                id: id.clone(),
                tab,
                scenario,
                selectors,
                status: SessionStatus::Running,
                current_page,
                started_at: Utc::now(),
                tracker,
                control: SessionControl::new(),
                tick_abort: CancellationToken::new(),
                entry_pending: true,
                loop_task: None,
            });
            state.last_result = None;
        }

        self.spawn_loop();
        Ok(id)
    }

    /// running -> paused. Cancels the pending scheduled tick; the in-flight
    /// micro-action (if any) stops at its next checkpoint.
    pub fn pause(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        let active = state.active.as_mut().ok_or(EngineError::NoSession)?;
        if active.status == SessionStatus::Paused {
            return Ok(());
        }
        active.status = SessionStatus::Paused;
        active.control.pause();
        active.tick_abort.cancel();
        info!(session = %active.id, "session paused");
        Ok(())
    }

    /// paused -> running. Re-enters the run loop immediately.
    pub fn resume(self: &Arc<Self>) -> Result<(), EngineError> {
        {
            let mut state = self.state.lock();
            let active = state.active.as_mut().ok_or(EngineError::NoSession)?;
            if active.status == SessionStatus::Running {
                return Ok(());
            }
            active.status = SessionStatus::Running;
            active.control.resume();
            active.tick_abort = CancellationToken::new();
            // The paused incarnation of the loop may still be parked inside
            // a suspension point; it must not wake into a resumed session.
            if let Some(task) = active.loop_task.take() {
                task.abort();
            }
            info!(session = %active.id, "session resumed");
        }
        self.spawn_loop();
        Ok(())
    }

    /// Any state -> idle. Discards the session.
    pub fn stop(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if let Some(active) = state.active.take() {
            active.control.stop();
            active.tick_abort.cancel();
            if let Some(task) = active.loop_task {
                task.abort();
            }
            info!(session = %active.id, "session stopped");
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.state
            .lock()
            .active
            .as_ref()
            .is_some_and(|a| a.status == SessionStatus::Running)
    }

    pub fn is_paused(&self) -> bool {
        self.state
            .lock()
            .active
            .as_ref()
            .is_some_and(|a| a.status == SessionStatus::Paused)
    }

    /// Snapshot of the active session, if any.
    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        let state = self.state.lock();
        state.active.as_ref().map(|active| SessionSnapshot {
            id: active.id.clone(),
            tab: active.tab.clone(),
            scenario_id: active.scenario.id.clone(),
            status: active.status,
            current_page: active.current_page.clone(),
            started_at: active.started_at,
            duration_ms: active.tracker.session_duration().as_millis() as u64,
            progress: active.tracker.overall_progress(),
            goals: active.tracker.goal_status(),
        })
    }

    /// Final outcome of the most recently finished session, kept until the
    /// next start for status display.
    pub fn last_result(&self) -> Option<SessionResult> {
        self.state.lock().last_result.clone()
    }

    /// Resolve a selector against the live page for diagnostics.
    pub async fn test_selector(&self, selector: &str) -> (bool, Option<ElementInfo>) {
        let (selectors, page_type) = {
            let state = self.state.lock();
            match state.active.as_ref() {
                Some(active) => (active.selectors.clone(), Some(active.current_page.clone())),
                None => (Arc::new(SelectorSet::default()), None),
            }
        };
        let ctx = ResolveCtx::new(&selectors, page_type.as_ref());
        match self
            .resolver
            .resolve(selector, ctx, ResolveOptions::uncached())
            .await
        {
            Ok(resolved) => match resolved.target {
                ResolvedTarget::Element(handle) => {
                    let info = self.page.info(&handle).await.ok();
                    (true, info)
                }
                ResolvedTarget::BrowserBack => (true, None),
            },
            Err(_) => (false, None),
        }
    }

    pub(crate) fn event_sink(&self) -> Arc<dyn EventSink> {
        self.sink.clone()
    }

    fn spawn_loop(self: &Arc<Self>) {
        let engine = Arc::clone(self);
        let task = tokio::spawn(async move { engine.run_loop().await });
        if let Some(active) = self.state.lock().active.as_mut() {
            active.loop_task = Some(task);
        }
    }

    fn loop_ctx(&self) -> Option<LoopCtx> {
        let state = self.state.lock();
        let active = state.active.as_ref()?;
        Some(LoopCtx {
            scenario: active.scenario.clone(),
            selectors: active.selectors.clone(),
            tracker: active.tracker.clone(),
            control: active.control.clone(),
            tick_abort: active.tick_abort.clone(),
        })
    }

    fn current_page(&self) -> PageType {
        self.state
            .lock()
            .active
            .as_ref()
            .map(|a| a.current_page.clone())
            .unwrap_or_else(PageType::unknown)
    }

    fn take_entry_pending(&self) -> bool {
        let mut state = self.state.lock();
        match state.active.as_mut() {
            Some(active) => std::mem::take(&mut active.entry_pending),
            None => false,
        }
    }

    /// Record a new current page; a change marks a fresh arrival and drops
    /// stale cached resolutions.
    fn apply_page(&self, page: PageType, tracker: &GoalTracker) {
        let changed = {
            let mut state = self.state.lock();
            match state.active.as_mut() {
                Some(active) if active.current_page != page => {
                    active.current_page = page.clone();
                    active.entry_pending = true;
                    true
                }
                _ => false,
            }
        };
        if changed {
            info!(page = %page, "page changed");
            tracker.update_current_page(page);
            self.resolver.clear_cache();
        }
    }

    /// Terminal transition: record the result and discard the session.
    fn finish(&self, status: SessionStatus, error: Option<String>) {
        let mut state = self.state.lock();
        if let Some(active) = state.active.take() {
            info!(session = %active.id, ?status, "session finished");
            active.control.stop();
            active.tick_abort.cancel();
            state.last_result = Some(SessionResult {
                id: active.id,
                scenario_id: active.scenario.id.clone(),
                status,
                metrics: active
                    .tracker
                    .metrics()
                    .into_iter()
                    .map(|(name, value)| (name.0, value))
                    .collect(),
                duration_ms: active.tracker.session_duration().as_millis() as u64,
                error,
            });
        }
    }

    async fn run_loop(self: Arc<Self>) {
        let Some(ctx) = self.loop_ctx() else {
            return;
        };
        let mut change_rx = self.notifier.as_ref().map(|n| n.subscribe());

        loop {
            if !ctx.control.is_running() || ctx.control.is_paused() {
                break;
            }

            // External page mutation re-triggers detection.
            if let Some(rx) = change_rx.as_mut() {
                if rx.has_changed().unwrap_or(false) {
                    rx.borrow_and_update();
                    let detected = self.detector.detect(&ctx.selectors).await;
                    self.apply_page(detected, &ctx.tracker);
                }
            }

            if ctx.tracker.are_goals_met() {
                self.finish(SessionStatus::Completed, None);
                break;
            }
            if ctx.tracker.is_session_timed_out() {
                self.finish(SessionStatus::TimedOut, None);
                break;
            }

            match self.tick(&ctx).await {
                TickOutcome::Continue(delay) => {
                    debug!(delay_ms = delay.as_millis() as u64, "tick scheduled");
                    tokio::select! {
                        _ = ctx.tick_abort.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                TickOutcome::Finished | TickOutcome::Interrupted => break,
            }
        }
    }

    /// One run-loop iteration.
    async fn tick(&self, ctx: &LoopCtx) -> TickOutcome {
        let current_page = self.current_page();
        let Some(page_config) = ctx.scenario.page_config(&current_page) else {
            warn!(page = %current_page, "no page config for detected page");
            return self.recover_or_finish(ctx).await;
        };
        let resolve_ctx = ResolveCtx::new(&ctx.selectors, Some(&current_page));

        if self.take_entry_pending() && !page_config.entry_actions.is_empty() {
            debug!(page = %current_page, "running entry actions");
            match self
                .interpreter
                .run_sequence(&page_config.entry_actions, resolve_ctx, &ctx.control)
                .await
            {
                Ok(()) => {}
                Err(err) if err.is_interruption() => return TickOutcome::Interrupted,
                Err(err) => return self.handle_failure("entry actions", err),
            }
        }

        let candidates: Vec<&Action> = page_config.actions.iter().collect();
        let env = ConditionEnv {
            tracker: &ctx.tracker,
            resolver: &self.resolver,
            ctx: resolve_ctx,
        };
        let Some(action) = self.selector.select(&candidates, &env).await else {
            info!(page = %current_page, "no eligible action");
            return self.recover_or_finish(ctx).await;
        };

        match self
            .interpreter
            .run_sequence(&action.micro_sequence, resolve_ctx, &ctx.control)
            .await
        {
            Ok(()) => {
                // Impact applies only after the full sequence succeeded.
                ctx.tracker.update_metrics(&action.impact);
                self.sink
                    .log_action(
                        "action_completed",
                        serde_json::json!({
                            "action": action.name,
                            "page": current_page.as_str(),
                        }),
                    )
                    .await;

                if let Some(target) = &action.target_page {
                    if *target != current_page {
                        match self.await_transition(ctx, target).await {
                            Ok(()) => {}
                            Err(err) if err.is_interruption() => {
                                return TickOutcome::Interrupted
                            }
                            Err(err) => return self.handle_failure(&action.name, err),
                        }
                    }
                }
            }
            Err(err) if err.is_interruption() => return TickOutcome::Interrupted,
            Err(err) => return self.handle_failure(&action.name, err),
        }

        let delay = match self
            .timing
            .resolve(&page_config.stay_duration, &self.entropy)
        {
            Ok(delay) => delay,
            Err(err) => {
                warn!(%err, "stay duration unresolvable, using fallback delay");
                FALLBACK_TICK_DELAY
            }
        };
        TickOutcome::Continue(delay)
    }

    /// Bounded wait for an expected page transition. A timeout is only a
    /// warning: execution continues on whatever page is actually current.
    async fn await_transition(
        &self,
        ctx: &LoopCtx,
        expected: &PageType,
    ) -> Result<(), MicroActionError> {
        let deadline = tokio::time::Instant::now() + TRANSITION_DEADLINE;
        loop {
            let detected = self.detector.detect(&ctx.selectors).await;
            if detected == *expected {
                self.apply_page(detected, &ctx.tracker);
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                warn!(
                    expected = %expected,
                    actual = %detected,
                    "expected page transition did not occur"
                );
                self.apply_page(detected, &ctx.tracker);
                return Ok(());
            }
            ctx.control.sleep(TRANSITION_POLL).await?;
        }
    }

    /// Stuck path: recovery navigation when history allows it, otherwise
    /// the session completes instead of looping forever.
    async fn recover_or_finish(&self, ctx: &LoopCtx) -> TickOutcome {
        if self.page.can_go_back().await {
            info!("attempting back-navigation recovery");
            match self.page.history_back().await {
                Ok(()) => {
                    if let Err(err) = ctx.control.sleep(RECOVERY_SETTLE).await {
                        if err.is_interruption() {
                            return TickOutcome::Interrupted;
                        }
                    }
                    let detected = self.detector.detect(&ctx.selectors).await;
                    self.apply_page(detected, &ctx.tracker);
                    return TickOutcome::Continue(FALLBACK_TICK_DELAY);
                }
                Err(err) => warn!(%err, "recovery navigation failed"),
            }
        }
        info!("no recovery available, completing session");
        self.finish(SessionStatus::Completed, None);
        TickOutcome::Finished
    }

    /// Per-tick failure boundary: log, then continue or stop depending on
    /// the fatal classification. Nothing escapes the run loop.
    fn handle_failure(&self, context: &str, err: MicroActionError) -> TickOutcome {
        let message = err.to_string();
        warn!(context, %message, "tick failed");
        if is_fatal_failure(&message) {
            self.finish(SessionStatus::Error, Some(message));
            return TickOutcome::Finished;
        }
        TickOutcome::Continue(FALLBACK_TICK_DELAY)
    }
}

/// Builder wiring collaborators into the engine.
pub struct SessionEngineBuilder {
    page: Arc<dyn PageAdapter>,
    entropy: Option<Arc<Entropy>>,
    timing: TimingProfile,
    detector: Option<Arc<dyn PageDetector>>,
    sink: Option<Arc<dyn EventSink>>,
    notifier: Option<Arc<dyn PageChangeNotifier>>,
}

impl SessionEngineBuilder {
    pub fn entropy(mut self, entropy: Arc<Entropy>) -> Self {
        self.entropy = Some(entropy);
        self
    }

    pub fn timing(mut self, timing: TimingProfile) -> Self {
        self.timing = timing;
        self
    }

    pub fn detector(mut self, detector: Arc<dyn PageDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn PageChangeNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn build(self) -> Arc<SessionEngine> {
        let entropy = self.entropy.unwrap_or_else(|| Arc::new(Entropy::system()));
        let detector = self
            .detector
            .unwrap_or_else(|| Arc::new(IdentifierDetector::new(self.page.clone())));
        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingSink));
        let resolver = Arc::new(ElementResolver::new(self.page.clone(), entropy.clone()));
        let interpreter = Arc::new(Interpreter::new(
            self.page.clone(),
            resolver.clone(),
            entropy.clone(),
            self.timing,
            sink.clone(),
        ));
        Arc::new(SessionEngine {
            page: self.page,
            detector,
            sink,
            selector: ActionSelector::new(entropy.clone()),
            entropy,
            timing: self.timing,
            resolver,
            interpreter,
            notifier: self.notifier,
            state: Mutex::new(EngineState::default()),
        })
    }
}
