//! Execution of individual micro-actions.

use std::sync::Arc;
use std::time::Duration;

use element_resolver::{ElementResolver, ResolveCtx, ResolveError, ResolveOptions, Resolved, ResolvedTarget};
use humanize::{build_path, jitter_point, DurationSpec, Entropy, PathPattern, PointerSpeed, TimingProfile};
use meander_core_types::Point;
use meander_scenario::{MicroAction, ScrollTarget};
use page_adapter::{ElementHandle, PageAdapter};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::{EventSink, MicroActionError, SessionControl};

/// Settle time after scrolling a move target into view.
const SCROLL_SETTLE: Duration = Duration::from_millis(500);

/// Press/hold and inter-click delay bounds for discrete clicks.
const CLICK_DELAY_MS: (u64, u64) = (50, 150);

/// Click lands within the central region of the element box.
const CLICK_OFFSET_FRACTION: f64 = 0.4;

/// Per-character thinking-pause probability and bounds.
const THINKING_PAUSE_CHANCE: f64 = 0.05;
const THINKING_PAUSE_MS: (u64, u64) = (400, 1200);

/// Per-character typo (wrong char, backspace, correct) probability.
const TYPO_CHANCE: f64 = 0.03;

/// Fixed scroll step size for distance scrolling.
const SCROLL_STEP_PX: f64 = 120.0;

/// Occasional extra pause while scrolling.
const SCROLL_PAUSE_CHANCE: f64 = 0.1;
const SCROLL_PAUSE_MS: (u64, u64) = (200, 600);

/// Hover micro-movement cadence and radius.
const HOVER_JITTER_MS: (u64, u64) = (120, 250);
const HOVER_JITTER_RADIUS: f64 = 2.5;

/// Executes micro-actions against the page adapter.
pub struct Interpreter {
    page: Arc<dyn PageAdapter>,
    resolver: Arc<ElementResolver>,
    entropy: Arc<Entropy>,
    timing: TimingProfile,
    sink: Arc<dyn EventSink>,
    pointer: Mutex<Point>,
}

impl Interpreter {
    pub fn new(
        page: Arc<dyn PageAdapter>,
        resolver: Arc<ElementResolver>,
        entropy: Arc<Entropy>,
        timing: TimingProfile,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            page,
            resolver,
            entropy,
            timing,
            sink,
            pointer: Mutex::new(Point::default()),
        }
    }

    /// Last known synthetic pointer position.
    pub fn pointer_position(&self) -> Point {
        *self.pointer.lock()
    }

    /// Run an ordered micro-sequence, checking the session flags before
    /// every step. The first failure aborts the remainder.
    pub async fn run_sequence(
        &self,
        sequence: &[MicroAction],
        ctx: ResolveCtx<'_>,
        control: &SessionControl,
    ) -> Result<(), MicroActionError> {
        for action in sequence {
            control.checkpoint()?;
            self.execute(action, ctx, control).await?;
        }
        Ok(())
    }

    /// Execute one micro-action.
    pub async fn execute(
        &self,
        action: &MicroAction,
        ctx: ResolveCtx<'_>,
        control: &SessionControl,
    ) -> Result<(), MicroActionError> {
        debug!(kind = action.kind(), "executing micro-action");
        match action {
            MicroAction::Wait { duration } => self.exec_wait(duration, control).await,
            MicroAction::Move {
                target,
                pattern,
                speed,
            } => {
                let resolved = self.resolve_target("move", target, ctx).await?;
                self.move_to(&resolved, *pattern, *speed, control).await?;
                Ok(())
            }
            MicroAction::Hover { target, duration } => {
                self.exec_hover(target, duration, ctx, control).await
            }
            MicroAction::Click { target, count } => {
                self.exec_click(target, *count, ctx, control).await
            }
            MicroAction::Scroll { target, speed } => {
                self.exec_scroll(target, *speed, control, ctx).await
            }
            MicroAction::Type {
                target,
                text,
                clear_first,
                char_delay,
            } => {
                self.exec_type(target, text, *clear_first, char_delay, ctx, control)
                    .await
            }
            MicroAction::Verify {
                target,
                should_exist,
            } => self.exec_verify(target, *should_exist, ctx).await,
            MicroAction::Screenshot => self.exec_screenshot().await,
            MicroAction::Log { message } => {
                info!(%message, "scenario log");
                self.sink
                    .log_action("log", serde_json::json!({ "message": message }))
                    .await;
                Ok(())
            }
        }
    }

    async fn exec_wait(
        &self,
        duration: &DurationSpec,
        control: &SessionControl,
    ) -> Result<(), MicroActionError> {
        let wait = self
            .timing
            .resolve(duration, &self.entropy)
            .map_err(|e| MicroActionError::failed("wait", e.to_string()))?;
        control.sleep(wait).await
    }

    /// Move the pointer to the element's center, scrolling it into view
    /// first when needed. Returns the final pointer position.
    async fn move_to(
        &self,
        resolved: &Resolved,
        pattern: PathPattern,
        speed: PointerSpeed,
        control: &SessionControl,
    ) -> Result<Point, MicroActionError> {
        let handle = match &resolved.target {
            ResolvedTarget::Element(handle) => handle,
            // The synthetic back target has no geometry to travel to.
            ResolvedTarget::BrowserBack => return Ok(self.pointer_position()),
        };

        let viewport = self
            .page
            .viewport()
            .await
            .map_err(|e| MicroActionError::from_page("move", e))?;
        let mut info = self
            .page
            .info(handle)
            .await
            .map_err(|e| MicroActionError::from_page("move", e))?;

        if !info.is_in_viewport(&viewport) {
            self.page
                .scroll_into_view(handle)
                .await
                .map_err(|e| MicroActionError::from_page("move", e))?;
            control.sleep(SCROLL_SETTLE).await?;
            info = self
                .page
                .info(handle)
                .await
                .map_err(|e| MicroActionError::from_page("move", e))?;
        }

        let from = self.pointer_position();
        let to = info.rect.center();
        for step in build_path(from, to, pattern, speed, &self.entropy) {
            control.sleep(step.delay).await?;
            self.page
                .pointer_move(step.point)
                .await
                .map_err(|e| MicroActionError::from_page("move", e))?;
            *self.pointer.lock() = step.point;
        }
        Ok(to)
    }

    async fn exec_hover(
        &self,
        target: &str,
        duration: &DurationSpec,
        ctx: ResolveCtx<'_>,
        control: &SessionControl,
    ) -> Result<(), MicroActionError> {
        let resolved = self.resolve_target("hover", target, ctx).await?;
        let center = self
            .move_to(&resolved, PathPattern::Natural, PointerSpeed::Normal, control)
            .await?;

        let hold = self
            .timing
            .resolve(duration, &self.entropy)
            .map_err(|e| MicroActionError::failed("hover", e.to_string()))?;

        // Hold with small periodic jitter movements.
        let deadline = tokio::time::Instant::now() + hold;
        loop {
            let remaining = deadline.duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            let pause =
                Duration::from_millis(self.entropy.range_u64(HOVER_JITTER_MS.0, HOVER_JITTER_MS.1));
            control.sleep(pause.min(remaining)).await?;
            let wobble = jitter_point(center, HOVER_JITTER_RADIUS, &self.entropy);
            self.page
                .pointer_move(wobble)
                .await
                .map_err(|e| MicroActionError::from_page("hover", e))?;
            *self.pointer.lock() = wobble;
        }
        Ok(())
    }

    async fn exec_click(
        &self,
        target: &str,
        count: u32,
        ctx: ResolveCtx<'_>,
        control: &SessionControl,
    ) -> Result<(), MicroActionError> {
        let resolved = self.resolve_target("click", target, ctx).await?;

        if resolved.target == ResolvedTarget::BrowserBack {
            debug!("click on synthetic back target, navigating history");
            return self
                .page
                .history_back()
                .await
                .map_err(|e| MicroActionError::from_page("click", e));
        }

        self.move_to(&resolved, PathPattern::Natural, PointerSpeed::Normal, control)
            .await?;

        // A bounded random offset inside the element box, so repeated clicks
        // do not land on the exact same pixel.
        let handle = resolved
            .handle()
            .ok_or_else(|| MicroActionError::failed("click", "target has no geometry"))?;
        let info = self
            .page
            .info(handle)
            .await
            .map_err(|e| MicroActionError::from_page("click", e))?;
        let center = info.rect.center();
        let at = Point::new(
            center.x
                + self.entropy.range_f64(
                    -info.rect.width / 2.0 * CLICK_OFFSET_FRACTION,
                    info.rect.width / 2.0 * CLICK_OFFSET_FRACTION,
                ),
            center.y
                + self.entropy.range_f64(
                    -info.rect.height / 2.0 * CLICK_OFFSET_FRACTION,
                    info.rect.height / 2.0 * CLICK_OFFSET_FRACTION,
                ),
        );
        self.page
            .pointer_move(at)
            .await
            .map_err(|e| MicroActionError::from_page("click", e))?;
        *self.pointer.lock() = at;

        for i in 0..count.max(1) {
            control.checkpoint()?;
            self.page
                .pointer_down(at)
                .await
                .map_err(|e| MicroActionError::from_page("click", e))?;
            control.sleep(self.click_delay()).await?;
            self.page
                .pointer_up(at)
                .await
                .map_err(|e| MicroActionError::from_page("click", e))?;
            if i + 1 < count {
                control.sleep(self.click_delay()).await?;
            }
        }
        Ok(())
    }

    fn click_delay(&self) -> Duration {
        Duration::from_millis(self.entropy.range_u64(CLICK_DELAY_MS.0, CLICK_DELAY_MS.1))
    }

    async fn exec_scroll(
        &self,
        target: &ScrollTarget,
        speed: PointerSpeed,
        control: &SessionControl,
        ctx: ResolveCtx<'_>,
    ) -> Result<(), MicroActionError> {
        match target {
            ScrollTarget::Element { target } => {
                let resolved = self.resolve_target("scroll", target, ctx).await?;
                let handle = resolved
                    .handle()
                    .ok_or_else(|| MicroActionError::failed("scroll", "target has no geometry"))?;
                self.page
                    .scroll_into_view(handle)
                    .await
                    .map_err(|e| MicroActionError::from_page("scroll", e))?;
                control.sleep(SCROLL_SETTLE).await
            }
            ScrollTarget::By { distance } => {
                let step_delay = Duration::from_millis(match speed {
                    PointerSpeed::Slow => 90,
                    PointerSpeed::Normal => 50,
                    PointerSpeed::Fast => 25,
                });
                let steps = (distance.abs() / SCROLL_STEP_PX).ceil() as u64;
                let direction = distance.signum();
                let mut remaining = distance.abs();

                for _ in 0..steps {
                    control.checkpoint()?;
                    let step = remaining.min(SCROLL_STEP_PX);
                    self.page
                        .scroll_by(0.0, step * direction)
                        .await
                        .map_err(|e| MicroActionError::from_page("scroll", e))?;
                    remaining -= step;
                    control.sleep(step_delay).await?;
                    if self.entropy.chance(SCROLL_PAUSE_CHANCE) {
                        let pause = Duration::from_millis(
                            self.entropy.range_u64(SCROLL_PAUSE_MS.0, SCROLL_PAUSE_MS.1),
                        );
                        control.sleep(pause).await?;
                    }
                }
                Ok(())
            }
        }
    }

    async fn exec_type(
        &self,
        target: &str,
        text: &str,
        clear_first: bool,
        char_delay: &DurationSpec,
        ctx: ResolveCtx<'_>,
        control: &SessionControl,
    ) -> Result<(), MicroActionError> {
        let resolved = self.resolve_target("type", target, ctx).await?;
        self.move_to(&resolved, PathPattern::Natural, PointerSpeed::Normal, control)
            .await?;
        let handle = resolved
            .handle()
            .ok_or_else(|| MicroActionError::failed("type", "target is not editable"))?
            .clone();

        self.page
            .focus(&handle)
            .await
            .map_err(|e| MicroActionError::from_page("type", e))?;
        if clear_first {
            self.page
                .clear_value(&handle)
                .await
                .map_err(|e| MicroActionError::from_page("type", e))?;
        }

        for ch in text.chars() {
            control.checkpoint()?;

            if self.entropy.chance(THINKING_PAUSE_CHANCE) {
                let pause = Duration::from_millis(
                    self.entropy
                        .range_u64(THINKING_PAUSE_MS.0, THINKING_PAUSE_MS.1),
                );
                control.sleep(pause).await?;
            }

            if ch.is_ascii_alphanumeric() && self.entropy.chance(TYPO_CHANCE) {
                self.type_char(&handle, self.wrong_char_for(ch), char_delay, control)
                    .await?;
                self.page
                    .delete_backward(&handle)
                    .await
                    .map_err(|e| MicroActionError::from_page("type", e))?;
                self.char_pause(char_delay, control).await?;
            }

            self.type_char(&handle, ch, char_delay, control).await?;
        }
        Ok(())
    }

    async fn type_char(
        &self,
        handle: &ElementHandle,
        ch: char,
        char_delay: &DurationSpec,
        control: &SessionControl,
    ) -> Result<(), MicroActionError> {
        self.page
            .insert_char(handle, ch)
            .await
            .map_err(|e| MicroActionError::from_page("type", e))?;
        self.char_pause(char_delay, control).await
    }

    async fn char_pause(
        &self,
        char_delay: &DurationSpec,
        control: &SessionControl,
    ) -> Result<(), MicroActionError> {
        let delay = self
            .timing
            .resolve(char_delay, &self.entropy)
            .map_err(|e| MicroActionError::failed("type", e.to_string()))?;
        control.sleep(delay).await
    }

    /// A plausible mistyped character near the intended one.
    fn wrong_char_for(&self, intended: char) -> char {
        let pool = "abcdefghijklmnopqrstuvwxyz";
        loop {
            let candidate = pool
                .chars()
                .nth(self.entropy.index(pool.len()))
                .unwrap_or('x');
            if candidate != intended.to_ascii_lowercase() {
                return candidate;
            }
        }
    }

    async fn exec_verify(
        &self,
        target: &str,
        should_exist: bool,
        ctx: ResolveCtx<'_>,
    ) -> Result<(), MicroActionError> {
        let exists = match self
            .resolver
            .resolve(target, ctx, ResolveOptions::uncached())
            .await
        {
            Ok(_) => true,
            Err(ResolveError::ElementNotFound { .. }) => false,
            Err(err) => return Err(MicroActionError::from_resolve("verify", err)),
        };

        if exists == should_exist {
            Ok(())
        } else {
            Err(MicroActionError::failed(
                "verify",
                format!("'{target}' exists={exists}, expected {should_exist}"),
            ))
        }
    }

    async fn exec_screenshot(&self) -> Result<(), MicroActionError> {
        let bytes = self
            .page
            .capture_screenshot()
            .await
            .map_err(|e| MicroActionError::from_page("screenshot", e))?;
        self.sink.screenshot_captured(bytes).await;
        Ok(())
    }

    async fn resolve_target(
        &self,
        kind: &'static str,
        selector: &str,
        ctx: ResolveCtx<'_>,
    ) -> Result<Resolved, MicroActionError> {
        self.resolver
            .resolve(selector, ctx, ResolveOptions::default())
            .await
            .map_err(|err| {
                warn!(kind, selector, %err, "target resolution failed");
                MicroActionError::from_resolve(kind, err)
            })
    }
}
