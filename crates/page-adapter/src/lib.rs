//! Host-page abstraction.
//!
//! The engine never talks to the host platform directly; everything it needs
//! from the live page goes through [`PageAdapter`]. A production build wires
//! in a thin wrapper over the host's DOM/input APIs, while tests and the CLI
//! simulator use the in-memory [`fake::FakePage`].

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use meander_core_types::{Point, Rect};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

#[cfg(feature = "fake")]
pub mod fake;

/// Errors surfaced by page adapter operations.
#[derive(Debug, Error, Clone)]
pub enum PageError {
    /// Referenced element is no longer part of the live tree
    #[error("Element detached: {0}")]
    Detached(String),

    /// Structural query could not be executed
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    /// Navigation history has no entry to go back to
    #[error("History unavailable")]
    HistoryUnavailable,

    /// Screenshot capture failed in the host platform
    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    /// Host platform I/O failure
    #[error("Page I/O error: {0}")]
    Io(String),
}

/// Opaque reference to a live page element.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ElementHandle(pub String);

impl ElementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Snapshot of an element's observable state.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementInfo {
    pub tag_name: String,
    /// Rendered text content
    pub text: String,
    pub attributes: HashMap<String, String>,
    /// Bounding box in page coordinates
    pub rect: Rect,
    /// display:none or visibility:hidden
    pub style_hidden: bool,
    /// computed opacity is zero
    pub opacity_zero: bool,
}

impl ElementInfo {
    /// Visibility: not hidden by display/visibility/opacity and non-zero
    /// rendered width and height.
    pub fn is_visible(&self) -> bool {
        !self.style_hidden && !self.opacity_zero && !self.rect.is_empty()
    }

    /// In-viewport: bounding box lies fully within the visible window rect.
    pub fn is_in_viewport(&self, viewport: &Rect) -> bool {
        viewport.encloses(&self.rect)
    }
}

/// Everything the engine needs from the host page.
///
/// One logical session drives interaction at a time, so implementations do
/// not need internal command ordering beyond what the host already provides.
#[async_trait]
pub trait PageAdapter: Send + Sync {
    /// Run a literal structural query, returning matches in document order.
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>, PageError>;

    /// Snapshot an element's observable state.
    async fn info(&self, handle: &ElementHandle) -> Result<ElementInfo, PageError>;

    /// Whether the element is still part of the live tree.
    async fn is_attached(&self, handle: &ElementHandle) -> bool;

    /// Candidate set for virtual selectors: links, buttons, inputs and other
    /// focusable controls, in document order.
    async fn interactive_elements(&self) -> Result<Vec<ElementHandle>, PageError>;

    /// Every element in the tree, in document order. Backs the content-scan
    /// strategies (text, attribute, geometry).
    async fn all_elements(&self) -> Result<Vec<ElementHandle>, PageError>;

    /// Currently focused element, if any.
    async fn focused_element(&self) -> Result<Option<ElementHandle>, PageError>;

    /// Current visible window rectangle in page coordinates.
    async fn viewport(&self) -> Result<Rect, PageError>;

    async fn scroll_into_view(&self, handle: &ElementHandle) -> Result<(), PageError>;

    /// Scroll the page by a signed pixel delta.
    async fn scroll_by(&self, dx: f64, dy: f64) -> Result<(), PageError>;

    async fn pointer_move(&self, to: Point) -> Result<(), PageError>;
    async fn pointer_down(&self, at: Point) -> Result<(), PageError>;
    async fn pointer_up(&self, at: Point) -> Result<(), PageError>;

    async fn focus(&self, handle: &ElementHandle) -> Result<(), PageError>;

    /// Clear the current value of an editable element.
    async fn clear_value(&self, handle: &ElementHandle) -> Result<(), PageError>;

    /// Emit a single character into the focused editable element.
    async fn insert_char(&self, handle: &ElementHandle, ch: char) -> Result<(), PageError>;

    /// Backspace once in the focused editable element.
    async fn delete_backward(&self, handle: &ElementHandle) -> Result<(), PageError>;

    async fn can_go_back(&self) -> bool;

    async fn history_back(&self) -> Result<(), PageError>;

    async fn capture_screenshot(&self) -> Result<Vec<u8>, PageError>;
}

/// Page-change notification seam.
///
/// The host watches the page for mutations/navigations (mutation observer,
/// navigation events, whatever the platform offers) and bumps a revision
/// counter; the engine subscribes and re-runs page detection when it moves.
pub trait PageChangeNotifier: Send + Sync {
    fn subscribe(&self) -> watch::Receiver<u64>;
}

/// Notifier that never fires; used where no change detection is available.
pub struct NullNotifier {
    tx: watch::Sender<u64>,
}

impl NullNotifier {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx }
    }
}

impl Default for NullNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl PageChangeNotifier for NullNotifier {
    fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_requires_style_and_size() {
        let mut info = ElementInfo {
            rect: Rect::new(0.0, 0.0, 10.0, 10.0),
            ..ElementInfo::default()
        };
        assert!(info.is_visible());

        info.style_hidden = true;
        assert!(!info.is_visible());

        info.style_hidden = false;
        info.opacity_zero = true;
        assert!(!info.is_visible());

        info.opacity_zero = false;
        info.rect = Rect::new(0.0, 0.0, 0.0, 10.0);
        assert!(!info.is_visible());
    }

    #[test]
    fn in_viewport_means_fully_enclosed() {
        let viewport = Rect::new(0.0, 0.0, 800.0, 600.0);
        let inside = ElementInfo {
            rect: Rect::new(10.0, 10.0, 50.0, 20.0),
            ..ElementInfo::default()
        };
        let partial = ElementInfo {
            rect: Rect::new(790.0, 10.0, 50.0, 20.0),
            ..ElementInfo::default()
        };
        assert!(inside.is_in_viewport(&viewport));
        assert!(!partial.is_in_viewport(&viewport));
    }
}
