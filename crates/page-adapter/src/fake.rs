//! In-memory page used by tests and the CLI simulator.
//!
//! Matching is registration-based: an element matches exactly the selector
//! strings it was registered under. That keeps the fake free of any CSS
//! engine while still exercising every resolution strategy downstream.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use meander_core_types::{Point, Rect};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

use crate::{
    ElementHandle, ElementInfo, PageAdapter, PageChangeNotifier, PageError,
};

/// Input event recorded by the fake page.
#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    PointerMove(Point),
    PointerDown(Point),
    PointerUp(Point),
    Focus(String),
    ClearValue(String),
    InsertChar(String, char),
    DeleteBackward(String),
    ScrollIntoView(String),
    ScrollBy(f64, f64),
    HistoryBack,
    Screenshot,
}

/// One registered element.
#[derive(Clone, Debug)]
pub struct FakeElement {
    /// Selector strings this element answers structural queries for
    pub selectors: Vec<String>,
    pub tag_name: String,
    pub text: String,
    pub attributes: HashMap<String, String>,
    pub rect: Rect,
    pub style_hidden: bool,
    pub opacity_zero: bool,
    /// Part of the interactive candidate set (links, buttons, inputs)
    pub interactive: bool,
}

impl FakeElement {
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            selectors: Vec::new(),
            tag_name: tag_name.into(),
            text: String::new(),
            attributes: HashMap::new(),
            rect: Rect::new(0.0, 0.0, 100.0, 24.0),
            style_hidden: false,
            opacity_zero: false,
            interactive: false,
        }
    }

    pub fn matching(mut self, selector: impl Into<String>) -> Self {
        self.selectors.push(selector.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_rect(mut self, rect: Rect) -> Self {
        self.rect = rect;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.style_hidden = true;
        self
    }

    pub fn interactive(mut self) -> Self {
        self.interactive = true;
        self
    }

    fn info(&self) -> ElementInfo {
        ElementInfo {
            tag_name: self.tag_name.clone(),
            text: self.text.clone(),
            attributes: self.attributes.clone(),
            rect: self.rect,
            style_hidden: self.style_hidden,
            opacity_zero: self.opacity_zero,
        }
    }
}

struct Inner {
    elements: HashMap<String, FakeElement>,
    /// Insertion order, used as document order
    order: Vec<String>,
    focused: Option<String>,
    viewport: Rect,
    history_depth: usize,
    events: Vec<InputEvent>,
}

/// In-memory [`PageAdapter`] implementation.
pub struct FakePage {
    inner: Mutex<Inner>,
    revision: watch::Sender<u64>,
}

impl FakePage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                elements: HashMap::new(),
                order: Vec::new(),
                focused: None,
                viewport: Rect::new(0.0, 0.0, 1280.0, 800.0),
                history_depth: 0,
                events: Vec::new(),
            }),
            revision: watch::channel(0).0,
        })
    }

    pub fn set_viewport(&self, viewport: Rect) {
        self.inner.lock().viewport = viewport;
    }

    pub fn set_history_depth(&self, depth: usize) {
        self.inner.lock().history_depth = depth;
    }

    /// Register an element under a stable id.
    pub fn insert(&self, id: impl Into<String>, element: FakeElement) -> ElementHandle {
        let id = id.into();
        let mut inner = self.inner.lock();
        if !inner.elements.contains_key(&id) {
            inner.order.push(id.clone());
        }
        inner.elements.insert(id.clone(), element);
        drop(inner);
        self.bump();
        ElementHandle::new(id)
    }

    /// Detach an element from the tree.
    pub fn remove(&self, id: &str) {
        let mut inner = self.inner.lock();
        inner.elements.remove(id);
        inner.order.retain(|e| e != id);
        if inner.focused.as_deref() == Some(id) {
            inner.focused = None;
        }
        drop(inner);
        self.bump();
    }

    /// Replace the current text of an element (e.g. a pre-filled input).
    pub fn set_text(&self, id: &str, text: impl Into<String>) {
        if let Some(el) = self.inner.lock().elements.get_mut(id) {
            el.text = text.into();
        }
    }

    pub fn text_of(&self, id: &str) -> Option<String> {
        self.inner.lock().elements.get(id).map(|e| e.text.clone())
    }

    /// Events recorded so far, oldest first.
    pub fn events(&self) -> Vec<InputEvent> {
        self.inner.lock().events.clone()
    }

    pub fn clear_events(&self) {
        self.inner.lock().events.clear();
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }

    fn record(&self, event: InputEvent) {
        self.inner.lock().events.push(event);
    }

    fn element<T>(
        &self,
        handle: &ElementHandle,
        f: impl FnOnce(&mut FakeElement) -> T,
    ) -> Result<T, PageError> {
        let mut inner = self.inner.lock();
        inner
            .elements
            .get_mut(&handle.0)
            .map(f)
            .ok_or_else(|| PageError::Detached(handle.0.clone()))
    }
}

impl PageChangeNotifier for FakePage {
    fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

#[async_trait]
impl PageAdapter for FakePage {
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>, PageError> {
        let inner = self.inner.lock();
        let matches: Vec<ElementHandle> = inner
            .order
            .iter()
            .filter(|id| {
                inner.elements[*id]
                    .selectors
                    .iter()
                    .any(|s| s == selector)
            })
            .map(|id| ElementHandle::new(id.clone()))
            .collect();
        debug!(selector, count = matches.len(), "fake query");
        Ok(matches)
    }

    async fn info(&self, handle: &ElementHandle) -> Result<ElementInfo, PageError> {
        self.element(handle, |el| el.info())
    }

    async fn is_attached(&self, handle: &ElementHandle) -> bool {
        self.inner.lock().elements.contains_key(&handle.0)
    }

    async fn interactive_elements(&self) -> Result<Vec<ElementHandle>, PageError> {
        let inner = self.inner.lock();
        Ok(inner
            .order
            .iter()
            .filter(|id| inner.elements[*id].interactive)
            .map(|id| ElementHandle::new(id.clone()))
            .collect())
    }

    async fn all_elements(&self) -> Result<Vec<ElementHandle>, PageError> {
        let inner = self.inner.lock();
        Ok(inner
            .order
            .iter()
            .map(|id| ElementHandle::new(id.clone()))
            .collect())
    }

    async fn focused_element(&self) -> Result<Option<ElementHandle>, PageError> {
        Ok(self.inner.lock().focused.clone().map(ElementHandle::new))
    }

    async fn viewport(&self) -> Result<Rect, PageError> {
        Ok(self.inner.lock().viewport)
    }

    async fn scroll_into_view(&self, handle: &ElementHandle) -> Result<(), PageError> {
        let viewport = self.inner.lock().viewport;
        // The fake has no real layout; repositioning the element inside the
        // viewport is enough for in-viewport checks after the scroll.
        self.element(handle, |el| {
            if !viewport.encloses(&el.rect) {
                el.rect.x = viewport.x + 40.0;
                el.rect.y = viewport.y + 120.0;
            }
        })?;
        self.record(InputEvent::ScrollIntoView(handle.0.clone()));
        self.bump();
        Ok(())
    }

    async fn scroll_by(&self, dx: f64, dy: f64) -> Result<(), PageError> {
        self.record(InputEvent::ScrollBy(dx, dy));
        Ok(())
    }

    async fn pointer_move(&self, to: Point) -> Result<(), PageError> {
        self.record(InputEvent::PointerMove(to));
        Ok(())
    }

    async fn pointer_down(&self, at: Point) -> Result<(), PageError> {
        self.record(InputEvent::PointerDown(at));
        Ok(())
    }

    async fn pointer_up(&self, at: Point) -> Result<(), PageError> {
        self.record(InputEvent::PointerUp(at));
        Ok(())
    }

    async fn focus(&self, handle: &ElementHandle) -> Result<(), PageError> {
        {
            let mut inner = self.inner.lock();
            if !inner.elements.contains_key(&handle.0) {
                return Err(PageError::Detached(handle.0.clone()));
            }
            inner.focused = Some(handle.0.clone());
        }
        self.record(InputEvent::Focus(handle.0.clone()));
        Ok(())
    }

    async fn clear_value(&self, handle: &ElementHandle) -> Result<(), PageError> {
        self.element(handle, |el| el.text.clear())?;
        self.record(InputEvent::ClearValue(handle.0.clone()));
        Ok(())
    }

    async fn insert_char(&self, handle: &ElementHandle, ch: char) -> Result<(), PageError> {
        self.element(handle, |el| el.text.push(ch))?;
        self.record(InputEvent::InsertChar(handle.0.clone(), ch));
        Ok(())
    }

    async fn delete_backward(&self, handle: &ElementHandle) -> Result<(), PageError> {
        self.element(handle, |el| {
            el.text.pop();
        })?;
        self.record(InputEvent::DeleteBackward(handle.0.clone()));
        Ok(())
    }

    async fn can_go_back(&self) -> bool {
        self.inner.lock().history_depth > 0
    }

    async fn history_back(&self) -> Result<(), PageError> {
        {
            let mut inner = self.inner.lock();
            if inner.history_depth == 0 {
                return Err(PageError::HistoryUnavailable);
            }
            inner.history_depth -= 1;
        }
        self.record(InputEvent::HistoryBack);
        self.bump();
        Ok(())
    }

    async fn capture_screenshot(&self) -> Result<Vec<u8>, PageError> {
        self.record(InputEvent::Screenshot);
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn query_matches_registered_selectors() {
        let page = FakePage::new();
        page.insert(
            "btn",
            FakeElement::new("button").matching("#submit").interactive(),
        );

        let found = page.query_all("#submit").await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(page.query_all(".missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn remove_detaches_element() {
        let page = FakePage::new();
        let handle = page.insert("a", FakeElement::new("a").matching("a.nav"));
        assert!(page.is_attached(&handle).await);

        page.remove("a");
        assert!(!page.is_attached(&handle).await);
        assert!(matches!(
            page.info(&handle).await,
            Err(PageError::Detached(_))
        ));
    }

    #[tokio::test]
    async fn typing_mutates_text_and_records_events() {
        let page = FakePage::new();
        let input = page.insert("q", FakeElement::new("input").matching("#q"));
        page.focus(&input).await.unwrap();
        page.insert_char(&input, 'h').await.unwrap();
        page.insert_char(&input, 'i').await.unwrap();
        page.delete_backward(&input).await.unwrap();

        assert_eq!(page.text_of("q").unwrap(), "h");
        let events = page.events();
        assert_eq!(events[0], InputEvent::Focus("q".into()));
        assert!(matches!(events.last(), Some(InputEvent::DeleteBackward(_))));
    }

    #[tokio::test]
    async fn mutation_bumps_revision() {
        let page = FakePage::new();
        let rx = page.subscribe();
        let before = *rx.borrow();
        page.insert("x", FakeElement::new("div"));
        assert!(*rx.borrow() > before);
    }

    #[tokio::test]
    async fn history_back_respects_depth() {
        let page = FakePage::new();
        assert!(!page.can_go_back().await);
        assert!(matches!(
            page.history_back().await,
            Err(PageError::HistoryUnavailable)
        ));

        page.set_history_depth(1);
        assert!(page.can_go_back().await);
        page.history_back().await.unwrap();
        assert!(!page.can_go_back().await);
    }
}
