//! Resolution result cache.

use std::collections::HashMap;

use page_adapter::ElementHandle;
use parking_lot::Mutex;

use crate::Strategy;

/// Cache of successful resolutions keyed by the post-alias selector string.
///
/// Entries are only trusted after the caller revalidates attachment; the
/// tree can change between ticks through navigation or external mutation.
#[derive(Default)]
pub struct SelectorCache {
    entries: Mutex<HashMap<String, (ElementHandle, Strategy)>>,
}

impl SelectorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, selector: &str) -> Option<(ElementHandle, Strategy)> {
        self.entries.lock().get(selector).cloned()
    }

    pub fn insert(&self, selector: impl Into<String>, handle: ElementHandle, strategy: Strategy) {
        self.entries.lock().insert(selector.into(), (handle, strategy));
    }

    pub fn invalidate(&self, selector: &str) {
        self.entries.lock().remove(selector);
    }

    /// Drop everything; used on page transitions.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_invalidate() {
        let cache = SelectorCache::new();
        assert!(cache.get("#a").is_none());

        cache.insert("#a", ElementHandle::new("el1"), Strategy::Direct);
        let (handle, strategy) = cache.get("#a").unwrap();
        assert_eq!(handle.0, "el1");
        assert_eq!(strategy, Strategy::Direct);

        cache.invalidate("#a");
        assert!(cache.get("#a").is_none());
    }

    #[test]
    fn clear_empties_everything() {
        let cache = SelectorCache::new();
        cache.insert("#a", ElementHandle::new("el1"), Strategy::Direct);
        cache.insert("#b", ElementHandle::new("el2"), Strategy::Text);
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }
}
