//! Selector sets: named selectors shared by scenarios and page detection.

use std::collections::HashMap;

use meander_core_types::PageType;
use serde::{Deserialize, Serialize};

/// Global and per-page named selectors supplied at session start.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SelectorSet {
    /// `@name` references resolve here
    #[serde(default)]
    pub global: HashMap<String, String>,
    #[serde(default)]
    pub pages: HashMap<PageType, PageSelectors>,
}

impl SelectorSet {
    /// Look up an `@name` reference: the current page's elements shadow the
    /// global table.
    pub fn lookup(&self, name: &str, page: Option<&PageType>) -> Option<&str> {
        if let Some(page) = page {
            if let Some(selector) = self
                .pages
                .get(page)
                .and_then(|p| p.elements.get(name))
            {
                return Some(selector);
            }
        }
        self.global.get(name).map(String::as_str)
    }

    pub fn page(&self, page: &PageType) -> Option<&PageSelectors> {
        self.pages.get(page)
    }
}

/// Selectors scoped to one page type.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PageSelectors {
    /// Selectors whose presence identifies this page type
    #[serde(default)]
    pub identifiers: Vec<String>,
    /// Named elements referenced by `@name` while on this page
    #[serde(default)]
    pub elements: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SelectorSet {
        serde_json::from_str(
            r##"{
                "global": {"logo": "#logo", "search": "#global-search"},
                "pages": {
                    "home": {
                        "identifiers": [".hero"],
                        "elements": {"search": "#home-search"}
                    }
                }
            }"##,
        )
        .unwrap()
    }

    #[test]
    fn page_elements_shadow_global() {
        let set = sample();
        let home = PageType::from("home");
        assert_eq!(set.lookup("search", Some(&home)), Some("#home-search"));
        assert_eq!(set.lookup("search", None), Some("#global-search"));
    }

    #[test]
    fn global_fallback_and_miss() {
        let set = sample();
        let home = PageType::from("home");
        assert_eq!(set.lookup("logo", Some(&home)), Some("#logo"));
        assert_eq!(set.lookup("cart", Some(&home)), None);
    }
}
