//! Page type detection seam.

use std::sync::Arc;

use async_trait::async_trait;
use meander_core_types::PageType;
use meander_scenario::SelectorSet;
use page_adapter::PageAdapter;
use tracing::debug;

/// Classifies the currently rendered page.
///
/// Detection is a collaborator concern; the engine only consumes the label.
/// [`IdentifierDetector`] is the default used when the host provides nothing
/// better.
#[async_trait]
pub trait PageDetector: Send + Sync {
    async fn detect(&self, selectors: &SelectorSet) -> PageType;
}

/// Classifies by per-page identifier selectors: the first page type (in
/// name order, for determinism) whose identifiers are all present wins.
pub struct IdentifierDetector {
    page: Arc<dyn PageAdapter>,
}

impl IdentifierDetector {
    pub fn new(page: Arc<dyn PageAdapter>) -> Self {
        Self { page }
    }
}

#[async_trait]
impl PageDetector for IdentifierDetector {
    async fn detect(&self, selectors: &SelectorSet) -> PageType {
        let mut page_types: Vec<&PageType> = selectors.pages.keys().collect();
        page_types.sort_by(|a, b| a.0.cmp(&b.0));

        'outer: for page_type in page_types {
            let Some(page_selectors) = selectors.page(page_type) else {
                continue;
            };
            if page_selectors.identifiers.is_empty() {
                continue;
            }
            for identifier in &page_selectors.identifiers {
                let present = self
                    .page
                    .query_all(identifier)
                    .await
                    .map(|matches| !matches.is_empty())
                    .unwrap_or(false);
                if !present {
                    continue 'outer;
                }
            }
            debug!(page = %page_type, "page detected");
            return page_type.clone();
        }
        PageType::unknown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use page_adapter::fake::{FakeElement, FakePage};

    fn selector_set() -> SelectorSet {
        serde_json::from_str(
            r##"{
                "pages": {
                    "home": {"identifiers": [".hero", "#nav"]},
                    "item": {"identifiers": [".product-detail"]}
                }
            }"##,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn detects_page_whose_identifiers_all_match() {
        let page = FakePage::new();
        page.insert("detail", FakeElement::new("div").matching(".product-detail"));
        let detector = IdentifierDetector::new(page);

        let detected = detector.detect(&selector_set()).await;
        assert_eq!(detected, PageType::from("item"));
    }

    #[tokio::test]
    async fn partial_identifier_match_is_not_enough() {
        let page = FakePage::new();
        // Only one of home's two identifiers present.
        page.insert("hero", FakeElement::new("div").matching(".hero"));
        let detector = IdentifierDetector::new(page);

        let detected = detector.detect(&selector_set()).await;
        assert_eq!(detected, PageType::unknown());
    }

    #[tokio::test]
    async fn empty_selector_set_is_unknown() {
        let page = FakePage::new();
        let detector = IdentifierDetector::new(page);
        let detected = detector.detect(&SelectorSet::default()).await;
        assert_eq!(detected, PageType::unknown());
    }
}
