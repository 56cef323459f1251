//! Resolution error types.

use page_adapter::PageError;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum ResolveError {
    /// `@name` reference with no entry in the selector set. Immediate
    /// failure, never a soft miss.
    #[error("Unknown global selector: @{0}")]
    UnknownGlobalSelector(String),

    /// Every strategy in the chain came up empty
    #[error("Element not found: '{selector}' (strategies exhausted after {last_strategy})")]
    ElementNotFound {
        selector: String,
        last_strategy: &'static str,
    },

    /// Page adapter failure outside normal miss semantics
    #[error(transparent)]
    Page(#[from] PageError),
}

impl ResolveError {
    pub fn not_found(selector: impl Into<String>, last_strategy: &'static str) -> Self {
        Self::ElementNotFound {
            selector: selector.into(),
            last_strategy,
        }
    }
}
