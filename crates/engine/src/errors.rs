//! Engine error types.

use meander_scenario::ScenarioError;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum EngineError {
    /// A session is already active in this browsing context
    #[error("Session already active")]
    SessionActive,

    /// Command requires an active session
    #[error("No active session")]
    NoSession,

    /// Config document failed to load or sanity-check
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
}

/// Failure substrings that stop the session instead of continuing to the
/// next tick.
const FATAL_SUBSTRINGS: [&str; 3] = ["network error", "page crash", "extension error"];

/// Classify a tick failure message: fatal failures stop the session, the
/// rest are logged and the loop continues.
pub(crate) fn is_fatal_failure(message: &str) -> bool {
    let lower = message.to_lowercase();
    FATAL_SUBSTRINGS.iter().any(|s| lower.contains(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification_matches_known_substrings() {
        assert!(is_fatal_failure("Page I/O error: Network Error while fetching"));
        assert!(is_fatal_failure("page crash detected"));
        assert!(is_fatal_failure("Extension error: context invalidated"));
        assert!(!is_fatal_failure("Element not found: '#x'"));
        assert!(!is_fatal_failure("Wait timeout"));
    }
}
