//! Interpreter error types.

use element_resolver::ResolveError;
use page_adapter::PageError;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum MicroActionError {
    /// A micro-action step failed; `kind` names the step type
    #[error("Micro-action '{kind}' failed: {cause}")]
    Failed { kind: &'static str, cause: String },

    /// Sequence stopped early because the session paused or stopped
    #[error("Interrupted: {0}")]
    Interrupted(String),
}

impl MicroActionError {
    pub fn failed(kind: &'static str, cause: impl Into<String>) -> Self {
        Self::Failed {
            kind,
            cause: cause.into(),
        }
    }

    pub fn from_resolve(kind: &'static str, err: ResolveError) -> Self {
        Self::failed(kind, err.to_string())
    }

    pub fn from_page(kind: &'static str, err: PageError) -> Self {
        Self::failed(kind, err.to_string())
    }

    /// Pause/stop interruptions are not failures; the run loop treats them
    /// as clean early exits.
    pub fn is_interruption(&self) -> bool {
        matches!(self, MicroActionError::Interrupted(_))
    }
}
