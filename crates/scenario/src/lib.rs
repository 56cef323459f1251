//! Declarative scenario model.
//!
//! A scenario bundles per-page behavior (entry actions, weighted action
//! pools, stay durations) with completion goals. Scenarios arrive inside a
//! website config document (see [`WebsiteConfig`]) together with the selector
//! sets they reference; the document is immutable once a session starts.

mod config;
mod model;
mod selectors;

pub use config::{WebsiteConfig, WebsiteInfo};
pub use model::{
    Action, ActionGroups, Conditions, Goals, MicroAction, PageConfig, Scenario, ScrollTarget,
    SessionDurationBound,
};
pub use selectors::{PageSelectors, SelectorSet};

use thiserror::Error;

/// Errors raised while loading or sanity-checking a config document.
#[derive(Debug, Error, Clone)]
pub enum ScenarioError {
    /// Document is not valid JSON or misses required structure
    #[error("Config parse error: {0}")]
    Parse(String),

    /// Requested scenario id is not present in the document
    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),

    /// An `@name` reference has no entry in the selector set
    #[error("Scenario '{scenario}' references unknown selector '@{name}'")]
    UnknownSelectorRef { scenario: String, name: String },

    /// A navigation action points at a page type with no config
    #[error("Scenario '{scenario}' action '{action}' targets unknown page '{page}'")]
    UnknownTargetPage {
        scenario: String,
        action: String,
        page: String,
    },

    /// Action weight outside [0, 1]
    #[error("Scenario '{scenario}' action '{action}' has probability {value} outside [0, 1]")]
    InvalidProbability {
        scenario: String,
        action: String,
        value: f64,
    },
}
