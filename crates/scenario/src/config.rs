//! The website config document: website info + selector sets + scenarios.
//!
//! Schema validation and versioning live with the configuration collaborator;
//! the engine only re-checks the structural facts it depends on (selector
//! references, target pages, weight bounds) before trusting a document.

use std::collections::HashMap;

use meander_core_types::PageType;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    Action, Conditions, MicroAction, Scenario, ScenarioError, ScrollTarget, SelectorSet,
};

/// Top-level config document consumed at session start.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebsiteConfig {
    pub website: WebsiteInfo,
    #[serde(default)]
    pub selectors: SelectorSet,
    pub scenarios: HashMap<String, Scenario>,
}

/// Descriptive site metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebsiteInfo {
    pub name: String,
    pub domain: String,
    #[serde(rename = "type")]
    pub site_type: String,
}

impl WebsiteConfig {
    /// Parse a JSON document and run the structural sanity checks.
    pub fn load_str(raw: &str) -> Result<Self, ScenarioError> {
        let config: WebsiteConfig =
            serde_json::from_str(raw).map_err(|e| ScenarioError::Parse(e.to_string()))?;
        Self::finish_load(config)
    }

    /// Same as [`WebsiteConfig::load_str`] for an already-parsed JSON value
    /// (the command transport hands the document over as one).
    pub fn load_value(raw: serde_json::Value) -> Result<Self, ScenarioError> {
        let config: WebsiteConfig =
            serde_json::from_value(raw).map_err(|e| ScenarioError::Parse(e.to_string()))?;
        Self::finish_load(config)
    }

    fn finish_load(mut config: WebsiteConfig) -> Result<Self, ScenarioError> {
        for (id, scenario) in config.scenarios.iter_mut() {
            scenario.id = id.clone();
        }
        config.sanity_check()?;
        debug!(
            website = %config.website.name,
            scenarios = config.scenarios.len(),
            "config document loaded"
        );
        Ok(config)
    }

    pub fn scenario(&self, id: &str) -> Result<&Scenario, ScenarioError> {
        self.scenarios
            .get(id)
            .ok_or_else(|| ScenarioError::UnknownScenario(id.to_string()))
    }

    /// Structural checks: every `@name` reference resolves, every
    /// `targetPage` has a page config, every weight sits in [0, 1].
    pub fn sanity_check(&self) -> Result<(), ScenarioError> {
        for scenario in self.scenarios.values() {
            for (page, page_config) in &scenario.pages {
                for micro in &page_config.entry_actions {
                    self.check_micro(scenario, page, micro)?;
                }
                for action in page_config.actions.iter() {
                    self.check_action(scenario, page, action)?;
                }
            }
        }
        Ok(())
    }

    fn check_action(
        &self,
        scenario: &Scenario,
        page: &PageType,
        action: &Action,
    ) -> Result<(), ScenarioError> {
        if !(0.0..=1.0).contains(&action.probability) {
            return Err(ScenarioError::InvalidProbability {
                scenario: scenario.id.clone(),
                action: action.name.clone(),
                value: action.probability,
            });
        }
        if let Some(target) = &action.target_page {
            if !scenario.pages.contains_key(target) {
                return Err(ScenarioError::UnknownTargetPage {
                    scenario: scenario.id.clone(),
                    action: action.name.clone(),
                    page: target.to_string(),
                });
            }
        }
        self.check_conditions(scenario, page, &action.conditions)?;
        for micro in &action.micro_sequence {
            self.check_micro(scenario, page, micro)?;
        }
        Ok(())
    }

    fn check_conditions(
        &self,
        scenario: &Scenario,
        page: &PageType,
        conditions: &Conditions,
    ) -> Result<(), ScenarioError> {
        for selector in [&conditions.element_exists, &conditions.element_not_exists]
            .into_iter()
            .flatten()
        {
            self.check_reference(scenario, page, selector)?;
        }
        Ok(())
    }

    fn check_micro(
        &self,
        scenario: &Scenario,
        page: &PageType,
        micro: &MicroAction,
    ) -> Result<(), ScenarioError> {
        let target = match micro {
            MicroAction::Move { target, .. }
            | MicroAction::Hover { target, .. }
            | MicroAction::Click { target, .. }
            | MicroAction::Type { target, .. }
            | MicroAction::Verify { target, .. } => Some(target),
            MicroAction::Scroll {
                target: ScrollTarget::Element { target },
                ..
            } => Some(target),
            _ => None,
        };
        if let Some(target) = target {
            self.check_reference(scenario, page, target)?;
        }
        Ok(())
    }

    fn check_reference(
        &self,
        scenario: &Scenario,
        page: &PageType,
        selector: &str,
    ) -> Result<(), ScenarioError> {
        if let Some(name) = selector.strip_prefix('@') {
            if self.selectors.lookup(name, Some(page)).is_none() {
                return Err(ScenarioError::UnknownSelectorRef {
                    scenario: scenario.id.clone(),
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }
}
