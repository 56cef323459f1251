//! Scenario, page-config and action types.
//!
//! Field names mirror the wire form of the config document (camelCase for
//! page/action fields, snake_case inside `goals`), so existing documents
//! deserialize unchanged.

use std::collections::HashMap;

use humanize::{DurationSpec, PathPattern, PointerSpeed};
use meander_core_types::{MetricName, PageType};
use serde::{Deserialize, Serialize};

/// A named bundle of per-page behavior plus completion goals.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub goals: Goals,
    /// Page-type name -> behavior on that page
    pub pages: HashMap<PageType, PageConfig>,
}

impl Scenario {
    pub fn page_config(&self, page: &PageType) -> Option<&PageConfig> {
        self.pages.get(page)
    }
}

/// Completion goals: metric targets plus an optional session duration bound.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Goals {
    #[serde(default)]
    pub required_metrics: HashMap<MetricName, f64>,
    #[serde(default)]
    pub optional_metrics: HashMap<MetricName, f64>,
    #[serde(default)]
    pub session_duration: Option<SessionDurationBound>,
}

/// Session duration bound in milliseconds.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SessionDurationBound {
    #[serde(default)]
    pub min: Option<u64>,
    pub max: u64,
}

/// Behavior on one page type.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageConfig {
    /// Inter-tick delay range while staying on this page
    pub stay_duration: DurationSpec,
    /// Micro-actions run once on arrival
    #[serde(default)]
    pub entry_actions: Vec<MicroAction>,
    #[serde(default)]
    pub actions: ActionGroups,
}

/// Actions partitioned into navigation and non-navigation pools.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionGroups {
    #[serde(default)]
    pub navigation: Vec<Action>,
    #[serde(default)]
    pub non_navigation: Vec<Action>,
}

impl ActionGroups {
    /// All actions, navigation pool first.
    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.navigation.iter().chain(self.non_navigation.iter())
    }

    pub fn len(&self) -> usize {
        self.navigation.len() + self.non_navigation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.navigation.is_empty() && self.non_navigation.is_empty()
    }
}

/// One selectable action.
///
/// `probability` is a relative weight, not a normalized probability: the
/// selector draws uniformly over the sum of eligible weights. Documents tuned
/// under that model keep their meaning.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub name: String,
    pub probability: f64,
    #[serde(default)]
    pub conditions: Conditions,
    /// Metric deltas applied after the micro-sequence completes
    #[serde(default)]
    pub impact: HashMap<MetricName, f64>,
    #[serde(default)]
    pub micro_sequence: Vec<MicroAction>,
    /// Expected page type after execution (navigation actions)
    #[serde(default)]
    pub target_page: Option<PageType>,
}

/// Preconditions gating an action's eligibility.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Conditions {
    /// Milliseconds on the current page, lower bound
    pub min_time_on_page: Option<u64>,
    /// Milliseconds on the current page, upper bound
    pub max_time_on_page: Option<u64>,
    pub element_exists: Option<String>,
    pub element_not_exists: Option<String>,
    /// Metric -> minimum accumulated value
    pub goal_progress: HashMap<MetricName, f64>,
}

impl Conditions {
    pub fn is_empty(&self) -> bool {
        self.min_time_on_page.is_none()
            && self.max_time_on_page.is_none()
            && self.element_exists.is_none()
            && self.element_not_exists.is_none()
            && self.goal_progress.is_empty()
    }
}

/// A single primitive interaction step.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MicroAction {
    Wait {
        duration: DurationSpec,
    },
    Move {
        target: String,
        #[serde(default)]
        pattern: PathPattern,
        #[serde(default)]
        speed: PointerSpeed,
    },
    Hover {
        target: String,
        #[serde(default = "default_hover_duration")]
        duration: DurationSpec,
    },
    Click {
        target: String,
        #[serde(default = "default_click_count")]
        count: u32,
    },
    Scroll {
        #[serde(flatten)]
        target: ScrollTarget,
        #[serde(default)]
        speed: PointerSpeed,
    },
    Type {
        target: String,
        text: String,
        #[serde(default, rename = "clearFirst")]
        clear_first: bool,
        #[serde(default = "default_char_delay", rename = "charDelay")]
        char_delay: DurationSpec,
    },
    Verify {
        target: String,
        #[serde(default = "default_true", rename = "shouldExist")]
        should_exist: bool,
    },
    Screenshot,
    Log {
        message: String,
    },
}

impl MicroAction {
    /// Kind name used in logs and failure reports.
    pub fn kind(&self) -> &'static str {
        match self {
            MicroAction::Wait { .. } => "wait",
            MicroAction::Move { .. } => "move",
            MicroAction::Hover { .. } => "hover",
            MicroAction::Click { .. } => "click",
            MicroAction::Scroll { .. } => "scroll",
            MicroAction::Type { .. } => "type",
            MicroAction::Verify { .. } => "verify",
            MicroAction::Screenshot => "screenshot",
            MicroAction::Log { .. } => "log",
        }
    }
}

/// Scroll either brings an element into view or moves by a signed distance.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScrollTarget {
    Element { target: String },
    /// Signed vertical pixel distance
    By { distance: f64 },
}

fn default_hover_duration() -> DurationSpec {
    DurationSpec::range("1-2s")
}

fn default_click_count() -> u32 {
    1
}

fn default_char_delay() -> DurationSpec {
    DurationSpec::range("80-250ms")
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn micro_action_tags_deserialize() {
        let seq: Vec<MicroAction> = serde_json::from_str(
            r##"[
                {"type": "wait", "duration": "1-2s"},
                {"type": "move", "target": "@searchBox", "pattern": "natural"},
                {"type": "click", "target": "#go", "count": 2},
                {"type": "type", "target": "#q", "text": "rust", "clearFirst": true},
                {"type": "scroll", "distance": -400, "speed": "slow"},
                {"type": "scroll", "target": "#footer"},
                {"type": "verify", "target": "#results", "shouldExist": true},
                {"type": "screenshot"},
                {"type": "log", "message": "done"}
            ]"##,
        )
        .unwrap();
        assert_eq!(seq.len(), 9);
        assert_eq!(seq[0].kind(), "wait");
        assert!(matches!(
            &seq[2],
            MicroAction::Click { count: 2, target } if target == "#go"
        ));
        assert!(matches!(
            &seq[4],
            MicroAction::Scroll {
                target: ScrollTarget::By { distance },
                ..
            } if *distance == -400.0
        ));
        assert!(matches!(
            &seq[5],
            MicroAction::Scroll {
                target: ScrollTarget::Element { target },
                ..
            } if target == "#footer"
        ));
    }

    #[test]
    fn click_count_defaults_to_one() {
        let action: MicroAction =
            serde_json::from_str(r##"{"type": "click", "target": "#x"}"##).unwrap();
        assert!(matches!(action, MicroAction::Click { count: 1, .. }));
    }

    #[test]
    fn conditions_default_to_empty() {
        let action: Action = serde_json::from_str(
            r#"{"name": "browse", "probability": 0.5}"#,
        )
        .unwrap();
        assert!(action.conditions.is_empty());
        assert!(action.impact.is_empty());
        assert!(action.target_page.is_none());
    }

    #[test]
    fn goals_use_snake_case_keys() {
        let goals: Goals = serde_json::from_str(
            r#"{
                "required_metrics": {"visits": 3},
                "optional_metrics": {"scrolls": 10},
                "session_duration": {"max": 600000}
            }"#,
        )
        .unwrap();
        assert_eq!(goals.required_metrics[&MetricName::from("visits")], 3.0);
        assert_eq!(goals.session_duration.unwrap().max, 600_000);
    }
}
