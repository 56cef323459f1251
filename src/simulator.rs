//! Dry-run harness: executes a scenario against the in-memory fake page.
//!
//! Useful for validating a config document's behavior (selector references,
//! action weights, goal progression) before pointing the engine at a real
//! host. The fake page is seeded from the scenario's own selector set, so
//! detection and element resolution behave as they would on a page that
//! matches the document.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use humanize::{Entropy, TimingProfile};
use meander_core_types::{PageType, TabId};
use meander_engine::{SessionEngine, SessionStatus};
use meander_scenario::WebsiteConfig;
use page_adapter::fake::{FakeElement, FakePage};
use tracing::info;

/// Simulation parameters.
#[derive(Clone, Debug)]
pub struct SimulationOptions {
    pub scenario_id: String,
    /// Page type to seed the fake page as; defaults to the first page (by
    /// name) that has identifiers in the selector set.
    pub start_page: Option<String>,
    /// Seed for deterministic runs; `None` uses system entropy.
    pub seed: Option<u64>,
    pub slow_mode: bool,
    /// Wall-clock cap on the simulation.
    pub max_duration: Duration,
}

/// Outcome of a simulation run.
#[derive(Clone, Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationReport {
    pub status: SessionStatus,
    pub metrics: HashMap<String, f64>,
    pub duration_ms: u64,
    pub error: Option<String>,
    /// True when the wall-clock cap ended the run before the session did
    pub capped: bool,
}

/// Seed a fake page so that `page` is detectable and its named elements
/// resolve: every identifier and element selector gets one interactive
/// element.
pub fn seed_page(config: &WebsiteConfig, page: &PageType) -> Arc<FakePage> {
    let fake = FakePage::new();
    let mut next_id = 0usize;
    let mut register = |selector: &str| {
        let id = format!("seeded-{next_id}");
        next_id += 1;
        fake.insert(
            id,
            FakeElement::new("div")
                .matching(selector)
                .with_text(selector.to_string())
                .interactive(),
        );
    };

    if let Some(page_selectors) = config.selectors.page(page) {
        for identifier in &page_selectors.identifiers {
            register(identifier);
        }
        for selector in page_selectors.elements.values() {
            register(selector);
        }
    }
    for selector in config.selectors.global.values() {
        register(selector);
    }
    fake
}

fn default_start_page(config: &WebsiteConfig) -> Option<PageType> {
    let mut pages: Vec<&PageType> = config
        .selectors
        .pages
        .iter()
        .filter(|(_, selectors)| !selectors.identifiers.is_empty())
        .map(|(page, _)| page)
        .collect();
    pages.sort_by(|a, b| a.0.cmp(&b.0));
    pages.first().map(|p| (*p).clone())
}

/// Run one scenario to completion (or the wall-clock cap) against a seeded
/// fake page.
pub async fn run(config: &WebsiteConfig, options: &SimulationOptions) -> Result<SimulationReport> {
    let scenario = config.scenario(&options.scenario_id)?;

    let start_page = match &options.start_page {
        Some(name) => PageType::new(name.clone()),
        None => match default_start_page(config) {
            Some(page) => page,
            None => bail!("no detectable page in the selector set; pass a start page"),
        },
    };
    if scenario.page_config(&start_page).is_none() {
        bail!(
            "scenario '{}' has no page config for '{}'",
            scenario.id,
            start_page
        );
    }

    let page = seed_page(config, &start_page);
    let entropy = Arc::new(match options.seed {
        Some(seed) => Entropy::from_seed(seed),
        None => Entropy::system(),
    });
    let engine = SessionEngine::builder(page)
        .entropy(entropy)
        .timing(TimingProfile::new(options.slow_mode))
        .build();

    info!(
        scenario = %scenario.id,
        page = %start_page,
        "simulation starting"
    );
    engine
        .start(&options.scenario_id, config, TabId::new())
        .await?;

    let deadline = tokio::time::Instant::now() + options.max_duration;
    loop {
        if let Some(result) = engine.last_result() {
            return Ok(SimulationReport {
                status: result.status,
                metrics: result.metrics,
                duration_ms: result.duration_ms,
                error: result.error,
                capped: false,
            });
        }
        if tokio::time::Instant::now() >= deadline {
            let snapshot = engine.snapshot();
            let metrics = snapshot
                .map(|s| {
                    s.goals
                        .required
                        .iter()
                        .chain(s.goals.optional.iter())
                        .map(|m| (m.name.0.clone(), m.current))
                        .collect()
                })
                .unwrap_or_default();
            engine.stop()?;
            return Ok(SimulationReport {
                status: SessionStatus::Idle,
                metrics,
                duration_ms: options.max_duration.as_millis() as u64,
                error: None,
                capped: true,
            });
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r##"{
        "website": {"name": "Demo", "domain": "demo.example", "type": "demo"},
        "selectors": {
            "global": {"cta": "#cta"},
            "pages": {"home": {"identifiers": [".hero"]}}
        },
        "scenarios": {
            "quick": {
                "name": "Quick visit",
                "goals": {"required_metrics": {"visits": 1}},
                "pages": {
                    "home": {
                        "stayDuration": "100-150ms",
                        "actions": {
                            "nonNavigation": [{
                                "name": "look",
                                "probability": 1.0,
                                "impact": {"visits": 1},
                                "microSequence": [{"type": "click", "target": "@cta"}]
                            }]
                        }
                    }
                }
            }
        }
    }"##;

    #[tokio::test]
    async fn simulation_completes_seeded_scenario() {
        let config = WebsiteConfig::load_str(DOC).unwrap();
        let report = run(
            &config,
            &SimulationOptions {
                scenario_id: "quick".into(),
                start_page: None,
                seed: Some(11),
                slow_mode: false,
                max_duration: Duration::from_secs(10),
            },
        )
        .await
        .unwrap();

        assert_eq!(report.status, SessionStatus::Completed);
        assert_eq!(report.metrics.get("visits"), Some(&1.0));
        assert!(!report.capped);
    }

    #[tokio::test]
    async fn unknown_scenario_is_an_error() {
        let config = WebsiteConfig::load_str(DOC).unwrap();
        let result = run(
            &config,
            &SimulationOptions {
                scenario_id: "missing".into(),
                start_page: None,
                seed: None,
                slow_mode: false,
                max_duration: Duration::from_secs(1),
            },
        )
        .await;
        assert!(result.is_err());
    }
}
