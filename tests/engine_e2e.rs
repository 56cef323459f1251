//! End-to-end tests over the full public surface: config document in,
//! session lifecycle out, including a page transition driven by live page
//! mutation.

use std::sync::Arc;
use std::time::Duration;

use meander_cli::{
    Command, Entropy, SessionEngine, SessionStatus, TabId, TimingProfile, WebsiteConfig,
};
use page_adapter::fake::{FakeElement, FakePage};

const SHOP_DOC: &str = r##"{
    "website": {"name": "Shop", "domain": "shop.example", "type": "ecommerce"},
    "selectors": {
        "global": {"openItem": "#first-item"},
        "pages": {
            "home": {"identifiers": [".hero"]},
            "item": {"identifiers": [".product-detail"]}
        }
    },
    "scenarios": {
        "buy-journey": {
            "name": "Browse to an item",
            "goals": {"required_metrics": {"itemViews": 1}},
            "pages": {
                "home": {
                    "stayDuration": "100-150ms",
                    "actions": {
                        "navigation": [{
                            "name": "open-item",
                            "probability": 1.0,
                            "microSequence": [{"type": "click", "target": "@openItem"}],
                            "targetPage": "item"
                        }]
                    }
                },
                "item": {
                    "stayDuration": "100-150ms",
                    "actions": {
                        "nonNavigation": [{
                            "name": "view-item",
                            "probability": 1.0,
                            "impact": {"itemViews": 1}
                        }]
                    }
                }
            }
        }
    }
}"##;

fn shop_home() -> Arc<FakePage> {
    let page = FakePage::new();
    page.insert("hero", FakeElement::new("div").matching(".hero"));
    page.insert(
        "first-item",
        FakeElement::new("a").matching("#first-item").interactive(),
    );
    page
}

async fn wait_for_finish(engine: &Arc<SessionEngine>) -> meander_cli::SessionResult {
    for _ in 0..200 {
        if let Some(result) = engine.last_result() {
            return result;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("session did not finish in time");
}

#[tokio::test]
async fn navigation_action_transitions_between_pages() {
    let page = shop_home();
    let engine = SessionEngine::builder(page.clone())
        .entropy(Arc::new(Entropy::from_seed(5)))
        .timing(TimingProfile::default())
        .build();

    let config = WebsiteConfig::load_str(SHOP_DOC).unwrap();
    engine
        .start("buy-journey", &config, TabId::new())
        .await
        .unwrap();

    // Simulate the click landing on a new page: after a moment, the home
    // identifiers disappear and the item identifiers appear. The engine's
    // transition poll then observes the change.
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(250)).await;
        page.remove("hero");
        page.insert(
            "detail",
            FakeElement::new("div").matching(".product-detail"),
        );
    });

    let result = wait_for_finish(&engine).await;
    assert_eq!(result.status, SessionStatus::Completed);
    assert_eq!(result.metrics.get("itemViews"), Some(&1.0));
}

#[tokio::test]
async fn wire_protocol_drives_a_full_session() {
    let engine = SessionEngine::builder(shop_home())
        .entropy(Arc::new(Entropy::from_seed(9)))
        .build();

    // Commands arrive exactly as the transport would deliver them.
    let start: Command = serde_json::from_value(serde_json::json!({
        "type": "START_AUTOMATION",
        "data": {
            "scenarioId": "buy-journey",
            "websiteConfig": serde_json::from_str::<serde_json::Value>(SHOP_DOC).unwrap()
        }
    }))
    .unwrap();

    let response = engine.handle(start).await;
    assert!(response.success, "{:?}", response.error);

    let status = engine
        .handle(serde_json::from_value(serde_json::json!({"type": "GET_STATUS"})).unwrap())
        .await;
    let data = status.data.unwrap();
    assert_eq!(data["isRunning"], true);
    assert_eq!(data["currentPage"], "home");

    let pause = engine
        .handle(serde_json::from_value(serde_json::json!({"type": "PAUSE_AUTOMATION"})).unwrap())
        .await;
    assert!(pause.success);
    assert!(engine.is_paused());

    let resume = engine
        .handle(serde_json::from_value(serde_json::json!({"type": "RESUME_AUTOMATION"})).unwrap())
        .await;
    assert!(resume.success);
    assert!(engine.is_running());

    let stop = engine
        .handle(serde_json::from_value(serde_json::json!({"type": "STOP_AUTOMATION"})).unwrap())
        .await;
    assert!(stop.success);
    assert!(!engine.is_running());
    assert!(!engine.is_paused());

    // Stopping again is a no-op, not an error.
    let stop_again = engine
        .handle(serde_json::from_value(serde_json::json!({"type": "STOP_AUTOMATION"})).unwrap())
        .await;
    assert!(stop_again.success);
}

#[tokio::test]
async fn test_selector_command_reports_element_details() {
    let engine = SessionEngine::new(shop_home());

    let found = engine
        .handle(Command::TestSelector {
            selector: "#first-item".into(),
        })
        .await;
    let data = found.data.unwrap();
    assert_eq!(data["found"], true);
    assert_eq!(data["element"]["tagName"], "a");

    let missing = engine
        .handle(Command::TestSelector {
            selector: "#checkout".into(),
        })
        .await;
    assert_eq!(missing.data.unwrap()["found"], false);
}
