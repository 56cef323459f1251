//! Command protocol: the single request/response entry point the transport
//! collaborator adapts onto whatever channel the host provides.

use std::sync::Arc;

use meander_core_types::TabId;
use meander_scenario::WebsiteConfig;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::{EngineError, SessionEngine};

/// Requests accepted by [`SessionEngine::handle`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    #[serde(rename_all = "camelCase")]
    StartAutomation {
        scenario_id: String,
        website_config: serde_json::Value,
    },
    StopAutomation,
    PauseAutomation,
    ResumeAutomation,
    GetStatus,
    TestSelector {
        selector: String,
    },
    #[serde(rename_all = "camelCase")]
    LogAction {
        action_type: String,
        #[serde(flatten)]
        context: serde_json::Value,
    },
}

/// Uniform response envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

impl SessionEngine {
    /// Dispatch one command. Every failure is folded into the response
    /// envelope; this never panics or propagates.
    pub async fn handle(self: &Arc<Self>, command: Command) -> CommandResponse {
        debug!(?command, "handling command");
        match command {
            Command::StartAutomation {
                scenario_id,
                website_config,
            } => {
                let config = match WebsiteConfig::load_value(website_config) {
                    Ok(config) => config,
                    Err(err) => return CommandResponse::err(err.to_string()),
                };
                match self.start(&scenario_id, &config, TabId::new()).await {
                    Ok(session_id) => CommandResponse::ok(json!({ "sessionId": session_id })),
                    Err(err) => CommandResponse::err(err.to_string()),
                }
            }
            Command::StopAutomation => self.simple(self.stop()),
            Command::PauseAutomation => self.simple(self.pause()),
            Command::ResumeAutomation => self.simple(self.resume()),
            Command::GetStatus => {
                let snapshot = self.snapshot();
                let (current_page, progress, duration) = snapshot
                    .as_ref()
                    .map(|s| {
                        (
                            Some(s.current_page.clone()),
                            s.progress,
                            s.duration_ms,
                        )
                    })
                    .unwrap_or((None, 0.0, 0));
                CommandResponse::ok(json!({
                    "isRunning": self.is_running(),
                    "isPaused": self.is_paused(),
                    "currentSession": snapshot,
                    "currentPage": current_page,
                    "progress": progress,
                    "duration": duration,
                }))
            }
            Command::TestSelector { selector } => {
                let (found, info) = self.test_selector(&selector).await;
                CommandResponse::ok(json!({ "found": found, "element": info }))
            }
            Command::LogAction {
                action_type,
                context,
            } => {
                self.event_sink().log_action(&action_type, context).await;
                CommandResponse::ok(json!({}))
            }
        }
    }

    fn simple(&self, result: Result<(), EngineError>) -> CommandResponse {
        match result {
            Ok(()) => CommandResponse::ok(json!({})),
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_use_wire_names() {
        let cmd: Command = serde_json::from_str(
            r#"{"type": "START_AUTOMATION", "data": {"scenarioId": "browse", "websiteConfig": {}}}"#,
        )
        .unwrap();
        assert!(matches!(
            cmd,
            Command::StartAutomation { ref scenario_id, .. } if scenario_id == "browse"
        ));

        let cmd: Command = serde_json::from_str(r#"{"type": "GET_STATUS"}"#).unwrap();
        assert!(matches!(cmd, Command::GetStatus));

        let cmd: Command = serde_json::from_str(
            r#"{"type": "LOG_ACTION", "data": {"actionType": "click", "page": "home"}}"#,
        )
        .unwrap();
        match cmd {
            Command::LogAction {
                action_type,
                context,
            } => {
                assert_eq!(action_type, "click");
                assert_eq!(context["page"], "home");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn response_envelope_shape() {
        let ok = CommandResponse::ok(json!({"sessionId": "s1"}));
        let raw = serde_json::to_value(&ok).unwrap();
        assert_eq!(raw["success"], true);
        assert_eq!(raw["data"]["sessionId"], "s1");
        assert!(raw.get("error").is_none());

        let err = CommandResponse::err("boom");
        let raw = serde_json::to_value(&err).unwrap();
        assert_eq!(raw["success"], false);
        assert_eq!(raw["error"], "boom");
    }
}
