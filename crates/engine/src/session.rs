//! Session status and reporting types.

use chrono::{DateTime, Utc};
use goal_tracker::GoalStatus;
use meander_core_types::{PageType, SessionId, TabId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle state of a session.
///
/// `Idle` is the absence of a session; `Running` and `Paused` alternate
/// during execution; the rest are terminal. Transitions happen only inside
/// the state machine.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Idle,
    Running,
    Paused,
    Completed,
    TimedOut,
    Error,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::TimedOut | SessionStatus::Error
        )
    }
}

/// Point-in-time view of the active session for status reporting.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub tab: TabId,
    pub scenario_id: String,
    pub status: SessionStatus,
    pub current_page: PageType,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Derived completion percentage in [0, 100]
    pub progress: f64,
    pub goals: GoalStatus,
}

/// Final outcome retained after a session ends, until the next start.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    pub id: SessionId,
    pub scenario_id: String,
    pub status: SessionStatus,
    pub metrics: HashMap<String, f64>,
    pub duration_ms: u64,
    /// Failure message when status is `Error`
    pub error: Option<String>,
}
