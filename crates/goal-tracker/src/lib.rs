//! Session progress: metric accumulators and goal evaluation.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use meander_core_types::{MetricName, PageType};
use meander_scenario::Goals;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

struct Inner {
    metrics: HashMap<MetricName, f64>,
    current_page: Option<PageType>,
    page_entered_at: Instant,
}

/// Tracks accumulated metrics against a scenario's goals.
///
/// Metric deltas are applied by the state machine only after an action's
/// full micro-sequence completes; the tracker itself just accumulates.
pub struct GoalTracker {
    goals: Goals,
    started_at: Instant,
    started_wall: DateTime<Utc>,
    inner: Mutex<Inner>,
}

impl GoalTracker {
    pub fn new(goals: Goals) -> Self {
        let now = Instant::now();
        Self {
            goals,
            started_at: now,
            started_wall: Utc::now(),
            inner: Mutex::new(Inner {
                metrics: HashMap::new(),
                current_page: None,
                page_entered_at: now,
            }),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_wall
    }

    /// Add each delta to its accumulator; unknown metric names are created
    /// on first use.
    pub fn update_metrics(&self, deltas: &HashMap<MetricName, f64>) {
        if deltas.is_empty() {
            return;
        }
        let mut inner = self.inner.lock();
        for (name, delta) in deltas {
            let entry = inner.metrics.entry(name.clone()).or_insert(0.0);
            *entry += delta;
            debug!(metric = %name, value = *entry, "metric updated");
        }
    }

    pub fn metric(&self, name: &MetricName) -> f64 {
        self.inner.lock().metrics.get(name).copied().unwrap_or(0.0)
    }

    /// Snapshot of every accumulator.
    pub fn metrics(&self) -> HashMap<MetricName, f64> {
        self.inner.lock().metrics.clone()
    }

    /// Record arrival on a page for time-on-page computations.
    pub fn update_current_page(&self, page: PageType) {
        let mut inner = self.inner.lock();
        inner.current_page = Some(page);
        inner.page_entered_at = Instant::now();
    }

    pub fn current_page(&self) -> Option<PageType> {
        self.inner.lock().current_page.clone()
    }

    /// True iff every required metric has reached its threshold. Optional
    /// metrics never block completion.
    pub fn are_goals_met(&self) -> bool {
        let inner = self.inner.lock();
        self.goals.required_metrics.iter().all(|(name, required)| {
            inner.metrics.get(name).copied().unwrap_or(0.0) >= *required
        })
    }

    /// True iff a session duration bound is set and elapsed time has reached
    /// its max.
    pub fn is_session_timed_out(&self) -> bool {
        match &self.goals.session_duration {
            Some(bound) => self.session_duration() >= Duration::from_millis(bound.max),
            None => false,
        }
    }

    pub fn time_on_current_page(&self) -> Duration {
        self.inner.lock().page_entered_at.elapsed()
    }

    pub fn session_duration(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Derived completion percentage in [0, 100]: the further along of
    /// elapsed-time ratio and mean required-metric completion.
    pub fn overall_progress(&self) -> f64 {
        let time_ratio = match &self.goals.session_duration {
            Some(bound) if bound.max > 0 => {
                (self.session_duration().as_millis() as f64 / bound.max as f64).min(1.0)
            }
            _ => 0.0,
        };

        let metric_ratio = if self.goals.required_metrics.is_empty() {
            0.0
        } else {
            let inner = self.inner.lock();
            let sum: f64 = self
                .goals
                .required_metrics
                .iter()
                .map(|(name, required)| {
                    if *required <= 0.0 {
                        1.0
                    } else {
                        (inner.metrics.get(name).copied().unwrap_or(0.0) / required).min(1.0)
                    }
                })
                .sum();
            sum / self.goals.required_metrics.len() as f64
        };

        time_ratio.max(metric_ratio) * 100.0
    }

    /// Per-metric current/required pairs for status reporting.
    pub fn goal_status(&self) -> GoalStatus {
        let inner = self.inner.lock();
        let project = |targets: &HashMap<MetricName, f64>| {
            let mut rows: Vec<MetricProgress> = targets
                .iter()
                .map(|(name, required)| {
                    let current = inner.metrics.get(name).copied().unwrap_or(0.0);
                    MetricProgress {
                        name: name.clone(),
                        current,
                        required: *required,
                        met: current >= *required,
                    }
                })
                .collect();
            rows.sort_by(|a, b| a.name.0.cmp(&b.name.0));
            rows
        };

        GoalStatus {
            required: project(&self.goals.required_metrics),
            optional: project(&self.goals.optional_metrics),
            session_duration_ms: self.session_duration().as_millis() as u64,
            session_duration_max_ms: self.goals.session_duration.as_ref().map(|b| b.max),
        }
    }
}

/// Status snapshot surfaced through GET_STATUS.
#[derive(Clone, Debug, Serialize)]
pub struct GoalStatus {
    pub required: Vec<MetricProgress>,
    pub optional: Vec<MetricProgress>,
    pub session_duration_ms: u64,
    pub session_duration_max_ms: Option<u64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MetricProgress {
    pub name: MetricName,
    pub current: f64,
    pub required: f64,
    pub met: bool,
}
