//! Meander: a scenario-driven, human-paced web interaction engine.
//!
//! The workspace splits into layered crates; this root crate re-exports the
//! public surface and adds the dry-run simulator used by the CLI and the
//! integration tests.
//!
//! - [`meander_scenario`] — declarative scenario/config model
//! - [`element_resolver`] — selector-to-element resolution chain
//! - [`micro_actions`] — primitive interaction interpreter
//! - [`meander_engine`] — session state machine and command protocol
//! - [`page_adapter`] — host-page seam (plus the in-memory fake)

pub mod simulator;

pub use element_resolver::{ElementResolver, ResolveCtx, ResolveOptions, ResolveError};
pub use goal_tracker::{GoalStatus, GoalTracker};
pub use humanize::{DurationSpec, Entropy, PathPattern, PointerSpeed, TimingProfile};
pub use meander_core_types::{MetricName, PageType, Point, Rect, SessionId, TabId};
pub use meander_engine::{
    Command, CommandResponse, EngineError, IdentifierDetector, PageDetector, SessionEngine,
    SessionResult, SessionSnapshot, SessionStatus,
};
pub use meander_scenario::{
    Action, Conditions, Goals, MicroAction, PageConfig, Scenario, ScenarioError, SelectorSet,
    WebsiteConfig,
};
pub use micro_actions::{EventSink, Interpreter, MicroActionError, SessionControl, TracingSink};
pub use page_adapter::{ElementHandle, ElementInfo, PageAdapter, PageChangeNotifier, PageError};
