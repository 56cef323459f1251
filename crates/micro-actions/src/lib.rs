//! Micro-action interpreter.
//!
//! Executes one primitive interaction step at a time (wait, move, hover,
//! click, scroll, type, verify, screenshot, log), turning declarative specs
//! into timed pointer/keyboard primitives against the page adapter. All
//! suspension points honor the session's cooperative pause/stop flags.

mod control;
mod errors;
mod interpreter;
mod sink;

pub use control::SessionControl;
pub use errors::MicroActionError;
pub use interpreter::Interpreter;
pub use sink::{EventSink, TracingSink};
