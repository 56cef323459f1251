//! Human-plausible randomness: timing, jitter and pointer paths.
//!
//! Every randomized decision in the engine draws from a shared [`Entropy`]
//! handle so tests can seed it and assert exact schedules.

mod entropy;
mod path;
mod timing;

pub use entropy::Entropy;
pub use path::{build_path, jitter_point, PathPattern, PathStep, PointerSpeed, FRAME_INTERVAL};
pub use timing::{DurationSpec, TimingError, TimingProfile, MIN_WAIT_MS};
