//! Duration resolution: declarative specs to concrete, jittered waits.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Entropy;

/// Floor for any resolved wait, to avoid busy-looping the run loop.
pub const MIN_WAIT_MS: u64 = 100;

const JITTER_FRACTION: f64 = 0.2;

#[derive(Debug, Error, Clone)]
pub enum TimingError {
    /// Spec string did not parse as a duration or range
    #[error("Invalid duration spec: {0}")]
    InvalidSpec(String),
}

/// Declarative duration: a millisecond literal or a range string of the form
/// `"<min>-<max><unit>"` with unit `ms` or `s` (default `s`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationSpec {
    Millis(u64),
    Text(String),
}

impl DurationSpec {
    pub fn millis(ms: u64) -> Self {
        Self::Millis(ms)
    }

    pub fn range(spec: impl Into<String>) -> Self {
        Self::Text(spec.into())
    }

    /// Parse into a `[min_ms, max_ms]` bound pair.
    pub fn bounds(&self) -> Result<(u64, u64), TimingError> {
        match self {
            DurationSpec::Millis(ms) => Ok((*ms, *ms)),
            DurationSpec::Text(text) => parse_range(text),
        }
    }
}

fn parse_range(text: &str) -> Result<(u64, u64), TimingError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(TimingError::InvalidSpec(text.to_string()));
    }

    let (body, scale) = if let Some(stripped) = trimmed.strip_suffix("ms") {
        (stripped, 1.0)
    } else if let Some(stripped) = trimmed.strip_suffix('s') {
        (stripped, 1000.0)
    } else {
        (trimmed, 1000.0)
    };

    let to_ms = |part: &str| -> Result<u64, TimingError> {
        part.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| (v * scale).round() as u64)
            .ok_or_else(|| TimingError::InvalidSpec(text.to_string()))
    };

    match body.split_once('-') {
        Some((lo, hi)) => {
            let min = to_ms(lo)?;
            let max = to_ms(hi)?;
            if max < min {
                return Err(TimingError::InvalidSpec(text.to_string()));
            }
            Ok((min, max))
        }
        None => {
            let v = to_ms(body)?;
            Ok((v, v))
        }
    }
}

/// Resolves duration specs into concrete waits.
#[derive(Clone, Copy, Debug, Default)]
pub struct TimingProfile {
    /// Double every resolved wait (accessibility / low-and-slow runs)
    pub slow_mode: bool,
}

impl TimingProfile {
    pub fn new(slow_mode: bool) -> Self {
        Self { slow_mode }
    }

    /// Uniform sample from the spec's range, before jitter or scaling.
    pub fn sample_base(&self, spec: &DurationSpec, entropy: &Entropy) -> Result<u64, TimingError> {
        let (min, max) = spec.bounds()?;
        Ok(entropy.range_u64(min, max))
    }

    /// Full pipeline: sample, apply ±20% jitter, double under slow mode,
    /// clamp to [`MIN_WAIT_MS`].
    pub fn resolve(&self, spec: &DurationSpec, entropy: &Entropy) -> Result<Duration, TimingError> {
        let base = self.sample_base(spec, entropy)? as f64;
        let jittered = base * entropy.range_f64(1.0 - JITTER_FRACTION, 1.0 + JITTER_FRACTION);
        let scaled = if self.slow_mode {
            jittered * 2.0
        } else {
            jittered
        };
        Ok(Duration::from_millis((scaled.round() as u64).max(MIN_WAIT_MS)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_second_ranges_by_default() {
        assert_eq!(DurationSpec::range("2-5s").bounds().unwrap(), (2000, 5000));
        assert_eq!(DurationSpec::range("2-5").bounds().unwrap(), (2000, 5000));
    }

    #[test]
    fn parses_millisecond_ranges_and_points() {
        assert_eq!(
            DurationSpec::range("300-800ms").bounds().unwrap(),
            (300, 800)
        );
        assert_eq!(DurationSpec::range("250ms").bounds().unwrap(), (250, 250));
        assert_eq!(DurationSpec::range("1.5s").bounds().unwrap(), (1500, 1500));
        assert_eq!(DurationSpec::Millis(400).bounds().unwrap(), (400, 400));
    }

    #[test]
    fn rejects_malformed_specs() {
        for bad in ["", "fast", "5-2s", "-3s", "1-2-3s"] {
            assert!(
                DurationSpec::range(bad).bounds().is_err(),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn base_sample_stays_within_bounds() {
        let entropy = Entropy::from_seed(99);
        let profile = TimingProfile::default();
        let spec = DurationSpec::range("1-3s");
        for _ in 0..64 {
            let v = profile.sample_base(&spec, &entropy).unwrap();
            assert!((1000..=3000).contains(&v), "sample {v} out of bounds");
        }
    }

    #[test]
    fn resolve_applies_jitter_window() {
        let entropy = Entropy::from_seed(4);
        let profile = TimingProfile::default();
        let spec = DurationSpec::Millis(1000);
        for _ in 0..64 {
            let ms = profile.resolve(&spec, &entropy).unwrap().as_millis() as u64;
            assert!((800..=1200).contains(&ms), "jittered {ms} out of window");
        }
    }

    #[test]
    fn slow_mode_doubles() {
        let fast = Entropy::from_seed(11);
        let slow = Entropy::from_seed(11);
        let spec = DurationSpec::Millis(1000);
        let normal = TimingProfile::new(false).resolve(&spec, &fast).unwrap();
        let doubled = TimingProfile::new(true).resolve(&spec, &slow).unwrap();
        assert_eq!(doubled.as_millis(), normal.as_millis() * 2);
    }

    #[test]
    fn clamps_to_minimum_wait() {
        let entropy = Entropy::from_seed(2);
        let profile = TimingProfile::default();
        let ms = profile
            .resolve(&DurationSpec::Millis(1), &entropy)
            .unwrap()
            .as_millis() as u64;
        assert_eq!(ms, MIN_WAIT_MS);
    }

    #[test]
    fn deserializes_both_literal_and_range() {
        let lit: DurationSpec = serde_json::from_str("750").unwrap();
        assert_eq!(lit, DurationSpec::Millis(750));
        let range: DurationSpec = serde_json::from_str("\"2-4s\"").unwrap();
        assert_eq!(range, DurationSpec::Text("2-4s".into()));
    }
}
