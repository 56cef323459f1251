//! Synthetic pointer paths between two page points.

use std::time::Duration;

use meander_core_types::Point;
use serde::{Deserialize, Serialize};

use crate::Entropy;

/// Fixed animation frame interval (~60Hz).
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

const MIN_TRAVEL_MS: f64 = 80.0;
const MAX_TRAVEL_MS: f64 = 2500.0;

/// Curve jitter applied inside the middle 80% of a natural path.
const CURVE_JITTER_PX: f64 = 1.5;

/// Time-warp amplitude for hesitant paths. Keeps progress monotone while
/// stalling around the midpoint (derivative minimum at t = 0.5).
const HESITANT_WARP: f64 = 0.12;

/// Shape of the synthesized pointer travel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathPattern {
    /// Linear interpolation
    Direct,
    /// Quadratic Bezier through a randomly offset control point
    #[default]
    Natural,
    /// Natural baseline with a midpoint stall
    Hesitant,
}

/// Named pointer travel speed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerSpeed {
    Slow,
    #[default]
    Normal,
    Fast,
}

impl PointerSpeed {
    pub fn pixels_per_second(&self) -> f64 {
        match self {
            PointerSpeed::Slow => 350.0,
            PointerSpeed::Normal => 800.0,
            PointerSpeed::Fast => 1600.0,
        }
    }
}

/// One frame of pointer travel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PathStep {
    pub point: Point,
    pub delay: Duration,
}

/// Build the frame-by-frame pointer path from `from` to `to`.
///
/// Travel time derives from distance and the named speed, clamped to keep
/// short hops visible and long sweeps bounded.
pub fn build_path(
    from: Point,
    to: Point,
    pattern: PathPattern,
    speed: PointerSpeed,
    entropy: &Entropy,
) -> Vec<PathStep> {
    let distance = from.distance_to(to);
    if distance < 1.0 {
        return vec![PathStep {
            point: to,
            delay: FRAME_INTERVAL,
        }];
    }

    let travel_ms = (distance / speed.pixels_per_second() * 1000.0)
        .clamp(MIN_TRAVEL_MS, MAX_TRAVEL_MS);
    let steps = ((travel_ms / FRAME_INTERVAL.as_millis() as f64).round() as usize).max(2);

    let control = natural_control_point(from, to, distance, entropy);

    let mut path = Vec::with_capacity(steps);
    for i in 1..=steps {
        let t = i as f64 / steps as f64;
        let warped = match pattern {
            PathPattern::Hesitant => t + HESITANT_WARP * (2.0 * std::f64::consts::PI * t).sin(),
            _ => t,
        };

        let mut point = match pattern {
            PathPattern::Direct => lerp(from, to, warped),
            PathPattern::Natural | PathPattern::Hesitant => {
                quadratic_bezier(from, control, to, warped)
            }
        };

        if pattern == PathPattern::Natural && (0.1..=0.9).contains(&t) {
            point.x += entropy.range_f64(-CURVE_JITTER_PX, CURVE_JITTER_PX);
            point.y += entropy.range_f64(-CURVE_JITTER_PX, CURVE_JITTER_PX);
        }

        // Land exactly on the target
        if i == steps {
            point = to;
        }

        path.push(PathStep {
            point,
            delay: FRAME_INTERVAL,
        });
    }
    path
}

/// Small random displacement around a point, used for hover micro-movements.
pub fn jitter_point(around: Point, radius: f64, entropy: &Entropy) -> Point {
    Point::new(
        around.x + entropy.range_f64(-radius, radius),
        around.y + entropy.range_f64(-radius, radius),
    )
}

fn lerp(a: Point, b: Point, t: f64) -> Point {
    Point::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t)
}

fn quadratic_bezier(a: Point, c: Point, b: Point, t: f64) -> Point {
    let u = 1.0 - t;
    Point::new(
        u * u * a.x + 2.0 * u * t * c.x + t * t * b.x,
        u * u * a.y + 2.0 * u * t * c.y + t * t * b.y,
    )
}

/// Control point offset perpendicular to the travel axis, scaled to distance.
fn natural_control_point(from: Point, to: Point, distance: f64, entropy: &Entropy) -> Point {
    let mid = lerp(from, to, 0.5);
    let (nx, ny) = (-(to.y - from.y) / distance, (to.x - from.x) / distance);
    let offset = entropy.range_f64(-distance / 4.0, distance / 4.0);
    Point::new(mid.x + nx * offset, mid.y + ny * offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total_len(path: &[PathStep], start: Point) -> f64 {
        let mut prev = start;
        let mut len = 0.0;
        for step in path {
            len += prev.distance_to(step.point);
            prev = step.point;
        }
        len
    }

    #[test]
    fn path_ends_exactly_on_target() {
        let entropy = Entropy::from_seed(5);
        for pattern in [
            PathPattern::Direct,
            PathPattern::Natural,
            PathPattern::Hesitant,
        ] {
            let path = build_path(
                Point::new(0.0, 0.0),
                Point::new(300.0, 120.0),
                pattern,
                PointerSpeed::Normal,
                &entropy,
            );
            assert!(path.len() >= 2);
            assert_eq!(path.last().unwrap().point, Point::new(300.0, 120.0));
        }
    }

    #[test]
    fn zero_distance_collapses_to_single_step() {
        let entropy = Entropy::from_seed(5);
        let p = Point::new(10.0, 10.0);
        let path = build_path(p, p, PathPattern::Natural, PointerSpeed::Fast, &entropy);
        assert_eq!(path.len(), 1);
        assert_eq!(path[0].point, p);
    }

    #[test]
    fn slower_speed_yields_more_frames() {
        let entropy = Entropy::from_seed(5);
        let from = Point::new(0.0, 0.0);
        let to = Point::new(600.0, 0.0);
        let slow = build_path(from, to, PathPattern::Direct, PointerSpeed::Slow, &entropy);
        let fast = build_path(from, to, PathPattern::Direct, PointerSpeed::Fast, &entropy);
        assert!(slow.len() > fast.len());
    }

    #[test]
    fn natural_path_bows_away_from_the_line() {
        // With a seeded entropy the control offset is deterministic; the
        // curved path must be at least as long as the straight line.
        let entropy = Entropy::from_seed(12);
        let from = Point::new(0.0, 0.0);
        let to = Point::new(400.0, 0.0);
        let natural = build_path(from, to, PathPattern::Natural, PointerSpeed::Normal, &entropy);
        assert!(total_len(&natural, from) >= 400.0);
    }

    #[test]
    fn hesitant_warp_stays_monotone_enough_to_finish() {
        let entropy = Entropy::from_seed(3);
        let path = build_path(
            Point::new(0.0, 0.0),
            Point::new(500.0, 200.0),
            PathPattern::Hesitant,
            PointerSpeed::Slow,
            &entropy,
        );
        assert_eq!(path.last().unwrap().point, Point::new(500.0, 200.0));
    }

    #[test]
    fn jitter_point_stays_within_radius() {
        let entropy = Entropy::from_seed(8);
        let center = Point::new(50.0, 50.0);
        for _ in 0..32 {
            let p = jitter_point(center, 3.0, &entropy);
            assert!((p.x - center.x).abs() <= 3.0);
            assert!((p.y - center.y).abs() <= 3.0);
        }
    }
}
