//! Fling curves
//!
//! Picks a duration and an easing for an animation that continues a finger's motion.
//! A fast fling finishes quickly with a curve whose start slope matches the release
//! velocity; a slower one is capped by a duration that grows with the square root of the
//! travelled distance.

use crate::config::{FlingCurveConfig, PanelConfig};

use super::interpolator::{CubicBezier, Interpolator};

/// Default second control point x when none is configured
const DEFAULT_X2: f32 = 0.35;

/// Start slope of the curve when the velocity factor is zero
const MIN_START_GRADIENT: f32 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlingProperties {
    pub duration_ms: u64,
    pub interpolator: Interpolator,
}

#[derive(Debug, Clone, Copy)]
pub struct FlingCurve {
    max_length_seconds: f32,
    speed_up_factor: f32,
    x2: f32,
    y2: f32,
    /// px/s
    min_velocity: f32,
    /// px/s
    high_velocity: f32,
}

impl FlingCurve {
    pub fn new(config: &FlingCurveConfig, min_velocity: f32, high_velocity: f32) -> Self {
        Self {
            max_length_seconds: config.max_length_seconds,
            speed_up_factor: config.speed_up_factor,
            x2: if config.x2 < 0.0 { DEFAULT_X2 } else { config.x2 },
            y2: config.y2,
            min_velocity,
            high_velocity,
        }
    }

    pub fn min_velocity(&self) -> f32 {
        self.min_velocity
    }

    /// Animation properties for moving from `current` to `end` after a release at
    /// `velocity` px/s. `max_distance` is the full travel the curve is tuned for,
    /// usually the view height.
    pub fn apply(&self, current: f32, end: f32, velocity: f32, max_distance: f32) -> FlingProperties {
        let diff = (end - current).abs();
        let ratio = if max_distance > 0.0 { diff / max_distance } else { 1.0 };
        let max_length_seconds = self.max_length_seconds * ratio.sqrt();
        let vel_abs = velocity.abs();

        let velocity_factor = if self.speed_up_factor == 0.0 {
            1.0
        } else {
            (vel_abs / self.high_velocity).min(1.0)
        };
        let start_gradient = lerp(MIN_START_GRADIENT, self.y2 / self.x2, velocity_factor);
        let speed_up = self.speed_up_factor * (1.0 - velocity_factor);
        let slow_in = CubicBezier::new(speed_up, speed_up * start_gradient, self.x2, self.y2);

        let mut duration_seconds = start_gradient * diff / vel_abs;
        let interpolator = if duration_seconds <= max_length_seconds {
            Interpolator::Bezier(slow_in)
        } else if vel_abs >= self.min_velocity {
            // Too slow to land on time at this speed: keep the finger's speed at the start
            // and blend into the slow-in curve
            duration_seconds = max_length_seconds;
            Interpolator::VelocityCrossfade {
                velocity_scale: duration_seconds * vel_abs / diff,
                curve: slow_in,
            }
        } else {
            duration_seconds = max_length_seconds;
            Interpolator::FAST_OUT_SLOW_IN
        };

        FlingProperties {
            duration_ms: (duration_seconds * 1000.0) as u64,
            interpolator,
        }
    }
}

fn lerp(start: f32, stop: f32, amount: f32) -> f32 {
    start + (stop - start) * amount
}

/// The three curves the panel flings with
#[derive(Debug, Clone, Copy)]
pub struct FlingCurveLibrary {
    pub opening: FlingCurve,
    /// Cooperative close, the default when collapsing
    pub closing: FlingCurve,
    /// Flick-away close for hosts that ask for a dismissing animation
    pub dismissing: FlingCurve,
}

impl FlingCurveLibrary {
    pub fn from_config(config: &PanelConfig, density: f32) -> Self {
        let min = config.min_fling_velocity * density;
        let high = config.high_fling_velocity * density;
        Self {
            opening: FlingCurve::new(&config.opening, min, high),
            closing: FlingCurve::new(&config.closing, min, high),
            dismissing: FlingCurve::new(&config.dismissing, min, high),
        }
    }
}
