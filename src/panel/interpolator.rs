//! Easing curves used by the panel animators

/// Cubic Bezier easing through (0, 0), (x1, y1), (x2, y2), (1, 1)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicBezier {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl CubicBezier {
    pub const fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn transform(&self, fraction: f32) -> f32 {
        cubic_bezier(self.x1, self.y1, self.x2, self.y2, fraction)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Interpolator {
    Linear,
    Bezier(CubicBezier),
    /// Drops in and bounces a few times against the target
    Bounce,
    /// Starts at the finger's speed and hands over to `curve`.
    ///
    /// `velocity_scale` is `duration * velocity / distance`, the slope of a constant-velocity
    /// motion in normalized time. The two are blended with linear-out-slow-in as crossfader.
    VelocityCrossfade { velocity_scale: f32, curve: CubicBezier },
}

impl Interpolator {
    pub const FAST_OUT_SLOW_IN: Self = Self::Bezier(CubicBezier::new(0.4, 0.0, 0.2, 1.0));
    pub const LINEAR_OUT_SLOW_IN: Self = Self::Bezier(CubicBezier::new(0.0, 0.0, 0.2, 1.0));
    pub const FAST_OUT_LINEAR_IN: Self = Self::Bezier(CubicBezier::new(0.4, 0.0, 1.0, 1.0));
    /// Accelerated close used for a dismissal without velocity
    pub const PANEL_CLOSE_ACCELERATED: Self = Self::Bezier(CubicBezier::new(0.3, 0.0, 0.5, 1.0));

    /// Map a linear time fraction in [0, 1] to a progress fraction
    pub fn transform(&self, fraction: f32) -> f32 {
        let t = fraction.clamp(0.0, 1.0);
        match self {
            Interpolator::Linear => t,
            Interpolator::Bezier(curve) => curve.transform(t),
            Interpolator::Bounce => bounce(t),
            Interpolator::VelocityCrossfade { velocity_scale, curve } => {
                if t >= 1.0 {
                    return 1.0;
                }
                let crossfade = Self::LINEAR_OUT_SLOW_IN.transform(t);
                let linear = t * velocity_scale;
                (1.0 - crossfade) * linear + crossfade * curve.transform(t)
            }
        }
    }
}

/// Robert Penner's ease-out bounce
fn bounce(t: f32) -> f32 {
    const N: f32 = 7.5625;
    const D: f32 = 2.75;
    if t < 1.0 / D {
        N * t * t
    } else if t < 2.0 / D {
        let t = t - 1.5 / D;
        N * t * t + 0.75
    } else if t < 2.5 / D {
        let t = t - 2.25 / D;
        N * t * t + 0.9375
    } else {
        let t = t - 2.625 / D;
        N * t * t + 0.984375
    }
}

fn cubic_bezier(x1: f32, y1: f32, x2: f32, y2: f32, fraction: f32) -> f32 {
    if fraction <= 0.0 {
        return 0.0;
    }
    if fraction >= 1.0 {
        return 1.0;
    }

    let cx = 3.0 * x1;
    let bx = 3.0 * (x2 - x1) - cx;
    let ax = 1.0 - cx - bx;

    let cy = 3.0 * y1;
    let by = 3.0 * (y2 - y1) - cy;
    let ay = 1.0 - cy - by;

    fn sample_curve(a: f32, b: f32, c: f32, t: f32) -> f32 {
        ((a * t + b) * t + c) * t
    }

    fn sample_derivative(a: f32, b: f32, c: f32, t: f32) -> f32 {
        (3.0 * a * t + 2.0 * b) * t + c
    }

    // Newton-Raphson for the parametric t of the given x
    let mut t = fraction;
    let mut converged = false;
    for _ in 0..8 {
        let x = sample_curve(ax, bx, cx, t) - fraction;
        if x.abs() < 1e-6 {
            converged = true;
            break;
        }
        let dx = sample_derivative(ax, bx, cx, t);
        if dx.abs() < 1e-6 {
            break;
        }
        t = (t - x / dx).clamp(0.0, 1.0);
    }

    if !converged {
        // Bisection fallback
        let mut t0 = 0.0;
        let mut t1 = 1.0;
        t = fraction;
        for _ in 0..20 {
            let delta = sample_curve(ax, bx, cx, t) - fraction;
            if delta.abs() < 1e-6 {
                break;
            }
            if delta > 0.0 {
                t1 = t;
            } else {
                t0 = t;
            }
            t = 0.5 * (t0 + t1);
        }
    }

    sample_curve(ay, by, cy, t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints() {
        for interpolator in [
            Interpolator::Linear,
            Interpolator::FAST_OUT_SLOW_IN,
            Interpolator::PANEL_CLOSE_ACCELERATED,
            Interpolator::Bounce,
            Interpolator::VelocityCrossfade {
                velocity_scale: 1.3,
                curve: CubicBezier::new(0.0, 0.0, 0.35, 1.0),
            },
        ] {
            assert!(interpolator.transform(0.0).abs() < 1e-4, "{:?}", interpolator);
            assert!((interpolator.transform(1.0) - 1.0).abs() < 1e-4, "{:?}", interpolator);
        }
    }

    #[test]
    fn test_fast_out_slow_in_is_ahead_at_midpoint() {
        let v = Interpolator::FAST_OUT_SLOW_IN.transform(0.5);
        assert!(v > 0.5 && v < 1.0, "v = {}", v);
    }

    #[test]
    fn test_fast_out_linear_in_lags_early() {
        assert!(Interpolator::FAST_OUT_LINEAR_IN.transform(0.3) < 0.3);
    }

    #[test]
    fn test_bounce_touches_target_before_end() {
        // First impact at t = 1 / 2.75
        assert!((Interpolator::Bounce.transform(1.0 / 2.75) - 1.0).abs() < 1e-4);
        assert!(Interpolator::Bounce.transform(0.5) < 1.0);
    }

    #[test]
    fn test_velocity_crossfade_starts_at_finger_speed() {
        let interpolator = Interpolator::VelocityCrossfade {
            velocity_scale: 2.0,
            curve: CubicBezier::new(0.0, 0.0, 0.35, 1.0),
        };
        // Slope near zero follows the constant-velocity part
        let slope = interpolator.transform(0.001) / 0.001;
        assert!((slope - 2.0).abs() < 0.1, "slope = {}", slope);
    }

    #[test]
    fn test_input_is_clamped() {
        assert_eq!(Interpolator::Linear.transform(-1.0), 0.0);
        assert_eq!(Interpolator::Linear.transform(2.0), 1.0);
    }
}
