//! The panel: height state, fling curves and the animators that move it
//!
//! This module provides:
//! - `PanelController`, the expansion state machine driven by touches, frames and layouts
//! - `PanelHost` / `FalsingGate`, what the controller needs from the surrounding shell
//! - Fling curves and easing interpolators

mod animator;
mod controller;
mod fling;
mod host;
mod interpolator;

pub use animator::{AnimationKind, AnimationOutcome, AnimatorSnapshot, HeightAnimator};
pub use controller::{PanelController, PanelSnapshot, PanelState};
pub use fling::{FlingCurve, FlingCurveLibrary, FlingProperties};
pub use host::{DisplayMetrics, FalsingGate, InteractionType, NoFalsing, PanelEvent, PanelHost};
pub use interpolator::{CubicBezier, Interpolator};
