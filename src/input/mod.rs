//! Input handling - touch events, velocity, per-gesture sessions
//!
//! This module provides:
//! - Motion event types (multi-pointer, with screen-space raw coordinates)
//! - Velocity sampling for fling decisions
//! - The gesture session state machine

mod session;
mod touch;
mod velocity;

pub use session::*;
pub use touch::*;
pub use velocity::*;
