//! Flick panel - drag, fling and peek handling for the pull-down panel
//!
//! The controller is host-agnostic: the shell implements `PanelHost`, feeds it
//! `MotionEvent`s, calls `on_frame` every display frame and `on_layout` after layout,
//! and drains `PanelEvent`s to update its views.

pub mod config;
pub mod demo;
pub mod error;
pub mod input;
pub mod panel;

pub use config::{FlingCurveConfig, PanelConfig};
pub use error::{PanelError, Result};
pub use input::{MotionAction, MotionEvent, Pointer, VelocitySampler};
pub use panel::{FalsingGate, NoFalsing, PanelController, PanelEvent, PanelHost, PanelSnapshot, PanelState};
