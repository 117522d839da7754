//! Panel configuration
//!
//! Loaded from a TOML file; every field has a default so a partial file (or none at all)
//! is fine. Distances are in density-independent pixels and get scaled by the host's
//! display density when the controller loads its dimensions.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PanelError, Result};

/// Tuning for one fling curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlingCurveConfig {
    /// Longest the animation may take for a full-viewport travel
    pub max_length_seconds: f32,
    /// How much a slow fling speeds up the start of the curve (0 = never)
    pub speed_up_factor: f32,
    /// Second Bezier control point; negative `x2` selects the default (0.35)
    #[serde(default = "default_x2")]
    pub x2: f32,
    #[serde(default = "default_y2")]
    pub y2: f32,
}

fn default_x2() -> f32 { -1.0 }
fn default_y2() -> f32 { 1.0 }

impl FlingCurveConfig {
    pub const fn new(max_length_seconds: f32, speed_up_factor: f32) -> Self {
        Self { max_length_seconds, speed_up_factor, x2: -1.0, y2: 1.0 }
    }

    pub const fn with_control_point(mut self, x2: f32, y2: f32) -> Self {
        self.x2 = x2;
        self.y2 = y2;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Movement before a touch counts as a drag (dp)
    pub touch_slop: f32,
    /// Slop multiplier when the platform flags the gesture as ambiguous
    pub ambiguous_gesture_multiplier: f32,
    /// Below this vector velocity the release uses the position rule (dp/s)
    pub min_fling_velocity: f32,
    /// Velocity at which fling curves stop speeding up (dp/s)
    pub high_fling_velocity: f32,
    /// How far the unlock hint nudges the panel (dp)
    pub hint_distance: f32,
    /// Upward travel needed before a lock screen swipe is trusted (dp)
    pub unlock_falsing_threshold: f32,
    /// Max rubber-band stretch beyond the max panel height (dp)
    pub max_over_expansion: f32,
    /// Fraction of the finger travel past max height that turns into stretch
    pub over_expansion_resistance: f32,
    pub initial_opening_peek_ms: u64,
    pub peek_animation_ms: u64,
    /// Touches held longer than this do not peek on release
    pub long_press_timeout_ms: u64,
    pub delayed_collapse_ms: u64,
    pub canned_expand_ms: u64,
    pub hint_phase1_ms: u64,
    pub hint_phase2_ms: u64,
    /// Whether the panel can be dragged at all
    pub drag_enabled: bool,
    pub opening: FlingCurveConfig,
    pub closing: FlingCurveConfig,
    pub dismissing: FlingCurveConfig,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            touch_slop: 8.0,
            ambiguous_gesture_multiplier: 2.0,
            min_fling_velocity: 250.0,
            high_fling_velocity: 3000.0,
            hint_distance: 100.0,
            unlock_falsing_threshold: 80.0,
            max_over_expansion: 120.0,
            over_expansion_resistance: 0.5,
            initial_opening_peek_ms: 200,
            peek_animation_ms: 360,
            long_press_timeout_ms: 400,
            delayed_collapse_ms: 120,
            canned_expand_ms: 350,
            hint_phase1_ms: 250,
            hint_phase2_ms: 450,
            drag_enabled: true,
            opening: FlingCurveConfig::new(0.6, 0.6),
            closing: FlingCurveConfig::new(0.5, 0.6),
            dismissing: FlingCurveConfig::new(0.5, 0.6).with_control_point(0.6, 0.84),
        }
    }
}

impl PanelConfig {
    /// Default config file location (~/.config/flick/panel.toml)
    pub fn default_path() -> Option<PathBuf> {
        std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
            .ok()
            .map(|dir| dir.join("flick/panel.toml"))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|source| PanelError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    /// Load config from file, or return default if missing or broken
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) else {
            return Self::default();
        };
        match Self::load(&path) {
            Ok(config) => {
                tracing::info!("Loaded panel config from {:?}", path);
                config
            }
            Err(PanelError::ConfigIo { .. }) => {
                tracing::info!("No panel config at {:?}, using defaults", path);
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Ignoring panel config {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("touch_slop", self.touch_slop),
            ("ambiguous_gesture_multiplier", self.ambiguous_gesture_multiplier),
            ("min_fling_velocity", self.min_fling_velocity),
            ("hint_distance", self.hint_distance),
            ("unlock_falsing_threshold", self.unlock_falsing_threshold),
            ("max_over_expansion", self.max_over_expansion),
            ("over_expansion_resistance", self.over_expansion_resistance),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(PanelError::InvalidConfig {
                    field,
                    reason: format!("expected a finite non-negative number, got {value}"),
                });
            }
        }
        if !(self.high_fling_velocity > self.min_fling_velocity) {
            return Err(PanelError::InvalidConfig {
                field: "high_fling_velocity",
                reason: format!(
                    "must be greater than min_fling_velocity ({} <= {})",
                    self.high_fling_velocity, self.min_fling_velocity
                ),
            });
        }
        for (field, curve) in [
            ("opening", &self.opening),
            ("closing", &self.closing),
            ("dismissing", &self.dismissing),
        ] {
            if !curve.max_length_seconds.is_finite() || curve.max_length_seconds <= 0.0 {
                return Err(PanelError::InvalidConfig {
                    field,
                    reason: "max_length_seconds must be positive".to_string(),
                });
            }
            if !curve.speed_up_factor.is_finite() || !(0.0..=1.0).contains(&curve.speed_up_factor) {
                return Err(PanelError::InvalidConfig {
                    field,
                    reason: "speed_up_factor must be within 0..=1".to_string(),
                });
            }
            // Negative x2 picks the default control point
            if curve.x2.is_nan() || (curve.x2 >= 0.0 && !(curve.x2 > 0.0 && curve.x2 <= 1.0)) {
                return Err(PanelError::InvalidConfig {
                    field,
                    reason: format!("x2 must be within (0, 1] or negative, got {}", curve.x2),
                });
            }
            if !curve.y2.is_finite() {
                return Err(PanelError::InvalidConfig {
                    field,
                    reason: format!("y2 must be finite, got {}", curve.y2),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PanelConfig::from_toml("touch_slop = 12.0\n[closing]\nmax_length_seconds = 0.4\nspeed_up_factor = 0.5\n").unwrap();
        assert_eq!(config.touch_slop, 12.0);
        assert_eq!(config.closing.max_length_seconds, 0.4);
        assert_eq!(config.closing.x2, -1.0);
        assert_eq!(config.hint_distance, PanelConfig::default().hint_distance);
    }

    #[test]
    fn test_dismissing_curve_has_control_point() {
        let config = PanelConfig::default();
        assert_eq!(config.dismissing.x2, 0.6);
        assert_eq!(config.dismissing.y2, 0.84);
    }

    #[test]
    fn test_rejects_negative_slop() {
        let err = PanelConfig::from_toml("touch_slop = -1.0").unwrap_err();
        assert!(matches!(err, PanelError::InvalidConfig { field: "touch_slop", .. }));
    }

    #[test]
    fn test_rejects_bad_velocity_range() {
        let err = PanelConfig::from_toml("min_fling_velocity = 500.0\nhigh_fling_velocity = 100.0").unwrap_err();
        assert!(matches!(err, PanelError::InvalidConfig { field: "high_fling_velocity", .. }));
    }

    #[test]
    fn test_rejects_degenerate_control_point() {
        let err = PanelConfig::from_toml("[opening]\nmax_length_seconds = 0.6\nspeed_up_factor = 0.6\nx2 = 0.0\n").unwrap_err();
        assert!(matches!(err, PanelError::InvalidConfig { field: "opening", .. }));

        let err = PanelConfig::from_toml("[closing]\nmax_length_seconds = 0.5\nspeed_up_factor = 0.6\nx2 = 1.5\n").unwrap_err();
        assert!(matches!(err, PanelError::InvalidConfig { field: "closing", .. }));

        let err = PanelConfig::from_toml("[dismissing]\nmax_length_seconds = 0.5\nspeed_up_factor = 0.6\ny2 = inf\n").unwrap_err();
        assert!(matches!(err, PanelError::InvalidConfig { field: "dismissing", .. }));

        let config = PanelConfig::from_toml("[closing]\nmax_length_seconds = 0.5\nspeed_up_factor = 0.6\nx2 = -1.0\n").unwrap();
        assert_eq!(config.closing.x2, -1.0);
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(PanelConfig::from_toml("touch_slop = \"wide\""), Err(PanelError::ConfigParse(_))));
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = PanelConfig::load_or_default(Some(Path::new("/nonexistent/flick/panel.toml")));
        assert_eq!(config, PanelConfig::default());
    }
}
