//! The boundary between the panel controller and the rest of the shell

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayMetrics {
    /// Pixels per density-independent pixel
    pub density: f32,
    pub width: f32,
    pub height: f32,
}

impl Default for DisplayMetrics {
    fn default() -> Self {
        Self { density: 1.0, width: 1080.0, height: 2340.0 }
    }
}

/// What the user is presumably trying to do, handed to the falsing classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    QuickSettings,
    Unlock,
    BouncerUnlock,
}

/// Accidental-touch classifier
pub trait FalsingGate {
    /// Unlocking is off globally; every release opens the panel
    fn is_unlocking_disabled(&self) -> bool;

    fn is_classifier_enabled(&self) -> bool;

    fn is_false_touch(&mut self, interaction: InteractionType) -> bool;
}

/// Gate that trusts every touch
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFalsing;

impl FalsingGate for NoFalsing {
    fn is_unlocking_disabled(&self) -> bool {
        false
    }

    fn is_classifier_enabled(&self) -> bool {
        false
    }

    fn is_false_touch(&mut self, _interaction: InteractionType) -> bool {
        false
    }
}

/// Everything the controller asks of the shell that owns the panel view.
///
/// Heights are in pixels. Only the panel geometry is required; the policy predicates
/// default to a plain, unlocked drawer.
pub trait PanelHost {
    /// Height of the fully expanded panel, may change between gestures
    fn max_panel_height(&self) -> f32;

    fn display_metrics(&self) -> DisplayMetrics;

    /// Height of the view the panel lives in; the travel fling curves are tuned for
    fn view_height(&self) -> f32 {
        self.display_metrics().height
    }

    /// Whether the panel window is visible to the user after a layout pass
    fn is_content_visible(&self) -> bool {
        true
    }

    fn is_in_content_bounds(&self, _x: f32, _y: f32) -> bool {
        true
    }

    /// Height the panel peeks to when a drag starts on a collapsed panel
    fn opening_height(&self) -> f32 {
        0.0
    }

    /// Height of the tap preview
    fn peek_height(&self) -> f32 {
        0.0
    }

    fn should_gesture_wait_for_touch_slop(&self) -> bool {
        true
    }

    fn should_gesture_ignore_x_touch_slop(&self, _x: f32, _y: f32) -> bool {
        false
    }

    /// False while content inside the panel could still scroll
    fn can_collapse_panel_on_touch(&self) -> bool {
        true
    }

    /// A conflicting gesture temporarily owns the panel height
    fn is_tracking_blocked(&self) -> bool {
        false
    }

    fn should_use_dismissing_animation(&self) -> bool {
        false
    }

    fn is_on_lock_screen(&self) -> bool {
        false
    }

    fn can_dismiss_lock_screen(&self) -> bool {
        true
    }

    fn has_pinned_heads_up(&self) -> bool {
        false
    }

    fn is_bouncer_showing(&self) -> bool {
        false
    }

    fn is_keyguard_fading_away(&self) -> bool {
        false
    }

    fn is_falsing_threshold_needed(&self) -> bool {
        false
    }

    fn is_wake_up_coming_from_touch(&self) -> bool {
        false
    }

    fn is_panel_visible_because_of_heads_up(&self) -> bool {
        false
    }

    /// Click on the empty area of the panel. Returns whether the panel ends up expanded.
    fn on_middle_clicked(&mut self) -> bool {
        false
    }
}

/// Notifications for the host, drained with `PanelController::take_events`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PanelEvent {
    ExpansionChanged { fraction: f32, expanded: bool, tracking: bool },
    TrackingStarted,
    TrackingStopped { expand: bool },
    ExpandingStarted,
    ExpandingFinished,
    ClosingFinished,
    UnlockHintStarted,
    UnlockHintFinished,
    /// The controller waits for a layout pass (`on_layout`)
    LayoutRequested,
}
