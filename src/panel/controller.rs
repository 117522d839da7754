//! Panel expansion controller
//!
//! Owns the panel height and decides who drives it: the finger, a fling/hint animator,
//! or the peek animator. Only one of them writes the height at any time; starting one
//! cancels the others.
//!
//! Time is injected. Touch events carry their own timestamps and the host calls
//! `on_frame` once per display frame and `on_layout` after every layout pass. Nothing is
//! delivered through callbacks: the host drains `PanelEvent`s with `take_events`.
//!
//! Routing follows the usual intercept/touch split. The host offers events to
//! `on_intercept_touch_event` while a child of the panel has the gesture; once that
//! returns true (or when no child wants the touch) events go to `on_touch_event`.

use std::fmt;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::PanelConfig;
use crate::input::{
    Classification, DownSnapshot, GestureSession, InputSource, MotionAction, MotionEvent, Pointer,
    VelocitySampler,
};

use super::animator::{AnimationKind, AnimationOutcome, AnimatorSnapshot, HeightAnimator};
use super::fling::{FlingCurveLibrary, FlingProperties};
use super::host::{FalsingGate, InteractionType, PanelEvent, PanelHost};
use super::interpolator::Interpolator;

/// Below this a closing panel snaps shut instead of crawling through the curve tail
const NEAR_ZERO_HEIGHT: f32 = 1.0;

/// Falsing threshold multiplier when the device was woken by this touch
const WAKE_FROM_TOUCH_FALSING_FACTOR: f32 = 1.5;

/// Dismissal without velocity: base duration plus a share proportional to the height
const DISMISS_BASE_MS: f32 = 200.0;
const DISMISS_HEIGHT_MS: f32 = 100.0;

/// Externally visible state, derived from the controller's flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelState {
    Collapsed,
    Peeking,
    Tracking,
    Expanding,
    Expanded,
    Closing,
    Hinting,
}

/// Debug view of the controller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelSnapshot {
    pub state: PanelState,
    pub expanded_height: f32,
    pub max_panel_height: f32,
    pub expanded_fraction: f32,
    pub over_expansion: f32,
    pub closing: bool,
    pub tracking: bool,
    pub expanding: bool,
    pub just_peeked: bool,
    pub hint_running: bool,
    pub instant_expanding: bool,
    pub touch_disabled: bool,
    pub peek_animator: Option<AnimatorSnapshot>,
    pub height_animator: Option<AnimatorSnapshot>,
}

impl fmt::Display for PanelSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |b: bool| if b { "T" } else { "f" };
        write!(
            f,
            "[Panel: expandedHeight={:.1} maxPanelHeight={:.1} closing={} tracking={} justPeeked={} peekAnim={} heightAnim={} touchDisabled={}]",
            self.expanded_height,
            self.max_panel_height,
            flag(self.closing),
            flag(self.tracking),
            flag(self.just_peeked),
            flag(self.peek_animator.is_some()),
            flag(self.height_animator.is_some()),
            flag(self.touch_disabled),
        )
    }
}

/// Work queued for a later frame
#[derive(Debug, Clone, Copy, PartialEq)]
enum Deferred {
    /// Collapse after a peek (or a long hold on a collapsed panel)
    PostCollapse,
    /// Delayed `collapse`
    FlingCollapse { speed_up: f32 },
}

/// Config distances converted to pixels
#[derive(Debug, Clone, Copy)]
struct Dimens {
    touch_slop: f32,
    slop_multiplier: f32,
    hint_distance: f32,
    unlock_falsing_threshold: f32,
    max_over_expansion: f32,
}

impl Dimens {
    fn load(config: &PanelConfig, density: f32) -> Self {
        Self {
            touch_slop: config.touch_slop * density,
            slop_multiplier: config.ambiguous_gesture_multiplier,
            hint_distance: config.hint_distance * density,
            unlock_falsing_threshold: config.unlock_falsing_threshold * density,
            max_over_expansion: config.max_over_expansion * density,
        }
    }
}

pub struct PanelController<H, F> {
    host: H,
    falsing: F,
    config: PanelConfig,
    dimens: Dimens,
    curves: FlingCurveLibrary,

    expanded_height: f32,
    expanded_fraction: f32,
    /// Rubber-band stretch beyond the max height, in pixels
    over_expansion: f32,
    over_expanded_before_fling: bool,
    peek_height: f32,

    closing: bool,
    expanding: bool,
    /// `expand` is waiting for a layout pass
    instant_expanding: bool,
    animate_after_expanding: bool,
    hint_running: bool,
    touch_disabled: bool,
    drag_enabled: bool,
    launching_notification: bool,
    motion_aborted: bool,
    gesture_wait_for_touch_slop: bool,

    height_anim: Option<HeightAnimator>,
    peek_anim: Option<HeightAnimator>,
    panel_update_when_animator_ends: bool,
    fixed_duration_ms: Option<u64>,
    /// Release velocity to replay once the first layout lands
    update_fling_on_layout: Option<f32>,

    session: Option<GestureSession>,
    velocity: VelocitySampler,

    deferred: Vec<(u64, Deferred)>,
    now_ms: u64,

    events: Vec<PanelEvent>,
    last_expansion: Option<PanelEvent>,
}

impl<H: PanelHost, F: FalsingGate> PanelController<H, F> {
    pub fn new(host: H, falsing: F, config: PanelConfig) -> Self {
        let density = density_of(&host);
        let dimens = Dimens::load(&config, density);
        let curves = FlingCurveLibrary::from_config(&config, density);
        info!("Panel controller created (density {}, max height {})", density, host.max_panel_height());
        Self {
            host,
            falsing,
            drag_enabled: config.drag_enabled,
            config,
            dimens,
            curves,
            expanded_height: 0.0,
            expanded_fraction: 0.0,
            over_expansion: 0.0,
            over_expanded_before_fling: false,
            peek_height: 0.0,
            closing: false,
            expanding: false,
            instant_expanding: false,
            animate_after_expanding: false,
            hint_running: false,
            touch_disabled: false,
            launching_notification: false,
            motion_aborted: false,
            gesture_wait_for_touch_slop: true,
            height_anim: None,
            peek_anim: None,
            panel_update_when_animator_ends: false,
            fixed_duration_ms: None,
            update_fling_on_layout: None,
            session: None,
            velocity: VelocitySampler::new(),
            deferred: Vec::new(),
            now_ms: 0,
            events: Vec::new(),
            last_expansion: None,
        }
    }

    // ---- accessors ----

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn falsing_mut(&mut self) -> &mut F {
        &mut self.falsing
    }

    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn expanded_height(&self) -> f32 {
        self.expanded_height
    }

    pub fn expanded_fraction(&self) -> f32 {
        self.expanded_fraction
    }

    pub fn over_expansion(&self) -> f32 {
        self.over_expansion
    }

    /// Host max height, sanitized
    pub fn max_panel_height(&self) -> f32 {
        let max = self.host.max_panel_height();
        if max.is_finite() && max > 0.0 {
            max
        } else {
            0.0
        }
    }

    pub fn is_fully_expanded(&self) -> bool {
        self.expanded_height >= self.max_panel_height()
    }

    pub fn is_fully_collapsed(&self) -> bool {
        self.expanded_fraction <= 0.0
    }

    pub fn is_collapsing(&self) -> bool {
        self.closing || self.launching_notification
    }

    pub fn is_closing(&self) -> bool {
        self.closing
    }

    pub fn is_tracking(&self) -> bool {
        self.session.as_ref().is_some_and(GestureSession::is_tracking)
    }

    pub fn is_expanding(&self) -> bool {
        self.expanding
    }

    pub fn is_instant_expanding(&self) -> bool {
        self.instant_expanding
    }

    pub fn is_unlock_hint_running(&self) -> bool {
        self.hint_running
    }

    pub fn is_touch_disabled(&self) -> bool {
        self.touch_disabled
    }

    pub fn is_drag_enabled(&self) -> bool {
        self.drag_enabled
    }

    /// Whether frames are still needed
    pub fn is_animating(&self) -> bool {
        self.height_anim.is_some() || self.peek_anim.is_some() || !self.deferred.is_empty()
    }

    pub fn state(&self) -> PanelState {
        let fling = self.height_anim.as_ref().map(HeightAnimator::kind);
        if self.hint_running {
            PanelState::Hinting
        } else if self.is_tracking() {
            PanelState::Tracking
        } else if self.peek_anim.is_some() {
            PanelState::Peeking
        } else if self.closing || fling == Some(AnimationKind::Fling { expand: false }) {
            PanelState::Closing
        } else if self.instant_expanding || fling == Some(AnimationKind::Fling { expand: true }) {
            PanelState::Expanding
        } else if self.is_fully_collapsed() {
            PanelState::Collapsed
        } else {
            PanelState::Expanded
        }
    }

    pub fn dump(&self) -> PanelSnapshot {
        PanelSnapshot {
            state: self.state(),
            expanded_height: self.expanded_height,
            max_panel_height: self.max_panel_height(),
            expanded_fraction: self.expanded_fraction,
            over_expansion: self.over_expansion,
            closing: self.closing,
            tracking: self.is_tracking(),
            expanding: self.expanding,
            just_peeked: self.session.as_ref().is_some_and(|s| s.just_peeked),
            hint_running: self.hint_running,
            instant_expanding: self.instant_expanding,
            touch_disabled: self.touch_disabled,
            peek_animator: self.peek_anim.as_ref().map(HeightAnimator::snapshot),
            height_animator: self.height_anim.as_ref().map(HeightAnimator::snapshot),
        }
    }

    /// Drain pending notifications
    pub fn take_events(&mut self) -> Vec<PanelEvent> {
        std::mem::take(&mut self.events)
    }

    // ---- configuration ----

    /// Reload density-scaled dimensions, e.g. after a display change
    pub fn on_configuration_changed(&mut self) {
        let density = density_of(&self.host);
        self.dimens = Dimens::load(&self.config, density);
        self.curves = FlingCurveLibrary::from_config(&self.config, density);
        debug!("Reloaded panel dimensions at density {}", density);
    }

    pub fn set_config(&mut self, config: PanelConfig) {
        self.drag_enabled = config.drag_enabled;
        self.config = config;
        self.on_configuration_changed();
    }

    pub fn set_touch_and_animation_disabled(&mut self, disabled: bool) {
        self.touch_disabled = disabled;
        if disabled {
            self.cancel_height_animator();
            if self.is_tracking() {
                self.on_tracking_stopped(true);
            }
            self.notify_expanding_finished();
        }
    }

    pub fn set_drag_enabled(&mut self, enabled: bool) {
        self.drag_enabled = enabled;
        if !enabled && self.is_tracking() {
            // Otherwise the panel can get stuck half open
            self.on_tracking_stopped(true);
        }
    }

    pub fn set_launching_notification(&mut self, launching: bool) {
        self.launching_notification = launching;
    }

    // ---- height ----

    pub fn set_expanded_height(&mut self, height: f32) {
        debug!("set_expanded_height({:.1})", height);
        self.set_expanded_height_internal(height);
    }

    pub fn set_expanded_fraction(&mut self, fraction: f32) {
        self.set_expanded_height(self.max_panel_height() * fraction);
    }

    fn set_expanded_height_internal(&mut self, height: f32) {
        if height.is_nan() {
            error!("Expanded height set to NaN, keeping {:.1}", self.expanded_height);
            return;
        }
        let max = self.max_panel_height();
        if self.height_anim.is_none() {
            self.over_expansion = if self.is_tracking() {
                ((height - max).max(0.0) * self.config.over_expansion_resistance)
                    .min(self.dimens.max_over_expansion)
            } else {
                0.0
            };
            self.expanded_height = height.min(max) + self.over_expansion;
        } else {
            self.expanded_height = height;
            if self.over_expanded_before_fling {
                self.over_expansion = (height - max).max(0.0);
            }
        }
        self.expanded_height = self.expanded_height.clamp(0.0, max + self.over_expansion);

        let mut end_animation = false;
        if self.expanded_height < NEAR_ZERO_HEIGHT && self.expanded_height != 0.0 && self.closing {
            self.expanded_height = 0.0;
            end_animation = self.height_anim.is_some();
        }

        self.expanded_fraction = if max <= 0.0 {
            0.0
        } else {
            (self.expanded_height / max).clamp(0.0, 1.0)
        };
        self.notify_expansion_changed();

        if end_animation {
            if let Some(anim) = self.height_anim.take() {
                self.finish_height_animation(anim, AnimationOutcome::Completed);
            }
        }
    }

    /// Snap to a changed max height unless something else owns the height right now
    pub fn request_panel_height_update(&mut self) {
        let max = self.max_panel_height();
        if self.is_fully_collapsed() || max == self.expanded_height {
            return;
        }
        let peek_touching = self.session.as_ref().is_some_and(|s| s.peek_touching);
        if self.peek_anim.is_some() || peek_touching {
            return;
        }
        if self.is_tracking() && !self.host.is_tracking_blocked() {
            return;
        }
        if self.height_anim.is_some() {
            self.panel_update_when_animator_ends = true;
            return;
        }
        self.set_expanded_height(max);
    }

    fn settle_over_expansion(&mut self) {
        let max = self.max_panel_height();
        self.over_expansion = 0.0;
        self.expanded_height = self.expanded_height.min(max);
        self.expanded_fraction = if max <= 0.0 { 0.0 } else { (self.expanded_height / max).clamp(0.0, 1.0) };
        self.notify_expansion_changed();
    }

    // ---- frame and layout ----

    /// Advance deferred work and animators to `now_ms`. Returns whether more frames are needed.
    pub fn on_frame(&mut self, now_ms: u64) -> bool {
        self.advance_clock(now_ms);
        self.run_deferred();

        let now = self.now_ms;
        if let Some((value, done)) = self.peek_anim.as_mut().map(|anim| anim.sample(now)) {
            self.set_expanded_height_internal(value);
            if done {
                if let Some(anim) = self.peek_anim.take() {
                    self.finish_peek(anim, AnimationOutcome::Completed);
                }
            }
        }

        if let Some((value, done)) = self.height_anim.as_mut().map(|anim| anim.sample(now)) {
            self.set_expanded_height_internal(value);
            // The near-zero snap may already have ended the run
            if done {
                if let Some(anim) = self.height_anim.take() {
                    self.finish_height_animation(anim, AnimationOutcome::Completed);
                }
            }
        }

        self.is_animating()
    }

    /// A layout pass finished
    pub fn on_layout(&mut self) {
        self.request_panel_height_update();
        if let Some(session) = self.session.as_mut() {
            session.has_layouted_since_down = true;
        }
        if let Some(velocity) = self.update_fling_on_layout.take() {
            debug!("Replaying fling at {:.0} px/s after layout", velocity);
            self.abort_animations();
            self.fling_with(velocity, true, 1.0, false);
        }
        if self.instant_expanding && self.host.is_content_visible() {
            if self.animate_after_expanding {
                self.notify_expanding_started();
                self.fling_with(0.0, true, 1.0, false);
            } else {
                self.set_expanded_fraction(1.0);
            }
            self.instant_expanding = false;
            self.notify_expansion_changed();
        }
    }

    fn advance_clock(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
    }

    fn schedule(&mut self, at_ms: u64, task: Deferred) {
        self.deferred.push((at_ms, task));
    }

    fn run_deferred(&mut self) {
        let now = self.now_ms;
        let (due, pending): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.deferred).into_iter().partition(|(at, _)| *at <= now);
        self.deferred = pending;
        for (_, task) in due {
            match task {
                Deferred::PostCollapse => self.collapse(false, 1.0),
                // A finger that grabbed the panel since owns the height
                Deferred::FlingCollapse { .. } if self.is_tracking() => {
                    debug!("Dropping delayed collapse, panel is tracking");
                }
                Deferred::FlingCollapse { speed_up } => self.fling_with(0.0, false, speed_up, false),
            }
        }
    }

    // ---- programmatic open/close ----

    /// Open the panel once the next layout pass reports the content visible
    pub fn expand(&mut self, animate: bool) {
        if !self.is_fully_collapsed() && !self.is_collapsing() {
            return;
        }
        info!("Expanding panel (animate: {})", animate);
        self.instant_expanding = true;
        self.animate_after_expanding = animate;
        self.update_fling_on_layout = None;
        self.abort_animations();
        self.cancel_peek();
        if self.is_tracking() {
            self.on_tracking_stopped(true);
        }
        if self.expanding {
            self.notify_expanding_finished();
        }
        self.notify_expansion_changed();
        self.emit(PanelEvent::LayoutRequested);
    }

    pub fn can_panel_be_collapsed(&self) -> bool {
        !self.is_fully_collapsed() && !self.is_tracking() && !self.closing
    }

    pub fn collapse(&mut self, delayed: bool, speed_up: f32) {
        if !self.can_panel_be_collapsed() {
            debug!("Ignoring collapse request in state {:?}", self.state());
            return;
        }
        info!("Collapsing panel (delayed: {}, speed up: {})", delayed, speed_up);
        self.cancel_height_animator();
        self.notify_expanding_started();
        // After notify_expanding_started, which ends any previous close
        self.closing = true;
        if delayed {
            let at = self.now_ms + self.config.delayed_collapse_ms;
            self.schedule(at, Deferred::FlingCollapse { speed_up });
        } else {
            self.fling_with(0.0, false, speed_up, false);
        }
    }

    /// Collapse once with a fixed animation length
    pub fn collapse_with_duration(&mut self, duration_ms: u64) {
        self.fixed_duration_ms = Some(duration_ms);
        self.collapse(false, 1.0);
        self.fixed_duration_ms = None;
    }

    pub fn instant_collapse(&mut self) {
        info!("Instant collapse");
        self.abort_animations();
        self.set_expanded_fraction(0.0);
        if self.expanding {
            self.notify_expanding_finished();
        }
        if self.instant_expanding {
            self.instant_expanding = false;
            self.notify_expansion_changed();
        }
    }

    fn abort_animations(&mut self) {
        self.cancel_peek();
        self.cancel_height_animator();
        self.deferred.clear();
    }

    // ---- flinging ----

    /// Whether a release with vertical velocity `vy` and vector speed `speed` at (x, y)
    /// should open the panel
    pub fn fling_expands(&mut self, vy: f32, speed: f32, x: f32, y: f32) -> bool {
        if self.falsing.is_unlocking_disabled() {
            return true;
        }
        let interaction = self.interaction_type(vy);
        if self.is_false_touch(x, y, interaction) {
            return true;
        }
        if speed.abs() < self.curves.opening.min_velocity() {
            self.expanded_fraction > 0.5
        } else {
            vy > 0.0
        }
    }

    fn interaction_type(&self, vy: f32) -> InteractionType {
        if vy > 0.0 {
            InteractionType::QuickSettings
        } else if self.host.can_dismiss_lock_screen() {
            InteractionType::Unlock
        } else {
            InteractionType::BouncerUnlock
        }
    }

    fn is_false_touch(&mut self, x: f32, y: f32, interaction: InteractionType) -> bool {
        if !self.host.is_falsing_threshold_needed() {
            return false;
        }
        if self.falsing.is_classifier_enabled() {
            return self.falsing.is_false_touch(interaction);
        }
        let Some(session) = self.session.as_ref() else {
            return true;
        };
        if !session.touch_above_falsing_threshold {
            return true;
        }
        if session.upwards_when_threshold_reached {
            return false;
        }
        !session.is_direction_upwards(x, y)
    }

    fn falsing_threshold(&self) -> f32 {
        let factor = if self.host.is_wake_up_coming_from_touch() {
            WAKE_FROM_TOUCH_FALSING_FACTOR
        } else {
            1.0
        };
        self.dimens.unlock_falsing_threshold * factor
    }

    /// Animate fully open or closed, continuing `velocity` px/s
    pub fn fling(&mut self, velocity: f32, expand: bool) {
        self.fling_with(velocity, expand, 1.0, false);
    }

    fn fling_with(&mut self, velocity: f32, expand: bool, collapse_speed_up: f32, expand_because_of_falsing: bool) {
        self.cancel_peek();
        // End the old run first; its terminal path may clear `closing`
        if let Some(anim) = self.height_anim.take() {
            self.panel_update_when_animator_ends = false;
            self.finish_height_animation(anim, AnimationOutcome::Cancelled);
        }
        let target = if expand { self.max_panel_height() } else { 0.0 };
        if !expand {
            self.closing = true;
        }
        self.fling_to_height(velocity, expand, target, collapse_speed_up, expand_because_of_falsing);
    }

    pub fn fling_to_height(
        &mut self,
        velocity: f32,
        expand: bool,
        target: f32,
        collapse_speed_up: f32,
        expand_because_of_falsing: bool,
    ) {
        if target.is_nan() || velocity.is_nan() {
            error!("Ignoring fling with NaN target {} / velocity {}", target, velocity);
            return;
        }
        if let Some(anim) = self.height_anim.take() {
            self.finish_height_animation(anim, AnimationOutcome::Cancelled);
        }
        let over_expanded = self.over_expansion > 0.0;
        if target == self.expanded_height || (over_expanded && expand) {
            if over_expanded && expand {
                self.settle_over_expansion();
            }
            self.notify_expanding_finished();
            return;
        }
        self.over_expanded_before_fling = over_expanded;

        let current = self.expanded_height;
        let view_height = self.host.view_height();
        let mut velocity = velocity;
        let props = if expand {
            if expand_because_of_falsing && velocity < 0.0 {
                velocity = 0.0;
            }
            let mut props = self.curves.opening.apply(current, target, velocity, view_height);
            if velocity == 0.0 {
                props.duration_ms = self.config.canned_expand_ms;
            }
            props
        } else {
            let mut props = if self.host.should_use_dismissing_animation() {
                if velocity == 0.0 {
                    let share = if view_height > 0.0 { current / view_height } else { 0.0 };
                    FlingProperties {
                        duration_ms: (DISMISS_BASE_MS + share * DISMISS_HEIGHT_MS) as u64,
                        interpolator: Interpolator::PANEL_CLOSE_ACCELERATED,
                    }
                } else {
                    self.curves.dismissing.apply(current, target, velocity, view_height)
                }
            } else {
                self.curves.closing.apply(current, target, velocity, view_height)
            };
            // Canned close: shorter when sped up
            if velocity == 0.0 {
                let speed_up = if collapse_speed_up.is_finite() && collapse_speed_up > 0.0 {
                    collapse_speed_up
                } else {
                    warn!("Invalid collapse speed-up factor {}, using 1.0", collapse_speed_up);
                    1.0
                };
                props.duration_ms = (props.duration_ms as f32 / speed_up) as u64;
            }
            if let Some(fixed) = self.fixed_duration_ms {
                props.duration_ms = fixed;
            }
            props
        };

        debug!(
            "Fling {} {:.1} -> {:.1} at {:.0} px/s over {} ms",
            if expand { "open" } else { "close" },
            current,
            target,
            velocity,
            props.duration_ms
        );
        self.height_anim = Some(HeightAnimator::new(
            AnimationKind::Fling { expand },
            current,
            target,
            self.now_ms,
            props.duration_ms,
            props.interpolator,
        ));
        self.notify_expansion_changed();
    }

    // ---- animator lifecycle ----

    /// Stop the running height animation. `closing` is cleared before anything is emitted.
    pub fn cancel_height_animator(&mut self) {
        let was_closing = std::mem::replace(&mut self.closing, false);
        if let Some(anim) = self.height_anim.take() {
            self.panel_update_when_animator_ends = false;
            self.finish_height_animation(anim, AnimationOutcome::Cancelled);
        }
        if was_closing {
            self.emit(PanelEvent::ClosingFinished);
        }
    }

    /// Terminal path of a height animator run; the animator has already been taken
    fn finish_height_animation(&mut self, anim: HeightAnimator, outcome: AnimationOutcome) {
        debug!("Height animation {:?} ended: {:?}", anim.kind(), outcome);
        match (anim.kind(), outcome) {
            (AnimationKind::HintPhase1 { origin }, AnimationOutcome::Completed) => {
                self.start_unlock_hint_phase2(origin);
            }
            (AnimationKind::HintPhase1 { .. }, AnimationOutcome::Cancelled) | (AnimationKind::HintPhase2, _) => {
                self.release_height_animator();
                self.finish_unlock_hint();
                self.notify_expansion_changed();
            }
            (AnimationKind::Fling { .. } | AnimationKind::Peek { .. }, outcome) => {
                self.release_height_animator();
                if outcome == AnimationOutcome::Completed {
                    self.notify_expanding_finished();
                }
                self.notify_expansion_changed();
            }
        }
    }

    fn release_height_animator(&mut self) {
        self.over_expanded_before_fling = false;
        if self.panel_update_when_animator_ends {
            self.panel_update_when_animator_ends = false;
            self.request_panel_height_update();
        }
    }

    /// Mark the panel as expanding, e.g. before a host-driven `fling_to_height`
    pub fn notify_expanding_started(&mut self) {
        if !self.expanding {
            self.expanding = true;
            self.emit(PanelEvent::ExpandingStarted);
        }
    }

    /// Ends closing and expanding; emits `ExpandingFinished` only if expanding was set
    pub fn notify_expanding_finished(&mut self) {
        self.end_closing();
        if self.expanding {
            self.expanding = false;
            self.emit(PanelEvent::ExpandingFinished);
        }
    }

    fn end_closing(&mut self) {
        if self.closing {
            self.closing = false;
            self.emit(PanelEvent::ClosingFinished);
        }
    }

    // ---- peek ----

    fn run_peek_animation(&mut self, duration_ms: u64, peek_height: f32, collapse_when_finished: bool) {
        self.peek_height = peek_height;
        debug!("Peek to height {:.1}", peek_height);
        if self.height_anim.is_some() {
            return;
        }
        self.cancel_peek_animator();
        self.peek_anim = Some(HeightAnimator::new(
            AnimationKind::Peek { collapse_when_finished },
            self.expanded_height,
            peek_height,
            self.now_ms,
            duration_ms,
            Interpolator::LINEAR_OUT_SLOW_IN,
        ));
        self.notify_expanding_started();
        if let Some(session) = self.session.as_mut() {
            session.just_peeked = true;
        }
    }

    /// Peek to the opening height as a drag starts on a collapsed panel
    fn start_opening(&mut self) {
        self.run_peek_animation(self.config.initial_opening_peek_ms, self.host.opening_height(), false);
        self.notify_expansion_changed();
    }

    fn finish_peek(&mut self, anim: HeightAnimator, outcome: AnimationOutcome) {
        debug!("Peek ended: {:?}", outcome);
        if let (AnimationKind::Peek { collapse_when_finished: true }, AnimationOutcome::Completed) =
            (anim.kind(), outcome)
        {
            self.schedule(self.now_ms, Deferred::PostCollapse);
        }
    }

    fn cancel_peek_animator(&mut self) {
        if let Some(anim) = self.peek_anim.take() {
            self.finish_peek(anim, AnimationOutcome::Cancelled);
        }
    }

    pub fn cancel_peek(&mut self) {
        if let Some(anim) = self.peek_anim.take() {
            self.finish_peek(anim, AnimationOutcome::Cancelled);
            // The peek already reported the panel as expanded
            self.notify_expansion_changed();
        }
    }

    // ---- unlock hint ----

    /// Nudge the panel by the hint distance and bounce it back
    pub fn start_unlock_hint_animation(&mut self) {
        if self.height_anim.is_some() || self.is_tracking() || self.closing {
            return;
        }
        info!("Starting unlock hint");
        self.cancel_peek();
        self.notify_expanding_started();
        let origin = self.expanded_height;
        let target = (self.max_panel_height() - self.dimens.hint_distance).max(0.0);
        self.height_anim = Some(HeightAnimator::new(
            AnimationKind::HintPhase1 { origin },
            origin,
            target,
            self.now_ms,
            self.config.hint_phase1_ms,
            Interpolator::FAST_OUT_SLOW_IN,
        ));
        self.emit(PanelEvent::UnlockHintStarted);
        self.hint_running = true;
    }

    fn start_unlock_hint_phase2(&mut self, origin: f32) {
        self.height_anim = Some(HeightAnimator::new(
            AnimationKind::HintPhase2,
            self.expanded_height,
            origin,
            self.now_ms,
            self.config.hint_phase2_ms,
            Interpolator::Bounce,
        ));
    }

    fn finish_unlock_hint(&mut self) {
        self.notify_expanding_finished();
        self.emit(PanelEvent::UnlockHintFinished);
        self.hint_running = false;
    }

    // ---- touch ----

    /// Offered events while a child owns the gesture. Returns true to steal it.
    pub fn on_intercept_touch_event(&mut self, event: &MotionEvent) -> bool {
        self.advance_clock(event.time_ms);
        if self.instant_expanding
            || !self.drag_enabled
            || self.touch_disabled
            || (self.motion_aborted && event.action != MotionAction::Down)
        {
            return false;
        }
        let Some(pointer) = self.resolve_pointer(event) else {
            warn!("Intercepted {:?} without pointers", event.action);
            return false;
        };

        match event.action {
            MotionAction::Down => {
                let animating_on_down = self.height_anim.is_some();
                if (animating_on_down && self.closing && !self.hint_running) || self.peek_anim.is_some() {
                    // Grab the panel mid-animation
                    self.cancel_height_animator();
                    self.cancel_peek();
                    self.begin_session(event, &pointer);
                    if let Some(session) = self.session.as_mut() {
                        session.snapshot.animating_on_down = animating_on_down;
                        session.mark_slop_exceeded();
                    }
                    return true;
                }
                self.begin_session(event, &pointer);
            }
            MotionAction::PointerUp => self.pointer_up(event, false),
            MotionAction::PointerDown => {
                if self.host.is_on_lock_screen() {
                    self.motion_aborted = true;
                    self.velocity.reset();
                }
            }
            MotionAction::Move => {
                self.add_movement(event.time_ms, &pointer);
                let can_collapse = self.host.can_collapse_panel_on_touch();
                let slop = self.touch_slop(event);
                let Some(session) = self.session.as_ref() else {
                    return false;
                };
                let snapshot = session.snapshot;
                let h = session.drag_distance(pointer.y);
                let dx = (pointer.x - session.initial_x).abs();
                if can_collapse || snapshot.touch_started_in_empty_area || snapshot.animating_on_down {
                    let h_abs = h.abs();
                    if (h < -slop || (snapshot.animating_on_down && h_abs > slop)) && h_abs > dx {
                        self.cancel_height_animator();
                        self.start_expand_motion(pointer.x, pointer.y, true, self.expanded_height);
                        return true;
                    }
                }
            }
            MotionAction::Up | MotionAction::Cancel => {
                self.velocity.reset();
                if !self.is_tracking() {
                    self.session = None;
                }
            }
        }
        false
    }

    /// Touch events for the panel itself. Returns whether the panel consumed the event.
    pub fn on_touch_event(&mut self, event: &MotionEvent) -> bool {
        self.advance_clock(event.time_ms);
        if self.instant_expanding
            || (self.touch_disabled && event.action != MotionAction::Cancel)
            || (self.motion_aborted && event.action != MotionAction::Down)
        {
            return false;
        }

        if !self.drag_enabled {
            if self.is_tracking() {
                self.on_tracking_stopped(true);
            }
            return false;
        }

        // A mouse click opens a collapsed panel instead of dragging it
        if self.is_fully_collapsed() && event.source == InputSource::Mouse {
            if event.action == MotionAction::Up {
                self.expand(true);
            }
            return true;
        }

        let Some(pointer) = self.resolve_pointer(event) else {
            warn!("Touch {:?} without pointers", event.action);
            return false;
        };

        match event.action {
            MotionAction::Down => self.touch_down(event, pointer),
            MotionAction::PointerUp => self.pointer_up(event, true),
            MotionAction::PointerDown => {
                if self.host.is_on_lock_screen() {
                    debug!("Second pointer on the lock screen, aborting motion");
                    self.motion_aborted = true;
                    self.end_motion(event, pointer.x, pointer.y, true);
                    return false;
                }
            }
            MotionAction::Move => self.touch_move(event, pointer),
            MotionAction::Up | MotionAction::Cancel => {
                self.add_movement(event.time_ms, &pointer);
                self.end_motion(event, pointer.x, pointer.y, false);
            }
        }

        !self.gesture_wait_for_touch_slop || self.is_tracking()
    }

    /// Pointer the session follows; unknown ids fall back to index 0
    fn resolve_pointer(&mut self, event: &MotionEvent) -> Option<Pointer> {
        let tracked = self.session.as_ref().map(|s| s.tracking_pointer);
        if let Some(index) = tracked.and_then(|id| event.find_pointer_index(id)) {
            return event.pointer(index).copied();
        }
        let pointer = event.pointer(0).copied()?;
        if let Some(session) = self.session.as_mut() {
            session.tracking_pointer = pointer.id;
        }
        Some(pointer)
    }

    /// Velocity is sampled in screen space so a moving window doesn't skew it
    fn add_movement(&mut self, time_ms: u64, pointer: &Pointer) {
        self.velocity.add_sample(time_ms, pointer.raw_x, pointer.raw_y);
    }

    fn touch_slop(&self, event: &MotionEvent) -> f32 {
        if event.classification == Classification::AmbiguousGesture {
            self.dimens.touch_slop * self.dimens.slop_multiplier
        } else {
            self.dimens.touch_slop
        }
    }

    fn begin_session(&mut self, event: &MotionEvent, pointer: &Pointer) {
        let collapsed = self.is_fully_collapsed();
        let wait = self.host.should_gesture_wait_for_touch_slop();
        let snapshot = DownSnapshot {
            panel_closed_on_down: collapsed,
            collapsed_and_heads_up_on_down: collapsed && self.host.has_pinned_heads_up(),
            animating_on_down: self.height_anim.is_some(),
            touch_started_in_empty_area: !self.host.is_in_content_bounds(pointer.x, pointer.y),
            wait_for_touch_slop: wait,
            ignore_x_touch_slop: collapsed || self.host.should_gesture_ignore_x_touch_slop(pointer.x, pointer.y),
        };
        debug!("Gesture down at ({:.1}, {:.1}) {:?}", pointer.x, pointer.y, snapshot);
        self.gesture_wait_for_touch_slop = wait;
        self.session = Some(GestureSession::new(
            pointer.id,
            pointer.x,
            pointer.y,
            self.expanded_height,
            event.time_ms,
            snapshot,
        ));
        self.motion_aborted = false;
        self.update_fling_on_layout = None;
        self.velocity.reset();
        self.add_movement(event.time_ms, pointer);
    }

    fn touch_down(&mut self, event: &MotionEvent, pointer: Pointer) {
        // The intercept path may already have grabbed this gesture
        let grabbed = self
            .session
            .as_ref()
            .is_some_and(|s| s.down_time_ms == event.time_ms && s.touch_slop_exceeded());
        self.begin_session(event, &pointer);

        let animating = self.height_anim.is_some() && !self.hint_running;
        let peeking = self.peek_anim.is_some();
        if !self.gesture_wait_for_touch_slop || animating || peeking || grabbed {
            if animating || peeking || grabbed {
                if let Some(session) = self.session.as_mut() {
                    session.mark_slop_exceeded();
                }
            }
            self.cancel_height_animator();
            self.cancel_peek();
            self.on_tracking_started();
        }

        if self.is_fully_collapsed() && !self.host.has_pinned_heads_up() && !self.host.is_bouncer_showing() {
            self.start_opening();
        }
    }

    fn touch_move(&mut self, event: &MotionEvent, pointer: Pointer) {
        self.add_movement(event.time_ms, &pointer);
        let (x, y) = (pointer.x, pointer.y);
        let slop = self.touch_slop(event);
        let tracking = self.is_tracking();
        let current = self.expanded_height;

        let Some(session) = self.session.as_mut() else {
            debug!("Move without an active gesture");
            return;
        };
        let mut h = session.drag_distance(y);
        let mut start_tracking = false;
        if session.exceeds_slop(x, y, slop) {
            session.mark_slop_exceeded();
            if session.snapshot.wait_for_touch_slop && !tracking && !session.snapshot.collapsed_and_heads_up_on_down {
                if !session.just_peeked && session.initial_offset != 0.0 {
                    session.re_anchor(x, y, current);
                    h = 0.0;
                }
                start_tracking = true;
            }
        }
        if start_tracking {
            self.cancel_height_animator();
            self.on_tracking_started();
        }

        let peek_height = self.peek_height;
        let peek_running = self.peek_anim.is_some();
        let threshold = self.falsing_threshold();
        let current = self.expanded_height;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let mut new_height = (h + session.initial_offset).max(0.0);
        let mut cancel_peek = false;
        if new_height > peek_height {
            cancel_peek = peek_running;
            session.just_peeked = false;
        } else if !peek_running && session.just_peeked {
            // The initial peek is done but the finger hasn't caught up; continue from the
            // peek height
            session.initial_offset = current;
            session.initial_y = y;
            session.min_expand_height = current;
            session.just_peeked = false;
        }
        new_height = new_height.max(session.min_expand_height);
        session.note_falsing_progress(x, y, threshold);
        let just_peeked = session.just_peeked;
        let wait = session.snapshot.wait_for_touch_slop;

        if cancel_peek {
            self.cancel_peek_animator();
        }
        if !just_peeked && (!wait || self.is_tracking()) && !self.host.is_tracking_blocked() {
            self.set_expanded_height_internal(new_height);
        }
    }

    /// Follow the next pointer when the tracked one lifts
    fn pointer_up(&mut self, event: &MotionEvent, start_tracking: bool) {
        let Some(up_id) = event.action_pointer_id() else {
            return;
        };
        if self.session.as_ref().map(|s| s.tracking_pointer) != Some(up_id) {
            return;
        }
        let new_index = if event.pointer(0).map(|p| p.id) != Some(up_id) { 0 } else { 1 };
        let Some(next) = event.pointer(new_index).copied() else {
            return;
        };
        debug!("Tracked pointer {} lifted, following {}", up_id, next.id);
        self.velocity.reset();
        self.add_movement(event.time_ms, &next);
        if let Some(session) = self.session.as_mut() {
            session.tracking_pointer = next.id;
        }
        if start_tracking {
            self.start_expand_motion(next.x, next.y, true, self.expanded_height);
        } else if let Some(session) = self.session.as_mut() {
            let offset = session.initial_offset;
            session.re_anchor(next.x, next.y, offset);
        }
    }

    fn start_expand_motion(&mut self, x: f32, y: f32, start_tracking: bool, height: f32) {
        if let Some(session) = self.session.as_mut() {
            session.re_anchor(x, y, height);
            if start_tracking {
                session.mark_slop_exceeded();
            }
        }
        if start_tracking {
            self.on_tracking_started();
        }
    }

    fn on_tracking_started(&mut self) {
        self.end_closing();
        // Pending collapses would fight the finger for the height
        self.deferred.clear();
        if self.session.as_mut().is_some_and(GestureSession::begin_tracking) {
            debug!("Tracking started at {:.1}", self.expanded_height);
            self.emit(PanelEvent::TrackingStarted);
        }
        self.notify_expanding_started();
        self.notify_expansion_changed();
    }

    fn on_tracking_stopped(&mut self, expand: bool) {
        if let Some(session) = self.session.as_mut() {
            session.suspend_tracking();
        }
        debug!("Tracking stopped (expand: {})", expand);
        self.emit(PanelEvent::TrackingStopped { expand });
        self.notify_expansion_changed();
    }

    fn on_empty_space_click(&mut self) -> bool {
        if self.hint_running {
            return true;
        }
        self.host.on_middle_clicked()
    }

    /// UP, CANCEL or a forced cancel: decide where the panel goes
    fn end_motion(&mut self, event: &MotionEvent, x: f32, y: f32, force_cancel: bool) {
        let Some(session) = self.session.clone() else {
            debug!("Release without an active gesture");
            self.velocity.reset();
            return;
        };
        let cancel = event.action == MotionAction::Cancel || force_cancel;
        let tracking = self.is_tracking();

        if (tracking && session.touch_slop_exceeded())
            || session.moved_beyond(x, y, self.dimens.touch_slop)
            || cancel
        {
            let (vx, vy) = self.velocity.current_velocity();
            let speed = vx.hypot(vy);
            let expand = if cancel {
                // Back to where the gesture started
                self.host.is_on_lock_screen() || !session.snapshot.panel_closed_on_down
            } else {
                self.fling_expands(vy, speed, x, y)
            };
            let interaction = self.interaction_type(vy);
            let false_touch = self.is_false_touch(x, y, interaction);
            debug!(
                "Release at ({:.1}, {:.1}) vy={:.0} speed={:.0} fraction={:.3} -> {}",
                x,
                y,
                vy,
                speed,
                self.expanded_fraction,
                if expand { "expand" } else { "collapse" }
            );

            self.fling_with(vy, expand, 1.0, false_touch);
            self.on_tracking_stopped(expand);
            let layouted = self.session.as_ref().is_some_and(|s| s.has_layouted_since_down);
            if expand && session.snapshot.panel_closed_on_down && !layouted {
                self.update_fling_on_layout = Some(vy);
            }
        } else if session.snapshot.panel_closed_on_down
            && !self.host.has_pinned_heads_up()
            && !tracking
            && !self.host.is_bouncer_showing()
            && !self.host.is_keyguard_fading_away()
        {
            let held = event.time_ms.saturating_sub(session.down_time_ms);
            if held < self.config.long_press_timeout_ms {
                // Show that the panel can be pulled
                self.run_peek_animation(self.config.peek_animation_ms, self.host.peek_height(), true);
            } else {
                self.schedule(self.now_ms, Deferred::PostCollapse);
            }
        } else if !self.host.is_bouncer_showing() {
            let expands = self.on_empty_space_click();
            self.on_tracking_stopped(expands);
        }

        self.velocity.reset();
        self.session = None;
    }

    // ---- events ----

    fn emit(&mut self, event: PanelEvent) {
        self.events.push(event);
    }

    /// Latest state wins: consecutive changes coalesce and repeats are dropped
    fn notify_expansion_changed(&mut self) {
        let expanded = self.expanded_fraction > 0.0
            || self.peek_anim.is_some()
            || self.instant_expanding
            || self.host.is_panel_visible_because_of_heads_up()
            || self.is_tracking()
            || self.height_anim.is_some();
        let event = PanelEvent::ExpansionChanged {
            fraction: self.expanded_fraction,
            expanded,
            tracking: self.is_tracking(),
        };
        if self.last_expansion == Some(event) {
            return;
        }
        self.last_expansion = Some(event);
        if matches!(self.events.last(), Some(PanelEvent::ExpansionChanged { .. })) {
            self.events.pop();
        }
        self.events.push(event);
    }
}

fn density_of<H: PanelHost>(host: &H) -> f32 {
    let density = host.display_metrics().density;
    if density.is_finite() && density > 0.0 {
        density
    } else {
        warn!("Invalid display density {}, using 1.0", density);
        1.0
    }
}
