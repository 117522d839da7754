//! End-to-end gestures against the panel controller

use flick_panel::input::{Classification, MotionAction, MotionEvent, Pointer};
use flick_panel::panel::{
    DisplayMetrics, FalsingGate, InteractionType, NoFalsing, PanelController, PanelEvent, PanelHost, PanelState,
};
use flick_panel::PanelConfig;

struct RecordingHost {
    max: f32,
    wait_for_slop: bool,
    lock_screen: bool,
    falsing_needed: bool,
    peek_height: f32,
    middle_clicks: u32,
}

impl RecordingHost {
    fn new(max: f32) -> Self {
        Self {
            max,
            wait_for_slop: true,
            lock_screen: false,
            falsing_needed: false,
            peek_height: 0.0,
            middle_clicks: 0,
        }
    }

    fn immediate(mut self) -> Self {
        self.wait_for_slop = false;
        self
    }
}

impl PanelHost for RecordingHost {
    fn max_panel_height(&self) -> f32 {
        self.max
    }

    fn display_metrics(&self) -> DisplayMetrics {
        DisplayMetrics { density: 1.0, width: 600.0, height: 1000.0 }
    }

    fn peek_height(&self) -> f32 {
        self.peek_height
    }

    fn should_gesture_wait_for_touch_slop(&self) -> bool {
        self.wait_for_slop
    }

    fn is_on_lock_screen(&self) -> bool {
        self.lock_screen
    }

    fn is_falsing_threshold_needed(&self) -> bool {
        self.falsing_needed
    }

    fn on_middle_clicked(&mut self) -> bool {
        self.middle_clicks += 1;
        false
    }
}

struct ThresholdOnly;

impl FalsingGate for ThresholdOnly {
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

fn panel(host: RecordingHost) -> PanelController<RecordingHost, NoFalsing> {
    PanelController::new(host, NoFalsing, PanelConfig::default())
}

fn settle<H: PanelHost, F: FalsingGate>(panel: &mut PanelController<H, F>) -> Vec<PanelEvent> {
    let mut events = panel.take_events();
    let mut now = panel.now_ms();
    for _ in 0..500 {
        now += 16;
        let more = panel.on_frame(now);
        events.extend(panel.take_events());
        if !more {
            break;
        }
    }
    events
}

fn two_pointers(action: MotionAction, time_ms: u64, a: (f32, f32), b: (f32, f32), action_index: usize) -> MotionEvent {
    MotionEvent::single(action, time_ms, a.0, a.1)
        .with_pointers(vec![Pointer::new(0, a.0, a.1), Pointer::new(1, b.0, b.1)], action_index)
}

#[test]
fn slow_upward_release_collapses() {
    let mut panel = panel(RecordingHost::new(1000.0));

    panel.on_touch_event(&MotionEvent::down(0, 100.0, 100.0));
    panel.on_touch_event(&MotionEvent::moved(16, 100.0, 250.0));
    panel.on_touch_event(&MotionEvent::moved(32, 100.0, 400.0));
    assert!(panel.is_tracking());
    assert!((panel.expanded_height() - 300.0).abs() < 1e-3);

    // Finger rests, then creeps up at 50 px/s
    panel.on_touch_event(&MotionEvent::moved(200, 100.0, 400.0));
    panel.on_touch_event(&MotionEvent::moved(216, 100.0, 399.2));
    assert!((panel.expanded_height() - 300.0).abs() < 2.0);
    assert!((panel.expanded_fraction() - 0.3).abs() < 0.01);

    panel.on_touch_event(&MotionEvent::up(232, 100.0, 398.4));
    assert!(!panel.is_tracking());
    assert!(panel.is_closing());

    let events = settle(&mut panel);
    assert!(events.contains(&PanelEvent::TrackingStopped { expand: false }));
    assert!(events.contains(&PanelEvent::ClosingFinished));
    assert_eq!(panel.expanded_height(), 0.0);
    assert_eq!(panel.state(), PanelState::Collapsed);
}

#[test]
fn fast_downward_release_expands_from_nearly_open() {
    let mut panel = panel(RecordingHost::new(1000.0));
    panel.set_expanded_fraction(0.95);

    panel.on_touch_event(&MotionEvent::down(0, 100.0, 500.0));
    for i in 1..=3u64 {
        panel.on_touch_event(&MotionEvent::moved(i * 10, 100.0, 500.0 + i as f32 * 12.0));
    }
    assert!(panel.is_tracking());
    // Slop re-anchors, so the panel only moved by the last two steps
    assert!((panel.expanded_height() - 974.0).abs() < 1e-3);

    panel.on_touch_event(&MotionEvent::up(40, 100.0, 548.0));
    let events = settle(&mut panel);
    assert!(events.contains(&PanelEvent::TrackingStopped { expand: true }));
    assert!(events.contains(&PanelEvent::ExpandingFinished));
    assert_eq!(panel.expanded_height(), 1000.0);
    assert_eq!(panel.state(), PanelState::Expanded);
}

#[test]
fn release_before_layout_replays_against_new_height() {
    let mut panel = panel(RecordingHost::new(1000.0).immediate());

    panel.on_touch_event(&MotionEvent::down(0, 100.0, 0.0));
    panel.on_touch_event(&MotionEvent::moved(16, 100.0, 100.0));
    panel.on_touch_event(&MotionEvent::moved(32, 100.0, 200.0));
    panel.on_touch_event(&MotionEvent::up(48, 100.0, 300.0));
    assert_eq!(panel.dump().height_animator.map(|a| a.to), Some(1000.0));

    // Layout lands with a taller panel
    panel.host_mut().max = 1200.0;
    panel.on_layout();
    assert_eq!(panel.dump().height_animator.map(|a| a.to), Some(1200.0));

    settle(&mut panel);
    assert_eq!(panel.expanded_height(), 1200.0);
}

#[test]
fn tap_on_collapsed_panel_peeks_and_falls_back() {
    let mut host = RecordingHost::new(1000.0);
    host.peek_height = 80.0;
    let mut panel = panel(host);

    panel.on_touch_event(&MotionEvent::down(0, 50.0, 5.0));
    panel.on_touch_event(&MotionEvent::up(100, 50.0, 6.0));
    assert_eq!(panel.state(), PanelState::Peeking);

    let mut highest: f32 = 0.0;
    let mut now = 100;
    while panel.on_frame(now) {
        highest = highest.max(panel.expanded_height());
        now += 16;
        assert!(now < 5000, "peek never settled");
    }
    assert!(highest > 40.0 && highest <= 80.0, "highest = {}", highest);
    assert!(panel.is_fully_collapsed());
    assert_eq!(panel.host().middle_clicks, 0);
}

#[test]
fn long_press_on_collapsed_panel_does_not_peek() {
    let mut host = RecordingHost::new(1000.0);
    host.peek_height = 80.0;
    let mut panel = panel(host);

    panel.on_touch_event(&MotionEvent::down(0, 50.0, 5.0));
    panel.on_frame(300);
    panel.on_touch_event(&MotionEvent::up(900, 50.0, 5.0));
    assert_ne!(panel.state(), PanelState::Peeking);
    settle(&mut panel);
    assert!(panel.is_fully_collapsed());
}

#[test]
fn tap_on_open_panel_counts_as_empty_space_click() {
    let mut panel = panel(RecordingHost::new(1000.0));
    panel.set_expanded_fraction(1.0);
    panel.on_touch_event(&MotionEvent::down(0, 50.0, 500.0));
    panel.on_touch_event(&MotionEvent::up(60, 51.0, 501.0));
    assert_eq!(panel.host().middle_clicks, 1);
    assert!(panel.take_events().contains(&PanelEvent::TrackingStopped { expand: false }));
}

#[test]
fn touch_grabs_a_closing_panel() {
    let mut panel = panel(RecordingHost::new(1000.0));
    panel.set_expanded_height(800.0);
    panel.collapse(false, 1.0);
    panel.on_frame(16);
    assert!(panel.is_closing());

    let down = MotionEvent::down(20, 100.0, 400.0);
    assert!(panel.on_intercept_touch_event(&down));
    assert!(!panel.is_closing());
    assert!(panel.on_touch_event(&down));
    assert!(panel.is_tracking());

    let events = panel.take_events();
    assert!(events.contains(&PanelEvent::ClosingFinished));
    assert!(events.contains(&PanelEvent::TrackingStarted));
}

#[test]
fn intercept_steals_upward_drag() {
    let mut panel = panel(RecordingHost::new(1000.0));
    panel.set_expanded_fraction(1.0);

    assert!(!panel.on_intercept_touch_event(&MotionEvent::down(0, 100.0, 800.0)));
    assert!(panel.on_intercept_touch_event(&MotionEvent::moved(16, 100.0, 780.0)));
    assert!(panel.is_tracking());

    panel.on_touch_event(&MotionEvent::moved(32, 100.0, 700.0));
    assert!((panel.expanded_height() - 920.0).abs() < 1e-3);
}

#[test]
fn lifting_tracked_pointer_hands_over_without_jump() {
    let mut panel = panel(RecordingHost::new(1000.0).immediate());
    panel.set_expanded_fraction(0.5);

    panel.on_touch_event(&MotionEvent::down(0, 100.0, 300.0));
    panel.on_touch_event(&MotionEvent::moved(16, 100.0, 400.0));
    assert!((panel.expanded_height() - 600.0).abs() < 1e-3);

    panel.on_touch_event(&two_pointers(MotionAction::PointerDown, 32, (100.0, 400.0), (300.0, 700.0), 1));
    panel.on_touch_event(&two_pointers(MotionAction::Move, 48, (100.0, 420.0), (300.0, 720.0), 0));
    assert!((panel.expanded_height() - 620.0).abs() < 1e-3);

    panel.take_events();
    panel.on_touch_event(&two_pointers(MotionAction::PointerUp, 64, (100.0, 420.0), (300.0, 720.0), 0));
    assert!((panel.expanded_height() - 620.0).abs() < 1e-3);
    assert!(!panel.take_events().contains(&PanelEvent::TrackingStarted));

    let moved = MotionEvent::moved(80, 0.0, 0.0).with_pointers(vec![Pointer::new(1, 300.0, 760.0)], 0);
    panel.on_touch_event(&moved);
    assert!((panel.expanded_height() - 660.0).abs() < 1e-3);
}

#[test]
fn second_finger_on_lock_screen_aborts_to_expanded() {
    let mut host = RecordingHost::new(1000.0).immediate();
    host.lock_screen = true;
    let mut panel = panel(host);
    panel.set_expanded_fraction(0.5);

    panel.on_touch_event(&MotionEvent::down(0, 100.0, 300.0));
    panel.on_touch_event(&MotionEvent::moved(16, 100.0, 250.0));
    assert!((panel.expanded_height() - 450.0).abs() < 1e-3);

    let second = two_pointers(MotionAction::PointerDown, 32, (100.0, 250.0), (300.0, 600.0), 1);
    assert!(!panel.on_touch_event(&second));
    assert!(!panel.is_tracking());

    // The rest of the gesture is ignored
    assert!(!panel.on_touch_event(&MotionEvent::moved(48, 100.0, 100.0)));

    let events = settle(&mut panel);
    assert!(events.contains(&PanelEvent::TrackingStopped { expand: true }));
    assert_eq!(panel.expanded_height(), 1000.0);
}

#[test]
fn drag_past_max_rubber_bands_and_settles() {
    let mut panel = panel(RecordingHost::new(1000.0).immediate());
    panel.set_expanded_fraction(1.0);

    panel.on_touch_event(&MotionEvent::down(0, 100.0, 500.0));
    panel.on_touch_event(&MotionEvent::moved(16, 100.0, 700.0));
    assert!((panel.over_expansion() - 100.0).abs() < 1e-3);
    assert!((panel.expanded_height() - 1100.0).abs() < 1e-3);
    assert_eq!(panel.expanded_fraction(), 1.0);

    panel.on_touch_event(&MotionEvent::moved(32, 100.0, 1000.0));
    assert!((panel.over_expansion() - 120.0).abs() < 1e-3);

    panel.take_events();
    panel.on_touch_event(&MotionEvent::up(48, 100.0, 1000.0));
    assert_eq!(panel.over_expansion(), 0.0);
    assert_eq!(panel.expanded_height(), 1000.0);
    assert!(!panel.is_animating());
    assert!(panel.take_events().contains(&PanelEvent::ExpandingFinished));
}

#[test]
fn ambiguous_gesture_needs_more_travel() {
    let mut panel = panel(RecordingHost::new(1000.0));
    panel.set_expanded_fraction(0.5);

    panel.on_touch_event(&MotionEvent::down(0, 100.0, 500.0));
    let ambiguous = MotionEvent::moved(16, 100.0, 512.0).with_classification(Classification::AmbiguousGesture);
    assert!(!panel.on_touch_event(&ambiguous));
    assert!(!panel.is_tracking());

    assert!(panel.on_touch_event(&MotionEvent::moved(32, 100.0, 512.0)));
    assert!(panel.is_tracking());
}

fn lock_screen_panel() -> PanelController<RecordingHost, ThresholdOnly> {
    let mut host = RecordingHost::new(1000.0);
    host.lock_screen = true;
    host.falsing_needed = true;
    let mut panel = PanelController::new(host, ThresholdOnly, PanelConfig::default());
    panel.set_expanded_fraction(1.0);
    panel
}

#[test]
fn short_swipe_on_lock_screen_is_treated_as_false_touch() {
    let mut panel = lock_screen_panel();

    panel.on_touch_event(&MotionEvent::down(0, 100.0, 900.0));
    panel.on_touch_event(&MotionEvent::moved(16, 100.0, 880.0));
    panel.on_touch_event(&MotionEvent::moved(32, 100.0, 860.0));
    panel.on_touch_event(&MotionEvent::up(48, 100.0, 850.0));

    let events = settle(&mut panel);
    assert!(events.contains(&PanelEvent::TrackingStopped { expand: true }));
    assert_eq!(panel.expanded_height(), 1000.0);
}

#[test]
fn long_swipe_on_lock_screen_unlocks() {
    let mut panel = lock_screen_panel();

    panel.on_touch_event(&MotionEvent::down(0, 100.0, 900.0));
    for (i, y) in [840.0, 740.0, 640.0, 540.0].into_iter().enumerate() {
        panel.on_touch_event(&MotionEvent::moved(16 * (i as u64 + 1), 100.0, y));
    }
    panel.on_touch_event(&MotionEvent::up(80, 100.0, 500.0));

    let events = settle(&mut panel);
    assert!(events.contains(&PanelEvent::TrackingStopped { expand: false }));
    assert!(panel.is_fully_collapsed());
}

#[test]
fn expansion_changes_coalesce_until_drained() {
    let mut panel = panel(RecordingHost::new(1000.0));
    panel.set_expanded_height(100.0);
    panel.set_expanded_height(200.0);
    panel.set_expanded_height(300.0);
    let events = panel.take_events();
    assert_eq!(
        events,
        vec![PanelEvent::ExpansionChanged { fraction: 0.3, expanded: true, tracking: false }]
    );
}

#[test]
fn cancelled_drag_from_collapsed_returns_to_collapsed() {
    let mut panel = panel(RecordingHost::new(1000.0));
    panel.on_touch_event(&MotionEvent::down(0, 100.0, 10.0));
    panel.on_touch_event(&MotionEvent::moved(16, 100.0, 120.0));
    panel.on_touch_event(&MotionEvent::moved(32, 100.0, 260.0));
    panel.on_touch_event(&MotionEvent::cancel(48, 100.0, 260.0));

    let events = settle(&mut panel);
    assert!(events.contains(&PanelEvent::TrackingStopped { expand: false }));
    assert!(panel.is_fully_collapsed());
}
