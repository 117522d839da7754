//! Per-touch-sequence gesture state
//!
//! A session lives from DOWN to UP/CANCEL. It remembers where the finger landed,
//! which pointer is being followed, and the snapshot of panel state taken on down
//! that later picks the release behavior.

/// Where the session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Finger down, slop not exceeded yet
    Armed,
    /// Panel height follows the finger
    Tracking,
}

/// Panel state captured when the finger went down
#[derive(Debug, Clone, Copy, Default)]
pub struct DownSnapshot {
    pub panel_closed_on_down: bool,
    pub collapsed_and_heads_up_on_down: bool,
    /// An animator was running on down (intercept path)
    pub animating_on_down: bool,
    pub touch_started_in_empty_area: bool,
    /// Host wants the slop crossed before the panel follows
    pub wait_for_touch_slop: bool,
    /// Only the vertical component matters for slop
    pub ignore_x_touch_slop: bool,
}

#[derive(Debug, Clone)]
pub struct GestureSession {
    phase: SessionPhase,
    pub initial_x: f32,
    pub initial_y: f32,
    /// Panel height the current anchor was taken at
    pub initial_offset: f32,
    pub tracking_pointer: i32,
    touch_slop_exceeded: bool,
    pub down_time_ms: u64,
    pub snapshot: DownSnapshot,
    /// Height floor after a finished peek
    pub min_expand_height: f32,
    pub just_peeked: bool,
    pub peek_touching: bool,
    pub has_layouted_since_down: bool,
    pub touch_above_falsing_threshold: bool,
    pub upwards_when_threshold_reached: bool,
}

impl GestureSession {
    pub fn new(pointer_id: i32, x: f32, y: f32, offset: f32, down_time_ms: u64, snapshot: DownSnapshot) -> Self {
        Self {
            phase: SessionPhase::Armed,
            initial_x: x,
            initial_y: y,
            initial_offset: offset,
            tracking_pointer: pointer_id,
            touch_slop_exceeded: false,
            down_time_ms,
            snapshot,
            min_expand_height: 0.0,
            just_peeked: false,
            peek_touching: snapshot.panel_closed_on_down,
            has_layouted_since_down: false,
            touch_above_falsing_threshold: false,
            upwards_when_threshold_reached: false,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_tracking(&self) -> bool {
        self.phase == SessionPhase::Tracking
    }

    pub fn touch_slop_exceeded(&self) -> bool {
        self.touch_slop_exceeded
    }

    /// Slop is one-way for the rest of the session
    pub fn mark_slop_exceeded(&mut self) {
        self.touch_slop_exceeded = true;
    }

    /// ARMED -> TRACKING. Returns false if the session was not armed.
    pub fn begin_tracking(&mut self) -> bool {
        if self.phase != SessionPhase::Armed {
            return false;
        }
        self.phase = SessionPhase::Tracking;
        true
    }

    /// TRACKING -> ARMED, used when the host forces tracking off mid-gesture
    pub fn suspend_tracking(&mut self) {
        if self.phase == SessionPhase::Tracking {
            self.phase = SessionPhase::Armed;
        }
    }

    /// Move the anchor without touching the accumulated height
    pub fn re_anchor(&mut self, x: f32, y: f32, offset: f32) {
        self.initial_x = x;
        self.initial_y = y;
        self.initial_offset = offset;
    }

    /// Vertical travel since the anchor
    pub fn drag_distance(&self, y: f32) -> f32 {
        y - self.initial_y
    }

    /// Whether a move to (x, y) crosses the slop with vertical dominance
    pub fn exceeds_slop(&self, x: f32, y: f32, slop: f32) -> bool {
        let h = (y - self.initial_y).abs();
        h > slop && (h > (x - self.initial_x).abs() || self.snapshot.ignore_x_touch_slop)
    }

    /// Whether the motion is upwards and steeper than 45 degrees
    pub fn is_direction_upwards(&self, x: f32, y: f32) -> bool {
        let x_diff = x - self.initial_x;
        let y_diff = y - self.initial_y;
        if y_diff >= 0.0 {
            return false;
        }
        y_diff.abs() >= x_diff.abs()
    }

    /// Whether the release moved far enough to be more than a tap
    pub fn moved_beyond(&self, x: f32, y: f32, slop: f32) -> bool {
        (x - self.initial_x).abs() > slop || (y - self.initial_y).abs() > slop
    }

    /// Record upward travel against the unlock falsing threshold
    pub fn note_falsing_progress(&mut self, x: f32, y: f32, threshold: f32) {
        if -(y - self.initial_y) >= threshold {
            self.touch_above_falsing_threshold = true;
            self.upwards_when_threshold_reached = self.is_direction_upwards(x, y);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> GestureSession {
        GestureSession::new(0, 100.0, 100.0, 0.0, 0, DownSnapshot::default())
    }

    #[test]
    fn test_phase_transitions() {
        let mut s = session();
        assert_eq!(s.phase(), SessionPhase::Armed);
        assert!(s.begin_tracking());
        assert!(!s.begin_tracking());
        assert!(s.is_tracking());
        s.suspend_tracking();
        assert_eq!(s.phase(), SessionPhase::Armed);
        assert!(s.begin_tracking());
    }

    #[test]
    fn test_slop_requires_vertical_dominance() {
        let s = session();
        assert!(!s.exceeds_slop(100.0, 105.0, 8.0));
        assert!(s.exceeds_slop(100.0, 120.0, 8.0));
        // Mostly horizontal swipe
        assert!(!s.exceeds_slop(140.0, 120.0, 8.0));
    }

    #[test]
    fn test_slop_ignoring_x() {
        let mut snapshot = DownSnapshot::default();
        snapshot.ignore_x_touch_slop = true;
        let s = GestureSession::new(0, 100.0, 100.0, 0.0, 0, snapshot);
        assert!(s.exceeds_slop(140.0, 120.0, 8.0));
    }

    #[test]
    fn test_direction_upwards() {
        let s = session();
        assert!(s.is_direction_upwards(100.0, 50.0));
        assert!(!s.is_direction_upwards(100.0, 150.0));
        assert!(!s.is_direction_upwards(200.0, 80.0));
    }

    #[test]
    fn test_re_anchor_keeps_phase() {
        let mut s = session();
        s.begin_tracking();
        s.re_anchor(10.0, 20.0, 300.0);
        assert!(s.is_tracking());
        assert_eq!(s.drag_distance(30.0), 10.0);
        assert_eq!(s.initial_offset, 300.0);
    }

    #[test]
    fn test_falsing_progress() {
        let mut s = session();
        s.note_falsing_progress(100.0, 60.0, 80.0);
        assert!(!s.touch_above_falsing_threshold);
        s.note_falsing_progress(105.0, 10.0, 80.0);
        assert!(s.touch_above_falsing_threshold);
        assert!(s.upwards_when_threshold_reached);
    }
}
