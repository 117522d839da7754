//! Touch input events as delivered to the panel

use serde::{Deserialize, Serialize};

/// Masked action of a motion event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionAction {
    Down,
    Move,
    Up,
    Cancel,
    /// An additional pointer went down; `action_index` names it
    PointerDown,
    /// A non-primary pointer went up; `action_index` names it
    PointerUp,
}

/// Platform hint about what the gesture might be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    #[default]
    None,
    /// Another gesture (e.g. a horizontal swipe) may be in progress
    AmbiguousGesture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSource {
    #[default]
    Touchscreen,
    Mouse,
}

/// One pointer in a motion event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pointer {
    pub id: i32,
    /// Window-relative position
    pub x: f32,
    pub y: f32,
    /// Screen position; differs from (x, y) when the window itself moves
    pub raw_x: f32,
    pub raw_y: f32,
}

impl Pointer {
    pub fn new(id: i32, x: f32, y: f32) -> Self {
        Self { id, x, y, raw_x: x, raw_y: y }
    }

    pub fn with_window_offset(mut self, dx: f32, dy: f32) -> Self {
        self.raw_x = self.x + dx;
        self.raw_y = self.y + dy;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionEvent {
    pub action: MotionAction,
    /// Event time in milliseconds on the controller's clock
    pub time_ms: u64,
    pub pointers: Vec<Pointer>,
    #[serde(default)]
    pub action_index: usize,
    #[serde(default)]
    pub classification: Classification,
    #[serde(default)]
    pub source: InputSource,
}

impl MotionEvent {
    /// Single-pointer event
    pub fn single(action: MotionAction, time_ms: u64, x: f32, y: f32) -> Self {
        Self {
            action,
            time_ms,
            pointers: vec![Pointer::new(0, x, y)],
            action_index: 0,
            classification: Classification::None,
            source: InputSource::Touchscreen,
        }
    }

    pub fn down(time_ms: u64, x: f32, y: f32) -> Self {
        Self::single(MotionAction::Down, time_ms, x, y)
    }

    pub fn moved(time_ms: u64, x: f32, y: f32) -> Self {
        Self::single(MotionAction::Move, time_ms, x, y)
    }

    pub fn up(time_ms: u64, x: f32, y: f32) -> Self {
        Self::single(MotionAction::Up, time_ms, x, y)
    }

    pub fn cancel(time_ms: u64, x: f32, y: f32) -> Self {
        Self::single(MotionAction::Cancel, time_ms, x, y)
    }

    pub fn with_pointers(mut self, pointers: Vec<Pointer>, action_index: usize) -> Self {
        self.pointers = pointers;
        self.action_index = action_index;
        self
    }

    pub fn with_source(mut self, source: InputSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_classification(mut self, classification: Classification) -> Self {
        self.classification = classification;
        self
    }

    pub fn find_pointer_index(&self, id: i32) -> Option<usize> {
        self.pointers.iter().position(|p| p.id == id)
    }

    pub fn pointer(&self, index: usize) -> Option<&Pointer> {
        self.pointers.get(index)
    }

    /// Id of the pointer the action refers to (POINTER_UP / POINTER_DOWN)
    pub fn action_pointer_id(&self) -> Option<i32> {
        self.pointers.get(self.action_index).map(|p| p.id)
    }
}
