//! Demo mode - a simulated shell that replays gesture scripts against the controller

use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PanelError, Result};
use crate::input::{MotionAction, MotionEvent};
use crate::panel::{DisplayMetrics, NoFalsing, PanelController, PanelEvent, PanelHost};

/// Frame interval of the simulated display
pub const FRAME_MS: u64 = 16;

/// Shell stand-in with a fixed panel geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedHost {
    pub max_panel_height: f32,
    pub metrics: DisplayMetrics,
    pub opening_height: f32,
    pub peek_height: f32,
    pub lock_screen: bool,
    pub dismissing_animation: bool,
    /// Result of a click on the empty panel area
    pub middle_click_expands: bool,
}

impl SimulatedHost {
    pub fn new(max_panel_height: f32) -> Self {
        Self {
            max_panel_height,
            metrics: DisplayMetrics::default(),
            opening_height: 56.0,
            peek_height: 96.0,
            lock_screen: false,
            dismissing_animation: false,
            middle_click_expands: false,
        }
    }
}

impl PanelHost for SimulatedHost {
    fn max_panel_height(&self) -> f32 {
        self.max_panel_height
    }

    fn display_metrics(&self) -> DisplayMetrics {
        self.metrics
    }

    fn opening_height(&self) -> f32 {
        self.opening_height
    }

    fn peek_height(&self) -> f32 {
        self.peek_height
    }

    fn is_on_lock_screen(&self) -> bool {
        self.lock_screen
    }

    fn should_use_dismissing_animation(&self) -> bool {
        self.dismissing_animation
    }

    fn on_middle_clicked(&mut self) -> bool {
        self.middle_click_expands
    }
}

fn default_true() -> bool {
    true
}

fn default_speed_up() -> f32 {
    1.0
}

/// One scripted input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum StepKind {
    Touch { action: MotionAction, x: f32, y: f32 },
    Expand {
        #[serde(default = "default_true")]
        animate: bool,
    },
    Collapse {
        #[serde(default)]
        delayed: bool,
        #[serde(default = "default_speed_up")]
        speed_up: f32,
    },
    InstantCollapse,
    UnlockHint,
    SetFraction { fraction: f32 },
    Layout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptStep {
    pub at_ms: u64,
    #[serde(flatten)]
    pub step: StepKind,
}

impl ScriptStep {
    pub fn new(at_ms: u64, step: StepKind) -> Self {
        Self { at_ms, step }
    }

    fn touch(at_ms: u64, action: MotionAction, x: f32, y: f32) -> Self {
        Self::new(at_ms, StepKind::Touch { action, x, y })
    }
}

/// Parse a JSON array of steps; steps are ordered by time
pub fn parse_script(contents: &str) -> Result<Vec<ScriptStep>> {
    let mut steps: Vec<ScriptStep> =
        serde_json::from_str(contents).map_err(|e| PanelError::Script(e.to_string()))?;
    steps.sort_by_key(|s| s.at_ms);
    Ok(steps)
}

pub fn load_script(path: &Path) -> Result<Vec<ScriptStep>> {
    let contents = fs::read_to_string(path)
        .map_err(|e| PanelError::Script(format!("{}: {}", path.display(), e)))?;
    parse_script(&contents)
}

/// Names accepted by `builtin_script`
pub const SCENARIOS: &[&str] = &["open", "close", "peek", "hint", "cancel"];

/// Canned gestures for a panel of `max_height` pixels
pub fn builtin_script(name: &str, max_height: f32) -> Option<Vec<ScriptStep>> {
    use MotionAction::*;

    let x = 300.0;
    let steps = match name {
        // Quick pull down from the top edge
        "open" => {
            let mut steps = vec![ScriptStep::touch(0, Down, x, 10.0)];
            for i in 1..=6 {
                steps.push(ScriptStep::touch(i * 16, Move, x, 10.0 + i as f32 * 60.0));
            }
            steps.push(ScriptStep::touch(112, Up, x, 400.0));
            steps
        }
        // Open panel dragged up slowly and let go near the middle
        "close" => {
            let mut steps = vec![
                ScriptStep::new(0, StepKind::SetFraction { fraction: 1.0 }),
                ScriptStep::touch(100, Down, x, max_height - 20.0),
            ];
            let mut y = max_height - 20.0;
            for i in 1..=16 {
                y -= max_height * 0.035;
                steps.push(ScriptStep::touch(100 + i * 40, Move, x, y));
            }
            // Hold still before letting go
            steps.push(ScriptStep::touch(840, Move, x, y));
            steps.push(ScriptStep::touch(860, Up, x, y));
            steps
        }
        // Tap on the collapsed panel
        "peek" => vec![ScriptStep::touch(0, Down, x, 10.0), ScriptStep::touch(80, Up, x, 11.0)],
        "hint" => vec![
            ScriptStep::new(0, StepKind::SetFraction { fraction: 1.0 }),
            ScriptStep::new(50, StepKind::UnlockHint),
        ],
        // Drag interrupted by the system
        "cancel" => vec![
            ScriptStep::touch(0, Down, x, 10.0),
            ScriptStep::touch(16, Move, x, 120.0),
            ScriptStep::touch(32, Move, x, 260.0),
            ScriptStep::touch(48, Cancel, x, 260.0),
        ],
        _ => return None,
    };
    Some(steps)
}

/// Drives a controller from a script on a virtual clock
pub struct DemoState {
    pub controller: PanelController<SimulatedHost, NoFalsing>,
    script: VecDeque<ScriptStep>,
    now_ms: u64,
    frames: u64,
    /// Every event the controller emitted, with the frame time it was drained at
    pub event_log: Vec<(u64, PanelEvent)>,
}

impl DemoState {
    pub fn new(controller: PanelController<SimulatedHost, NoFalsing>, script: Vec<ScriptStep>) -> Self {
        tracing::info!(
            "Demo: {} scripted steps, panel max height {}",
            script.len(),
            controller.max_panel_height()
        );
        Self {
            controller,
            script: script.into(),
            now_ms: 0,
            frames: 0,
            event_log: Vec::new(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Script consumed and nothing left to animate
    pub fn is_finished(&self) -> bool {
        self.script.is_empty() && !self.controller.is_animating()
    }

    /// Advance one frame
    pub fn tick(&mut self) {
        self.advance(self.now_ms + FRAME_MS);
    }

    /// Apply steps due by `now_ms`, then render a frame
    pub fn advance(&mut self, now_ms: u64) {
        self.now_ms = now_ms;
        while self.script.front().is_some_and(|s| s.at_ms <= now_ms) {
            if let Some(step) = self.script.pop_front() {
                self.apply(step);
            }
        }
        self.controller.on_frame(now_ms);
        self.frames += 1;
        self.drain_events();
    }

    fn apply(&mut self, step: ScriptStep) {
        tracing::debug!("Demo step at {} ms: {:?}", step.at_ms, step.step);
        match step.step {
            StepKind::Touch { action, x, y } => {
                let event = MotionEvent::single(action, step.at_ms, x, y);
                self.controller.on_touch_event(&event);
            }
            StepKind::Expand { animate } => self.controller.expand(animate),
            StepKind::Collapse { delayed, speed_up } => self.controller.collapse(delayed, speed_up),
            StepKind::InstantCollapse => self.controller.instant_collapse(),
            StepKind::UnlockHint => self.controller.start_unlock_hint_animation(),
            StepKind::SetFraction { fraction } => self.controller.set_expanded_fraction(fraction),
            StepKind::Layout => self.controller.on_layout(),
        }
        self.drain_events();
    }

    fn drain_events(&mut self) {
        // Layout requests are served right away, which may emit more
        loop {
            let events = self.controller.take_events();
            if events.is_empty() {
                break;
            }
            let mut layout = false;
            for event in events {
                match event {
                    PanelEvent::ExpansionChanged { fraction, expanded, tracking } => {
                        tracing::debug!(fraction, expanded, tracking, "expansion changed");
                    }
                    PanelEvent::LayoutRequested => layout = true,
                    other => tracing::info!("Panel event at {} ms: {:?}", self.now_ms, other),
                }
                self.event_log.push((self.now_ms, event));
            }
            if !layout {
                break;
            }
            self.controller.on_layout();
        }
    }
}
