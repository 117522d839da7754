//! Pointer velocity estimation for fling decisions.
//!
//! Each axis keeps a small ring buffer and estimates velocity with the impulse
//! strategy: the velocity is recovered from the kinetic energy the finger put into
//! the (unit-mass) panel over the recent samples.

/// Ring buffer size per axis.
const HISTORY_SIZE: usize = 20;

/// Only samples this recent count.
const HORIZON_MS: u64 = 100;

/// A gap this long between two samples means the pointer had stopped.
pub const ASSUME_STOPPED_MS: u64 = 40;

#[derive(Clone, Copy, Default)]
struct Sample {
    time_ms: u64,
    position: f32,
}

/// 1D impulse velocity tracker.
#[derive(Clone)]
struct AxisTracker {
    samples: [Option<Sample>; HISTORY_SIZE],
    index: usize,
}

impl AxisTracker {
    fn new() -> Self {
        Self {
            samples: [None; HISTORY_SIZE],
            index: 0,
        }
    }

    fn add(&mut self, time_ms: u64, position: f32) {
        self.index = (self.index + 1) % HISTORY_SIZE;
        self.samples[self.index] = Some(Sample { time_ms, position });
    }

    /// Velocity in units per second.
    fn velocity(&self) -> f32 {
        let mut positions = [0.0f32; HISTORY_SIZE];
        let mut times = [0.0f32; HISTORY_SIZE];
        let mut count = 0;

        let Some(newest) = self.samples[self.index] else {
            return 0.0;
        };

        let mut current = self.index;
        let mut previous = newest;
        while let Some(sample) = self.samples[current] {
            let age = newest.time_ms.saturating_sub(sample.time_ms);
            let gap = previous.time_ms.saturating_sub(sample.time_ms);
            if age > HORIZON_MS || gap > ASSUME_STOPPED_MS {
                break;
            }
            previous = sample;

            positions[count] = sample.position;
            times[count] = -(age as f32);
            count += 1;
            if count >= HISTORY_SIZE {
                break;
            }
            current = if current == 0 { HISTORY_SIZE - 1 } else { current - 1 };
        }

        if count < 2 {
            return 0.0;
        }

        impulse_velocity(&positions, &times, count) * 1000.0
    }

    fn reset(&mut self) {
        self.samples = [None; HISTORY_SIZE];
        self.index = 0;
    }
}

/// Samples are newest-first; returns units per millisecond.
fn impulse_velocity(positions: &[f32; HISTORY_SIZE], times: &[f32; HISTORY_SIZE], count: usize) -> f32 {
    let mut work = 0.0f32;
    let start = count - 1;
    let mut next_time = times[start];

    for i in (1..=start).rev() {
        let current_time = next_time;
        next_time = times[i - 1];
        if current_time == next_time {
            continue;
        }
        let v_curr = (positions[i - 1] - positions[i]) / (next_time - current_time);
        let v_prev = kinetic_energy_to_velocity(work);
        work += (v_curr - v_prev) * v_curr.abs();
        if i == start {
            work *= 0.5;
        }
    }

    kinetic_energy_to_velocity(work)
}

/// E = 0.5 * m * v^2 with m = 1.
#[inline]
fn kinetic_energy_to_velocity(kinetic_energy: f32) -> f32 {
    kinetic_energy.signum() * (2.0 * kinetic_energy.abs()).sqrt()
}

/// Accumulates pointer motion in screen coordinates and reports `(vx, vy)` in px/s.
///
/// Positive `vy` is downward on screen, which is the panel's opening direction.
#[derive(Clone)]
pub struct VelocitySampler {
    x: AxisTracker,
    y: AxisTracker,
}

impl Default for VelocitySampler {
    fn default() -> Self {
        Self::new()
    }
}

impl VelocitySampler {
    pub fn new() -> Self {
        Self {
            x: AxisTracker::new(),
            y: AxisTracker::new(),
        }
    }

    pub fn add_sample(&mut self, time_ms: u64, x: f32, y: f32) {
        if !x.is_finite() || !y.is_finite() {
            tracing::warn!("Dropping non-finite velocity sample ({}, {})", x, y);
            return;
        }
        self.x.add(time_ms, x);
        self.y.add(time_ms, y);
    }

    pub fn current_velocity(&self) -> (f32, f32) {
        (self.x.velocity(), self.y.velocity())
    }

    /// Length of the velocity vector
    pub fn speed(&self) -> f32 {
        let (vx, vy) = self.current_velocity();
        vx.hypot(vy)
    }

    pub fn reset(&mut self) {
        self.x.reset();
        self.y.reset();
    }
}
