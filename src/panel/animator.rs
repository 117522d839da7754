//! Time-sliced height animators
//!
//! Animators do not own the panel. The controller samples them on every frame, writes the
//! value through its own height setter, and matches on the single `AnimationOutcome` once
//! the run is over.

use serde::Serialize;

use super::interpolator::Interpolator;

/// How an animator run ended. Every run reports exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationOutcome {
    Completed,
    Cancelled,
}

/// What a height animator run is for
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimationKind {
    Fling { expand: bool },
    /// Unlock hint, nudging away from `origin`
    HintPhase1 { origin: f32 },
    /// Unlock hint, bouncing back
    HintPhase2,
    /// Short preview toward the peek height
    Peek { collapse_when_finished: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnimatorSnapshot {
    pub from: f32,
    pub to: f32,
    pub duration_ms: u64,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone)]
pub struct HeightAnimator {
    kind: AnimationKind,
    from: f32,
    to: f32,
    start_ms: u64,
    duration_ms: u64,
    interpolator: Interpolator,
    last_sample_ms: u64,
}

impl HeightAnimator {
    pub fn new(
        kind: AnimationKind,
        from: f32,
        to: f32,
        start_ms: u64,
        duration_ms: u64,
        interpolator: Interpolator,
    ) -> Self {
        Self {
            kind,
            from,
            to,
            start_ms,
            duration_ms,
            interpolator,
            last_sample_ms: start_ms,
        }
    }

    pub fn kind(&self) -> AnimationKind {
        self.kind
    }

    /// Value at `now_ms` and whether the run has reached its end
    pub fn sample(&mut self, now_ms: u64) -> (f32, bool) {
        self.last_sample_ms = now_ms.max(self.last_sample_ms);
        let elapsed = now_ms.saturating_sub(self.start_ms);
        if self.duration_ms == 0 || elapsed >= self.duration_ms {
            return (self.to, true);
        }
        let fraction = elapsed as f32 / self.duration_ms as f32;
        let progress = self.interpolator.transform(fraction);
        (self.from + (self.to - self.from) * progress, false)
    }

    pub fn snapshot(&self) -> AnimatorSnapshot {
        AnimatorSnapshot {
            from: self.from,
            to: self.to,
            duration_ms: self.duration_ms,
            elapsed_ms: self.last_sample_ms.saturating_sub(self.start_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_progress() {
        let mut anim = HeightAnimator::new(AnimationKind::HintPhase2, 0.0, 100.0, 1000, 200, Interpolator::Linear);
        assert_eq!(anim.sample(1000), (0.0, false));
        assert_eq!(anim.sample(1100), (50.0, false));
        assert_eq!(anim.sample(1200), (100.0, true));
        assert_eq!(anim.snapshot().elapsed_ms, 200);
    }

    #[test]
    fn test_zero_duration_finishes_immediately() {
        let mut anim = HeightAnimator::new(
            AnimationKind::Fling { expand: true },
            10.0,
            500.0,
            0,
            0,
            Interpolator::FAST_OUT_SLOW_IN,
        );
        assert_eq!(anim.sample(0), (500.0, true));
    }

    #[test]
    fn test_sample_before_start_stays_at_origin() {
        let mut anim = HeightAnimator::new(AnimationKind::HintPhase2, 40.0, 0.0, 500, 100, Interpolator::Linear);
        assert_eq!(anim.sample(400), (40.0, false));
    }
}
