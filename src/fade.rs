//! Transition clock: converts a fade duration and per-frame ticks into a
//! clamped crossfade fraction.

use std::time::Duration;

/// Accumulates a [0, 1] fade fraction, one fixed step per display tick.
///
/// The fraction increases monotonically once a transition starts and holds
/// at 1 until [`FadeClock::restart`] begins the next transition.
#[derive(Debug, Clone)]
pub struct FadeClock {
    step: f32,
    fade: f32,
}

impl FadeClock {
    pub fn new(fade_duration: Duration, tick: Duration) -> Self {
        let ticks = fade_duration.as_secs_f32() / tick.as_secs_f32().max(f32::EPSILON);
        let step = if ticks <= 1.0 { 1.0 } else { 1.0 / ticks };
        Self { step, fade: 0.0 }
    }

    pub fn from_fps(fade_duration: Duration, frames_per_second: u32) -> Self {
        Self::new(
            fade_duration,
            Duration::from_secs_f64(1.0 / f64::from(frames_per_second.max(1))),
        )
    }

    /// Begin a new transition at fade 0.
    pub fn restart(&mut self) {
        self.fade = 0.0;
    }

    /// Jump straight to a finished transition.
    pub fn complete(&mut self) {
        self.fade = 1.0;
    }

    /// Advance by one display tick and return the new fraction.
    pub fn tick(&mut self) -> f32 {
        if self.fade < 1.0 {
            self.fade = (self.fade + self.step).min(1.0);
        }
        self.fade
    }

    pub fn fraction(&self) -> f32 {
        self.fade
    }

    pub fn is_complete(&self) -> bool {
        self.fade >= 1.0
    }
}
