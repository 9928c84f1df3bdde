//! Trapezoidal step-delay planning.
//!
//! For `total = steps_needed + overshoot` steps and `ramp = total / 2`:
//!
//! ```text
//! delay
//!   ^
//! initial ─┐                         ┌─
//!          └─┐                     ┌─┘
//!            └─┐                 ┌─┘
//!   min        └─────────────────┘
//!          ├── ramp ──┤ plateau ├── ramp ──┤
//!   0                                   total → step
//! ```
//!
//! The ramp never exceeds half the move, so short moves accelerate and
//! immediately decelerate. Delays are in microseconds.

use std::time::Duration;

use handmov_common::error::MotionError;
use handmov_common::motion::SpeedProfile;

/// Delay schedule for one move. Building it has no side effects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampPlan {
    steps_needed: u32,
    overshoot: u32,
    total_steps: u32,
    ramp_steps: u32,
    initial_delay_us: f64,
    min_delay_us: f64,
    decrement_us: f64,
}

impl RampPlan {
    /// Plan a move of `steps_needed` steps plus the profile's overshoot.
    ///
    /// # Errors
    ///
    /// `MotionError::Configuration` for invalid delays or a step count that
    /// overflows once overshoot is added on the way out and again on the
    /// way back.
    pub fn new(steps_needed: u32, profile: &SpeedProfile) -> Result<Self, MotionError> {
        profile.validate()?;
        let total_steps = steps_needed.checked_add(profile.overshoot).ok_or_else(|| {
            MotionError::Configuration(format!(
                "move of {} steps with overshoot {} overflows",
                steps_needed, profile.overshoot
            ))
        })?;
        if total_steps.checked_add(profile.overshoot).is_none() {
            return Err(MotionError::Configuration(format!(
                "move of {} steps with overshoot {} overflows the pulse count",
                steps_needed, profile.overshoot
            )));
        }
        let ramp_steps = total_steps / 2;
        let decrement_us = if ramp_steps > 0 {
            (profile.initial_delay_us - profile.min_delay_us) / f64::from(ramp_steps)
        } else {
            0.0
        };
        Ok(Self {
            steps_needed,
            overshoot: profile.overshoot,
            total_steps,
            ramp_steps,
            initial_delay_us: profile.initial_delay_us,
            min_delay_us: profile.min_delay_us,
            decrement_us,
        })
    }

    #[inline]
    pub fn steps_needed(&self) -> u32 {
        self.steps_needed
    }

    #[inline]
    pub fn overshoot(&self) -> u32 {
        self.overshoot
    }

    /// Forward steps including overshoot.
    #[inline]
    pub fn total_steps(&self) -> u32 {
        self.total_steps
    }

    #[inline]
    pub fn ramp_steps(&self) -> u32 {
        self.ramp_steps
    }

    #[inline]
    pub fn min_delay_us(&self) -> f64 {
        self.min_delay_us
    }

    #[inline]
    pub fn decrement_us(&self) -> f64 {
        self.decrement_us
    }

    /// Delay after forward step `i`, in microseconds.
    pub fn delay_us(&self, i: u32) -> f64 {
        if self.ramp_steps == 0 {
            return self.min_delay_us;
        }
        let decel_start = self.total_steps - self.ramp_steps;
        if i < self.ramp_steps {
            let d = self.initial_delay_us - self.decrement_us * f64::from(i + 1);
            d.max(self.min_delay_us)
        } else if i >= decel_start {
            let decel_index = i - decel_start;
            self.min_delay_us + self.decrement_us * f64::from(decel_index + 1)
        } else {
            self.min_delay_us
        }
    }

    #[inline]
    pub fn delay(&self, i: u32) -> Duration {
        us_to_duration(self.delay_us(i))
    }

    /// Delay used for the reverse settle steps.
    #[inline]
    pub fn settle_delay(&self) -> Duration {
        us_to_duration(self.min_delay_us)
    }

    /// Forward delays in step order.
    pub fn delays_us(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.total_steps).map(move |i| self.delay_us(i))
    }

    /// Sum of forward and settle delays, pulse widths and pauses excluded.
    pub fn nominal_duration(&self) -> Duration {
        let forward: f64 = self.delays_us().sum();
        let settle = self.min_delay_us * f64::from(self.overshoot);
        us_to_duration(forward + settle)
    }
}

#[inline]
fn us_to_duration(us: f64) -> Duration {
    Duration::from_nanos((us * 1_000.0).round() as u64)
}
