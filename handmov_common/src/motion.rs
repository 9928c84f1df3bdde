//! Motion request types and the `[motion]` config section.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::consts::{
    DEFAULT_INITIAL_DELAY_US, DEFAULT_MIN_DELAY_US, DEFAULT_PULSE_WIDTH_US,
    DEFAULT_REVERSE_PAUSE_MS,
};
use crate::error::MotionError;

/// Travel direction of the axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Increasing step count.
    Positive,
    /// Decreasing step count.
    Negative,
}

impl Direction {
    /// Direction needed to go from `from` to `to`; `None` if equal.
    #[inline]
    pub fn toward(from: i64, to: i64) -> Option<Self> {
        match to.cmp(&from) {
            std::cmp::Ordering::Greater => Some(Self::Positive),
            std::cmp::Ordering::Less => Some(Self::Negative),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// Step count delta of one step in this direction.
    #[inline]
    pub const fn sign(self) -> i64 {
        match self {
            Self::Positive => 1,
            Self::Negative => -1,
        }
    }

    #[inline]
    pub const fn reversed(self) -> Self {
        match self {
            Self::Positive => Self::Negative,
            Self::Negative => Self::Positive,
        }
    }
}

/// Ramp parameters of a move. Delays are step periods in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedProfile {
    /// Step delay at the start and end of the ramp (slowest).
    #[serde(default = "default_initial_delay")]
    pub initial_delay_us: f64,
    /// Step delay at cruise speed (fastest).
    #[serde(default = "default_min_delay")]
    pub min_delay_us: f64,
    /// Extra steps past the target, taken back from the opposite side.
    #[serde(default)]
    pub overshoot: u32,
}

fn default_initial_delay() -> f64 {
    DEFAULT_INITIAL_DELAY_US
}
fn default_min_delay() -> f64 {
    DEFAULT_MIN_DELAY_US
}

impl Default for SpeedProfile {
    fn default() -> Self {
        Self {
            initial_delay_us: DEFAULT_INITIAL_DELAY_US,
            min_delay_us: DEFAULT_MIN_DELAY_US,
            overshoot: 0,
        }
    }
}

impl SpeedProfile {
    /// Constant-speed profile (no ramp).
    pub fn constant(delay_us: f64) -> Self {
        Self {
            initial_delay_us: delay_us,
            min_delay_us: delay_us,
            overshoot: 0,
        }
    }

    /// Same ramp with a backlash overshoot.
    pub fn with_overshoot(mut self, overshoot: u32) -> Self {
        self.overshoot = overshoot;
        self
    }

    /// Checks `initial_delay_us >= min_delay_us > 0` with finite values.
    pub fn validate(&self) -> Result<(), MotionError> {
        if !self.initial_delay_us.is_finite() || !self.min_delay_us.is_finite() {
            return Err(MotionError::Configuration(
                "step delays must be finite".to_string(),
            ));
        }
        if self.min_delay_us <= 0.0 {
            return Err(MotionError::Configuration(format!(
                "min_delay_us must be > 0 (got {})",
                self.min_delay_us
            )));
        }
        if self.initial_delay_us <= 0.0 {
            return Err(MotionError::Configuration(format!(
                "initial_delay_us must be > 0 (got {})",
                self.initial_delay_us
            )));
        }
        if self.initial_delay_us < self.min_delay_us {
            return Err(MotionError::Configuration(format!(
                "initial_delay_us ({}) must be >= min_delay_us ({})",
                self.initial_delay_us, self.min_delay_us
            )));
        }
        Ok(())
    }
}

/// A move to an absolute step position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionRequest {
    pub target_position: i64,
    pub profile: SpeedProfile,
}

impl MotionRequest {
    pub fn new(target_position: i64, profile: SpeedProfile) -> Self {
        Self {
            target_position,
            profile,
        }
    }

    pub fn validate(&self) -> Result<(), MotionError> {
        self.profile.validate()
    }
}

/// `[motion]` config section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionConfig {
    /// Default ramp for moves issued without an explicit profile.
    #[serde(flatten)]
    pub profile: SpeedProfile,
    /// Step pulse high time [µs].
    #[serde(default = "default_pulse_width")]
    pub pulse_width_us: u64,
    /// Pause before the backlash return leg [ms].
    #[serde(default = "default_reverse_pause")]
    pub reverse_pause_ms: u64,
}

fn default_pulse_width() -> u64 {
    DEFAULT_PULSE_WIDTH_US
}
fn default_reverse_pause() -> u64 {
    DEFAULT_REVERSE_PAUSE_MS
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            profile: SpeedProfile::default(),
            pulse_width_us: DEFAULT_PULSE_WIDTH_US,
            reverse_pause_ms: DEFAULT_REVERSE_PAUSE_MS,
        }
    }
}

impl MotionConfig {
    #[inline]
    pub fn pulse_width(&self) -> Duration {
        Duration::from_micros(self.pulse_width_us)
    }

    #[inline]
    pub fn reverse_pause(&self) -> Duration {
        Duration::from_millis(self.reverse_pause_ms)
    }

    pub fn validate(&self) -> Result<(), MotionError> {
        self.profile.validate()
    }
}
