//! Homing types: stall detection mode and the `[homing]` config section.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::consts::{
    DEFAULT_HOMING_BACKOFF_STEPS, DEFAULT_HOMING_MAX_STEPS, DEFAULT_STALL_CONFIRM_READS,
};
use crate::motion::Direction;

/// How a stall is recognised in the status word.
///
/// ```toml
/// [homing]
/// detection = { kind = "stallguard", threshold = 5 }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StallDetection {
    /// The digital stall flag is set.
    #[default]
    Flag,
    /// The analog stallGuard reading dropped below `threshold`.
    StallGuard {
        threshold: u16,
    },
}

/// `[homing]` config section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomingConfig {
    /// Direction of travel toward the mechanical stop.
    #[serde(default = "default_direction")]
    pub direction: Direction,
    /// Stall predicate.
    #[serde(default)]
    pub detection: StallDetection,
    /// Consecutive positive reads needed to confirm a stall.
    #[serde(default = "default_confirm_reads")]
    pub confirm_reads: u32,
    /// Step budget while seeking before `HomingTimeout`.
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    /// Steps moved away from the stop before zeroing.
    #[serde(default = "default_backoff")]
    pub backoff_steps: u32,
    /// Step period while seeking [µs].
    #[serde(default = "default_seek_delay")]
    pub seek_delay_us: u64,
}

fn default_direction() -> Direction {
    Direction::Negative
}
fn default_confirm_reads() -> u32 {
    DEFAULT_STALL_CONFIRM_READS
}
fn default_max_steps() -> u32 {
    DEFAULT_HOMING_MAX_STEPS
}
fn default_backoff() -> u32 {
    DEFAULT_HOMING_BACKOFF_STEPS
}
fn default_seek_delay() -> u64 {
    1000
}

impl Default for HomingConfig {
    fn default() -> Self {
        Self {
            direction: default_direction(),
            detection: StallDetection::Flag,
            confirm_reads: DEFAULT_STALL_CONFIRM_READS,
            max_steps: DEFAULT_HOMING_MAX_STEPS,
            backoff_steps: DEFAULT_HOMING_BACKOFF_STEPS,
            seek_delay_us: default_seek_delay(),
        }
    }
}

impl HomingConfig {
    #[inline]
    pub fn seek_delay(&self) -> Duration {
        Duration::from_micros(self.seek_delay_us)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.confirm_reads == 0 {
            return Err("homing.confirm_reads must be >= 1".to_string());
        }
        if self.max_steps == 0 {
            return Err("homing.max_steps must be >= 1".to_string());
        }
        if self.seek_delay_us == 0 {
            return Err("homing.seek_delay_us must be > 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_seek_negative_with_flag() {
        let cfg = HomingConfig::default();
        assert_eq!(cfg.direction, Direction::Negative);
        assert_eq!(cfg.detection, StallDetection::Flag);
        assert_eq!(cfg.backoff_steps, 100);
        assert!(cfg.confirm_reads >= 2);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn stallguard_detection_from_toml() {
        let cfg: HomingConfig = toml::from_str(
            r#"
direction = "positive"
detection = { kind = "stallguard", threshold = 5 }
confirm_reads = 3
"#,
        )
        .unwrap();
        assert_eq!(cfg.direction, Direction::Positive);
        assert_eq!(cfg.detection, StallDetection::StallGuard { threshold: 5 });
        assert_eq!(cfg.confirm_reads, 3);
        assert_eq!(cfg.max_steps, DEFAULT_HOMING_MAX_STEPS);
    }

    #[test]
    fn zero_confirm_reads_rejected() {
        let cfg = HomingConfig {
            confirm_reads: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
