//! Error taxonomy for the axis core.
//!
//! | Error               | Raised by            | Policy                                   |
//! |---------------------|----------------------|------------------------------------------|
//! | `BusError`          | register client      | surfaced, never retried by the client    |
//! | `MotionError`       | motion generator     | configuration rejected before any pulse  |
//! | `HomingError`       | homing supervisor    | axis left stopped, not re-zeroed         |
//! | `PersistenceError`  | position store       | logged, in-memory table keeps working    |
//!
//! `AxisError` wraps all of them for the controller's caller-facing API.

use std::time::Duration;
use thiserror::Error;

/// Failure of a single bus transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// The bus lock or the transfer did not complete within the bound.
    #[error("Bus transaction timed out after {0:?}")]
    Timeout(Duration),

    /// The transport reported a failure.
    #[error("Bus transfer failed: {0}")]
    Transfer(String),

    /// Register address outside the 7-bit space.
    #[error("Register address {0:#04x} exceeds 0x7F")]
    InvalidAddress(u8),
}

/// Failure of a move.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MotionError {
    /// Request parameters rejected before any hardware side effect.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Pulses requested while the driver is de-energized.
    #[error("Driver disabled: enable the axis before moving")]
    DriverDisabled,

    /// The move was cancelled at a step boundary.
    #[error("Move cancelled after {steps_done} steps")]
    Cancelled {
        /// Steps emitted before the cancel took effect.
        steps_done: u32,
    },
}

/// Failure of a homing run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HomingError {
    /// Stall never confirmed within the step budget.
    #[error("Homing timed out: no stall confirmed within {steps} steps")]
    Timeout {
        /// Steps issued while seeking.
        steps: u32,
    },

    /// Status read failed while seeking.
    #[error("Homing aborted: {0}")]
    Bus(#[from] BusError),

    /// Homing parameters rejected.
    #[error("Homing configuration error: {0}")]
    Configuration(String),

    /// A seek step or the backoff move was refused or cancelled.
    #[error("Homing motion failed: {0}")]
    Motion(#[from] MotionError),

    /// Cancelled from the caller's cancel check.
    #[error("Homing cancelled while seeking")]
    Cancelled,
}

/// Failure of the durable position store.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Store file could not be read.
    #[error("Failed to read position store: {0}")]
    Read(#[source] std::io::Error),

    /// Store file content is not a valid slot table.
    #[error("Position store is corrupt: {0}")]
    Parse(String),

    /// Store file could not be written or replaced.
    #[error("Failed to write position store: {0}")]
    Write(String),
}

/// Umbrella error for the controller API.
#[derive(Debug, Error)]
pub enum AxisError {
    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Motion(#[from] MotionError),

    #[error(transparent)]
    Homing(#[from] HomingError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

impl AxisError {
    /// True for errors that stem from rejected parameters rather than hardware.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Motion(MotionError::Configuration(_))
                | Self::Homing(HomingError::Configuration(_))
                | Self::Config(_)
        )
    }
}
