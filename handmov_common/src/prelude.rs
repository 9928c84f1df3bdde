//! Prelude module for common re-exports.
//!
//! ```rust
//! use handmov_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, UnitConfig};

// ─── Errors ─────────────────────────────────────────────────────────
pub use crate::error::{AxisError, BusError, HomingError, MotionError, PersistenceError};

// ─── Motion ─────────────────────────────────────────────────────────
pub use crate::motion::{Direction, MotionRequest, SpeedProfile};

// ─── Registers ──────────────────────────────────────────────────────
pub use crate::device::{DeviceDescriptor, DeviceFamily};
pub use crate::register::{RegisterFrame, StatusWord, decode_status};

// ─── Signals ────────────────────────────────────────────────────────
pub use crate::io::{Edge, Level};
