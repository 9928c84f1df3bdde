//! HandMov Common Library
//!
//! Shared types for the HandMov single-axis stepper core: configuration
//! loading, the error taxonomy, register frames and status decoding, and the
//! data-driven driver-chip descriptors.
//!
//! # Module Structure
//!
//! - [`config`] - TOML loader and the top-level [`config::UnitConfig`]
//! - [`consts`] - Wire-format sizes, polarities and default tunables
//! - [`device`] - Driver-chip capability descriptors
//! - [`error`] - Error taxonomy (bus, motion, homing, persistence)
//! - [`homing`] - Stall detection mode and homing config
//! - [`input`] - Button bindings and input timing config
//! - [`io`] - Electrical levels and logical edges
//! - [`motion`] - Motion requests and speed profiles
//! - [`register`] - Register frames and status-word decoding
//! - [`prelude`] - Common re-exports for convenience

pub mod config;
pub mod consts;
pub mod device;
pub mod error;
pub mod homing;
pub mod input;
pub mod io;
pub mod motion;
pub mod prelude;
pub mod register;
