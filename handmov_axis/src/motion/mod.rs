//! Motion profile generation.
//!
//! - [`ramp`] - Pure per-step delay planning (trapezoid + overshoot)
//! - [`generator`] - Pulse emission and ownership of the axis position

pub mod generator;
pub mod ramp;

pub use generator::{AxisHandle, MotionGenerator, MoveReport, NoCancel, StepControl, StepHook};
pub use ramp::RampPlan;
