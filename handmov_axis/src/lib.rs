//! # HandMov Axis
//!
//! Single-axis stepper control core: a register client for TMC-class driver
//! chips, a trapezoidal step generator, stall-based homing, and a debounced
//! button layer that saves and recalls named positions.
//!
//! # Module Structure
//!
//! - [`bus`] - Chip-select framed transactions behind a bounded mutex
//! - [`clock`] - Injectable time source
//! - [`controller`] - Axis context object and scheduler loop
//! - [`events`] - Bounded event queue and cancellation token
//! - [`homing`] - Stall predicates and the homing supervisor
//! - [`hw`] - Digital line traits and the step/dir/enable pin set
//! - [`input`] - Debouncing and press classification
//! - [`motion`] - Ramp planning and pulse generation
//! - [`register`] - Register protocol client
//! - [`sim`] - Simulated axis, driver chip and pins
//! - [`store`] - Atomic JSON position store
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Controller                              │
//! │  ┌────────────┐   ┌──────────────────┐   ┌────────────────────┐  │
//! │  │ EventQueue │──►│  ButtonMachine   │──►│   PositionStore    │  │
//! │  └────────────┘   └────────┬─────────┘   └────────────────────┘  │
//! │                            ▼                                     │
//! │  ┌──────────────────┐   ┌──────────────────┐                     │
//! │  │ HomingSupervisor │──►│ MotionGenerator  │──► step/dir/enable  │
//! │  └────────┬─────────┘   └──────────────────┘                     │
//! │           ▼                                                      │
//! │  ┌──────────────────┐   ┌──────────────────┐                     │
//! │  │  RegisterClient  │──►│    SharedBus     │──► SPI + CS         │
//! │  └──────────────────┘   └──────────────────┘                     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

pub mod bus;
pub mod clock;
pub mod controller;
pub mod events;
pub mod homing;
pub mod hw;
pub mod input;
pub mod motion;
pub mod register;
pub mod sim;
pub mod store;

pub use crate::controller::Controller;
pub use crate::motion::{AxisHandle, MotionGenerator};
pub use crate::register::RegisterClient;
pub use crate::store::PositionStore;
