//! Simulation backend.
//!
//! In-memory stand-ins for the board: output/input lines, a stepper axis
//! with an optional hard stop, and a TMC-class chip answering on the bus one
//! transaction behind. Used by `handmov --simulate` and by the test suites.

pub mod axis;
pub mod pins;
pub mod tmc;

use std::time::Duration;

use handmov_common::device::DeviceDescriptor;
use handmov_common::io::Level;

pub use axis::SimulatedAxis;
pub use pins::{SimInput, SimOutput};
pub use tmc::SimulatedTmc;

use crate::bus::{BusDevice, SharedBus};
use crate::hw::StepperPins;

/// One simulated axis wired to one simulated driver chip.
///
/// The carriage starts `travel` steps above a hard stop at physical zero.
#[derive(Debug, Clone)]
pub struct SimBoard {
    pub axis: SimulatedAxis,
    pub chip: SimulatedTmc,
    pub chip_select: SimOutput,
}

impl SimBoard {
    pub fn new(device: &'static DeviceDescriptor, travel: i64) -> Self {
        let axis = SimulatedAxis::at(travel).with_lower_stop(0);
        let chip = SimulatedTmc::new(device).attach(axis.clone());
        Self {
            axis,
            chip,
            chip_select: SimOutput::new(Level::High),
        }
    }

    pub fn pins(&self) -> StepperPins {
        self.axis.pins()
    }

    pub fn bus(&self, timeout: Duration) -> SharedBus {
        SharedBus::new(
            BusDevice::new(Box::new(self.chip.clone()), Box::new(self.chip_select.clone())),
            timeout,
        )
    }
}
