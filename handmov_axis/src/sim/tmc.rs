//! Simulated TMC-class driver chip on the serial bus.
//!
//! Replies are staged one transaction behind: a read request loads the
//! register value into the output latch and the *next* transaction clocks it
//! out in bytes 1–4. Byte 0 is the SPI status byte. GSTAT clears on read.
//! DRV_STATUS is synthesized from an attached [`SimulatedAxis`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use handmov_common::consts::FRAME_LEN;
use handmov_common::device::{DeviceDescriptor, REG_IHOLD_IRUN};
use handmov_common::error::BusError;
use handmov_common::register::{Access, RegisterFrame, SpiStatus};
use parking_lot::Mutex;

use super::axis::SimulatedAxis;
use crate::bus::SpiTransport;

const DRV_STALL_BIT: u32 = 1 << 24;
const DRV_STANDSTILL_BIT: u32 = 1 << 31;
const DRV_CS_ACTUAL_SHIFT: u32 = 16;
const DRV_SG_MASK: u32 = 0x3FF;

#[derive(Debug)]
struct Chip {
    device: &'static DeviceDescriptor,
    registers: BTreeMap<u8, u32>,
    read_only: BTreeSet<u8>,
    latch: u32,
    log: Vec<[u8; FRAME_LEN]>,
    axis: Option<SimulatedAxis>,
    stall_override: Option<bool>,
    last_pulses: u64,
    failures_pending: u32,
}

impl Chip {
    fn stalled(&self) -> bool {
        self.stall_override
            .unwrap_or_else(|| self.axis.as_ref().is_some_and(SimulatedAxis::is_stalled))
    }

    fn standstill(&self) -> bool {
        self.axis
            .as_ref()
            .is_none_or(|axis| axis.pulses() == self.last_pulses)
    }

    fn drv_status(&mut self) -> u32 {
        let stalled = self.stalled();
        let sg = match (&self.axis, stalled) {
            (_, true) => 0,
            (Some(axis), false) => u32::from(axis.stallguard()),
            (None, false) => u32::from(super::axis::SIM_SG_FREE),
        };
        let irun = (self.registers.get(&REG_IHOLD_IRUN).copied().unwrap_or(0) >> 8) & 0x1F;

        let mut word = (sg & DRV_SG_MASK) | (irun << DRV_CS_ACTUAL_SHIFT);
        if stalled {
            word |= DRV_STALL_BIT;
        }
        if self.standstill() {
            word |= DRV_STANDSTILL_BIT;
        }
        if let Some(axis) = &self.axis {
            self.last_pulses = axis.pulses();
        }
        word
    }

    fn spi_status(&self) -> SpiStatus {
        let gstat = self
            .registers
            .get(&self.device.global_status_register)
            .copied()
            .unwrap_or(0);
        let mut status = SpiStatus::empty();
        status.set(SpiStatus::RESET_FLAG, gstat & 0x01 != 0);
        status.set(SpiStatus::DRIVER_ERROR, gstat & 0x02 != 0);
        status.set(SpiStatus::STALL, self.stalled());
        status.set(SpiStatus::STANDSTILL, self.standstill());
        status
    }

    fn read(&mut self, address: u8) -> u32 {
        if address == self.device.status_register {
            return self.drv_status();
        }
        let value = self.registers.get(&address).copied().unwrap_or(0);
        if address == self.device.global_status_register {
            self.registers.insert(address, 0);
        }
        value
    }

    fn exchange(&mut self, buf: &mut [u8; FRAME_LEN]) {
        self.log.push(*buf);
        let frame = RegisterFrame::decode(buf);

        let out = self.latch.to_be_bytes();
        let status = self.spi_status().bits();

        self.latch = match (frame.access(), frame.payload()) {
            (Access::Write, Some(value)) => {
                if !self.read_only.contains(&frame.address()) {
                    self.registers.insert(frame.address(), value);
                }
                value
            }
            _ => self.read(frame.address()),
        };

        *buf = [status, out[0], out[1], out[2], out[3]];
    }
}

/// Cloneable handle to one simulated chip.
#[derive(Debug, Clone)]
pub struct SimulatedTmc {
    chip: Arc<Mutex<Chip>>,
}

impl SimulatedTmc {
    pub fn new(device: &'static DeviceDescriptor) -> Self {
        Self {
            chip: Arc::new(Mutex::new(Chip {
                device,
                registers: BTreeMap::new(),
                read_only: BTreeSet::new(),
                latch: 0,
                log: Vec::new(),
                axis: None,
                stall_override: None,
                last_pulses: 0,
                failures_pending: 0,
            })),
        }
    }

    /// Derive DRV_STATUS from `axis`.
    pub fn attach(self, axis: SimulatedAxis) -> Self {
        {
            let mut chip = self.chip.lock();
            chip.last_pulses = axis.pulses();
            chip.axis = Some(axis);
        }
        self
    }

    /// Register contents as the chip holds them.
    pub fn register(&self, address: u8) -> u32 {
        self.chip
            .lock()
            .registers
            .get(&address)
            .copied()
            .unwrap_or(0)
    }

    /// Force the stall flag regardless of the attached axis.
    pub fn set_stall(&self, stalled: bool) {
        self.chip.lock().stall_override = Some(stalled);
    }

    /// Writes to `address` are ignored from now on.
    pub fn set_read_only(&self, address: u8) {
        self.chip.lock().read_only.insert(address);
    }

    /// OR `bits` into GSTAT.
    pub fn raise_gstat(&self, bits: u32) {
        let mut chip = self.chip.lock();
        let address = chip.device.global_status_register;
        *chip.registers.entry(address).or_insert(0) |= bits;
    }

    /// Fail the next `count` transfers.
    pub fn fail_next(&self, count: u32) {
        self.chip.lock().failures_pending = count;
    }

    /// Every frame received, in order.
    pub fn transactions(&self) -> Vec<[u8; FRAME_LEN]> {
        self.chip.lock().log.clone()
    }

    pub fn clear_log(&self) {
        self.chip.lock().log.clear();
    }
}

impl SpiTransport for SimulatedTmc {
    fn transfer(&mut self, buf: &mut [u8; FRAME_LEN], _timeout: Duration) -> Result<(), BusError> {
        let mut chip = self.chip.lock();
        if chip.failures_pending > 0 {
            chip.failures_pending -= 1;
            return Err(BusError::Transfer("simulated bus fault".to_string()));
        }
        chip.exchange(buf);
        Ok(())
    }
}
