//! Register protocol client.
//!
//! Reads take two transactions because the chip answers one transaction
//! behind: the first names the register, the second clocks the staged value
//! out in bytes 1–4. Byte 0 of every reply is the SPI status byte, recorded
//! as [`RegisterClient::last_spi_status`].
//!
//! The client never retries; every failure surfaces as [`BusError`].

use handmov_common::consts::FRAME_LEN;
use handmov_common::device::DeviceDescriptor;
use handmov_common::error::BusError;
use handmov_common::register::{
    decode_status, reply_value, GlobalStatus, RegisterFrame, RegisterWrite, SpiStatus, StatusWord,
};
use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::bus::SharedBus;

/// Pattern written to the self-test register by [`RegisterClient::verify_link`].
pub const LINK_TEST_PATTERN: u32 = 0x1234_5678;

/// Register-level access to one driver chip.
#[derive(Debug)]
pub struct RegisterClient {
    bus: SharedBus,
    device: &'static DeviceDescriptor,
    init_sequence: Vec<RegisterWrite>,
    last_spi_status: Mutex<SpiStatus>,
}

impl RegisterClient {
    /// Client using the family's default init sequence.
    pub fn new(bus: SharedBus, device: &'static DeviceDescriptor) -> Self {
        Self::with_init_sequence(bus, device, device.init_sequence.to_vec())
    }

    pub fn with_init_sequence(
        bus: SharedBus,
        device: &'static DeviceDescriptor,
        init_sequence: Vec<RegisterWrite>,
    ) -> Self {
        Self {
            bus,
            device,
            init_sequence,
            last_spi_status: Mutex::new(SpiStatus::empty()),
        }
    }

    #[inline]
    pub fn device(&self) -> &'static DeviceDescriptor {
        self.device
    }

    /// SPI status byte from the most recent reply.
    pub fn last_spi_status(&self) -> SpiStatus {
        *self.last_spi_status.lock()
    }

    fn record_status(&self, reply: &[u8]) {
        let status = SpiStatus::from_bits_truncate(reply[0]);
        *self.last_spi_status.lock() = status;
    }

    pub fn write_register(&self, address: u8, value: u32) -> Result<(), BusError> {
        let frame = RegisterFrame::write(address, value)?;
        let reply = self.bus.transaction(frame.encode())?;
        self.record_status(&reply);
        trace!("write {:#04x} <- {:#010x}", address, value);
        Ok(())
    }

    pub fn read_register(&self, address: u8) -> Result<u32, BusError> {
        let request = RegisterFrame::read(address)?.encode();
        let mut session = self.bus.session()?;
        session.transaction(request)?;
        // Any frame clocks the staged reply out; zeros are a read of GCONF
        // and have no side effects.
        let reply = session.transaction([0; FRAME_LEN])?;
        drop(session);
        self.record_status(&reply);
        let value = reply_value(&reply);
        trace!("read {:#04x} -> {:#010x}", address, value);
        Ok(value)
    }

    /// Read and decode the status register through the device's field table.
    pub fn read_status(&self) -> Result<StatusWord, BusError> {
        let word = self.read_register(self.device.status_register)?;
        Ok(decode_status(word, self.device.status_fields))
    }

    /// Write the power-on register set in order.
    pub fn initialize(&self) -> Result<(), BusError> {
        for write in &self.init_sequence {
            self.write_register(write.address, write.value)?;
        }
        info!(
            "{} initialized ({} registers)",
            self.device.name,
            self.init_sequence.len()
        );
        Ok(())
    }

    /// Write a test pattern to the self-test register, read it back, then
    /// restore the configured value.
    pub fn verify_link(&self) -> Result<(), BusError> {
        let address = self.device.self_test_register;
        self.write_register(address, LINK_TEST_PATTERN)?;
        let echoed = self.read_register(address)?;

        let restore = self
            .init_sequence
            .iter()
            .rev()
            .find(|w| w.address == address)
            .map_or(0, |w| w.value);
        self.write_register(address, restore)?;

        if echoed != LINK_TEST_PATTERN {
            warn!(
                "{} link test failed: wrote {:#010x}, read {:#010x}",
                self.device.name, LINK_TEST_PATTERN, echoed
            );
            return Err(BusError::Transfer(format!(
                "link test readback {:#010x} != {:#010x}",
                echoed, LINK_TEST_PATTERN
            )));
        }
        debug!("{} link verified", self.device.name);
        Ok(())
    }

    /// Read-to-clear the global status register and re-apply the init set.
    pub fn clear_faults(&self) -> Result<GlobalStatus, BusError> {
        let gstat =
            GlobalStatus::from_bits_truncate(self.read_register(self.device.global_status_register)?);
        let status = self.read_status()?;
        if !gstat.is_empty() || status.temp_warning() || status.temp_shutdown() {
            warn!(
                "{} faults cleared: gstat={:?} drv_status={:#010x}",
                self.device.name,
                gstat,
                status.raw()
            );
        }
        self.initialize()?;
        Ok(gstat)
    }
}
