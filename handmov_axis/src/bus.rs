//! Synchronous serial bus with a single chip-select device.
//!
//! A transaction is chip-select assert, one full-duplex 5-byte exchange, and
//! chip-select deassert. The device sits behind a mutex; callers that need
//! several transactions back to back (a register read is two) hold one
//! [`BusSession`] for all of them so no other thread can interleave.

use std::sync::Arc;
use std::time::Duration;

use handmov_common::consts::FRAME_LEN;
use handmov_common::error::BusError;
use handmov_common::io::Level;
use parking_lot::{Mutex, MutexGuard};
use tracing::trace;

use crate::hw::DigitalOutput;

/// Full-duplex byte exchange over the data lines (clock, MOSI, MISO).
///
/// `buf` holds the outgoing frame on entry and the incoming frame on return.
/// Implementations must give up after `timeout`.
pub trait SpiTransport: Send {
    fn transfer(&mut self, buf: &mut [u8; FRAME_LEN], timeout: Duration) -> Result<(), BusError>;
}

/// Transport plus its chip-select line (active low).
pub struct BusDevice {
    transport: Box<dyn SpiTransport>,
    chip_select: Box<dyn DigitalOutput>,
}

impl BusDevice {
    pub fn new(transport: Box<dyn SpiTransport>, mut chip_select: Box<dyn DigitalOutput>) -> Self {
        chip_select.set_level(Level::High);
        Self {
            transport,
            chip_select,
        }
    }

    fn transaction(
        &mut self,
        frame: [u8; FRAME_LEN],
        timeout: Duration,
    ) -> Result<[u8; FRAME_LEN], BusError> {
        let mut buf = frame;
        self.chip_select.set_level(Level::Low);
        let result = self.transport.transfer(&mut buf, timeout);
        self.chip_select.set_level(Level::High);
        result?;
        trace!(tx = ?frame, rx = ?buf, "spi transaction");
        Ok(buf)
    }
}

/// Cloneable handle to the bus device.
#[derive(Clone)]
pub struct SharedBus {
    device: Arc<Mutex<BusDevice>>,
    timeout: Duration,
}

impl SharedBus {
    pub fn new(device: BusDevice, timeout: Duration) -> Self {
        Self {
            device: Arc::new(Mutex::new(device)),
            timeout,
        }
    }

    /// Upper bound on lock wait and on each transfer.
    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Take exclusive use of the bus, waiting at most `timeout`.
    pub fn session(&self) -> Result<BusSession<'_>, BusError> {
        let guard = self
            .device
            .try_lock_for(self.timeout)
            .ok_or(BusError::Timeout(self.timeout))?;
        Ok(BusSession {
            guard,
            timeout: self.timeout,
        })
    }

    /// Run one transaction in its own session.
    pub fn transaction(&self, frame: [u8; FRAME_LEN]) -> Result<[u8; FRAME_LEN], BusError> {
        self.session()?.transaction(frame)
    }
}

impl std::fmt::Debug for SharedBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedBus")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Exclusive access to the bus for a sequence of transactions.
pub struct BusSession<'a> {
    guard: MutexGuard<'a, BusDevice>,
    timeout: Duration,
}

impl BusSession<'_> {
    pub fn transaction(&mut self, frame: [u8; FRAME_LEN]) -> Result<[u8; FRAME_LEN], BusError> {
        self.guard.transaction(frame, self.timeout)
    }
}
