//! Register frames and status-word decoding.
//!
//! A register transaction is always [`FRAME_LEN`] bytes: one header byte
//! carrying the 7-bit address (bit 7 set for writes) followed by a 32-bit
//! big-endian payload. Replies have the same shape; byte 0 is the chip's
//! SPI status byte and bytes 1–4 carry the register value staged by the
//! *previous* transaction.
//!
//! Status decoding is table-driven: a device family supplies a slice of
//! [`FieldSpec`] entries and [`decode_status`] extracts every listed field.
//! Fields a family does not list decode as absent.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::consts::{FRAME_LEN, MAX_REGISTER_ADDRESS, WRITE_FLAG};
use crate::error::BusError;

// ─── Frames ─────────────────────────────────────────────────────────

/// Direction of a register access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    Write,
}

/// One request frame on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterFrame {
    address: u8,
    access: Access,
    payload: Option<u32>,
}

impl RegisterFrame {
    /// Read request for `address`.
    pub fn read(address: u8) -> Result<Self, BusError> {
        check_address(address)?;
        Ok(Self {
            address,
            access: Access::Read,
            payload: None,
        })
    }

    /// Write of `value` to `address`.
    pub fn write(address: u8, value: u32) -> Result<Self, BusError> {
        check_address(address)?;
        Ok(Self {
            address,
            access: Access::Write,
            payload: Some(value),
        })
    }

    #[inline]
    pub fn address(&self) -> u8 {
        self.address
    }

    #[inline]
    pub fn access(&self) -> Access {
        self.access
    }

    /// Write payload; `None` for reads.
    #[inline]
    pub fn payload(&self) -> Option<u32> {
        self.payload
    }

    /// Serialize to the transmitted byte sequence.
    pub fn encode(&self) -> [u8; FRAME_LEN] {
        let header = match self.access {
            Access::Read => self.address,
            Access::Write => self.address | WRITE_FLAG,
        };
        let data = self.payload.unwrap_or(0).to_be_bytes();
        [header, data[0], data[1], data[2], data[3]]
    }

    /// Parse a received request frame (the chip side of the wire).
    pub fn decode(bytes: &[u8; FRAME_LEN]) -> Self {
        let address = bytes[0] & MAX_REGISTER_ADDRESS;
        if bytes[0] & WRITE_FLAG != 0 {
            Self {
                address,
                access: Access::Write,
                payload: Some(u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]])),
            }
        } else {
            Self {
                address,
                access: Access::Read,
                payload: None,
            }
        }
    }
}

fn check_address(address: u8) -> Result<(), BusError> {
    if address > MAX_REGISTER_ADDRESS {
        return Err(BusError::InvalidAddress(address));
    }
    Ok(())
}

/// Register value carried by a reply (bytes 1–4, big-endian).
#[inline]
pub fn reply_value(reply: &[u8; FRAME_LEN]) -> u32 {
    u32::from_be_bytes([reply[1], reply[2], reply[3], reply[4]])
}

/// A register/value pair, used for init sequences and config overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterWrite {
    pub address: u8,
    pub value: u32,
}

impl RegisterWrite {
    pub const fn new(address: u8, value: u32) -> Self {
        Self { address, value }
    }
}

// ─── SPI status byte ────────────────────────────────────────────────

bitflags! {
    /// Status byte returned in byte 0 of every reply.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SpiStatus: u8 {
        /// Chip was reset since GSTAT was last read.
        const RESET_FLAG   = 0x01;
        /// Driver shut down on overtemperature or short.
        const DRIVER_ERROR = 0x02;
        /// stallGuard2 flag mirror.
        const STALL        = 0x04;
        /// Motor at standstill.
        const STANDSTILL   = 0x08;
    }
}

bitflags! {
    /// Global status register flags (read-to-clear).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GlobalStatus: u32 {
        /// Chip was reset.
        const RESET          = 0x01;
        /// Driver shut down due to overtemperature or short.
        const DRIVER_ERROR   = 0x02;
        /// Charge pump undervoltage.
        const UNDERVOLTAGE   = 0x04;
    }
}

// ─── Status word ────────────────────────────────────────────────────

/// Named status bit-field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusField {
    /// Digital stall indicator.
    StallFlag,
    /// Motor at standstill.
    Standstill,
    /// Actual current scale.
    CurrentScale,
    /// Open load on coil A.
    OpenLoadA,
    /// Open load on coil B.
    OpenLoadB,
    /// Overtemperature pre-warning.
    TempWarning,
    /// Overtemperature shutdown.
    TempShutdown,
    /// Analog stallGuard load measurement (low = high load).
    StallGuard,
}

/// Position of one field inside the 32-bit status word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub field: StatusField,
    pub shift: u8,
    pub width: u8,
}

impl FieldSpec {
    pub const fn new(field: StatusField, shift: u8, width: u8) -> Self {
        Self { field, shift, width }
    }

    /// Extract this field's raw value from `word`.
    #[inline]
    pub const fn extract(&self, word: u32) -> u32 {
        let mask = if self.width >= 32 {
            u32::MAX
        } else {
            (1u32 << self.width) - 1
        };
        (word >> self.shift) & mask
    }
}

bitflags! {
    /// Single-bit conditions decoded from the status word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StatusFlags: u8 {
        const STALL         = 0x01;
        const STANDSTILL    = 0x02;
        const OPEN_LOAD_A   = 0x04;
        const OPEN_LOAD_B   = 0x08;
        const TEMP_WARNING  = 0x10;
        const TEMP_SHUTDOWN = 0x20;
    }
}

/// Decoded driver status. Derived fresh from each read, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusWord {
    raw: u32,
    flags: StatusFlags,
    current_scale: Option<u8>,
    stallguard: Option<u16>,
}

impl StatusWord {
    #[inline]
    pub fn raw(&self) -> u32 {
        self.raw
    }

    #[inline]
    pub fn flags(&self) -> StatusFlags {
        self.flags
    }

    #[inline]
    pub fn stall_flag(&self) -> bool {
        self.flags.contains(StatusFlags::STALL)
    }

    #[inline]
    pub fn standstill(&self) -> bool {
        self.flags.contains(StatusFlags::STANDSTILL)
    }

    #[inline]
    pub fn open_load_a(&self) -> bool {
        self.flags.contains(StatusFlags::OPEN_LOAD_A)
    }

    #[inline]
    pub fn open_load_b(&self) -> bool {
        self.flags.contains(StatusFlags::OPEN_LOAD_B)
    }

    #[inline]
    pub fn temp_warning(&self) -> bool {
        self.flags.contains(StatusFlags::TEMP_WARNING)
    }

    #[inline]
    pub fn temp_shutdown(&self) -> bool {
        self.flags.contains(StatusFlags::TEMP_SHUTDOWN)
    }

    /// Actual current scale, if the device reports it.
    #[inline]
    pub fn current_scale(&self) -> Option<u8> {
        self.current_scale
    }

    /// Analog stallGuard reading, if the device reports it.
    #[inline]
    pub fn stallguard(&self) -> Option<u16> {
        self.stallguard
    }
}

/// Decode `word` using the field table of a device family.
pub fn decode_status(word: u32, table: &[FieldSpec]) -> StatusWord {
    let mut status = StatusWord {
        raw: word,
        ..StatusWord::default()
    };
    for spec in table {
        let value = spec.extract(word);
        let flag = match spec.field {
            StatusField::StallFlag => StatusFlags::STALL,
            StatusField::Standstill => StatusFlags::STANDSTILL,
            StatusField::OpenLoadA => StatusFlags::OPEN_LOAD_A,
            StatusField::OpenLoadB => StatusFlags::OPEN_LOAD_B,
            StatusField::TempWarning => StatusFlags::TEMP_WARNING,
            StatusField::TempShutdown => StatusFlags::TEMP_SHUTDOWN,
            StatusField::CurrentScale => {
                status.current_scale = Some(value as u8);
                continue;
            }
            StatusField::StallGuard => {
                status.stallguard = Some(value as u16);
                continue;
            }
        };
        status.flags.set(flag, value != 0);
    }
    status
}
