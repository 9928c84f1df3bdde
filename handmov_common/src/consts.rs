//! System-wide constants for the HandMov workspace.
//!
//! Single source of truth for wire-format sizes, electrical polarities and
//! default tunables. Imported by all crates.

use crate::io::Level;
use static_assertions::const_assert;
use static_assertions::const_assert_eq;

/// Bytes per register transaction: 1 header byte + 4 payload bytes.
pub const FRAME_LEN: usize = 5;

/// Payload bytes per register transaction.
pub const PAYLOAD_LEN: usize = 4;

/// Highest addressable register (7-bit address space).
pub const MAX_REGISTER_ADDRESS: u8 = 0x7F;

/// Header bit marking a write access.
pub const WRITE_FLAG: u8 = 0x80;

/// Level of the enable line that energises the driver stage (TMC21xx: active-low).
pub const ENABLE_ACTIVE_LEVEL: Level = Level::Low;

/// Level a button input reads while pressed (pull-up wiring, contact to ground).
pub const BUTTON_ACTIVE_LEVEL: Level = Level::Low;

/// Default debounce interval for button inputs [ms].
pub const DEFAULT_DEBOUNCE_MS: u64 = 50;

/// Default long-press threshold [ms].
pub const DEFAULT_LONG_PRESS_MS: u64 = 1000;

/// Default start/stop step delay [µs].
pub const DEFAULT_INITIAL_DELAY_US: f64 = 1000.0;

/// Default cruise step delay [µs].
pub const DEFAULT_MIN_DELAY_US: f64 = 300.0;

/// Default step pulse high time [µs].
pub const DEFAULT_PULSE_WIDTH_US: u64 = 5;

/// Default pause before the backlash return leg [ms].
pub const DEFAULT_REVERSE_PAUSE_MS: u64 = 50;

/// Default distance backed off the hard stop after homing [steps].
pub const DEFAULT_HOMING_BACKOFF_STEPS: u32 = 100;

/// Default homing step budget before `HomingTimeout`.
pub const DEFAULT_HOMING_MAX_STEPS: u32 = 20_000;

/// Default number of consecutive stall reads required to confirm a stall.
pub const DEFAULT_STALL_CONFIRM_READS: u32 = 2;

/// Default upper bound on a single bus transaction (lock + transfer) [ms].
pub const DEFAULT_BUS_TIMEOUT_MS: u64 = 50;

/// Default position store file.
pub const DEFAULT_STORE_PATH: &str = "position.json";

/// Capacity of the scheduler event queue.
pub const EVENT_QUEUE_CAPACITY: usize = 32;

const_assert_eq!(FRAME_LEN, PAYLOAD_LEN + 1);
const_assert!(MAX_REGISTER_ADDRESS & WRITE_FLAG == 0);
const_assert!(EVENT_QUEUE_CAPACITY.is_power_of_two());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_consistent() {
        assert!(DEFAULT_MIN_DELAY_US > 0.0);
        assert!(DEFAULT_INITIAL_DELAY_US >= DEFAULT_MIN_DELAY_US);
        assert!(DEFAULT_STALL_CONFIRM_READS >= 2);
        assert!(DEFAULT_LONG_PRESS_MS > DEFAULT_DEBOUNCE_MS);
    }

    #[test]
    fn write_flag_is_outside_address_space() {
        assert_eq!(MAX_REGISTER_ADDRESS | WRITE_FLAG, 0xFF);
    }
}
