//! Driver-chip capability descriptors.
//!
//! Everything chip-specific lives here as data: register addresses, the
//! status field layout and the power-on register sequence. Supporting another
//! family means adding a [`DeviceDescriptor`] and a [`DeviceFamily`] variant,
//! not a new code path.

use serde::{Deserialize, Serialize};

use crate::register::{FieldSpec, RegisterWrite, StatusField};

/// GCONF: global configuration.
pub const REG_GCONF: u8 = 0x00;
/// GSTAT: global status, read-to-clear.
pub const REG_GSTAT: u8 = 0x01;
/// IHOLD_IRUN: hold/run current.
pub const REG_IHOLD_IRUN: u8 = 0x10;
/// TCOOLTHRS: lower velocity threshold for stallGuard output.
pub const REG_TCOOLTHRS: u8 = 0x14;
/// CHOPCONF: chopper configuration (TOFF > 0 enables the driver).
pub const REG_CHOPCONF: u8 = 0x6C;
/// COOLCONF: coolStep / stallGuard threshold.
pub const REG_COOLCONF: u8 = 0x6D;
/// DRV_STATUS: driver status word.
pub const REG_DRV_STATUS: u8 = 0x6F;

/// DRV_STATUS layout shared by the TMC2130 and TMC5160.
const TMC_DRV_STATUS_FIELDS: &[FieldSpec] = &[
    FieldSpec::new(StatusField::StallGuard, 0, 10),
    FieldSpec::new(StatusField::CurrentScale, 16, 5),
    FieldSpec::new(StatusField::StallFlag, 24, 1),
    FieldSpec::new(StatusField::TempShutdown, 25, 1),
    FieldSpec::new(StatusField::TempWarning, 26, 1),
    FieldSpec::new(StatusField::OpenLoadA, 29, 1),
    FieldSpec::new(StatusField::OpenLoadB, 30, 1),
    FieldSpec::new(StatusField::Standstill, 31, 1),
];

/// Static description of a driver family.
#[derive(Debug)]
pub struct DeviceDescriptor {
    /// Human-readable family name.
    pub name: &'static str,
    /// Register holding the status word.
    pub status_register: u8,
    /// Read-to-clear global status register.
    pub global_status_register: u8,
    /// Read/write register used by the link self-test.
    pub self_test_register: u8,
    /// Status word layout.
    pub status_fields: &'static [FieldSpec],
    /// Register writes applied on initialisation, in order.
    pub init_sequence: &'static [RegisterWrite],
}

impl DeviceDescriptor {
    /// Whether the status word carries `field`.
    pub fn reports(&self, field: StatusField) -> bool {
        self.status_fields.iter().any(|f| f.field == field)
    }

    /// Init value for `address`, if the sequence writes it.
    pub fn init_value(&self, address: u8) -> Option<u32> {
        self.init_sequence
            .iter()
            .rev()
            .find(|w| w.address == address)
            .map(|w| w.value)
    }
}

/// TMC2130: spreadCycle (stallGuard2 valid), IRUN=31/IHOLD=8, TOFF=5.
pub static TMC2130: DeviceDescriptor = DeviceDescriptor {
    name: "TMC2130",
    status_register: REG_DRV_STATUS,
    global_status_register: REG_GSTAT,
    self_test_register: REG_COOLCONF,
    status_fields: TMC_DRV_STATUS_FIELDS,
    init_sequence: &[
        RegisterWrite::new(REG_GCONF, 0x0000_0000),
        RegisterWrite::new(REG_IHOLD_IRUN, 0x0000_1F08),
        RegisterWrite::new(REG_CHOPCONF, 0x0001_0135),
        RegisterWrite::new(REG_TCOOLTHRS, 0x0000_0064),
        RegisterWrite::new(REG_COOLCONF, 0x0001_0404),
    ],
};

/// TMC5160 in step/dir mode: same status layout, different current setup.
pub static TMC5160: DeviceDescriptor = DeviceDescriptor {
    name: "TMC5160",
    status_register: REG_DRV_STATUS,
    global_status_register: REG_GSTAT,
    self_test_register: REG_COOLCONF,
    status_fields: TMC_DRV_STATUS_FIELDS,
    init_sequence: &[
        RegisterWrite::new(REG_GCONF, 0x0000_0000),
        RegisterWrite::new(REG_IHOLD_IRUN, 0x0006_1F0A),
        RegisterWrite::new(REG_CHOPCONF, 0x0001_00C3),
        RegisterWrite::new(REG_TCOOLTHRS, 0x0000_0064),
        RegisterWrite::new(REG_COOLCONF, 0x0001_0000),
    ],
};

/// Supported driver families, selected by `[driver] device` in config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceFamily {
    #[default]
    Tmc2130,
    Tmc5160,
}

impl DeviceFamily {
    pub fn descriptor(self) -> &'static DeviceDescriptor {
        match self {
            Self::Tmc2130 => &TMC2130,
            Self::Tmc5160 => &TMC5160,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::decode_status;

    #[test]
    fn families_resolve_to_descriptors() {
        assert_eq!(DeviceFamily::Tmc2130.descriptor().name, "TMC2130");
        assert_eq!(DeviceFamily::Tmc5160.descriptor().name, "TMC5160");
        assert_eq!(DeviceFamily::default(), DeviceFamily::Tmc2130);
    }

    #[test]
    fn descriptors_report_stall_fields() {
        for family in [DeviceFamily::Tmc2130, DeviceFamily::Tmc5160] {
            let d = family.descriptor();
            assert!(d.reports(StatusField::StallFlag));
            assert!(d.reports(StatusField::StallGuard));
        }
    }

    #[test]
    fn init_sequence_enables_chopper() {
        let toff = TMC2130.init_value(REG_CHOPCONF).unwrap() & 0x0F;
        assert!(toff > 0);
        assert_eq!(TMC2130.init_value(REG_DRV_STATUS), None);
    }

    #[test]
    fn tmc2130_stall_bit_is_24() {
        let status = decode_status(1 << 24, TMC2130.status_fields);
        assert!(status.stall_flag());
        assert!(!status.standstill());
    }

    #[test]
    fn family_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            device: DeviceFamily,
        }
        let w: Wrapper = toml::from_str("device = \"tmc5160\"").unwrap();
        assert_eq!(w.device, DeviceFamily::Tmc5160);
    }
}
