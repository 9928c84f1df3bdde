//! Configuration loading traits and types.
//!
//! This module provides the TOML loader used by the `handmov` binary and the
//! top-level [`UnitConfig`] bundling every section.
//!
//! # Usage
//!
//! ```rust,no_run
//! use handmov_common::config::{load_unit_config, ConfigError};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = load_unit_config(Path::new("handmov.toml"))?;
//!     println!("Service: {}", config.shared.service_name);
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::consts::{DEFAULT_BUS_TIMEOUT_MS, DEFAULT_STORE_PATH};
use crate::device::{DeviceDescriptor, DeviceFamily};
use crate::homing::{HomingConfig, StallDetection};
use crate::input::{validate_buttons, ButtonConfig, InputConfig};
use crate::motion::MotionConfig;
use crate::register::{RegisterWrite, StatusField};

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Common configuration fields.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "handmov-bench-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_service_name() -> String {
    "handmov".to_string()
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            service_name: default_service_name(),
        }
    }
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

// ─── Driver / Store Sections ────────────────────────────────────────

/// `[driver]` config section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Driver chip family.
    #[serde(default)]
    pub device: DeviceFamily,
    /// Upper bound on one bus transaction, lock wait included [ms].
    #[serde(default = "default_bus_timeout")]
    pub transaction_timeout_ms: u64,
    /// Register writes replacing or extending the family's init sequence.
    #[serde(default)]
    pub init: Vec<RegisterWrite>,
}

fn default_bus_timeout() -> u64 {
    DEFAULT_BUS_TIMEOUT_MS
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            device: DeviceFamily::default(),
            transaction_timeout_ms: DEFAULT_BUS_TIMEOUT_MS,
            init: Vec::new(),
        }
    }
}

impl DriverConfig {
    #[inline]
    pub fn descriptor(&self) -> &'static DeviceDescriptor {
        self.device.descriptor()
    }

    #[inline]
    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_millis(self.transaction_timeout_ms)
    }

    /// Family init sequence with overrides applied in place; new addresses appended.
    pub fn init_sequence(&self) -> Vec<RegisterWrite> {
        let mut sequence = self.descriptor().init_sequence.to_vec();
        for over in &self.init {
            match sequence.iter_mut().find(|w| w.address == over.address) {
                Some(existing) => existing.value = over.value,
                None => sequence.push(*over),
            }
        }
        sequence
    }
}

/// `[store]` config section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON file holding the slot table.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_PATH)
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

// ─── Unit Config ────────────────────────────────────────────────────

/// Complete configuration of one axis unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnitConfig {
    #[serde(default)]
    pub shared: SharedConfig,
    #[serde(default)]
    pub driver: DriverConfig,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub homing: HomingConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub buttons: Vec<ButtonConfig>,
    #[serde(default)]
    pub store: StoreConfig,
}

impl UnitConfig {
    /// Cross-section validation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.motion
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        self.homing.validate().map_err(ConfigError::ValidationError)?;
        self.input.validate().map_err(ConfigError::ValidationError)?;
        validate_buttons(&self.buttons).map_err(ConfigError::ValidationError)?;

        if self.driver.transaction_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "driver.transaction_timeout_ms must be > 0".to_string(),
            ));
        }
        if let Some(bad) = self.driver.init.iter().find(|w| w.address > 0x7F) {
            return Err(ConfigError::ValidationError(format!(
                "driver.init register {:#04x} exceeds 0x7F",
                bad.address
            )));
        }
        if matches!(self.homing.detection, StallDetection::StallGuard { .. })
            && !self.driver.descriptor().reports(StatusField::StallGuard)
        {
            return Err(ConfigError::ValidationError(format!(
                "{} does not report a stallGuard reading",
                self.driver.descriptor().name
            )));
        }
        Ok(())
    }
}

/// Load and validate a unit config file.
pub fn load_unit_config(path: &Path) -> Result<UnitConfig, ConfigError> {
    let config = UnitConfig::load(path)?;
    config.validate()?;
    debug!(
        "Loaded unit config from {} ({} buttons, device {})",
        path.display(),
        config.buttons.len(),
        config.driver.descriptor().name
    );
    Ok(config)
}
