//! Button input config: `[input]` timings and the `[[buttons]]` bindings.
//!
//! ```toml
//! [input]
//! debounce_ms = 50
//! long_press_ms = 1000
//!
//! [[buttons]]
//! id = "plus"
//! role = "jog"
//! steps = 100
//!
//! [[buttons]]
//! id = "pos1"
//! role = "slot"
//! slot = "pos1"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::consts::{DEFAULT_DEBOUNCE_MS, DEFAULT_LONG_PRESS_MS};

/// What a button does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ButtonRole {
    /// Relative move of `steps` on every debounced press.
    Jog { steps: i64 },
    /// Short press recalls `slot`, long press saves the current position into it.
    Slot { slot: String },
}

/// One `[[buttons]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonConfig {
    /// Identifier used by `on_button_event` and in logs.
    pub id: String,
    #[serde(flatten)]
    pub role: ButtonRole,
}

/// `[input]` config section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Raw input must be stable this long before an edge is accepted [ms].
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,
    /// Presses at least this long save instead of recall [ms].
    #[serde(default = "default_long_press")]
    pub long_press_ms: u64,
    /// A motion command arriving mid-move cancels the move at the next step.
    #[serde(default = "default_preempt")]
    pub preempt_moves: bool,
    /// Scheduler idle period between input scans [ms].
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_debounce() -> u64 {
    DEFAULT_DEBOUNCE_MS
}
fn default_long_press() -> u64 {
    DEFAULT_LONG_PRESS_MS
}
fn default_preempt() -> bool {
    true
}
fn default_poll_interval() -> u64 {
    5
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            long_press_ms: DEFAULT_LONG_PRESS_MS,
            preempt_moves: true,
            poll_interval_ms: default_poll_interval(),
        }
    }
}

impl InputConfig {
    #[inline]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    #[inline]
    pub fn long_press(&self) -> Duration {
        Duration::from_millis(self.long_press_ms)
    }

    #[inline]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.long_press_ms <= self.debounce_ms {
            return Err(format!(
                "input.long_press_ms ({}) must exceed input.debounce_ms ({})",
                self.long_press_ms, self.debounce_ms
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err("input.poll_interval_ms must be > 0".to_string());
        }
        Ok(())
    }
}

/// Check button ids are unique and bindings are usable.
pub fn validate_buttons(buttons: &[ButtonConfig]) -> Result<(), String> {
    let mut ids = HashSet::new();
    for button in buttons {
        if button.id.is_empty() {
            return Err("button id cannot be empty".to_string());
        }
        if !ids.insert(button.id.as_str()) {
            return Err(format!("duplicate button id: {}", button.id));
        }
        match &button.role {
            ButtonRole::Jog { steps: 0 } => {
                return Err(format!("button '{}': jog steps cannot be 0", button.id));
            }
            ButtonRole::Slot { slot } if slot.is_empty() => {
                return Err(format!("button '{}': slot name cannot be empty", button.id));
            }
            _ => {}
        }
    }
    Ok(())
}
