//! Button state machine.
//!
//! Each button owns a debouncer and a press start time. Slot buttons act on
//! release: held at least the long-press threshold saves, shorter recalls.
//! Jog buttons act on every debounced press and ignore release.

use std::time::Duration;

use handmov_common::consts::BUTTON_ACTIVE_LEVEL;
use handmov_common::input::{ButtonConfig, ButtonRole, InputConfig};
use handmov_common::io::{Edge, Level};
use tracing::{debug, warn};

use super::debounce::{Debounced, Debouncer};

/// What a debounced button gesture asks the axis to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    /// Relative move.
    Jog { steps: i64 },
    /// Store the current position in `slot`.
    Save { slot: String },
    /// Move to the position stored in `slot`.
    Recall { slot: String },
}

impl ButtonAction {
    /// Whether the action issues motion.
    pub fn is_motion(&self) -> bool {
        !matches!(self, Self::Save { .. })
    }
}

#[derive(Debug)]
struct ButtonState {
    id: String,
    role: ButtonRole,
    debouncer: Debouncer,
    press_start: Option<Duration>,
}

impl ButtonState {
    fn apply(&mut self, debounced: Debounced, long_press: Duration) -> Option<ButtonAction> {
        match debounced.edge {
            Edge::Pressed => {
                self.press_start = Some(debounced.at);
                match &self.role {
                    ButtonRole::Jog { steps } => Some(ButtonAction::Jog { steps: *steps }),
                    ButtonRole::Slot { .. } => None,
                }
            }
            Edge::Released => {
                let start = self.press_start.take()?;
                let held = debounced.at.saturating_sub(start);
                let ButtonRole::Slot { slot } = &self.role else {
                    return None;
                };
                let slot = slot.clone();
                debug!("Button '{}' held {:?}", self.id, held);
                if held >= long_press {
                    Some(ButtonAction::Save { slot })
                } else {
                    Some(ButtonAction::Recall { slot })
                }
            }
        }
    }
}

/// All configured buttons.
#[derive(Debug)]
pub struct ButtonMachine {
    buttons: Vec<ButtonState>,
    long_press: Duration,
}

impl ButtonMachine {
    pub fn new(buttons: &[ButtonConfig], input: &InputConfig) -> Self {
        Self {
            buttons: buttons
                .iter()
                .map(|b| ButtonState {
                    id: b.id.clone(),
                    role: b.role.clone(),
                    debouncer: Debouncer::new(input.debounce()),
                    press_start: None,
                })
                .collect(),
            long_press: input.long_press(),
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.buttons.iter().map(|b| b.id.as_str())
    }

    /// Raw edge reported asynchronously for button `id`.
    pub fn on_edge(&mut self, id: &str, edge: Edge, at: Duration) -> Option<ButtonAction> {
        let long_press = self.long_press;
        let Some(button) = self.buttons.iter_mut().find(|b| b.id == id) else {
            warn!("Edge for unknown button '{}'", id);
            return None;
        };
        let debounced = button.debouncer.on_raw(edge.is_pressed(), at)?;
        button.apply(debounced, long_press)
    }

    /// Sampled electrical level for button `id`.
    pub fn on_level(&mut self, id: &str, level: Level, now: Duration) -> Option<ButtonAction> {
        let long_press = self.long_press;
        let button = self.buttons.iter_mut().find(|b| b.id == id)?;
        let pressed = Edge::from_level(level, BUTTON_ACTIVE_LEVEL).is_pressed();
        let debounced = button.debouncer.update(pressed, now)?;
        button.apply(debounced, long_press)
    }

    /// Accept edges that have become stable by `now`, in button order.
    pub fn poll(&mut self, now: Duration) -> Vec<ButtonAction> {
        let long_press = self.long_press;
        self.buttons
            .iter_mut()
            .filter_map(|b| {
                let debounced = b.debouncer.poll(now)?;
                b.apply(debounced, long_press)
            })
            .collect()
    }
}
