//! Simulated digital lines. Clones share state so a test can keep one end.

use std::sync::Arc;

use handmov_common::consts::BUTTON_ACTIVE_LEVEL;
use handmov_common::io::Level;
use parking_lot::Mutex;

use crate::hw::{DigitalInput, DigitalOutput};

#[derive(Debug)]
struct OutputLine {
    level: Level,
    rising: u64,
    falling: u64,
    writes: u64,
}

/// Output line recording its level and edge counts.
#[derive(Debug, Clone)]
pub struct SimOutput {
    line: Arc<Mutex<OutputLine>>,
}

impl SimOutput {
    pub fn new(initial: Level) -> Self {
        Self {
            line: Arc::new(Mutex::new(OutputLine {
                level: initial,
                rising: 0,
                falling: 0,
                writes: 0,
            })),
        }
    }

    pub fn level(&self) -> Level {
        self.line.lock().level
    }

    pub fn rising_edges(&self) -> u64 {
        self.line.lock().rising
    }

    pub fn falling_edges(&self) -> u64 {
        self.line.lock().falling
    }

    pub fn writes(&self) -> u64 {
        self.line.lock().writes
    }
}

impl DigitalOutput for SimOutput {
    fn set_level(&mut self, level: Level) {
        let mut line = self.line.lock();
        match (line.level, level) {
            (Level::Low, Level::High) => line.rising += 1,
            (Level::High, Level::Low) => line.falling += 1,
            _ => {}
        }
        line.level = level;
        line.writes += 1;
    }
}

/// Input line driven by the test or the simulated operator.
#[derive(Debug, Clone)]
pub struct SimInput {
    level: Arc<Mutex<Level>>,
}

impl SimInput {
    /// A released button (idle level).
    pub fn released() -> Self {
        Self {
            level: Arc::new(Mutex::new(BUTTON_ACTIVE_LEVEL.inverted())),
        }
    }

    pub fn set(&self, level: Level) {
        *self.level.lock() = level;
    }

    pub fn press(&self) {
        self.set(BUTTON_ACTIVE_LEVEL);
    }

    pub fn release(&self) {
        self.set(BUTTON_ACTIVE_LEVEL.inverted());
    }
}

impl DigitalInput for SimInput {
    fn level(&self) -> Level {
        *self.level.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_counts_edges() {
        let mut out = SimOutput::new(Level::Low);
        let probe = out.clone();
        out.set_level(Level::High);
        out.set_level(Level::High);
        out.set_level(Level::Low);
        assert_eq!(probe.rising_edges(), 1);
        assert_eq!(probe.falling_edges(), 1);
        assert_eq!(probe.writes(), 3);
    }

    #[test]
    fn input_press_is_active_low() {
        let input = SimInput::released();
        assert_eq!(input.level(), Level::High);
        input.press();
        assert_eq!(input.level(), Level::Low);
        input.release();
        assert_eq!(input.level(), Level::High);
    }
}
