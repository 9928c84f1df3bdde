//! Digital line abstractions.
//!
//! The core never touches GPIO directly. A board backend implements
//! [`DigitalOutput`] / [`DigitalInput`] for its pins; the simulation backend
//! in [`crate::sim`] provides in-memory versions.

use handmov_common::consts::ENABLE_ACTIVE_LEVEL;
use handmov_common::io::Level;
use handmov_common::motion::Direction;

/// A push-pull output line.
pub trait DigitalOutput: Send {
    fn set_level(&mut self, level: Level);
}

/// A sampled input line.
pub trait DigitalInput: Send {
    fn level(&self) -> Level;
}

/// Step, direction and enable lines of one driver.
pub struct StepperPins {
    pub step: Box<dyn DigitalOutput>,
    pub dir: Box<dyn DigitalOutput>,
    pub enable: Box<dyn DigitalOutput>,
}

impl StepperPins {
    pub fn new(
        step: Box<dyn DigitalOutput>,
        dir: Box<dyn DigitalOutput>,
        enable: Box<dyn DigitalOutput>,
    ) -> Self {
        Self { step, dir, enable }
    }

    /// Drive the direction line. Positive is high.
    #[inline]
    pub fn set_direction(&mut self, direction: Direction) {
        self.dir
            .set_level(Level::from_bool(direction == Direction::Positive));
    }

    /// Energize or release the driver stage at the chip's active level.
    pub fn set_enabled(&mut self, enabled: bool) {
        let level = if enabled {
            ENABLE_ACTIVE_LEVEL
        } else {
            ENABLE_ACTIVE_LEVEL.inverted()
        };
        self.enable.set_level(level);
    }
}

impl std::fmt::Debug for StepperPins {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepperPins").finish_non_exhaustive()
    }
}

/// A named button input line.
pub struct ButtonInput {
    pub id: String,
    pub line: Box<dyn DigitalInput>,
}

impl ButtonInput {
    pub fn new(id: impl Into<String>, line: Box<dyn DigitalInput>) -> Self {
        Self {
            id: id.into(),
            line,
        }
    }
}
