//! Simulated stepper axis.
//!
//! Counts rising edges on the step line and moves one step in the direction
//! the dir line selects. Optional hard stops block travel; a step attempted
//! against a stop leaves the position unchanged and raises the stall
//! condition until the axis steps away again. Pulses sent while the enable
//! line is inactive are counted but do not move the carriage.

use std::sync::Arc;

use handmov_common::consts::ENABLE_ACTIVE_LEVEL;
use handmov_common::io::Level;
use parking_lot::Mutex;

use crate::hw::{DigitalOutput, StepperPins};

/// stallGuard reading while running freely.
pub const SIM_SG_FREE: u16 = 400;

#[derive(Debug)]
struct Physics {
    position: i64,
    min_position: i64,
    max_position: i64,
    pulses: u64,
    direction_writes: u64,
    positive: bool,
    step_level: Level,
    enabled: bool,
    lower_stop: Option<i64>,
    upper_stop: Option<i64>,
    stalled: bool,
}

impl Physics {
    fn on_step(&mut self) {
        self.pulses += 1;
        if !self.enabled {
            return;
        }
        let next = if self.positive {
            self.position + 1
        } else {
            self.position - 1
        };
        let blocked = self.lower_stop.is_some_and(|stop| next < stop)
            || self.upper_stop.is_some_and(|stop| next > stop);
        if blocked {
            self.stalled = true;
            return;
        }
        self.stalled = false;
        self.position = next;
        self.min_position = self.min_position.min(next);
        self.max_position = self.max_position.max(next);
    }
}

/// Shared handle to the simulated mechanics.
#[derive(Debug, Clone)]
pub struct SimulatedAxis {
    physics: Arc<Mutex<Physics>>,
}

impl Default for SimulatedAxis {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedAxis {
    pub fn new() -> Self {
        Self::at(0)
    }

    /// Axis starting at physical position `position`.
    pub fn at(position: i64) -> Self {
        Self {
            physics: Arc::new(Mutex::new(Physics {
                position,
                min_position: position,
                max_position: position,
                pulses: 0,
                direction_writes: 0,
                positive: false,
                step_level: Level::Low,
                enabled: false,
                lower_stop: None,
                upper_stop: None,
                stalled: false,
            })),
        }
    }

    /// Mechanical stop below which the carriage cannot travel.
    pub fn with_lower_stop(self, stop: i64) -> Self {
        self.physics.lock().lower_stop = Some(stop);
        self
    }

    pub fn with_upper_stop(self, stop: i64) -> Self {
        self.physics.lock().upper_stop = Some(stop);
        self
    }

    /// Step, direction and enable lines wired to this axis.
    pub fn pins(&self) -> StepperPins {
        StepperPins::new(
            Box::new(AxisLine {
                physics: Arc::clone(&self.physics),
                role: LineRole::Step,
            }),
            Box::new(AxisLine {
                physics: Arc::clone(&self.physics),
                role: LineRole::Dir,
            }),
            Box::new(AxisLine {
                physics: Arc::clone(&self.physics),
                role: LineRole::Enable,
            }),
        )
    }

    /// Physical carriage position.
    pub fn position(&self) -> i64 {
        self.physics.lock().position
    }

    pub fn min_position(&self) -> i64 {
        self.physics.lock().min_position
    }

    pub fn max_position(&self) -> i64 {
        self.physics.lock().max_position
    }

    /// Rising edges seen on the step line.
    pub fn pulses(&self) -> u64 {
        self.physics.lock().pulses
    }

    pub fn direction_writes(&self) -> u64 {
        self.physics.lock().direction_writes
    }

    pub fn is_enabled(&self) -> bool {
        self.physics.lock().enabled
    }

    /// Whether the last step ran into a stop.
    pub fn is_stalled(&self) -> bool {
        self.physics.lock().stalled
    }

    /// Simulated stallGuard reading: near zero against a stop.
    pub fn stallguard(&self) -> u16 {
        if self.is_stalled() { 0 } else { SIM_SG_FREE }
    }
}

#[derive(Debug, Clone, Copy)]
enum LineRole {
    Step,
    Dir,
    Enable,
}

struct AxisLine {
    physics: Arc<Mutex<Physics>>,
    role: LineRole,
}

impl DigitalOutput for AxisLine {
    fn set_level(&mut self, level: Level) {
        let mut physics = self.physics.lock();
        match self.role {
            LineRole::Step => {
                if physics.step_level == Level::Low && level == Level::High {
                    physics.on_step();
                }
                physics.step_level = level;
            }
            LineRole::Dir => {
                physics.positive = level.is_high();
                physics.direction_writes += 1;
            }
            LineRole::Enable => physics.enabled = level == ENABLE_ACTIVE_LEVEL,
        }
    }
}
