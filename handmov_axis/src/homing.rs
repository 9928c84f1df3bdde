//! Stall-based homing.
//!
//! The supervisor walks the axis toward a mechanical limit one step at a
//! time, reads the driver status after every step and feeds the stall
//! predicate into a consecutive-read debouncer.
//!
//! ## Lifecycle
//!
//! 1. `start()` → `Seeking`
//! 2. After each step, `tick(stalled)` counts the step, debounces the
//!    predicate and checks the step budget
//! 3. N consecutive stall reads → `Confirmed`
//! 4. Back off the configured offset through the motion generator
//! 5. Position set to zero → `Zeroed`
//!
//! Exceeding the step budget fails with `HomingError::Timeout`; position is
//! left as it was and the moving flag is cleared.

use handmov_common::error::{BusError, HomingError};
use handmov_common::homing::{HomingConfig, StallDetection};
use handmov_common::motion::{Direction, MotionRequest, SpeedProfile};
use handmov_common::register::StatusWord;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::motion::{MotionGenerator, StepControl, StepHook};
use crate::register::RegisterClient;

// ─── Stall Predicates ───────────────────────────────────────────────

/// Decides from one status read whether the axis is stalled.
pub trait StallPredicate: Send {
    fn is_stalled(&mut self, status: &StatusWord) -> bool;
}

impl<F: FnMut(&StatusWord) -> bool + Send> StallPredicate for F {
    fn is_stalled(&mut self, status: &StatusWord) -> bool {
        self(status)
    }
}

/// Digital stall flag in the status word.
#[derive(Debug, Clone, Copy, Default)]
pub struct StallFlag;

impl StallPredicate for StallFlag {
    fn is_stalled(&mut self, status: &StatusWord) -> bool {
        status.stall_flag()
    }
}

/// Analog stallGuard reading strictly below `threshold`.
#[derive(Debug, Clone, Copy)]
pub struct StallGuardBelow {
    pub threshold: u16,
}

impl StallPredicate for StallGuardBelow {
    fn is_stalled(&mut self, status: &StatusWord) -> bool {
        status.stallguard().is_some_and(|sg| sg < self.threshold)
    }
}

/// Predicate selected by configuration.
pub fn predicate_for(detection: StallDetection) -> Box<dyn StallPredicate> {
    match detection {
        StallDetection::Flag => Box::new(StallFlag),
        StallDetection::StallGuard { threshold } => Box::new(StallGuardBelow { threshold }),
    }
}

/// Source of decoded driver status.
pub trait StatusSource {
    fn read_status(&self) -> Result<StatusWord, BusError>;
}

impl StatusSource for RegisterClient {
    fn read_status(&self) -> Result<StatusWord, BusError> {
        RegisterClient::read_status(self)
    }
}

// ─── Debounce ───────────────────────────────────────────────────────

/// Requires `required` consecutive positive samples.
#[derive(Debug, Clone, Copy)]
pub struct StallDebouncer {
    required: u32,
    consecutive: u32,
}

impl StallDebouncer {
    pub fn new(required: u32) -> Self {
        Self {
            required: required.max(1),
            consecutive: 0,
        }
    }

    /// Feed one sample; true once the run of positives reaches the target.
    pub fn update(&mut self, stalled: bool) -> bool {
        if stalled {
            self.consecutive = self.consecutive.saturating_add(1);
        } else {
            self.consecutive = 0;
        }
        self.consecutive >= self.required
    }

    pub fn reset(&mut self) {
        self.consecutive = 0;
    }
}

// ─── Supervisor ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomingPhase {
    Idle,
    Seeking,
    Confirmed,
    Zeroed,
    Failed,
}

/// Result of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomingTickResult {
    InProgress,
    /// Stall confirmed on step `steps` of the seek.
    StallConfirmed { steps: u32 },
    /// Step budget exhausted.
    TimedOut { steps: u32 },
}

/// Outcome of a completed homing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HomingReport {
    pub direction: Direction,
    /// Seek steps until the stall was confirmed.
    pub steps_to_stall: u32,
    pub backoff_steps: u32,
}

#[derive(Debug, Clone)]
pub struct HomingSupervisor {
    phase: HomingPhase,
    direction: Direction,
    debouncer: StallDebouncer,
    max_steps: u32,
    steps_taken: u32,
    backoff_steps: u32,
    seek_delay: Duration,
}

impl HomingSupervisor {
    /// Build a supervisor, rejecting a config that could never confirm or
    /// never time out.
    pub fn try_new(config: &HomingConfig) -> Result<Self, HomingError> {
        config.validate().map_err(HomingError::Configuration)?;
        Ok(Self::new(config))
    }

    pub fn new(config: &HomingConfig) -> Self {
        Self {
            phase: HomingPhase::Idle,
            direction: config.direction,
            debouncer: StallDebouncer::new(config.confirm_reads),
            max_steps: config.max_steps,
            steps_taken: 0,
            backoff_steps: config.backoff_steps,
            seek_delay: config.seek_delay(),
        }
    }

    /// Override the configured seek direction.
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    #[inline]
    pub fn phase(&self) -> HomingPhase {
        self.phase
    }

    #[inline]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[inline]
    pub fn steps_taken(&self) -> u32 {
        self.steps_taken
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self.phase, HomingPhase::Seeking | HomingPhase::Confirmed)
    }

    pub fn start(&mut self) {
        self.phase = HomingPhase::Seeking;
        self.steps_taken = 0;
        self.debouncer.reset();
        debug!("Homing: seeking {:?}", self.direction);
    }

    /// Account for one seek step whose status read gave `stalled`.
    pub fn tick(&mut self, stalled: bool) -> HomingTickResult {
        if self.phase != HomingPhase::Seeking {
            return HomingTickResult::InProgress;
        }
        self.steps_taken += 1;
        if self.debouncer.update(stalled) {
            self.phase = HomingPhase::Confirmed;
            debug!("Homing: stall confirmed at step {}", self.steps_taken);
            return HomingTickResult::StallConfirmed {
                steps: self.steps_taken,
            };
        }
        if self.steps_taken >= self.max_steps {
            self.phase = HomingPhase::Failed;
            return HomingTickResult::TimedOut {
                steps: self.steps_taken,
            };
        }
        HomingTickResult::InProgress
    }

    pub fn reset(&mut self) {
        self.phase = HomingPhase::Idle;
        self.steps_taken = 0;
        self.debouncer.reset();
    }

    /// Run the whole procedure. Blocks until zeroed or failed.
    ///
    /// `hook` is consulted before every seek step and every backoff step.
    pub fn run(
        &mut self,
        generator: &mut MotionGenerator,
        status: &dyn StatusSource,
        predicate: &mut dyn StallPredicate,
        hook: &mut dyn StepHook,
    ) -> Result<HomingReport, HomingError> {
        self.start();
        generator.set_moving(true);
        let seek = self.seek(generator, status, predicate, hook);
        generator.set_moving(false);

        let steps_to_stall = match seek {
            Ok(steps) => steps,
            Err(e) => {
                self.phase = HomingPhase::Failed;
                warn!("Homing failed after {} steps: {}", self.steps_taken, e);
                return Err(e);
            }
        };

        let back = self.direction.reversed();
        let target = generator
            .position()
            .saturating_add(back.sign() * i64::from(self.backoff_steps));
        let profile = SpeedProfile::constant(self.seek_delay.as_micros() as f64);
        if let Err(e) = generator.plan_and_execute(&MotionRequest::new(target, profile), hook) {
            self.phase = HomingPhase::Failed;
            warn!("Homing backoff failed: {}", e);
            return Err(e.into());
        }

        generator.zero_position();
        self.phase = HomingPhase::Zeroed;
        info!(
            "Homing complete: stall after {} steps, backed off {}",
            steps_to_stall, self.backoff_steps
        );
        Ok(HomingReport {
            direction: self.direction,
            steps_to_stall,
            backoff_steps: self.backoff_steps,
        })
    }

    fn seek(
        &mut self,
        generator: &mut MotionGenerator,
        status: &dyn StatusSource,
        predicate: &mut dyn StallPredicate,
        hook: &mut dyn StepHook,
    ) -> Result<u32, HomingError> {
        loop {
            if hook.at_boundary(generator.position()) == StepControl::Cancel {
                return Err(HomingError::Cancelled);
            }
            generator.step(self.direction, self.seek_delay)?;
            let word = status.read_status()?;
            match self.tick(predicate.is_stalled(&word)) {
                HomingTickResult::InProgress => {}
                HomingTickResult::StallConfirmed { steps } => return Ok(steps),
                HomingTickResult::TimedOut { steps } => return Err(HomingError::Timeout { steps }),
            }
        }
    }
}
