//! Axis controller.
//!
//! [`Controller`] is the context object owned by the bootstrap: it holds the
//! motion generator (sole writer of the position), the register client, the
//! slot store and the scheduler state. All commands run on the thread that
//! owns the controller.
//!
//! ## Scheduling
//!
//! Inputs reach the scheduler three ways: direct calls
//! ([`Controller::on_button_event`]), [`AxisEvent`]s pushed from other threads
//! into the [`EventQueue`], and sampled button lines. All three are collected
//! between commands *and* at every step boundary of a running move, so
//! buttons keep working while the axis travels. A motion command arriving
//! mid-move cancels the move at the next boundary when `preempt_moves` is
//! set; saves wait until the move ends.
//!
//! A [`CancelToken`] trip aborts the command in progress. Inside
//! [`Controller::process_events`] it also drops everything queued behind it
//! and clears when the batch ends; a direct call clears it on return.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use handmov_common::config::UnitConfig;
use handmov_common::error::{AxisError, BusError, HomingError, MotionError};
use handmov_common::homing::HomingConfig;
use handmov_common::io::Edge;
use handmov_common::motion::{Direction, MotionConfig, MotionRequest, SpeedProfile};
use handmov_common::register::GlobalStatus;
use tracing::{debug, info, warn};

use crate::bus::SharedBus;
use crate::clock::Clock;
use crate::events::{AxisEvent, CancelToken, EventQueue};
use crate::homing::{predicate_for, HomingReport, HomingSupervisor, StallPredicate};
use crate::hw::{ButtonInput, StepperPins};
use crate::input::{ButtonAction, ButtonMachine};
use crate::motion::{AxisHandle, MotionGenerator, MoveReport, StepControl, StepHook};
use crate::register::RegisterClient;
use crate::store::PositionStore;

/// Result of one executed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Moved(MoveReport),
    Homed(HomingReport),
    Saved {
        slot: String,
        position: i64,
        /// False when the table only lives in memory.
        persisted: bool,
    },
    SlotEmpty {
        slot: String,
    },
    /// Move cut short by a newer motion command.
    Preempted {
        steps_done: u32,
    },
}

pub type CommandResult = Result<ActionOutcome, AxisError>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Action(ButtonAction),
    MoveTo(i64),
    Home,
}

impl Command {
    fn is_motion(&self) -> bool {
        match self {
            Self::Action(action) => action.is_motion(),
            Self::MoveTo(_) | Self::Home => true,
        }
    }
}

// ─── Scheduler ──────────────────────────────────────────────────────

struct Scheduler {
    buttons: ButtonMachine,
    inputs: Vec<ButtonInput>,
    queue: EventQueue,
    pending: VecDeque<Command>,
    cancel: CancelToken,
    clock: Arc<dyn Clock>,
    preempt: bool,
    shutdown: bool,
    /// Motion commands collected since the current move began.
    arrivals: u32,
    /// Set while `process_events` drains the pending queue.
    batch: bool,
}

impl Scheduler {
    fn enqueue(&mut self, command: Command) {
        if command.is_motion() {
            self.arrivals += 1;
        }
        debug!("Queued {:?}", command);
        self.pending.push_back(command);
    }

    fn on_edge(&mut self, id: &str, edge: Edge, at: Duration) {
        if let Some(action) = self.buttons.on_edge(id, edge, at) {
            self.enqueue(Command::Action(action));
        }
    }

    fn collect(&mut self) {
        for event in self.queue.drain() {
            match event {
                AxisEvent::ButtonEdge { id, edge, at } => self.on_edge(&id, edge, at),
                AxisEvent::MoveTo { target } => self.enqueue(Command::MoveTo(target)),
                AxisEvent::Jog { steps } => {
                    self.enqueue(Command::Action(ButtonAction::Jog { steps }))
                }
                AxisEvent::Recall { slot } => {
                    self.enqueue(Command::Action(ButtonAction::Recall { slot }))
                }
                AxisEvent::Home => self.enqueue(Command::Home),
                AxisEvent::Shutdown => {
                    info!("Shutdown requested");
                    self.shutdown = true;
                }
            }
        }

        let now = self.clock.now();
        let mut actions = Vec::new();
        for input in &self.inputs {
            actions.extend(self.buttons.on_level(&input.id, input.line.level(), now));
        }
        actions.extend(self.buttons.poll(now));
        for action in actions {
            self.enqueue(Command::Action(action));
        }
    }

    fn begin_move(&mut self) {
        self.arrivals = 0;
    }

    fn aborted(&self) -> bool {
        self.shutdown || self.cancel.is_cancelled()
    }

    /// Clear a cancel consumed by a direct call. A batch keeps it set until
    /// the queue behind the aborted command has been dropped.
    fn settle_cancel(&mut self) {
        if !self.batch && self.cancel.reset() {
            info!("Motion aborted");
        }
    }
}

impl StepHook for Scheduler {
    fn at_boundary(&mut self, _position: i64) -> StepControl {
        if self.aborted() {
            return StepControl::Cancel;
        }
        self.collect();
        if self.aborted() || (self.preempt && self.arrivals > 0) {
            StepControl::Cancel
        } else {
            StepControl::Continue
        }
    }
}

// ─── Controller ─────────────────────────────────────────────────────

pub struct Controller {
    generator: MotionGenerator,
    client: RegisterClient,
    store: PositionStore,
    scheduler: Scheduler,
    motion: MotionConfig,
    homing: HomingConfig,
    poll_interval: Duration,
}

impl Controller {
    /// Validate `config`, program the driver, energize the axis and load the
    /// slot table.
    ///
    /// # Errors
    ///
    /// `AxisError::Config` for an invalid config, `AxisError::Bus` if the
    /// init sequence cannot be written. No pulse is emitted either way.
    pub fn initialize(
        pins: StepperPins,
        bus: SharedBus,
        config: &UnitConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AxisError> {
        config.validate()?;

        let client = RegisterClient::with_init_sequence(
            bus,
            config.driver.descriptor(),
            config.driver.init_sequence(),
        );
        client.initialize()?;

        let mut generator = MotionGenerator::new(pins, &config.motion, Arc::clone(&clock));
        generator.enable();

        let store = PositionStore::open(&config.store.path);
        let scheduler = Scheduler {
            buttons: ButtonMachine::new(&config.buttons, &config.input),
            inputs: Vec::new(),
            queue: EventQueue::new(),
            pending: VecDeque::new(),
            cancel: CancelToken::new(),
            clock,
            preempt: config.input.preempt_moves,
            shutdown: false,
            arrivals: 0,
            batch: false,
        };

        info!(
            "{} axis ready: {} buttons, {} stored slots",
            config.shared.service_name,
            config.buttons.len(),
            store.slots().len()
        );

        Ok(Self {
            generator,
            client,
            store,
            scheduler,
            motion: config.motion.clone(),
            homing: config.homing.clone(),
            poll_interval: config.input.poll_interval(),
        })
    }

    /// Button lines sampled by the scheduler on every pass.
    pub fn with_inputs(mut self, inputs: Vec<ButtonInput>) -> Self {
        self.scheduler.inputs = inputs;
        self
    }

    // ─── Read Access ────────────────────────────────────────────────

    pub fn handle(&self) -> AxisHandle {
        self.generator.handle()
    }

    #[inline]
    pub fn position(&self) -> i64 {
        self.generator.position()
    }

    #[inline]
    pub fn is_moving(&self) -> bool {
        self.generator.is_moving()
    }

    /// Producer end of the event queue.
    pub fn events(&self) -> EventQueue {
        self.scheduler.queue.clone()
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.scheduler.cancel.clone()
    }

    pub fn store(&self) -> &PositionStore {
        &self.store
    }

    pub fn client(&self) -> &RegisterClient {
        &self.client
    }

    pub fn shutdown_requested(&self) -> bool {
        self.scheduler.shutdown
    }

    /// Commands collected but not yet executed.
    pub fn pending_commands(&self) -> usize {
        self.scheduler.pending.len()
    }

    // ─── Motion ─────────────────────────────────────────────────────

    /// Blocking absolute move. Inputs are still collected at every step.
    pub fn move_to(&mut self, target: i64, profile: SpeedProfile) -> Result<MoveReport, AxisError> {
        self.scheduler.begin_move();
        let request = MotionRequest::new(target, profile);
        let result = self
            .generator
            .plan_and_execute(&request, &mut self.scheduler);
        if matches!(result, Err(MotionError::Cancelled { .. })) {
            self.scheduler.settle_cancel();
        }
        Ok(result?)
    }

    /// Relative move with the configured profile.
    pub fn jog(&mut self, steps: i64) -> Result<MoveReport, AxisError> {
        let target = self.position().saturating_add(steps);
        self.move_to(target, self.motion.profile)
    }

    /// Home toward `direction` until `predicate` holds for the configured
    /// number of consecutive reads, back off, and zero the position.
    pub fn home(
        &mut self,
        direction: Direction,
        predicate: &mut dyn StallPredicate,
    ) -> Result<HomingReport, AxisError> {
        let mut supervisor = HomingSupervisor::try_new(&self.homing)?.with_direction(direction);
        self.scheduler.begin_move();
        let result = supervisor.run(
            &mut self.generator,
            &self.client,
            predicate,
            &mut self.scheduler,
        );
        if matches!(
            result,
            Err(HomingError::Cancelled | HomingError::Motion(MotionError::Cancelled { .. }))
        ) {
            self.scheduler.settle_cancel();
        }
        Ok(result?)
    }

    /// Home with the configured direction and stall detection.
    pub fn home_configured(&mut self) -> Result<HomingReport, AxisError> {
        let mut predicate = predicate_for(self.homing.detection);
        self.home(self.homing.direction, predicate.as_mut())
    }

    /// Store the current position in `slot`. Persistence failure is logged
    /// and reported in the outcome, never raised.
    pub fn save_position(&mut self, slot: &str) -> ActionOutcome {
        let position = self.position();
        let persisted = self.store.set(slot, position).is_ok();
        ActionOutcome::Saved {
            slot: slot.to_string(),
            position,
            persisted,
        }
    }

    /// Move to the position stored in `slot`.
    pub fn recall(&mut self, slot: &str) -> CommandResult {
        let Some(target) = self.store.get(slot) else {
            info!("Slot '{}' is empty", slot);
            return Ok(ActionOutcome::SlotEmpty {
                slot: slot.to_string(),
            });
        };
        info!("Recalling '{}' -> {}", slot, target);
        moved(self.move_to(target, self.motion.profile))
    }

    /// Visit `slots` in order, waiting `dwell` between stops. Empty slots
    /// are reported and skipped.
    pub fn tour(&mut self, slots: &[String], dwell: Duration) -> Result<Vec<ActionOutcome>, AxisError> {
        let mut outcomes = Vec::with_capacity(slots.len());
        for (i, slot) in slots.iter().enumerate() {
            if i > 0 {
                self.dwell(dwell)?;
            }
            match self.store.get(slot) {
                Some(target) => {
                    info!("Tour stop '{}' at {}", slot, target);
                    let report = self.move_to(target, self.motion.profile)?;
                    outcomes.push(ActionOutcome::Moved(report));
                }
                None => {
                    warn!("Tour skipping empty slot '{}'", slot);
                    outcomes.push(ActionOutcome::SlotEmpty { slot: slot.clone() });
                }
            }
        }
        Ok(outcomes)
    }

    fn dwell(&mut self, dwell: Duration) -> Result<(), AxisError> {
        let clock = Arc::clone(&self.scheduler.clock);
        let end = clock.now() + dwell;
        loop {
            self.scheduler.collect();
            if self.scheduler.aborted() {
                self.scheduler.settle_cancel();
                return Err(MotionError::Cancelled { steps_done: 0 }.into());
            }
            let now = clock.now();
            if now >= end {
                return Ok(());
            }
            clock.sleep((end - now).min(self.poll_interval));
        }
    }

    // ─── Driver ─────────────────────────────────────────────────────

    pub fn verify_link(&self) -> Result<(), BusError> {
        self.client.verify_link()
    }

    /// Clear latched driver faults and re-apply the init registers.
    pub fn clear_faults(&self) -> Result<GlobalStatus, BusError> {
        self.client.clear_faults()
    }

    pub fn enable(&mut self) {
        self.generator.enable();
    }

    pub fn disable(&mut self) {
        self.generator.disable();
    }

    // ─── Events ─────────────────────────────────────────────────────

    /// Feed a raw button edge and run whatever it completes.
    ///
    /// `at` must be on the controller's [`Clock`] time base: a pending edge
    /// is accepted once `clock.now()` is a full debounce interval past it, so
    /// a timestamp from another epoch leaves the edge pending until the next
    /// raw change flushes it. The final release of a gesture resolves on a
    /// later [`process_events`](Self::process_events) pass.
    pub fn on_button_event(&mut self, id: &str, edge: Edge, at: Duration) -> Vec<CommandResult> {
        self.scheduler.on_edge(id, edge, at);
        self.process_events()
    }

    /// Collect inputs and run every pending command in arrival order.
    pub fn process_events(&mut self) -> Vec<CommandResult> {
        self.scheduler.batch = true;
        self.scheduler.collect();
        let mut results = Vec::new();
        while let Some(command) = self.scheduler.pending.pop_front() {
            if self.scheduler.aborted() {
                let dropped = self.scheduler.pending.len() + 1;
                self.scheduler.pending.clear();
                info!("Dropped {} pending commands", dropped);
                break;
            }
            let result = self.execute(command);
            if let Err(e) = &result {
                warn!("Command failed: {}", e);
            }
            results.push(result);
            self.scheduler.collect();
        }
        self.scheduler.batch = false;
        if self.scheduler.cancel.reset() {
            self.scheduler.pending.clear();
            info!("Motion aborted");
        }
        results
    }

    fn execute(&mut self, command: Command) -> CommandResult {
        match command {
            Command::MoveTo(target) => moved(self.move_to(target, self.motion.profile)),
            Command::Action(ButtonAction::Jog { steps }) => moved(self.jog(steps)),
            Command::Action(ButtonAction::Recall { slot }) => self.recall(&slot),
            Command::Action(ButtonAction::Save { slot }) => Ok(self.save_position(&slot)),
            Command::Home => self.home_configured().map(ActionOutcome::Homed),
        }
    }

    /// Scheduler loop: process events every poll interval until `running`
    /// clears or a shutdown event arrives. Releases the driver on exit.
    pub fn run(&mut self, running: &AtomicBool) {
        info!("Scheduler loop started (poll every {:?})", self.poll_interval);
        while running.load(Ordering::SeqCst) && !self.scheduler.shutdown {
            for result in self.process_events().into_iter().flatten() {
                debug!("Completed {:?}", result);
            }
            self.scheduler.clock.sleep(self.poll_interval);
        }
        self.generator.disable();
        info!("Scheduler loop stopped at position {}", self.position());
    }
}

fn moved(result: Result<MoveReport, AxisError>) -> CommandResult {
    match result {
        Ok(report) => Ok(ActionOutcome::Moved(report)),
        Err(AxisError::Motion(MotionError::Cancelled { steps_done })) => {
            Ok(ActionOutcome::Preempted { steps_done })
        }
        Err(e) => Err(e),
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("generator", &self.generator)
            .field("device", &self.client.device().name)
            .field("pending", &self.scheduler.pending.len())
            .finish_non_exhaustive()
    }
}
