//! Step/direction pulse generation.
//!
//! [`MotionGenerator`] is the only writer of the axis position. Everyone
//! else reads it through a cloned [`AxisHandle`]. Position is published after
//! every pulse so concurrent readers see live progress.
//!
//! Each step is: step line high, pulse width, step line low, planned delay.
//! Before every pulse the caller's [`StepHook`] is consulted; returning
//! [`StepControl::Cancel`] stops the move at that boundary.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use handmov_common::error::MotionError;
use handmov_common::io::Level;
use handmov_common::motion::{Direction, MotionConfig, MotionRequest, SpeedProfile};
use tracing::{debug, info, warn};

use super::ramp::RampPlan;
use crate::clock::Clock;
use crate::hw::StepperPins;

// ─── Axis State ─────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct AxisState {
    position: AtomicI64,
    moving: AtomicBool,
}

/// Read-only view of the axis.
#[derive(Debug, Clone)]
pub struct AxisHandle {
    state: Arc<AxisState>,
}

impl AxisHandle {
    /// Signed step count from the current reference.
    #[inline]
    pub fn position(&self) -> i64 {
        self.state.position.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_moving(&self) -> bool {
        self.state.moving.load(Ordering::Acquire)
    }
}

// ─── Step Hook ──────────────────────────────────────────────────────

/// Decision taken at a step boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepControl {
    Continue,
    Cancel,
}

/// Called before every pulse with the current position.
pub trait StepHook {
    fn at_boundary(&mut self, position: i64) -> StepControl;
}

impl<F: FnMut(i64) -> StepControl> StepHook for F {
    fn at_boundary(&mut self, position: i64) -> StepControl {
        self(position)
    }
}

/// Hook that never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCancel;

impl StepHook for NoCancel {
    #[inline]
    fn at_boundary(&mut self, _position: i64) -> StepControl {
        StepControl::Continue
    }
}

// ─── Generator ──────────────────────────────────────────────────────

/// Outcome of a completed move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveReport {
    pub from: i64,
    pub to: i64,
    /// Pulses emitted, forward and settle steps together.
    pub pulses: u32,
}

/// Owner of the step/dir/enable lines and of the axis position.
pub struct MotionGenerator {
    pins: StepperPins,
    state: Arc<AxisState>,
    clock: Arc<dyn Clock>,
    pulse_width: Duration,
    reverse_pause: Duration,
    direction: Option<Direction>,
    enabled: bool,
}

impl MotionGenerator {
    pub fn new(pins: StepperPins, config: &MotionConfig, clock: Arc<dyn Clock>) -> Self {
        let mut generator = Self {
            pins,
            state: Arc::new(AxisState::default()),
            clock,
            pulse_width: config.pulse_width(),
            reverse_pause: config.reverse_pause(),
            direction: None,
            enabled: false,
        };
        generator.pins.step.set_level(Level::Low);
        generator.pins.set_enabled(false);
        generator
    }

    pub fn handle(&self) -> AxisHandle {
        AxisHandle {
            state: Arc::clone(&self.state),
        }
    }

    #[inline]
    pub fn position(&self) -> i64 {
        self.state.position.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_moving(&self) -> bool {
        self.state.moving.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn enable(&mut self) {
        self.pins.set_enabled(true);
        self.enabled = true;
        debug!("Driver enabled");
    }

    pub fn disable(&mut self) {
        self.pins.set_enabled(false);
        self.enabled = false;
        debug!("Driver disabled");
    }

    /// Redefine the current location as zero.
    pub fn zero_position(&mut self) {
        self.state.position.store(0, Ordering::Release);
    }

    pub(crate) fn set_moving(&self, moving: bool) {
        self.state.moving.store(moving, Ordering::Release);
    }

    /// Move to `request.target_position` along a trapezoidal ramp.
    ///
    /// Parameters are validated before any line is touched. A zero-length
    /// move returns at once without pulses.
    ///
    /// # Errors
    ///
    /// - `MotionError::Configuration` for invalid delays or a displacement
    ///   that does not fit in `u32` steps.
    /// - `MotionError::DriverDisabled` while the driver is de-energized.
    /// - `MotionError::Cancelled` when `hook` cancels; position reflects the
    ///   pulses already emitted.
    pub fn plan_and_execute(
        &mut self,
        request: &MotionRequest,
        hook: &mut dyn StepHook,
    ) -> Result<MoveReport, MotionError> {
        request.validate()?;
        self.ensure_enabled()?;
        let from = self.position();
        let Some(direction) = Direction::toward(from, request.target_position) else {
            return Ok(MoveReport {
                from,
                to: from,
                pulses: 0,
            });
        };
        let steps_needed =
            u32::try_from(request.target_position.abs_diff(from)).map_err(|_| {
                MotionError::Configuration(format!(
                    "displacement {} -> {} exceeds u32 steps",
                    from, request.target_position
                ))
            })?;
        let plan = RampPlan::new(steps_needed, &request.profile)?;

        debug!(
            "Move {} -> {}: {} steps, ramp {}, overshoot {}",
            from,
            request.target_position,
            plan.total_steps(),
            plan.ramp_steps(),
            plan.overshoot()
        );

        self.set_moving(true);
        let result = self.run_plan(&plan, direction, hook);
        self.set_moving(false);

        let pulses = result?;
        let to = self.position();
        info!("Move complete at {} ({} pulses)", to, pulses);
        Ok(MoveReport { from, to, pulses })
    }

    /// Relative move by `delta` steps.
    pub fn move_relative(
        &mut self,
        delta: i64,
        profile: &SpeedProfile,
        hook: &mut dyn StepHook,
    ) -> Result<MoveReport, MotionError> {
        let target = self.position().saturating_add(delta);
        self.plan_and_execute(&MotionRequest::new(target, *profile), hook)
    }

    /// Emit one step in `direction`, then wait `delay`.
    pub fn step(&mut self, direction: Direction, delay: Duration) -> Result<(), MotionError> {
        self.ensure_enabled()?;
        self.set_direction(direction);
        self.pulse(direction);
        self.clock.sleep(delay);
        Ok(())
    }

    fn ensure_enabled(&self) -> Result<(), MotionError> {
        if self.enabled {
            Ok(())
        } else {
            warn!("Move refused at {}: driver disabled", self.position());
            Err(MotionError::DriverDisabled)
        }
    }

    fn run_plan(
        &mut self,
        plan: &RampPlan,
        direction: Direction,
        hook: &mut dyn StepHook,
    ) -> Result<u32, MotionError> {
        self.set_direction(direction);
        let mut pulses = 0u32;

        for i in 0..plan.total_steps() {
            if hook.at_boundary(self.position()) == StepControl::Cancel {
                return Err(self.cancelled(pulses));
            }
            self.pulse(direction);
            pulses += 1;
            self.clock.sleep(plan.delay(i));
        }

        if plan.overshoot() > 0 {
            let back = direction.reversed();
            self.set_direction(back);
            self.clock.sleep(self.reverse_pause);
            for _ in 0..plan.overshoot() {
                if hook.at_boundary(self.position()) == StepControl::Cancel {
                    return Err(self.cancelled(pulses));
                }
                self.pulse(back);
                pulses += 1;
                self.clock.sleep(plan.settle_delay());
            }
        }
        Ok(pulses)
    }

    fn cancelled(&self, steps_done: u32) -> MotionError {
        info!(
            "Move cancelled at {} after {} steps",
            self.position(),
            steps_done
        );
        MotionError::Cancelled { steps_done }
    }

    fn set_direction(&mut self, direction: Direction) {
        if self.direction != Some(direction) {
            self.pins.set_direction(direction);
            self.direction = Some(direction);
        }
    }

    fn pulse(&mut self, direction: Direction) {
        self.pins.step.set_level(Level::High);
        self.clock.sleep(self.pulse_width);
        self.pins.step.set_level(Level::Low);
        self.state
            .position
            .fetch_add(direction.sign(), Ordering::AcqRel);
    }
}

impl std::fmt::Debug for MotionGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotionGenerator")
            .field("position", &self.position())
            .field("moving", &self.is_moving())
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::sim::axis::SimulatedAxis;

    fn generator() -> (MotionGenerator, SimulatedAxis, ManualClock) {
        let clock = ManualClock::new();
        let axis = SimulatedAxis::new();
        let config = MotionConfig {
            reverse_pause_ms: 0,
            ..Default::default()
        };
        let mut generator = MotionGenerator::new(axis.pins(), &config, Arc::new(clock.clone()));
        generator.enable();
        (generator, axis, clock)
    }

    // ── Moves ──

    #[test]
    fn zero_length_move_emits_nothing() {
        let (mut generator, axis, clock) = generator();
        let report = generator
            .plan_and_execute(&MotionRequest::new(0, SpeedProfile::default()), &mut NoCancel)
            .unwrap();
        assert_eq!(report.pulses, 0);
        assert_eq!(axis.pulses(), 0);
        assert_eq!(generator.position(), 0);
        assert_eq!(clock.now(), Duration::ZERO);
    }

    #[test]
    fn reference_move_reaches_target() {
        let (mut generator, axis, _) = generator();
        let profile = SpeedProfile {
            initial_delay_us: 1000.0,
            min_delay_us: 300.0,
            overshoot: 0,
        };
        let report = generator
            .plan_and_execute(&MotionRequest::new(1000, profile), &mut NoCancel)
            .unwrap();
        assert_eq!(report.to, 1000);
        assert_eq!(generator.position(), 1000);
        assert_eq!(axis.position(), 1000);
        assert_eq!(axis.pulses(), 1000);
        assert!(!generator.is_moving());
    }

    #[test]
    fn negative_move_sets_direction_once() {
        let (mut generator, axis, _) = generator();
        generator
            .plan_and_execute(&MotionRequest::new(-50, SpeedProfile::default()), &mut NoCancel)
            .unwrap();
        assert_eq!(axis.position(), -50);
        assert_eq!(axis.direction_writes(), 1);
    }

    #[test]
    fn overshoot_reverses_and_settles_on_target() {
        let (mut generator, axis, _) = generator();
        let profile = SpeedProfile::default().with_overshoot(20);
        let report = generator
            .plan_and_execute(&MotionRequest::new(100, profile), &mut NoCancel)
            .unwrap();
        assert_eq!(report.pulses, 140);
        assert_eq!(generator.position(), 100);
        assert_eq!(axis.position(), 100);
        assert_eq!(axis.max_position(), 120);
        assert_eq!(axis.direction_writes(), 2);
    }

    #[test]
    fn invalid_profile_rejected_before_pulses() {
        let (mut generator, axis, _) = generator();
        let profile = SpeedProfile {
            initial_delay_us: 0.0,
            min_delay_us: 0.0,
            overshoot: 0,
        };
        let err = generator
            .plan_and_execute(&MotionRequest::new(10, profile), &mut NoCancel)
            .unwrap_err();
        assert!(matches!(err, MotionError::Configuration(_)));
        assert_eq!(axis.pulses(), 0);
        assert_eq!(axis.direction_writes(), 0);
    }

    #[test]
    fn move_duration_follows_plan() {
        let (mut generator, _, clock) = generator();
        let profile = SpeedProfile::constant(500.0);
        generator
            .plan_and_execute(&MotionRequest::new(10, profile), &mut NoCancel)
            .unwrap();
        let pulse = MotionConfig::default().pulse_width();
        assert_eq!(clock.now(), Duration::from_micros(5000) + pulse * 10);
    }

    // ── Cancellation ──

    #[test]
    fn cancel_stops_at_step_boundary() {
        let (mut generator, axis, _) = generator();
        let mut hook = |position: i64| {
            if position >= 25 {
                StepControl::Cancel
            } else {
                StepControl::Continue
            }
        };
        let err = generator
            .plan_and_execute(&MotionRequest::new(100, SpeedProfile::default()), &mut hook)
            .unwrap_err();
        assert_eq!(err, MotionError::Cancelled { steps_done: 25 });
        assert_eq!(generator.position(), 25);
        assert_eq!(axis.position(), 25);
        assert!(!generator.is_moving());
    }

    #[test]
    fn handle_sees_live_position() {
        let (mut generator, _, _) = generator();
        let handle = generator.handle();
        let mut seen = Vec::new();
        let mut hook = |_pos: i64| {
            seen.push((handle.position(), handle.is_moving()));
            StepControl::Continue
        };
        generator
            .plan_and_execute(&MotionRequest::new(3, SpeedProfile::default()), &mut hook)
            .unwrap();
        assert_eq!(seen, vec![(0, true), (1, true), (2, true)]);
        assert!(!generator.handle().is_moving());
    }

    // ── Single steps ──

    #[test]
    fn single_step_and_zero() {
        let (mut generator, axis, _) = generator();
        generator.step(Direction::Negative, Duration::from_micros(100)).unwrap();
        generator.step(Direction::Negative, Duration::from_micros(100)).unwrap();
        assert_eq!(generator.position(), -2);
        generator.zero_position();
        assert_eq!(generator.position(), 0);
        assert_eq!(axis.position(), -2);
    }

    #[test]
    fn enable_toggles_line() {
        let axis = SimulatedAxis::new();
        let mut generator =
            MotionGenerator::new(axis.pins(), &MotionConfig::default(), Arc::new(ManualClock::new()));
        assert!(!axis.is_enabled());
        generator.enable();
        assert!(axis.is_enabled());
        generator.disable();
        assert!(!axis.is_enabled());
    }

    #[test]
    fn disabled_driver_refuses_to_pulse() {
        let (mut generator, axis, _) = generator();
        generator.disable();

        let err = generator
            .plan_and_execute(&MotionRequest::new(500, SpeedProfile::default()), &mut NoCancel)
            .unwrap_err();
        assert_eq!(err, MotionError::DriverDisabled);
        assert_eq!(
            generator.step(Direction::Positive, Duration::from_micros(100)),
            Err(MotionError::DriverDisabled)
        );
        assert_eq!(generator.position(), 0);
        assert_eq!(axis.pulses(), 0);
        assert!(!generator.is_moving());

        generator.enable();
        generator
            .plan_and_execute(&MotionRequest::new(500, SpeedProfile::default()), &mut NoCancel)
            .unwrap();
        assert_eq!(axis.position(), 500);
    }
}
