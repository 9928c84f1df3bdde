//! Caller-facing controller tests on the simulated board.
//!
//! Button gestures are fed as raw edges with timestamps on a manual clock, so
//! debounce and long-press classification are exact.

use handmov_axis::clock::{Clock, ManualClock};
use handmov_axis::controller::{ActionOutcome, CommandResult};
use handmov_axis::events::AxisEvent;
use handmov_axis::sim::SimBoard;
use handmov_axis::Controller;
use handmov_common::config::{StoreConfig, UnitConfig};
use handmov_common::device::TMC2130;
use handmov_common::error::{AxisError, BusError, MotionError};
use handmov_common::input::{ButtonConfig, ButtonRole};
use handmov_common::io::Edge;
use handmov_common::motion::SpeedProfile;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

fn unit_config(store: PathBuf) -> UnitConfig {
    UnitConfig {
        buttons: vec![
            ButtonConfig {
                id: "plus".to_string(),
                role: ButtonRole::Jog { steps: 100 },
            },
            ButtonConfig {
                id: "minus".to_string(),
                role: ButtonRole::Jog { steps: -100 },
            },
            ButtonConfig {
                id: "p1".to_string(),
                role: ButtonRole::Slot {
                    slot: "pos1".to_string(),
                },
            },
        ],
        store: StoreConfig { path: store },
        ..Default::default()
    }
}

struct Rig {
    controller: Controller,
    clock: ManualClock,
    board: SimBoard,
}

fn rig(store: &Path) -> Rig {
    let clock = ManualClock::new();
    let board = SimBoard::new(&TMC2130, 10_000);
    let controller = Controller::initialize(
        board.pins(),
        board.bus(ms(10)),
        &unit_config(store.join("position.json")),
        Arc::new(clock.clone()),
    )
    .unwrap();
    Rig {
        controller,
        clock,
        board,
    }
}

impl Rig {
    /// Press `id` now, hold for `held`, release, then let the release settle.
    fn gesture(&mut self, id: &str, held: Duration) -> Vec<CommandResult> {
        let t0 = self.clock.now();
        let mut results = self.controller.on_button_event(id, Edge::Pressed, t0);
        self.clock.set(t0 + held);
        results.extend(self.controller.on_button_event(id, Edge::Released, t0 + held));
        self.clock.advance(ms(100));
        results.extend(self.controller.process_events());
        results
    }
}

// ── Save / recall ──

#[test]
fn long_press_saves_short_press_recalls() {
    let dir = TempDir::new().unwrap();
    let mut r = rig(dir.path());

    r.controller.move_to(1_234, SpeedProfile::default()).unwrap();
    let results = r.gesture("p1", ms(1_500));
    assert_eq!(results.len(), 1);
    assert_eq!(
        *results[0].as_ref().unwrap(),
        ActionOutcome::Saved {
            slot: "pos1".to_string(),
            position: 1_234,
            persisted: true,
        }
    );

    r.controller.move_to(0, SpeedProfile::default()).unwrap();
    let results = r.gesture("p1", ms(200));
    assert_eq!(results.len(), 1);
    assert!(matches!(results[0], Ok(ActionOutcome::Moved(_))));
    assert_eq!(r.controller.position(), 1_234);
    assert_eq!(r.board.axis.position(), 10_000 + 1_234);
}

#[test]
fn long_press_threshold_is_inclusive() {
    let dir = TempDir::new().unwrap();
    let mut r = rig(dir.path());

    let results = r.gesture("p1", ms(1_000));
    assert!(matches!(results[0], Ok(ActionOutcome::Saved { .. })));

    let results = r.gesture("p1", ms(999));
    assert!(matches!(results[0], Ok(ActionOutcome::Moved(_))));
}

#[test]
fn recall_of_empty_slot_does_not_move() {
    let dir = TempDir::new().unwrap();
    let mut r = rig(dir.path());

    let results = r.gesture("p1", ms(100));
    assert_eq!(
        *results[0].as_ref().unwrap(),
        ActionOutcome::SlotEmpty {
            slot: "pos1".to_string()
        }
    );
    assert_eq!(r.board.axis.pulses(), 0);
}

#[test]
fn bounce_produces_no_action() {
    let dir = TempDir::new().unwrap();
    let mut r = rig(dir.path());

    let mut results = r.controller.on_button_event("plus", Edge::Pressed, ms(0));
    results.extend(r.controller.on_button_event("plus", Edge::Released, ms(10)));
    r.clock.set(ms(500));
    results.extend(r.controller.process_events());

    assert!(results.is_empty());
    assert_eq!(r.controller.position(), 0);
}

#[test]
fn jog_buttons_move_relative() {
    let dir = TempDir::new().unwrap();
    let mut r = rig(dir.path());

    r.gesture("plus", ms(200));
    r.gesture("plus", ms(200));
    r.gesture("minus", ms(200));

    assert_eq!(r.controller.position(), 100);
}

#[test]
fn release_resolves_one_debounce_after_edge_on_clock() {
    let dir = TempDir::new().unwrap();
    let mut r = rig(dir.path());

    let t0 = r.clock.now();
    assert!(r.controller.on_button_event("p1", Edge::Pressed, t0).is_empty());
    let released = t0 + ms(1_500);
    r.clock.set(released);
    assert!(r.controller.on_button_event("p1", Edge::Released, released).is_empty());

    r.clock.set(released + ms(49));
    assert!(r.controller.process_events().is_empty());

    r.clock.set(released + ms(50));
    let results = r.controller.process_events();
    assert_eq!(results.len(), 1);
    assert!(matches!(results[0], Ok(ActionOutcome::Saved { position: 0, .. })));
}

#[test]
fn unknown_button_is_ignored() {
    let dir = TempDir::new().unwrap();
    let mut r = rig(dir.path());
    let results = r.gesture("nope", ms(1_500));
    assert!(results.is_empty());
}

// ── Persistence ──

#[test]
fn saved_slots_survive_restart() {
    let dir = TempDir::new().unwrap();
    {
        let mut r = rig(dir.path());
        r.controller.move_to(-640, SpeedProfile::default()).unwrap();
        r.gesture("p1", ms(1_200));
    }

    let mut r = rig(dir.path());
    assert_eq!(r.controller.store().get("pos1"), Some(-640));
    let outcome = r.controller.recall("pos1").unwrap();
    assert!(matches!(outcome, ActionOutcome::Moved(_)));
    assert_eq!(r.controller.position(), -640);
}

#[test]
fn corrupt_store_starts_empty_and_is_replaced() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("position.json");
    fs::write(&path, "{ not json").unwrap();

    let mut r = rig(dir.path());
    assert!(r.controller.store().slots().is_empty());

    let outcome = r.controller.save_position("pos1");
    assert!(matches!(outcome, ActionOutcome::Saved { persisted: true, .. }));
    let content = fs::read_to_string(&path).unwrap();
    let table: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(table["pos1"], 0);
}

// ── Moves ──

#[test]
fn move_to_current_position_is_a_no_op() {
    let dir = TempDir::new().unwrap();
    let mut r = rig(dir.path());

    let report = r.controller.move_to(0, SpeedProfile::default()).unwrap();
    assert_eq!(report.pulses, 0);
    assert_eq!(r.board.axis.pulses(), 0);
    assert!(!r.controller.is_moving());
}

#[test]
fn invalid_profile_rejected_before_any_pulse() {
    let dir = TempDir::new().unwrap();
    let mut r = rig(dir.path());

    let profile = SpeedProfile {
        initial_delay_us: 100.0,
        min_delay_us: 300.0,
        overshoot: 0,
    };
    let err = r.controller.move_to(500, profile).unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(r.board.axis.pulses(), 0);
}

#[test]
fn handle_reports_from_other_thread() {
    let dir = TempDir::new().unwrap();
    let mut r = rig(dir.path());
    r.controller.move_to(300, SpeedProfile::default()).unwrap();

    let handle = r.controller.handle();
    let (position, moving) = std::thread::spawn(move || (handle.position(), handle.is_moving()))
        .join()
        .unwrap();
    assert_eq!(position, 300);
    assert!(!moving);
}

#[test]
fn overshoot_lands_on_target_from_one_side() {
    let dir = TempDir::new().unwrap();
    let mut r = rig(dir.path());

    let report = r
        .controller
        .move_to(500, SpeedProfile::default().with_overshoot(25))
        .unwrap();
    assert_eq!(report.to, 500);
    assert_eq!(r.controller.position(), 500);
    assert_eq!(r.board.axis.max_position(), 10_000 + 525);
}

// ── Tour ──

#[test]
fn tour_visits_slots_and_skips_empty() {
    let dir = TempDir::new().unwrap();
    let mut r = rig(dir.path());
    r.controller.move_to(100, SpeedProfile::default()).unwrap();
    r.controller.save_position("a");
    r.controller.move_to(-50, SpeedProfile::default()).unwrap();
    r.controller.save_position("c");
    r.controller.move_to(0, SpeedProfile::default()).unwrap();

    let start = r.clock.now();
    let stops = ["a", "b", "c"].map(String::from);
    let outcomes = r.controller.tour(&stops, Duration::from_secs(10)).unwrap();

    assert_eq!(outcomes.len(), 3);
    assert!(matches!(outcomes[0], ActionOutcome::Moved(_)));
    assert_eq!(
        outcomes[1],
        ActionOutcome::SlotEmpty {
            slot: "b".to_string()
        }
    );
    assert!(matches!(outcomes[2], ActionOutcome::Moved(_)));
    assert_eq!(r.controller.position(), -50);
    assert!(r.clock.now() - start >= Duration::from_secs(20));
}

#[test]
fn cancelled_tour_stops_before_moving() {
    let dir = TempDir::new().unwrap();
    let mut r = rig(dir.path());
    r.controller.move_to(100, SpeedProfile::default()).unwrap();
    r.controller.save_position("a");
    r.controller.move_to(0, SpeedProfile::default()).unwrap();
    let pulses = r.board.axis.pulses();

    r.controller.cancel_token().cancel();
    let err = r
        .controller
        .tour(&["a".to_string()], Duration::from_secs(1))
        .unwrap_err();

    assert!(matches!(
        err,
        AxisError::Motion(MotionError::Cancelled { steps_done: 0 })
    ));
    assert_eq!(r.board.axis.pulses(), pulses);

    // The cancel is spent on the aborted tour.
    let outcomes = r
        .controller
        .tour(&["a".to_string()], Duration::from_secs(1))
        .unwrap();
    assert!(matches!(outcomes[0], ActionOutcome::Moved(_)));
    assert_eq!(r.controller.position(), 100);
}

// ── Cancel ──

#[test]
fn cancel_aborts_only_the_next_direct_move() {
    let dir = TempDir::new().unwrap();
    let mut r = rig(dir.path());

    r.controller.cancel_token().cancel();
    let err = r.controller.move_to(100, SpeedProfile::default()).unwrap_err();
    assert!(matches!(
        err,
        AxisError::Motion(MotionError::Cancelled { steps_done: 0 })
    ));
    assert!(!r.controller.cancel_token().is_cancelled());

    let report = r.controller.move_to(100, SpeedProfile::default()).unwrap();
    assert_eq!(report.to, 100);
    r.controller.jog(-40).unwrap();
    assert_eq!(r.controller.position(), 60);
}

// ── Driver enable ──

#[test]
fn move_refused_while_driver_disabled() {
    let dir = TempDir::new().unwrap();
    let mut r = rig(dir.path());

    r.controller.disable();
    let err = r.controller.move_to(500, SpeedProfile::default()).unwrap_err();
    assert!(matches!(err, AxisError::Motion(MotionError::DriverDisabled)));
    assert!(!err.is_configuration());
    assert_eq!(r.controller.position(), 0);
    assert_eq!(r.board.axis.pulses(), 0);
    assert_eq!(r.board.axis.position(), 10_000);

    r.controller.enable();
    r.controller.move_to(500, SpeedProfile::default()).unwrap();
    assert_eq!(r.controller.position(), 500);
    assert_eq!(r.board.axis.position(), 10_500);
}

// ── Queue ──

#[test]
fn queued_recall_and_move_run_in_order() {
    let dir = TempDir::new().unwrap();
    let mut r = rig(dir.path());
    r.controller.move_to(700, SpeedProfile::default()).unwrap();
    r.controller.save_position("pos1");

    let events = r.controller.events();
    events.push(AxisEvent::MoveTo { target: -200 }).unwrap();
    events
        .push(AxisEvent::Recall {
            slot: "pos1".to_string(),
        })
        .unwrap();
    let results = r.controller.process_events();

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|res| matches!(res, Ok(ActionOutcome::Moved(_)))));
    assert_eq!(r.controller.position(), 700);
    assert_eq!(r.board.axis.min_position(), 10_000 - 200);
}

// ── Initialization ──

#[test]
fn bus_fault_during_init_fails_without_motion() {
    let dir = TempDir::new().unwrap();
    let board = SimBoard::new(&TMC2130, 0);
    board.chip.fail_next(1);

    let result = Controller::initialize(
        board.pins(),
        board.bus(ms(10)),
        &unit_config(dir.path().join("position.json")),
        Arc::new(ManualClock::new()),
    );

    assert!(matches!(
        result,
        Err(AxisError::Bus(BusError::Transfer(_)))
    ));
    assert_eq!(board.axis.pulses(), 0);
    assert!(!board.axis.is_enabled());
}

#[test]
fn invalid_config_rejected() {
    let dir = TempDir::new().unwrap();
    let board = SimBoard::new(&TMC2130, 0);
    let mut config = unit_config(dir.path().join("position.json"));
    config.motion.profile.min_delay_us = 0.0;

    let result = Controller::initialize(
        board.pins(),
        board.bus(ms(10)),
        &config,
        Arc::new(ManualClock::new()),
    );
    assert!(matches!(result, Err(AxisError::Config(_))));
}

#[test]
fn init_programs_registers_and_passes_link_check() {
    let dir = TempDir::new().unwrap();
    let r = rig(dir.path());

    for write in TMC2130.init_sequence {
        assert_eq!(r.board.chip.register(write.address), write.value);
    }
    r.controller.verify_link().unwrap();
    assert!(r.board.axis.is_enabled());
}
