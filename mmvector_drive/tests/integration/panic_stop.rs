//! Integration test: panic stop.
//!
//! Asserting the panic input on any tick aborts the move before any motor
//! is serviced on that tick: no further pulses, no ramp-out, state back to
//! Idle, and the abort reported through the status sink.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use mmvector_drive::command::{Direction, MovePlan};
use mmvector_drive::cycle::{FreeRunning, PeriodicPacer};
use mmvector_drive::safety::PanicFn;
use mmvector_drive::scheduler::{DriveState, MoveOutcome, MoveReport, TickOutcome};

use super::{SimDrive, explicit, move_events, sim_drive};

// ── Helpers ─────────────────────────────────────────────────────────

/// Motor 0: 100 steps @ 5, motor 1: 50 steps @ 10. Ends on tick 4700.
fn scenario_plan() -> MovePlan {
    explicit(&[
        (0, Direction::Forward, 100, 5),
        (1, Direction::Forward, 50, 10),
    ])
}

/// Tick until `ticks` ticks have executed, asserting the move keeps running.
fn advance(drive: &mut SimDrive, ticks: u64) {
    for _ in 0..ticks {
        assert!(matches!(drive.tick(false), TickOutcome::Running { .. }));
    }
}

fn abort_at(tick: u64, expected_state: DriveState) {
    let mut drive = sim_drive();
    drive.begin(&scenario_plan()).unwrap();
    advance(&mut drive, tick);
    assert_eq!(drive.state(), expected_state, "state before panic at {tick}");

    let latched = drive.bus().lines().events().len();
    let report = match drive.tick(true) {
        TickOutcome::Aborted(report) => report,
        other => panic!("expected abort, got {other:?}"),
    };

    assert_eq!(report.outcome, MoveOutcome::Aborted);
    assert_eq!(report.end_tick, tick);
    assert_eq!(drive.state(), DriveState::Idle);
    assert!(!drive.is_busy());
    assert_eq!(drive.bus().lines().events().len(), latched);

    // Nothing moves afterwards, panic or not.
    for _ in 0..5_000 {
        assert_eq!(drive.tick(false), TickOutcome::Idle);
    }
    assert_eq!(drive.bus().lines().events().len(), latched);
    assert_eq!(report.pulses_emitted as usize, move_events(&drive));
    assert!(report.axes[0].steps_taken < 100);
    assert_eq!(report.axes[0].finish_tick, None);
}

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn panic_during_ramp_in() {
    abort_at(100, DriveState::RampIn);
}

#[test]
fn panic_during_cruise() {
    abort_at(2350, DriveState::Cruise);
}

#[test]
fn panic_during_ramp_out() {
    abort_at(4600, DriveState::RampOut);
}

#[test]
fn panic_on_first_tick_emits_nothing() {
    let mut drive = sim_drive();
    drive.begin(&scenario_plan()).unwrap();
    let report = match drive.tick(true) {
        TickOutcome::Aborted(report) => report,
        other => panic!("expected abort, got {other:?}"),
    };
    assert_eq!(report.end_tick, 0);
    assert_eq!(report.pulses_emitted, 0);
    assert_eq!(move_events(&drive), 0);
}

#[test]
fn panic_preempts_a_due_pulse() {
    let mut drive = sim_drive();
    drive.begin(&explicit(&[(2, Direction::Forward, 1, 1)])).unwrap();
    let due = drive.axis(2).next_due();
    advance(&mut drive, due);
    assert!(matches!(drive.tick(true), TickOutcome::Aborted(_)));
    assert_eq!(move_events(&drive), 0);
    assert_eq!(drive.positions()[2], 0);
}

#[test]
fn run_move_reports_abort_to_status_sink() {
    let mut drive = sim_drive();
    let mut polls = 0u64;
    let mut panic = PanicFn(|| {
        polls += 1;
        polls > 3000
    });
    let mut reports: Vec<MoveReport> = Vec::new();
    let report = drive
        .run_move(&scenario_plan(), &mut panic, &mut reports, &mut FreeRunning)
        .unwrap();

    assert_eq!(report.outcome, MoveOutcome::Aborted);
    assert_eq!(report.end_tick, 3000);
    assert_eq!(reports, vec![report.clone()]);
    assert_eq!(report.pulses_emitted as usize, move_events(&drive));
}

#[test]
fn aborted_move_is_not_retried() {
    let mut drive = sim_drive();
    drive.begin(&scenario_plan()).unwrap();
    advance(&mut drive, 1000);
    let aborted = drive.abort().unwrap();
    let position = drive.positions()[0];
    assert_eq!(position, i64::from(aborted.axes[0].steps_taken));

    // A fresh command is required; it starts from where the arm stopped.
    let report = super::run(&mut drive, &explicit(&[(0, Direction::Backward, 3, 2)]));
    assert_eq!(report.move_id, aborted.move_id + 1);
    assert_eq!(drive.positions()[0], position - 3);
}

#[test]
fn signal_flag_from_another_thread_stops_a_paced_move() {
    let mut drive = sim_drive();
    // 100 000 steps at 100 µs per tick would take minutes.
    let plan = explicit(&[(0, Direction::Forward, 100_000, 10)]);
    let flag = Arc::new(AtomicBool::new(false));
    let setter = {
        let flag = flag.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            flag.store(true, Ordering::SeqCst);
        })
    };

    let mut panic = flag.clone();
    let mut reports: Vec<MoveReport> = Vec::new();
    let mut pacer = PeriodicPacer::from_micros(100);
    let report = drive
        .run_move(&plan, &mut panic, &mut reports, &mut pacer)
        .unwrap();
    setter.join().unwrap();

    assert_eq!(report.outcome, MoveOutcome::Aborted);
    assert!(report.axes[0].steps_taken < 100_000);
    assert_eq!(drive.state(), DriveState::Idle);
}
