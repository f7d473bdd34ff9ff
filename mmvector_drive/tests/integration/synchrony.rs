//! Integration test: global start/stop synchrony.
//!
//! Every moving axis starts its ramp-in at tick 0 and delivers its last
//! pulse on `max_time + 2 * total_ramp_delay`, whatever its step count and
//! cruise interval.

use mmvector_common::consts::{GRIPPER, NMOTORS};
use mmvector_drive::command::{Direction, MoveCommand, plan_move};
use mmvector_drive::ramp::RampTable;
use mmvector_drive::scheduler::{DriveContext, MoveOutcome, TickOutcome};
use proptest::prelude::*;

use super::{explicit, move_events, run, sim_drive};

fn total_ramp() -> u64 {
    u64::from(RampTable::standard().total_ramp_delay())
}

// ── Scenarios ───────────────────────────────────────────────────────

#[test]
fn equal_cruise_axes_finish_on_the_same_tick() {
    let mut drive = sim_drive();
    let plan = explicit(&[
        (0, Direction::Forward, 100, 5),
        (1, Direction::Forward, 50, 10),
    ]);
    let report = run(&mut drive, &plan);

    let end = 500 + 2 * total_ramp();
    assert_eq!(end, 4700);
    assert_eq!(report.outcome, MoveOutcome::Completed);
    assert_eq!(report.end_tick, end);
    assert_eq!(report.axes[0].finish_tick, Some(end));
    assert_eq!(report.axes[1].finish_tick, Some(end));
    assert_eq!(report.pulses_emitted, 150);
    assert_eq!(move_events(&drive), 150);
    assert!(report.is_synchronized());
    assert_eq!(drive.positions(), [100, 50, 0, 0, 0, 0]);
}

#[test]
fn gripper_single_step_rides_the_full_envelope() {
    let mut drive = sim_drive();
    let command: MoveCommand = "5:1".parse().unwrap();
    let plan = drive.context().plan(&command);
    let min_delay = u64::from(drive.context().motors[GRIPPER].min_step_delay);
    let report = run(&mut drive, &plan);

    let gripper = &report.axes[GRIPPER];
    assert_eq!(gripper.name, "gripper");
    assert_eq!(gripper.steps_taken, 1);
    assert_eq!(gripper.finish_tick, Some(min_delay + 2 * total_ramp()));
    assert_eq!(gripper.ramp_in_ticks, total_ramp());
    assert_eq!(gripper.ramp_out_ticks, total_ramp());
    assert_eq!(report.pulses_emitted, 1);
}

#[test]
fn gripper_keeps_pace_with_long_traverse() {
    let mut drive = sim_drive();
    let command: MoveCommand = "0:+200,3:-75,5:1".parse().unwrap();
    let plan = drive.context().plan(&command);
    let report = run(&mut drive, &plan);

    let end = plan.predicted_end_tick(&drive.context().ramp);
    assert_eq!(end, 200 * 29 + 2 * total_ramp());
    for axis in [0, 3, GRIPPER] {
        assert_eq!(report.axes[axis].finish_tick, Some(end), "axis {axis}");
    }
    assert_eq!(drive.positions(), [200, 0, 0, -75, 0, 1]);
}

#[test]
fn all_zero_move_completes_immediately() {
    let mut drive = sim_drive();
    let before = drive.bus().strobe_count();
    let report = run(&mut drive, &explicit(&[]));

    assert_eq!(report.outcome, MoveOutcome::Completed);
    assert_eq!(report.end_tick, 0);
    assert_eq!(report.pulses_emitted, 0);
    assert_eq!(drive.bus().strobe_count(), before);
    assert!(report.axes.iter().all(|a| a.finish_tick.is_none()));
    assert!(report.is_synchronized());
}

#[test]
fn zero_step_axes_do_not_delay_completion() {
    let mut drive = sim_drive();
    let report = run(&mut drive, &explicit(&[(2, Direction::Backward, 40, 7)]));
    assert_eq!(report.end_tick, 280 + 2 * total_ramp());
    for (i, axis) in report.axes.iter().enumerate().filter(|(i, _)| *i != 2) {
        assert_eq!(axis.steps_taken, 0, "axis {i}");
        assert_eq!(drive.bus().lines().latched(i), Default::default());
    }
}

#[test]
fn ramp_envelope_is_symmetric_for_every_axis() {
    let mut drive = sim_drive();
    let command = MoveCommand::from_deltas([3, -17, 40, 41, -120, 1]).unwrap();
    let plan = drive.context().plan(&command);
    let report = run(&mut drive, &plan);

    for axis in &report.axes {
        assert_eq!(axis.ramp_in_ticks, total_ramp(), "{}", axis.name);
        assert_eq!(axis.ramp_out_ticks, total_ramp(), "{}", axis.name);
    }
    assert!(report.is_synchronized());
}

#[test]
fn same_tick_pulses_go_out_in_index_order() {
    let mut drive = sim_drive();
    let plan = explicit(&[
        (0, Direction::Forward, 100, 5),
        (1, Direction::Forward, 50, 10),
        (4, Direction::Backward, 25, 20),
    ]);
    drive.begin(&plan).unwrap();

    let mut shared_ticks = 0;
    loop {
        let latched_before = drive.bus().lines().events().len();
        match drive.tick(false) {
            TickOutcome::Running { fired, .. } => {
                assert!(fired.windows(2).all(|w| w[0] < w[1]), "{fired:?}");
                let addresses: Vec<u8> = drive.bus().lines().events()[latched_before..]
                    .iter()
                    .map(|e| e.address)
                    .collect();
                assert_eq!(addresses.as_slice(), fired.as_slice());
                if fired.len() > 1 {
                    shared_ticks += 1;
                }
            }
            TickOutcome::Completed(report) => {
                let addresses: Vec<u8> = drive.bus().lines().events()[latched_before..]
                    .iter()
                    .map(|e| e.address)
                    .collect();
                assert_eq!(addresses, vec![0, 1, 4]);
                assert_eq!(report.end_tick, 500 + 2 * total_ramp());
                break;
            }
            other => panic!("unexpected {other:?}"),
        }
    }
    assert!(shared_ticks > 0);
}

#[test]
fn custom_ramp_shifts_the_end_tick() {
    let mut ctx = DriveContext::default();
    ctx.ramp = RampTable::from_config(&mmvector_common::arm::RampConfig {
        max_ramp_delay: 120,
        ramp_steps: 12,
    })
    .unwrap();
    let mut drive = super::drive_with(ctx);
    let report = run(&mut drive, &explicit(&[(0, Direction::Forward, 30, 4)]));
    assert_eq!(report.end_tick, 120 + 2 * 780);
    assert_eq!(report.axes[0].ramp_in_ticks, 780);
}

// ── Properties ──────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn planned_moves_always_finish_together(
        deltas in prop::array::uniform6(-300i64..=300),
        delays in prop::array::uniform6(1u32..=60),
    ) {
        let mut ctx = DriveContext::default();
        for (motor, delay) in ctx.motors.iter_mut().zip(delays) {
            motor.min_step_delay = delay;
        }
        let command = MoveCommand::from_deltas(deltas).unwrap();
        let plan = plan_move(&command, &ctx.motors);
        let mut drive = super::drive_with(ctx);
        let report = run(&mut drive, &plan);

        let predicted = plan.predicted_end_tick(&drive.context().ramp);
        prop_assert_eq!(report.end_tick, predicted);
        prop_assert!(report.is_synchronized());

        let expected_pulses: u64 = deltas.iter().map(|d| d.unsigned_abs()).sum();
        prop_assert_eq!(report.pulses_emitted, expected_pulses);
        prop_assert_eq!(drive.positions(), deltas);

        for i in 0..NMOTORS {
            let axis = &report.axes[i];
            if deltas[i] == 0 {
                prop_assert_eq!(axis.finish_tick, None);
                continue;
            }
            prop_assert_eq!(axis.finish_tick, Some(predicted));
            prop_assert_eq!(axis.ramp_in_ticks, total_ramp());
            prop_assert_eq!(axis.ramp_out_ticks, total_ramp());
        }
    }
}
