//! Shared helpers for the integration tests.

mod config_drive;
mod panic_stop;
mod pin_bank;
mod synchrony;

use mmvector_common::consts::NMOTORS;
use mmvector_drive::bus::sim::SimulatedLines;
use mmvector_drive::command::{AxisPlan, Direction, MovePlan};
use mmvector_drive::cycle::FreeRunning;
use mmvector_drive::safety::NoPanic;
use mmvector_drive::scheduler::{DriveContext, DriveScheduler, MoveReport};

pub type SimDrive = DriveScheduler<SimulatedLines>;

/// Reference arm on simulated lines, bus initialized.
pub fn sim_drive() -> SimDrive {
    drive_with(DriveContext::default())
}

pub fn drive_with(ctx: DriveContext) -> SimDrive {
    let lines = SimulatedLines::new(ctx.pins);
    let mut drive = DriveScheduler::new(ctx, lines);
    drive.init_driver().unwrap();
    drive
}

/// Plan with explicit `(axis, direction, steps, base_delay)` entries.
pub fn explicit(axes: &[(usize, Direction, u32, u64)]) -> MovePlan {
    let mut plan = [AxisPlan::default(); NMOTORS];
    for &(index, direction, steps, base_delay) in axes {
        plan[index] = AxisPlan::new(direction, steps, base_delay);
    }
    MovePlan::explicit(plan)
}

/// Run `plan` to completion without pacing or panic input.
pub fn run(drive: &mut SimDrive, plan: &MovePlan) -> MoveReport {
    let mut reports: Vec<MoveReport> = Vec::new();
    let report = drive
        .run_move(plan, &mut NoPanic, &mut reports, &mut FreeRunning)
        .unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0], report);
    report
}

/// Latch events recorded after `init_driver`'s release of every motor.
pub fn move_events(drive: &SimDrive) -> usize {
    drive.bus().lines().events().len() - NMOTORS
}
