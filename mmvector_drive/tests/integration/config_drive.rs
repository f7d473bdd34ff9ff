//! Integration test: config file → drive context → move.
//!
//! Loads arm configurations from disk, builds the scheduler on simulated
//! lines wired per the file, and checks the bus sees the configured pins.

use std::fs;

use mmvector_common::prelude::*;
use mmvector_drive::DriveError;
use mmvector_drive::command::MoveCommand;
use mmvector_drive::scheduler::{DriveContext, MoveOutcome};
use tempfile::TempDir;

use super::{drive_with, run};

const REWIRED_ARM_TOML: &str = r#"
[shared]
log_level = "warn"
service_name = "rewired-arm"

[drive]
tick_period_us = 200

[bus]
pattern_pins = [30, 31, 32, 33]
address_pins = [20, 21, 22]
strobe_pin = 40
strobe_active_high = false

[ramp]
max_ramp_delay = 100
ramp_steps = 10

[[motors]]
name = "base"
min_step_delay = 12

[[motors]]
name = "shoulder"
min_step_delay = 40

[[motors]]
name = "elbow"

[[motors]]
name = "wrist_pitch"

[[motors]]
name = "wrist_roll"

[[motors]]
name = "gripper"
min_step_delay = 100
"#;

fn load(content: &str) -> Result<ArmConfig, ConfigError> {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("arm.toml");
    fs::write(&path, content).unwrap();
    ArmConfig::load_validated(&path)
}

#[test]
fn rewired_arm_runs_synchronized_move() {
    let config = load(REWIRED_ARM_TOML).unwrap();
    let ctx = DriveContext::from_config(&config).unwrap();
    assert_eq!(ctx.tick_period_us, 200);
    assert_eq!(ctx.ramp.total_ramp_delay(), 550);

    let mut drive = drive_with(ctx);
    let command: MoveCommand = "0:+50,1:+20,5:-4".parse().unwrap();
    let plan = drive.context().plan(&command);
    // Shoulder is the slowest: 20 * 40 = 800 > 50 * 12 and 4 * 100.
    assert_eq!(plan.max_cruise_ticks(), 800);

    let report = run(&mut drive, &plan);
    assert_eq!(report.outcome, MoveOutcome::Completed);
    assert_eq!(report.end_tick, 800 + 2 * 550);
    assert!(report.is_synchronized());
    assert_eq!(report.axes[5].name, "gripper");
    assert_eq!(drive.positions(), [50, 20, 0, 0, 0, -4]);

    // Latches decoded from the configured pins, strobe parked high.
    let lines = drive.bus().lines();
    assert!(lines.line(40));
    let gripper_latches = lines.events().iter().filter(|e| e.address == 5).count();
    // One release at init plus four steps.
    assert_eq!(gripper_latches, 5);
}

#[test]
fn default_pins_without_file_sections() {
    let config = load("[drive]\ntick_period_us = 1000\n").unwrap();
    let ctx = DriveContext::from_config(&config).unwrap();
    assert_eq!(ctx.pins, BusPins::default());
    assert_eq!(ctx.ramp.total_ramp_delay(), 2100);
}

#[test]
fn invalid_ramp_rejected_at_load() {
    let err = load("[ramp]\nmax_ramp_delay = 95\nramp_steps = 10\n").unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(_)));
}

#[test]
fn context_from_unvalidated_config_reports_config_error() {
    let mut config = ArmConfig::default();
    config.bus.strobe_pin = config.bus.address_pins[0];
    assert!(matches!(
        DriveContext::from_config(&config),
        Err(DriveError::Config(ConfigError::ValidationError(_)))
    ));
}

#[test]
fn report_serializes_to_json() {
    let mut drive = drive_with(DriveContext::default());
    let command: MoveCommand = "2:-3".parse().unwrap();
    let plan = drive.context().plan(&command);
    let report = run(&mut drive, &plan);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["outcome"], "Completed");
    assert_eq!(json["pulses_emitted"], 3);
    assert_eq!(json["axes"][2]["direction"], "Backward");
    assert_eq!(json["axes"][2]["position"], -3);
    assert_eq!(json["axes"].as_array().map(Vec::len), Some(NMOTORS));
}

#[test]
fn oversized_ramp_never_reaches_the_drive() {
    let mut config = ArmConfig::default();
    config.ramp = RampConfig {
        max_ramp_delay: 4_000_000_000,
        ramp_steps: 2,
    };
    assert!(matches!(
        DriveContext::from_config(&config),
        Err(DriveError::Config(ConfigError::ValidationError(_)))
    ));
}
