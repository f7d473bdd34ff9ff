//! Arm configuration: bus wiring, tick period, ramp and per-motor limits.
//!
//! Every section is optional in TOML; omitted sections take the wiring and
//! ramp of the reference arm (pattern pins 4–7, address pins 8–10, strobe 11,
//! ramp 200 → 0 in 20 steps).
//!
//! ```toml
//! [shared]
//! service_name = "mmvector-arm"
//!
//! [drive]
//! tick_period_us = 100
//!
//! [bus]
//! pattern_pins = [4, 5, 6, 7]
//! address_pins = [8, 9, 10]
//! strobe_pin = 11
//!
//! [[motors]]
//! name = "base"
//! min_step_delay = 29
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, ConfigLoader, SharedConfig};
use crate::consts::{
    ADDRESS_LINES, DEFAULT_ADDRESS_PINS, DEFAULT_MIN_STEP_DELAY, DEFAULT_PATTERN_PINS,
    DEFAULT_STROBE_PIN, DEFAULT_TICK_PERIOD_US, MAX_MIN_STEP_DELAY, MAX_PIN, MAX_RAMP_DELAY,
    MAX_RAMP_DELAY_LIMIT, MAX_RAMP_STEPS, NMOTORS, NUM_RAMP_STEPS, PATTERN_LINES,
    TICK_PERIOD_US_MAX, TICK_PERIOD_US_MIN,
};

/// Names of the reference arm's motors, in bus address order.
pub const DEFAULT_MOTOR_NAMES: [&str; NMOTORS] =
    ["base", "shoulder", "elbow", "wrist_pitch", "wrist_roll", "gripper"];

// ─── Top-Level Config ───────────────────────────────────────────────

/// Complete arm configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArmConfig {
    #[serde(default)]
    pub shared: SharedConfig,
    #[serde(default)]
    pub drive: DriveConfig,
    #[serde(default)]
    pub bus: BusPins,
    #[serde(default)]
    pub ramp: RampConfig,
    /// Exactly `NMOTORS` entries, index = bus address.
    #[serde(default = "default_motors")]
    pub motors: Vec<MotorConfig>,
}

impl Default for ArmConfig {
    fn default() -> Self {
        Self {
            shared: SharedConfig::default(),
            drive: DriveConfig::default(),
            bus: BusPins::default(),
            ramp: RampConfig::default(),
            motors: default_motors(),
        }
    }
}

impl ArmConfig {
    /// Load from a TOML file and validate.
    pub fn load_validated(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from a TOML string and validate.
    pub fn from_toml_validated(content: &str) -> Result<Self, ConfigError> {
        let config = Self::from_toml(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.drive.validate()?;
        self.bus.validate()?;
        self.ramp.validate()?;
        validate_motors(&self.motors)
    }
}

fn default_motors() -> Vec<MotorConfig> {
    DEFAULT_MOTOR_NAMES
        .iter()
        .map(|name| MotorConfig {
            name: (*name).to_string(),
            min_step_delay: DEFAULT_MIN_STEP_DELAY,
        })
        .collect()
}

fn validate_motors(motors: &[MotorConfig]) -> Result<(), ConfigError> {
    if motors.len() != NMOTORS {
        return Err(ConfigError::ValidationError(format!(
            "expected {NMOTORS} motors, found {}",
            motors.len()
        )));
    }
    let mut names = HashSet::new();
    for (i, motor) in motors.iter().enumerate() {
        if motor.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "motor {i} has an empty name"
            )));
        }
        if !names.insert(motor.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate motor name '{}'",
                motor.name
            )));
        }
        if motor.min_step_delay == 0 || motor.min_step_delay > MAX_MIN_STEP_DELAY {
            return Err(ConfigError::ValidationError(format!(
                "motor '{}': min_step_delay {} out of range [1, {MAX_MIN_STEP_DELAY}]",
                motor.name, motor.min_step_delay
            )));
        }
    }
    Ok(())
}

// ─── Drive ──────────────────────────────────────────────────────────

/// Tick source settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DriveConfig {
    /// Scheduler tick period [µs].
    #[serde(default = "default_tick_period_us")]
    pub tick_period_us: u32,
}

fn default_tick_period_us() -> u32 {
    DEFAULT_TICK_PERIOD_US
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            tick_period_us: DEFAULT_TICK_PERIOD_US,
        }
    }
}

impl DriveConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(TICK_PERIOD_US_MIN..=TICK_PERIOD_US_MAX).contains(&self.tick_period_us) {
            return Err(ConfigError::ValidationError(format!(
                "tick_period_us {} out of range [{TICK_PERIOD_US_MIN}, {TICK_PERIOD_US_MAX}]",
                self.tick_period_us
            )));
        }
        Ok(())
    }
}

// ─── Bus ────────────────────────────────────────────────────────────

/// Pin roles on the multiplexed motor bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BusPins {
    /// Coil pattern lines, bit 0 first.
    #[serde(default = "default_pattern_pins")]
    pub pattern_pins: [u8; PATTERN_LINES],
    /// Motor address lines, LSB first.
    #[serde(default = "default_address_pins")]
    pub address_pins: [u8; ADDRESS_LINES],
    /// Latch strobe line.
    #[serde(default = "default_strobe_pin")]
    pub strobe_pin: u8,
    /// Whether the latch fires on a high strobe (false: active low).
    #[serde(default = "default_true")]
    pub strobe_active_high: bool,
}

fn default_pattern_pins() -> [u8; PATTERN_LINES] {
    DEFAULT_PATTERN_PINS
}
fn default_address_pins() -> [u8; ADDRESS_LINES] {
    DEFAULT_ADDRESS_PINS
}
fn default_strobe_pin() -> u8 {
    DEFAULT_STROBE_PIN
}
fn default_true() -> bool {
    true
}

impl Default for BusPins {
    fn default() -> Self {
        Self {
            pattern_pins: DEFAULT_PATTERN_PINS,
            address_pins: DEFAULT_ADDRESS_PINS,
            strobe_pin: DEFAULT_STROBE_PIN,
            strobe_active_high: true,
        }
    }
}

impl BusPins {
    /// All pins used by the bus.
    pub fn all_pins(&self) -> impl Iterator<Item = u8> + '_ {
        self.pattern_pins
            .iter()
            .chain(self.address_pins.iter())
            .copied()
            .chain(std::iter::once(self.strobe_pin))
    }

    /// Pins must be below `MAX_PIN` and never shared between roles.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for pin in self.all_pins() {
            if pin >= MAX_PIN {
                return Err(ConfigError::ValidationError(format!(
                    "bus pin {pin} out of range [0, {MAX_PIN})"
                )));
            }
            if !seen.insert(pin) {
                return Err(ConfigError::ValidationError(format!(
                    "bus pin {pin} assigned more than once"
                )));
            }
        }
        Ok(())
    }
}

// ─── Ramp ───────────────────────────────────────────────────────────

/// Linear ramp parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RampConfig {
    /// Extra delay at the bottom of the ramp [ticks].
    #[serde(default = "default_max_ramp_delay")]
    pub max_ramp_delay: u32,
    /// Steps from the bottom of the ramp to cruise.
    #[serde(default = "default_ramp_steps")]
    pub ramp_steps: u32,
}

fn default_max_ramp_delay() -> u32 {
    MAX_RAMP_DELAY
}
fn default_ramp_steps() -> u32 {
    NUM_RAMP_STEPS
}

impl Default for RampConfig {
    fn default() -> Self {
        Self {
            max_ramp_delay: MAX_RAMP_DELAY,
            ramp_steps: NUM_RAMP_STEPS,
        }
    }
}

impl RampConfig {
    /// Delay decrement per ramp step.
    pub const fn rate(&self) -> u32 {
        self.max_ramp_delay / self.ramp_steps
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ramp_steps == 0 || self.ramp_steps > MAX_RAMP_STEPS {
            return Err(ConfigError::ValidationError(format!(
                "ramp_steps {} out of range [1, {MAX_RAMP_STEPS}]",
                self.ramp_steps
            )));
        }
        if self.max_ramp_delay == 0 || self.max_ramp_delay > MAX_RAMP_DELAY_LIMIT {
            return Err(ConfigError::ValidationError(format!(
                "max_ramp_delay {} out of range [1, {MAX_RAMP_DELAY_LIMIT}]",
                self.max_ramp_delay
            )));
        }
        if self.max_ramp_delay % self.ramp_steps != 0 {
            return Err(ConfigError::ValidationError(format!(
                "max_ramp_delay {} is not a multiple of ramp_steps {}",
                self.max_ramp_delay, self.ramp_steps
            )));
        }
        Ok(())
    }
}

// ─── Motors ─────────────────────────────────────────────────────────

/// Per-motor limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MotorConfig {
    /// Human-readable axis name.
    pub name: String,
    /// Fastest allowed cruise interval [ticks/step].
    #[serde(default = "default_min_step_delay")]
    pub min_step_delay: u32,
}

fn default_min_step_delay() -> u32 {
    DEFAULT_MIN_STEP_DELAY
}
