//! MMvector Common Library
//!
//! Shared constants and configuration loading for the MMvector arm workspace.
//!
//! # Module Structure
//!
//! - [`consts`] - Hardware contract constants (motor count, bus widths, ramp)
//! - [`config`] - Configuration loading trait, errors and log levels
//! - [`arm`] - Arm configuration: bus wiring, ramp, per-motor limits
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust,no_run
//! use mmvector_common::prelude::*;
//! use std::path::Path;
//!
//! let config = ArmConfig::load_validated(Path::new("config/arm.toml")).unwrap();
//! assert_eq!(config.motors.len(), NMOTORS);
//! ```

pub mod arm;
pub mod config;
pub mod consts;
pub mod prelude;
