//! # MMvector Drive
//!
//! Ramp-and-multiplex drive for the six-axis MMvector arm. All motors share
//! one bus (4 pattern lines, 3 address lines, 1 strobe); the scheduler
//! decides on every tick which motors pulse and when the whole move is done.
//!
//! ## Synchronization
//!
//! Every moving axis:
//! - cruises for the same `max_time` ticks (slowest axis sets the pace),
//! - receives the same ramp envelope (`total_ramp_delay` ticks in, the same
//!   out),
//!
//! so all axes start at tick 0 and deliver their last pulse on
//! `max_time + 2 * total_ramp_delay`.
//!
//! ## Example
//!
//! ```rust
//! use mmvector_drive::bus::sim::SimulatedLines;
//! use mmvector_drive::command::MoveCommand;
//! use mmvector_drive::cycle::FreeRunning;
//! use mmvector_drive::safety::NoPanic;
//! use mmvector_drive::scheduler::{DriveContext, DriveScheduler, MoveOutcome, MoveReport};
//!
//! let ctx = DriveContext::default();
//! let lines = SimulatedLines::new(ctx.pins);
//! let mut drive = DriveScheduler::new(ctx, lines);
//! drive.init_driver().unwrap();
//!
//! let command: MoveCommand = "0:+40,1:-20".parse().unwrap();
//! let plan = drive.context().plan(&command);
//! let mut reports: Vec<MoveReport> = Vec::new();
//! let report = drive
//!     .run_move(&plan, &mut NoPanic, &mut reports, &mut FreeRunning)
//!     .unwrap();
//!
//! assert_eq!(report.outcome, MoveOutcome::Completed);
//! assert!(report.is_synchronized());
//! assert_eq!(drive.positions()[1], -20);
//! ```

pub mod axis;
pub mod bus;
pub mod command;
pub mod cycle;
pub mod error;
pub mod ramp;
pub mod safety;
pub mod scheduler;

pub use error::DriveError;
