//! Drive error types.
//!
//! Out-of-range ramp or motor indices are logic errors and panic at the
//! call site; everything recoverable surfaces here. A safety abort is not an
//! error: it is reported as [`MoveOutcome::Aborted`](crate::scheduler::MoveOutcome).

use mmvector_common::config::ConfigError;
use thiserror::Error;

use crate::scheduler::DriveState;

/// Errors returned by the drive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriveError {
    /// A move is already running; moves are never queued.
    #[error("Move already in progress (state {0:?})")]
    MoveInProgress(DriveState),

    /// Move command could not be parsed or references a missing axis.
    #[error("Invalid move command: {0}")]
    InvalidCommand(String),

    /// Plan cannot be executed as given.
    #[error("Invalid move plan: {0}")]
    InvalidPlan(String),

    /// Configuration rejected.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A bus output line could not be driven.
    #[error("Bus line fault: {0}")]
    Bus(String),

    /// Real-time setup (mlockall, affinity, scheduler) failed.
    #[error("RT setup failed: {0}")]
    RtSetup(String),
}
