//! Panic-stop input and move status output.
//!
//! The panic signal is polled at the start of every tick, before any motor
//! is serviced. Once it reads asserted the move is aborted: no further
//! pulses, no ramp-out, no automatic retry.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{error, info, warn};

use crate::scheduler::{MoveOutcome, MoveReport};

// ─── Panic Input ────────────────────────────────────────────────────

/// Source of the panic/limit-switch state.
pub trait PanicSignal {
    /// True while the stop is asserted.
    fn is_asserted(&mut self) -> bool;
}

impl PanicSignal for AtomicBool {
    #[inline]
    fn is_asserted(&mut self) -> bool {
        self.load(Ordering::SeqCst)
    }
}

impl PanicSignal for &AtomicBool {
    #[inline]
    fn is_asserted(&mut self) -> bool {
        self.load(Ordering::SeqCst)
    }
}

impl PanicSignal for Arc<AtomicBool> {
    #[inline]
    fn is_asserted(&mut self) -> bool {
        self.load(Ordering::SeqCst)
    }
}

/// Panic input that is never asserted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPanic;

impl PanicSignal for NoPanic {
    #[inline]
    fn is_asserted(&mut self) -> bool {
        false
    }
}

/// Panic input backed by a closure, e.g. a GPIO read.
pub struct PanicFn<F>(pub F);

impl<F: FnMut() -> bool> PanicSignal for PanicFn<F> {
    #[inline]
    fn is_asserted(&mut self) -> bool {
        (self.0)()
    }
}

// ─── Status Output ──────────────────────────────────────────────────

/// Consumer of finished and aborted move reports.
pub trait StatusSink {
    fn report(&mut self, report: &MoveReport);
}

/// Logs each report through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingStatus;

impl StatusSink for TracingStatus {
    fn report(&mut self, report: &MoveReport) {
        match report.outcome {
            MoveOutcome::Completed => info!(
                move_id = report.move_id,
                end_tick = report.end_tick,
                pulses = report.pulses_emitted,
                "Move completed"
            ),
            MoveOutcome::Aborted => warn!(
                move_id = report.move_id,
                end_tick = report.end_tick,
                pulses = report.pulses_emitted,
                "Move aborted by panic stop"
            ),
            MoveOutcome::BusFault => error!(
                move_id = report.move_id,
                end_tick = report.end_tick,
                pulses = report.pulses_emitted,
                "Move stopped by bus fault"
            ),
        }
        for axis in report.axes.iter().filter(|a| a.steps_requested > 0) {
            info!(
                axis = axis.index,
                name = %axis.name,
                taken = axis.steps_taken,
                requested = axis.steps_requested,
                position = axis.position,
                "axis status"
            );
        }
    }
}

/// Collects reports in memory.
impl StatusSink for Vec<MoveReport> {
    fn report(&mut self, report: &MoveReport) {
        self.push(report.clone());
    }
}

impl<S: StatusSink + ?Sized> StatusSink for &mut S {
    fn report(&mut self, report: &MoveReport) {
        (**self).report(report);
    }
}
