//! Multiplexed motor bus: address + pattern lines latched by a strobe.
//!
//! One `emit_pulse` call addresses exactly one motor: drive the address
//! lines, drive the pattern lines, then pulse the strobe (active edge, then
//! release) so the addressed driver latches the pattern. Calls take
//! `&mut self`, so two pulses can never overlap.
//!
//! Line access is abstracted behind [`LineDriver`]. [`pins::PinBank`] drives
//! real `embedded-hal` output pins; [`sim::SimulatedLines`] models the latch
//! hardware for tests and dry runs.

pub mod pins;
pub mod sim;

use bitflags::bitflags;
use mmvector_common::arm::BusPins;
use mmvector_common::consts::{NMOTORS, PATTERN_LINES};
use static_assertions::const_assert;
use tracing::trace;

use crate::error::DriveError;

// Patterns travel as one `u8`.
const_assert!(PATTERN_LINES <= u8::BITS as usize);

bitflags! {
    /// Levels of the four coil pattern lines.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StepPattern: u8 {
        const COIL_A = 0b0001;
        const COIL_B = 0b0010;
        const COIL_C = 0b0100;
        const COIL_D = 0b1000;
    }
}

impl Default for StepPattern {
    fn default() -> Self {
        Self::empty()
    }
}

/// Two-coils-on full-step sequence. Forward travel walks it upwards.
pub const FULL_STEP_SEQUENCE: [StepPattern; 4] = [
    StepPattern::COIL_A.union(StepPattern::COIL_B),
    StepPattern::COIL_B.union(StepPattern::COIL_C),
    StepPattern::COIL_C.union(StepPattern::COIL_D),
    StepPattern::COIL_D.union(StepPattern::COIL_A),
];

/// Coil pattern for a sequence phase.
#[inline]
pub const fn phase_pattern(phase: u8) -> StepPattern {
    FULL_STEP_SEQUENCE[(phase as usize) % FULL_STEP_SEQUENCE.len()]
}

/// Digital output lines the bus is wired to.
///
/// Writes sit on the tick path and cannot fail there; a driver that can fail
/// latches its first failure and hands it out through
/// [`take_fault`](Self::take_fault), which the scheduler polls once per tick.
pub trait LineDriver {
    /// Drive `pin` high (`true`) or low.
    fn set_line(&mut self, pin: u8, high: bool);

    /// First write failure since the last call, if any.
    fn take_fault(&mut self) -> Option<DriveError> {
        None
    }
}

impl<L: LineDriver + ?Sized> LineDriver for &mut L {
    #[inline]
    fn set_line(&mut self, pin: u8, high: bool) {
        (**self).set_line(pin, high);
    }

    #[inline]
    fn take_fault(&mut self) -> Option<DriveError> {
        (**self).take_fault()
    }
}

/// Single-owner multiplexer over the shared bus.
#[derive(Debug)]
pub struct BusMultiplexer<L> {
    pins: BusPins,
    lines: L,
    strobes: u64,
}

impl<L: LineDriver> BusMultiplexer<L> {
    pub fn new(pins: BusPins, lines: L) -> Self {
        Self {
            pins,
            lines,
            strobes: 0,
        }
    }

    /// Latch `pattern` into motor `motor`.
    ///
    /// # Panics
    /// If `motor >= NMOTORS`; misaddressing the bus is a logic error.
    pub fn emit_pulse(&mut self, motor: usize, pattern: StepPattern) {
        assert!(motor < NMOTORS, "motor index {motor} out of range [0, {NMOTORS})");

        for (bit, &pin) in self.pins.address_pins.iter().enumerate() {
            self.lines.set_line(pin, (motor >> bit) & 1 == 1);
        }
        for (bit, &pin) in self.pins.pattern_pins.iter().enumerate() {
            self.lines.set_line(pin, (pattern.bits() >> bit) & 1 == 1);
        }

        let active = self.pins.strobe_active_high;
        self.lines.set_line(self.pins.strobe_pin, active);
        self.lines.set_line(self.pins.strobe_pin, !active);
        self.strobes += 1;

        trace!(motor, pattern = pattern.bits(), "bus latch");
    }

    /// One-time hardware initialization: park every line and latch an empty
    /// pattern (coils off) into every motor.
    pub fn release_all(&mut self) {
        self.lines
            .set_line(self.pins.strobe_pin, !self.pins.strobe_active_high);
        for &pin in self.pins.address_pins.iter().chain(&self.pins.pattern_pins) {
            self.lines.set_line(pin, false);
        }
        for motor in 0..NMOTORS {
            self.emit_pulse(motor, StepPattern::empty());
        }
    }

    #[inline]
    pub fn pins(&self) -> &BusPins {
        &self.pins
    }

    /// Strobe pulses issued since construction.
    #[inline]
    pub fn strobe_count(&self) -> u64 {
        self.strobes
    }

    #[inline]
    pub fn lines(&self) -> &L {
        &self.lines
    }

    #[inline]
    pub fn lines_mut(&mut self) -> &mut L {
        &mut self.lines
    }

    pub fn into_lines(self) -> L {
        self.lines
    }
}
