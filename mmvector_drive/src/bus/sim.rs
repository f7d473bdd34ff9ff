//! Simulated bus lines with a per-motor latch model.
//!
//! Each motor driver latches the pattern lines when the strobe goes active
//! while the address lines select it. The simulation keeps every line level,
//! the pattern currently latched in each driver, and (unless built with
//! [`SimulatedLines::unlogged`]) the ordered list of latch events.

use mmvector_common::arm::BusPins;
use mmvector_common::consts::{MAX_PIN, NMOTORS};
use serde::Serialize;

use super::{LineDriver, StepPattern};

/// One strobe-latched transfer on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LatchEvent {
    /// Decoded address (may exceed `NMOTORS` if lines were driven by hand).
    pub address: u8,
    /// Pattern lines at the active edge, as bits.
    pub pattern: u8,
}

impl LatchEvent {
    #[inline]
    pub fn step_pattern(&self) -> StepPattern {
        StepPattern::from_bits_truncate(self.pattern)
    }
}

/// In-memory line levels plus latch decoding.
#[derive(Debug, Clone)]
pub struct SimulatedLines {
    pins: BusPins,
    levels: [bool; MAX_PIN as usize],
    latched: [StepPattern; NMOTORS],
    events: Vec<LatchEvent>,
    log_events: bool,
    latches: u64,
    writes: u64,
}

impl SimulatedLines {
    /// Lines wired as `pins`, with the strobe parked at its inactive level.
    pub fn new(pins: BusPins) -> Self {
        let mut levels = [false; MAX_PIN as usize];
        levels[pins.strobe_pin as usize] = !pins.strobe_active_high;
        Self {
            pins,
            levels,
            latched: [StepPattern::empty(); NMOTORS],
            events: Vec::new(),
            log_events: true,
            latches: 0,
            writes: 0,
        }
    }

    /// Like [`new`](Self::new) but without the latch event log, so long runs
    /// never allocate. Latched patterns and counters are still kept.
    pub fn unlogged(pins: BusPins) -> Self {
        Self {
            log_events: false,
            ..Self::new(pins)
        }
    }

    /// Current level of `pin`.
    #[inline]
    pub fn line(&self, pin: u8) -> bool {
        self.levels[pin as usize]
    }

    /// Pattern held by motor `motor`'s driver.
    #[inline]
    pub fn latched(&self, motor: usize) -> StepPattern {
        self.latched[motor]
    }

    pub fn events(&self) -> &[LatchEvent] {
        &self.events
    }

    /// Drain recorded latch events.
    pub fn take_events(&mut self) -> Vec<LatchEvent> {
        std::mem::take(&mut self.events)
    }

    /// Strobe latches seen, logged or not.
    #[inline]
    pub fn latch_count(&self) -> u64 {
        self.latches
    }

    /// Total `set_line` calls.
    #[inline]
    pub fn write_count(&self) -> u64 {
        self.writes
    }

    fn decode(&self, pins: &[u8]) -> u8 {
        pins.iter()
            .enumerate()
            .filter(|&(_, &pin)| self.levels[pin as usize])
            .fold(0u8, |acc, (bit, _)| acc | (1 << bit))
    }

    fn latch(&mut self) {
        let address = self.decode(&self.pins.address_pins);
        let pattern = self.decode(&self.pins.pattern_pins);
        if let Some(slot) = self.latched.get_mut(address as usize) {
            *slot = StepPattern::from_bits_truncate(pattern);
        }
        self.latches += 1;
        if self.log_events {
            self.events.push(LatchEvent { address, pattern });
        }
    }
}

impl LineDriver for SimulatedLines {
    fn set_line(&mut self, pin: u8, high: bool) {
        assert!(pin < MAX_PIN, "pin {pin} out of range [0, {MAX_PIN})");
        self.writes += 1;
        let previous = std::mem::replace(&mut self.levels[pin as usize], high);
        if pin == self.pins.strobe_pin && previous != high && high == self.pins.strobe_active_high
        {
            self.latch();
        }
    }
}
