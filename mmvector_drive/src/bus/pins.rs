//! Bus lines on `embedded-hal` output pins.
//!
//! [`PinBank`] owns the eight physical pins of the bus and routes each
//! `set_line` to the pin wired under that number in [`BusPins`]. Any GPIO
//! backend with an [`OutputPin`] implementation (Linux cdev, rppal, an MCU
//! HAL) plugs in here.
//!
//! Pin errors cannot be returned from the tick path. The bank latches the
//! first one as a [`DriveError::Bus`] and the scheduler stops the move when it
//! polls [`LineDriver::take_fault`].

use embedded_hal::digital::{Error as _, OutputPin, PinState};
use mmvector_common::arm::BusPins;
use mmvector_common::consts::{ADDRESS_LINES, PATTERN_LINES};
use tracing::error;

use super::LineDriver;
use crate::error::DriveError;

/// The bus wired to real output pins.
#[derive(Debug)]
pub struct PinBank<P> {
    wiring: BusPins,
    pattern: [P; PATTERN_LINES],
    address: [P; ADDRESS_LINES],
    strobe: P,
    fault: Option<DriveError>,
    failures: u64,
}

impl<P: OutputPin> PinBank<P> {
    /// `pattern` and `address` are in bit order, matching
    /// `wiring.pattern_pins` and `wiring.address_pins`.
    pub fn new(
        wiring: BusPins,
        pattern: [P; PATTERN_LINES],
        address: [P; ADDRESS_LINES],
        strobe: P,
    ) -> Self {
        Self {
            wiring,
            pattern,
            address,
            strobe,
            fault: None,
            failures: 0,
        }
    }

    #[inline]
    pub fn wiring(&self) -> &BusPins {
        &self.wiring
    }

    /// Failed writes since construction, including those after the first.
    #[inline]
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Give the pins back as `(pattern, address, strobe)`.
    pub fn into_pins(self) -> ([P; PATTERN_LINES], [P; ADDRESS_LINES], P) {
        (self.pattern, self.address, self.strobe)
    }

    fn pin_mut(&mut self, pin: u8) -> Option<&mut P> {
        if pin == self.wiring.strobe_pin {
            return Some(&mut self.strobe);
        }
        if let Some(bit) = self.wiring.pattern_pins.iter().position(|&p| p == pin) {
            return self.pattern.get_mut(bit);
        }
        let bit = self.wiring.address_pins.iter().position(|&p| p == pin)?;
        self.address.get_mut(bit)
    }
}

impl<P: OutputPin> LineDriver for PinBank<P> {
    fn set_line(&mut self, pin: u8, high: bool) {
        let result = match self.pin_mut(pin) {
            Some(line) => line
                .set_state(PinState::from(high))
                .map_err(|e| format!("pin {pin}: {:?}", e.kind())),
            None => Err(format!("pin {pin} is not wired to the bus")),
        };
        if let Err(detail) = result {
            self.failures += 1;
            if self.fault.is_none() {
                error!(pin, high, %detail, "Bus line write failed");
                self.fault = Some(DriveError::Bus(detail));
            }
        }
    }

    fn take_fault(&mut self) -> Option<DriveError> {
        self.fault.take()
    }
}
