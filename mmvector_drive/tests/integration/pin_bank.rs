//! Integration test: scheduler over `embedded-hal` output pins.
//!
//! A pin write failure must stop the move on the tick it happens, the same
//! way a panic stop does, and be reported as a bus fault.

use std::cell::Cell;
use std::rc::Rc;

use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin};
use mmvector_drive::DriveError;
use mmvector_drive::bus::pins::PinBank;
use mmvector_drive::command::Direction;
use mmvector_drive::scheduler::{
    DriveContext, DriveScheduler, DriveState, MoveOutcome, TickOutcome,
};

use super::explicit;

/// Output pin sharing one "wire cut" switch with the rest of the bank.
struct SwitchedPin {
    cut: Rc<Cell<bool>>,
}

impl ErrorType for SwitchedPin {
    type Error = ErrorKind;
}

impl OutputPin for SwitchedPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.drive(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.drive(true)
    }
}

impl SwitchedPin {
    fn drive(&mut self, _level: bool) -> Result<(), ErrorKind> {
        if self.cut.get() {
            return Err(ErrorKind::Other);
        }
        Ok(())
    }
}

fn pin_drive(cut: &Rc<Cell<bool>>) -> DriveScheduler<PinBank<SwitchedPin>> {
    let ctx = DriveContext::default();
    let pin = |_| SwitchedPin { cut: cut.clone() };
    let bank = PinBank::new(
        ctx.pins,
        ctx.pins.pattern_pins.map(pin),
        ctx.pins.address_pins.map(pin),
        pin(ctx.pins.strobe_pin),
    );
    DriveScheduler::new(ctx, bank)
}

#[test]
fn healthy_pins_complete_a_move() {
    let cut = Rc::new(Cell::new(false));
    let mut drive = pin_drive(&cut);
    drive.init_driver().unwrap();
    drive.begin(&explicit(&[(0, Direction::Forward, 3, 2)])).unwrap();

    let report = loop {
        if let TickOutcome::Completed(report) = drive.tick(false) {
            break report;
        }
    };
    assert_eq!(report.outcome, MoveOutcome::Completed);
    assert_eq!(report.pulses_emitted, 3);
    assert_eq!(drive.bus().lines().failures(), 0);
}

#[test]
fn init_reports_bus_fault() {
    let cut = Rc::new(Cell::new(true));
    let mut drive = pin_drive(&cut);
    assert!(matches!(drive.init_driver(), Err(DriveError::Bus(_))));
}

#[test]
fn pin_failure_stops_the_move() {
    let cut = Rc::new(Cell::new(false));
    let mut drive = pin_drive(&cut);
    drive.init_driver().unwrap();
    drive.begin(&explicit(&[(0, Direction::Forward, 100, 5)])).unwrap();

    // Past the first few pulses, then cut the wires.
    for _ in 0..1_000 {
        assert!(matches!(drive.tick(false), TickOutcome::Running { .. }));
    }
    let taken = drive.axis(0).steps_taken();
    assert!(taken > 0);
    cut.set(true);

    let report = loop {
        match drive.tick(false) {
            TickOutcome::Running { .. } => {}
            TickOutcome::Aborted(report) => break report,
            other => panic!("expected bus fault, got {other:?}"),
        }
    };
    assert_eq!(report.outcome, MoveOutcome::BusFault);
    // The failed pulse is the last one counted; nothing after it.
    assert_eq!(report.axes[0].steps_taken, taken + 1);
    assert_eq!(report.axes[0].finish_tick, None);
    assert_eq!(drive.state(), DriveState::Idle);
    assert!(!drive.is_busy());
    assert_eq!(drive.tick(false), TickOutcome::Idle);
}
