//! Synchronized drive scheduler.
//!
//! Owns the six [`MotorAxis`] states and the bus for the duration of a move.
//! Every tick:
//!
//! 1. the panic input is checked first; if asserted the move is aborted and
//!    no motor is serviced,
//! 2. motors 0..5 are serviced in index order, each latching at most one
//!    pulse through the multiplexer,
//! 3. a bus fault latched by the line driver stops the move,
//! 4. the move completes on the tick at which every motor has no steps left.
//!
//! Because every axis cruises for the same `max_time` and receives the same
//! ramp envelope, all moving axes deliver their last pulse on
//! `max_time + 2 * total_ramp_delay`.
//!
//! ## State machine
//!
//! ```text
//!   Idle ──begin──▶ RampIn ──▶ Cruise ──▶ RampOut ──last pulse──▶ Idle
//!     ▲                 │          │           │
//!     └─────────────────┴──panic───┴───────────┘
//! ```
//!
//! The drive state is `RampIn` while any unfinished axis is ramping in,
//! `RampOut` while any is ramping out, `Cruise` otherwise.

use heapless::Vec as FiredList;
use mmvector_common::arm::{ArmConfig, BusPins, DEFAULT_MOTOR_NAMES, MotorConfig};
use mmvector_common::config::ConfigError;
use mmvector_common::consts::{DEFAULT_MIN_STEP_DELAY, DEFAULT_TICK_PERIOD_US, NMOTORS};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::axis::MotorAxis;
use crate::bus::{BusMultiplexer, LineDriver};
use crate::command::{Direction, MoveCommand, MovePlan, plan_move};
use crate::cycle::TickPacer;
use crate::error::DriveError;
use crate::ramp::{RampSegment, RampTable};
use crate::safety::{PanicSignal, StatusSink};

// ─── Context ────────────────────────────────────────────────────────

/// Everything the scheduler needs to know about the arm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveContext {
    pub pins: BusPins,
    pub ramp: RampTable,
    pub motors: [MotorConfig; NMOTORS],
    pub tick_period_us: u32,
}

impl Default for DriveContext {
    fn default() -> Self {
        Self {
            pins: BusPins::default(),
            ramp: RampTable::standard(),
            motors: DEFAULT_MOTOR_NAMES.map(|name| MotorConfig {
                name: name.to_string(),
                min_step_delay: DEFAULT_MIN_STEP_DELAY,
            }),
            tick_period_us: DEFAULT_TICK_PERIOD_US,
        }
    }
}

impl DriveContext {
    /// Validate `config` and extract the drive context.
    pub fn from_config(config: &ArmConfig) -> Result<Self, DriveError> {
        config.validate()?;
        let ramp = RampTable::from_config(&config.ramp)?;
        let motors: [MotorConfig; NMOTORS] =
            config.motors.clone().try_into().map_err(|m: Vec<MotorConfig>| {
                ConfigError::ValidationError(format!(
                    "expected {NMOTORS} motors, found {}",
                    m.len()
                ))
            })?;
        Ok(Self {
            pins: config.bus,
            ramp,
            motors,
            tick_period_us: config.drive.tick_period_us,
        })
    }

    /// Plan `command` against this arm's motor limits.
    pub fn plan(&self, command: &MoveCommand) -> MovePlan {
        plan_move(command, &self.motors)
    }
}

// ─── Reporting Types ────────────────────────────────────────────────

/// Global drive state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum DriveState {
    #[default]
    Idle,
    RampIn,
    Cruise,
    RampOut,
}

/// How a move ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MoveOutcome {
    Completed,
    /// Stopped by the panic input; ramp-out skipped.
    Aborted,
    /// Stopped because a bus line could not be driven.
    BusFault,
}

/// Per-axis result of a move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AxisReport {
    pub index: usize,
    pub name: String,
    pub direction: Direction,
    pub steps_requested: u32,
    pub steps_taken: u32,
    /// Tick of the last pulse; `None` if the axis did not finish.
    pub finish_tick: Option<u64>,
    pub ramp_in_ticks: u64,
    pub ramp_out_ticks: u64,
    /// Absolute position after the move.
    pub position: i64,
}

/// Result of one move, handed to the [`StatusSink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveReport {
    pub move_id: u64,
    pub outcome: MoveOutcome,
    /// Tick of completion or abort.
    pub end_tick: u64,
    pub pulses_emitted: u64,
    pub axes: [AxisReport; NMOTORS],
}

impl MoveReport {
    /// True when every moving axis delivered its last pulse on the same tick.
    pub fn is_synchronized(&self) -> bool {
        let mut finish = self
            .axes
            .iter()
            .filter(|a| a.steps_requested > 0)
            .map(|a| a.finish_tick);
        match finish.next() {
            None => true,
            Some(first) => first.is_some() && finish.all(|t| t == first),
        }
    }
}

/// What one call to [`DriveScheduler::tick`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No move loaded.
    Idle,
    /// Move still running; `fired` lists the motors pulsed, in bus order.
    Running {
        tick: u64,
        fired: FiredList<u8, NMOTORS>,
    },
    Completed(MoveReport),
    /// Move stopped early by the panic input or a bus fault.
    Aborted(MoveReport),
}

// ─── Scheduler ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct ActiveMove {
    id: u64,
    /// Next tick to execute.
    tick: u64,
    pulses: u64,
    predicted_end: u64,
}

/// Single-move drive scheduler over a multiplexed bus.
#[derive(Debug)]
pub struct DriveScheduler<L> {
    ctx: DriveContext,
    bus: BusMultiplexer<L>,
    axes: [MotorAxis; NMOTORS],
    state: DriveState,
    active: Option<ActiveMove>,
    moves_started: u64,
}

impl<L: LineDriver> DriveScheduler<L> {
    pub fn new(ctx: DriveContext, lines: L) -> Self {
        let bus = BusMultiplexer::new(ctx.pins, lines);
        Self {
            ctx,
            bus,
            axes: core::array::from_fn(MotorAxis::new),
            state: DriveState::Idle,
            active: None,
            moves_started: 0,
        }
    }

    /// One-time hardware initialization: park the bus and de-energize every
    /// motor.
    pub fn init_driver(&mut self) -> Result<(), DriveError> {
        if self.active.is_some() {
            return Err(DriveError::MoveInProgress(self.state));
        }
        self.bus.release_all();
        if let Some(fault) = self.bus.lines_mut().take_fault() {
            return Err(fault);
        }
        info!(
            strobe_pin = self.ctx.pins.strobe_pin,
            active_high = self.ctx.pins.strobe_active_high,
            "Motor bus initialized"
        );
        Ok(())
    }

    /// Load `plan`; the first [`tick`](Self::tick) afterwards is move tick 0.
    ///
    /// Returns the move id.
    pub fn begin(&mut self, plan: &MovePlan) -> Result<u64, DriveError> {
        if self.active.is_some() {
            return Err(DriveError::MoveInProgress(self.state));
        }
        plan.validate()?;
        if !plan.is_synchronized() {
            warn!(
                max_cruise_ticks = plan.max_cruise_ticks(),
                "Plan cruise durations differ; axes will not finish together"
            );
        }

        for (axis, axis_plan) in self.axes.iter_mut().zip(plan.axes()) {
            axis.begin_move(axis_plan, &self.ctx.ramp);
        }

        self.moves_started += 1;
        let id = self.moves_started;
        let predicted_end = plan.predicted_end_tick(&self.ctx.ramp);
        self.active = Some(ActiveMove {
            id,
            tick: 0,
            pulses: 0,
            predicted_end,
        });
        let state = self.aggregate_state(0);
        self.set_state(state, 0);

        info!(
            move_id = id,
            moving_axes = plan.axes().iter().filter(|a| a.is_moving()).count(),
            max_cruise_ticks = plan.max_cruise_ticks(),
            predicted_end,
            "Move started"
        );
        Ok(id)
    }

    /// Execute one tick. `panic` is the panic input sampled for this tick.
    pub fn tick(&mut self, panic: bool) -> TickOutcome {
        let Some(active) = self.active else {
            return TickOutcome::Idle;
        };
        let tick = active.tick;

        if panic {
            warn!(
                move_id = active.id,
                tick,
                state = ?self.state,
                "Panic stop asserted, aborting move"
            );
            return TickOutcome::Aborted(self.finish(MoveOutcome::Aborted, tick));
        }

        let mut fired = FiredList::<u8, NMOTORS>::new();
        for axis in self.axes.iter_mut() {
            if axis.step_if_due(tick, &mut self.bus, &self.ctx.ramp) {
                // One slot per motor; cannot overflow.
                let _ = fired.push(axis.index() as u8);
            }
        }

        self.active = Some(ActiveMove {
            tick: tick + 1,
            pulses: active.pulses + fired.len() as u64,
            ..active
        });

        if let Some(fault) = self.bus.lines_mut().take_fault() {
            error!(move_id = active.id, tick, %fault, "Bus fault, stopping move");
            return TickOutcome::Aborted(self.finish(MoveOutcome::BusFault, tick));
        }

        if self.axes.iter().all(MotorAxis::is_finished) {
            return TickOutcome::Completed(self.finish(MoveOutcome::Completed, tick));
        }

        let state = self.aggregate_state(tick);
        self.set_state(state, tick);
        TickOutcome::Running { tick, fired }
    }

    /// Drive `plan` to completion or abort, pacing ticks with `pacer`.
    ///
    /// The report is handed to `status` before it is returned.
    pub fn run_move<P, S, T>(
        &mut self,
        plan: &MovePlan,
        panic: &mut P,
        status: &mut S,
        pacer: &mut T,
    ) -> Result<MoveReport, DriveError>
    where
        P: PanicSignal + ?Sized,
        S: StatusSink + ?Sized,
        T: TickPacer + ?Sized,
    {
        self.begin(plan)?;
        loop {
            if let Err(e) = pacer.wait() {
                if let Some(report) = self.abort() {
                    status.report(&report);
                }
                return Err(e);
            }
            let asserted = panic.is_asserted();
            let outcome = self.tick(asserted);
            pacer.tick_done();
            match outcome {
                TickOutcome::Completed(report) | TickOutcome::Aborted(report) => {
                    status.report(&report);
                    return Ok(report);
                }
                TickOutcome::Running { .. } => {}
                TickOutcome::Idle => {
                    return Err(DriveError::InvalidPlan("move vanished mid-run".to_string()));
                }
            }
        }
    }

    /// Abort the running move, as if the panic input were asserted.
    pub fn abort(&mut self) -> Option<MoveReport> {
        let active = self.active?;
        warn!(move_id = active.id, tick = active.tick, "Move aborted");
        Some(self.finish(MoveOutcome::Aborted, active.tick))
    }

    fn finish(&mut self, outcome: MoveOutcome, end_tick: u64) -> MoveReport {
        let (move_id, pulses_emitted, predicted_end) = self
            .active
            .take()
            .map_or((0, 0, 0), |a| (a.id, a.pulses, a.predicted_end));

        let axes = core::array::from_fn(|i| {
            let axis = &self.axes[i];
            AxisReport {
                index: i,
                name: self.ctx.motors[i].name.clone(),
                direction: axis.direction(),
                steps_requested: axis.total_steps(),
                steps_taken: axis.steps_taken(),
                finish_tick: axis.finish_tick(),
                ramp_in_ticks: axis.ramp_in_ticks(),
                ramp_out_ticks: axis.ramp_out_ticks(),
                position: axis.position(),
            }
        });
        if outcome != MoveOutcome::Completed {
            self.axes.iter_mut().for_each(MotorAxis::halt);
        }
        self.set_state(DriveState::Idle, end_tick);

        if outcome == MoveOutcome::Completed && end_tick != predicted_end {
            warn!(move_id, end_tick, predicted_end, "Move ended off its predicted tick");
        }
        debug!(move_id, ?outcome, end_tick, pulses_emitted, "Move finished");

        MoveReport {
            move_id,
            outcome,
            end_tick,
            pulses_emitted,
            axes,
        }
    }

    fn aggregate_state(&self, tick: u64) -> DriveState {
        let mut ramp_out = false;
        let mut cruise = false;
        for axis in &self.axes {
            match axis.segment_at(tick) {
                Some(RampSegment::RampIn) => return DriveState::RampIn,
                Some(RampSegment::RampOut) => ramp_out = true,
                Some(RampSegment::Cruise) => cruise = true,
                None => {}
            }
        }
        if ramp_out {
            DriveState::RampOut
        } else if cruise {
            DriveState::Cruise
        } else {
            DriveState::Idle
        }
    }

    fn set_state(&mut self, state: DriveState, tick: u64) {
        if state != self.state {
            debug!(from = ?self.state, to = ?state, tick, "Drive state");
            self.state = state;
        }
    }

    // ─── Accessors ──────────────────────────────────────────────────

    #[inline]
    pub fn state(&self) -> DriveState {
        self.state
    }

    /// True while a move is loaded.
    #[inline]
    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    /// Next tick to execute, if a move is loaded.
    pub fn current_tick(&self) -> Option<u64> {
        self.active.map(|a| a.tick)
    }

    /// Predicted last-pulse tick of the loaded move.
    pub fn predicted_end_tick(&self) -> Option<u64> {
        self.active.map(|a| a.predicted_end)
    }

    /// Absolute position of every axis.
    pub fn positions(&self) -> [i64; NMOTORS] {
        core::array::from_fn(|i| self.axes[i].position())
    }

    #[inline]
    pub fn axis(&self, index: usize) -> &MotorAxis {
        &self.axes[index]
    }

    #[inline]
    pub fn context(&self) -> &DriveContext {
        &self.ctx
    }

    #[inline]
    pub fn bus(&self) -> &BusMultiplexer<L> {
        &self.bus
    }

    #[inline]
    pub fn bus_mut(&mut self) -> &mut BusMultiplexer<L> {
        &mut self.bus
    }
}
