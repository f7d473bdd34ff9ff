//! Tick pacing, cycle statistics and real-time process setup.
//!
//! The scheduler itself has no notion of wall time; a [`TickPacer`] decides
//! when each tick starts. [`FreeRunning`] runs ticks back to back (tests,
//! benchmarks, dry runs); [`PeriodicPacer`] holds a fixed period on an
//! absolute schedule so sleep jitter never accumulates.
//!
//! With the `rt` feature the periodic pacer sleeps with
//! `clock_nanosleep(TIMER_ABSTIME)` on `CLOCK_MONOTONIC` and [`rt_setup`]
//! locks memory, pins the thread and switches to `SCHED_FIFO`. Without it,
//! pacing falls back to `std::thread::sleep` and setup is a no-op.

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::DriveError;

// ─── Cycle Statistics ───────────────────────────────────────────────

/// O(1) per-tick timing statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleStats {
    /// Ticks recorded.
    pub tick_count: u64,
    /// Last tick body duration [ns].
    pub last_tick_ns: i64,
    pub min_tick_ns: i64,
    pub max_tick_ns: i64,
    sum_tick_ns: i64,
    /// Ticks that started later than one full period after their slot.
    pub overruns: u64,
    /// Worst wake-up latency [ns].
    pub max_latency_ns: i64,
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            tick_count: 0,
            last_tick_ns: 0,
            min_tick_ns: i64::MAX,
            max_tick_ns: 0,
            sum_tick_ns: 0,
            overruns: 0,
            max_latency_ns: 0,
        }
    }

    /// Record one tick. No allocation.
    #[inline]
    pub fn record(&mut self, duration_ns: i64, latency_ns: i64) {
        self.tick_count += 1;
        self.last_tick_ns = duration_ns;
        self.min_tick_ns = self.min_tick_ns.min(duration_ns);
        self.max_tick_ns = self.max_tick_ns.max(duration_ns);
        self.sum_tick_ns = self.sum_tick_ns.saturating_add(duration_ns);
        self.max_latency_ns = self.max_latency_ns.max(latency_ns);
    }

    /// Average tick body duration [ns], 0 before the first tick.
    #[inline]
    pub fn avg_tick_ns(&self) -> i64 {
        if self.tick_count == 0 {
            0
        } else {
            self.sum_tick_ns / self.tick_count as i64
        }
    }
}

// ─── Pacers ─────────────────────────────────────────────────────────

/// Decides when the next scheduler tick may start.
pub trait TickPacer {
    /// Block until the next tick boundary.
    fn wait(&mut self) -> Result<(), DriveError>;

    /// The tick body that followed the last `wait` has finished.
    fn tick_done(&mut self) {}

    /// Timing statistics, if the pacer keeps any.
    fn stats(&self) -> Option<&CycleStats> {
        None
    }
}

/// Runs ticks back to back.
#[derive(Debug, Clone, Copy, Default)]
pub struct FreeRunning;

impl TickPacer for FreeRunning {
    #[inline]
    fn wait(&mut self) -> Result<(), DriveError> {
        Ok(())
    }
}

/// Fixed-period pacer on an absolute schedule.
#[derive(Debug)]
pub struct PeriodicPacer {
    period_ns: i64,
    next_wake: Option<clock::Instant>,
    woke_at: Option<clock::Instant>,
    stats: CycleStats,
}

impl PeriodicPacer {
    pub fn new(period: Duration) -> Self {
        Self {
            period_ns: i64::try_from(period.as_nanos()).unwrap_or(i64::MAX),
            next_wake: None,
            woke_at: None,
            stats: CycleStats::new(),
        }
    }

    /// Pacer for a `[drive] tick_period_us` setting.
    pub fn from_micros(tick_period_us: u32) -> Self {
        Self::new(Duration::from_micros(u64::from(tick_period_us)))
    }

    #[inline]
    pub fn period(&self) -> Duration {
        Duration::from_nanos(self.period_ns as u64)
    }
}

impl TickPacer for PeriodicPacer {
    fn wait(&mut self) -> Result<(), DriveError> {
        let now = clock::now()?;
        let target = match self.next_wake {
            None => now,
            Some(prev) => clock::add_ns(prev, self.period_ns),
        };

        let late_ns = clock::diff_ns(now, target);
        let target = if late_ns > self.period_ns {
            self.stats.overruns += 1;
            if self.stats.overruns == 1 || self.stats.overruns % 1000 == 0 {
                warn!(
                    late_us = late_ns / 1000,
                    overruns = self.stats.overruns,
                    "Tick overrun, resynchronizing schedule"
                );
            }
            now
        } else {
            clock::sleep_until(target)?;
            target
        };

        let woke = clock::now()?;
        self.next_wake = Some(target);
        self.woke_at = Some(woke);
        self.stats.max_latency_ns = self.stats.max_latency_ns.max(clock::diff_ns(woke, target));
        Ok(())
    }

    fn tick_done(&mut self) {
        let Some(woke) = self.woke_at.take() else {
            return;
        };
        if let Ok(end) = clock::now() {
            self.stats.record(clock::diff_ns(end, woke), 0);
        }
    }

    fn stats(&self) -> Option<&CycleStats> {
        Some(&self.stats)
    }
}

// ─── Clock ──────────────────────────────────────────────────────────

#[cfg(feature = "rt")]
mod clock {
    use nix::sys::time::TimeSpec;
    use nix::time::{ClockId, ClockNanosleepFlags, clock_gettime, clock_nanosleep};

    use crate::error::DriveError;

    pub type Instant = TimeSpec;

    const NS_PER_SEC: i64 = 1_000_000_000;

    pub fn now() -> Result<Instant, DriveError> {
        clock_gettime(ClockId::CLOCK_MONOTONIC)
            .map_err(|e| DriveError::RtSetup(format!("clock_gettime: {e}")))
    }

    pub fn add_ns(ts: Instant, ns: i64) -> Instant {
        let total = ts.tv_nsec() as i64 + ns;
        let secs = ts.tv_sec() as i64 + total.div_euclid(NS_PER_SEC);
        TimeSpec::new(secs as _, total.rem_euclid(NS_PER_SEC) as _)
    }

    /// `a - b` [ns].
    pub fn diff_ns(a: Instant, b: Instant) -> i64 {
        (a.tv_sec() as i64 - b.tv_sec() as i64) * NS_PER_SEC
            + (a.tv_nsec() as i64 - b.tv_nsec() as i64)
    }

    pub fn sleep_until(target: Instant) -> Result<(), DriveError> {
        // EINTR leaves us early; the next wait measures the lateness anyway.
        let _ = clock_nanosleep(
            ClockId::CLOCK_MONOTONIC,
            ClockNanosleepFlags::TIMER_ABSTIME,
            &target,
        );
        Ok(())
    }
}

#[cfg(not(feature = "rt"))]
mod clock {
    use crate::error::DriveError;

    pub type Instant = std::time::Instant;

    pub fn now() -> Result<Instant, DriveError> {
        Ok(Instant::now())
    }

    pub fn add_ns(t: Instant, ns: i64) -> Instant {
        let delta = std::time::Duration::from_nanos(ns.unsigned_abs());
        if ns >= 0 { t + delta } else { t - delta }
    }

    /// `a - b` [ns].
    pub fn diff_ns(a: Instant, b: Instant) -> i64 {
        if a >= b {
            (a - b).as_nanos() as i64
        } else {
            -((b - a).as_nanos() as i64)
        }
    }

    pub fn sleep_until(target: Instant) -> Result<(), DriveError> {
        let now = Instant::now();
        if target > now {
            std::thread::sleep(target - now);
        }
        Ok(())
    }
}

// ─── RT Setup ───────────────────────────────────────────────────────

/// Lock memory, prefault the stack, pin to `cpu_core` and switch to
/// `SCHED_FIFO` at `rt_priority`. No-op without the `rt` feature.
pub fn rt_setup(cpu_core: usize, rt_priority: i32) -> Result<(), DriveError> {
    rt_mlockall()?;
    prefault_stack();
    rt_set_affinity(cpu_core)?;
    rt_set_scheduler(rt_priority)?;
    debug!(cpu_core, rt_priority, "RT setup applied");
    Ok(())
}

#[cfg(feature = "rt")]
fn rt_mlockall() -> Result<(), DriveError> {
    use nix::sys::mman::{MlockallFlags, mlockall};
    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| DriveError::RtSetup(format!("mlockall failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_mlockall() -> Result<(), DriveError> {
    Ok(())
}

/// Touch 256 KiB of stack so the tick loop never faults a page in.
fn prefault_stack() {
    let mut buf = [0u8; 256 * 1024];
    for byte in buf.iter_mut() {
        // SAFETY: `byte` is a valid, exclusive reference into `buf`.
        unsafe { core::ptr::write_volatile(byte, 0xA5) };
    }
    core::hint::black_box(&buf);
}

#[cfg(feature = "rt")]
fn rt_set_affinity(cpu: usize) -> Result<(), DriveError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::unistd::Pid;

    let mut set = CpuSet::new();
    set.set(cpu)
        .map_err(|e| DriveError::RtSetup(format!("CPU {cpu} not usable: {e}")))?;
    sched_setaffinity(Pid::from_raw(0), &set)
        .map_err(|e| DriveError::RtSetup(format!("sched_setaffinity failed: {e}")))
}

#[cfg(not(feature = "rt"))]
fn rt_set_affinity(_cpu: usize) -> Result<(), DriveError> {
    Ok(())
}

#[cfg(feature = "rt")]
fn rt_set_scheduler(priority: i32) -> Result<(), DriveError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: `param` outlives the call; pid 0 is the calling thread.
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(DriveError::RtSetup(format!(
            "sched_setscheduler(SCHED_FIFO, {priority}) failed: {err}"
        )));
    }
    Ok(())
}

#[cfg(not(feature = "rt"))]
fn rt_set_scheduler(_priority: i32) -> Result<(), DriveError> {
    Ok(())
}
