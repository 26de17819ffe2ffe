//! # Cycle Scheduler
//!
//! Runs the control loop at a fixed period.
//!
//! Each cycle calls [`ClockScheduler::begin_cycle`] before any work and
//! [`ClockScheduler::end_cycle`] after it. If the work finished early the
//! scheduler waits out the rest of the period; if it ran long the cycle is
//! flagged as an overrun and the next one starts immediately.
//!
//! Time comes from a [`Clock`]: [`SystemClock`] on the vehicle and
//! [`SimClock`] in tests, so timing logic can be exercised without real
//! waits. Milliseconds are `u32` and wrap after ~49.7 days; all arithmetic
//! uses `wrapping_sub`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::warn;

/// Monotonic millisecond time source.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Milliseconds since an arbitrary start, wrapping at `u32::MAX`.
    fn now_ms(&self) -> u32;

    /// Suspends for `ms` milliseconds.
    async fn delay_ms(&self, ms: u32);
}

/// Wall clock backed by the tokio timer.
#[derive(Debug, Clone)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for SystemClock {
    fn now_ms(&self) -> u32 {
        // Truncation gives the wrapping counter
        self.start.elapsed().as_millis() as u32
    }

    async fn delay_ms(&self, ms: u32) {
        tokio::time::sleep(Duration::from_millis(u64::from(ms))).await;
    }
}

/// Manually advanced clock. Clones share the same time.
///
/// `delay_ms` returns immediately after advancing the time.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now: Arc<AtomicU32>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a clock reading `ms`.
    pub fn starting_at(ms: u32) -> Self {
        Self {
            now: Arc::new(AtomicU32::new(ms)),
        }
    }

    /// Moves time forward, wrapping at `u32::MAX`.
    pub fn advance(&self, ms: u32) {
        let now = self.now.load(Ordering::SeqCst);
        self.now.store(now.wrapping_add(ms), Ordering::SeqCst);
    }
}

#[async_trait]
impl Clock for SimClock {
    fn now_ms(&self) -> u32 {
        self.now.load(Ordering::SeqCst)
    }

    async fn delay_ms(&self, ms: u32) {
        self.advance(ms);
    }
}

/// Timing of a finished cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleTiming {
    /// Work time, from `begin_cycle` to `end_cycle`.
    pub elapsed_ms: u32,
    /// Work took longer than the period.
    pub overrun: bool,
}

/// Fixed-period cycle pacing with overrun detection.
#[derive(Debug)]
pub struct ClockScheduler<C> {
    clock: C,
    period_ms: u32,
    cycle_start_ms: u32,
    overrun_latched: bool,
    overruns: u64,
}

impl<C: Clock> ClockScheduler<C> {
    pub fn new(clock: C, period_ms: u32) -> Self {
        let cycle_start_ms = clock.now_ms();
        Self {
            clock,
            period_ms,
            cycle_start_ms,
            overrun_latched: false,
            overruns: 0,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn period_ms(&self) -> u32 {
        self.period_ms
    }

    /// Changes the period from the next `end_cycle` on.
    pub fn set_period(&mut self, period_ms: u32) {
        self.period_ms = period_ms;
    }

    /// Marks the start of a cycle and returns the current time.
    pub fn begin_cycle(&mut self) -> u32 {
        self.cycle_start_ms = self.clock.now_ms();
        self.cycle_start_ms
    }

    /// Waits out the remainder of the period, or flags an overrun.
    pub async fn end_cycle(&mut self) -> CycleTiming {
        let elapsed_ms = self.clock.now_ms().wrapping_sub(self.cycle_start_ms);

        if elapsed_ms > self.period_ms {
            self.overrun_latched = true;
            self.overruns += 1;
            warn!(
                "Cycle overrun: {} ms of work in a {} ms period",
                elapsed_ms, self.period_ms
            );
            return CycleTiming {
                elapsed_ms,
                overrun: true,
            };
        }

        let remaining = self.period_ms - elapsed_ms;
        if remaining > 0 {
            self.clock.delay_ms(remaining).await;
        }
        CycleTiming {
            elapsed_ms,
            overrun: false,
        }
    }

    /// True once any cycle has overrun, until cleared.
    pub fn overrun_flag(&self) -> bool {
        self.overrun_latched
    }

    pub fn clear_overrun(&mut self) {
        self.overrun_latched = false;
    }

    /// Total overruns since creation.
    pub fn overruns(&self) -> u64 {
        self.overruns
    }
}
