//! Cooperative scheduler.
//!
//! One thread of control multiplexes three activities.  Each call to
//! [`Scheduler::poll`] runs them in a fixed order:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  poll(now_ms)                                                │
//! │                                                              │
//! │  1. dispatch_commands(now)  pending commands, between ticks, │
//! │                             never inside one                 │
//! │  2. control_tick(now)       if the fixed-period deadline hit │
//! │  3. publish_telemetry(now)  if the sample interval elapsed   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The scheduler owns only timing.  What each step does is supplied by a
//! [`SchedulerDelegate`]; the main loop sleeps until
//! [`Scheduler::next_deadline`] between polls.

use crate::app::ports::SchedulerDelegate;
use crate::config::MIN_SAMPLE_INTERVAL_MS;
use log::{info, warn};

/// What a single poll did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollOutcome {
    pub commands: usize,
    pub ticked: bool,
    pub published: bool,
}

/// Fixed-period tick plus interval-driven telemetry.
pub struct Scheduler {
    period_ms: u32,
    /// Deadline of the next control tick.  `None` until the first poll.
    next_tick_ms: Option<u64>,
    /// When telemetry last went out (or the first poll).
    last_telemetry_ms: Option<u64>,
    /// Interval observed at the last poll, for deadline computation.
    telemetry_interval_ms: u32,
    ticks: u64,
    /// Ticks that started more than one full period late.
    overruns: u32,
    publishes: u64,
}

impl Scheduler {
    pub fn new(period_ms: u32) -> Self {
        let period_ms = period_ms.max(1);
        info!("Scheduler: control period {} ms", period_ms);
        Self {
            period_ms,
            next_tick_ms: None,
            last_telemetry_ms: None,
            telemetry_interval_ms: MIN_SAMPLE_INTERVAL_MS,
            ticks: 0,
            overruns: 0,
            publishes: 0,
        }
    }

    /// Run everything that is due at `now_ms`.
    pub fn poll(&mut self, now_ms: u64, delegate: &mut dyn SchedulerDelegate) -> PollOutcome {
        let mut outcome = PollOutcome {
            commands: delegate.dispatch_commands(now_ms),
            ..PollOutcome::default()
        };

        // ── Control tick ──────────────────────────────────────────
        let due = self.next_tick_ms.unwrap_or(now_ms);
        if now_ms >= due {
            let period = u64::from(self.period_ms);
            if now_ms >= due + period {
                self.overruns = self.overruns.saturating_add(1);
                if self.overruns.is_power_of_two() {
                    warn!(
                        "Scheduler: tick {} ms late ({} overruns)",
                        now_ms - due,
                        self.overruns
                    );
                }
                // Resync rather than firing a burst of catch-up ticks.
                self.next_tick_ms = Some(now_ms + period);
            } else {
                self.next_tick_ms = Some(due + period);
            }
            delegate.control_tick(now_ms);
            self.ticks += 1;
            outcome.ticked = true;
        }

        // ── Telemetry ─────────────────────────────────────────────
        self.telemetry_interval_ms = delegate.sample_interval_ms().max(MIN_SAMPLE_INTERVAL_MS);
        let last = *self.last_telemetry_ms.get_or_insert(now_ms);
        if now_ms.saturating_sub(last) >= u64::from(self.telemetry_interval_ms) {
            delegate.publish_telemetry(now_ms);
            self.last_telemetry_ms = Some(now_ms);
            self.publishes += 1;
            outcome.published = true;
        }

        outcome
    }

    /// Earliest time at which [`poll`](Self::poll) has work to do.
    pub fn next_deadline(&self) -> Option<u64> {
        let tick = self.next_tick_ms?;
        let telemetry = self
            .last_telemetry_ms
            .map_or(tick, |t| t + u64::from(self.telemetry_interval_ms));
        Some(tick.min(telemetry))
    }

    /// Milliseconds to sleep from `now_ms`; zero if something is due.
    pub fn sleep_hint_ms(&self, now_ms: u64) -> u64 {
        self.next_deadline()
            .map_or(0, |deadline| deadline.saturating_sub(now_ms))
    }

    pub fn period_ms(&self) -> u32 {
        self.period_ms
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    pub fn overrun_count(&self) -> u32 {
        self.overruns
    }

    pub fn publish_count(&self) -> u64 {
        self.publishes
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
