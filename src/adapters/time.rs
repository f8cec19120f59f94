//! Monotonic time.
//!
//! - **`target_os = "espidf"`**: `esp_timer_get_time()` (microsecond
//!   precision, starts at boot).
//! - **otherwise**: `std::time::Instant` anchored at first use, for
//!   host-side testing and simulation.

use core::time::Duration;

use crate::app::ports::ClockPort;

/// Time since boot.
#[cfg(target_os = "espidf")]
pub fn uptime() -> Duration {
    let us = unsafe { esp_idf_sys::esp_timer_get_time() };
    Duration::from_micros(us as u64)
}

/// Time since first call.
#[cfg(not(target_os = "espidf"))]
pub fn uptime() -> Duration {
    use std::time::Instant;
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    START.get_or_init(Instant::now).elapsed()
}

/// Milliseconds since boot.
pub fn uptime_ms() -> u64 {
    uptime().as_millis() as u64
}

/// [`ClockPort`] over the platform timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl ClockPort for SystemClock {
    fn now_ms(&self) -> u64 {
        uptime_ms()
    }
}
