//! Task Watchdog Timer (TWDT) driver.
//!
//! Resets the device if the control thread stops feeding it.  A stalled
//! loop would otherwise leave the DAC frozen at its last code.

#[cfg(target_os = "espidf")]
use esp_idf_sys::*;

pub struct Watchdog {
    timeout_ms: u32,
    #[cfg(target_os = "espidf")]
    subscribed: bool,
    #[cfg(not(target_os = "espidf"))]
    feeds: core::cell::Cell<u64>,
}

impl Watchdog {
    /// Subscribe the calling task with the given timeout.
    pub fn new(timeout_ms: u32) -> Self {
        #[cfg(target_os = "espidf")]
        {
            let cfg = esp_task_wdt_config_t {
                timeout_ms,
                idle_core_mask: 0,
                trigger_panic: true,
            };
            // SAFETY: plain FFI calls with a stack config; current task handle.
            let subscribed = unsafe {
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK as i32 {
                    log::warn!("TWDT reconfigure returned {} (may already be configured)", ret);
                }
                let ret = esp_task_wdt_add(core::ptr::null_mut());
                if ret != ESP_OK as i32 {
                    log::warn!("Watchdog: failed to subscribe ({})", ret);
                }
                ret == ESP_OK as i32
            };
            if subscribed {
                log::info!("Watchdog: subscribed ({} ms, panic on trigger)", timeout_ms);
            }
            Self {
                timeout_ms,
                subscribed,
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            log::info!("Watchdog(sim): {} ms, no-op", timeout_ms);
            Self {
                timeout_ms,
                feeds: core::cell::Cell::new(0),
            }
        }
    }

    /// Feed the watchdog.  Must happen more often than the timeout.
    pub fn feed(&self) {
        #[cfg(target_os = "espidf")]
        if self.subscribed {
            // SAFETY: the current task subscribed in new().
            unsafe {
                esp_task_wdt_reset();
            }
        }

        #[cfg(not(target_os = "espidf"))]
        self.feeds.set(self.feeds.get() + 1);
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn feed_count(&self) -> u64 {
        self.feeds.get()
    }
}
