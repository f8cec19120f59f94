//! Feedback-bias DAC.
//!
//! The buck converter's feedback node is summed with an 8-bit DAC output:
//! raising the code pulls the regulated output down.  Code 0 would leave
//! the node floating at the converter's own reference, so callers keep the
//! code in `1..=255`.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: oneshot DAC channel via `dac_oneshot_*`.
//! On host/test: remembers the last code written.

#[cfg(target_os = "espidf")]
use esp_idf_sys::*;

use crate::error::HardwareInitError;
use crate::pins;

pub struct FeedbackDac {
    #[cfg(target_os = "espidf")]
    handle: dac_oneshot_handle_t,
    last_code: Option<u8>,
    writes: u32,
}

// SAFETY: the handle is an opaque driver token; all access goes through
// `&mut self`, so there is never more than one user.
#[cfg(target_os = "espidf")]
unsafe impl Send for FeedbackDac {}

impl FeedbackDac {
    /// Claim the DAC channel wired to the feedback node.
    #[cfg(target_os = "espidf")]
    pub fn new() -> Result<Self, HardwareInitError> {
        let cfg = dac_oneshot_config_t {
            chan_id: pins::FEEDBACK_DAC_CHANNEL as dac_channel_t,
        };
        let mut handle: dac_oneshot_handle_t = core::ptr::null_mut();
        // SAFETY: cfg and handle outlive the call; called once at boot.
        let ret = unsafe { dac_oneshot_new_channel(&cfg, &mut handle) };
        if ret != ESP_OK as i32 {
            return Err(HardwareInitError::DacInitFailed(ret));
        }
        log::info!(
            "dac: oneshot channel {} on GPIO{}",
            pins::FEEDBACK_DAC_CHANNEL,
            pins::FEEDBACK_DAC_GPIO
        );
        Ok(Self {
            handle,
            last_code: None,
            writes: 0,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Result<Self, HardwareInitError> {
        log::info!("dac(sim): GPIO{} feedback channel", pins::FEEDBACK_DAC_GPIO);
        Ok(Self {
            last_code: None,
            writes: 0,
        })
    }

    /// Drive the feedback node.
    pub fn write(&mut self, code: u8) {
        self.write_hw(code);
        self.last_code = Some(code);
        self.writes = self.writes.wrapping_add(1);
    }

    #[cfg(target_os = "espidf")]
    fn write_hw(&mut self, code: u8) {
        // SAFETY: handle was created in new() and is never freed.
        let ret = unsafe { dac_oneshot_output_voltage(self.handle, code) };
        if ret != ESP_OK as i32 {
            log::warn!("dac: write {} failed ({})", code, ret);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_hw(&mut self, _code: u8) {}

    /// Last code written, `None` before the first write.
    pub fn last_code(&self) -> Option<u8> {
        self.last_code
    }

    pub fn write_count(&self) -> u32 {
        self.writes
    }
}
