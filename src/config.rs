//! Controller configuration.
//!
//! Two layers:
//!
//! - [`ControllerConfig`]: compiled hardware constants (shunt, thresholds,
//!   reference voltages, timing).  Never changes at runtime.
//! - [`Settings`]: the operator-tunable parameters held by
//!   [`ConfigStore`](crate::store::ConfigStore).  Reset to
//!   [`Settings::default()`] on every boot; nothing is persisted.

use serde::{Deserialize, Serialize};

/// Lowest accepted telemetry interval.
pub const MIN_SAMPLE_INTERVAL_MS: u32 = 100;

/// Actuator codes that may be written.  Zero is never emitted.
pub const OUTPUT_CODE_MIN: u8 = 1;
pub const OUTPUT_CODE_MAX: u8 = 255;

/// Compiled hardware constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    // --- Sensor ---
    /// Current-sense shunt resistance (ohms).
    pub shunt_ohms: f32,
    /// INA219 7-bit I2C address.
    pub sensor_address: u8,

    // --- Safety ---
    /// Bus voltage at or above which the interlock may engage (volts).
    pub safety_voltage_threshold: f32,

    // --- Actuator ---
    /// Converter feedback reference voltage (volts).
    pub feedback_voltage: f32,
    /// DAC full-scale output voltage (volts).
    pub dac_full_scale_voltage: f32,

    // --- Timing ---
    /// Control tick period (milliseconds).
    pub control_period_ms: u32,
    /// Station-mode connect deadline before the device restarts (milliseconds).
    pub wifi_connect_timeout_ms: u32,
    /// Task watchdog timeout for the control thread (milliseconds).
    pub watchdog_timeout_ms: u32,

    // --- Network ---
    pub http_port: u16,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            // Sensor
            shunt_ohms: 0.1,
            sensor_address: 0x40,

            // Safety
            safety_voltage_threshold: 25.0,

            // Actuator
            feedback_voltage: 1.25,
            dac_full_scale_voltage: 3.3,

            // Timing
            control_period_ms: 10,          // 100 Hz
            wifi_connect_timeout_ms: 180_000,
            watchdog_timeout_ms: 5_000,

            // Network
            http_port: 80,
        }
    }
}

impl ControllerConfig {
    /// Fixed low-output actuator code that holds the converter at its
    /// feedback reference.
    ///
    /// `round(feedback / full_scale * 255)`, clamped into the writable range.
    pub fn safety_code(&self) -> u8 {
        let raw = (self.feedback_voltage / self.dac_full_scale_voltage * 255.0).round();
        raw.clamp(f32::from(OUTPUT_CODE_MIN), f32::from(OUTPUT_CODE_MAX)) as u8
    }
}

/// PID gains.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tunings {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl Default for Tunings {
    fn default() -> Self {
        Self {
            kp: 20.0,
            ki: 5.0,
            kd: 1.0,
        }
    }
}

impl Tunings {
    /// True if every gain is finite and non-negative.
    pub fn is_valid(&self) -> bool {
        [self.kp, self.ki, self.kd]
            .iter()
            .all(|g| g.is_finite() && *g >= 0.0)
    }
}

/// Operator-tunable parameters shared by the control loop, the telemetry
/// publisher and the command interface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Target current (mA).  Always within `0..=max_limit_ma`.
    pub setpoint_ma: f32,
    pub tunings: Tunings,
    /// Upper bound for the setpoint and the sensor calibration range (mA).
    pub max_limit_ma: f32,
    /// Telemetry period (ms).  Never below [`MIN_SAMPLE_INTERVAL_MS`].
    pub sample_interval_ms: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            setpoint_ma: 100.0,
            tunings: Tunings::default(),
            max_limit_ma: 500.0,
            sample_interval_ms: 1000,
        }
    }
}

impl Settings {
    /// Check every field invariant.
    pub fn is_consistent(&self) -> bool {
        self.max_limit_ma.is_finite()
            && self.max_limit_ma > 0.0
            && self.setpoint_ma >= 0.0
            && self.setpoint_ma <= self.max_limit_ma
            && self.tunings.is_valid()
            && self.sample_interval_ms >= MIN_SAMPLE_INTERVAL_MS
    }
}
