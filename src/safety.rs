//! Over-voltage safety interlock.
//!
//! Evaluated **every tick before the PID**.  When the bus voltage reaches
//! the threshold while the loop is still asking for more current than it
//! measures, the converter is driving into an open or high-impedance load.
//! The interlock then pins the actuator at the safety code and the PID is
//! not stepped at all.
//!
//! ## Lifecycle
//!
//! 1. `bus_voltage >= threshold && setpoint > measured` → engaged.
//! 2. Each tick the predicate is re-evaluated from scratch.  There is no
//!    latch and no hysteresis: the first tick where it is false releases.
//! 3. On release the PID resumes from the state it had when the
//!    interlock engaged.

use crate::config::ControllerConfig;
use log::{error, info};

/// Safety interlock.
pub struct SafetyInterlock {
    threshold_volts: f32,
    safety_code: u8,
    engaged: bool,
    /// Number of separate engagements since boot.
    trips: u32,
}

impl SafetyInterlock {
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            threshold_volts: config.safety_voltage_threshold,
            safety_code: config.safety_code(),
            engaged: false,
            trips: 0,
        }
    }

    /// Pure predicate.
    pub fn should_override(&self, bus_voltage: f32, setpoint_ma: f32, measured_ma: f32) -> bool {
        bus_voltage >= self.threshold_volts && setpoint_ma > measured_ma
    }

    /// Evaluate against one fresh sample.  Returns `true` while engaged.
    pub fn evaluate(&mut self, bus_voltage: f32, setpoint_ma: f32, measured_ma: f32) -> bool {
        let condition = self.should_override(bus_voltage, setpoint_ma, measured_ma);
        if condition {
            if !self.engaged {
                self.trips = self.trips.saturating_add(1);
                error!(
                    "SAFETY OVERRIDE ENGAGED: bus={:.2}V setpoint={:.1}mA measured={:.1}mA",
                    bus_voltage, setpoint_ma, measured_ma
                );
            }
        } else if self.engaged {
            info!("SAFETY OVERRIDE RELEASED: bus={:.2}V", bus_voltage);
        }
        self.engaged = condition;
        condition
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged
    }

    /// Code written while engaged.
    pub fn safety_code(&self) -> u8 {
        self.safety_code
    }

    pub fn trip_count(&self) -> u32 {
        self.trips
    }
}
