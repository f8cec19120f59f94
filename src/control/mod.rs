//! Closed-loop current regulation.
//!
//! [`ControlLoop`] is stepped once per scheduler tick and is not
//! self-timed.  Each tick:
//!
//! 1. take one fresh [`SensorSample`] (never reused across ticks)
//! 2. evaluate the [`SafetyInterlock`]
//! 3. either write the safety code, or step the PID and write its output
//!
//! ```text
//!            override predicate true
//!   Normal ─────────────────────────▶ SafetyOverride
//!     ▲                                   │
//!     └───────────────────────────────────┘
//!            override predicate false
//!            (PID state untouched)
//! ```

pub mod pid;

use log::warn;

use crate::app::ports::{ActuatorPort, SensorPort};
use crate::config::{ControllerConfig, OUTPUT_CODE_MAX, OUTPUT_CODE_MIN, Settings};
use crate::safety::SafetyInterlock;
use pid::PidController;

/// INA219 bus-voltage full range (32 V setting).
const BUS_RANGE_VOLTS: f32 = 32.0;

/// Loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    Normal,
    SafetyOverride,
}

/// One sensor reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    pub bus_voltage: f32,
    pub current_ma: f32,
    pub timestamp_ms: u64,
}

/// Reasons a reading looks physically implausible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorAnomaly {
    NonFinite,
    NegativeCurrent,
    BusOverRange,
}

impl SensorSample {
    /// Read voltage then current from the sensor.
    pub fn read(sensor: &mut impl SensorPort, now_ms: u64) -> Self {
        Self {
            bus_voltage: sensor.read_bus_voltage(),
            current_ma: sensor.read_current(),
            timestamp_ms: now_ms,
        }
    }

    /// Plausibility check.  Purely advisory: the loop still consumes the sample.
    pub fn anomaly(&self) -> Option<SensorAnomaly> {
        if !self.bus_voltage.is_finite() || !self.current_ma.is_finite() {
            Some(SensorAnomaly::NonFinite)
        } else if self.current_ma < 0.0 {
            Some(SensorAnomaly::NegativeCurrent)
        } else if self.bus_voltage > BUS_RANGE_VOLTS {
            Some(SensorAnomaly::BusOverRange)
        } else {
            None
        }
    }
}

/// What happened during one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub sample: SensorSample,
    pub previous_mode: LoopMode,
    pub mode: LoopMode,
    /// Code written to the actuator this tick.
    pub output: u8,
    pub anomaly: Option<SensorAnomaly>,
}

impl TickReport {
    pub fn mode_changed(&self) -> bool {
        self.previous_mode != self.mode
    }
}

/// PID + safety interlock state machine.
pub struct ControlLoop {
    pid: PidController,
    interlock: SafetyInterlock,
    mode: LoopMode,
    last_output: u8,
    ticks: u64,
}

impl ControlLoop {
    pub fn new(config: &ControllerConfig, settings: &Settings) -> Self {
        let mut pid = PidController::new(settings.tunings);
        pid.set_limits(0.0, f32::from(OUTPUT_CODE_MAX));
        let interlock = SafetyInterlock::new(config);
        let last_output = interlock.safety_code();
        Self {
            pid,
            interlock,
            mode: LoopMode::Normal,
            last_output,
            ticks: 0,
        }
    }

    /// Run one tick against a settings snapshot and a fresh sample.
    ///
    /// Gain changes in `settings` take effect on this step; PID state is
    /// never reset by a gain change or by leaving the override.
    pub fn tick(
        &mut self,
        settings: &Settings,
        sample: SensorSample,
        actuator: &mut impl ActuatorPort,
    ) -> TickReport {
        self.ticks += 1;
        let previous_mode = self.mode;

        let anomaly = sample.anomaly();
        if let Some(kind) = anomaly {
            warn!(
                "control: implausible sample {:?} (bus={}V current={}mA), using as-is",
                kind, sample.bus_voltage, sample.current_ma
            );
        }

        if settings.tunings != self.pid.tunings() {
            self.pid.set_tunings(settings.tunings);
        }

        let engaged =
            self.interlock
                .evaluate(sample.bus_voltage, settings.setpoint_ma, sample.current_ma);

        let output = if engaged {
            self.mode = LoopMode::SafetyOverride;
            self.interlock.safety_code()
        } else {
            self.mode = LoopMode::Normal;
            to_output_code(self.pid.compute(settings.setpoint_ma, sample.current_ma))
        };

        actuator.write_level(output);
        self.last_output = output;

        TickReport {
            sample,
            previous_mode,
            mode: self.mode,
            output,
            anomaly,
        }
    }

    pub fn mode(&self) -> LoopMode {
        self.mode
    }

    /// Last code written (the safety code before the first tick).
    pub fn last_output(&self) -> u8 {
        self.last_output
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    pub fn safety_code(&self) -> u8 {
        self.interlock.safety_code()
    }

    pub fn safety_trips(&self) -> u32 {
        self.interlock.trip_count()
    }

    /// Read-only view of the regulator, for diagnostics and tests.
    pub fn pid(&self) -> &PidController {
        &self.pid
    }
}

/// Round a controller output to an actuator code in `1..=255`.
pub fn to_output_code(value: f32) -> u8 {
    if value.is_nan() {
        return OUTPUT_CODE_MIN;
    }
    value
        .round()
        .clamp(f32::from(OUTPUT_CODE_MIN), f32::from(OUTPUT_CODE_MAX)) as u8
}
