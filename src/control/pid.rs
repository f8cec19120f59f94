//! PID controller for output current
//!
//! Discrete, fixed-step PID.  One call to [`PidController::compute`] per
//! control tick; there is no time scaling, the gains absorb the tick period.
//!
//! Two details matter for bumpless operation:
//!
//! - The integral stores `ki * error` summed over ticks rather than the
//!   raw error sum.  A change to `ki` therefore only affects future
//!   accumulation instead of rescaling the whole history.
//! - The derivative acts on the measurement, so a setpoint step does not
//!   kick the output.

use crate::config::Tunings;

/// PID controller
#[derive(Debug, Clone)]
pub struct PidController {
    tunings: Tunings,
    /// Accumulated `ki * error`, already in output units.
    integral: f32,
    prev_measurement: Option<f32>,
    output_min: f32,
    output_max: f32,
}

impl PidController {
    pub fn new(tunings: Tunings) -> Self {
        Self {
            tunings,
            integral: 0.0,
            prev_measurement: None,
            output_min: 0.0,
            output_max: 255.0,
        }
    }

    /// Set output limits
    pub fn set_limits(&mut self, min: f32, max: f32) {
        self.output_min = min;
        self.output_max = max;
    }

    /// Swap gains.  Internal state is kept; the next step uses the new values.
    pub fn set_tunings(&mut self, tunings: Tunings) {
        self.tunings = tunings;
    }

    pub fn tunings(&self) -> Tunings {
        self.tunings
    }

    /// One step.  Returns the output clamped to the configured limits.
    pub fn compute(&mut self, setpoint: f32, measurement: f32) -> f32 {
        let Tunings { kp, ki, kd } = self.tunings;
        let error = setpoint - measurement;
        if !error.is_finite() {
            // Non-finite sample: hold state, output the floor.
            return self.output_min;
        }

        let prev_integral = self.integral;
        self.integral += ki * error;

        // First step has no history: no derivative contribution.
        let d_input = self
            .prev_measurement
            .map_or(0.0, |prev| measurement - prev);

        let output = kp * error + self.integral - kd * d_input;
        let clamped = if output.is_nan() {
            self.output_min
        } else {
            output.clamp(self.output_min, self.output_max)
        };

        // Anti-windup: a saturated or overflowed step does not accumulate.
        if output != clamped || !self.integral.is_finite() {
            self.integral = prev_integral;
        }

        self.prev_measurement = Some(measurement);
        clamped
    }

    /// Accumulated integral term (output units).
    pub fn integral(&self) -> f32 {
        self.integral
    }

    /// Reset controller state
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_measurement = None;
    }
}
