//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the INA219 and the feedback DAC, exposing them through
//! [`SensorPort`] and [`ActuatorPort`].  This is the only module that
//! touches the control hardware.  On non-espidf targets the DAC uses its
//! simulation stub and the sensor runs over whatever I2C bus is supplied.

use embedded_hal::i2c::I2c;
use log::{info, warn};

use crate::app::ports::{ActuatorPort, SensorPort};
use crate::config::{ControllerConfig, Settings};
use crate::drivers::dac::FeedbackDac;
use crate::error::{HardwareInitError, SensorError};
use crate::sensors::ina219::Ina219;

/// Sensor plus actuator behind the port traits.
pub struct HardwareAdapter<I> {
    sensor: Ina219<I>,
    dac: FeedbackDac,
    read_failures: u32,
}

impl<I: I2c> HardwareAdapter<I> {
    /// Probe and calibrate the sensor, then claim the DAC.
    ///
    /// Any failure here is fatal: the caller must not run the loop on an
    /// uncalibrated sensor.
    pub fn init(
        i2c: I,
        config: &ControllerConfig,
        settings: &Settings,
    ) -> Result<Self, HardwareInitError> {
        let mut sensor = Ina219::new(i2c, config.sensor_address);
        sensor.init()?;
        sensor.calibrate(settings.max_limit_ma / 1000.0, config.shunt_ohms)?;
        let dac = FeedbackDac::new()?;
        info!(
            "hardware: INA219 @0x{:02x} ranged for {:.0} mA over {} Ω",
            config.sensor_address, settings.max_limit_ma, config.shunt_ohms
        );
        Ok(Self::from_parts(sensor, dac))
    }

    /// Assemble from already-initialised drivers.
    pub fn from_parts(sensor: Ina219<I>, dac: FeedbackDac) -> Self {
        Self {
            sensor,
            dac,
            read_failures: 0,
        }
    }

    pub fn dac(&self) -> &FeedbackDac {
        &self.dac
    }

    /// Sensor reads that failed and were reported as zero.
    pub fn read_failures(&self) -> u32 {
        self.read_failures
    }

    fn reading_or_zero(&mut self, what: &str, reading: Result<f32, SensorError>) -> f32 {
        reading.unwrap_or_else(|e| {
            self.read_failures = self.read_failures.saturating_add(1);
            if self.read_failures.is_power_of_two() {
                warn!("hardware: {} read failed: {} ({} total)", what, e, self.read_failures);
            }
            0.0
        })
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl<I: I2c> SensorPort for HardwareAdapter<I> {
    fn read_bus_voltage(&mut self) -> f32 {
        let reading = self.sensor.bus_voltage();
        self.reading_or_zero("bus voltage", reading)
    }

    fn read_current(&mut self) -> f32 {
        let reading = self.sensor.current_ma();
        self.reading_or_zero("current", reading)
    }

    fn calibrate(&mut self, max_amps: f32, shunt_ohms: f32) -> Result<(), SensorError> {
        self.sensor.calibrate(max_amps, shunt_ohms)
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl<I: I2c> ActuatorPort for HardwareAdapter<I> {
    fn write_level(&mut self, code: u8) {
        self.dac.write(code);
    }
}
