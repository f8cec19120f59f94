//! INA219 high-side current/voltage monitor.
//!
//! Talks plain `embedded-hal` I2C so the same driver runs against the
//! ESP-IDF bus and against a register-map mock in tests.
//!
//! Configured for the 32 V bus range, ±320 mV shunt range, 12-bit
//! conversions on both channels and continuous sampling.

use embedded_hal::i2c::I2c;

use crate::error::SensorError;

/// Default 7-bit address (A0 = A1 = GND).
pub const DEFAULT_ADDRESS: u8 = 0x40;

mod regs {
    pub const CONFIG: u8 = 0x00;
    pub const BUS_VOLTAGE: u8 = 0x02;
    pub const CURRENT: u8 = 0x04;
    pub const CALIBRATION: u8 = 0x05;
}

/// BRNG=32V | PG=/8 | BADC=12bit | SADC=12bit | MODE=shunt+bus continuous.
pub const CONFIG_32V_320MV: u16 = 0x399F;

/// Bus voltage register LSB.
const BUS_LSB_MV: f32 = 4.0;

/// Fixed scaling constant from the datasheet calibration equation.
const CAL_SCALE: f32 = 0.040_96;

/// Largest value the calibration register holds (bit 0 is reserved).
const CAL_MAX: u16 = 0xFFFE;

/// Calibration derived from a current range and shunt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// Amps per bit of the current register.
    pub current_lsb: f32,
    pub register: u16,
}

impl Calibration {
    /// Compute the calibration for `max_amps` over `shunt_ohms`.
    ///
    /// A range too small for the shunt is widened to the finest LSB the
    /// register can express; the requested range stays representable.
    pub fn compute(max_amps: f32, shunt_ohms: f32) -> Result<Self, SensorError> {
        if !(max_amps.is_finite() && max_amps > 0.0 && shunt_ohms.is_finite() && shunt_ohms > 0.0) {
            return Err(SensorError::CalibrationRejected);
        }
        let finest_lsb = CAL_SCALE / (f32::from(CAL_MAX) * shunt_ohms);
        let current_lsb = (max_amps / 32_768.0).max(finest_lsb);
        let raw = CAL_SCALE / (current_lsb * shunt_ohms);
        if !raw.is_finite() || raw < 1.0 {
            return Err(SensorError::CalibrationRejected);
        }
        let register = (raw as u32).min(u32::from(CAL_MAX)) as u16 & CAL_MAX;
        if register == 0 {
            return Err(SensorError::CalibrationRejected);
        }
        Ok(Self {
            current_lsb,
            register,
        })
    }
}

/// INA219 driver owning its bus handle.
pub struct Ina219<I> {
    i2c: I,
    address: u8,
    calibration: Option<Calibration>,
}

impl<I: I2c> Ina219<I> {
    pub fn new(i2c: I, address: u8) -> Self {
        Self {
            i2c,
            address,
            calibration: None,
        }
    }

    /// Check the device answers and write the operating configuration.
    pub fn init(&mut self) -> Result<(), SensorError> {
        self.read_reg(regs::CONFIG)
            .map_err(|_| SensorError::NotDetected)?;
        self.write_reg(regs::CONFIG, CONFIG_32V_320MV)
    }

    /// Re-range for `max_amps` through `shunt_ohms`.  Nothing is written
    /// when the range is rejected.
    pub fn calibrate(&mut self, max_amps: f32, shunt_ohms: f32) -> Result<(), SensorError> {
        let calibration = Calibration::compute(max_amps, shunt_ohms)?;
        self.write_reg(regs::CALIBRATION, calibration.register)?;
        self.calibration = Some(calibration);
        Ok(())
    }

    pub fn calibration(&self) -> Option<Calibration> {
        self.calibration
    }

    /// Bus voltage in volts.
    pub fn bus_voltage(&mut self) -> Result<f32, SensorError> {
        let raw = self.read_reg(regs::BUS_VOLTAGE)?;
        Ok(f32::from(raw >> 3) * BUS_LSB_MV / 1000.0)
    }

    /// Load current in milliamps.  Requires a prior [`calibrate`](Self::calibrate).
    pub fn current_ma(&mut self) -> Result<f32, SensorError> {
        let calibration = self.calibration.ok_or(SensorError::CalibrationRejected)?;
        // A brown-out resets the device and zeroes the calibration register.
        self.write_reg(regs::CALIBRATION, calibration.register)?;
        let raw = self.read_reg(regs::CURRENT)? as i16;
        Ok(f32::from(raw) * calibration.current_lsb * 1000.0)
    }

    /// Give the bus back.
    pub fn release(self) -> I {
        self.i2c
    }

    fn write_reg(&mut self, reg: u8, value: u16) -> Result<(), SensorError> {
        let [hi, lo] = value.to_be_bytes();
        self.i2c
            .write(self.address, &[reg, hi, lo])
            .map_err(|_| SensorError::Bus)
    }

    fn read_reg(&mut self, reg: u8) -> Result<u16, SensorError> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(self.address, &[reg], &mut buf)
            .map_err(|_| SensorError::Bus)?;
        Ok(u16::from_be_bytes(buf))
    }
}
