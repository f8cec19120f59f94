//! Unified error types for the controller firmware.
//!
//! [`Error`] is what the command path reports.  Boot-time failures use
//! [`HardwareInitError`] and [`ProvisioningError`].  All variants are `Copy`
//! so they travel through the command reply path and the event sink
//! without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Outcome of a rejected command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A command parameter was missing or unusable.  Nothing changed.
    Validation(ValidationError),
    /// The current/voltage sensor failed or rejected a request.
    Sensor(SensorError),
    /// A reply did not fit its fixed-capacity buffer.
    Encoding(&'static str),
}

impl Error {
    /// HTTP-equivalent status for the command reply path.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Sensor(_) | Self::Encoding(_) => 500,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(e) => write!(f, "validation: {e}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Encoding(what) => write!(f, "encoding: {what}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation errors
// ---------------------------------------------------------------------------

/// Rejected command input.  The `&'static str` names the parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    MissingParam(&'static str),
    /// Present but not a finite number.
    InvalidNumber(&'static str),
    /// Must be `>= 0`.
    Negative(&'static str),
    /// Must be `> 0`.
    NotPositive(&'static str),
    /// A command that needs at least one of several optional parameters got none.
    NothingToApply,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingParam(p) => write!(f, "missing parameter '{p}'"),
            Self::InvalidNumber(p) => write!(f, "parameter '{p}' is not a finite number"),
            Self::Negative(p) => write!(f, "parameter '{p}' must not be negative"),
            Self::NotPositive(p) => write!(f, "parameter '{p}' must be positive"),
            Self::NothingToApply => write!(f, "no parameters supplied"),
        }
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// No ACK at the configured address.
    NotDetected,
    /// I2C transfer failed after the device was found.
    Bus,
    /// Requested range cannot be represented by the calibration register.
    CalibrationRejected,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotDetected => write!(f, "sensor not detected"),
            Self::Bus => write!(f, "I2C bus error"),
            Self::CalibrationRejected => write!(f, "calibration rejected"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Hardware init errors
// ---------------------------------------------------------------------------

/// Boot-time peripheral failures.  Fatal: the firmware halts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareInitError {
    Sensor(SensorError),
    /// ESP-IDF DAC channel allocation failed (carries the `esp_err_t`).
    DacInitFailed(i32),
    I2cInitFailed,
}

impl fmt::Display for HardwareInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "{e}"),
            Self::DacInitFailed(rc) => write!(f, "DAC init failed (rc={rc})"),
            Self::I2cInitFailed => write!(f, "I2C driver init failed"),
        }
    }
}

impl From<SensorError> for HardwareInitError {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Provisioning errors
// ---------------------------------------------------------------------------

/// Station-mode bring-up failures.  Fatal at process level: restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningError {
    NoCredentials,
    /// SSID or password fails WPA2 length/charset rules.
    InvalidCredentials,
    Timeout,
    DriverFailed,
}

impl fmt::Display for ProvisioningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidCredentials => write!(f, "WiFi credentials invalid"),
            Self::Timeout => write!(f, "WiFi connect timed out"),
            Self::DriverFailed => write!(f, "WiFi driver failed"),
        }
    }
}
