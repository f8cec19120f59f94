//! Shared controller settings.
//!
//! [`ConfigStore`] is the single owner of the operator-tunable
//! [`Settings`].  Every accessor runs under one lock, so a reader never
//! sees a half-applied update even when the store is shared across
//! threads.  Multi-field updates go through [`ConfigStore::transaction`].
//!
//! Invariants after every call:
//!
//! - `0 <= setpoint_ma <= max_limit_ma`
//! - every gain finite and `>= 0`
//! - `sample_interval_ms >= 100`

use core::cell::RefCell;

use embassy_sync::blocking_mutex::CriticalSectionMutex;
use log::{debug, info, warn};

use crate::app::ports::SensorPort;
use crate::config::{MIN_SAMPLE_INTERVAL_MS, Settings, Tunings};
use crate::error::{Error, ValidationError};

/// Optional parts of a limit/cadence change.  At least one must be set.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AdvancedUpdate {
    /// New current ceiling (mA).
    pub max_limit_ma: Option<f32>,
    /// New telemetry period (seconds).
    pub interval_secs: Option<f32>,
}

/// Lock-guarded settings shared by the control loop and the command path.
pub struct ConfigStore {
    inner: CriticalSectionMutex<RefCell<Settings>>,
    shunt_ohms: f32,
}

impl ConfigStore {
    /// Create the store with compiled defaults.
    pub fn new(shunt_ohms: f32) -> Self {
        Self::with_settings(Settings::default(), shunt_ohms)
    }

    /// Create the store from explicit settings (tests, bench rigs).
    pub fn with_settings(settings: Settings, shunt_ohms: f32) -> Self {
        debug_assert!(settings.is_consistent());
        Self {
            inner: CriticalSectionMutex::new(RefCell::new(settings)),
            shunt_ohms,
        }
    }

    /// Consistent copy of every field.
    pub fn snapshot(&self) -> Settings {
        self.inner.lock(|cell| *cell.borrow())
    }

    /// Run `f` with exclusive access to the settings.
    ///
    /// Nothing else can read or write the store until `f` returns.
    pub fn transaction<R>(&self, f: impl FnOnce(&mut Settings) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }

    /// Store `min(value_ma, max_limit)`, floored at zero.  Returns the stored value.
    ///
    /// Never rejects.  A NaN request leaves the setpoint where it was.
    pub fn set_target(&self, value_ma: f32) -> f32 {
        self.transaction(|s| {
            if value_ma.is_nan() {
                warn!("store: NaN setpoint ignored");
                return s.setpoint_ma;
            }
            s.setpoint_ma = value_ma.min(s.max_limit_ma).max(0.0);
            debug!("store: setpoint {:.1} mA (requested {:.1})", s.setpoint_ma, value_ma);
            s.setpoint_ma
        })
    }

    /// Replace all three gains at once.
    pub fn set_tunings(&self, tunings: Tunings) -> Result<(), ValidationError> {
        validate_gain("kp", tunings.kp)?;
        validate_gain("ki", tunings.ki)?;
        validate_gain("kd", tunings.kd)?;
        self.transaction(|s| s.tunings = tunings);
        info!(
            "store: tunings kp={} ki={} kd={}",
            tunings.kp, tunings.ki, tunings.kd
        );
        Ok(())
    }

    /// Change the current ceiling and/or the telemetry cadence.
    ///
    /// A new ceiling re-ranges the sensor first.  If the sensor refuses,
    /// nothing is committed.  The ceiling, the dependent setpoint clamp
    /// and the interval land in one transaction.
    pub fn set_advanced(
        &self,
        update: AdvancedUpdate,
        sensor: &mut impl SensorPort,
    ) -> Result<Settings, Error> {
        if update.max_limit_ma.is_none() && update.interval_secs.is_none() {
            return Err(ValidationError::NothingToApply.into());
        }
        if let Some(max) = update.max_limit_ma {
            if !max.is_finite() {
                return Err(ValidationError::InvalidNumber("max").into());
            }
            if max <= 0.0 {
                return Err(ValidationError::NotPositive("max").into());
            }
        }
        let interval_ms = match update.interval_secs {
            Some(secs) if !secs.is_finite() => {
                return Err(ValidationError::InvalidNumber("interval").into());
            }
            Some(secs) => Some(interval_secs_to_ms(secs)),
            None => None,
        };

        if let Some(max) = update.max_limit_ma {
            if let Err(e) = sensor.calibrate(max / 1000.0, self.shunt_ohms) {
                warn!("store: sensor refused range {:.1} mA ({}), nothing changed", max, e);
                return Err(e.into());
            }
        }

        let committed = self.transaction(|s| {
            if let Some(max) = update.max_limit_ma {
                s.max_limit_ma = max;
                if s.setpoint_ma > max {
                    s.setpoint_ma = max;
                }
            }
            if let Some(ms) = interval_ms {
                s.sample_interval_ms = ms;
            }
            *s
        });
        info!(
            "store: max_limit={:.1} mA setpoint={:.1} mA interval={} ms",
            committed.max_limit_ma, committed.setpoint_ma, committed.sample_interval_ms
        );
        Ok(committed)
    }
}

fn validate_gain(name: &'static str, gain: f32) -> Result<(), ValidationError> {
    if !gain.is_finite() {
        return Err(ValidationError::InvalidNumber(name));
    }
    if gain < 0.0 {
        return Err(ValidationError::Negative(name));
    }
    Ok(())
}

/// Seconds → milliseconds, floored at the minimum cadence.
fn interval_secs_to_ms(secs: f32) -> u32 {
    let ms = (secs * 1000.0).round();
    if ms < MIN_SAMPLE_INTERVAL_MS as f32 {
        MIN_SAMPLE_INTERVAL_MS
    } else {
        ms as u32
    }
}
