//! Sensor drivers.

pub mod ina219;
