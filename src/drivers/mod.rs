//! Actuator drivers and platform helpers.

pub mod dac;
pub mod task_pin;
pub mod watchdog;
