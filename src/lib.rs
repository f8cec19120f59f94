//! Constant-current buck converter controller firmware.
//!
//! Exposes the pure-logic modules for integration testing.  All
//! ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module and falls back to simulation stubs on the host.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod control;
pub mod error;
pub mod net;
pub mod safety;
pub mod scheduler;
pub mod store;
pub mod telemetry;

pub mod adapters;
pub mod drivers;
pub mod pins;
pub mod sensors;
