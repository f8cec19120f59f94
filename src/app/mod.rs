//! Application core: pure domain logic, zero I/O.
//!
//! This module contains the business rules for the current regulator:
//! command validation, the control/telemetry orchestration in
//! [`service`], and the scheduler glue in [`runtime`].  All interaction
//! with hardware happens through **port traits** defined in [`ports`],
//! keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod params;
pub mod ports;
pub mod runtime;
pub mod service;
