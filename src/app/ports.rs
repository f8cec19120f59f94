//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (sensor, DAC, event sinks, network bridge) implement
//! these traits.  The [`AppService`](super::service::AppService) consumes
//! them via generics, so the domain core never touches hardware directly.

use crate::error::{Error, SensorError};
use crate::telemetry::TelemetryFrame;

use super::commands::{CommandReply, InboundCommand, Ticket};

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port for the current/voltage sensor.
///
/// Reads are synchronous and bounded.  Implementations never fail a
/// read: whatever the device returns is handed to the domain as-is.
pub trait SensorPort {
    /// Bus voltage in volts.
    fn read_bus_voltage(&mut self) -> f32;

    /// Load current in milliamps.
    fn read_current(&mut self) -> f32;

    /// Re-range the sensor so `max_amps` is representable with the given shunt.
    fn calibrate(&mut self, max_amps: f32, shunt_ohms: f32) -> Result<(), SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port for the feedback-bias actuator.
pub trait ActuatorPort {
    /// Write an 8-bit output code.  The domain only ever passes `1..=255`.
    fn write_level(&mut self, code: u8);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic millisecond clock.
pub trait ClockPort {
    fn now_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Network bridge ports
// ───────────────────────────────────────────────────────────────

/// Outbound telemetry delivery (push stream).
pub trait TelemetryPort {
    /// Hand a frame to the transport.  Returns `false` if it was dropped.
    fn publish(&mut self, frame: &TelemetryFrame) -> bool;
}

/// Inbound commands and their replies.
pub trait CommandPort {
    /// Next pending command, if any.  Never blocks.
    fn poll_command(&mut self) -> Option<InboundCommand>;

    /// Deliver the outcome of a command back to whoever sent it.
    fn reply(&mut self, ticket: Ticket, outcome: &Result<CommandReply, Error>);
}

// ───────────────────────────────────────────────────────────────
// Scheduler delegate (decouples scheduler from the service)
// ───────────────────────────────────────────────────────────────

/// Callbacks the [`Scheduler`](crate::scheduler::Scheduler) invokes.
///
/// The scheduler owns only timing.  What a tick, a dispatch pass or a
/// telemetry publish actually does lives behind this trait, so the
/// scheduler is testable with a recording delegate.
pub trait SchedulerDelegate {
    /// Apply pending commands (bounded per call).  Returns how many ran.
    fn dispatch_commands(&mut self, now_ms: u64) -> usize;

    /// Run exactly one control tick.
    fn control_tick(&mut self, now_ms: u64);

    /// Capture and deliver one telemetry snapshot.
    fn publish_telemetry(&mut self, now_ms: u64);

    /// Current telemetry cadence (read fresh each poll).
    fn sample_interval_ms(&self) -> u32;
}
