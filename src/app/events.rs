//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them.

use crate::config::Settings;
use crate::control::{LoopMode, SensorAnomaly, SensorSample};
use crate::error::Error;
use crate::telemetry::TelemetrySnapshot;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The service is armed; carries the code written before the first tick.
    Started { initial_output: u8 },

    /// The loop switched between normal regulation and the safety override.
    ModeChanged { from: LoopMode, to: LoopMode },

    /// A reading was implausible but was used anyway.
    SensorAnomaly { kind: SensorAnomaly, sample: SensorSample },

    /// Settings after a committed mutation.
    ConfigChanged(Settings),

    /// A command reached the service and failed.
    CommandRejected(Error),

    /// Periodic telemetry snapshot.
    Telemetry(TelemetrySnapshot),
}
