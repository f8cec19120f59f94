//! Inbound commands to the application service.
//!
//! Parsing and application are plain functions over
//! [`Params`](super::params::Params) and [`ConfigStore`], so the whole
//! command surface is testable without a network stack.  A command that
//! fails validation never touches the store.

use crate::config::Tunings;
use crate::error::{Error, ValidationError};
use crate::store::{AdvancedUpdate, ConfigStore};
use crate::telemetry::TelemetryFrame;

use super::params::Params;
use super::ports::SensorPort;

/// Endpoints that map onto a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandRoute {
    /// `/data`
    ReadSnapshot,
    /// `/set`
    SetTarget,
    /// `/setpid`
    SetTunings,
    /// `/setadvanced`
    SetAdvanced,
}

impl CommandRoute {
    pub fn from_path(path: &str) -> Option<Self> {
        match path {
            "/data" => Some(Self::ReadSnapshot),
            "/set" => Some(Self::SetTarget),
            "/setpid" => Some(Self::SetTunings),
            "/setadvanced" => Some(Self::SetAdvanced),
            _ => None,
        }
    }
}

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppCommand {
    /// Pull one telemetry snapshot.
    ReadSnapshot,

    /// New target current (mA), clamped by the store.
    SetTarget { current_ma: f32 },

    /// Replace all three PID gains.
    SetTunings(Tunings),

    /// Change the ceiling and/or telemetry cadence as one transaction.
    SetAdvanced(AdvancedUpdate),
}

impl AppCommand {
    /// Validate parameters for `route`.
    pub fn parse(route: CommandRoute, params: &Params<'_>) -> Result<Self, ValidationError> {
        match route {
            CommandRoute::ReadSnapshot => Ok(Self::ReadSnapshot),
            CommandRoute::SetTarget => Ok(Self::SetTarget {
                current_ma: params.number("current")?,
            }),
            CommandRoute::SetTunings => {
                let tunings = Tunings {
                    kp: params.number("kp")?,
                    ki: params.number("ki")?,
                    kd: params.number("kd")?,
                };
                for (name, gain) in [("kp", tunings.kp), ("ki", tunings.ki), ("kd", tunings.kd)] {
                    if gain < 0.0 {
                        return Err(ValidationError::Negative(name));
                    }
                }
                Ok(Self::SetTunings(tunings))
            }
            CommandRoute::SetAdvanced => {
                let update = AdvancedUpdate {
                    max_limit_ma: params.optional_number("max")?,
                    interval_secs: params.optional_number("interval")?,
                };
                if let Some(max) = update.max_limit_ma {
                    if max <= 0.0 {
                        return Err(ValidationError::NotPositive("max"));
                    }
                }
                if update.max_limit_ma.is_none() && update.interval_secs.is_none() {
                    return Err(ValidationError::NothingToApply);
                }
                Ok(Self::SetAdvanced(update))
            }
        }
    }

    /// Apply a settings mutation.  `ReadSnapshot` is a no-op here; the
    /// service answers it from the telemetry publisher.
    pub fn apply(&self, store: &ConfigStore, sensor: &mut impl SensorPort) -> Result<(), Error> {
        match *self {
            Self::ReadSnapshot => Ok(()),
            Self::SetTarget { current_ma } => {
                store.set_target(current_ma);
                Ok(())
            }
            Self::SetTunings(tunings) => store.set_tunings(tunings).map_err(Error::from),
            Self::SetAdvanced(update) => store.set_advanced(update, sensor).map(|_| ()),
        }
    }
}

/// Identifies the requester so a reply can be routed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    /// Connection slot on the network side.
    pub slot: u8,
    /// Per-slot request sequence; stale replies are discarded.
    pub seq: u32,
}

/// A validated command plus its return address.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundCommand {
    pub ticket: Ticket,
    pub command: AppCommand,
}

/// Successful command outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandReply {
    /// Mutation committed.
    Applied,
    /// Pulled snapshot.
    Snapshot(TelemetryFrame),
}
