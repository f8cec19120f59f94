//! Inter-task channels between the network I/O thread and the control loop.
//!
//! All queues are static `embassy-sync` primitives, so neither side
//! allocates or blocks on the other.
//!
//! ```text
//! ┌──────────────┐ InboundCommand ┌──────────────┐
//! │   I/O Task   │───────────────▶│ Control Loop │
//! │   (async)    │◀───────────────│    (sync)    │
//! └──────────────┘  ReplyMsg/slot └──────────────┘
//!        ▲                                │
//!        └──────── TelemetryFrame ◀───────┘
//!                 (pub/sub, one subscriber per SSE client)
//! ```

use core::fmt::Write;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::pubsub::{PubSubChannel, Subscriber};
use embassy_sync::signal::Signal;
use log::warn;

use crate::app::commands::{CommandReply, InboundCommand, Ticket};
use crate::app::ports::{CommandPort, TelemetryPort};
use crate::error::Error;
use crate::telemetry::{JSON_CAPACITY, TelemetryFrame};

use super::MAX_CONNECTIONS;
use super::http::{CONTENT_JSON, CONTENT_TEXT};

/// Pending commands the control loop has not picked up yet.
const COMMAND_DEPTH: usize = 8;

/// Frames buffered per subscriber before the oldest is overwritten.
const TELEMETRY_DEPTH: usize = 4;

/// Inbound command queue: I/O task → control loop.
pub static COMMAND_CHANNEL: Channel<CriticalSectionRawMutex, InboundCommand, COMMAND_DEPTH> =
    Channel::new();

/// One reply mailbox per connection slot: control loop → I/O task.
pub static REPLY_SIGNALS: [Signal<CriticalSectionRawMutex, ReplyMsg>; MAX_CONNECTIONS] =
    [const { Signal::new() }; MAX_CONNECTIONS];

/// Telemetry fan-out: control loop → every open event stream.
pub static TELEMETRY_BUS: PubSubChannel<
    CriticalSectionRawMutex,
    TelemetryFrame,
    TELEMETRY_DEPTH,
    MAX_CONNECTIONS,
    1,
> = PubSubChannel::new();

pub type TelemetrySubscriber = Subscriber<
    'static,
    CriticalSectionRawMutex,
    TelemetryFrame,
    TELEMETRY_DEPTH,
    MAX_CONNECTIONS,
    1,
>;

/// A command outcome rendered for the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyMsg {
    /// Sequence of the request this answers.
    pub seq: u32,
    pub status: u16,
    pub content_type: &'static str,
    pub body: heapless::String<JSON_CAPACITY>,
}

impl ReplyMsg {
    pub fn from_outcome(seq: u32, outcome: &Result<CommandReply, Error>) -> Self {
        let mut body = heapless::String::new();
        let (status, content_type) = match outcome {
            Ok(CommandReply::Applied) => {
                let _ = body.push_str("OK");
                (200, CONTENT_TEXT)
            }
            Ok(CommandReply::Snapshot(frame)) => {
                body.clone_from(&frame.json);
                (200, CONTENT_JSON)
            }
            Err(e) => {
                let _ = write!(body, "{}", e);
                (e.status_code(), CONTENT_TEXT)
            }
        };
        Self {
            seq,
            status,
            content_type,
            body,
        }
    }
}

/// Control-loop side of the channels.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChannelBridge;

impl ChannelBridge {
    pub fn new() -> Self {
        Self
    }
}

impl CommandPort for ChannelBridge {
    fn poll_command(&mut self) -> Option<InboundCommand> {
        COMMAND_CHANNEL.try_receive().ok()
    }

    fn reply(&mut self, ticket: Ticket, outcome: &Result<CommandReply, Error>) {
        match REPLY_SIGNALS.get(usize::from(ticket.slot)) {
            Some(signal) => signal.signal(ReplyMsg::from_outcome(ticket.seq, outcome)),
            None => warn!("reply for unknown slot {}", ticket.slot),
        }
    }
}

impl TelemetryPort for ChannelBridge {
    /// `false` when a slow stream had to lose its oldest frame.
    fn publish(&mut self, frame: &TelemetryFrame) -> bool {
        let publisher = TELEMETRY_BUS.immediate_publisher();
        match publisher.try_publish(frame.clone()) {
            Ok(()) => true,
            Err(frame) => {
                publisher.publish_immediate(frame);
                false
            }
        }
    }
}
