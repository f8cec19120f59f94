//! Mock adapters for integration tests.
//!
//! Records every actuator write, calibration request, reply and event so
//! tests can assert on the full history without real peripherals.

use std::collections::VecDeque;

use ccsource::app::commands::{AppCommand, CommandReply, InboundCommand, Ticket};
use ccsource::app::events::AppEvent;
use ccsource::app::ports::{ActuatorPort, CommandPort, EventSink, SensorPort, TelemetryPort};
use ccsource::error::{Error, SensorError};
use ccsource::telemetry::TelemetryFrame;

// ── MockHardware ──────────────────────────────────────────────

/// Sensor + actuator with settable readings.
pub struct MockHardware {
    pub bus_voltage: f32,
    pub current_ma: f32,
    pub writes: Vec<u8>,
    /// `(max_amps, shunt_ohms)` per accepted calibration.
    pub calibrations: Vec<(f32, f32)>,
    pub refuse_calibration: bool,
    pub reads: usize,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self::reading(12.0, 0.0)
    }

    pub fn reading(bus_voltage: f32, current_ma: f32) -> Self {
        Self {
            bus_voltage,
            current_ma,
            writes: Vec::new(),
            calibrations: Vec::new(),
            refuse_calibration: false,
            reads: 0,
        }
    }

    pub fn set_reading(&mut self, bus_voltage: f32, current_ma: f32) {
        self.bus_voltage = bus_voltage;
        self.current_ma = current_ma;
    }

    pub fn last_write(&self) -> Option<u8> {
        self.writes.last().copied()
    }
}

impl Default for MockHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorPort for MockHardware {
    fn read_bus_voltage(&mut self) -> f32 {
        self.reads += 1;
        self.bus_voltage
    }

    fn read_current(&mut self) -> f32 {
        self.reads += 1;
        self.current_ma
    }

    fn calibrate(&mut self, max_amps: f32, shunt_ohms: f32) -> Result<(), SensorError> {
        if self.refuse_calibration {
            return Err(SensorError::CalibrationRejected);
        }
        self.calibrations.push((max_amps, shunt_ohms));
        Ok(())
    }
}

impl ActuatorPort for MockHardware {
    fn write_level(&mut self, code: u8) {
        self.writes.push(code);
    }
}

// ── Command + telemetry ports ─────────────────────────────────

/// In-memory command queue that records replies.
#[derive(Default)]
pub struct MockCommands {
    pub pending: VecDeque<InboundCommand>,
    pub replies: Vec<(Ticket, Result<CommandReply, Error>)>,
    next_seq: u32,
}

#[allow(dead_code)]
impl MockCommands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `command` from slot 0; returns its ticket.
    pub fn push(&mut self, command: AppCommand) -> Ticket {
        self.next_seq += 1;
        let ticket = Ticket {
            slot: 0,
            seq: self.next_seq,
        };
        self.pending.push_back(InboundCommand { ticket, command });
        ticket
    }
}

impl CommandPort for MockCommands {
    fn poll_command(&mut self) -> Option<InboundCommand> {
        self.pending.pop_front()
    }

    fn reply(&mut self, ticket: Ticket, outcome: &Result<CommandReply, Error>) {
        self.replies.push((ticket, outcome.clone()));
    }
}

/// Collects published frames; can simulate a congested transport.
pub struct MockTelemetry {
    pub frames: Vec<TelemetryFrame>,
    pub accept: bool,
}

#[allow(dead_code)]
impl MockTelemetry {
    pub fn new() -> Self {
        Self {
            frames: Vec::new(),
            accept: true,
        }
    }
}

impl TelemetryPort for MockTelemetry {
    fn publish(&mut self, frame: &TelemetryFrame) -> bool {
        if self.accept {
            self.frames.push(frame.clone());
        }
        self.accept
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
