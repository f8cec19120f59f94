//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (UART in production).

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => {
                debug!(
                    "TELEM | V={:.3} I={:.1}mA | sp={:.1}mA max={:.0}mA | \
                     kp={} ki={} kd={} | every {:.1}s",
                    t.voltage, t.current, t.setpoint, t.max_limit, t.kp, t.ki, t.kd, t.sse_interval,
                );
            }
            AppEvent::ModeChanged { from, to } => {
                info!("MODE  | {:?} -> {:?}", from, to);
            }
            AppEvent::SensorAnomaly { kind, sample } => {
                warn!(
                    "SENSE | {:?}: V={} I={} @{}ms",
                    kind, sample.bus_voltage, sample.current_ma, sample.timestamp_ms
                );
            }
            AppEvent::ConfigChanged(s) => {
                info!(
                    "CONF  | sp={:.1}mA max={:.0}mA kp={} ki={} kd={} interval={}ms",
                    s.setpoint_ma,
                    s.max_limit_ma,
                    s.tunings.kp,
                    s.tunings.ki,
                    s.tunings.kd,
                    s.sample_interval_ms
                );
            }
            AppEvent::CommandRejected(e) => {
                warn!("CMD   | rejected: {}", e);
            }
            AppEvent::Started { initial_output } => {
                info!("START | output parked at code {}", initial_output);
            }
        }
    }
}
