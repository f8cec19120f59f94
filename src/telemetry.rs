//! Telemetry snapshots and their delivery.
//!
//! A snapshot is one [`ConfigStore::snapshot`] plus one fresh sensor
//! read, taken back to back so the settings half can never be torn.
//! The same JSON document serves both delivery modes:
//!
//! - **push**: [`TelemetryPublisher::publish_snapshot`] hands a frame to a
//!   [`TelemetryPort`] on every sample interval (SSE stream)
//! - **pull**: [`TelemetryPublisher::capture`] answers a read-snapshot
//!   command (`/data`)
//!
//! Wire schema:
//!
//! ```json
//! {"voltage":12.1,"current":99.8,"setpoint":100.0,"kp":20.0,"ki":5.0,
//!  "kd":1.0,"max_limit":500.0,"sse_interval":1.0}
//! ```

use log::{debug, warn};
use serde::Serialize;

use crate::app::ports::{SensorPort, TelemetryPort};
use crate::config::Settings;
use crate::control::SensorSample;
use crate::store::ConfigStore;

/// Upper bound on one encoded snapshot.
pub const JSON_CAPACITY: usize = 256;

/// One consistent reading of sensor state and configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    /// Bus voltage (V).
    pub voltage: f32,
    /// Measured current (mA).
    pub current: f32,
    /// Target current (mA).
    pub setpoint: f32,
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    /// Current ceiling (mA).
    pub max_limit: f32,
    /// Push cadence in seconds, the unit `/setadvanced?interval=` takes.
    pub sse_interval: f32,
}

impl TelemetrySnapshot {
    pub fn from_parts(settings: &Settings, sample: &SensorSample) -> Self {
        Self {
            voltage: sample.bus_voltage,
            current: sample.current_ma,
            setpoint: settings.setpoint_ma,
            kp: settings.tunings.kp,
            ki: settings.tunings.ki,
            kd: settings.tunings.kd,
            max_limit: settings.max_limit_ma,
            sse_interval: settings.sample_interval_ms as f32 / 1000.0,
        }
    }

    /// Serialize into a fixed-capacity buffer.  `None` if it does not fit.
    pub fn to_json(&self) -> Option<heapless::String<JSON_CAPACITY>> {
        let encoded = serde_json::to_string(self).ok()?;
        let mut out = heapless::String::new();
        out.push_str(&encoded).ok()?;
        Some(out)
    }
}

/// Encoded snapshot ready for a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryFrame {
    /// Delivery id: capture time in ms since boot.
    pub id: u64,
    pub json: heapless::String<JSON_CAPACITY>,
}

/// Captures snapshots and tracks delivery health.
pub struct TelemetryPublisher {
    published: u32,
    /// Frames the transport refused (backpressure).
    dropped: u32,
    /// Snapshots that failed to encode.
    encode_failures: u32,
    last_frame_id: Option<u64>,
}

impl Default for TelemetryPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryPublisher {
    pub fn new() -> Self {
        Self {
            published: 0,
            dropped: 0,
            encode_failures: 0,
            last_frame_id: None,
        }
    }

    /// Take one consistent snapshot: settings under the store lock, then
    /// one fresh sensor read.
    pub fn capture(
        &self,
        store: &ConfigStore,
        sensor: &mut impl SensorPort,
        now_ms: u64,
    ) -> TelemetrySnapshot {
        let settings = store.snapshot();
        let sample = SensorSample::read(sensor, now_ms);
        TelemetrySnapshot::from_parts(&settings, &sample)
    }

    /// Capture and encode, for the pull path.
    pub fn capture_frame(
        &mut self,
        store: &ConfigStore,
        sensor: &mut impl SensorPort,
        now_ms: u64,
    ) -> Option<TelemetryFrame> {
        let snapshot = self.capture(store, sensor, now_ms);
        self.encode(&snapshot, now_ms)
    }

    /// Encode an already captured snapshot and hand it to `port`.
    pub fn publish_snapshot(
        &mut self,
        snapshot: &TelemetrySnapshot,
        port: &mut impl TelemetryPort,
        now_ms: u64,
    ) -> Option<TelemetryFrame> {
        let frame = self.encode(snapshot, now_ms)?;
        if port.publish(&frame) {
            self.published = self.published.wrapping_add(1);
            self.last_frame_id = Some(frame.id);
            debug!("telemetry: frame {} ({} bytes)", frame.id, frame.json.len());
            Some(frame)
        } else {
            self.dropped = self.dropped.wrapping_add(1);
            None
        }
    }

    fn encode(&mut self, snapshot: &TelemetrySnapshot, now_ms: u64) -> Option<TelemetryFrame> {
        if let Some(json) = snapshot.to_json() {
            Some(TelemetryFrame { id: now_ms, json })
        } else {
            self.encode_failures = self.encode_failures.wrapping_add(1);
            warn!("telemetry: snapshot exceeds {} bytes, skipped", JSON_CAPACITY);
            None
        }
    }

    pub fn published_count(&self) -> u32 {
        self.published
    }

    pub fn dropped_count(&self) -> u32 {
        self.dropped
    }

    pub fn encode_failures(&self) -> u32 {
        self.encode_failures
    }

    pub fn last_frame_id(&self) -> Option<u64> {
        self.last_frame_id
    }
}
