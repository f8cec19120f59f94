//! Application service, the hexagonal core.
//!
//! [`AppService`] owns the settings store, the control loop and the
//! telemetry publisher.  All I/O flows through port traits injected at
//! call sites, making the entire service testable with mock adapters.
//!
//! ```text
//!  SensorPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                 │          AppService          │
//! ActuatorPort ◀──│ ConfigStore · Control · Telem│ ──▶ TelemetryPort
//!                 └──────────────────────────────┘
//! ```

use log::{info, warn};

use crate::config::{ControllerConfig, Settings};
use crate::control::{ControlLoop, LoopMode, SensorSample, TickReport};
use crate::error::Error;
use crate::store::ConfigStore;
use crate::telemetry::{TelemetryFrame, TelemetryPublisher};

use super::commands::{AppCommand, CommandReply};
use super::events::AppEvent;
use super::ports::{ActuatorPort, EventSink, SensorPort, TelemetryPort};

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    config: ControllerConfig,
    store: ConfigStore,
    control: ControlLoop,
    publisher: TelemetryPublisher,
    started: bool,
}

impl AppService {
    /// Construct the service with compiled default settings.
    ///
    /// Does **not** touch the actuator; call [`start`](Self::start) next.
    pub fn new(config: ControllerConfig) -> Self {
        Self::with_settings(config, Settings::default())
    }

    pub fn with_settings(config: ControllerConfig, settings: Settings) -> Self {
        let store = ConfigStore::with_settings(settings, config.shunt_ohms);
        let control = ControlLoop::new(&config, &settings);
        Self {
            config,
            store,
            control,
            publisher: TelemetryPublisher::new(),
            started: false,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Park the actuator at the safety code and arm the loop.
    pub fn start(&mut self, hw: &mut impl ActuatorPort, sink: &mut impl EventSink) {
        let initial_output = self.control.safety_code();
        hw.write_level(initial_output);
        self.started = true;
        sink.emit(&AppEvent::Started { initial_output });
        info!(
            "AppService started (safety code {}, threshold {:.1} V)",
            initial_output, self.config.safety_voltage_threshold
        );
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control cycle: fresh sample → interlock → PID → actuator.
    ///
    /// The `hw` parameter satisfies **both** [`SensorPort`] and
    /// [`ActuatorPort`], which avoids a double mutable borrow while
    /// keeping the port boundary explicit.
    pub fn tick(
        &mut self,
        hw: &mut (impl SensorPort + ActuatorPort),
        now_ms: u64,
        sink: &mut impl EventSink,
    ) -> TickReport {
        let settings = self.store.snapshot();
        let sample = SensorSample::read(hw, now_ms);
        let report = self.control.tick(&settings, sample, hw);

        if let Some(kind) = report.anomaly {
            sink.emit(&AppEvent::SensorAnomaly { kind, sample });
        }
        if report.mode_changed() {
            sink.emit(&AppEvent::ModeChanged {
                from: report.previous_mode,
                to: report.mode,
            });
        }
        report
    }

    // ── Command handling ──────────────────────────────────────

    /// Process one validated command.  Runs between ticks, never during one.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        sensor: &mut impl SensorPort,
        now_ms: u64,
        sink: &mut impl EventSink,
    ) -> Result<CommandReply, Error> {
        if cmd == AppCommand::ReadSnapshot {
            return self
                .publisher
                .capture_frame(&self.store, sensor, now_ms)
                .map(CommandReply::Snapshot)
                .ok_or(Error::Encoding("telemetry snapshot"));
        }

        match cmd.apply(&self.store, sensor) {
            Ok(()) => {
                let settings = self.store.snapshot();
                info!("command applied: {:?}", cmd);
                sink.emit(&AppEvent::ConfigChanged(settings));
                Ok(CommandReply::Applied)
            }
            Err(e) => {
                warn!("command rejected: {:?} ({})", cmd, e);
                sink.emit(&AppEvent::CommandRejected(e));
                Err(e)
            }
        }
    }

    // ── Telemetry ─────────────────────────────────────────────

    /// Capture one snapshot and push it to `port`.
    pub fn publish_telemetry(
        &mut self,
        sensor: &mut impl SensorPort,
        port: &mut impl TelemetryPort,
        now_ms: u64,
        sink: &mut impl EventSink,
    ) -> Option<TelemetryFrame> {
        let snapshot = self.publisher.capture(&self.store, sensor, now_ms);
        sink.emit(&AppEvent::Telemetry(snapshot));
        let frame = self.publisher.publish_snapshot(&snapshot, port, now_ms);
        if frame.is_none() && self.publisher.dropped_count() % 100 == 1 {
            warn!(
                "telemetry: {} frames dropped so far",
                self.publisher.dropped_count()
            );
        }
        frame
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn settings(&self) -> Settings {
        self.store.snapshot()
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn mode(&self) -> LoopMode {
        self.control.mode()
    }

    pub fn control(&self) -> &ControlLoop {
        &self.control
    }

    /// Total control ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.control.tick_count()
    }

    pub fn publisher(&self) -> &TelemetryPublisher {
        &self.publisher
    }
}
