//! Integration tests for the AppService → ControlLoop → actuator pipeline.

use crate::mock_hw::{MockHardware, MockTelemetry, RecordingSink};

use ccsource::app::commands::{AppCommand, CommandReply};
use ccsource::app::events::AppEvent;
use ccsource::app::service::AppService;
use ccsource::config::{ControllerConfig, Tunings};
use ccsource::control::{LoopMode, SensorAnomaly};
use ccsource::error::{Error, SensorError};
use ccsource::store::AdvancedUpdate;

fn make_app() -> (AppService, MockHardware, RecordingSink) {
    let mut app = AppService::new(ControllerConfig::default());
    let mut hw = MockHardware::new();
    let mut sink = RecordingSink::new();
    app.start(&mut hw, &mut sink);
    (app, hw, sink)
}

// ── Boot ──────────────────────────────────────────────────────

#[test]
fn start_parks_output_at_safety_code() {
    let (app, hw, sink) = make_app();
    assert_eq!(hw.writes, vec![97]);
    assert!(app.is_started());
    assert_eq!(sink.events[0], AppEvent::Started { initial_output: 97 });
    assert_eq!(app.control().last_output(), 97);
}

// ── Normal regulation ─────────────────────────────────────────

#[test]
fn normal_tick_steps_pid() {
    let (mut app, mut hw, mut sink) = make_app();
    hw.set_reading(12.0, 95.0);
    let report = app.tick(&mut hw, 10, &mut sink);
    // P = 20 * 5, I = 5 * 5, first step has no derivative.
    assert_eq!(report.output, 125);
    assert_eq!(report.mode, LoopMode::Normal);
    assert_eq!(hw.last_write(), Some(125));
}

#[test]
fn tuning_change_applies_on_next_tick_without_reset() {
    let (mut app, mut hw, mut sink) = make_app();
    hw.set_reading(12.0, 95.0);
    app.tick(&mut hw, 10, &mut sink);

    app.handle_command(
        AppCommand::SetTunings(Tunings { kp: 10.0, ki: 2.0, kd: 0.5 }),
        &mut hw,
        20,
        &mut sink,
    )
    .unwrap();

    // P = 10 * 5, I = 25 (kept) + 2 * 5, measurement unchanged.
    let report = app.tick(&mut hw, 20, &mut sink);
    assert_eq!(report.output, 85);
}

#[test]
fn output_never_below_one() {
    let (mut app, mut hw, mut sink) = make_app();
    hw.set_reading(12.0, 400.0);
    let report = app.tick(&mut hw, 10, &mut sink);
    assert_eq!(report.output, 1);
}

#[test]
fn output_saturates_at_255() {
    let (mut app, mut hw, mut sink) = make_app();
    hw.set_reading(12.0, 0.0);
    let report = app.tick(&mut hw, 10, &mut sink);
    assert_eq!(report.output, 255);
}

// ── Safety interlock ──────────────────────────────────────────

#[test]
fn over_voltage_with_unmet_setpoint_overrides() {
    let (mut app, mut hw, mut sink) = make_app();
    hw.set_reading(26.0, 10.0);
    let report = app.tick(&mut hw, 10, &mut sink);
    assert_eq!(report.output, 97);
    assert_eq!(app.mode(), LoopMode::SafetyOverride);
    assert_eq!(
        sink.count(|e| matches!(
            e,
            AppEvent::ModeChanged { from: LoopMode::Normal, to: LoopMode::SafetyOverride }
        )),
        1
    );
    // PID was not stepped.
    assert_eq!(app.control().pid().integral(), 0.0);
}

#[test]
fn threshold_is_inclusive() {
    let (mut app, mut hw, mut sink) = make_app();
    hw.set_reading(25.0, 10.0);
    assert_eq!(app.tick(&mut hw, 10, &mut sink).mode, LoopMode::SafetyOverride);
}

#[test]
fn high_voltage_with_setpoint_met_stays_normal() {
    let (mut app, mut hw, mut sink) = make_app();
    hw.set_reading(30.0, 100.0);
    let report = app.tick(&mut hw, 10, &mut sink);
    assert_eq!(report.mode, LoopMode::Normal);
}

#[test]
fn override_releases_without_hysteresis_and_pid_resumes() {
    let (mut app, mut hw, mut sink) = make_app();
    hw.set_reading(12.0, 95.0);
    app.tick(&mut hw, 10, &mut sink);
    let integral_before = app.control().pid().integral();

    hw.set_reading(26.0, 10.0);
    app.tick(&mut hw, 20, &mut sink);
    app.tick(&mut hw, 30, &mut sink);
    assert_eq!(app.control().pid().integral(), integral_before);

    hw.set_reading(24.9, 95.0);
    let report = app.tick(&mut hw, 40, &mut sink);
    assert_eq!(report.mode, LoopMode::Normal);
    assert!(report.mode_changed());
    assert_eq!(app.control().safety_trips(), 1);
}

// ── Sensor anomalies ──────────────────────────────────────────

#[test]
fn negative_current_is_flagged_but_used() {
    let (mut app, mut hw, mut sink) = make_app();
    hw.set_reading(12.0, -5.0);
    let report = app.tick(&mut hw, 10, &mut sink);
    assert_eq!(report.anomaly, Some(SensorAnomaly::NegativeCurrent));
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::SensorAnomaly { .. })),
        1
    );
    assert_eq!(app.tick_count(), 1);
}

#[test]
fn nan_reading_drives_output_to_floor() {
    let (mut app, mut hw, mut sink) = make_app();
    hw.set_reading(12.0, f32::NAN);
    let report = app.tick(&mut hw, 10, &mut sink);
    assert_eq!(report.anomaly, Some(SensorAnomaly::NonFinite));
    assert!((1..=255).contains(&report.output));
}

// ── Commands ──────────────────────────────────────────────────

#[test]
fn set_target_clamps_to_max_limit() {
    let (mut app, mut hw, mut sink) = make_app();
    let reply = app
        .handle_command(AppCommand::SetTarget { current_ma: 800.0 }, &mut hw, 0, &mut sink)
        .unwrap();
    assert_eq!(reply, CommandReply::Applied);
    assert_eq!(app.settings().setpoint_ma, 500.0);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::ConfigChanged(_))), 1);
}

#[test]
fn set_advanced_lowers_max_and_clamps_setpoint_with_recalibration() {
    let (mut app, mut hw, mut sink) = make_app();
    let update = AdvancedUpdate {
        max_limit_ma: Some(50.0),
        interval_secs: Some(2.0),
    };
    app.handle_command(AppCommand::SetAdvanced(update), &mut hw, 0, &mut sink)
        .unwrap();
    let s = app.settings();
    assert_eq!(s.max_limit_ma, 50.0);
    assert_eq!(s.setpoint_ma, 50.0);
    assert_eq!(s.sample_interval_ms, 2000);
    assert_eq!(hw.calibrations, vec![(0.05, 0.1)]);
}

#[test]
fn refused_calibration_changes_nothing() {
    let (mut app, mut hw, mut sink) = make_app();
    hw.refuse_calibration = true;
    let before = app.settings();
    let err = app
        .handle_command(
            AppCommand::SetAdvanced(AdvancedUpdate {
                max_limit_ma: Some(50.0),
                interval_secs: Some(5.0),
            }),
            &mut hw,
            0,
            &mut sink,
        )
        .unwrap_err();
    assert_eq!(err, Error::Sensor(SensorError::CalibrationRejected));
    assert_eq!(err.status_code(), 500);
    assert_eq!(app.settings(), before);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::CommandRejected(_))), 1);
}

#[test]
fn interval_below_floor_is_clamped() {
    let (mut app, mut hw, mut sink) = make_app();
    app.handle_command(
        AppCommand::SetAdvanced(AdvancedUpdate {
            max_limit_ma: None,
            interval_secs: Some(0.01),
        }),
        &mut hw,
        0,
        &mut sink,
    )
    .unwrap();
    assert_eq!(app.settings().sample_interval_ms, 100);
    assert!(hw.calibrations.is_empty());
}

// ── Telemetry ─────────────────────────────────────────────────

#[test]
fn read_snapshot_returns_current_state_as_json() {
    let (mut app, mut hw, mut sink) = make_app();
    hw.set_reading(12.5, 42.0);
    let reply = app
        .handle_command(AppCommand::ReadSnapshot, &mut hw, 1234, &mut sink)
        .unwrap();
    let frame = match reply {
        CommandReply::Snapshot(frame) => frame,
        other => panic!("expected a snapshot, got {other:?}"),
    };
    assert_eq!(frame.id, 1234);
    let v: serde_json::Value = serde_json::from_str(&frame.json).unwrap();
    assert_eq!(v["voltage"], 12.5);
    assert_eq!(v["current"], 42.0);
    assert_eq!(v["setpoint"], 100.0);
    assert_eq!(v["kp"], 20.0);
    assert_eq!(v["max_limit"], 500.0);
    assert_eq!(v["sse_interval"], 1.0);
}

#[test]
fn publish_takes_fresh_reading_and_delivers_frame() {
    let (mut app, mut hw, mut sink) = make_app();
    let mut port = MockTelemetry::new();
    hw.set_reading(11.0, 90.0);
    let reads_before = hw.reads;
    let frame = app
        .publish_telemetry(&mut hw, &mut port, 1000, &mut sink)
        .unwrap();
    assert_eq!(hw.reads, reads_before + 2);
    assert_eq!(port.frames, vec![frame]);
    assert_eq!(app.publisher().published_count(), 1);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::Telemetry(_))), 1);
}

#[test]
fn congested_transport_counts_drop() {
    let (mut app, mut hw, mut sink) = make_app();
    let mut port = MockTelemetry::new();
    port.accept = false;
    assert!(app.publish_telemetry(&mut hw, &mut port, 1000, &mut sink).is_none());
    assert_eq!(app.publisher().dropped_count(), 1);
}
