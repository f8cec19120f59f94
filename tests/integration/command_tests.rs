//! Query string → command → store, end to end.

use crate::mock_hw::{MockHardware, RecordingSink};

use ccsource::app::commands::{AppCommand, CommandReply, CommandRoute};
use ccsource::app::params::Params;
use ccsource::app::service::AppService;
use ccsource::config::{ControllerConfig, Tunings};
use ccsource::error::{Error, ValidationError};

/// Run one request as the HTTP side would: route, parse, handle.
fn run(
    app: &mut AppService,
    hw: &mut MockHardware,
    path: &str,
    query: &str,
) -> Result<CommandReply, Error> {
    let route = CommandRoute::from_path(path).expect("command route");
    let cmd = AppCommand::parse(route, &Params::parse(query))?;
    let mut sink = RecordingSink::new();
    app.handle_command(cmd, hw, 0, &mut sink)
}

fn fresh() -> (AppService, MockHardware) {
    (AppService::new(ControllerConfig::default()), MockHardware::new())
}

#[test]
fn set_applies_target() {
    let (mut app, mut hw) = fresh();
    assert_eq!(run(&mut app, &mut hw, "/set", "current=120").unwrap(), CommandReply::Applied);
    assert_eq!(app.settings().setpoint_ma, 120.0);
}

#[test]
fn set_negative_target_floors_at_zero() {
    let (mut app, mut hw) = fresh();
    run(&mut app, &mut hw, "/set", "current=-40").unwrap();
    assert_eq!(app.settings().setpoint_ma, 0.0);
}

#[test]
fn setpid_replaces_all_gains() {
    let (mut app, mut hw) = fresh();
    run(&mut app, &mut hw, "/setpid", "kp=1.5&ki=0.25&kd=0").unwrap();
    assert_eq!(
        app.settings().tunings,
        Tunings { kp: 1.5, ki: 0.25, kd: 0.0 }
    );
}

#[test]
fn setadvanced_interval_only_skips_calibration() {
    let (mut app, mut hw) = fresh();
    run(&mut app, &mut hw, "/setadvanced", "interval=0.5").unwrap();
    assert_eq!(app.settings().sample_interval_ms, 500);
    assert_eq!(app.settings().max_limit_ma, 500.0);
    assert!(hw.calibrations.is_empty());
}

#[test]
fn data_returns_snapshot() {
    let (mut app, mut hw) = fresh();
    let reply = run(&mut app, &mut hw, "/data", "").unwrap();
    assert!(matches!(reply, CommandReply::Snapshot(_)));
}

#[test]
fn extra_params_are_ignored() {
    let (mut app, mut hw) = fresh();
    run(&mut app, &mut hw, "/set", "foo=1&current=50&bar").unwrap();
    assert_eq!(app.settings().setpoint_ma, 50.0);
}

// ── Rejections leave settings bit-identical ───────────────────

fn assert_rejected(path: &str, query: &str, expected: ValidationError) {
    let (mut app, mut hw) = fresh();
    let before = app.settings();
    let err = run(&mut app, &mut hw, path, query).unwrap_err();
    assert_eq!(err, Error::Validation(expected), "{path}?{query}");
    assert_eq!(err.status_code(), 400);
    assert_eq!(app.settings(), before, "{path}?{query} changed settings");
    assert!(hw.calibrations.is_empty());
}

#[test]
fn set_without_current_is_rejected() {
    assert_rejected("/set", "", ValidationError::MissingParam("current"));
    assert_rejected("/set", "value=3", ValidationError::MissingParam("current"));
}

#[test]
fn set_with_garbage_is_rejected() {
    assert_rejected("/set", "current=abc", ValidationError::InvalidNumber("current"));
    assert_rejected("/set", "current=inf", ValidationError::InvalidNumber("current"));
    assert_rejected("/set", "current=NaN", ValidationError::InvalidNumber("current"));
}

#[test]
fn setpid_needs_all_three_gains() {
    assert_rejected("/setpid", "kp=1&ki=2", ValidationError::MissingParam("kd"));
    assert_rejected("/setpid", "ki=2&kd=3", ValidationError::MissingParam("kp"));
}

#[test]
fn setpid_rejects_negative_gain() {
    assert_rejected("/setpid", "kp=1&ki=-2&kd=3", ValidationError::Negative("ki"));
}

#[test]
fn setadvanced_rejections() {
    assert_rejected("/setadvanced", "", ValidationError::NothingToApply);
    assert_rejected("/setadvanced", "max=0", ValidationError::NotPositive("max"));
    assert_rejected("/setadvanced", "max=-5&interval=1", ValidationError::NotPositive("max"));
    assert_rejected("/setadvanced", "max=200&interval=x", ValidationError::InvalidNumber("interval"));
}

#[test]
fn unknown_path_is_not_a_command() {
    assert_eq!(CommandRoute::from_path("/reboot"), None);
    assert_eq!(CommandRoute::from_path("/events"), None);
}
