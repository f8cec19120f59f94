//! Scheduler driving a full Runtime over mock adapters.

use crate::mock_hw::{MockCommands, MockHardware, MockTelemetry, RecordingSink};

use ccsource::app::commands::{AppCommand, CommandReply};
use ccsource::app::runtime::{MAX_COMMANDS_PER_POLL, Runtime};
use ccsource::app::service::AppService;
use ccsource::config::{ControllerConfig, Tunings};
use ccsource::error::{Error, ValidationError};
use ccsource::scheduler::Scheduler;
use ccsource::store::AdvancedUpdate;

type MockRuntime = Runtime<MockHardware, MockCommands, MockTelemetry, RecordingSink>;

fn make_runtime() -> MockRuntime {
    let mut rt = Runtime::new(
        AppService::new(ControllerConfig::default()),
        MockHardware::reading(12.0, 95.0),
        MockCommands::new(),
        MockTelemetry::new(),
        RecordingSink::new(),
    );
    rt.start();
    rt
}

#[test]
fn command_lands_before_the_tick_in_the_same_poll() {
    let mut rt = make_runtime();
    let mut sched = Scheduler::new(10);
    // Setpoint equal to the measurement: zero error, floor output.
    rt.commands.push(AppCommand::SetTarget { current_ma: 95.0 });

    let out = sched.poll(0, &mut rt);
    assert_eq!(out.commands, 1);
    assert!(out.ticked);
    assert_eq!(rt.hw.writes, vec![97, 1]);
}

#[test]
fn replies_carry_their_tickets() {
    let mut rt = make_runtime();
    let mut sched = Scheduler::new(10);
    let ok = rt.commands.push(AppCommand::SetTarget { current_ma: 50.0 });
    let bad = rt.commands.push(AppCommand::SetTunings(Tunings {
        kp: -1.0,
        ki: 0.0,
        kd: 0.0,
    }));
    let read = rt.commands.push(AppCommand::ReadSnapshot);

    sched.poll(0, &mut rt);

    let replies = &rt.commands.replies;
    assert_eq!(replies.len(), 3);
    assert_eq!(replies[0], (ok, Ok(CommandReply::Applied)));
    assert_eq!(
        replies[1],
        (bad, Err(Error::Validation(ValidationError::Negative("kp"))))
    );
    assert_eq!(replies[2].0, read);
    assert!(matches!(replies[2].1, Ok(CommandReply::Snapshot(_))));
}

#[test]
fn command_flood_is_bounded_per_poll() {
    let mut rt = make_runtime();
    let mut sched = Scheduler::new(10);
    for i in 0..MAX_COMMANDS_PER_POLL + 2 {
        rt.commands.push(AppCommand::SetTarget { current_ma: i as f32 });
    }
    assert_eq!(sched.poll(0, &mut rt).commands, MAX_COMMANDS_PER_POLL);
    assert_eq!(sched.poll(1, &mut rt).commands, 2);
    assert!(rt.commands.pending.is_empty());
}

#[test]
fn every_tick_writes_once() {
    let mut rt = make_runtime();
    let mut sched = Scheduler::new(10);
    for now in 0..100 {
        sched.poll(now, &mut rt);
    }
    assert_eq!(sched.tick_count(), 10);
    assert_eq!(rt.app.tick_count(), 10);
    // Boot write plus one per tick.
    assert_eq!(rt.hw.writes.len(), 11);
}

#[test]
fn telemetry_cadence_follows_setadvanced() {
    let mut rt = make_runtime();
    let mut sched = Scheduler::new(10);
    for now in (0..=1300).step_by(10) {
        if now == 1010 {
            rt.commands.push(AppCommand::SetAdvanced(AdvancedUpdate {
                max_limit_ma: None,
                interval_secs: Some(0.2),
            }));
        }
        sched.poll(now, &mut rt);
    }
    let ids: Vec<u64> = rt.telemetry.frames.iter().map(|f| f.id).collect();
    assert_eq!(ids, vec![1000, 1200]);
    assert_eq!(rt.app.publisher().published_count(), 2);
}

#[test]
fn dropped_frames_do_not_stall_the_loop() {
    let mut rt = make_runtime();
    rt.telemetry.accept = false;
    let mut sched = Scheduler::new(10);
    for now in (0..=3000).step_by(10) {
        sched.poll(now, &mut rt);
    }
    assert_eq!(sched.publish_count(), 3);
    assert_eq!(rt.app.publisher().dropped_count(), 3);
    assert_eq!(rt.app.tick_count(), 301);
}

#[test]
fn safety_override_through_the_scheduler() {
    let mut rt = make_runtime();
    let mut sched = Scheduler::new(10);
    sched.poll(0, &mut rt);
    rt.hw.set_reading(30.0, 20.0);
    sched.poll(10, &mut rt);
    assert_eq!(rt.hw.last_write(), Some(97));
    rt.hw.set_reading(12.0, 95.0);
    sched.poll(20, &mut rt);
    assert_ne!(rt.hw.last_write(), Some(97));
}
