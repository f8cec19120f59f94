//! Scheduler delegate that drives the [`AppService`].
//!
//! Bundles the service with every adapter it needs so the
//! [`Scheduler`](crate::scheduler::Scheduler) can run ticks, commands and
//! telemetry through one `&mut dyn SchedulerDelegate`.

use log::debug;

use super::ports::{ActuatorPort, CommandPort, EventSink, SchedulerDelegate, SensorPort, TelemetryPort};
use super::service::AppService;

/// Commands applied per poll at most, so a flood cannot starve the tick.
pub const MAX_COMMANDS_PER_POLL: usize = 8;

/// The service plus its adapters.
pub struct Runtime<H, C, T, S> {
    pub app: AppService,
    pub hw: H,
    pub commands: C,
    pub telemetry: T,
    pub sink: S,
}

impl<H, C, T, S> Runtime<H, C, T, S>
where
    H: SensorPort + ActuatorPort,
    C: CommandPort,
    T: TelemetryPort,
    S: EventSink,
{
    pub fn new(app: AppService, hw: H, commands: C, telemetry: T, sink: S) -> Self {
        Self {
            app,
            hw,
            commands,
            telemetry,
            sink,
        }
    }

    /// Arm the service (writes the safety code).
    pub fn start(&mut self) {
        self.app.start(&mut self.hw, &mut self.sink);
    }
}

impl<H, C, T, S> SchedulerDelegate for Runtime<H, C, T, S>
where
    H: SensorPort + ActuatorPort,
    C: CommandPort,
    T: TelemetryPort,
    S: EventSink,
{
    fn dispatch_commands(&mut self, now_ms: u64) -> usize {
        let mut handled = 0;
        while handled < MAX_COMMANDS_PER_POLL {
            let Some(inbound) = self.commands.poll_command() else {
                break;
            };
            let outcome =
                self.app
                    .handle_command(inbound.command, &mut self.hw, now_ms, &mut self.sink);
            self.commands.reply(inbound.ticket, &outcome);
            handled += 1;
        }
        if handled > 0 {
            debug!("runtime: {} command(s) dispatched", handled);
        }
        handled
    }

    fn control_tick(&mut self, now_ms: u64) {
        self.app.tick(&mut self.hw, now_ms, &mut self.sink);
    }

    fn publish_telemetry(&mut self, now_ms: u64) {
        if self
            .app
            .publish_telemetry(&mut self.hw, &mut self.telemetry, now_ms, &mut self.sink)
            .is_none()
        {
            debug!("runtime: telemetry frame at {} ms not delivered", now_ms);
        }
    }

    fn sample_interval_ms(&self) -> u32 {
        self.app.settings().sample_interval_ms
    }
}
