//! Constant-current source firmware: main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter    LogEventSink   ChannelBridge   SystemClock │
//! │  (INA219 + DAC)     (EventSink)    (Command+Telem) (ClockPort) │
//! │  WifiAdapter        net::io_task (HTTP + SSE, own thread)      │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  ConfigStore · ControlLoop (PID + interlock) · Telem   │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Scheduler (delegate-driven, fixed-period tick)                │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Boot order matters: the DAC is parked at the safety code before the
//! (possibly minutes-long) Wi-Fi join, so the converter never sits at an
//! arbitrary bias.
#![deny(unused_must_use)]

use core::time::Duration;

use anyhow::Result;
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::units::Hertz;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{error, info, warn};

use ccsource::adapters::hardware::HardwareAdapter;
use ccsource::adapters::log_sink::LogEventSink;
use ccsource::adapters::time::SystemClock;
use ccsource::adapters::wifi::{Credentials, WifiAdapter};
use ccsource::app::ports::ClockPort;
use ccsource::app::runtime::Runtime;
use ccsource::app::service::AppService;
use ccsource::config::{ControllerConfig, Settings};
use ccsource::drivers::watchdog::Watchdog;
use ccsource::error::HardwareInitError;
use ccsource::net::channels::ChannelBridge;
use ccsource::pins;
use ccsource::scheduler::Scheduler;

/// How often the main loop checks the Wi-Fi link.
const LINK_CHECK_MS: u64 = 5_000;

/// Log and park the main task for good, yielding to the idle task.
fn halt(what: &str, e: &dyn core::fmt::Display) -> ! {
    error!("{} failed: {}; halting", what, e);
    loop {
        std::thread::sleep(Duration::from_secs(1));
    }
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  CC Source v{}                    ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let config = ControllerConfig::default();
    let settings = Settings::default();
    let clock = SystemClock::new();

    // ── 2. Sensor + actuator ──────────────────────────────────
    let peripherals = Peripherals::take()?;
    let i2c = match I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio21,
        peripherals.pins.gpio22,
        &I2cConfig::new().baudrate(Hertz(pins::I2C_FREQ_HZ)),
    ) {
        Ok(i2c) => i2c,
        Err(e) => {
            warn!("I2C0 driver: {}", e);
            halt("I2C init", &HardwareInitError::I2cInitFailed)
        }
    };
    info!(
        "I2C0 on SDA={} SCL={} @ {} Hz",
        pins::I2C_SDA_GPIO,
        pins::I2C_SCL_GPIO,
        pins::I2C_FREQ_HZ
    );

    // An uncalibrated sensor must never drive the loop.
    let hw = match HardwareAdapter::init(i2c, &config, &settings) {
        Ok(hw) => hw,
        Err(e) => halt("Hardware init", &e),
    };

    let app = AppService::with_settings(config, settings);
    let mut runtime = Runtime::new(app, hw, ChannelBridge::new(), ChannelBridge::new(), LogEventSink::new());
    runtime.start();

    // ── 3. Network ────────────────────────────────────────────
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take().ok();
    let joined = Credentials::from_build_env()
        .and_then(|creds| WifiAdapter::new(peripherals.modem, sysloop, nvs, creds))
        .and_then(|mut wifi| {
            wifi.connect_with_timeout(config.wifi_connect_timeout_ms, &clock)
                .map(|()| wifi)
        });
    let mut wifi = match joined {
        Ok(wifi) => wifi,
        Err(e) => {
            error!("WiFi: {}; restarting", e);
            // SAFETY: plain reset; never returns.
            unsafe { esp_idf_svc::sys::esp_restart() };
            #[allow(unreachable_code)]
            return Ok(());
        }
    };

    let _io = ccsource::net::io_task::spawn(config.http_port)?;

    // ── 4. Control loop ───────────────────────────────────────
    let watchdog = Watchdog::new(config.watchdog_timeout_ms);
    let mut scheduler = Scheduler::new(config.control_period_ms);
    let mut next_link_check = clock.now_ms() + LINK_CHECK_MS;
    info!("Control loop running ({} ms period)", scheduler.period_ms());

    loop {
        let now = clock.now_ms();
        scheduler.poll(now, &mut runtime);
        watchdog.feed();

        if now >= next_link_check {
            wifi.poll_link();
            if !wifi.is_connected() {
                warn!("WiFi: still offline; control loop unaffected");
            }
            next_link_check = now + LINK_CHECK_MS;
        }

        let sleep_ms = scheduler
            .sleep_hint_ms(clock.now_ms())
            .min(u64::from(config.control_period_ms));
        if sleep_ms > 0 {
            std::thread::sleep(Duration::from_millis(sleep_ms));
        }
    }
}
