//! WiFi station-mode adapter.
//!
//! Joins the configured access point at boot and keeps an eye on the link
//! afterwards.  Credentials are baked in at build time from
//! `CCSOURCE_WIFI_SSID` / `CCSOURCE_WIFI_PASS`.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi` blocking station driver.
//! - **all other targets**: simulation stubs for host-side tests.
//!
//! ## Boot policy
//!
//! [`WifiAdapter::connect_with_timeout`] retries with exponential backoff
//! until the deadline, then gives up with [`ProvisioningError::Timeout`];
//! `main` restarts the chip on that error.

use core::time::Duration;

use log::{info, warn};

use crate::app::ports::ClockPort;
use crate::error::ProvisioningError;

// ───────────────────────────────────────────────────────────────
// Credentials
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    ssid: heapless::String<32>,
    password: heapless::String<64>,
}

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

impl Credentials {
    /// Validate and store.  An empty password selects an open network.
    pub fn new(ssid: &str, password: &str) -> Result<Self, ProvisioningError> {
        if ssid.is_empty() || !is_printable_ascii(ssid) {
            return Err(ProvisioningError::InvalidCredentials);
        }
        if !password.is_empty() && !(8..=64).contains(&password.len()) {
            return Err(ProvisioningError::InvalidCredentials);
        }
        let mut out = Self {
            ssid: heapless::String::new(),
            password: heapless::String::new(),
        };
        out.ssid
            .push_str(ssid)
            .map_err(|_| ProvisioningError::InvalidCredentials)?;
        out.password
            .push_str(password)
            .map_err(|_| ProvisioningError::InvalidCredentials)?;
        Ok(out)
    }

    /// Credentials compiled into the image.
    pub fn from_build_env() -> Result<Self, ProvisioningError> {
        let ssid = option_env!("CCSOURCE_WIFI_SSID").ok_or(ProvisioningError::NoCredentials)?;
        Self::new(ssid, option_env!("CCSOURCE_WIFI_PASS").unwrap_or(""))
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }
}

// ───────────────────────────────────────────────────────────────
// Connection state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Disconnected,
    Connecting { attempt: u32 },
    Connected,
    /// Boot deadline passed.
    Failed,
}

const INITIAL_BACKOFF: Duration = Duration::from_secs(2);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    state: WifiState,
    credentials: Credentials,
    initial_backoff: Duration,
    max_backoff: Duration,
    #[cfg(target_os = "espidf")]
    wifi: esp_idf_svc::wifi::BlockingWifi<esp_idf_svc::wifi::EspWifi<'static>>,
    /// Simulation: remaining attempts that fail before one succeeds.
    #[cfg(not(target_os = "espidf"))]
    sim_failures: u32,
    #[cfg(not(target_os = "espidf"))]
    sim_link_up: bool,
}

impl WifiAdapter {
    /// Bring up the station driver (not yet associated).
    #[cfg(target_os = "espidf")]
    pub fn new(
        modem: esp_idf_hal::modem::Modem,
        sysloop: esp_idf_svc::eventloop::EspSystemEventLoop,
        nvs: Option<esp_idf_svc::nvs::EspDefaultNvsPartition>,
        credentials: Credentials,
    ) -> Result<Self, ProvisioningError> {
        use esp_idf_svc::wifi::{
            AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi,
        };

        let driver = EspWifi::new(modem, sysloop.clone(), nvs).map_err(|e| {
            warn!("WiFi: driver init failed: {}", e);
            ProvisioningError::DriverFailed
        })?;
        let mut wifi =
            BlockingWifi::wrap(driver, sysloop).map_err(|_| ProvisioningError::DriverFailed)?;

        let config = Configuration::Client(ClientConfiguration {
            ssid: credentials
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| ProvisioningError::InvalidCredentials)?,
            password: credentials
                .password
                .as_str()
                .try_into()
                .map_err(|_| ProvisioningError::InvalidCredentials)?,
            auth_method: if credentials.is_open() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            },
            ..Default::default()
        });
        wifi.set_configuration(&config)
            .map_err(|_| ProvisioningError::DriverFailed)?;
        wifi.start().map_err(|_| ProvisioningError::DriverFailed)?;

        Ok(Self {
            state: WifiState::Disconnected,
            credentials,
            initial_backoff: INITIAL_BACKOFF,
            max_backoff: MAX_BACKOFF,
            wifi,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(credentials: Credentials) -> Self {
        Self {
            state: WifiState::Disconnected,
            credentials,
            initial_backoff: INITIAL_BACKOFF,
            max_backoff: MAX_BACKOFF,
            sim_failures: 0,
            sim_link_up: false,
        }
    }

    /// Override the retry pacing.
    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max.max(initial);
        self
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    pub fn ssid(&self) -> &str {
        self.credentials.ssid()
    }

    /// Associate, retrying until `timeout_ms` has elapsed on `clock`.
    pub fn connect_with_timeout(
        &mut self,
        timeout_ms: u32,
        clock: &impl ClockPort,
    ) -> Result<(), ProvisioningError> {
        let deadline = clock.now_ms() + u64::from(timeout_ms);
        let mut backoff = self.initial_backoff;
        let mut attempt = 0;
        info!("WiFi: joining '{}' ({} s budget)", self.ssid(), timeout_ms / 1000);

        loop {
            attempt += 1;
            self.state = WifiState::Connecting { attempt };
            match self.platform_connect() {
                Ok(()) => {
                    self.state = WifiState::Connected;
                    info!("WiFi: connected after {} attempt(s)", attempt);
                    return Ok(());
                }
                Err(e) => warn!("WiFi: attempt {} failed: {}", attempt, e),
            }

            let now = clock.now_ms();
            if now >= deadline {
                self.state = WifiState::Failed;
                warn!("WiFi: gave up after {} attempts", attempt);
                return Err(ProvisioningError::Timeout);
            }
            let remaining = Duration::from_millis(deadline - now);
            std::thread::sleep(backoff.min(remaining));
            backoff = (backoff * 2).min(self.max_backoff);
        }
    }

    /// Check the link; kick off a reassociation if it dropped.  Never blocks.
    pub fn poll_link(&mut self) {
        let up = self.platform_is_connected();
        match (self.state, up) {
            (WifiState::Connected, false) => {
                warn!("WiFi: link lost, reassociating");
                self.state = WifiState::Disconnected;
                self.platform_reassociate();
            }
            (WifiState::Disconnected, true) => {
                info!("WiFi: link restored");
                self.state = WifiState::Connected;
            }
            (WifiState::Disconnected, false) => self.platform_reassociate(),
            _ => {}
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == WifiState::Connected
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), ProvisioningError> {
        self.wifi.connect().map_err(|_| ProvisioningError::DriverFailed)?;
        self.wifi
            .wait_netif_up()
            .map_err(|_| ProvisioningError::DriverFailed)?;
        if let Ok(ip) = self.wifi.wifi().sta_netif().get_ip_info() {
            info!("WiFi: address {}", ip.ip);
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), ProvisioningError> {
        if self.sim_failures > 0 {
            self.sim_failures -= 1;
            return Err(ProvisioningError::DriverFailed);
        }
        self.sim_link_up = true;
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.sim_link_up
    }

    #[cfg(target_os = "espidf")]
    fn platform_reassociate(&mut self) {
        // Non-blocking: association completes in the driver's event task.
        if let Err(e) = self.wifi.wifi_mut().connect() {
            warn!("WiFi: reassociate request failed: {}", e);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_reassociate(&mut self) {
        if self.sim_failures > 0 {
            self.sim_failures -= 1;
        } else {
            self.sim_link_up = true;
        }
    }

    // ── Simulation hooks ──────────────────────────────────────

    /// Make the next `n` association attempts fail.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_fail_attempts(&mut self, n: u32) {
        self.sim_failures = n;
    }

    /// Drop the simulated link.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_drop_link(&mut self) {
        self.sim_link_up = false;
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
