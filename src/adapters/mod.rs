//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements                | Connects to            |
//! |------------|---------------------------|------------------------|
//! | `hardware` | SensorPort, ActuatorPort  | INA219 (I2C), DAC      |
//! | `log_sink` | EventSink                 | Serial log output      |
//! | `time`     | ClockPort                 | ESP32 system timer     |
//! | `wifi`     | (boot-time join)          | ESP-IDF WiFi STA       |
//!
//! The network bridge ports live with the transport in
//! [`net::channels`](crate::net::channels).

pub mod hardware;
pub mod log_sink;
pub mod time;
pub mod wifi;
