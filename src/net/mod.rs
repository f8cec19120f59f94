//! HTTP control surface.
//!
//! - [`http`]: request-head decoding, routing and response encoding
//! - [`sse`]: `/events` stream framing
//! - [`channels`]: static queues between the I/O thread and the control loop
//! - [`io_task`]: the listener thread itself

pub mod channels;
pub mod http;
pub mod io_task;
pub mod sse;

/// Simultaneous client connections (requests and event streams combined).
pub const MAX_CONNECTIONS: usize = 4;
