//! Server-sent-events framing for the `/events` stream.
//!
//! Every telemetry frame goes out as event type `message` with the capture
//! time as its id.  A new subscriber first gets a greeting that sets the
//! client reconnect delay.

use core::fmt::Write;

use crate::telemetry::TelemetryFrame;

/// Reconnect delay advertised to clients.
pub const RETRY_MS: u32 = 1000;

pub const EVENT_TYPE: &str = "message";

/// Status line and headers opening a stream.
pub const STREAM_HEADERS: &str = "HTTP/1.1 200 OK\r\n\
    Content-Type: text/event-stream\r\n\
    Cache-Control: no-cache\r\n\
    Access-Control-Allow-Origin: *\r\n\
    Connection: keep-alive\r\n\r\n";

/// Append the stream headers and the `hello!` greeting.
pub fn write_greeting<const N: usize>(
    out: &mut heapless::String<N>,
    now_ms: u64,
) -> Result<(), core::fmt::Error> {
    let mark = out.len();
    let result = out
        .push_str(STREAM_HEADERS)
        .map_err(|_| core::fmt::Error)
        .and_then(|()| {
            write!(
                out,
                "retry: {}\r\nid: {}\r\nevent: {}\r\ndata: hello!\r\n\r\n",
                RETRY_MS, now_ms, EVENT_TYPE
            )
        });
    if result.is_err() {
        out.truncate(mark);
    }
    result
}

/// Append one telemetry event.  Nothing is written if it does not fit.
pub fn write_event<const N: usize>(
    out: &mut heapless::String<N>,
    frame: &TelemetryFrame,
) -> Result<(), core::fmt::Error> {
    let mark = out.len();
    let result = write!(
        out,
        "id: {}\r\nevent: {}\r\ndata: {}\r\n\r\n",
        frame.id,
        EVENT_TYPE,
        frame.json.as_str()
    );
    if result.is_err() {
        out.truncate(mark);
    }
    result
}

/// Parse a `Last-Event-ID` header value.
pub fn parse_last_event_id(value: &str) -> Option<u64> {
    value.trim().parse().ok()
}
