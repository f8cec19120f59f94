//! Minimal HTTP/1.1 request head decoding and response encoding.
//!
//! Only what the control surface needs: `GET` with a query string, one
//! interesting header (`Last-Event-ID`), no bodies, no keep-alive.
//!
//! The decoder accumulates bytes into a fixed buffer and yields the
//! request head once the blank line arrives.  A single socket read may
//! return part of a line or the whole head at once.

use core::fmt::Write;

use crate::app::commands::CommandRoute;

/// Largest accepted request head (request line + headers).
pub const MAX_HEAD_SIZE: usize = 1024;

/// Capacity of one encoded response (headers + body).
pub const RESPONSE_CAPACITY: usize = 1024;

const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Request-level failures, answered before anything is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpError {
    /// Head exceeded [`MAX_HEAD_SIZE`].
    HeadTooLarge,
    /// Request line unparseable or not UTF-8.
    Malformed,
}

impl HttpError {
    pub fn status(self) -> u16 {
        match self {
            Self::HeadTooLarge => 431,
            Self::Malformed => 400,
        }
    }
}

impl core::fmt::Display for HttpError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::HeadTooLarge => write!(f, "request head too large"),
            Self::Malformed => write!(f, "malformed request"),
        }
    }
}

// ── Decoder ──────────────────────────────────────────────────

/// Streaming request-head decoder.
pub struct RequestDecoder {
    buf: [u8; MAX_HEAD_SIZE],
    len: usize,
}

impl Default for RequestDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestDecoder {
    pub fn new() -> Self {
        Self {
            buf: [0; MAX_HEAD_SIZE],
            len: 0,
        }
    }

    /// Feed bytes into the decoder.
    ///
    /// Returns `Ok(Some(head))` once the terminating blank line is seen.
    /// Anything after the terminator is discarded.
    pub fn feed(&mut self, data: &[u8]) -> Result<Option<&[u8]>, HttpError> {
        let search_from = self.len.saturating_sub(HEAD_TERMINATOR.len() - 1);
        let room = MAX_HEAD_SIZE - self.len;
        let take = data.len().min(room);
        self.buf[self.len..self.len + take].copy_from_slice(&data[..take]);
        self.len += take;

        if let Some(pos) = find(&self.buf[search_from..self.len], HEAD_TERMINATOR) {
            let end = search_from + pos + HEAD_TERMINATOR.len();
            return Ok(Some(&self.buf[..end]));
        }
        if take < data.len() || self.len == MAX_HEAD_SIZE {
            return Err(HttpError::HeadTooLarge);
        }
        Ok(None)
    }

    /// Bytes buffered so far.
    pub fn buffered(&self) -> usize {
        self.len
    }

    /// Reset decoder state (e.g. when the slot is reused).
    pub fn reset(&mut self) {
        self.len = 0;
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

// ── Request ──────────────────────────────────────────────────

/// Parsed request head, borrowing from the decoder buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request<'a> {
    pub method: &'a str,
    pub path: &'a str,
    /// Raw query without the `?`; empty if absent.
    pub query: &'a str,
    pub last_event_id: Option<&'a str>,
}

/// Parse a complete request head.
pub fn parse_request(head: &[u8]) -> Result<Request<'_>, HttpError> {
    let text = core::str::from_utf8(head).map_err(|_| HttpError::Malformed)?;
    let mut lines = text.split('\n').map(|l| l.trim_end_matches('\r'));

    let request_line = lines.next().ok_or(HttpError::Malformed)?;
    let mut parts = request_line.split(' ').filter(|p| !p.is_empty());
    let method = parts.next().ok_or(HttpError::Malformed)?;
    let target = parts.next().ok_or(HttpError::Malformed)?;
    let version = parts.next().ok_or(HttpError::Malformed)?;
    if !version.starts_with("HTTP/1.") || !target.starts_with('/') {
        return Err(HttpError::Malformed);
    }
    let (path, query) = target.split_once('?').unwrap_or((target, ""));

    let mut last_event_id = None;
    for line in lines.take_while(|l| !l.is_empty()) {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("last-event-id") {
                last_event_id = Some(value.trim());
            }
        }
    }

    Ok(Request {
        method,
        path,
        query,
        last_event_id,
    })
}

// ── Routing ──────────────────────────────────────────────────

/// Where a request goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Forwarded to the control loop.
    Command(CommandRoute),
    /// Server-sent-events telemetry stream.
    Events,
    NotFound,
}

impl Route {
    pub fn resolve(path: &str) -> Self {
        if path == "/events" {
            return Self::Events;
        }
        CommandRoute::from_path(path).map_or(Self::NotFound, Self::Command)
    }
}

// ── Response ─────────────────────────────────────────────────

pub const CONTENT_TEXT: &str = "text/plain";
pub const CONTENT_JSON: &str = "application/json";

pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        202 => "Accepted",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        429 => "Too Many Requests",
        431 => "Request Header Fields Too Large",
        503 => "Service Unavailable",
        _ => "Internal Server Error",
    }
}

/// Append a complete `Connection: close` response to `out`.
///
/// Fails without a partial write if it does not fit.
pub fn write_response<const N: usize>(
    out: &mut heapless::String<N>,
    status: u16,
    content_type: &str,
    body: &str,
) -> Result<(), core::fmt::Error> {
    let mark = out.len();
    let result = write!(
        out,
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n\
         Cache-Control: no-cache\r\nAccess-Control-Allow-Origin: *\r\nConnection: close\r\n\r\n{}",
        status,
        reason_phrase(status),
        content_type,
        body.len(),
        body
    );
    if result.is_err() {
        out.truncate(mark);
    }
    result
}
