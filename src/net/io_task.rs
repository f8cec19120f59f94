//! Async HTTP I/O task: a reactor-driven, multi-client front end.
//!
//! Runs in a dedicated thread using `edge-executor` for cooperative
//! scheduling and `async-io-mini` timers for pacing.  Two futures share
//! the slot table:
//!
//! 1. **Accept**: polls the listener every 50 ms.
//! 2. **Service**: every 2 ms reads request heads, collects replies,
//!    pumps event streams and flushes pending output.
//!
//! ```text
//!  ┌──────────────────────────────────────────────────────────┐
//!  │  I/O Thread                                              │
//!  │  ┌────────────────────────────────────────────────────┐  │
//!  │  │  edge_executor::LocalExecutor                      │  │
//!  │  │   ┌──────────┐   ┌───────────────────────────────┐ │  │
//!  │  │   │  Accept  │   │ Service: read ▸ reply ▸ SSE ▸ │ │  │
//!  │  │   │  50ms ⏱  │   │          flush         2ms ⏱  │ │  │
//!  │  │   └──────────┘   └───────────────────────────────┘ │  │
//!  │  └────────────────────────────────────────────────────┘  │
//!  └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Validation happens here, before anything crosses to the control loop:
//! a malformed request is answered directly and never queued.

use core::cell::RefCell;
use core::fmt::Write as _;
use core::time::Duration;
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::rc::Rc;

use burster::Limiter;
use log::{debug, error, info, warn};

use crate::adapters::time::{uptime, uptime_ms};
use crate::app::commands::{AppCommand, InboundCommand, Ticket};
use crate::app::params::Params;

use super::MAX_CONNECTIONS;
use super::channels::{COMMAND_CHANNEL, REPLY_SIGNALS, TELEMETRY_BUS, TelemetrySubscriber};
use super::http::{self, CONTENT_TEXT, Request, RequestDecoder, Route, parse_request};
use super::sse;

const READ_BUF_SIZE: usize = 512;

/// Pending output per connection (one response, or a few stream events).
const OUT_CAPACITY: usize = 2048;

/// How long a request may wait for the control loop's reply.
const REPLY_TIMEOUT_MS: u64 = 2000;

/// Requests per second across all clients, and the burst allowance.
const RATE_PER_SEC: u64 = 10;
const RATE_BURST: u64 = 10;

const ACCEPT_PERIOD: Duration = Duration::from_millis(50);
const SERVICE_PERIOD: Duration = Duration::from_millis(2);

type RateLimiter = burster::TokenBucket<fn() -> Duration>;

fn new_rate_limiter() -> RateLimiter {
    burster::TokenBucket::new_with_time_provider(RATE_PER_SEC, RATE_BURST, uptime as fn() -> Duration)
}

// ── Request planning ─────────────────────────────────────────

/// What to do with one parsed request.
#[derive(Debug, PartialEq)]
pub(crate) enum RequestPlan {
    /// Forward to the control loop and wait for its reply.
    Dispatch(AppCommand),
    /// Open an event stream.
    Subscribe,
    /// Answer immediately without involving the control loop.
    Respond {
        status: u16,
        body: heapless::String<96>,
    },
}

impl RequestPlan {
    fn respond(status: u16, message: impl core::fmt::Display) -> Self {
        let mut body = heapless::String::new();
        let _ = write!(body, "{}", message);
        Self::Respond { status, body }
    }
}

/// Decide how to answer `request`.  `admit` is asked once per routable
/// request and returns `false` when the client is over its rate.
pub(crate) fn plan_request(request: &Request<'_>, admit: &mut dyn FnMut() -> bool) -> RequestPlan {
    if request.method != "GET" {
        return RequestPlan::respond(405, "Method not allowed");
    }
    let route = Route::resolve(request.path);
    if route == Route::NotFound {
        return RequestPlan::respond(404, "Not found");
    }
    if !admit() {
        return RequestPlan::respond(429, "Too many requests");
    }
    match route {
        Route::Events => RequestPlan::Subscribe,
        Route::Command(route) => match AppCommand::parse(route, &Params::parse(request.query)) {
            Ok(command) => RequestPlan::Dispatch(command),
            Err(e) => RequestPlan::respond(400, e),
        },
        Route::NotFound => RequestPlan::respond(404, "Not found"),
    }
}

// ── Per-connection state ─────────────────────────────────────

enum SlotState {
    Idle,
    /// Accumulating the request head.
    Reading,
    /// Command queued; waiting for the reply with this sequence.
    AwaitingReply { seq: u32, since_ms: u64 },
    /// Long-lived `/events` stream.
    Streaming(TelemetrySubscriber),
    /// Response queued; close once flushed.
    Closing,
}

struct IoSlot {
    stream: Option<TcpStream>,
    decoder: RequestDecoder,
    out: heapless::String<OUT_CAPACITY>,
    sent: usize,
    state: SlotState,
    next_seq: u32,
    dropped_events: u32,
}

impl IoSlot {
    fn new() -> Self {
        Self {
            stream: None,
            decoder: RequestDecoder::new(),
            out: heapless::String::new(),
            sent: 0,
            state: SlotState::Idle,
            next_seq: 0,
            dropped_events: 0,
        }
    }

    fn is_free(&self) -> bool {
        self.stream.is_none()
    }

    fn open(&mut self, stream: TcpStream) {
        self.stream = Some(stream);
        self.decoder.reset();
        self.out.clear();
        self.sent = 0;
        self.state = SlotState::Reading;
        self.dropped_events = 0;
    }

    /// Drop the connection.  Any pending reply is left to go stale.
    fn close(&mut self, index: usize) {
        if let SlotState::Streaming(_) = self.state {
            info!("IO[{}]: event stream closed ({} events dropped)", index, self.dropped_events);
        }
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
        self.state = SlotState::Idle;
        self.next_seq = self.next_seq.wrapping_add(1);
    }

    /// The command stays queued and may still be applied.
    fn queue_reply_timeout(&mut self) {
        self.queue_response(202, CONTENT_TEXT, "Queued, outcome unknown");
    }

    fn queue_response(&mut self, status: u16, content_type: &str, body: &str) {
        if http::write_response(&mut self.out, status, content_type, body).is_err() {
            warn!("IO: response ({} bytes) exceeds output buffer", body.len());
            let _ = http::write_response(&mut self.out, 500, CONTENT_TEXT, "Response too large");
        }
        self.state = SlotState::Closing;
    }
}

type SharedSlots = Rc<RefCell<[IoSlot; MAX_CONNECTIONS]>>;

// ── Service steps ────────────────────────────────────────────

/// Read whatever is available; act on a complete head.
fn read_request(index: usize, slot: &mut IoSlot, limiter: &mut RateLimiter, buf: &mut [u8]) {
    let Some(stream) = slot.stream.as_mut() else {
        return;
    };
    let n = match stream.read(buf) {
        Ok(0) => {
            debug!("IO[{}]: client closed before request", index);
            slot.close(index);
            return;
        }
        Ok(n) => n,
        Err(e) if e.kind() == ErrorKind::WouldBlock => return,
        Err(e) => {
            warn!("IO[{}]: read error: {}", index, e);
            slot.close(index);
            return;
        }
    };

    let plan = match slot.decoder.feed(&buf[..n]) {
        Ok(None) => return,
        Ok(Some(head)) => match parse_request(head) {
            Ok(request) => {
                if let Some(id) = request.last_event_id.and_then(sse::parse_last_event_id) {
                    info!("IO[{}]: client reconnected, last id {}", index, id);
                }
                plan_request(&request, &mut || limiter.try_consume(1).is_ok())
            }
            Err(e) => RequestPlan::respond(e.status(), e),
        },
        Err(e) => RequestPlan::respond(e.status(), e),
    };

    match plan {
        RequestPlan::Respond { status, body } => {
            debug!("IO[{}]: {} {}", index, status, body.as_str());
            slot.queue_response(status, CONTENT_TEXT, &body);
        }
        RequestPlan::Dispatch(command) => {
            slot.next_seq = slot.next_seq.wrapping_add(1);
            let seq = slot.next_seq;
            let ticket = Ticket {
                slot: index as u8,
                seq,
            };
            // Discard a reply that raced a previous close on this slot.
            let _ = REPLY_SIGNALS[index].try_take();
            if COMMAND_CHANNEL.try_send(InboundCommand { ticket, command }).is_err() {
                warn!("IO[{}]: command queue full", index);
                slot.queue_response(503, CONTENT_TEXT, "Busy");
            } else {
                slot.state = SlotState::AwaitingReply {
                    seq,
                    since_ms: uptime_ms(),
                };
            }
        }
        RequestPlan::Subscribe => match TELEMETRY_BUS.subscriber() {
            Ok(subscriber) => {
                if sse::write_greeting(&mut slot.out, uptime_ms()).is_err() {
                    slot.close(index);
                    return;
                }
                info!("IO[{}]: event stream opened", index);
                slot.state = SlotState::Streaming(subscriber);
            }
            Err(_) => slot.queue_response(503, CONTENT_TEXT, "Too many streams"),
        },
    }
}

fn collect_reply(index: usize, slot: &mut IoSlot, seq: u32, since_ms: u64) {
    if let Some(reply) = REPLY_SIGNALS[index].try_take() {
        if reply.seq == seq {
            slot.queue_response(reply.status, reply.content_type, &reply.body);
            return;
        }
        debug!("IO[{}]: stale reply seq {} (want {})", index, reply.seq, seq);
    }
    if uptime_ms().saturating_sub(since_ms) > REPLY_TIMEOUT_MS {
        warn!("IO[{}]: control loop did not answer seq {} in time", index, seq);
        slot.queue_reply_timeout();
    }
}

/// Move queued frames into the output buffer and watch for hang-up.
fn pump_stream(index: usize, slot: &mut IoSlot, buf: &mut [u8]) {
    if let SlotState::Streaming(subscriber) = &mut slot.state {
        while let Some(frame) = subscriber.try_next_message_pure() {
            if sse::write_event(&mut slot.out, &frame).is_err() {
                slot.dropped_events = slot.dropped_events.saturating_add(1);
            }
        }
    }
    // Stream clients send nothing after the head; a read of 0 is a hang-up.
    if let Some(stream) = slot.stream.as_mut() {
        match stream.read(buf) {
            Ok(0) => slot.close(index),
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::WouldBlock => {}
            Err(_) => slot.close(index),
        }
    }
}

fn flush(index: usize, slot: &mut IoSlot) {
    let Some(stream) = slot.stream.as_mut() else {
        return;
    };
    while slot.sent < slot.out.len() {
        match stream.write(&slot.out.as_bytes()[slot.sent..]) {
            Ok(0) => break,
            Ok(n) => slot.sent += n,
            Err(e) if e.kind() == ErrorKind::WouldBlock => return,
            Err(e) => {
                debug!("IO[{}]: write failed: {}", index, e);
                slot.close(index);
                return;
            }
        }
    }
    if slot.sent >= slot.out.len() {
        slot.out.clear();
        slot.sent = 0;
        if matches!(slot.state, SlotState::Closing) {
            slot.close(index);
        }
    }
}

fn service_slot(index: usize, slot: &mut IoSlot, limiter: &mut RateLimiter, buf: &mut [u8]) {
    match slot.state {
        SlotState::Idle => return,
        SlotState::Reading => read_request(index, slot, limiter, buf),
        SlotState::AwaitingReply { seq, since_ms } => collect_reply(index, slot, seq, since_ms),
        SlotState::Streaming(_) => pump_stream(index, slot, buf),
        SlotState::Closing => {}
    }
    flush(index, slot);
}

// ── Async loops ──────────────────────────────────────────────

async fn accept_loop(listener: TcpListener, slots: SharedSlots) {
    loop {
        loop {
            let stream = match listener.accept() {
                Ok((stream, peer)) => {
                    debug!("IO: connection from {}", peer);
                    stream
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("IO: accept failed: {}", e);
                    break;
                }
            };
            if stream.set_nonblocking(true).is_err() {
                continue;
            }
            let mut s = slots.borrow_mut();
            match s.iter_mut().position(|slot| slot.is_free()) {
                Some(index) => s[index].open(stream),
                None => {
                    let mut out: heapless::String<256> = heapless::String::new();
                    let _ = http::write_response(&mut out, 503, CONTENT_TEXT, "Too many connections");
                    let mut stream = stream;
                    let _ = stream.write(out.as_bytes());
                    warn!("IO: all {} slots busy, refusing client", MAX_CONNECTIONS);
                }
            }
        }
        async_io_mini::Timer::after(ACCEPT_PERIOD).await;
    }
}

async fn service_loop(slots: SharedSlots) {
    let mut limiter = new_rate_limiter();
    let mut buf = [0u8; READ_BUF_SIZE];
    loop {
        {
            let mut s = slots.borrow_mut();
            for (index, slot) in s.iter_mut().enumerate() {
                service_slot(index, slot, &mut limiter, &mut buf);
            }
        }
        async_io_mini::Timer::after(SERVICE_PERIOD).await;
    }
}

/// Entry point for the I/O thread.
fn run_io_loop(port: u16) {
    let listener = match TcpListener::bind(("0.0.0.0", port)) {
        Ok(listener) => listener,
        Err(e) => {
            error!("IO: cannot listen on port {}: {}", port, e);
            return;
        }
    };
    if let Err(e) = listener.set_nonblocking(true) {
        error!("IO: listener set_nonblocking failed: {}", e);
        return;
    }

    let executor: edge_executor::LocalExecutor<'_, 8> = edge_executor::LocalExecutor::new();
    let slots: SharedSlots = Rc::new(RefCell::new(core::array::from_fn(|_| IoSlot::new())));

    executor.spawn(accept_loop(listener, slots.clone())).detach();
    executor.spawn(service_loop(slots)).detach();

    info!(
        "HTTP server on port {} ({} connections, {} req/s)",
        port, MAX_CONNECTIONS, RATE_PER_SEC
    );

    futures_lite::future::block_on(executor.run(core::future::pending::<()>()));
}

// ── Thread spawn ─────────────────────────────────────────────

/// Spawn the HTTP server on its own thread, pinned to the protocol core
/// next to lwIP.
pub fn spawn(port: u16) -> std::io::Result<std::thread::JoinHandle<()>> {
    crate::drivers::task_pin::spawn_on_core(
        crate::drivers::task_pin::Core::Pro,
        12,
        16,
        "http-io\0",
        move || run_io_loop(port),
    )
}

// ── Tests ────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tunings;

    fn plan(head: &[u8]) -> RequestPlan {
        let request = parse_request(head).unwrap();
        plan_request(&request, &mut || true)
    }

    fn status_of(plan: &RequestPlan) -> Option<u16> {
        match plan {
            RequestPlan::Respond { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[test]
    fn valid_set_dispatches() {
        assert_eq!(
            plan(b"GET /set?current=150 HTTP/1.1\r\n\r\n"),
            RequestPlan::Dispatch(AppCommand::SetTarget { current_ma: 150.0 })
        );
    }

    #[test]
    fn setpid_dispatches_all_gains() {
        assert_eq!(
            plan(b"GET /setpid?kp=1&ki=2&kd=3 HTTP/1.1\r\n\r\n"),
            RequestPlan::Dispatch(AppCommand::SetTunings(Tunings {
                kp: 1.0,
                ki: 2.0,
                kd: 3.0
            }))
        );
    }

    #[test]
    fn missing_param_is_answered_locally() {
        let p = plan(b"GET /set HTTP/1.1\r\n\r\n");
        assert_eq!(status_of(&p), Some(400));
        let p = plan(b"GET /setpid?kp=1&ki=2 HTTP/1.1\r\n\r\n");
        assert_eq!(status_of(&p), Some(400));
    }

    #[test]
    fn events_subscribe() {
        assert_eq!(plan(b"GET /events HTTP/1.1\r\n\r\n"), RequestPlan::Subscribe);
    }

    #[test]
    fn unknown_path_and_method() {
        assert_eq!(status_of(&plan(b"GET /nope HTTP/1.1\r\n\r\n")), Some(404));
        assert_eq!(status_of(&plan(b"POST /set?current=1 HTTP/1.1\r\n\r\n")), Some(405));
    }

    #[test]
    fn rate_limited_request_gets_429() {
        let request = parse_request(b"GET /data HTTP/1.1\r\n\r\n").unwrap();
        let p = plan_request(&request, &mut || false);
        assert_eq!(status_of(&p), Some(429));
    }

    #[test]
    fn not_found_does_not_consume_rate() {
        let request = parse_request(b"GET /missing HTTP/1.1\r\n\r\n").unwrap();
        let mut asked = false;
        plan_request(&request, &mut || {
            asked = true;
            true
        });
        assert!(!asked);
    }

    #[test]
    fn token_bucket_allows_burst_then_refuses() {
        let mut limiter = new_rate_limiter();
        let admitted = (0..RATE_BURST + 5)
            .filter(|_| limiter.try_consume(1).is_ok())
            .count();
        assert!(admitted >= RATE_BURST as usize);
        assert!(admitted < (RATE_BURST + 5) as usize);
    }

    #[test]
    fn reply_timeout_does_not_claim_failure() {
        let mut slot = IoSlot::new();
        slot.queue_reply_timeout();
        assert!(slot.out.starts_with("HTTP/1.1 202 Accepted\r\n"));
        assert!(slot.out.ends_with("Queued, outcome unknown"));
        assert!(matches!(slot.state, SlotState::Closing));
    }

    #[test]
    fn slot_close_bumps_sequence() {
        let mut slot = IoSlot::new();
        let before = slot.next_seq;
        slot.close(0);
        assert_eq!(slot.next_seq, before.wrapping_add(1));
        assert!(slot.is_free());
    }
}
