//! # MicroClaw Transport
//!
//! A blocking HTTP/1.1 client sized for one request at a time.
//!
//! Every exchange runs the same eight steps: drop any leftover connection,
//! let the endpoint settle, connect, optionally wrap in TLS, write the
//! request in small pieces, wait for the first response byte, drain the
//! headers for a status code, then read a capped body. Connections are
//! never reused and never shared between destinations; each [`Endpoint`]
//! owns its own.
//!
//! Long waits (connect, first byte, header drain) feed an [`IdleNotify`]
//! so the caller can keep a serial console or watchdog alive while the
//! network is slow.

mod chunked;
mod headers;
mod stream;
mod tls;

pub use chunked::decode_in_place;
pub use stream::ByteReader;

use std::cell::Cell;
use std::io::Write as _;
use std::net::{TcpStream, ToSocketAddrs};
use std::rc::Rc;
use std::time::{Duration, Instant};

use microclaw_core::TransportError;
use tracing::{debug, trace, warn};

use stream::Conn;

/// Write granularity for the request head and body.
const WRITE_CHUNK: usize = 512;

/// Default cap on response bodies. Longer bodies are truncated silently.
pub const BODY_CAP: usize = 8192;

/// Default settle delay before reconnecting to an endpoint.
pub const SETTLE: Duration = Duration::from_millis(100);

/// Default per-request deadline, applied to each phase.
pub const TIMEOUT: Duration = Duration::from_secs(60);

/// Poll interval for the underlying socket while waiting on the peer.
pub(crate) const SOCKET_POLL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

/// One HTTP exchange. `body: None` sends a GET, `Some` a JSON POST.
pub struct Request<'a> {
    pub scheme: Scheme,
    pub host: &'a str,
    pub port: u16,
    pub path: &'a str,
    pub extra_headers: &'a [(&'a str, &'a str)],
    pub body: Option<&'a str>,
}

impl<'a> Request<'a> {
    pub fn get(scheme: Scheme, host: &'a str, port: u16, path: &'a str) -> Self {
        Self { scheme, host, port, path, extra_headers: &[], body: None }
    }

    pub fn post(scheme: Scheme, host: &'a str, port: u16, path: &'a str, body: &'a str) -> Self {
        Self { scheme, host, port, path, extra_headers: &[], body: Some(body) }
    }
}

/// Status code plus the (possibly truncated) decoded body.
#[derive(Debug)]
pub struct Response {
    /// 0 when the status line could not be parsed.
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Callback ticked while the transport waits on the network.
pub trait IdleNotify {
    fn tick(&mut self);
}

/// No-op implementation for tests and one-shot runs.
pub struct NoopIdle;

impl IdleNotify for NoopIdle {
    fn tick(&mut self) {}
}

/// Shared "a network exchange is in flight" flag.
///
/// The control loop checks it before starting channel polls so a slow
/// exchange is never stacked on top of another.
#[derive(Clone, Default)]
pub struct Busy(Rc<Cell<bool>>);

impl Busy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> bool {
        self.0.get()
    }

    /// Raise the flag until the returned guard drops.
    pub fn raise(&self) -> BusyGuard {
        self.0.set(true);
        BusyGuard(self.0.clone())
    }
}

pub struct BusyGuard(Rc<Cell<bool>>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// A single remote destination and the policy for talking to it.
pub struct Endpoint {
    label: &'static str,
    settle: Duration,
    timeout: Duration,
    body_cap: usize,
}

impl Endpoint {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            settle: SETTLE,
            timeout: TIMEOUT,
            body_cap: BODY_CAP,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_body_cap(mut self, cap: usize) -> Self {
        self.body_cap = cap;
        self
    }

    /// Run one exchange against this endpoint.
    pub fn request(
        &mut self,
        req: &Request<'_>,
        idle: &mut dyn IdleNotify,
    ) -> Result<Response, TransportError> {
        // Step 1: connections are never reused; give the peer a moment
        // after any previous teardown before dialing again.
        std::thread::sleep(self.settle);

        let deadline = Instant::now() + self.timeout;
        let timeout_ms = self.timeout.as_millis() as u64;

        // Step 2: TCP connect.
        let tcp = connect(req.host, req.port, deadline, idle)?;
        tcp.set_read_timeout(Some(SOCKET_POLL))
            .map_err(TransportError::from)?;
        tcp.set_write_timeout(Some(self.timeout))
            .map_err(TransportError::from)?;

        // Step 3: TLS when the scheme asks for it.
        let mut conn = match req.scheme {
            Scheme::Http => Conn::plain(tcp),
            Scheme::Https => Conn::tls(tcp, req.host)?,
        };
        trace!(endpoint = self.label, host = req.host, "connected");

        // Step 4: request head and body, written in small pieces.
        let head = build_head(req);
        write_pieces(&mut conn, head.as_bytes())?;
        if let Some(body) = req.body {
            write_pieces(&mut conn, body.as_bytes())?;
        }
        conn.flush().map_err(TransportError::from)?;

        // Steps 5 and 6: first byte, then header drain for the status.
        let mut reader = ByteReader::new(&mut conn);
        let status = headers::drain(&mut reader, deadline, timeout_ms, idle)?;
        if status == 0 {
            warn!(endpoint = self.label, "unparseable status line");
        }

        // Step 7: capped body read until the peer closes. The idle
        // callback stays silent here so no stray bytes interleave with
        // body delivery on a shared console.
        let mut raw = Vec::with_capacity(512);
        loop {
            match reader.next_byte(deadline, timeout_ms, &mut NoopIdle)? {
                Some(b) if raw.len() < self.body_cap => raw.push(b),
                Some(_) => {} // past the cap, keep draining to EOF
                None => break,
            }
        }

        // Step 8: undo chunked framing when present, then close.
        decode_in_place(&mut raw);
        drop(conn);

        let body = String::from_utf8_lossy(&raw).into_owned();
        debug!(
            endpoint = self.label,
            status,
            body_len = body.len(),
            "exchange complete"
        );
        Ok(Response { status, body })
    }
}

/// Connect to the first reachable address, waiting in [`SOCKET_POLL`]
/// slices so the idle notifier keeps ticking while the handshake is
/// pending. Refused connections fail over to the next address right
/// away; only a still-pending handshake is retried until the deadline.
fn connect(
    host: &str,
    port: u16,
    deadline: Instant,
    idle: &mut dyn IdleNotify,
) -> Result<TcpStream, TransportError> {
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|e| TransportError::ConnectFailed {
            host: host.to_string(),
            port,
            reason: e.to_string(),
        })?;
    let mut last = None;
    for addr in addrs {
        loop {
            match TcpStream::connect_timeout(&addr, SOCKET_POLL) {
                Ok(s) => return Ok(s),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut && Instant::now() < deadline => {
                    idle.tick();
                }
                Err(e) => {
                    last = Some(e);
                    break;
                }
            }
        }
    }
    Err(TransportError::ConnectFailed {
        host: host.to_string(),
        port,
        reason: last
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no addresses resolved".to_string()),
    })
}

fn build_head(req: &Request<'_>) -> String {
    let method = if req.body.is_some() { "POST" } else { "GET" };
    let mut head = format!(
        "{method} {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n",
        req.path, req.host
    );
    for (name, value) in req.extra_headers {
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }
    if let Some(body) = req.body {
        head.push_str("Content-Type: application/json\r\n");
        head.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    head.push_str("\r\n");
    head
}

fn write_pieces(conn: &mut Conn, mut data: &[u8]) -> Result<(), TransportError> {
    while !data.is_empty() {
        let n = data.len().min(WRITE_CHUNK);
        conn.write_all(&data[..n]).map_err(TransportError::from)?;
        data = &data[n..];
    }
    Ok(())
}
