//! Socket wrappers shared by the request path.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::Instant;

use microclaw_core::TransportError;
use rustls::{ClientConnection, StreamOwned};

use crate::tls::insecure_client_config;
use crate::IdleNotify;

/// Plain or TLS-wrapped stream over one TCP connection.
pub(crate) enum Conn {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl Conn {
    pub(crate) fn plain(tcp: TcpStream) -> Self {
        Conn::Plain(tcp)
    }

    pub(crate) fn tls(tcp: TcpStream, host: &str) -> Result<Self, TransportError> {
        let name = rustls::pki_types::ServerName::try_from(host.to_string()).map_err(|e| {
            TransportError::Tls {
                host: host.to_string(),
                reason: e.to_string(),
            }
        })?;
        let session = ClientConnection::new(insecure_client_config(), name).map_err(|e| {
            TransportError::Tls {
                host: host.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Conn::Tls(Box::new(StreamOwned::new(session, tcp))))
    }
}

impl Read for Conn {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Conn::Plain(s) => s.read(buf),
            Conn::Tls(s) => s.read(buf),
        }
    }
}

impl Write for Conn {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Conn::Plain(s) => s.write(buf),
            Conn::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Conn::Plain(s) => s.flush(),
            Conn::Tls(s) => s.flush(),
        }
    }
}

const READ_BUF: usize = 512;

/// Buffered byte-at-a-time reader with a deadline and idle callback.
///
/// The underlying socket carries a short read timeout, so a slow peer
/// surfaces as repeated `WouldBlock`; each one ticks the idle callback
/// and re-checks the overall deadline.
pub struct ByteReader<R: Read> {
    inner: R,
    buf: [u8; READ_BUF],
    pos: usize,
    len: usize,
}

impl<R: Read> ByteReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, buf: [0; READ_BUF], pos: 0, len: 0 }
    }

    /// Next byte, `Ok(None)` at EOF, `Err(Timeout)` past the deadline.
    pub fn next_byte(
        &mut self,
        deadline: Instant,
        timeout_ms: u64,
        idle: &mut dyn IdleNotify,
    ) -> Result<Option<u8>, TransportError> {
        loop {
            if self.pos < self.len {
                let b = self.buf[self.pos];
                self.pos += 1;
                return Ok(Some(b));
            }
            match self.inner.read(&mut self.buf) {
                Ok(0) => return Ok(None),
                Ok(n) => {
                    self.pos = 0;
                    self.len = n;
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
                {
                    idle.tick();
                    if Instant::now() >= deadline {
                        return Err(TransportError::Timeout { timeout_ms });
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(TransportError::Io(e.to_string())),
            }
        }
    }
}
