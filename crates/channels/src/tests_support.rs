//! One-shot HTTP server for poller tests.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread::JoinHandle;
use std::time::Duration;

/// A canned response plus the request captured for it.
pub struct Exchange {
    response: Vec<u8>,
}

impl Exchange {
    /// 200 with a JSON body.
    pub fn json(body: &str) -> Self {
        Self {
            response: format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
                body.len(),
                body
            )
            .into_bytes(),
        }
    }

    /// Arbitrary status with a plain body.
    pub fn status(code: u16, body: &str) -> Self {
        Self {
            response: format!(
                "HTTP/1.1 {code} X\r\nContent-Length: {}\r\n\r\n{}",
                body.len(),
                body
            )
            .into_bytes(),
        }
    }
}

pub struct Captured {
    pub head: String,
    pub body: String,
}

/// Serve the given exchanges in order, one connection each, and return
/// the captured requests when joined.
pub fn serve(exchanges: Vec<Exchange>) -> (u16, JoinHandle<Vec<Captured>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = std::thread::spawn(move || {
        let mut captured = Vec::new();
        for exchange in exchanges {
            let (mut sock, _) = listener.accept().unwrap();
            sock.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

            let mut raw = Vec::new();
            let mut buf = [0u8; 1024];
            let head_end = loop {
                match sock.read(&mut buf) {
                    Ok(0) => break None,
                    Ok(n) => {
                        raw.extend_from_slice(&buf[..n]);
                        if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                            break Some(pos + 4);
                        }
                    }
                    Err(_) => break None,
                }
            };
            let head_end = head_end.unwrap_or(raw.len());
            let head = String::from_utf8_lossy(&raw[..head_end]).into_owned();

            let want = content_length(&head);
            while raw.len() - head_end < want {
                match sock.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => raw.extend_from_slice(&buf[..n]),
                }
            }
            let body = String::from_utf8_lossy(&raw[head_end..]).into_owned();

            sock.write_all(&exchange.response).unwrap();
            captured.push(Captured { head, body });
        }
        captured
    });
    (port, handle)
}

fn content_length(head: &str) -> usize {
    head.lines()
        .find_map(|l| {
            let (name, value) = l.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse().ok())?
        })
        .unwrap_or(0)
}
