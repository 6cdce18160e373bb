//! Status line and header-block draining.
//!
//! Headers are consumed as a byte stream, never stored. The blank line
//! ending the block is recognized in both conventions, strict `\r\n\r\n`
//! and bare `\n\n`, because some upstream proxies emit the latter.

use std::io::Read;
use std::time::Instant;

use microclaw_core::TransportError;

use crate::stream::ByteReader;
use crate::IdleNotify;

/// Longest status line we bother to read.
const STATUS_LINE_MAX: usize = 128;

/// Pull the status code out of an HTTP/1.x status line.
pub(crate) fn parse_status(line: &str) -> Option<u16> {
    line.split_whitespace().nth(1)?.parse().ok()
}

/// Consume the status line and every header, returning the status code.
/// An unparseable status line yields 0 so the caller can still read the
/// body and report the payload.
pub(crate) fn drain<R: Read>(
    reader: &mut ByteReader<R>,
    deadline: Instant,
    timeout_ms: u64,
    idle: &mut dyn IdleNotify,
) -> Result<u16, TransportError> {
    // Status line first. The initial next_byte call doubles as the
    // wait-for-first-byte phase.
    let mut line = [0u8; STATUS_LINE_MAX];
    let mut used = 0;
    loop {
        match reader.next_byte(deadline, timeout_ms, idle)? {
            Some(b'\n') | None => break,
            Some(b) => {
                if used < STATUS_LINE_MAX {
                    line[used] = b;
                    used += 1;
                }
            }
        }
    }
    let text = std::str::from_utf8(&line[..used]).unwrap_or("");
    let status = parse_status(text.trim_end_matches('\r')).unwrap_or(0);

    // Header block. Track the last bytes seen; a newline immediately
    // after the previous newline (optionally with one carriage return
    // between) ends the block. The status line's own \n counts as the
    // starting newline, which handles a headerless response.
    let mut prev_was_newline = true;
    let mut pending_cr = false;
    loop {
        match reader.next_byte(deadline, timeout_ms, idle)? {
            Some(b'\r') if prev_was_newline && !pending_cr => pending_cr = true,
            Some(b'\n') => {
                if prev_was_newline {
                    break;
                }
                prev_was_newline = true;
                pending_cr = false;
            }
            Some(_) => {
                prev_was_newline = false;
                pending_cr = false;
            }
            None => break,
        }
    }
    Ok(status)
}
