//! # MicroClaw Core
//!
//! Fixed-capacity primitives and error definitions for the MicroClaw agent
//! runtime. Everything here is sized at compile time: the runtime targets
//! memory-constrained devices and the hot path must not grow buffers on
//! demand, so truncation and overflow are explicit, reportable outcomes
//! rather than silent reallocation.
//!
//! All other crates depend inward on this one.

pub mod bounded;
pub mod error;
pub mod ident;
pub mod session;

// Re-export key types at crate root for ergonomics
pub use bounded::BoundedString;
pub use error::{ChannelError, Error, Result, StoreError, TransportError};
pub use ident::{Ident, IdentError};
pub use session::SessionLog;

/// A char-boundary-safe prefix of `s`, at most `max` bytes long.
///
/// Used wherever a log line or user-facing placeholder embeds a snippet of
/// an untrusted payload.
pub fn prefix(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut cut = max;
    while cut > 0 && !s.is_char_boundary(cut) {
        cut -= 1;
    }
    &s[..cut]
}
