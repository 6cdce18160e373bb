//! Error taxonomy shared across the workspace.
//!
//! Each bounded context gets its own enum; the top-level [`Error`] wraps
//! them for callers that cross context boundaries (the control loop, the
//! agent). Crates return the narrow enum internally and convert at the
//! seam with `?`.

use thiserror::Error;

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for cross-context call sites.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Ident(#[from] crate::ident::IdentError),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Failures while talking to a remote HTTP endpoint.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect to {host}:{port} failed: {reason}")]
    ConnectFailed {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("tls handshake with {host} failed: {reason}")]
    Tls { host: String, reason: String },

    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("i/o error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => {
                TransportError::Timeout { timeout_ms: 0 }
            }
            _ => TransportError::Io(e.to_string()),
        }
    }
}

/// Failures in the persistent configuration store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to write {path}: {reason}")]
    Write { path: String, reason: String },

    #[error("serialized config exceeds {cap} bytes")]
    TooLarge { cap: usize },
}

/// Failures in a chat channel (Telegram, Discord).
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel {0} is not configured")]
    NotConfigured(String),

    #[error("{channel} delivery failed with status {status}")]
    DeliveryFailed { channel: String, status: u16 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_render_context() {
        let e = TransportError::ConnectFailed {
            host: "api.telegram.org".into(),
            port: 443,
            reason: "connection refused".into(),
        };
        assert_eq!(
            e.to_string(),
            "connect to api.telegram.org:443 failed: connection refused"
        );
    }

    #[test]
    fn io_timeout_maps_to_timeout_variant() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "late");
        assert!(matches!(
            TransportError::from(io),
            TransportError::Timeout { .. }
        ));
    }

    #[test]
    fn top_level_error_is_transparent_for_store() {
        let e: Error = StoreError::TooLarge { cap: 2048 }.into();
        assert_eq!(e.to_string(), "serialized config exceeds 2048 bytes");
    }

    #[test]
    fn channel_not_configured_names_the_channel() {
        let e = ChannelError::NotConfigured("discord".into());
        assert_eq!(e.to_string(), "channel discord is not configured");
    }
}
