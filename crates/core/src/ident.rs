//! External identifier handling.
//!
//! Sender, chat, and message IDs arrive from the network as either JSON
//! numbers or JSON strings. Discord snowflakes run 17-19 decimal digits —
//! past the point where every toolchain's float path (and some integer
//! paths) preserve them — so every external ID is normalized to bounded
//! text and compared as text from then on.

use std::cmp::Ordering;
use std::fmt::Write as _;

use thiserror::Error;

use crate::bounded::BoundedString;

/// Byte capacity for one identifier.
///
/// Telegram user IDs are up to 10 digits today (int64 max is 19), group
/// chat IDs are `-100XXXXXXXXXX` (15 chars with sign), Discord snowflakes
/// are 17-19 digits. 32 bytes leaves comfortable headroom.
pub const IDENT_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IdentError {
    #[error("identifier does not fit in a {IDENT_LEN}-byte buffer")]
    Overflow,
    #[error("value is neither a JSON number nor a JSON string")]
    NotAnId,
}

/// An externally sourced identifier, normalized to bounded text.
///
/// An empty `Ident` is the fail-closed state: conversion failures zero the
/// buffer, and allow-list checks treat an empty identifier as "no match".
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Ident(BoundedString<IDENT_LEN>);

impl Ident {
    pub const fn empty() -> Self {
        Self(BoundedString::new())
    }

    /// Render a numeric identifier. On overflow the result is empty and an
    /// error is returned — never a truncated partial value.
    pub fn from_i64(v: i64) -> Result<Self, IdentError> {
        let mut out = BoundedString::new();
        if write!(out, "{v}").is_err() {
            return Err(IdentError::Overflow);
        }
        Ok(Self(out))
    }

    /// Normalize a textual identifier. Inputs longer than [`IDENT_LEN`]
    /// fail with an empty result.
    pub fn from_text(s: &str) -> Result<Self, IdentError> {
        let mut out = BoundedString::new();
        if !out.assign_or_clear(s) {
            return Err(IdentError::Overflow);
        }
        Ok(Self(out))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Compare two decimal identifiers by magnitude without parsing them:
    /// a longer digit string is larger; equal lengths compare lexically.
    ///
    /// This is the ordering used for the chat-REST polling cursor, where
    /// values exceed safe native-integer precision.
    pub fn numeric_cmp(&self, other: &Ident) -> Ordering {
        let (a, b) = (self.as_str(), other.as_str());
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    }
}

impl std::fmt::Display for Ident {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Debug for Ident {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ident({:?})", self.as_str())
    }
}

impl PartialEq<&str> for Ident {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}
