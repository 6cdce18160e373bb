//! # MicroClaw Wire
//!
//! Forward-only JSON scanning and escaping over caller-owned buffers.
//!
//! Remote APIs speak JSON but the device budget does not stretch to a DOM
//! parser, so this crate works the other way around: the caller names a
//! field, the scanner walks the raw bytes to the value, and extraction
//! writes into a buffer with a hard cap. Nothing here allocates; every
//! write is bounded and truncation is explicit in the return value.
//!
//! The scanners are deliberately literal. [`find_field`] matches a quoted
//! key byte-for-byte anywhere in the slice, so callers narrow the slice to
//! the object they mean (see `DiscordPoller` for the pattern) rather than
//! trusting key names to be globally unique.

mod escape;
mod parse;

pub use escape::escape_into;
pub use parse::{
    extract_bool, extract_bounded, extract_f32, extract_ident, extract_integer,
    extract_string_into, find_field, integer_or_zero, object_slice, IntParse,
};
