//! # MicroClaw Channels
//!
//! Inbound polling and outbound delivery for the two chat surfaces.
//!
//! Both pollers follow the same contract: a poll is rate-limited, talks
//! to exactly one remote endpoint over the blocking transport, applies
//! the allow list, advances its cursor in the store even for rejected
//! senders, and hands accepted messages back to the caller. The caller
//! (the control loop) decides what to do with them; pollers never run
//! the agent themselves.

pub mod discord;
pub mod telegram;

#[cfg(test)]
pub(crate) mod tests_support;

pub use discord::{DiscordMessage, DiscordPoller};
pub use telegram::{TelegramPoller, TelegramUpdate};

/// Split `text` at char boundaries into pieces of at most `max` bytes.
///
/// Delivery endpoints cap message length; long replies go out as a
/// sequence of messages rather than being clipped.
pub fn split_chunks(text: &str, max: usize) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = text;
    while rest.len() > max {
        let mut cut = max;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        if cut == 0 {
            break;
        }
        out.push(&rest[..cut]);
        rest = &rest[cut..];
    }
    if !rest.is_empty() {
        out.push(rest);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_chunks("hello", 10), vec!["hello"]);
    }

    #[test]
    fn long_text_splits_at_the_cap() {
        let text = "a".repeat(25);
        let chunks = split_chunks(&text, 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 10);
        assert_eq!(chunks[2].len(), 5);
    }

    #[test]
    fn splits_respect_char_boundaries() {
        let text = "ééééé"; // two bytes per char
        let chunks = split_chunks(text, 3);
        for c in &chunks {
            assert!(!c.is_empty());
            assert!(c.len() <= 3);
        }
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(split_chunks("", 10).is_empty());
    }
}
