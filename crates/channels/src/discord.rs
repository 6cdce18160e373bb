//! Discord channel polling over the plain REST API.
//!
//! Messages are fetched with `?after=<cursor>`; ids are snowflakes that
//! overflow `i64`, so the cursor is kept as text and compared
//! length-then-lexically. The very first poll (empty cursor) fetches one
//! message only to seat the cursor at the newest id; nothing from before
//! the device came up is ever answered.

use std::cmp::Ordering;
use std::time::{Duration, Instant};

use microclaw_config::Store;
use microclaw_core::{ChannelError, Error, Ident};
use microclaw_transport::{Endpoint, IdleNotify, Request, Scheme};
use microclaw_wire::{escape_into, extract_bool, extract_ident, extract_string_into, object_slice};
use tracing::{debug, warn};

use crate::split_chunks;

/// Minimum spacing between polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Outbound chunk size; Discord caps messages at 2000 chars.
pub const MSG_CHUNK: usize = 1800;

const TEXT_CAP: usize = 2048;

/// One accepted inbound message.
#[derive(Debug)]
pub struct DiscordMessage {
    pub author: Ident,
    pub text: String,
}

pub struct DiscordPoller {
    endpoint: Endpoint,
    scheme: Scheme,
    host: String,
    port: u16,
    last_poll: Option<Instant>,
    poll_interval: Duration,
}

impl Default for DiscordPoller {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscordPoller {
    pub fn new() -> Self {
        Self {
            endpoint: Endpoint::new("discord"),
            scheme: Scheme::Https,
            host: "discord.com".to_string(),
            port: 443,
            last_poll: None,
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Point the poller at a different server. Test hook; local servers
    /// need no settle delay between connections.
    pub fn with_endpoint(mut self, host: &str, port: u16, scheme: Scheme) -> Self {
        self.host = host.to_string();
        self.port = port;
        self.scheme = scheme;
        self.endpoint = self.endpoint.with_settle(Duration::ZERO);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.endpoint = self.endpoint.with_timeout(timeout);
        self
    }

    /// Fetch new messages after the cursor, oldest first.
    pub fn poll(
        &mut self,
        store: &mut Store,
        idle: &mut dyn IdleNotify,
    ) -> Result<Vec<DiscordMessage>, Error> {
        let cfg = &store.config.discord;
        if !cfg.enabled || cfg.token.is_empty() || store.config.discord_channel_id.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(t) = self.last_poll {
            if t.elapsed() < self.poll_interval {
                return Ok(Vec::new());
            }
        }
        self.last_poll = Some(Instant::now());

        let first_poll = store.config.dc_last_id.is_empty();
        let path = if first_poll {
            format!(
                "/api/v10/channels/{}/messages?limit=1",
                store.config.discord_channel_id
            )
        } else {
            format!(
                "/api/v10/channels/{}/messages?after={}&limit=5",
                store.config.discord_channel_id, store.config.dc_last_id
            )
        };
        let auth = format!("Bot {}", store.config.discord.token);
        let req = Request {
            scheme: self.scheme,
            host: &self.host,
            port: self.port,
            path: &path,
            extra_headers: &[("Authorization", &auth)],
            body: None,
        };
        let resp = self.endpoint.request(&req, idle)?;
        if !resp.ok() {
            warn!(status = resp.status, "discord poll rejected");
            return Ok(Vec::new());
        }

        let items = array_items(&resp.body);
        if first_poll {
            // seat the cursor at the newest message, answer nothing
            if let Some(id) = items
                .first()
                .and_then(|item| top_level_field(item, "id"))
                .and_then(|v| extract_ident(v).ok())
            {
                store.config.dc_last_id = id;
                if let Err(e) = store.save() {
                    warn!(error = %e, "failed to persist discord cursor");
                }
            }
            return Ok(Vec::new());
        }

        // the API returns newest first; answer in conversation order
        let mut out = Vec::new();
        let mut newest: Option<Ident> = None;
        for item in items.iter().rev() {
            let Some(id) = top_level_field(item, "id").and_then(|v| extract_ident(v).ok())
            else {
                continue;
            };
            if id.numeric_cmp(&store.config.dc_last_id) != Ordering::Greater {
                continue;
            }
            let advance = match &newest {
                Some(n) => id.numeric_cmp(n) == Ordering::Greater,
                None => true,
            };
            if advance {
                newest = Some(id);
            }

            let author = top_level_field(item, "author").and_then(object_slice);
            let from_bot = author
                .and_then(|a| top_level_field(a, "bot"))
                .and_then(extract_bool)
                .unwrap_or(false);
            if from_bot {
                continue;
            }
            let author_id = author
                .and_then(|a| top_level_field(a, "id"))
                .and_then(|v| extract_ident(v).ok())
                .unwrap_or_else(Ident::empty);
            if !store.config.discord.allow_from.is_allowed(&author_id) {
                debug!(author = %author_id, "discord author not in allow list");
                continue;
            }
            let mut text = String::new();
            if let Some(v) = top_level_field(item, "content") {
                extract_string_into(v, &mut text, TEXT_CAP);
            }
            if !text.is_empty() {
                out.push(DiscordMessage { author: author_id, text });
            }
        }

        if let Some(n) = newest {
            store.config.dc_last_id = n;
            if let Err(e) = store.save() {
                warn!(error = %e, "failed to persist discord cursor");
            }
        }
        Ok(out)
    }

    /// Deliver `text` to the configured channel, in chunks.
    pub fn send(
        &mut self,
        token: &str,
        channel: &Ident,
        text: &str,
        idle: &mut dyn IdleNotify,
    ) -> Result<(), Error> {
        let path = format!("/api/v10/channels/{channel}/messages");
        let auth = format!("Bot {token}");
        for chunk in split_chunks(text, MSG_CHUNK) {
            let mut body = String::from("{\"content\":\"");
            let cap = body.len() + chunk.len() * 6;
            escape_into(chunk, &mut body, cap);
            body.push_str("\"}");
            let req = Request {
                scheme: self.scheme,
                host: &self.host,
                port: self.port,
                path: &path,
                extra_headers: &[("Authorization", &auth)],
                body: Some(&body),
            };
            let resp = self.endpoint.request(&req, idle)?;
            if !resp.ok() {
                return Err(ChannelError::DeliveryFailed {
                    channel: "discord".to_string(),
                    status: resp.status,
                }
                .into());
            }
        }
        Ok(())
    }
}

/// Split a JSON array body into its top-level objects.
fn array_items(body: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut i = 0;
    let bytes = body.as_bytes();
    while i < bytes.len() {
        if bytes[i] == b'{' {
            match object_slice(&body[i..]) {
                Some(obj) => {
                    items.push(obj);
                    i += obj.len();
                }
                None => break,
            }
        } else {
            i += 1;
        }
    }
    items
}

/// Value of `key` at the top level of `obj`, ignoring identical keys in
/// nested objects ("id" appears in the message, its author, embeds..).
fn top_level_field<'a>(obj: &'a str, key: &str) -> Option<&'a str> {
    let bytes = obj.as_bytes();
    if bytes.first() != Some(&b'{') {
        return None;
    }
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                let start = i + 1;
                let mut j = start;
                let mut escaped = false;
                while j < bytes.len() {
                    let b = bytes[j];
                    if escaped {
                        escaped = false;
                    } else if b == b'\\' {
                        escaped = true;
                    } else if b == b'"' {
                        break;
                    }
                    j += 1;
                }
                let s = &obj[start..j.min(bytes.len())];
                i = j + 1;
                let mut k = i;
                while k < bytes.len() && bytes[k].is_ascii_whitespace() {
                    k += 1;
                }
                // a string followed by a colon is a key; anything else
                // was a value and is skipped
                if depth == 1 && k < bytes.len() && bytes[k] == b':' && s == key {
                    let mut v = k + 1;
                    while v < bytes.len() && bytes[v].is_ascii_whitespace() {
                        v += 1;
                    }
                    return (v < bytes.len()).then(|| &obj[v..]);
                }
            }
            b'{' | b'[' => {
                depth += 1;
                i += 1;
            }
            b'}' | b']' => {
                depth = depth.saturating_sub(1);
                i += 1;
            }
            _ => i += 1,
        }
    }
    None
}
