//! Telegram long-poll client.
//!
//! Inbound messages arrive through `getUpdates` with an offset cursor.
//! The cursor advances to the highest update id seen plus one and is
//! persisted immediately, including when the sender was rejected, so a
//! disallowed message is consumed once instead of being refetched on
//! every poll.

use std::time::{Duration, Instant};

use microclaw_config::Store;
use microclaw_core::{ChannelError, Error, Ident};
use microclaw_transport::{Endpoint, IdleNotify, Request, Scheme};
use microclaw_wire::{
    escape_into, extract_ident, extract_integer, extract_string_into, find_field,
    object_slice, IntParse,
};
use tracing::{debug, warn};

use crate::split_chunks;

/// Minimum spacing between polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Outbound chunk size; the API caps messages at 4096 chars and we stay
/// well under it.
pub const MSG_CHUNK: usize = 3800;

/// Cap on extracted message text.
const TEXT_CAP: usize = 2048;

/// One accepted inbound message.
#[derive(Debug)]
pub struct TelegramUpdate {
    pub chat: Ident,
    pub text: String,
}

pub struct TelegramPoller {
    endpoint: Endpoint,
    scheme: Scheme,
    host: String,
    port: u16,
    last_poll: Option<Instant>,
    poll_interval: Duration,
}

impl Default for TelegramPoller {
    fn default() -> Self {
        Self::new()
    }
}

impl TelegramPoller {
    pub fn new() -> Self {
        Self {
            endpoint: Endpoint::new("telegram"),
            scheme: Scheme::Https,
            host: "api.telegram.org".to_string(),
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

    /// Fetch pending updates, advance the cursor, and return the
    /// messages that passed the allow list.
    pub fn poll(
        &mut self,
        store: &mut Store,
        idle: &mut dyn IdleNotify,
    ) -> Result<Vec<TelegramUpdate>, Error> {
        if !store.config.telegram.enabled || store.config.telegram.token.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(t) = self.last_poll {
            if t.elapsed() < self.poll_interval {
                return Ok(Vec::new());
            }
        }
        self.last_poll = Some(Instant::now());

        let path = format!(
            "/bot{}/getUpdates?offset={}&timeout=1&limit=5",
            store.config.telegram.token, store.config.tg_offset
        );
        let resp = self.endpoint.request(
            &Request::get(self.scheme, &self.host, self.port, &path),
            idle,
        )?;
        if !resp.ok() {
            warn!(status = resp.status, "telegram poll rejected");
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        let mut max_seen: Option<i64> = None;
        let mut rest = resp.body.as_str();
        while let Some(v) = find_field(rest, "update_id") {
            let uid = match extract_integer(v) {
                IntParse::Number(n) => n,
                _ => break,
            };
            // one update runs until the next update_id key
            let (scope, next) = match v.find("\"update_id\"") {
                Some(pos) => (&v[..pos], &v[pos..]),
                None => (v, ""),
            };
            max_seen = Some(max_seen.map_or(uid, |m| m.max(uid)));

            let sender = nested_id(scope, "from");
            let chat = nested_id(scope, "chat");
            let mut text = String::new();
            if let Some(tv) = find_field(scope, "text") {
                extract_string_into(tv, &mut text, TEXT_CAP);
            }

            if !store.config.telegram.allow_from.is_allowed(&sender) {
                debug!(sender = %sender, "telegram sender not in allow list");
            } else if !text.is_empty() && !chat.is_empty() {
                out.push(TelegramUpdate { chat, text });
            }
            rest = next;
        }

        if let Some(m) = max_seen {
            if m + 1 > store.config.tg_offset {
                store.config.tg_offset = m + 1;
                if let Err(e) = store.save() {
                    warn!(error = %e, "failed to persist telegram cursor");
                }
            }
        }
        Ok(out)
    }

    /// Deliver `text` to `chat`, split into API-sized chunks.
    pub fn send(
        &mut self,
        token: &str,
        chat: &Ident,
        text: &str,
        idle: &mut dyn IdleNotify,
    ) -> Result<(), Error> {
        let path = format!("/bot{token}/sendMessage");
        for chunk in split_chunks(text, MSG_CHUNK) {
            // chat_id goes out quoted; the API accepts both and ids are
            // held as text end to end
            let mut body = format!("{{\"chat_id\":\"{}\",\"text\":\"", chat.as_str());
            let cap = body.len() + chunk.len() * 6;
            escape_into(chunk, &mut body, cap);
            body.push_str("\"}");
            let resp = self.endpoint.request(
                &Request::post(self.scheme, &self.host, self.port, &path, &body),
                idle,
            )?;
            if !resp.ok() {
                return Err(ChannelError::DeliveryFailed {
                    channel: "telegram".to_string(),
                    status: resp.status,
                }
                .into());
            }
        }
        Ok(())
    }
}

/// Id of a nested object field, empty when absent or unparseable.
/// Empty identifiers never pass a non-empty allow list, so a mangled
/// sender is rejected rather than accepted.
fn nested_id(scope: &str, key: &str) -> Ident {
    find_field(scope, key)
        .and_then(object_slice)
        .and_then(|obj| find_field(obj, "id"))
        .and_then(|v| extract_ident(v).ok())
        .unwrap_or_else(Ident::empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::{serve, Exchange};
    use microclaw_config::JsonStore;
    use microclaw_transport::NoopIdle;
    use tempfile::TempDir;

    fn store_with_telegram(dir: &TempDir) -> Store {
        let mut store =
            Store::open(Box::new(JsonStore::new(dir.path().join("config.json")))).unwrap();
        store.config.telegram.enabled = true;
        store.config.telegram.token = "123:ABC".to_string();
        store
    }

    fn poller(port: u16) -> TelegramPoller {
        TelegramPoller::new()
            .with_endpoint("127.0.0.1", port, Scheme::Http)
            .with_timeout(Duration::from_secs(5))
    }

    const UPDATES: &str = r#"{"ok":true,"result":[
        {"update_id":100,"message":{"from":{"id":42},"chat":{"id":42},"text":"first"}},
        {"update_id":101,"message":{"from":{"id":77},"chat":{"id":77},"text":"second"}}
    ]}"#;

    #[test]
    fn accepted_updates_come_back_and_cursor_persists() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with_telegram(&dir);
        let (port, server) = serve(vec![Exchange::json(UPDATES)]);

        let mut p = poller(port);
        let got = p.poll(&mut store, &mut NoopIdle).unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].chat.as_str(), "42");
        assert_eq!(got[0].text, "first");
        assert_eq!(got[1].text, "second");
        assert_eq!(store.config.tg_offset, 102);

        let reqs = server.join().unwrap();
        assert!(reqs[0].head.contains("GET /bot123:ABC/getUpdates?offset=0&timeout=1&limit=5"));

        // the cursor reached disk, not just memory
        let mut fresh =
            Store::open(Box::new(JsonStore::new(dir.path().join("config.json")))).unwrap();
        fresh.reload().unwrap();
        assert_eq!(fresh.config.tg_offset, 102);
    }

    #[test]
    fn out_of_order_update_ids_keep_the_highest_cursor() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with_telegram(&dir);
        let body = r#"{"ok":true,"result":[
            {"update_id":205,"message":{"from":{"id":1},"chat":{"id":1},"text":"late"}},
            {"update_id":203,"message":{"from":{"id":1},"chat":{"id":1},"text":"early"}}
        ]}"#;
        let (port, _server) = serve(vec![Exchange::json(body)]);

        let got = poller(port).poll(&mut store, &mut NoopIdle).unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(store.config.tg_offset, 206);
    }

    #[test]
    fn rejected_sender_still_advances_the_cursor() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with_telegram(&dir);
        store
            .config
            .telegram
            .allow_from
            .add(Ident::from_i64(42).unwrap());
        let (port, _server) = serve(vec![Exchange::json(UPDATES)]);

        let got = poller(port).poll(&mut store, &mut NoopIdle).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].chat.as_str(), "42");
        assert_eq!(store.config.tg_offset, 102);
    }

    #[test]
    fn disabled_channel_never_touches_the_network() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with_telegram(&dir);
        store.config.telegram.enabled = false;
        // no server bound; a request attempt would error
        let got = poller(1).poll(&mut store, &mut NoopIdle).unwrap();
        assert!(got.is_empty());
    }

    #[test]
    fn empty_text_updates_are_consumed_silently() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with_telegram(&dir);
        let body = r#"{"ok":true,"result":[{"update_id":7,"message":{"from":{"id":1},"chat":{"id":1}}}]}"#;
        let (port, _server) = serve(vec![Exchange::json(body)]);

        let got = poller(port).poll(&mut store, &mut NoopIdle).unwrap();
        assert!(got.is_empty());
        assert_eq!(store.config.tg_offset, 8);
    }

    #[test]
    fn error_status_leaves_the_cursor_alone() {
        let dir = TempDir::new().unwrap();
        let mut store = store_with_telegram(&dir);
        store.config.tg_offset = 50;
        let (port, _server) = serve(vec![Exchange::status(502, "bad gateway")]);

        let got = poller(port).poll(&mut store, &mut NoopIdle).unwrap();
        assert!(got.is_empty());
        assert_eq!(store.config.tg_offset, 50);
    }

    #[test]
    fn long_replies_go_out_in_chunks() {
        let (port, server) = serve(vec![Exchange::json("{}"), Exchange::json("{}")]);
        let mut p = poller(port);
        let text = "x".repeat(MSG_CHUNK + 10);
        p.send("123:ABC", &Ident::from_i64(42).unwrap(), &text, &mut NoopIdle)
            .unwrap();

        let reqs = server.join().unwrap();
        assert_eq!(reqs.len(), 2);
        assert!(reqs[0].head.contains("POST /bot123:ABC/sendMessage"));
        assert!(reqs[0].body.starts_with("{\"chat_id\":\"42\",\"text\":\""));
        assert!(reqs[1].body.contains("xxxxxxxxxx"));
    }

    #[test]
    fn delivery_failure_surfaces_the_status() {
        let (port, _server) = serve(vec![Exchange::status(403, "forbidden")]);
        let err = poller(port)
            .send("123:ABC", &Ident::from_i64(42).unwrap(), "hi", &mut NoopIdle)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Channel(ChannelError::DeliveryFailed { status: 403, .. })
        ));
    }
}
