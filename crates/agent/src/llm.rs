//! OpenAI-compatible chat completion over the blocking transport.
//!
//! The request body is assembled by hand into a capped buffer; history
//! that does not fit is dropped rather than growing the allocation. HTTP
//! and parse failures come back as bracketed placeholder strings so the
//! user always sees something, while transport failures propagate as
//! errors for the caller to translate.

use std::time::Duration;

use microclaw_config::Config;
use microclaw_core::{prefix, Error, SessionLog};
use microclaw_transport::{Endpoint, IdleNotify, Request, Scheme};
use microclaw_wire::{escape_into, extract_string_into, find_field, object_slice};
use tracing::{debug, warn};

/// Cap on the serialized request body.
const BODY_CAP: usize = 4096;

/// Cap on extracted reply text.
pub const REPLY_CAP: usize = 2048;

/// How much of an error payload makes it into a placeholder.
const SNIPPET: usize = 120;

pub struct LlmClient {
    endpoint: Endpoint,
}

impl Default for LlmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl LlmClient {
    pub fn new() -> Self {
        Self { endpoint: Endpoint::new("llm") }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.endpoint = self.endpoint.with_timeout(timeout);
        self
    }

    /// One completion round over the whole session.
    ///
    /// The returned string is always deliverable: a model reply, or a
    /// bracketed placeholder describing what went wrong upstream.
    pub fn chat(
        &mut self,
        cfg: &Config,
        system: &str,
        session: &SessionLog,
        idle: &mut dyn IdleNotify,
    ) -> Result<String, Error> {
        let (scheme, host, port, path_prefix) = split_api_base(&cfg.llm_api_base);
        let path = format!("{path_prefix}/chat/completions");
        let body = build_body(cfg, system, session);
        let auth = format!("Bearer {}", cfg.llm_api_key);
        let req = Request {
            scheme,
            host: &host,
            port,
            path: &path,
            extra_headers: &[("Authorization", &auth)],
            body: Some(&body),
        };
        let resp = self.endpoint.request(&req, idle)?;

        if !resp.ok() {
            warn!(status = resp.status, "completion request failed");
            return Ok(format!("[LLM {}] {}", resp.status, prefix(&resp.body, SNIPPET)));
        }

        // narrow to the first choice's message before reading any text
        // field; error payloads can carry look-alike keys at other levels
        let Some(choices) = find_field(&resp.body, "choices") else {
            return Ok(format!("[parse:choices] {}", prefix(&resp.body, SNIPPET)));
        };
        let Some(message) = find_field(choices, "message").and_then(object_slice) else {
            return Ok(format!("[parse:message] {}", prefix(&resp.body, SNIPPET)));
        };

        // primary field first, then the reasoning fallbacks some
        // providers use when content comes back empty
        let mut reply = String::new();
        let mut found = false;
        for field in ["content", "reasoning_content", "reasoning"] {
            if let Some(v) = find_field(message, field) {
                found = true;
                reply.clear();
                extract_string_into(v, &mut reply, REPLY_CAP);
                if !reply.is_empty() {
                    break;
                }
            }
        }
        if !found {
            return Ok(format!("[parse:content] {}", prefix(&resp.body, SNIPPET)));
        }
        if reply.is_empty() {
            return Ok("[model returned empty response]".to_string());
        }
        debug!(len = reply.len(), "reply extracted");
        Ok(reply)
    }
}

/// Break an api base like `https://host:port/v1` into its parts.
/// Defaults: https, the scheme's port, empty path prefix.
fn split_api_base(base: &str) -> (Scheme, String, u16, String) {
    let (scheme, rest) = if let Some(r) = base.strip_prefix("https://") {
        (Scheme::Https, r)
    } else if let Some(r) = base.strip_prefix("http://") {
        (Scheme::Http, r)
    } else {
        (Scheme::Https, base)
    };
    let (authority, path) = match rest.find('/') {
        Some(pos) => (&rest[..pos], rest[pos..].trim_end_matches('/')),
        None => (rest, ""),
    };
    let (host, port) = match authority.rsplit_once(':') {
        Some((h, p)) => match p.parse::<u16>() {
            Ok(n) => (h, n),
            Err(_) => (authority, scheme.default_port()),
        },
        None => (authority, scheme.default_port()),
    };
    (scheme, host.to_string(), port, path.to_string())
}

fn build_body(cfg: &Config, system: &str, session: &SessionLog) -> String {
    let mut body = String::with_capacity(1024);
    body.push_str("{\"model\":\"");
    escape_into(&cfg.llm_model, &mut body, BODY_CAP);
    body.push_str(&format!(
        "\",\"max_tokens\":{},\"temperature\":{:.2},\"stream\":false,\"messages\":[",
        cfg.max_tokens, cfg.temperature
    ));
    body.push_str("{\"role\":\"system\",\"content\":\"");
    escape_into(system, &mut body, BODY_CAP);
    body.push_str("\"}");
    for (role, content) in session.entries() {
        // leave room for the closing of this entry and the envelope
        if body.len() + 64 >= BODY_CAP {
            break;
        }
        body.push_str(",{\"role\":\"");
        body.push_str(role);
        body.push_str("\",\"content\":\"");
        escape_into(content, &mut body, BODY_CAP.saturating_sub(16));
        body.push_str("\"}");
    }
    body.push_str("]}");
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::{serve, Exchange};
    use microclaw_transport::NoopIdle;

    fn cfg_for(port: u16) -> Config {
        let mut cfg = Config::default();
        cfg.llm_api_base = format!("http://127.0.0.1:{port}");
        cfg.llm_api_key = "sk-test".to_string();
        cfg
    }

    fn one_message() -> SessionLog {
        let mut s = SessionLog::new();
        s.push("user", "hello");
        s
    }

    #[test]
    fn api_base_parsing_covers_the_common_shapes() {
        let (s, h, p, pre) = split_api_base("https://openrouter.ai/api/v1");
        assert_eq!(s, Scheme::Https);
        assert_eq!(h, "openrouter.ai");
        assert_eq!(p, 443);
        assert_eq!(pre, "/api/v1");

        let (s, h, p, pre) = split_api_base("http://127.0.0.1:8080");
        assert_eq!(s, Scheme::Http);
        assert_eq!(h, "127.0.0.1");
        assert_eq!(p, 8080);
        assert_eq!(pre, "");

        let (_, h, p, _) = split_api_base("api.example.com/v1/");
        assert_eq!(h, "api.example.com");
        assert_eq!(p, 443);
    }

    #[test]
    fn happy_path_extracts_the_reply() {
        let (port, server) = serve(vec![Exchange::json(
            r#"{"choices":[{"message":{"role":"assistant","content":"hi there"}}]}"#,
        )]);
        let mut client = LlmClient::new().with_timeout(Duration::from_secs(5));
        let reply = client
            .chat(&cfg_for(port), "be brief", &one_message(), &mut NoopIdle)
            .unwrap();
        assert_eq!(reply, "hi there");

        let reqs = server.join().unwrap();
        assert!(reqs[0].head.contains("POST /chat/completions"));
        assert!(reqs[0].head.contains("Authorization: Bearer sk-test"));
        assert!(reqs[0].body.contains("\"stream\":false"));
        assert!(reqs[0].body.contains("\"role\":\"system\""));
        assert!(reqs[0].body.contains("\"content\":\"hello\""));
    }

    #[test]
    fn reasoning_fallback_fills_an_empty_content() {
        let (port, _server) = serve(vec![Exchange::json(
            r#"{"choices":[{"message":{"content":"","reasoning":"thinking aloud"}}]}"#,
        )]);
        let mut client = LlmClient::new().with_timeout(Duration::from_secs(5));
        let reply = client
            .chat(&cfg_for(port), "s", &one_message(), &mut NoopIdle)
            .unwrap();
        assert_eq!(reply, "thinking aloud");
    }

    #[test]
    fn empty_everything_yields_the_placeholder() {
        let (port, _server) = serve(vec![Exchange::json(
            r#"{"choices":[{"message":{"content":""}}]}"#,
        )]);
        let mut client = LlmClient::new().with_timeout(Duration::from_secs(5));
        let reply = client
            .chat(&cfg_for(port), "s", &one_message(), &mut NoopIdle)
            .unwrap();
        assert_eq!(reply, "[model returned empty response]");
    }

    #[test]
    fn http_error_becomes_a_status_placeholder() {
        let (port, _server) = serve(vec![Exchange::status(429, "slow down")]);
        let mut client = LlmClient::new().with_timeout(Duration::from_secs(5));
        let reply = client
            .chat(&cfg_for(port), "s", &one_message(), &mut NoopIdle)
            .unwrap();
        assert_eq!(reply, "[LLM 429] slow down");
    }

    #[test]
    fn each_missing_level_names_itself_in_the_placeholder() {
        let bodies = [
            (r#"{"error":"nope"}"#, "[parse:choices]"),
            (r#"{"choices":[{"text":"legacy shape"}]}"#, "[parse:message]"),
            (r#"{"choices":[{"message":{"role":"assistant"}}]}"#, "[parse:content]"),
        ];
        for (body, expected) in bodies {
            let (port, _server) = serve(vec![Exchange::json(body)]);
            let mut client = LlmClient::new().with_timeout(Duration::from_secs(5));
            let reply = client
                .chat(&cfg_for(port), "s", &one_message(), &mut NoopIdle)
                .unwrap();
            assert!(reply.starts_with(expected), "{body} gave {reply}");
        }
    }

    #[test]
    fn error_payloads_with_stray_text_fields_are_not_replies() {
        // a quota error that happens to carry a "content" key outside
        // any choice must not be mistaken for model output
        let (port, _server) = serve(vec![Exchange::json(
            r#"{"error":{"code":429,"content":"quota exceeded, add credits"}}"#,
        )]);
        let mut client = LlmClient::new().with_timeout(Duration::from_secs(5));
        let reply = client
            .chat(&cfg_for(port), "s", &one_message(), &mut NoopIdle)
            .unwrap();
        assert!(reply.starts_with("[parse:choices]"), "got {reply}");
    }

    #[test]
    fn request_body_stays_under_the_cap() {
        let mut session = SessionLog::new();
        for i in 0..80 {
            session.push("user", &format!("padding message number {i} {}", "x".repeat(60)));
        }
        let body = build_body(&Config::default(), "sys", &session);
        assert!(body.len() <= BODY_CAP + 64);
        assert!(body.ends_with("]}"));
    }
}
