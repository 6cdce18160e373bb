//! The configuration record and its defaults.

use std::fmt;

use microclaw_core::Ident;

/// Hard cap on allow-list entries per channel.
pub const ALLOW_LIST_MAX: usize = 8;

/// Sender identifiers permitted to talk to the device.
///
/// An empty list accepts everyone. A non-empty list matches exact
/// identifiers only, and an empty identifier never matches anything, so
/// a sender whose id failed to parse is rejected rather than waved
/// through.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    entries: Vec<Ident>,
}

impl AllowList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[Ident] {
        &self.entries
    }

    /// Add an entry. Returns `false` when the list is full or the id is
    /// empty; duplicates are accepted silently.
    pub fn add(&mut self, id: Ident) -> bool {
        if id.is_empty() || self.entries.len() >= ALLOW_LIST_MAX {
            return false;
        }
        self.entries.push(id);
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_allowed(&self, id: &Ident) -> bool {
        if self.entries.is_empty() {
            return true;
        }
        if id.is_empty() {
            return false;
        }
        self.entries.iter().any(|e| e == id)
    }
}

impl fmt::Debug for AllowList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter()).finish()
    }
}

/// Per-channel settings shared by Telegram and Discord.
#[derive(Clone, Default)]
pub struct ChannelCfg {
    pub enabled: bool,
    pub token: String,
    pub allow_from: AllowList,
}

impl fmt::Debug for ChannelCfg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelCfg")
            .field("enabled", &self.enabled)
            .field("token", &redact(&self.token))
            .field("allow_from", &self.allow_from)
            .finish()
    }
}

/// Every persistent setting on the device.
#[derive(Clone)]
pub struct Config {
    pub wifi_ssid: String,
    pub wifi_pass: String,

    pub llm_provider: String,
    pub llm_api_key: String,
    pub llm_api_base: String,
    pub llm_model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub max_tool_iters: u32,
    pub heartbeat_ms: u64,

    pub telegram: ChannelCfg,
    pub discord: ChannelCfg,
    pub discord_channel_id: Ident,

    /// Next Telegram update id to request.
    pub tg_offset: i64,
    /// Highest Discord message id already handled.
    pub dc_last_id: Ident,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wifi_ssid: String::new(),
            wifi_pass: String::new(),
            llm_provider: "openrouter".to_string(),
            llm_api_key: String::new(),
            llm_api_base: "https://openrouter.ai/api/v1".to_string(),
            llm_model: "meta-llama/llama-3.1-8b-instruct:free".to_string(),
            max_tokens: 512,
            temperature: 0.7,
            max_tool_iters: 3,
            heartbeat_ms: 0,
            telegram: ChannelCfg::default(),
            discord: ChannelCfg::default(),
            discord_channel_id: Ident::empty(),
            tg_offset: 0,
            dc_last_id: Ident::empty(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("wifi_ssid", &self.wifi_ssid)
            .field("wifi_pass", &redact(&self.wifi_pass))
            .field("llm_provider", &self.llm_provider)
            .field("llm_api_key", &redact(&self.llm_api_key))
            .field("llm_api_base", &self.llm_api_base)
            .field("llm_model", &self.llm_model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("max_tool_iters", &self.max_tool_iters)
            .field("heartbeat_ms", &self.heartbeat_ms)
            .field("telegram", &self.telegram)
            .field("discord", &self.discord)
            .field("discord_channel_id", &self.discord_channel_id)
            .field("tg_offset", &self.tg_offset)
            .field("dc_last_id", &self.dc_last_id)
            .finish()
    }
}

fn redact(s: &str) -> &'static str {
    if s.is_empty() {
        ""
    } else {
        "[REDACTED]"
    }
}
