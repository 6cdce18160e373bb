//! # MicroClaw Tools
//!
//! The small, fixed tool vocabulary the model may call.
//!
//! A tool call is a name and a raw argument string; the result is always
//! a short plain-text string, capped at [`RESULT_CAP`], that is fed back
//! into the conversation. There is no registry to extend at runtime: the
//! match in [`dispatch`] is the whole vocabulary, and an unknown name
//! reports itself honestly so the model stops retrying it.

use std::time::Duration;

use microclaw_config::Store;
use microclaw_core::{prefix, SessionLog};
use tracing::{debug, warn};

/// Cap on tool result text.
pub const RESULT_CAP: usize = 512;

/// What the network layer currently looks like.
#[derive(Debug, Clone, Default)]
pub struct NetStatus {
    pub connected: bool,
    pub ssid: String,
    pub ip: String,
}

/// Everything a tool may touch, borrowed for one dispatch.
pub struct ToolCtx<'a> {
    pub store: &'a mut Store,
    pub session: &'a mut SessionLog,
    pub net: &'a NetStatus,
    pub uptime: Duration,
    /// Messages the `message` tool wants delivered to the user right
    /// away, before the final reply. Drained by the control loop.
    pub outbox: Vec<String>,
}

impl<'a> ToolCtx<'a> {
    pub fn new(
        store: &'a mut Store,
        session: &'a mut SessionLog,
        net: &'a NetStatus,
        uptime: Duration,
    ) -> Self {
        Self { store, session, net, uptime, outbox: Vec::new() }
    }
}

/// Run one tool call and return its result text.
pub fn dispatch(name: &str, args: &str, ctx: &mut ToolCtx<'_>) -> String {
    debug!(tool = name, "tool call");
    let result = match name {
        "message" => message(args, ctx),
        "get_network_info" => network_info(ctx),
        "get_uptime" => format!("uptime: {}s", ctx.uptime.as_secs()),
        "set_config" => set_config(args, ctx),
        "get_config" => get_config(ctx),
        "reset_session" => {
            ctx.session.clear();
            "session cleared".to_string()
        }
        other => format!("[tool {other} not on this device]"),
    };
    prefix(&result, RESULT_CAP).to_string()
}

fn message(args: &str, ctx: &mut ToolCtx<'_>) -> String {
    let text = args.trim();
    if text.is_empty() {
        return "nothing to send".to_string();
    }
    ctx.outbox.push(text.to_string());
    "sent".to_string()
}

fn network_info(ctx: &ToolCtx<'_>) -> String {
    if ctx.net.connected {
        format!("connected ssid={} ip={}", ctx.net.ssid, ctx.net.ip)
    } else {
        "not connected".to_string()
    }
}

fn set_config(args: &str, ctx: &mut ToolCtx<'_>) -> String {
    let Some((key, value)) = args.split_once('=') else {
        return "usage: key=value".to_string();
    };
    let (key, value) = (key.trim(), value.trim());
    let cfg = &mut ctx.store.config;
    match key {
        "llm_model" => cfg.llm_model = value.to_string(),
        "llm_provider" => cfg.llm_provider = value.to_string(),
        "llm_api_key" => cfg.llm_api_key = value.to_string(),
        "llm_api_base" => cfg.llm_api_base = value.to_string(),
        "wifi_ssid" => cfg.wifi_ssid = value.to_string(),
        "wifi_pass" => cfg.wifi_pass = value.to_string(),
        "tg_token" => {
            cfg.telegram.token = value.to_string();
            cfg.telegram.enabled = true;
        }
        "dc_token" => {
            cfg.discord.token = value.to_string();
            cfg.discord.enabled = true;
        }
        "dc_channel_id" => match microclaw_core::Ident::from_text(value) {
            Ok(id) => cfg.discord_channel_id = id,
            Err(e) => return format!("bad channel id: {e}"),
        },
        other => return format!("unknown config key {other}"),
    }
    match ctx.store.save() {
        Ok(()) => format!("ok: {key} set"),
        Err(e) => {
            warn!(error = %e, "config save failed");
            format!("store error: {e}")
        }
    }
}

fn get_config(ctx: &ToolCtx<'_>) -> String {
    let cfg = &ctx.store.config;
    // secrets stay out of the conversation
    format!(
        "provider={} model={} base={} max_tokens={} temperature={:.2} max_tool_iters={} telegram={} discord={}",
        cfg.llm_provider,
        cfg.llm_model,
        cfg.llm_api_base,
        cfg.max_tokens,
        cfg.temperature,
        cfg.max_tool_iters,
        if cfg.telegram.enabled { "on" } else { "off" },
        if cfg.discord.enabled { "on" } else { "off" },
    )
}
