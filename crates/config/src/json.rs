//! Single-file JSON backend.
//!
//! The whole record is one capped document, rendered by hand through
//! [`microclaw_wire::escape_into`] and read back with the same scanners
//! the channel pollers use. Saves are atomic (write to a sibling temp
//! file, then rename). A render that would exceed [`FILE_CAP`] fails the
//! save instead of writing a clipped document.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use microclaw_core::StoreError;
use microclaw_wire::{
    escape_into, extract_bool, extract_f32, extract_ident, extract_integer,
    extract_string_into, find_field, object_slice, IntParse,
};
use tracing::debug;

use crate::record::{AllowList, ChannelCfg, Config};
use crate::store::StoreBackend;

/// Cap on the serialized document.
pub const FILE_CAP: usize = 2048;

/// [`StoreBackend`] persisting the record as one JSON file.
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StoreBackend for JsonStore {
    fn load(&self, cfg: &mut Config) -> Result<(), StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(StoreError::Read {
                    path: self.path.display().to_string(),
                    reason: e.to_string(),
                })
            }
        };
        parse_into(&text, cfg);
        debug!(path = %self.path.display(), "config loaded");
        Ok(())
    }

    fn save(&self, cfg: &Config) -> Result<(), StoreError> {
        let doc = render(cfg)?;
        let tmp = self.path.with_extension("tmp");
        let write_err = |e: std::io::Error| StoreError::Write {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        };
        fs::write(&tmp, doc.as_bytes()).map_err(write_err)?;
        fs::rename(&tmp, &self.path).map_err(write_err)?;
        Ok(())
    }
}

fn render(cfg: &Config) -> Result<String, StoreError> {
    let mut out = String::with_capacity(512);
    out.push('{');
    str_field(&mut out, "wifi_ssid", &cfg.wifi_ssid);
    str_field(&mut out, "wifi_pass", &cfg.wifi_pass);
    str_field(&mut out, "llm_provider", &cfg.llm_provider);
    str_field(&mut out, "llm_api_key", &cfg.llm_api_key);
    str_field(&mut out, "llm_api_base", &cfg.llm_api_base);
    str_field(&mut out, "llm_model", &cfg.llm_model);
    out.push_str(&format!("\"max_tokens\":{},", cfg.max_tokens));
    out.push_str(&format!("\"temperature\":{:.2},", cfg.temperature));
    out.push_str(&format!("\"max_tool_iters\":{},", cfg.max_tool_iters));
    out.push_str(&format!("\"heartbeat_ms\":{},", cfg.heartbeat_ms));

    out.push_str("\"telegram\":{");
    out.push_str(&format!("\"enabled\":{},", cfg.telegram.enabled));
    str_field(&mut out, "token", &cfg.telegram.token);
    allow_field(&mut out, &cfg.telegram.allow_from);
    out.push_str("},");

    out.push_str("\"discord\":{");
    out.push_str(&format!("\"enabled\":{},", cfg.discord.enabled));
    str_field(&mut out, "token", &cfg.discord.token);
    str_field(&mut out, "channel_id", cfg.discord_channel_id.as_str());
    allow_field(&mut out, &cfg.discord.allow_from);
    out.push_str("},");

    out.push_str(&format!("\"tg_offset\":{},", cfg.tg_offset));
    out.push_str(&format!("\"dc_last_id\":\"{}\"", cfg.dc_last_id.as_str()));
    out.push('}');

    if out.len() > FILE_CAP {
        return Err(StoreError::TooLarge { cap: FILE_CAP });
    }
    Ok(out)
}

fn str_field(out: &mut String, key: &str, value: &str) {
    out.push('"');
    out.push_str(key);
    out.push_str("\":\"");
    // the final cap check catches truncation, so pass an open cap here
    escape_into(value, out, usize::MAX);
    out.push_str("\",");
}

fn allow_field(out: &mut String, list: &AllowList) {
    out.push_str("\"allow_from\":[");
    for (i, id) in list.entries().iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push('"');
        out.push_str(id.as_str());
        out.push('"');
    }
    out.push(']');
}

fn parse_into(src: &str, cfg: &mut Config) {
    get_string(src, "wifi_ssid", &mut cfg.wifi_ssid);
    get_string(src, "wifi_pass", &mut cfg.wifi_pass);
    get_string(src, "llm_provider", &mut cfg.llm_provider);
    get_string(src, "llm_api_key", &mut cfg.llm_api_key);
    get_string(src, "llm_api_base", &mut cfg.llm_api_base);
    get_string(src, "llm_model", &mut cfg.llm_model);
    if let Some(IntParse::Number(n)) = find_field(src, "max_tokens").map(extract_integer) {
        cfg.max_tokens = n.clamp(1, u32::MAX as i64) as u32;
    }
    if let Some(t) = find_field(src, "temperature").and_then(extract_f32) {
        cfg.temperature = t;
    }
    if let Some(IntParse::Number(n)) = find_field(src, "max_tool_iters").map(extract_integer) {
        cfg.max_tool_iters = n.clamp(0, u32::MAX as i64) as u32;
    }
    if let Some(IntParse::Number(n)) = find_field(src, "heartbeat_ms").map(extract_integer) {
        cfg.heartbeat_ms = n.max(0) as u64;
    }

    if let Some(obj) = find_field(src, "telegram").and_then(object_slice) {
        parse_channel(obj, &mut cfg.telegram);
    }
    if let Some(obj) = find_field(src, "discord").and_then(object_slice) {
        parse_channel(obj, &mut cfg.discord);
        if let Some(id) = find_field(obj, "channel_id").and_then(|v| extract_ident(v).ok()) {
            cfg.discord_channel_id = id;
        }
    }

    if let Some(IntParse::Number(n)) = find_field(src, "tg_offset").map(extract_integer) {
        cfg.tg_offset = n;
    }
    if let Some(id) = find_field(src, "dc_last_id").and_then(|v| extract_ident(v).ok()) {
        cfg.dc_last_id = id;
    }
}

fn parse_channel(obj: &str, ch: &mut ChannelCfg) {
    if let Some(b) = find_field(obj, "enabled").and_then(extract_bool) {
        ch.enabled = b;
    }
    get_string(obj, "token", &mut ch.token);
    if let Some(arr) = find_field(obj, "allow_from") {
        parse_allow(arr, &mut ch.allow_from);
    }
}

fn get_string(src: &str, key: &str, out: &mut String) {
    if let Some(v) = find_field(src, key) {
        let mut s = String::new();
        if extract_string_into(v, &mut s, FILE_CAP) {
            *out = s;
        }
    }
}

/// Fill `list` from a JSON array of string or number ids. The stored
/// list is replaced wholesale.
fn parse_allow(arr: &str, list: &mut AllowList) {
    let bytes = arr.as_bytes();
    if bytes.first() != Some(&b'[') {
        return;
    }
    list.clear();
    let mut i = 1;
    while i < bytes.len() && bytes[i] != b']' {
        match bytes[i] {
            b' ' | b'\t' | b'\r' | b'\n' | b',' => i += 1,
            b'"' => {
                if let Ok(id) = extract_ident(&arr[i..]) {
                    list.add(id);
                }
                // advance past the closing quote
                i += 1;
                let mut escaped = false;
                while i < bytes.len() {
                    let b = bytes[i];
                    i += 1;
                    if escaped {
                        escaped = false;
                    } else if b == b'\\' {
                        escaped = true;
                    } else if b == b'"' {
                        break;
                    }
                }
            }
            b'-' | b'0'..=b'9' => {
                if let Ok(id) = extract_ident(&arr[i..]) {
                    list.add(id);
                }
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
            }
            _ => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use microclaw_core::Ident;
    use tempfile::TempDir;

    fn populated() -> Config {
        let mut cfg = Config::default();
        cfg.wifi_ssid = "shed".to_string();
        cfg.wifi_pass = "pa\"ss\nword".to_string();
        cfg.llm_api_key = "sk-or-v1-abc".to_string();
        cfg.max_tokens = 256;
        cfg.temperature = 0.25;
        cfg.telegram.enabled = true;
        cfg.telegram.token = "123:ABC".to_string();
        cfg.telegram.allow_from.add(Ident::from_i64(4242).unwrap());
        cfg.discord.enabled = true;
        cfg.discord.token = "dtoken".to_string();
        cfg.discord_channel_id = Ident::from_text("1146765432101234567").unwrap();
        cfg.discord
            .allow_from
            .add(Ident::from_text("999888777666555444").unwrap());
        cfg.tg_offset = 7322;
        cfg.dc_last_id = Ident::from_text("1200000000000000000").unwrap();
        cfg
    }

    #[test]
    fn rendered_document_is_valid_json() {
        let doc = render(&populated()).unwrap();
        let v: serde_json::Value = serde_json::from_str(&doc).unwrap();
        assert_eq!(v["wifi_ssid"], "shed");
        assert_eq!(v["wifi_pass"], "pa\"ss\nword");
        assert_eq!(v["telegram"]["enabled"], true);
        assert_eq!(v["telegram"]["allow_from"][0], "4242");
        assert_eq!(v["discord"]["channel_id"], "1146765432101234567");
        assert_eq!(v["tg_offset"], 7322);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::new(dir.path().join("config.json"));
        let cfg = populated();
        store.save(&cfg).unwrap();

        let mut loaded = Config::default();
        store.load(&mut loaded).unwrap();
        assert_eq!(loaded.wifi_ssid, cfg.wifi_ssid);
        assert_eq!(loaded.wifi_pass, cfg.wifi_pass);
        assert_eq!(loaded.max_tokens, 256);
        assert_eq!(loaded.temperature, 0.25);
        assert!(loaded.telegram.enabled);
        assert_eq!(loaded.telegram.token, "123:ABC");
        assert!(loaded
            .telegram
            .allow_from
            .is_allowed(&Ident::from_i64(4242).unwrap()));
        assert!(!loaded
            .telegram
            .allow_from
            .is_allowed(&Ident::from_i64(1).unwrap()));
        assert_eq!(loaded.discord_channel_id.as_str(), "1146765432101234567");
        assert_eq!(loaded.tg_offset, 7322);
        assert_eq!(loaded.dc_last_id.as_str(), "1200000000000000000");
    }

    #[test]
    fn missing_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::new(dir.path().join("absent.json"));
        let mut cfg = Config::default();
        store.load(&mut cfg).unwrap();
        assert_eq!(cfg.llm_provider, "openrouter");
    }

    #[test]
    fn partial_document_merges_over_defaults() {
        let mut cfg = Config::default();
        parse_into(r#"{"llm_model":"qwen/qwen-2.5-7b","max_tokens":128}"#, &mut cfg);
        assert_eq!(cfg.llm_model, "qwen/qwen-2.5-7b");
        assert_eq!(cfg.max_tokens, 128);
        assert_eq!(cfg.llm_provider, "openrouter");
        assert_eq!(cfg.temperature, 0.7);
    }

    #[test]
    fn nested_tokens_do_not_leak_across_objects() {
        // both objects carry a "token" field; each must land in its own
        let mut cfg = Config::default();
        parse_into(
            r#"{"telegram":{"enabled":true,"token":"tg-tok","allow_from":[]},"discord":{"enabled":false,"token":"dc-tok","channel_id":"77","allow_from":["5"]}}"#,
            &mut cfg,
        );
        assert_eq!(cfg.telegram.token, "tg-tok");
        assert_eq!(cfg.discord.token, "dc-tok");
        assert_eq!(cfg.discord_channel_id.as_str(), "77");
        assert_eq!(cfg.discord.allow_from.len(), 1);
        assert!(cfg.telegram.allow_from.is_empty());
    }

    #[test]
    fn numeric_allow_entries_parse_too() {
        let mut list = AllowList::new();
        parse_allow(r#"[111, "222", -333]"#, &mut list);
        assert_eq!(list.len(), 3);
        assert!(list.is_allowed(&Ident::from_i64(-333).unwrap()));
    }

    #[test]
    fn oversized_render_fails_instead_of_clipping() {
        let mut cfg = populated();
        cfg.llm_api_key = "k".repeat(FILE_CAP);
        assert!(matches!(
            render(&cfg),
            Err(StoreError::TooLarge { cap: FILE_CAP })
        ));
    }

    #[test]
    fn garbage_document_leaves_defaults_alone() {
        let mut cfg = Config::default();
        parse_into("not json at all", &mut cfg);
        assert_eq!(cfg.llm_provider, "openrouter");
        assert_eq!(cfg.max_tokens, 512);
    }
}
