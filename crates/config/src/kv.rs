//! Keyed-file backend.
//!
//! One small file per setting under a directory, the way an NVS-style
//! keyed store lays things out. Absent keys mean "keep the default", so
//! a directory written by an older build still loads. Allow lists are
//! stored as numbered keys (`tg_allow_0` ..); saving removes stale
//! numbered keys past the current count so a shrunken list cannot
//! resurrect old entries on the next load.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use microclaw_core::{Ident, StoreError};
use tracing::debug;

use crate::record::{AllowList, Config, ALLOW_LIST_MAX};
use crate::store::StoreBackend;

/// [`StoreBackend`] persisting one file per key.
pub struct KvStore {
    dir: PathBuf,
}

impl KvStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn read_key(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.dir.join(key)) {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Read {
                path: self.dir.join(key).display().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn write_key(&self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::write(self.dir.join(key), value).map_err(|e| StoreError::Write {
            path: self.dir.join(key).display().to_string(),
            reason: e.to_string(),
        })
    }

    fn remove_key(&self, key: &str) {
        // a stale key that cannot be removed is not fatal
        let _ = fs::remove_file(self.dir.join(key));
    }

    fn load_allow(&self, prefix: &str, list: &mut AllowList) -> Result<(), StoreError> {
        list.clear();
        for i in 0..ALLOW_LIST_MAX {
            match self.read_key(&format!("{prefix}_{i}"))? {
                Some(v) => {
                    if let Ok(id) = Ident::from_text(v.trim()) {
                        list.add(id);
                    }
                }
                None => break,
            }
        }
        Ok(())
    }

    fn save_allow(&self, prefix: &str, list: &AllowList) -> Result<(), StoreError> {
        for (i, id) in list.entries().iter().enumerate() {
            self.write_key(&format!("{prefix}_{i}"), id.as_str())?;
        }
        for i in list.len()..ALLOW_LIST_MAX {
            self.remove_key(&format!("{prefix}_{i}"));
        }
        Ok(())
    }
}

fn parse_flag(v: &str) -> bool {
    matches!(v.trim(), "1" | "true")
}

impl StoreBackend for KvStore {
    fn load(&self, cfg: &mut Config) -> Result<(), StoreError> {
        if !self.dir.exists() {
            return Ok(());
        }
        macro_rules! get_str {
            ($key:literal, $dst:expr) => {
                if let Some(v) = self.read_key($key)? {
                    $dst = v;
                }
            };
        }
        macro_rules! get_num {
            ($key:literal, $dst:expr) => {
                if let Some(v) = self.read_key($key)? {
                    if let Ok(n) = v.trim().parse() {
                        $dst = n;
                    }
                }
            };
        }
        get_str!("wifi_ssid", cfg.wifi_ssid);
        get_str!("wifi_pass", cfg.wifi_pass);
        get_str!("llm_provider", cfg.llm_provider);
        get_str!("llm_api_key", cfg.llm_api_key);
        get_str!("llm_api_base", cfg.llm_api_base);
        get_str!("llm_model", cfg.llm_model);
        get_num!("max_tokens", cfg.max_tokens);
        get_num!("temperature", cfg.temperature);
        get_num!("max_tool_iters", cfg.max_tool_iters);
        get_num!("heartbeat_ms", cfg.heartbeat_ms);

        if let Some(v) = self.read_key("tg_enabled")? {
            cfg.telegram.enabled = parse_flag(&v);
        }
        get_str!("tg_token", cfg.telegram.token);
        self.load_allow("tg_allow", &mut cfg.telegram.allow_from)?;

        if let Some(v) = self.read_key("dc_enabled")? {
            cfg.discord.enabled = parse_flag(&v);
        }
        get_str!("dc_token", cfg.discord.token);
        if let Some(v) = self.read_key("dc_channel_id")? {
            if let Ok(id) = Ident::from_text(v.trim()) {
                cfg.discord_channel_id = id;
            }
        }
        self.load_allow("dc_allow", &mut cfg.discord.allow_from)?;

        get_num!("tg_offset", cfg.tg_offset);
        if let Some(v) = self.read_key("dc_last_id")? {
            if let Ok(id) = Ident::from_text(v.trim()) {
                cfg.dc_last_id = id;
            }
        }
        debug!(dir = %self.dir.display(), "config loaded");
        Ok(())
    }

    fn save(&self, cfg: &Config) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| StoreError::Write {
            path: self.dir.display().to_string(),
            reason: e.to_string(),
        })?;
        self.write_key("wifi_ssid", &cfg.wifi_ssid)?;
        self.write_key("wifi_pass", &cfg.wifi_pass)?;
        self.write_key("llm_provider", &cfg.llm_provider)?;
        self.write_key("llm_api_key", &cfg.llm_api_key)?;
        self.write_key("llm_api_base", &cfg.llm_api_base)?;
        self.write_key("llm_model", &cfg.llm_model)?;
        self.write_key("max_tokens", &cfg.max_tokens.to_string())?;
        self.write_key("temperature", &format!("{:.2}", cfg.temperature))?;
        self.write_key("max_tool_iters", &cfg.max_tool_iters.to_string())?;
        self.write_key("heartbeat_ms", &cfg.heartbeat_ms.to_string())?;

        self.write_key("tg_enabled", if cfg.telegram.enabled { "1" } else { "0" })?;
        self.write_key("tg_token", &cfg.telegram.token)?;
        self.save_allow("tg_allow", &cfg.telegram.allow_from)?;

        self.write_key("dc_enabled", if cfg.discord.enabled { "1" } else { "0" })?;
        self.write_key("dc_token", &cfg.discord.token)?;
        self.write_key("dc_channel_id", cfg.discord_channel_id.as_str())?;
        self.save_allow("dc_allow", &cfg.discord.allow_from)?;

        self.write_key("tg_offset", &cfg.tg_offset.to_string())?;
        self.write_key("dc_last_id", cfg.dc_last_id.as_str())?;
        Ok(())
    }
}
