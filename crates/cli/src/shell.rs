//! The console command set.
//!
//! Commands arrive as whole lines and print their results directly; the
//! nonzero-effort ones (chat, connect) run inline on the loop thread, so
//! a long exchange stalls polling rather than racing it.

use microclaw_core::Ident;
use tracing::info;

use crate::app::App;
use crate::netinfo;

pub enum ShellAction {
    Continue,
    Reboot,
}

const HELP: &str = "\
commands:
  help | ?                    this list
  status                      uptime, network, channels, session
  wifi <ssid> <pass>          store credentials and reconnect
  connect                     re-probe the network
  set <key> <value>           set a config value (see 'show config')
  show config                 dump the redacted configuration
  tg token <t> | tg enable | tg disable
  tg allow <id> | tg allow list | tg allow clear
  dc token <t> | dc channel <id> | dc enable | dc disable
  dc allow <id> | dc allow list | dc allow clear
  chat <text>                 talk to the agent
  reset session               clear conversation history
  diag                        connectivity diagnostics
  reboot                      restart the loop";

pub fn handle(app: &mut App, line: &str) -> ShellAction {
    if line.is_empty() {
        return ShellAction::Continue;
    }
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        ["help"] | ["?"] => println!("{HELP}"),
        ["status"] => status(app),
        ["wifi", ssid, pass] => {
            app.store.config.wifi_ssid = ssid.to_string();
            app.store.config.wifi_pass = pass.to_string();
            save(app);
            app.net = netinfo::probe(ssid);
            println!(
                "wifi credentials stored, {}",
                if app.net.connected { "connected" } else { "not connected" }
            );
        }
        ["connect"] => {
            app.net = netinfo::probe(&app.store.config.wifi_ssid);
            println!("{}", if app.net.connected { "connected" } else { "not connected" });
        }
        ["set", key, rest @ ..] if !rest.is_empty() => set(app, key, &rest.join(" ")),
        ["show", "config"] => println!("{:#?}", app.store.config),
        ["tg", rest @ ..] => channel_cmd(app, true, rest),
        ["dc", rest @ ..] => channel_cmd(app, false, rest),
        ["chat", rest @ ..] if !rest.is_empty() => {
            let reply = app.run_agent(&rest.join(" "));
            println!("{reply}");
        }
        ["reset", "session"] => {
            app.session.clear();
            println!("session cleared");
        }
        ["diag"] => diag(app),
        ["reboot"] => {
            println!("rebooting");
            return ShellAction::Reboot;
        }
        _ => println!("unknown command, try 'help'"),
    }
    ShellAction::Continue
}

fn status(app: &App) {
    let cfg = &app.store.config;
    println!("uptime: {}s", app.started.elapsed().as_secs());
    if app.net.connected {
        println!("network: connected ssid={} ip={}", app.net.ssid, app.net.ip);
    } else {
        println!("network: not connected");
    }
    println!(
        "model: {} via {} ({})",
        cfg.llm_model, cfg.llm_provider, cfg.llm_api_base
    );
    println!(
        "telegram: {} allow={}",
        onoff(cfg.telegram.enabled),
        cfg.telegram.allow_from.len()
    );
    println!(
        "discord: {} channel={} allow={}",
        onoff(cfg.discord.enabled),
        cfg.discord_channel_id,
        cfg.discord.allow_from.len()
    );
    println!(
        "session: {} of {} bytes",
        app.session.len(),
        app.session.capacity()
    );
}

fn set(app: &mut App, key: &str, value: &str) {
    let cfg = &mut app.store.config;
    match key {
        "llm_provider" => cfg.llm_provider = value.to_string(),
        "llm_api_key" => cfg.llm_api_key = value.to_string(),
        "llm_api_base" => cfg.llm_api_base = value.to_string(),
        "llm_model" => cfg.llm_model = value.to_string(),
        "wifi_ssid" => cfg.wifi_ssid = value.to_string(),
        "wifi_pass" => cfg.wifi_pass = value.to_string(),
        "max_tokens" => match value.parse() {
            Ok(n) => cfg.max_tokens = n,
            Err(_) => return println!("max_tokens wants a number"),
        },
        "temperature" => match value.parse() {
            Ok(t) => cfg.temperature = t,
            Err(_) => return println!("temperature wants a number"),
        },
        "max_tool_iters" => match value.parse() {
            Ok(n) => cfg.max_tool_iters = n,
            Err(_) => return println!("max_tool_iters wants a number"),
        },
        "heartbeat_ms" => match value.parse() {
            Ok(n) => cfg.heartbeat_ms = n,
            Err(_) => return println!("heartbeat_ms wants a number"),
        },
        other => return println!("unknown config key {other}"),
    }
    save(app);
    println!("ok: {key} set");
}

fn channel_cmd(app: &mut App, telegram: bool, words: &[&str]) {
    let name = if telegram { "telegram" } else { "discord" };
    match words {
        ["token", t] => {
            let cfg = channel_of(app, telegram);
            cfg.token = t.to_string();
            cfg.enabled = true;
            save(app);
            println!("{name} token stored and channel enabled");
        }
        ["enable"] => {
            channel_of(app, telegram).enabled = true;
            save(app);
            println!("{name} enabled");
        }
        ["disable"] => {
            channel_of(app, telegram).enabled = false;
            save(app);
            println!("{name} disabled");
        }
        ["channel", id] if !telegram => match Ident::from_text(id) {
            Ok(id) => {
                app.store.config.discord_channel_id = id;
                save(app);
                println!("discord channel set");
            }
            Err(e) => println!("bad channel id: {e}"),
        },
        ["allow", "list"] => {
            let list = &channel_of(app, telegram).allow_from;
            if list.is_empty() {
                println!("{name} allow list empty (everyone accepted)");
            } else {
                for id in list.entries() {
                    println!("{id}");
                }
            }
        }
        ["allow", "clear"] => {
            channel_of(app, telegram).allow_from.clear();
            save(app);
            println!("{name} allow list cleared");
        }
        ["allow", id] => match Ident::from_text(id) {
            Ok(ident) => {
                if channel_of(app, telegram).allow_from.add(ident) {
                    save(app);
                    println!("{name} allow list: added {id}");
                } else {
                    println!("{name} allow list full or id empty");
                }
            }
            Err(e) => println!("bad id: {e}"),
        },
        _ => println!("unknown {name} command, try 'help'"),
    }
}

fn channel_of(app: &mut App, telegram: bool) -> &mut microclaw_config::ChannelCfg {
    if telegram {
        &mut app.store.config.telegram
    } else {
        &mut app.store.config.discord
    }
}

fn diag(app: &App) {
    let cfg = &app.store.config;
    println!("net: {:?}", app.net);
    println!("api base: {}", cfg.llm_api_base);
    println!(
        "llm key: {}",
        if cfg.llm_api_key.is_empty() { "missing" } else { "set" }
    );
    println!(
        "telegram: {} token {}",
        onoff(cfg.telegram.enabled),
        if cfg.telegram.token.is_empty() { "missing" } else { "set" }
    );
    println!(
        "discord: {} token {} channel {}",
        onoff(cfg.discord.enabled),
        if cfg.discord.token.is_empty() { "missing" } else { "set" },
        if cfg.discord_channel_id.is_empty() { "missing" } else { "set" }
    );
    println!("tg_offset: {}  dc_last_id: {:?}", cfg.tg_offset, cfg.dc_last_id);
}

fn save(app: &App) {
    if let Err(e) = app.store.save() {
        println!("warning: config save failed: {e}");
    } else {
        info!("config saved");
    }
}

fn onoff(b: bool) -> &'static str {
    if b { "on" } else { "off" }
}
