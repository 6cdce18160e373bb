//! The device loop: shell input, channel polling, heartbeat.
//!
//! Everything runs on one thread. A helper thread feeds stdin lines
//! through a channel so the loop never blocks on the console; network
//! work raises the busy flag so a slow exchange defers the next poll
//! instead of stacking on top of it.

use std::io::BufRead;
use std::path::Path;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::Context;
use microclaw_agent::Agent;
use microclaw_channels::{DiscordPoller, TelegramPoller};
use microclaw_config::{open_store, Store};
use microclaw_core::SessionLog;
use microclaw_tools::NetStatus;
use microclaw_transport::Busy;
use tracing::{info, warn};

use crate::keepalive::SerialKeepalive;
use crate::netinfo;
use crate::shell::{self, ShellAction};

const LOOP_TICK: Duration = Duration::from_millis(50);

/// Sent to the agent on the heartbeat schedule instead of user input.
const HEARTBEAT_PROMPT: &str = "Scheduled heartbeat. If something needs attention, \
say so briefly; otherwise reply with a short ok.";

pub struct App {
    pub store: Store,
    pub session: SessionLog,
    pub agent: Agent,
    pub telegram: TelegramPoller,
    pub discord: DiscordPoller,
    pub net: NetStatus,
    pub busy: Busy,
    pub keepalive: SerialKeepalive,
    pub started: Instant,
    last_heartbeat: Instant,
}

impl App {
    pub fn open(data_dir: &Path, serial_keepalive: bool) -> anyhow::Result<Self> {
        let store = open_store(data_dir)
            .with_context(|| format!("opening store under {}", data_dir.display()))?;
        let net = netinfo::probe(&store.config.wifi_ssid);
        info!(
            connected = net.connected,
            ip = %net.ip,
            "microclaw starting"
        );
        Ok(Self {
            store,
            session: SessionLog::new(),
            agent: Agent::new(),
            telegram: TelegramPoller::new(),
            discord: DiscordPoller::new(),
            net,
            busy: Busy::new(),
            keepalive: SerialKeepalive::new(serial_keepalive),
            started: Instant::now(),
            last_heartbeat: Instant::now(),
        })
    }

    /// The full loop. Returns only when the shell asks for a reboot.
    pub fn run(mut self) -> anyhow::Result<()> {
        let lines = spawn_stdin_reader();
        println!("microclaw ready, type 'help' for commands");
        loop {
            while let Ok(line) = lines.try_recv() {
                match shell::handle(&mut self, line.trim()) {
                    ShellAction::Continue => {}
                    ShellAction::Reboot => {
                        info!("reboot requested");
                        return Ok(());
                    }
                }
            }
            if !self.busy.get() {
                if self.net.connected {
                    self.poll_channels();
                }
                self.heartbeat();
            }
            std::thread::sleep(LOOP_TICK);
        }
    }

    /// Direct chat, no pollers. `None` enters interactive mode.
    pub fn chat(mut self, message: Option<String>) -> anyhow::Result<()> {
        match message {
            Some(text) => {
                let reply = self.run_agent(&text);
                println!("{reply}");
                Ok(())
            }
            None => {
                let lines = spawn_stdin_reader();
                println!("interactive chat, empty line or EOF exits");
                while let Ok(line) = lines.recv() {
                    let text = line.trim().to_string();
                    if text.is_empty() {
                        break;
                    }
                    let reply = self.run_agent(&text);
                    println!("{reply}");
                }
                Ok(())
            }
        }
    }

    pub fn status(self) -> anyhow::Result<()> {
        println!("network: {:?}", self.net);
        println!("config: {:#?}", self.store.config);
        Ok(())
    }

    /// Run one agent turn and flatten the outcome into printable text.
    /// Tool-sent messages print ahead of the reply, like they would
    /// arrive on a chat channel.
    pub(crate) fn run_agent(&mut self, input: &str) -> String {
        let _g = self.busy.raise();
        let uptime = self.started.elapsed();
        match self.agent.run(
            input,
            &mut self.store,
            &mut self.session,
            &self.net,
            uptime,
            &mut self.keepalive,
        ) {
            Ok(out) => {
                for m in &out.outbox {
                    println!("{m}");
                }
                out.reply
            }
            Err(e) => {
                warn!(error = %e, "agent run failed");
                format!("[error] {e}")
            }
        }
    }

    fn poll_channels(&mut self) {
        let _g = self.busy.raise();
        let uptime = self.started.elapsed();

        match self.telegram.poll(&mut self.store, &mut self.keepalive) {
            Ok(updates) => {
                for update in updates {
                    let outcome = self.agent.run(
                        &update.text,
                        &mut self.store,
                        &mut self.session,
                        &self.net,
                        uptime,
                        &mut self.keepalive,
                    );
                    let token = self.store.config.telegram.token.clone();
                    match outcome {
                        Ok(out) => {
                            for m in out.outbox.iter().chain(std::iter::once(&out.reply)) {
                                if let Err(e) =
                                    self.telegram.send(&token, &update.chat, m, &mut self.keepalive)
                                {
                                    warn!(error = %e, "telegram delivery failed");
                                }
                            }
                        }
                        Err(e) => warn!(error = %e, "agent run failed"),
                    }
                }
            }
            Err(e) => warn!(error = %e, "telegram poll failed"),
        }

        match self.discord.poll(&mut self.store, &mut self.keepalive) {
            Ok(messages) => {
                for msg in messages {
                    let outcome = self.agent.run(
                        &msg.text,
                        &mut self.store,
                        &mut self.session,
                        &self.net,
                        uptime,
                        &mut self.keepalive,
                    );
                    let token = self.store.config.discord.token.clone();
                    let channel = self.store.config.discord_channel_id;
                    match outcome {
                        Ok(out) => {
                            for m in out.outbox.iter().chain(std::iter::once(&out.reply)) {
                                if let Err(e) =
                                    self.discord.send(&token, &channel, m, &mut self.keepalive)
                                {
                                    warn!(error = %e, "discord delivery failed");
                                }
                            }
                        }
                        Err(e) => warn!(error = %e, "agent run failed"),
                    }
                }
            }
            Err(e) => warn!(error = %e, "discord poll failed"),
        }
    }

    fn heartbeat(&mut self) {
        let period = self.store.config.heartbeat_ms;
        if period == 0 || self.last_heartbeat.elapsed() < Duration::from_millis(period) {
            return;
        }
        self.last_heartbeat = Instant::now();
        if !self.net.connected {
            // use the slot to re-probe instead of talking to a dead network
            self.net = netinfo::probe(&self.store.config.wifi_ssid);
            info!(connected = self.net.connected, "heartbeat re-probe");
            return;
        }
        info!("heartbeat");
        let reply = self.run_agent(HEARTBEAT_PROMPT);
        println!("{reply}");
        // telegram has no standing destination; discord does
        if self.store.config.discord.enabled && !self.store.config.discord_channel_id.is_empty() {
            let token = self.store.config.discord.token.clone();
            let channel = self.store.config.discord_channel_id;
            if let Err(e) = self.discord.send(&token, &channel, &reply, &mut self.keepalive) {
                warn!(error = %e, "heartbeat delivery failed");
            }
        }
    }
}

fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(l) => {
                    if tx.send(l).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });
    rx
}
