//! MicroClaw CLI — the main entry point.
//!
//! Commands:
//! - `run`    — Start the full device loop (shell + channels + heartbeat)
//! - `chat`   — One-shot or interactive chat without the channel pollers
//! - `status` — Show configuration and network status

use clap::{Parser, Subcommand};

mod app;
mod keepalive;
mod netinfo;
mod shell;

#[derive(Parser)]
#[command(
    name = "microclaw",
    about = "MicroClaw — a pocket-sized AI assistant runtime",
    version,
    author
)]
struct Cli {
    /// Directory holding configuration and state
    #[arg(long, env = "MICROCLAW_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the full loop: shell, channel polling, heartbeat
    Run {
        /// Emit NUL keepalive bytes while waiting on the network, for
        /// hosts watching the console over a serial bridge
        #[arg(long)]
        serial_keepalive: bool,
    },

    /// Talk to the agent directly
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Show configuration and network status
    Status,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let data_dir = match cli.data_dir {
        Some(d) => d,
        None => default_data_dir()?,
    };
    std::fs::create_dir_all(&data_dir)?;

    match cli.command {
        Commands::Run { serial_keepalive } => app::App::open(&data_dir, serial_keepalive)?.run(),
        Commands::Chat { message } => app::App::open(&data_dir, false)?.chat(message),
        Commands::Status => app::App::open(&data_dir, false)?.status(),
    }
}

fn default_data_dir() -> anyhow::Result<std::path::PathBuf> {
    let home = std::env::var_os("HOME")
        .ok_or_else(|| anyhow::anyhow!("HOME is not set and --data-dir was not given"))?;
    Ok(std::path::PathBuf::from(home).join(".microclaw"))
}
