//! CLI for the satchel wallet's main/renderer IPC.

#![allow(
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::missing_docs_in_private_items
)]

mod client;
mod serve;

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use satchel_wallet::{ClockStatus, Network, humanize_offset};
use tracing_subscriber::EnvFilter;

/// File name of the main process socket.
const SOCKET_NAME: &str = "satchel.sock";

#[derive(Parser)]
#[command(name = "satchel", version, about = "Typed IPC between wallet main and renderer processes")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the main-process endpoint on a Unix socket.
    Serve(serve::ServeArgs),

    /// Submit a bug report through the main process.
    Report(Box<client::ReportArgs>),

    /// Ask the main process for the system locale.
    Locale(client::ConnectArgs),

    /// Show the epoch and slot for a moment on a network.
    Epoch {
        /// Network name.
        #[arg(short, long, default_value = "mainnet")]
        network: Network,

        /// Unix time in seconds (default: now).
        #[arg(long)]
        at: Option<u64>,

        /// Output format.
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },

    /// Check a measured clock offset against the sync tolerance.
    Clock {
        /// Local clock offset in microseconds; omit if NTP was unreachable.
        #[arg(long, allow_hyphen_values = true)]
        offset_us: Option<i64>,
    },

    /// Generate shell completion scripts.
    #[command(hide = true)]
    Completion {
        /// Target shell.
        shell: Shell,
    },
}

/// Output format for informational commands.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable table.
    #[default]
    Table,
    /// Machine-readable JSON.
    Json,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = Cli::parse().dispatch().await {
        eprintln!("satchel: {e:#}");
        std::process::exit(1);
    }
}

impl Cli {
    async fn dispatch(self) -> Result<()> {
        match self.command {
            Command::Serve(args) => serve::run(args).await,
            Command::Report(args) => client::report(*args).await,
            Command::Locale(args) => client::locale(args).await,
            Command::Epoch {
                network,
                at,
                format,
            } => epoch(network, at, format),
            Command::Clock { offset_us } => {
                clock(offset_us);
                Ok(())
            }
            Command::Completion { shell } => {
                clap_complete::generate(
                    shell,
                    &mut Self::command(),
                    "satchel",
                    &mut std::io::stdout(),
                );
                Ok(())
            }
        }
    }
}

/// Default main-process socket: `$XDG_RUNTIME_DIR/satchel.sock`, or the
/// temp dir when there is no runtime dir.
pub(crate) fn default_socket() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(SOCKET_NAME)
}

fn epoch(network: Network, at: Option<u64>, format: OutputFormat) -> Result<()> {
    let at = match at {
        Some(t) => t,
        None => SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs(),
    };
    let params = network.epochs();
    let Some(pos) = params.position(at) else {
        anyhow::bail!("{at} is before the {network} start time ({})", params.start_time);
    };
    let next = pos
        .epoch
        .checked_add(1)
        .and_then(|epoch| params.epoch_start(epoch))
        .with_context(|| {
            format!(
                "epoch {} has no successor representable in Unix seconds",
                pos.epoch
            )
        })?;

    if matches!(format, OutputFormat::Json) {
        let obj = serde_json::json!({
            "network": network.as_str(),
            "epoch": pos.epoch,
            "slot": pos.slot,
            "slots_per_epoch": params.slots_per_epoch(),
            "next_epoch_start": next,
        });
        println!("{}", serde_json::to_string_pretty(&obj)?);
        return Ok(());
    }

    println!("network:    {network}");
    println!("epoch:      {}", pos.epoch);
    println!("slot:       {}/{}", pos.slot, params.slots_per_epoch());
    let wait_us = i64::try_from(next.saturating_sub(at).saturating_mul(1_000_000))?;
    println!("next epoch: in {}", humanize_offset(wait_us));
    Ok(())
}

fn clock(offset_us: Option<i64>) {
    match ClockStatus::evaluate(offset_us) {
        ClockStatus::InSync => println!("in sync"),
        ClockStatus::OutOfSync { offset_us } => {
            println!("out of sync by {}", humanize_offset(offset_us));
        }
        _ => println!(
            "NTP unreachable; sync fails if the clock is off by more than {} seconds",
            satchel_wallet::ALLOWED_TIME_DIFFERENCE / 1_000_000
        ),
    }
}
