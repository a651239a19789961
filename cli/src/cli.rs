use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tether")]
#[command(version)]
#[command(about = "Replay captured jobs against a worker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a captured request to a worker and print its response
    Replay(ReplayArgs),

    /// Run a worker that answers every job with its own request
    EchoWorker(EchoWorkerArgs),
}

#[derive(Args)]
pub struct ReplayArgs {
    /// Type tag of the job (decimal or 0x-prefixed hex)
    #[arg(long, value_parser = parse_type_tag)]
    pub type_tag: u32,

    /// Task name used in logs
    #[arg(long, default_value = "replay")]
    pub task: String,

    /// Captured request (JSON)
    #[arg(long)]
    pub request: PathBuf,

    /// Where to write the response (JSON)
    #[arg(long)]
    pub response: Option<PathBuf>,

    #[command(flatten)]
    pub dispatch: DispatchArgs,
}

#[derive(Args)]
pub struct EchoWorkerArgs {
    /// Socket path to listen on
    #[arg(long, env = "TETHER_SOCKET")]
    pub socket: Option<PathBuf>,
}

/// Dispatch settings, overriding the config file
#[derive(Args, Default)]
pub struct DispatchArgs {
    /// Worker socket path
    #[arg(long, env = "TETHER_SOCKET")]
    pub socket: Option<PathBuf>,

    /// Seconds to wait for the response
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Milliseconds between cancellation checks
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Capture the request to a debug workspace before sending
    #[arg(long)]
    pub capture: bool,

    /// Keep debug workspaces of successful jobs
    #[arg(long)]
    pub keep_artifacts: bool,

    /// Directory for debug workspaces
    #[arg(long)]
    pub capture_root: Option<PathBuf>,
}

fn parse_type_tag(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid type tag {s:?}: {e}"))
}
