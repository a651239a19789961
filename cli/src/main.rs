use std::process::ExitCode;

use clap::Parser;

mod cli;
mod commands;
mod config;
mod error;

use cli::{Cli, Commands};
use config::{load_config, merge_dispatcher_config, resolve_socket};
use error::{CliResult, to_exit_code};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    let filter = if cli.verbose {
        "tether=debug"
    } else {
        "tether=info"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    to_exit_code(run(cli))
}

fn run(cli: Cli) -> CliResult<()> {
    let file_config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Replay(args) => {
            let socket = resolve_socket(args.dispatch.socket.as_deref(), &file_config)?;
            let config = merge_dispatcher_config(&file_config, &args.dispatch, &socket)?;
            commands::replay::execute(args, &socket, config)
        }
        Commands::EchoWorker(args) => {
            let socket = resolve_socket(args.socket.as_deref(), &file_config)?;
            commands::echo_worker::execute(socket)
        }
    }
}
