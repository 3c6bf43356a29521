//! cryptrepo CLI - An encrypted key-value repository
//!
//! This is the command-line interface for cryptrepo. It provides a thin
//! interface over the core repository library.

mod app;
mod cli;
mod commands;
mod helpers;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cryptrepo_core::VERSION;

use crate::app::report_error;
use crate::cli::{Cli, Commands};
use crate::commands::config::handle_config;
use crate::commands::data::{handle_get, handle_list, handle_put, handle_rm};
use crate::commands::init::handle_init;
use crate::commands::misc::{handle_completions, handle_keys, handle_remove};
use crate::commands::status::handle_status;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cryptrepo=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Some(Commands::Init(args)) => handle_init(cli, args),
        Some(Commands::Status { json }) => handle_status(cli, *json),
        Some(Commands::Put { key, value }) => handle_put(cli, key, value.clone()),
        Some(Commands::Get { key }) => handle_get(cli, key),
        Some(Commands::Rm { key }) => handle_rm(cli, key),
        Some(Commands::List(args)) => handle_list(cli, args),
        Some(Commands::Config(command)) => handle_config(cli, command),
        Some(Commands::Keys(command)) => handle_keys(cli, command),
        Some(Commands::Remove { yes }) => handle_remove(cli, *yes),
        Some(Commands::Completions { shell }) => handle_completions(*shell),
        None => {
            println!("cryptrepo v{}", VERSION);
            println!("\nRun `cryptrepo --help` for usage information.");
            Ok(())
        }
    }
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    if let Err(err) = run(&cli) {
        std::process::exit(report_error(&err));
    }
}
