//! Minimal CLI harness over the session core, in the shape of the
//! teacher's `main.rs` (`clap::Parser` + `tracing_subscriber::fmt::init`).
//!
//! The full interactive playground is an external collaborator per the
//! spec (a transport/UI concern); this binary exists only to exercise the
//! core end to end from a shell, one operation per invocation.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use piloty::{Config, Registry, SessionOptions};
use tracing::error;

#[derive(Parser)]
#[command(name = "piloty", about = "PTY session core CLI harness")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Spawn a new session and run one command in it.
    Run {
        #[arg(long)]
        id: String,
        #[arg(long)]
        command: String,
        #[arg(long, default_value = "/bin/bash")]
        shell: String,
        #[arg(long, default_value_t = 5)]
        timeout_secs: u64,
    },
    /// Print the config that would be loaded from the environment.
    ShowConfig,
}

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { id, command, shell, timeout_secs } => {
            if let Err(e) = run_once(id, command, shell, timeout_secs) {
                error!(error = %e, "run failed");
                std::process::exit(1);
            }
        }
        Commands::ShowConfig => match Config::from_env() {
            Ok(config) => println!("{config:#?}"),
            Err(e) => {
                error!(error = %e, "invalid configuration");
                std::process::exit(1);
            }
        },
    }
}

fn run_once(id: String, command: String, shell: String, timeout_secs: u64) -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let registry = Arc::new(Registry::new(config));

    let mut options = SessionOptions::new(id);
    options.cmd = Some(shell);
    let session = registry.create(options)?;

    let response = session.run(&command, Duration::from_secs(timeout_secs), true)?;
    println!("status: {:?}", response.status);
    println!("--- output ---\n{}", response.output);
    println!("--- screen ---\n{}", response.screen);

    session.terminate()?;
    Ok(())
}
