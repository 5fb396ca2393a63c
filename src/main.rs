//! impairctl binary: CLI parsing, config discovery, startup node switch,
//! interactive shell. Startup failures are fatal here; once the shell is
//! running, operation failures are reported and the loop continues.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use impairctl::config::{Config, ConfigError};
use impairctl::session::Manager;
use impairctl::shell;
use impairctl::transport::{SshDialer, DEFAULT_TIMEOUT};

#[derive(Parser, Debug)]
#[command(
    name = "impairctl",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("GIT_HASH"), ")"),
    about = "Control delay and packet-loss impairments on remote devices"
)]
struct Cli {
    /// Node to connect to at startup
    node: String,

    /// Path to an alternate config file
    #[arg(short, long)]
    conf: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let args = Cli::parse();
    let config = Config::discover(args.conf.as_deref()).context("loading config")?;

    if config.node(&args.node).is_none() {
        return Err(ConfigError::MissingNodeSection(args.node).into());
    }

    let mut manager = Manager::new(config, Box::new(SshDialer::new(DEFAULT_TIMEOUT)));
    manager
        .switch_node(&args.node)
        .with_context(|| format!("connecting to node '{}'", args.node))?;

    if let Some(session) = manager.session() {
        for (interface, state) in session.snapshot() {
            println!("{interface}: {state}");
        }
    }

    shell::run(&mut manager)?;
    Ok(())
}
