//! Shipwright - build, package and release orchestrator for the server.
//!
//! Compiles the server natively, packages it into a container image, runs
//! it, and replays the release workflow locally under `act`.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use shipwright::commands::EmulationHost;
use shipwright::config::{self, Layer};
use shipwright::dispatch::Dispatcher;
use shipwright::error::exit_code;
use shipwright::process::SystemRunner;
use shipwright::prompt::{AssumeYes, Prompt, StdinPrompt};
use shipwright::workspace::Workspace;

#[derive(Parser)]
#[command(name = "shipwright")]
#[command(about = "Build, package and release the server")]
#[command(
    after_help = "QUICK START:\n  shipwright init                         Create .env and config.toml\n  shipwright build                        Compile and stage binaries\n  shipwright docker-build-from-artifacts  Package staged binaries\n  shipwright run                          Start the image\n  shipwright help                         List every command"
)]
struct Cli {
    /// Command to run (default: help)
    command: Option<String>,

    /// Configuration overrides, e.g. IMAGE_TAG=dev
    #[arg(value_parser = parse_assignment)]
    overrides: Vec<(String, String)>,

    /// Project root (default: current directory)
    #[arg(short = 'C', long)]
    directory: Option<PathBuf>,

    /// Answer yes to the `clean` confirmation
    #[arg(short, long)]
    yes: bool,

    /// Print `help` configuration as JSON
    #[arg(long)]
    json: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))
}

fn init_logging(verbose: bool) {
    let default = if verbose { "shipwright=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let root = match cli.directory {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };

    // Environment first, explicit KEY=VALUE arguments on top.
    let mut overrides: Layer = config::overrides_from_env();
    overrides.extend(cli.overrides);

    let prompt: &dyn Prompt = if cli.yes { &AssumeYes } else { &StdinPrompt };
    let dispatcher = Dispatcher::new(
        Workspace::new(root),
        &SystemRunner,
        prompt,
        EmulationHost::detect(),
    )
    .with_json(cli.json);

    let command = cli.command.as_deref().unwrap_or("help");
    dispatcher.dispatch(command, &overrides)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}
