//! stonectl - command-line installer for StoneServer components

mod commands;
mod error;
mod ui;

use std::path::PathBuf;
use std::process;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use console::style;
use stonectl::component::Component;
use stonectl::config::ConfigFile;
use stonectl::logging::{self, DEFAULT_LEVEL};
use stonectl::manager::InstallerConfig;

use crate::error::CliError;

#[derive(Debug, Parser)]
#[command(name = "stonectl", version, about = "StoneServer component manager")]
struct Cli {
    /// Configuration file (default: ./stonectl.ini when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Installation root (default: .stone)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Download and install components (all of them when none are named)
    Install {
        /// Components to install: core, game, nsgod
        #[arg(value_parser = parse_component)]
        components: Vec<Component>,

        /// Maximum simultaneous transfers (1-10)
        #[arg(long)]
        max_concurrent: Option<usize>,
    },

    /// Check the current installation
    Check,

    /// Print the supervisor launch request for a service
    LaunchSpec {
        /// Service data directory
        service: String,
    },

    /// Print the environment the supervisor must be started with
    SupervisorEnv,
}

fn parse_component(value: &str) -> Result<Component, String> {
    Component::from_str(value)
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("{} {}", style("error:").red().bold(), e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_file = match &cli.config {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };

    let level = if cli.verbose {
        "debug"
    } else {
        config_file
            .logging
            .level
            .as_deref()
            .unwrap_or(DEFAULT_LEVEL)
    };
    let _guard = logging::init(level, config_file.logging.file.as_deref())?;

    let mut config = config_file.apply(InstallerConfig::default());
    if let Some(root) = cli.root {
        config.root = root;
    }

    match cli.command {
        Commands::Install {
            components,
            max_concurrent,
        } => commands::install::run(config, components, max_concurrent),
        Commands::Check => commands::check::run(&config.root),
        Commands::LaunchSpec { service } => commands::launch::run_spec(&config.root, &service),
        Commands::SupervisorEnv => commands::launch::run_env(&config.root),
    }
}
