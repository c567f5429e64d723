//! ImageGuard - perceptual-hash image moderation for chat communities.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod config;
mod exit_codes;
mod gateway;

use config::Config;
use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success (check: image is not banned)
  3   check: image is banned
  65  File is not a decodable image
  66  Input file not found
  69  Image host, label oracle or chat transport unavailable
  74  Ban list unreadable or unwritable
  78  Invalid configuration";

#[derive(Parser)]
#[command(name = "imageguard")]
#[command(author, version, about = "Perceptual-hash image moderation for chat", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Ban list location (overrides IMAGEGUARD_STORE_PATH)
    #[arg(long, global = true, value_name = "PATH")]
    store: Option<PathBuf>,

    /// Enable debug logging for imageguard crates
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress human-readable output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the fingerprint of an image file
    Hash {
        /// Path to the image
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Check an image file against the ban list
    Check {
        /// Path to the image
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Maximum Hamming distance counted as a match
        #[arg(short, long)]
        threshold: Option<u32>,
    },

    /// Add an image file to the ban list
    Ban {
        /// Path to the image
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Run the moderation bot over JSON-lines events on stdin
    Run,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "imageguard=debug,warn"
    } else {
        "imageguard=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn dispatch(cli: Cli) -> Result<ExitCode> {
    let mut config = Config::from_env()?;
    if let Some(store) = cli.store {
        config.store_path = store;
    }

    match cli.command {
        Commands::Hash { file } => commands::hash::execute(file),
        Commands::Check { file, threshold } => {
            let threshold = threshold.unwrap_or(config.policy.similarity_threshold);
            commands::check::execute(file, config.store_path, threshold, cli.quiet).await
        }
        Commands::Ban { file } => {
            commands::ban::execute(file, config.store_path, config.timeouts.store).await
        }
        Commands::Run => commands::run::execute(config).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit = match dispatch(cli).await {
        Ok(exit) => exit,
        Err(err) => ExitCode::from_anyhow(&err),
    };

    if let Some(message) = &exit.message {
        eprintln!("{} {}", "error:".red().bold(), message);
    }
    std::process::exit(exit.code);
}
