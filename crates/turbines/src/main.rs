//! Turbines CLI - static site generator with a live-reloading dev server.
//!
//! Provides commands for:
//! - `serve`: Build the site and serve it, rebuilding on change
//! - `build`: Build the site once
//! - `create`: Scaffold a new project

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{BuildArgs, CreateArgs, ServeArgs};
use error::CliError;
use output::Output;

/// Turbines - static site generator.
#[derive(Parser)]
#[command(name = "turbines", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the site and serve it with live reload.
    Serve(ServeArgs),
    /// Build the site once.
    Build(BuildArgs),
    /// Create a new project.
    Create(CreateArgs),
}

impl Commands {
    fn verbose(&self) -> bool {
        match self {
            Self::Serve(args) => args.verbose,
            Self::Build(args) => args.verbose,
            Self::Create(_) => false,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.command.verbose() {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(err) = run(cli.command) {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Serve(args) => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(args.execute())
        }
        Commands::Build(args) => args.execute(),
        Commands::Create(args) => args.execute(),
    }
}
