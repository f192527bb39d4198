//! Tilestream CLI - Command-line interface
//!
//! Benchmarks the tile builder and runs the pipeline headless against a
//! synthetic data source.

mod commands;
mod error;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tilestream::logging::{
    default_log_dir, default_log_file, init_logging, init_stdout_logging, LoggingGuard,
};

use commands::bench::BenchArgs;
use commands::simulate::SimulateArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "tilestream")]
#[command(version, about = "Asynchronous map tile pipeline tools", long_about = None)]
struct Cli {
    /// Pipeline config file (INI)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Time repeated builds of one synthetic tile
    Bench(BenchArgs),
    /// Drive the pipeline with a scripted camera and print statistics
    Simulate(SimulateArgs),
}

fn main() {
    let cli = Cli::parse();

    let _guard = match setup_logging(cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => e.exit(),
    };

    let result = match cli.command {
        Commands::Bench(args) => commands::bench::run(args),
        Commands::Simulate(args) => commands::simulate::run(args, cli.config.as_deref()),
    };

    if let Err(e) = result {
        e.exit();
    }
}

fn setup_logging(log_file: Option<&Path>) -> Result<LoggingGuard, CliError> {
    let guard = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_else(|| default_log_dir().to_string());
            let file = path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_else(|| default_log_file().to_string());
            init_logging(&dir, &file)
        }
        None => init_stdout_logging(),
    };
    guard.map_err(CliError::LoggingInit)
}
