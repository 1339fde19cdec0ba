mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::{export, format, inspect, paste, ExportArgs, FormatArgs, InspectArgs, PasteArgs};
use config::Config;
use tracing_subscriber::EnvFilter;

/// Blockcode CLI - structural editing for block-based Python documents
#[derive(Parser, Debug)]
#[command(name = "blockcode")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a document's node tree with categories and validity
    Inspect(InspectArgs),

    /// Generate Python source from documents
    Export(ExportArgs),

    /// Re-serialize documents as pretty JSON
    Format(FormatArgs),

    /// Paste a serialized fragment at a caret position
    Paste(PasteArgs),
}

fn init_tracing(cwd: &str) {
    let default_level = Config::load(cwd)
        .map(|config| config.log_level)
        .unwrap_or_else(|_| "warn".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();

    let cwd = match std::env::current_dir() {
        Ok(dir) => dir.display().to_string(),
        Err(err) => {
            eprintln!("{} cannot read current directory: {}", "Error:".red().bold(), err);
            std::process::exit(1);
        }
    };
    init_tracing(&cwd);

    let result = match cli.command {
        Command::Inspect(args) => inspect(args, &cwd),
        Command::Export(args) => export(args, &cwd),
        Command::Format(args) => format(args, &cwd),
        Command::Paste(args) => paste(args, &cwd),
    };

    if let Err(err) = result {
        eprintln!();
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        eprintln!();
        std::process::exit(1);
    }
}
