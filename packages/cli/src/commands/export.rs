use super::{find_json_files, load_session, resolve};
use crate::config::Config;
use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Document or directory of documents to export
    pub path: String,

    /// Output file, or directory when exporting a directory (defaults to stdout)
    #[arg(short, long)]
    pub out: Option<String>,
}

pub fn export(args: ExportArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let input = resolve(cwd, &args.path);
    if !input.exists() {
        return Err(anyhow!("Input path does not exist: {}", input.display()));
    }

    let files = find_json_files(&input);
    if files.is_empty() {
        println!("{}", "No documents found".yellow());
        return Ok(());
    }

    let Some(out) = args.out.as_deref().map(|out| resolve(cwd, out)) else {
        for file in &files {
            print!("{}", export_file(file, &config)?);
        }
        return Ok(());
    };

    let mut error_count = 0;
    for file in &files {
        let target = output_path(&input, file, &out);
        match export_file(file, &config).and_then(|python| write_output(&target, &python)) {
            Ok(()) => {
                info!(input = %file.display(), output = %target.display(), "exported");
                println!("  {} {} → {}", "✓".green(), file.display(), target.display());
            }
            Err(e) => {
                error_count += 1;
                eprintln!("  {} {} - {}", "✗".red(), file.display(), e.to_string().red());
            }
        }
    }

    if error_count > 0 {
        return Err(anyhow!("{} of {} documents failed to export", error_count, files.len()));
    }
    Ok(())
}

/// Python source for one serialized document.
pub fn export_file(path: &Path, config: &Config) -> Result<String> {
    let session = load_session(path, config)?;
    Ok(session.export_python()?)
}

fn output_path(input: &Path, file: &Path, out: &Path) -> PathBuf {
    if input.is_file() {
        return out.to_path_buf();
    }
    let relative = file.strip_prefix(input).unwrap_or(file);
    out.join(relative).with_extension("py")
}

fn write_output(target: &Path, python: &str) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(target, python)?;
    Ok(())
}
