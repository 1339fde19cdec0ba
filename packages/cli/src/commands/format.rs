use super::{find_json_files, load_session, resolve};
use crate::config::Config;
use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::Path;

#[derive(Debug, Args)]
pub struct FormatArgs {
    /// Document or directory of documents to format
    pub path: String,

    /// Report documents that would change without writing them
    #[arg(long)]
    pub check: bool,

    /// Print the formatted document instead of rewriting it
    #[arg(long)]
    pub stdout: bool,
}

pub fn format(args: FormatArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let input = resolve(cwd, &args.path);
    if !input.exists() {
        return Err(anyhow!("Input path does not exist: {}", input.display()));
    }

    let mut unformatted = 0;
    for file in find_json_files(&input) {
        let formatted = format_file(&file, &config)?;
        if args.stdout {
            println!("{}", formatted);
            continue;
        }
        let current = fs::read_to_string(&file)?;
        if current == formatted {
            continue;
        }
        unformatted += 1;
        if args.check {
            println!("  {} {}", "✗".yellow(), file.display());
        } else {
            fs::write(&file, &formatted)?;
            println!("  {} {}", "✓".green(), file.display());
        }
    }

    if args.check && unformatted > 0 {
        return Err(anyhow!("{} documents need formatting", unformatted));
    }
    Ok(())
}

/// Load and re-serialize a document as pretty JSON with a trailing newline.
pub fn format_file(path: &Path, config: &Config) -> Result<String> {
    let session = load_session(path, config)?;
    let serialized = session.serialize_root()?;
    let mut formatted = serde_json::to_string_pretty(&serialized)?;
    formatted.push('\n');
    Ok(formatted)
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPACT: &str = r#"{"type":"PYTHON_FILE","childSets":{"body":[{"type":"PYTHON_STATEMENT","childSets":{"statement":[{"type":"PYTHON_EXPRESSION","childSets":{"tokens":[{"type":"PY_IDENTIFIER","properties":{"identifier":"x"}}]}}]}}]}}"#;

    #[test]
    fn test_format_rewrites_then_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = dir.path().display().to_string();
        let path = dir.path().join("doc.json");
        fs::write(&path, COMPACT).unwrap();

        let check = |check: bool| FormatArgs {
            path: "doc.json".to_string(),
            check,
            stdout: false,
        };
        assert!(format(check(true), &cwd).is_err());

        format(check(false), &cwd).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("\n  \"type\": \"PYTHON_FILE\""));
        assert!(written.contains("\"identifier\": \"x\""));

        format(check(true), &cwd).unwrap();
    }
}
