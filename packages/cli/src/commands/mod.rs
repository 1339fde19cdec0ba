pub mod export;
pub mod format;
pub mod inspect;
pub mod paste;

pub use export::{export, ExportArgs};
pub use format::{format, FormatArgs};
pub use inspect::{inspect, InspectArgs};
pub use paste::{paste, PasteArgs};

use crate::config::Config;
use anyhow::{Context, Result};
use blockcode_language::EditingSession;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Resolve `path` against the working directory.
pub(crate) fn resolve(cwd: &str, path: &str) -> PathBuf {
    PathBuf::from(cwd).join(path)
}

/// Load a serialized document into a fresh session configured from `config`.
pub(crate) fn load_session(path: &Path, config: &Config) -> Result<EditingSession> {
    let mut session = EditingSession::new(config.session_options());
    session
        .load_file(path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    Ok(session)
}

/// A single file, or every `.json` document under a directory.
pub(crate) fn find_json_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("json"))
        .filter(|path| path.file_name().and_then(|s| s.to_str()) != Some(crate::config::DEFAULT_CONFIG_NAME))
        .collect();
    files.sort();
    files
}
