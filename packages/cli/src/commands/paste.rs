use super::{load_session, resolve};
use crate::config::Config;
use anyhow::{anyhow, Context, Result};
use blockcode_editor::{CursorPosition, NodeSelection};
use blockcode_language::SerializedFragment;
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Args)]
pub struct PasteArgs {
    /// Document to paste into
    pub path: String,

    /// Serialized fragment to paste
    #[arg(short, long)]
    pub fragment: String,

    /// Cursor map line of the paste position
    #[arg(short, long, default_value_t = 0)]
    pub line: usize,

    /// Entry within the line
    #[arg(short, long, default_value_t = 0)]
    pub entry: usize,

    /// Save the result back to the document
    #[arg(short, long)]
    pub write: bool,
}

pub fn paste(args: PasteArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let document = resolve(cwd, &args.path);
    let fragment = resolve(cwd, &args.fragment);
    let position = CursorPosition::new(args.line, args.entry);

    let mut selection = paste_into(&document, &fragment, position, &config)?;
    print!("{}", selection.session().export_python()?);

    if args.write {
        let version = selection.session().version();
        selection.session_mut().save(version)?;
        println!("{} Saved {}", "✓".green(), document.display());
    }
    Ok(())
}

/// Paste `fragment` at `position` in the document's cursor map.
pub fn paste_into(document: &Path, fragment: &Path, position: CursorPosition, config: &Config) -> Result<NodeSelection> {
    let session = load_session(document, config)?;
    let mut selection = NodeSelection::new(session, config.layout.clone());

    let content = fs::read_to_string(fragment).with_context(|| format!("failed to read {}", fragment.display()))?;
    let serialized: SerializedFragment = serde_json::from_str(&content)?;
    let fragment = selection.session_mut().deserialize_fragment(&serialized)?;

    let is_cursor = selection
        .cursor_map()
        .entry(position)
        .map(|entry| entry.is_cursor())
        .ok_or_else(|| anyhow!("no caret stop at line {} entry {}", position.line, position.entry))?;
    selection.place_cursor_position(position, is_cursor, true);
    debug!(line = position.line, entry = position.entry, is_cursor, "placed caret");

    if !selection.paste_fragment(&fragment)? {
        return Err(anyhow!(
            "fragment of {:?} cannot be pasted at line {} entry {}",
            fragment.category(),
            position.line,
            position.entry
        ));
    }
    Ok(selection)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "type": "PYTHON_FILE",
        "childSets": { "body": [{
            "type": "PYTHON_STATEMENT",
            "childSets": { "statement": [{
                "type": "PYTHON_EXPRESSION",
                "childSets": { "tokens": [{ "type": "PY_IDENTIFIER", "properties": { "identifier": "x" } }] }
            }] }
        }] }
    }"#;

    const FRAGMENT: &str = r#"{
        "category": "PythonExpressionToken",
        "nodes": [{ "type": "STRING_LITERAL", "properties": { "value": "hi" } }]
    }"#;

    #[test]
    fn test_paste_token_on_empty_line() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("doc.json"), DOCUMENT).unwrap();
        fs::write(dir.path().join("fragment.json"), FRAGMENT).unwrap();

        let selection = paste_into(
            &dir.path().join("doc.json"),
            &dir.path().join("fragment.json"),
            CursorPosition::new(1, 0),
            &Config::default(),
        )
        .unwrap();

        assert_eq!(selection.session().export_python().unwrap(), "x\n\"hi\"\n");
    }

    #[test]
    fn test_paste_at_missing_position_fails() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("doc.json"), DOCUMENT).unwrap();
        fs::write(dir.path().join("fragment.json"), FRAGMENT).unwrap();

        let result = paste_into(
            &dir.path().join("doc.json"),
            &dir.path().join("fragment.json"),
            CursorPosition::new(9, 0),
            &Config::default(),
        );
        assert!(result.is_err());
    }
}
