//! Clipboard storage for copied fragments.
//!
//! Fragments travel as JSON under a private MIME type, with the same JSON under
//! `text/plain` so they survive clipboards that only keep text.

use crate::errors::{EditorError, EditorResult};
use blockcode_language::SerializedFragment;
use std::collections::BTreeMap;

pub const FRAGMENT_MIME: &str = "application/x-blockcode-fragment";
pub const TEXT_MIME: &str = "text/plain";

pub trait Clipboard {
    fn set(&mut self, mime: &str, data: String);

    fn get(&self, mime: &str) -> Option<String>;

    fn clear(&mut self);
}

/// A clipboard held in memory, for tests and headless use.
#[derive(Debug, Default, Clone)]
pub struct MemoryClipboard {
    entries: BTreeMap<String, String>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clipboard for MemoryClipboard {
    fn set(&mut self, mime: &str, data: String) {
        self.entries.insert(mime.to_string(), data);
    }

    fn get(&self, mime: &str) -> Option<String> {
        self.entries.get(mime).cloned()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

pub fn write_fragment(clipboard: &mut dyn Clipboard, fragment: &SerializedFragment) -> EditorResult<()> {
    let json = serde_json::to_string(fragment)?;
    clipboard.clear();
    clipboard.set(FRAGMENT_MIME, json.clone());
    clipboard.set(TEXT_MIME, json);
    Ok(())
}

/// The fragment on the clipboard, preferring the private type over plain text.
pub fn read_fragment(clipboard: &dyn Clipboard) -> EditorResult<SerializedFragment> {
    if let Some(data) = clipboard.get(FRAGMENT_MIME) {
        return Ok(serde_json::from_str(&data)?);
    }
    clipboard
        .get(TEXT_MIME)
        .and_then(|text| serde_json::from_str(&text).ok())
        .ok_or(EditorError::EmptyClipboard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockcode_language::{NodeCategory, NodeKind, SerializedNode};

    #[test]
    fn test_fragment_survives_clipboard() {
        let fragment = SerializedFragment {
            category: NodeCategory::PythonExpressionToken,
            nodes: vec![SerializedNode::new(NodeKind::Identifier).with_property("identifier", "x")],
        };
        let mut clipboard = MemoryClipboard::new();
        write_fragment(&mut clipboard, &fragment).unwrap();

        assert_eq!(read_fragment(&clipboard).unwrap(), fragment);
        assert!(clipboard.get(TEXT_MIME).is_some());
    }

    #[test]
    fn test_plain_text_that_is_not_a_fragment() {
        let mut clipboard = MemoryClipboard::new();
        clipboard.set(TEXT_MIME, "print('hi')".to_string());
        assert!(matches!(read_fragment(&clipboard), Err(EditorError::EmptyClipboard)));
    }
}
