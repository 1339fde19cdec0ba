//! # Blockcode Editor
//!
//! Caret and selection engine for block-based Python documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ language: node tree + mutations + scopes    │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ layout: deterministic monospace positions   │
//! │  - Rendered nodes and child sets            │
//! │  - Cursor map of every caret stop           │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ selection: caret state machine              │
//! │  - Movement and multi-select                │
//! │  - Insert, paste, delete, unindent          │
//! │  - Clipboard fragments                      │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **The tree is the source of truth**: layout and the cursor map are rebuilt from it
//! 2. **Carets address gaps, not characters**: a [`NodeCursor`] is a child set and an index
//! 3. **Mutations drive the caret**: the selection replays child-set events after each edit
//!
//! ## Usage
//!
//! ```rust,ignore
//! use blockcode_editor::{MemoryClipboard, NodeSelection};
//!
//! let mut selection = NodeSelection::default();
//! selection.load(&serialized)?;
//!
//! selection.move_cursor_right(false);
//! selection.insert_newline_or_unindent()?;
//!
//! let mut clipboard = MemoryClipboard::default();
//! selection.copy_to_clipboard(&mut clipboard)?;
//! selection.paste_from_clipboard(&clipboard)?;
//!
//! let python = selection.session().export_python()?;
//! ```

mod clipboard;
mod cursor;
mod cursor_map;
mod errors;
mod layout;
mod multiselect;
mod selection;
mod tree_iterator;

pub use clipboard::{read_fragment, write_fragment, Clipboard, MemoryClipboard, FRAGMENT_MIME, TEXT_MIME};
pub use cursor::{CursorMove, CursorPosition, NodeCursor};
pub use cursor_map::{CursorMap, CursorType, Entry, EntryKind, Line};
pub use errors::{EditorError, EditorResult};
pub use layout::{child_set_layout, child_set_order, Layout, LayoutMetrics, RenderedChildSet, RenderedNode};
pub use multiselect::{MultiselectDeleter, MultiselectFragmentCreator, MultiselectHighlighter};
pub use selection::{EditBox, InsertBox, NodeSelection, SelectionState};
pub use tree_iterator::{RangeSide, RenderedTreeIterator, TreeWalker};

// Re-export the document model for convenience
pub use blockcode_language::{EditingSession, Fragment, NodeId, SerializedFragment, SerializedNode};
