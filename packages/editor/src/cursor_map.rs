//! # Cursor Map
//!
//! Every place the caret can stop, grouped into visual lines.
//!
//! Layout registers insertion points and node starts with their coordinates. After
//! [`CursorMap::dedupe_and_sort`], lines are ordered by `y`, entries within a line by `x`, and
//! insertion points that share a position are merged into one entry. Movement and hit testing
//! then work purely on `(line, entry)` positions.

use crate::cursor::{CursorMove, CursorPosition, NodeCursor};
use serde::{Deserialize, Serialize};

/// How an insertion point relates to the line it sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CursorType {
    Primary,
    LineStart,
    LineEnd,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// One or more insertion points at the same position.
    Cursors(Vec<(NodeCursor, CursorType)>),
    /// The start of a node, selecting the node at `cursor.index`.
    Node(NodeCursor),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub x: i32,
    pub kind: EntryKind,
}

impl Entry {
    pub fn is_cursor(&self) -> bool {
        matches!(self.kind, EntryKind::Cursors(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub y: i32,
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone, Default)]
pub struct CursorMap {
    lines: Vec<Line>,
}

impl CursorMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn line_mut(&mut self, y: i32) -> &mut Line {
        let index = match self.lines.iter().position(|line| line.y == y) {
            Some(index) => index,
            None => {
                self.lines.push(Line { y, entries: Vec::new() });
                self.lines.len() - 1
            }
        };
        &mut self.lines[index]
    }

    pub fn register_node_start(&mut self, cursor: NodeCursor, x: i32, y: i32) {
        self.line_mut(y).entries.push(Entry {
            x,
            kind: EntryKind::Node(cursor),
        });
    }

    pub fn register_cursor_start(&mut self, cursor: NodeCursor, x: i32, y: i32, cursor_type: CursorType) {
        self.line_mut(y).entries.push(Entry {
            x,
            kind: EntryKind::Cursors(vec![(cursor, cursor_type)]),
        });
    }

    /// Attach a line-end cursor to the rightmost entry of line `y` when that entry is an
    /// insertion point, otherwise add one at `x`.
    pub fn register_end_cursor(&mut self, cursor: NodeCursor, x: i32, y: i32) {
        let line = self.line_mut(y);
        let last = line
            .entries
            .iter_mut()
            .enumerate()
            .max_by_key(|(index, entry)| (entry.x, *index))
            .map(|(_, entry)| entry);
        if let Some(Entry {
            kind: EntryKind::Cursors(cursors),
            ..
        }) = last
        {
            cursors.push((cursor, CursorType::LineEnd));
            return;
        }
        line.entries.push(Entry {
            x,
            kind: EntryKind::Cursors(vec![(cursor, CursorType::LineEnd)]),
        });
    }

    /// Sort lines and entries and merge insertion points closer than one unit.
    pub fn dedupe_and_sort(&mut self) {
        self.lines.sort_by_key(|line| line.y);
        for line in &mut self.lines {
            line.entries.sort_by_key(|entry| entry.x);
            let mut merged: Vec<Entry> = Vec::with_capacity(line.entries.len());
            for entry in line.entries.drain(..) {
                if let Some(Entry {
                    x,
                    kind: EntryKind::Cursors(previous),
                }) = merged.last_mut()
                {
                    if let EntryKind::Cursors(cursors) = &entry.kind {
                        if (entry.x - *x).abs() < 1 {
                            previous.extend(cursors.iter().copied());
                            continue;
                        }
                    }
                }
                merged.push(entry);
            }
            line.entries = merged;
        }
        self.lines.retain(|line| !line.entries.is_empty());
    }

    /// Index of the line containing `y`: the last line starting at or above it.
    pub fn line_index_for_y(&self, y: i32) -> Option<usize> {
        if self.lines.is_empty() {
            return None;
        }
        let after = self.lines.partition_point(|line| line.y <= y);
        Some(after.saturating_sub(1))
    }

    /// Index of the entry at `x`: the last entry starting at or left of it.
    pub fn entry_index_for_x(&self, line: usize, x: i32) -> Option<usize> {
        let entries = &self.lines.get(line)?.entries;
        if entries.is_empty() {
            return None;
        }
        let after = entries.partition_point(|entry| entry.x <= x);
        Some(after.saturating_sub(1))
    }

    pub fn cursor_position_by_coordinate(&self, x: i32, y: i32) -> Option<(CursorPosition, bool)> {
        let line = self.line_index_for_y(y)?;
        let entry = self.entry_index_for_x(line, x)?;
        let position = CursorPosition::new(line, entry);
        Some((position, self.entry(position)?.is_cursor()))
    }

    pub fn entry(&self, position: CursorPosition) -> Option<&Entry> {
        self.lines.get(position.line)?.entries.get(position.entry)
    }

    pub fn is_valid(&self, position: CursorPosition) -> bool {
        self.entry(position).is_some()
    }

    pub fn coordinates(&self, position: CursorPosition) -> Option<(i32, i32)> {
        let line = self.lines.get(position.line)?;
        let entry = line.entries.get(position.entry)?;
        Some((entry.x, line.y))
    }

    fn cursors_at(&self, position: CursorPosition) -> &[(NodeCursor, CursorType)] {
        match self.entry(position).map(|entry| &entry.kind) {
            Some(EntryKind::Cursors(cursors)) => cursors,
            _ => &[],
        }
    }

    /// Insertion points at a cursor entry, in registration order.
    pub fn node_cursors_for_position(&self, position: CursorPosition) -> Vec<NodeCursor> {
        self.cursors_at(position).iter().map(|(cursor, _)| *cursor).collect()
    }

    pub fn line_end_node_cursors_for_position(&self, position: CursorPosition) -> Vec<NodeCursor> {
        self.cursors_of_type(position, CursorType::LineEnd)
    }

    pub fn line_start_node_cursors_for_position(&self, position: CursorPosition) -> Vec<NodeCursor> {
        self.cursors_of_type(position, CursorType::LineStart)
    }

    fn cursors_of_type(&self, position: CursorPosition, wanted: CursorType) -> Vec<NodeCursor> {
        self.cursors_at(position)
            .iter()
            .filter(|(_, cursor_type)| *cursor_type == wanted)
            .map(|(cursor, _)| *cursor)
            .collect()
    }

    /// The cursor a multi-selection anchors to at this position.
    pub fn multi_select_cursor_for_position(&self, position: CursorPosition) -> Option<NodeCursor> {
        match &self.entry(position)?.kind {
            EntryKind::Cursors(cursors) => cursors.first().map(|(cursor, _)| *cursor),
            EntryKind::Node(cursor) => Some(*cursor),
        }
    }

    /// Insertion points offered to autocomplete; line-end points only insert new lines.
    pub fn autocomplete_cursors(&self, position: CursorPosition) -> Vec<NodeCursor> {
        self.cursors_at(position)
            .iter()
            .filter(|(_, cursor_type)| *cursor_type != CursorType::LineEnd)
            .map(|(cursor, _)| *cursor)
            .collect()
    }

    pub fn single_node_for_position(&self, position: CursorPosition) -> Option<NodeCursor> {
        match &self.entry(position)?.kind {
            EntryKind::Node(cursor) => Some(*cursor),
            EntryKind::Cursors(_) => None,
        }
    }

    /// The first insertion-point entry holding `cursor`.
    pub fn find(&self, cursor: NodeCursor) -> Option<CursorPosition> {
        for (line_index, line) in self.lines.iter().enumerate() {
            for (entry_index, entry) in line.entries.iter().enumerate() {
                let found = match &entry.kind {
                    EntryKind::Cursors(cursors) => cursors.iter().any(|(c, _)| *c == cursor),
                    EntryKind::Node(_) => false,
                };
                if found {
                    return Some(CursorPosition::new(line_index, entry_index));
                }
            }
        }
        None
    }

    pub fn find_node(&self, cursor: NodeCursor) -> Option<CursorPosition> {
        for (line_index, line) in self.lines.iter().enumerate() {
            for (entry_index, entry) in line.entries.iter().enumerate() {
                if entry.kind == EntryKind::Node(cursor) {
                    return Some(CursorPosition::new(line_index, entry_index));
                }
            }
        }
        None
    }

    fn move_to(&self, position: CursorPosition) -> Option<CursorMove> {
        let line = self.lines.get(position.line)?;
        let entry = line.entries.get(position.entry)?;
        Some(CursorMove {
            position,
            is_cursor: entry.is_cursor(),
            x: entry.x,
            y: line.y,
        })
    }

    /// One entry left, wrapping to the end of the previous line. Stays put at the start.
    pub fn cursor_left(&self, position: CursorPosition) -> Option<CursorMove> {
        if position.entry > 0 {
            return self.move_to(CursorPosition::new(position.line, position.entry - 1));
        }
        if position.line > 0 {
            let line = position.line - 1;
            let last = self.lines.get(line)?.entries.len().checked_sub(1)?;
            return self.move_to(CursorPosition::new(line, last));
        }
        self.move_to(position)
    }

    /// One entry right, wrapping to the start of the next line. Stays put at the end.
    pub fn cursor_right(&self, position: CursorPosition) -> Option<CursorMove> {
        let line = self.lines.get(position.line)?;
        if position.entry + 1 < line.entries.len() {
            return self.move_to(CursorPosition::new(position.line, position.entry + 1));
        }
        if position.line + 1 < self.lines.len() {
            return self.move_to(CursorPosition::new(position.line + 1, 0));
        }
        self.move_to(position)
    }

    /// The entry on the line above closest to `x`, keeping `x` for the next vertical move.
    /// On the first line the caret snaps to the entry under `x` on that line.
    pub fn cursor_up(&self, x: i32, position: CursorPosition) -> Option<CursorMove> {
        self.vertical_move(x, position.line.saturating_sub(1))
    }

    pub fn cursor_down(&self, x: i32, position: CursorPosition) -> Option<CursorMove> {
        let line = if position.line + 1 < self.lines.len() {
            position.line + 1
        } else {
            position.line
        };
        self.vertical_move(x, line)
    }

    fn vertical_move(&self, x: i32, line: usize) -> Option<CursorMove> {
        let entry = self.entry_index_for_x(line, x)?;
        let mut target = self.move_to(CursorPosition::new(line, entry))?;
        target.x = x;
        Some(target)
    }

    pub fn cursor_start_of_line(&self, position: CursorPosition) -> Option<CursorMove> {
        self.move_to(CursorPosition::new(position.line, 0))
    }

    pub fn cursor_end_of_line(&self, position: CursorPosition) -> Option<CursorMove> {
        let last = self.lines.get(position.line)?.entries.len().checked_sub(1)?;
        self.move_to(CursorPosition::new(position.line, last))
    }
}
