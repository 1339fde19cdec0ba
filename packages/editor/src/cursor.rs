//! Positions between and on nodes.

use crate::layout::child_set_order;
use blockcode_language::{ChildSetRef, Document, NodeId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A gap in a child set: `index` is the insertion point, or the node at `index` when a node
/// is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeCursor {
    pub child_set: ChildSetRef,
    pub index: usize,
}

impl NodeCursor {
    pub fn new(child_set: ChildSetRef, index: usize) -> Self {
        Self { child_set, index }
    }

    /// The cursor one past this one in the same child set.
    pub fn next(self) -> Self {
        Self::new(self.child_set, self.index + 1)
    }

    pub fn node(self, doc: &Document) -> Option<NodeId> {
        doc.children(self.child_set).get(self.index).copied()
    }

    /// Child-set order and index pairs from the root down to this cursor.
    pub fn chain_to_root(self, doc: &Document) -> Vec<usize> {
        let mut chain = node_chain(doc, self.child_set.node);
        chain.push(order_index(doc, self.child_set));
        chain.push(self.index);
        chain
    }

    /// Document order, comparing chains element by element; a strict prefix sorts first.
    pub fn compare(self, other: NodeCursor, doc: &Document) -> Ordering {
        self.chain_to_root(doc).cmp(&other.chain_to_root(doc))
    }

    pub fn greater_than(self, other: NodeCursor, doc: &Document) -> bool {
        self.compare(other, doc) == Ordering::Greater
    }
}

impl fmt::Display for NodeCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.child_set, self.index)
    }
}

fn node_chain(doc: &Document, node: NodeId) -> Vec<usize> {
    let mut reversed = Vec::new();
    let mut current = node;
    while let Some(parent) = doc.parent(current) {
        reversed.push(doc.index_in_parent(current).unwrap_or(0));
        reversed.push(order_index(doc, parent));
        current = parent.node;
    }
    reversed.reverse();
    reversed
}

fn order_index(doc: &Document, child_set: ChildSetRef) -> usize {
    child_set_order(doc, child_set.node)
        .iter()
        .position(|cs| *cs == child_set)
        .unwrap_or(child_set.slot)
}

/// A line and entry in the cursor map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CursorPosition {
    pub line: usize,
    pub entry: usize,
}

impl CursorPosition {
    pub fn new(line: usize, entry: usize) -> Self {
        Self { line, entry }
    }
}

/// Where a cursor movement landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorMove {
    pub position: CursorPosition,
    /// `false` when the entry is a node rather than an insertion point.
    pub is_cursor: bool,
    pub x: i32,
    pub y: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockcode_language::python::builders::*;

    #[test]
    fn test_chain_orders_nested_cursors() {
        let mut doc = Document::new();
        let a = identifier(&mut doc, "a");
        let first = expression_statement(&mut doc, &[a]);
        let b = identifier(&mut doc, "b");
        let second = expression_statement(&mut doc, &[b]);
        let root = file(&mut doc, &[first, second]);

        let body = doc.child_set_ref(root, "body").unwrap();
        let first_expr = doc.children_by_name(first, "statement")[0];
        let tokens = doc.child_set_ref(first_expr, "tokens").unwrap();

        let inside_first = NodeCursor::new(tokens, 1);
        let between = NodeCursor::new(body, 1);
        assert!(between.greater_than(inside_first, &doc));
        assert!(!inside_first.greater_than(between, &doc));
        assert_eq!(inside_first.chain_to_root(&doc), vec![0, 0, 0, 0, 0, 1]);
        assert_eq!(between.compare(between, &doc), Ordering::Equal);
    }

    #[test]
    fn test_cursor_display() {
        let mut doc = Document::new();
        let root = file(&mut doc, &[]);
        let body = doc.child_set_ref(root, "body").unwrap();
        assert_eq!(NodeCursor::new(body, 2).to_string(), format!("{root}.0@2"));
    }
}
