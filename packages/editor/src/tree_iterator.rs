//! # Rendered Tree Iterator
//!
//! Walks the document in drawn order between two cursors, calling a [`TreeWalker`] as it
//! enters nodes, crosses from a node's left attachments to its right child sets, leaves nodes,
//! and finishes each child-set range.
//!
//! The walk starts mid-tree: before visiting anything, the iterator pushes a resume point for
//! every child set still to come on the path from the start cursor up to the root, so the
//! walk continues outward once the start's own child set is exhausted.

use crate::cursor::NodeCursor;
use crate::layout::{child_set_layout, child_set_order};
use blockcode_language::{ChildSetRef, Document, NodeId};

/// Which side of its owner a child set is drawn on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSide {
    Left,
    Right,
}

/// Hooks called during a walk. Every hook defaults to doing nothing.
pub trait TreeWalker {
    fn visit_node_down(&mut self, _doc: &Document, _node: NodeId) {}

    /// Between a node's left attachments and its right child sets.
    fn visit_node_middle(&mut self, _doc: &Document, _node: NodeId) {}

    fn visit_node_up(&mut self, _doc: &Document, _node: NodeId) {}

    fn start_range_left(&mut self, _doc: &Document, _cs: ChildSetRef, _start: usize) {}

    fn start_range_right(&mut self, _doc: &Document, _cs: ChildSetRef, _start: usize) {}

    /// Children `start..end` of a left attachment have been walked.
    fn visited_range_left(&mut self, _doc: &Document, _cs: ChildSetRef, _start: usize, _end: usize) {}

    /// Children `start..end` of a right child set have been walked.
    fn visited_range_right(&mut self, _doc: &Document, _cs: ChildSetRef, _start: usize, _end: usize) {}
}

pub struct RenderedTreeIterator<'a> {
    doc: &'a Document,
    end: NodeCursor,
    finished: bool,
    stack: Vec<NodeCursor>,
}

impl<'a> RenderedTreeIterator<'a> {
    /// Iterate between two cursors, in whichever order they come in the document.
    pub fn new(doc: &'a Document, a: NodeCursor, b: NodeCursor) -> Self {
        let (start, end) = if a.greater_than(b, doc) { (b, a) } else { (a, b) };
        let mut iterator = Self {
            doc,
            end,
            finished: false,
            stack: Vec::new(),
        };
        iterator.load_stack_after_node(start.child_set, start.index, true);
        iterator
    }

    fn load_stack_after_node(&mut self, cs: ChildSetRef, index: usize, include_node: bool) {
        let owner = cs.node;
        if let (Some(parent), Some(position)) = (self.doc.parent(owner), self.doc.index_in_parent(owner)) {
            self.load_stack_after_node(parent, position, false);
        }
        let order = child_set_order(self.doc, owner);
        if let Some(position) = order.iter().position(|candidate| *candidate == cs) {
            for later in order[position + 1..].iter().rev() {
                self.stack.push(NodeCursor::new(*later, 0));
            }
        }
        let start = if include_node { index } else { index + 1 };
        self.stack.push(NodeCursor::new(cs, start));
    }

    pub fn walk_to_end(&mut self, walker: &mut dyn TreeWalker) {
        while !self.finished {
            let Some(resume) = self.stack.pop() else {
                break;
            };
            let side = side_of(self.doc, resume.child_set);
            self.walk_child_set(walker, resume.child_set, resume.index, side);
        }
    }

    fn walk_node(&mut self, walker: &mut dyn TreeWalker, node: NodeId) {
        walker.visit_node_down(self.doc, node);
        let order = child_set_order(self.doc, node);
        for cs in order.iter().filter(|cs| side_of(self.doc, **cs) == RangeSide::Left) {
            self.walk_child_set(walker, *cs, 0, RangeSide::Left);
        }
        walker.visit_node_middle(self.doc, node);
        for cs in order.iter().filter(|cs| side_of(self.doc, **cs) == RangeSide::Right) {
            self.walk_child_set(walker, *cs, 0, RangeSide::Right);
        }
        walker.visit_node_up(self.doc, node);
    }

    fn walk_child_set(&mut self, walker: &mut dyn TreeWalker, cs: ChildSetRef, start: usize, side: RangeSide) {
        let doc = self.doc;
        let children = doc.children(cs);
        let is_end = cs == self.end.child_set;
        let end = if is_end {
            self.end.index.min(children.len())
        } else {
            children.len()
        };
        match side {
            RangeSide::Left => walker.start_range_left(self.doc, cs, start),
            RangeSide::Right => walker.start_range_right(self.doc, cs, start),
        }
        let mut index = start;
        while index < end && !self.finished {
            self.walk_node(walker, children[index]);
            index += 1;
        }
        if is_end {
            self.finished = true;
        }
        match side {
            RangeSide::Left => walker.visited_range_left(self.doc, cs, start, index),
            RangeSide::Right => walker.visited_range_right(self.doc, cs, start, index),
        }
    }
}

fn side_of(doc: &Document, cs: ChildSetRef) -> RangeSide {
    if child_set_layout(doc, cs).is_left() {
        RangeSide::Left
    } else {
        RangeSide::Right
    }
}
