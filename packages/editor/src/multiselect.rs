//! Walkers that act on a multi-node selection: highlighting, deleting and copying.

use crate::cursor::NodeCursor;
use crate::errors::EditorResult;
use crate::tree_iterator::{RenderedTreeIterator, TreeWalker};
use blockcode_language::python::behaviour::is_empty;
use blockcode_language::{ChildSetRef, Document, EditingSession, Fragment, NodeId, SerializedNode};
use std::collections::BTreeMap;
use tracing::debug;

/// Every child-set range touched by a selection, as `(start, end)` child indexes.
#[derive(Debug, Default)]
pub struct MultiselectHighlighter {
    ranges: BTreeMap<ChildSetRef, (usize, usize)>,
}

impl MultiselectHighlighter {
    pub fn highlight(doc: &Document, start: NodeCursor, end: NodeCursor) -> BTreeMap<ChildSetRef, (usize, usize)> {
        let mut walker = Self::default();
        RenderedTreeIterator::new(doc, start, end).walk_to_end(&mut walker);
        walker.ranges
    }

    fn record(&mut self, cs: ChildSetRef, start: usize, end: usize) {
        if end > start {
            self.ranges.insert(cs, (start, end));
        }
    }
}

impl TreeWalker for MultiselectHighlighter {
    fn visited_range_left(&mut self, _doc: &Document, cs: ChildSetRef, start: usize, end: usize) {
        self.record(cs, start, end);
    }

    fn visited_range_right(&mut self, _doc: &Document, cs: ChildSetRef, start: usize, end: usize) {
        self.record(cs, start, end);
    }
}

/// Collects the outermost deletable nodes of a selection and the partially covered tails
/// that must survive the delete.
#[derive(Debug, Default)]
pub struct MultiselectDeleter {
    node_stack: Vec<NodeId>,
    to_fully_delete: Vec<NodeId>,
    to_keep: Vec<(ChildSetRef, usize)>,
}

impl MultiselectDeleter {
    pub fn new(doc: &Document, start: NodeCursor, end: NodeCursor) -> Self {
        let mut walker = Self::default();
        RenderedTreeIterator::new(doc, start, end).walk_to_end(&mut walker);
        walker
    }

    pub fn nodes_to_delete(&self) -> &[NodeId] {
        &self.to_fully_delete
    }

    /// Remove the selected nodes, returning copies of the unselected remainders of partially
    /// selected nodes, one fragment per child set.
    pub fn perform_delete(self, session: &mut EditingSession) -> EditorResult<Vec<Fragment>> {
        let mut kept = Vec::new();
        for (cs, end) in &self.to_keep {
            let Some(category) = session.document().child_set(*cs).map(|set| set.category()) else {
                continue;
            };
            let remaining: Vec<NodeId> = session.document().children(*cs)[*end..]
                .iter()
                .copied()
                .filter(|node| !is_empty(session.document(), *node))
                .collect();
            let copies: Vec<NodeId> = remaining
                .into_iter()
                .filter_map(|node| session.clone_node(node))
                .collect();
            if !copies.is_empty() {
                kept.push(session.fragment(copies, category)?);
            }
        }

        for node in &self.to_fully_delete {
            let doc = session.document();
            let (Some(parent), Some(index)) = (doc.parent(*node), doc.index_in_parent(*node)) else {
                continue;
            };
            if doc.child_set(parent).is_some_and(|set| set.allow_delete()) {
                session.remove_child(parent, index)?;
                session.clean(parent.node);
            }
        }
        debug!(deleted = self.to_fully_delete.len(), kept = kept.len(), "multiselect delete");
        Ok(kept)
    }

    fn visited_range(&mut self, doc: &Document, cs: ChildSetRef, end: usize) {
        if end < doc.children(cs).len() && !self.node_stack.is_empty() {
            self.to_keep.push((cs, end));
        }
    }
}

impl TreeWalker for MultiselectDeleter {
    fn visit_node_down(&mut self, doc: &Document, node: NodeId) {
        let deletable = doc
            .parent(node)
            .and_then(|parent| doc.child_set(parent))
            .is_some_and(|set| set.allow_delete());
        if !self.node_stack.is_empty() || deletable {
            self.node_stack.push(node);
        }
    }

    fn visit_node_up(&mut self, _doc: &Document, node: NodeId) {
        if self.node_stack.pop().is_some() && self.node_stack.is_empty() {
            self.to_fully_delete.push(node);
        }
    }

    fn visited_range_left(&mut self, doc: &Document, cs: ChildSetRef, _start: usize, end: usize) {
        self.visited_range(doc, cs, end);
    }

    fn visited_range_right(&mut self, doc: &Document, cs: ChildSetRef, _start: usize, end: usize) {
        self.visited_range(doc, cs, end);
    }
}

/// Serializes the selected part of the tree. Nodes keep only the children inside the
/// selection; ranges with no selected owner become standalone fragments that are combined
/// into one at the end.
#[derive(Debug)]
pub struct MultiselectFragmentCreator {
    node_stack: Vec<SerializedNode>,
    ranges: Vec<Vec<SerializedNode>>,
    orphans: Vec<(ChildSetRef, Vec<SerializedNode>)>,
}

impl MultiselectFragmentCreator {
    pub fn new(doc: &Document, start: NodeCursor, end: NodeCursor) -> Self {
        let mut walker = Self {
            node_stack: Vec::new(),
            ranges: vec![Vec::new()],
            orphans: Vec::new(),
        };
        RenderedTreeIterator::new(doc, start, end).walk_to_end(&mut walker);
        walker
    }

    pub fn into_fragment(self, session: &mut EditingSession) -> Option<Fragment> {
        let mut combined: Option<Fragment> = None;
        for (cs, nodes) in self.orphans {
            let category = session.document().child_set(cs)?.category();
            let ids: Vec<NodeId> = nodes
                .iter()
                .filter_map(|node| session.deserialize_node(node))
                .collect();
            let Ok(fragment) = session.fragment(ids, category) else {
                continue;
            };
            combined = match combined {
                None => Some(fragment),
                Some(previous) => session.combine_fragments(previous, fragment),
            };
        }
        combined
    }

    fn visited_range(&mut self, doc: &Document, cs: ChildSetRef) {
        let children = self.ranges.last_mut().map(std::mem::take).unwrap_or_default();
        if let Some(owner) = self.node_stack.last_mut() {
            if let Some(set) = doc.child_set(cs) {
                owner.child_sets.insert(set.name().to_string(), children);
            }
        } else if !children.is_empty() {
            self.orphans.push((cs, children));
        }
    }
}

impl TreeWalker for MultiselectFragmentCreator {
    fn visit_node_down(&mut self, doc: &Document, node: NodeId) {
        self.node_stack.push(doc.shallow_serialize(node));
        self.ranges.push(Vec::new());
    }

    fn visit_node_up(&mut self, _doc: &Document, _node: NodeId) {
        self.ranges.pop();
        if let Some(node) = self.node_stack.pop() {
            if let Some(range) = self.ranges.last_mut() {
                range.push(node);
            }
        }
    }

    fn visited_range_left(&mut self, doc: &Document, cs: ChildSetRef, _start: usize, _end: usize) {
        self.visited_range(doc, cs);
    }

    fn visited_range_right(&mut self, doc: &Document, cs: ChildSetRef, _start: usize, _end: usize) {
        self.visited_range(doc, cs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockcode_language::python::builders::*;
    use blockcode_language::NodeCategory;

    /// Loads `a + b`, `s1`, `c + d` and returns the first and last token lists.
    fn three_lines(session: &mut EditingSession) -> (ChildSetRef, ChildSetRef) {
        let doc = session.document_mut();
        let a = identifier(doc, "a");
        let plus = binary_operator(doc, "+");
        let b = identifier(doc, "b");
        let first = expression_statement(doc, &[a, plus, b]);
        let s1 = identifier(doc, "s1");
        let middle = expression_statement(doc, &[s1]);
        let c = identifier(doc, "c");
        let plus = binary_operator(doc, "+");
        let d = identifier(doc, "d");
        let last = expression_statement(doc, &[c, plus, d]);
        let root = file(doc, &[first, middle, last]);
        let serialized = session.document().serialize(root);
        let root = session.load(&serialized).unwrap();

        let doc = session.document();
        let body = doc.children_by_name(root, "body").to_vec();
        let tokens = |statement: NodeId| {
            let expr = doc.children_by_name(statement, "statement")[0];
            doc.child_set_ref(expr, "tokens").unwrap()
        };
        (tokens(body[0]), tokens(body[2]))
    }

    #[test]
    fn test_highlight_marks_partial_and_full_ranges() {
        let mut session = EditingSession::default();
        let (first, last) = three_lines(&mut session);
        let ranges = MultiselectHighlighter::highlight(
            session.document(),
            NodeCursor::new(first, 1),
            NodeCursor::new(last, 2),
        );

        assert_eq!(ranges.get(&first), Some(&(1, 3)));
        assert_eq!(ranges.get(&last), Some(&(0, 2)));
        let body = session.document().parent(session.document().parent(first.node).unwrap().node).unwrap();
        assert_eq!(ranges.get(&body), Some(&(1, 3)));
    }

    #[test]
    fn test_delete_keeps_unselected_tail() {
        let mut session = EditingSession::default();
        let (first, last) = three_lines(&mut session);
        let deleter = MultiselectDeleter::new(session.document(), NodeCursor::new(first, 1), NodeCursor::new(last, 2));
        assert_eq!(deleter.nodes_to_delete().len(), 4);

        let kept = deleter.perform_delete(&mut session).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].category(), NodeCategory::PythonExpressionToken);
        assert_eq!(kept[0].len(), 1);
        assert_eq!(session.export_python().unwrap(), "a\n");
    }

    #[test]
    fn test_copy_combines_partial_lines() {
        let mut session = EditingSession::default();
        let (first, last) = three_lines(&mut session);
        let creator =
            MultiselectFragmentCreator::new(session.document(), NodeCursor::new(first, 1), NodeCursor::new(last, 2));
        let fragment = creator.into_fragment(&mut session).unwrap();

        assert_eq!(fragment.category(), NodeCategory::PythonStatement);
        assert_eq!(fragment.len(), 3);
        let sources: Vec<String> = fragment
            .nodes()
            .iter()
            .map(|node| blockcode_language::python::codegen::expression_source(session.document(), *node))
            .collect();
        assert_eq!(sources, vec!["+ b", "s1", "c +"]);
        assert_eq!(session.export_python().unwrap(), "a + b\ns1\nc + d\n");
    }
}
