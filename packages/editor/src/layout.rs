//! # Layout
//!
//! Deterministic monospace layout of a document, producing the geometry of every visible node
//! and child set together with the [`CursorMap`] the selection engine moves through.
//!
//! Inline child sets put an insertion gap before and after each child. Block child sets put
//! each child on its own indented line with line-start and line-end cursors. Invisible wrapper
//! nodes take no space of their own, so their cursors line up with the ones around them and
//! merge into a single caret stop.

use crate::cursor::NodeCursor;
use crate::cursor_map::{CursorMap, CursorType};
use blockcode_language::python::behaviour::is_empty;
use blockcode_language::{ChildSetLayout, ChildSetRef, Document, LayoutComponent, NodeId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Sizes used by layout, in abstract pixels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutMetrics {
    pub char_width: i32,
    pub line_height: i32,
    pub indent_width: i32,
    pub token_spacing: i32,
    pub empty_slot_width: i32,
}

impl Default for LayoutMetrics {
    fn default() -> Self {
        Self {
            char_width: 8,
            line_height: 30,
            indent_width: 32,
            token_spacing: 8,
            empty_slot_width: 16,
        }
    }
}

impl LayoutMetrics {
    fn text_width(&self, text: &str) -> i32 {
        text.chars().count() as i32 * self.char_width
    }
}

/// A node's child sets in the order they are drawn, left attachments first.
pub fn child_set_order(doc: &Document, node: NodeId) -> Vec<ChildSetRef> {
    let spec = doc.kind(node).spec();
    let mut order: Vec<ChildSetRef> = spec
        .layout
        .iter()
        .filter_map(|component| match component {
            LayoutComponent::ChildSet(name, _) => doc.child_set_ref(node, name),
            _ => None,
        })
        .collect();
    for cs in doc.child_set_refs(node) {
        if !order.contains(&cs) {
            order.push(cs);
        }
    }
    order
}

pub fn child_set_layout(doc: &Document, cs: ChildSetRef) -> ChildSetLayout {
    match doc.child_set(cs) {
        Some(set) => doc.kind(cs.node).spec().child_set_layout(set.name()),
        None => ChildSetLayout::Token,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderedNode {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedChildSet {
    pub layout: ChildSetLayout,
    pub x: i32,
    pub y: i32,
    insert_cursors: BTreeSet<usize>,
}

impl RenderedChildSet {
    fn new(layout: ChildSetLayout, x: i32, y: i32) -> Self {
        Self {
            layout,
            x,
            y,
            insert_cursors: BTreeSet::new(),
        }
    }

    /// Indexes that have a caret stop of their own.
    pub fn insert_cursors(&self) -> &BTreeSet<usize> {
        &self.insert_cursors
    }
}

#[derive(Debug, Clone, Default)]
pub struct Layout {
    root: Option<NodeId>,
    nodes: BTreeMap<NodeId, RenderedNode>,
    child_sets: BTreeMap<ChildSetRef, RenderedChildSet>,
}

impl Layout {
    /// Lay out the tree under `root`, with its first body line at the origin.
    pub fn compute(doc: &Document, root: NodeId, metrics: &LayoutMetrics) -> (Layout, CursorMap) {
        let mut builder = LayoutBuilder {
            doc,
            metrics,
            layout: Layout {
                root: Some(root),
                ..Default::default()
            },
            map: CursorMap::new(),
        };
        builder.node(root, -metrics.indent_width, -metrics.line_height);
        builder.map.dedupe_and_sort();
        (builder.layout, builder.map)
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn node(&self, node: NodeId) -> Option<&RenderedNode> {
        self.nodes.get(&node)
    }

    pub fn child_set(&self, cs: ChildSetRef) -> Option<&RenderedChildSet> {
        self.child_sets.get(&cs)
    }

    pub fn is_rendered(&self, cs: ChildSetRef) -> bool {
        self.child_sets.contains_key(&cs)
    }

    pub fn allow_insert_cursor(&self, cs: ChildSetRef, index: usize) -> bool {
        self.child_sets
            .get(&cs)
            .is_some_and(|rendered| rendered.insert_cursors.contains(&index))
    }

    /// First insertion point inside a child set, descending into its children.
    pub fn next_child_insert(&self, doc: &Document, cs: ChildSetRef) -> Option<NodeCursor> {
        if self.allow_insert_cursor(cs, 0) {
            return Some(NodeCursor::new(cs, 0));
        }
        doc.children(cs)
            .iter()
            .find_map(|child| self.next_child_insert_cursor(doc, *child))
    }

    /// First insertion point anywhere inside `node`.
    pub fn next_child_insert_cursor(&self, doc: &Document, node: NodeId) -> Option<NodeCursor> {
        child_set_order(doc, node)
            .into_iter()
            .find_map(|cs| self.next_child_insert(doc, cs))
    }

    /// First insertion point inside the node at `index`, or after it.
    pub fn next_insert_cursor_in_or_after_node(
        &self,
        doc: &Document,
        cs: ChildSetRef,
        index: usize,
    ) -> Option<NodeCursor> {
        if let Some(child) = doc.children(cs).get(index) {
            if let Some(cursor) = self.next_child_insert_cursor(doc, *child) {
                return Some(cursor);
            }
            if self.allow_insert_cursor(cs, index + 1) {
                return Some(NodeCursor::new(cs, index + 1));
            }
        }
        self.next_insert_after_child_set(doc, cs)
    }

    pub fn next_insert_after_child_set(&self, doc: &Document, cs: ChildSetRef) -> Option<NodeCursor> {
        let order = child_set_order(doc, cs.node);
        let position = order.iter().position(|candidate| *candidate == cs)?;
        order[position + 1..]
            .iter()
            .find_map(|next| self.next_child_insert(doc, *next))
            .or_else(|| self.next_insert_after_this_node(doc, cs.node))
    }

    pub fn next_insert_after_this_node(&self, doc: &Document, node: NodeId) -> Option<NodeCursor> {
        let parent = doc.parent(node)?;
        let index = doc.index_in_parent(node)?;
        if self.allow_insert_cursor(parent, index + 1) {
            return Some(NodeCursor::new(parent, index + 1));
        }
        self.next_insert_cursor_in_or_after_node(doc, parent, index + 1)
    }

    /// The gap after the node at `index`, whether or not it takes inserts.
    pub fn next_cursor_in_or_after_node_even_if_invalid(&self, cs: ChildSetRef, index: usize) -> NodeCursor {
        NodeCursor::new(cs, index + 1)
    }

    /// The gap before the node at `index`, whether or not it takes inserts.
    pub fn next_cursor_in_or_before_node_even_if_invalid(&self, cs: ChildSetRef, index: usize) -> NodeCursor {
        NodeCursor::new(cs, index)
    }

    /// Start of the first child set of `node` that is not a left attachment.
    pub fn next_child_cursor_even_if_invalid(&self, doc: &Document, node: NodeId) -> Option<NodeCursor> {
        child_set_order(doc, node)
            .into_iter()
            .find(|cs| child_set_layout(doc, *cs) != ChildSetLayout::Breadcrumbs)
            .map(|cs| NodeCursor::new(cs, 0))
    }

    /// The end of the first child set under `node` that can take an insert.
    pub fn next_end_of_child_set_insert_cursor(&self, doc: &Document, node: NodeId) -> Option<NodeCursor> {
        for cs in child_set_order(doc, node) {
            let children = doc.children(cs);
            for child in children {
                if let Some(cursor) = self.next_end_of_child_set_insert_cursor(doc, *child) {
                    return Some(cursor);
                }
            }
            if self.allow_insert_cursor(cs, children.len()) {
                return Some(NodeCursor::new(cs, children.len()));
            }
        }
        None
    }

    /// Newline targets: blocks of statements and bracketed argument lists.
    pub fn is_insertable_line_child_set(&self, doc: &Document, cs: ChildSetRef) -> bool {
        doc.child_set(cs).is_some_and(|set| set.allow_insert())
            && matches!(
                child_set_layout(doc, cs),
                ChildSetLayout::Block { .. } | ChildSetLayout::TreeBrackets
            )
    }

    /// Whether nothing is drawn after `cs` in its owner. A trailing empty stack does not count.
    pub fn is_last_child_set_of_parent_node(&self, doc: &Document, cs: ChildSetRef) -> bool {
        let Some(set) = doc.child_set(cs) else {
            return false;
        };
        let components = doc.kind(cs.node).spec().layout;
        let mut last = components.last();
        if let Some(LayoutComponent::ChildSet(name, ChildSetLayout::Stack)) = last {
            if doc.children_by_name(cs.node, name).is_empty() && components.len() > 1 {
                last = components.get(components.len() - 2);
            }
        }
        matches!(last, Some(LayoutComponent::ChildSet(name, _)) if *name == set.name())
    }

    pub fn is_last_line_of_parent_node(&self, doc: &Document, cs: ChildSetRef, index: usize) -> bool {
        let last_child_set = self.is_last_child_set_of_parent_node(doc, cs);
        match child_set_layout(doc, cs) {
            ChildSetLayout::Block { .. } | ChildSetLayout::Stack | ChildSetLayout::TreeBrackets => {
                index + 1 == doc.children(cs).len() && last_child_set
            }
            _ => last_child_set,
        }
    }

    /// Where an empty trailing line moves to when unindented: after the nearest enclosing
    /// line-based child set.
    pub fn unindent_target(&self, doc: &Document, cs: ChildSetRef, index: usize) -> Option<NodeCursor> {
        let children = doc.children(cs);
        if index == 0 || index >= children.len() {
            return None;
        }
        if !is_empty(doc, children[index]) || !self.is_last_line_of_parent_node(doc, cs, index) {
            return None;
        }
        let mut parent = doc.parent(cs.node)?;
        let mut parent_index = doc.index_in_parent(cs.node)?;
        while !self.is_insertable_line_child_set(doc, parent)
            && self.is_last_line_of_parent_node(doc, parent, parent_index)
        {
            let owner = parent.node;
            parent = doc.parent(owner)?;
            parent_index = doc.index_in_parent(owner)?;
        }
        if self.is_insertable_line_child_set(doc, parent) {
            Some(NodeCursor::new(parent, parent_index + 1))
        } else {
            None
        }
    }
}

struct Extent {
    width: i32,
    height: i32,
    /// `(y, x)` of the end of the last line drawn.
    last_line: (i32, i32),
}

struct LayoutBuilder<'a> {
    doc: &'a Document,
    metrics: &'a LayoutMetrics,
    layout: Layout,
    map: CursorMap,
}

impl LayoutBuilder<'_> {
    fn node(&mut self, node: NodeId, x: i32, y: i32) -> Extent {
        let metrics = self.metrics;
        let spec = self.doc.kind(node).spec();
        let mut pos = x;
        let mut inline = false;
        let mut margin_left = 0;
        let mut row_height = metrics.line_height;
        let mut below = 0;
        let mut last_line = None;

        for component in spec.layout {
            match *component {
                LayoutComponent::Keyword(text) | LayoutComponent::Cap(text) => {
                    pos += metrics.text_width(text) + metrics.token_spacing;
                    inline = true;
                }
                LayoutComponent::Property(name) => {
                    let text = property_text(self.doc[node].property(name));
                    pos += metrics.text_width(&text).max(metrics.char_width) + metrics.token_spacing;
                    inline = true;
                }
                LayoutComponent::StringLiteral(name) => {
                    let value = self.doc[node].property_str(name);
                    pos += metrics.text_width(value) + 2 * metrics.char_width + metrics.token_spacing;
                    inline = true;
                }
                LayoutComponent::ChildSet(name, layout) => {
                    let Some(cs) = self.doc.child_set_ref(node, name) else {
                        continue;
                    };
                    match layout {
                        ChildSetLayout::Token | ChildSetLayout::AttachRight => {
                            let extent = self.inline(cs, layout, pos, y);
                            pos += extent.width + metrics.token_spacing;
                            row_height = row_height.max(extent.height);
                            inline = true;
                        }
                        ChildSetLayout::TreeBrackets => {
                            pos += metrics.char_width;
                            let extent = self.tree(cs, pos, y);
                            pos += extent.width + metrics.char_width + metrics.token_spacing;
                            row_height = row_height.max(extent.height);
                            inline = true;
                        }
                        ChildSetLayout::Breadcrumbs => {
                            let extent = self.inline(cs, layout, pos, y);
                            pos += extent.width + metrics.char_width;
                            margin_left = pos - x;
                            inline = true;
                        }
                        ChildSetLayout::Block { end_cursor } => {
                            let top = y + row_height + below;
                            let extent = self.lines(cs, layout, x + metrics.indent_width, top, end_cursor);
                            below += extent.height;
                            if extent.height > 0 {
                                last_line = Some(extent.last_line);
                            }
                        }
                        ChildSetLayout::Stack => {
                            let extent = self.lines(cs, layout, x, y + row_height + below, false);
                            below += extent.height;
                            if extent.height > 0 {
                                last_line = Some(extent.last_line);
                            }
                        }
                    }
                }
            }
        }

        let width = if inline {
            (pos - x - metrics.token_spacing).max(0)
        } else {
            0
        };
        if !spec.invisible {
            if let (Some(parent), Some(index)) = (self.doc.parent(node), self.doc.index_in_parent(node)) {
                self.map
                    .register_node_start(NodeCursor::new(parent, index), x + margin_left, y);
            }
        }
        let height = row_height + below;
        self.layout.nodes.insert(node, RenderedNode { x, y, width, height });
        Extent {
            width,
            height,
            last_line: last_line.unwrap_or((y, x + width)),
        }
    }

    /// Children side by side with an insertion gap around each when the set takes inserts.
    fn inline(&mut self, cs: ChildSetRef, layout: ChildSetLayout, x: i32, y: i32) -> Extent {
        let metrics = self.metrics;
        let allow = self.doc.child_set(cs).is_some_and(|set| set.allow_insert());
        let children = self.doc.children(cs).to_vec();
        let mut rendered = RenderedChildSet::new(layout, x, y);
        let mut pos = x;
        let mut height = metrics.line_height;

        if allow {
            self.map
                .register_cursor_start(NodeCursor::new(cs, 0), pos, y, CursorType::Primary);
            rendered.insert_cursors.insert(0);
        }
        if children.is_empty() && allow {
            pos += metrics.empty_slot_width;
        }
        for (index, child) in children.iter().enumerate() {
            if allow || index > 0 {
                pos += metrics.token_spacing;
            }
            let extent = self.node(*child, pos, y);
            pos += extent.width;
            height = height.max(extent.height);
            if allow {
                self.map
                    .register_cursor_start(NodeCursor::new(cs, index + 1), pos, y, CursorType::Primary);
                rendered.insert_cursors.insert(index + 1);
            }
        }

        self.layout.child_sets.insert(cs, rendered);
        Extent {
            width: pos - x,
            height,
            last_line: (y, pos),
        }
    }

    /// Comma separated children, each bracketed by line-start and line-end cursors.
    fn tree(&mut self, cs: ChildSetRef, x: i32, y: i32) -> Extent {
        let metrics = self.metrics;
        let allow = self.doc.child_set(cs).is_some_and(|set| set.allow_insert());
        let children = self.doc.children(cs).to_vec();
        let mut rendered = RenderedChildSet::new(ChildSetLayout::TreeBrackets, x, y);
        let mut pos = x;
        let mut height = metrics.line_height;

        if children.is_empty() && allow {
            self.map
                .register_cursor_start(NodeCursor::new(cs, 0), pos, y, CursorType::Primary);
            rendered.insert_cursors.insert(0);
            pos += metrics.empty_slot_width;
        }
        for (index, child) in children.iter().enumerate() {
            if index > 0 {
                pos += metrics.char_width + metrics.token_spacing;
            }
            let start = pos;
            let extent = self.node(*child, pos, y);
            pos += extent.width;
            height = height.max(extent.height);
            self.map
                .register_cursor_start(NodeCursor::new(cs, index), start, y, CursorType::LineStart);
            self.map
                .register_cursor_start(NodeCursor::new(cs, index + 1), pos, y, CursorType::LineEnd);
        }

        self.layout.child_sets.insert(cs, rendered);
        Extent {
            width: pos - x,
            height,
            last_line: (y, pos),
        }
    }

    /// One line per child, optionally followed by an empty line to insert into.
    fn lines(&mut self, cs: ChildSetRef, layout: ChildSetLayout, x: i32, y: i32, end_line: bool) -> Extent {
        let metrics = self.metrics;
        let allow = self.doc.child_set(cs).is_some_and(|set| set.allow_insert());
        let children = self.doc.children(cs).to_vec();
        let mut rendered = RenderedChildSet::new(layout, x, y);
        let mut top = y;
        let mut last_line = (y, x);

        for (index, child) in children.iter().enumerate() {
            let extent = self.node(*child, x, top);
            if allow {
                self.map
                    .register_cursor_start(NodeCursor::new(cs, index), x, top, CursorType::LineStart);
                let (end_y, end_x) = extent.last_line;
                self.map.register_end_cursor(NodeCursor::new(cs, index + 1), end_x, end_y);
                rendered.insert_cursors.insert(index);
                rendered.insert_cursors.insert(index + 1);
            }
            last_line = extent.last_line;
            top += extent.height;
        }
        let empty_block = children.is_empty() && matches!(layout, ChildSetLayout::Block { .. });
        if allow && (end_line || empty_block) {
            self.map
                .register_cursor_start(NodeCursor::new(cs, children.len()), x, top, CursorType::LineStart);
            rendered.insert_cursors.insert(children.len());
            last_line = (top, x);
            top += metrics.line_height;
        }

        self.layout.child_sets.insert(cs, rendered);
        Extent {
            width: 0,
            height: top - y,
            last_line,
        }
    }
}

fn property_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Bool(true)) => "True".to_string(),
        Some(Value::Bool(false)) => "False".to_string(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}
