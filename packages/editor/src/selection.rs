//! # Node Selection
//!
//! The caret and selection state machine over an [`EditingSession`].
//!
//! ## States
//!
//! - `Empty`: nothing selected
//! - `Cursor`: caret at an insertion point
//! - `Inserting`: caret with an open insert box
//! - `SingleNode`: one node selected
//! - `Editing`: one node selected with its editable property open
//! - `MultiNode`: a range between two cursors
//!
//! Every operation that changes the document re-runs layout and then replays the child-set
//! mutations it caused, in order: an insert moves the caret into or just after the inserted
//! node, a delete moves it to the gap the node left. Operations that know better place the
//! caret explicitly afterwards.

use crate::clipboard::{read_fragment, write_fragment, Clipboard};
use crate::cursor::{CursorMove, CursorPosition, NodeCursor};
use crate::cursor_map::CursorMap;
use crate::errors::{EditorError, EditorResult};
use crate::layout::{Layout, LayoutMetrics};
use crate::multiselect::{MultiselectDeleter, MultiselectFragmentCreator, MultiselectHighlighter};
use blockcode_language::adapters::{adapt_node_to_paste_destination, is_adaptable_to_paste_destination};
use blockcode_language::python::behaviour::{is_empty, wrap_insert_child_set};
use blockcode_language::python::builders::blank_fill;
use blockcode_language::{
    ChildSetMutation, ChildSetMutationKind, ChildSetRef, EditingSession, Fragment, FragmentError, LanguageError,
    NodeId, SerializedNode, Subscription,
};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionState {
    Empty,
    Cursor,
    Inserting,
    SingleNode,
    Editing,
    MultiNode,
}

/// The property being edited on the selected node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditBox {
    pub node: NodeId,
    pub property: &'static str,
    pub value: String,
}

/// Text typed at the caret before it becomes a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertBox {
    pub position: CursorPosition,
    pub contents: String,
}

pub struct NodeSelection {
    session: EditingSession,
    metrics: LayoutMetrics,
    layout: Layout,
    cursor_map: CursorMap,
    state: SelectionState,
    cursor: CursorPosition,
    selection_start: Option<NodeCursor>,
    selection_end: Option<NodeCursor>,
    selected_ranges: BTreeMap<ChildSetRef, (usize, usize)>,
    edit_box: Option<EditBox>,
    insert_box: Option<InsertBox>,
    last_x: i32,
    last_y: i32,
    journal: Rc<RefCell<Vec<ChildSetMutation>>>,
    subscription: Option<Subscription>,
}

impl NodeSelection {
    pub fn new(session: EditingSession, metrics: LayoutMetrics) -> Self {
        let mut selection = Self {
            session,
            metrics,
            layout: Layout::default(),
            cursor_map: CursorMap::new(),
            state: SelectionState::Empty,
            cursor: CursorPosition::default(),
            selection_start: None,
            selection_end: None,
            selected_ranges: BTreeMap::new(),
            edit_box: None,
            insert_box: None,
            last_x: 0,
            last_y: 0,
            journal: Rc::new(RefCell::new(Vec::new())),
            subscription: None,
        };
        selection.subscribe();
        selection.update_render_positions();
        selection
    }

    /// Load a document and put the caret at its first stop.
    pub fn load(&mut self, serialized: &SerializedNode) -> EditorResult<NodeId> {
        let root = self.session.load(serialized)?;
        self.subscribe();
        self.clear_selection();
        self.update_render_positions();
        if !self.cursor_map.is_empty() {
            let first = CursorPosition::new(0, 0);
            let is_cursor = self.cursor_map.entry(first).is_some_and(|entry| entry.is_cursor());
            self.place_cursor_position(first, is_cursor, true);
        }
        Ok(root)
    }

    fn subscribe(&mut self) {
        self.subscription = None;
        self.journal.borrow_mut().clear();
        let sink = self.journal.clone();
        self.subscription = Some(
            self.session
                .subscribe_child_sets(move |mutation| sink.borrow_mut().push(mutation.clone())),
        );
    }

    pub fn session(&self) -> &EditingSession {
        &self.session
    }

    /// Direct access to the session. Call [`NodeSelection::update_render_positions`] after
    /// changing the document through it.
    pub fn session_mut(&mut self) -> &mut EditingSession {
        &mut self.session
    }

    pub fn into_session(self) -> EditingSession {
        self.session
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn cursor_map(&self) -> &CursorMap {
        &self.cursor_map
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    pub fn cursor(&self) -> CursorPosition {
        self.cursor
    }

    pub fn selection_start(&self) -> Option<NodeCursor> {
        self.selection_start
    }

    pub fn selection_end(&self) -> Option<NodeCursor> {
        self.selection_end
    }

    pub fn selected_ranges(&self) -> &BTreeMap<ChildSetRef, (usize, usize)> {
        &self.selected_ranges
    }

    pub fn edit_box(&self) -> Option<&EditBox> {
        self.edit_box.as_ref()
    }

    pub fn insert_box(&self) -> Option<&InsertBox> {
        self.insert_box.as_ref()
    }

    pub fn is_cursor(&self) -> bool {
        matches!(self.state, SelectionState::Cursor | SelectionState::Inserting)
    }

    pub fn is_single_node(&self) -> bool {
        matches!(self.state, SelectionState::SingleNode | SelectionState::Editing)
    }

    pub fn is_editing_single_node(&self) -> bool {
        self.state == SelectionState::Editing
    }

    pub fn is_multi_select(&self) -> bool {
        self.state == SelectionState::MultiNode
    }

    /// Whether the node at `index` lies inside the current selection.
    pub fn is_selected_node(&self, cs: ChildSetRef, index: usize) -> bool {
        self.selected_ranges
            .get(&cs)
            .is_some_and(|(start, end)| *start <= index && index < *end)
    }

    /// The selected node, when exactly one is selected.
    pub fn selected_node(&self) -> Option<NodeId> {
        if !self.is_single_node() {
            return None;
        }
        self.selection_start?.node(self.session.document())
    }

    pub fn cursor_xy(&self) -> Option<(i32, i32)> {
        self.cursor_map.coordinates(self.cursor)
    }

    pub fn last_xy(&self) -> (i32, i32) {
        (self.last_x, self.last_y)
    }

    // ---- Layout ----

    pub fn update_render_positions(&mut self) {
        let (layout, map) = match self.session.root() {
            Some(root) => Layout::compute(self.session.document(), root, &self.metrics),
            None => (Layout::default(), CursorMap::new()),
        };
        self.layout = layout;
        self.cursor_map = map;
    }

    /// Re-run layout and move the caret for every child-set change since the last sync.
    fn sync(&mut self) {
        self.update_render_positions();
        let mutations: Vec<ChildSetMutation> = self.journal.borrow_mut().drain(..).collect();
        for mutation in &mutations {
            self.handle_child_set_mutation(mutation);
        }
    }

    fn handle_child_set_mutation(&mut self, mutation: &ChildSetMutation) {
        if !self.layout.is_rendered(mutation.child_set) {
            return;
        }
        let doc = self.session.document();
        match &mutation.kind {
            ChildSetMutationKind::Insert { nodes } => {
                let [inserted] = nodes.as_slice() else {
                    return;
                };
                if doc.parent(inserted.id) != Some(mutation.child_set) {
                    return;
                }
                let index = doc.index_in_parent(inserted.id).unwrap_or(mutation.index);
                let target = self
                    .layout
                    .next_end_of_child_set_insert_cursor(doc, inserted.id)
                    .or_else(|| {
                        self.layout
                            .next_insert_cursor_in_or_after_node(doc, mutation.child_set, index)
                    });
                if let Some(target) = target {
                    self.place_cursor(target);
                }
            }
            ChildSetMutationKind::Delete => {
                let index = mutation.index.min(doc.children(mutation.child_set).len());
                self.place_cursor(NodeCursor::new(mutation.child_set, index));
                self.fix_cursor_to_valid_position();
            }
        }
    }

    // ---- Placement ----

    fn cursor_position_for(&self, cursor: NodeCursor) -> Option<CursorPosition> {
        if let Some(position) = self.cursor_map.find(cursor) {
            return Some(position);
        }
        let next = self.layout.next_insert_cursor_in_or_after_node(
            self.session.document(),
            cursor.child_set,
            cursor.index,
        )?;
        self.cursor_map.find(next)
    }

    /// Put the caret at an insertion point, or the next one after it. Returns whether a stop
    /// was found.
    pub fn place_cursor(&mut self, cursor: NodeCursor) -> bool {
        match self.cursor_position_for(cursor) {
            Some(position) => {
                self.place_cursor_position(position, true, true);
                true
            }
            None => {
                debug!(cursor = %cursor, "no caret stop for cursor");
                false
            }
        }
    }

    pub fn place_cursor_position(&mut self, position: CursorPosition, is_cursor: bool, update_xy: bool) {
        if is_cursor {
            self.set_selection_cursor(position);
        } else {
            self.select_node_at_position(position);
        }
        if update_xy {
            if let Some((x, y)) = self.cursor_map.coordinates(position) {
                self.last_x = x;
                self.last_y = y;
            }
        }
    }

    pub fn place_cursor_by_xy(&mut self, x: i32, y: i32) {
        if let Some((position, is_cursor)) = self.cursor_map.cursor_position_by_coordinate(x, y) {
            self.place_cursor_position(position, is_cursor, false);
            self.last_x = x;
            self.last_y = y;
        }
    }

    /// Clamp a caret left pointing past the end of the map back onto a real stop.
    pub fn fix_cursor_to_valid_position(&mut self) {
        if self.cursor_map.is_valid(self.cursor) {
            return;
        }
        let lines = self.cursor_map.lines();
        let Some(last_line) = lines.len().checked_sub(1) else {
            self.clear_selection();
            return;
        };
        let line = self.cursor.line.min(last_line);
        let entry = self.cursor.entry.min(lines[line].entries.len().saturating_sub(1));
        let position = CursorPosition::new(line, entry);
        let is_cursor = self.cursor_map.entry(position).is_some_and(|entry| entry.is_cursor());
        self.place_cursor_position(position, is_cursor, false);
    }

    fn ensure_cursor_state(&mut self) {
        if self.is_cursor() && self.cursor_map.is_valid(self.cursor) {
            return;
        }
        self.fix_cursor_to_valid_position();
        if !self.is_cursor() && self.cursor_map.is_valid(self.cursor) {
            self.set_selection_cursor(self.cursor);
        }
    }

    pub fn current_node_cursors(&self) -> Vec<NodeCursor> {
        if !self.is_cursor() {
            return Vec::new();
        }
        self.cursor_map.node_cursors_for_position(self.cursor)
    }

    pub fn autocomplete_node_cursors(&self) -> Vec<NodeCursor> {
        if !self.is_cursor() {
            return Vec::new();
        }
        self.cursor_map.autocomplete_cursors(self.cursor)
    }

    // ---- Selection state ----

    pub fn clear_selection(&mut self) {
        self.state = SelectionState::Empty;
        self.selection_start = None;
        self.selection_end = None;
        self.selected_ranges.clear();
        self.edit_box = None;
        self.insert_box = None;
    }

    pub fn set_selection_cursor(&mut self, position: CursorPosition) {
        self.clear_selection();
        self.cursor = position;
        self.state = SelectionState::Cursor;
        let anchor = self.cursor_map.multi_select_cursor_for_position(position);
        self.selection_start = anchor;
        self.selection_end = anchor;
    }

    pub fn select_node_at_position(&mut self, position: CursorPosition) {
        if let Some(node) = self.cursor_map.single_node_for_position(position) {
            self.set_selection_single_node(node, position);
        }
    }

    pub fn set_selection_single_node(&mut self, node: NodeCursor, position: CursorPosition) {
        self.clear_selection();
        self.cursor = position;
        self.state = SelectionState::SingleNode;
        self.selection_start = Some(node);
        self.selection_end = Some(node);
        self.selected_ranges
            .insert(node.child_set, (node.index, node.index + 1));
    }

    /// Select between `start` and `end`. When `end` came from a node entry it is widened to
    /// take in that node.
    pub fn set_selection_multiselect(
        &mut self,
        start: NodeCursor,
        end: NodeCursor,
        position: CursorPosition,
        is_cursor: bool,
    ) {
        let doc = self.session.document();
        let end = if is_cursor || start.greater_than(end, doc) {
            end
        } else {
            self.layout
                .next_cursor_in_or_after_node_even_if_invalid(end.child_set, end.index)
        };
        if start == end {
            if is_cursor {
                self.set_selection_cursor(position);
            } else {
                self.select_node_at_position(position);
            }
            return;
        }
        let ranges = MultiselectHighlighter::highlight(doc, start, end);
        self.clear_selection();
        self.cursor = position;
        self.state = SelectionState::MultiNode;
        self.selection_start = Some(start);
        self.selection_end = Some(end);
        self.selected_ranges = ranges;
    }

    pub fn start_multi_select(&mut self, cursor_is_start: bool) {
        match self.state {
            SelectionState::MultiNode => {}
            SelectionState::SingleNode | SelectionState::Editing => {
                let Some(node) = self.selection_start else {
                    return;
                };
                let before = self
                    .layout
                    .next_cursor_in_or_before_node_even_if_invalid(node.child_set, node.index);
                let after = self
                    .layout
                    .next_cursor_in_or_after_node_even_if_invalid(node.child_set, node.index);
                if cursor_is_start {
                    self.set_selection_multiselect(after, before, self.cursor, true);
                } else {
                    self.set_selection_multiselect(before, after, self.cursor, true);
                }
            }
            _ => {
                let Some(anchor) = self.cursor_map.multi_select_cursor_for_position(self.cursor) else {
                    return;
                };
                self.clear_selection();
                self.state = SelectionState::MultiNode;
                self.selection_start = Some(anchor);
                self.selection_end = Some(anchor);
            }
        }
    }

    pub fn update_multi_select(&mut self, position: CursorPosition, is_cursor: bool) {
        let (Some(start), Some(end)) = (
            self.selection_start,
            self.cursor_map.multi_select_cursor_for_position(position),
        ) else {
            return;
        };
        self.set_selection_multiselect(start, end, position, is_cursor);
    }

    /// The selection's ends in document order.
    fn ordered_selection(&self) -> Option<(NodeCursor, NodeCursor)> {
        let (start, end) = (self.selection_start?, self.selection_end?);
        if start.greater_than(end, self.session.document()) {
            Some((end, start))
        } else {
            Some((start, end))
        }
    }

    // ---- Movement ----

    fn apply_move(&mut self, target: Option<CursorMove>, keep_x: bool) {
        let Some(target) = target else {
            return;
        };
        self.place_cursor_position(target.position, target.is_cursor, !keep_x);
        if keep_x {
            self.last_y = target.y;
        }
    }

    fn collapse_multi_select(&mut self, to_end: bool) -> bool {
        if !self.is_multi_select() {
            return false;
        }
        if let Some((start, end)) = self.ordered_selection() {
            let target = if to_end { end } else { start };
            if !self.place_cursor(target) {
                self.ensure_cursor_state();
            }
        }
        true
    }

    pub fn move_cursor_left(&mut self, shift: bool) {
        if shift {
            self.edit_selection_left();
            return;
        }
        self.exit_edit();
        if self.collapse_multi_select(false) {
            return;
        }
        self.apply_move(self.cursor_map.cursor_left(self.cursor), false);
    }

    pub fn move_cursor_right(&mut self, shift: bool) {
        if shift {
            self.edit_selection_right();
            return;
        }
        self.exit_edit();
        if self.collapse_multi_select(true) {
            return;
        }
        self.apply_move(self.cursor_map.cursor_right(self.cursor), false);
    }

    pub fn move_cursor_up(&mut self, shift: bool) {
        if shift {
            self.edit_selection_up();
            return;
        }
        self.exit_edit();
        self.apply_move(self.cursor_map.cursor_up(self.last_x, self.cursor), true);
    }

    pub fn move_cursor_down(&mut self, shift: bool) {
        if shift {
            self.edit_selection_down();
            return;
        }
        self.exit_edit();
        self.apply_move(self.cursor_map.cursor_down(self.last_x, self.cursor), true);
    }

    pub fn move_cursor_to_start_of_line(&mut self, shift: bool) {
        let target = self.cursor_map.cursor_start_of_line(self.cursor);
        self.shift_or_move(target, shift, true);
    }

    pub fn move_cursor_to_end_of_line(&mut self, shift: bool) {
        let target = self.cursor_map.cursor_end_of_line(self.cursor);
        self.shift_or_move(target, shift, false);
    }

    fn shift_or_move(&mut self, target: Option<CursorMove>, shift: bool, cursor_is_start: bool) {
        let Some(target) = target else {
            return;
        };
        if shift {
            self.start_multi_select(cursor_is_start);
            self.update_multi_select(target.position, target.is_cursor);
        } else {
            self.exit_edit();
            self.place_cursor_position(target.position, target.is_cursor, true);
        }
    }

    /// Step until the caret reaches an insertion point that accepts new nodes.
    pub fn move_cursor_to_next_insert(&mut self, backwards: bool) {
        self.exit_edit();
        let total: usize = self.cursor_map.lines().iter().map(|line| line.entries.len()).sum();
        for _ in 0..total {
            let before = self.cursor;
            let target = if backwards {
                self.cursor_map.cursor_left(self.cursor)
            } else {
                self.cursor_map.cursor_right(self.cursor)
            };
            self.apply_move(target, false);
            if self.is_cursor() && !self.autocomplete_node_cursors().is_empty() {
                return;
            }
            if self.cursor == before {
                return;
            }
        }
    }

    pub fn edit_selection_left(&mut self) {
        self.start_multi_select(true);
        if let Some(target) = self.cursor_map.cursor_left(self.cursor) {
            self.update_multi_select(target.position, target.is_cursor);
        }
    }

    pub fn edit_selection_right(&mut self) {
        self.start_multi_select(false);
        if let Some(target) = self.cursor_map.cursor_right(self.cursor) {
            self.update_multi_select(target.position, target.is_cursor);
        }
    }

    pub fn edit_selection_up(&mut self) {
        self.start_multi_select(true);
        if let Some(target) = self.cursor_map.cursor_up(self.last_x, self.cursor) {
            self.update_multi_select(target.position, target.is_cursor);
        }
    }

    pub fn edit_selection_down(&mut self) {
        self.start_multi_select(false);
        if let Some(target) = self.cursor_map.cursor_down(self.last_x, self.cursor) {
            self.update_multi_select(target.position, target.is_cursor);
        }
    }

    /// Shift extends the selection; clicking the selected node again opens it for editing.
    pub fn handle_click(&mut self, x: i32, y: i32, shift: bool) {
        let Some((position, is_cursor)) = self.cursor_map.cursor_position_by_coordinate(x, y) else {
            return;
        };
        if shift && self.state != SelectionState::Empty {
            self.start_multi_select(false);
            self.update_multi_select(position, is_cursor);
            return;
        }
        if !is_cursor && self.state == SelectionState::SingleNode && position == self.cursor {
            self.start_edit_at_current_cursor();
            return;
        }
        self.exit_edit();
        self.place_cursor_position(position, is_cursor, false);
        self.last_x = x;
        self.last_y = y;
    }

    // ---- Editing ----

    pub fn start_insert_at_current_cursor(&mut self) -> bool {
        if self.state != SelectionState::Cursor {
            return false;
        }
        self.state = SelectionState::Inserting;
        self.insert_box = Some(InsertBox {
            position: self.cursor,
            contents: String::new(),
        });
        true
    }

    pub fn update_insert_contents(&mut self, contents: &str) {
        if let Some(insert_box) = &mut self.insert_box {
            insert_box.contents = contents.to_string();
        }
    }

    pub fn start_edit_at_current_cursor(&mut self) -> bool {
        if self.state != SelectionState::SingleNode {
            return false;
        }
        let Some(node) = self.selected_node() else {
            return false;
        };
        let Some(property) = self.session.document()[node].editable_property() else {
            return false;
        };
        let value = self.session.document()[node].property_str(property).to_string();
        self.edit_box = Some(EditBox { node, property, value });
        self.state = SelectionState::Editing;
        true
    }

    /// Apply typed text to the open edit box, returning the value actually stored.
    pub fn update_property_edit(&mut self, input: &str) -> EditorResult<String> {
        let node = self.edit_box.as_ref().ok_or(EditorError::NothingSelected)?.node;
        let stored = self.session.set_editable_property_value(node, input)?;
        if let Some(edit_box) = &mut self.edit_box {
            edit_box.value = stored.clone();
        }
        self.update_render_positions();
        Ok(stored)
    }

    pub fn exit_edit(&mut self) {
        match self.state {
            SelectionState::Editing => {
                self.edit_box = None;
                let Some(node) = self.selection_start else {
                    self.clear_selection();
                    return;
                };
                match self.cursor_map.find_node(node) {
                    Some(position) => self.set_selection_single_node(node, position),
                    None => self.state = SelectionState::SingleNode,
                }
            }
            SelectionState::Inserting => {
                self.insert_box = None;
                self.place_cursor_by_xy(self.last_x, self.last_y);
            }
            _ => {}
        }
    }

    // ---- Structure ----

    /// Insert `node` at `index`, adapting it to the child set first.
    pub fn insert_node_by_child_set(&mut self, cs: ChildSetRef, index: usize, node: NodeId) -> EditorResult<bool> {
        let doc = self.session.document();
        let Some(set) = doc.child_set(cs) else {
            return Ok(false);
        };
        let category = set.category();
        if !set.allow_insert() || !is_adaptable_to_paste_destination(doc.kind(node), category) {
            return Ok(false);
        }
        let Some(adapted) = adapt_node_to_paste_destination(self.session.document_mut(), node, category) else {
            return Ok(false);
        };
        self.session.insert_node(cs, index, adapted)?;
        self.session.clean(cs.node);
        self.sync();
        Ok(true)
    }

    /// Try each insertion point under the caret in turn.
    pub fn insert_node_at_current_cursor(&mut self, node: NodeId) -> EditorResult<bool> {
        for cursor in self.current_node_cursors() {
            if self.insert_node_by_child_set(cursor.child_set, cursor.index, node)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Paste at the caret into the first insertion point that can take the whole fragment,
    /// leaving the caret after the pasted nodes.
    pub fn insert_fragment(&mut self, fragment: &Fragment, allow_single: bool) -> EditorResult<bool> {
        if allow_single && fragment.is_single() {
            return self.insert_node_at_current_cursor(fragment.nodes()[0]);
        }
        for cursor in self.current_node_cursors() {
            match self.session.insert_fragment(fragment, cursor.child_set, cursor.index) {
                Ok(nodes) => {
                    self.sync();
                    self.place_cursor(NodeCursor::new(cursor.child_set, cursor.index + nodes.len()));
                    return Ok(true);
                }
                Err(LanguageError::Fragment(FragmentError::CannotPaste { .. })) => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Ok(false)
    }

    /// Paste over whatever is selected.
    pub fn paste_fragment(&mut self, fragment: &Fragment) -> EditorResult<bool> {
        match self.state {
            SelectionState::Empty => Ok(false),
            SelectionState::Cursor | SelectionState::Inserting => self.insert_fragment(fragment, true),
            SelectionState::SingleNode | SelectionState::Editing if fragment.is_single() => {
                self.replace_or_wrap_selected_node(fragment.nodes()[0])
            }
            SelectionState::SingleNode | SelectionState::Editing | SelectionState::MultiNode => {
                self.delete_selected_node()?;
                self.insert_fragment(fragment, true)
            }
        }
    }

    pub fn replace_or_wrap_selected_node(&mut self, node: NodeId) -> EditorResult<bool> {
        let Some(selected) = self.selection_start.filter(|_| self.is_single_node()) else {
            return Ok(false);
        };
        if self.wrap_node_on_paste(selected.child_set, selected.index, node)? {
            return Ok(true);
        }
        self.replace_node(selected.child_set, selected.index, node)
    }

    /// Put the node at `index` inside `node` and `node` in its place. When `node` does not fit
    /// the child set but fits the one above a single-child wrapper, the wrapper is wrapped.
    pub fn wrap_node_on_paste(&mut self, cs: ChildSetRef, index: usize, node: NodeId) -> EditorResult<bool> {
        let doc = self.session.document();
        let Some(mut to_replace) = doc.children(cs).get(index).copied() else {
            return Ok(false);
        };
        let (mut cs, mut index) = (cs, index);
        let kind = doc.kind(node);
        let fits = doc
            .child_set(cs)
            .is_some_and(|set| is_adaptable_to_paste_destination(kind, set.category()));
        if !fits {
            let owner = cs.node;
            let lone_child = doc.child_set_refs(owner).len() == 1 && doc.children(cs).len() == 1;
            let (Some(parent), Some(position)) = (doc.parent(owner), doc.index_in_parent(owner)) else {
                return Ok(false);
            };
            let parent_fits = doc
                .child_set(parent)
                .is_some_and(|set| is_adaptable_to_paste_destination(kind, set.category()));
            if !lone_child || !parent_fits {
                return Ok(false);
            }
            to_replace = owner;
            cs = parent;
            index = position;
        }

        let Some(wrap_cs) = wrap_insert_child_set(doc, node, doc.kind(to_replace)) else {
            return Ok(false);
        };
        let Some(wrap_category) = doc.child_set(wrap_cs).map(|set| set.category()) else {
            return Ok(false);
        };
        let removed = self.session.remove_child(cs, index)?;
        let Some(adapted) = adapt_node_to_paste_destination(self.session.document_mut(), removed, wrap_category) else {
            self.session.insert_node(cs, index, removed)?;
            return Ok(false);
        };
        while !self.session.document().children(wrap_cs).is_empty() {
            self.session.remove_child(wrap_cs, 0)?;
        }
        self.session.insert_node(wrap_cs, 0, adapted)?;
        self.insert_node_by_child_set(cs, index, node)
    }

    pub fn replace_node(&mut self, cs: ChildSetRef, index: usize, node: NodeId) -> EditorResult<bool> {
        let doc = self.session.document();
        let fits = doc
            .child_set(cs)
            .is_some_and(|set| is_adaptable_to_paste_destination(doc.kind(node), set.category()));
        if !fits || index >= doc.children(cs).len() {
            return Ok(false);
        }
        self.session.remove_child(cs, index)?;
        self.insert_node_by_child_set(cs, index, node)
    }

    /// Move the node at `index` into `node`'s `child_set` and put `node` in its place.
    pub fn wrap_node(&mut self, cs: ChildSetRef, index: usize, node: NodeId, child_set: &str) -> EditorResult<bool> {
        let doc = self.session.document();
        let Some(wrap_cs) = doc.child_set_ref(node, child_set) else {
            return Ok(false);
        };
        let Some(wrap_category) = doc.child_set(wrap_cs).map(|set| set.category()) else {
            return Ok(false);
        };
        if index >= doc.children(cs).len() {
            return Ok(false);
        }
        let removed = self.session.remove_child(cs, index)?;
        let Some(adapted) = adapt_node_to_paste_destination(self.session.document_mut(), removed, wrap_category) else {
            self.session.insert_node(cs, index, removed)?;
            return Ok(false);
        };
        let end = self.session.document().children(wrap_cs).len();
        self.session.insert_node(wrap_cs, end, adapted)?;
        if self.insert_node_by_child_set(cs, index, node)? {
            return Ok(true);
        }
        warn!(child_set = %cs, index, "wrapper does not fit, node left unwrapped");
        let restored = self.session.remove_child(wrap_cs, end)?;
        self.session.insert_node(cs, index, restored)?;
        self.sync();
        Ok(false)
    }

    pub fn delete_selected_node(&mut self) -> EditorResult<()> {
        match self.state {
            SelectionState::SingleNode | SelectionState::Editing => {
                let selected = self.selection_start.ok_or(EditorError::NothingSelected)?;
                self.session.delete_node(selected.child_set, selected.index)?;
                self.sync();
                self.ensure_cursor_state();
            }
            SelectionState::MultiNode => {
                let (start, end) = self.ordered_selection().ok_or(EditorError::NothingSelected)?;
                let deleter = MultiselectDeleter::new(self.session.document(), start, end);
                let kept = deleter.perform_delete(&mut self.session)?;
                self.sync();
                if !self.place_cursor(start) {
                    self.ensure_cursor_state();
                }
                for fragment in &kept {
                    if !self.insert_fragment(fragment, false)? {
                        warn!(category = ?fragment.category(), "could not restore unselected remainder");
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Backspace: remove an empty line at the caret, otherwise delete what is to the left.
    pub fn backspace(&mut self) -> EditorResult<()> {
        if self.is_single_node() || self.is_multi_select() {
            return self.delete_selected_node();
        }
        if !self.is_cursor() {
            return Ok(());
        }
        for cursor in self.cursor_map.line_start_node_cursors_for_position(self.cursor) {
            let doc = self.session.document();
            let Some(set) = doc.child_set(cursor.child_set) else {
                continue;
            };
            let children = set.children();
            let current_empty = children.get(cursor.index).is_some_and(|node| is_empty(doc, *node));
            if cursor.index > 0 && current_empty && set.allow_delete() {
                self.session.remove_child(cursor.child_set, cursor.index)?;
                self.sync();
                self.place_cursor(cursor);
                return Ok(());
            }
            let previous_empty = cursor.index > 0 && is_empty(doc, children[cursor.index - 1]);
            if previous_empty && set.allow_delete() {
                self.session.remove_child(cursor.child_set, cursor.index - 1)?;
                self.sync();
                self.place_cursor(NodeCursor::new(cursor.child_set, cursor.index - 1));
                return Ok(());
            }
        }
        let before = self.cursor;
        self.move_cursor_left(false);
        if self.is_single_node() && self.cursor != before {
            self.delete_selected_node()?;
        }
        Ok(())
    }

    /// Move an empty trailing line out one level. Returns whether anything moved.
    pub fn unindent(&mut self) -> EditorResult<bool> {
        if !self.is_cursor() {
            return Ok(false);
        }
        for cursor in self.cursor_map.line_start_node_cursors_for_position(self.cursor) {
            let Some(target) = self
                .layout
                .unindent_target(self.session.document(), cursor.child_set, cursor.index)
            else {
                continue;
            };
            let line = self.session.remove_child(cursor.child_set, cursor.index)?;
            self.session.insert_node(target.child_set, target.index, line)?;
            self.sync();
            return Ok(true);
        }
        Ok(false)
    }

    /// Enter: unindent an empty trailing line, otherwise open a new line after or before the
    /// caret's line.
    pub fn insert_newline_or_unindent(&mut self) -> EditorResult<()> {
        if !self.is_cursor() || self.unindent()? {
            return Ok(());
        }
        let ends = self.cursor_map.line_end_node_cursors_for_position(self.cursor);
        let starts = self.cursor_map.line_start_node_cursors_for_position(self.cursor);
        let at_start = ends.is_empty();
        for cursor in ends.into_iter().chain(starts) {
            if !self.layout.is_insertable_line_child_set(self.session.document(), cursor.child_set) {
                continue;
            }
            let Some(category) = self
                .session
                .document()
                .child_set(cursor.child_set)
                .map(|set| set.category())
            else {
                continue;
            };
            let Some(blank) = blank_fill(self.session.document_mut(), category) else {
                continue;
            };
            self.session.insert_node(cursor.child_set, cursor.index, blank)?;
            self.sync();
            if at_start {
                self.place_cursor(cursor.next());
            }
            return Ok(());
        }
        Ok(())
    }

    // ---- Clipboard ----

    /// A detached copy of the selection.
    pub fn copy_current_selection(&mut self) -> Option<Fragment> {
        match self.state {
            SelectionState::SingleNode | SelectionState::Editing => {
                let selected = self.selection_start?;
                let doc = self.session.document();
                let node = selected.node(doc)?;
                let category = doc.child_set(selected.child_set)?.category();
                let copy = self.session.clone_node(node)?;
                self.session.fragment(vec![copy], category).ok()
            }
            SelectionState::MultiNode => {
                let (start, end) = self.ordered_selection()?;
                MultiselectFragmentCreator::new(self.session.document(), start, end).into_fragment(&mut self.session)
            }
            _ => None,
        }
    }

    pub fn cut_current_selection(&mut self) -> EditorResult<Option<Fragment>> {
        let fragment = self.copy_current_selection();
        if fragment.is_some() {
            self.delete_selected_node()?;
        }
        Ok(fragment)
    }

    pub fn copy_to_clipboard(&mut self, clipboard: &mut dyn Clipboard) -> EditorResult<bool> {
        let Some(fragment) = self.copy_current_selection() else {
            return Ok(false);
        };
        write_fragment(clipboard, &self.session.serialize_fragment(&fragment))?;
        Ok(true)
    }

    pub fn cut_to_clipboard(&mut self, clipboard: &mut dyn Clipboard) -> EditorResult<bool> {
        let Some(fragment) = self.cut_current_selection()? else {
            return Ok(false);
        };
        write_fragment(clipboard, &self.session.serialize_fragment(&fragment))?;
        Ok(true)
    }

    pub fn paste_from_clipboard(&mut self, clipboard: &dyn Clipboard) -> EditorResult<bool> {
        let serialized = read_fragment(clipboard)?;
        let fragment = self.session.deserialize_fragment(&serialized)?;
        self.paste_fragment(&fragment)
    }
}

impl Default for NodeSelection {
    fn default() -> Self {
        Self::new(EditingSession::default(), LayoutMetrics::default())
    }
}
