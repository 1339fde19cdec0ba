//! # Document Tree
//!
//! Arena of typed nodes addressed by [`NodeId`].
//!
//! Every node owns its child sets; every child points back at the slot that owns it through a
//! [`ChildSetRef`]. Ownership is strictly tree-shaped: a node is either attached to exactly one
//! child set or detached (a root, a fragment member, or a freshly built node).
//!
//! The raw structural operations here never fire events. The [`crate::EditingSession`] wraps
//! them with validation, scope bookkeeping and mutation fan-out.

use crate::category::NodeCategory;
use crate::errors::TreeError;
use crate::kind::{ChildSetKind, ChildSetSpec, NodeKind};
use crate::scope::ScopeId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;

/// Arena index of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A child set addressed by its owner and declaration slot.
///
/// This is the parent reference stored on every attached node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChildSetRef {
    pub node: NodeId,
    pub slot: usize,
}

impl ChildSetRef {
    pub fn new(node: NodeId, slot: usize) -> Self {
        Self { node, slot }
    }
}

impl fmt::Display for ChildSetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.slot)
    }
}

#[derive(Debug, Clone)]
pub struct ChildSet {
    pub(crate) spec: &'static ChildSetSpec,
    pub(crate) children: Vec<NodeId>,
}

impl ChildSet {
    pub(crate) fn new(spec: &'static ChildSetSpec) -> Self {
        Self {
            spec,
            children: Vec::new(),
        }
    }

    pub fn spec(&self) -> &'static ChildSetSpec {
        self.spec
    }

    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    pub fn kind(&self) -> ChildSetKind {
        self.spec.kind
    }

    pub fn category(&self) -> NodeCategory {
        self.spec.category
    }

    pub fn min_children(&self) -> usize {
        self.spec.min_children
    }

    pub fn max_children(&self) -> Option<usize> {
        self.spec.max_children()
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn count(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn child(&self, index: usize) -> Option<NodeId> {
        self.children.get(index).copied()
    }

    pub fn index_of(&self, node: NodeId) -> Option<usize> {
        self.children.iter().position(|child| *child == node)
    }

    pub fn leftmost(&self) -> Option<NodeId> {
        self.children.first().copied()
    }

    pub fn rightmost(&self) -> Option<NodeId> {
        self.children.last().copied()
    }

    /// Many: always. Single: only when empty. Immutable: never.
    pub fn allow_insert(&self) -> bool {
        match self.spec.kind {
            ChildSetKind::Many => true,
            ChildSetKind::Single => self.children.is_empty(),
            ChildSetKind::Immutable => false,
        }
    }

    pub fn allow_delete(&self) -> bool {
        self.spec.kind != ChildSetKind::Immutable && self.children.len() > self.spec.min_children
    }
}

/// Advisory validation state, reported through `SET_VALIDITY`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Validity {
    pub valid: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_set: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

impl Validity {
    pub fn valid() -> Self {
        Self {
            valid: true,
            reason: String::new(),
            child_set: None,
            index: None,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: reason.into(),
            child_set: None,
            index: None,
        }
    }

    pub fn in_child_set(mut self, child_set: &str, index: usize) -> Self {
        self.child_set = Some(child_set.to_string());
        self.index = Some(index);
        self
    }
}

impl Default for Validity {
    fn default() -> Self {
        Self::valid()
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<ChildSetRef>,
    pub(crate) properties: BTreeMap<String, Value>,
    pub(crate) child_sets: Vec<ChildSet>,
    pub(crate) scope: Option<ScopeId>,
    pub(crate) mutations_enabled: bool,
    pub(crate) validity: Validity,
    /// Names this node currently declares, with the scope they were declared in.
    pub(crate) declarations: Vec<(ScopeId, String)>,
    /// Name this node watches for renames.
    pub(crate) watching: Option<(ScopeId, String)>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        let spec = kind.spec();
        Self {
            kind,
            parent: None,
            properties: spec
                .properties
                .iter()
                .map(|property| (property.name.to_string(), property.default.to_value()))
                .collect(),
            child_sets: spec.child_sets.iter().map(ChildSet::new).collect(),
            scope: None,
            mutations_enabled: false,
            validity: Validity::valid(),
            declarations: Vec::new(),
            watching: None,
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    pub fn parent(&self) -> Option<ChildSetRef> {
        self.parent
    }

    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// String view of a property; empty when absent or not a string.
    pub fn property_str(&self, name: &str) -> &str {
        self.properties
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn child_sets(&self) -> &[ChildSet] {
        &self.child_sets
    }

    pub fn child_set(&self, slot: usize) -> Option<&ChildSet> {
        self.child_sets.get(slot)
    }

    pub fn child_set_slot(&self, name: &str) -> Option<usize> {
        self.child_sets.iter().position(|cs| cs.name() == name)
    }

    pub fn child_set_by_name(&self, name: &str) -> Option<&ChildSet> {
        self.child_set_slot(name).and_then(|slot| self.child_sets.get(slot))
    }

    pub fn has_child_sets(&self) -> bool {
        !self.child_sets.is_empty()
    }

    pub fn scope(&self) -> Option<ScopeId> {
        self.scope
    }

    pub fn mutations_enabled(&self) -> bool {
        self.mutations_enabled
    }

    pub fn validity(&self) -> &Validity {
        &self.validity
    }

    pub fn is_valid(&self) -> bool {
        self.validity.valid
    }

    pub fn editable_property(&self) -> Option<&'static str> {
        self.kind.spec().editable_property
    }
}

/// Node arena.
///
/// Detached nodes stay allocated; ids are never reused.
#[derive(Debug, Clone, Default)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a detached node with default properties and empty child sets.
    pub fn create(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(kind));
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self[id].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<ChildSetRef> {
        self.get(id).and_then(|node| node.parent)
    }

    pub fn child_set(&self, cs: ChildSetRef) -> Option<&ChildSet> {
        self.get(cs.node).and_then(|node| node.child_sets.get(cs.slot))
    }

    pub fn children(&self, cs: ChildSetRef) -> &[NodeId] {
        self.child_set(cs).map(ChildSet::children).unwrap_or_default()
    }

    pub fn child_set_ref(&self, node: NodeId, name: &str) -> Option<ChildSetRef> {
        self.get(node)
            .and_then(|n| n.child_set_slot(name))
            .map(|slot| ChildSetRef::new(node, slot))
    }

    /// Children of a named slot; empty when the slot does not exist.
    pub fn children_by_name(&self, node: NodeId, name: &str) -> &[NodeId] {
        self.get(node)
            .and_then(|n| n.child_set_by_name(name))
            .map(ChildSet::children)
            .unwrap_or_default()
    }

    /// All child sets of a node in declaration order.
    pub fn child_set_refs(&self, node: NodeId) -> Vec<ChildSetRef> {
        let count = self.get(node).map(|n| n.child_sets.len()).unwrap_or(0);
        (0..count).map(|slot| ChildSetRef::new(node, slot)).collect()
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.child_set(parent)?.index_of(id)
    }

    /// Walk parent references up to the detached root.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: self.parent(id).map(|p| p.node),
        }
    }

    pub fn root_of(&self, id: NodeId) -> NodeId {
        self.ancestors(id).last().unwrap_or(id)
    }

    /// True when `ancestor` is `node` or one of its ancestors.
    pub fn is_self_or_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        ancestor == node || self.ancestors(node).any(|a| a == ancestor)
    }

    /// Whether the child set is reachable from `root` through parent references.
    pub fn is_attached_under(&self, cs: ChildSetRef, root: NodeId) -> bool {
        self.child_set(cs).is_some() && self.is_self_or_ancestor(root, cs.node)
    }

    /// Depth-first pre-order list of a subtree.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(node) = self.get(next) {
                for cs in node.child_sets.iter().rev() {
                    stack.extend(cs.children.iter().rev().copied());
                }
            }
        }
        out
    }

    pub(crate) fn set_property_raw(&mut self, id: NodeId, name: &str, value: Value) {
        if let Some(node) = self.node_mut(id) {
            node.properties.insert(name.to_string(), value);
        }
    }

    /// Splice a detached node into a child set. Fires nothing.
    pub(crate) fn attach(&mut self, cs: ChildSetRef, index: usize, child: NodeId) -> Result<(), TreeError> {
        let existing = self.get(child).ok_or(TreeError::NodeNotFound(child))?;
        if existing.parent.is_some() {
            return Err(TreeError::AlreadyAttached { node: child });
        }
        let set = self
            .node_mut(cs.node)
            .ok_or(TreeError::NodeNotFound(cs.node))?
            .child_sets
            .get_mut(cs.slot)
            .ok_or(TreeError::ChildSetNotFound { node: cs.node, slot: cs.slot })?;
        if index > set.children.len() {
            return Err(TreeError::IndexOutOfRange {
                index,
                len: set.children.len(),
            });
        }
        set.children.insert(index, child);
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(cs);
        }
        Ok(())
    }

    /// Splice a child out of its child set, leaving it detached. Fires nothing.
    pub(crate) fn detach(&mut self, cs: ChildSetRef, index: usize) -> Result<NodeId, TreeError> {
        let set = self
            .node_mut(cs.node)
            .ok_or(TreeError::NodeNotFound(cs.node))?
            .child_sets
            .get_mut(cs.slot)
            .ok_or(TreeError::ChildSetNotFound { node: cs.node, slot: cs.slot })?;
        if index >= set.children.len() {
            return Err(TreeError::IndexOutOfRange {
                index,
                len: set.children.len(),
            });
        }
        let child = set.children.remove(index);
        if let Some(node) = self.node_mut(child) {
            node.parent = None;
        }
        Ok(child)
    }

    /// Detach every child of a slot, in order.
    pub(crate) fn take_children(&mut self, cs: ChildSetRef) -> Vec<NodeId> {
        let children = self.children(cs).to_vec();
        for child in &children {
            if let Some(node) = self.node_mut(*child) {
                node.parent = None;
            }
        }
        if let Some(set) = self.node_mut(cs.node).and_then(|n| n.child_sets.get_mut(cs.slot)) {
            set.children.clear();
        }
        children
    }

    /// Append to a slot by name while building detached trees.
    pub(crate) fn push_child(&mut self, parent: NodeId, name: &str, child: NodeId) {
        let Some(cs) = self.child_set_ref(parent, name) else {
            tracing::warn!(node = %parent, child_set = name, "no such child set");
            return;
        };
        let len = self.children(cs).len();
        if let Err(err) = self.attach(cs, len, child) {
            tracing::warn!(node = %parent, child_set = name, error = %err, "failed to append child");
        }
    }
}

impl Index<NodeId> for Document {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }
}

pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.doc.parent(current).map(|p| p.node);
        Some(current)
    }
}
