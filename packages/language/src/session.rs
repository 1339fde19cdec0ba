//! # Editing Session
//!
//! Owns one loaded document together with its scope tree, mutation dispatcher and adapter
//! registry. Every observable edit goes through here.
//!
//! ```text
//!   insert_node ──► attach ──► build scope ──► validate parent ──► enable mutations ──► INSERT
//!   remove_child ─► clear scope ──► detach ──► clear validity ──► disable mutations ──► DELETE
//! ```
//!
//! Events only fire for nodes that have mutations enabled, which is every node reachable from
//! the loaded root. Detached subtrees (freshly built nodes, fragments, removed nodes) can be
//! edited freely without anyone hearing about it.

use crate::adapters::{adapt_node_to_paste_destination, is_adaptable_to_paste_destination, FragmentAdapterRegistry};
use crate::category::NodeCategory;
use crate::dispatcher::{MutationDispatcher, Subscription};
use crate::errors::{FragmentError, LanguageResult, SaveError, SessionError, TreeError};
use crate::fragment::{self, Fragment, SerializedFragment};
use crate::kind::NodeKind;
use crate::mutations::{
    ChildSetMutation, ChildSetMutationKind, InsertedNode, NodeMutation, NodeMutationKind, ScopeMutation,
};
use crate::options::SessionOptions;
use crate::python::behaviour::{self, CleanAction, ScopeLookup};
use crate::python::codegen::generate_python;
use crate::scope::{ScopeId, ScopeTree, VariableEntry, VariableKind, VariableMetadata};
use crate::serialize::SerializedNode;
use crate::tree::{ChildSetRef, Document, NodeId, Validity};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

#[derive(Debug)]
pub struct EditingSession {
    options: SessionOptions,
    doc: Document,
    scopes: ScopeTree,
    dispatcher: MutationDispatcher,
    adapters: FragmentAdapterRegistry,
    root: Option<NodeId>,
    path: Option<PathBuf>,
    /// Bumped by every structural or property edit on the live tree
    version: u64,
}

impl Default for EditingSession {
    fn default() -> Self {
        Self::new(SessionOptions::default())
    }
}

impl EditingSession {
    pub fn new(options: SessionOptions) -> Self {
        let mut session = Self {
            options,
            doc: Document::new(),
            scopes: ScopeTree::new(),
            dispatcher: MutationDispatcher::new(),
            adapters: FragmentAdapterRegistry::python(),
            root: None,
            path: None,
            version: 0,
        };
        session.install_builtins();
        session
    }

    fn install_builtins(&mut self) {
        let global = self.scopes.global();
        let metadata = VariableMetadata::new(VariableKind::Builtin, "Built-in function");
        for name in self.options.all_builtins() {
            self.scopes.add_builtin(global, name, metadata.clone());
        }
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Raw access for building detached subtrees. Edits made here fire nothing.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn scopes(&self) -> &ScopeTree {
        &self.scopes
    }

    pub fn dispatcher(&self) -> &MutationDispatcher {
        &self.dispatcher
    }

    pub fn adapters(&self) -> &FragmentAdapterRegistry {
        &self.adapters
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    fn loaded_root(&self) -> Result<NodeId, SessionError> {
        self.root.ok_or(SessionError::NotLoaded)
    }

    // ---- Loading and persistence ----

    /// Replace the document. Drops every subscription and rebuilds the global scope first.
    #[instrument(skip(self, serialized), fields(node_type = %serialized.node_type))]
    pub fn load(&mut self, serialized: &SerializedNode) -> LanguageResult<NodeId> {
        self.dispatcher.clear();
        self.scopes = ScopeTree::new();
        self.install_builtins();
        self.doc = Document::new();
        self.root = None;
        self.path = None;
        self.version = 0;

        let root = self
            .doc
            .deserialize(serialized)
            .ok_or_else(|| SessionError::UnknownNodeType(serialized.node_type.clone()))?;
        self.root = Some(root);
        self.build_scope(root);
        self.validate_recursive(root);
        self.recursively_set_mutations(root, true);
        info!(nodes = self.doc.len(), "document loaded");
        Ok(root)
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> LanguageResult<NodeId> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let serialized: SerializedNode = serde_json::from_str(&content)?;
        let root = self.load(&serialized)?;
        self.path = Some(path.to_path_buf());
        Ok(root)
    }

    pub fn serialize_root(&self) -> LanguageResult<SerializedNode> {
        let root = self.loaded_root()?;
        Ok(self.doc.serialize(root))
    }

    pub fn export_python(&self) -> LanguageResult<String> {
        let root = self.loaded_root()?;
        Ok(generate_python(&self.doc, root, &self.options.indent))
    }

    /// Serialize the document, writing it back when it came from a file.
    ///
    /// The caller passes the version it last saw; any edit since then is a conflict.
    pub fn save(&mut self, expected_version: u64) -> LanguageResult<String> {
        if expected_version != self.version {
            return Err(SaveError::VersionMismatch {
                expected: expected_version,
                actual: self.version,
            }
            .into());
        }
        let json = serde_json::to_string_pretty(&self.serialize_root()?)?;
        if let Some(path) = &self.path {
            std::fs::write(path, &json).map_err(|err| SaveError::Write(err.to_string()))?;
            info!(path = %path.display(), version = self.version, "document saved");
        }
        Ok(json)
    }

    // ---- Subscriptions ----

    pub fn subscribe_nodes(&self, handler: impl FnMut(&NodeMutation) + 'static) -> Subscription {
        self.dispatcher.nodes.subscribe(handler)
    }

    pub fn subscribe_node(&self, node: NodeId, handler: impl FnMut(&NodeMutation) + 'static) -> Subscription {
        self.dispatcher.nodes.subscribe_to(node, handler)
    }

    pub fn subscribe_child_sets(&self, handler: impl FnMut(&ChildSetMutation) + 'static) -> Subscription {
        self.dispatcher.child_sets.subscribe(handler)
    }

    pub fn subscribe_child_set(
        &self,
        child_set: ChildSetRef,
        handler: impl FnMut(&ChildSetMutation) + 'static,
    ) -> Subscription {
        self.dispatcher.child_sets.subscribe_to(child_set, handler)
    }

    pub fn subscribe_scopes(&self, handler: impl FnMut(&ScopeMutation) + 'static) -> Subscription {
        self.dispatcher.scopes.subscribe(handler)
    }

    pub fn subscribe_scope(&self, scope: ScopeId, handler: impl FnMut(&ScopeMutation) + 'static) -> Subscription {
        self.dispatcher.scopes.subscribe_to(scope, handler)
    }

    // ---- Properties and validity ----

    pub fn set_property(&mut self, node: NodeId, property: &str, value: Value) {
        let Some(enabled) = self.doc.get(node).map(|n| n.mutations_enabled) else {
            warn!(node = %node, property, "set_property on missing node");
            return;
        };
        self.doc.set_property_raw(node, property, value.clone());
        if enabled {
            self.version += 1;
            self.dispatcher.nodes.fire(&NodeMutation {
                node,
                kind: NodeMutationKind::SetProperty {
                    property: property.to_string(),
                    value,
                },
            });
        }
    }

    /// Record a node's validity. Fires only when it actually changes.
    pub fn set_validity(&mut self, node: NodeId, validity: Validity) {
        let Some(n) = self.doc.node_mut(node) else {
            return;
        };
        if n.validity == validity {
            return;
        }
        n.validity = validity.clone();
        if n.mutations_enabled {
            self.dispatcher.nodes.fire(&NodeMutation {
                node,
                kind: NodeMutationKind::SetValidity { validity },
            });
        }
    }

    /// Runtime annotations are not stored; they only reach the node's own observers.
    pub fn set_runtime_annotations(&self, node: NodeId, annotations: Vec<Value>) {
        self.dispatcher.nodes.fire(&NodeMutation {
            node,
            kind: NodeMutationKind::SetRuntimeAnnotations { annotations },
        });
    }

    /// Write the node's editable property from user input, returning the value actually stored.
    ///
    /// Names are sanitized into legal Python identifiers.
    pub fn set_editable_property_value(&mut self, node: NodeId, input: &str) -> LanguageResult<String> {
        let n = self.doc.get(node).ok_or(TreeError::NodeNotFound(node))?;
        let property = n.editable_property().ok_or(SessionError::NotEditable { node })?;
        let value = match n.kind() {
            NodeKind::Identifier | NodeKind::CallVariable => behaviour::python_name(input),
            _ => input.to_string(),
        };

        self.set_property(node, property, Value::from(value.clone()));
        if self.doc[node].mutations_enabled {
            self.refresh_watch(node);
            if let Some(parent) = self.doc.parent(node) {
                self.refresh_declarations(parent.node);
            }
        }
        self.validate(node);
        Ok(value)
    }

    pub fn validate(&mut self, node: NodeId) {
        for (target, validity) in behaviour::validate_self(&self.doc, node) {
            self.set_validity(target, validity);
        }
    }

    pub fn validate_recursive(&mut self, node: NodeId) {
        for id in self.doc.descendants(node) {
            self.validate(id);
        }
    }

    fn clear_validation_recursive(&mut self, node: NodeId) {
        for id in self.doc.descendants(node) {
            self.set_validity(id, Validity::valid());
        }
    }

    pub fn recursively_set_mutations(&mut self, node: NodeId, enabled: bool) {
        for id in self.doc.descendants(node) {
            if let Some(n) = self.doc.node_mut(id) {
                n.mutations_enabled = enabled;
            }
        }
    }

    // ---- Structure ----

    /// Splice a detached node into a child set.
    ///
    /// When the owner is live, the node's scopes are built, the owner is revalidated, and an
    /// `INSERT` carrying a snapshot of the subtree is fired.
    pub fn insert_node(&mut self, child_set: ChildSetRef, index: usize, node: NodeId) -> LanguageResult<()> {
        let set = self.doc.child_set(child_set).ok_or(TreeError::ChildSetNotFound {
            node: child_set.node,
            slot: child_set.slot,
        })?;
        let kind = self.doc.get(node).ok_or(TreeError::NodeNotFound(node))?.kind();
        if !kind.is_in_category(set.category()) {
            return Err(TreeError::CategoryMismatch {
                kind: kind.type_name(),
                category: set.category(),
            }
            .into());
        }
        if set.max_children().is_some_and(|max| set.count() >= max) {
            return Err(TreeError::ChildSetFull(child_set).into());
        }
        self.doc.attach(child_set, index, node)?;
        if !self.doc[child_set.node].mutations_enabled {
            return Ok(());
        }

        self.build_scope(node);
        self.refresh_declarations(child_set.node);
        self.validate_recursive(child_set.node);
        self.recursively_set_mutations(node, true);
        self.version += 1;
        debug!(child_set = %child_set, index, node = %node, "insert");
        let inserted = InsertedNode {
            id: node,
            node: self.doc.serialize(node),
        };
        self.dispatcher.child_sets.fire(&ChildSetMutation {
            child_set,
            index,
            kind: ChildSetMutationKind::Insert { nodes: vec![inserted] },
        });
        Ok(())
    }

    pub fn add_child(&mut self, parent: NodeId, name: &str, node: NodeId) -> LanguageResult<()> {
        let child_set = self.doc.child_set_ref(parent, name).ok_or_else(|| TreeError::UnknownChildSet {
            node: parent,
            name: name.to_string(),
        })?;
        let index = self.doc.children(child_set).len();
        self.insert_node(child_set, index, node)
    }

    /// Splice a child out, leaving it detached with its scopes cleared.
    pub fn remove_child(&mut self, child_set: ChildSetRef, index: usize) -> LanguageResult<NodeId> {
        let set = self.doc.child_set(child_set).ok_or(TreeError::ChildSetNotFound {
            node: child_set.node,
            slot: child_set.slot,
        })?;
        let child = set.child(index).ok_or(TreeError::IndexOutOfRange {
            index,
            len: set.count(),
        })?;

        self.clear_scope(child);
        self.doc.detach(child_set, index)?;
        self.refresh_declarations(child_set.node);
        self.clear_validation_recursive(child);
        if !self.doc[child_set.node].mutations_enabled {
            return Ok(child);
        }

        self.recursively_set_mutations(child, false);
        self.validate(child_set.node);
        self.version += 1;
        debug!(child_set = %child_set, index, node = %child, "delete");
        self.dispatcher.child_sets.fire(&ChildSetMutation {
            child_set,
            index,
            kind: ChildSetMutationKind::Delete,
        });
        Ok(child)
    }

    /// Tidy up after a removal somewhere below `node`, walking upward as needed.
    pub fn clean(&mut self, node: NodeId) {
        let mut next = Some(node);
        while let Some(current) = next.take() {
            match behaviour::clean_action(&self.doc, current) {
                CleanAction::Nothing => {}
                CleanAction::RemoveChild(child_set, index) => {
                    if let Err(err) = self.remove_child(child_set, index) {
                        warn!(child_set = %child_set, index, error = %err, "clean failed");
                    }
                }
                CleanAction::CleanParent(parent) => next = Some(parent),
            }
        }
    }

    /// Remove one node, splicing back the children its kind keeps on delete.
    ///
    /// Kept children go where the node was when they fit there, otherwise after the nearest
    /// invisible wrapper that can take them. Returns the kept nodes that found a home.
    pub fn delete_node(&mut self, child_set: ChildSetRef, index: usize) -> LanguageResult<Vec<NodeId>> {
        let removed = self.remove_child(child_set, index)?;
        let keep = behaviour::children_to_keep_on_delete(&self.doc, removed);
        let mut placed = Vec::new();
        let mut target = (child_set, index);
        for node in keep {
            if let Some(parent) = self.doc.parent(node) {
                if let Some(position) = self.doc.index_in_parent(node) {
                    self.doc.detach(parent, position)?;
                }
            }
            match self.place_kept_node(node, target) {
                Some(next) => {
                    placed.push(node);
                    target = next;
                }
                None => warn!(node = %node, "dropping kept child with nowhere to go"),
            }
        }
        self.clean(child_set.node);
        Ok(placed)
    }

    fn place_kept_node(&mut self, node: NodeId, target: (ChildSetRef, usize)) -> Option<(ChildSetRef, usize)> {
        let mut candidates = vec![target];
        let mut owner = target.0.node;
        while self.doc.kind(owner).is_invisible() {
            let Some(parent) = self.doc.parent(owner) else {
                break;
            };
            let position = self.doc.index_in_parent(owner)?;
            candidates.push((parent, position + 1));
            owner = parent.node;
        }

        let kind = self.doc.kind(node);
        let direct = candidates.iter().copied().find(|(child_set, _)| {
            self.doc
                .child_set(*child_set)
                .is_some_and(|set| set.allow_insert() && kind.is_in_category(set.category()))
        });
        let chosen = direct.or_else(|| {
            candidates.iter().copied().find(|(child_set, _)| {
                self.doc
                    .child_set(*child_set)
                    .is_some_and(|set| set.allow_insert() && is_adaptable_to_paste_destination(kind, set.category()))
            })
        })?;

        let category = self.doc.child_set(chosen.0)?.category();
        let adapted = adapt_node_to_paste_destination(&mut self.doc, node, category)?;
        match self.insert_node(chosen.0, chosen.1, adapted) {
            Ok(()) => Some((chosen.0, chosen.1 + 1)),
            Err(err) => {
                warn!(node = %node, error = %err, "failed to re-insert kept child");
                None
            }
        }
    }

    /// Deep copy of a subtree, detached.
    pub fn clone_node(&mut self, node: NodeId) -> Option<NodeId> {
        self.doc.clone_subtree(node)
    }

    pub fn deserialize_node(&mut self, serialized: &SerializedNode) -> Option<NodeId> {
        self.doc.deserialize(serialized)
    }

    // ---- Scopes ----

    /// The scope a node resolves names in.
    pub fn scope_for(&self, node: NodeId, lookup: ScopeLookup) -> Option<ScopeId> {
        let mut current = node;
        let mut lookup = lookup;
        loop {
            let n = self.doc.get(current)?;
            if lookup == ScopeLookup::Nearest && n.kind().spec().scoped {
                return n.scope;
            }
            current = n.parent?.node;
            lookup = ScopeLookup::Nearest;
        }
    }

    pub fn all_in_scope_variables(&self, node: NodeId) -> BTreeMap<String, VariableEntry> {
        self.scope_for(node, ScopeLookup::Nearest)
            .map(|scope| self.scopes.all_in_scope_variables(scope))
            .unwrap_or_default()
    }

    pub fn variable_entry_by_name(&self, node: NodeId, name: &str) -> Option<&VariableEntry> {
        let scope = self.scope_for(node, ScopeLookup::Nearest)?;
        self.scopes.variable_entry_by_name(scope, name)
    }

    /// Create scopes for scoped nodes, then register every declaration and watcher below `node`.
    pub fn build_scope(&mut self, node: NodeId) {
        let ids = self.doc.descendants(node);
        for id in &ids {
            self.build_own_scope(*id);
        }
        for id in &ids {
            self.refresh_declarations(*id);
            self.refresh_watch(*id);
        }
    }

    fn build_own_scope(&mut self, node: NodeId) {
        let kind = self.doc.kind(node);
        if !kind.spec().scoped || self.doc[node].scope.is_some() {
            return;
        }
        let parent = self
            .scope_for(node, ScopeLookup::Enclosing)
            .unwrap_or_else(|| self.scopes.global());
        let scope = self.scopes.add_child_scope(parent, kind, &self.dispatcher);
        if let Some(n) = self.doc.node_mut(node) {
            n.scope = Some(scope);
        }
    }

    /// Undo [`Self::build_scope`], innermost nodes first.
    pub fn clear_scope(&mut self, node: NodeId) {
        for id in self.doc.descendants(node).into_iter().rev() {
            self.clear_declarations(id);
            self.unwatch(id);
            let scope = self.doc.node_mut(id).and_then(|n| n.scope.take());
            if let Some(scope) = scope {
                if let Some(parent) = self.scopes.get(scope).and_then(|s| s.parent()) {
                    self.scopes.remove_child_scope(parent, scope, &self.dispatcher);
                }
            }
        }
    }

    /// Bring a node's scope entries in line with what it currently declares.
    fn refresh_declarations(&mut self, node: NodeId) {
        let desired: Vec<(ScopeId, String, VariableMetadata)> = behaviour::declarations(&self.doc, node)
            .into_iter()
            .filter_map(|d| self.scope_for(node, d.lookup).map(|scope| (scope, d.name, d.metadata)))
            .collect();
        let current = self
            .doc
            .node_mut(node)
            .map(|n| std::mem::take(&mut n.declarations))
            .unwrap_or_default();
        if desired.is_empty() && current.is_empty() {
            return;
        }

        for (scope, name) in &current {
            if !desired.iter().any(|(s, n, _)| s == scope && n == name) {
                self.scopes.remove_variable(*scope, name, node, &self.dispatcher);
            }
        }
        let mut watchers = Vec::new();
        for (scope, name, metadata) in &desired {
            if !current.iter().any(|(s, n)| s == scope && n == name) {
                watchers.extend(
                    self.scopes
                        .add_variable(*scope, name, metadata.clone(), Some(node), &self.dispatcher),
                );
            }
        }
        if let Some(n) = self.doc.node_mut(node) {
            n.declarations = desired.into_iter().map(|(scope, name, _)| (scope, name)).collect();
        }
        for watcher in watchers {
            self.validate(watcher);
        }
    }

    fn clear_declarations(&mut self, node: NodeId) {
        let current = self
            .doc
            .node_mut(node)
            .map(|n| std::mem::take(&mut n.declarations))
            .unwrap_or_default();
        for (scope, name) in current {
            self.scopes.remove_variable(scope, &name, node, &self.dispatcher);
        }
    }

    /// Scope a watched name resolves in. `Enclosing` here skips the scope of the slot's owner.
    fn watch_scope(&self, node: NodeId, lookup: ScopeLookup) -> Option<ScopeId> {
        match lookup {
            ScopeLookup::Nearest => self.scope_for(node, ScopeLookup::Nearest),
            ScopeLookup::Enclosing => self.scope_for(self.doc.parent(node)?.node, ScopeLookup::Enclosing),
        }
    }

    fn refresh_watch(&mut self, node: NodeId) {
        let desired = behaviour::watched_name(&self.doc, node)
            .and_then(|(lookup, name)| self.watch_scope(node, lookup).map(|scope| (scope, name)));
        let current = self.doc.get(node).and_then(|n| n.watching.clone());
        if current == desired {
            return;
        }
        if let Some((scope, name)) = &current {
            self.scopes.remove_watcher(*scope, name, node);
        }
        if let Some((scope, name)) = &desired {
            self.scopes.add_watcher(*scope, name, node);
        }
        if let Some(n) = self.doc.node_mut(node) {
            n.watching = desired;
        }
    }

    fn unwatch(&mut self, node: NodeId) {
        if let Some((scope, name)) = self.doc.node_mut(node).and_then(|n| n.watching.take()) {
            self.scopes.remove_watcher(scope, &name, node);
        }
    }

    /// Rename the name `node` refers to everywhere it is visible.
    ///
    /// Returns the nodes whose name was rewritten. Builtins are refused with a warning.
    pub fn rename_identifier(&mut self, node: NodeId, new_name: &str) -> LanguageResult<Vec<NodeId>> {
        let (lookup, old) = behaviour::watched_name(&self.doc, node).ok_or(SessionError::NotRenamable { node })?;
        let scope = self
            .watch_scope(node, lookup)
            .ok_or(SessionError::NotRenamable { node })?;
        if behaviour::sanitize_identifier(new_name).is_empty() {
            return Ok(Vec::new());
        }
        let new_name = behaviour::python_name(new_name);

        let renamed = self.scopes.rename_identifier(scope, &old, &new_name, &self.dispatcher);
        for watcher in &renamed {
            self.apply_rename(*watcher, &old, &new_name);
        }
        Ok(renamed)
    }

    fn apply_rename(&mut self, node: NodeId, old: &str, new: &str) {
        let Some(property) = behaviour::rename_property(self.doc.kind(node)) else {
            return;
        };
        let current = self.doc[node].property_str(property);
        if current != old {
            warn!(node = %node, previous = old, current, "rename received for a different name");
        }
        self.set_property(node, property, Value::from(new));
        if let Some((_, name)) = self.doc.node_mut(node).and_then(|n| n.watching.as_mut()) {
            *name = new.to_string();
        }
        if let Some(parent) = self.doc.parent(node) {
            self.refresh_declarations(parent.node);
        }
    }

    // ---- Fragments ----

    pub fn fragment(&mut self, nodes: Vec<NodeId>, category: NodeCategory) -> LanguageResult<Fragment> {
        Ok(Fragment::new(&mut self.doc, nodes, category)?)
    }

    pub fn serialize_fragment(&self, fragment: &Fragment) -> SerializedFragment {
        fragment.serialize(&self.doc)
    }

    pub fn deserialize_fragment(&mut self, serialized: &SerializedFragment) -> LanguageResult<Fragment> {
        Ok(fragment::deserialize_fragment(&mut self.doc, serialized)?)
    }

    pub fn combine_fragments(&mut self, a: Fragment, b: Fragment) -> Option<Fragment> {
        fragment::combine_fragments(&mut self.doc, &self.adapters, a, b)
    }

    /// The nodes to insert for pasting `fragment` into `child_set`, or `None` when it cannot
    /// be pasted there. The fragment's nodes are only transformed when a result is returned.
    pub fn adapt_fragment_to_paste_destination_if_possible(
        &mut self,
        fragment: &Fragment,
        child_set: ChildSetRef,
    ) -> Option<Vec<NodeId>> {
        let set = self.doc.child_set(child_set)?;
        if !set.allow_insert() {
            return None;
        }
        let category = set.category();
        let fits = set
            .max_children()
            .map_or(true, |max| set.count() + fragment.len() <= max);
        let nodes = fragment.nodes();

        if fits && nodes.iter().all(|node| self.doc.kind(*node).is_in_category(category)) {
            return Some(nodes.to_vec());
        }
        if let Some(adapter) = self.adapters.get(fragment.category(), category) {
            return Some(vec![adapter.apply(&mut self.doc, nodes)]);
        }
        let adaptable = nodes
            .iter()
            .all(|node| is_adaptable_to_paste_destination(self.doc.kind(*node), category));
        if !fits || !adaptable {
            return None;
        }
        let mut adapted = Vec::with_capacity(nodes.len());
        for node in nodes {
            if let Some(result) = adapt_node_to_paste_destination(&mut self.doc, *node, category) {
                self.clean(result);
                adapted.push(result);
            }
        }
        Some(adapted)
    }

    /// Paste a fragment at `index`, returning the inserted nodes in order.
    #[instrument(skip(self, fragment), fields(category = ?fragment.category(), nodes = fragment.len()))]
    pub fn insert_fragment(
        &mut self,
        fragment: &Fragment,
        child_set: ChildSetRef,
        index: usize,
    ) -> LanguageResult<Vec<NodeId>> {
        let nodes = self
            .adapt_fragment_to_paste_destination_if_possible(fragment, child_set)
            .ok_or(FragmentError::CannotPaste {
                category: fragment.category(),
                child_set,
            })?;
        for (offset, node) in nodes.iter().enumerate() {
            self.insert_node(child_set, index + offset, *node)?;
        }
        Ok(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutations::ScopeMutationKind;
    use crate::python::builders::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn hello_world(session: &mut EditingSession) -> NodeId {
        let doc = session.document_mut();
        let literal = string_literal(doc, "Hello, World!");
        let arg = argument(doc, &[literal]);
        let call = call_variable(doc, "print", &[arg]);
        let statement = expression_statement(doc, &[call]);
        let root = file(doc, &[statement]);
        let serialized = session.document().serialize(root);
        session.load(&serialized).unwrap()
    }

    #[test]
    fn test_load_installs_builtins_and_file_scope() {
        let mut session = EditingSession::default();
        let root = hello_world(&mut session);

        let file_scope = session.document()[root].scope().unwrap();
        assert_eq!(session.scopes().get(file_scope).unwrap().parent(), Some(session.scopes().global()));
        assert!(session.all_in_scope_variables(root).contains_key("print"));
        assert!(session.document()[root].mutations_enabled());
    }

    #[test]
    fn test_insert_and_remove_fire_events() {
        let mut session = EditingSession::default();
        let root = hello_world(&mut session);
        let body = session.document().child_set_ref(root, "body").unwrap();
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        let _sub = session.subscribe_child_sets(move |m| sink.borrow_mut().push(m.clone()));

        let blank = statement(session.document_mut(), None);
        session.insert_node(body, 1, blank).unwrap();
        session.remove_child(body, 1).unwrap();

        let events = events.borrow();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].inserted_ids(), vec![blank]);
        assert_eq!(events[1].kind, ChildSetMutationKind::Delete);
        assert!(!session.document()[blank].mutations_enabled());
        assert_eq!(session.version(), 2);
    }

    #[test]
    fn test_insert_rejects_wrong_category() {
        let mut session = EditingSession::default();
        let root = hello_world(&mut session);
        let body = session.document().child_set_ref(root, "body").unwrap();
        let literal = string_literal(session.document_mut(), "x");
        let err = session.insert_node(body, 0, literal).unwrap_err();
        assert!(matches!(
            err,
            crate::errors::LanguageError::Tree(TreeError::CategoryMismatch { .. })
        ));
    }

    #[test]
    fn test_assignment_declares_and_removal_forgets() {
        let mut session = EditingSession::default();
        let root = hello_world(&mut session);
        let body = session.document().child_set_ref(root, "body").unwrap();

        let doc = session.document_mut();
        let target = identifier(doc, "total");
        let zero = numeric_literal(doc, "0");
        let value = expression(doc, &[zero]);
        let assign = assignment(doc, &[target], value);
        let line = statement(doc, Some(assign));
        session.insert_node(body, 0, line).unwrap();

        let entry = session.variable_entry_by_name(root, "total").unwrap();
        assert!(entry.declarers.contains_key(&assign));

        session.remove_child(body, 0).unwrap();
        assert!(session.variable_entry_by_name(root, "total").is_none());
    }

    #[test]
    fn test_set_property_fires_globally() {
        let mut session = EditingSession::default();
        let root = hello_world(&mut session);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let _sub = session.subscribe_nodes(move |m| sink.borrow_mut().push(m.clone()));

        let literal = session.document().descendants(root)[6];
        assert_eq!(session.document().kind(literal), NodeKind::StringLiteral);
        let stored = session.set_editable_property_value(literal, "Bye").unwrap();

        assert_eq!(stored, "Bye");
        assert!(seen.borrow().iter().any(|m| matches!(
            &m.kind,
            NodeMutationKind::SetProperty { property, .. } if property == "value"
        )));
    }

    fn find_kind(session: &EditingSession, root: NodeId, kind: NodeKind) -> NodeId {
        session
            .document()
            .descendants(root)
            .into_iter()
            .find(|id| session.document().kind(*id) == kind)
            .unwrap()
    }

    #[test]
    fn test_call_name_gets_legal_python_name() {
        let mut session = EditingSession::default();
        let root = hello_world(&mut session);
        let call = find_kind(&session, root, NodeKind::CallVariable);

        assert_eq!(session.set_editable_property_value(call, "1x").unwrap(), "_1x");
        assert_eq!(session.export_python().unwrap(), "_1x(\"Hello, World!\")\n");

        assert_eq!(session.set_editable_property_value(call, "").unwrap(), "_");
        assert_eq!(session.document()[call].property_str("identifier"), "_");
    }

    #[test]
    fn test_mutating_clone_fires_nothing() {
        let mut session = EditingSession::default();
        let root = hello_world(&mut session);
        let call = find_kind(&session, root, NodeKind::CallVariable);
        let literal = find_kind(&session, root, NodeKind::StringLiteral);

        let log = Rc::new(RefCell::new(Vec::new()));
        let node_sink = log.clone();
        let _nodes = session.subscribe_nodes(move |m| node_sink.borrow_mut().push(format!("{:?}", m.kind)));
        let node_sink = log.clone();
        let _literal = session.subscribe_node(literal, move |m| node_sink.borrow_mut().push(format!("{:?}", m.kind)));
        let set_sink = log.clone();
        let _sets = session.subscribe_child_sets(move |m| set_sink.borrow_mut().push(format!("{:?}", m.kind)));

        let copy = session.clone_node(call).unwrap();
        let copied_literal = find_kind(&session, copy, NodeKind::StringLiteral);
        session.set_property(copied_literal, "value", Value::from("changed"));
        let args = session.document().child_set_ref(copy, "arguments").unwrap();
        let extra = string_literal(session.document_mut(), "more");
        let extra_arg = argument(session.document_mut(), &[extra]);
        session.insert_node(args, 1, extra_arg).unwrap();

        assert!(log.borrow().is_empty());
        assert_eq!(session.document()[literal].property_str("value"), "Hello, World!");
        assert_eq!(session.export_python().unwrap(), "print(\"Hello, World!\")\n");
    }

    #[test]
    fn test_rename_reaches_call_sites() {
        let mut session = EditingSession::default();
        let root = hello_world(&mut session);
        let body = session.document().child_set_ref(root, "body").unwrap();

        let doc = session.document_mut();
        let func = function_declaration(doc, "greet", &[], &[]);
        let def_line = statement(doc, Some(func));
        let call = call_variable(doc, "greet", &[]);
        let call_line = expression_statement(doc, &[call]);
        session.insert_node(body, 0, def_line).unwrap();
        session.insert_node(body, 1, call_line).unwrap();

        let renames = Rc::new(RefCell::new(Vec::new()));
        let sink = renames.clone();
        let _sub = session.subscribe_scopes(move |m| {
            if let ScopeMutationKind::RenameEntry { new_name, .. } = &m.kind {
                sink.borrow_mut().push(new_name.clone());
            }
        });

        let name = session.document().children_by_name(func, "identifier")[0];
        let renamed = session.rename_identifier(name, "welcome").unwrap();

        assert!(renamed.contains(&call));
        assert_eq!(session.document()[call].property_str("identifier"), "welcome");
        assert_eq!(session.document()[name].property_str("identifier"), "welcome");
        assert!(session.variable_entry_by_name(root, "welcome").is_some());
        assert!(session.variable_entry_by_name(root, "greet").is_none());
        assert_eq!(*renames.borrow(), vec!["welcome".to_string()]);
    }

    #[test]
    fn test_builtin_rename_is_refused() {
        let mut session = EditingSession::default();
        let root = hello_world(&mut session);
        let call = session.document().descendants(root)[3];
        assert_eq!(session.document().kind(call), NodeKind::CallVariable);

        let renamed = session.rename_identifier(call, "echo").unwrap();
        assert!(renamed.is_empty());
        assert_eq!(session.document()[call].property_str("identifier"), "print");
    }

    #[test]
    fn test_paste_token_into_statement_slot() {
        let mut session = EditingSession::default();
        let root = hello_world(&mut session);
        let body = session.document().child_set_ref(root, "body").unwrap();

        let literal = string_literal(session.document_mut(), "pasted");
        let fragment = session
            .fragment(vec![literal], NodeCategory::PythonExpressionToken)
            .unwrap();
        let inserted = session.insert_fragment(&fragment, body, 1).unwrap();

        assert_eq!(inserted.len(), 1);
        assert_eq!(session.document().kind(inserted[0]), NodeKind::Statement);
        assert_eq!(
            session.export_python().unwrap(),
            "print(\"Hello, World!\")\n\"pasted\"\n"
        );
    }

    #[test]
    fn test_paste_into_full_single_slot_is_refused() {
        let mut session = EditingSession::default();
        let root = hello_world(&mut session);
        let statement = session.document().descendants(root)[1];
        let slot = ChildSetRef::new(statement, 0);

        let literal = string_literal(session.document_mut(), "x");
        let fragment = session
            .fragment(vec![literal], NodeCategory::PythonExpressionToken)
            .unwrap();
        assert_eq!(session.adapt_fragment_to_paste_destination_if_possible(&fragment, slot), None);
        assert_eq!(session.document().parent(literal), None);
    }

    #[test]
    fn test_clean_drops_emptied_expression() {
        let mut session = EditingSession::default();
        let root = hello_world(&mut session);
        let ids = session.document().descendants(root);
        let (statement, expr) = (ids[1], ids[2]);

        session.remove_child(ChildSetRef::new(expr, 0), 0).unwrap();
        session.clean(expr);

        assert!(session.document().children(ChildSetRef::new(statement, 0)).is_empty());
        assert_eq!(session.export_python().unwrap(), "\n");
    }

    #[test]
    fn test_delete_if_keeps_true_block() {
        let mut session = EditingSession::default();
        let root = hello_world(&mut session);
        let body = session.document().child_set_ref(root, "body").unwrap();

        let doc = session.document_mut();
        let call = call_variable(doc, "go", &[]);
        let inner = expression_statement(doc, &[call]);
        let flag = identifier(doc, "ready");
        let condition = expression(doc, &[flag]);
        let if_node = if_statement(doc, condition, &[inner]);
        let line = statement(doc, Some(if_node));
        session.insert_node(body, 0, line).unwrap();

        let kept = session.delete_node(ChildSetRef::new(line, 0), 0).unwrap();

        assert_eq!(kept, vec![inner]);
        assert_eq!(session.document().parent(inner), Some(body));
        assert_eq!(
            session.export_python().unwrap(),
            "\ngo()\nprint(\"Hello, World!\")\n"
        );
    }

    #[test]
    fn test_save_checks_version() {
        let mut session = EditingSession::default();
        let root = hello_world(&mut session);
        let body = session.document().child_set_ref(root, "body").unwrap();
        let blank = statement(session.document_mut(), None);
        session.insert_node(body, 1, blank).unwrap();

        let err = session.save(0).unwrap_err();
        assert!(matches!(
            err,
            crate::errors::LanguageError::Save(SaveError::VersionMismatch { expected: 0, actual: 1 })
        ));
        assert!(session.save(1).is_ok());
    }

    #[test]
    fn test_load_drops_subscriptions() {
        let mut session = EditingSession::default();
        hello_world(&mut session);
        let sub = session.subscribe_nodes(|_| {});
        assert_eq!(session.dispatcher().subscriber_count(), 1);
        hello_world(&mut session);
        assert_eq!(session.dispatcher().subscriber_count(), 0);
        sub.unsubscribe();
    }
}
