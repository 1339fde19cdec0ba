//! # Scope Tracker
//!
//! Hierarchical variable bindings for the document.
//!
//! ```text
//!   global (builtins)
//!     └── file scope
//!           ├── function scope (params, locals)
//!           │     └── nested function scope
//!           └── function scope
//! ```
//!
//! Scopes live in an arena owned by the session. Each entry records which nodes declare it;
//! an entry disappears only when its last declarer leaves. Nodes that reference a name
//! (identifiers, calls) register as *watchers* so a rename can reach them.
//!
//! Rename handlers mutate the tree, which the scope tree does not own. Operations that notify
//! watchers therefore return the affected node ids and the session runs their handlers.

use crate::dispatcher::MutationDispatcher;
use crate::kind::NodeKind;
use crate::mutations::{ScopeMutation, ScopeMutationKind};
use crate::tree::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(pub(crate) u32);

impl std::fmt::Display for ScopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scope{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VariableKind {
    Variable,
    Function,
    Parameter,
    LoopVariable,
    Builtin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableMetadata {
    pub documentation: String,
    pub kind: VariableKind,
}

impl VariableMetadata {
    pub fn new(kind: VariableKind, documentation: impl Into<String>) -> Self {
        Self {
            documentation: documentation.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableEntry {
    pub declarers: BTreeMap<NodeId, VariableMetadata>,
    pub builtin: Option<VariableMetadata>,
}

#[derive(Debug, Clone)]
pub struct Scope {
    parent: Option<ScopeId>,
    node_kind: Option<NodeKind>,
    is_global: bool,
    variables: BTreeMap<String, VariableEntry>,
    child_scopes: BTreeSet<ScopeId>,
    name_watchers: BTreeMap<String, BTreeSet<NodeId>>,
}

impl Scope {
    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    pub fn node_kind(&self) -> Option<NodeKind> {
        self.node_kind
    }

    pub fn is_global(&self) -> bool {
        self.is_global
    }

    pub fn variables(&self) -> &BTreeMap<String, VariableEntry> {
        &self.variables
    }

    pub fn has_entries(&self) -> bool {
        !self.variables.is_empty()
    }

    pub fn child_scopes(&self) -> impl Iterator<Item = ScopeId> + '_ {
        self.child_scopes.iter().copied()
    }

    pub fn watchers(&self, name: &str) -> Vec<NodeId> {
        self.name_watchers
            .get(name)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    global: ScopeId,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTree {
    /// A tree holding only an empty global scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope {
                parent: None,
                node_kind: None,
                is_global: true,
                variables: BTreeMap::new(),
                child_scopes: BTreeSet::new(),
                name_watchers: BTreeMap::new(),
            }],
            global: ScopeId(0),
        }
    }

    pub fn global(&self) -> ScopeId {
        self.global
    }

    pub fn get(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(id.0 as usize)
    }

    fn scope_mut(&mut self, id: ScopeId) -> Option<&mut Scope> {
        self.scopes.get_mut(id.0 as usize)
    }

    fn fire(dispatcher: &MutationDispatcher, scope: ScopeId, kind: ScopeMutationKind) {
        dispatcher.scopes.fire(&ScopeMutation { scope, kind });
    }

    pub fn add_child_scope(
        &mut self,
        parent: ScopeId,
        node_kind: NodeKind,
        dispatcher: &MutationDispatcher,
    ) -> ScopeId {
        let child = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            parent: Some(parent),
            node_kind: Some(node_kind),
            is_global: false,
            variables: BTreeMap::new(),
            child_scopes: BTreeSet::new(),
            name_watchers: BTreeMap::new(),
        });
        if let Some(scope) = self.scope_mut(parent) {
            scope.child_scopes.insert(child);
        }
        Self::fire(dispatcher, parent, ScopeMutationKind::AddChildScope { child });
        child
    }

    pub fn remove_child_scope(&mut self, parent: ScopeId, child: ScopeId, dispatcher: &MutationDispatcher) {
        if let Some(scope) = self.scope_mut(parent) {
            scope.child_scopes.remove(&child);
        }
        Self::fire(dispatcher, parent, ScopeMutationKind::RemoveChildScope { child });
    }

    /// Create or update an entry. Returns the watchers of `name`, which should revalidate.
    pub fn add_variable(
        &mut self,
        scope: ScopeId,
        name: &str,
        metadata: VariableMetadata,
        declarer: Option<NodeId>,
        dispatcher: &MutationDispatcher,
    ) -> Vec<NodeId> {
        let Some(target) = self.scope_mut(scope) else {
            return Vec::new();
        };
        let entry = target.variables.entry(name.to_string()).or_default();
        if let Some(declarer) = declarer {
            entry.declarers.insert(declarer, metadata);
        }
        let watchers = target.watchers(name);
        debug!(scope = %scope, name, "add variable");
        Self::fire(
            dispatcher,
            scope,
            ScopeMutationKind::AddOrUpdateEntry { name: name.to_string() },
        );
        watchers
    }

    /// Drop one declarer; the entry goes away with its last declarer.
    pub fn remove_variable(
        &mut self,
        scope: ScopeId,
        name: &str,
        declarer: NodeId,
        dispatcher: &MutationDispatcher,
    ) {
        let Some(target) = self.scope_mut(scope) else {
            return;
        };
        let Some(entry) = target.variables.get_mut(name) else {
            return;
        };
        entry.declarers.remove(&declarer);
        if entry.declarers.is_empty() && entry.builtin.is_none() {
            target.variables.remove(name);
            debug!(scope = %scope, name, "remove variable");
            Self::fire(dispatcher, scope, ScopeMutationKind::RemoveEntry { name: name.to_string() });
        }
    }

    pub fn add_builtin(&mut self, scope: ScopeId, name: &str, metadata: VariableMetadata) {
        if let Some(target) = self.scope_mut(scope) {
            target.variables.entry(name.to_string()).or_default().builtin = Some(metadata);
        }
    }

    pub fn add_watcher(&mut self, scope: ScopeId, name: &str, node: NodeId) {
        if let Some(target) = self.scope_mut(scope) {
            target
                .name_watchers
                .entry(name.to_string())
                .or_default()
                .insert(node);
        }
    }

    pub fn remove_watcher(&mut self, scope: ScopeId, name: &str, node: NodeId) {
        if let Some(watchers) = self
            .scope_mut(scope)
            .and_then(|target| target.name_watchers.get_mut(name))
        {
            watchers.remove(&node);
        }
    }

    /// Builtins owned by the global scope cannot be renamed; unknown names can.
    pub fn can_rename(&self, scope: ScopeId, name: &str) -> bool {
        let mut current = Some(scope);
        while let Some(id) = current {
            let Some(s) = self.get(id) else {
                return false;
            };
            if s.is_global {
                return !s.variables.contains_key(name);
            }
            if s.variables.contains_key(name) {
                return true;
            }
            current = s.parent;
        }
        true
    }

    /// Rename `old` to `new` starting from `scope`.
    ///
    /// Returns the watchers whose rename handler must run. Their registrations have already
    /// been moved to `new`. Descendant scopes that shadow `old` are left untouched.
    pub fn rename_identifier(
        &mut self,
        scope: ScopeId,
        old: &str,
        new: &str,
        dispatcher: &MutationDispatcher,
    ) -> Vec<NodeId> {
        if old == new {
            return Vec::new();
        }

        let mut owner = scope;
        loop {
            let Some(s) = self.get(owner) else {
                return Vec::new();
            };
            if s.variables.contains_key(old) {
                if s.is_global {
                    warn!(name = old, "refusing to rename a global");
                    return Vec::new();
                }
                break;
            }
            match s.parent {
                Some(parent) => owner = parent,
                None => break,
            }
        }

        if let Some(s) = self.scope_mut(owner) {
            if s.variables.contains_key(old) {
                if s.variables.contains_key(new) {
                    warn!(from = old, to = new, "renaming to a variable that already exists, merging");
                } else {
                    s.variables.insert(new.to_string(), VariableEntry::default());
                }
            }
        }

        let mut notified = Vec::new();
        self.move_watchers(owner, old, new, &mut notified);
        let children: Vec<ScopeId> = self.get(owner).map(|s| s.child_scopes().collect()).unwrap_or_default();
        for child in children {
            self.propagate_rename(child, old, new, &mut notified);
        }

        Self::fire(
            dispatcher,
            owner,
            ScopeMutationKind::RenameEntry {
                previous_name: old.to_string(),
                new_name: new.to_string(),
            },
        );
        notified
    }

    fn propagate_rename(&mut self, scope: ScopeId, old: &str, new: &str, notified: &mut Vec<NodeId>) {
        let Some(s) = self.get(scope) else {
            return;
        };
        if s.variables.contains_key(old) {
            return;
        }
        let children: Vec<ScopeId> = s.child_scopes().collect();
        for child in children {
            self.propagate_rename(child, old, new, notified);
        }
        self.move_watchers(scope, old, new, notified);
    }

    fn move_watchers(&mut self, scope: ScopeId, old: &str, new: &str, notified: &mut Vec<NodeId>) {
        let Some(s) = self.scope_mut(scope) else {
            return;
        };
        let Some(watchers) = s.name_watchers.remove(old) else {
            return;
        };
        notified.extend(watchers.iter().copied());
        s.name_watchers.entry(new.to_string()).or_default().extend(watchers);
    }

    /// Every name visible from `scope`; inner entries shadow outer ones.
    pub fn all_in_scope_variables(&self, scope: ScopeId) -> BTreeMap<String, VariableEntry> {
        let Some(s) = self.get(scope) else {
            return BTreeMap::new();
        };
        let mut flattened = match s.parent {
            Some(parent) => self.all_in_scope_variables(parent),
            None => BTreeMap::new(),
        };
        for (name, entry) in &s.variables {
            flattened.insert(name.clone(), entry.clone());
        }
        flattened
    }

    pub fn variable_entry_by_name(&self, scope: ScopeId, name: &str) -> Option<&VariableEntry> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = self.get(id)?;
            if let Some(entry) = s.variables.get(name) {
                return Some(entry);
            }
            if s.is_global {
                return None;
            }
            current = s.parent;
        }
        None
    }

    pub fn is_inside(&self, scope: ScopeId, kind: NodeKind) -> bool {
        let mut current = Some(scope);
        while let Some(id) = current {
            let Some(s) = self.get(id) else {
                return false;
            };
            if s.is_global {
                return false;
            }
            if s.node_kind == Some(kind) {
                return true;
            }
            current = s.parent;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn meta() -> VariableMetadata {
        VariableMetadata::new(VariableKind::Variable, "Local variable")
    }

    #[test]
    fn test_add_and_remove_variable() {
        let dispatcher = MutationDispatcher::new();
        let mut tree = ScopeTree::new();
        let file = tree.add_child_scope(tree.global(), NodeKind::File, &dispatcher);

        tree.add_variable(file, "x", meta(), Some(NodeId(1)), &dispatcher);
        tree.add_variable(file, "x", meta(), Some(NodeId(2)), &dispatcher);
        tree.remove_variable(file, "x", NodeId(1), &dispatcher);
        assert!(tree.variable_entry_by_name(file, "x").is_some());

        tree.remove_variable(file, "x", NodeId(2), &dispatcher);
        assert!(tree.variable_entry_by_name(file, "x").is_none());

        // Missing entries are ignored.
        tree.remove_variable(file, "nope", NodeId(2), &dispatcher);
    }

    #[test]
    fn test_add_variable_returns_watchers() {
        let dispatcher = MutationDispatcher::new();
        let mut tree = ScopeTree::new();
        let file = tree.add_child_scope(tree.global(), NodeKind::File, &dispatcher);
        tree.add_watcher(file, "x", NodeId(9));

        let watchers = tree.add_variable(file, "x", meta(), Some(NodeId(1)), &dispatcher);
        assert_eq!(watchers, vec![NodeId(9)]);
    }

    #[test]
    fn test_lookup_shadows_parent() {
        let dispatcher = MutationDispatcher::new();
        let mut tree = ScopeTree::new();
        let global = tree.global();
        tree.add_builtin(global, "print", VariableMetadata::new(VariableKind::Builtin, "print"));
        let file = tree.add_child_scope(global, NodeKind::File, &dispatcher);
        let func = tree.add_child_scope(file, NodeKind::FunctionDeclaration, &dispatcher);
        tree.add_variable(file, "x", meta(), Some(NodeId(1)), &dispatcher);
        tree.add_variable(
            func,
            "x",
            VariableMetadata::new(VariableKind::Parameter, "Function parameter"),
            Some(NodeId(2)),
            &dispatcher,
        );

        let visible = tree.all_in_scope_variables(func);
        assert!(visible.contains_key("print"));
        assert_eq!(visible["x"].declarers.keys().copied().collect::<Vec<_>>(), vec![NodeId(2)]);
        assert!(tree.is_inside(func, NodeKind::FunctionDeclaration));
        assert!(!tree.is_inside(file, NodeKind::FunctionDeclaration));
    }

    #[test]
    fn test_rename_skips_shadowing_scope() {
        let dispatcher = MutationDispatcher::new();
        let mut tree = ScopeTree::new();
        let file = tree.add_child_scope(tree.global(), NodeKind::File, &dispatcher);
        let plain = tree.add_child_scope(file, NodeKind::FunctionDeclaration, &dispatcher);
        let shadowing = tree.add_child_scope(file, NodeKind::FunctionDeclaration, &dispatcher);
        tree.add_variable(file, "x", meta(), Some(NodeId(1)), &dispatcher);
        tree.add_variable(shadowing, "x", meta(), Some(NodeId(2)), &dispatcher);
        tree.add_watcher(file, "x", NodeId(10));
        tree.add_watcher(plain, "x", NodeId(11));
        tree.add_watcher(shadowing, "x", NodeId(12));

        let mut notified = tree.rename_identifier(plain, "x", "y", &dispatcher);
        notified.sort();

        assert_eq!(notified, vec![NodeId(10), NodeId(11)]);
        assert_eq!(tree.get(shadowing).unwrap().watchers("x"), vec![NodeId(12)]);
        assert_eq!(tree.get(file).unwrap().watchers("y"), vec![NodeId(10)]);
        assert!(tree.variable_entry_by_name(file, "y").is_some());
    }

    #[test]
    fn test_rename_refused_for_globals() {
        let dispatcher = MutationDispatcher::new();
        let mut tree = ScopeTree::new();
        let global = tree.global();
        tree.add_builtin(global, "print", VariableMetadata::new(VariableKind::Builtin, "print"));
        let file = tree.add_child_scope(global, NodeKind::File, &dispatcher);
        tree.add_watcher(file, "print", NodeId(3));

        assert!(!tree.can_rename(file, "print"));
        assert!(tree.can_rename(file, "unknown"));
        assert!(tree.rename_identifier(file, "print", "echo", &dispatcher).is_empty());
        assert_eq!(tree.get(file).unwrap().watchers("print"), vec![NodeId(3)]);
    }

    #[test]
    fn test_rename_fires_event_even_without_entry() {
        let dispatcher = MutationDispatcher::new();
        let mut tree = ScopeTree::new();
        let file = tree.add_child_scope(tree.global(), NodeKind::File, &dispatcher);
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        let _sub = dispatcher.scopes.subscribe(move |m: &ScopeMutation| sink.borrow_mut().push(m.kind.clone()));

        tree.rename_identifier(file, "a", "b", &dispatcher);

        assert_eq!(
            events.borrow().as_slice(),
            &[ScopeMutationKind::RenameEntry {
                previous_name: "a".to_string(),
                new_name: "b".to_string(),
            }]
        );
        assert!(tree.variable_entry_by_name(file, "b").is_none());
    }

    #[test]
    fn test_rename_to_existing_merges() {
        let dispatcher = MutationDispatcher::new();
        let mut tree = ScopeTree::new();
        let file = tree.add_child_scope(tree.global(), NodeKind::File, &dispatcher);
        tree.add_variable(file, "a", meta(), Some(NodeId(1)), &dispatcher);
        tree.add_variable(file, "b", meta(), Some(NodeId(2)), &dispatcher);
        tree.add_watcher(file, "a", NodeId(5));
        tree.add_watcher(file, "b", NodeId(6));

        let notified = tree.rename_identifier(file, "a", "b", &dispatcher);

        assert_eq!(notified, vec![NodeId(5)]);
        assert_eq!(tree.get(file).unwrap().watchers("b"), vec![NodeId(5), NodeId(6)]);
    }
}
