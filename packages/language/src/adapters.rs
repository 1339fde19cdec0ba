//! # Paste Adapters
//!
//! Two layers of adaptation let content move between incompatible slots:
//!
//! - **Node paste adapters** live on each kind's [`KindSpec`](crate::kind::KindSpec), keyed by
//!   destination kind. Resolution expands every destination kind into all of its categories
//!   and chains through the destination's own adapters, so a string literal reaches a
//!   statement slot through `token → expression → statement`.
//! - **Fragment adapters** turn a whole run of nodes of one category into a single node. They
//!   are registered per `(fragment category, destination kind)` and chained with the
//!   destination's node adapters in the same way. A last-resort table fills gaps without
//!   overriding primary entries.

use crate::category::NodeCategory;
use crate::kind::{NodeKind, PasteAdapter};
use crate::python::builders;
use crate::tree::{Document, NodeId};
use std::collections::BTreeMap;

/// Turns a run of detached nodes into one detached node.
pub type FragmentAdapter = fn(&mut Document, &[NodeId]) -> NodeId;

/// Chains deeper than this are treated as cycles.
const MAX_CHAIN: usize = 8;

/// Category → adapter chain for a node kind, nearest destinations first.
pub fn resolve_paste_adapters(kind: NodeKind) -> BTreeMap<NodeCategory, Vec<PasteAdapter>> {
    resolve_with_depth(kind, 0)
}

fn resolve_with_depth(kind: NodeKind, depth: usize) -> BTreeMap<NodeCategory, Vec<PasteAdapter>> {
    let mut results: BTreeMap<NodeCategory, Vec<PasteAdapter>> = BTreeMap::new();
    if depth >= MAX_CHAIN {
        return results;
    }
    let adapters = kind.spec().paste_adapters;
    for (target, adapter) in adapters {
        for category in target.categories() {
            results.entry(*category).or_insert_with(|| vec![*adapter]);
        }
    }
    for (target, adapter) in adapters {
        for (category, chain) in resolve_with_depth(*target, depth + 1) {
            results.entry(category).or_insert_with(|| {
                let mut chained = vec![*adapter];
                chained.extend(chain);
                chained
            });
        }
    }
    results
}

pub fn is_adaptable_to_paste_destination(kind: NodeKind, category: NodeCategory) -> bool {
    kind.is_in_category(category) || resolve_paste_adapters(kind).contains_key(&category)
}

/// Adapt a detached node to `category`, returning the node itself when it already fits.
pub fn adapt_node_to_paste_destination(doc: &mut Document, node: NodeId, category: NodeCategory) -> Option<NodeId> {
    let kind = doc.get(node)?.kind();
    if kind.is_in_category(category) {
        return Some(node);
    }
    let chain = resolve_paste_adapters(kind).remove(&category)?;
    Some(chain.into_iter().fold(node, |current, adapter| adapter(doc, current)))
}

/// A fragment adapter followed by zero or more node adapters.
#[derive(Clone)]
pub struct ResolvedFragmentAdapter {
    adapter: FragmentAdapter,
    chain: Vec<PasteAdapter>,
}

impl ResolvedFragmentAdapter {
    pub fn apply(&self, doc: &mut Document, nodes: &[NodeId]) -> NodeId {
        let head = (self.adapter)(doc, nodes);
        self.chain.iter().fold(head, |current, adapter| adapter(doc, current))
    }
}

impl std::fmt::Debug for ResolvedFragmentAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedFragmentAdapter")
            .field("chain_len", &self.chain.len())
            .finish()
    }
}

#[derive(Default, Clone)]
pub struct FragmentAdapterRegistry {
    primary: BTreeMap<NodeCategory, Vec<(NodeKind, FragmentAdapter)>>,
    last_resort: BTreeMap<NodeCategory, Vec<(NodeKind, FragmentAdapter)>>,
    resolved: BTreeMap<NodeCategory, BTreeMap<NodeCategory, ResolvedFragmentAdapter>>,
}

impl FragmentAdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry for the Python catalog, already resolved.
    pub fn python() -> Self {
        let mut registry = Self::new();
        registry.register(
            NodeCategory::PythonExpressionToken,
            NodeKind::Expression,
            builders::tokens_to_expression,
        );
        registry.register(NodeCategory::PythonElseBlock, NodeKind::If, builders::else_blocks_to_if);
        registry.register_last_resort(NodeCategory::PythonStatement, NodeKind::Elif, builders::statements_to_elif);
        registry.register_last_resort(NodeCategory::PythonExpression, NodeKind::Elif, builders::expressions_to_elif);
        registry.resolve();
        registry
    }

    pub fn register(&mut self, fragment_category: NodeCategory, destination: NodeKind, adapter: FragmentAdapter) {
        self.primary
            .entry(fragment_category)
            .or_default()
            .push((destination, adapter));
    }

    pub fn register_last_resort(
        &mut self,
        fragment_category: NodeCategory,
        destination: NodeKind,
        adapter: FragmentAdapter,
    ) {
        self.last_resort
            .entry(fragment_category)
            .or_default()
            .push((destination, adapter));
    }

    /// Expand registrations into `(fragment category, destination category)` lookups.
    pub fn resolve(&mut self) {
        self.resolved.clear();
        for table in [&self.primary, &self.last_resort] {
            for (fragment_category, registrations) in table {
                let resolved = self.resolved.entry(*fragment_category).or_default();
                for (destination, adapter) in registrations {
                    for category in destination.categories() {
                        resolved.entry(*category).or_insert_with(|| ResolvedFragmentAdapter {
                            adapter: *adapter,
                            chain: Vec::new(),
                        });
                    }
                    for (category, chain) in resolve_paste_adapters(*destination) {
                        resolved.entry(category).or_insert_with(|| ResolvedFragmentAdapter {
                            adapter: *adapter,
                            chain,
                        });
                    }
                }
            }
        }
    }

    pub fn get(&self, fragment_category: NodeCategory, destination: NodeCategory) -> Option<&ResolvedFragmentAdapter> {
        self.resolved.get(&fragment_category)?.get(&destination)
    }
}

impl std::fmt::Debug for FragmentAdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FragmentAdapterRegistry")
            .field("primary", &self.primary.keys().collect::<Vec<_>>())
            .field("last_resort", &self.last_resort.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::python::builders::{expression, string_literal};

    #[test]
    fn test_token_chains_to_statement() {
        let adapters = resolve_paste_adapters(NodeKind::StringLiteral);
        assert_eq!(adapters[&NodeCategory::PythonExpression].len(), 1);
        assert_eq!(adapters[&NodeCategory::PythonStatement].len(), 2);
        assert_eq!(adapters[&NodeCategory::PythonFunctionArgument].len(), 2);
        assert!(!adapters.contains_key(&NodeCategory::PythonAssignable));
    }

    #[test]
    fn test_adapt_wraps_token() {
        let mut doc = Document::new();
        let literal = string_literal(&mut doc, "hi");
        let adapted = adapt_node_to_paste_destination(&mut doc, literal, NodeCategory::PythonStatement).unwrap();

        assert_eq!(doc.kind(adapted), NodeKind::Statement);
        assert_eq!(doc.root_of(literal), adapted);
    }

    #[test]
    fn test_adapt_returns_same_node_when_it_fits() {
        let mut doc = Document::new();
        let expr = expression(&mut doc, &[]);
        assert_eq!(
            adapt_node_to_paste_destination(&mut doc, expr, NodeCategory::PythonExpression),
            Some(expr)
        );
        assert!(is_adaptable_to_paste_destination(NodeKind::Expression, NodeCategory::PythonStatement));
        assert!(!is_adaptable_to_paste_destination(NodeKind::Else, NodeCategory::PythonExpression));
    }

    #[test]
    fn test_fragment_adapter_chains_through_expression() {
        let registry = FragmentAdapterRegistry::python();
        let to_statement = registry
            .get(NodeCategory::PythonExpressionToken, NodeCategory::PythonStatement)
            .unwrap();

        let mut doc = Document::new();
        let a = string_literal(&mut doc, "a");
        let b = string_literal(&mut doc, "b");
        let statement = to_statement.apply(&mut doc, &[a, b]);

        assert_eq!(doc.kind(statement), NodeKind::Statement);
        let slot = doc.child_set_ref(statement, "statement").unwrap();
        let expr = doc.children(slot)[0];
        let tokens = doc.child_set_ref(expr, "tokens").unwrap();
        assert_eq!(doc.children(tokens), &[a, b]);
    }

    #[test]
    fn test_last_resort_does_not_override_primary() {
        let registry = FragmentAdapterRegistry::python();
        assert!(registry
            .get(NodeCategory::PythonStatement, NodeCategory::PythonElseBlock)
            .is_some());
        assert!(registry
            .get(NodeCategory::PythonExpressionToken, NodeCategory::PythonStatementContents)
            .is_some());
        assert!(registry
            .get(NodeCategory::PythonStatement, NodeCategory::PythonExpressionToken)
            .is_none());
    }
}
