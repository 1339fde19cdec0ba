//! # Fragments
//!
//! A fragment is a non-empty run of detached nodes that share a category: the unit of copy,
//! cut, paste and drag.

use crate::adapters::{adapt_node_to_paste_destination, is_adaptable_to_paste_destination, FragmentAdapterRegistry};
use crate::category::NodeCategory;
use crate::errors::FragmentError;
use crate::serialize::SerializedNode;
use crate::tree::{ChildSetRef, Document, NodeId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedFragment {
    pub category: NodeCategory,
    pub nodes: Vec<SerializedNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    nodes: Vec<NodeId>,
    category: NodeCategory,
}

impl Fragment {
    /// Build a trimmed fragment. Every node must be detached and belong to `category`.
    pub fn new(doc: &mut Document, nodes: Vec<NodeId>, category: NodeCategory) -> Result<Self, FragmentError> {
        let mut fragment = Self::untrimmed(doc, nodes, category)?;
        fragment.trim(doc);
        Ok(fragment)
    }

    pub fn untrimmed(doc: &Document, nodes: Vec<NodeId>, category: NodeCategory) -> Result<Self, FragmentError> {
        if nodes.is_empty() {
            return Err(FragmentError::Empty);
        }
        for node in &nodes {
            let kind = doc[*node].kind();
            if !kind.is_in_category(category) {
                return Err(FragmentError::CategoryMismatch {
                    kind: kind.type_name(),
                    category,
                });
            }
        }
        Ok(Self { nodes, category })
    }

    /// Unwrap a lone invisible node with a single child set into that child set's contents.
    fn trim(&mut self, doc: &mut Document) {
        let [only] = self.nodes[..] else {
            return;
        };
        let node = &doc[only];
        if !node.kind().is_invisible() || node.child_sets().len() != 1 {
            return;
        }
        let category = node.child_sets()[0].category();
        let children = doc.take_children(ChildSetRef::new(only, 0));
        if children.is_empty() {
            return;
        }
        self.nodes = children;
        self.category = category;
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<NodeId> {
        self.nodes
    }

    pub fn category(&self) -> NodeCategory {
        self.category
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false; kept for parity with child sets.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_single(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Deep copy every node, leaving this fragment untouched.
    pub fn clone_into(&self, doc: &mut Document) -> Result<Fragment, FragmentError> {
        let nodes: Vec<NodeId> = self.nodes.iter().filter_map(|node| doc.clone_subtree(*node)).collect();
        Fragment::untrimmed(doc, nodes, self.category)
    }

    pub fn serialize(&self, doc: &Document) -> SerializedFragment {
        SerializedFragment {
            category: self.category,
            nodes: self.nodes.iter().map(|node| doc.serialize(*node)).collect(),
        }
    }
}

/// Nodes of unknown type are dropped; the rest must still fit the category.
pub fn deserialize_fragment(doc: &mut Document, serialized: &SerializedFragment) -> Result<Fragment, FragmentError> {
    let nodes = serialized
        .nodes
        .iter()
        .filter_map(|node| doc.deserialize(node))
        .collect();
    Fragment::new(doc, nodes, serialized.category)
}

/// Adapt every node of `fragment` to `category`, as one node through a fragment adapter or
/// node by node. Nothing is touched unless the whole fragment can be adapted.
fn adapt_fragment_nodes(
    doc: &mut Document,
    registry: &FragmentAdapterRegistry,
    fragment: &Fragment,
    category: NodeCategory,
) -> Option<Vec<NodeId>> {
    if fragment.category == category {
        return Some(fragment.nodes.clone());
    }
    if let Some(adapter) = registry.get(fragment.category, category) {
        return Some(vec![adapter.apply(doc, &fragment.nodes)]);
    }
    let adaptable = fragment
        .nodes
        .iter()
        .all(|node| is_adaptable_to_paste_destination(doc[*node].kind(), category));
    if !adaptable {
        return None;
    }
    fragment
        .nodes
        .iter()
        .map(|node| adapt_node_to_paste_destination(doc, *node, category))
        .collect()
}

/// `a`'s nodes followed by `b`'s, in whichever of the two categories both can be adapted to.
pub fn combine_fragments(
    doc: &mut Document,
    registry: &FragmentAdapterRegistry,
    a: Fragment,
    b: Fragment,
) -> Option<Fragment> {
    if let Some(tail) = adapt_fragment_nodes(doc, registry, &b, a.category) {
        let mut nodes = a.nodes;
        nodes.extend(tail);
        return Some(Fragment {
            nodes,
            category: a.category,
        });
    }
    if let Some(mut nodes) = adapt_fragment_nodes(doc, registry, &a, b.category) {
        nodes.extend(b.nodes);
        return Some(Fragment {
            nodes,
            category: b.category,
        });
    }
    tracing::warn!(first = ?a.category, second = ?b.category, "cannot combine fragments");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::NodeKind;
    use crate::python::builders::{expression, expression_statement, identifier, statement, string_literal};

    #[test]
    fn test_empty_fragment_is_rejected() {
        let mut doc = Document::new();
        let err = Fragment::new(&mut doc, vec![], NodeCategory::PythonStatement).unwrap_err();
        assert_eq!(err, FragmentError::Empty);
    }

    #[test]
    fn test_category_is_enforced() {
        let mut doc = Document::new();
        let literal = string_literal(&mut doc, "x");
        let err = Fragment::new(&mut doc, vec![literal], NodeCategory::PythonStatement).unwrap_err();
        assert!(matches!(err, FragmentError::CategoryMismatch { kind: "STRING_LITERAL", .. }));
    }

    #[test]
    fn test_trim_unwraps_invisible_node() {
        let mut doc = Document::new();
        let a = identifier(&mut doc, "a");
        let b = identifier(&mut doc, "b");
        let expr = expression(&mut doc, &[a, b]);

        let fragment = Fragment::new(&mut doc, vec![expr], NodeCategory::PythonExpression).unwrap();

        assert_eq!(fragment.category(), NodeCategory::PythonExpressionToken);
        assert_eq!(fragment.nodes(), &[a, b]);
        assert_eq!(doc.parent(a), None);
    }

    #[test]
    fn test_trim_keeps_empty_wrapper() {
        let mut doc = Document::new();
        let empty = statement(&mut doc, None);
        let fragment = Fragment::new(&mut doc, vec![empty], NodeCategory::PythonStatement).unwrap();
        assert_eq!(fragment.nodes(), &[empty]);
        assert_eq!(fragment.category(), NodeCategory::PythonStatement);
    }

    #[test]
    fn test_serialize_round_trip() {
        let mut doc = Document::new();
        let literal = string_literal(&mut doc, "x");
        let call = identifier(&mut doc, "y");
        let fragment = Fragment::new(&mut doc, vec![literal, call], NodeCategory::PythonExpressionToken).unwrap();

        let serialized = fragment.serialize(&doc);
        let json = serde_json::to_string(&serialized).unwrap();
        let parsed: SerializedFragment = serde_json::from_str(&json).unwrap();
        let restored = deserialize_fragment(&mut doc, &parsed).unwrap();

        assert_eq!(restored.len(), 2);
        assert_eq!(restored.serialize(&doc), serialized);
    }

    #[test]
    fn test_combine_tokens_into_statements() {
        let mut doc = Document::new();
        let registry = FragmentAdapterRegistry::python();
        let head = identifier(&mut doc, "a");
        let tail_literal = string_literal(&mut doc, "b");
        let tail = expression_statement(&mut doc, &[tail_literal]);
        let a = Fragment::new(&mut doc, vec![head], NodeCategory::PythonExpressionToken).unwrap();
        let b = Fragment::untrimmed(&doc, vec![tail], NodeCategory::PythonStatement).unwrap();

        let combined = combine_fragments(&mut doc, &registry, a, b).unwrap();

        assert_eq!(combined.category(), NodeCategory::PythonStatement);
        assert_eq!(combined.len(), 2);
        assert_eq!(doc.kind(combined.nodes()[0]), NodeKind::Statement);
        assert_eq!(combined.nodes()[1], tail);
    }
}
