//! JSON form of nodes: `{ type, properties, childSets }`.

use crate::adapters::adapt_node_to_paste_destination;
use crate::kind::NodeKind;
use crate::python::builders::blank_fill;
use crate::tree::{ChildSetRef, Document, NodeId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedNode {
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
    #[serde(default)]
    pub child_sets: BTreeMap<String, Vec<SerializedNode>>,
}

impl SerializedNode {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            node_type: kind.type_name().to_string(),
            properties: BTreeMap::new(),
            child_sets: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }

    pub fn with_children(mut self, child_set: &str, children: Vec<SerializedNode>) -> Self {
        self.child_sets.insert(child_set.to_string(), children);
        self
    }
}

impl Document {
    /// Serialize a subtree. Every declared child set appears, even when empty.
    pub fn serialize(&self, id: NodeId) -> SerializedNode {
        let mut result = self.shallow_serialize(id);
        for (slot, cs) in self[id].child_sets.iter().enumerate() {
            let children = self
                .children(ChildSetRef::new(id, slot))
                .iter()
                .map(|child| self.serialize(*child))
                .collect();
            result.child_sets.insert(cs.name().to_string(), children);
        }
        result
    }

    /// Type and properties with every child set left empty.
    pub fn shallow_serialize(&self, id: NodeId) -> SerializedNode {
        let node = &self[id];
        SerializedNode {
            node_type: node.type_name().to_string(),
            properties: node.properties.clone(),
            child_sets: node
                .child_sets
                .iter()
                .map(|cs| (cs.name().to_string(), Vec::new()))
                .collect(),
        }
    }

    /// Build a detached subtree. Unknown types yield `None`.
    ///
    /// A child whose type does not fit its slot is adapted to the slot's category when an
    /// adapter exists and dropped otherwise. Slots left short of their minimum are topped up
    /// with blank fills.
    pub fn deserialize(&mut self, serialized: &SerializedNode) -> Option<NodeId> {
        let Some(kind) = NodeKind::from_type_name(&serialized.node_type) else {
            tracing::warn!(node_type = %serialized.node_type, "missing type registration");
            return None;
        };
        let id = self.create(kind);
        for (name, value) in &serialized.properties {
            self.set_property_raw(id, name, value.clone());
        }

        for (slot, spec) in kind.spec().child_sets.iter().enumerate() {
            let cs = ChildSetRef::new(id, slot);
            let children = serialized.child_sets.get(spec.name).map(Vec::as_slice).unwrap_or_default();
            for serialized_child in children {
                let Some(child) = self.deserialize(serialized_child) else {
                    continue;
                };
                let Some(child) = adapt_node_to_paste_destination(self, child, spec.category) else {
                    tracing::warn!(
                        node_type = %serialized_child.node_type,
                        category = ?spec.category,
                        "dropping child incompatible with child set"
                    );
                    continue;
                };
                if let Some(max) = spec.max_children() {
                    if self.children(cs).len() >= max {
                        tracing::warn!(child_set = spec.name, "dropping child beyond capacity");
                        continue;
                    }
                }
                let len = self.children(cs).len();
                if let Err(err) = self.attach(cs, len, child) {
                    tracing::warn!(error = %err, "failed to attach deserialized child");
                }
            }
            while self.children(cs).len() < spec.min_children {
                let Some(fill) = blank_fill(self, spec.category) else {
                    break;
                };
                let len = self.children(cs).len();
                if self.attach(cs, len, fill).is_err() {
                    break;
                }
            }
        }
        Some(id)
    }

    /// Deep copy through serialization; the copy shares no nodes with the original.
    pub fn clone_subtree(&mut self, id: NodeId) -> Option<NodeId> {
        let serialized = self.serialize(id);
        self.deserialize(&serialized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hello_world() -> SerializedNode {
        serde_json::from_value(json!({
            "type": "PYTHON_FILE",
            "properties": {},
            "childSets": {
                "body": [{
                    "type": "PYTHON_STATEMENT",
                    "childSets": {
                        "statement": [{
                            "type": "PYTHON_EXPRESSION",
                            "childSets": {
                                "tokens": [{
                                    "type": "PYTHON_CALL_VARIABLE",
                                    "properties": { "identifier": "print" },
                                    "childSets": {
                                        "arguments": [{
                                            "type": "PY_ARG",
                                            "childSets": {
                                                "argument": [{
                                                    "type": "PYTHON_EXPRESSION",
                                                    "childSets": {
                                                        "tokens": [{
                                                            "type": "STRING_LITERAL",
                                                            "properties": { "value": "Hello, World!" }
                                                        }]
                                                    }
                                                }]
                                            }
                                        }]
                                    }
                                }]
                            }
                        }]
                    }
                }]
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_round_trip_is_exact() {
        let mut doc = Document::new();
        let root = doc.deserialize(&hello_world()).unwrap();
        let once = doc.serialize(root);

        let again = doc.deserialize(&once).unwrap();
        assert_eq!(doc.serialize(again), once);
    }

    #[test]
    fn test_unknown_type_is_none() {
        let mut doc = Document::new();
        let serialized = SerializedNode {
            node_type: "NOT_REGISTERED".to_string(),
            properties: BTreeMap::new(),
            child_sets: BTreeMap::new(),
        };
        assert_eq!(doc.deserialize(&serialized), None);
    }

    #[test]
    fn test_clone_shares_no_nodes() {
        let mut doc = Document::new();
        let root = doc.deserialize(&hello_world()).unwrap();
        let copy = doc.clone_subtree(root).unwrap();

        let original: Vec<_> = doc.descendants(root);
        let cloned: Vec<_> = doc.descendants(copy);
        assert_eq!(original.len(), cloned.len());
        assert!(cloned.iter().all(|id| !original.contains(id)));
        assert_eq!(doc.serialize(root), doc.serialize(copy));
    }

    #[test]
    fn test_incompatible_child_is_adapted() {
        // A bare string literal in a statement slot is wrapped in an expression.
        let mut doc = Document::new();
        let serialized = SerializedNode::new(NodeKind::Statement).with_children(
            "statement",
            vec![SerializedNode::new(NodeKind::StringLiteral).with_property("value", "hi")],
        );
        let statement = doc.deserialize(&serialized).unwrap();
        let slot = doc.child_set_ref(statement, "statement").unwrap();
        let child = doc.children(slot)[0];
        assert_eq!(doc.kind(child), NodeKind::Expression);
    }

    #[test]
    fn test_unadaptable_child_is_dropped() {
        let mut doc = Document::new();
        let serialized = SerializedNode::new(NodeKind::CallVariable)
            .with_property("identifier", "print")
            .with_children("arguments", vec![SerializedNode::new(NodeKind::Else)]);
        let call = doc.deserialize(&serialized).unwrap();
        let args = doc.child_set_ref(call, "arguments").unwrap();
        assert!(doc.children(args).is_empty());
    }

    #[test]
    fn test_minimum_children_are_filled() {
        let mut doc = Document::new();
        let serialized = SerializedNode::new(NodeKind::If);
        let node = doc.deserialize(&serialized).unwrap();
        let condition = doc.child_set_ref(node, "condition").unwrap();
        let trueblock = doc.child_set_ref(node, "trueblock").unwrap();
        assert_eq!(doc.kind(doc.children(condition)[0]), NodeKind::Expression);
        assert_eq!(doc.kind(doc.children(trueblock)[0]), NodeKind::Statement);
    }
}
