//! # Mutation Records
//!
//! Immutable descriptions of every observable change to the tree and its scopes. Each record
//! names the affected entity and carries the payload a passive observer (a renderer, a cursor
//! map, a persistence layer) needs to replay the effect.

use crate::scope::ScopeId;
use crate::serialize::SerializedNode;
use crate::tree::{ChildSetRef, NodeId, Validity};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events are routed by the entity they concern. A global subscriber only sees records
/// for which [`Mutation::is_global`] holds.
pub trait Mutation {
    type Target: Copy + PartialEq + std::fmt::Debug;

    fn target(&self) -> Self::Target;

    fn is_global(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeMutationKind {
    SetProperty { property: String, value: Value },
    SetValidity { validity: Validity },
    SetRuntimeAnnotations { annotations: Vec<Value> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMutation {
    pub node: NodeId,
    #[serde(flatten)]
    pub kind: NodeMutationKind,
}

impl Mutation for NodeMutation {
    type Target = NodeId;

    fn target(&self) -> NodeId {
        self.node
    }

    fn is_global(&self) -> bool {
        !matches!(self.kind, NodeMutationKind::SetRuntimeAnnotations { .. })
    }
}

/// An inserted node, with its id in the live tree and a snapshot of its subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertedNode {
    pub id: NodeId,
    pub node: SerializedNode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChildSetMutationKind {
    Insert { nodes: Vec<InsertedNode> },
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildSetMutation {
    pub child_set: ChildSetRef,
    pub index: usize,
    #[serde(flatten)]
    pub kind: ChildSetMutationKind,
}

impl ChildSetMutation {
    pub fn is_insert(&self) -> bool {
        matches!(self.kind, ChildSetMutationKind::Insert { .. })
    }

    pub fn inserted_ids(&self) -> Vec<NodeId> {
        match &self.kind {
            ChildSetMutationKind::Insert { nodes } => nodes.iter().map(|n| n.id).collect(),
            ChildSetMutationKind::Delete => Vec::new(),
        }
    }
}

impl Mutation for ChildSetMutation {
    type Target = ChildSetRef;

    fn target(&self) -> ChildSetRef {
        self.child_set
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScopeMutationKind {
    AddOrUpdateEntry {
        name: String,
    },
    RemoveEntry {
        name: String,
    },
    #[serde(rename_all = "camelCase")]
    RenameEntry {
        previous_name: String,
        new_name: String,
    },
    AddChildScope {
        child: ScopeId,
    },
    RemoveChildScope {
        child: ScopeId,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeMutation {
    pub scope: ScopeId,
    #[serde(flatten)]
    pub kind: ScopeMutationKind,
}

impl Mutation for ScopeMutation {
    type Target = ScopeId;

    fn target(&self) -> ScopeId {
        self.scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_runtime_annotations_are_local_only() {
        let annotations = NodeMutation {
            node: NodeId(1),
            kind: NodeMutationKind::SetRuntimeAnnotations { annotations: vec![] },
        };
        let property = NodeMutation {
            node: NodeId(1),
            kind: NodeMutationKind::SetProperty {
                property: "identifier".to_string(),
                value: json!("x"),
            },
        };
        assert!(!annotations.is_global());
        assert!(property.is_global());
    }

    #[test]
    fn test_scope_mutation_wire_format() {
        let mutation = ScopeMutation {
            scope: ScopeId(2),
            kind: ScopeMutationKind::RenameEntry {
                previous_name: "a".to_string(),
                new_name: "b".to_string(),
            },
        };
        let value = serde_json::to_value(&mutation).unwrap();
        assert_eq!(
            value,
            json!({ "scope": 2, "type": "RENAME_ENTRY", "previousName": "a", "newName": "b" })
        );
    }

    #[test]
    fn test_child_set_mutation_wire_format() {
        let mutation = ChildSetMutation {
            child_set: ChildSetRef::new(NodeId(0), 0),
            index: 3,
            kind: ChildSetMutationKind::Delete,
        };
        let value = serde_json::to_value(&mutation).unwrap();
        assert_eq!(value["type"], "DELETE");
        assert_eq!(value["index"], 3);
        assert!(!mutation.is_insert());
    }
}
