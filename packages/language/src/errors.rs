//! Error types for the language core

use crate::category::NodeCategory;
use crate::tree::{ChildSetRef, NodeId};
use thiserror::Error;

pub type LanguageResult<T> = Result<T, LanguageError>;

#[derive(Error, Debug)]
pub enum LanguageError {
    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("Fragment error: {0}")]
    Fragment(#[from] FragmentError),

    #[error("Save error: {0}")]
    Save(#[from] SaveError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Structural failures reported by child-set operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreeError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Child set {slot} not found on node {node}")]
    ChildSetNotFound { node: NodeId, slot: usize },

    #[error("Index {index} out of range for child set of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Node {node} already has a parent")]
    AlreadyAttached { node: NodeId },

    #[error("{kind} is not valid for category {category:?}")]
    CategoryMismatch {
        kind: &'static str,
        category: NodeCategory,
    },

    #[error("Child set {0} is full")]
    ChildSetFull(ChildSetRef),

    #[error("Node {node} has no child set named {name}")]
    UnknownChildSet { node: NodeId, name: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FragmentError {
    #[error("A fragment must contain at least one node")]
    Empty,

    #[error("{kind} is not valid for fragment category {category:?}")]
    CategoryMismatch {
        kind: &'static str,
        category: NodeCategory,
    },

    #[error("Cannot paste {category:?} into child set {child_set}")]
    CannotPaste {
        category: NodeCategory,
        child_set: ChildSetRef,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("No document is loaded")]
    NotLoaded,

    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("Node {node} has no editable property")]
    NotEditable { node: NodeId },

    #[error("Node {node} does not reference a name in scope")]
    NotRenamable { node: NodeId },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SaveError {
    #[error("Version mismatch: expected {expected}, document is at {actual}")]
    VersionMismatch { expected: u64, actual: u64 },

    #[error("Failed to write document: {0}")]
    Write(String),
}
