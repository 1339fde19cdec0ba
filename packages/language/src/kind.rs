//! Closed set of node kinds and the static table describing each one.
//!
//! Every kind maps to a [`KindSpec`]: its categories, declared child sets, properties, layout
//! components and paste adapters. Behaviour that needs code (cleaning, validation, scope hooks,
//! code generation) is dispatched with exhaustive `match`es in [`crate::python`].

use crate::category::NodeCategory;
use crate::tree::{Document, NodeId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    #[serde(rename = "PYTHON_FILE")]
    File,
    #[serde(rename = "PYTHON_STATEMENT")]
    Statement,
    #[serde(rename = "PYTHON_EXPRESSION")]
    Expression,
    #[serde(rename = "PY_ARG")]
    Argument,
    #[serde(rename = "PY_IDENTIFIER")]
    Identifier,
    #[serde(rename = "STRING_LITERAL")]
    StringLiteral,
    #[serde(rename = "NUMERIC_LITERAL")]
    NumericLiteral,
    #[serde(rename = "PYTHON_BOOL")]
    BoolLiteral,
    #[serde(rename = "PYTHON_NONE")]
    NoneLiteral,
    #[serde(rename = "PYTHON_BINARY_OPERATOR")]
    BinaryOperator,
    #[serde(rename = "PYTHON_CALL_VARIABLE")]
    CallVariable,
    #[serde(rename = "PYTHON_CALL_MEMBER")]
    CallMember,
    #[serde(rename = "PYTHON_LIST")]
    List,
    #[serde(rename = "PYTHON_ASSIGNMENT")]
    Assignment,
    #[serde(rename = "PYTHON_IF")]
    If,
    #[serde(rename = "PYTHON_ELIF")]
    Elif,
    #[serde(rename = "PYTHON_ELSE")]
    Else,
    #[serde(rename = "PYTHON_FOR")]
    For,
    #[serde(rename = "PYTHON_WHILE")]
    While,
    #[serde(rename = "PYTHON_FUNCTION_DECLARATION")]
    FunctionDeclaration,
    #[serde(rename = "PYTHON_RETURN")]
    Return,
}

impl NodeKind {
    pub const ALL: [NodeKind; 21] = [
        NodeKind::File,
        NodeKind::Statement,
        NodeKind::Expression,
        NodeKind::Argument,
        NodeKind::Identifier,
        NodeKind::StringLiteral,
        NodeKind::NumericLiteral,
        NodeKind::BoolLiteral,
        NodeKind::NoneLiteral,
        NodeKind::BinaryOperator,
        NodeKind::CallVariable,
        NodeKind::CallMember,
        NodeKind::List,
        NodeKind::Assignment,
        NodeKind::If,
        NodeKind::Elif,
        NodeKind::Else,
        NodeKind::For,
        NodeKind::While,
        NodeKind::FunctionDeclaration,
        NodeKind::Return,
    ];

    pub fn spec(self) -> &'static KindSpec {
        crate::python::catalog::spec(self)
    }

    pub fn type_name(self) -> &'static str {
        self.spec().type_name
    }

    pub fn from_type_name(name: &str) -> Option<NodeKind> {
        Self::ALL.iter().copied().find(|kind| kind.type_name() == name)
    }

    pub fn categories(self) -> &'static [NodeCategory] {
        self.spec().categories
    }

    pub fn is_in_category(self, category: NodeCategory) -> bool {
        self.categories().contains(&category)
    }

    pub fn is_invisible(self) -> bool {
        self.spec().invisible
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChildSetKind {
    /// At most one child.
    Single,
    /// Any number of children.
    Many,
    /// Fixed at construction; never accepts inserts or deletes from editing.
    Immutable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildSetSpec {
    pub name: &'static str,
    pub kind: ChildSetKind,
    pub category: NodeCategory,
    pub min_children: usize,
    /// Children resolve names against the scope enclosing the owner instead of the owner's own.
    pub outer_scope: bool,
}

impl ChildSetSpec {
    pub const fn new(name: &'static str, kind: ChildSetKind, category: NodeCategory) -> Self {
        Self {
            name,
            kind,
            category,
            min_children: 0,
            outer_scope: false,
        }
    }

    pub const fn min(mut self, min_children: usize) -> Self {
        self.min_children = min_children;
        self
    }

    pub const fn in_outer_scope(mut self) -> Self {
        self.outer_scope = true;
        self
    }

    /// `None` means unbounded.
    pub fn max_children(&self) -> Option<usize> {
        match self.kind {
            ChildSetKind::Single => Some(1),
            ChildSetKind::Immutable => Some(self.min_children.max(1)),
            ChildSetKind::Many => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyDefault {
    Text(&'static str),
    Bool(bool),
}

impl PropertyDefault {
    pub fn to_value(self) -> serde_json::Value {
        match self {
            PropertyDefault::Text(text) => serde_json::Value::String(text.to_string()),
            PropertyDefault::Bool(value) => serde_json::Value::Bool(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropertySpec {
    pub name: &'static str,
    pub default: PropertyDefault,
}

/// How a child set is arranged relative to its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildSetLayout {
    /// Inline tokens with an insert gap between each.
    Token,
    /// Inline, attached to the right of a keyword (conditions, iterables).
    AttachRight,
    /// Bracketed, comma separated arguments.
    TreeBrackets,
    /// Indented lines below the owner.
    Block { end_cursor: bool },
    /// Sibling lines at the owner's indentation (else/elif chains).
    Stack,
    /// Rendered to the left of the owner (`obj` in `obj.method()`).
    Breadcrumbs,
}

impl ChildSetLayout {
    pub fn is_left(self) -> bool {
        matches!(self, ChildSetLayout::Breadcrumbs)
    }

    pub fn is_inline(self) -> bool {
        !matches!(self, ChildSetLayout::Block { .. } | ChildSetLayout::Stack)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LayoutComponent {
    Keyword(&'static str),
    Cap(&'static str),
    Property(&'static str),
    StringLiteral(&'static str),
    ChildSet(&'static str, ChildSetLayout),
}

/// Transforms a detached node into one that fits the adapter's destination kind.
pub type PasteAdapter = fn(&mut Document, NodeId) -> NodeId;

pub struct KindSpec {
    pub kind: NodeKind,
    pub type_name: &'static str,
    pub categories: &'static [NodeCategory],
    pub properties: &'static [PropertySpec],
    pub child_sets: &'static [ChildSetSpec],
    pub layout: &'static [LayoutComponent],
    pub invisible: bool,
    pub scoped: bool,
    pub editable_property: Option<&'static str>,
    pub paste_adapters: &'static [(NodeKind, PasteAdapter)],
}

impl KindSpec {
    pub fn child_set_index(&self, name: &str) -> Option<usize> {
        self.child_sets.iter().position(|spec| spec.name == name)
    }

    pub fn child_set_layout(&self, name: &str) -> ChildSetLayout {
        self.layout
            .iter()
            .find_map(|component| match component {
                LayoutComponent::ChildSet(id, layout) if *id == name => Some(*layout),
                _ => None,
            })
            .unwrap_or(ChildSetLayout::Token)
    }

    pub fn left_breadcrumb_child_set(&self) -> Option<&'static str> {
        self.layout.iter().find_map(|component| match component {
            LayoutComponent::ChildSet(id, layout) if layout.is_left() => Some(*id),
            _ => None,
        })
    }
}

impl std::fmt::Debug for KindSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KindSpec")
            .field("type_name", &self.type_name)
            .field("categories", &self.categories)
            .field("child_sets", &self.child_sets)
            .finish()
    }
}
