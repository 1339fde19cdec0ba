//! Static [`KindSpec`] table for the Python node catalog.

use super::builders::{elif_to_if, statement_to_elif, wrap_in_argument, wrap_in_expression, wrap_in_statement};
use crate::category::NodeCategory::{self, *};
use crate::kind::{
    ChildSetKind::{Immutable, Many, Single},
    ChildSetLayout::{AttachRight, Block, Breadcrumbs, Stack, Token, TreeBrackets},
    ChildSetSpec, KindSpec,
    LayoutComponent::{self, ChildSet, Keyword, Property, StringLiteral},
    NodeKind, PasteAdapter, PropertyDefault, PropertySpec,
};

const TOKEN_CATEGORIES: &[NodeCategory] = &[PythonExpressionToken];
const TOKEN_ADAPTERS: &[(NodeKind, PasteAdapter)] = &[(NodeKind::Expression, wrap_in_expression)];
const STATEMENT_BLOCK: LayoutComponent = ChildSet("block", Block { end_cursor: false });

static FILE: KindSpec = KindSpec {
    kind: NodeKind::File,
    type_name: "PYTHON_FILE",
    categories: &[],
    properties: &[],
    child_sets: &[ChildSetSpec::new("body", Many, PythonStatement)],
    layout: &[ChildSet("body", Block { end_cursor: true })],
    invisible: false,
    scoped: true,
    editable_property: None,
    paste_adapters: &[],
};

static STATEMENT: KindSpec = KindSpec {
    kind: NodeKind::Statement,
    type_name: "PYTHON_STATEMENT",
    categories: &[PythonStatement],
    properties: &[],
    child_sets: &[ChildSetSpec::new("statement", Single, PythonStatementContents)],
    layout: &[ChildSet("statement", Token)],
    invisible: true,
    scoped: false,
    editable_property: None,
    paste_adapters: &[(NodeKind::Elif, statement_to_elif)],
};

static EXPRESSION: KindSpec = KindSpec {
    kind: NodeKind::Expression,
    type_name: "PYTHON_EXPRESSION",
    categories: &[PythonStatementContents, PythonExpression, PythonFunctionArgumentValue],
    properties: &[],
    child_sets: &[ChildSetSpec::new("tokens", Many, PythonExpressionToken)],
    layout: &[ChildSet("tokens", Token)],
    invisible: true,
    scoped: false,
    editable_property: None,
    paste_adapters: &[
        (NodeKind::Statement, wrap_in_statement),
        (NodeKind::Argument, wrap_in_argument),
    ],
};

static ARGUMENT: KindSpec = KindSpec {
    kind: NodeKind::Argument,
    type_name: "PY_ARG",
    categories: &[PythonFunctionArgument],
    properties: &[],
    child_sets: &[ChildSetSpec::new("argument", Single, PythonFunctionArgumentValue)],
    layout: &[ChildSet("argument", Token)],
    invisible: true,
    scoped: false,
    editable_property: None,
    paste_adapters: &[],
};

static IDENTIFIER: KindSpec = KindSpec {
    kind: NodeKind::Identifier,
    type_name: "PY_IDENTIFIER",
    categories: &[
        PythonExpressionToken,
        PythonAssignable,
        PythonLoopVariable,
        PythonFunctionName,
        PythonFunctionArgumentDeclaration,
    ],
    properties: &[PropertySpec {
        name: "identifier",
        default: PropertyDefault::Text(""),
    }],
    child_sets: &[],
    layout: &[Property("identifier")],
    invisible: false,
    scoped: false,
    editable_property: Some("identifier"),
    paste_adapters: TOKEN_ADAPTERS,
};

static STRING_LITERAL: KindSpec = KindSpec {
    kind: NodeKind::StringLiteral,
    type_name: "STRING_LITERAL",
    categories: TOKEN_CATEGORIES,
    properties: &[PropertySpec {
        name: "value",
        default: PropertyDefault::Text(""),
    }],
    child_sets: &[],
    layout: &[StringLiteral("value")],
    invisible: false,
    scoped: false,
    editable_property: Some("value"),
    paste_adapters: TOKEN_ADAPTERS,
};

static NUMERIC_LITERAL: KindSpec = KindSpec {
    kind: NodeKind::NumericLiteral,
    type_name: "NUMERIC_LITERAL",
    categories: TOKEN_CATEGORIES,
    properties: &[PropertySpec {
        name: "value",
        default: PropertyDefault::Text("0"),
    }],
    child_sets: &[],
    layout: &[Property("value")],
    invisible: false,
    scoped: false,
    editable_property: Some("value"),
    paste_adapters: TOKEN_ADAPTERS,
};

static BOOL_LITERAL: KindSpec = KindSpec {
    kind: NodeKind::BoolLiteral,
    type_name: "PYTHON_BOOL",
    categories: TOKEN_CATEGORIES,
    properties: &[PropertySpec {
        name: "value",
        default: PropertyDefault::Bool(true),
    }],
    child_sets: &[],
    layout: &[Property("value")],
    invisible: false,
    scoped: false,
    editable_property: None,
    paste_adapters: TOKEN_ADAPTERS,
};

static NONE_LITERAL: KindSpec = KindSpec {
    kind: NodeKind::NoneLiteral,
    type_name: "PYTHON_NONE",
    categories: TOKEN_CATEGORIES,
    properties: &[],
    child_sets: &[],
    layout: &[Keyword("None")],
    invisible: false,
    scoped: false,
    editable_property: None,
    paste_adapters: TOKEN_ADAPTERS,
};

static BINARY_OPERATOR: KindSpec = KindSpec {
    kind: NodeKind::BinaryOperator,
    type_name: "PYTHON_BINARY_OPERATOR",
    categories: TOKEN_CATEGORIES,
    properties: &[PropertySpec {
        name: "operator",
        default: PropertyDefault::Text("+"),
    }],
    child_sets: &[],
    layout: &[Property("operator")],
    invisible: false,
    scoped: false,
    editable_property: None,
    paste_adapters: TOKEN_ADAPTERS,
};

static CALL_VARIABLE: KindSpec = KindSpec {
    kind: NodeKind::CallVariable,
    type_name: "PYTHON_CALL_VARIABLE",
    categories: TOKEN_CATEGORIES,
    properties: &[PropertySpec {
        name: "identifier",
        default: PropertyDefault::Text(""),
    }],
    child_sets: &[ChildSetSpec::new("arguments", Many, PythonFunctionArgument)],
    layout: &[Property("identifier"), ChildSet("arguments", TreeBrackets)],
    invisible: false,
    scoped: false,
    editable_property: Some("identifier"),
    paste_adapters: TOKEN_ADAPTERS,
};

static CALL_MEMBER: KindSpec = KindSpec {
    kind: NodeKind::CallMember,
    type_name: "PYTHON_CALL_MEMBER",
    categories: TOKEN_CATEGORIES,
    properties: &[PropertySpec {
        name: "member",
        default: PropertyDefault::Text(""),
    }],
    child_sets: &[
        ChildSetSpec::new("object", Single, PythonExpressionToken),
        ChildSetSpec::new("arguments", Many, PythonFunctionArgument),
    ],
    layout: &[
        ChildSet("object", Breadcrumbs),
        Property("member"),
        ChildSet("arguments", TreeBrackets),
    ],
    invisible: false,
    scoped: false,
    editable_property: Some("member"),
    paste_adapters: TOKEN_ADAPTERS,
};

static LIST: KindSpec = KindSpec {
    kind: NodeKind::List,
    type_name: "PYTHON_LIST",
    categories: TOKEN_CATEGORIES,
    properties: &[],
    child_sets: &[ChildSetSpec::new("elements", Many, PythonExpression)],
    layout: &[ChildSet("elements", TreeBrackets)],
    invisible: false,
    scoped: false,
    editable_property: None,
    paste_adapters: TOKEN_ADAPTERS,
};

static ASSIGNMENT: KindSpec = KindSpec {
    kind: NodeKind::Assignment,
    type_name: "PYTHON_ASSIGNMENT",
    categories: &[PythonStatementContents],
    properties: &[],
    child_sets: &[
        ChildSetSpec::new("left", Many, PythonAssignable),
        ChildSetSpec::new("right", Single, PythonExpression).min(1),
    ],
    layout: &[ChildSet("left", Token), Keyword("="), ChildSet("right", AttachRight)],
    invisible: false,
    scoped: false,
    editable_property: None,
    paste_adapters: &[],
};

static IF: KindSpec = KindSpec {
    kind: NodeKind::If,
    type_name: "PYTHON_IF",
    categories: &[PythonStatementContents],
    properties: &[],
    child_sets: &[
        ChildSetSpec::new("condition", Immutable, PythonExpression).min(1),
        ChildSetSpec::new("trueblock", Many, PythonStatement).min(1),
        ChildSetSpec::new("elseblocks", Many, PythonElseBlock),
    ],
    layout: &[
        Keyword("if"),
        ChildSet("condition", AttachRight),
        ChildSet("trueblock", Block { end_cursor: false }),
        ChildSet("elseblocks", Stack),
    ],
    invisible: false,
    scoped: false,
    editable_property: None,
    paste_adapters: &[(NodeKind::Statement, wrap_in_statement)],
};

static ELIF: KindSpec = KindSpec {
    kind: NodeKind::Elif,
    type_name: "PYTHON_ELIF",
    categories: &[PythonElseBlock],
    properties: &[],
    child_sets: &[
        ChildSetSpec::new("condition", Immutable, PythonExpression).min(1),
        ChildSetSpec::new("block", Many, PythonStatement).min(1),
    ],
    layout: &[Keyword("elif"), ChildSet("condition", AttachRight), STATEMENT_BLOCK],
    invisible: false,
    scoped: false,
    editable_property: None,
    paste_adapters: &[(NodeKind::If, elif_to_if)],
};

static ELSE: KindSpec = KindSpec {
    kind: NodeKind::Else,
    type_name: "PYTHON_ELSE",
    categories: &[PythonElseBlock],
    properties: &[],
    child_sets: &[ChildSetSpec::new("block", Many, PythonStatement).min(1)],
    layout: &[Keyword("else"), STATEMENT_BLOCK],
    invisible: false,
    scoped: false,
    editable_property: None,
    paste_adapters: &[],
};

static FOR: KindSpec = KindSpec {
    kind: NodeKind::For,
    type_name: "PYTHON_FOR",
    categories: &[PythonStatementContents],
    properties: &[],
    child_sets: &[
        ChildSetSpec::new("target", Single, PythonLoopVariable),
        ChildSetSpec::new("iterable", Immutable, PythonExpression).min(1),
        ChildSetSpec::new("block", Many, PythonStatement).min(1),
    ],
    layout: &[
        Keyword("for"),
        ChildSet("target", Token),
        Keyword("in"),
        ChildSet("iterable", AttachRight),
        STATEMENT_BLOCK,
    ],
    invisible: false,
    scoped: false,
    editable_property: None,
    paste_adapters: &[],
};

static WHILE: KindSpec = KindSpec {
    kind: NodeKind::While,
    type_name: "PYTHON_WHILE",
    categories: &[PythonStatementContents],
    properties: &[],
    child_sets: &[
        ChildSetSpec::new("condition", Immutable, PythonExpression).min(1),
        ChildSetSpec::new("block", Many, PythonStatement).min(1),
    ],
    layout: &[Keyword("while"), ChildSet("condition", AttachRight), STATEMENT_BLOCK],
    invisible: false,
    scoped: false,
    editable_property: None,
    paste_adapters: &[],
};

static FUNCTION_DECLARATION: KindSpec = KindSpec {
    kind: NodeKind::FunctionDeclaration,
    type_name: "PYTHON_FUNCTION_DECLARATION",
    categories: &[PythonStatementContents],
    properties: &[],
    child_sets: &[
        ChildSetSpec::new("identifier", Single, PythonFunctionName).in_outer_scope(),
        ChildSetSpec::new("params", Many, PythonFunctionArgumentDeclaration),
        ChildSetSpec::new("body", Many, PythonStatement).min(1),
    ],
    layout: &[
        Keyword("def"),
        ChildSet("identifier", Token),
        ChildSet("params", TreeBrackets),
        ChildSet("body", Block { end_cursor: false }),
    ],
    invisible: false,
    scoped: true,
    editable_property: None,
    paste_adapters: &[],
};

static RETURN: KindSpec = KindSpec {
    kind: NodeKind::Return,
    type_name: "PYTHON_RETURN",
    categories: &[PythonStatementContents],
    properties: &[],
    child_sets: &[ChildSetSpec::new("value", Single, PythonExpression).min(1)],
    layout: &[Keyword("return"), ChildSet("value", AttachRight)],
    invisible: false,
    scoped: false,
    editable_property: None,
    paste_adapters: &[],
};

pub fn spec(kind: NodeKind) -> &'static KindSpec {
    match kind {
        NodeKind::File => &FILE,
        NodeKind::Statement => &STATEMENT,
        NodeKind::Expression => &EXPRESSION,
        NodeKind::Argument => &ARGUMENT,
        NodeKind::Identifier => &IDENTIFIER,
        NodeKind::StringLiteral => &STRING_LITERAL,
        NodeKind::NumericLiteral => &NUMERIC_LITERAL,
        NodeKind::BoolLiteral => &BOOL_LITERAL,
        NodeKind::NoneLiteral => &NONE_LITERAL,
        NodeKind::BinaryOperator => &BINARY_OPERATOR,
        NodeKind::CallVariable => &CALL_VARIABLE,
        NodeKind::CallMember => &CALL_MEMBER,
        NodeKind::List => &LIST,
        NodeKind::Assignment => &ASSIGNMENT,
        NodeKind::If => &IF,
        NodeKind::Elif => &ELIF,
        NodeKind::Else => &ELSE,
        NodeKind::For => &FOR,
        NodeKind::While => &WHILE,
        NodeKind::FunctionDeclaration => &FUNCTION_DECLARATION,
        NodeKind::Return => &RETURN,
    }
}

/// Every kind that belongs to `category`.
pub fn kinds_in_category(category: NodeCategory) -> Vec<NodeKind> {
    NodeKind::ALL
        .iter()
        .copied()
        .filter(|kind| kind.is_in_category(category))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_names_declared_child_sets() {
        for kind in NodeKind::ALL {
            let spec = spec(kind);
            for component in spec.layout {
                if let ChildSet(name, _) = component {
                    assert!(spec.child_set_index(name).is_some(), "{kind}: {name}");
                }
            }
            assert_eq!(spec.layout.iter().filter(|c| matches!(c, ChildSet(..))).count(), spec.child_sets.len());
        }
    }

    #[test]
    fn test_invisible_kinds_have_one_child_set() {
        for kind in NodeKind::ALL.iter().filter(|k| k.is_invisible()) {
            assert_eq!(spec(*kind).child_sets.len(), 1);
        }
    }

    #[test]
    fn test_every_category_has_members() {
        for category in NodeCategory::ALL {
            assert!(!kinds_in_category(category).is_empty(), "{category:?}");
        }
    }

    #[test]
    fn test_function_name_resolves_in_outer_scope() {
        let slot = FUNCTION_DECLARATION.child_sets[0];
        assert!(slot.outer_scope);
        assert!(!FUNCTION_DECLARATION.child_sets[1].outer_scope);
    }
}
