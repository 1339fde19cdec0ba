//! Constructors for detached Python nodes, blank fills and the catalog's adapters.
//!
//! Everything here works on detached subtrees and fires no events.

use crate::category::NodeCategory;
use crate::kind::NodeKind;
use crate::tree::{Document, NodeId};
use serde_json::Value;

/// Create a node and top up every slot to its minimum with blank fills.
pub fn new_node(doc: &mut Document, kind: NodeKind) -> NodeId {
    let id = doc.create(kind);
    for spec in kind.spec().child_sets {
        for _ in 0..spec.min_children {
            match blank_fill(doc, spec.category) {
                Some(fill) => doc.push_child(id, spec.name, fill),
                None => break,
            }
        }
    }
    id
}

/// The placeholder node a category uses for an empty required slot.
pub fn blank_fill(doc: &mut Document, category: NodeCategory) -> Option<NodeId> {
    let kind = match category {
        NodeCategory::PythonStatement => NodeKind::Statement,
        NodeCategory::PythonExpression
        | NodeCategory::PythonStatementContents
        | NodeCategory::PythonFunctionArgumentValue => NodeKind::Expression,
        NodeCategory::PythonFunctionArgument => NodeKind::Argument,
        NodeCategory::PythonElseBlock => NodeKind::Else,
        _ => return None,
    };
    Some(new_node(doc, kind))
}

pub fn file(doc: &mut Document, statements: &[NodeId]) -> NodeId {
    let id = doc.create(NodeKind::File);
    for statement in statements {
        doc.push_child(id, "body", *statement);
    }
    id
}

pub fn statement(doc: &mut Document, contents: Option<NodeId>) -> NodeId {
    let id = doc.create(NodeKind::Statement);
    if let Some(contents) = contents {
        doc.push_child(id, "statement", contents);
    }
    id
}

pub fn expression(doc: &mut Document, tokens: &[NodeId]) -> NodeId {
    let id = doc.create(NodeKind::Expression);
    for token in tokens {
        doc.push_child(id, "tokens", *token);
    }
    id
}

/// A statement holding an expression of `tokens`.
pub fn expression_statement(doc: &mut Document, tokens: &[NodeId]) -> NodeId {
    let expr = expression(doc, tokens);
    statement(doc, Some(expr))
}

/// An argument holding an expression of `tokens`.
pub fn argument(doc: &mut Document, tokens: &[NodeId]) -> NodeId {
    let expr = expression(doc, tokens);
    let id = doc.create(NodeKind::Argument);
    doc.push_child(id, "argument", expr);
    id
}

pub fn identifier(doc: &mut Document, name: &str) -> NodeId {
    let id = doc.create(NodeKind::Identifier);
    doc.set_property_raw(id, "identifier", Value::from(name));
    id
}

pub fn string_literal(doc: &mut Document, value: &str) -> NodeId {
    let id = doc.create(NodeKind::StringLiteral);
    doc.set_property_raw(id, "value", Value::from(value));
    id
}

pub fn numeric_literal(doc: &mut Document, value: &str) -> NodeId {
    let id = doc.create(NodeKind::NumericLiteral);
    doc.set_property_raw(id, "value", Value::from(value));
    id
}

pub fn bool_literal(doc: &mut Document, value: bool) -> NodeId {
    let id = doc.create(NodeKind::BoolLiteral);
    doc.set_property_raw(id, "value", Value::from(value));
    id
}

pub fn none_literal(doc: &mut Document) -> NodeId {
    doc.create(NodeKind::NoneLiteral)
}

pub fn binary_operator(doc: &mut Document, operator: &str) -> NodeId {
    let id = doc.create(NodeKind::BinaryOperator);
    doc.set_property_raw(id, "operator", Value::from(operator));
    id
}

/// `name(args...)` where each argument is a `PY_ARG` node.
pub fn call_variable(doc: &mut Document, name: &str, arguments: &[NodeId]) -> NodeId {
    let id = doc.create(NodeKind::CallVariable);
    doc.set_property_raw(id, "identifier", Value::from(name));
    for arg in arguments {
        doc.push_child(id, "arguments", *arg);
    }
    id
}

pub fn call_member(doc: &mut Document, object: NodeId, member: &str, arguments: &[NodeId]) -> NodeId {
    let id = doc.create(NodeKind::CallMember);
    doc.set_property_raw(id, "member", Value::from(member));
    doc.push_child(id, "object", object);
    for arg in arguments {
        doc.push_child(id, "arguments", *arg);
    }
    id
}

pub fn list(doc: &mut Document, elements: &[NodeId]) -> NodeId {
    let id = doc.create(NodeKind::List);
    for element in elements {
        doc.push_child(id, "elements", *element);
    }
    id
}

pub fn assignment(doc: &mut Document, targets: &[NodeId], value: NodeId) -> NodeId {
    let id = doc.create(NodeKind::Assignment);
    for target in targets {
        doc.push_child(id, "left", *target);
    }
    doc.push_child(id, "right", value);
    id
}

/// `if <condition>:` with the given body; an empty body gets one blank statement.
pub fn if_statement(doc: &mut Document, condition: NodeId, body: &[NodeId]) -> NodeId {
    let id = doc.create(NodeKind::If);
    doc.push_child(id, "condition", condition);
    fill_block(doc, id, "trueblock", body);
    id
}

pub fn elif_block(doc: &mut Document, condition: NodeId, body: &[NodeId]) -> NodeId {
    let id = doc.create(NodeKind::Elif);
    doc.push_child(id, "condition", condition);
    fill_block(doc, id, "block", body);
    id
}

pub fn else_block(doc: &mut Document, body: &[NodeId]) -> NodeId {
    let id = doc.create(NodeKind::Else);
    fill_block(doc, id, "block", body);
    id
}

pub fn for_loop(doc: &mut Document, target: NodeId, iterable: NodeId, body: &[NodeId]) -> NodeId {
    let id = doc.create(NodeKind::For);
    doc.push_child(id, "target", target);
    doc.push_child(id, "iterable", iterable);
    fill_block(doc, id, "block", body);
    id
}

pub fn while_loop(doc: &mut Document, condition: NodeId, body: &[NodeId]) -> NodeId {
    let id = doc.create(NodeKind::While);
    doc.push_child(id, "condition", condition);
    fill_block(doc, id, "block", body);
    id
}

pub fn function_declaration(doc: &mut Document, name: &str, params: &[&str], body: &[NodeId]) -> NodeId {
    let id = doc.create(NodeKind::FunctionDeclaration);
    let name = identifier(doc, name);
    doc.push_child(id, "identifier", name);
    for param in params {
        let param = identifier(doc, param);
        doc.push_child(id, "params", param);
    }
    fill_block(doc, id, "body", body);
    id
}

pub fn return_statement(doc: &mut Document, value: Option<NodeId>) -> NodeId {
    let id = doc.create(NodeKind::Return);
    let value = match value {
        Some(value) => value,
        None => expression(doc, &[]),
    };
    doc.push_child(id, "value", value);
    id
}

fn fill_block(doc: &mut Document, parent: NodeId, name: &str, body: &[NodeId]) {
    if body.is_empty() {
        let blank = statement(doc, None);
        doc.push_child(parent, name, blank);
    }
    for child in body {
        doc.push_child(parent, name, *child);
    }
}

pub(crate) fn wrap_in_expression(doc: &mut Document, node: NodeId) -> NodeId {
    expression(doc, &[node])
}

pub(crate) fn wrap_in_statement(doc: &mut Document, node: NodeId) -> NodeId {
    statement(doc, Some(node))
}

pub(crate) fn wrap_in_argument(doc: &mut Document, node: NodeId) -> NodeId {
    let id = doc.create(NodeKind::Argument);
    doc.push_child(id, "argument", node);
    id
}

pub(crate) fn statement_to_elif(doc: &mut Document, node: NodeId) -> NodeId {
    statements_to_elif(doc, &[node])
}

/// Turn an `elif` into an `if` carrying its condition and body.
pub(crate) fn elif_to_if(doc: &mut Document, node: NodeId) -> NodeId {
    let condition = doc
        .child_set_ref(node, "condition")
        .map(|cs| doc.take_children(cs))
        .unwrap_or_default();
    let body = doc
        .child_set_ref(node, "block")
        .map(|cs| doc.take_children(cs))
        .unwrap_or_default();
    let condition = match condition.first() {
        Some(condition) => *condition,
        None => expression(doc, &[]),
    };
    if_statement(doc, condition, &body)
}

/// Fragment adapter: expression tokens become one expression.
pub(crate) fn tokens_to_expression(doc: &mut Document, nodes: &[NodeId]) -> NodeId {
    expression(doc, nodes)
}

/// Fragment adapter: statements become the body of a new `elif`.
pub(crate) fn statements_to_elif(doc: &mut Document, nodes: &[NodeId]) -> NodeId {
    let condition = expression(doc, &[]);
    elif_block(doc, condition, nodes)
}

/// Fragment adapter: each expression becomes a statement in a new `elif`.
pub(crate) fn expressions_to_elif(doc: &mut Document, nodes: &[NodeId]) -> NodeId {
    let statements: Vec<NodeId> = nodes.iter().map(|node| statement(doc, Some(*node))).collect();
    statements_to_elif(doc, &statements)
}

/// Fragment adapter: a run of `elif`/`else` blocks becomes an `if` chain.
///
/// The first block supplies the `if`; the rest stay as its else blocks.
pub(crate) fn else_blocks_to_if(doc: &mut Document, nodes: &[NodeId]) -> NodeId {
    let Some((first, remainder)) = nodes.split_first() else {
        let condition = expression(doc, &[]);
        return if_statement(doc, condition, &[]);
    };
    let (head, remainder) = match doc.kind(*first) {
        NodeKind::Elif => (elif_to_if(doc, *first), remainder),
        NodeKind::Else => {
            let body = doc
                .child_set_ref(*first, "block")
                .map(|cs| doc.take_children(cs))
                .unwrap_or_default();
            let condition = expression(doc, &[]);
            (if_statement(doc, condition, &body), remainder)
        }
        _ => {
            let condition = expression(doc, &[]);
            (if_statement(doc, condition, &[]), nodes)
        }
    };
    for node in remainder {
        doc.push_child(head, "elseblocks", *node);
    }
    head
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_node_fills_minimums() {
        let mut doc = Document::new();
        let node = new_node(&mut doc, NodeKind::FunctionDeclaration);
        let body = doc.child_set_ref(node, "body").unwrap();
        let identifier = doc.child_set_ref(node, "identifier").unwrap();
        assert_eq!(doc.children(body).len(), 1);
        assert!(doc.children(identifier).is_empty());
    }

    #[test]
    fn test_blank_fill_per_category() {
        let mut doc = Document::new();
        let statement = blank_fill(&mut doc, NodeCategory::PythonStatement).unwrap();
        let argument = blank_fill(&mut doc, NodeCategory::PythonFunctionArgument).unwrap();
        assert_eq!(doc.kind(statement), NodeKind::Statement);
        assert_eq!(doc.kind(argument), NodeKind::Argument);
        assert!(blank_fill(&mut doc, NodeCategory::PythonAssignable).is_none());
    }

    #[test]
    fn test_elif_to_if_moves_children() {
        let mut doc = Document::new();
        let flag = identifier(&mut doc, "ready");
        let condition = expression(&mut doc, &[flag]);
        let call = call_variable(&mut doc, "go", &[]);
        let body = expression_statement(&mut doc, &[call]);
        let elif = elif_block(&mut doc, condition, &[body]);

        let converted = elif_to_if(&mut doc, elif);

        assert_eq!(doc.kind(converted), NodeKind::If);
        let cond = doc.child_set_ref(converted, "condition").unwrap();
        let block = doc.child_set_ref(converted, "trueblock").unwrap();
        assert_eq!(doc.children(cond), &[condition]);
        assert_eq!(doc.children(block), &[body]);
        assert_eq!(doc.parent(body).map(|p| p.node), Some(converted));
    }

    #[test]
    fn test_else_blocks_to_if_keeps_remainder() {
        let mut doc = Document::new();
        let cond = expression(&mut doc, &[]);
        let elif = elif_block(&mut doc, cond, &[]);
        let otherwise = else_block(&mut doc, &[]);

        let head = else_blocks_to_if(&mut doc, &[elif, otherwise]);

        let elseblocks = doc.child_set_ref(head, "elseblocks").unwrap();
        assert_eq!(doc.children(elseblocks), &[otherwise]);
    }
}
