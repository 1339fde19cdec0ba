//! Per-kind behaviour of the Python catalog.
//!
//! Everything here is a pure query over the [`Document`]. The session turns the answers into
//! tree edits, scope updates and `SET_VALIDITY` events.

use crate::adapters::is_adaptable_to_paste_destination;
use crate::kind::NodeKind;
use crate::scope::{VariableKind, VariableMetadata};
use crate::tree::{ChildSetRef, Document, NodeId, Validity};

/// Where a node resolves names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeLookup {
    /// The nearest scope, which is the node's own when it is scoped.
    Nearest,
    /// The scope enclosing the node, skipping its own.
    Enclosing,
}

/// A name a node declares.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub lookup: ScopeLookup,
    pub name: String,
    pub metadata: VariableMetadata,
}

/// What `clean` should do after something below a node was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanAction {
    Nothing,
    RemoveChild(ChildSetRef, usize),
    CleanParent(NodeId),
}

pub fn is_empty(doc: &Document, node: NodeId) -> bool {
    match doc.kind(node) {
        NodeKind::Statement | NodeKind::Expression | NodeKind::Argument => {
            doc.child_set(ChildSetRef::new(node, 0)).map_or(true, |cs| cs.is_empty())
        }
        _ => false,
    }
}

fn is_empty_expression(doc: &Document, node: NodeId) -> bool {
    doc.kind(node) == NodeKind::Expression && is_empty(doc, node)
}

/// Statements and arguments drop an emptied expression; an emptied expression asks its parent.
pub fn clean_action(doc: &Document, node: NodeId) -> CleanAction {
    match doc.kind(node) {
        NodeKind::Statement | NodeKind::Argument => {
            let slot = ChildSetRef::new(node, 0);
            match doc.children(slot).first() {
                Some(child) if is_empty_expression(doc, *child) => CleanAction::RemoveChild(slot, 0),
                _ => CleanAction::Nothing,
            }
        }
        NodeKind::Expression if is_empty(doc, node) => match doc.parent(node) {
            Some(parent) => CleanAction::CleanParent(parent.node),
            None => CleanAction::Nothing,
        },
        _ => CleanAction::Nothing,
    }
}

/// Nodes spliced into the deleted node's place on single-node delete.
pub fn children_to_keep_on_delete(doc: &Document, node: NodeId) -> Vec<NodeId> {
    match doc.kind(node) {
        NodeKind::CallMember => doc.children_by_name(node, "object").to_vec(),
        NodeKind::If => doc
            .children_by_name(node, "trueblock")
            .iter()
            .copied()
            .filter(|statement| !is_empty(doc, *statement))
            .collect(),
        _ => Vec::new(),
    }
}

/// Validity updates produced by validating `node`. The target is not always `node` itself:
/// an empty expression defers to its parent, and a parent may judge its condition slot.
pub fn validate_self(doc: &Document, node: NodeId) -> Vec<(NodeId, Validity)> {
    let mut updates = Vec::new();
    match doc.kind(node) {
        NodeKind::Expression => {
            let tokens = doc.children_by_name(node, "tokens");
            if tokens.is_empty() {
                if let Some(parent) = doc.parent(node) {
                    return validate_self(doc, parent.node);
                }
                return updates;
            }
            match check_token_sequence(doc, tokens) {
                None => updates.push((node, Validity::valid())),
                Some(blame) => updates.push((
                    node,
                    Validity::invalid("Unexpected token").in_child_set("tokens", blame.min(tokens.len() - 1)),
                )),
            }
        }
        NodeKind::Statement | NodeKind::Argument => {
            if let Some(child) = doc.children(ChildSetRef::new(node, 0)).first() {
                allow_empty(doc, *child, &mut updates);
            }
        }
        NodeKind::If | NodeKind::Elif => require_non_empty(doc, node, "condition", "If condition is required", &mut updates),
        NodeKind::While => require_non_empty(doc, node, "condition", "While condition is required", &mut updates),
        NodeKind::For => {
            updates.push((node, require_child(doc, node, "target", "Needs a variable name")));
            require_non_empty(
                doc,
                node,
                "iterable",
                "needs a sequence or iterable to loop over",
                &mut updates,
            );
        }
        NodeKind::FunctionDeclaration => {
            updates.push((node, require_child(doc, node, "identifier", "Needs a name for the function")));
        }
        NodeKind::CallMember => updates.push((node, require_child(doc, node, "object", "Needs object"))),
        NodeKind::Assignment => {
            updates.push((node, require_child(doc, node, "left", "Needs a variable to assign to")));
            require_non_empty(doc, node, "right", "Needs a value to assign", &mut updates);
        }
        NodeKind::Return => {
            if let Some(value) = doc.children_by_name(node, "value").first() {
                allow_empty(doc, *value, &mut updates);
            }
            let in_function = doc
                .ancestors(node)
                .any(|ancestor| doc.kind(ancestor) == NodeKind::FunctionDeclaration);
            let validity = if in_function {
                Validity::valid()
            } else {
                Validity::invalid("return can only be used inside a function")
            };
            updates.push((node, validity));
        }
        NodeKind::Else => {
            let is_last = match doc.parent(node) {
                Some(parent) => doc.children(parent).last() == Some(&node),
                None => true,
            };
            let validity = if is_last {
                Validity::valid()
            } else {
                Validity::invalid("else must be the last block")
            };
            updates.push((node, validity));
        }
        _ => {}
    }
    updates
}

fn require_child(doc: &Document, node: NodeId, name: &str, reason: &str) -> Validity {
    if doc.children_by_name(node, name).is_empty() {
        let mut validity = Validity::invalid(reason);
        validity.child_set = Some(name.to_string());
        validity
    } else {
        Validity::valid()
    }
}

fn require_non_empty(doc: &Document, node: NodeId, name: &str, reason: &str, updates: &mut Vec<(NodeId, Validity)>) {
    if let Some(expr) = doc.children_by_name(node, name).first() {
        if is_empty_expression(doc, *expr) {
            updates.push((*expr, Validity::invalid(reason)));
        }
    }
}

fn allow_empty(doc: &Document, expr: NodeId, updates: &mut Vec<(NodeId, Validity)>) {
    if is_empty_expression(doc, expr) {
        updates.push((expr, Validity::valid()));
    }
}

/// Operands alternate with binary operators. `not` and unary minus may prefix an operand.
/// Returns the index of the first token that breaks the sequence.
fn check_token_sequence(doc: &Document, tokens: &[NodeId]) -> Option<usize> {
    let mut expect_operand = true;
    for (index, token) in tokens.iter().enumerate() {
        let is_operator = doc.kind(*token) == NodeKind::BinaryOperator;
        if expect_operand {
            if is_operator {
                let operator = doc[*token].property_str("operator");
                if operator != "not" && operator != "-" {
                    return Some(index);
                }
                continue;
            }
            expect_operand = false;
        } else {
            if !is_operator {
                return Some(index);
            }
            expect_operand = true;
        }
    }
    if expect_operand {
        Some(tokens.len())
    } else {
        None
    }
}

/// Names a node declares, in declaration order.
pub fn declarations(doc: &Document, node: NodeId) -> Vec<Declaration> {
    let identifier_names = |name: &str| -> Vec<String> {
        doc.children_by_name(node, name)
            .iter()
            .filter(|child| doc.kind(**child) == NodeKind::Identifier)
            .map(|child| doc[*child].property_str("identifier").to_string())
            .filter(|name| !name.is_empty())
            .collect()
    };
    let declare = |lookup, name: String, kind, documentation: &str| Declaration {
        lookup,
        name,
        metadata: VariableMetadata::new(kind, documentation),
    };

    match doc.kind(node) {
        NodeKind::Assignment => identifier_names("left")
            .into_iter()
            .map(|name| declare(ScopeLookup::Nearest, name, VariableKind::Variable, "Local variable"))
            .collect(),
        NodeKind::For => identifier_names("target")
            .into_iter()
            .map(|name| declare(ScopeLookup::Nearest, name, VariableKind::LoopVariable, "for-loop variable"))
            .collect(),
        NodeKind::FunctionDeclaration => {
            let mut declared: Vec<Declaration> = identifier_names("identifier")
                .into_iter()
                .map(|name| declare(ScopeLookup::Enclosing, name, VariableKind::Function, "Local function"))
                .collect();
            declared.extend(
                identifier_names("params")
                    .into_iter()
                    .map(|name| declare(ScopeLookup::Nearest, name, VariableKind::Parameter, "Function parameter")),
            );
            declared
        }
        _ => Vec::new(),
    }
}

/// The name a node watches for renames, and where it resolves.
pub fn watched_name(doc: &Document, node: NodeId) -> Option<(ScopeLookup, String)> {
    let n = &doc[node];
    let name = match n.kind() {
        NodeKind::Identifier | NodeKind::CallVariable => n.property_str("identifier"),
        _ => return None,
    };
    if name.is_empty() {
        return None;
    }
    let in_outer_slot = n
        .parent()
        .and_then(|parent| doc.child_set(parent))
        .is_some_and(|cs| cs.spec().outer_scope);
    let lookup = if in_outer_slot {
        ScopeLookup::Enclosing
    } else {
        ScopeLookup::Nearest
    };
    Some((lookup, name.to_string()))
}

/// Property rewritten when a watched name is renamed.
pub fn rename_property(kind: NodeKind) -> Option<&'static str> {
    match kind {
        NodeKind::Identifier | NodeKind::CallVariable => Some("identifier"),
        _ => None,
    }
}

/// First slot that can take `child` when wrapping: an empty slot it adapts to, or a slot whose
/// first child is an empty placeholder, searching into that placeholder.
pub fn wrap_insert_child_set(doc: &Document, node: NodeId, child: NodeKind) -> Option<ChildSetRef> {
    for cs in doc.child_set_refs(node) {
        let Some(set) = doc.child_set(cs) else {
            continue;
        };
        match set.leftmost() {
            None => {
                if is_adaptable_to_paste_destination(child, set.category()) {
                    return Some(cs);
                }
            }
            Some(first) if is_empty(doc, first) => {
                if is_adaptable_to_paste_destination(child, set.category()) {
                    return Some(cs);
                }
                if let Some(inner) = wrap_insert_child_set(doc, first, child) {
                    return Some(inner);
                }
            }
            Some(_) => {}
        }
    }
    None
}

/// A sanitized name that is also a legal Python identifier: empty names and names starting with a
/// digit get a leading underscore.
pub fn python_name(input: &str) -> String {
    let name = sanitize_identifier(input);
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{name}")
    } else {
        name
    }
}

/// Make typed text usable as a Python name: punctuation becomes word breaks, and every word after
/// the first is joined with an underscore and lowercased.
pub fn sanitize_identifier(input: &str) -> String {
    let spaced: String = input
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c.is_whitespace() { c } else { ' ' })
        .collect();
    if !spaced.contains(' ') {
        return spaced;
    }
    spaced
        .split(' ')
        .enumerate()
        .map(|(index, word)| {
            if index == 0 {
                word.to_string()
            } else {
                format!("_{}", word.to_lowercase())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::python::builders::*;

    #[test]
    fn test_clean_removes_empty_expression_from_statement() {
        let mut doc = Document::new();
        let statement = expression_statement(&mut doc, &[]);
        assert_eq!(
            clean_action(&doc, statement),
            CleanAction::RemoveChild(ChildSetRef::new(statement, 0), 0)
        );
        let expr = doc.children_by_name(statement, "statement")[0];
        assert_eq!(clean_action(&doc, expr), CleanAction::CleanParent(statement));
    }

    #[test]
    fn test_token_sequence_blame() {
        let mut doc = Document::new();
        let a = identifier(&mut doc, "a");
        let plus = binary_operator(&mut doc, "+");
        let expr = expression(&mut doc, &[a, plus]);

        let updates = validate_self(&doc, expr);
        assert_eq!(updates.len(), 1);
        let (target, validity) = &updates[0];
        assert_eq!(*target, expr);
        assert!(!validity.valid);
        assert_eq!(validity.reason, "Unexpected token");
        assert_eq!(validity.index, Some(1));
    }

    #[test]
    fn test_unary_prefix_is_valid() {
        let mut doc = Document::new();
        let not = binary_operator(&mut doc, "not");
        let flag = identifier(&mut doc, "done");
        let expr = expression(&mut doc, &[not, flag]);
        assert_eq!(validate_self(&doc, expr), vec![(expr, Validity::valid())]);
    }

    #[test]
    fn test_empty_condition_defers_to_if() {
        let mut doc = Document::new();
        let condition = expression(&mut doc, &[]);
        let node = if_statement(&mut doc, condition, &[]);

        let updates = validate_self(&doc, condition);
        assert_eq!(updates, vec![(condition, Validity::invalid("If condition is required"))]);
        assert!(validate_self(&doc, node).iter().all(|(target, _)| *target == condition));
    }

    #[test]
    fn test_function_needs_name() {
        let mut doc = Document::new();
        let node = new_node(&mut doc, NodeKind::FunctionDeclaration);
        let updates = validate_self(&doc, node);
        assert_eq!(updates[0].1.reason, "Needs a name for the function");
        assert_eq!(updates[0].1.child_set.as_deref(), Some("identifier"));
    }

    #[test]
    fn test_function_declares_name_outside_and_params_inside() {
        let mut doc = Document::new();
        let node = function_declaration(&mut doc, "area", &["w", "h"], &[]);
        let declared = declarations(&doc, node);
        let summary: Vec<_> = declared.iter().map(|d| (d.lookup, d.name.as_str())).collect();
        assert_eq!(
            summary,
            vec![
                (ScopeLookup::Enclosing, "area"),
                (ScopeLookup::Nearest, "w"),
                (ScopeLookup::Nearest, "h"),
            ]
        );

        let name = doc.children_by_name(node, "identifier")[0];
        assert_eq!(watched_name(&doc, name), Some((ScopeLookup::Enclosing, "area".to_string())));
    }

    #[test]
    fn test_if_keeps_non_empty_statements() {
        let mut doc = Document::new();
        let call = call_variable(&mut doc, "go", &[]);
        let body = expression_statement(&mut doc, &[call]);
        let blank = statement(&mut doc, None);
        let condition = expression(&mut doc, &[]);
        let node = if_statement(&mut doc, condition, &[body, blank]);
        assert_eq!(children_to_keep_on_delete(&doc, node), vec![body]);
    }

    #[test]
    fn test_wrap_insert_finds_empty_condition() {
        let mut doc = Document::new();
        let node = new_node(&mut doc, NodeKind::If);
        let target = wrap_insert_child_set(&doc, node, NodeKind::Identifier).unwrap();
        assert_eq!(target, ChildSetRef::new(node, 0));

        let blank = doc.children_by_name(node, "trueblock")[0];
        assert_eq!(
            wrap_insert_child_set(&doc, node, NodeKind::Assignment),
            Some(ChildSetRef::new(blank, 0))
        );
    }

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("total"), "total");
        assert_eq!(sanitize_identifier("Total Count"), "Total_count");
        assert_eq!(sanitize_identifier("a-b"), "a_b");
    }

    #[test]
    fn test_python_name_prefixes_invalid_starts() {
        assert_eq!(python_name("1x"), "_1x");
        assert_eq!(python_name(""), "_");
        assert_eq!(python_name("!"), "_");
        assert_eq!(python_name("total count"), "total_count");
    }
}
