//! Python source generation from a document subtree.

use crate::kind::NodeKind;
use crate::python::behaviour::is_empty;
use crate::tree::{Document, NodeId};
use serde_json::Value;

/// Buffer with an indentation level, written line by line.
pub struct CodegenContext {
    buffer: String,
    indent_level: usize,
    indent: String,
}

impl CodegenContext {
    pub fn new(indent: &str) -> Self {
        Self {
            buffer: String::new(),
            indent_level: 0,
            indent: indent.to_string(),
        }
    }

    pub fn add_line(&mut self, text: &str) {
        for _ in 0..self.indent_level {
            self.buffer.push_str(&self.indent);
        }
        self.buffer.push_str(text);
        self.buffer.push('\n');
    }

    pub fn add_blank_line(&mut self) {
        self.buffer.push('\n');
    }

    pub fn indent(&mut self) {
        self.indent_level += 1;
    }

    pub fn dedent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }

    pub fn get_output(self) -> String {
        self.buffer
    }
}

/// Generate Python for a file, a statement or any other subtree.
pub fn generate_python(doc: &Document, root: NodeId, indent: &str) -> String {
    let mut ctx = CodegenContext::new(indent);
    match doc.kind(root) {
        NodeKind::File => compile_statements(doc, doc.children_by_name(root, "body"), &mut ctx, false),
        NodeKind::Statement | NodeKind::Else | NodeKind::Elif => compile_statement_like(doc, root, &mut ctx),
        kind if kind.spec().categories.contains(&crate::category::NodeCategory::PythonStatementContents) => {
            compile_statement_like(doc, root, &mut ctx)
        }
        _ => ctx.add_line(&expression_source(doc, root)),
    }
    ctx.get_output()
}

fn compile_statements(doc: &Document, statements: &[NodeId], ctx: &mut CodegenContext, is_block: bool) {
    if is_block && statements.iter().all(|statement| is_empty(doc, *statement)) {
        ctx.add_line("pass");
        return;
    }
    for statement in statements {
        compile_statement_like(doc, *statement, ctx);
    }
}

fn compile_block(doc: &Document, owner: NodeId, name: &str, ctx: &mut CodegenContext) {
    ctx.indent();
    compile_statements(doc, doc.children_by_name(owner, name), ctx, true);
    ctx.dedent();
}

fn compile_statement_like(doc: &Document, node: NodeId, ctx: &mut CodegenContext) {
    match doc.kind(node) {
        NodeKind::Statement => match doc.children_by_name(node, "statement").first() {
            Some(contents) => compile_statement_like(doc, *contents, ctx),
            None => ctx.add_blank_line(),
        },
        NodeKind::Expression if is_empty(doc, node) => ctx.add_blank_line(),
        NodeKind::Assignment => {
            let targets: Vec<String> = doc
                .children_by_name(node, "left")
                .iter()
                .map(|target| expression_source(doc, *target))
                .collect();
            ctx.add_line(&format!("{} = {}", targets.join(", "), single_source(doc, node, "right")));
        }
        NodeKind::If => {
            ctx.add_line(&format!("if {}:", single_source(doc, node, "condition")));
            compile_block(doc, node, "trueblock", ctx);
            for block in doc.children_by_name(node, "elseblocks") {
                compile_statement_like(doc, *block, ctx);
            }
        }
        NodeKind::Elif => {
            ctx.add_line(&format!("elif {}:", single_source(doc, node, "condition")));
            compile_block(doc, node, "block", ctx);
        }
        NodeKind::Else => {
            ctx.add_line("else:");
            compile_block(doc, node, "block", ctx);
        }
        NodeKind::For => {
            ctx.add_line(&format!(
                "for {} in {}:",
                single_source(doc, node, "target"),
                single_source(doc, node, "iterable")
            ));
            compile_block(doc, node, "block", ctx);
        }
        NodeKind::While => {
            ctx.add_line(&format!("while {}:", single_source(doc, node, "condition")));
            compile_block(doc, node, "block", ctx);
        }
        NodeKind::FunctionDeclaration => {
            let params: Vec<String> = doc
                .children_by_name(node, "params")
                .iter()
                .map(|param| expression_source(doc, *param))
                .collect();
            ctx.add_line(&format!(
                "def {}({}):",
                single_source(doc, node, "identifier"),
                params.join(", ")
            ));
            compile_block(doc, node, "body", ctx);
        }
        NodeKind::Return => {
            let value = single_source(doc, node, "value");
            if value.is_empty() {
                ctx.add_line("return");
            } else {
                ctx.add_line(&format!("return {value}"));
            }
        }
        _ => ctx.add_line(&expression_source(doc, node)),
    }
}

fn single_source(doc: &Document, node: NodeId, name: &str) -> String {
    doc.children_by_name(node, name)
        .first()
        .map(|child| expression_source(doc, *child))
        .unwrap_or_default()
}

fn joined_source(doc: &Document, node: NodeId, name: &str, separator: &str) -> String {
    doc.children_by_name(node, name)
        .iter()
        .map(|child| expression_source(doc, *child))
        .collect::<Vec<_>>()
        .join(separator)
}

/// Inline source for expression-level nodes.
pub fn expression_source(doc: &Document, node: NodeId) -> String {
    let n = &doc[node];
    match n.kind() {
        NodeKind::Expression => joined_source(doc, node, "tokens", " "),
        NodeKind::Argument => single_source(doc, node, "argument"),
        NodeKind::Identifier => n.property_str("identifier").to_string(),
        NodeKind::StringLiteral => quote_string(n.property_str("value")),
        NodeKind::NumericLiteral => n.property_str("value").to_string(),
        NodeKind::BoolLiteral => match n.property("value") {
            Some(Value::Bool(false)) => "False".to_string(),
            _ => "True".to_string(),
        },
        NodeKind::NoneLiteral => "None".to_string(),
        NodeKind::BinaryOperator => n.property_str("operator").to_string(),
        NodeKind::CallVariable => format!(
            "{}({})",
            n.property_str("identifier"),
            joined_source(doc, node, "arguments", ", ")
        ),
        NodeKind::CallMember => format!(
            "{}.{}({})",
            single_source(doc, node, "object"),
            n.property_str("member"),
            joined_source(doc, node, "arguments", ", ")
        ),
        NodeKind::List => format!("[{}]", joined_source(doc, node, "elements", ", ")),
        NodeKind::Statement => single_source(doc, node, "statement"),
        _ => {
            let mut ctx = CodegenContext::new("    ");
            compile_statement_like(doc, node, &mut ctx);
            ctx.get_output().trim_end().to_string()
        }
    }
}

fn quote_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}
