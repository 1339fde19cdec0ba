use super::{load_session, resolve};
use crate::config::Config;
use anyhow::Result;
use blockcode_language::{Document, NodeId};
use clap::Args;
use colored::Colorize;
use serde_json::Value;

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Serialized document to inspect
    pub path: String,

    /// Also list the names visible in the global scope
    #[arg(long)]
    pub scope: bool,
}

/// One row of the printed tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeLine {
    pub depth: usize,
    pub text: String,
    /// Reason the node is invalid.
    pub invalid: Option<String>,
}

pub fn inspect(args: InspectArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let session = load_session(&resolve(cwd, &args.path), &config)?;
    let Some(root) = session.root() else {
        return Ok(());
    };

    let mut invalid_count = 0;
    for line in describe_tree(session.document(), root) {
        let indent = "  ".repeat(line.depth);
        match &line.invalid {
            Some(reason) => {
                invalid_count += 1;
                println!("{}{} {}", indent, line.text.red(), format!("({})", reason).dimmed());
            }
            None => println!("{}{}", indent, line.text),
        }
    }

    if args.scope {
        println!();
        println!("{}", "Global scope".bright_blue().bold());
        for (name, entry) in session.all_in_scope_variables(root) {
            let kind = entry
                .builtin
                .as_ref()
                .or_else(|| entry.declarers.values().next())
                .map(|metadata| format!("{:?}", metadata.kind))
                .unwrap_or_default();
            println!("  {} {}", name, kind.dimmed());
        }
    }

    println!();
    if invalid_count == 0 {
        println!("{} {} nodes, all valid", "✓".green(), session.document().descendants(root).len());
    } else {
        println!("{} {} invalid nodes", "✗".red(), invalid_count);
    }
    Ok(())
}

/// Nodes in document order with their categories, properties and child-set headers.
pub fn describe_tree(doc: &Document, root: NodeId) -> Vec<TreeLine> {
    let mut lines = Vec::new();
    describe_node(doc, root, 0, &mut lines);
    lines
}

fn describe_node(doc: &Document, node: NodeId, depth: usize, lines: &mut Vec<TreeLine>) {
    let n = &doc[node];
    let mut text = n.type_name().to_string();
    let categories = n.kind().spec().categories;
    if !categories.is_empty() {
        let names: Vec<String> = categories.iter().map(|c| format!("{:?}", c)).collect();
        text.push_str(&format!(" [{}]", names.join(", ")));
    }
    for (name, value) in n.properties() {
        text.push_str(&format!(" {}={}", name, property_text(value)));
    }
    lines.push(TreeLine {
        depth,
        text,
        invalid: (!n.is_valid()).then(|| n.validity().reason.clone()),
    });

    for set in n.child_sets() {
        lines.push(TreeLine {
            depth: depth + 1,
            text: format!(".{}", set.name()),
            invalid: None,
        });
        for child in set.children() {
            describe_node(doc, *child, depth + 2, lines);
        }
    }
}

fn property_text(value: &Value) -> String {
    match value {
        Value::String(s) => format!("{:?}", s),
        other => other.to_string(),
    }
}
