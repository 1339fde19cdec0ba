use blockcode_editor::{Layout, LayoutMetrics, MultiselectHighlighter, NodeCursor, NodeSelection};
use blockcode_language::python::builders::*;
use blockcode_language::{Document, NodeId};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// A file of `count` functions, each printing a sum.
fn many_functions(doc: &mut Document, count: usize) -> NodeId {
    let mut lines = Vec::new();
    for index in 0..count {
        let a = identifier(doc, "a");
        let plus = binary_operator(doc, "+");
        let one = numeric_literal(doc, "1");
        let arg = argument(doc, &[a, plus, one]);
        let call = call_variable(doc, "print", &[arg]);
        let body_line = expression_statement(doc, &[call]);
        let func = function_declaration(doc, &format!("f{index}"), &["a"], &[body_line]);
        lines.push(statement(doc, Some(func)));
    }
    file(doc, &lines)
}

fn layout_large_file(c: &mut Criterion) {
    let mut doc = Document::new();
    let root = many_functions(&mut doc, 200);
    let metrics = LayoutMetrics::default();

    c.bench_function("layout_large_file", |b| {
        b.iter(|| Layout::compute(black_box(&doc), root, &metrics))
    });
}

fn walk_cursor_through_file(c: &mut Criterion) {
    let mut selection = NodeSelection::default();
    let doc = selection.session_mut().document_mut();
    let root = many_functions(doc, 50);
    let serialized = selection.session().document().serialize(root);
    selection.load(&serialized).unwrap();
    let stops: usize = selection.cursor_map().lines().iter().map(|line| line.entries.len()).sum();

    c.bench_function("walk_cursor_through_file", |b| {
        b.iter(|| {
            for _ in 0..stops {
                selection.move_cursor_right(false);
            }
            selection.move_cursor_to_start_of_line(false);
            for _ in 0..selection.cursor_map().line_count() {
                selection.move_cursor_up(false);
            }
        })
    });
}

fn highlight_whole_file(c: &mut Criterion) {
    let mut doc = Document::new();
    let root = many_functions(&mut doc, 200);
    let Some(body) = doc.child_set_ref(root, "body") else {
        return;
    };
    let start = NodeCursor::new(body, 0);
    let end = NodeCursor::new(body, doc.children(body).len());

    c.bench_function("highlight_whole_file", |b| {
        b.iter(|| MultiselectHighlighter::highlight(black_box(&doc), start, end))
    });
}

criterion_group!(benches, layout_large_file, walk_cursor_through_file, highlight_whole_file);
criterion_main!(benches);
