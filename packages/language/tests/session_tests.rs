use blockcode_language::python::builders::*;
use blockcode_language::{
    ChildSetMutationKind, ChildSetRef, Document, EditingSession, NodeCategory, NodeId, NodeKind, NodeMutationKind,
    SaveError, SerializedNode, SessionOptions, Validity,
};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

fn hello_world_json() -> SerializedNode {
    serde_json::from_value(json!({
        "type": "PYTHON_FILE",
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

/// Load a file built from `build`, which returns the top-level statements.
fn load_built(session: &mut EditingSession, build: impl FnOnce(&mut Document) -> Vec<NodeId>) -> NodeId {
    let doc = session.document_mut();
    let statements = build(doc);
    let root = file(doc, &statements);
    let serialized = session.document().serialize(root);
    session.load(&serialized).unwrap()
}

#[test]
fn test_load_json_and_export() {
    let mut session = EditingSession::default();
    let root = session.load(&hello_world_json()).unwrap();

    assert_eq!(session.document().kind(root), NodeKind::File);
    assert_eq!(session.export_python().unwrap(), "print(\"Hello, World!\")\n");

    let saved = session.serialize_root().unwrap();
    assert_eq!(saved.node_type, "PYTHON_FILE");
    assert_eq!(saved.child_sets["body"][0].node_type, "PYTHON_STATEMENT");
}

#[test]
fn test_unknown_root_type_is_rejected() {
    let mut session = EditingSession::default();
    let serialized = SerializedNode {
        node_type: "NOT_A_NODE".to_string(),
        properties: Default::default(),
        child_sets: Default::default(),
    };
    assert!(session.load(&serialized).is_err());
    assert!(session.export_python().is_err());
}

#[test]
fn test_rename_respects_shadowing() {
    let mut session = EditingSession::default();
    let root = load_built(&mut session, |doc| {
        let x = identifier(doc, "x");
        let one = numeric_literal(doc, "1");
        let value = expression(doc, &[one]);
        let assign = assignment(doc, &[x], value);
        let first = statement(doc, Some(assign));

        let inner = identifier(doc, "x");
        let returned = expression(doc, &[inner]);
        let ret = return_statement(doc, Some(returned));
        let ret_line = statement(doc, Some(ret));
        let func = function_declaration(doc, "f", &["x"], &[ret_line]);
        let second = statement(doc, Some(func));

        let used = identifier(doc, "x");
        let arg = argument(doc, &[used]);
        let call = call_variable(doc, "print", &[arg]);
        let third = expression_statement(doc, &[call]);
        vec![first, second, third]
    });
    let target = session
        .document()
        .descendants(root)
        .into_iter()
        .find(|id| session.document().kind(*id) == NodeKind::Identifier)
        .unwrap();

    let renamed = session.rename_identifier(target, "y").unwrap();

    assert_eq!(renamed.len(), 2);
    assert_eq!(
        session.export_python().unwrap(),
        "y = 1\ndef f(x):\n    return x\nprint(y)\n"
    );
    assert!(session.variable_entry_by_name(root, "y").is_some());
    assert!(session.variable_entry_by_name(root, "x").is_none());
}

#[test]
fn test_filling_condition_fires_validity() {
    let mut session = EditingSession::default();
    let root = session.load(&hello_world_json()).unwrap();
    let body = session.document().child_set_ref(root, "body").unwrap();

    let doc = session.document_mut();
    let condition = expression(doc, &[]);
    let if_node = if_statement(doc, condition, &[]);
    let line = statement(doc, Some(if_node));
    session.insert_node(body, 1, line).unwrap();
    assert_eq!(
        session.document()[condition].validity(),
        &Validity::invalid("If condition is required")
    );

    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    let _sub = session.subscribe_node(condition, move |m| sink.borrow_mut().push(m.kind.clone()));

    let flag = identifier(session.document_mut(), "ready");
    let tokens = ChildSetRef::new(condition, 0);
    session.insert_node(tokens, 0, flag).unwrap();

    assert!(session.document()[condition].is_valid());
    assert_eq!(
        *events.borrow(),
        vec![NodeMutationKind::SetValidity {
            validity: Validity::valid()
        }]
    );
}

#[test]
fn test_copy_paste_through_serialized_fragment() {
    let mut session = EditingSession::default();
    let root = session.load(&hello_world_json()).unwrap();
    let body = session.document().child_set_ref(root, "body").unwrap();

    let original = session.document().children(body)[0];
    let copy = session.clone_node(original).unwrap();
    let fragment = session.fragment(vec![copy], NodeCategory::PythonStatement).unwrap();
    let wire = serde_json::to_string(&session.serialize_fragment(&fragment)).unwrap();

    let pasted = session.deserialize_fragment(&serde_json::from_str(&wire).unwrap()).unwrap();
    let inserts = Rc::new(RefCell::new(0));
    let sink = inserts.clone();
    let _sub = session.subscribe_child_set(body, move |m| {
        if matches!(m.kind, ChildSetMutationKind::Insert { .. }) {
            *sink.borrow_mut() += 1;
        }
    });
    session.insert_fragment(&pasted, body, 1).unwrap();

    assert_eq!(*inserts.borrow(), 1);
    assert_eq!(
        session.export_python().unwrap(),
        "print(\"Hello, World!\")\nprint(\"Hello, World!\")\n"
    );
}

#[test]
fn test_save_writes_file_and_checks_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hello.json");
    std::fs::write(&path, serde_json::to_string(&hello_world_json()).unwrap()).unwrap();

    let mut session = EditingSession::new(SessionOptions {
        indent: "  ".to_string(),
        builtins: vec!["numpy".to_string()],
    });
    let root = session.load_file(&path).unwrap();
    assert!(session.all_in_scope_variables(root).contains_key("numpy"));

    let body = session.document().child_set_ref(root, "body").unwrap();
    session.remove_child(body, 0).unwrap();

    let err = session.save(0).unwrap_err();
    assert!(matches!(
        err,
        blockcode_language::LanguageError::Save(SaveError::VersionMismatch { expected: 0, actual: 1 })
    ));

    session.save(1).unwrap();
    let mut reloaded = EditingSession::default();
    reloaded.load_file(&path).unwrap();
    assert_eq!(reloaded.export_python().unwrap(), "");
}
