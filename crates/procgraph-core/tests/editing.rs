mod common;

use procgraph::engine::error::{KeywordError, ProcedureError};
use procgraph::engine::node::NodeContext;
use procgraph::engine::procedure::{Procedure, ProcedureEvent};
use procgraph::engine::registry::NodeRegistry;
use std::cell::RefCell;
use std::rc::Rc;
use toml::Value;

fn selection(names: &[&str]) -> Value {
    Value::Array(names.iter().map(|n| Value::String(n.to_string())).collect())
}

#[test]
fn references_only_reach_earlier_nodes() {
    let registry = NodeRegistry::with_defaults();
    let mut procedure = Procedure::new(NodeContext::Generation);
    let root = procedure.root();
    let strip = procedure
        .create_node(&registry, "Remove", Some("Strip"), root, None)
        .unwrap();
    let pick = procedure
        .create_node(&registry, "Pick", Some("Sel"), root, None)
        .unwrap();

    let err = procedure
        .set_keyword(strip, "Selection", &selection(&["Sel"]), None)
        .unwrap_err();
    assert!(matches!(
        err,
        ProcedureError::Keyword {
            source: KeywordError::NodeNotInScope(_),
            ..
        }
    ));

    procedure.move_node(pick, 0).unwrap();
    procedure
        .set_keyword(strip, "Selection", &selection(&["sel"]), None)
        .unwrap();
    assert_eq!(
        procedure.keyword_value(strip, "Selection"),
        Some(selection(&["Sel"]))
    );

    procedure.move_node(pick, 1).unwrap();
    assert_eq!(procedure.keyword_value(strip, "Selection"), Some(selection(&[])));
    assert!(procedure.check().is_empty());
}

#[test]
fn branch_nodes_see_the_enclosing_scope() {
    let registry = NodeRegistry::with_defaults();
    let mut procedure = Procedure::new(NodeContext::Generation);
    let root = procedure.root();
    procedure
        .create_node(&registry, "Pick", Some("Sel"), root, None)
        .unwrap();
    let outer = procedure
        .create_node(&registry, "Repeat", Some("Outer"), root, None)
        .unwrap();
    let branch = procedure.branch_of(outer).unwrap();
    let strip = procedure
        .create_node(&registry, "Remove", None, branch, None)
        .unwrap();

    procedure
        .set_keyword(strip, "Selection", &selection(&["Sel"]), None)
        .unwrap();
    let visible = procedure.node_in_scope(strip, "SEL", &[]);
    assert_eq!(visible, procedure.find_node_by_name("Sel"));
    assert!(procedure.node_in_scope(strip, "Outer", &[]).is_some());
}

#[test]
fn names_are_unique_within_what_a_node_can_see() {
    let registry = NodeRegistry::with_defaults();
    let mut procedure = Procedure::new(NodeContext::Generation);
    let root = procedure.root();
    procedure
        .create_node(&registry, "Pick", Some("Sel"), root, None)
        .unwrap();

    let err = procedure
        .create_node(&registry, "Pick", Some("sel"), root, None)
        .unwrap_err();
    assert!(matches!(err, ProcedureError::DuplicateName(_)));

    let first = procedure
        .create_node(&registry, "Repeat", Some("First"), root, None)
        .unwrap();
    let second = procedure
        .create_node(&registry, "Repeat", Some("Second"), root, None)
        .unwrap();
    let err = procedure
        .create_node(&registry, "Pick", Some("Sel"), procedure.branch_of(first).unwrap(), None)
        .unwrap_err();
    assert!(matches!(err, ProcedureError::DuplicateName(_)));

    for owner in [first, second] {
        let branch = procedure.branch_of(owner).unwrap();
        procedure
            .create_node(&registry, "Pick", Some("Inner"), branch, None)
            .unwrap();
    }
    assert!(procedure.check().is_empty());
    assert_eq!(procedure.n_nodes(), 5);
}

#[test]
fn validation_is_idempotent() {
    let data = common::core_data();
    let mut procedure = common::from_toml(
        r#"
[procedure.Sel]
type = "Pick"
Species = ["Ar"]

[procedure.Strip]
type = "Remove"
Selection = ["Sel"]

[procedure.Restrain]
type = "RestraintPotential"
Selection = ["Sel"]
"#,
        Some(&data),
    );
    assert!(procedure.check().is_empty());

    let pick = procedure.find_node_by_name("Sel").unwrap();
    let restrain = procedure.find_node_by_name("Restrain").unwrap();
    procedure.move_node(pick, 2).unwrap();
    assert_eq!(procedure.keyword_value(restrain, "Selection"), Some(selection(&[])));
    assert_eq!(procedure.validate_node_keywords(), 0);
    assert_eq!(procedure.validate_node_keywords(), 0);
    assert!(procedure.check().is_empty());
}

#[test]
fn removal_notifies_observers_of_the_whole_subtree() {
    let registry = NodeRegistry::with_defaults();
    let mut procedure = Procedure::new(NodeContext::Generation);
    let root = procedure.root();
    let outer = procedure
        .create_node(&registry, "Repeat", Some("Outer"), root, None)
        .unwrap();
    let branch = procedure.branch_of(outer).unwrap();
    procedure
        .create_node(&registry, "Temperature", None, branch, None)
        .unwrap();

    let removed = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&removed);
    procedure.subscribe(move |event| {
        let ProcedureEvent::NodeRemoved { name, .. } = event;
        sink.borrow_mut().push(name.clone());
    });
    procedure.remove_node(outer).unwrap();

    let mut names = removed.borrow().clone();
    names.sort();
    assert_eq!(names, ["Outer", "Temperature01"]);
    assert!(procedure.is_empty());
}
