//! Unit tests for the AST data model.
//!
//! Covers construction-time contracts (case folding, range validation,
//! left-value checks, parameter type restrictions), record field
//! indexing, parent back-references and the JSON serialization.

use std::rc::Rc;

use crate::ast::ast::{Direction, Node};
use crate::ast::expressions::BinaryOp;
use crate::ast::types::{Range, RecordType, TypeDesc};

#[test]
fn test_identifier_case_folding() {
    let node = Node::identifier("CounT");
    assert_eq!(node.identifier_name(), Some("count"));

    let node = Node::identifier("WRITELN");
    assert_eq!(node.identifier_name(), Some("writeln"));
}

#[test]
fn test_integer_literal_parsing() {
    let node = Node::integer_from_str("42").unwrap();
    assert_eq!(node.to_json(), "{\"type\": \"Integer\", \"value\": \"42\"}");

    let error = Node::integer_from_str("fortytwo").unwrap_err();
    assert_eq!(error.name(), "NumberParse");
}

#[test]
fn test_real_literal_parsing() {
    Node::real_from_str("3.5").unwrap();

    let error = Node::real_from_str("pi").unwrap_err();
    assert_eq!(error.name(), "NumberParse");
}

#[test]
fn test_range_length() {
    assert_eq!(Range::new(1, 10).unwrap().length(), 10);
    assert_eq!(Range::new(5, 5).unwrap().length(), 1);
    assert_eq!(Range::new(-3, 3).unwrap().length(), 7);
}

#[test]
fn test_range_rejects_negative_length() {
    let error = Range::new(3, 1).unwrap_err();
    assert_eq!(error.name(), "InvalidRange");
}

#[test]
fn test_record_field_indexes_follow_declaration_order() {
    let mut record = RecordType::new();
    record.add_field("a", TypeDesc::integer()).unwrap();
    record.add_field("b", TypeDesc::real()).unwrap();
    record.add_field("c", TypeDesc::char()).unwrap();

    assert_eq!(record.field_index("a"), Some(0));
    assert_eq!(record.field_index("b"), Some(1));
    assert_eq!(record.field_index("c"), Some(2));
    assert_eq!(record.field_index("d"), None);

    // the ordered view and the index map stay consistent
    let names: Vec<&str> = record.fields().iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
}

#[test]
fn test_record_rejects_duplicate_field() {
    let mut record = RecordType::new();
    record.add_field("x", TypeDesc::integer()).unwrap();
    let error = record.add_field("X", TypeDesc::integer()).unwrap_err();
    assert_eq!(error.name(), "DuplicateField");
}

#[test]
fn test_record_field_names_are_case_folded() {
    let mut record = RecordType::new();
    record.add_field("Alpha", TypeDesc::integer()).unwrap();
    assert_eq!(record.field_index("alpha"), Some(0));
}

#[test]
fn test_assign_requires_left_value() {
    let error = Node::assign(Node::integer(1), Node::integer(2)).unwrap_err();
    assert_eq!(error.name(), "MalformedNode");

    Node::assign(Node::identifier("x"), Node::integer(2)).unwrap();
    let element = Node::array_ref(Node::identifier("a"), Node::integer(1)).unwrap();
    Node::assign(element, Node::integer(2)).unwrap();
}

#[test]
fn test_array_ref_requires_identifier() {
    let error = Node::array_ref(Node::integer(3), Node::integer(1)).unwrap_err();
    assert_eq!(error.name(), "MalformedNode");
}

#[test]
fn test_param_decl_rejects_structured_types() {
    let array = TypeDesc::array(TypeDesc::integer(), Range::new(1, 4).unwrap());
    let error = Node::param_decl(Node::identifier("xs"), array).unwrap_err();
    assert_eq!(error.name(), "MalformedNode");

    Node::param_decl(Node::identifier("n"), TypeDesc::integer()).unwrap();
    Node::param_decl(Node::identifier("p"), TypeDesc::alias("pair")).unwrap();
}

#[test]
fn test_subroutine_return_type_restriction() {
    let mut record = RecordType::new();
    record.add_field("x", TypeDesc::integer()).unwrap();
    let error = Node::subroutine(
        Node::identifier("f"),
        Node::param_list(),
        TypeDesc::record(record),
        Node::empty_head(),
    )
    .unwrap_err();
    assert_eq!(error.name(), "MalformedNode");
}

#[test]
fn test_case_branch_label_contract() {
    let body = Node::compound();
    let error = Node::case_branch(
        Node::binop(BinaryOp::Add, Node::integer(1), Node::integer(2)).unwrap(),
        Rc::clone(&body),
    )
    .unwrap_err();
    assert_eq!(error.name(), "MalformedNode");

    Node::case_branch(Node::integer(1), Rc::clone(&body)).unwrap();
    Node::case_branch(Node::identifier("red"), body).unwrap();
}

#[test]
fn test_proc_stmt_requires_call() {
    let error = Node::proc_stmt(Node::identifier("x")).unwrap_err();
    assert_eq!(error.name(), "MalformedNode");
}

#[test]
fn test_add_child_sets_parent() {
    let block = Node::compound();
    let statement = Node::assign(Node::identifier("x"), Node::integer(1)).unwrap();
    block.add_child(Rc::clone(&statement));

    assert_eq!(block.child_count(), 1);
    let parent = statement.parent().expect("parent should be set");
    assert_eq!(parent.kind_name(), "CompoundStmt");
}

#[test]
fn test_parent_reference_is_weak() {
    let statement = Node::assign(Node::identifier("x"), Node::integer(1)).unwrap();
    {
        let block = Node::compound();
        block.add_child(Rc::clone(&statement));
        assert!(statement.parent().is_some());
    }
    // the child never keeps its parent alive
    assert!(statement.parent().is_none());
}

#[test]
fn test_identifier_json() {
    let node = Node::identifier("Total");
    assert_eq!(node.to_json(), "{\"type\": \"Identifier\", \"name\": \"total\"}");
}

#[test]
fn test_children_serialize_only_on_list_nodes() {
    let block = Node::compound();
    block.add_child(Node::assign(Node::identifier("x"), Node::integer(1)).unwrap());
    let json = block.to_json();
    assert!(json.starts_with("{\"type\": \"CompoundStmt\", \"children\": ["));
    assert!(json.contains("\"type\": \"AssignStmt\""));

    // fixed-arity nodes keep operands in named fields instead
    let assign = Node::assign(Node::identifier("x"), Node::integer(1)).unwrap();
    assert!(!assign.to_json().contains("children"));
}

#[test]
fn test_var_decl_json_embeds_type() {
    let decl = Node::var_decl(
        Node::identifier("xs"),
        TypeDesc::array(TypeDesc::integer(), Range::new(1, 3).unwrap()),
    )
    .unwrap();
    let json = decl.to_json();
    assert!(json.contains("\"type\": \"VarDecl\""));
    assert!(json.contains("\"name\": \"array\""));
    assert!(json.contains("\"lowerbound\": 1, \"upperbound\": 3, \"length\": 3"));
}

#[test]
fn test_string_json_is_escaped() {
    let node = Node::string_literal("say \"hi\"\n");
    assert_eq!(
        node.to_json(),
        "{\"type\": \"String\", \"value\": \"say \\\"hi\\\"\\n\"}"
    );
}

#[test]
fn test_for_stmt_json_direction() {
    let body = Node::compound();
    let node = Node::for_stmt(
        Direction::Downto,
        Node::identifier("i"),
        Node::integer(3),
        Node::integer(1),
        body,
    )
    .unwrap();
    assert!(node.to_json().contains("\"direction\": \"DOWNTO\""));
}

#[test]
fn test_type_alias_is_case_folded() {
    let alias = TypeDesc::alias("Pair");
    match alias.as_ref() {
        TypeDesc::Alias(name) => assert_eq!(name, "pair"),
        _ => panic!("expected an alias descriptor"),
    }
}
