//! Integration tests for end-to-end lowering.
//!
//! These tests build whole program trees the way the parser would, run
//! the complete lowering pass and inspect the verified LLVM IR.

use std::rc::Rc;

use inkwell::context::Context;

use pascalc::ast::ast::{Direction, Node, NodeRef};
use pascalc::ast::expressions::{BinaryOp, SysRoutine};
use pascalc::ast::types::{Range, RecordType, TypeDesc};
use pascalc::compiler::compiler::compile;
use pascalc::errors::errors::CodegenError;

fn program_with(
    consts: Vec<NodeRef>,
    types: Vec<NodeRef>,
    vars: Vec<NodeRef>,
    subroutines: Vec<NodeRef>,
) -> NodeRef {
    let const_list = Node::const_list();
    for declaration in consts {
        const_list.add_child(declaration);
    }
    let type_list = Node::type_list();
    for declaration in types {
        type_list.add_child(declaration);
    }
    let var_list = Node::var_list();
    for declaration in vars {
        var_list.add_child(declaration);
    }
    let subroutine_list = Node::subroutine_list();
    for subroutine in subroutines {
        subroutine_list.add_child(subroutine);
    }
    let head = Node::head_list(const_list, type_list, var_list, subroutine_list).unwrap();
    Node::program(Node::identifier("test"), head).unwrap()
}

fn var(name: &str, ty: Rc<TypeDesc>) -> NodeRef {
    Node::var_decl(Node::identifier(name), ty).unwrap()
}

fn assign(name: &str, value: NodeRef) -> NodeRef {
    Node::assign(Node::identifier(name), value).unwrap()
}

fn writeln(arg: NodeRef) -> NodeRef {
    Node::proc_stmt(
        Node::sys_call(SysRoutine::Writeln, Node::arg_list_of(&[arg]).unwrap()).unwrap(),
    )
    .unwrap()
}

fn lower(program: &NodeRef) -> Result<String, CodegenError> {
    let context = Context::create();
    compile(program, false, &context).map(|compiler| compiler.ir_to_string())
}

#[test]
fn test_arithmetic_keeps_parser_precedence() {
    // x := 2 + 3 * 4; writeln(x)  -- the tree already encodes precedence
    // and lowering must not alter the numeric result
    let program = program_with(vec![], vec![], vec![var("x", TypeDesc::integer())], vec![]);
    let product = Node::binop(BinaryOp::Mul, Node::integer(3), Node::integer(4)).unwrap();
    let sum = Node::binop(BinaryOp::Add, Node::integer(2), product).unwrap();
    program.add_child(assign("x", sum));
    program.add_child(writeln(Node::identifier("x")));

    let ir = lower(&program).unwrap();
    assert!(ir.contains("store i32 14"));
    assert!(ir.contains("call i32 (i8*, ...) @printf"));
}

#[test]
fn test_for_to_loop_shape() {
    let program = program_with(
        vec![],
        vec![],
        vec![var("i", TypeDesc::integer()), var("n", TypeDesc::integer())],
        vec![],
    );
    let body = assign(
        "n",
        Node::binop(BinaryOp::Add, Node::identifier("n"), Node::identifier("i")).unwrap(),
    );
    program.add_child(
        Node::for_stmt(
            Direction::To,
            Node::identifier("i"),
            Node::integer(1),
            Node::integer(3),
            body,
        )
        .unwrap(),
    );

    let ir = lower(&program).unwrap();
    // ascending loop: continue while counter <= bound
    assert!(ir.contains("icmp sle i32"));
    assert!(ir.contains("add i32"));
}

#[test]
fn test_for_downto_loop_shape() {
    let program = program_with(
        vec![],
        vec![],
        vec![var("i", TypeDesc::integer()), var("n", TypeDesc::integer())],
        vec![],
    );
    let body = assign(
        "n",
        Node::binop(BinaryOp::Add, Node::identifier("n"), Node::identifier("i")).unwrap(),
    );
    program.add_child(
        Node::for_stmt(
            Direction::Downto,
            Node::identifier("i"),
            Node::integer(3),
            Node::integer(1),
            body,
        )
        .unwrap(),
    );

    let ir = lower(&program).unwrap();
    // descending loop: continue while counter >= bound
    assert!(ir.contains("icmp sge i32"));
    assert!(ir.contains("sub i32"));
}

#[test]
fn test_repeat_is_post_check() {
    let program = program_with(vec![], vec![], vec![var("x", TypeDesc::integer())], vec![]);
    let repeat = Node::repeat_stmt(Node::boolean(true)).unwrap();
    repeat.add_child(assign("x", Node::integer(1)));
    program.add_child(repeat);

    let ir = lower(&program).unwrap();
    // the body block is entered unconditionally before any check
    assert!(ir.contains("br label %body"));
    // until-true: the branch leaves the loop when the condition holds
    assert!(ir.contains("br i1 true, label %end, label %body"));
}

#[test]
fn test_while_is_pre_check() {
    let program = program_with(vec![], vec![], vec![var("x", TypeDesc::integer())], vec![]);
    let condition = Node::binop(BinaryOp::Lt, Node::identifier("x"), Node::integer(10)).unwrap();
    let body = assign(
        "x",
        Node::binop(BinaryOp::Add, Node::identifier("x"), Node::integer(1)).unwrap(),
    );
    program.add_child(Node::while_stmt(condition, body).unwrap());

    let ir = lower(&program).unwrap();
    assert!(ir.contains("br label %cond"));
    assert!(ir.contains("icmp slt i32"));
}

#[test]
fn test_function_returns_assigned_name() {
    // function f(): integer; begin f := 42 end; writeln(f())
    let f = Node::subroutine(
        Node::identifier("f"),
        Node::param_list(),
        TypeDesc::integer(),
        Node::empty_head(),
    )
    .unwrap();
    f.add_child(assign("f", Node::integer(42)));

    let program = program_with(vec![], vec![], vec![], vec![f]);
    let call = Node::func_expr(
        Node::routine_call(Node::identifier("f"), Node::arg_list()).unwrap(),
    )
    .unwrap();
    program.add_child(writeln(call));

    let ir = lower(&program).unwrap();
    assert!(ir.contains("define i32 @f()"));
    assert!(ir.contains("store i32 42"));
    assert!(ir.contains("call i32 @f()"));
}

#[test]
fn test_procedure_with_parameters() {
    // procedure shout(n: integer); begin writeln(n) end; shout(7)
    let params = Node::param_list();
    params.add_child(Node::param_decl(Node::identifier("n"), TypeDesc::integer()).unwrap());
    let shout = Node::subroutine(
        Node::identifier("shout"),
        params,
        TypeDesc::void(),
        Node::empty_head(),
    )
    .unwrap();
    shout.add_child(writeln(Node::identifier("n")));

    let program = program_with(vec![], vec![], vec![], vec![shout]);
    let call =
        Node::routine_call(Node::identifier("shout"), Node::arg_list_of(&[Node::integer(7)]).unwrap())
            .unwrap();
    program.add_child(Node::proc_stmt(call).unwrap());

    let ir = lower(&program).unwrap();
    assert!(ir.contains("define void @shout(i32"));
    assert!(ir.contains("call void @shout(i32 7)"));
    assert!(ir.contains("ret void"));
}

#[test]
fn test_case_dispatch() {
    let program = program_with(
        vec![],
        vec![],
        vec![var("x", TypeDesc::integer()), var("y", TypeDesc::integer())],
        vec![],
    );
    let case = Node::case_stmt(Node::identifier("x")).unwrap();
    case.add_child(Node::case_branch(Node::integer(1), assign("y", Node::integer(10))).unwrap());
    case.add_child(Node::case_branch(Node::integer(2), assign("y", Node::integer(20))).unwrap());
    program.add_child(case);

    let ir = lower(&program).unwrap();
    // one equality check per branch, first match wins
    assert!(ir.contains("icmp eq i32"));
    assert!(ir.contains("br label %end"));
}

#[test]
fn test_array_element_addressing() {
    // var xs: array[5..9] of integer; xs[7] := 1; writeln(xs[7])
    let program = program_with(
        vec![],
        vec![],
        vec![var(
            "xs",
            TypeDesc::array(TypeDesc::integer(), Range::new(5, 9).unwrap()),
        )],
        vec![],
    );
    let element = Node::array_ref(Node::identifier("xs"), Node::integer(7)).unwrap();
    program.add_child(Node::assign(element, Node::integer(1)).unwrap());
    program.add_child(writeln(
        Node::array_ref(Node::identifier("xs"), Node::integer(7)).unwrap(),
    ));

    let ir = lower(&program).unwrap();
    assert!(ir.contains("[5 x i32]"));
    // the declared low bound shifts the index; no bounds check is emitted
    assert!(ir.contains("getelementptr inbounds"));
    assert!(!ir.contains("call void @abort"));
}

#[test]
fn test_record_field_assignment() {
    let mut record = RecordType::new();
    record.add_field("x", TypeDesc::integer()).unwrap();
    record.add_field("y", TypeDesc::integer()).unwrap();
    let program = program_with(
        vec![],
        vec![],
        vec![var("p", TypeDesc::record(record))],
        vec![],
    );
    program.add_child(
        Node::assign(
            Node::record_ref(Node::identifier("p"), Node::identifier("y")).unwrap(),
            Node::integer(3),
        )
        .unwrap(),
    );
    program.add_child(writeln(
        Node::record_ref(Node::identifier("p"), Node::identifier("y")).unwrap(),
    ));

    let ir = lower(&program).unwrap();
    assert!(ir.contains("{ i32, i32 }"));
    assert!(ir.contains("getelementptr inbounds"));
}

#[test]
fn test_if_else_rejoins() {
    let program = program_with(
        vec![],
        vec![],
        vec![var("x", TypeDesc::integer()), var("y", TypeDesc::integer())],
        vec![],
    );
    let condition = Node::binop(BinaryOp::Gt, Node::identifier("x"), Node::integer(0)).unwrap();
    program.add_child(
        Node::if_stmt(
            condition,
            assign("y", Node::integer(1)),
            Some(assign("y", Node::integer(2))),
        )
        .unwrap(),
    );

    let ir = lower(&program).unwrap();
    assert!(ir.contains("icmp sgt i32"));
    assert!(ir.contains("then:"));
    assert!(ir.contains("else:"));
}

#[test]
fn test_string_constant_writeln() {
    let program = program_with(
        vec![Node::const_decl(Node::identifier("greeting"), Node::string_literal("hello")).unwrap()],
        vec![],
        vec![],
        vec![],
    );
    program.add_child(writeln(Node::identifier("greeting")));

    let ir = lower(&program).unwrap();
    assert!(ir.contains("c\"hello\\00\""));
    assert!(ir.contains("c\"%s\\00\""));
}

#[test]
fn test_scalar_builtins() {
    let program = program_with(
        vec![],
        vec![],
        vec![
            var("n", TypeDesc::integer()),
            var("r", TypeDesc::real()),
            var("c", TypeDesc::char()),
        ],
        vec![],
    );
    let abs_call = Node::func_expr(
        Node::sys_call(
            SysRoutine::Abs,
            Node::arg_list_of(&[Node::identifier("n")]).unwrap(),
        )
        .unwrap(),
    )
    .unwrap();
    program.add_child(assign("n", abs_call));
    let sqrt_call = Node::func_expr(
        Node::sys_call(
            SysRoutine::Sqrt,
            Node::arg_list_of(&[Node::identifier("n")]).unwrap(),
        )
        .unwrap(),
    )
    .unwrap();
    program.add_child(assign("r", sqrt_call));
    let chr_call = Node::func_expr(
        Node::sys_call(
            SysRoutine::Chr,
            Node::arg_list_of(&[Node::identifier("n")]).unwrap(),
        )
        .unwrap(),
    )
    .unwrap();
    program.add_child(assign("c", chr_call));

    let ir = lower(&program).unwrap();
    assert!(ir.contains("call double @sqrt(double"));
    assert!(ir.contains("sitofp i32"));
    assert!(ir.contains("trunc i32"));
    assert!(ir.contains("select i1"));
}

#[test]
fn test_read_stores_through_address() {
    let program = program_with(vec![], vec![], vec![var("x", TypeDesc::integer())], vec![]);
    program.add_child(
        Node::proc_stmt(
            Node::sys_call(
                SysRoutine::Readln,
                Node::arg_list_of(&[Node::identifier("x")]).unwrap(),
            )
            .unwrap(),
        )
        .unwrap(),
    );

    let ir = lower(&program).unwrap();
    assert!(ir.contains("call i32 (i8*, ...) @scanf"));
    assert!(ir.contains("c\"%d\\00\""));
}

#[test]
fn test_undefined_identifier_is_fatal() {
    let program = program_with(vec![], vec![], vec![], vec![]);
    program.add_child(writeln(Node::identifier("nowhere")));

    let error = lower(&program).unwrap_err();
    assert_eq!(error.name(), "UndefinedIdentifier");
    assert!(error.to_string().starts_with("Codegen error: "));
}

#[test]
fn test_call_arity_is_checked_end_to_end() {
    let params = Node::param_list();
    params.add_child(Node::param_decl(Node::identifier("a"), TypeDesc::integer()).unwrap());
    params.add_child(Node::param_decl(Node::identifier("b"), TypeDesc::integer()).unwrap());
    let add = Node::subroutine(
        Node::identifier("add"),
        params,
        TypeDesc::integer(),
        Node::empty_head(),
    )
    .unwrap();
    add.add_child(assign(
        "add",
        Node::binop(BinaryOp::Add, Node::identifier("a"), Node::identifier("b")).unwrap(),
    ));

    let program = program_with(vec![], vec![], vec![], vec![add]);
    let call = Node::routine_call(
        Node::identifier("add"),
        Node::arg_list_of(&[Node::integer(1)]).unwrap(),
    )
    .unwrap();
    program.add_child(Node::proc_stmt(call).unwrap());

    let error = lower(&program).unwrap_err();
    assert_eq!(error.name(), "ArityMismatch");
}

#[test]
fn test_program_json_dump() {
    let program = program_with(
        vec![],
        vec![],
        vec![var("x", TypeDesc::integer())],
        vec![],
    );
    program.add_child(assign("x", Node::integer(1)));

    let json = program.to_json();
    assert!(json.starts_with("{\"type\": \"Program\""));
    assert!(json.contains("\"type\": \"HeadList\""));
    assert!(json.contains("\"type\": \"VarDecl\""));
    assert!(json.contains("\"children\": [{\"type\": \"AssignStmt\""));
}

#[test]
fn test_global_and_local_scopes_coexist() {
    // a local x shadows the global x inside the routine only
    let head = Node::head_list(
        Node::const_list(),
        Node::type_list(),
        {
            let vars = Node::var_list();
            vars.add_child(var("x", TypeDesc::integer()));
            vars
        },
        Node::subroutine_list(),
    )
    .unwrap();
    let inner = Node::subroutine(
        Node::identifier("inner"),
        Node::param_list(),
        TypeDesc::void(),
        head,
    )
    .unwrap();
    inner.add_child(assign("x", Node::integer(1)));

    let program = program_with(
        vec![],
        vec![],
        vec![var("x", TypeDesc::integer())],
        vec![inner],
    );
    program.add_child(assign("x", Node::integer(2)));

    let ir = lower(&program).unwrap();
    // the routine writes its own frame slot, main writes the global
    assert!(ir.contains("@x = internal global i32 0"));
    assert!(ir.contains("store i32 2, i32* @x"));
}
