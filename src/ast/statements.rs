//! Constructors for statement, declaration and routine nodes.
//!
//! Like the expression constructors, these fail fast on a child of the
//! wrong variant: an assignment target must be a left value, a `for`
//! counter must be an identifier, parameter and return declarations only
//! accept simple or alias types, and so on.

use std::rc::Rc;

use crate::ast::ast::{Direction, Node, NodeKind, NodeRef};
use crate::ast::expressions::malformed;
use crate::ast::types::TypeDesc;
use crate::errors::errors::CodegenError;

impl Node {
    pub fn compound() -> NodeRef {
        Node::of(NodeKind::Compound)
    }

    pub fn assign(lhs: NodeRef, rhs: NodeRef) -> Result<NodeRef, CodegenError> {
        if !lhs.is_left_value() {
            return Err(malformed("left value", &lhs));
        }
        if !rhs.is_expression() {
            return Err(malformed("expression", &rhs));
        }
        Ok(Node::of(NodeKind::Assign { lhs, rhs }))
    }

    pub fn proc_stmt(call: NodeRef) -> Result<NodeRef, CodegenError> {
        if !call.is_call() {
            return Err(malformed("routine or system call", &call));
        }
        Ok(Node::of(NodeKind::ProcStmt { call }))
    }

    pub fn if_stmt(
        condition: NodeRef,
        then_stmt: NodeRef,
        else_stmt: Option<NodeRef>,
    ) -> Result<NodeRef, CodegenError> {
        if !condition.is_expression() {
            return Err(malformed("expression", &condition));
        }
        if !then_stmt.is_statement() {
            return Err(malformed("statement", &then_stmt));
        }
        if let Some(else_stmt) = &else_stmt {
            if !else_stmt.is_statement() {
                return Err(malformed("statement", else_stmt));
            }
        }
        Ok(Node::of(NodeKind::If {
            condition,
            then_stmt,
            else_stmt,
        }))
    }

    pub fn while_stmt(condition: NodeRef, body: NodeRef) -> Result<NodeRef, CodegenError> {
        if !condition.is_expression() {
            return Err(malformed("expression", &condition));
        }
        if !body.is_statement() {
            return Err(malformed("statement", &body));
        }
        Ok(Node::of(NodeKind::While { condition, body }))
    }

    /// The loop body accumulates as children of the returned node.
    pub fn repeat_stmt(condition: NodeRef) -> Result<NodeRef, CodegenError> {
        if !condition.is_expression() {
            return Err(malformed("expression", &condition));
        }
        Ok(Node::of(NodeKind::Repeat { condition }))
    }

    pub fn for_stmt(
        direction: Direction,
        counter: NodeRef,
        start: NodeRef,
        finish: NodeRef,
        body: NodeRef,
    ) -> Result<NodeRef, CodegenError> {
        if counter.identifier_name().is_none() {
            return Err(malformed("Identifier", &counter));
        }
        if !start.is_expression() {
            return Err(malformed("expression", &start));
        }
        if !finish.is_expression() {
            return Err(malformed("expression", &finish));
        }
        if !body.is_statement() {
            return Err(malformed("statement", &body));
        }
        Ok(Node::of(NodeKind::For {
            direction,
            counter,
            start,
            finish,
            body,
        }))
    }

    /// The branches accumulate as children of the returned node.
    pub fn case_stmt(selector: NodeRef) -> Result<NodeRef, CodegenError> {
        if !selector.is_expression() {
            return Err(malformed("expression", &selector));
        }
        Ok(Node::of(NodeKind::Case { selector }))
    }

    /// A branch label is a literal constant or an identifier naming one.
    pub fn case_branch(label: NodeRef, body: NodeRef) -> Result<NodeRef, CodegenError> {
        if !label.is_constant() && label.identifier_name().is_none() {
            return Err(malformed("constant or Identifier", &label));
        }
        if !body.is_statement() {
            return Err(malformed("statement", &body));
        }
        Ok(Node::of(NodeKind::CaseBranch { label, body }))
    }

    pub fn const_decl(name: NodeRef, value: NodeRef) -> Result<NodeRef, CodegenError> {
        if name.identifier_name().is_none() {
            return Err(malformed("Identifier", &name));
        }
        if !value.is_constant() {
            return Err(malformed("constant", &value));
        }
        Ok(Node::of(NodeKind::ConstDecl { name, value }))
    }

    pub fn var_decl(name: NodeRef, ty: Rc<TypeDesc>) -> Result<NodeRef, CodegenError> {
        if name.identifier_name().is_none() {
            return Err(malformed("Identifier", &name));
        }
        Ok(Node::of(NodeKind::VarDecl { name, ty }))
    }

    pub fn type_def(name: NodeRef, ty: Rc<TypeDesc>) -> Result<NodeRef, CodegenError> {
        if name.identifier_name().is_none() {
            return Err(malformed("Identifier", &name));
        }
        Ok(Node::of(NodeKind::TypeDef { name, ty }))
    }

    /// Parameters are restricted to simple or alias types; array and
    /// record parameters are rejected here, at construction.
    pub fn param_decl(name: NodeRef, ty: Rc<TypeDesc>) -> Result<NodeRef, CodegenError> {
        if name.identifier_name().is_none() {
            return Err(malformed("Identifier", &name));
        }
        if !ty.is_simple_or_alias() {
            return Err(malformed("simple or alias type", &name));
        }
        Ok(Node::of(NodeKind::ParamDecl { name, ty }))
    }

    pub fn const_list() -> NodeRef {
        Node::of(NodeKind::ConstList)
    }

    pub fn type_list() -> NodeRef {
        Node::of(NodeKind::TypeList)
    }

    pub fn var_list() -> NodeRef {
        Node::of(NodeKind::VarList)
    }

    pub fn param_list() -> NodeRef {
        Node::of(NodeKind::ParamList)
    }

    pub fn subroutine_list() -> NodeRef {
        Node::of(NodeKind::SubroutineList)
    }

    pub fn head_list(
        consts: NodeRef,
        types: NodeRef,
        vars: NodeRef,
        subroutines: NodeRef,
    ) -> Result<NodeRef, CodegenError> {
        if !matches!(consts.kind, NodeKind::ConstList) {
            return Err(malformed("ConstList", &consts));
        }
        if !matches!(types.kind, NodeKind::TypeList) {
            return Err(malformed("TypeList", &types));
        }
        if !matches!(vars.kind, NodeKind::VarList) {
            return Err(malformed("VarList", &vars));
        }
        if !matches!(subroutines.kind, NodeKind::SubroutineList) {
            return Err(malformed("SubroutineList", &subroutines));
        }
        Ok(Node::of(NodeKind::HeadList {
            consts,
            types,
            vars,
            subroutines,
        }))
    }

    /// An empty head list, for programs or routines without declarations.
    pub fn empty_head() -> NodeRef {
        Node::head_list(
            Node::const_list(),
            Node::type_list(),
            Node::var_list(),
            Node::subroutine_list(),
        )
        .expect("empty head list is well-formed")
    }

    /// The program body accumulates as children of the returned node.
    pub fn program(name: NodeRef, head: NodeRef) -> Result<NodeRef, CodegenError> {
        if name.identifier_name().is_none() {
            return Err(malformed("Identifier", &name));
        }
        if !matches!(head.kind, NodeKind::HeadList { .. }) {
            return Err(malformed("HeadList", &head));
        }
        Ok(Node::of(NodeKind::Program { name, head }))
    }

    /// The routine body accumulates as children of the returned node.
    /// Return types follow the same simple-or-alias restriction as
    /// parameters; procedures use `void`.
    pub fn subroutine(
        name: NodeRef,
        params: NodeRef,
        return_type: Rc<TypeDesc>,
        head: NodeRef,
    ) -> Result<NodeRef, CodegenError> {
        if name.identifier_name().is_none() {
            return Err(malformed("Identifier", &name));
        }
        if !matches!(params.kind, NodeKind::ParamList) {
            return Err(malformed("ParamList", &params));
        }
        if !return_type.is_simple_or_alias() {
            return Err(malformed("simple or alias type", &name));
        }
        if !matches!(head.kind, NodeKind::HeadList { .. }) {
            return Err(malformed("HeadList", &head));
        }
        Ok(Node::of(NodeKind::Subroutine {
            name,
            params,
            return_type,
            head,
        }))
    }
}
