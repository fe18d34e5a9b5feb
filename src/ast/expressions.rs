//! Constructors for expression and call nodes.
//!
//! Constructors are the enforcement point for structural contracts: a
//! node handed a child of the wrong variant fails right here, not later
//! at lowering time. Identifier names are case-folded to lowercase so
//! every later lookup is case-insensitive.

use std::fmt;
use std::rc::Rc;

use crate::ast::ast::{Node, NodeKind, NodeRef};
use crate::errors::errors::{CodegenError, ErrorKind};

/// Binary operators of the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
    Add,
    Sub,
    Mul,
    /// `/`: true division, always producing a real result.
    TrueDiv,
    /// `div`: integral division.
    Div,
    Mod,
    And,
    Or,
    Xor,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::TrueDiv => "/",
            BinaryOp::Div => "div",
            BinaryOp::Mod => "mod",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
        };
        write!(f, "{}", text)
    }
}

/// Builtin routines provided by the language runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SysRoutine {
    Abs,
    Chr,
    Ord,
    Pred,
    Succ,
    Sqrt,
    Read,
    Readln,
    Write,
    Writeln,
}

impl fmt::Display for SysRoutine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SysRoutine::Abs => "abs",
            SysRoutine::Chr => "chr",
            SysRoutine::Ord => "ord",
            SysRoutine::Pred => "pred",
            SysRoutine::Succ => "succ",
            SysRoutine::Sqrt => "sqrt",
            SysRoutine::Read => "read",
            SysRoutine::Readln => "readln",
            SysRoutine::Write => "write",
            SysRoutine::Writeln => "writeln",
        };
        write!(f, "{}", text)
    }
}

pub(crate) fn malformed(expected: &'static str, found: &Node) -> CodegenError {
    ErrorKind::MalformedNode {
        expected,
        found: found.kind_name(),
    }
    .into()
}

impl Node {
    pub fn boolean(value: bool) -> NodeRef {
        Node::of(NodeKind::Boolean(value))
    }

    pub fn integer(value: i32) -> NodeRef {
        Node::of(NodeKind::Integer(value))
    }

    /// Parses the literal's source text once, at construction.
    pub fn integer_from_str(text: &str) -> Result<NodeRef, CodegenError> {
        let value = text.parse::<i32>().map_err(|_| ErrorKind::NumberParse {
            text: text.to_string(),
        })?;
        Ok(Node::integer(value))
    }

    pub fn real(value: f64) -> NodeRef {
        Node::of(NodeKind::Real(value))
    }

    pub fn real_from_str(text: &str) -> Result<NodeRef, CodegenError> {
        let value = text.parse::<f64>().map_err(|_| ErrorKind::NumberParse {
            text: text.to_string(),
        })?;
        Ok(Node::real(value))
    }

    pub fn char_literal(value: u8) -> NodeRef {
        Node::of(NodeKind::Char(value))
    }

    pub fn string_literal(value: &str) -> NodeRef {
        Node::of(NodeKind::Str(value.to_string()))
    }

    /// Identifier names are canonicalized to lowercase here so lookups
    /// stay case-insensitive everywhere else.
    pub fn identifier(name: &str) -> NodeRef {
        Node::of(NodeKind::Identifier(name.to_lowercase()))
    }

    pub fn array_ref(array: NodeRef, index: NodeRef) -> Result<NodeRef, CodegenError> {
        if array.identifier_name().is_none() {
            return Err(malformed("Identifier", &array));
        }
        if !index.is_expression() {
            return Err(malformed("expression", &index));
        }
        Ok(Node::of(NodeKind::ArrayRef { array, index }))
    }

    pub fn record_ref(record: NodeRef, field: NodeRef) -> Result<NodeRef, CodegenError> {
        if record.identifier_name().is_none() {
            return Err(malformed("Identifier", &record));
        }
        if field.identifier_name().is_none() {
            return Err(malformed("Identifier", &field));
        }
        Ok(Node::of(NodeKind::RecordRef { record, field }))
    }

    pub fn binop(op: BinaryOp, lhs: NodeRef, rhs: NodeRef) -> Result<NodeRef, CodegenError> {
        if !lhs.is_expression() {
            return Err(malformed("expression", &lhs));
        }
        if !rhs.is_expression() {
            return Err(malformed("expression", &rhs));
        }
        Ok(Node::of(NodeKind::Binop { op, lhs, rhs }))
    }

    /// Wraps a routine or system call for use in expression position.
    pub fn func_expr(call: NodeRef) -> Result<NodeRef, CodegenError> {
        if !call.is_call() {
            return Err(malformed("routine or system call", &call));
        }
        Ok(Node::of(NodeKind::FuncExpr { call }))
    }

    pub fn arg_list() -> NodeRef {
        Node::of(NodeKind::ArgList)
    }

    /// Convenience: an argument list populated from a slice.
    pub fn arg_list_of(args: &[NodeRef]) -> Result<NodeRef, CodegenError> {
        let list = Node::arg_list();
        for arg in args {
            if !arg.is_expression() {
                return Err(malformed("expression", arg));
            }
            list.add_child(Rc::clone(arg));
        }
        Ok(list)
    }

    pub fn routine_call(name: NodeRef, args: NodeRef) -> Result<NodeRef, CodegenError> {
        if name.identifier_name().is_none() {
            return Err(malformed("Identifier", &name));
        }
        if !matches!(args.kind, NodeKind::ArgList) {
            return Err(malformed("ArgList", &args));
        }
        Ok(Node::of(NodeKind::RoutineCall { name, args }))
    }

    pub fn sys_call(routine: SysRoutine, args: NodeRef) -> Result<NodeRef, CodegenError> {
        if !matches!(args.kind, NodeKind::ArgList) {
            return Err(malformed("ArgList", &args));
        }
        Ok(Node::of(NodeKind::SysCall { routine, args }))
    }
}
