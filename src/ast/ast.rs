//! Core AST node type.
//!
//! Every syntactic construct is one `Node` holding a closed `NodeKind`
//! variant. Lowering sites match on the kind directly, so an unhandled
//! node kind is a compile-time gap rather than a runtime surprise.
//!
//! Nodes form a strict tree: children are owned through `Rc` handles and
//! each node keeps a weak back-reference to its parent. The parent link
//! exists purely for tooling and never participates in ownership or
//! control flow.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::ast::expressions::{BinaryOp, SysRoutine};
use crate::ast::types::TypeDesc;

pub type NodeRef = Rc<Node>;

/// Loop direction of a `for` statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    To,
    Downto,
}

/// The closed set of node kinds.
#[derive(Debug)]
pub enum NodeKind {
    // constant literals
    Boolean(bool),
    Integer(i32),
    Real(f64),
    Char(u8),
    Str(String),
    // left-value expressions
    Identifier(String),
    ArrayRef {
        array: NodeRef,
        index: NodeRef,
    },
    RecordRef {
        record: NodeRef,
        field: NodeRef,
    },
    // other expressions
    Binop {
        op: BinaryOp,
        lhs: NodeRef,
        rhs: NodeRef,
    },
    FuncExpr {
        call: NodeRef,
    },
    // calls
    RoutineCall {
        name: NodeRef,
        args: NodeRef,
    },
    SysCall {
        routine: SysRoutine,
        args: NodeRef,
    },
    ArgList,
    // statements
    Compound,
    Assign {
        lhs: NodeRef,
        rhs: NodeRef,
    },
    ProcStmt {
        call: NodeRef,
    },
    If {
        condition: NodeRef,
        then_stmt: NodeRef,
        else_stmt: Option<NodeRef>,
    },
    While {
        condition: NodeRef,
        body: NodeRef,
    },
    /// Post-check loop; the body statements are the node's children.
    Repeat {
        condition: NodeRef,
    },
    For {
        direction: Direction,
        counter: NodeRef,
        start: NodeRef,
        finish: NodeRef,
        body: NodeRef,
    },
    /// Multi-way dispatch; the branches are the node's children.
    Case {
        selector: NodeRef,
    },
    CaseBranch {
        label: NodeRef,
        body: NodeRef,
    },
    // declarations
    ConstDecl {
        name: NodeRef,
        value: NodeRef,
    },
    VarDecl {
        name: NodeRef,
        ty: Rc<TypeDesc>,
    },
    TypeDef {
        name: NodeRef,
        ty: Rc<TypeDesc>,
    },
    ParamDecl {
        name: NodeRef,
        ty: Rc<TypeDesc>,
    },
    // containers
    ConstList,
    TypeList,
    VarList,
    ParamList,
    SubroutineList,
    HeadList {
        consts: NodeRef,
        types: NodeRef,
        vars: NodeRef,
        subroutines: NodeRef,
    },
    // routines; the body statements are the node's children
    Program {
        name: NodeRef,
        head: NodeRef,
    },
    Subroutine {
        name: NodeRef,
        params: NodeRef,
        return_type: Rc<TypeDesc>,
        head: NodeRef,
    },
}

#[derive(Debug)]
pub struct Node {
    pub kind: NodeKind,
    parent: RefCell<Weak<Node>>,
    children: RefCell<Vec<NodeRef>>,
}

impl Node {
    pub(crate) fn of(kind: NodeKind) -> NodeRef {
        Rc::new(Node {
            kind,
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
        })
    }

    /// Appends a child and sets its parent back-reference.
    pub fn add_child(self: &Rc<Self>, child: NodeRef) {
        debug_assert!(self.has_children(), "{} nodes take no children", self.kind_name());
        *child.parent.borrow_mut() = Rc::downgrade(self);
        self.children.borrow_mut().push(child);
    }

    /// The node's children, in insertion order.
    pub fn children(&self) -> Vec<NodeRef> {
        self.children.borrow().clone()
    }

    pub fn child_count(&self) -> usize {
        self.children.borrow().len()
    }

    /// The parent node, if it is still alive.
    pub fn parent(&self) -> Option<NodeRef> {
        self.parent.borrow().upgrade()
    }

    /// Whether this kind carries a child sequence (list-like nodes);
    /// fixed-arity kinds keep their operands in named fields instead.
    pub fn has_children(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::ArgList
                | NodeKind::Compound
                | NodeKind::Repeat { .. }
                | NodeKind::Case { .. }
                | NodeKind::ConstList
                | NodeKind::TypeList
                | NodeKind::VarList
                | NodeKind::ParamList
                | NodeKind::SubroutineList
                | NodeKind::Program { .. }
                | NodeKind::Subroutine { .. }
        )
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Boolean(_) => "Boolean",
            NodeKind::Integer(_) => "Integer",
            NodeKind::Real(_) => "Real",
            NodeKind::Char(_) => "Char",
            NodeKind::Str(_) => "String",
            NodeKind::Identifier(_) => "Identifier",
            NodeKind::ArrayRef { .. } => "ArrayRef",
            NodeKind::RecordRef { .. } => "RecordRef",
            NodeKind::Binop { .. } => "BinopExpr",
            NodeKind::FuncExpr { .. } => "FuncExpr",
            NodeKind::RoutineCall { .. } => "RoutineCall",
            NodeKind::SysCall { .. } => "SysCall",
            NodeKind::ArgList => "ArgList",
            NodeKind::Compound => "CompoundStmt",
            NodeKind::Assign { .. } => "AssignStmt",
            NodeKind::ProcStmt { .. } => "ProcStmt",
            NodeKind::If { .. } => "IfStmt",
            NodeKind::While { .. } => "WhileStmt",
            NodeKind::Repeat { .. } => "RepeatStmt",
            NodeKind::For { .. } => "ForStmt",
            NodeKind::Case { .. } => "CaseStmt",
            NodeKind::CaseBranch { .. } => "CaseBranch",
            NodeKind::ConstDecl { .. } => "ConstDecl",
            NodeKind::VarDecl { .. } => "VarDecl",
            NodeKind::TypeDef { .. } => "TypeDef",
            NodeKind::ParamDecl { .. } => "ParamDecl",
            NodeKind::ConstList => "ConstList",
            NodeKind::TypeList => "TypeList",
            NodeKind::VarList => "VarList",
            NodeKind::ParamList => "ParamList",
            NodeKind::SubroutineList => "SubroutineList",
            NodeKind::HeadList { .. } => "HeadList",
            NodeKind::Program { .. } => "Program",
            NodeKind::Subroutine { .. } => "Subroutine",
        }
    }

    /// Constant literal kinds.
    pub fn is_constant(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Boolean(_)
                | NodeKind::Integer(_)
                | NodeKind::Real(_)
                | NodeKind::Char(_)
                | NodeKind::Str(_)
        )
    }

    /// Kinds usable as an assignment target.
    pub fn is_left_value(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Identifier(_) | NodeKind::ArrayRef { .. } | NodeKind::RecordRef { .. }
        )
    }

    pub fn is_expression(&self) -> bool {
        self.is_constant()
            || self.is_left_value()
            || matches!(self.kind, NodeKind::Binop { .. } | NodeKind::FuncExpr { .. })
    }

    pub fn is_statement(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Compound
                | NodeKind::Assign { .. }
                | NodeKind::ProcStmt { .. }
                | NodeKind::If { .. }
                | NodeKind::While { .. }
                | NodeKind::Repeat { .. }
                | NodeKind::For { .. }
                | NodeKind::Case { .. }
        )
    }

    pub fn is_call(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::RoutineCall { .. } | NodeKind::SysCall { .. }
        )
    }

    /// The folded name of an `Identifier` node.
    pub fn identifier_name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Identifier(name) => Some(name),
            _ => None,
        }
    }

    /// Structural JSON serialization of the subtree rooted here.
    ///
    /// Read-only and safe at any tree state; the `children` array appears
    /// only on kinds that carry a child sequence.
    pub fn to_json(&self) -> String {
        let mut out = String::from("{");
        out.push_str(&self.json_head());
        if self.has_children() {
            out.push_str(", \"children\": [");
            let children = self.children.borrow();
            for (position, child) in children.iter().enumerate() {
                if position > 0 {
                    out.push_str(", ");
                }
                out.push_str(&child.to_json());
            }
            out.push(']');
        }
        out.push('}');
        out
    }

    fn json_head(&self) -> String {
        let kind = self.kind_name();
        match &self.kind {
            NodeKind::Boolean(value) => format!("\"type\": \"{}\", \"value\": \"{}\"", kind, value),
            NodeKind::Integer(value) => format!("\"type\": \"{}\", \"value\": \"{}\"", kind, value),
            NodeKind::Real(value) => format!("\"type\": \"{}\", \"value\": \"{}\"", kind, value),
            NodeKind::Char(value) => format!("\"type\": \"{}\", \"value\": \"{}\"", kind, value),
            NodeKind::Str(value) => {
                format!("\"type\": \"{}\", \"value\": \"{}\"", kind, escape_json(value))
            }
            NodeKind::Identifier(name) => {
                format!("\"type\": \"{}\", \"name\": \"{}\"", kind, escape_json(name))
            }
            NodeKind::ArrayRef { array, index } => format!(
                "\"type\": \"{}\", \"identifier\": {}, \"index\": {}",
                kind,
                array.to_json(),
                index.to_json()
            ),
            NodeKind::RecordRef { record, field } => format!(
                "\"type\": \"{}\", \"identifier\": {}, \"field\": {}",
                kind,
                record.to_json(),
                field.to_json()
            ),
            NodeKind::Binop { op, lhs, rhs } => format!(
                "\"type\": \"{}\", \"op\": \"{}\", \"lhs\": {}, \"rhs\": {}",
                kind,
                op,
                lhs.to_json(),
                rhs.to_json()
            ),
            NodeKind::FuncExpr { call } => {
                format!("\"type\": \"{}\", \"call\": {}", kind, call.to_json())
            }
            NodeKind::RoutineCall { name, args } => format!(
                "\"type\": \"{}\", \"identifier\": {}, \"args\": {}",
                kind,
                name.to_json(),
                args.to_json()
            ),
            NodeKind::SysCall { routine, args } => format!(
                "\"type\": \"{}\", \"identifier\": \"{}\", \"args\": {}",
                kind,
                routine,
                args.to_json()
            ),
            NodeKind::Assign { lhs, rhs } => format!(
                "\"type\": \"{}\", \"lhs\": {}, \"rhs\": {}",
                kind,
                lhs.to_json(),
                rhs.to_json()
            ),
            NodeKind::ProcStmt { call } => {
                format!("\"type\": \"{}\", \"call\": {}", kind, call.to_json())
            }
            NodeKind::If {
                condition,
                then_stmt,
                else_stmt,
            } => {
                let mut head = format!(
                    "\"type\": \"{}\", \"expr\": {}, \"stmt\": {}",
                    kind,
                    condition.to_json(),
                    then_stmt.to_json()
                );
                if let Some(else_stmt) = else_stmt {
                    head.push_str(&format!(", \"else_stmt\": {}", else_stmt.to_json()));
                }
                head
            }
            NodeKind::While { condition, body } => format!(
                "\"type\": \"{}\", \"expr\": {}, \"stmt\": {}",
                kind,
                condition.to_json(),
                body.to_json()
            ),
            NodeKind::Repeat { condition } => {
                format!("\"type\": \"{}\", \"expr\": {}", kind, condition.to_json())
            }
            NodeKind::For {
                direction,
                counter,
                start,
                finish,
                body,
            } => format!(
                "\"type\": \"{}\", \"direction\": \"{}\", \"identifier\": {}, \"start\": {}, \"finish\": {}, \"stmt\": {}",
                kind,
                match direction {
                    Direction::To => "TO",
                    Direction::Downto => "DOWNTO",
                },
                counter.to_json(),
                start.to_json(),
                finish.to_json(),
                body.to_json()
            ),
            NodeKind::Case { selector } => {
                format!("\"type\": \"{}\", \"expr\": {}", kind, selector.to_json())
            }
            NodeKind::CaseBranch { label, body } => format!(
                "\"type\": \"{}\", \"branch\": {}, \"stmt\": {}",
                kind,
                label.to_json(),
                body.to_json()
            ),
            NodeKind::ConstDecl { name, value } => format!(
                "\"type\": \"{}\", \"name\": {}, \"value\": {}",
                kind,
                name.to_json(),
                value.to_json()
            ),
            NodeKind::VarDecl { name, ty } | NodeKind::ParamDecl { name, ty } => format!(
                "\"type\": \"{}\", \"name\": {}, \"decl\": {}",
                kind,
                name.to_json(),
                ty.to_json()
            ),
            NodeKind::TypeDef { name, ty } => format!(
                "\"type\": \"{}\", \"name\": {}, \"alias\": {}",
                kind,
                name.to_json(),
                ty.to_json()
            ),
            NodeKind::HeadList {
                consts,
                types,
                vars,
                subroutines,
            } => format!(
                "\"type\": \"{}\", \"consts\": {}, \"types\": {}, \"vars\": {}, \"subroutines\": {}",
                kind,
                consts.to_json(),
                types.to_json(),
                vars.to_json(),
                subroutines.to_json()
            ),
            NodeKind::Program { name, head } => format!(
                "\"type\": \"{}\", \"name\": {}, \"head\": {}",
                kind,
                name.to_json(),
                head.to_json()
            ),
            NodeKind::Subroutine {
                name,
                params,
                return_type,
                head,
            } => format!(
                "\"type\": \"{}\", \"name\": {}, \"params\": {}, \"return\": {}, \"head\": {}",
                kind,
                name.to_json(),
                params.to_json(),
                return_type.to_json(),
                head.to_json()
            ),
            NodeKind::ArgList
            | NodeKind::Compound
            | NodeKind::ConstList
            | NodeKind::TypeList
            | NodeKind::VarList
            | NodeKind::ParamList
            | NodeKind::SubroutineList => format!("\"type\": \"{}\"", kind),
        }
    }
}

fn escape_json(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}
