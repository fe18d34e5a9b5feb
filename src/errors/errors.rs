use inkwell::builder::BuilderError;
use thiserror::Error;

/// The compile error raised by any violated contract of the lowering pass.
///
/// Every error is fatal: it propagates unmodified through the whole call
/// chain and aborts the compilation. The displayed message is the inner
/// description prefixed with the fixed `Codegen error: ` tag.
#[derive(Error, Debug)]
#[error("Codegen error: {kind}")]
pub struct CodegenError {
    kind: ErrorKind,
}

impl CodegenError {
    pub fn new(kind: ErrorKind) -> Self {
        CodegenError { kind }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn name(&self) -> &'static str {
        match &self.kind {
            ErrorKind::DuplicateName { .. } => "DuplicateName",
            ErrorKind::NameAliasCollision { .. } => "NameAliasCollision",
            ErrorKind::DuplicateAlias { .. } => "DuplicateAlias",
            ErrorKind::AliasNameCollision { .. } => "AliasNameCollision",
            ErrorKind::UndefinedIdentifier { .. } => "UndefinedIdentifier",
            ErrorKind::NotAnArray { .. } => "NotAnArray",
            ErrorKind::NotARecord { .. } => "NotARecord",
            ErrorKind::NoSuchField { .. } => "NoSuchField",
            ErrorKind::ArityMismatch { .. } => "ArityMismatch",
            ErrorKind::InvalidOperator { .. } => "InvalidOperator",
            ErrorKind::UnsupportedType { .. } => "UnsupportedType",
            ErrorKind::UnresolvedType { .. } => "UnresolvedType",
            ErrorKind::MalformedNode { .. } => "MalformedNode",
            ErrorKind::NumberParse { .. } => "NumberParse",
            ErrorKind::InvalidRange { .. } => "InvalidRange",
            ErrorKind::DuplicateField { .. } => "DuplicateField",
            ErrorKind::InvalidCondition { .. } => "InvalidCondition",
            ErrorKind::InvalidArgument { .. } => "InvalidArgument",
            ErrorKind::BrokenFunction { .. } => "BrokenFunction",
            ErrorKind::Target { .. } => "Target",
            ErrorKind::Builder(_) => "Builder",
        }
    }
}

impl From<ErrorKind> for CodegenError {
    fn from(kind: ErrorKind) -> Self {
        CodegenError::new(kind)
    }
}

impl From<BuilderError> for CodegenError {
    fn from(error: BuilderError) -> Self {
        CodegenError::new(ErrorKind::Builder(error))
    }
}

#[derive(Error, Debug)]
pub enum ErrorKind {
    #[error("duplicate {scope} name {name:?}")]
    DuplicateName { name: String, scope: &'static str },
    #[error("{scope} name {name:?} collides with a type alias of the same name")]
    NameAliasCollision { name: String, scope: &'static str },
    #[error("duplicate {scope} type alias {name:?}")]
    DuplicateAlias { name: String, scope: &'static str },
    #[error("{scope} type alias {name:?} collides with a declared name")]
    AliasNameCollision { name: String, scope: &'static str },
    #[error("identifier not found: {name}")]
    UndefinedIdentifier { name: String },
    #[error("identifier {name:?} is not an array")]
    NotAnArray { name: String },
    #[error("identifier {name:?} is not a record")]
    NotARecord { name: String },
    #[error("record {record:?} has no field named {field:?}")]
    NoSuchField { record: String, field: String },
    #[error("wrong number of arguments for {routine}(): expected {expected}, received {received}")]
    ArityMismatch {
        routine: String,
        expected: usize,
        received: usize,
    },
    #[error("operator is invalid: {lhs} {op} {rhs}")]
    InvalidOperator {
        op: String,
        lhs: &'static str,
        rhs: &'static str,
    },
    #[error("unsupported type: {name}")]
    UnsupportedType { name: String },
    #[error("unresolved type alias: {name}")]
    UnresolvedType { name: String },
    #[error("expected {expected} node, found {found}")]
    MalformedNode {
        expected: &'static str,
        found: &'static str,
    },
    #[error("error parsing number: {text:?}")]
    NumberParse { text: String },
    #[error("invalid array range [{low}, {high}]: length must be positive")]
    InvalidRange { low: i32, high: i32 },
    #[error("duplicate record field {field:?}")]
    DuplicateField { field: String },
    #[error("expected a boolean condition, found {found}")]
    InvalidCondition { found: &'static str },
    #[error("invalid argument type for {routine}()")]
    InvalidArgument { routine: String },
    #[error("generated function {name:?} failed verification")]
    BrokenFunction { name: String },
    #[error("target machine error: {message}")]
    Target { message: String },
    #[error(transparent)]
    Builder(#[from] BuilderError),
}
