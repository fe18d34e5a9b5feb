//! Type descriptors for the language.
//!
//! The semantic types form a closed set: scalars (boolean, integer, real,
//! char), strings, arrays over an inclusive integer range, records with
//! ordered named fields, named aliases resolved at point of use, and the
//! recognized-but-unrealized `set`. Every descriptor embedded in a
//! declaration is resolved to an LLVM layout by the compiler module.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::errors::errors::{CodegenError, ErrorKind};

/// Discriminant of a semantic type, used in diagnostics and dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Undefined,
    Void,
    Boolean,
    Integer,
    Real,
    Char,
    String,
    Array,
    Record,
    Set,
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeTag::Undefined => "<undefined-type>",
            TypeTag::Void => "void",
            TypeTag::Boolean => "boolean",
            TypeTag::Integer => "integer",
            TypeTag::Real => "real",
            TypeTag::Char => "char",
            TypeTag::String => "string",
            TypeTag::Array => "array",
            TypeTag::Record => "record",
            TypeTag::Set => "set",
        };
        write!(f, "{}", name)
    }
}

/// A semantic type descriptor.
#[derive(Debug)]
pub enum TypeDesc {
    /// A scalar or marker type: one of Undefined, Void, Boolean, Integer,
    /// Real, Char or String.
    Simple(TypeTag),
    /// A named type resolved against the alias scope active at the point
    /// of use, local scope first.
    Alias(String),
    Array(ArrayType),
    Record(RecordType),
    /// Recognized by the grammar but deliberately without a backend
    /// layout; reaching layout resolution with it is an error.
    Set,
}

impl TypeDesc {
    pub fn boolean() -> Rc<TypeDesc> {
        Rc::new(TypeDesc::Simple(TypeTag::Boolean))
    }

    pub fn integer() -> Rc<TypeDesc> {
        Rc::new(TypeDesc::Simple(TypeTag::Integer))
    }

    pub fn real() -> Rc<TypeDesc> {
        Rc::new(TypeDesc::Simple(TypeTag::Real))
    }

    pub fn char() -> Rc<TypeDesc> {
        Rc::new(TypeDesc::Simple(TypeTag::Char))
    }

    pub fn string() -> Rc<TypeDesc> {
        Rc::new(TypeDesc::Simple(TypeTag::String))
    }

    pub fn void() -> Rc<TypeDesc> {
        Rc::new(TypeDesc::Simple(TypeTag::Void))
    }

    /// An alias reference; the name is case-folded like every identifier.
    pub fn alias(name: &str) -> Rc<TypeDesc> {
        Rc::new(TypeDesc::Alias(name.to_lowercase()))
    }

    pub fn array(element: Rc<TypeDesc>, range: Range) -> Rc<TypeDesc> {
        Rc::new(TypeDesc::Array(ArrayType { element, range }))
    }

    pub fn record(record: RecordType) -> Rc<TypeDesc> {
        Rc::new(TypeDesc::Record(record))
    }

    pub fn set() -> Rc<TypeDesc> {
        Rc::new(TypeDesc::Set)
    }

    pub fn tag(&self) -> TypeTag {
        match self {
            TypeDesc::Simple(tag) => *tag,
            TypeDesc::Alias(_) => TypeTag::Undefined,
            TypeDesc::Array(_) => TypeTag::Array,
            TypeDesc::Record(_) => TypeTag::Record,
            TypeDesc::Set => TypeTag::Set,
        }
    }

    /// True for types accepted as parameter and return declarations:
    /// scalars and aliases. Arrays and records are rejected when the
    /// routine node is constructed.
    pub fn is_simple_or_alias(&self) -> bool {
        matches!(self, TypeDesc::Simple(_) | TypeDesc::Alias(_))
    }

    /// Structural JSON form, embedded into the owning declaration node.
    pub fn to_json(&self) -> String {
        match self {
            TypeDesc::Simple(tag) => format!("{{\"type\": \"Type\", \"name\": \"{}\"}}", tag),
            TypeDesc::Alias(name) => format!(
                "{{\"type\": \"Type\", \"name\": \"alias\", \"identifier\": \"{}\"}}",
                name
            ),
            TypeDesc::Array(array) => format!(
                "{{\"type\": \"Type\", \"name\": \"array\", \"element\": {}, \"range\": {{\"lowerbound\": {}, \"upperbound\": {}, \"length\": {}}}}}",
                array.element.to_json(),
                array.range.low,
                array.range.high,
                array.range.length()
            ),
            TypeDesc::Record(record) => {
                let fields = record
                    .fields()
                    .iter()
                    .map(|(name, ty)| format!("{{\"name\": \"{}\", \"decl\": {}}}", name, ty.to_json()))
                    .collect::<Vec<String>>()
                    .join(", ");
                format!("{{\"type\": \"Type\", \"name\": \"record\", \"fields\": [{}]}}", fields)
            }
            TypeDesc::Set => "{\"type\": \"Type\", \"name\": \"set\"}".to_string(),
        }
    }
}

/// An inclusive integer range bounding an array type.
///
/// The length is validated at construction; a range whose high bound is
/// below its low bound never becomes a value of this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub low: i32,
    pub high: i32,
}

impl Range {
    pub fn new(low: i32, high: i32) -> Result<Self, CodegenError> {
        if high < low {
            return Err(ErrorKind::InvalidRange { low, high }.into());
        }
        Ok(Range { low, high })
    }

    pub fn length(&self) -> u32 {
        (self.high - self.low + 1) as u32
    }
}

/// A fixed-length array type: element descriptor plus inclusive range.
#[derive(Debug)]
pub struct ArrayType {
    pub element: Rc<TypeDesc>,
    pub range: Range,
}

static NEXT_RECORD_KEY: AtomicU32 = AtomicU32::new(0);

/// A record type with ordered named fields.
///
/// Fields are appended one at a time while the record declaration is
/// built; each append keeps the ordered field list and the name-to-index
/// map consistent. The key identifies this record in the compiler's
/// layout cache, so the LLVM struct type is created once and reused.
#[derive(Debug)]
pub struct RecordType {
    key: u32,
    fields: Vec<(String, Rc<TypeDesc>)>,
    index: HashMap<String, u32>,
}

impl RecordType {
    pub fn new() -> Self {
        RecordType {
            key: NEXT_RECORD_KEY.fetch_add(1, Ordering::Relaxed),
            fields: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Appends a field, assigning it the next zero-based index.
    pub fn add_field(&mut self, name: &str, ty: Rc<TypeDesc>) -> Result<(), CodegenError> {
        let name = name.to_lowercase();
        if self.index.contains_key(&name) {
            return Err(ErrorKind::DuplicateField { field: name }.into());
        }
        self.index.insert(name.clone(), self.fields.len() as u32);
        self.fields.push((name, ty));
        Ok(())
    }

    pub fn field_index(&self, name: &str) -> Option<u32> {
        self.index.get(name).copied()
    }

    pub fn field_type(&self, name: &str) -> Option<&Rc<TypeDesc>> {
        self.field_index(name)
            .map(|index| &self.fields[index as usize].1)
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[(String, Rc<TypeDesc>)] {
        &self.fields
    }

    pub fn layout_key(&self) -> u32 {
        self.key
    }
}

impl Default for RecordType {
    fn default() -> Self {
        RecordType::new()
    }
}
