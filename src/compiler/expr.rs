//! Expression lowering.
//!
//! Left values resolve to an address first; value use loads through it,
//! assignment stores through it. Binary operators dispatch on the pair of
//! operand LLVM types, checking the comparison set before the arithmetic
//! table within each matched pair.

use inkwell::values::{BasicMetadataValueEnum, BasicValueEnum, IntValue, PointerValue};
use inkwell::{FloatPredicate, IntPredicate};

use crate::ast::ast::{NodeKind, NodeRef};
use crate::ast::expressions::{malformed, BinaryOp};
use crate::ast::types::TypeDesc;
use crate::compiler::compiler::Compiler;
use crate::compiler::intrinsics::gen_sys_call;
use crate::errors::errors::{CodegenError, ErrorKind};

/// A short language-level name for an operand's LLVM type, used in
/// operator diagnostics.
pub(crate) fn value_type_name(value: &BasicValueEnum) -> &'static str {
    match value {
        BasicValueEnum::IntValue(int) => match int.get_type().get_bit_width() {
            1 => "boolean",
            8 => "char",
            _ => "integer",
        },
        BasicValueEnum::FloatValue(_) => "real",
        BasicValueEnum::PointerValue(_) => "string",
        _ => "<unknown>",
    }
}

/// Generates LLVM IR for the given expression node.
pub fn gen_expression<'ctx>(
    compiler: &Compiler<'ctx>,
    expression: &NodeRef,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    match &expression.kind {
        NodeKind::Boolean(value) => Ok(compiler
            .context
            .bool_type()
            .const_int(*value as u64, false)
            .into()),
        NodeKind::Integer(value) => Ok(compiler
            .context
            .i32_type()
            .const_int(*value as i64 as u64, true)
            .into()),
        NodeKind::Real(value) => Ok(compiler.context.f64_type().const_float(*value).into()),
        NodeKind::Char(value) => Ok(compiler
            .context
            .i8_type()
            .const_int(*value as u64, false)
            .into()),
        NodeKind::Str(value) => Ok(compiler.const_cstring_ptr(value).into()),
        NodeKind::Identifier(name) => {
            let ptr = gen_address(compiler, expression)?;
            Ok(compiler.builder.build_load(ptr, name)?)
        }
        NodeKind::ArrayRef { .. } | NodeKind::RecordRef { .. } => {
            let ptr = gen_address(compiler, expression)?;
            Ok(compiler.builder.build_load(ptr, "")?)
        }
        NodeKind::Binop { op, lhs, rhs } => gen_binop(compiler, *op, lhs, rhs),
        NodeKind::FuncExpr { call } => gen_call(compiler, call),
        _ => Err(malformed("expression", expression)),
    }
}

/// Resolves the storage address of a left value.
///
/// Array element addressing sign-extends the index to 64 bits and
/// subtracts the declared low bound; no runtime bounds check is emitted,
/// matching the source language's unchecked semantics.
pub fn gen_address<'ctx>(
    compiler: &Compiler<'ctx>,
    expression: &NodeRef,
) -> Result<PointerValue<'ctx>, CodegenError> {
    match &expression.kind {
        NodeKind::Identifier(name) => {
            let symbol = compiler.lookup(name).ok_or_else(|| {
                CodegenError::from(ErrorKind::UndefinedIdentifier { name: name.clone() })
            })?;
            Ok(symbol.ptr)
        }
        NodeKind::ArrayRef { array, index } => {
            let name = array
                .identifier_name()
                .ok_or_else(|| malformed("Identifier", array))?;
            let symbol = compiler.lookup(name).ok_or_else(|| {
                CodegenError::from(ErrorKind::UndefinedIdentifier {
                    name: name.to_string(),
                })
            })?;
            let TypeDesc::Array(array_type) = symbol.ty.as_ref() else {
                return Err(ErrorKind::NotAnArray {
                    name: name.to_string(),
                }
                .into());
            };

            let i64_type = compiler.context.i64_type();
            let raw_index = int_operand(gen_expression(compiler, index)?, "array index")?;
            let wide_index = compiler
                .builder
                .build_int_s_extend(raw_index, i64_type, "")?;
            let base = i64_type.const_int(array_type.range.low as i64 as u64, true);
            let offset = compiler.builder.build_int_sub(wide_index, base, "index")?;
            let zero = i64_type.const_zero();
            let element_ptr = unsafe {
                compiler
                    .builder
                    .build_in_bounds_gep(symbol.ptr, &[zero, offset], "element")?
            };
            Ok(element_ptr)
        }
        NodeKind::RecordRef { record, field } => {
            let name = record
                .identifier_name()
                .ok_or_else(|| malformed("Identifier", record))?;
            let field_name = field
                .identifier_name()
                .ok_or_else(|| malformed("Identifier", field))?;
            let symbol = compiler.lookup(name).ok_or_else(|| {
                CodegenError::from(ErrorKind::UndefinedIdentifier {
                    name: name.to_string(),
                })
            })?;
            let TypeDesc::Record(record_type) = symbol.ty.as_ref() else {
                return Err(ErrorKind::NotARecord {
                    name: name.to_string(),
                }
                .into());
            };
            let field_index =
                record_type
                    .field_index(field_name)
                    .ok_or_else(|| ErrorKind::NoSuchField {
                        record: name.to_string(),
                        field: field_name.to_string(),
                    })?;
            let field_ptr = compiler
                .builder
                .build_struct_gep(symbol.ptr, field_index, "field")?;
            Ok(field_ptr)
        }
        _ => Err(malformed("left value", expression)),
    }
}

/// Lowers a routine or system call and returns its result value.
///
/// Void calls yield an integer zero placeholder, discarded by statement
/// lowering.
pub fn gen_call<'ctx>(
    compiler: &Compiler<'ctx>,
    call: &NodeRef,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    match &call.kind {
        NodeKind::RoutineCall { name, args } => {
            let routine_name = name
                .identifier_name()
                .ok_or_else(|| malformed("Identifier", name))?;
            let function = compiler.module.get_function(routine_name).ok_or_else(|| {
                CodegenError::from(ErrorKind::UndefinedIdentifier {
                    name: routine_name.to_string(),
                })
            })?;

            let arg_nodes = args.children();
            if function.count_params() as usize != arg_nodes.len() {
                return Err(ErrorKind::ArityMismatch {
                    routine: routine_name.to_string(),
                    expected: function.count_params() as usize,
                    received: arg_nodes.len(),
                }
                .into());
            }

            let mut values: Vec<BasicMetadataValueEnum<'ctx>> =
                Vec::with_capacity(arg_nodes.len());
            for arg in arg_nodes.iter() {
                values.push(gen_expression(compiler, arg)?.into());
            }

            Ok(compiler
                .builder
                .build_call(function, &values, "")?
                .try_as_basic_value()
                .left()
                .unwrap_or_else(|| compiler.context.i32_type().const_zero().into()))
        }
        NodeKind::SysCall { routine, args } => gen_sys_call(compiler, *routine, args),
        _ => Err(malformed("routine or system call", call)),
    }
}

pub(crate) fn int_operand<'ctx>(
    value: BasicValueEnum<'ctx>,
    what: &'static str,
) -> Result<IntValue<'ctx>, CodegenError> {
    match value {
        BasicValueEnum::IntValue(int) => Ok(int),
        other => Err(ErrorKind::MalformedNode {
            expected: what,
            found: value_type_name(&other),
        }
        .into()),
    }
}

fn int_predicate(op: BinaryOp) -> Option<IntPredicate> {
    match op {
        BinaryOp::Gt => Some(IntPredicate::SGT),
        BinaryOp::Ge => Some(IntPredicate::SGE),
        BinaryOp::Lt => Some(IntPredicate::SLT),
        BinaryOp::Le => Some(IntPredicate::SLE),
        BinaryOp::Eq => Some(IntPredicate::EQ),
        BinaryOp::Ne => Some(IntPredicate::NE),
        _ => None,
    }
}

fn float_predicate(op: BinaryOp) -> Option<FloatPredicate> {
    match op {
        BinaryOp::Gt => Some(FloatPredicate::OGT),
        BinaryOp::Ge => Some(FloatPredicate::OGE),
        BinaryOp::Lt => Some(FloatPredicate::OLT),
        BinaryOp::Le => Some(FloatPredicate::OLE),
        BinaryOp::Eq => Some(FloatPredicate::OEQ),
        BinaryOp::Ne => Some(FloatPredicate::ONE),
        _ => None,
    }
}

fn invalid_operator(op: BinaryOp, lhs: &'static str, rhs: &'static str) -> CodegenError {
    ErrorKind::InvalidOperator {
        op: op.to_string(),
        lhs,
        rhs,
    }
    .into()
}

/// Dispatches a binary operator on the pair of operand types.
///
/// Priority order: (boolean, boolean), (integer, integer), either side
/// real, (char, char). Within a pair the comparison set is checked
/// before the arithmetic table; true division of integers promotes both
/// sides to real.
fn gen_binop<'ctx>(
    compiler: &Compiler<'ctx>,
    op: BinaryOp,
    lhs_node: &NodeRef,
    rhs_node: &NodeRef,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let lhs = gen_expression(compiler, lhs_node)?;
    let rhs = gen_expression(compiler, rhs_node)?;
    let builder = &compiler.builder;

    let int_pair = |width: u32| -> Option<(IntValue<'ctx>, IntValue<'ctx>)> {
        match (lhs, rhs) {
            (BasicValueEnum::IntValue(l), BasicValueEnum::IntValue(r))
                if l.get_type().get_bit_width() == width
                    && r.get_type().get_bit_width() == width =>
            {
                Some((l, r))
            }
            _ => None,
        }
    };

    if let Some((l, r)) = int_pair(1) {
        if let Some(predicate) = int_predicate(op) {
            return Ok(builder.build_int_compare(predicate, l, r, "")?.into());
        }
        let value = match op {
            BinaryOp::And => builder.build_and(l, r, "")?,
            BinaryOp::Or => builder.build_or(l, r, "")?,
            BinaryOp::Xor => builder.build_xor(l, r, "")?,
            _ => return Err(invalid_operator(op, "boolean", "boolean")),
        };
        return Ok(value.into());
    }

    if let Some((l, r)) = int_pair(32) {
        if let Some(predicate) = int_predicate(op) {
            return Ok(builder.build_int_compare(predicate, l, r, "")?.into());
        }
        let value: BasicValueEnum<'ctx> = match op {
            BinaryOp::Add => builder.build_int_add(l, r, "")?.into(),
            BinaryOp::Sub => builder.build_int_sub(l, r, "")?.into(),
            BinaryOp::Mul => builder.build_int_mul(l, r, "")?.into(),
            BinaryOp::Div => builder.build_int_signed_div(l, r, "")?.into(),
            BinaryOp::Mod => builder.build_int_signed_rem(l, r, "")?.into(),
            BinaryOp::And => builder.build_and(l, r, "")?.into(),
            BinaryOp::Or => builder.build_or(l, r, "")?.into(),
            BinaryOp::Xor => builder.build_xor(l, r, "")?.into(),
            BinaryOp::TrueDiv => {
                let f64_type = compiler.context.f64_type();
                let l = builder.build_signed_int_to_float(l, f64_type, "")?;
                let r = builder.build_signed_int_to_float(r, f64_type, "")?;
                builder.build_float_div(l, r, "")?.into()
            }
            _ => return Err(invalid_operator(op, "integer", "integer")),
        };
        return Ok(value);
    }

    if lhs.is_float_value() || rhs.is_float_value() {
        let f64_type = compiler.context.f64_type();
        let promote = |value: BasicValueEnum<'ctx>| -> Result<_, CodegenError> {
            match value {
                BasicValueEnum::FloatValue(float) => Ok(float),
                BasicValueEnum::IntValue(int) => {
                    Ok(builder.build_signed_int_to_float(int, f64_type, "")?)
                }
                other => Err(invalid_operator(op, value_type_name(&other), "real")),
            }
        };
        let l = promote(lhs)?;
        let r = promote(rhs)?;
        if let Some(predicate) = float_predicate(op) {
            return Ok(builder.build_float_compare(predicate, l, r, "")?.into());
        }
        let value = match op {
            BinaryOp::Add => builder.build_float_add(l, r, "")?,
            BinaryOp::Sub => builder.build_float_sub(l, r, "")?,
            BinaryOp::Mul => builder.build_float_mul(l, r, "")?,
            BinaryOp::TrueDiv => builder.build_float_div(l, r, "")?,
            _ => return Err(invalid_operator(op, "real", "real")),
        };
        return Ok(value.into());
    }

    if let Some((l, r)) = int_pair(8) {
        // chars compare, nothing else
        if let Some(predicate) = int_predicate(op) {
            return Ok(builder.build_int_compare(predicate, l, r, "")?.into());
        }
        return Err(invalid_operator(op, "char", "char"));
    }

    Err(invalid_operator(
        op,
        value_type_name(&lhs),
        value_type_name(&rhs),
    ))
}
