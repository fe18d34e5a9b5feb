//! Builtin routine lowering.
//!
//! The language's builtins lower against libc: `write`/`writeln` become
//! printf calls with a per-argument format specifier chosen from the
//! operand's LLVM type, `read`/`readln` become scanf calls storing
//! through left-value addresses, and the scalar builtins (`abs`, `sqrt`,
//! `chr`, `ord`, `succ`, `pred`) become a handful of instructions or a
//! libm call.

use inkwell::values::{BasicValueEnum, FunctionValue};
use inkwell::IntPredicate;

use crate::ast::ast::{NodeKind, NodeRef};
use crate::ast::expressions::{malformed, SysRoutine};
use crate::compiler::compiler::Compiler;
use crate::compiler::expr::{gen_address, gen_expression};
use crate::errors::errors::{CodegenError, ErrorKind};

/// A libc function declared up front by the compiler.
fn runtime<'ctx>(compiler: &Compiler<'ctx>, name: &str) -> FunctionValue<'ctx> {
    compiler
        .module
        .get_function(name)
        .unwrap_or_else(|| panic!("runtime function {} not declared", name))
}

fn invalid_argument(routine: SysRoutine) -> CodegenError {
    ErrorKind::InvalidArgument {
        routine: routine.to_string(),
    }
    .into()
}

pub fn gen_sys_call<'ctx>(
    compiler: &Compiler<'ctx>,
    routine: SysRoutine,
    args: &NodeRef,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    if !matches!(args.kind, NodeKind::ArgList) {
        return Err(malformed("ArgList", args));
    }
    match routine {
        SysRoutine::Write => gen_write(compiler, args, false),
        SysRoutine::Writeln => gen_write(compiler, args, true),
        SysRoutine::Read => gen_read(compiler, routine, args, false),
        SysRoutine::Readln => gen_read(compiler, routine, args, true),
        SysRoutine::Abs
        | SysRoutine::Sqrt
        | SysRoutine::Chr
        | SysRoutine::Ord
        | SysRoutine::Succ
        | SysRoutine::Pred => {
            let arg_nodes = args.children();
            if arg_nodes.len() != 1 {
                return Err(ErrorKind::ArityMismatch {
                    routine: routine.to_string(),
                    expected: 1,
                    received: arg_nodes.len(),
                }
                .into());
            }
            let value = gen_expression(compiler, &arg_nodes[0])?;
            gen_scalar_builtin(compiler, routine, value)
        }
    }
}

fn gen_write<'ctx>(
    compiler: &Compiler<'ctx>,
    args: &NodeRef,
    newline: bool,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let printf = runtime(compiler, "printf");
    let i32_type = compiler.context.i32_type();

    for arg in args.children().iter() {
        let value = gen_expression(compiler, arg)?;
        let (format, promoted): (&str, BasicValueEnum<'ctx>) = match value {
            BasicValueEnum::IntValue(int) => match int.get_type().get_bit_width() {
                // vararg promotion: sub-int operands widen to i32
                1 => (
                    "%d",
                    compiler.builder.build_int_z_extend(int, i32_type, "")?.into(),
                ),
                8 => (
                    "%c",
                    compiler.builder.build_int_z_extend(int, i32_type, "")?.into(),
                ),
                _ => ("%d", int.into()),
            },
            BasicValueEnum::FloatValue(float) => ("%f", float.into()),
            BasicValueEnum::PointerValue(ptr) => ("%s", ptr.into()),
            _ => return Err(invalid_argument(SysRoutine::Write)),
        };
        let format_ptr = compiler.const_cstring_ptr(format);
        compiler
            .builder
            .build_call(printf, &[format_ptr.into(), promoted.into()], "")?;
    }

    if newline {
        let newline_ptr = compiler.const_cstring_ptr("\n");
        compiler
            .builder
            .build_call(printf, &[newline_ptr.into()], "")?;
    }

    Ok(i32_type.const_zero().into())
}

fn gen_read<'ctx>(
    compiler: &Compiler<'ctx>,
    routine: SysRoutine,
    args: &NodeRef,
    newline: bool,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let scanf = runtime(compiler, "scanf");

    for arg in args.children().iter() {
        if !arg.is_left_value() {
            return Err(malformed("left value", arg));
        }
        let target = gen_address(compiler, arg)?;
        let format = match target.get_type().get_element_type() {
            inkwell::types::AnyTypeEnum::IntType(int_type) => {
                match int_type.get_bit_width() {
                    // leading space skips whitespace before a char
                    8 => " %c",
                    _ => "%d",
                }
            }
            inkwell::types::AnyTypeEnum::FloatType(_) => "%lf",
            _ => return Err(invalid_argument(routine)),
        };
        let format_ptr = compiler.const_cstring_ptr(format);
        compiler
            .builder
            .build_call(scanf, &[format_ptr.into(), target.into()], "")?;
    }

    if newline {
        // discard the rest of the input line, terminator included
        let skip_ptr = compiler.const_cstring_ptr("%*[^\n]");
        compiler.builder.build_call(scanf, &[skip_ptr.into()], "")?;
        compiler
            .builder
            .build_call(runtime(compiler, "getchar"), &[], "")?;
    }

    Ok(compiler.context.i32_type().const_zero().into())
}

fn gen_scalar_builtin<'ctx>(
    compiler: &Compiler<'ctx>,
    routine: SysRoutine,
    value: BasicValueEnum<'ctx>,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    let builder = &compiler.builder;
    let f64_type = compiler.context.f64_type();

    match routine {
        SysRoutine::Abs => match value {
            BasicValueEnum::IntValue(int) => {
                let zero = int.get_type().const_zero();
                let negative =
                    builder.build_int_compare(IntPredicate::SLT, int, zero, "")?;
                let negated = builder.build_int_neg(int, "")?;
                Ok(builder.build_select(negative, negated, int, "")?)
            }
            BasicValueEnum::FloatValue(float) => {
                let call = builder.build_call(runtime(compiler, "fabs"), &[float.into()], "")?;
                Ok(call
                    .try_as_basic_value()
                    .left()
                    .unwrap_or_else(|| f64_type.const_zero().into()))
            }
            _ => Err(invalid_argument(routine)),
        },
        SysRoutine::Sqrt => {
            let operand = match value {
                BasicValueEnum::FloatValue(float) => float,
                BasicValueEnum::IntValue(int) => {
                    builder.build_signed_int_to_float(int, f64_type, "")?
                }
                _ => return Err(invalid_argument(routine)),
            };
            let call = builder.build_call(runtime(compiler, "sqrt"), &[operand.into()], "")?;
            Ok(call
                .try_as_basic_value()
                .left()
                .unwrap_or_else(|| f64_type.const_zero().into()))
        }
        SysRoutine::Chr => match value {
            BasicValueEnum::IntValue(int) if int.get_type().get_bit_width() == 32 => Ok(builder
                .build_int_truncate(int, compiler.context.i8_type(), "")?
                .into()),
            _ => Err(invalid_argument(routine)),
        },
        SysRoutine::Ord => match value {
            BasicValueEnum::IntValue(int) if int.get_type().get_bit_width() == 8 => Ok(builder
                .build_int_z_extend(int, compiler.context.i32_type(), "")?
                .into()),
            _ => Err(invalid_argument(routine)),
        },
        SysRoutine::Succ => match value {
            BasicValueEnum::IntValue(int) => {
                let one = int.get_type().const_int(1, false);
                Ok(builder.build_int_add(int, one, "")?.into())
            }
            _ => Err(invalid_argument(routine)),
        },
        SysRoutine::Pred => match value {
            BasicValueEnum::IntValue(int) => {
                let one = int.get_type().const_int(1, false);
                Ok(builder.build_int_sub(int, one, "")?.into())
            }
            _ => Err(invalid_argument(routine)),
        },
        SysRoutine::Write | SysRoutine::Writeln | SysRoutine::Read | SysRoutine::Readln => {
            unreachable!("io builtins are lowered separately")
        }
    }
}
