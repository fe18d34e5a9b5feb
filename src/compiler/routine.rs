//! Routine and program lowering.
//!
//! A program lowers its constants, type aliases and variables at global
//! scope, then every subroutine at local scope, and finally its own body
//! into a `main` function returning integer zero. Each subroutine binds
//! its parameters into fresh local slots, pre-declares a local slot named
//! after itself when it returns a value (assigning to the routine's own
//! name sets the return value), and resets the local scope once it has
//! been verified.

use std::rc::Rc;

use inkwell::types::{BasicMetadataTypeEnum, BasicType};
use inkwell::values::BasicValueEnum;
use log::debug;

use crate::ast::ast::{NodeKind, NodeRef};
use crate::ast::expressions::malformed;
use crate::ast::types::{TypeDesc, TypeTag};
use crate::compiler::compiler::Compiler;
use crate::compiler::expr::gen_expression;
use crate::compiler::stmt::gen_statement;
use crate::compiler::symbol::Scope;
use crate::errors::errors::{CodegenError, ErrorKind};

/// Lowers the program root: global declarations, subroutines, then the
/// entry function.
pub fn gen_program<'ctx>(
    compiler: &mut Compiler<'ctx>,
    program: &NodeRef,
) -> Result<(), CodegenError> {
    let NodeKind::Program { name, head } = &program.kind else {
        return Err(malformed("Program", program));
    };
    let program_name = name
        .identifier_name()
        .ok_or_else(|| malformed("Identifier", name))?;
    let NodeKind::HeadList {
        consts,
        types,
        vars,
        subroutines,
    } = &head.kind
    else {
        return Err(malformed("HeadList", head));
    };

    compiler.is_subroutine = false;
    gen_const_list(compiler, consts)?;
    gen_type_list(compiler, types)?;
    gen_var_list(compiler, vars)?;

    compiler.is_subroutine = true;
    gen_subroutine_list(compiler, subroutines)?;
    compiler.is_subroutine = false;

    debug!("lowering entry routine of program {:?}", program_name);
    let function_type = compiler.context.i32_type().fn_type(&[], false);
    let main_function = compiler.create_function("main", function_type);

    for statement in program.children().iter() {
        gen_statement(compiler, statement)?;
    }
    let zero = compiler.context.i32_type().const_zero();
    compiler.builder.build_return(Some(&zero))?;

    compiler.finish_function(main_function, "main")
}

/// Lowers one subroutine into its own LLVM function.
pub fn gen_subroutine<'ctx>(
    compiler: &mut Compiler<'ctx>,
    subroutine: &NodeRef,
) -> Result<(), CodegenError> {
    let NodeKind::Subroutine {
        name,
        params,
        return_type,
        head,
    } = &subroutine.kind
    else {
        return Err(malformed("Subroutine", subroutine));
    };
    let routine_name = name
        .identifier_name()
        .ok_or_else(|| malformed("Identifier", name))?
        .to_string();
    debug!("lowering subroutine {:?}", routine_name);

    // a nested routine must not clobber the builder position of the
    // routine that declared it
    let previous_position = compiler.builder.get_insert_block();

    let mut param_names: Vec<String> = Vec::new();
    let mut param_types: Vec<Rc<TypeDesc>> = Vec::new();
    let mut llvm_params: Vec<BasicMetadataTypeEnum<'ctx>> = Vec::new();
    for param in params.children().iter() {
        let NodeKind::ParamDecl { name, ty } = &param.kind else {
            return Err(malformed("ParamDecl", param));
        };
        let param_name = name
            .identifier_name()
            .ok_or_else(|| malformed("Identifier", name))?;
        param_names.push(param_name.to_string());
        llvm_params.push(compiler.llvm_type(ty)?.into());
        param_types.push(Rc::clone(ty));
    }

    let returns_value = compiler.canonical_type(return_type)?.tag() != TypeTag::Void;
    let function_type = if returns_value {
        compiler.llvm_type(return_type)?.fn_type(&llvm_params, false)
    } else {
        compiler.context.void_type().fn_type(&llvm_params, false)
    };

    let function = compiler.create_function(&routine_name, function_type);

    // incoming parameters become mutable locals: store on entry
    for (index, argument) in function.get_param_iter().enumerate() {
        let symbol = compiler.declare_local(&param_names[index], &param_types[index], false)?;
        compiler.builder.build_store(symbol.ptr, argument)?;
    }

    // assigning to the routine's own name sets the return value
    if returns_value {
        compiler.declare_local(&routine_name, return_type, false)?;
    }

    gen_head_list(compiler, head)?;

    for statement in subroutine.children().iter() {
        gen_statement(compiler, statement)?;
    }

    if returns_value {
        let result_slot = compiler
            .symbols
            .get(Scope::Local, &routine_name)
            .ok_or_else(|| {
                CodegenError::from(ErrorKind::UndefinedIdentifier {
                    name: routine_name.clone(),
                })
            })?;
        let result = compiler.builder.build_load(result_slot.ptr, "result")?;
        compiler.builder.build_return(Some(&result))?;
    } else {
        compiler.builder.build_return(None)?;
    }

    compiler.finish_function(function, &routine_name)?;

    // clear local bindings before the next routine; stale bindings must
    // not leak across routine boundaries
    compiler.symbols.reset_locals();

    if let Some(position) = previous_position {
        compiler.builder.position_at_end(position);
    } else {
        compiler.builder.clear_insertion_position();
    }
    Ok(())
}

/// Lowers a head list in declaration order: constants, type aliases,
/// variables, then nested subroutines.
pub fn gen_head_list<'ctx>(
    compiler: &mut Compiler<'ctx>,
    head: &NodeRef,
) -> Result<(), CodegenError> {
    let NodeKind::HeadList {
        consts,
        types,
        vars,
        subroutines,
    } = &head.kind
    else {
        return Err(malformed("HeadList", head));
    };
    gen_const_list(compiler, consts)?;
    gen_type_list(compiler, types)?;
    gen_var_list(compiler, vars)?;
    gen_subroutine_list(compiler, subroutines)
}

fn gen_subroutine_list<'ctx>(
    compiler: &mut Compiler<'ctx>,
    list: &NodeRef,
) -> Result<(), CodegenError> {
    for subroutine in list.children().iter() {
        gen_subroutine(compiler, subroutine)?;
    }
    Ok(())
}

fn gen_const_list<'ctx>(
    compiler: &mut Compiler<'ctx>,
    list: &NodeRef,
) -> Result<(), CodegenError> {
    for declaration in list.children().iter() {
        gen_const_decl(compiler, declaration)?;
    }
    Ok(())
}

fn gen_type_list<'ctx>(
    compiler: &mut Compiler<'ctx>,
    list: &NodeRef,
) -> Result<(), CodegenError> {
    for declaration in list.children().iter() {
        gen_type_def(compiler, declaration)?;
    }
    Ok(())
}

fn gen_var_list<'ctx>(compiler: &mut Compiler<'ctx>, list: &NodeRef) -> Result<(), CodegenError> {
    for declaration in list.children().iter() {
        gen_var_decl(compiler, declaration)?;
    }
    Ok(())
}

/// The descriptor matching a constant literal node.
fn literal_type(value: &NodeRef) -> Result<Rc<TypeDesc>, CodegenError> {
    match &value.kind {
        NodeKind::Boolean(_) => Ok(TypeDesc::boolean()),
        NodeKind::Integer(_) => Ok(TypeDesc::integer()),
        NodeKind::Real(_) => Ok(TypeDesc::real()),
        NodeKind::Char(_) => Ok(TypeDesc::char()),
        NodeKind::Str(_) => Ok(TypeDesc::string()),
        _ => Err(malformed("constant", value)),
    }
}

/// A constant literal as an LLVM constant, built without the instruction
/// builder so it is valid as a global initializer.
fn gen_constant_value<'ctx>(
    compiler: &Compiler<'ctx>,
    value: &NodeRef,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    match &value.kind {
        NodeKind::Boolean(v) => Ok(compiler
            .context
            .bool_type()
            .const_int(*v as u64, false)
            .into()),
        NodeKind::Integer(v) => Ok(compiler
            .context
            .i32_type()
            .const_int(*v as i64 as u64, true)
            .into()),
        NodeKind::Real(v) => Ok(compiler.context.f64_type().const_float(*v).into()),
        NodeKind::Char(v) => Ok(compiler
            .context
            .i8_type()
            .const_int(*v as u64, false)
            .into()),
        NodeKind::Str(v) => Ok(compiler.const_cstring_ptr(v).into()),
        _ => Err(malformed("constant", value)),
    }
}

fn gen_const_decl<'ctx>(
    compiler: &mut Compiler<'ctx>,
    declaration: &NodeRef,
) -> Result<(), CodegenError> {
    let NodeKind::ConstDecl { name, value } = &declaration.kind else {
        return Err(malformed("ConstDecl", declaration));
    };
    let const_name = name
        .identifier_name()
        .ok_or_else(|| malformed("Identifier", name))?;
    let ty = literal_type(value)?;

    if compiler.is_subroutine {
        // locals live in the routine frame; the initializer is an
        // explicit store rather than a backend-level constant
        let symbol = compiler.declare_local(const_name, &ty, true)?;
        let initializer = gen_expression(compiler, value)?;
        compiler.builder.build_store(symbol.ptr, initializer)?;
    } else {
        let initializer = gen_constant_value(compiler, value)?;
        compiler.declare_global(const_name, &ty, Some(initializer), true)?;
    }
    Ok(())
}

fn gen_var_decl<'ctx>(
    compiler: &mut Compiler<'ctx>,
    declaration: &NodeRef,
) -> Result<(), CodegenError> {
    let NodeKind::VarDecl { name, ty } = &declaration.kind else {
        return Err(malformed("VarDecl", declaration));
    };
    let var_name = name
        .identifier_name()
        .ok_or_else(|| malformed("Identifier", name))?;

    if compiler.is_subroutine {
        compiler.declare_local(var_name, ty, false)?;
    } else {
        compiler.declare_global(var_name, ty, None, false)?;
    }
    Ok(())
}

fn gen_type_def<'ctx>(
    compiler: &mut Compiler<'ctx>,
    declaration: &NodeRef,
) -> Result<(), CodegenError> {
    let NodeKind::TypeDef { name, ty } = &declaration.kind else {
        return Err(malformed("TypeDef", declaration));
    };
    let alias_name = name
        .identifier_name()
        .ok_or_else(|| malformed("Identifier", name))?;

    let scope = if compiler.is_subroutine {
        Scope::Local
    } else {
        Scope::Global
    };
    compiler
        .symbols
        .insert_alias(scope, alias_name, Rc::clone(ty))
}
