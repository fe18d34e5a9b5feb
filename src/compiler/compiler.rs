//! Main lowering module.
//!
//! This module contains the core Compiler structure and the entry point
//! of the lowering pass from AST to LLVM IR. It manages the LLVM context,
//! module and builder, type layout resolution, symbol storage allocation,
//! verification and optimization passes, and target emission.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use inkwell::{
    attributes::{Attribute, AttributeLoc},
    basic_block::BasicBlock,
    context::Context,
    module::{Linkage, Module},
    passes::PassManager,
    targets::{CodeModel, FileType, InitializationConfig, RelocMode, Target, TargetMachine},
    types::{BasicType, BasicTypeEnum, FunctionType, StructType},
    values::{BasicValueEnum, FunctionValue, PointerValue},
    AddressSpace, OptimizationLevel,
};
use log::info;

use crate::ast::ast::{NodeKind, NodeRef};
use crate::ast::expressions::malformed;
use crate::ast::types::{RecordType, TypeDesc, TypeTag};
use crate::compiler::routine::gen_program;
use crate::compiler::symbol::{Scope, Symbol, SymbolTable};
use crate::errors::errors::{CodegenError, ErrorKind};

/// Output flavor produced from a lowered module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitTarget {
    LlvmIr,
    Assembly,
    Object,
}

/// The state of one lowering pass.
///
/// Holds the LLVM plumbing (context, module, builder, pass managers), the
/// two-tier symbol table, the record layout cache and the scope flag that
/// routes declarations to global or local storage. Lowering is
/// single-threaded and synchronous; instructions are emitted in exact
/// tree order.
///
/// # Type Parameters
///
/// * `'ctx` - Lifetime of the LLVM context
pub struct Compiler<'ctx> {
    pub context: &'ctx Context,
    pub module: Module<'ctx>,
    pub builder: inkwell::builder::Builder<'ctx>,
    /// Function-level optimization passes, present only when optimization
    /// was requested.
    fpm: Option<PassManager<FunctionValue<'ctx>>>,
    /// Module-level optimization passes, present only when optimization
    /// was requested.
    mpm: Option<PassManager<Module<'ctx>>>,
    target_machine: Option<TargetMachine>,
    pub symbols: SymbolTable<'ctx>,
    /// LLVM struct types per record descriptor, built on first layout
    /// resolution and reused afterwards.
    record_layouts: RefCell<HashMap<u32, StructType<'ctx>>>,
    /// Routes declarations: false while lowering the program head,
    /// true while lowering subroutines.
    pub is_subroutine: bool,
}

impl<'ctx> Compiler<'ctx> {
    pub fn new(context: &'ctx Context, module_name: &str, optimize: bool) -> Self {
        let module = context.create_module(module_name);

        let mut fpm = None;
        let mut mpm = None;
        if optimize {
            let function_passes: PassManager<FunctionValue<'ctx>> = PassManager::create(&module);
            // mem2reg first: every variable lives in an alloca until
            // this promotion
            function_passes.add_promote_memory_to_register_pass();
            function_passes.add_instruction_combining_pass();
            function_passes.add_reassociate_pass();
            function_passes.add_gvn_pass();
            function_passes.add_cfg_simplification_pass();
            function_passes.initialize();
            fpm = Some(function_passes);

            let module_passes: PassManager<Module<'ctx>> = PassManager::create(());
            module_passes.add_constant_merge_pass();
            module_passes.add_function_inlining_pass();
            mpm = Some(module_passes);
        }

        let compiler = Compiler {
            builder: context.create_builder(),
            module,
            context,
            fpm,
            mpm,
            target_machine: None,
            symbols: SymbolTable::new(),
            record_layouts: RefCell::new(HashMap::new()),
            is_subroutine: false,
        };
        compiler.declare_runtime_functions();
        compiler
    }

    /// Declares the C library externals the builtins lower against:
    /// printf, scanf, getchar, fabs and sqrt.
    fn declare_runtime_functions(&self) {
        let i8_ptr_type = self.context.i8_type().ptr_type(AddressSpace::default());
        let i32_type = self.context.i32_type();
        let f64_type = self.context.f64_type();

        let printf_type = i32_type.fn_type(&[i8_ptr_type.into()], true);
        self.module
            .add_function("printf", printf_type, Some(Linkage::External));

        let scanf_type = i32_type.fn_type(&[i8_ptr_type.into()], true);
        self.module
            .add_function("scanf", scanf_type, Some(Linkage::External));

        let getchar_type = i32_type.fn_type(&[], false);
        self.module
            .add_function("getchar", getchar_type, Some(Linkage::External));

        let fabs_type = f64_type.fn_type(&[f64_type.into()], false);
        self.module
            .add_function("fabs", fabs_type, Some(Linkage::External));

        let sqrt_type = f64_type.fn_type(&[f64_type.into()], false);
        self.module
            .add_function("sqrt", sqrt_type, Some(Linkage::External));
    }

    /// Initializes the host target and stamps the module with its triple
    /// and data layout, keeping the machine around for later emission.
    fn setup_target_machine(&mut self) -> Result<(), CodegenError> {
        Target::initialize_all(&InitializationConfig::default());
        let target_triple = TargetMachine::get_default_triple();
        let target = Target::from_triple(&target_triple).map_err(|e| ErrorKind::Target {
            message: e.to_string(),
        })?;
        let opt_level = if self.fpm.is_some() {
            OptimizationLevel::Aggressive
        } else {
            OptimizationLevel::Default
        };
        let target_machine = target
            .create_target_machine(
                &target_triple,
                "generic",
                "",
                opt_level,
                RelocMode::PIC,
                CodeModel::Default,
            )
            .ok_or_else(|| ErrorKind::Target {
                message: "could not create a target machine for the host triple".to_string(),
            })?;

        self.module.set_triple(&target_triple);
        self.module
            .set_data_layout(&target_machine.get_target_data().get_data_layout());
        self.target_machine = Some(target_machine);
        Ok(())
    }

    /// Resolves a type descriptor to its LLVM storage layout.
    ///
    /// Aliases are looked up in the alias scope active right now, local
    /// scope first. Undefined, void and set have no storage layout and
    /// fail here.
    pub fn llvm_type(&self, ty: &TypeDesc) -> Result<BasicTypeEnum<'ctx>, CodegenError> {
        match ty {
            TypeDesc::Simple(TypeTag::Boolean) => Ok(self.context.bool_type().into()),
            TypeDesc::Simple(TypeTag::Integer) => Ok(self.context.i32_type().into()),
            TypeDesc::Simple(TypeTag::Real) => Ok(self.context.f64_type().into()),
            TypeDesc::Simple(TypeTag::Char) => Ok(self.context.i8_type().into()),
            TypeDesc::Simple(TypeTag::String) => Ok(self
                .context
                .i8_type()
                .ptr_type(AddressSpace::default())
                .into()),
            TypeDesc::Alias(name) => {
                let target = self.resolve_alias(name)?;
                self.llvm_type(&target)
            }
            TypeDesc::Array(array) => {
                let element = self.llvm_type(&array.element)?;
                Ok(element.array_type(array.range.length()).into())
            }
            TypeDesc::Record(record) => Ok(self.record_layout(record)?.into()),
            TypeDesc::Simple(tag) => Err(ErrorKind::UnsupportedType {
                name: tag.to_string(),
            }
            .into()),
            TypeDesc::Set => Err(ErrorKind::UnsupportedType {
                name: TypeTag::Set.to_string(),
            }
            .into()),
        }
    }

    /// The LLVM struct for a record, created on first use and cached.
    /// Field order is declaration order.
    fn record_layout(&self, record: &RecordType) -> Result<StructType<'ctx>, CodegenError> {
        if let Some(layout) = self.record_layouts.borrow().get(&record.layout_key()) {
            return Ok(*layout);
        }
        let mut field_types: Vec<BasicTypeEnum<'ctx>> = Vec::with_capacity(record.fields().len());
        for (_, field_type) in record.fields() {
            field_types.push(self.llvm_type(field_type)?);
        }
        let layout = self.context.struct_type(&field_types, false);
        self.record_layouts
            .borrow_mut()
            .insert(record.layout_key(), layout);
        Ok(layout)
    }

    pub fn resolve_alias(&self, name: &str) -> Result<Rc<TypeDesc>, CodegenError> {
        self.symbols
            .lookup_alias(name)
            .ok_or_else(|| {
                ErrorKind::UnresolvedType {
                    name: name.to_string(),
                }
                .into()
            })
    }

    /// Follows alias indirections until a concrete descriptor remains.
    /// A cycle among aliases reports the name that closed it.
    pub fn canonical_type(&self, ty: &Rc<TypeDesc>) -> Result<Rc<TypeDesc>, CodegenError> {
        let mut current = Rc::clone(ty);
        let mut seen: Vec<String> = Vec::new();
        while let TypeDesc::Alias(name) = current.as_ref() {
            if seen.iter().any(|previous| previous == name) {
                return Err(ErrorKind::UnresolvedType { name: name.clone() }.into());
            }
            seen.push(name.clone());
            current = self.resolve_alias(name)?;
        }
        Ok(current)
    }

    /// Declares a global symbol backed by an internal-linkage global.
    ///
    /// Without an initializer the slot is zero-initialized with a value
    /// fitting its layout. Constants keep their initializer and are
    /// marked immutable at the backend level.
    pub fn declare_global(
        &mut self,
        name: &str,
        ty: &Rc<TypeDesc>,
        initializer: Option<BasicValueEnum<'ctx>>,
        is_const: bool,
    ) -> Result<Rc<Symbol<'ctx>>, CodegenError> {
        self.symbols.assert_vacant(Scope::Global, name)?;
        let canonical = self.canonical_type(ty)?;
        let llvm_type = self.llvm_type(&canonical)?;
        let initializer = match initializer {
            Some(value) => value,
            None => zero_value(llvm_type)?,
        };
        let global = self.module.add_global(llvm_type, None, name);
        global.set_linkage(Linkage::Internal);
        global.set_initializer(&initializer);
        global.set_constant(is_const);
        self.symbols.insert(
            Scope::Global,
            Symbol {
                name: name.to_string(),
                ty: canonical,
                ptr: global.as_pointer_value(),
                is_const,
            },
        )
    }

    /// Declares a local symbol backed by a fresh stack slot in the
    /// current routine's frame.
    pub fn declare_local(
        &mut self,
        name: &str,
        ty: &Rc<TypeDesc>,
        is_const: bool,
    ) -> Result<Rc<Symbol<'ctx>>, CodegenError> {
        self.symbols.assert_vacant(Scope::Local, name)?;
        let canonical = self.canonical_type(ty)?;
        let llvm_type = self.llvm_type(&canonical)?;
        let slot = self.builder.build_alloca(llvm_type, name)?;
        self.symbols.insert(
            Scope::Local,
            Symbol {
                name: name.to_string(),
                ty: canonical,
                ptr: slot,
                is_const,
            },
        )
    }

    /// Local scope first, then global.
    pub fn lookup(&self, name: &str) -> Option<Rc<Symbol<'ctx>>> {
        self.symbols.lookup(name)
    }

    /// A pointer to a private null-terminated string constant.
    ///
    /// Built from constants only, so it is usable before any function
    /// exists (global constant initializers).
    pub fn const_cstring_ptr(&self, text: &str) -> PointerValue<'ctx> {
        let data = self.context.const_string(text.as_bytes(), true);
        let global = self.module.add_global(data.get_type(), None, ".str");
        global.set_linkage(Linkage::Private);
        global.set_constant(true);
        global.set_initializer(&data);
        let i8_ptr_type = self.context.i8_type().ptr_type(AddressSpace::default());
        global.as_pointer_value().const_cast(i8_ptr_type)
    }

    /// Creates a new function in the module with an entry block and
    /// positions the builder there. An existing declaration is reused.
    pub fn create_function(
        &self,
        name: &str,
        function_type: FunctionType<'ctx>,
    ) -> FunctionValue<'ctx> {
        let function = self.module.get_function(name).unwrap_or_else(|| {
            self.module
                .add_function(name, function_type, Some(Linkage::External))
        });

        let entry = self.context.append_basic_block(function, "entry");
        self.builder.position_at_end(entry);

        let attributes = [
            self.context
                .create_enum_attribute(Attribute::get_named_enum_kind_id("uwtable"), 0),
            self.context
                .create_enum_attribute(Attribute::get_named_enum_kind_id("nounwind"), 0),
        ];
        for attribute in attributes.iter() {
            function.add_attribute(AttributeLoc::Function, *attribute);
        }

        function
    }

    /// The function the builder is currently emitting into.
    pub fn current_function(&self) -> FunctionValue<'ctx> {
        self.builder
            .get_insert_block()
            .and_then(|block| block.get_parent())
            .expect("builder is not positioned inside a function")
    }

    /// Appends a basic block to the current function.
    pub fn append_block(&self, name: &str) -> BasicBlock<'ctx> {
        self.context.append_basic_block(self.current_function(), name)
    }

    /// Verifies a fully lowered function and runs the function pass
    /// pipeline on it when optimization is enabled.
    pub fn finish_function(
        &self,
        function: FunctionValue<'ctx>,
        name: &str,
    ) -> Result<(), CodegenError> {
        if !function.verify(true) {
            return Err(ErrorKind::BrokenFunction {
                name: name.to_string(),
            }
            .into());
        }
        if let Some(fpm) = &self.fpm {
            fpm.run_on(&function);
        }
        Ok(())
    }

    pub fn run_module_passes(&self) {
        if let Some(mpm) = &self.mpm {
            mpm.run_on(&self.module);
        }
    }

    /// Writes the lowered module as IR text, assembly or an object file.
    pub fn emit(&self, target: EmitTarget, output_file: &Path) -> Result<(), CodegenError> {
        match target {
            EmitTarget::LlvmIr => {
                self.module
                    .print_to_file(output_file)
                    .map_err(|e| ErrorKind::Target {
                        message: e.to_string(),
                    })?
            }
            EmitTarget::Assembly | EmitTarget::Object => {
                let file_type = if target == EmitTarget::Assembly {
                    FileType::Assembly
                } else {
                    FileType::Object
                };
                let target_machine =
                    self.target_machine
                        .as_ref()
                        .ok_or_else(|| ErrorKind::Target {
                            message: "no target machine configured".to_string(),
                        })?;
                target_machine
                    .write_to_file(&self.module, file_type, output_file)
                    .map_err(|e| ErrorKind::Target {
                        message: e.to_string(),
                    })?
            }
        }
        Ok(())
    }

    /// The module's textual IR, mostly for tests and logging.
    pub fn ir_to_string(&self) -> String {
        self.module.print_to_string().to_string()
    }
}

fn zero_value<'ctx>(ty: BasicTypeEnum<'ctx>) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    match ty {
        BasicTypeEnum::IntType(int_type) => Ok(int_type.const_zero().into()),
        BasicTypeEnum::FloatType(float_type) => Ok(float_type.const_zero().into()),
        BasicTypeEnum::ArrayType(array_type) => Ok(array_type.const_zero().into()),
        BasicTypeEnum::StructType(struct_type) => Ok(struct_type.const_zero().into()),
        BasicTypeEnum::PointerType(pointer_type) => Ok(pointer_type.const_null().into()),
        other => Err(ErrorKind::UnsupportedType {
            name: format!("{:?}", other),
        }
        .into()),
    }
}

/// The main compile function: lowers a whole program node into a verified
/// LLVM module.
///
/// Any violated contract aborts the pass; the partially built module must
/// be discarded by the caller.
///
/// # Arguments
///
/// * `program` - The program root node produced by the parser
/// * `optimize` - Whether to run the optimization pipelines
/// * `context` - Reference to the LLVM context
///
/// # Returns
///
/// The Compiler holding the finished module, ready for emission.
pub fn compile<'ctx>(
    program: &NodeRef,
    optimize: bool,
    context: &'ctx Context,
) -> Result<Compiler<'ctx>, CodegenError> {
    let NodeKind::Program { name, .. } = &program.kind else {
        return Err(malformed("Program", program));
    };
    let module_name = name
        .identifier_name()
        .map(|n| n.to_string())
        .unwrap_or_else(|| "main".to_string());

    info!("lowering program {:?}", module_name);
    let mut compiler = Compiler::new(context, &module_name, optimize);
    compiler.setup_target_machine()?;
    gen_program(&mut compiler, program)?;
    compiler.run_module_passes();
    Ok(compiler)
}
