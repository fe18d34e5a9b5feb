extern crate log;
extern crate simplelog;

use std::fs;
use std::path::PathBuf;
use std::process::exit;
use std::time::Instant;

use clap::{App, Arg, ArgMatches};
use inkwell::context::Context;
use log::{info, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use pascalc::ast::ast::{Direction, Node, NodeRef};
use pascalc::ast::expressions::{BinaryOp, SysRoutine};
use pascalc::ast::types::{RecordType, TypeDesc};
use pascalc::compiler::compiler::{compile, EmitTarget};
use pascalc::errors::errors::CodegenError;

// The parser frontend is an external collaborator; until it is hooked up
// this driver lowers a built-in showcase program so the whole pipeline
// (lowering, verification, optimization, emission) can be exercised from
// the command line.

fn configure_cli() -> App<'static, 'static> {
    App::new("pascalc")
        .version("0.1.0")
        .about("Lowers the built-in showcase program to LLVM IR, assembly or object code")
        .arg(
            Arg::with_name("emit-llvm")
                .long("emit-llvm")
                .help("Emit LLVM IR code (.ll); this is the default"),
        )
        .arg(
            Arg::with_name("assembly")
                .short("S")
                .help("Emit assembly code (.s)"),
        )
        .arg(
            Arg::with_name("object")
                .short("c")
                .help("Emit object code (.o)"),
        )
        .arg(
            Arg::with_name("optimize")
                .short("O")
                .help("Run the optimization pipelines"),
        )
        .arg(
            Arg::with_name("ast")
                .long("ast")
                .takes_value(true)
                .value_name("FILE")
                .help("Dump the program AST as JSON to FILE"),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .takes_value(true)
                .value_name("NAME")
                .help("Base name of the output file"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Enable debug logging"),
        )
}

fn configure_logging(matches: &ArgMatches) {
    let level = if matches.is_present("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let _ = TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    );
}

/// The built-in program: sums the squares of 1..limit into a record and
/// prints both fields.
fn showcase_program() -> Result<NodeRef, CodegenError> {
    let consts = Node::const_list();
    consts.add_child(Node::const_decl(
        Node::identifier("limit"),
        Node::integer(5),
    )?);

    let mut pair = RecordType::new();
    pair.add_field("first", TypeDesc::integer())?;
    pair.add_field("second", TypeDesc::integer())?;
    let types = Node::type_list();
    types.add_child(Node::type_def(
        Node::identifier("pair"),
        TypeDesc::record(pair),
    )?);

    let vars = Node::var_list();
    vars.add_child(Node::var_decl(Node::identifier("i"), TypeDesc::integer())?);
    vars.add_child(Node::var_decl(
        Node::identifier("total"),
        TypeDesc::integer(),
    )?);
    vars.add_child(Node::var_decl(
        Node::identifier("p"),
        TypeDesc::alias("pair"),
    )?);

    // function square(n: integer): integer; begin square := n * n end
    let params = Node::param_list();
    params.add_child(Node::param_decl(
        Node::identifier("n"),
        TypeDesc::integer(),
    )?);
    let square = Node::subroutine(
        Node::identifier("square"),
        params,
        TypeDesc::integer(),
        Node::empty_head(),
    )?;
    square.add_child(Node::assign(
        Node::identifier("square"),
        Node::binop(
            BinaryOp::Mul,
            Node::identifier("n"),
            Node::identifier("n"),
        )?,
    )?);
    let subroutines = Node::subroutine_list();
    subroutines.add_child(square);

    let program = Node::program(
        Node::identifier("showcase"),
        Node::head_list(consts, types, vars, subroutines)?,
    )?;

    // total := 0;
    // for i := 1 to limit do total := total + square(i);
    program.add_child(Node::assign(Node::identifier("total"), Node::integer(0))?);
    let call = Node::func_expr(Node::routine_call(
        Node::identifier("square"),
        Node::arg_list_of(&[Node::identifier("i")])?,
    )?)?;
    let step = Node::assign(
        Node::identifier("total"),
        Node::binop(BinaryOp::Add, Node::identifier("total"), call)?,
    )?;
    program.add_child(Node::for_stmt(
        Direction::To,
        Node::identifier("i"),
        Node::integer(1),
        Node::identifier("limit"),
        step,
    )?);

    // p.first := total; p.second := total div 2; writeln both
    program.add_child(Node::assign(
        Node::record_ref(Node::identifier("p"), Node::identifier("first"))?,
        Node::identifier("total"),
    )?);
    program.add_child(Node::assign(
        Node::record_ref(Node::identifier("p"), Node::identifier("second"))?,
        Node::binop(BinaryOp::Div, Node::identifier("total"), Node::integer(2))?,
    )?);
    program.add_child(Node::proc_stmt(Node::sys_call(
        SysRoutine::Writeln,
        Node::arg_list_of(&[Node::record_ref(
            Node::identifier("p"),
            Node::identifier("first"),
        )?])?,
    )?)?);
    program.add_child(Node::proc_stmt(Node::sys_call(
        SysRoutine::Writeln,
        Node::arg_list_of(&[Node::record_ref(
            Node::identifier("p"),
            Node::identifier("second"),
        )?])?,
    )?)?);

    Ok(program)
}

fn main() {
    let matches = configure_cli().get_matches();
    configure_logging(&matches);

    let program = match showcase_program() {
        Ok(program) => program,
        Err(error) => {
            eprintln!("{}", error);
            exit(1);
        }
    };

    if let Some(path) = matches.value_of("ast") {
        if let Err(error) = fs::write(path, program.to_json()) {
            eprintln!("failed to write {}: {}", path, error);
            exit(1);
        }
        info!("wrote AST dump to {}", path);
    }

    let target = if matches.is_present("assembly") {
        EmitTarget::Assembly
    } else if matches.is_present("object") {
        EmitTarget::Object
    } else {
        EmitTarget::LlvmIr
    };
    let extension = match target {
        EmitTarget::LlvmIr => "ll",
        EmitTarget::Assembly => "s",
        EmitTarget::Object => "o",
    };
    let output = format!(
        "{}.{}",
        matches.value_of("output").unwrap_or("showcase"),
        extension
    );

    let context = Context::create();
    let start = Instant::now();
    let compiled = match compile(&program, matches.is_present("optimize"), &context) {
        Ok(compiled) => compiled,
        Err(error) => {
            // a partially lowered module is useless; discard it
            eprintln!("{}", error);
            exit(1);
        }
    };
    info!("lowered program in {:?}", start.elapsed());

    if let Err(error) = compiled.emit(target, &PathBuf::from(&output)) {
        eprintln!("{}", error);
        exit(1);
    }
    info!("wrote {}", output);
}
