//! Statement and control-flow lowering.
//!
//! Each construct lowers independently into the CFG shape it needs:
//! if/then/else rejoining at a continuation block, pre-check while loops,
//! post-check repeat loops, counted for loops and chained equality checks
//! for case dispatch. Composition is purely structural; children lower
//! left to right as declared.

use inkwell::values::IntValue;
use inkwell::IntPredicate;

use crate::ast::ast::{Direction, NodeKind, NodeRef};
use crate::ast::expressions::malformed;
use crate::compiler::compiler::Compiler;
use crate::compiler::expr::{gen_address, gen_call, gen_expression, int_operand, value_type_name};
use crate::errors::errors::{CodegenError, ErrorKind};

fn bool_condition<'ctx>(
    compiler: &Compiler<'ctx>,
    condition: &NodeRef,
) -> Result<IntValue<'ctx>, CodegenError> {
    let value = gen_expression(compiler, condition)?;
    match value {
        inkwell::values::BasicValueEnum::IntValue(int)
            if int.get_type() == compiler.context.bool_type() =>
        {
            Ok(int)
        }
        other => Err(ErrorKind::InvalidCondition {
            found: value_type_name(&other),
        }
        .into()),
    }
}

pub fn gen_statement<'ctx>(
    compiler: &mut Compiler<'ctx>,
    statement: &NodeRef,
) -> Result<(), CodegenError> {
    match &statement.kind {
        NodeKind::Compound => {
            for child in statement.children().iter() {
                gen_statement(compiler, child)?;
            }
            Ok(())
        }
        NodeKind::Assign { lhs, rhs } => {
            let value = gen_expression(compiler, rhs)?;
            let target = gen_address(compiler, lhs)?;
            compiler.builder.build_store(target, value)?;
            Ok(())
        }
        NodeKind::ProcStmt { call } => {
            // result, if any, is discarded
            gen_call(compiler, call)?;
            Ok(())
        }
        NodeKind::If {
            condition,
            then_stmt,
            else_stmt,
        } => {
            let condition = bool_condition(compiler, condition)?;

            let then_block = compiler.append_block("then");
            let else_block = else_stmt
                .as_ref()
                .map(|_| compiler.append_block("else"));
            let end_block = compiler.append_block("end");

            compiler.builder.build_conditional_branch(
                condition,
                then_block,
                else_block.unwrap_or(end_block),
            )?;

            compiler.builder.position_at_end(then_block);
            gen_statement(compiler, then_stmt)?;
            compiler.builder.build_unconditional_branch(end_block)?;

            if let (Some(else_stmt), Some(else_block)) = (else_stmt, else_block) {
                compiler.builder.position_at_end(else_block);
                gen_statement(compiler, else_stmt)?;
                compiler.builder.build_unconditional_branch(end_block)?;
            }

            compiler.builder.position_at_end(end_block);
            Ok(())
        }
        NodeKind::While { condition, body } => {
            let condition_block = compiler.append_block("cond");
            let body_block = compiler.append_block("body");
            let end_block = compiler.append_block("end");

            compiler.builder.build_unconditional_branch(condition_block)?;

            compiler.builder.position_at_end(condition_block);
            let keep_going = bool_condition(compiler, condition)?;
            compiler
                .builder
                .build_conditional_branch(keep_going, body_block, end_block)?;

            compiler.builder.position_at_end(body_block);
            gen_statement(compiler, body)?;
            compiler.builder.build_unconditional_branch(condition_block)?;

            compiler.builder.position_at_end(end_block);
            Ok(())
        }
        NodeKind::Repeat { condition } => {
            // post-check: the body runs before the condition is ever seen,
            // and the loop continues while the condition is false
            let body_block = compiler.append_block("body");
            let end_block = compiler.append_block("end");

            compiler.builder.build_unconditional_branch(body_block)?;

            compiler.builder.position_at_end(body_block);
            for child in statement.children().iter() {
                gen_statement(compiler, child)?;
            }
            let done = bool_condition(compiler, condition)?;
            compiler
                .builder
                .build_conditional_branch(done, end_block, body_block)?;

            compiler.builder.position_at_end(end_block);
            Ok(())
        }
        NodeKind::For {
            direction,
            counter,
            start,
            finish,
            body,
        } => {
            let counter_ptr = gen_address(compiler, counter)?;
            let start_value = gen_expression(compiler, start)?;
            compiler.builder.build_store(counter_ptr, start_value)?;

            let condition_block = compiler.append_block("cond");
            let body_block = compiler.append_block("body");
            let step_block = compiler.append_block("step");
            let end_block = compiler.append_block("end");

            compiler.builder.build_unconditional_branch(condition_block)?;

            // the bound is re-evaluated each round, consistent with the
            // declared direction; a start/finish pair that contradicts the
            // direction simply yields zero iterations
            compiler.builder.position_at_end(condition_block);
            let current = int_operand(
                compiler.builder.build_load(counter_ptr, "counter")?,
                "for counter",
            )?;
            let bound = int_operand(gen_expression(compiler, finish)?, "for bound")?;
            let predicate = match direction {
                Direction::To => IntPredicate::SLE,
                Direction::Downto => IntPredicate::SGE,
            };
            let keep_going = compiler
                .builder
                .build_int_compare(predicate, current, bound, "")?;
            compiler
                .builder
                .build_conditional_branch(keep_going, body_block, end_block)?;

            compiler.builder.position_at_end(body_block);
            gen_statement(compiler, body)?;
            compiler.builder.build_unconditional_branch(step_block)?;

            compiler.builder.position_at_end(step_block);
            let current = int_operand(
                compiler.builder.build_load(counter_ptr, "counter")?,
                "for counter",
            )?;
            let one = current.get_type().const_int(1, false);
            let next = match direction {
                Direction::To => compiler.builder.build_int_add(current, one, "")?,
                Direction::Downto => compiler.builder.build_int_sub(current, one, "")?,
            };
            compiler.builder.build_store(counter_ptr, next)?;
            compiler.builder.build_unconditional_branch(condition_block)?;

            compiler.builder.position_at_end(end_block);
            Ok(())
        }
        NodeKind::Case { selector } => {
            let selector_value = int_operand(gen_expression(compiler, selector)?, "case selector")?;
            let end_block = compiler.append_block("end");

            for branch in statement.children().iter() {
                let NodeKind::CaseBranch { label, body } = &branch.kind else {
                    return Err(malformed("CaseBranch", branch));
                };
                let branch_block = compiler.append_block("case");
                let next_block = compiler.append_block("next");

                let label_value = int_operand(gen_expression(compiler, label)?, "case label")?;
                let matches = compiler.builder.build_int_compare(
                    IntPredicate::EQ,
                    selector_value,
                    label_value,
                    "",
                )?;
                compiler
                    .builder
                    .build_conditional_branch(matches, branch_block, next_block)?;

                compiler.builder.position_at_end(branch_block);
                gen_statement(compiler, body)?;
                compiler.builder.build_unconditional_branch(end_block)?;

                compiler.builder.position_at_end(next_block);
            }

            // no branch matched: fall through silently
            compiler.builder.build_unconditional_branch(end_block)?;
            compiler.builder.position_at_end(end_block);
            Ok(())
        }
        _ => Err(malformed("statement", statement)),
    }
}
