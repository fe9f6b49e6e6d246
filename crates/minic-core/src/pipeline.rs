//! The compilation pipeline.
//!
//! Strict pass sequencing over one translation unit: parse, usage
//! analysis, function analysis, type checking, lowering, IR generation,
//! IR typing, SSA construction (CFG, dominators, dominance frontiers, phi
//! insertion, renaming), then local optimizations. A failing pass aborts
//! the compilation by returning its error; warnings accumulate on the
//! session and never abort.

use crate::analysis::ssa::{self, FunctionAnalysis};
use crate::ast::Stmt;
use crate::diagnostics::{CompileError, Session};
use crate::ir::Unit;
use crate::{ir, lexer, lower, opt, parser, sema};
use tracing::debug;

/// Everything a compilation produces: the SSA-form unit plus per-function
/// analysis artifacts for downstream consumers.
#[derive(Debug)]
pub struct Compilation {
    pub unit: Unit,
    pub analyses: Vec<FunctionAnalysis>,
}

/// Front-end half: source text to an analyzed, lowered AST.
pub fn compile_to_ast(source: &str, sess: &mut Session) -> Result<Vec<Stmt>, CompileError> {
    let tokens = lexer::tokenize(source)?;
    let mut unit = parser::parse(tokens)?;
    debug!(stmts = unit.len(), "parsed translation unit");

    sema::usage::analyze(&unit, sess);
    sema::functions::analyze(&unit)?;
    sema::types::check(&mut unit)?;
    lower::desugar(&mut unit);
    Ok(unit)
}

/// Full pipeline: source text to an optimized SSA-form translation unit.
pub fn compile(source: &str, sess: &mut Session) -> Result<Compilation, CompileError> {
    let ast = compile_to_ast(source, sess)?;

    let mut unit = ir::gen::emit(&ast)?;
    ir::ty::annotate(&mut unit);

    let analyses = ssa::build_unit(&mut unit);
    debug!(functions = unit.functions.len(), "ssa construction done");

    opt::arith::run(&mut unit);
    opt::reorder::run(&mut unit);
    for func in &unit.functions {
        ir::validate(func);
    }

    Ok(Compilation { unit, analyses })
}
