// Formula front end: lexing, column resolution, parsing and the AST rewrite passes.
// NOTE: keep this module thin; stage logic lives in formula_*.rs files.
pub mod formula_common;
pub mod formula_lex;
pub mod formula_resolve;
pub mod formula_parse;
pub mod formula_conditional;
pub mod formula_null;
pub mod formula_capabilities;
pub mod formula_strings;
pub mod formula_slice;

use tracing::debug;

use crate::config::EngineConfig;
use crate::error::FormulaResult;

pub use formula_common::{Branch, BranchList, Constant, FormulaExpr, ValueKind};
pub use formula_null::is_null_str;

use formula_conditional::flatten_conditionals;
use formula_lex::tokenize;
use formula_null::rewrite_null_predicates;
use formula_parse::parse_formula;
use formula_resolve::{check_unresolved, resolve_columns};
use formula_slice::rewrite_slices;
use formula_strings::bind_string_capabilities;

/// A formula that passed every front-end stage, ready for the evaluator.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFormula {
    pub source: String,
    pub expr: FormulaExpr,
}

impl CompiledFormula {
    /// Diagnostic rendering of the compiled expression.
    pub fn rendered(&self) -> String { self.expr.to_string() }
}

/// Run the front-end pipeline for one formula against a table's column names.
pub fn compile(formula: &str, columns: &[String], config: &EngineConfig) -> FormulaResult<CompiledFormula> {
    let tokens = tokenize(formula)?;
    let tokens = resolve_columns(formula, tokens, columns)?;
    let expr = parse_formula(formula, &tokens, config)?;
    check_unresolved(&expr)?;
    debug!(target: "formulate::formula", "parsed: {}", expr);
    let expr = rewrite_null_predicates(expr)?;
    let expr = bind_string_capabilities(expr)?;
    let expr = rewrite_slices(expr)?;
    debug!(target: "formulate::formula", "rewritten: {}", expr);
    let expr = flatten_conditionals(expr)?;
    debug!(target: "formulate::formula", "compiled: {}", expr);
    Ok(CompiledFormula { source: formula.to_string(), expr })
}
