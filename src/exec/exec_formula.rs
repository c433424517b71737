use polars::prelude::*;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{FormulaError, FormulaResult};
use crate::exec::exec_common::{build_formula_expr, BuildCtx};
use crate::exec::exec_typecheck::TableSchema;
use crate::formula::{compile, CompiledFormula, ValueKind};

/// Map a polars failure to the formula error model. Schema and operation
/// mismatches are type errors; everything else is an evaluation error.
pub fn map_polars_error(err: PolarsError, rendered: &str) -> FormulaError {
    match err {
        PolarsError::SchemaMismatch(m) | PolarsError::InvalidOperation(m) => FormulaError::type_mismatch(m.to_string(), rendered),
        PolarsError::ColumnNotFound(m) => FormulaError::unresolved(m.to_string(), rendered),
        other => FormulaError::evaluation(other.to_string(), rendered),
    }
}

/// Compiles and evaluates formulas against polars tables.
#[derive(Debug, Clone, Default)]
pub struct FormulaEngine {
    config: EngineConfig,
}

impl FormulaEngine {
    pub fn new(config: EngineConfig) -> Self { Self { config } }

    pub fn config(&self) -> &EngineConfig { &self.config }

    pub fn compile(&self, formula: &str, columns: &[String]) -> FormulaResult<CompiledFormula> {
        compile(formula, columns, &self.config)
    }

    /// Compile `formula` against the table's columns and write its result into
    /// `output`, replacing a column of that name if present. Scalars broadcast
    /// to the table height.
    pub fn evaluate(&self, table: &mut DataFrame, formula: &str, output: &str) -> FormulaResult<()> {
        let columns: Vec<String> = table.get_column_names().iter().map(|c| c.to_string()).collect();
        let compiled = self.compile(formula, &columns)?;
        self.evaluate_compiled(table, &compiled, output)
    }

    /// Type-check `compiled` against the table and return its expression and result kind.
    pub fn lower(&self, table: &DataFrame, compiled: &CompiledFormula) -> FormulaResult<(Expr, ValueKind)> {
        let schema = TableSchema::from_frame(table);
        let rendered = compiled.rendered();
        let ctx = BuildCtx { schema: &schema, rendered: &rendered };
        build_formula_expr(&compiled.expr, &ctx)
    }

    pub fn evaluate_compiled(&self, table: &mut DataFrame, compiled: &CompiledFormula, output: &str) -> FormulaResult<()> {
        let rendered = compiled.rendered();
        let (expr, kind) = self.lower(table, compiled)?;
        debug!(target: "formulate::exec", "evaluating '{}' ({}) into '{}'", rendered, kind, output);

        let height = table.height();
        let out = if table.width() == 0 {
            broadcast_alone(expr, output, height, &rendered)?
        } else {
            table
                .clone()
                .lazy()
                .with_column(expr.alias(output))
                .collect()
                .map_err(|e| map_polars_error(e, &rendered))?
        };
        let produced = out.column(output).map_err(|e| map_polars_error(e, &rendered))?.len();
        if out.height() != height || produced != height {
            return Err(FormulaError::evaluation(
                format!("result has {} rows but the table has {}", produced, height),
                rendered,
            ));
        }
        *table = out;
        debug!(target: "formulate::exec", "column '{}' written ({} rows)", output, height);
        Ok(())
    }
}

/// A frame without columns has no height to broadcast against, so the
/// (necessarily constant) expression is evaluated on its own and repeated.
fn broadcast_alone(expr: Expr, output: &str, height: usize, rendered: &str) -> FormulaResult<DataFrame> {
    let scalar = DataFrame::empty()
        .lazy()
        .select([expr.alias(output)])
        .collect()
        .map_err(|e| map_polars_error(e, rendered))?;
    let value = scalar.column(output).map_err(|e| map_polars_error(e, rendered))?;
    if value.len() != 1 {
        return Err(FormulaError::evaluation(format!("expected a single value, got {} rows", value.len()), rendered));
    }
    DataFrame::new(vec![value.new_from_index(0, height)]).map_err(|e| map_polars_error(e, rendered))
}

/// Evaluate one formula with the default engine configuration.
pub fn evaluate(table: &mut DataFrame, formula: &str, output: &str) -> FormulaResult<()> {
    FormulaEngine::default().evaluate(table, formula, output)
}
