// Evaluation of compiled formulas against polars tables.
// NOTE: keep this module thin; add logic in exec_*.rs files.
pub mod exec_common;    // formula tree -> polars Expr lowering
pub mod exec_formula;   // FormulaEngine and the evaluate() entry point
pub mod exec_series;    // row-wise map helpers (null predicates, capabilities, numerics)
pub mod exec_typecheck; // value kinds and operator rules

pub use exec_formula::{evaluate, map_polars_error, FormulaEngine};
pub use exec_typecheck::TableSchema;

#[cfg(test)]
mod tests;
