//! Kind rules used while lowering a compiled formula to a polars expression.

use polars::prelude::{DataFrame, DataType};

use crate::formula::formula_common::{BinOp, ValueKind};

pub fn kind_of_dtype(dt: &DataType) -> ValueKind {
    match dt {
        DataType::Boolean => ValueKind::Bool,
        DataType::String => ValueKind::Str,
        DataType::Null => ValueKind::Null,
        DataType::Float32 | DataType::Float64 => ValueKind::Float,
        d if d.is_integer() => ValueKind::Int,
        d if d.is_temporal() => ValueKind::Temporal,
        _ => ValueKind::Other,
    }
}

/// Column names and kinds of the table a formula is evaluated against.
#[derive(Debug, Clone, Default)]
pub struct TableSchema {
    columns: Vec<(String, ValueKind)>,
}

impl TableSchema {
    pub fn from_frame(df: &DataFrame) -> Self {
        let columns = df.get_columns().iter().map(|c| (c.name().to_string(), kind_of_dtype(c.dtype()))).collect();
        Self { columns }
    }

    pub fn kind_of(&self, name: &str) -> Option<ValueKind> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, k)| *k)
    }
}

/// Common kind of two values that must share one output column.
/// Null fits anything; integers widen to floats.
pub fn unify(a: ValueKind, b: ValueKind) -> Option<ValueKind> {
    match (a, b) {
        (x, ValueKind::Null) | (ValueKind::Null, x) => Some(x),
        (ValueKind::Int, ValueKind::Float) | (ValueKind::Float, ValueKind::Int) => Some(ValueKind::Float),
        (x, y) if x == y && x != ValueKind::Other => Some(x),
        _ => None,
    }
}

fn numeric_or_null(k: ValueKind) -> bool { k.is_numeric() || k == ValueKind::Null }

pub fn is_boolish(k: ValueKind) -> bool { matches!(k, ValueKind::Bool | ValueKind::Null) }

/// Result kind of an arithmetic operator, or a description of the mismatch.
pub fn arithmetic_kind(op: BinOp, l: ValueKind, r: ValueKind) -> Result<ValueKind, String> {
    let bad = || format!("operator '{}' is not defined for {} and {}", op.symbol(), l, r);
    match op {
        BinOp::Add if matches!((l, r), (ValueKind::Str, ValueKind::Str) | (ValueKind::Str, ValueKind::Null) | (ValueKind::Null, ValueKind::Str)) => {
            Ok(ValueKind::Str)
        }
        BinOp::Div if numeric_or_null(l) && numeric_or_null(r) => {
            if l == ValueKind::Null && r == ValueKind::Null { Ok(ValueKind::Null) } else { Ok(ValueKind::Float) }
        }
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Mod if numeric_or_null(l) && numeric_or_null(r) => unify(l, r).ok_or_else(bad),
        _ => Err(bad()),
    }
}

/// Whether two kinds may be compared with `==`, `<`, ...
pub fn comparable(l: ValueKind, r: ValueKind) -> bool {
    match (l, r) {
        (ValueKind::Null, _) | (_, ValueKind::Null) => true,
        (a, b) if a.is_numeric() && b.is_numeric() => true,
        (a, b) => a == b && matches!(a, ValueKind::Str | ValueKind::Bool | ValueKind::Temporal),
    }
}
