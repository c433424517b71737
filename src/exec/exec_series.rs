// Row-wise helpers lowered as polars `map` expressions: the null predicates,
// string capabilities and the numeric helpers that have no native expression here.

use polars::prelude::*;

use crate::formula::formula_capabilities::{CapValue, RowFn};
use crate::formula::formula_common::ValueKind;
use crate::formula::is_null_str;

pub fn dtype_of_kind(k: ValueKind) -> DataType {
    match k {
        ValueKind::Int => DataType::Int64,
        ValueKind::Float => DataType::Float64,
        ValueKind::Str => DataType::String,
        ValueKind::Bool => DataType::Boolean,
        _ => DataType::Null,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullRule {
    /// native missing, NaN, blank string or the literal `null`
    ThreeWay,
    /// native missing or NaN only
    Native,
}

fn null_mask(s: &Series, rule: NullRule) -> PolarsResult<Vec<bool>> {
    if s.dtype().is_float() {
        let f = s.cast(&DataType::Float64)?;
        return Ok(f.f64()?.into_iter().map(|v| v.map(|x| x.is_nan()).unwrap_or(true)).collect());
    }
    match rule {
        NullRule::Native => Ok(s.is_null().into_iter().map(|v| v.unwrap_or(true)).collect()),
        NullRule::ThreeWay => {
            let sv = s.cast(&DataType::String)?;
            Ok(sv.str()?.into_iter().map(is_null_str).collect())
        }
    }
}

/// Boolean mask of `rule` over the values of `e`; `negated` flips every row, so
/// the two predicates are exact complements.
pub fn null_predicate_expr(e: Expr, rule: NullRule, negated: bool) -> Expr {
    e.map(
        move |c: Column| {
            let s = c.as_materialized_series();
            let mask: Vec<bool> = null_mask(s, rule)?.into_iter().map(|b| b != negated).collect();
            Ok(Series::new(s.name().clone(), mask).into_column())
        },
        |_schema, field| Ok(Field::new(field.name().clone(), DataType::Boolean)),
    )
}

/// Apply a prepared capability to the string view of `e`. Nulls stay null.
pub fn capability_expr(e: Expr, row: RowFn, returns: ValueKind) -> Expr {
    let out_dtype = dtype_of_kind(returns);
    e.map(
        move |c: Column| {
            let s = c.as_materialized_series();
            let sv = s.cast(&DataType::String)?;
            let ca = sv.str()?;
            let name = s.name().clone();
            let out = match returns {
                ValueKind::Bool => {
                    let v: Vec<Option<bool>> = ca
                        .into_iter()
                        .map(|o| o.and_then(|x| match row(x) { CapValue::Bool(b) => Some(b), _ => None }))
                        .collect();
                    Series::new(name, v)
                }
                ValueKind::Int => {
                    let v: Vec<Option<i64>> = ca
                        .into_iter()
                        .map(|o| o.and_then(|x| match row(x) { CapValue::Int(i) => Some(i), _ => None }))
                        .collect();
                    Series::new(name, v)
                }
                _ => {
                    let v: Vec<Option<String>> = ca
                        .into_iter()
                        .map(|o| o.and_then(|x| match row(x) { CapValue::Str(s) => Some(s), _ => None }))
                        .collect();
                    Series::new(name, v)
                }
            };
            Ok(out.into_column())
        },
        move |_schema, field| Ok(Field::new(field.name().clone(), out_dtype.clone())),
    )
}

pub fn map_float<F>(e: Expr, f: F) -> Expr
where
    F: Fn(f64) -> f64 + Send + Sync + 'static,
{
    e.map(
        move |c: Column| {
            let s = c.as_materialized_series();
            let fs = s.cast(&DataType::Float64)?;
            let v: Vec<Option<f64>> = fs.f64()?.into_iter().map(|o| o.map(&f)).collect();
            Ok(Series::new(s.name().clone(), v).into_column())
        },
        |_schema, field| Ok(Field::new(field.name().clone(), DataType::Float64)),
    )
}

pub fn map_int<F>(e: Expr, f: F) -> Expr
where
    F: Fn(i64) -> i64 + Send + Sync + 'static,
{
    e.map(
        move |c: Column| {
            let s = c.as_materialized_series();
            let is = s.cast(&DataType::Int64)?;
            let v: Vec<Option<i64>> = is.i64()?.into_iter().map(|o| o.map(&f)).collect();
            Ok(Series::new(s.name().clone(), v).into_column())
        },
        |_schema, field| Ok(Field::new(field.name().clone(), DataType::Int64)),
    )
}

/// Round half to even at `decimals` places (negative rounds left of the point).
pub fn round_half_even(x: f64, decimals: i32) -> f64 {
    if !x.is_finite() { return x; }
    let scale = 10f64.powi(decimals);
    (x * scale).round_ties_even() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_is_half_even() {
        assert_eq!(round_half_even(2.5, 0), 2.0);
        assert_eq!(round_half_even(3.5, 0), 4.0);
        assert_eq!(round_half_even(1234.0, -2), 1200.0);
        assert!(round_half_even(f64::NAN, 1).is_nan());
    }

    #[test]
    fn null_masks_follow_the_rule() {
        let s = Series::new("s".into(), vec![Some("a"), None, Some(" "), Some("NULL")]);
        assert_eq!(null_mask(&s, NullRule::ThreeWay).unwrap(), vec![false, true, true, true]);
        assert_eq!(null_mask(&s, NullRule::Native).unwrap(), vec![false, true, false, false]);
        let f = Series::new("f".into(), vec![Some(1.0), Some(f64::NAN), None]);
        assert_eq!(null_mask(&f, NullRule::ThreeWay).unwrap(), vec![false, true, true]);
    }
}
