use super::fixtures::*;
use crate::error::FormulaError;
use crate::exec::evaluate;
use polars::prelude::*;

#[test]
fn three_way_null_predicate_is_total() {
    let values = vec![Some("a"), None, Some(""), Some("   "), Some("null"), Some("NuLl"), Some("x null"), Some("0")];
    let mut df = frame(vec![Series::new("v".into(), values)]);
    evaluate(&mut df, "IsNull(v)", "n").unwrap();
    evaluate(&mut df, "IsNotNull(v)", "nn").unwrap();
    let n = bools(&df, "n");
    let nn = bools(&df, "nn");
    assert_eq!(n, vec![Some(false), Some(true), Some(true), Some(true), Some(true), Some(true), Some(false), Some(false)]);
    for (a, b) in n.iter().zip(nn.iter()) {
        assert_eq!(a.map(|x| !x), *b);
    }
}

#[test]
fn nan_and_native_nulls_in_numeric_columns() {
    let mut df = frame(vec![
        Series::new("f".into(), vec![Some(1.0f64), Some(f64::NAN), None]),
        Series::new("b".into(), vec![Some(true), Some(false), None]),
    ]);
    evaluate(&mut df, "isnull(f)", "fn").unwrap();
    evaluate(&mut df, "IsNull(b)", "bn").unwrap();
    evaluate(&mut df, "f.isna()", "fna").unwrap();
    evaluate(&mut df, "f.notna()", "fnn").unwrap();
    assert_eq!(bools(&df, "fn"), vec![Some(false), Some(true), Some(true)]);
    assert_eq!(bools(&df, "bn"), vec![Some(false), Some(false), Some(true)]);
    assert_eq!(bools(&df, "fna"), bools(&df, "fn"));
    assert_eq!(bools(&df, "fnn"), vec![Some(true), Some(false), Some(false)]);
}

#[test]
fn pandas_isna_ignores_blank_strings() {
    let mut df = frame(vec![Series::new("v".into(), vec![Some(""), None, Some("null")])]);
    evaluate(&mut df, "v.isnull()", "n").unwrap();
    assert_eq!(bools(&df, "n"), vec![Some(false), Some(true), Some(false)]);
}

#[test]
fn null_predicate_on_expression_is_rejected() {
    let mut df = sample_table();
    let err = evaluate(&mut df, "IsNull(col1 + 1)", "n").unwrap_err();
    assert!(matches!(err, FormulaError::Evaluation { .. }), "{err:?}");
    assert!(err.message().contains("single column reference"));
}
