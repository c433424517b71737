use super::fixtures::*;
use crate::config::EngineConfig;
use crate::error::FormulaError;
use crate::exec::{evaluate, FormulaEngine};
use polars::prelude::*;

fn numbers() -> DataFrame {
    frame(vec![Series::new("a".into(), vec![1i64, 5, 10])])
}

fn s(v: &str) -> Option<String> { Some(v.to_string()) }

#[test]
fn earlier_branch_wins_on_ties() {
    let mut df = numbers();
    evaluate(&mut df, "'first' WHEN a > 0 OTHERWISE 'second' WHEN a > 3 OTHERWISE 'none'", "r").unwrap();
    assert_eq!(strs(&df, "r"), vec![s("first"), s("first"), s("first")]);

    evaluate(&mut df, "'big' WHEN a > 3 OTHERWISE 'pos' WHEN a > 0 OTHERWISE 'none'", "r").unwrap();
    assert_eq!(strs(&df, "r"), vec![s("pos"), s("big"), s("big")]);
}

#[test]
fn value_mapping_wider_than_max_depth() {
    let mut df = frame(vec![Series::new("a".into(), vec![0i64, 64, 69, 70, -3])]);
    let mut formula = String::new();
    for i in 0..70 {
        formula.push_str(&format!("{} WHEN a == {} OTHERWISE ", i * 10, i));
    }
    formula.push_str("-1");
    evaluate(&mut df, &formula, "r").unwrap();
    assert_eq!(ints(&df, "r"), vec![Some(0), Some(640), Some(690), Some(-1), Some(-1)]);
}

#[test]
fn nested_and_flat_chains_agree() {
    let mut df = numbers();
    evaluate(&mut df, "1 WHEN a < 3 OTHERWISE (2 WHEN a < 7 OTHERWISE 3)", "nested").unwrap();
    evaluate(&mut df, "1 WHEN a < 3 OTHERWISE 2 WHEN a < 7 OTHERWISE 3", "flat").unwrap();
    assert_eq!(ints(&df, "nested"), vec![Some(1), Some(2), Some(3)]);
    assert_eq!(ints(&df, "nested"), ints(&df, "flat"));
}

#[test]
fn chain_inside_a_value() {
    let mut df = numbers();
    evaluate(&mut df, "(100 WHEN a == 1 OTHERWISE 200) WHEN a < 7 OTHERWISE 0", "r").unwrap();
    assert_eq!(ints(&df, "r"), vec![Some(100), Some(200), Some(0)]);
}

#[test]
fn null_condition_falls_through() {
    let mut df = sample_table();
    evaluate(&mut df, "'hi' WHEN col1 > 2 OTHERWISE 'lo'", "r").unwrap();
    assert_eq!(strs(&df, "r"), vec![s("lo"), s("lo"), s("lo"), s("hi")]);
}

#[test]
fn numeric_branches_widen() {
    let mut df = numbers();
    evaluate(&mut df, "1 WHEN a > 3 OTHERWISE 0.5", "r").unwrap();
    assert_eq!(floats(&df, "r"), vec![Some(0.5), Some(1.0), Some(1.0)]);
    evaluate(&mut df, "a WHEN a > 3 OTHERWISE None", "r").unwrap();
    assert_eq!(ints(&df, "r"), vec![None, Some(5), Some(10)]);
}

#[test]
fn incompatible_branches_and_conditions() {
    let mut df = numbers();
    let err = evaluate(&mut df, "'a' WHEN a > 1 OTHERWISE 2", "r").unwrap_err();
    assert!(matches!(err, FormulaError::TypeMismatch { .. }), "{err:?}");
    assert!(err.expression().starts_with("select(["), "{}", err.expression());

    let err = evaluate(&mut df, "1 WHEN a OTHERWISE 2", "r").unwrap_err();
    assert!(matches!(err, FormulaError::TypeMismatch { .. }), "{err:?}");
    assert!(df.column("r").is_err());
}

#[test]
fn if_else_alias_evaluates_like_when() {
    let mut df = numbers();
    evaluate(&mut df, "'x' if a > 3 else 'y'", "r").unwrap();
    assert_eq!(strs(&df, "r"), vec![s("y"), s("x"), s("x")]);

    let strict = FormulaEngine::new(EngineConfig { allow_if_else: false, ..EngineConfig::default() });
    assert!(matches!(strict.evaluate(&mut df, "'x' if a > 3 else 'y'", "r2"), Err(FormulaError::Syntax { .. })));
}
