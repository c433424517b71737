use super::fixtures::*;
use crate::error::FormulaError;
use crate::exec::evaluate;
use polars::prelude::*;

fn words() -> DataFrame {
    frame(vec![
        Series::new("w".into(), vec![Some("Hello"), None, Some("wörld"), Some("")]),
        Series::new("n".into(), vec![Some(1i64), Some(2), Some(3), Some(4)]),
    ])
}

fn s(v: &str) -> Option<String> { Some(v.to_string()) }

#[test]
fn string_results_keep_nulls() {
    let mut df = words();
    evaluate(&mut df, "w.upper()", "u").unwrap();
    assert_eq!(strs(&df, "u"), vec![s("HELLO"), None, s("WÖRLD"), s("")]);
    evaluate(&mut df, "w.len()", "l").unwrap();
    assert_eq!(ints(&df, "l"), vec![Some(5), None, Some(5), Some(0)]);
    evaluate(&mut df, "w[-3:]", "t").unwrap();
    assert_eq!(strs(&df, "t"), vec![s("llo"), None, s("rld"), s("")]);
    evaluate(&mut df, "w.str.replace('l', 'L', 1)", "r").unwrap();
    assert_eq!(strs(&df, "r"), vec![s("HeLlo"), None, s("wörLd"), s("")]);
}

#[test]
fn contains_spellings_agree() {
    let mut df = words();
    evaluate(&mut df, "'l' in w", "a").unwrap();
    evaluate(&mut df, "w.contains('l')", "b").unwrap();
    evaluate(&mut df, "'l' not in w", "c").unwrap();
    assert_eq!(bools(&df, "a"), vec![Some(true), None, Some(true), Some(false)]);
    assert_eq!(bools(&df, "a"), bools(&df, "b"));
    assert_eq!(bools(&df, "c"), vec![Some(false), None, Some(false), Some(true)]);
}

#[test]
fn regex_capabilities() {
    let mut df = words();
    evaluate(&mut df, "w.match('[A-Z]')", "m").unwrap();
    assert_eq!(bools(&df, "m"), vec![Some(true), None, Some(false), Some(false)]);
    let err = evaluate(&mut df, "w.fullmatch('(')", "bad").unwrap_err();
    assert!(matches!(err, FormulaError::Evaluation { .. }), "{err:?}");
}

#[test]
fn capability_on_non_string_column_is_a_type_error() {
    let mut df = words();
    let err = evaluate(&mut df, "n.upper()", "u").unwrap_err();
    assert!(matches!(err, FormulaError::TypeMismatch { .. }), "{err:?}");
    assert_eq!(err.expression(), r#"table["n"].as_str().upper()"#);
    let err = evaluate(&mut df, "n[1:]", "u").unwrap_err();
    assert!(matches!(err, FormulaError::TypeMismatch { .. }), "{err:?}");
}

#[test]
fn capability_on_computed_string() {
    let mut df = words();
    evaluate(&mut df, "(w + '!').upper()", "u").unwrap();
    assert_eq!(strs(&df, "u"), vec![s("HELLO!"), None, s("WÖRLD!"), s("!")]);
    let err = evaluate(&mut df, "(w + '!').startswith(w)", "u").unwrap_err();
    assert!(matches!(err, FormulaError::TypeMismatch { .. }), "{err:?}");
}

#[test]
fn membership_in_a_computed_string_is_containment() {
    let mut df = frame(vec![
        Series::new("s".into(), vec![Some("xAb"), Some("y"), None]),
        Series::new("n".into(), vec![1i64, 2, 3]),
    ]);
    evaluate(&mut df, "'a' in s.lower()", "has").unwrap();
    assert_eq!(bools(&df, "has"), vec![Some(true), Some(false), None]);
    evaluate(&mut df, "'a' not in s.lower()", "hasnt").unwrap();
    assert_eq!(bools(&df, "hasnt"), vec![Some(false), Some(true), None]);
    evaluate(&mut df, "'y!' in (s + '!')", "bang").unwrap();
    assert_eq!(bools(&df, "bang"), vec![Some(false), Some(true), None]);

    let err = evaluate(&mut df, "s in s.lower()", "bad").unwrap_err();
    assert!(matches!(err, FormulaError::Evaluation { .. }), "{err:?}");
    let err = evaluate(&mut df, "'a' in (n * 2)", "bad").unwrap_err();
    assert!(matches!(err, FormulaError::TypeMismatch { .. }), "{err:?}");
    let err = evaluate(&mut df, "1 in (n + 1)", "bad").unwrap_err();
    assert!(matches!(err, FormulaError::Evaluation { .. }), "{err:?}");
    assert!(df.column("bad").is_err());
}
