use formulate::table::{json_to_df, load_table, write_table};
use formulate::{evaluate, tprintln, EngineConfig, FormulaEngine, FormulaError};
use polars::prelude::*;
use serde_json::json;

fn ints(df: &DataFrame, name: &str) -> Vec<Option<i64>> {
    let s = df.column(name).unwrap().as_materialized_series().cast(&DataType::Int64).unwrap();
    s.i64().unwrap().into_iter().collect()
}

fn demo_table() -> DataFrame {
    json_to_df(&json!([
        {"col1": 1, "col2": "xa", "col3": 10, "order id": "A-1"},
        {"col1": null, "col2": "xb", "col3": 20, "order id": "b-2"},
        {"col1": null, "col2": "ya", "col3": 30, "order id": ""},
        {"col1": 4, "col2": "za", "col3": 40, "order id": null}
    ]))
    .unwrap()
}

#[test]
fn json_table_end_to_end() {
    let mut df = demo_table();
    evaluate(&mut df, "1 WHEN IsNotNull(col1) OTHERWISE 2 WHEN col2.startswith('x') OTHERWISE col3", "pick").unwrap();
    assert_eq!(ints(&df, "pick"), vec![Some(1), Some(2), Some(30), Some(1)]);

    // multi-word column names resolve without quoting
    evaluate(&mut df, "order id.upper() WHEN IsNotNull(order id) OTHERWISE 'missing'", "oid").unwrap();
    let oid: Vec<Option<String>> = df
        .column("oid")
        .unwrap()
        .as_materialized_series()
        .str()
        .unwrap()
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect();
    tprintln!("oid = {:?}", oid);
    assert_eq!(
        oid,
        vec![Some("A-1".to_string()), Some("B-2".to_string()), Some("missing".to_string()), Some("missing".to_string())]
    );
}

#[test]
fn formulas_chain_across_outputs_and_files() {
    let dir = tempfile::tempdir().unwrap();
    let engine = FormulaEngine::new(EngineConfig::default());
    let mut df = demo_table();
    engine.evaluate(&mut df, "col3 * 2", "double").unwrap();
    engine.evaluate(&mut df, "double + col1.fillna(0)", "total").unwrap();
    assert_eq!(ints(&df, "total"), vec![Some(21), Some(40), Some(60), Some(84)]);

    let path = dir.path().join("out.parquet");
    write_table(&path, &mut df).unwrap();
    let mut back = load_table(&path).unwrap();
    engine.evaluate(&mut back, "total - double", "diff").unwrap();
    assert_eq!(ints(&back, "diff"), vec![Some(1), Some(0), Some(0), Some(4)]);
}

#[test]
fn errors_carry_the_compiled_expression() {
    let mut df = demo_table();
    let err = evaluate(&mut df, "col3.lower() WHEN col1 > 0 OTHERWISE 'x'", "bad").unwrap_err();
    assert!(matches!(err, FormulaError::TypeMismatch { .. }), "{err:?}");
    assert!(err.expression().contains(r#"table["col3"].as_str().lower()"#), "{}", err.expression());
    let v = serde_json::to_value(&err).unwrap();
    assert_eq!(v["type"], "type_mismatch");
    assert!(df.column("bad").is_err());
}
