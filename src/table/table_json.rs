use std::collections::HashSet;

use anyhow::{anyhow, bail, Result};
use polars::prelude::*;
use serde_json::{Map, Number, Value};
use tracing::debug;

/// Convert a serde_json::Value into a Polars DataFrame.
/// Supported roots:
/// - Array of objects: one row per element, columns in order of first appearance
/// - Object of arrays: one column per key (all arrays the same length)
/// - Object of scalars: single-row frame
/// - Array of scalars: single column "value"
///
/// Column types are inferred from the non-null values: all booleans, all
/// integers, all numbers (float), otherwise strings. JSON null is a native null.
pub fn json_to_df(j: &Value) -> Result<DataFrame> {
    match j {
        Value::Array(arr) if arr.is_empty() => Ok(DataFrame::new(vec![])?),
        Value::Array(arr) if arr.iter().all(|v| v.is_object()) => json_records_to_df(arr),
        Value::Array(arr) => {
            let vals: Vec<&Value> = arr.iter().collect();
            Ok(DataFrame::new(vec![infer_column("value", &vals).into()])?)
        }
        Value::Object(map) if !map.is_empty() && map.values().all(|v| v.is_array()) => json_columns_to_df(map),
        Value::Object(map) => {
            let cols: Vec<Column> = map.iter().map(|(k, v)| infer_column(k, &[v]).into()).collect();
            Ok(DataFrame::new(cols)?)
        }
        _ => Err(anyhow!("unsupported JSON root for a table: expected an array or an object")),
    }
}

fn json_records_to_df(arr: &[Value]) -> Result<DataFrame> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut keys: Vec<&str> = Vec::new();
    for v in arr {
        if let Value::Object(m) = v {
            for k in m.keys() {
                if seen.insert(k.as_str()) { keys.push(k.as_str()); }
            }
        }
    }
    debug!(target: "formulate::table", keys=?keys, "json_to_df: record keys inferred");
    let null = Value::Null;
    let mut cols: Vec<Column> = Vec::with_capacity(keys.len());
    for k in &keys {
        let vals: Vec<&Value> = arr.iter().map(|v| v.get(*k).unwrap_or(&null)).collect();
        cols.push(infer_column(k, &vals).into());
    }
    Ok(DataFrame::new(cols)?)
}

fn json_columns_to_df(map: &Map<String, Value>) -> Result<DataFrame> {
    let mut cols: Vec<Column> = Vec::with_capacity(map.len());
    let mut height: Option<usize> = None;
    for (k, v) in map {
        let Value::Array(items) = v else { bail!("column '{}' is not an array", k) };
        match height {
            Some(h) if h != items.len() => bail!("column '{}' has {} values, expected {}", k, items.len(), h),
            _ => height = Some(items.len()),
        }
        let vals: Vec<&Value> = items.iter().collect();
        cols.push(infer_column(k, &vals).into());
    }
    Ok(DataFrame::new(cols)?)
}

#[derive(Clone, Copy, PartialEq)]
enum JsonKind { Bool, Int, Float, Str }

fn infer_column(name: &str, vals: &[&Value]) -> Series {
    let mut kind: Option<JsonKind> = None;
    for v in vals {
        let k = match v {
            Value::Null => continue,
            Value::Bool(_) => JsonKind::Bool,
            Value::Number(n) if n.is_i64() => JsonKind::Int,
            Value::Number(_) => JsonKind::Float,
            _ => JsonKind::Str,
        };
        kind = Some(match (kind, k) {
            (None, k) => k,
            (Some(a), b) if a == b => a,
            (Some(JsonKind::Int), JsonKind::Float) | (Some(JsonKind::Float), JsonKind::Int) => JsonKind::Float,
            _ => JsonKind::Str,
        });
    }
    let name: PlSmallStr = name.into();
    match kind {
        None => Series::new_null(name, vals.len()),
        Some(JsonKind::Bool) => Series::new(name, vals.iter().map(|v| v.as_bool()).collect::<Vec<_>>()),
        Some(JsonKind::Int) => Series::new(name, vals.iter().map(|v| v.as_i64()).collect::<Vec<_>>()),
        Some(JsonKind::Float) => Series::new(name, vals.iter().map(|v| v.as_f64()).collect::<Vec<_>>()),
        Some(JsonKind::Str) => Series::new(
            name,
            vals.iter().map(|v| if v.is_null() { None } else { Some(value_to_string(v)) }).collect::<Vec<_>>(),
        ),
    }
}

#[inline]
fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        _ => v.to_string(),
    }
}

fn column_to_json(c: &Column) -> Result<Vec<Value>> {
    let s = c.as_materialized_series();
    let dt = s.dtype();
    let out = if dt.is_integer() {
        s.cast(&DataType::Int64)?.i64()?.into_iter().map(|v| v.map(Value::from).unwrap_or(Value::Null)).collect()
    } else if dt.is_float() {
        s.cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v| v.and_then(Number::from_f64).map(Value::Number).unwrap_or(Value::Null))
            .collect()
    } else if dt == &DataType::Boolean {
        s.bool()?.into_iter().map(|v| v.map(Value::Bool).unwrap_or(Value::Null)).collect()
    } else {
        s.cast(&DataType::String)?
            .str()?
            .into_iter()
            .map(|v| v.map(|x| Value::String(x.to_string())).unwrap_or(Value::Null))
            .collect()
    };
    Ok(out)
}

/// Render a DataFrame as an array of JSON records with typed values.
/// NaN and infinite floats become null.
pub fn dataframe_to_json(df: &DataFrame) -> Result<Value> {
    let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    let mut columns: Vec<Vec<Value>> = Vec::with_capacity(names.len());
    for c in df.get_columns() {
        columns.push(column_to_json(c)?);
    }
    let mut out: Vec<Value> = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let mut map = Map::new();
        for (i, name) in names.iter().enumerate() {
            map.insert(name.clone(), columns[i].get(row).cloned().unwrap_or(Value::Null));
        }
        out.push(Value::Object(map));
    }
    Ok(Value::Array(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn records_infer_types_and_keep_key_order() {
        let j = json!([
            {"b": "x", "a": 1, "f": 1.5},
            {"a": 2, "f": 2},
            {"b": null, "c": true, "a": null}
        ]);
        let df = json_to_df(&j).unwrap();
        let cols: Vec<String> = df.get_column_names().iter().map(|c| c.to_string()).collect();
        assert_eq!(cols, vec!["b", "a", "f", "c"]);
        assert_eq!(df.column("a").unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column("f").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("b").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("c").unwrap().dtype(), &DataType::Boolean);
        assert_eq!(df.column("a").unwrap().null_count(), 1);
        assert_eq!(df.height(), 3);
    }

    #[test]
    fn column_map_and_mixed_kinds() {
        let j = json!({"n": [1, null, 3], "m": [1, "two", true]});
        let df = json_to_df(&j).unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(df.column("m").unwrap().dtype(), &DataType::String);
        assert!(json_to_df(&json!({"a": [1], "b": [1, 2]})).is_err());
    }

    #[test]
    fn scalars_and_all_null_columns() {
        let df = json_to_df(&json!([1, 2, 3])).unwrap();
        assert_eq!(df.get_column_names()[0].as_str(), "value");
        let df = json_to_df(&json!([{"z": null}, {"z": null}])).unwrap();
        assert_eq!(df.column("z").unwrap().dtype(), &DataType::Null);
        assert!(json_to_df(&json!(5)).is_err());
    }

    #[test]
    fn frame_to_records() {
        let j = json!([{"a": 1, "s": "x", "f": 0.5}, {"a": null, "s": null, "f": null}]);
        let df = json_to_df(&j).unwrap();
        assert_eq!(dataframe_to_json(&df).unwrap(), j);
    }
}
