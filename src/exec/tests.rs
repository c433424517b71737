// Unit tests for the exec module, split by area under exec/tests/.

pub(super) mod fixtures {
    use polars::prelude::*;

    /// The four-row table used throughout: col1 ints with nulls, col2 strings, col3 ints.
    pub fn sample_table() -> DataFrame {
        let col1 = Series::new("col1".into(), vec![Some(1i64), None, None, Some(4)]);
        let col2 = Series::new("col2".into(), vec!["xa", "xb", "ya", "za"]);
        let col3 = Series::new("col3".into(), vec![10i64, 20, 30, 40]);
        DataFrame::new(vec![col1.into(), col2.into(), col3.into()]).unwrap()
    }

    pub fn frame(columns: Vec<Series>) -> DataFrame {
        DataFrame::new(columns.into_iter().map(|s| s.into()).collect()).unwrap()
    }

    fn series(df: &DataFrame, name: &str, dt: DataType) -> Series {
        df.column(name).unwrap().as_materialized_series().cast(&dt).unwrap()
    }

    pub fn ints(df: &DataFrame, name: &str) -> Vec<Option<i64>> {
        series(df, name, DataType::Int64).i64().unwrap().into_iter().collect()
    }

    pub fn floats(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
        series(df, name, DataType::Float64).f64().unwrap().into_iter().collect()
    }

    pub fn bools(df: &DataFrame, name: &str) -> Vec<Option<bool>> {
        series(df, name, DataType::Boolean).bool().unwrap().into_iter().collect()
    }

    pub fn strs(df: &DataFrame, name: &str) -> Vec<Option<String>> {
        series(df, name, DataType::String).str().unwrap().into_iter().map(|v| v.map(|s| s.to_string())).collect()
    }
}

mod capability_tests;
mod conditional_tests;
mod null_tests;
