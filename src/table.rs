//! Loading and writing the tables formulas run against. The format is picked
//! from the file extension: `.json` or `.parquet`.
pub mod table_json;

use std::path::Path;

use anyhow::{bail, Context, Result};
use polars::prelude::*;
use tracing::debug;

pub use table_json::{dataframe_to_json, json_to_df};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat { Json, Parquet }

impl TableFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("json") => Ok(TableFormat::Json),
            Some("parquet") | Some("pq") => Ok(TableFormat::Parquet),
            _ => bail!("unsupported table file '{}': expected .json or .parquet", path.display()),
        }
    }
}

pub fn load_table(path: &Path) -> Result<DataFrame> {
    let df = match TableFormat::from_path(path)? {
        TableFormat::Json => {
            let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            let j: serde_json::Value = serde_json::from_str(&text).with_context(|| format!("parsing JSON in {}", path.display()))?;
            json_to_df(&j)?
        }
        TableFormat::Parquet => {
            let file = std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
            ParquetReader::new(file).finish().with_context(|| format!("reading parquet {}", path.display()))?
        }
    };
    debug!(target: "formulate::table", "loaded {} ({} rows x {} columns)", path.display(), df.height(), df.width());
    Ok(df)
}

pub fn write_table(path: &Path, df: &mut DataFrame) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }
    }
    match TableFormat::from_path(path)? {
        TableFormat::Json => {
            let text = serde_json::to_string_pretty(&dataframe_to_json(df)?)?;
            std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
        }
        TableFormat::Parquet => {
            let mut f = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
            ParquetWriter::new(&mut f).finish(df).with_context(|| format!("writing parquet {}", path.display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parquet_and_json_round_trip_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut df = DataFrame::new(vec![
            Series::new("a".into(), vec![Some(1i64), None]).into(),
            Series::new("s".into(), vec!["x", "y"]).into(),
        ])
        .unwrap();
        for name in ["t.parquet", "nested/t.json"] {
            let p = dir.path().join(name);
            write_table(&p, &mut df).unwrap();
            let back = load_table(&p).unwrap();
            assert_eq!(back.shape(), (2, 2));
            assert_eq!(back.column("a").unwrap().null_count(), 1);
        }
        assert!(load_table(&dir.path().join("t.csv")).is_err());
    }
}
