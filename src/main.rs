//!
//! formulate CLI binary
//! --------------------
//! Loads a table from JSON or Parquet, evaluates one or more column formulas
//! against it in order and prints (or writes) the resulting table.

use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use formulate::config::EngineConfig;
use formulate::error::FormulaError;
use formulate::exec::FormulaEngine;
use formulate::table::{dataframe_to_json, load_table, write_table};

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} --table <file.json|file.parquet> --eval \"<out>=<formula>\" [--eval ...] [--out <file.json|file.parquet>] [--config <cfg.json>] [--explain]\n\nFlags:\n  --table <path>           Input table (.json records or column map, or .parquet)\n  -e, --eval <out>=<f>     Evaluate formula <f> into column <out>; repeatable, applied in order\n  --out <path>             Write the result table instead of printing JSON records to stdout\n  --config <path>          Engine config JSON (max_depth, allow_if_else)\n  --explain                Print the compiled form of each formula instead of evaluating\n  -h, --help               Show this help\n\nEnvironment:\n  FORMULATE_MAX_DEPTH, FORMULATE_ALLOW_IF_ELSE override the engine config; RUST_LOG sets log verbosity.\n\nExamples:\n  {program} --table demo.json --eval \"flag=1 WHEN IsNotNull(col1) OTHERWISE 2\"\n  {program} --table demo.parquet -e \"tail=col2[1:]\" -e \"n=tail.len()\" --out result.parquet"
    );
}

#[derive(Debug, Default)]
struct Options {
    table: PathBuf,
    evals: Vec<(String, String)>,
    out: Option<PathBuf>,
    config: Option<PathBuf>,
    explain: bool,
}

/// Split `out=formula` at the first '=' that is not part of '=='.
fn split_eval(arg: &str) -> Result<(String, String)> {
    let Some(eq) = arg.find('=') else { bail!("--eval expects <out>=<formula>, got '{}'", arg) };
    let (name, formula) = (arg[..eq].trim(), &arg[eq + 1..]);
    if name.is_empty() || formula.starts_with('=') {
        bail!("--eval expects <out>=<formula>, got '{}'", arg);
    }
    Ok((name.to_string(), formula.trim().to_string()))
}

/// `Ok(None)` when help was requested.
fn parse_args(args: &[String]) -> Result<Option<Options>> {
    let mut opts = Options::default();
    let mut table: Option<PathBuf> = None;
    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        let mut value = || -> Result<String> {
            i += 1;
            args.get(i).cloned().ok_or_else(|| anyhow!("missing value for {}", flag))
        };
        match flag {
            "-h" | "--help" => return Ok(None),
            "--table" => table = Some(PathBuf::from(value()?)),
            "-e" | "--eval" => {
                let eval = value()?;
                opts.evals.push(split_eval(&eval)?);
            }
            "--out" => opts.out = Some(PathBuf::from(value()?)),
            "--config" => opts.config = Some(PathBuf::from(value()?)),
            "--explain" => opts.explain = true,
            other => bail!("unknown argument '{}'", other),
        }
        i += 1;
    }
    opts.table = table.ok_or_else(|| anyhow!("--table is required"))?;
    if opts.evals.is_empty() {
        bail!("at least one --eval is required");
    }
    Ok(Some(opts))
}

fn run(opts: &Options, config: EngineConfig) -> Result<()> {
    let engine = FormulaEngine::new(config);
    let mut df = load_table(&opts.table)?;

    if opts.explain {
        let mut columns: Vec<String> = df.get_column_names().iter().map(|c| c.to_string()).collect();
        for (out, formula) in &opts.evals {
            let compiled = engine.compile(formula, &columns)?;
            println!("{} = {}", out, compiled.rendered());
            if !columns.contains(out) { columns.push(out.clone()); }
        }
        return Ok(());
    }

    for (out, formula) in &opts.evals {
        engine.evaluate(&mut df, formula, out)?;
    }
    match &opts.out {
        Some(path) => {
            write_table(path, &mut df)?;
            info!(target: "formulate", "wrote {} rows to {}", df.height(), path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&dataframe_to_json(&df)?)?),
    }
    Ok(())
}

fn main() -> Result<()> {
    // Init logging on stderr so stdout carries only results
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(|s| s.as_str()).unwrap_or("formulate").to_string();
    let opts = match parse_args(&args) {
        Ok(Some(o)) => o,
        Ok(None) => {
            print_usage(&program);
            return Ok(());
        }
        Err(e) => {
            print_usage(&program);
            return Err(e);
        }
    };
    let config = match &opts.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::from_env(),
    };

    let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "formulate",
        "formulate starting: RUST_LOG='{}', table='{}', formulas={}, max_depth={}, allow_if_else={}",
        rust_log, opts.table.display(), opts.evals.len(), config.max_depth, config.allow_if_else
    );

    if let Err(e) = run(&opts, config) {
        if let Some(fe) = e.downcast_ref::<FormulaError>() {
            eprintln!("{}", serde_json::to_string(fe)?);
            std::process::exit(fe.exit_code());
        }
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<String> { std::iter::once("formulate").chain(v.iter().copied()).map(String::from).collect() }

    #[test]
    fn eval_specs_split_on_first_assignment() {
        assert_eq!(split_eval("flag = a == 1").unwrap(), ("flag".to_string(), "a == 1".to_string()));
        assert!(split_eval("a==1").is_err());
        assert!(split_eval("=1").is_err());
        assert!(split_eval("nothing").is_err());
    }

    #[test]
    fn argument_parsing() {
        let o = parse_args(&args(&["--table", "t.json", "-e", "x=1", "--eval", "y=x+1", "--explain"])).unwrap().unwrap();
        assert_eq!(o.table, PathBuf::from("t.json"));
        assert_eq!(o.evals.len(), 2);
        assert!(o.explain);
        assert!(parse_args(&args(&["--help"])).unwrap().is_none());
        assert!(parse_args(&args(&["--table"])).is_err());
        assert!(parse_args(&args(&["--table", "t.json"])).is_err());
        assert!(parse_args(&args(&["--bogus"])).is_err());
    }
}
