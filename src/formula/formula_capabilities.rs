//! Compiled-in string capability table.
//!
//! Each entry names a method that dispatches through a column's string view,
//! its accepted argument count, the kind of value it yields, and a `prepare`
//! function that validates the literal arguments once per call site and returns
//! the per-row implementation. Names use the pandas `.str` spelling.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::formula::formula_common::{Constant, ValueKind};

/// Per-row result of a capability.
#[derive(Debug, Clone, PartialEq)]
pub enum CapValue {
    Bool(bool),
    Str(String),
    Int(i64),
    Null,
}

pub type RowFn = Box<dyn Fn(&str) -> CapValue + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityError {
    /// Wrong argument type or value
    Arg(String),
    /// Regular expression failed to compile
    Pattern(String),
}

pub struct Capability {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: usize,
    pub returns: ValueKind,
    pub prepare: fn(&[Constant]) -> Result<RowFn, CapabilityError>,
}

impl Capability {
    pub fn accepts(&self, n: usize) -> bool { n >= self.min_args && n <= self.max_args }

    pub fn arity(&self) -> String {
        if self.min_args == self.max_args { self.min_args.to_string() } else { format!("{}..={}", self.min_args, self.max_args) }
    }
}

impl std::fmt::Debug for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capability").field("name", &self.name).field("arity", &self.arity()).field("returns", &self.returns).finish()
    }
}

const fn cap(name: &'static str, min_args: usize, max_args: usize, returns: ValueKind, prepare: fn(&[Constant]) -> Result<RowFn, CapabilityError>) -> Capability {
    Capability { name, min_args, max_args, returns, prepare }
}

pub const CAPABILITY_TABLE: &[Capability] = &[
    cap("startswith", 1, 1, ValueKind::Bool, prep_startswith),
    cap("endswith", 1, 1, ValueKind::Bool, prep_endswith),
    cap("contains", 1, 2, ValueKind::Bool, prep_contains),
    cap("match", 1, 1, ValueKind::Bool, prep_match),
    cap("fullmatch", 1, 1, ValueKind::Bool, prep_fullmatch),
    cap("lower", 0, 0, ValueKind::Str, prep_lower),
    cap("upper", 0, 0, ValueKind::Str, prep_upper),
    cap("title", 0, 0, ValueKind::Str, prep_title),
    cap("capitalize", 0, 0, ValueKind::Str, prep_capitalize),
    cap("swapcase", 0, 0, ValueKind::Str, prep_swapcase),
    cap("strip", 0, 1, ValueKind::Str, prep_strip),
    cap("lstrip", 0, 1, ValueKind::Str, prep_lstrip),
    cap("rstrip", 0, 1, ValueKind::Str, prep_rstrip),
    cap("len", 0, 0, ValueKind::Int, prep_len),
    cap("find", 1, 1, ValueKind::Int, prep_find),
    cap("count", 1, 1, ValueKind::Int, prep_count),
    cap("replace", 2, 3, ValueKind::Str, prep_replace),
    cap("slice", 0, 3, ValueKind::Str, prep_slice),
    cap("zfill", 1, 1, ValueKind::Str, prep_zfill),
    cap("get", 1, 1, ValueKind::Str, prep_get),
    cap("isdigit", 0, 0, ValueKind::Bool, prep_isdigit),
    cap("isalpha", 0, 0, ValueKind::Bool, prep_isalpha),
    cap("isalnum", 0, 0, ValueKind::Bool, prep_isalnum),
    cap("isspace", 0, 0, ValueKind::Bool, prep_isspace),
    cap("islower", 0, 0, ValueKind::Bool, prep_islower),
    cap("isupper", 0, 0, ValueKind::Bool, prep_isupper),
    cap("isnumeric", 0, 0, ValueKind::Bool, prep_isnumeric),
];

static CAPABILITIES: Lazy<HashMap<&'static str, &'static Capability>> =
    Lazy::new(|| CAPABILITY_TABLE.iter().map(|c| (c.name, c)).collect());

/// Case-insensitive lookup in the capability table.
pub fn lookup(name: &str) -> Option<&'static Capability> {
    CAPABILITIES.get(name.to_ascii_lowercase().as_str()).copied()
}

pub fn capability_names() -> Vec<&'static str> {
    CAPABILITY_TABLE.iter().map(|c| c.name).collect()
}

// ----------- ARGUMENTS -----------

fn arg_str(args: &[Constant], i: usize) -> Result<String, CapabilityError> {
    match args.get(i) {
        Some(Constant::Str(s)) => Ok(s.clone()),
        Some(other) => Err(CapabilityError::Arg(format!("argument {} must be a string, got {}", i + 1, other))),
        None => Err(CapabilityError::Arg(format!("missing argument {}", i + 1))),
    }
}

fn arg_int(args: &[Constant], i: usize) -> Result<i64, CapabilityError> {
    match args.get(i) {
        Some(Constant::Int(v)) => Ok(*v),
        Some(other) => Err(CapabilityError::Arg(format!("argument {} must be an integer, got {}", i + 1, other))),
        None => Err(CapabilityError::Arg(format!("missing argument {}", i + 1))),
    }
}

/// Integer or None; a missing argument reads as None.
fn arg_opt_int(args: &[Constant], i: usize) -> Result<Option<i64>, CapabilityError> {
    match args.get(i) {
        None | Some(Constant::Null) => Ok(None),
        Some(Constant::Int(v)) => Ok(Some(*v)),
        Some(other) => Err(CapabilityError::Arg(format!("argument {} must be an integer or None, got {}", i + 1, other))),
    }
}

fn arg_opt_str(args: &[Constant], i: usize) -> Result<Option<String>, CapabilityError> {
    match args.get(i) {
        None | Some(Constant::Null) => Ok(None),
        Some(Constant::Str(s)) => Ok(Some(s.clone())),
        Some(other) => Err(CapabilityError::Arg(format!("argument {} must be a string or None, got {}", i + 1, other))),
    }
}

fn arg_opt_bool(args: &[Constant], i: usize, default: bool) -> Result<bool, CapabilityError> {
    match args.get(i) {
        None => Ok(default),
        Some(Constant::Bool(b)) => Ok(*b),
        Some(other) => Err(CapabilityError::Arg(format!("argument {} must be a boolean, got {}", i + 1, other))),
    }
}

fn compile_regex(pattern: &str) -> Result<Regex, CapabilityError> {
    Regex::new(pattern).map_err(|e| CapabilityError::Pattern(format!("invalid regular expression '{}': {}", pattern, e)))
}

fn predicate(f: impl Fn(&str) -> bool + Send + Sync + 'static) -> RowFn {
    Box::new(move |s| CapValue::Bool(f(s)))
}

fn mapping(f: impl Fn(&str) -> String + Send + Sync + 'static) -> RowFn {
    Box::new(move |s| CapValue::Str(f(s)))
}

// ----------- PREDICATES -----------

fn prep_startswith(args: &[Constant]) -> Result<RowFn, CapabilityError> {
    let pat = arg_str(args, 0)?;
    Ok(predicate(move |s| s.starts_with(pat.as_str())))
}

fn prep_endswith(args: &[Constant]) -> Result<RowFn, CapabilityError> {
    let pat = arg_str(args, 0)?;
    Ok(predicate(move |s| s.ends_with(pat.as_str())))
}

/// `contains(pat[, regex])`; literal substring unless `regex` is true.
fn prep_contains(args: &[Constant]) -> Result<RowFn, CapabilityError> {
    let pat = arg_str(args, 0)?;
    if arg_opt_bool(args, 1, false)? {
        let re = compile_regex(&pat)?;
        return Ok(predicate(move |s| re.is_match(s)));
    }
    Ok(predicate(move |s| s.contains(pat.as_str())))
}

fn prep_match(args: &[Constant]) -> Result<RowFn, CapabilityError> {
    let re = compile_regex(&format!("^(?:{})", arg_str(args, 0)?))?;
    Ok(predicate(move |s| re.is_match(s)))
}

fn prep_fullmatch(args: &[Constant]) -> Result<RowFn, CapabilityError> {
    let re = compile_regex(&format!("^(?:{})$", arg_str(args, 0)?))?;
    Ok(predicate(move |s| re.is_match(s)))
}

fn prep_isdigit(_: &[Constant]) -> Result<RowFn, CapabilityError> {
    Ok(predicate(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())))
}

fn prep_isalpha(_: &[Constant]) -> Result<RowFn, CapabilityError> {
    Ok(predicate(|s| !s.is_empty() && s.chars().all(char::is_alphabetic)))
}

fn prep_isalnum(_: &[Constant]) -> Result<RowFn, CapabilityError> {
    Ok(predicate(|s| !s.is_empty() && s.chars().all(char::is_alphanumeric)))
}

fn prep_isspace(_: &[Constant]) -> Result<RowFn, CapabilityError> {
    Ok(predicate(|s| !s.is_empty() && s.chars().all(char::is_whitespace)))
}

fn prep_isnumeric(_: &[Constant]) -> Result<RowFn, CapabilityError> {
    Ok(predicate(|s| !s.is_empty() && s.chars().all(char::is_numeric)))
}

// at least one cased character and none of the opposite case
fn prep_islower(_: &[Constant]) -> Result<RowFn, CapabilityError> {
    Ok(predicate(|s| s.chars().any(char::is_lowercase) && !s.chars().any(char::is_uppercase)))
}

fn prep_isupper(_: &[Constant]) -> Result<RowFn, CapabilityError> {
    Ok(predicate(|s| s.chars().any(char::is_uppercase) && !s.chars().any(char::is_lowercase)))
}

// ----------- CASE -----------

fn prep_lower(_: &[Constant]) -> Result<RowFn, CapabilityError> { Ok(mapping(|s| s.to_lowercase())) }

fn prep_upper(_: &[Constant]) -> Result<RowFn, CapabilityError> { Ok(mapping(|s| s.to_uppercase())) }

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_cased = false;
    for ch in s.chars() {
        if prev_cased { out.extend(ch.to_lowercase()); } else { out.extend(ch.to_uppercase()); }
        prev_cased = ch.is_alphabetic();
    }
    out
}

fn prep_title(_: &[Constant]) -> Result<RowFn, CapabilityError> { Ok(mapping(title_case)) }

fn prep_capitalize(_: &[Constant]) -> Result<RowFn, CapabilityError> {
    Ok(mapping(|s| {
        let mut chars = s.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
            None => String::new(),
        }
    }))
}

fn prep_swapcase(_: &[Constant]) -> Result<RowFn, CapabilityError> {
    Ok(mapping(|s| {
        s.chars()
            .flat_map(|c| -> Box<dyn Iterator<Item = char>> {
                if c.is_uppercase() { Box::new(c.to_lowercase()) } else if c.is_lowercase() { Box::new(c.to_uppercase()) } else { Box::new(std::iter::once(c)) }
            })
            .collect()
    }))
}

// ----------- TRIM -----------

enum Side { Both, Left, Right }

fn strip_with(args: &[Constant], side: Side) -> Result<RowFn, CapabilityError> {
    let set: Option<Vec<char>> = arg_opt_str(args, 0)?.map(|s| s.chars().collect());
    Ok(mapping(move |s| {
        let pred = |c: char| match &set { Some(set) => set.contains(&c), None => c.is_whitespace() };
        match side {
            Side::Both => s.trim_matches(pred).to_string(),
            Side::Left => s.trim_start_matches(pred).to_string(),
            Side::Right => s.trim_end_matches(pred).to_string(),
        }
    }))
}

fn prep_strip(args: &[Constant]) -> Result<RowFn, CapabilityError> { strip_with(args, Side::Both) }

fn prep_lstrip(args: &[Constant]) -> Result<RowFn, CapabilityError> { strip_with(args, Side::Left) }

fn prep_rstrip(args: &[Constant]) -> Result<RowFn, CapabilityError> { strip_with(args, Side::Right) }

// ----------- MEASURE / SEARCH -----------

fn prep_len(_: &[Constant]) -> Result<RowFn, CapabilityError> {
    Ok(Box::new(|s| CapValue::Int(s.chars().count() as i64)))
}

/// Character index of the first occurrence, -1 when absent.
fn prep_find(args: &[Constant]) -> Result<RowFn, CapabilityError> {
    let sub = arg_str(args, 0)?;
    Ok(Box::new(move |s| match s.find(sub.as_str()) {
        Some(byte) => CapValue::Int(s[..byte].chars().count() as i64),
        None => CapValue::Int(-1),
    }))
}

/// Non-overlapping regex matches.
fn prep_count(args: &[Constant]) -> Result<RowFn, CapabilityError> {
    let re = compile_regex(&arg_str(args, 0)?)?;
    Ok(Box::new(move |s| CapValue::Int(re.find_iter(s).count() as i64)))
}

/// `replace(old, new[, n])`, literal; `n < 0` replaces every occurrence.
fn prep_replace(args: &[Constant]) -> Result<RowFn, CapabilityError> {
    let old = arg_str(args, 0)?;
    let new = arg_str(args, 1)?;
    let n = arg_opt_int(args, 2)?.unwrap_or(-1);
    Ok(mapping(move |s| if n < 0 { s.replace(old.as_str(), &new) } else { s.replacen(old.as_str(), &new, n as usize) }))
}

fn prep_zfill(args: &[Constant]) -> Result<RowFn, CapabilityError> {
    let width = arg_int(args, 0)?.max(0) as usize;
    Ok(mapping(move |s| {
        let len = s.chars().count();
        if len >= width { return s.to_string(); }
        let pad = "0".repeat(width - len);
        match s.chars().next() {
            Some(sign @ ('+' | '-')) => format!("{}{}{}", sign, pad, &s[sign.len_utf8()..]),
            _ => format!("{}{}", pad, s),
        }
    }))
}

/// Character at a position, negative counts from the end; out of range is null.
fn prep_get(args: &[Constant]) -> Result<RowFn, CapabilityError> {
    let idx = arg_int(args, 0)?;
    Ok(Box::new(move |s| {
        let len = s.chars().count() as i64;
        let i = if idx < 0 { idx + len } else { idx };
        if i < 0 || i >= len { return CapValue::Null; }
        s.chars().nth(i as usize).map(|c| CapValue::Str(c.to_string())).unwrap_or(CapValue::Null)
    }))
}

// ----------- SLICE -----------

/// Python slice semantics over Unicode scalar values. Bounds clamp; a zero step
/// yields an empty string.
pub fn python_slice(s: &str, start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> String {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len() as i64;
    let step = step.unwrap_or(1);
    if step == 0 { return String::new(); }
    let (mut start_idx, mut stop_idx) = if step > 0 { (0i64, len) } else { (len - 1, -1) };
    if let Some(mut st) = start {
        if st < 0 { st += len; }
        start_idx = if step > 0 { st.clamp(0, len) } else { st.clamp(-1, len - 1) };
    }
    if let Some(mut sp) = stop {
        if sp < 0 { sp += len; }
        stop_idx = if step > 0 { sp.clamp(0, len) } else { sp.clamp(-1, len - 1) };
    }
    let mut out = String::new();
    let mut i = start_idx;
    if step > 0 {
        while i < stop_idx {
            out.push(chars[i as usize]);
            i += step;
        }
    } else {
        while i > stop_idx {
            out.push(chars[i as usize]);
            i += step;
        }
    }
    out
}

fn prep_slice(args: &[Constant]) -> Result<RowFn, CapabilityError> {
    let start = arg_opt_int(args, 0)?;
    let stop = arg_opt_int(args, 1)?;
    let step = arg_opt_int(args, 2)?;
    Ok(mapping(move |s| python_slice(s, start, stop, step)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(name: &str, args: &[Constant], input: &str) -> CapValue {
        let cap = lookup(name).expect("capability");
        let f = (cap.prepare)(args).expect("prepare");
        f(input)
    }

    fn s(v: &str) -> Constant { Constant::Str(v.to_string()) }

    #[test]
    fn table_names_are_unique_and_lowercase() {
        let names = capability_names();
        let mut sorted = names.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), names.len());
        assert!(names.iter().all(|n| n.chars().all(|c| c.is_ascii_lowercase())));
        assert!(lookup("StartsWith").is_some());
        assert!(lookup("sqrt").is_none());
    }

    #[test]
    fn python_slice_semantics() {
        assert_eq!(python_slice("xa", Some(1), None, None), "a");
        assert_eq!(python_slice("", Some(1), None, None), "");
        assert_eq!(python_slice("hello", Some(-3), None, None), "llo");
        assert_eq!(python_slice("hello", None, Some(-1), None), "hell");
        assert_eq!(python_slice("hello", Some(10), Some(20), None), "");
        assert_eq!(python_slice("hello", None, None, Some(-1)), "olleh");
        assert_eq!(python_slice("hello", Some(0), Some(5), Some(2)), "hlo");
        assert_eq!(python_slice("héllo", Some(1), Some(3), None), "él");
        assert_eq!(python_slice("abc", None, None, Some(0)), "");
    }

    #[test]
    fn predicates_and_mappings() {
        assert_eq!(run("endswith", &[s("a")], "xa"), CapValue::Bool(true));
        assert_eq!(run("contains", &[s("b")], "abc"), CapValue::Bool(true));
        assert_eq!(run("contains", &[s("^a.c$"), Constant::Bool(true)], "abc"), CapValue::Bool(true));
        assert_eq!(run("match", &[s("ab")], "abc"), CapValue::Bool(true));
        assert_eq!(run("fullmatch", &[s("ab")], "abc"), CapValue::Bool(false));
        assert_eq!(run("title", &[], "hello wORLD"), CapValue::Str("Hello World".into()));
        assert_eq!(run("capitalize", &[], "hELLO"), CapValue::Str("Hello".into()));
        assert_eq!(run("swapcase", &[], "aB1"), CapValue::Str("Ab1".into()));
        assert_eq!(run("strip", &[s("x")], "xxaxx"), CapValue::Str("a".into()));
        assert_eq!(run("lstrip", &[], "  a "), CapValue::Str("a ".into()));
        assert_eq!(run("len", &[], "héllo"), CapValue::Int(5));
        assert_eq!(run("find", &[s("l")], "héllo"), CapValue::Int(2));
        assert_eq!(run("find", &[s("z")], "abc"), CapValue::Int(-1));
        assert_eq!(run("count", &[s("a")], "banana"), CapValue::Int(3));
        assert_eq!(run("replace", &[s("a"), s("o"), Constant::Int(1)], "banana"), CapValue::Str("bonana".into()));
        assert_eq!(run("zfill", &[Constant::Int(4)], "-7"), CapValue::Str("-007".into()));
        assert_eq!(run("get", &[Constant::Int(-1)], "abc"), CapValue::Str("c".into()));
        assert_eq!(run("get", &[Constant::Int(5)], "abc"), CapValue::Null);
        assert_eq!(run("isdigit", &[], ""), CapValue::Bool(false));
        assert_eq!(run("isupper", &[], "AB1"), CapValue::Bool(true));
    }

    #[test]
    fn argument_errors() {
        let cap = lookup("startswith").expect("capability");
        assert!(matches!((cap.prepare)(&[Constant::Int(1)]), Err(CapabilityError::Arg(_))));
        let cap = lookup("match").expect("capability");
        assert!(matches!((cap.prepare)(&[s("(")]), Err(CapabilityError::Pattern(_))));
        assert!(!lookup("replace").expect("capability").accepts(1));
    }
}
