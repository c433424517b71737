//! Unified formula error model.
//! Every stage of the formula pipeline fails fast with one of these kinds and
//! attaches the (partially) rewritten expression it was working on, so callers
//! can show what the engine actually saw.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FormulaError {
    #[error("syntax error at offset {offset}: {message} (in `{expression}`)")]
    Syntax { offset: usize, message: String, expression: String },
    #[error("unresolved reference `{name}` (in `{expression}`)")]
    UnresolvedReference { name: String, expression: String },
    #[error("malformed conditional: {message} (in `{expression}`)")]
    MalformedConditional { message: String, expression: String },
    #[error("type mismatch: {message} (in `{expression}`)")]
    TypeMismatch { message: String, expression: String },
    #[error("evaluation failed: {message} (in `{expression}`)")]
    Evaluation { message: String, expression: String },
}

impl FormulaError {
    pub fn syntax<S: Into<String>, E: Into<String>>(offset: usize, msg: S, expr: E) -> Self {
        FormulaError::Syntax { offset, message: msg.into(), expression: expr.into() }
    }
    pub fn unresolved<S: Into<String>, E: Into<String>>(name: S, expr: E) -> Self {
        FormulaError::UnresolvedReference { name: name.into(), expression: expr.into() }
    }
    pub fn malformed<S: Into<String>, E: Into<String>>(msg: S, expr: E) -> Self {
        FormulaError::MalformedConditional { message: msg.into(), expression: expr.into() }
    }
    pub fn type_mismatch<S: Into<String>, E: Into<String>>(msg: S, expr: E) -> Self {
        FormulaError::TypeMismatch { message: msg.into(), expression: expr.into() }
    }
    pub fn evaluation<S: Into<String>, E: Into<String>>(msg: S, expr: E) -> Self {
        FormulaError::Evaluation { message: msg.into(), expression: expr.into() }
    }

    pub fn code_str(&self) -> &'static str {
        match self {
            FormulaError::Syntax { .. } => "syntax_error",
            FormulaError::UnresolvedReference { .. } => "unresolved_reference",
            FormulaError::MalformedConditional { .. } => "malformed_conditional",
            FormulaError::TypeMismatch { .. } => "type_mismatch",
            FormulaError::Evaluation { .. } => "evaluation_error",
        }
    }

    pub fn message(&self) -> String {
        match self {
            FormulaError::UnresolvedReference { name, .. } => format!("unknown column or identifier `{}`", name),
            FormulaError::Syntax { message, .. }
            | FormulaError::MalformedConditional { message, .. }
            | FormulaError::TypeMismatch { message, .. }
            | FormulaError::Evaluation { message, .. } => message.clone(),
        }
    }

    /// The expression text the failing stage was working on.
    pub fn expression(&self) -> &str {
        match self {
            FormulaError::Syntax { expression, .. }
            | FormulaError::UnresolvedReference { expression, .. }
            | FormulaError::MalformedConditional { expression, .. }
            | FormulaError::TypeMismatch { expression, .. }
            | FormulaError::Evaluation { expression, .. } => expression.as_str(),
        }
    }

    /// Replace the attached expression, used when a later stage re-raises an
    /// error found while looking at a sub-expression.
    pub fn with_expression<E: Into<String>>(mut self, expr: E) -> Self {
        let e = expr.into();
        match &mut self {
            FormulaError::Syntax { expression, .. }
            | FormulaError::UnresolvedReference { expression, .. }
            | FormulaError::MalformedConditional { expression, .. }
            | FormulaError::TypeMismatch { expression, .. }
            | FormulaError::Evaluation { expression, .. } => *expression = e,
        }
        self
    }

    /// Map to a process exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            FormulaError::Syntax { .. } => 2,
            FormulaError::UnresolvedReference { .. } => 3,
            FormulaError::MalformedConditional { .. } => 4,
            FormulaError::TypeMismatch { .. } => 5,
            FormulaError::Evaluation { .. } => 6,
        }
    }
}

pub type FormulaResult<T> = Result<T, FormulaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_mapping() {
        assert_eq!(FormulaError::syntax(0, "bad", "x").exit_code(), 2);
        assert_eq!(FormulaError::unresolved("col9", "x").exit_code(), 3);
        assert_eq!(FormulaError::malformed("dangling WHEN", "x").exit_code(), 4);
        assert_eq!(FormulaError::type_mismatch("not a string", "x").exit_code(), 5);
        assert_eq!(FormulaError::evaluation("boom", "x").exit_code(), 6);
    }

    #[test]
    fn expression_is_attached_and_replaceable() {
        let e = FormulaError::type_mismatch("upper needs a string column", "table[\"a\"].upper()");
        assert_eq!(e.code_str(), "type_mismatch");
        assert_eq!(e.expression(), "table[\"a\"].upper()");
        let e = e.with_expression("whole");
        assert_eq!(e.expression(), "whole");
        assert!(e.to_string().contains("upper needs a string column"));
    }

    #[test]
    fn serializes_tagged() {
        let v = serde_json::to_value(FormulaError::unresolved("col9", "col9 + 1")).unwrap();
        assert_eq!(v["type"], "unresolved_reference");
        assert_eq!(v["name"], "col9");
        assert_eq!(v["expression"], "col9 + 1");
    }
}
