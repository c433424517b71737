//! Column resolution over the token stream.
//!
//! Bare identifiers (and token runs such as `profile.name`, `order id` or
//! `2023_sales`) that spell a known column are collapsed into a single `Column` token.
//! Candidates are tried longest name first, so a short column name never
//! captures the prefix of a longer one. Backtick identifiers must name an
//! existing column.

use std::collections::HashSet;

use tracing::debug;

use crate::error::{FormulaError, FormulaResult};
use crate::formula::formula_common::*;
use crate::formula::formula_lex::is_ident_char;

pub fn resolve_columns(src: &str, tokens: Vec<Token>, columns: &[String]) -> FormulaResult<Vec<Token>> {
    let known: HashSet<&str> = columns.iter().map(|c| c.as_str()).collect();
    let mut by_len: Vec<&str> = columns.iter().map(|c| c.as_str()).filter(|c| !c.is_empty()).collect();
    // stable sort keeps table order among equal lengths
    by_len.sort_by(|a, b| b.len().cmp(&a.len()));

    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    let mut i = 0usize;
    while i < tokens.len() {
        let tok = &tokens[i];
        match &tok.kind {
            TokenKind::Quoted(name) => {
                if !known.contains(name.as_str()) {
                    return Err(FormulaError::unresolved(name.clone(), src));
                }
                out.push(Token { kind: TokenKind::Column(name.clone()), start: tok.start, end: tok.end });
                i += 1;
                continue;
            }
            // digit-led names such as `2023_sales` lex as a number followed by an identifier
            TokenKind::Ident(_) | TokenKind::Int(_) | TokenKind::Float(_) => {
                let after_dot = i > 0 && tokens[i - 1].kind == TokenKind::Dot;
                if !after_dot {
                    if let Some((name, last)) = match_column_at(src, &tokens, i, &by_len) {
                        debug!(target: "formulate::formula", "resolved column '{}' at offset {}", name, tok.start);
                        out.push(Token { kind: TokenKind::Column(name.to_string()), start: tok.start, end: tokens[last].end });
                        i = last + 1;
                        continue;
                    }
                }
            }
            _ => {}
        }
        out.push(tok.clone());
        i += 1;
    }
    Ok(out)
}

/// Longest column whose name is spelled by the source text starting at token `i`
/// and ending exactly on a token boundary. Returns the name and the index of the
/// last token it covers.
fn match_column_at<'c>(src: &str, tokens: &[Token], i: usize, by_len: &[&'c str]) -> Option<(&'c str, usize)> {
    let start = tokens[i].start;
    let rest = &src[start..];
    for name in by_len {
        if !rest.starts_with(name) { continue; }
        let end = start + name.len();
        let Some(last) = tokens[i..].iter().position(|t| t.end == end).map(|p| p + i) else { continue };
        if src[end..].chars().next().map(is_ident_char).unwrap_or(false) { continue; }
        // a lone identifier followed by '(' is a function name
        if last == i && matches!(tokens.get(i + 1).map(|t| &t.kind), Some(TokenKind::LParen)) { continue; }
        return Some((name, last));
    }
    None
}

/// Fail compilation on any identifier left in value position after parsing.
pub fn check_unresolved(expr: &FormulaExpr) -> FormulaResult<()> {
    let mut missing: Option<&str> = None;
    expr.walk(&mut |node| {
        if missing.is_none() {
            if let FormulaExpr::Ident(name) = node { missing = Some(name.as_str()); }
        }
    });
    match missing {
        Some(name) => Err(FormulaError::unresolved(name, expr.to_string())),
        None => Ok(()),
    }
}
