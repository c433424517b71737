//! Conditional chains: `V1 WHEN C1 OTHERWISE V2 WHEN C2 OTHERWISE ... OTHERWISE D`.
//!
//! Splitting happens on the token stream and only at parenthesis depth 0 of the
//! range being scanned, so chains nested inside parentheses are left for the
//! recursive parse of that group. `IF`/`ELSE` are accepted as aliases when the
//! engine config allows them; the opener decides which closer is expected.
//! Flattening turns the right-nested result into one ordered branch list.

use crate::error::{FormulaError, FormulaResult};
use crate::formula::formula_common::*;

/// Token positions of the depth-0 opener and its matching closer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainSplit {
    pub when_at: usize,
    pub otherwise_at: usize,
}

fn opener(kind: &TokenKind, allow_if_else: bool) -> Option<Keyword> {
    match kind {
        TokenKind::Keyword(Keyword::When) => Some(Keyword::Otherwise),
        TokenKind::Keyword(Keyword::If) if allow_if_else => Some(Keyword::Else),
        _ => None,
    }
}

fn is_closer(kind: &TokenKind, allow_if_else: bool) -> bool {
    match kind {
        TokenKind::Keyword(Keyword::Otherwise) => true,
        TokenKind::Keyword(Keyword::Else) => allow_if_else,
        _ => false,
    }
}

/// Find the first depth-0 `WHEN` in tokens[lo..hi] and the first depth-0
/// `OTHERWISE` after it. `Ok(None)` when the range holds no chain at depth 0.
pub fn split_conditional(src: &str, tokens: &[Token], lo: usize, hi: usize, allow_if_else: bool) -> FormulaResult<Option<ChainSplit>> {
    let text = || token_text(src, tokens, lo, hi).to_string();
    let mut depth: i32 = 0;
    let mut found: Option<(usize, Keyword)> = None;
    for (i, tok) in tokens.iter().enumerate().take(hi).skip(lo) {
        match &tok.kind {
            TokenKind::LParen | TokenKind::LBracket => depth += 1,
            TokenKind::RParen | TokenKind::RBracket => depth -= 1,
            kind if depth == 0 => {
                if let Some(closer) = opener(kind, allow_if_else) {
                    found = Some((i, closer));
                    break;
                }
                if is_closer(kind, allow_if_else) {
                    return Err(FormulaError::malformed("OTHERWISE without a preceding WHEN", text()));
                }
            }
            _ => {}
        }
    }
    let Some((when_at, closer)) = found else { return Ok(None) };

    let mut depth: i32 = 0;
    let mut otherwise_at: Option<usize> = None;
    for (j, tok) in tokens.iter().enumerate().take(hi).skip(when_at + 1) {
        match &tok.kind {
            TokenKind::LParen | TokenKind::LBracket => depth += 1,
            TokenKind::RParen | TokenKind::RBracket => depth -= 1,
            TokenKind::Keyword(k) if depth == 0 && *k == closer => { otherwise_at = Some(j); break; }
            _ => {}
        }
    }
    let Some(otherwise_at) = otherwise_at else {
        return Err(FormulaError::malformed("WHEN without a matching OTHERWISE", text()));
    };
    if when_at == lo {
        return Err(FormulaError::malformed("empty branch value before WHEN", text()));
    }
    if otherwise_at == when_at + 1 {
        return Err(FormulaError::malformed("empty condition between WHEN and OTHERWISE", text()));
    }
    if otherwise_at + 1 >= hi {
        return Err(FormulaError::malformed("empty default after OTHERWISE", text()));
    }
    Ok(Some(ChainSplit { when_at, otherwise_at }))
}

/// Collapse right-nested `Conditional` nodes into `Select` branch lists.
/// A chain in the OTHERWISE slot (parenthesized or not) continues the enclosing
/// list; chains inside values or conditions become their own `Select`.
pub fn flatten_conditionals(expr: FormulaExpr) -> FormulaResult<FormulaExpr> {
    expr.rewrite(&mut |node| match node {
        FormulaExpr::Conditional { value, condition, otherwise } => {
            let mut branches = vec![Branch { condition: *condition, value: *value }];
            let default = match *otherwise {
                FormulaExpr::Select(rest) => {
                    branches.extend(rest.branches);
                    rest.default
                }
                other => other.boxed(),
            };
            Ok(FormulaExpr::Select(BranchList { branches, default }))
        }
        other => Ok(other),
    })
}
