use crate::error::{FormulaError, FormulaResult};
use crate::formula::formula_common::*;

#[inline]
pub(crate) fn is_ident_start(ch: char) -> bool { ch == '_' || ch.is_alphabetic() }

#[inline]
pub(crate) fn is_ident_char(ch: char) -> bool { ch == '_' || ch.is_alphanumeric() }

/// Split a formula into typed tokens. Whitespace is dropped; every token keeps
/// its byte span so later stages can slice the original text.
pub fn tokenize(src: &str) -> FormulaResult<Vec<Token>> {
    let mut out: Vec<Token> = Vec::new();
    let mut i = 0usize;
    while i < src.len() {
        let rest = &src[i..];
        let Some(ch) = rest.chars().next() else { break };
        if ch.is_whitespace() { i += ch.len_utf8(); continue; }
        let start = i;
        let simple = match ch {
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            '[' => Some(TokenKind::LBracket),
            ']' => Some(TokenKind::RBracket),
            ',' => Some(TokenKind::Comma),
            ':' => Some(TokenKind::Colon),
            '+' => Some(TokenKind::Op(Op::Plus)),
            '-' => Some(TokenKind::Op(Op::Minus)),
            '*' => Some(TokenKind::Op(Op::Star)),
            '/' => Some(TokenKind::Op(Op::Slash)),
            '%' => Some(TokenKind::Op(Op::Percent)),
            '~' => Some(TokenKind::Op(Op::Tilde)),
            _ => None,
        };
        if let Some(kind) = simple {
            out.push(Token { kind, start, end: i + 1 });
            i += 1;
            continue;
        }
        // '.' starts a float only when a digit follows (".5"); otherwise it is member access
        if ch == '.' && !rest[1..].starts_with(|c: char| c.is_ascii_digit()) {
            out.push(Token { kind: TokenKind::Dot, start, end: i + 1 });
            i += 1;
            continue;
        }
        if let Some((op, len)) = lex_operator(rest) {
            out.push(Token { kind: TokenKind::Op(op), start, end: i + len });
            i += len;
            continue;
        }
        if ch == '\'' || ch == '"' {
            let (value, len) = lex_string(src, i, ch)?;
            out.push(Token { kind: TokenKind::Str(value), start, end: i + len });
            i += len;
            continue;
        }
        if ch == '`' {
            let Some(close) = rest[1..].find('`') else {
                return Err(FormulaError::syntax(start, "unterminated backtick identifier", src));
            };
            let name = &rest[1..1 + close];
            if name.is_empty() {
                return Err(FormulaError::syntax(start, "empty backtick identifier", src));
            }
            out.push(Token { kind: TokenKind::Quoted(name.to_string()), start, end: i + close + 2 });
            i += close + 2;
            continue;
        }
        if ch.is_ascii_digit() || ch == '.' {
            let (kind, len) = lex_number(src, i)?;
            out.push(Token { kind, start, end: i + len });
            i += len;
            continue;
        }
        if is_ident_start(ch) {
            let len = rest.char_indices().find(|(_, c)| !is_ident_char(*c)).map(|(p, _)| p).unwrap_or(rest.len());
            let word = &rest[..len];
            let kind = match Keyword::from_word(word) {
                Some(kw) => TokenKind::Keyword(kw),
                None => TokenKind::Ident(word.to_string()),
            };
            out.push(Token { kind, start, end: i + len });
            i += len;
            continue;
        }
        return Err(FormulaError::syntax(start, format!("unexpected character '{}'", ch), src));
    }
    Ok(out)
}

fn lex_operator(rest: &str) -> Option<(Op, usize)> {
    // two-character operators first
    let two = match rest.get(..2) {
        Some("==") => Some(Op::Eq),
        Some("!=") | Some("<>") => Some(Op::Ne),
        Some("<=") => Some(Op::Le),
        Some(">=") => Some(Op::Ge),
        Some("&&") => Some(Op::Amp),
        Some("||") => Some(Op::Pipe),
        _ => None,
    };
    if let Some(op) = two { return Some((op, 2)); }
    let one = match rest.as_bytes().first()? {
        b'=' => Op::Eq,
        b'<' => Op::Lt,
        b'>' => Op::Gt,
        b'&' => Op::Amp,
        b'|' => Op::Pipe,
        b'!' => Op::Bang,
        _ => return None,
    };
    Some((one, 1))
}

/// Quoted string starting at `start`; returns the unescaped value and the byte length consumed.
fn lex_string(src: &str, start: usize, quote: char) -> FormulaResult<(String, usize)> {
    let body = &src[start + 1..];
    let mut value = String::new();
    let mut chars = body.char_indices();
    while let Some((p, ch)) = chars.next() {
        if ch == quote {
            return Ok((value, p + 2));
        }
        if ch == '\\' {
            match chars.next() {
                Some((_, 'n')) => value.push('\n'),
                Some((_, 't')) => value.push('\t'),
                Some((_, 'r')) => value.push('\r'),
                Some((_, other)) => value.push(other),
                None => break,
            }
            continue;
        }
        value.push(ch);
    }
    Err(FormulaError::syntax(start, "unterminated string literal", src))
}

fn lex_number(src: &str, start: usize) -> FormulaResult<(TokenKind, usize)> {
    let bytes = src.as_bytes();
    let mut j = start;
    let mut is_float = false;
    while j < bytes.len() && bytes[j].is_ascii_digit() { j += 1; }
    if j < bytes.len() && bytes[j] == b'.' && j + 1 < bytes.len() && bytes[j + 1].is_ascii_digit() {
        is_float = true;
        j += 1;
        while j < bytes.len() && bytes[j].is_ascii_digit() { j += 1; }
    }
    if j < bytes.len() && (bytes[j] == b'e' || bytes[j] == b'E') {
        let mut k = j + 1;
        if k < bytes.len() && (bytes[k] == b'+' || bytes[k] == b'-') { k += 1; }
        if k < bytes.len() && bytes[k].is_ascii_digit() {
            while k < bytes.len() && bytes[k].is_ascii_digit() { k += 1; }
            is_float = true;
            j = k;
        }
    }
    let text = &src[start..j];
    if is_float {
        let v: f64 = text.parse().map_err(|_| FormulaError::syntax(start, format!("invalid number '{}'", text), src))?;
        Ok((TokenKind::Float(v), j - start))
    } else {
        let v: i64 = text.parse().map_err(|_| FormulaError::syntax(start, format!("integer literal '{}' out of range", text), src))?;
        Ok((TokenKind::Int(v), j - start))
    }
}
