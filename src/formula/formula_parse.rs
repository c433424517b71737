use crate::config::EngineConfig;
use crate::error::{FormulaError, FormulaResult};
use crate::formula::formula_common::*;
use crate::formula::formula_conditional::split_conditional;

/// Parse a resolved token stream into a formula tree.
pub fn parse_formula(src: &str, tokens: &[Token], config: &EngineConfig) -> FormulaResult<FormulaExpr> {
    if tokens.is_empty() {
        return Err(FormulaError::syntax(0, "empty formula", src));
    }
    let p = Parser { src, tokens, config };
    p.parse_chain(0, tokens.len(), 0)
}

struct Parser<'a> {
    src: &'a str,
    tokens: &'a [Token],
    config: &'a EngineConfig,
}

/// Cursor over one token range; the range is parsed as a single non-chain expression.
struct Cursor {
    pos: usize,
    hi: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn err_at(&self, idx: usize, msg: impl Into<String>) -> FormulaError {
        let offset = self.tokens.get(idx).map(|t| t.start).unwrap_or(self.src.len());
        FormulaError::syntax(offset, msg, self.src)
    }

    fn too_deep(&self, idx: usize) -> FormulaError {
        self.err_at(idx, format!("nesting deeper than {} levels", self.config.max_depth))
    }

    /// Lowest precedence: the WHEN/OTHERWISE chain. The links of one chain are
    /// collected in a loop at the same depth; only brackets nest deeper.
    fn parse_chain(&self, lo: usize, hi: usize, depth: usize) -> FormulaResult<FormulaExpr> {
        if depth > self.config.max_depth {
            return Err(self.too_deep(lo));
        }
        if lo >= hi {
            return Err(self.err_at(lo, "expected an expression"));
        }
        let mut links: Vec<(FormulaExpr, FormulaExpr)> = Vec::new();
        let mut start = lo;
        while let Some(split) = split_conditional(self.src, self.tokens, start, hi, self.config.allow_if_else)? {
            let value = self.parse_chain(start, split.when_at, depth)?;
            let condition = self.parse_chain(split.when_at + 1, split.otherwise_at, depth)?;
            links.push((value, condition));
            start = split.otherwise_at + 1;
        }
        let tail = self.parse_plain(start, hi, depth)?;
        Ok(links.into_iter().rev().fold(tail, |otherwise, (value, condition)| FormulaExpr::Conditional {
            value: value.boxed(),
            condition: condition.boxed(),
            otherwise: otherwise.boxed(),
        }))
    }

    /// One range holding no depth-0 chain.
    fn parse_plain(&self, lo: usize, hi: usize, depth: usize) -> FormulaResult<FormulaExpr> {
        let mut cur = Cursor { pos: lo, hi, depth };
        let e = self.parse_or(&mut cur)?;
        if cur.pos < hi {
            return Err(self.err_at(cur.pos, format!("unexpected '{}'", self.text(cur.pos, cur.pos + 1))));
        }
        Ok(e)
    }

    fn text(&self, lo: usize, hi: usize) -> &'a str { token_text(self.src, self.tokens, lo, hi) }

    fn peek(&self, cur: &Cursor) -> Option<&'a TokenKind> {
        if cur.pos < cur.hi { Some(&self.tokens[cur.pos].kind) } else { None }
    }

    fn peek_at(&self, cur: &Cursor, ahead: usize) -> Option<&'a TokenKind> {
        let i = cur.pos + ahead;
        if i < cur.hi { Some(&self.tokens[i].kind) } else { None }
    }

    fn parse_or(&self, cur: &mut Cursor) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_and(cur)?;
        while matches!(self.peek(cur), Some(TokenKind::Keyword(Keyword::Or)) | Some(TokenKind::Op(Op::Pipe))) {
            cur.pos += 1;
            let right = self.parse_and(cur)?;
            left = FormulaExpr::Binary { op: BinOp::Or, left: left.boxed(), right: right.boxed() };
        }
        Ok(left)
    }

    fn parse_and(&self, cur: &mut Cursor) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_not(cur)?;
        while matches!(self.peek(cur), Some(TokenKind::Keyword(Keyword::And)) | Some(TokenKind::Op(Op::Amp))) {
            cur.pos += 1;
            let right = self.parse_not(cur)?;
            left = FormulaExpr::Binary { op: BinOp::And, left: left.boxed(), right: right.boxed() };
        }
        Ok(left)
    }

    fn parse_not(&self, cur: &mut Cursor) -> FormulaResult<FormulaExpr> {
        let at = cur.pos;
        let mut count = 0usize;
        while matches!(self.peek(cur), Some(TokenKind::Keyword(Keyword::Not)) | Some(TokenKind::Op(Op::Tilde)) | Some(TokenKind::Op(Op::Bang))) {
            cur.pos += 1;
            count += 1;
            if cur.depth + count > self.config.max_depth {
                return Err(self.too_deep(at));
            }
        }
        let mut e = self.parse_comparison(cur)?;
        for _ in 0..count {
            e = FormulaExpr::Unary { op: UnaryOp::Not, expr: e.boxed() };
        }
        Ok(e)
    }

    fn parse_comparison(&self, cur: &mut Cursor) -> FormulaResult<FormulaExpr> {
        let left = self.parse_additive(cur)?;
        let op = match self.peek(cur) {
            Some(TokenKind::Op(Op::Eq)) => Some(BinOp::Eq),
            Some(TokenKind::Op(Op::Ne)) => Some(BinOp::Ne),
            Some(TokenKind::Op(Op::Lt)) => Some(BinOp::Lt),
            Some(TokenKind::Op(Op::Le)) => Some(BinOp::Le),
            Some(TokenKind::Op(Op::Gt)) => Some(BinOp::Gt),
            Some(TokenKind::Op(Op::Ge)) => Some(BinOp::Ge),
            _ => None,
        };
        if let Some(op) = op {
            cur.pos += 1;
            let right = self.parse_additive(cur)?;
            return Ok(FormulaExpr::Binary { op, left: left.boxed(), right: right.boxed() });
        }
        // x in y / x not in y
        let negated = match (self.peek(cur), self.peek_at(cur, 1)) {
            (Some(TokenKind::Keyword(Keyword::In)), _) => Some(false),
            (Some(TokenKind::Keyword(Keyword::Not)), Some(TokenKind::Keyword(Keyword::In))) => Some(true),
            _ => None,
        };
        if let Some(negated) = negated {
            cur.pos += if negated { 2 } else { 1 };
            let haystack = self.parse_additive(cur)?;
            return Ok(FormulaExpr::In { needle: left.boxed(), haystack: haystack.boxed(), negated });
        }
        Ok(left)
    }

    fn parse_additive(&self, cur: &mut Cursor) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_multiplicative(cur)?;
        loop {
            let op = match self.peek(cur) {
                Some(TokenKind::Op(Op::Plus)) => BinOp::Add,
                Some(TokenKind::Op(Op::Minus)) => BinOp::Sub,
                _ => break,
            };
            cur.pos += 1;
            let right = self.parse_multiplicative(cur)?;
            left = FormulaExpr::Binary { op, left: left.boxed(), right: right.boxed() };
        }
        Ok(left)
    }

    fn parse_multiplicative(&self, cur: &mut Cursor) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_unary(cur)?;
        loop {
            let op = match self.peek(cur) {
                Some(TokenKind::Op(Op::Star)) => BinOp::Mul,
                Some(TokenKind::Op(Op::Slash)) => BinOp::Div,
                Some(TokenKind::Op(Op::Percent)) => BinOp::Mod,
                _ => break,
            };
            cur.pos += 1;
            let right = self.parse_unary(cur)?;
            left = FormulaExpr::Binary { op, left: left.boxed(), right: right.boxed() };
        }
        Ok(left)
    }

    fn parse_unary(&self, cur: &mut Cursor) -> FormulaResult<FormulaExpr> {
        let at = cur.pos;
        let mut prefixes = 0usize;
        let mut negations = 0usize;
        while let Some(TokenKind::Op(op @ (Op::Minus | Op::Plus))) = self.peek(cur) {
            if *op == Op::Minus { negations += 1; }
            cur.pos += 1;
            prefixes += 1;
            if cur.depth + prefixes > self.config.max_depth {
                return Err(self.too_deep(at));
            }
        }
        let mut e = self.parse_postfix(cur)?;
        for _ in 0..negations {
            // fold negative numeric literals so they stay constants
            e = match e {
                FormulaExpr::Lit(Constant::Int(v)) => FormulaExpr::Lit(Constant::Int(-v)),
                FormulaExpr::Lit(Constant::Float(v)) => FormulaExpr::Lit(Constant::Float(-v)),
                other => FormulaExpr::Unary { op: UnaryOp::Neg, expr: other.boxed() },
            };
        }
        Ok(e)
    }

    fn parse_postfix(&self, cur: &mut Cursor) -> FormulaResult<FormulaExpr> {
        let mut e = self.parse_primary(cur)?;
        loop {
            match self.peek(cur) {
                Some(TokenKind::Dot) => {
                    let name = match self.peek_at(cur, 1) {
                        Some(TokenKind::Ident(n)) => n.clone(),
                        _ => return Err(self.err_at(cur.pos + 1, "expected a method name after '.'")),
                    };
                    // pandas-style `.str.` accessor: the method that follows is string-scoped anyway
                    if name == "str" && matches!(self.peek_at(cur, 2), Some(TokenKind::Dot)) {
                        cur.pos += 2;
                        continue;
                    }
                    if !matches!(self.peek_at(cur, 2), Some(TokenKind::LParen)) {
                        return Err(self.err_at(cur.pos + 1, format!("attribute access '.{}' is not supported; expected a call", name)));
                    }
                    let open = cur.pos + 2;
                    let close = self.find_close(open, cur.hi)?;
                    let args = self.parse_args(open + 1, close, cur.depth + 1)?;
                    cur.pos = close + 1;
                    e = FormulaExpr::Method { receiver: e.boxed(), name, args };
                }
                Some(TokenKind::LBracket) => {
                    let open = cur.pos;
                    let close = self.find_close(open, cur.hi)?;
                    let colon = self.find_top_level(open + 1, close, |k| matches!(k, TokenKind::Colon));
                    let Some(colon) = colon.first().copied() else {
                        return Err(self.err_at(open, "only [start:stop] slices are supported"));
                    };
                    let start = if colon > open + 1 { Some(self.parse_chain(open + 1, colon, cur.depth + 1)?.boxed()) } else { None };
                    let stop = if close > colon + 1 { Some(self.parse_chain(colon + 1, close, cur.depth + 1)?.boxed()) } else { None };
                    cur.pos = close + 1;
                    e = FormulaExpr::Subscript { target: e.boxed(), start, stop };
                }
                _ => break,
            }
        }
        Ok(e)
    }

    fn parse_primary(&self, cur: &mut Cursor) -> FormulaResult<FormulaExpr> {
        let Some(kind) = self.peek(cur) else {
            return Err(self.err_at(cur.pos, "unexpected end of formula"));
        };
        let at = cur.pos;
        match kind {
            TokenKind::Int(v) => { cur.pos += 1; Ok(FormulaExpr::Lit(Constant::Int(*v))) }
            TokenKind::Float(v) => { cur.pos += 1; Ok(FormulaExpr::Lit(Constant::Float(*v))) }
            TokenKind::Str(s) => { cur.pos += 1; Ok(FormulaExpr::Lit(Constant::Str(s.clone()))) }
            TokenKind::Keyword(Keyword::True) => { cur.pos += 1; Ok(FormulaExpr::Lit(Constant::Bool(true))) }
            TokenKind::Keyword(Keyword::False) => { cur.pos += 1; Ok(FormulaExpr::Lit(Constant::Bool(false))) }
            TokenKind::Keyword(Keyword::Null) => { cur.pos += 1; Ok(FormulaExpr::Lit(Constant::Null)) }
            TokenKind::Column(name) => { cur.pos += 1; Ok(FormulaExpr::Column(name.clone())) }
            TokenKind::Quoted(name) => { cur.pos += 1; Ok(FormulaExpr::Ident(name.clone())) }
            TokenKind::Ident(name) => {
                if matches!(self.peek_at(cur, 1), Some(TokenKind::LParen)) {
                    let open = at + 1;
                    let close = self.find_close(open, cur.hi)?;
                    let args = self.parse_args(open + 1, close, cur.depth + 1)?;
                    cur.pos = close + 1;
                    return Ok(FormulaExpr::Call { name: name.clone(), args });
                }
                cur.pos += 1;
                Ok(FormulaExpr::Ident(name.clone()))
            }
            TokenKind::LParen => {
                let close = self.find_close(at, cur.hi)?;
                if close == at + 1 {
                    return Err(self.err_at(at, "empty parentheses"));
                }
                let commas = self.find_top_level(at + 1, close, |k| matches!(k, TokenKind::Comma));
                let e = if commas.is_empty() {
                    self.parse_chain(at + 1, close, cur.depth + 1)?
                } else {
                    FormulaExpr::Tuple(self.parse_args(at + 1, close, cur.depth + 1)?)
                };
                cur.pos = close + 1;
                Ok(e)
            }
            TokenKind::Keyword(_) => Err(self.err_at(at, format!("unexpected keyword '{}'", self.text(at, at + 1)))),
            _ => Err(self.err_at(at, format!("unexpected '{}'", self.text(at, at + 1)))),
        }
    }

    /// Comma-separated arguments in tokens[lo..hi]; an empty range is an empty list.
    fn parse_args(&self, lo: usize, hi: usize, depth: usize) -> FormulaResult<Vec<FormulaExpr>> {
        if lo >= hi { return Ok(Vec::new()); }
        let mut args = Vec::new();
        let mut start = lo;
        for comma in self.find_top_level(lo, hi, |k| matches!(k, TokenKind::Comma)) {
            args.push(self.parse_chain(start, comma, depth)?);
            start = comma + 1;
        }
        // trailing comma is allowed: (a, b,)
        if start < hi { args.push(self.parse_chain(start, hi, depth)?); }
        Ok(args)
    }

    /// Index of the bracket closing the one at `open`, within `hi`.
    fn find_close(&self, open: usize, hi: usize) -> FormulaResult<usize> {
        let closer = match self.tokens[open].kind {
            TokenKind::LParen => TokenKind::RParen,
            _ => TokenKind::RBracket,
        };
        let mut stack: Vec<&TokenKind> = Vec::new();
        for (i, tok) in self.tokens.iter().enumerate().take(hi).skip(open) {
            match &tok.kind {
                TokenKind::LParen | TokenKind::LBracket => stack.push(&tok.kind),
                TokenKind::RParen | TokenKind::RBracket => {
                    let expected = match stack.pop() {
                        Some(TokenKind::LParen) => TokenKind::RParen,
                        Some(_) => TokenKind::RBracket,
                        None => return Err(self.err_at(i, "unbalanced closing bracket")),
                    };
                    if tok.kind != expected {
                        return Err(self.err_at(i, "mismatched brackets"));
                    }
                    if stack.is_empty() {
                        debug_assert_eq!(tok.kind, closer);
                        return Ok(i);
                    }
                }
                _ => {}
            }
        }
        Err(self.err_at(open, "unbalanced parenthesis"))
    }

    /// Positions in tokens[lo..hi] at bracket depth 0 whose kind satisfies `pred`.
    fn find_top_level(&self, lo: usize, hi: usize, pred: impl Fn(&TokenKind) -> bool) -> Vec<usize> {
        let mut depth: i32 = 0;
        let mut out = Vec::new();
        for (i, tok) in self.tokens.iter().enumerate().take(hi).skip(lo) {
            match &tok.kind {
                TokenKind::LParen | TokenKind::LBracket => depth += 1,
                TokenKind::RParen | TokenKind::RBracket => depth -= 1,
                k if depth == 0 && pred(k) => out.push(i),
                _ => {}
            }
        }
        out
    }
}
