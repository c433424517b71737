use std::fmt::{self, Display, Formatter};

use crate::error::FormulaResult;

/// Reserved words. Matched case-insensitively; a column that shares a name
/// with one of these must be written with backticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword { When, Otherwise, If, Else, And, Or, Not, In, True, False, Null }

impl Keyword {
    pub fn from_word(w: &str) -> Option<Keyword> {
        match w.to_ascii_uppercase().as_str() {
            "WHEN" => Some(Keyword::When),
            "OTHERWISE" => Some(Keyword::Otherwise),
            "IF" => Some(Keyword::If),
            "ELSE" => Some(Keyword::Else),
            "AND" => Some(Keyword::And),
            "OR" => Some(Keyword::Or),
            "NOT" => Some(Keyword::Not),
            "IN" => Some(Keyword::In),
            "TRUE" => Some(Keyword::True),
            "FALSE" => Some(Keyword::False),
            "NULL" | "NONE" => Some(Keyword::Null),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op { Plus, Minus, Star, Slash, Percent, Eq, Ne, Lt, Le, Gt, Ge, Amp, Pipe, Tilde, Bang }

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    /// `backtick quoted` identifier, always a column reference
    Quoted(String),
    /// Produced by the column resolver
    Column(String),
    Int(i64),
    Float(f64),
    Str(String),
    Keyword(Keyword),
    Op(Op),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Dot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte span in the source formula
    pub start: usize,
    pub end: usize,
}

/// Source text covered by tokens[lo..hi]; empty for an empty range.
pub fn token_text<'a>(src: &'a str, tokens: &[Token], lo: usize, hi: usize) -> &'a str {
    if lo >= hi || hi > tokens.len() { return ""; }
    &src[tokens[lo].start..tokens[hi - 1].end]
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
}

/// Coarse value kinds used for capability results and type checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind { Int, Float, Str, Bool, Temporal, Null, Other }

impl ValueKind {
    pub fn is_numeric(self) -> bool { matches!(self, ValueKind::Int | ValueKind::Float) }
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueKind::Int => "integer",
            ValueKind::Float => "float",
            ValueKind::Str => "string",
            ValueKind::Bool => "boolean",
            ValueKind::Temporal => "date/time",
            ValueKind::Null => "null",
            ValueKind::Other => "unsupported",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp { Add, Sub, Mul, Div, Mod, Eq, Ne, Lt, Le, Gt, Ge, And, Or }

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }
    pub fn is_comparison(self) -> bool {
        matches!(self, BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp { Neg, Not }

#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub condition: FormulaExpr,
    pub value: FormulaExpr,
}

/// Ordered (condition, value) pairs plus a default. The first branch whose
/// condition holds for a row wins.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchList {
    pub branches: Vec<Branch>,
    pub default: Box<FormulaExpr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    Lit(Constant),
    /// Resolved column reference
    Column(String),
    /// Identifier that did not resolve to a column
    Ident(String),
    Call { name: String, args: Vec<FormulaExpr> },
    Method { receiver: Box<FormulaExpr>, name: String, args: Vec<FormulaExpr> },
    /// `target[start:stop]` before the slice rewrite
    Subscript { target: Box<FormulaExpr>, start: Option<Box<FormulaExpr>>, stop: Option<Box<FormulaExpr>> },
    Unary { op: UnaryOp, expr: Box<FormulaExpr> },
    Binary { op: BinOp, left: Box<FormulaExpr>, right: Box<FormulaExpr> },
    In { needle: Box<FormulaExpr>, haystack: Box<FormulaExpr>, negated: bool },
    Tuple(Vec<FormulaExpr>),
    /// `value WHEN condition OTHERWISE otherwise` before flattening
    Conditional { value: Box<FormulaExpr>, condition: Box<FormulaExpr>, otherwise: Box<FormulaExpr> },
    Select(BranchList),
    NullTest { column: String, negated: bool },
    /// Call dispatched through the column's string view
    StrCall { column: String, capability: String, args: Vec<Constant> },
}

impl FormulaExpr {
    pub fn boxed(self) -> Box<FormulaExpr> { Box::new(self) }

    /// Bottom-up rewrite: children first, then `f` on the rebuilt node.
    pub fn rewrite<F>(self, f: &mut F) -> FormulaResult<FormulaExpr>
    where
        F: FnMut(FormulaExpr) -> FormulaResult<FormulaExpr>,
    {
        let node = match self {
            FormulaExpr::Call { name, args } => FormulaExpr::Call { name, args: rewrite_all(args, f)? },
            FormulaExpr::Method { receiver, name, args } => {
                let receiver = (*receiver).rewrite(f)?.boxed();
                FormulaExpr::Method { receiver, name, args: rewrite_all(args, f)? }
            }
            FormulaExpr::Subscript { target, start, stop } => {
                let target = (*target).rewrite(f)?.boxed();
                let start = match start { Some(s) => Some((*s).rewrite(f)?.boxed()), None => None };
                let stop = match stop { Some(s) => Some((*s).rewrite(f)?.boxed()), None => None };
                FormulaExpr::Subscript { target, start, stop }
            }
            FormulaExpr::Unary { op, expr } => FormulaExpr::Unary { op, expr: (*expr).rewrite(f)?.boxed() },
            FormulaExpr::Binary { op, left, right } => {
                let left = (*left).rewrite(f)?.boxed();
                FormulaExpr::Binary { op, left, right: (*right).rewrite(f)?.boxed() }
            }
            FormulaExpr::In { needle, haystack, negated } => {
                let needle = (*needle).rewrite(f)?.boxed();
                FormulaExpr::In { needle, haystack: (*haystack).rewrite(f)?.boxed(), negated }
            }
            FormulaExpr::Tuple(items) => FormulaExpr::Tuple(rewrite_all(items, f)?),
            FormulaExpr::Conditional { value, condition, otherwise } => {
                let value = (*value).rewrite(f)?.boxed();
                let condition = (*condition).rewrite(f)?.boxed();
                FormulaExpr::Conditional { value, condition, otherwise: (*otherwise).rewrite(f)?.boxed() }
            }
            FormulaExpr::Select(list) => {
                let mut branches = Vec::with_capacity(list.branches.len());
                for b in list.branches {
                    let condition = b.condition.rewrite(f)?;
                    branches.push(Branch { condition, value: b.value.rewrite(f)? });
                }
                FormulaExpr::Select(BranchList { branches, default: (*list.default).rewrite(f)?.boxed() })
            }
            leaf => leaf,
        };
        f(node)
    }

    /// Pre-order visit of every node.
    pub fn walk<'a, F>(&'a self, visit: &mut F)
    where
        F: FnMut(&'a FormulaExpr),
    {
        visit(self);
        match self {
            FormulaExpr::Call { args, .. } | FormulaExpr::Tuple(args) => {
                for a in args { a.walk(visit); }
            }
            FormulaExpr::Method { receiver, args, .. } => {
                receiver.walk(visit);
                for a in args { a.walk(visit); }
            }
            FormulaExpr::Subscript { target, start, stop } => {
                target.walk(visit);
                if let Some(s) = start { s.walk(visit); }
                if let Some(s) = stop { s.walk(visit); }
            }
            FormulaExpr::Unary { expr, .. } => expr.walk(visit),
            FormulaExpr::Binary { left, right, .. } => { left.walk(visit); right.walk(visit); }
            FormulaExpr::In { needle, haystack, .. } => { needle.walk(visit); haystack.walk(visit); }
            FormulaExpr::Conditional { value, condition, otherwise } => {
                value.walk(visit);
                condition.walk(visit);
                otherwise.walk(visit);
            }
            FormulaExpr::Select(list) => {
                for b in &list.branches { b.condition.walk(visit); b.value.walk(visit); }
                list.default.walk(visit);
            }
            FormulaExpr::Lit(_) | FormulaExpr::Column(_) | FormulaExpr::Ident(_)
            | FormulaExpr::NullTest { .. } | FormulaExpr::StrCall { .. } => {}
        }
    }
}

fn rewrite_all<F>(items: Vec<FormulaExpr>, f: &mut F) -> FormulaResult<Vec<FormulaExpr>>
where
    F: FnMut(FormulaExpr) -> FormulaResult<FormulaExpr>,
{
    let mut out = Vec::with_capacity(items.len());
    for e in items { out.push(e.rewrite(f)?); }
    Ok(out)
}

// ----------- RENDERING -----------
// The rendered form is the "compiled expression" shown in diagnostics and by --explain.

fn write_quoted(f: &mut Formatter<'_>, s: &str, quote: char) -> fmt::Result {
    write!(f, "{}", quote)?;
    for ch in s.chars() {
        if ch == quote || ch == '\\' { write!(f, "\\")?; }
        write!(f, "{}", ch)?;
    }
    write!(f, "{}", quote)
}

fn write_list<T: Display>(f: &mut Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, it) in items.iter().enumerate() {
        if i > 0 { write!(f, ", ")?; }
        write!(f, "{}", it)?;
    }
    Ok(())
}

fn write_column(f: &mut Formatter<'_>, name: &str) -> fmt::Result {
    write!(f, "table[")?;
    write_quoted(f, name, '"')?;
    write!(f, "]")
}

impl Display for Constant {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(v) => write!(f, "{}", v),
            Constant::Float(v) => write!(f, "{:?}", v),
            Constant::Str(s) => write_quoted(f, s, '\''),
            Constant::Bool(true) => write!(f, "True"),
            Constant::Bool(false) => write!(f, "False"),
            Constant::Null => write!(f, "None"),
        }
    }
}

impl Display for FormulaExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FormulaExpr::Lit(c) => write!(f, "{}", c),
            FormulaExpr::Column(name) => write_column(f, name),
            FormulaExpr::Ident(name) => write!(f, "{}", name),
            FormulaExpr::Call { name, args } => {
                write!(f, "{}(", name)?;
                write_list(f, args)?;
                write!(f, ")")
            }
            FormulaExpr::Method { receiver, name, args } => {
                write!(f, "{}.{}(", receiver, name)?;
                write_list(f, args)?;
                write!(f, ")")
            }
            FormulaExpr::Subscript { target, start, stop } => {
                write!(f, "{}[", target)?;
                if let Some(s) = start { write!(f, "{}", s)?; }
                write!(f, ":")?;
                if let Some(s) = stop { write!(f, "{}", s)?; }
                write!(f, "]")
            }
            FormulaExpr::Unary { op: UnaryOp::Neg, expr } => write!(f, "-{}", expr),
            FormulaExpr::Unary { op: UnaryOp::Not, expr } => write!(f, "(not {})", expr),
            FormulaExpr::Binary { op, left, right } => write!(f, "({} {} {})", left, op.symbol(), right),
            FormulaExpr::In { needle, haystack, negated } => {
                write!(f, "({} {}in {})", needle, if *negated { "not " } else { "" }, haystack)
            }
            FormulaExpr::Tuple(items) => {
                write!(f, "(")?;
                write_list(f, items)?;
                write!(f, ")")
            }
            FormulaExpr::Conditional { value, condition, otherwise } => {
                write!(f, "({} WHEN {} OTHERWISE {})", value, condition, otherwise)
            }
            FormulaExpr::Select(list) => {
                write!(f, "select([")?;
                for (i, b) in list.branches.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", b.condition)?;
                }
                write!(f, "], [")?;
                for (i, b) in list.branches.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", b.value)?;
                }
                write!(f, "], default={})", list.default)
            }
            FormulaExpr::NullTest { column, negated } => {
                write!(f, "{}(", if *negated { "is_not_null" } else { "is_null" })?;
                write_column(f, column)?;
                write!(f, ")")
            }
            FormulaExpr::StrCall { column, capability, args } => {
                write_column(f, column)?;
                write!(f, ".as_str().{}(", capability)?;
                write_list(f, args)?;
                write!(f, ")")
            }
        }
    }
}
