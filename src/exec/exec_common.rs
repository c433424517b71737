// Lowering of a compiled formula tree into a polars lazy expression.
// Every node returns its expression together with its value kind; kind rules
// are checked on the way so type errors surface before anything executes.


use polars::prelude::*;

use crate::error::{FormulaError, FormulaResult};
use crate::exec::exec_series::{capability_expr, map_float, map_int, null_predicate_expr, round_half_even, NullRule};
use crate::exec::exec_typecheck::{arithmetic_kind, comparable, is_boolish, unify, TableSchema};
use crate::formula::formula_capabilities::{lookup, CapabilityError};
use crate::formula::formula_common::*;

pub struct BuildCtx<'a> {
    pub schema: &'a TableSchema,
    /// Rendered compiled expression attached to every error
    pub rendered: &'a str,
}

impl BuildCtx<'_> {
    fn type_err(&self, msg: impl Into<String>) -> FormulaError { FormulaError::type_mismatch(msg, self.rendered) }
    fn eval_err(&self, msg: impl Into<String>) -> FormulaError { FormulaError::evaluation(msg, self.rendered) }
}

pub fn const_expr(c: &Constant) -> (Expr, ValueKind) {
    match c {
        Constant::Int(v) => (lit(*v), ValueKind::Int),
        Constant::Float(v) => (lit(*v), ValueKind::Float),
        Constant::Str(s) => (lit(s.clone()), ValueKind::Str),
        Constant::Bool(b) => (lit(*b), ValueKind::Bool),
        Constant::Null => (lit(polars::prelude::Null {}), ValueKind::Null),
    }
}

pub fn build_formula_expr(e: &FormulaExpr, ctx: &BuildCtx) -> FormulaResult<(Expr, ValueKind)> {
    match e {
        FormulaExpr::Lit(c) => Ok(const_expr(c)),
        FormulaExpr::Column(name) => match ctx.schema.kind_of(name) {
            Some(kind) => Ok((col(name.as_str()), kind)),
            None => Err(FormulaError::unresolved(name.clone(), ctx.rendered)),
        },
        FormulaExpr::Ident(name) => Err(FormulaError::unresolved(name.clone(), ctx.rendered)),
        FormulaExpr::Unary { op: UnaryOp::Neg, expr } => {
            let (inner, kind) = build_formula_expr(expr, ctx)?;
            match kind {
                ValueKind::Int => Ok((lit(0i64) - inner, kind)),
                ValueKind::Float => Ok((lit(0f64) - inner, kind)),
                ValueKind::Null => Ok((inner, kind)),
                other => Err(ctx.type_err(format!("cannot negate a {} value", other))),
            }
        }
        FormulaExpr::Unary { op: UnaryOp::Not, expr } => {
            let (inner, kind) = build_formula_expr(expr, ctx)?;
            if !is_boolish(kind) {
                return Err(ctx.type_err(format!("'not' needs a boolean operand, got {}", kind)));
            }
            Ok((inner.not(), ValueKind::Bool))
        }
        FormulaExpr::Binary { op, left, right } => build_binary(*op, left, right, ctx),
        FormulaExpr::In { needle, haystack, negated } => {
            let items: Vec<&FormulaExpr> = match haystack.as_ref() {
                FormulaExpr::Tuple(items) => items.iter().collect(),
                FormulaExpr::Column(_) => {
                    return Err(ctx.eval_err("membership in a column needs a string literal on the left"));
                }
                single => return build_substring_test(needle, single, *negated, ctx),
            };
            let (n, nk) = build_formula_expr(needle, ctx)?;
            let mut acc = lit(false);
            for it in items {
                let (ie, ik) = build_formula_expr(it, ctx)?;
                if !comparable(nk, ik) {
                    return Err(ctx.type_err(format!("cannot test a {} value for membership among {} values", nk, ik)));
                }
                acc = acc.or(n.clone().eq(ie));
            }
            Ok((if *negated { acc.not() } else { acc }, ValueKind::Bool))
        }
        FormulaExpr::Tuple(_) => Err(ctx.eval_err("a tuple is only valid on the right of 'in'")),
        FormulaExpr::Conditional { .. } => Err(ctx.eval_err("conditional chain was not flattened")),
        FormulaExpr::Subscript { .. } => Err(ctx.eval_err("only column references can be sliced")),
        FormulaExpr::Select(list) => build_select(list, ctx),
        FormulaExpr::NullTest { column, negated } => {
            if ctx.schema.kind_of(column).is_none() {
                return Err(FormulaError::unresolved(column.clone(), ctx.rendered));
            }
            Ok((null_predicate_expr(col(column.as_str()), NullRule::ThreeWay, *negated), ValueKind::Bool))
        }
        FormulaExpr::StrCall { column, capability, args } => {
            let Some(kind) = ctx.schema.kind_of(column) else {
                return Err(FormulaError::unresolved(column.clone(), ctx.rendered));
            };
            apply_capability(col(column.as_str()), kind, &format!("column '{}'", column), capability, args, ctx)
        }
        FormulaExpr::Call { name, args } => build_call(name, args, ctx),
        FormulaExpr::Method { receiver, name, args } => build_method(receiver, name, args, ctx),
    }
}

/// `'x' in <string expression>`: substring containment through the `contains`
/// capability, the same as the bound column form.
fn build_substring_test(needle: &FormulaExpr, haystack: &FormulaExpr, negated: bool, ctx: &BuildCtx) -> FormulaResult<(Expr, ValueKind)> {
    let FormulaExpr::Lit(Constant::Str(pattern)) = needle else {
        return Err(ctx.eval_err("membership in a string needs a string literal on the left"));
    };
    let (h, hk) = build_formula_expr(haystack, ctx)?;
    if hk != ValueKind::Str {
        return Err(ctx.type_err(format!("'in' needs a tuple or a string on the right, got {}", hk)));
    }
    let (e, kind) = apply_capability(h, hk, "the right side of 'in'", "contains", &[Constant::Str(pattern.clone())], ctx)?;
    Ok((if negated { e.not() } else { e }, kind))
}

fn build_binary(op: BinOp, left: &FormulaExpr, right: &FormulaExpr, ctx: &BuildCtx) -> FormulaResult<(Expr, ValueKind)> {
    let (l, lk) = build_formula_expr(left, ctx)?;
    let (r, rk) = build_formula_expr(right, ctx)?;
    if op.is_comparison() {
        if !comparable(lk, rk) {
            return Err(ctx.type_err(format!("cannot compare {} with {} using '{}'", lk, rk, op.symbol())));
        }
        let e = match op {
            BinOp::Eq => l.eq(r),
            BinOp::Ne => l.neq(r),
            BinOp::Lt => l.lt(r),
            BinOp::Le => l.lt_eq(r),
            BinOp::Gt => l.gt(r),
            _ => l.gt_eq(r),
        };
        return Ok((e, ValueKind::Bool));
    }
    if matches!(op, BinOp::And | BinOp::Or) {
        if !is_boolish(lk) || !is_boolish(rk) {
            return Err(ctx.type_err(format!("'{}' needs boolean operands, got {} and {}", op.symbol(), lk, rk)));
        }
        let e = if op == BinOp::And { l.and(r) } else { l.or(r) };
        return Ok((e, ValueKind::Bool));
    }
    let kind = arithmetic_kind(op, lk, rk).map_err(|m| ctx.type_err(m))?;
    let e = match op {
        BinOp::Add => l + r,
        BinOp::Sub => l - r,
        BinOp::Mul => l * r,
        // true division
        BinOp::Div => l.cast(DataType::Float64) / r.cast(DataType::Float64),
        _ => l % r,
    };
    Ok((e, kind))
}

/// Fold the branch list into nested `when/then/otherwise`, last branch innermost,
/// so the earliest true condition wins.
fn build_select(list: &BranchList, ctx: &BuildCtx) -> FormulaResult<(Expr, ValueKind)> {
    let (mut acc, mut kind) = build_formula_expr(&list.default, ctx)?;
    let mut built: Vec<(Expr, Expr)> = Vec::with_capacity(list.branches.len());
    for (i, b) in list.branches.iter().enumerate() {
        let (c, ck) = build_formula_expr(&b.condition, ctx)?;
        if !is_boolish(ck) {
            return Err(ctx.type_err(format!("condition {} of the selection is {}, expected boolean", i + 1, ck)));
        }
        let (v, vk) = build_formula_expr(&b.value, ctx)?;
        kind = unify(kind, vk).ok_or_else(|| ctx.type_err(format!("selection values mix {} and {}", kind, vk)))?;
        built.push((c, v));
    }
    for (c, v) in built.into_iter().rev() {
        acc = when(c).then(v).otherwise(acc);
    }
    Ok((acc, kind))
}

fn apply_capability(e: Expr, kind: ValueKind, what: &str, name: &str, args: &[Constant], ctx: &BuildCtx) -> FormulaResult<(Expr, ValueKind)> {
    let Some(cap) = lookup(name) else {
        return Err(ctx.eval_err(format!("unknown capability '{}'", name)));
    };
    if !matches!(kind, ValueKind::Str | ValueKind::Null) {
        return Err(ctx.type_err(format!("{}() needs a string value, {} is {}", cap.name, what, kind)));
    }
    if !cap.accepts(args.len()) {
        return Err(ctx.type_err(format!("{}() takes {} argument(s), got {}", cap.name, cap.arity(), args.len())));
    }
    let row = (cap.prepare)(args).map_err(|err| match err {
        CapabilityError::Arg(m) => ctx.type_err(format!("{}(): {}", cap.name, m)),
        CapabilityError::Pattern(m) => ctx.eval_err(format!("{}(): {}", cap.name, m)),
    })?;
    Ok((capability_expr(e, row, cap.returns), cap.returns))
}

fn literal_args(name: &str, args: &[FormulaExpr], ctx: &BuildCtx) -> FormulaResult<Vec<Constant>> {
    args.iter()
        .map(|a| match a {
            FormulaExpr::Lit(c) => Ok(c.clone()),
            other => Err(ctx.type_err(format!("{}() arguments must be literals, got {}", name, other))),
        })
        .collect()
}

fn int_arg(name: &str, args: &[FormulaExpr], i: usize, ctx: &BuildCtx) -> FormulaResult<Option<i64>> {
    match args.get(i) {
        None => Ok(None),
        Some(FormulaExpr::Lit(Constant::Int(v))) => Ok(Some(*v)),
        Some(other) => Err(ctx.type_err(format!("{}() expects an integer literal, got {}", name, other))),
    }
}

fn expect_arity(name: &str, args: &[FormulaExpr], min: usize, max: usize, ctx: &BuildCtx) -> FormulaResult<()> {
    if args.len() < min || args.len() > max {
        let arity = if min == max { min.to_string() } else { format!("{}..={}", min, max) };
        return Err(ctx.type_err(format!("{}() takes {} argument(s), got {}", name, arity, args.len())));
    }
    Ok(())
}

/// Numeric helper shared by the `abs(x)` function and the `x.abs()` method spellings.
fn numeric_helper(name: &str, e: Expr, kind: ValueKind, decimals: Option<i64>, ctx: &BuildCtx) -> FormulaResult<(Expr, ValueKind)> {
    if kind == ValueKind::Null {
        return Ok((e, kind));
    }
    if !kind.is_numeric() {
        return Err(ctx.type_err(format!("{}() needs a numeric value, got {}", name, kind)));
    }
    let is_int = kind == ValueKind::Int;
    let out = match name {
        "abs" if is_int => (map_int(e, i64::wrapping_abs), kind),
        "abs" => (map_float(e, f64::abs), kind),
        "floor" | "ceil" if is_int => (e, kind),
        "floor" => (map_float(e, f64::floor), kind),
        "ceil" => (map_float(e, f64::ceil), kind),
        "sqrt" => (map_float(e, f64::sqrt), ValueKind::Float),
        "round" => {
            let d = decimals.unwrap_or(0);
            if is_int && d >= 0 {
                (e, kind)
            } else {
                let d = d.clamp(-308, 308) as i32;
                let f = map_float(e, move |x| round_half_even(x, d));
                if is_int { (f.cast(DataType::Int64), kind) } else { (f, kind) }
            }
        }
        _ => return Err(ctx.eval_err(format!("unknown capability '{}'", name))),
    };
    Ok(out)
}

fn build_call(name: &str, args: &[FormulaExpr], ctx: &BuildCtx) -> FormulaResult<(Expr, ValueKind)> {
    let lname = name.to_ascii_lowercase();
    match lname.as_str() {
        "isnull" | "isnotnull" => Err(ctx.eval_err(format!("{}() expects a single column reference", name))),
        "abs" => {
            expect_arity(&lname, args, 1, 1, ctx)?;
            let (e, k) = build_formula_expr(&args[0], ctx)?;
            numeric_helper("abs", e, k, None, ctx)
        }
        "round" => {
            expect_arity(&lname, args, 1, 2, ctx)?;
            let (e, k) = build_formula_expr(&args[0], ctx)?;
            let decimals = int_arg(&lname, args, 1, ctx)?;
            numeric_helper("round", e, k, decimals, ctx)
        }
        "coalesce" => {
            if args.is_empty() {
                return Err(ctx.type_err("coalesce() needs at least one argument"));
            }
            let (mut acc, mut kind) = build_formula_expr(&args[0], ctx)?;
            for a in &args[1..] {
                let (e, k) = build_formula_expr(a, ctx)?;
                kind = unify(kind, k).ok_or_else(|| ctx.type_err(format!("coalesce() mixes {} and {}", kind, k)))?;
                acc = acc.fill_null(e);
            }
            Ok((acc, kind))
        }
        _ => Err(ctx.eval_err(format!("unknown capability '{}'", name))),
    }
}

fn build_method(receiver: &FormulaExpr, name: &str, args: &[FormulaExpr], ctx: &BuildCtx) -> FormulaResult<(Expr, ValueKind)> {
    let (e, kind) = build_formula_expr(receiver, ctx)?;
    let lname = name.to_ascii_lowercase();
    match lname.as_str() {
        "isna" | "isnull" | "notna" | "notnull" => {
            expect_arity(&lname, args, 0, 0, ctx)?;
            let negated = lname.starts_with("not");
            Ok((null_predicate_expr(e, NullRule::Native, negated), ValueKind::Bool))
        }
        "fillna" | "fill_null" => {
            expect_arity(&lname, args, 1, 1, ctx)?;
            let (v, vk) = build_formula_expr(&args[0], ctx)?;
            let kind = unify(kind, vk).ok_or_else(|| ctx.type_err(format!("{}() cannot fill {} values with {}", lname, kind, vk)))?;
            Ok((e.fill_null(v), kind))
        }
        "abs" | "floor" | "ceil" | "sqrt" => {
            expect_arity(&lname, args, 0, 0, ctx)?;
            numeric_helper(&lname, e, kind, None, ctx)
        }
        "round" => {
            expect_arity(&lname, args, 0, 1, ctx)?;
            let decimals = int_arg(&lname, args, 0, ctx)?;
            numeric_helper("round", e, kind, decimals, ctx)
        }
        _ if lookup(&lname).is_some() => {
            // string capability on a computed receiver
            let consts = literal_args(&lname, args, ctx)?;
            apply_capability(e, kind, &receiver.to_string(), &lname, &consts, ctx)
        }
        _ => Err(ctx.eval_err(format!("unknown capability '{}'", name))),
    }
}
