use tracing::debug;

use crate::error::{FormulaError, FormulaResult};
use crate::formula::formula_capabilities::lookup;
use crate::formula::formula_common::*;

/// Rewrite `col.<capability>(literals…)` into string-view calls, and
/// `'x' in col` / `'x' not in col` into `contains`. Method names outside the
/// capability table are left alone for the evaluator.
pub fn bind_string_capabilities(expr: FormulaExpr) -> FormulaResult<FormulaExpr> {
    let rendered = expr.to_string();
    expr.rewrite(&mut |node| match node {
        FormulaExpr::Method { receiver, name, args } => {
            let column = match *receiver {
                FormulaExpr::Column(column) => column,
                other => return Ok(FormulaExpr::Method { receiver: other.boxed(), name, args }),
            };
            let Some(cap) = lookup(&name) else {
                return Ok(FormulaExpr::Method { receiver: FormulaExpr::Column(column).boxed(), name, args });
            };
            if !cap.accepts(args.len()) {
                return Err(FormulaError::type_mismatch(
                    format!("{}() takes {} argument(s), got {}", cap.name, cap.arity(), args.len()),
                    rendered.clone(),
                ));
            }
            let mut consts = Vec::with_capacity(args.len());
            for a in args {
                match a {
                    FormulaExpr::Lit(c) => consts.push(c),
                    other => {
                        return Err(FormulaError::type_mismatch(
                            format!("{}() arguments must be literals, got {}", cap.name, other),
                            rendered.clone(),
                        ))
                    }
                }
            }
            debug!(target: "formulate::formula", "bound string capability {} on column '{}'", cap.name, column);
            Ok(FormulaExpr::StrCall { column, capability: cap.name.to_string(), args: consts })
        }
        FormulaExpr::In { needle, haystack, negated } => match (*needle, *haystack) {
            (FormulaExpr::Lit(Constant::Str(s)), FormulaExpr::Column(column)) => {
                let call = FormulaExpr::StrCall { column, capability: "contains".to_string(), args: vec![Constant::Str(s)] };
                if negated {
                    Ok(FormulaExpr::Unary { op: UnaryOp::Not, expr: call.boxed() })
                } else {
                    Ok(call)
                }
            }
            (needle, haystack) => Ok(FormulaExpr::In { needle: needle.boxed(), haystack: haystack.boxed(), negated }),
        },
        other => Ok(other),
    })
}
