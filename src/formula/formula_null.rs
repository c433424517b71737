//! `IsNull(col)` / `IsNotNull(col)` become `NullTest` nodes over the
//! three-way null predicate implemented by [`is_null_str`].

use crate::error::FormulaResult;
use crate::formula::formula_common::*;

/// Three-way null rule applied to a value's string view: native missing,
/// whitespace-only, or the literal `null` in any case.
pub fn is_null_str(v: Option<&str>) -> bool {
    match v {
        None => true,
        Some(s) => s.trim().is_empty() || s.to_lowercase() == "null",
    }
}

fn null_call(name: &str) -> Option<bool> {
    if name.eq_ignore_ascii_case("isnull") {
        Some(false)
    } else if name.eq_ignore_ascii_case("isnotnull") {
        Some(true)
    } else {
        None
    }
}

pub fn rewrite_null_predicates(expr: FormulaExpr) -> FormulaResult<FormulaExpr> {
    expr.rewrite(&mut |node| match node {
        FormulaExpr::Call { name, args } => match (null_call(&name), args.as_slice()) {
            (Some(negated), [FormulaExpr::Column(column)]) => {
                Ok(FormulaExpr::NullTest { column: column.clone(), negated })
            }
            // anything else is left for the evaluator to reject
            _ => Ok(FormulaExpr::Call { name, args }),
        },
        other => Ok(other),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_predicate_is_total() {
        let samples = [None, Some(""), Some("   "), Some("null"), Some("NULL"), Some(" Null"), Some("x"), Some("0"), Some("nullable")];
        for v in samples {
            let is_null = is_null_str(v);
            let is_not_null = !is_null_str(v);
            assert!(is_null ^ is_not_null, "{:?}", v);
        }
        assert!(is_null_str(Some("nUlL")));
        assert!(!is_null_str(Some("nullable")));
        assert!(!is_null_str(Some("0")));
    }

    #[test]
    fn rewrites_only_single_column_calls() {
        let e = FormulaExpr::Call { name: "isNotNull".into(), args: vec![FormulaExpr::Column("a".into())] };
        assert_eq!(rewrite_null_predicates(e).unwrap(), FormulaExpr::NullTest { column: "a".into(), negated: true });

        let compound = FormulaExpr::Call {
            name: "IsNull".into(),
            args: vec![FormulaExpr::Binary {
                op: BinOp::Add,
                left: FormulaExpr::Column("a".into()).boxed(),
                right: FormulaExpr::Lit(Constant::Int(1)).boxed(),
            }],
        };
        let out = rewrite_null_predicates(compound.clone()).unwrap();
        assert_eq!(out, compound);
    }
}
