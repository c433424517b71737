use crate::error::{FormulaError, FormulaResult};
use crate::formula::formula_common::*;

fn bound(b: Option<Box<FormulaExpr>>, rendered: &str) -> FormulaResult<Constant> {
    match b.map(|b| *b) {
        None => Ok(Constant::Null),
        Some(FormulaExpr::Lit(Constant::Int(v))) => Ok(Constant::Int(v)),
        Some(other) => Err(FormulaError::evaluation(format!("slice bounds must be integer literals, got {}", other), rendered)),
    }
}

/// `col[start:stop]` becomes `col.as_str().slice(start, stop)`; an omitted
/// bound is passed as None and extends to that end.
pub fn rewrite_slices(expr: FormulaExpr) -> FormulaResult<FormulaExpr> {
    let rendered = expr.to_string();
    expr.rewrite(&mut |node| match node {
        FormulaExpr::Subscript { target, start, stop } => {
            let column = match *target {
                FormulaExpr::Column(column) => column,
                other => {
                    return Err(FormulaError::evaluation(format!("only column references can be sliced, got {}", other), rendered.clone()))
                }
            };
            let args = vec![bound(start, &rendered)?, bound(stop, &rendered)?];
            Ok(FormulaExpr::StrCall { column, capability: "slice".to_string(), args })
        }
        other => Ok(other),
    })
}
