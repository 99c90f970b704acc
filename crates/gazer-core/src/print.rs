//! S-expression dumps of expression DAGs.

use gazer_support::sexpr::{atom, list, Value};

use crate::expr::{ExprKind, ExprRef, RoundingMode};
use crate::GazerContext;

fn rm_name(rm: RoundingMode) -> &'static str {
    match rm {
        RoundingMode::NearestTiesToEven => "rne",
        RoundingMode::NearestTiesToAway => "rna",
        RoundingMode::TowardPositive => "rtp",
        RoundingMode::TowardNegative => "rtn",
        RoundingMode::TowardZero => "rtz",
    }
}

impl GazerContext {
    /// Render an expression DAG as an S-expression tree. Shared nodes are
    /// expanded at every use site; the dump is for humans, not for interning.
    pub fn expr_to_sexpr(&self, expr: ExprRef) -> Value {
        let node = self.expr(expr);

        match &node.kind {
            ExprKind::VarRef(variable) => {
                list([atom("var"), atom(self.variable_name(*variable))])
            }
            ExprKind::Undef => list([
                atom("undef"),
                atom(self.display_type(node.ty).to_string()),
            ]),
            ExprKind::Literal(literal) => atom(literal.to_string()),
            _ => {
                let mut items = vec![atom(node.op().name())];
                match &node.kind {
                    ExprKind::Extract { offset, width } => {
                        items.push(atom(offset.to_string()));
                        items.push(atom(width.to_string()));
                    }
                    ExprKind::ZExt
                    | ExprKind::SExt
                    | ExprKind::FCast(_)
                    | ExprKind::SignedToFp(_)
                    | ExprKind::UnsignedToFp(_)
                    | ExprKind::FpToSigned(_)
                    | ExprKind::FpToUnsigned(_) => {
                        items.push(atom(self.display_type(node.ty).to_string()));
                    }
                    _ => {}
                }
                match &node.kind {
                    ExprKind::FAdd(rm)
                    | ExprKind::FSub(rm)
                    | ExprKind::FMul(rm)
                    | ExprKind::FDiv(rm)
                    | ExprKind::FCast(rm)
                    | ExprKind::SignedToFp(rm)
                    | ExprKind::UnsignedToFp(rm)
                    | ExprKind::FpToSigned(rm)
                    | ExprKind::FpToUnsigned(rm) => items.push(atom(rm_name(*rm))),
                    _ => {}
                }
                for &op in node.operands.iter() {
                    items.push(self.expr_to_sexpr(op));
                }
                list(items)
            }
        }
    }
}
