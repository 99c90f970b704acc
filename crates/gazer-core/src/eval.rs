//! Expression evaluation under a valuation.
//!
//! The evaluator reduces a sub-DAG to a [`Literal`], memoising by node
//! identity. It never interns anything, so it is read-only over the context
//! and may run concurrently with other read-only consumers.

use std::collections::HashMap;

use num_integer::Integer;
use num_traits::Zero;
use thiserror::Error;

use crate::expr::{ExprKind, ExprRef, Op};
use crate::literal::{BvValue, Literal};
use crate::valuation::Valuation;
use crate::GazerContext;

/// Evaluation error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("undefined value at a required-definite position")]
    Undef,

    #[error("division by zero")]
    DivByZero,

    #[error("operand did not reduce to a literal of the required kind")]
    NonLiteralOperand,

    #[error("evaluation is not supported for {0}")]
    Unsupported(Op),
}

pub type EvalResult<T> = Result<T, EvalError>;

/// Evaluate an expression to a literal under the given valuation.
///
/// Variables missing from the valuation are undefined; reaching one fails
/// with [`EvalError::Undef`]. Floating-point arithmetic and array operations
/// are not evaluated (they stay symbolic in this core) and report
/// [`EvalError::Unsupported`].
pub fn eval(ctx: &GazerContext, valuation: &Valuation, expr: ExprRef) -> EvalResult<Literal> {
    Evaluator {
        ctx,
        valuation,
        memo: HashMap::new(),
    }
    .eval(expr)
}

struct Evaluator<'a> {
    ctx: &'a GazerContext,
    valuation: &'a Valuation,
    memo: HashMap<ExprRef, Literal>,
}

impl Evaluator<'_> {
    fn eval(&mut self, expr: ExprRef) -> EvalResult<Literal> {
        if let Some(hit) = self.memo.get(&expr) {
            return Ok(hit.clone());
        }
        let result = self.compute(expr)?;
        self.memo.insert(expr, result.clone());
        Ok(result)
    }

    fn compute(&mut self, expr: ExprRef) -> EvalResult<Literal> {
        let node = self.ctx.expr(expr);
        let kind = node.kind.clone();
        let ops = node.operands.clone();
        let ty = node.ty;

        match kind {
            ExprKind::Literal(literal) => Ok(literal),
            ExprKind::VarRef(variable) => self
                .valuation
                .get(variable)
                .cloned()
                .ok_or(EvalError::Undef),
            ExprKind::Undef => Err(EvalError::Undef),

            ExprKind::ZExt => {
                let value = self.bv_operand(ops[0])?;
                Ok(Literal::Bv(value.zext(self.ctx.bv_width(ty))))
            }
            ExprKind::SExt => {
                let value = self.bv_operand(ops[0])?;
                Ok(Literal::Bv(value.sext(self.ctx.bv_width(ty))))
            }
            ExprKind::Extract { offset, width } => {
                let value = self.bv_operand(ops[0])?;
                Ok(Literal::Bv(value.extract(offset, width)))
            }

            ExprKind::Add
            | ExprKind::Sub
            | ExprKind::Mul
            | ExprKind::Div
            | ExprKind::Mod
            | ExprKind::Rem
            | ExprKind::BvSDiv
            | ExprKind::BvUDiv
            | ExprKind::BvSRem
            | ExprKind::BvURem
            | ExprKind::Shl
            | ExprKind::LShr
            | ExprKind::AShr
            | ExprKind::BvAnd
            | ExprKind::BvOr
            | ExprKind::BvXor => {
                let left = self.eval(ops[0])?;
                let right = self.eval(ops[1])?;
                binary_arith(kind.op(), left, right)
            }

            ExprKind::Not => {
                let value = self.bool_operand(ops[0])?;
                Ok(Literal::Bool(!value))
            }
            ExprKind::And => {
                // The conjunction of zero operands is true; the builder
                // never constructs that node, but the algebra is total.
                let mut result = true;
                for &op in &ops {
                    result &= self.bool_operand(op)?;
                }
                Ok(Literal::Bool(result))
            }
            ExprKind::Or => {
                let mut result = false;
                for &op in &ops {
                    result |= self.bool_operand(op)?;
                }
                Ok(Literal::Bool(result))
            }
            ExprKind::Xor => {
                let left = self.bool_operand(ops[0])?;
                let right = self.bool_operand(ops[1])?;
                Ok(Literal::Bool(left != right))
            }
            ExprKind::Imply => {
                let left = self.bool_operand(ops[0])?;
                let right = self.bool_operand(ops[1])?;
                Ok(Literal::Bool(!left || right))
            }

            ExprKind::Eq | ExprKind::NotEq => {
                let left = self.eval(ops[0])?;
                let right = self.eval(ops[1])?;
                if matches!(left, Literal::Float(_)) {
                    // Floats compare through the FEq family only.
                    return Err(EvalError::Unsupported(kind.op()));
                }
                let equal = left == right;
                Ok(Literal::Bool(if kind.op() == Op::Eq {
                    equal
                } else {
                    !equal
                }))
            }

            ExprKind::Lt | ExprKind::LtEq | ExprKind::Gt | ExprKind::GtEq => {
                let left = self.int_operand(ops[0])?;
                let right = self.int_operand(ops[1])?;
                Ok(Literal::Bool(match kind.op() {
                    Op::Lt => left < right,
                    Op::LtEq => left <= right,
                    Op::Gt => left > right,
                    Op::GtEq => left >= right,
                    _ => unreachable!(),
                }))
            }

            ExprKind::BvSLt
            | ExprKind::BvSLtEq
            | ExprKind::BvSGt
            | ExprKind::BvSGtEq
            | ExprKind::BvULt
            | ExprKind::BvULtEq
            | ExprKind::BvUGt
            | ExprKind::BvUGtEq => {
                let left = self.bv_operand(ops[0])?;
                let right = self.bv_operand(ops[1])?;
                Ok(Literal::Bool(match kind.op() {
                    Op::BvSLt => left.slt(&right),
                    Op::BvSLtEq => left.sle(&right),
                    Op::BvSGt => right.slt(&left),
                    Op::BvSGtEq => right.sle(&left),
                    Op::BvULt => left.ult(&right),
                    Op::BvULtEq => left.ule(&right),
                    Op::BvUGt => right.ult(&left),
                    Op::BvUGtEq => right.ule(&left),
                    _ => unreachable!(),
                }))
            }

            ExprKind::Select => {
                let cond = self.bool_operand(ops[0])?;
                // Only the chosen branch is reduced.
                self.eval(if cond { ops[1] } else { ops[2] })
            }

            // Floating-point and array operations stay symbolic in this
            // core; the builder is the only component that touches them.
            ExprKind::FEq
            | ExprKind::FGt
            | ExprKind::FGtEq
            | ExprKind::FLt
            | ExprKind::FLtEq
            | ExprKind::FAdd(_)
            | ExprKind::FSub(_)
            | ExprKind::FMul(_)
            | ExprKind::FDiv(_)
            | ExprKind::FIsNan
            | ExprKind::FIsInf
            | ExprKind::FCast(_)
            | ExprKind::SignedToFp(_)
            | ExprKind::UnsignedToFp(_)
            | ExprKind::FpToSigned(_)
            | ExprKind::FpToUnsigned(_)
            | ExprKind::ArrayRead
            | ExprKind::ArrayWrite => Err(EvalError::Unsupported(kind.op())),
        }
    }

    fn bool_operand(&mut self, expr: ExprRef) -> EvalResult<bool> {
        self.eval(expr)?
            .as_bool()
            .ok_or(EvalError::NonLiteralOperand)
    }

    fn bv_operand(&mut self, expr: ExprRef) -> EvalResult<BvValue> {
        match self.eval(expr)? {
            Literal::Bv(value) => Ok(value),
            _ => Err(EvalError::NonLiteralOperand),
        }
    }

    fn int_operand(&mut self, expr: ExprRef) -> EvalResult<num_bigint::BigInt> {
        match self.eval(expr)? {
            Literal::Int(value) => Ok(value),
            _ => Err(EvalError::NonLiteralOperand),
        }
    }
}

fn binary_arith(op: Op, left: Literal, right: Literal) -> EvalResult<Literal> {
    match (left, right) {
        (Literal::Bv(a), Literal::Bv(b)) => {
            let divides = matches!(op, Op::BvSDiv | Op::BvUDiv | Op::BvSRem | Op::BvURem);
            if divides && b.is_zero() {
                return Err(EvalError::DivByZero);
            }
            Ok(Literal::Bv(match op {
                Op::Add => a.add(&b),
                Op::Sub => a.sub(&b),
                Op::Mul => a.mul(&b),
                Op::BvSDiv => a.sdiv(&b),
                Op::BvUDiv => a.udiv(&b),
                Op::BvSRem => a.srem(&b),
                Op::BvURem => a.urem(&b),
                Op::Shl => a.shl(&b),
                Op::LShr => a.lshr(&b),
                Op::AShr => a.ashr(&b),
                Op::BvAnd => a.and(&b),
                Op::BvOr => a.or(&b),
                Op::BvXor => a.xor(&b),
                _ => return Err(EvalError::Unsupported(op)),
            }))
        }
        (Literal::Int(a), Literal::Int(b)) => {
            let divides = matches!(op, Op::Div | Op::Mod | Op::Rem);
            if divides && b.is_zero() {
                return Err(EvalError::DivByZero);
            }
            Ok(Literal::Int(match op {
                Op::Add => a + b,
                Op::Sub => a - b,
                Op::Mul => a * b,
                Op::Div => a / b,
                // Mathematical modulus: sign follows the divisor.
                Op::Mod => a.mod_floor(&b),
                // Truncated remainder: sign follows the dividend.
                Op::Rem => a % b,
                _ => return Err(EvalError::Unsupported(op)),
            }))
        }
        _ => Err(EvalError::NonLiteralOperand),
    }
}
