//! Expression builders.
//!
//! A builder exposes one constructor per expression kind and returns
//! canonical interned nodes. [`TrivialExprBuilder`] delegates directly to
//! interning; [`FoldingExprBuilder`] additionally applies algebraic rewrites
//! and constant folding on construction. Both satisfy the same contract, so
//! clients depend only on the [`ExprBuilder`] trait.
//!
//! Every rewrite preserves semantic equivalence: for any valuation defining
//! the free variables, the pre- and post-rewrite expressions evaluate to the
//! same literal.

use num_bigint::BigInt;
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::Zero;

use crate::expr::{ExprKind, ExprRef, Op, RoundingMode};
use crate::literal::{BvValue, FloatValue, Literal};
use crate::matcher::{
    m_and, m_any, m_bool_lit, m_bv_lit, m_bv_slt, m_bv_srem, m_bv_ult, m_eq, m_expr, m_lt, m_not,
    m_not_eq, m_or, m_same, m_select, m_sext, m_zext, match3, match_expr, unord_match, BoolSlot,
    BvSlot, ExprSlot,
};
use crate::types::Type;
use crate::variable::Variable;
use crate::GazerContext;

/// The builder interface: one constructor per expression kind plus literal
/// helpers. Default method bodies intern without simplification.
pub trait ExprBuilder {
    // ------------------------------------------------------------------
    // Literals and leaves

    fn bool_lit(&self, ctx: &mut GazerContext, value: bool) -> ExprRef {
        ctx.literal_expr(Literal::Bool(value))
    }

    fn true_expr(&self, ctx: &mut GazerContext) -> ExprRef {
        self.bool_lit(ctx, true)
    }

    fn false_expr(&self, ctx: &mut GazerContext) -> ExprRef {
        self.bool_lit(ctx, false)
    }

    fn int_lit(&self, ctx: &mut GazerContext, value: BigInt) -> ExprRef {
        ctx.literal_expr(Literal::Int(value))
    }

    fn bv_lit(&self, ctx: &mut GazerContext, value: BvValue) -> ExprRef {
        ctx.literal_expr(Literal::Bv(value))
    }

    fn bv_lit_u64(&self, ctx: &mut GazerContext, width: u32, value: u64) -> ExprRef {
        self.bv_lit(ctx, BvValue::from_u64(width, value))
    }

    fn float_lit(&self, ctx: &mut GazerContext, value: FloatValue) -> ExprRef {
        ctx.literal_expr(Literal::Float(value))
    }

    fn real_lit(&self, ctx: &mut GazerContext, value: BigRational) -> ExprRef {
        ctx.literal_expr(Literal::Real(value))
    }

    fn undef(&self, ctx: &mut GazerContext, ty: Type) -> ExprRef {
        ctx.undef_expr(ty)
    }

    fn var_ref(&self, ctx: &GazerContext, variable: Variable) -> ExprRef {
        ctx.ref_expr(variable)
    }

    // ------------------------------------------------------------------
    // Boolean connectives

    fn not(&self, ctx: &mut GazerContext, op: ExprRef) -> ExprRef {
        let bool_ty = ctx.bool_type();
        ctx.intern_expr(ExprKind::Not, bool_ty, &[op])
    }

    /// Variadic conjunction. Zero operands collapse to `true`, a single
    /// operand to itself, so constructed `And` nodes always have at least
    /// two operands.
    fn and(&self, ctx: &mut GazerContext, ops: Vec<ExprRef>) -> ExprRef {
        match ops.len() {
            0 => self.true_expr(ctx),
            1 => ops[0],
            _ => {
                let bool_ty = ctx.bool_type();
                ctx.intern_expr(ExprKind::And, bool_ty, &ops)
            }
        }
    }

    /// Variadic disjunction, dual of [`ExprBuilder::and`].
    fn or(&self, ctx: &mut GazerContext, ops: Vec<ExprRef>) -> ExprRef {
        match ops.len() {
            0 => self.false_expr(ctx),
            1 => ops[0],
            _ => {
                let bool_ty = ctx.bool_type();
                ctx.intern_expr(ExprKind::Or, bool_ty, &ops)
            }
        }
    }

    fn xor(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let bool_ty = ctx.bool_type();
        ctx.intern_expr(ExprKind::Xor, bool_ty, &[left, right])
    }

    fn imply(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let bool_ty = ctx.bool_type();
        ctx.intern_expr(ExprKind::Imply, bool_ty, &[left, right])
    }

    // ------------------------------------------------------------------
    // Comparisons

    fn eq(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let bool_ty = ctx.bool_type();
        ctx.intern_expr(ExprKind::Eq, bool_ty, &[left, right])
    }

    fn not_eq(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let bool_ty = ctx.bool_type();
        ctx.intern_expr(ExprKind::NotEq, bool_ty, &[left, right])
    }

    fn lt(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let bool_ty = ctx.bool_type();
        ctx.intern_expr(ExprKind::Lt, bool_ty, &[left, right])
    }

    fn lt_eq(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let bool_ty = ctx.bool_type();
        ctx.intern_expr(ExprKind::LtEq, bool_ty, &[left, right])
    }

    fn gt(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let bool_ty = ctx.bool_type();
        ctx.intern_expr(ExprKind::Gt, bool_ty, &[left, right])
    }

    fn gt_eq(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let bool_ty = ctx.bool_type();
        ctx.intern_expr(ExprKind::GtEq, bool_ty, &[left, right])
    }

    fn bv_slt(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let bool_ty = ctx.bool_type();
        ctx.intern_expr(ExprKind::BvSLt, bool_ty, &[left, right])
    }

    fn bv_slt_eq(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let bool_ty = ctx.bool_type();
        ctx.intern_expr(ExprKind::BvSLtEq, bool_ty, &[left, right])
    }

    fn bv_sgt(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let bool_ty = ctx.bool_type();
        ctx.intern_expr(ExprKind::BvSGt, bool_ty, &[left, right])
    }

    fn bv_sgt_eq(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let bool_ty = ctx.bool_type();
        ctx.intern_expr(ExprKind::BvSGtEq, bool_ty, &[left, right])
    }

    fn bv_ult(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let bool_ty = ctx.bool_type();
        ctx.intern_expr(ExprKind::BvULt, bool_ty, &[left, right])
    }

    fn bv_ult_eq(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let bool_ty = ctx.bool_type();
        ctx.intern_expr(ExprKind::BvULtEq, bool_ty, &[left, right])
    }

    fn bv_ugt(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let bool_ty = ctx.bool_type();
        ctx.intern_expr(ExprKind::BvUGt, bool_ty, &[left, right])
    }

    fn bv_ugt_eq(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let bool_ty = ctx.bool_type();
        ctx.intern_expr(ExprKind::BvUGtEq, bool_ty, &[left, right])
    }

    // ------------------------------------------------------------------
    // Arithmetic

    fn add(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let ty = ctx.expr_type(left);
        ctx.intern_expr(ExprKind::Add, ty, &[left, right])
    }

    fn sub(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let ty = ctx.expr_type(left);
        ctx.intern_expr(ExprKind::Sub, ty, &[left, right])
    }

    fn mul(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let ty = ctx.expr_type(left);
        ctx.intern_expr(ExprKind::Mul, ty, &[left, right])
    }

    fn div(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let ty = ctx.expr_type(left);
        ctx.intern_expr(ExprKind::Div, ty, &[left, right])
    }

    fn modulo(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let ty = ctx.expr_type(left);
        ctx.intern_expr(ExprKind::Mod, ty, &[left, right])
    }

    fn rem(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let ty = ctx.expr_type(left);
        ctx.intern_expr(ExprKind::Rem, ty, &[left, right])
    }

    fn bv_sdiv(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let ty = ctx.expr_type(left);
        ctx.intern_expr(ExprKind::BvSDiv, ty, &[left, right])
    }

    fn bv_udiv(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let ty = ctx.expr_type(left);
        ctx.intern_expr(ExprKind::BvUDiv, ty, &[left, right])
    }

    fn bv_srem(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let ty = ctx.expr_type(left);
        ctx.intern_expr(ExprKind::BvSRem, ty, &[left, right])
    }

    fn bv_urem(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let ty = ctx.expr_type(left);
        ctx.intern_expr(ExprKind::BvURem, ty, &[left, right])
    }

    fn shl(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let ty = ctx.expr_type(left);
        ctx.intern_expr(ExprKind::Shl, ty, &[left, right])
    }

    fn lshr(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let ty = ctx.expr_type(left);
        ctx.intern_expr(ExprKind::LShr, ty, &[left, right])
    }

    fn ashr(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let ty = ctx.expr_type(left);
        ctx.intern_expr(ExprKind::AShr, ty, &[left, right])
    }

    fn bv_and(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let ty = ctx.expr_type(left);
        ctx.intern_expr(ExprKind::BvAnd, ty, &[left, right])
    }

    fn bv_or(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let ty = ctx.expr_type(left);
        ctx.intern_expr(ExprKind::BvOr, ty, &[left, right])
    }

    fn bv_xor(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let ty = ctx.expr_type(left);
        ctx.intern_expr(ExprKind::BvXor, ty, &[left, right])
    }

    // ------------------------------------------------------------------
    // Bitvector casts

    fn zext(&self, ctx: &mut GazerContext, op: ExprRef, ty: Type) -> ExprRef {
        ctx.intern_expr(ExprKind::ZExt, ty, &[op])
    }

    fn sext(&self, ctx: &mut GazerContext, op: ExprRef, ty: Type) -> ExprRef {
        ctx.intern_expr(ExprKind::SExt, ty, &[op])
    }

    fn extract(&self, ctx: &mut GazerContext, op: ExprRef, offset: u32, width: u32) -> ExprRef {
        let ty = ctx.bv_type(width);
        ctx.intern_expr(ExprKind::Extract { offset, width }, ty, &[op])
    }

    /// Truncation to the low `width` bits, expressed as an extract.
    fn trunc(&self, ctx: &mut GazerContext, op: ExprRef, width: u32) -> ExprRef {
        self.extract(ctx, op, 0, width)
    }

    // ------------------------------------------------------------------
    // Floating point (always symbolic)

    fn feq(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let bool_ty = ctx.bool_type();
        ctx.intern_expr(ExprKind::FEq, bool_ty, &[left, right])
    }

    fn fgt(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let bool_ty = ctx.bool_type();
        ctx.intern_expr(ExprKind::FGt, bool_ty, &[left, right])
    }

    fn fgt_eq(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let bool_ty = ctx.bool_type();
        ctx.intern_expr(ExprKind::FGtEq, bool_ty, &[left, right])
    }

    fn flt(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let bool_ty = ctx.bool_type();
        ctx.intern_expr(ExprKind::FLt, bool_ty, &[left, right])
    }

    fn flt_eq(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        let bool_ty = ctx.bool_type();
        ctx.intern_expr(ExprKind::FLtEq, bool_ty, &[left, right])
    }

    fn fadd(
        &self,
        ctx: &mut GazerContext,
        left: ExprRef,
        right: ExprRef,
        rm: RoundingMode,
    ) -> ExprRef {
        let ty = ctx.expr_type(left);
        ctx.intern_expr(ExprKind::FAdd(rm), ty, &[left, right])
    }

    fn fsub(
        &self,
        ctx: &mut GazerContext,
        left: ExprRef,
        right: ExprRef,
        rm: RoundingMode,
    ) -> ExprRef {
        let ty = ctx.expr_type(left);
        ctx.intern_expr(ExprKind::FSub(rm), ty, &[left, right])
    }

    fn fmul(
        &self,
        ctx: &mut GazerContext,
        left: ExprRef,
        right: ExprRef,
        rm: RoundingMode,
    ) -> ExprRef {
        let ty = ctx.expr_type(left);
        ctx.intern_expr(ExprKind::FMul(rm), ty, &[left, right])
    }

    fn fdiv(
        &self,
        ctx: &mut GazerContext,
        left: ExprRef,
        right: ExprRef,
        rm: RoundingMode,
    ) -> ExprRef {
        let ty = ctx.expr_type(left);
        ctx.intern_expr(ExprKind::FDiv(rm), ty, &[left, right])
    }

    fn fis_nan(&self, ctx: &mut GazerContext, op: ExprRef) -> ExprRef {
        let bool_ty = ctx.bool_type();
        ctx.intern_expr(ExprKind::FIsNan, bool_ty, &[op])
    }

    fn fis_inf(&self, ctx: &mut GazerContext, op: ExprRef) -> ExprRef {
        let bool_ty = ctx.bool_type();
        ctx.intern_expr(ExprKind::FIsInf, bool_ty, &[op])
    }

    fn fcast(&self, ctx: &mut GazerContext, op: ExprRef, ty: Type, rm: RoundingMode) -> ExprRef {
        ctx.intern_expr(ExprKind::FCast(rm), ty, &[op])
    }

    fn signed_to_fp(
        &self,
        ctx: &mut GazerContext,
        op: ExprRef,
        ty: Type,
        rm: RoundingMode,
    ) -> ExprRef {
        ctx.intern_expr(ExprKind::SignedToFp(rm), ty, &[op])
    }

    fn unsigned_to_fp(
        &self,
        ctx: &mut GazerContext,
        op: ExprRef,
        ty: Type,
        rm: RoundingMode,
    ) -> ExprRef {
        ctx.intern_expr(ExprKind::UnsignedToFp(rm), ty, &[op])
    }

    fn fp_to_signed(
        &self,
        ctx: &mut GazerContext,
        op: ExprRef,
        ty: Type,
        rm: RoundingMode,
    ) -> ExprRef {
        ctx.intern_expr(ExprKind::FpToSigned(rm), ty, &[op])
    }

    fn fp_to_unsigned(
        &self,
        ctx: &mut GazerContext,
        op: ExprRef,
        ty: Type,
        rm: RoundingMode,
    ) -> ExprRef {
        ctx.intern_expr(ExprKind::FpToUnsigned(rm), ty, &[op])
    }

    // ------------------------------------------------------------------
    // Ternary and arrays

    fn select(&self, ctx: &mut GazerContext, cond: ExprRef, then: ExprRef, elze: ExprRef) -> ExprRef {
        let ty = ctx.expr_type(then);
        ctx.intern_expr(ExprKind::Select, ty, &[cond, then, elze])
    }

    fn array_read(&self, ctx: &mut GazerContext, array: ExprRef, index: ExprRef) -> ExprRef {
        let (_, element) = ctx.array_component_types(ctx.expr_type(array));
        ctx.intern_expr(ExprKind::ArrayRead, element, &[array, index])
    }

    fn array_write(
        &self,
        ctx: &mut GazerContext,
        array: ExprRef,
        index: ExprRef,
        value: ExprRef,
    ) -> ExprRef {
        let ty = ctx.expr_type(array);
        ctx.intern_expr(ExprKind::ArrayWrite, ty, &[array, index, value])
    }
}

/// A builder that interns without simplification.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrivialExprBuilder;

impl ExprBuilder for TrivialExprBuilder {}

/// A builder that simplifies on construction: algebraic rewrites driven by
/// the pattern matcher plus constant folding of fully-literal arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct FoldingExprBuilder;

// ----------------------------------------------------------------------
// Constant folding over literal operands

fn lit2(ctx: &GazerContext, left: ExprRef, right: ExprRef) -> Option<(Literal, Literal)> {
    Some((ctx.as_literal(left)?.clone(), ctx.as_literal(right)?.clone()))
}

/// Fold a binary arithmetic operation over two literal operands. Division by
/// a zero literal stays symbolic (the evaluator reports it).
fn fold_arith(ctx: &mut GazerContext, op: Op, left: ExprRef, right: ExprRef) -> Option<ExprRef> {
    let (a, b) = lit2(ctx, left, right)?;
    let folded = match (a, b) {
        (Literal::Bv(x), Literal::Bv(y)) => {
            let divides = matches!(op, Op::BvSDiv | Op::BvUDiv | Op::BvSRem | Op::BvURem);
            if divides && y.is_zero() {
                return None;
            }
            Literal::Bv(match op {
                Op::Add => x.add(&y),
                Op::Sub => x.sub(&y),
                Op::Mul => x.mul(&y),
                Op::BvSDiv => x.sdiv(&y),
                Op::BvUDiv => x.udiv(&y),
                Op::BvSRem => x.srem(&y),
                Op::BvURem => x.urem(&y),
                Op::Shl => x.shl(&y),
                Op::LShr => x.lshr(&y),
                Op::AShr => x.ashr(&y),
                Op::BvAnd => x.and(&y),
                Op::BvOr => x.or(&y),
                Op::BvXor => x.xor(&y),
                _ => return None,
            })
        }
        (Literal::Int(x), Literal::Int(y)) => {
            let divides = matches!(op, Op::Div | Op::Mod | Op::Rem);
            if divides && y.is_zero() {
                return None;
            }
            Literal::Int(match op {
                Op::Add => x + y,
                Op::Sub => x - y,
                Op::Mul => x * y,
                Op::Div => x / y,
                // Mathematical modulus: the result follows the divisor's sign.
                Op::Mod => x.mod_floor(&y),
                // Truncated remainder: the result follows the dividend's sign.
                Op::Rem => x % y,
                _ => return None,
            })
        }
        _ => return None,
    };
    Some(ctx.literal_expr(folded))
}

/// Fold a comparison over two literal operands. Floating-point literals are
/// never folded.
fn fold_compare(ctx: &mut GazerContext, op: Op, left: ExprRef, right: ExprRef) -> Option<ExprRef> {
    let (a, b) = lit2(ctx, left, right)?;
    let result = match (a, b) {
        (Literal::Bool(x), Literal::Bool(y)) => match op {
            Op::Eq => x == y,
            Op::NotEq => x != y,
            _ => return None,
        },
        (Literal::Int(x), Literal::Int(y)) => match op {
            Op::Eq => x == y,
            Op::NotEq => x != y,
            Op::Lt => x < y,
            Op::LtEq => x <= y,
            Op::Gt => x > y,
            Op::GtEq => x >= y,
            _ => return None,
        },
        (Literal::Bv(x), Literal::Bv(y)) => match op {
            Op::Eq => x == y,
            Op::NotEq => x != y,
            Op::BvSLt => x.slt(&y),
            Op::BvSLtEq => x.sle(&y),
            Op::BvSGt => y.slt(&x),
            Op::BvSGtEq => y.sle(&x),
            Op::BvULt => x.ult(&y),
            Op::BvULtEq => x.ule(&y),
            Op::BvUGt => y.ult(&x),
            Op::BvUGtEq => y.ule(&x),
            _ => return None,
        },
        (Literal::Real(x), Literal::Real(y)) => match op {
            Op::Eq => x == y,
            Op::NotEq => x != y,
            _ => return None,
        },
        _ => return None,
    };
    Some(ctx.literal_expr(Literal::Bool(result)))
}

/// The `Add(constant, x)` shape, with the constant on either side.
fn match_add_const(ctx: &GazerContext, expr: ExprRef) -> Option<(BvValue, ExprRef)> {
    if ctx.op(expr) != Op::Add {
        return None;
    }
    let (a, b) = (ctx.operands(expr)[0], ctx.operands(expr)[1]);
    if let Some(Literal::Bv(c)) = ctx.as_literal(a) {
        return Some((c.clone(), b));
    }
    if let Some(Literal::Bv(c)) = ctx.as_literal(b) {
        return Some((c.clone(), a));
    }
    None
}

fn bv_lit_of(ctx: &GazerContext, expr: ExprRef) -> Option<BvValue> {
    match ctx.as_literal(expr) {
        Some(Literal::Bv(bv)) => Some(bv.clone()),
        _ => None,
    }
}

impl FoldingExprBuilder {
    /// Construct a `Select` with constant folding only, for use as the
    /// result of the nested-select rewrites (which must not re-enter the
    /// full rule set).
    fn select_folded(
        &self,
        ctx: &mut GazerContext,
        cond: ExprRef,
        then: ExprRef,
        elze: ExprRef,
    ) -> ExprRef {
        if let Some(b) = ctx.as_bool_lit(cond) {
            return if b { then } else { elze };
        }
        if then == elze {
            return then;
        }
        TrivialExprBuilder.select(ctx, cond, then, elze)
    }

    /// Shared rewrite for the four signed bitvector comparisons:
    /// `CMP(Add(C1, X), C2) --> CMP(X, C2 - C1)`, folding the new constant.
    /// Unsigned comparisons must not be rewritten this way: `a + b u< c`
    /// does not survive the subtraction when `c - b` underflows.
    fn signed_compare(
        &self,
        ctx: &mut GazerContext,
        op: Op,
        left: ExprRef,
        right: ExprRef,
    ) -> ExprRef {
        if let (Some((c1, x)), Some(c2)) = (match_add_const(ctx, left), bv_lit_of(ctx, right)) {
            let rhs = self.bv_lit(ctx, c2.sub(&c1));
            return self.dispatch_signed(ctx, op, x, rhs);
        }
        if let (Some(c2), Some((c1, x))) = (bv_lit_of(ctx, left), match_add_const(ctx, right)) {
            let lhs = self.bv_lit(ctx, c2.sub(&c1));
            return self.dispatch_signed(ctx, op, lhs, x);
        }

        fold_compare(ctx, op, left, right).unwrap_or_else(|| match op {
            Op::BvSLt => TrivialExprBuilder.bv_slt(ctx, left, right),
            Op::BvSLtEq => TrivialExprBuilder.bv_slt_eq(ctx, left, right),
            Op::BvSGt => TrivialExprBuilder.bv_sgt(ctx, left, right),
            Op::BvSGtEq => TrivialExprBuilder.bv_sgt_eq(ctx, left, right),
            _ => unreachable!("not a signed bitvector comparison: {:?}", op),
        })
    }

    fn dispatch_signed(
        &self,
        ctx: &mut GazerContext,
        op: Op,
        left: ExprRef,
        right: ExprRef,
    ) -> ExprRef {
        match op {
            Op::BvSLt => self.bv_slt(ctx, left, right),
            Op::BvSLtEq => self.bv_slt_eq(ctx, left, right),
            Op::BvSGt => self.bv_sgt(ctx, left, right),
            Op::BvSGtEq => self.bv_sgt_eq(ctx, left, right),
            _ => unreachable!("not a signed bitvector comparison: {:?}", op),
        }
    }
}

macro_rules! fold_arith_method {
    ($name:ident, $op:expr) => {
        fn $name(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
            fold_arith(ctx, $op, left, right)
                .unwrap_or_else(|| TrivialExprBuilder.$name(ctx, left, right))
        }
    };
}

macro_rules! fold_compare_method {
    ($name:ident, $op:expr) => {
        fn $name(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
            fold_compare(ctx, $op, left, right)
                .unwrap_or_else(|| TrivialExprBuilder.$name(ctx, left, right))
        }
    };
}

macro_rules! signed_compare_method {
    ($name:ident, $op:expr) => {
        fn $name(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
            self.signed_compare(ctx, $op, left, right)
        }
    };
}

impl ExprBuilder for FoldingExprBuilder {
    fn not(&self, ctx: &mut GazerContext, op: ExprRef) -> ExprRef {
        // Not(Not(X)) --> X
        if ctx.op(op) == Op::Not {
            return ctx.operands(op)[0];
        }

        if let Some(b) = ctx.as_bool_lit(op) {
            return self.bool_lit(ctx, !b);
        }

        let e1 = ExprSlot::new();
        let e2 = ExprSlot::new();

        // Not(Eq(E1, E2)) --> NotEq(E1, E2)
        if match_expr(ctx, op, &m_eq(m_expr(&e1), m_expr(&e2))) {
            return self.not_eq(ctx, e1.get(), e2.get());
        }

        // Not(NotEq(E1, E2)) --> Eq(E1, E2)
        if match_expr(ctx, op, &m_not_eq(m_expr(&e1), m_expr(&e2))) {
            return self.eq(ctx, e1.get(), e2.get());
        }

        // Not(LESSTHAN(E1, E2)) --> GREATERTHANEQ(E1, E2)
        if match_expr(ctx, op, &m_bv_ult(m_expr(&e1), m_expr(&e2))) {
            return self.bv_ugt_eq(ctx, e1.get(), e2.get());
        }

        if match_expr(ctx, op, &m_bv_slt(m_expr(&e1), m_expr(&e2))) {
            return self.bv_sgt_eq(ctx, e1.get(), e2.get());
        }

        if match_expr(ctx, op, &m_lt(m_expr(&e1), m_expr(&e2))) {
            return self.gt_eq(ctx, e1.get(), e2.get());
        }

        TrivialExprBuilder.not(ctx, op)
    }

    fn and(&self, ctx: &mut GazerContext, ops: Vec<ExprRef>) -> ExprRef {
        let mut new_ops: Vec<ExprRef> = Vec::with_capacity(ops.len());

        for op in ops {
            match ctx.as_bool_lit(op) {
                Some(false) => return self.false_expr(ctx),
                Some(true) => {} // true operands contribute nothing
                None => {
                    if ctx.op(op) == Op::And {
                        // Flatten nested conjunctions.
                        new_ops.extend_from_slice(ctx.operands(op));
                    } else {
                        new_ops.push(op);
                    }
                }
            }
        }

        match new_ops.len() {
            0 => return self.true_expr(ctx),
            1 => return new_ops[0],
            _ => {}
        }

        if new_ops.len() == 2 {
            let (lhs, rhs) = (new_ops[0], new_ops[1]);
            let e1 = ExprSlot::new();
            let e2 = ExprSlot::new();
            let e3 = ExprSlot::new();

            // And(Eq(E1, E2), NotEq(E1, E2)) --> False
            if unord_match(
                ctx,
                lhs,
                rhs,
                &m_eq(m_expr(&e1), m_expr(&e2)),
                &m_not_eq(m_same(&e1), m_same(&e2)),
            ) {
                return self.false_expr(ctx);
            }

            // And(Not(X), X) --> False
            if unord_match(ctx, lhs, rhs, &m_not(m_expr(&e1)), &m_same(&e1)) {
                return self.false_expr(ctx);
            }

            // And(Or(E1, E2), Or(E1, E3)) --> Or(E1, And(E2, E3))
            if unord_match(
                ctx,
                lhs,
                rhs,
                &m_or(m_expr(&e1), m_expr(&e2)),
                &m_or(m_same(&e1), m_expr(&e3)),
            ) {
                let tail = self.and(ctx, vec![e2.get(), e3.get()]);
                return self.or(ctx, vec![e1.get(), tail]);
            }
        }

        let bool_ty = ctx.bool_type();
        ctx.intern_expr(ExprKind::And, bool_ty, &new_ops)
    }

    fn or(&self, ctx: &mut GazerContext, ops: Vec<ExprRef>) -> ExprRef {
        let mut new_ops: Vec<ExprRef> = Vec::with_capacity(ops.len());

        for op in ops {
            match ctx.as_bool_lit(op) {
                Some(true) => return self.true_expr(ctx),
                Some(false) => {} // false operands contribute nothing
                None => {
                    if ctx.op(op) == Op::Or {
                        // Flatten nested disjunctions.
                        new_ops.extend_from_slice(ctx.operands(op));
                    } else {
                        new_ops.push(op);
                    }
                }
            }
        }

        match new_ops.len() {
            0 => return self.false_expr(ctx),
            1 => return new_ops[0],
            _ => {}
        }

        if new_ops.len() == 2 {
            let (lhs, rhs) = (new_ops[0], new_ops[1]);
            let e1 = ExprSlot::new();
            let e2 = ExprSlot::new();
            let e3 = ExprSlot::new();

            // Or(Eq(E1, E2), NotEq(E1, E2)) --> True
            if unord_match(
                ctx,
                lhs,
                rhs,
                &m_eq(m_expr(&e1), m_expr(&e2)),
                &m_not_eq(m_same(&e1), m_same(&e2)),
            ) {
                return self.true_expr(ctx);
            }

            // Or(Not(X), X) --> True
            if unord_match(ctx, lhs, rhs, &m_not(m_expr(&e1)), &m_same(&e1)) {
                return self.true_expr(ctx);
            }

            // Or(And(E1, E2), And(E1, E3)) --> And(E1, Or(E2, E3))
            if unord_match(
                ctx,
                lhs,
                rhs,
                &m_and(m_expr(&e1), m_expr(&e2)),
                &m_and(m_same(&e1), m_expr(&e3)),
            ) {
                let tail = self.or(ctx, vec![e2.get(), e3.get()]);
                return self.and(ctx, vec![e1.get(), tail]);
            }
        }

        let bool_ty = ctx.bool_type();
        ctx.intern_expr(ExprKind::Or, bool_ty, &new_ops)
    }

    fn xor(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        match (ctx.as_bool_lit(left), ctx.as_bool_lit(right)) {
            (Some(a), Some(b)) => self.bool_lit(ctx, a != b),
            // Xor(True, E) --> Not(E); Xor(False, E) --> E
            (Some(true), None) => self.not(ctx, right),
            (None, Some(true)) => self.not(ctx, left),
            (Some(false), None) => right,
            (None, Some(false)) => left,
            (None, None) => TrivialExprBuilder.xor(ctx, left, right),
        }
    }

    fn imply(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        if let (Some(a), Some(b)) = (ctx.as_bool_lit(left), ctx.as_bool_lit(right)) {
            return self.bool_lit(ctx, !a || b);
        }
        TrivialExprBuilder.imply(ctx, left, right)
    }

    fn eq(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        // Eq(X, X) --> True
        if left == right {
            return self.true_expr(ctx);
        }

        let b1 = BoolSlot::new();
        let c1 = ExprSlot::new();
        let e1 = ExprSlot::new();
        let e2 = ExprSlot::new();

        // Eq(True, X) --> X; Eq(False, X) --> Not(X)
        if unord_match(ctx, left, right, &m_bool_lit(&b1), &m_expr(&e1)) {
            if b1.get() {
                return e1.get();
            }
            return self.not(ctx, e1.get());
        }

        // Eq(Select(C1, E1, E2), E1) --> C1
        if unord_match(
            ctx,
            left,
            right,
            &m_select(m_expr(&c1), m_expr(&e1), m_expr(&e2)),
            &m_same(&e1),
        ) {
            return c1.get();
        }

        // Eq(Select(C1, E1, E2), E2) --> Not(C1)
        if unord_match(
            ctx,
            left,
            right,
            &m_select(m_expr(&c1), m_expr(&e1), m_expr(&e2)),
            &m_same(&e2),
        ) {
            return self.not(ctx, c1.get());
        }

        // Eq(ZExt.W(E1), C1) --> Eq(E1, trunc(C1)) if C1 fits in width(E1)
        let k = BvSlot::new();
        if unord_match(ctx, left, right, &m_zext(m_expr(&e1)), &m_bv_lit(&k)) {
            let k = k.get();
            let narrow = ctx.bv_width(ctx.expr_type(e1.get()));
            if k.active_bits() <= narrow as u64 {
                let lit = self.bv_lit(ctx, k.truncate(narrow));
                return self.eq(ctx, e1.get(), lit);
            }
        }

        fold_compare(ctx, Op::Eq, left, right)
            .unwrap_or_else(|| TrivialExprBuilder.eq(ctx, left, right))
    }

    fn not_eq(&self, ctx: &mut GazerContext, left: ExprRef, right: ExprRef) -> ExprRef {
        // NotEq(X, X) --> False
        if left == right {
            return self.false_expr(ctx);
        }

        let b1 = BoolSlot::new();
        let e1 = ExprSlot::new();
        let e2 = ExprSlot::new();
        let e3 = ExprSlot::new();
        let x1 = ExprSlot::new();
        let x2 = ExprSlot::new();

        // NotEq(True, X) --> Not(X); NotEq(False, X) --> X
        if unord_match(ctx, left, right, &m_bool_lit(&b1), &m_expr(&e1)) {
            if b1.get() {
                return self.not(ctx, e1.get());
            }
            return e1.get();
        }

        // NotEq(Select(NotEq(X1, X2), E1, E2), E1) --> Eq(X1, X2)
        // NotEq(Select(NotEq(X1, X2), E1, E2), E2) --> NotEq(X1, X2)
        if unord_match(
            ctx,
            left,
            right,
            &m_select(
                m_not_eq(m_expr(&x1), m_expr(&x2)),
                m_expr(&e1),
                m_expr(&e2),
            ),
            &m_expr(&e3),
        ) {
            if e3.get() == e1.get() {
                return self.eq(ctx, x1.get(), x2.get());
            }
            if e3.get() == e2.get() {
                return self.not_eq(ctx, x1.get(), x2.get());
            }
        }

        // NotEq(ZExt(X1), 0) --> NotEq(X1, 0)
        let k = BvSlot::new();
        if unord_match(ctx, left, right, &m_zext(m_expr(&x1)), &m_bv_lit(&k)) && k.get().is_zero()
        {
            let narrow = ctx.bv_width(ctx.expr_type(x1.get()));
            let zero = self.bv_lit(ctx, BvValue::zero(narrow));
            return self.not_eq(ctx, x1.get(), zero);
        }

        fold_compare(ctx, Op::NotEq, left, right)
            .unwrap_or_else(|| TrivialExprBuilder.not_eq(ctx, left, right))
    }

    fold_compare_method!(lt, Op::Lt);
    fold_compare_method!(lt_eq, Op::LtEq);
    fold_compare_method!(gt, Op::Gt);
    fold_compare_method!(gt_eq, Op::GtEq);

    signed_compare_method!(bv_slt, Op::BvSLt);
    signed_compare_method!(bv_slt_eq, Op::BvSLtEq);
    signed_compare_method!(bv_sgt, Op::BvSGt);
    signed_compare_method!(bv_sgt_eq, Op::BvSGtEq);

    fold_compare_method!(bv_ult, Op::BvULt);
    fold_compare_method!(bv_ult_eq, Op::BvULtEq);
    fold_compare_method!(bv_ugt, Op::BvUGt);
    fold_compare_method!(bv_ugt_eq, Op::BvUGtEq);

    fold_arith_method!(add, Op::Add);
    fold_arith_method!(sub, Op::Sub);
    fold_arith_method!(mul, Op::Mul);
    fold_arith_method!(div, Op::Div);
    fold_arith_method!(modulo, Op::Mod);
    fold_arith_method!(rem, Op::Rem);
    fold_arith_method!(bv_sdiv, Op::BvSDiv);
    fold_arith_method!(bv_udiv, Op::BvUDiv);
    fold_arith_method!(bv_srem, Op::BvSRem);
    fold_arith_method!(bv_urem, Op::BvURem);
    fold_arith_method!(shl, Op::Shl);
    fold_arith_method!(lshr, Op::LShr);
    fold_arith_method!(ashr, Op::AShr);
    fold_arith_method!(bv_and, Op::BvAnd);
    fold_arith_method!(bv_or, Op::BvOr);
    fold_arith_method!(bv_xor, Op::BvXor);

    fn zext(&self, ctx: &mut GazerContext, op: ExprRef, ty: Type) -> ExprRef {
        if let Some(v) = bv_lit_of(ctx, op) {
            let width = ctx.bv_width(ty);
            return self.bv_lit(ctx, v.zext(width));
        }
        TrivialExprBuilder.zext(ctx, op, ty)
    }

    fn sext(&self, ctx: &mut GazerContext, op: ExprRef, ty: Type) -> ExprRef {
        if let Some(v) = bv_lit_of(ctx, op) {
            let width = ctx.bv_width(ty);
            return self.bv_lit(ctx, v.sext(width));
        }
        TrivialExprBuilder.sext(ctx, op, ty)
    }

    fn extract(&self, ctx: &mut GazerContext, op: ExprRef, offset: u32, width: u32) -> ExprRef {
        if offset == 0 {
            let x1 = ExprSlot::new();
            let x2 = ExprSlot::new();

            // Extract(SRem(SExt(X1), SExt(X2)), 0, W) --> SRem(X1, X2)
            // if width(X1) == width(X2) == W
            if match_expr(
                ctx,
                op,
                &m_bv_srem(m_sext(m_expr(&x1)), m_sext(m_expr(&x2))),
            ) {
                let w1 = ctx.bv_width(ctx.expr_type(x1.get()));
                let w2 = ctx.bv_width(ctx.expr_type(x2.get()));
                if w1 == width && w2 == width {
                    return self.bv_srem(ctx, x1.get(), x2.get());
                }
            }
        }

        if let Some(v) = bv_lit_of(ctx, op) {
            return self.bv_lit(ctx, v.extract(offset, width));
        }

        TrivialExprBuilder.extract(ctx, op, offset, width)
    }

    fn select(&self, ctx: &mut GazerContext, cond: ExprRef, then: ExprRef, elze: ExprRef) -> ExprRef {
        // Select(True, E1, E2) --> E1; Select(False, E1, E2) --> E2
        if let Some(b) = ctx.as_bool_lit(cond) {
            return if b { then } else { elze };
        }

        // Select(C, E, E) --> E
        if then == elze {
            return then;
        }

        let true_lit = self.true_expr(ctx);
        let false_lit = self.false_expr(ctx);

        // Select(C, E, False) --> And(C, E)
        if elze == false_lit {
            return self.and(ctx, vec![cond, then]);
        }
        // Select(C, E, True) --> Or(Not(C), E)
        if elze == true_lit {
            let not_cond = self.not(ctx, cond);
            return self.or(ctx, vec![not_cond, then]);
        }
        // Select(C, True, E) --> Or(C, E)
        if then == true_lit {
            return self.or(ctx, vec![cond, elze]);
        }
        // Select(C, False, E) --> And(Not(C), E)
        if then == false_lit {
            let not_cond = self.not(ctx, cond);
            return self.and(ctx, vec![not_cond, elze]);
        }

        let c1 = ExprSlot::new();

        // Select(Not(C1), E1, E2) --> Select(C1, E2, E1)
        if match_expr(ctx, cond, &m_not(m_expr(&c1))) {
            return self.select(ctx, c1.get(), elze, then);
        }

        let c2 = ExprSlot::new();
        let e1 = ExprSlot::new();
        let e2 = ExprSlot::new();

        // Select(C1, Select(C1, E1, E'), E2) --> Select(C1, E1, E2)
        if match3(
            ctx,
            cond,
            &m_expr(&c1),
            then,
            &m_select(m_same(&c1), m_expr(&e1), m_any()),
            elze,
            &m_expr(&e2),
        ) {
            return self.select_folded(ctx, c1.get(), e1.get(), e2.get());
        }

        // Select(C1, E1, Select(C1, E', E2)) --> Select(C1, E1, E2)
        if match3(
            ctx,
            cond,
            &m_expr(&c1),
            then,
            &m_expr(&e1),
            elze,
            &m_select(m_same(&c1), m_any(), m_expr(&e2)),
        ) {
            return self.select_folded(ctx, c1.get(), e1.get(), e2.get());
        }

        // Select(C1, Select(C2, E1, E2), E1) --> Select(C1 and not C2, E2, E1)
        if match3(
            ctx,
            cond,
            &m_expr(&c1),
            then,
            &m_select(m_expr(&c2), m_expr(&e1), m_expr(&e2)),
            elze,
            &m_same(&e1),
        ) {
            let not_c2 = self.not(ctx, c2.get());
            let guard = self.and(ctx, vec![c1.get(), not_c2]);
            return self.select_folded(ctx, guard, e2.get(), e1.get());
        }

        // Select(C1, Select(C2, E1, E2), E2) --> Select(C1 and C2, E1, E2)
        if match3(
            ctx,
            cond,
            &m_expr(&c1),
            then,
            &m_select(m_expr(&c2), m_expr(&e1), m_expr(&e2)),
            elze,
            &m_same(&e2),
        ) {
            let guard = self.and(ctx, vec![c1.get(), c2.get()]);
            return self.select_folded(ctx, guard, e1.get(), e2.get());
        }

        // Select(C1, E1, Select(C2, E1, E2)) --> Select(C1 or C2, E1, E2)
        if match3(
            ctx,
            cond,
            &m_expr(&c1),
            then,
            &m_expr(&e1),
            elze,
            &m_select(m_expr(&c2), m_same(&e1), m_expr(&e2)),
        ) {
            let guard = self.or(ctx, vec![c1.get(), c2.get()]);
            return self.select_folded(ctx, guard, e1.get(), e2.get());
        }

        TrivialExprBuilder.select(ctx, cond, then, elze)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::eval;
    use crate::valuation::Valuation;
    use proptest::prelude::*;

    struct Fixture {
        ctx: GazerContext,
        a: ExprRef,
        b: ExprRef,
        c: ExprRef,
    }

    fn fixture() -> Fixture {
        let mut ctx = GazerContext::new();
        let bool_ty = ctx.bool_type();
        let a = ctx.create_variable("a", bool_ty);
        let b = ctx.create_variable("b", bool_ty);
        let c = ctx.create_variable("c", bool_ty);
        let (a, b, c) = (ctx.ref_expr(a), ctx.ref_expr(b), ctx.ref_expr(c));
        Fixture { ctx, a, b, c }
    }

    #[test]
    fn test_not_of_eq_becomes_not_eq() {
        // Scenario: Not(Eq(a, b)) with a, b : Int folds to NotEq(a, b).
        let mut ctx = GazerContext::new();
        let f = FoldingExprBuilder;
        let int = ctx.int_type();
        let a = ctx.create_variable("a", int);
        let b = ctx.create_variable("b", int);
        let (ra, rb) = (ctx.ref_expr(a), ctx.ref_expr(b));

        let eq = f.eq(&mut ctx, ra, rb);
        let not = f.not(&mut ctx, eq);
        assert_eq!(ctx.op(not), Op::NotEq);
        assert_eq!(ctx.operands(not), &[ra, rb]);

        // And back: Not(NotEq(a, b)) --> Eq(a, b).
        let back = f.not(&mut ctx, not);
        assert_eq!(back, eq);
    }

    #[test]
    fn test_constant_reduction() {
        // Scenario: Add(3bv8, 39bv8) folds to the single literal 42bv8.
        let mut ctx = GazerContext::new();
        let f = FoldingExprBuilder;
        let three = f.bv_lit_u64(&mut ctx, 8, 3);
        let thirty_nine = f.bv_lit_u64(&mut ctx, 8, 39);
        let sum = f.add(&mut ctx, three, thirty_nine);
        assert_eq!(ctx.as_literal(sum), Some(&Literal::bv(8, 42)));
    }

    #[test]
    fn test_select_of_negated_condition_swaps_branches() {
        // Scenario: Select(Not(c), x, y) --> Select(c, y, x).
        let mut ctx = GazerContext::new();
        let f = FoldingExprBuilder;
        let bool_ty = ctx.bool_type();
        let int = ctx.int_type();
        let c = ctx.create_variable("c", bool_ty);
        let x = ctx.create_variable("x", int);
        let y = ctx.create_variable("y", int);
        let (rc, rx, ry) = (ctx.ref_expr(c), ctx.ref_expr(x), ctx.ref_expr(y));

        let not_c = f.not(&mut ctx, rc);
        let select = f.select(&mut ctx, not_c, rx, ry);
        assert_eq!(ctx.op(select), Op::Select);
        assert_eq!(ctx.operands(select), &[rc, ry, rx]);
    }

    #[test]
    fn test_signed_compare_normalisation() {
        // Scenario: BvSLt(Add(5bv32, x), 10bv32) --> BvSLt(x, 5bv32).
        let mut ctx = GazerContext::new();
        let f = FoldingExprBuilder;
        let bv32 = ctx.bv_type(32);
        let x = ctx.create_variable("x", bv32);
        let rx = ctx.ref_expr(x);
        let five = f.bv_lit_u64(&mut ctx, 32, 5);
        let ten = f.bv_lit_u64(&mut ctx, 32, 10);

        let sum = TrivialExprBuilder.add(&mut ctx, five, rx);
        let cmp = f.bv_slt(&mut ctx, sum, ten);
        assert_eq!(ctx.op(cmp), Op::BvSLt);
        assert_eq!(ctx.operands(cmp)[0], rx);
        assert_eq!(ctx.as_literal(ctx.operands(cmp)[1]), Some(&Literal::bv(32, 5)));

        // Unsigned comparisons are left alone: the subtraction may underflow.
        let ucmp = f.bv_ult(&mut ctx, sum, ten);
        assert_eq!(ctx.op(ucmp), Op::BvULt);
        assert_eq!(ctx.operands(ucmp)[0], sum);
    }

    #[test]
    fn test_double_negation() {
        let Fixture { mut ctx, a, .. } = fixture();
        let f = FoldingExprBuilder;
        let not = f.not(&mut ctx, a);
        let not_not = f.not(&mut ctx, not);
        assert_eq!(not_not, a);
    }

    #[test]
    fn test_not_of_comparisons() {
        let mut ctx = GazerContext::new();
        let f = FoldingExprBuilder;
        let bv8 = ctx.bv_type(8);
        let int = ctx.int_type();
        let x = ctx.create_variable("x", bv8);
        let y = ctx.create_variable("y", bv8);
        let m = ctx.create_variable("m", int);
        let n = ctx.create_variable("n", int);
        let (rx, ry) = (ctx.ref_expr(x), ctx.ref_expr(y));
        let (rm, rn) = (ctx.ref_expr(m), ctx.ref_expr(n));

        let ult = TrivialExprBuilder.bv_ult(&mut ctx, rx, ry);
        let not_ult = f.not(&mut ctx, ult);
        assert_eq!(ctx.op(not_ult), Op::BvUGtEq);
        assert_eq!(ctx.operands(not_ult), &[rx, ry]);

        let slt = TrivialExprBuilder.bv_slt(&mut ctx, rx, ry);
        let not_slt = f.not(&mut ctx, slt);
        assert_eq!(ctx.op(not_slt), Op::BvSGtEq);

        let lt = TrivialExprBuilder.lt(&mut ctx, rm, rn);
        let not_lt = f.not(&mut ctx, lt);
        assert_eq!(ctx.op(not_lt), Op::GtEq);
    }

    #[test]
    fn test_and_literal_handling() {
        let Fixture { mut ctx, a, b, .. } = fixture();
        let f = FoldingExprBuilder;
        let t = f.true_expr(&mut ctx);
        let fl = f.false_expr(&mut ctx);

        // True operands are dropped.
        assert_eq!(f.and(&mut ctx, vec![t, a]), a);
        // A false operand collapses the whole conjunction.
        assert_eq!(f.and(&mut ctx, vec![a, fl, b]), fl);
        // All operands eliminated: the empty conjunction is true.
        assert_eq!(f.and(&mut ctx, vec![t, t]), t);
        // Or, dually.
        assert_eq!(f.or(&mut ctx, vec![fl, b]), b);
        assert_eq!(f.or(&mut ctx, vec![a, t, b]), t);
        assert_eq!(f.or(&mut ctx, vec![fl, fl]), fl);
    }

    #[test]
    fn test_and_flattening() {
        let Fixture { mut ctx, a, b, c } = fixture();
        let f = FoldingExprBuilder;
        let inner = TrivialExprBuilder.and(&mut ctx, vec![a, b]);
        let flat = f.and(&mut ctx, vec![inner, c]);
        assert_eq!(ctx.op(flat), Op::And);
        assert_eq!(ctx.operands(flat), &[a, b, c]);
    }

    #[test]
    fn test_and_contradictions() {
        let mut ctx = GazerContext::new();
        let f = FoldingExprBuilder;
        let int = ctx.int_type();
        let x = ctx.create_variable("x", int);
        let y = ctx.create_variable("y", int);
        let (rx, ry) = (ctx.ref_expr(x), ctx.ref_expr(y));

        let eq = f.eq(&mut ctx, rx, ry);
        let ne = f.not_eq(&mut ctx, rx, ry);
        let fl = f.false_expr(&mut ctx);
        let t = f.true_expr(&mut ctx);
        assert_eq!(f.and(&mut ctx, vec![eq, ne]), fl);
        // Swapping the top-level operands folds the same way.
        assert_eq!(f.and(&mut ctx, vec![ne, eq]), fl);
        // The disjunction of the same pair is a tautology.
        assert_eq!(f.or(&mut ctx, vec![eq, ne]), t);

        let bool_ty = ctx.bool_type();
        let p = ctx.create_variable("p", bool_ty);
        let rp = ctx.ref_expr(p);
        let np = f.not(&mut ctx, rp);
        assert_eq!(f.and(&mut ctx, vec![np, rp]), fl);
        assert_eq!(f.and(&mut ctx, vec![rp, np]), fl);
        assert_eq!(f.or(&mut ctx, vec![np, rp]), t);
    }

    #[test]
    fn test_and_or_factoring() {
        let Fixture { mut ctx, a, b, c } = fixture();
        let f = FoldingExprBuilder;

        // And(Or(a, b), Or(a, c)) --> Or(a, And(b, c))
        let ab = TrivialExprBuilder.or(&mut ctx, vec![a, b]);
        let ac = TrivialExprBuilder.or(&mut ctx, vec![a, c]);
        let folded = f.and(&mut ctx, vec![ab, ac]);
        assert_eq!(ctx.op(folded), Op::Or);
        let expected_tail = f.and(&mut ctx, vec![b, c]);
        assert_eq!(ctx.operands(folded), &[a, expected_tail]);

        // Or(And(a, b), And(a, c)) --> And(a, Or(b, c))
        let ab = TrivialExprBuilder.and(&mut ctx, vec![a, b]);
        let ac = TrivialExprBuilder.and(&mut ctx, vec![a, c]);
        let folded = f.or(&mut ctx, vec![ab, ac]);
        assert_eq!(ctx.op(folded), Op::And);
        let expected_tail = f.or(&mut ctx, vec![b, c]);
        assert_eq!(ctx.operands(folded), &[a, expected_tail]);
    }

    #[test]
    fn test_xor_rules() {
        let Fixture { mut ctx, a, .. } = fixture();
        let f = FoldingExprBuilder;
        let t = f.true_expr(&mut ctx);
        let fl = f.false_expr(&mut ctx);

        let not_a = f.not(&mut ctx, a);
        assert_eq!(f.xor(&mut ctx, t, a), not_a);
        assert_eq!(f.xor(&mut ctx, a, t), not_a);
        assert_eq!(f.xor(&mut ctx, fl, a), a);
        assert_eq!(f.xor(&mut ctx, a, fl), a);
        assert_eq!(f.xor(&mut ctx, t, t), fl);
        assert_eq!(f.imply(&mut ctx, t, fl), fl);
        assert_eq!(f.imply(&mut ctx, fl, fl), t);
    }

    #[test]
    fn test_eq_rules() {
        let Fixture { mut ctx, a, .. } = fixture();
        let f = FoldingExprBuilder;
        let t = f.true_expr(&mut ctx);
        let fl = f.false_expr(&mut ctx);

        // Eq(X, X) --> True; NotEq(X, X) --> False.
        assert_eq!(f.eq(&mut ctx, a, a), t);
        assert_eq!(f.not_eq(&mut ctx, a, a), fl);

        // Eq against boolean literals, in both operand orders.
        let not_a = f.not(&mut ctx, a);
        assert_eq!(f.eq(&mut ctx, t, a), a);
        assert_eq!(f.eq(&mut ctx, a, t), a);
        assert_eq!(f.eq(&mut ctx, fl, a), not_a);
        assert_eq!(f.not_eq(&mut ctx, t, a), not_a);
        assert_eq!(f.not_eq(&mut ctx, a, fl), a);
    }

    #[test]
    fn test_eq_select_rules() {
        let mut ctx = GazerContext::new();
        let f = FoldingExprBuilder;
        let bool_ty = ctx.bool_type();
        let int = ctx.int_type();
        let c = ctx.create_variable("c", bool_ty);
        let x = ctx.create_variable("x", int);
        let y = ctx.create_variable("y", int);
        let (rc, rx, ry) = (ctx.ref_expr(c), ctx.ref_expr(x), ctx.ref_expr(y));

        let select = TrivialExprBuilder.select(&mut ctx, rc, rx, ry);
        // Eq(Select(c, x, y), x) --> c
        assert_eq!(f.eq(&mut ctx, select, rx), rc);
        assert_eq!(f.eq(&mut ctx, rx, select), rc);
        // Eq(Select(c, x, y), y) --> Not(c)
        let not_c = f.not(&mut ctx, rc);
        assert_eq!(f.eq(&mut ctx, select, ry), not_c);
    }

    #[test]
    fn test_eq_zext_narrowing() {
        let mut ctx = GazerContext::new();
        let f = FoldingExprBuilder;
        let bv8 = ctx.bv_type(8);
        let bv16 = ctx.bv_type(16);
        let x = ctx.create_variable("x", bv8);
        let rx = ctx.ref_expr(x);
        let wide = f.zext(&mut ctx, rx, bv16);

        // The constant fits in 8 bits: compare narrowly.
        let five16 = f.bv_lit_u64(&mut ctx, 16, 5);
        let narrowed = f.eq(&mut ctx, wide, five16);
        assert_eq!(ctx.op(narrowed), Op::Eq);
        assert_eq!(ctx.operands(narrowed)[0], rx);
        assert_eq!(
            ctx.as_literal(ctx.operands(narrowed)[1]),
            Some(&Literal::bv(8, 5))
        );

        // The constant does not fit: the comparison is left widened.
        let big = f.bv_lit_u64(&mut ctx, 16, 0x100);
        let kept = f.eq(&mut ctx, wide, big);
        assert_eq!(ctx.operands(kept)[0], wide);

        // NotEq(ZExt(x), 0) --> NotEq(x, 0)
        let zero16 = f.bv_lit_u64(&mut ctx, 16, 0);
        let ne = f.not_eq(&mut ctx, wide, zero16);
        assert_eq!(ctx.op(ne), Op::NotEq);
        assert_eq!(ctx.operands(ne)[0], rx);
        assert_eq!(ctx.as_literal(ctx.operands(ne)[1]), Some(&Literal::bv(8, 0)));
    }

    #[test]
    fn test_not_eq_select_rule() {
        let mut ctx = GazerContext::new();
        let f = FoldingExprBuilder;
        let int = ctx.int_type();
        let x1 = ctx.create_variable("x1", int);
        let x2 = ctx.create_variable("x2", int);
        let e1 = ctx.create_variable("e1", int);
        let e2 = ctx.create_variable("e2", int);
        let (rx1, rx2) = (ctx.ref_expr(x1), ctx.ref_expr(x2));
        let (re1, re2) = (ctx.ref_expr(e1), ctx.ref_expr(e2));

        let cond = TrivialExprBuilder.not_eq(&mut ctx, rx1, rx2);
        let select = TrivialExprBuilder.select(&mut ctx, cond, re1, re2);

        // NotEq(Select(NotEq(x1, x2), e1, e2), e1) --> Eq(x1, x2)
        let folded = f.not_eq(&mut ctx, select, re1);
        assert_eq!(ctx.op(folded), Op::Eq);
        assert_eq!(ctx.operands(folded), &[rx1, rx2]);

        // NotEq(Select(NotEq(x1, x2), e1, e2), e2) --> NotEq(x1, x2)
        let folded = f.not_eq(&mut ctx, select, re2);
        assert_eq!(folded, cond);
    }

    #[test]
    fn test_extract_of_srem_of_sext() {
        let mut ctx = GazerContext::new();
        let f = FoldingExprBuilder;
        let bv8 = ctx.bv_type(8);
        let bv16 = ctx.bv_type(16);
        let x = ctx.create_variable("x", bv8);
        let y = ctx.create_variable("y", bv8);
        let (rx, ry) = (ctx.ref_expr(x), ctx.ref_expr(y));

        let wx = f.sext(&mut ctx, rx, bv16);
        let wy = f.sext(&mut ctx, ry, bv16);
        let srem = TrivialExprBuilder.bv_srem(&mut ctx, wx, wy);

        let folded = f.extract(&mut ctx, srem, 0, 8);
        assert_eq!(ctx.op(folded), Op::BvSRem);
        assert_eq!(ctx.operands(folded), &[rx, ry]);

        // A narrower extract does not qualify.
        let kept = f.extract(&mut ctx, srem, 0, 4);
        assert_eq!(ctx.op(kept), Op::Extract);
    }

    #[test]
    fn test_select_boolean_ladder() {
        let Fixture { mut ctx, a, c, .. } = fixture();
        let f = FoldingExprBuilder;
        let t = f.true_expr(&mut ctx);
        let fl = f.false_expr(&mut ctx);

        let and_ca = f.and(&mut ctx, vec![c, a]);
        assert_eq!(f.select(&mut ctx, c, a, fl), and_ca);

        let not_c = f.not(&mut ctx, c);
        let or_nca = f.or(&mut ctx, vec![not_c, a]);
        assert_eq!(f.select(&mut ctx, c, a, t), or_nca);

        let or_ca = f.or(&mut ctx, vec![c, a]);
        assert_eq!(f.select(&mut ctx, c, t, a), or_ca);

        let and_nca = f.and(&mut ctx, vec![not_c, a]);
        assert_eq!(f.select(&mut ctx, c, fl, a), and_nca);

        // Select(c, a, a) --> a, Select(true/false, ...) choose a branch.
        let x = ctx.create_variable("x", ctx.int_type());
        let y = ctx.create_variable("y", ctx.int_type());
        let (rx, ry) = (ctx.ref_expr(x), ctx.ref_expr(y));
        assert_eq!(f.select(&mut ctx, c, rx, rx), rx);
        assert_eq!(f.select(&mut ctx, t, rx, ry), rx);
        assert_eq!(f.select(&mut ctx, fl, rx, ry), ry);
    }

    #[test]
    fn test_select_nested_rules() {
        let mut ctx = GazerContext::new();
        let f = FoldingExprBuilder;
        let bool_ty = ctx.bool_type();
        let int = ctx.int_type();
        let c1 = ctx.create_variable("c1", bool_ty);
        let c2 = ctx.create_variable("c2", bool_ty);
        let x = ctx.create_variable("x", int);
        let y = ctx.create_variable("y", int);
        let z = ctx.create_variable("z", int);
        let (rc1, rc2) = (ctx.ref_expr(c1), ctx.ref_expr(c2));
        let (rx, ry, rz) = (ctx.ref_expr(x), ctx.ref_expr(y), ctx.ref_expr(z));

        // Select(c1, Select(c1, x, y), z) --> Select(c1, x, z)
        let inner = TrivialExprBuilder.select(&mut ctx, rc1, rx, ry);
        let folded = f.select(&mut ctx, rc1, inner, rz);
        assert_eq!(ctx.operands(folded), &[rc1, rx, rz]);

        // Select(c1, x, Select(c1, y, z)) --> Select(c1, x, z)
        let inner = TrivialExprBuilder.select(&mut ctx, rc1, ry, rz);
        let folded = f.select(&mut ctx, rc1, rx, inner);
        assert_eq!(ctx.operands(folded), &[rc1, rx, rz]);

        // Select(c1, Select(c2, x, y), x) --> Select(c1 and not c2, y, x)
        let inner = TrivialExprBuilder.select(&mut ctx, rc2, rx, ry);
        let folded = f.select(&mut ctx, rc1, inner, rx);
        let not_c2 = f.not(&mut ctx, rc2);
        let guard = f.and(&mut ctx, vec![rc1, not_c2]);
        assert_eq!(ctx.operands(folded), &[guard, ry, rx]);

        // Select(c1, Select(c2, x, y), y) --> Select(c1 and c2, x, y)
        let folded = f.select(&mut ctx, rc1, inner, ry);
        let guard = f.and(&mut ctx, vec![rc1, rc2]);
        assert_eq!(ctx.operands(folded), &[guard, rx, ry]);

        // Select(c1, x, Select(c2, x, y)) --> Select(c1 or c2, x, y)
        let inner = TrivialExprBuilder.select(&mut ctx, rc2, rx, ry);
        let folded = f.select(&mut ctx, rc1, rx, inner);
        let guard = f.or(&mut ctx, vec![rc1, rc2]);
        assert_eq!(ctx.operands(folded), &[guard, rx, ry]);
    }

    #[test]
    fn test_trivial_builder_preserves_structure() {
        let Fixture { mut ctx, a, .. } = fixture();
        let b = TrivialExprBuilder;
        let not = b.not(&mut ctx, a);
        let not_not = b.not(&mut ctx, not);
        assert_eq!(ctx.op(not_not), Op::Not);
        assert_ne!(not_not, a);

        let t = b.true_expr(&mut ctx);
        let and = b.and(&mut ctx, vec![t, a]);
        assert_eq!(ctx.op(and), Op::And);
    }

    // ------------------------------------------------------------------
    // Folding preserves evaluation

    const BV_BINARY_OPS: [Op; 16] = [
        Op::Add,
        Op::Sub,
        Op::Mul,
        Op::BvSDiv,
        Op::BvUDiv,
        Op::BvSRem,
        Op::BvURem,
        Op::Shl,
        Op::LShr,
        Op::AShr,
        Op::BvAnd,
        Op::BvOr,
        Op::BvXor,
        Op::BvSLt,
        Op::BvULt,
        Op::Eq,
    ];

    fn apply_binary(
        builder: &dyn ExprBuilder,
        ctx: &mut GazerContext,
        op: Op,
        left: ExprRef,
        right: ExprRef,
    ) -> ExprRef {
        match op {
            Op::Add => builder.add(ctx, left, right),
            Op::Sub => builder.sub(ctx, left, right),
            Op::Mul => builder.mul(ctx, left, right),
            Op::BvSDiv => builder.bv_sdiv(ctx, left, right),
            Op::BvUDiv => builder.bv_udiv(ctx, left, right),
            Op::BvSRem => builder.bv_srem(ctx, left, right),
            Op::BvURem => builder.bv_urem(ctx, left, right),
            Op::Shl => builder.shl(ctx, left, right),
            Op::LShr => builder.lshr(ctx, left, right),
            Op::AShr => builder.ashr(ctx, left, right),
            Op::BvAnd => builder.bv_and(ctx, left, right),
            Op::BvOr => builder.bv_or(ctx, left, right),
            Op::BvXor => builder.bv_xor(ctx, left, right),
            Op::BvSLt => builder.bv_slt(ctx, left, right),
            Op::BvULt => builder.bv_ult(ctx, left, right),
            Op::Eq => builder.eq(ctx, left, right),
            _ => unreachable!(),
        }
    }

    proptest! {
        #[test]
        fn prop_bv_folding_preserves_evaluation(a in any::<u8>(), b in any::<u8>()) {
            let model = Valuation::new();
            for op in BV_BINARY_OPS {
                let mut ctx = GazerContext::new();
                let la = FoldingExprBuilder.bv_lit_u64(&mut ctx, 8, a as u64);
                let lb = FoldingExprBuilder.bv_lit_u64(&mut ctx, 8, b as u64);
                let folded = apply_binary(&FoldingExprBuilder, &mut ctx, op, la, lb);
                let plain = apply_binary(&TrivialExprBuilder, &mut ctx, op, la, lb);
                prop_assert_eq!(
                    eval(&ctx, &model, folded),
                    eval(&ctx, &model, plain),
                    "op {:?} over {} and {}", op, a, b
                );
            }
        }

        #[test]
        fn prop_int_folding_preserves_evaluation(a in -100i64..100, b in -100i64..100) {
            let model = Valuation::new();
            for op in [Op::Add, Op::Sub, Op::Mul, Op::Div, Op::Mod, Op::Rem] {
                let mut ctx = GazerContext::new();
                let la = FoldingExprBuilder.int_lit(&mut ctx, a.into());
                let lb = FoldingExprBuilder.int_lit(&mut ctx, b.into());
                let (folded, plain) = match op {
                    Op::Add => (
                        FoldingExprBuilder.add(&mut ctx, la, lb),
                        TrivialExprBuilder.add(&mut ctx, la, lb),
                    ),
                    Op::Sub => (
                        FoldingExprBuilder.sub(&mut ctx, la, lb),
                        TrivialExprBuilder.sub(&mut ctx, la, lb),
                    ),
                    Op::Mul => (
                        FoldingExprBuilder.mul(&mut ctx, la, lb),
                        TrivialExprBuilder.mul(&mut ctx, la, lb),
                    ),
                    Op::Div => (
                        FoldingExprBuilder.div(&mut ctx, la, lb),
                        TrivialExprBuilder.div(&mut ctx, la, lb),
                    ),
                    Op::Mod => (
                        FoldingExprBuilder.modulo(&mut ctx, la, lb),
                        TrivialExprBuilder.modulo(&mut ctx, la, lb),
                    ),
                    Op::Rem => (
                        FoldingExprBuilder.rem(&mut ctx, la, lb),
                        TrivialExprBuilder.rem(&mut ctx, la, lb),
                    ),
                    _ => unreachable!(),
                };
                prop_assert_eq!(eval(&ctx, &model, folded), eval(&ctx, &model, plain));
            }
        }

        #[test]
        fn prop_boolean_rewrites_preserve_evaluation(pv in any::<bool>(), qv in any::<bool>()) {
            let mut ctx = GazerContext::new();
            let f = FoldingExprBuilder;
            let tb = TrivialExprBuilder;
            let bool_ty = ctx.bool_type();
            let p = ctx.create_variable("p", bool_ty);
            let q = ctx.create_variable("q", bool_ty);
            let (rp, rq) = (ctx.ref_expr(p), ctx.ref_expr(q));
            let model: Valuation =
                [(p, Literal::bool(pv)), (q, Literal::bool(qv))].into_iter().collect();

            // A grab bag of shapes that trigger the boolean rewrites.
            let np = tb.not(&mut ctx, rp);
            let shapes = [
                (tb.not(&mut ctx, np), {
                    let x = f.not(&mut ctx, np);
                    x
                }),
                (tb.and(&mut ctx, vec![np, rp]), {
                    let x = f.and(&mut ctx, vec![np, rp]);
                    x
                }),
                (tb.or(&mut ctx, vec![np, rp]), {
                    let x = f.or(&mut ctx, vec![np, rp]);
                    x
                }),
                (tb.xor(&mut ctx, rp, rq), {
                    let x = f.xor(&mut ctx, rp, rq);
                    x
                }),
                (tb.select(&mut ctx, np, rp, rq), {
                    let x = f.select(&mut ctx, np, rp, rq);
                    x
                }),
            ];

            for (plain, folded) in shapes {
                prop_assert_eq!(eval(&ctx, &model, plain), eval(&ctx, &model, folded));
            }
        }
    }
}

