//! Structural pattern matching over expression nodes.
//!
//! Patterns are small combinator values with capture slots. Bindings are
//! collected while matching and committed to their slots only when the whole
//! pattern succeeds, so a failed match never touches a slot.
//!
//! ```
//! # use gazer_core::{GazerContext, ExprKind, Literal};
//! # use gazer_core::matcher::*;
//! let mut ctx = GazerContext::new();
//! let int = ctx.int_type();
//! let a = ctx.create_variable("a", int);
//! let ra = ctx.ref_expr(a);
//! let bool_ty = ctx.bool_type();
//! let e = ctx.intern_expr(ExprKind::Eq, bool_ty, &[ra, ra]);
//!
//! let lhs = ExprSlot::new();
//! let rhs = ExprSlot::new();
//! assert!(match_expr(&ctx, e, &m_eq(m_expr(&lhs), m_expr(&rhs))));
//! assert_eq!(lhs.get(), ra);
//! ```

use std::cell::{Cell, RefCell};

use num_bigint::BigInt;

use crate::expr::{ExprKind, ExprRef, Op};
use crate::literal::{BvValue, Literal};
use crate::GazerContext;

/// A capture slot for an expression handle.
#[derive(Default)]
pub struct ExprSlot {
    value: Cell<Option<ExprRef>>,
}

impl ExprSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// The captured expression. Panics if the owning match did not succeed.
    pub fn get(&self) -> ExprRef {
        self.value.get().expect("slot read before a successful match")
    }

    pub fn try_get(&self) -> Option<ExprRef> {
        self.value.get()
    }
}

/// A capture slot for a boolean literal.
#[derive(Default)]
pub struct BoolSlot {
    value: Cell<Option<bool>>,
}

impl BoolSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> bool {
        self.value.get().expect("slot read before a successful match")
    }
}

/// A capture slot for an integer literal value.
#[derive(Default)]
pub struct IntSlot {
    value: RefCell<Option<BigInt>>,
}

impl IntSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> BigInt {
        self.value
            .borrow()
            .clone()
            .expect("slot read before a successful match")
    }
}

/// A capture slot for a bitvector literal value.
#[derive(Default)]
pub struct BvSlot {
    value: RefCell<Option<BvValue>>,
}

impl BvSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> BvValue {
        self.value
            .borrow()
            .clone()
            .expect("slot read before a successful match")
    }
}

enum Pending<'a> {
    Expr(&'a ExprSlot, ExprRef),
    Bool(&'a BoolSlot, bool),
    Int(&'a IntSlot, BigInt),
    Bv(&'a BvSlot, BvValue),
}

/// A structural pattern over expression nodes.
pub enum Pat<'a> {
    /// Matches anything without binding.
    Any,
    /// Matches anything, binding the node.
    Bind(&'a ExprSlot),
    /// Matches exactly the given node identity.
    Specific(ExprRef),
    /// Matches the node previously bound to the slot, including bindings
    /// made earlier within the same (not yet committed) match.
    Same(&'a ExprSlot),
    /// Matches a boolean literal, binding its value.
    BoolLit(&'a BoolSlot),
    /// Matches an integer literal, binding its value.
    IntLit(&'a IntSlot),
    /// Matches a bitvector literal, binding its value.
    BvLit(&'a BvSlot),
    /// Matches an operation tag with exactly the given children.
    Op(Op, Vec<Pat<'a>>),
}

impl<'a> Pat<'a> {
    fn matches(
        &self,
        ctx: &GazerContext,
        expr: ExprRef,
        pending: &mut Vec<Pending<'a>>,
    ) -> bool {
        match self {
            Pat::Any => true,
            Pat::Bind(slot) => {
                pending.push(Pending::Expr(*slot, expr));
                true
            }
            Pat::Specific(target) => expr == *target,
            Pat::Same(slot) => {
                // Prefer the in-flight binding over a committed one.
                let bound = pending
                    .iter()
                    .rev()
                    .find_map(|p| match p {
                        Pending::Expr(s, e) if std::ptr::eq(*s, *slot) => Some(*e),
                        _ => None,
                    })
                    .or_else(|| slot.try_get());
                bound == Some(expr)
            }
            Pat::BoolLit(slot) => match ctx.as_literal(expr) {
                Some(Literal::Bool(b)) => {
                    pending.push(Pending::Bool(*slot, *b));
                    true
                }
                _ => false,
            },
            Pat::IntLit(slot) => match ctx.as_literal(expr) {
                Some(Literal::Int(n)) => {
                    pending.push(Pending::Int(*slot, n.clone()));
                    true
                }
                _ => false,
            },
            Pat::BvLit(slot) => match ctx.as_literal(expr) {
                Some(Literal::Bv(bv)) => {
                    pending.push(Pending::Bv(*slot, bv.clone()));
                    true
                }
                _ => false,
            },
            Pat::Op(op, children) => {
                let node = ctx.expr(expr);
                if node.op() != *op || node.operands.len() != children.len() {
                    return false;
                }
                let operands = node.operands.clone();
                children
                    .iter()
                    .zip(operands.iter())
                    .all(|(pat, &child)| pat.matches(ctx, child, pending))
            }
        }
    }
}

fn commit(pending: Vec<Pending<'_>>) {
    for binding in pending {
        match binding {
            Pending::Expr(slot, e) => slot.value.set(Some(e)),
            Pending::Bool(slot, b) => slot.value.set(Some(b)),
            Pending::Int(slot, n) => *slot.value.borrow_mut() = Some(n),
            Pending::Bv(slot, bv) => *slot.value.borrow_mut() = Some(bv),
        }
    }
}

/// Match a single expression against a pattern, committing captures on
/// success.
pub fn match_expr(ctx: &GazerContext, expr: ExprRef, pattern: &Pat<'_>) -> bool {
    let mut pending = Vec::new();
    if pattern.matches(ctx, expr, &mut pending) {
        commit(pending);
        true
    } else {
        false
    }
}

/// Match three expressions against three patterns as a unit (used for the
/// ternary select rewrites).
pub fn match3(
    ctx: &GazerContext,
    e1: ExprRef,
    p1: &Pat<'_>,
    e2: ExprRef,
    p2: &Pat<'_>,
    e3: ExprRef,
    p3: &Pat<'_>,
) -> bool {
    let mut pending = Vec::new();
    if p1.matches(ctx, e1, &mut pending)
        && p2.matches(ctx, e2, &mut pending)
        && p3.matches(ctx, e3, &mut pending)
    {
        commit(pending);
        true
    } else {
        false
    }
}

/// Match a binary input either as `(pl, pr)` or as `(pr, pl)`. The commutative
/// rewrites of the folding builder are built on this.
pub fn unord_match(
    ctx: &GazerContext,
    lhs: ExprRef,
    rhs: ExprRef,
    pl: &Pat<'_>,
    pr: &Pat<'_>,
) -> bool {
    let mut pending = Vec::new();
    if pl.matches(ctx, lhs, &mut pending) && pr.matches(ctx, rhs, &mut pending) {
        commit(pending);
        return true;
    }
    pending.clear();
    if pl.matches(ctx, rhs, &mut pending) && pr.matches(ctx, lhs, &mut pending) {
        commit(pending);
        return true;
    }
    false
}

// ----------------------------------------------------------------------
// Combinator constructors

pub fn m_any<'a>() -> Pat<'a> {
    Pat::Any
}

pub fn m_expr(slot: &ExprSlot) -> Pat<'_> {
    Pat::Bind(slot)
}

pub fn m_specific<'a>(expr: ExprRef) -> Pat<'a> {
    Pat::Specific(expr)
}

/// Matches the node already bound to `slot` earlier in the same pattern.
pub fn m_same(slot: &ExprSlot) -> Pat<'_> {
    Pat::Same(slot)
}

pub fn m_bool_lit(slot: &BoolSlot) -> Pat<'_> {
    Pat::BoolLit(slot)
}

pub fn m_int_lit(slot: &IntSlot) -> Pat<'_> {
    Pat::IntLit(slot)
}

pub fn m_bv_lit(slot: &BvSlot) -> Pat<'_> {
    Pat::BvLit(slot)
}

pub fn m_op(op: Op, children: Vec<Pat<'_>>) -> Pat<'_> {
    Pat::Op(op, children)
}

macro_rules! unary_matcher {
    ($(#[$meta:meta])* $name:ident, $op:expr) => {
        $(#[$meta])*
        pub fn $name<'a>(operand: Pat<'a>) -> Pat<'a> {
            Pat::Op($op, vec![operand])
        }
    };
}

macro_rules! binary_matcher {
    ($(#[$meta:meta])* $name:ident, $op:expr) => {
        $(#[$meta])*
        pub fn $name<'a>(lhs: Pat<'a>, rhs: Pat<'a>) -> Pat<'a> {
            Pat::Op($op, vec![lhs, rhs])
        }
    };
}

unary_matcher!(m_not, Op::Not);
unary_matcher!(m_zext, Op::ZExt);
unary_matcher!(m_sext, Op::SExt);

binary_matcher!(m_eq, Op::Eq);
binary_matcher!(m_not_eq, Op::NotEq);
binary_matcher!(m_add, Op::Add);
binary_matcher!(m_sub, Op::Sub);
binary_matcher!(m_mul, Op::Mul);
binary_matcher!(m_xor, Op::Xor);
binary_matcher!(m_imply, Op::Imply);
binary_matcher!(m_lt, Op::Lt);
binary_matcher!(m_lt_eq, Op::LtEq);
binary_matcher!(m_gt, Op::Gt);
binary_matcher!(m_gt_eq, Op::GtEq);
binary_matcher!(m_bv_slt, Op::BvSLt);
binary_matcher!(m_bv_ult, Op::BvULt);
binary_matcher!(m_bv_srem, Op::BvSRem);
binary_matcher!(m_bv_urem, Op::BvURem);
binary_matcher!(
    /// Matches a binary (two-operand) `And`.
    m_and,
    Op::And
);
binary_matcher!(
    /// Matches a binary (two-operand) `Or`.
    m_or,
    Op::Or
);

pub fn m_select<'a>(cond: Pat<'a>, then: Pat<'a>, elze: Pat<'a>) -> Pat<'a> {
    Pat::Op(Op::Select, vec![cond, then, elze])
}

pub fn m_array_read<'a>(array: Pat<'a>, index: Pat<'a>) -> Pat<'a> {
    Pat::Op(Op::ArrayRead, vec![array, index])
}
