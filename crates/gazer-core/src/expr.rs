//! Expression DAG nodes.
//!
//! Every expression is a [`GazerContext`](crate::GazerContext)-owned node
//! with a kind tag, an interned type and a (possibly empty) operand list.
//! Nodes are hash-consed: two nodes with the same kind, type and operand
//! identities are the same [`ExprRef`].

use smallvec::SmallVec;
use std::fmt;

use crate::literal::Literal;
use crate::types::Type;
use crate::variable::Variable;

/// A handle to an interned expression node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprRef(pub(crate) u32);

/// IEEE-754 rounding modes carried by floating-point operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoundingMode {
    NearestTiesToEven,
    NearestTiesToAway,
    TowardPositive,
    TowardNegative,
    TowardZero,
}

/// The kind tag of an expression node, including per-kind payloads
/// (literals, variable identity, extract bounds, rounding modes).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExprKind {
    // Leaves.
    VarRef(Variable),
    Undef,
    Literal(Literal),

    // Bitvector casts.
    ZExt,
    SExt,
    Extract { offset: u32, width: u32 },

    // Arithmetic, polymorphic over Int and Bv.
    Add,
    Sub,
    Mul,

    // Int-only arithmetic.
    Div,
    Mod,
    Rem,

    // Bv-only arithmetic.
    BvSDiv,
    BvUDiv,
    BvSRem,
    BvURem,
    Shl,
    LShr,
    AShr,
    BvAnd,
    BvOr,
    BvXor,

    // Boolean connectives. `And` and `Or` are variadic.
    Not,
    And,
    Or,
    Xor,
    Imply,

    // Comparisons; all of these produce Bool.
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    BvSLt,
    BvSLtEq,
    BvSGt,
    BvSGtEq,
    BvULt,
    BvULtEq,
    BvUGt,
    BvUGtEq,
    FEq,
    FGt,
    FGtEq,
    FLt,
    FLtEq,

    // Floating-point arithmetic, queries and conversions.
    FAdd(RoundingMode),
    FSub(RoundingMode),
    FMul(RoundingMode),
    FDiv(RoundingMode),
    FIsNan,
    FIsInf,
    FCast(RoundingMode),
    SignedToFp(RoundingMode),
    UnsignedToFp(RoundingMode),
    FpToSigned(RoundingMode),
    FpToUnsigned(RoundingMode),

    // Ternary and arrays.
    Select,
    ArrayRead,
    ArrayWrite,
}

/// The field-less operation tag: one variant per [`ExprKind`], with all
/// payloads stripped. Used by the pattern matcher and for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    VarRef,
    Undef,
    Literal,
    ZExt,
    SExt,
    Extract,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Rem,
    BvSDiv,
    BvUDiv,
    BvSRem,
    BvURem,
    Shl,
    LShr,
    AShr,
    BvAnd,
    BvOr,
    BvXor,
    Not,
    And,
    Or,
    Xor,
    Imply,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    BvSLt,
    BvSLtEq,
    BvSGt,
    BvSGtEq,
    BvULt,
    BvULtEq,
    BvUGt,
    BvUGtEq,
    FEq,
    FGt,
    FGtEq,
    FLt,
    FLtEq,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FIsNan,
    FIsInf,
    FCast,
    SignedToFp,
    UnsignedToFp,
    FpToSigned,
    FpToUnsigned,
    Select,
    ArrayRead,
    ArrayWrite,
}

impl ExprKind {
    /// The operation tag of this kind.
    pub fn op(&self) -> Op {
        match self {
            ExprKind::VarRef(_) => Op::VarRef,
            ExprKind::Undef => Op::Undef,
            ExprKind::Literal(_) => Op::Literal,
            ExprKind::ZExt => Op::ZExt,
            ExprKind::SExt => Op::SExt,
            ExprKind::Extract { .. } => Op::Extract,
            ExprKind::Add => Op::Add,
            ExprKind::Sub => Op::Sub,
            ExprKind::Mul => Op::Mul,
            ExprKind::Div => Op::Div,
            ExprKind::Mod => Op::Mod,
            ExprKind::Rem => Op::Rem,
            ExprKind::BvSDiv => Op::BvSDiv,
            ExprKind::BvUDiv => Op::BvUDiv,
            ExprKind::BvSRem => Op::BvSRem,
            ExprKind::BvURem => Op::BvURem,
            ExprKind::Shl => Op::Shl,
            ExprKind::LShr => Op::LShr,
            ExprKind::AShr => Op::AShr,
            ExprKind::BvAnd => Op::BvAnd,
            ExprKind::BvOr => Op::BvOr,
            ExprKind::BvXor => Op::BvXor,
            ExprKind::Not => Op::Not,
            ExprKind::And => Op::And,
            ExprKind::Or => Op::Or,
            ExprKind::Xor => Op::Xor,
            ExprKind::Imply => Op::Imply,
            ExprKind::Eq => Op::Eq,
            ExprKind::NotEq => Op::NotEq,
            ExprKind::Lt => Op::Lt,
            ExprKind::LtEq => Op::LtEq,
            ExprKind::Gt => Op::Gt,
            ExprKind::GtEq => Op::GtEq,
            ExprKind::BvSLt => Op::BvSLt,
            ExprKind::BvSLtEq => Op::BvSLtEq,
            ExprKind::BvSGt => Op::BvSGt,
            ExprKind::BvSGtEq => Op::BvSGtEq,
            ExprKind::BvULt => Op::BvULt,
            ExprKind::BvULtEq => Op::BvULtEq,
            ExprKind::BvUGt => Op::BvUGt,
            ExprKind::BvUGtEq => Op::BvUGtEq,
            ExprKind::FEq => Op::FEq,
            ExprKind::FGt => Op::FGt,
            ExprKind::FGtEq => Op::FGtEq,
            ExprKind::FLt => Op::FLt,
            ExprKind::FLtEq => Op::FLtEq,
            ExprKind::FAdd(_) => Op::FAdd,
            ExprKind::FSub(_) => Op::FSub,
            ExprKind::FMul(_) => Op::FMul,
            ExprKind::FDiv(_) => Op::FDiv,
            ExprKind::FIsNan => Op::FIsNan,
            ExprKind::FIsInf => Op::FIsInf,
            ExprKind::FCast(_) => Op::FCast,
            ExprKind::SignedToFp(_) => Op::SignedToFp,
            ExprKind::UnsignedToFp(_) => Op::UnsignedToFp,
            ExprKind::FpToSigned(_) => Op::FpToSigned,
            ExprKind::FpToUnsigned(_) => Op::FpToUnsigned,
            ExprKind::Select => Op::Select,
            ExprKind::ArrayRead => Op::ArrayRead,
            ExprKind::ArrayWrite => Op::ArrayWrite,
        }
    }
}

impl Op {
    /// Lower-case mnemonic, used by the S-expression dump.
    pub fn name(self) -> &'static str {
        match self {
            Op::VarRef => "var",
            Op::Undef => "undef",
            Op::Literal => "lit",
            Op::ZExt => "zext",
            Op::SExt => "sext",
            Op::Extract => "extract",
            Op::Add => "add",
            Op::Sub => "sub",
            Op::Mul => "mul",
            Op::Div => "div",
            Op::Mod => "mod",
            Op::Rem => "rem",
            Op::BvSDiv => "bvsdiv",
            Op::BvUDiv => "bvudiv",
            Op::BvSRem => "bvsrem",
            Op::BvURem => "bvurem",
            Op::Shl => "shl",
            Op::LShr => "lshr",
            Op::AShr => "ashr",
            Op::BvAnd => "bvand",
            Op::BvOr => "bvor",
            Op::BvXor => "bvxor",
            Op::Not => "not",
            Op::And => "and",
            Op::Or => "or",
            Op::Xor => "xor",
            Op::Imply => "imply",
            Op::Eq => "eq",
            Op::NotEq => "ne",
            Op::Lt => "lt",
            Op::LtEq => "le",
            Op::Gt => "gt",
            Op::GtEq => "ge",
            Op::BvSLt => "bvslt",
            Op::BvSLtEq => "bvsle",
            Op::BvSGt => "bvsgt",
            Op::BvSGtEq => "bvsge",
            Op::BvULt => "bvult",
            Op::BvULtEq => "bvule",
            Op::BvUGt => "bvugt",
            Op::BvUGtEq => "bvuge",
            Op::FEq => "feq",
            Op::FGt => "fgt",
            Op::FGtEq => "fge",
            Op::FLt => "flt",
            Op::FLtEq => "fle",
            Op::FAdd => "fadd",
            Op::FSub => "fsub",
            Op::FMul => "fmul",
            Op::FDiv => "fdiv",
            Op::FIsNan => "fisnan",
            Op::FIsInf => "fisinf",
            Op::FCast => "fcast",
            Op::SignedToFp => "stofp",
            Op::UnsignedToFp => "utofp",
            Op::FpToSigned => "fptos",
            Op::FpToUnsigned => "fptou",
            Op::Select => "select",
            Op::ArrayRead => "read",
            Op::ArrayWrite => "write",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// An interned expression node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExprNode {
    pub kind: ExprKind,
    pub ty: Type,
    pub operands: SmallVec<[ExprRef; 2]>,
}

impl ExprNode {
    pub fn op(&self) -> Op {
        self.kind.op()
    }

    pub fn num_operands(&self) -> usize {
        self.operands.len()
    }
}
