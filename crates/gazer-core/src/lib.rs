//! The symbolic core: a hash-consed, strongly-typed expression DAG with
//! literals, variables and valuations, structural pattern matching, folding
//! expression builders, and an evaluator.
//!
//! All long-lived objects are owned by a [`GazerContext`]: types,
//! expression nodes and variables are interned there and referenced through
//! copyable handles, so handle equality is structural equality.

pub mod builder;
pub mod context;
pub mod eval;
pub mod expr;
pub mod literal;
pub mod matcher;
pub mod print;
pub mod types;
pub mod valuation;
pub mod variable;

pub use builder::{ExprBuilder, FoldingExprBuilder, TrivialExprBuilder};
pub use context::GazerContext;
pub use eval::{eval, EvalError, EvalResult};
pub use expr::{ExprKind, ExprNode, ExprRef, Op, RoundingMode};
pub use literal::{BvValue, FloatValue, Literal};
pub use types::{FloatVariant, Type, TypeKind};
pub use valuation::Valuation;
pub use variable::{Variable, VariableAssignment};
