//! Variables and variable assignments.

use crate::expr::ExprRef;
use crate::types::Type;

/// A handle to a context-owned variable. Identity (the handle value) is
/// unique within the owning context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable(pub(crate) u32);

/// The context-owned payload of a variable: its name, its type, and the
/// canonical `VarRef` leaf node shared by every use of the variable.
#[derive(Debug, Clone)]
pub struct VariableData {
    pub(crate) name: String,
    pub(crate) ty: Type,
    pub(crate) ref_expr: ExprRef,
}

/// An ordered `variable := value` pair, as carried by assign transitions and
/// call argument bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableAssignment {
    pub variable: Variable,
    pub value: ExprRef,
}

impl VariableAssignment {
    pub fn new(variable: Variable, value: ExprRef) -> Self {
        Self { variable, value }
    }
}
