//! The `GazerContext`: owner of every interned type, expression node and
//! variable.
//!
//! Interning is exact: the key of an expression node is its kind, its type
//! and the identities of its operands, so structural equality of live
//! expressions coincides with handle equality.

use std::collections::HashMap;

use crate::expr::{ExprKind, ExprNode, ExprRef, Op};
use crate::literal::Literal;
use crate::types::{DisplayType, FloatVariant, Type, TypeKind};
use crate::variable::{Variable, VariableData};

/// The shared-ownership island for symbolic objects. Single-threaded; all
/// mutation goes through `&mut self`.
pub struct GazerContext {
    types: Vec<TypeKind>,
    type_table: HashMap<TypeKind, Type>,

    exprs: Vec<ExprNode>,
    expr_table: HashMap<ExprNode, ExprRef>,

    variables: Vec<VariableData>,

    bool_ty: Type,
    int_ty: Type,
    real_ty: Type,
    float_tys: [Type; 4],
}

impl GazerContext {
    pub fn new() -> Self {
        let mut ctx = Self {
            types: Vec::new(),
            type_table: HashMap::new(),
            exprs: Vec::new(),
            expr_table: HashMap::new(),
            variables: Vec::new(),
            bool_ty: Type(0),
            int_ty: Type(0),
            real_ty: Type(0),
            float_tys: [Type(0); 4],
        };

        ctx.bool_ty = ctx.get_type(TypeKind::Bool);
        ctx.int_ty = ctx.get_type(TypeKind::Int);
        ctx.real_ty = ctx.get_type(TypeKind::Real);
        ctx.float_tys = [
            ctx.get_type(TypeKind::Float(FloatVariant::Half)),
            ctx.get_type(TypeKind::Float(FloatVariant::Single)),
            ctx.get_type(TypeKind::Float(FloatVariant::Double)),
            ctx.get_type(TypeKind::Float(FloatVariant::Quad)),
        ];
        ctx
    }

    // ------------------------------------------------------------------
    // Types

    fn get_type(&mut self, kind: TypeKind) -> Type {
        if let Some(ty) = self.type_table.get(&kind) {
            return *ty;
        }
        let ty = Type(self.types.len() as u32);
        self.types.push(kind.clone());
        self.type_table.insert(kind, ty);
        ty
    }

    pub fn bool_type(&self) -> Type {
        self.bool_ty
    }

    pub fn int_type(&self) -> Type {
        self.int_ty
    }

    pub fn real_type(&self) -> Type {
        self.real_ty
    }

    pub fn float_type(&self, variant: FloatVariant) -> Type {
        self.float_tys[match variant {
            FloatVariant::Half => 0,
            FloatVariant::Single => 1,
            FloatVariant::Double => 2,
            FloatVariant::Quad => 3,
        }]
    }

    pub fn bv_type(&mut self, width: u32) -> Type {
        assert!(width >= 1, "bitvector width must be at least 1");
        self.get_type(TypeKind::Bv(width))
    }

    pub fn array_type(&mut self, index: Type, element: Type) -> Type {
        self.get_type(TypeKind::Array { index, element })
    }

    pub fn type_kind(&self, ty: Type) -> &TypeKind {
        &self.types[ty.0 as usize]
    }

    /// The width of a bitvector type. Panics on non-Bv types.
    pub fn bv_width(&self, ty: Type) -> u32 {
        match self.type_kind(ty) {
            TypeKind::Bv(width) => *width,
            other => panic!("expected a bitvector type, found {:?}", other),
        }
    }

    pub fn float_variant(&self, ty: Type) -> FloatVariant {
        match self.type_kind(ty) {
            TypeKind::Float(variant) => *variant,
            other => panic!("expected a float type, found {:?}", other),
        }
    }

    /// The `(index, element)` component types of an array type. Panics on
    /// non-array types.
    pub fn array_component_types(&self, ty: Type) -> (Type, Type) {
        match self.type_kind(ty) {
            TypeKind::Array { index, element } => (*index, *element),
            other => panic!("expected an array type, found {:?}", other),
        }
    }

    pub fn display_type(&self, ty: Type) -> DisplayType<'_> {
        DisplayType { ctx: self, ty }
    }

    // ------------------------------------------------------------------
    // Variables

    /// Allocate a fresh variable and its canonical `VarRef` leaf node.
    /// Identity is unique; scoping and name uniqueness are the caller's
    /// concern.
    pub fn create_variable(&mut self, name: impl Into<String>, ty: Type) -> Variable {
        let variable = Variable(self.variables.len() as u32);
        // Placeholder until the ref node exists; patched right below.
        self.variables.push(VariableData {
            name: name.into(),
            ty,
            ref_expr: ExprRef(u32::MAX),
        });
        let ref_expr = self.intern_node(ExprNode {
            kind: ExprKind::VarRef(variable),
            ty,
            operands: Default::default(),
        });
        self.variables[variable.0 as usize].ref_expr = ref_expr;
        variable
    }

    pub fn variable_name(&self, variable: Variable) -> &str {
        &self.variables[variable.0 as usize].name
    }

    pub fn variable_type(&self, variable: Variable) -> Type {
        self.variables[variable.0 as usize].ty
    }

    /// The canonical reference expression of a variable; the same node for
    /// every use.
    pub fn ref_expr(&self, variable: Variable) -> ExprRef {
        self.variables[variable.0 as usize].ref_expr
    }

    // ------------------------------------------------------------------
    // Expressions

    fn intern_node(&mut self, node: ExprNode) -> ExprRef {
        if let Some(expr) = self.expr_table.get(&node) {
            return *expr;
        }
        let expr = ExprRef(self.exprs.len() as u32);
        self.exprs.push(node.clone());
        self.expr_table.insert(node, expr);
        expr
    }

    /// Intern an expression node. This is the only allocator for non-leaf
    /// expressions. Panics if the operand arity or typing violates the
    /// kind's contract (these are programmer errors, per the error policy).
    pub fn intern_expr(&mut self, kind: ExprKind, ty: Type, operands: &[ExprRef]) -> ExprRef {
        self.check_expr(&kind, ty, operands);
        self.intern_node(ExprNode {
            kind,
            ty,
            operands: operands.iter().copied().collect(),
        })
    }

    /// Intern a literal leaf node.
    pub fn literal_expr(&mut self, literal: Literal) -> ExprRef {
        let ty = self.literal_type(&literal);
        self.intern_node(ExprNode {
            kind: ExprKind::Literal(literal),
            ty,
            operands: Default::default(),
        })
    }

    /// Intern an `Undef` leaf of the given type.
    pub fn undef_expr(&mut self, ty: Type) -> ExprRef {
        self.intern_node(ExprNode {
            kind: ExprKind::Undef,
            ty,
            operands: Default::default(),
        })
    }

    /// The interned type a literal inhabits.
    pub fn literal_type(&mut self, literal: &Literal) -> Type {
        match literal {
            Literal::Bool(_) => self.bool_ty,
            Literal::Int(_) => self.int_ty,
            Literal::Bv(bv) => self.bv_type(bv.width()),
            Literal::Float(fp) => self.float_type(fp.variant()),
            Literal::Real(_) => self.real_ty,
        }
    }

    pub fn expr(&self, expr: ExprRef) -> &ExprNode {
        &self.exprs[expr.0 as usize]
    }

    pub fn expr_type(&self, expr: ExprRef) -> Type {
        self.expr(expr).ty
    }

    pub fn operands(&self, expr: ExprRef) -> &[ExprRef] {
        &self.expr(expr).operands
    }

    pub fn op(&self, expr: ExprRef) -> Op {
        self.expr(expr).op()
    }

    pub fn as_literal(&self, expr: ExprRef) -> Option<&Literal> {
        match &self.expr(expr).kind {
            ExprKind::Literal(literal) => Some(literal),
            _ => None,
        }
    }

    pub fn as_bool_lit(&self, expr: ExprRef) -> Option<bool> {
        self.as_literal(expr).and_then(Literal::as_bool)
    }

    pub fn as_variable(&self, expr: ExprRef) -> Option<Variable> {
        match self.expr(expr).kind {
            ExprKind::VarRef(variable) => Some(variable),
            _ => None,
        }
    }

    pub fn num_exprs(&self) -> usize {
        self.exprs.len()
    }

    // ------------------------------------------------------------------
    // Kind contracts

    fn expect_arity(&self, kind: &ExprKind, operands: &[ExprRef], arity: usize) {
        assert!(
            operands.len() == arity,
            "arity mismatch: {:?} takes {} operands, got {}",
            kind.op(),
            arity,
            operands.len()
        );
    }

    fn expect_operand_type(&self, kind: &ExprKind, operand: ExprRef, ty: Type) {
        assert!(
            self.expr_type(operand) == ty,
            "type mismatch: {:?} operand has type {}, expected {}",
            kind.op(),
            self.display_type(self.expr_type(operand)),
            self.display_type(ty)
        );
    }

    fn expect_result_type(&self, kind: &ExprKind, ty: Type, expected: Type) {
        assert!(
            ty == expected,
            "type mismatch: {:?} produces {}, got {}",
            kind.op(),
            self.display_type(expected),
            self.display_type(ty)
        );
    }

    fn check_expr(&self, kind: &ExprKind, ty: Type, ops: &[ExprRef]) {
        use ExprKind::*;

        match kind {
            VarRef(variable) => {
                self.expect_arity(kind, ops, 0);
                self.expect_result_type(kind, ty, self.variable_type(*variable));
            }
            Undef => self.expect_arity(kind, ops, 0),
            Literal(literal) => {
                self.expect_arity(kind, ops, 0);
                assert!(
                    literal.matches_type(self, ty),
                    "type mismatch: literal {} does not inhabit {}",
                    literal,
                    self.display_type(ty)
                );
            }

            ZExt | SExt => {
                self.expect_arity(kind, ops, 1);
                let from = self.bv_width(self.expr_type(ops[0]));
                let to = self.bv_width(ty);
                assert!(
                    from < to,
                    "type mismatch: {:?} from Bv{} must widen, target is Bv{}",
                    kind.op(),
                    from,
                    to
                );
            }
            Extract { offset, width } => {
                self.expect_arity(kind, ops, 1);
                assert!(*width >= 1, "extract width must be at least 1");
                let from = self.bv_width(self.expr_type(ops[0]));
                assert!(
                    offset + width <= from,
                    "extract range [{}, {}) out of bounds for Bv{}",
                    offset,
                    offset + width,
                    from
                );
                assert!(
                    self.bv_width(ty) == *width,
                    "type mismatch: extract of {} bits must produce Bv{}",
                    width,
                    width
                );
            }

            Add | Sub | Mul => {
                self.expect_arity(kind, ops, 2);
                assert!(
                    self.type_kind(ty).is_int() || self.type_kind(ty).is_bv(),
                    "type mismatch: {:?} is defined over Int and Bv only",
                    kind.op()
                );
                self.expect_operand_type(kind, ops[0], ty);
                self.expect_operand_type(kind, ops[1], ty);
            }
            Div | Mod | Rem => {
                self.expect_arity(kind, ops, 2);
                self.expect_result_type(kind, ty, self.int_ty);
                self.expect_operand_type(kind, ops[0], self.int_ty);
                self.expect_operand_type(kind, ops[1], self.int_ty);
            }
            BvSDiv | BvUDiv | BvSRem | BvURem | Shl | LShr | AShr | BvAnd | BvOr | BvXor => {
                self.expect_arity(kind, ops, 2);
                assert!(
                    self.type_kind(ty).is_bv(),
                    "type mismatch: {:?} is defined over Bv only",
                    kind.op()
                );
                self.expect_operand_type(kind, ops[0], ty);
                self.expect_operand_type(kind, ops[1], ty);
            }

            Not => {
                self.expect_arity(kind, ops, 1);
                self.expect_result_type(kind, ty, self.bool_ty);
                self.expect_operand_type(kind, ops[0], self.bool_ty);
            }
            And | Or => {
                assert!(
                    ops.len() >= 2,
                    "arity mismatch: {:?} requires at least two operands, got {}",
                    kind.op(),
                    ops.len()
                );
                self.expect_result_type(kind, ty, self.bool_ty);
                for &op in ops {
                    self.expect_operand_type(kind, op, self.bool_ty);
                }
            }
            Xor | Imply => {
                self.expect_arity(kind, ops, 2);
                self.expect_result_type(kind, ty, self.bool_ty);
                self.expect_operand_type(kind, ops[0], self.bool_ty);
                self.expect_operand_type(kind, ops[1], self.bool_ty);
            }

            Eq | NotEq => {
                self.expect_arity(kind, ops, 2);
                self.expect_result_type(kind, ty, self.bool_ty);
                self.expect_operand_type(kind, ops[1], self.expr_type(ops[0]));
            }
            Lt | LtEq | Gt | GtEq => {
                self.expect_arity(kind, ops, 2);
                self.expect_result_type(kind, ty, self.bool_ty);
                self.expect_operand_type(kind, ops[0], self.int_ty);
                self.expect_operand_type(kind, ops[1], self.int_ty);
            }
            BvSLt | BvSLtEq | BvSGt | BvSGtEq | BvULt | BvULtEq | BvUGt | BvUGtEq => {
                self.expect_arity(kind, ops, 2);
                self.expect_result_type(kind, ty, self.bool_ty);
                assert!(
                    self.type_kind(self.expr_type(ops[0])).is_bv(),
                    "type mismatch: {:?} compares bitvectors",
                    kind.op()
                );
                self.expect_operand_type(kind, ops[1], self.expr_type(ops[0]));
            }
            FEq | FGt | FGtEq | FLt | FLtEq => {
                self.expect_arity(kind, ops, 2);
                self.expect_result_type(kind, ty, self.bool_ty);
                assert!(
                    self.type_kind(self.expr_type(ops[0])).is_float(),
                    "type mismatch: {:?} compares floats",
                    kind.op()
                );
                self.expect_operand_type(kind, ops[1], self.expr_type(ops[0]));
            }

            FAdd(_) | FSub(_) | FMul(_) | FDiv(_) => {
                self.expect_arity(kind, ops, 2);
                assert!(
                    self.type_kind(ty).is_float(),
                    "type mismatch: {:?} is defined over floats only",
                    kind.op()
                );
                self.expect_operand_type(kind, ops[0], ty);
                self.expect_operand_type(kind, ops[1], ty);
            }
            FIsNan | FIsInf => {
                self.expect_arity(kind, ops, 1);
                self.expect_result_type(kind, ty, self.bool_ty);
                assert!(
                    self.type_kind(self.expr_type(ops[0])).is_float(),
                    "type mismatch: {:?} queries a float",
                    kind.op()
                );
            }
            FCast(_) => {
                self.expect_arity(kind, ops, 1);
                assert!(
                    self.type_kind(self.expr_type(ops[0])).is_float()
                        && self.type_kind(ty).is_float(),
                    "type mismatch: fcast converts between float types"
                );
            }
            SignedToFp(_) | UnsignedToFp(_) => {
                self.expect_arity(kind, ops, 1);
                assert!(
                    self.type_kind(self.expr_type(ops[0])).is_bv()
                        && self.type_kind(ty).is_float(),
                    "type mismatch: {:?} converts a bitvector to a float",
                    kind.op()
                );
            }
            FpToSigned(_) | FpToUnsigned(_) => {
                self.expect_arity(kind, ops, 1);
                assert!(
                    self.type_kind(self.expr_type(ops[0])).is_float()
                        && self.type_kind(ty).is_bv(),
                    "type mismatch: {:?} converts a float to a bitvector",
                    kind.op()
                );
            }

            Select => {
                self.expect_arity(kind, ops, 3);
                self.expect_operand_type(kind, ops[0], self.bool_ty);
                self.expect_operand_type(kind, ops[1], ty);
                self.expect_operand_type(kind, ops[2], ty);
            }
            ArrayRead => {
                self.expect_arity(kind, ops, 2);
                let (index, element) = self.array_components(ops[0]);
                self.expect_operand_type(kind, ops[1], index);
                self.expect_result_type(kind, ty, element);
            }
            ArrayWrite => {
                self.expect_arity(kind, ops, 3);
                let (index, element) = self.array_components(ops[0]);
                self.expect_operand_type(kind, ops[1], index);
                self.expect_operand_type(kind, ops[2], element);
                self.expect_result_type(kind, ty, self.expr_type(ops[0]));
            }
        }
    }

    fn array_components(&self, array: ExprRef) -> (Type, Type) {
        match self.type_kind(self.expr_type(array)) {
            TypeKind::Array { index, element } => (*index, *element),
            other => panic!("type mismatch: expected an array operand, found {:?}", other),
        }
    }
}

impl Default for GazerContext {
    fn default() -> Self {
        Self::new()
    }
}
