//! Extension points for CFA generation.
//!
//! Collaborators of the front-end (memory models, glue passes) hook into an
//! in-progress automaton through three capability traits over a single
//! generation state: declaring variables, querying them, and contributing
//! generation steps. The front-end hands each collaborator the narrowest
//! view it needs.
//!
//! The state is generic over `V`, the front-end's notion of a source-level
//! value or memory object.

use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;

use gazer_core::{ExprRef, GazerContext, Type, Variable, VariableAssignment};

use crate::cfa::Cfa;

/// Declaring variables for source values at the start of generation.
pub trait VariableDeclPoint<V> {
    fn create_input(&mut self, ctx: &mut GazerContext, val: V, ty: Type, suffix: &str)
        -> Variable;

    /// An input variable that the transformation rules for phi nodes will
    /// handle.
    fn create_phi_input(
        &mut self,
        ctx: &mut GazerContext,
        val: V,
        ty: Type,
        suffix: &str,
    ) -> Variable;

    fn create_local(&mut self, ctx: &mut GazerContext, val: V, ty: Type, suffix: &str)
        -> Variable;

    /// Mark an already declared variable as an output of the automaton.
    fn mark_output(&mut self, val: V, variable: Variable);
}

/// Read-only queries against the variables of the automaton under
/// generation.
pub trait AutomatonQueryPoint<V> {
    fn variable_for(&self, val: &V) -> Option<Variable>;
    fn input_variable_for(&self, val: &V) -> Option<Variable>;
    fn output_variable_for(&self, val: &V) -> Option<Variable>;
}

/// The full generation-step capability: queries plus auxiliary variables,
/// operand resolution, inlining hints and assignment insertion.
pub trait GenerationStepPoint<V>: AutomatonQueryPoint<V> {
    fn create_auxiliary_variable(
        &mut self,
        ctx: &mut GazerContext,
        name: &str,
        ty: Type,
    ) -> Variable;

    /// The expression to use when `val` appears as an operand: its
    /// elimination expression if the value was inlined away, otherwise the
    /// canonical reference of its variable.
    fn as_operand(&self, ctx: &GazerContext, val: &V) -> Option<ExprRef>;

    /// Attempt to inline and eliminate a variable from the automaton.
    /// Returns whether the elimination was recorded; output variables are
    /// never eliminated.
    fn try_to_eliminate(&mut self, val: V, variable: Variable, expr: ExprRef) -> bool;

    fn insert_assignment(&mut self, variable: Variable, value: ExprRef);
}

/// The per-CFA generation state backing the three extension-point traits.
pub struct CfaGenerationState<'cfa, V> {
    cfa: &'cfa mut Cfa,
    values: HashMap<V, Variable>,
    inputs: HashMap<V, Variable>,
    outputs: HashMap<V, Variable>,
    eliminations: HashMap<V, ExprRef>,
    pending: Vec<VariableAssignment>,
}

impl<'cfa, V: Clone + Eq + Hash + Display> CfaGenerationState<'cfa, V> {
    pub fn new(cfa: &'cfa mut Cfa) -> Self {
        Self {
            cfa,
            values: HashMap::new(),
            inputs: HashMap::new(),
            outputs: HashMap::new(),
            eliminations: HashMap::new(),
            pending: Vec::new(),
        }
    }

    pub fn cfa(&self) -> &Cfa {
        self.cfa
    }

    /// Take the assignments accumulated by generation steps, in insertion
    /// order. The front-end drains these onto the edge it is building.
    pub fn drain_assignments(&mut self) -> Vec<VariableAssignment> {
        std::mem::take(&mut self.pending)
    }

    fn scoped_name(val: &V, suffix: &str) -> String {
        if suffix.is_empty() {
            val.to_string()
        } else {
            format!("{}_{}", val, suffix)
        }
    }
}

impl<V: Clone + Eq + Hash + Display> VariableDeclPoint<V> for CfaGenerationState<'_, V> {
    fn create_input(
        &mut self,
        ctx: &mut GazerContext,
        val: V,
        ty: Type,
        suffix: &str,
    ) -> Variable {
        let name = Self::scoped_name(&val, suffix);
        let variable = self.cfa.create_input(ctx, &name, ty);
        self.values.insert(val.clone(), variable);
        self.inputs.insert(val, variable);
        variable
    }

    fn create_phi_input(
        &mut self,
        ctx: &mut GazerContext,
        val: V,
        ty: Type,
        suffix: &str,
    ) -> Variable {
        // Phi inputs share the input scope; the front-end distinguishes them
        // by how it wires the incoming edges.
        self.create_input(ctx, val, ty, suffix)
    }

    fn create_local(
        &mut self,
        ctx: &mut GazerContext,
        val: V,
        ty: Type,
        suffix: &str,
    ) -> Variable {
        let name = Self::scoped_name(&val, suffix);
        let variable = self.cfa.create_local(ctx, &name, ty);
        self.values.insert(val, variable);
        variable
    }

    fn mark_output(&mut self, val: V, variable: Variable) {
        self.cfa.add_output(variable);
        self.outputs.insert(val, variable);
    }
}

impl<V: Clone + Eq + Hash + Display> AutomatonQueryPoint<V> for CfaGenerationState<'_, V> {
    fn variable_for(&self, val: &V) -> Option<Variable> {
        self.values.get(val).copied()
    }

    fn input_variable_for(&self, val: &V) -> Option<Variable> {
        self.inputs.get(val).copied()
    }

    fn output_variable_for(&self, val: &V) -> Option<Variable> {
        self.outputs.get(val).copied()
    }
}

impl<V: Clone + Eq + Hash + Display> GenerationStepPoint<V> for CfaGenerationState<'_, V> {
    fn create_auxiliary_variable(
        &mut self,
        ctx: &mut GazerContext,
        name: &str,
        ty: Type,
    ) -> Variable {
        self.cfa.create_local(ctx, name, ty)
    }

    fn as_operand(&self, ctx: &GazerContext, val: &V) -> Option<ExprRef> {
        if let Some(&expr) = self.eliminations.get(val) {
            return Some(expr);
        }
        self.variable_for(val).map(|v| ctx.ref_expr(v))
    }

    fn try_to_eliminate(&mut self, val: V, variable: Variable, expr: ExprRef) -> bool {
        if self.cfa.is_output(variable) {
            return false;
        }
        self.eliminations.insert(val, expr);
        true
    }

    fn insert_assignment(&mut self, variable: Variable, value: ExprRef) {
        self.pending.push(VariableAssignment::new(variable, value));
    }
}
