//! A system of control flow automata with a distinguished main automaton.

use std::collections::HashMap;

use gazer_core::{ExprRef, GazerContext, VariableAssignment};
use tracing::debug;

use crate::cfa::{CallTransition, Cfa, LocationId, TransitionId};

/// A handle to an automaton within its system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CfaRef(pub(crate) usize);

/// An append-only collection of uniquely named automata. Automata are never
/// removed once created.
#[derive(Debug, Default)]
pub struct AutomataSystem {
    automata: Vec<Cfa>,
    names: HashMap<String, CfaRef>,
    main: Option<CfaRef>,
}

impl AutomataSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new automaton. Duplicate names are a fatal error.
    pub fn create_cfa(&mut self, name: impl Into<String>) -> CfaRef {
        let name = name.into();
        assert!(
            !self.names.contains_key(&name),
            "name collision: an automaton named '{}' already exists",
            name
        );
        let cfa = CfaRef(self.automata.len());
        self.automata.push(Cfa::new(name.clone()));
        self.names.insert(name, cfa);
        cfa
    }

    pub fn cfa(&self, cfa: CfaRef) -> &Cfa {
        &self.automata[cfa.0]
    }

    pub fn cfa_mut(&mut self, cfa: CfaRef) -> &mut Cfa {
        &mut self.automata[cfa.0]
    }

    pub fn get_by_name(&self, name: &str) -> Option<CfaRef> {
        self.names.get(name).copied()
    }

    pub fn main(&self) -> Option<CfaRef> {
        self.main
    }

    pub fn set_main(&mut self, cfa: CfaRef) {
        debug!(main = %self.cfa(cfa).name(), "main automaton set");
        self.main = Some(cfa);
    }

    pub fn num_automata(&self) -> usize {
        self.automata.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CfaRef, &Cfa)> {
        self.automata
            .iter()
            .enumerate()
            .map(|(i, cfa)| (CfaRef(i), cfa))
    }

    /// Create a call edge in `caller`. Input bindings must cover the
    /// callee's inputs positionally with matching types; output bindings
    /// must cover the callee's outputs, each binding a caller variable to
    /// the callee output's canonical reference.
    #[allow(clippy::too_many_arguments)]
    pub fn create_call_transition(
        &mut self,
        ctx: &mut GazerContext,
        caller: CfaRef,
        source: LocationId,
        target: LocationId,
        guard: Option<ExprRef>,
        callee: CfaRef,
        inputs: Vec<VariableAssignment>,
        outputs: Vec<VariableAssignment>,
    ) -> TransitionId {
        // Validate against the callee signature before touching the caller;
        // the callee and caller may be the same automaton.
        {
            let callee_cfa = self.cfa(callee);
            assert!(
                inputs.len() == callee_cfa.num_inputs(),
                "arity mismatch: automaton '{}' takes {} inputs, {} bound",
                callee_cfa.name(),
                callee_cfa.num_inputs(),
                inputs.len()
            );
            for (binding, &input) in inputs.iter().zip(callee_cfa.inputs()) {
                assert!(
                    binding.variable == input,
                    "call input bindings must follow the callee signature order"
                );
                assert!(
                    ctx.variable_type(input) == ctx.expr_type(binding.value),
                    "type mismatch: input '{}' of automaton '{}' is {}, bound to {}",
                    ctx.variable_name(input),
                    callee_cfa.name(),
                    ctx.display_type(ctx.variable_type(input)),
                    ctx.display_type(ctx.expr_type(binding.value))
                );
            }

            assert!(
                outputs.len() == callee_cfa.num_outputs(),
                "arity mismatch: automaton '{}' yields {} outputs, {} bound",
                callee_cfa.name(),
                callee_cfa.num_outputs(),
                outputs.len()
            );
            for (binding, &output) in outputs.iter().zip(callee_cfa.outputs()) {
                assert!(
                    binding.value == ctx.ref_expr(output),
                    "call output bindings must reference the callee outputs in order"
                );
                assert!(
                    ctx.variable_type(binding.variable) == ctx.variable_type(output),
                    "type mismatch: output '{}' of automaton '{}' is {}, received into {}",
                    ctx.variable_name(output),
                    callee_cfa.name(),
                    ctx.display_type(ctx.variable_type(output)),
                    ctx.display_type(ctx.variable_type(binding.variable))
                );
            }
        }

        let call = CallTransition {
            callee,
            inputs,
            outputs,
        };
        self.cfa_mut(caller)
            .insert_call_transition(ctx, source, target, guard, call)
    }
}
