//! The counterexample walker.

use std::collections::HashMap;

use num_bigint::BigInt;
use num_traits::ToPrimitive;
use thiserror::Error;
use tracing::{debug, info};

use gazer_automaton::{Cfa, LocationId, TransitionId};
use gazer_core::{eval, ExprRef, GazerContext, Literal, Type, Valuation, Variable};

/// Trace reconstruction error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceError {
    #[error("predecessor expression of location {location} did not evaluate to an Int literal")]
    BadPredecessor { location: u32 },

    #[error("predecessor id {id} does not resolve to a live location")]
    MissingLocation { id: BigInt },

    #[error("no edge connects location {from_loc} to its trace successor {target}")]
    NoEdge { from_loc: u32, target: u32 },

    #[error("call edge between locations {from_loc} and {target}; traces must be fully inlined")]
    UnexpectedCall { from_loc: u32, target: u32 },
}

pub type TraceResult<T> = Result<T, TraceError>;

/// The value observed for one assignment. A variable the model does not
/// constrain (directly or through earlier trace assignments) is undefined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceValue {
    Literal(Literal),
    Undef(Type),
}

/// One `variable := value` observation on a trace edge. The variable is the
/// original pre-inlining one where inline tracking knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceAssignment {
    pub variable: Variable,
    pub value: TraceValue,
}

/// Inputs of the reconstruction besides the automaton and the model.
#[derive(Debug, Default)]
pub struct ReconstructSettings {
    /// For each location, an expression whose value under the model is the
    /// numeric id of the predecessor location in the counterexample. The
    /// walk stops at the first location without an entry.
    pub predecessors: HashMap<LocationId, ExprRef>,
    /// Maps locations introduced by inlining back to the originals.
    pub inlined_locations: HashMap<LocationId, LocationId>,
    /// Maps variables introduced by inlining back to the originals.
    pub inlined_variables: HashMap<Variable, Variable>,
}

/// A reconstructed linear trace. `states[0]` is the first location of the
/// walk (the entry, for a complete predecessor map) and the last state is
/// the error location; `actions[i]` holds the assignments on the edge
/// entering `states[i]`, so `actions[0]` is always empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    pub states: Vec<LocationId>,
    pub actions: Vec<Vec<TraceAssignment>>,
}

/// Rebuild the counterexample path ending in `error_location`.
///
/// The walker follows the predecessor map backwards under the solver model,
/// then replays the path forwards, evaluating each edge's assignments in an
/// environment seeded with the model and extended with every value already
/// computed along the trace.
pub fn reconstruct_trace(
    ctx: &GazerContext,
    cfa: &Cfa,
    error_location: LocationId,
    settings: &ReconstructSettings,
    model: &Valuation,
) -> TraceResult<Trace> {
    // Backward pass: resolve the location chain and the connecting edges.
    let mut rev_states = vec![error_location];
    let mut rev_edges: Vec<TransitionId> = Vec::new();
    let mut current = error_location;

    while let Some(&pred_expr) = settings.predecessors.get(&current) {
        let pred_value = eval(ctx, model, pred_expr)
            .ok()
            .and_then(|lit| lit.as_int().cloned())
            .ok_or(TraceError::BadPredecessor {
                location: current.id(),
            })?;

        let source = pred_value
            .to_u32()
            .and_then(|id| cfa.find_location_by_id(id))
            .ok_or(TraceError::MissingLocation {
                id: pred_value.clone(),
            })?;

        let edge = cfa
            .location(current)
            .incoming()
            .iter()
            .copied()
            .find(|&t| cfa.transition(t).source() == source)
            .ok_or(TraceError::NoEdge {
                from_loc: source.id(),
                target: current.id(),
            })?;

        if cfa.transition(edge).is_call() {
            return Err(TraceError::UnexpectedCall {
                from_loc: source.id(),
                target: current.id(),
            });
        }

        debug!(from = current.id(), to = source.id(), "trace step");
        rev_edges.push(edge);
        rev_states.push(source);
        current = source;
    }

    // Forward pass: replay the assignments, extending the environment with
    // each computed value so later edges may refer to earlier ones.
    let mut env = model.clone();
    let mut states = Vec::with_capacity(rev_states.len());
    let mut actions = Vec::with_capacity(rev_states.len());

    for &state in rev_states.iter().rev() {
        let original = settings
            .inlined_locations
            .get(&state)
            .copied()
            .unwrap_or(state);
        states.push(original);
    }

    // Nothing enters the initial state.
    actions.push(Vec::new());

    for &edge in rev_edges.iter().rev() {
        let assignments = cfa
            .transition(edge)
            .assignments()
            .expect("call edges were rejected during the backward pass");

        let mut action = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let value = match eval(ctx, &env, assignment.value) {
                Ok(literal) => {
                    env.insert(assignment.variable, literal.clone());
                    TraceValue::Literal(literal)
                }
                Err(_) => TraceValue::Undef(ctx.variable_type(assignment.variable)),
            };
            let original = settings
                .inlined_variables
                .get(&assignment.variable)
                .copied()
                .unwrap_or(assignment.variable);
            action.push(TraceAssignment {
                variable: original,
                value,
            });
        }
        actions.push(action);
    }

    info!(length = states.len(), "reconstructed counterexample trace");
    Ok(Trace { states, actions })
}
