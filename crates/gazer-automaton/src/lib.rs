//! Control flow automata over the symbolic expression core.
//!
//! A [`Cfa`] is a named directed multigraph whose edges carry a boolean
//! guard plus either a batch of variable assignments or a call into another
//! automaton of the same [`AutomataSystem`]. Locations and transitions live
//! in per-CFA arenas with stable ids; structural edits (disconnection,
//! unreachable-location removal) mark elements and reclaim them in bulk.

pub mod cfa;
pub mod gen;
pub mod system;

pub use cfa::{
    CallTransition, Cfa, Location, LocationId, LocationKind, Transition, TransitionId,
    TransitionKind,
};
pub use gen::{AutomatonQueryPoint, CfaGenerationState, GenerationStepPoint, VariableDeclPoint};
pub use system::{AutomataSystem, CfaRef};
