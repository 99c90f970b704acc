//! Counterexample trace reconstruction.
//!
//! A bounded model checker that finds a violation hands this module the
//! root automaton, the error location, a predecessor map and the solver
//! model. The walker rebuilds the linear path the solver chose, evaluates
//! the assignments along it, and returns the trace in execution order.

pub mod trace;

pub use trace::{
    reconstruct_trace, ReconstructSettings, Trace, TraceAssignment, TraceError, TraceResult,
    TraceValue,
};
