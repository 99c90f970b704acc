//! Integration tests: build a small automata system, then reconstruct
//! counterexample traces from predecessor maps and models.

use std::collections::HashMap;

use gazer_automaton::{AutomataSystem, CfaRef, LocationId};
use gazer_core::{
    ExprBuilder, FoldingExprBuilder, GazerContext, Literal, Valuation, Variable,
    VariableAssignment,
};
use gazer_verifier::{
    reconstruct_trace, ReconstructSettings, TraceAssignment, TraceError, TraceValue,
};

struct Chain {
    ctx: GazerContext,
    system: AutomataSystem,
    cfa: CfaRef,
    mid: LocationId,
    err: LocationId,
    y: Variable,
}

/// entry -[y := 7]-> mid -[y := y + 1]-> err
fn build_chain() -> Chain {
    let mut ctx = GazerContext::new();
    let b = FoldingExprBuilder;
    let mut system = AutomataSystem::new();
    let cfa_ref = system.create_cfa("main");
    let cfa = system.cfa_mut(cfa_ref);

    let int = ctx.int_type();
    let y = cfa.create_local(&mut ctx, "y", int);
    let ry = ctx.ref_expr(y);

    let entry = cfa.entry();
    let mid = cfa.create_location();
    let err = cfa.create_error_location();

    let seven = b.int_lit(&mut ctx, 7.into());
    cfa.create_assign_transition(
        &mut ctx,
        entry,
        mid,
        None,
        vec![VariableAssignment::new(y, seven)],
    );

    let one = b.int_lit(&mut ctx, 1.into());
    let incremented = b.add(&mut ctx, ry, one);
    cfa.create_assign_transition(
        &mut ctx,
        mid,
        err,
        None,
        vec![VariableAssignment::new(y, incremented)],
    );

    Chain {
        ctx,
        system,
        cfa: cfa_ref,
        mid,
        err,
        y,
    }
}

fn predecessors(
    ctx: &mut GazerContext,
    entries: &[(LocationId, u32)],
) -> HashMap<LocationId, gazer_core::ExprRef> {
    entries
        .iter()
        .map(|&(loc, pred)| (loc, ctx.literal_expr(Literal::int(pred))))
        .collect()
}

#[test]
fn trace_reconstruction_follows_predecessors() {
    let Chain {
        mut ctx,
        system,
        cfa,
        mid,
        err,
        y,
    } = build_chain();
    let main = system.cfa(cfa);
    let entry = main.entry();

    let settings = ReconstructSettings {
        predecessors: predecessors(&mut ctx, &[(err, mid.id()), (mid, entry.id())]),
        ..Default::default()
    };

    let trace = reconstruct_trace(&ctx, main, err, &settings, &Valuation::new()).unwrap();

    // The first state is the walk's origin, the last is the error location.
    assert_eq!(trace.states, vec![entry, mid, err]);
    assert_eq!(
        trace.actions,
        vec![
            vec![],
            vec![TraceAssignment {
                variable: y,
                value: TraceValue::Literal(Literal::int(7)),
            }],
            vec![TraceAssignment {
                variable: y,
                value: TraceValue::Literal(Literal::int(8)),
            }],
        ]
    );
}

#[test]
fn trace_stops_where_predecessor_information_ends() {
    let Chain {
        mut ctx,
        system,
        cfa,
        mid,
        err,
        ..
    } = build_chain();
    let main = system.cfa(cfa);

    let settings = ReconstructSettings {
        predecessors: predecessors(&mut ctx, &[(err, mid.id())]),
        ..Default::default()
    };

    let trace = reconstruct_trace(&ctx, main, err, &settings, &Valuation::new()).unwrap();
    assert_eq!(trace.states, vec![mid, err]);
    assert_eq!(trace.actions.len(), 2);
    assert!(trace.actions[0].is_empty());
}

#[test]
fn trace_resolves_inlined_locations_and_variables() {
    let Chain {
        mut ctx,
        mut system,
        cfa,
        mid,
        err,
        y,
    } = build_chain();

    // Pretend `mid` and `y` were introduced by inlining.
    let original_loc = system.cfa_mut(cfa).create_location();
    let int = ctx.int_type();
    let original_y = ctx.create_variable("y_orig", int);

    let main = system.cfa(cfa);
    let entry = main.entry();
    let settings = ReconstructSettings {
        predecessors: predecessors(&mut ctx, &[(err, mid.id()), (mid, entry.id())]),
        inlined_locations: [(mid, original_loc)].into_iter().collect(),
        inlined_variables: [(y, original_y)].into_iter().collect(),
    };

    let trace = reconstruct_trace(&ctx, main, err, &settings, &Valuation::new()).unwrap();
    assert_eq!(trace.states, vec![entry, original_loc, err]);
    for action in &trace.actions[1..] {
        assert_eq!(action[0].variable, original_y);
    }
}

#[test]
fn trace_emits_undef_for_unconstrained_variables() {
    let mut ctx = GazerContext::new();
    let mut system = AutomataSystem::new();
    let cfa_ref = system.create_cfa("main");
    let cfa = system.cfa_mut(cfa_ref);

    let int = ctx.int_type();
    let x = cfa.create_local(&mut ctx, "x", int);
    let z = cfa.create_local(&mut ctx, "z", int);
    let rz = ctx.ref_expr(z);

    let entry = cfa.entry();
    let err = cfa.create_error_location();
    // x receives a value the model knows nothing about.
    cfa.create_assign_transition(
        &mut ctx,
        entry,
        err,
        None,
        vec![VariableAssignment::new(x, rz)],
    );

    let settings = ReconstructSettings {
        predecessors: predecessors(&mut ctx, &[(err, entry.id())]),
        ..Default::default()
    };

    let main = system.cfa(cfa_ref);
    let trace = reconstruct_trace(&ctx, main, err, &settings, &Valuation::new()).unwrap();
    assert_eq!(
        trace.actions[1],
        vec![TraceAssignment {
            variable: x,
            value: TraceValue::Undef(int),
        }]
    );
}

#[test]
fn trace_rejects_non_integer_predecessors() {
    let Chain {
        mut ctx,
        system,
        cfa,
        err,
        ..
    } = build_chain();
    let tru = ctx.literal_expr(Literal::bool(true));

    let settings = ReconstructSettings {
        predecessors: [(err, tru)].into_iter().collect(),
        ..Default::default()
    };

    let result = reconstruct_trace(&ctx, system.cfa(cfa), err, &settings, &Valuation::new());
    assert_eq!(
        result,
        Err(TraceError::BadPredecessor {
            location: err.id()
        })
    );
}

#[test]
fn trace_rejects_unresolvable_predecessor_ids() {
    let Chain {
        mut ctx,
        system,
        cfa,
        err,
        ..
    } = build_chain();

    let settings = ReconstructSettings {
        predecessors: predecessors(&mut ctx, &[(err, 99)]),
        ..Default::default()
    };

    let result = reconstruct_trace(&ctx, system.cfa(cfa), err, &settings, &Valuation::new());
    assert_eq!(
        result,
        Err(TraceError::MissingLocation { id: 99.into() })
    );
}

#[test]
fn trace_rejects_missing_edges() {
    let Chain {
        mut ctx,
        system,
        cfa,
        err,
        ..
    } = build_chain();
    let main = system.cfa(cfa);
    let entry = main.entry();

    // The entry exists but has no direct edge into the error location.
    let settings = ReconstructSettings {
        predecessors: predecessors(&mut ctx, &[(err, entry.id())]),
        ..Default::default()
    };

    let result = reconstruct_trace(&ctx, main, err, &settings, &Valuation::new());
    assert_eq!(
        result,
        Err(TraceError::NoEdge {
            from_loc: entry.id(),
            target: err.id()
        })
    );
}

#[test]
fn trace_rejects_call_edges() {
    let mut ctx = GazerContext::new();
    let mut system = AutomataSystem::new();
    let main = system.create_cfa("main");
    let helper = system.create_cfa("helper");

    let (entry, err) = {
        let cfa = system.cfa_mut(main);
        (cfa.entry(), cfa.create_error_location())
    };
    system.create_call_transition(&mut ctx, main, entry, err, None, helper, vec![], vec![]);

    let settings = ReconstructSettings {
        predecessors: predecessors(&mut ctx, &[(err, entry.id())]),
        ..Default::default()
    };

    let result = reconstruct_trace(&ctx, system.cfa(main), err, &settings, &Valuation::new());
    assert_eq!(
        result,
        Err(TraceError::UnexpectedCall {
            from_loc: entry.id(),
            target: err.id()
        })
    );
}

#[test]
fn trace_prefers_model_values_over_recomputation() {
    let Chain {
        mut ctx,
        system,
        cfa,
        mid,
        err,
        y,
    } = build_chain();
    let main = system.cfa(cfa);
    let entry = main.entry();

    let settings = ReconstructSettings {
        predecessors: predecessors(&mut ctx, &[(err, mid.id()), (mid, entry.id())]),
        ..Default::default()
    };

    // A model that already constrains y; the replay overwrites it edge by
    // edge, so the assigned literals still win.
    let model: Valuation = [(y, Literal::int(100))].into_iter().collect();
    let trace = reconstruct_trace(&ctx, main, err, &settings, &model).unwrap();
    assert_eq!(
        trace.actions[2],
        vec![TraceAssignment {
            variable: y,
            value: TraceValue::Literal(Literal::int(8)),
        }]
    );
}
