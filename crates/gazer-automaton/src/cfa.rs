//! Locations, transitions and the control flow automaton itself.

use std::collections::HashMap;

use gazer_core::{ExprRef, GazerContext, Literal, Type, TypeKind, Variable, VariableAssignment};
use tracing::debug;

use crate::system::CfaRef;

/// A location handle. The handle value is the location's id: ids are
/// assigned monotonically per CFA and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationId(pub(crate) u32);

impl LocationId {
    pub fn id(self) -> u32 {
        self.0
    }
}

/// A transition handle into the CFA's edge arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransitionId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationKind {
    State,
    Error,
}

/// A node of the automaton graph. Adjacency lists hold edge ids in
/// insertion order and are kept consistent with the edge arena at all
/// times.
#[derive(Debug)]
pub struct Location {
    kind: LocationKind,
    incoming: Vec<TransitionId>,
    outgoing: Vec<TransitionId>,
    disconnected: bool,
}

impl Location {
    fn new(kind: LocationKind) -> Self {
        Self {
            kind,
            incoming: Vec::new(),
            outgoing: Vec::new(),
            disconnected: false,
        }
    }

    pub fn kind(&self) -> LocationKind {
        self.kind
    }

    pub fn is_error(&self) -> bool {
        self.kind == LocationKind::Error
    }

    pub fn incoming(&self) -> &[TransitionId] {
        &self.incoming
    }

    pub fn outgoing(&self) -> &[TransitionId] {
        &self.outgoing
    }

    pub fn num_incoming(&self) -> usize {
        self.incoming.len()
    }

    pub fn num_outgoing(&self) -> usize {
        self.outgoing.len()
    }
}

/// The payload of a call edge: the callee automaton, expressions bound to
/// the callee's inputs, and caller variables receiving the callee's
/// outputs.
#[derive(Debug, Clone)]
pub struct CallTransition {
    pub(crate) callee: CfaRef,
    pub(crate) inputs: Vec<VariableAssignment>,
    pub(crate) outputs: Vec<VariableAssignment>,
}

impl CallTransition {
    pub fn callee(&self) -> CfaRef {
        self.callee
    }

    /// Bindings of callee input variables to caller-side expressions, in
    /// callee signature order.
    pub fn inputs(&self) -> &[VariableAssignment] {
        &self.inputs
    }

    /// Bindings of caller variables to callee output references, in callee
    /// signature order.
    pub fn outputs(&self) -> &[VariableAssignment] {
        &self.outputs
    }

    /// The binding for a given callee input variable, if any.
    pub fn input_argument(&self, callee_input: Variable) -> Option<&VariableAssignment> {
        self.inputs.iter().find(|a| a.variable == callee_input)
    }

    /// The binding that assigns into a given caller variable, if any.
    pub fn output_argument(&self, caller_variable: Variable) -> Option<&VariableAssignment> {
        self.outputs.iter().find(|a| a.variable == caller_variable)
    }
}

#[derive(Debug, Clone)]
pub enum TransitionKind {
    /// An ordered batch of `variable := value` assignments.
    Assign(Vec<VariableAssignment>),
    /// A guarded call into another automaton of the same system.
    Call(CallTransition),
}

/// An edge of the automaton graph: source, target, boolean guard, and the
/// assign/call payload.
#[derive(Debug)]
pub struct Transition {
    source: LocationId,
    target: LocationId,
    guard: ExprRef,
    kind: TransitionKind,
    disconnected: bool,
}

impl Transition {
    pub fn source(&self) -> LocationId {
        self.source
    }

    pub fn target(&self) -> LocationId {
        self.target
    }

    pub fn guard(&self) -> ExprRef {
        self.guard
    }

    pub fn kind(&self) -> &TransitionKind {
        &self.kind
    }

    pub fn is_assign(&self) -> bool {
        matches!(self.kind, TransitionKind::Assign(_))
    }

    pub fn is_call(&self) -> bool {
        matches!(self.kind, TransitionKind::Call(_))
    }

    /// The assignment batch of an assign edge, `None` for calls.
    pub fn assignments(&self) -> Option<&[VariableAssignment]> {
        match &self.kind {
            TransitionKind::Assign(assignments) => Some(assignments),
            TransitionKind::Call(_) => None,
        }
    }

    pub fn call(&self) -> Option<&CallTransition> {
        match &self.kind {
            TransitionKind::Assign(_) => None,
            TransitionKind::Call(call) => Some(call),
        }
    }
}

/// A control flow automaton: a directed multigraph with sentinel entry and
/// exit locations and a typed variable environment (inputs, outputs,
/// locals).
#[derive(Debug)]
pub struct Cfa {
    name: String,

    locations: Vec<Option<Location>>,
    transitions: Vec<Option<Transition>>,

    entry: LocationId,
    exit: LocationId,

    error_locations: Vec<LocationId>,
    error_field_exprs: HashMap<LocationId, ExprRef>,

    inputs: Vec<Variable>,
    outputs: Vec<Variable>,
    locals: Vec<Variable>,
    symbol_names: HashMap<Variable, String>,
}

impl Cfa {
    pub(crate) fn new(name: String) -> Self {
        let mut cfa = Self {
            name,
            locations: Vec::new(),
            transitions: Vec::new(),
            entry: LocationId(0),
            exit: LocationId(0),
            error_locations: Vec::new(),
            error_field_exprs: HashMap::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            locals: Vec::new(),
            symbol_names: HashMap::new(),
        };
        cfa.entry = cfa.create_location();
        cfa.exit = cfa.create_location();
        cfa
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entry(&self) -> LocationId {
        self.entry
    }

    pub fn exit(&self) -> LocationId {
        self.exit
    }

    // ------------------------------------------------------------------
    // Locations

    fn alloc_location(&mut self, kind: LocationKind) -> LocationId {
        let id = LocationId(self.locations.len() as u32);
        self.locations.push(Some(Location::new(kind)));
        id
    }

    /// Create a fresh state location with the next id.
    pub fn create_location(&mut self) -> LocationId {
        self.alloc_location(LocationKind::State)
    }

    /// Create a fresh error location. Its error-code expression defaults to
    /// none until [`Cfa::add_error_code`] binds one.
    pub fn create_error_location(&mut self) -> LocationId {
        let id = self.alloc_location(LocationKind::Error);
        self.error_locations.push(id);
        id
    }

    /// Bind an error-code expression (Int- or Bv-typed) to an error
    /// location.
    pub fn add_error_code(&mut self, ctx: &GazerContext, loc: LocationId, expr: ExprRef) {
        assert!(
            self.location(loc).is_error(),
            "error codes can only be attached to error locations"
        );
        let kind = ctx.type_kind(ctx.expr_type(expr));
        assert!(
            matches!(kind, TypeKind::Int | TypeKind::Bv(_)),
            "type mismatch: error codes must be Int or Bv, found {:?}",
            kind
        );
        self.error_field_exprs.insert(loc, expr);
    }

    /// The error-code expression bound to an error location, if any.
    pub fn error_field_expr(&self, loc: LocationId) -> Option<ExprRef> {
        self.error_field_exprs.get(&loc).copied()
    }

    /// Iterate the error locations together with their error codes.
    pub fn errors(&self) -> impl Iterator<Item = (LocationId, Option<ExprRef>)> + '_ {
        self.error_locations
            .iter()
            .map(move |&loc| (loc, self.error_field_expr(loc)))
    }

    pub fn num_errors(&self) -> usize {
        self.error_locations.len()
    }

    /// Access a location. Panics if the id has been reclaimed.
    pub fn location(&self, id: LocationId) -> &Location {
        self.locations[id.0 as usize]
            .as_ref()
            .expect("location has been reclaimed")
    }

    fn location_mut(&mut self, id: LocationId) -> &mut Location {
        self.locations[id.0 as usize]
            .as_mut()
            .expect("location has been reclaimed")
    }

    /// O(1) lookup of a live location by its numeric id. Disconnected and
    /// reclaimed locations are not found.
    pub fn find_location_by_id(&self, id: u32) -> Option<LocationId> {
        let slot = self.locations.get(id as usize)?.as_ref()?;
        if slot.disconnected {
            None
        } else {
            Some(LocationId(id))
        }
    }

    /// Ids of all non-reclaimed locations, in creation order.
    pub fn location_ids(&self) -> impl Iterator<Item = LocationId> + '_ {
        self.locations
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|_| LocationId(i as u32)))
    }

    pub fn num_locations(&self) -> usize {
        self.locations.iter().filter(|slot| slot.is_some()).count()
    }

    // ------------------------------------------------------------------
    // Transitions

    pub fn transition(&self, id: TransitionId) -> &Transition {
        self.transitions[id.0 as usize]
            .as_ref()
            .expect("transition has been reclaimed")
    }

    /// Ids of all non-reclaimed transitions, in creation order.
    pub fn transition_ids(&self) -> impl Iterator<Item = TransitionId> + '_ {
        self.transitions
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|_| TransitionId(i as u32)))
    }

    pub fn num_transitions(&self) -> usize {
        self.transitions.iter().filter(|slot| slot.is_some()).count()
    }

    fn check_guard(&self, ctx: &GazerContext, guard: ExprRef) {
        assert!(
            ctx.expr_type(guard) == ctx.bool_type(),
            "type mismatch: transition guards must be boolean"
        );
    }

    fn check_assignment(&self, ctx: &GazerContext, assignment: &VariableAssignment) {
        assert!(
            ctx.variable_type(assignment.variable) == ctx.expr_type(assignment.value),
            "type mismatch: cannot assign a {} value to variable '{}' of type {}",
            ctx.display_type(ctx.expr_type(assignment.value)),
            ctx.variable_name(assignment.variable),
            ctx.display_type(ctx.variable_type(assignment.variable)),
        );
    }

    fn insert_transition(
        &mut self,
        source: LocationId,
        target: LocationId,
        guard: ExprRef,
        kind: TransitionKind,
    ) -> TransitionId {
        assert!(
            !self.location(source).disconnected && !self.location(target).disconnected,
            "cannot attach an edge to a disconnected location"
        );
        let id = TransitionId(self.transitions.len() as u32);
        self.transitions.push(Some(Transition {
            source,
            target,
            guard,
            kind,
            disconnected: false,
        }));
        self.location_mut(source).outgoing.push(id);
        self.location_mut(target).incoming.push(id);
        id
    }

    /// Create an assign edge. A missing guard defaults to the `true`
    /// literal; the assignment batch may be empty.
    pub fn create_assign_transition(
        &mut self,
        ctx: &mut GazerContext,
        source: LocationId,
        target: LocationId,
        guard: Option<ExprRef>,
        assignments: Vec<VariableAssignment>,
    ) -> TransitionId {
        let guard = guard.unwrap_or_else(|| ctx.literal_expr(Literal::Bool(true)));
        self.check_guard(ctx, guard);
        for assignment in &assignments {
            self.check_assignment(ctx, assignment);
        }
        self.insert_transition(source, target, guard, TransitionKind::Assign(assignments))
    }

    /// Internal: the system performs callee signature validation, then
    /// inserts through this.
    pub(crate) fn insert_call_transition(
        &mut self,
        ctx: &mut GazerContext,
        source: LocationId,
        target: LocationId,
        guard: Option<ExprRef>,
        call: CallTransition,
    ) -> TransitionId {
        let guard = guard.unwrap_or_else(|| ctx.literal_expr(Literal::Bool(true)));
        self.check_guard(ctx, guard);
        self.insert_transition(source, target, guard, TransitionKind::Call(call))
    }

    /// Append an assignment to an existing assign edge.
    pub fn add_assignment(
        &mut self,
        ctx: &GazerContext,
        id: TransitionId,
        assignment: VariableAssignment,
    ) {
        self.check_assignment(ctx, &assignment);
        let edge = self.transitions[id.0 as usize]
            .as_mut()
            .expect("transition has been reclaimed");
        match &mut edge.kind {
            TransitionKind::Assign(assignments) => assignments.push(assignment),
            TransitionKind::Call(_) => panic!("cannot append assignments to a call edge"),
        }
    }

    // ------------------------------------------------------------------
    // Variables

    fn check_symbol_name(&self, name: &str) {
        assert!(
            !self.symbol_names.values().any(|n| n == name),
            "name collision: variable '{}' already exists in automaton '{}'",
            name,
            self.name
        );
    }

    /// Create an input variable. The name must be unique among this CFA's
    /// inputs, outputs and locals.
    pub fn create_input(&mut self, ctx: &mut GazerContext, name: &str, ty: Type) -> Variable {
        self.check_symbol_name(name);
        let variable = ctx.create_variable(name, ty);
        self.symbol_names.insert(variable, name.to_string());
        self.inputs.push(variable);
        variable
    }

    /// Create a local variable. The name must be unique among this CFA's
    /// inputs, outputs and locals.
    pub fn create_local(&mut self, ctx: &mut GazerContext, name: &str, ty: Type) -> Variable {
        self.check_symbol_name(name);
        let variable = ctx.create_variable(name, ty);
        self.symbol_names.insert(variable, name.to_string());
        self.locals.push(variable);
        variable
    }

    /// Mark an already declared variable of this CFA as an output.
    pub fn add_output(&mut self, variable: Variable) {
        assert!(
            self.symbol_names.contains_key(&variable),
            "cannot mark a foreign variable as an output of automaton '{}'",
            self.name
        );
        assert!(
            !self.outputs.contains(&variable),
            "variable is already an output of automaton '{}'",
            self.name
        );
        self.outputs.push(variable);
    }

    pub fn inputs(&self) -> &[Variable] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Variable] {
        &self.outputs
    }

    pub fn locals(&self) -> &[Variable] {
        &self.locals
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    pub fn num_locals(&self) -> usize {
        self.locals.len()
    }

    pub fn is_output(&self, variable: Variable) -> bool {
        self.outputs.contains(&variable)
    }

    /// The position of an input variable in the input list.
    pub fn input_number(&self, variable: Variable) -> usize {
        self.inputs
            .iter()
            .position(|&v| v == variable)
            .expect("variable is not an input of this automaton")
    }

    /// The position of an output variable in the output list.
    pub fn output_number(&self, variable: Variable) -> usize {
        self.outputs
            .iter()
            .position(|&v| v == variable)
            .expect("variable is not an output of this automaton")
    }

    fn find_by_name(&self, list: &[Variable], name: &str) -> Option<Variable> {
        list.iter()
            .copied()
            .find(|v| self.symbol_names.get(v).is_some_and(|n| n == name))
    }

    pub fn find_input_by_name(&self, name: &str) -> Option<Variable> {
        self.find_by_name(&self.inputs, name)
    }

    pub fn find_output_by_name(&self, name: &str) -> Option<Variable> {
        self.find_by_name(&self.outputs, name)
    }

    pub fn find_local_by_name(&self, name: &str) -> Option<Variable> {
        self.find_by_name(&self.locals, name)
    }

    /// Bulk-remove local variables matching a predicate.
    pub fn remove_locals_if(&mut self, mut pred: impl FnMut(Variable) -> bool) {
        self.locals.retain(|&v| !pred(v));
    }

    // ------------------------------------------------------------------
    // Structural edits

    /// Drop an edge from both endpoints' adjacency lists. The edge storage
    /// is reclaimed later by [`Cfa::clear_disconnected_elements`].
    /// Disconnecting an already-disconnected edge is a no-op.
    pub fn disconnect_edge(&mut self, id: TransitionId) {
        let (source, target) = {
            let edge = self.transitions[id.0 as usize]
                .as_mut()
                .expect("transition has been reclaimed");
            if edge.disconnected {
                return;
            }
            edge.disconnected = true;
            (edge.source, edge.target)
        };
        self.location_mut(source).outgoing.retain(|&t| t != id);
        self.location_mut(target).incoming.retain(|&t| t != id);
    }

    /// Disconnect a location and every edge attached to it. The entry and
    /// exit sentinels cannot be disconnected.
    pub fn disconnect_location(&mut self, id: LocationId) {
        assert!(
            id != self.entry && id != self.exit,
            "the entry and exit locations cannot be disconnected"
        );
        if self.location(id).disconnected {
            return;
        }

        let mut edges: Vec<TransitionId> = Vec::new();
        {
            let loc = self.location(id);
            edges.extend_from_slice(&loc.incoming);
            edges.extend_from_slice(&loc.outgoing);
        }
        for edge in edges {
            self.disconnect_edge(edge);
        }

        self.location_mut(id).disconnected = true;
        self.error_field_exprs.remove(&id);
        self.error_locations.retain(|&loc| loc != id);
    }

    /// Reclaim the storage of every disconnected location and edge.
    /// Outstanding ids of reclaimed elements become invalid.
    pub fn clear_disconnected_elements(&mut self) {
        let mut locations = 0usize;
        let mut edges = 0usize;

        for slot in &mut self.transitions {
            if slot.as_ref().is_some_and(|t| t.disconnected) {
                *slot = None;
                edges += 1;
            }
        }
        for slot in &mut self.locations {
            if slot.as_ref().is_some_and(|l| l.disconnected) {
                *slot = None;
                locations += 1;
            }
        }

        debug!(
            cfa = %self.name,
            locations, edges, "reclaimed disconnected elements"
        );
    }

    /// Disconnect and reclaim every location that forward reachability from
    /// the entry cannot see. The exit location is always preserved, even if
    /// unreachable.
    pub fn remove_unreachable_locations(&mut self) {
        let mut visited = vec![false; self.locations.len()];
        let mut worklist = vec![self.entry];
        visited[self.entry.0 as usize] = true;

        while let Some(loc) = worklist.pop() {
            for &edge in self.location(loc).outgoing.iter() {
                let target = self.transition(edge).target();
                if !visited[target.0 as usize] {
                    visited[target.0 as usize] = true;
                    worklist.push(target);
                }
            }
        }

        let unreachable: Vec<LocationId> = self
            .location_ids()
            .filter(|&loc| !visited[loc.0 as usize] && loc != self.exit)
            .collect();

        debug!(
            cfa = %self.name,
            count = unreachable.len(),
            "removing unreachable locations"
        );

        for loc in unreachable {
            self.disconnect_location(loc);
        }
        self.clear_disconnected_elements();
    }
}
