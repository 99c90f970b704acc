//! Valuations: finite maps from variables to literal values, used as the
//! evaluator's environment and as the carrier of solver models.

use std::collections::BTreeMap;
use std::fmt;

use crate::expr::ExprRef;
use crate::literal::Literal;
use crate::variable::Variable;
use crate::GazerContext;

/// A finite mapping from variables to literals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Valuation {
    map: BTreeMap<Variable, Literal>,
}

impl Valuation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, variable: Variable, value: Literal) {
        self.map.insert(variable, value);
    }

    pub fn get(&self, variable: Variable) -> Option<&Literal> {
        self.map.get(&variable)
    }

    pub fn contains(&self, variable: Variable) -> bool {
        self.map.contains_key(&variable)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Variable, &Literal)> {
        self.map.iter().map(|(v, lit)| (*v, lit))
    }

    /// Resolve a bare variable reference or literal node without recursing:
    /// anything compound yields `None`.
    pub fn quick_eval(&self, ctx: &GazerContext, expr: ExprRef) -> Option<Literal> {
        if let Some(variable) = ctx.as_variable(expr) {
            return self.get(variable).cloned();
        }
        ctx.as_literal(expr).cloned()
    }

    /// Render the valuation as `name = value` lines.
    pub fn display<'a>(&'a self, ctx: &'a GazerContext) -> DisplayValuation<'a> {
        DisplayValuation {
            valuation: self,
            ctx,
        }
    }
}

impl FromIterator<(Variable, Literal)> for Valuation {
    fn from_iter<I: IntoIterator<Item = (Variable, Literal)>>(iter: I) -> Self {
        Self {
            map: iter.into_iter().collect(),
        }
    }
}

pub struct DisplayValuation<'a> {
    valuation: &'a Valuation,
    ctx: &'a GazerContext,
}

impl fmt::Display for DisplayValuation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (variable, value) in self.valuation.iter() {
            writeln!(f, "{} = {}", self.ctx.variable_name(variable), value)?;
        }
        Ok(())
    }
}
