//! Backend-agnostic linear program description.
//!
//! A [`LinearProgramBuilder`] collects variables, constraints and an objective
//! and produces an immutable [`LinearProgram`]. Any solver implementing
//! [`LpBackend`] can then be handed that value.

use serde::Serialize;
use std::time::Duration;

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(usize);

impl VarId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Inclusive variable bounds. Either side may be infinite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    /// Symmetric band `[-limit, limit]`.
    pub fn symmetric(limit: f64) -> Self {
        Self::new(-limit, limit)
    }

    pub fn non_negative() -> Self {
        Self::new(0.0, f64::INFINITY)
    }

    pub fn free() -> Self {
        Self::new(f64::NEG_INFINITY, f64::INFINITY)
    }
}

/// `Σ coeff·var + constant`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    terms: Vec<(VarId, f64)>,
    constant: f64,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constant(value: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant: value,
        }
    }

    pub fn term(mut self, var: VarId, coeff: f64) -> Self {
        self.terms.push((var, coeff));
        self
    }

    pub fn plus_constant(mut self, value: f64) -> Self {
        self.constant += value;
        self
    }

    pub fn terms(&self) -> &[(VarId, f64)] {
        &self.terms
    }

    pub fn constant_part(&self) -> f64 {
        self.constant
    }

    /// Value of the expression for a full assignment indexed by [`VarId`].
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.constant
            + self
                .terms
                .iter()
                .map(|(var, coeff)| coeff * values[var.0])
                .sum::<f64>()
    }
}

impl FromIterator<(VarId, f64)> for LinearExpr {
    fn from_iter<I: IntoIterator<Item = (VarId, f64)>>(iter: I) -> Self {
        Self {
            terms: iter.into_iter().collect(),
            constant: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    LessOrEqual,
    GreaterOrEqual,
    Equal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub expr: LinearExpr,
    pub relation: Relation,
    pub rhs: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sense {
    #[default]
    Minimize,
    Maximize,
}

/// An immutable, validated linear program.
#[derive(Debug, Clone)]
pub struct LinearProgram {
    names: Vec<String>,
    bounds: Vec<Bounds>,
    constraints: Vec<Constraint>,
    objective: LinearExpr,
    sense: Sense,
}

impl LinearProgram {
    pub fn num_variables(&self) -> usize {
        self.bounds.len()
    }

    pub fn name(&self, var: VarId) -> &str {
        &self.names[var.0]
    }

    pub fn bounds(&self) -> &[Bounds] {
        &self.bounds
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn objective(&self) -> &LinearExpr {
        &self.objective
    }

    pub fn sense(&self) -> Sense {
        self.sense
    }
}

#[derive(Debug, Default)]
pub struct LinearProgramBuilder {
    names: Vec<String>,
    bounds: Vec<Bounds>,
    constraints: Vec<Constraint>,
    objective: LinearExpr,
    sense: Sense,
}

impl LinearProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_variable(&mut self, name: &str, bounds: Bounds) -> VarId {
        self.names.push(name.to_string());
        self.bounds.push(bounds);
        VarId(self.bounds.len() - 1)
    }

    pub fn add_constraint(&mut self, expr: LinearExpr, relation: Relation, rhs: f64) -> &mut Self {
        self.constraints.push(Constraint {
            expr,
            relation,
            rhs,
        });
        self
    }

    pub fn set_objective(&mut self, sense: Sense, expr: LinearExpr) -> &mut Self {
        self.sense = sense;
        self.objective = expr;
        self
    }

    /// Validates and freezes the program.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Solver`] for NaN or inverted bounds,
    /// non-finite coefficients or right-hand sides, and references to
    /// variables that were never added.
    pub fn build(self) -> Result<LinearProgram> {
        for (name, b) in self.names.iter().zip(&self.bounds) {
            if b.lower.is_nan() || b.upper.is_nan() || b.lower > b.upper {
                return Err(PipelineError::Solver(format!(
                    "variable '{name}' has invalid bounds [{}, {}]",
                    b.lower, b.upper
                )));
            }
        }

        let n = self.bounds.len();
        let check = |expr: &LinearExpr, what: &str| -> Result<()> {
            if !expr.constant.is_finite() {
                return Err(PipelineError::Solver(format!("{what} has a non-finite constant")));
            }
            for (var, coeff) in &expr.terms {
                if var.0 >= n {
                    return Err(PipelineError::Solver(format!(
                        "{what} references unknown variable #{}",
                        var.0
                    )));
                }
                if !coeff.is_finite() {
                    return Err(PipelineError::Solver(format!("{what} has a non-finite coefficient")));
                }
            }
            Ok(())
        };

        check(&self.objective, "objective")?;
        for (idx, c) in self.constraints.iter().enumerate() {
            check(&c.expr, format!("constraint {idx}").as_str())?;
            if !c.rhs.is_finite() {
                return Err(PipelineError::Solver(format!(
                    "constraint {idx} has a non-finite bound"
                )));
            }
        }

        Ok(LinearProgram {
            names: self.names,
            bounds: self.bounds,
            constraints: self.constraints,
            objective: self.objective,
            sense: self.sense,
        })
    }
}

/// Resource limits for a single solve. `None` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SolveLimits {
    pub max_iterations: Option<usize>,
    pub time_limit: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    NotSolved,
    /// An iteration or time limit was hit before optimality was proven.
    Timeout,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LpSolution {
    pub status: SolveStatus,
    /// Objective value, only for [`SolveStatus::Optimal`].
    pub objective: Option<f64>,
    /// One value per variable, only for [`SolveStatus::Optimal`].
    pub values: Vec<f64>,
    pub iterations: usize,
}

impl LpSolution {
    pub fn without_values(status: SolveStatus, iterations: usize) -> Self {
        Self {
            status,
            objective: None,
            values: Vec::new(),
            iterations,
        }
    }

    pub fn value(&self, var: VarId) -> Option<f64> {
        self.values.get(var.0).copied()
    }
}

/// A solver able to process a [`LinearProgram`].
pub trait LpBackend {
    fn solve(&self, program: &LinearProgram, limits: &SolveLimits) -> LpSolution;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_evaluation() {
        let mut b = LinearProgramBuilder::new();
        let x = b.add_variable("x", Bounds::free());
        let y = b.add_variable("y", Bounds::free());

        let expr = LinearExpr::new().term(x, 2.0).term(y, -1.0).plus_constant(3.0);

        assert_eq!(expr.evaluate(&[4.0, 1.0]), 10.0);

        let program = b.build().unwrap();
        assert_eq!(program.num_variables(), 2);
        assert_eq!(program.name(y), "y");
    }

    #[test]
    fn test_build_rejects_inverted_bounds() {
        let mut b = LinearProgramBuilder::new();
        b.add_variable("x", Bounds::new(1.0, -1.0));

        assert!(matches!(b.build(), Err(PipelineError::Solver(_))));
    }

    #[test]
    fn test_build_rejects_unknown_variable() {
        let mut other = LinearProgramBuilder::new();
        other.add_variable("a", Bounds::free());
        let foreign = other.add_variable("b", Bounds::free());

        let mut b = LinearProgramBuilder::new();
        b.add_variable("x", Bounds::free());
        b.add_constraint(LinearExpr::new().term(foreign, 1.0), Relation::Equal, 0.0);

        assert!(matches!(b.build(), Err(PipelineError::Solver(_))));
    }

    #[test]
    fn test_build_rejects_non_finite_rhs() {
        let mut b = LinearProgramBuilder::new();
        let x = b.add_variable("x", Bounds::free());
        b.add_constraint(
            LinearExpr::new().term(x, 1.0),
            Relation::LessOrEqual,
            f64::INFINITY,
        );

        assert!(b.build().is_err());
    }
}
