//! Linear programming layer: model, solution and solver oracles.
//!
//! The dispatch code builds a [`LinearProgram`] and hands it to any
//! [`LpSolver`]. Backends:
//!
//! | Backend | Duals | Notes |
//! |---------|-------|-------|
//! | [`ClarabelLp`] | yes | direct conic interface, fixed variables substituted out |
//! | [`GoodLp`] | no | `good_lp` modelling layer over Clarabel (`solver-clarabel` feature) |
//!
//! A non-optimal termination is reported through [`LpSolution::status`], not
//! as an [`LpError`]. Errors are reserved for programs the backend could not
//! even set up.

mod clarabel_lp;
#[cfg(feature = "solver-clarabel")]
mod good_lp_backend;
pub mod model;

pub use clarabel_lp::ClarabelLp;
#[cfg(feature = "solver-clarabel")]
pub use good_lp_backend::GoodLp;
pub use model::{
    Constraint, ConstraintGroup, ConstraintId, LinearExpr, LinearProgram, Relation, Sense,
    VarId, Variable,
};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LpError {
    #[error("Unknown variable index {0}")]
    UnknownVariable(usize),

    #[error("Unknown or removed constraint group {0}")]
    UnknownGroup(usize),

    #[error("Variable {name} has invalid bounds [{lower}, {upper}]")]
    InvalidBounds { name: String, lower: f64, upper: f64 },

    #[error("Non-finite coefficient in {name}")]
    InvalidCoefficient { name: String },

    #[error("LP backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LpStatus {
    Optimal,
    Infeasible,
    Unbounded,
    IterationLimit,
    TimeLimit,
    NumericalError,
}

impl LpStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LpStatus::Optimal => "Optimal",
            LpStatus::Infeasible => "Infeasible",
            LpStatus::Unbounded => "Unbounded",
            LpStatus::IterationLimit => "IterationLimit",
            LpStatus::TimeLimit => "TimeLimit",
            LpStatus::NumericalError => "NumericalError",
        }
    }

    pub fn is_optimal(&self) -> bool {
        matches!(self, LpStatus::Optimal)
    }
}

impl fmt::Display for LpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sensitivities of the objective to a variable's bounds.
///
/// `lower` is ∂objective/∂lower and `upper` is ∂objective/∂upper. Both are
/// zero for a bound that does not bind.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundDuals {
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone)]
pub struct LpSolution {
    pub status: LpStatus,
    pub objective: f64,
    /// Primal values indexed by `VarId`
    pub values: Vec<f64>,
    /// ∂objective/∂rhs for each live constraint, when the backend reports it
    pub row_duals: HashMap<ConstraintId, f64>,
    pub bound_duals: HashMap<VarId, BoundDuals>,
    pub iterations: u32,
}

impl LpSolution {
    /// A solution carrying only a status, for backends that stop early.
    pub fn with_status(status: LpStatus) -> Self {
        Self {
            status,
            objective: f64::NAN,
            values: Vec::new(),
            row_duals: HashMap::new(),
            bound_duals: HashMap::new(),
            iterations: 0,
        }
    }

    /// Primal value; NaN when the variable is not part of the solution.
    pub fn value(&self, var: VarId) -> f64 {
        self.values.get(var.index()).copied().unwrap_or(f64::NAN)
    }

    pub fn row_dual(&self, id: ConstraintId) -> Option<f64> {
        self.row_duals.get(&id).copied()
    }

    pub fn bound_dual(&self, var: VarId) -> Option<BoundDuals> {
        self.bound_duals.get(&var).copied()
    }
}

/// Limits handed to the backend. Defaults impose no cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    pub time_limit_secs: Option<f64>,
    pub max_iter: Option<u32>,
    pub verbose: bool,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            time_limit_secs: None,
            max_iter: None,
            verbose: false,
        }
    }
}

/// LP solver oracle.
pub trait LpSolver: Send + Sync {
    fn name(&self) -> &'static str;

    fn solve(&self, lp: &LinearProgram, settings: &SolverSettings) -> Result<LpSolution, LpError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LpBackend {
    #[default]
    Clarabel,
    GoodLp,
}

impl LpBackend {
    pub fn solver(self) -> Result<Arc<dyn LpSolver>, LpError> {
        match self {
            LpBackend::Clarabel => Ok(Arc::new(ClarabelLp)),
            #[cfg(feature = "solver-clarabel")]
            LpBackend::GoodLp => Ok(Arc::new(GoodLp)),
            #[cfg(not(feature = "solver-clarabel"))]
            LpBackend::GoodLp => Err(LpError::Backend(
                "good_lp backend requires the solver-clarabel feature".to_string(),
            )),
        }
    }
}

impl fmt::Display for LpBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LpBackend::Clarabel => write!(f, "clarabel"),
            LpBackend::GoodLp => write!(f, "good-lp"),
        }
    }
}

impl FromStr for LpBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "clarabel" => Ok(LpBackend::Clarabel),
            "good-lp" | "good_lp" | "goodlp" => Ok(LpBackend::GoodLp),
            other => Err(format!("unknown LP backend '{other}' (expected clarabel or good-lp)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_from_str() {
        assert_eq!("clarabel".parse::<LpBackend>().unwrap(), LpBackend::Clarabel);
        assert_eq!("good_lp".parse::<LpBackend>().unwrap(), LpBackend::GoodLp);
        assert!("cplex".parse::<LpBackend>().is_err());
        assert_eq!(LpBackend::GoodLp.to_string(), "good-lp");
    }

    #[test]
    fn test_solver_is_object_safe_and_shareable() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn LpSolver>();
        let solver = LpBackend::Clarabel.solver().unwrap();
        assert_eq!(solver.name(), "clarabel");
    }

    #[test]
    fn test_missing_duals_are_none() {
        let sol = LpSolution::with_status(LpStatus::Infeasible);
        let mut lp = LinearProgram::new();
        let x = lp.add_var("x", 0.0, 1.0).unwrap();
        let c = lp
            .add_constraint("c", LinearExpr::from(x), Relation::Le, 1.0)
            .unwrap();
        assert!(sol.row_dual(c).is_none());
        assert!(sol.bound_dual(x).is_none());
        assert!(sol.value(x).is_nan());
        assert_eq!(sol.status.to_string(), "Infeasible");
    }
}
