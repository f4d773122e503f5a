//! `good_lp` backend.
//!
//! Routes the program through good_lp's modelling layer with Clarabel
//! underneath. good_lp exposes primal values only, so row and bound duals
//! are left empty and every dual lookup on the solution yields `None`.
//! Time and iteration caps in [`SolverSettings`] are not forwarded.

use super::{LinearProgram, LpError, LpSolution, LpSolver, LpStatus, Relation, Sense, SolverSettings};
use good_lp::solvers::clarabel::clarabel;
use good_lp::{constraint, variable, Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default)]
pub struct GoodLp;

fn to_expression(vars: &[Variable], expr: &super::LinearExpr) -> Expression {
    let mut out = Expression::from(expr.constant_term());
    for (var, coef) in expr.terms() {
        out += *coef * vars[var.index()];
    }
    out
}

impl LpSolver for GoodLp {
    fn name(&self) -> &'static str {
        "good-lp"
    }

    fn solve(&self, lp: &LinearProgram, settings: &SolverSettings) -> Result<LpSolution, LpError> {
        if settings.time_limit_secs.is_some() || settings.max_iter.is_some() {
            tracing::debug!("good-lp backend ignores solver time and iteration caps");
        }

        let mut problem = ProblemVariables::new();
        let mut vars = Vec::with_capacity(lp.num_vars());
        for (_, var) in lp.variables() {
            let mut def = variable().name(var.name.clone());
            if var.lower.is_finite() {
                def = def.min(var.lower);
            }
            if var.upper.is_finite() {
                def = def.max(var.upper);
            }
            vars.push(problem.add(def));
        }

        let objective = to_expression(&vars, lp.objective());
        let unsolved = match lp.sense() {
            Sense::Minimize => problem.minimise(objective),
            Sense::Maximize => problem.maximise(objective),
        };
        let mut model = unsolved.using(clarabel);

        for (_, c) in lp.constraints() {
            let lhs = to_expression(&vars, &c.expr);
            let row = match c.relation {
                Relation::Eq => constraint::eq(lhs, c.rhs),
                Relation::Le => constraint::leq(lhs, c.rhs),
                Relation::Ge => constraint::geq(lhs, c.rhs),
            };
            model = model.with(row);
        }

        match model.solve() {
            Ok(solution) => {
                let values: Vec<f64> = vars.iter().map(|v| solution.value(*v)).collect();
                Ok(LpSolution {
                    status: LpStatus::Optimal,
                    objective: lp.objective().evaluate(&values),
                    values,
                    row_duals: HashMap::new(),
                    bound_duals: HashMap::new(),
                    iterations: 0,
                })
            }
            Err(ResolutionError::Infeasible) => Ok(LpSolution::with_status(LpStatus::Infeasible)),
            Err(ResolutionError::Unbounded) => Ok(LpSolution::with_status(LpStatus::Unbounded)),
            Err(other) => {
                tracing::debug!("good-lp resolution error: {other}");
                Ok(LpSolution::with_status(LpStatus::NumericalError))
            }
        }
    }
}
