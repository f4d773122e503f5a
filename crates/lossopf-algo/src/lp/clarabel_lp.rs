//! Clarabel backend.
//!
//! Clarabel solves `min ½xᵀPx + qᵀx  s.t.  Ax + s = b, s ∈ K`. An LP maps to
//! `P = 0` with equality rows in a zero cone and `≤` rows (including finite
//! variable bounds) in a nonnegative cone. `≥` rows are negated.
//!
//! Variables whose bounds coincide are substituted out before the matrix is
//! assembled, so they come back exactly at their fixed value.
//!
//! Dual values: with `z` the cone duals, `∂objective/∂b = −z` at the optimum.
//! Row and bound sensitivities below are derived from that identity.

use super::{
    BoundDuals, ConstraintId, LinearProgram, LpError, LpSolution, LpSolver, LpStatus, Relation,
    Sense, SolverSettings, VarId,
};
use clarabel::{
    algebra::CscMatrix,
    solver::{DefaultSettings, DefaultSolver, IPSolver, SolverStatus, SupportedConeT},
};
use std::collections::{BTreeMap, HashMap};

/// Tolerance for rows that reduce to constants after substitution.
const CONSTANT_ROW_TOL: f64 = 1e-9;

#[derive(Debug, Clone, Copy, Default)]
pub struct ClarabelLp;

#[derive(Debug, Clone, Copy)]
enum RowOrigin {
    /// `sign` is −1 when a `≥` row was negated into `≤` form
    Constraint { id: ConstraintId, sign: f64 },
    Lower(VarId),
    Upper(VarId),
}

struct Row {
    coeffs: BTreeMap<usize, f64>,
    rhs: f64,
    origin: RowOrigin,
}

impl LpSolver for ClarabelLp {
    fn name(&self) -> &'static str {
        "clarabel"
    }

    fn solve(&self, lp: &LinearProgram, settings: &SolverSettings) -> Result<LpSolution, LpError> {
        // Minimize throughout; a maximization is solved as min −f.
        let obj_scale = match lp.sense() {
            Sense::Minimize => 1.0,
            Sense::Maximize => -1.0,
        };

        // Column assignment: fixed variables get no column.
        let mut column: Vec<Option<usize>> = Vec::with_capacity(lp.num_vars());
        let mut fixed_value: Vec<f64> = Vec::with_capacity(lp.num_vars());
        let mut n_col = 0;
        for (_, var) in lp.variables() {
            if var.is_fixed() {
                column.push(None);
                fixed_value.push(var.lower);
            } else {
                column.push(Some(n_col));
                fixed_value.push(0.0);
                n_col += 1;
            }
        }

        let mut eq_rows: Vec<Row> = Vec::new();
        let mut le_rows: Vec<Row> = Vec::new();

        for (id, constraint) in lp.constraints() {
            let sign = match constraint.relation {
                Relation::Ge => -1.0,
                Relation::Eq | Relation::Le => 1.0,
            };
            let mut coeffs = BTreeMap::new();
            let mut rhs = constraint.rhs - constraint.expr.constant_term();
            for (var, coef) in constraint.expr.terms() {
                match column[var.index()] {
                    Some(col) => *coeffs.entry(col).or_insert(0.0) += sign * coef,
                    None => rhs -= coef * fixed_value[var.index()],
                }
            }
            let row = Row {
                coeffs,
                rhs: sign * rhs,
                origin: RowOrigin::Constraint { id, sign },
            };

            if row.coeffs.values().all(|c| *c == 0.0) {
                // Constant row: either trivially satisfied or the program is infeasible.
                let violated = match constraint.relation {
                    Relation::Eq => row.rhs.abs() > CONSTANT_ROW_TOL,
                    Relation::Le | Relation::Ge => row.rhs < -CONSTANT_ROW_TOL,
                };
                if violated {
                    return Ok(LpSolution::with_status(LpStatus::Infeasible));
                }
                continue;
            }

            match constraint.relation {
                Relation::Eq => eq_rows.push(row),
                Relation::Le | Relation::Ge => le_rows.push(row),
            }
        }

        for (var_id, var) in lp.variables() {
            let Some(col) = column[var_id.index()] else {
                continue;
            };
            if var.lower.is_finite() {
                le_rows.push(Row {
                    coeffs: BTreeMap::from([(col, -1.0)]),
                    rhs: -var.lower,
                    origin: RowOrigin::Lower(var_id),
                });
            }
            if var.upper.is_finite() {
                le_rows.push(Row {
                    coeffs: BTreeMap::from([(col, 1.0)]),
                    rhs: var.upper,
                    origin: RowOrigin::Upper(var_id),
                });
            }
        }

        // Objective over free columns; the reported value is re-evaluated on the full assignment.
        let mut q = vec![0.0; n_col];
        for (var, coef) in lp.objective().terms() {
            if let Some(col) = column[var.index()] {
                q[col] += obj_scale * coef;
            }
        }

        if n_col == 0 {
            let mut solution = LpSolution::with_status(LpStatus::Optimal);
            solution.objective = lp.objective().evaluate(&fixed_value);
            solution.values = fixed_value;
            return Ok(solution);
        }

        let n_eq = eq_rows.len();
        let rows: Vec<Row> = eq_rows.into_iter().chain(le_rows).collect();
        let n_row = rows.len();

        let mut cones: Vec<SupportedConeT<f64>> = Vec::new();
        if n_eq > 0 {
            cones.push(SupportedConeT::ZeroConeT(n_eq));
        }
        if n_row > n_eq {
            cones.push(SupportedConeT::NonnegativeConeT(n_row - n_eq));
        }

        // Rows are visited in order, so each column list is already sorted.
        let mut by_column: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n_col];
        let mut b = Vec::with_capacity(n_row);
        for (r, row) in rows.iter().enumerate() {
            for (&col, &val) in &row.coeffs {
                if val != 0.0 {
                    by_column[col].push((r, val));
                }
            }
            b.push(row.rhs);
        }
        let mut col_ptr = Vec::with_capacity(n_col + 1);
        let mut row_idx = Vec::new();
        let mut nz = Vec::new();
        for entries in &by_column {
            col_ptr.push(row_idx.len());
            for &(r, v) in entries {
                row_idx.push(r);
                nz.push(v);
            }
        }
        col_ptr.push(row_idx.len());

        let a = CscMatrix::new(n_row, n_col, col_ptr, row_idx, nz);
        let p = CscMatrix::new(n_col, n_col, vec![0; n_col + 1], Vec::new(), Vec::new());

        let mut clarabel_settings = DefaultSettings::<f64>::default();
        clarabel_settings.verbose = settings.verbose;
        if let Some(limit) = settings.time_limit_secs {
            clarabel_settings.time_limit = limit;
        }
        if let Some(max_iter) = settings.max_iter {
            clarabel_settings.max_iter = max_iter;
        }

        let mut solver = DefaultSolver::new(&p, &q, &a, &b, &cones, clarabel_settings)
            .map_err(|e| LpError::Backend(format!("Clarabel initialization failed: {e:?}")))?;
        solver.solve();
        let sol = &solver.solution;

        let status = map_status(sol.status);
        let mut values = fixed_value;
        for (i, col) in column.iter().enumerate() {
            if let Some(col) = col {
                values[i] = sol.x[*col];
            }
        }

        let mut row_duals = HashMap::new();
        let mut bound_duals: HashMap<VarId, BoundDuals> = HashMap::new();
        // Σᵢ aᵢⱼ zᵢ per fixed variable, for its bound sensitivity.
        let mut fixed_pressure: HashMap<usize, f64> = HashMap::new();

        if status.is_optimal() {
            for (r, row) in rows.iter().enumerate() {
                let z = sol.z[r];
                match row.origin {
                    RowOrigin::Constraint { id, sign } => {
                        // ∂obj/∂rhs = −sign · z for a minimization
                        row_duals.insert(id, -sign * z * obj_scale);
                        if let Some(constraint) = lp.constraint(id) {
                            for (var, coef) in constraint.expr.terms() {
                                if column[var.index()].is_none() {
                                    *fixed_pressure.entry(var.index()).or_insert(0.0) +=
                                        sign * coef * z;
                                }
                            }
                        }
                    }
                    RowOrigin::Lower(var) => {
                        bound_duals.entry(var).or_default().lower = z * obj_scale;
                    }
                    RowOrigin::Upper(var) => {
                        bound_duals.entry(var).or_default().upper = -z * obj_scale;
                    }
                }
            }

            for (var_id, _) in lp.variables() {
                if column[var_id.index()].is_some() {
                    bound_duals.entry(var_id).or_default();
                    continue;
                }
                let c = lp
                    .objective()
                    .terms()
                    .iter()
                    .filter(|(v, _)| *v == var_id)
                    .map(|(_, coef)| obj_scale * coef)
                    .sum::<f64>();
                let pressure = fixed_pressure.get(&var_id.index()).copied().unwrap_or(0.0);
                let d = obj_scale * (c + pressure);
                bound_duals.insert(
                    var_id,
                    BoundDuals {
                        lower: d.max(0.0),
                        upper: d.min(0.0),
                    },
                );
            }
        }

        let objective = lp.objective().evaluate(&values);
        Ok(LpSolution {
            status,
            objective,
            values,
            row_duals,
            bound_duals,
            iterations: sol.iterations,
        })
    }
}

fn map_status(status: SolverStatus) -> LpStatus {
    match status {
        SolverStatus::Solved | SolverStatus::AlmostSolved => LpStatus::Optimal,
        SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
            LpStatus::Infeasible
        }
        SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => LpStatus::Unbounded,
        SolverStatus::MaxIterations => LpStatus::IterationLimit,
        SolverStatus::MaxTime => LpStatus::TimeLimit,
        _ => LpStatus::NumericalError,
    }
}
