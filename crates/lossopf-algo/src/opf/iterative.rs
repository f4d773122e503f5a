//! Successive linear approximation of the loss-coupled dispatch.
//!
//! Losses are held constant inside each LP solve and re-estimated from the
//! solved angles between solves:
//!
//! 1. install the balance rows with the current loss estimate
//! 2. solve; a non-optimal status aborts with [`OpfError::Optimization`]
//! 3. re-estimate losses from the new angles
//! 4. stop when `|loss − previous loss| ≤ tolerance`
//!
//! Exhausting `max_iterations` yields [`OpfError::Convergence`]. The loop is
//! written once against [`LossCoupledModel`] and shared by the single- and
//! multi-period models.

use super::builder::DispatchModel;
use super::losses::{estimate_losses, LossState};
use super::results::{extract_report, DispatchReport};
use super::types::{IterationRecord, LossOpfConfig, OpfObjective};
use crate::lp::{LinearProgram, LpSolution, LpSolver};
use crate::OpfError;
use lossopf_core::Network;
use std::sync::Arc;
use tracing::{debug, info};

/// A dispatch model whose balance depends on an external loss estimate.
pub trait LossCoupledModel {
    type Losses: Clone;

    /// Swap the balance rows for ones built from `losses`.
    fn install_balance(&mut self, losses: &Self::Losses) -> Result<(), OpfError>;

    fn lp(&self) -> &LinearProgram;

    /// Losses implied by the angles in `solution`.
    fn estimate(&self, solution: &LpSolution) -> Result<Self::Losses, OpfError>;

    /// Scalar used for the convergence test (per-unit).
    fn total_loss(losses: &Self::Losses) -> f64;
}

/// Converged state of a [`run_fixed_point`] call.
#[derive(Debug, Clone)]
pub struct FixedPoint<L> {
    pub solution: LpSolution,
    /// Losses in the balance rows of the final LP
    pub applied: L,
    /// Losses re-estimated from the final angles
    pub estimated: L,
    pub iterations: usize,
    pub history: Vec<IterationRecord>,
}

pub fn run_fixed_point<M: LossCoupledModel>(
    model: &mut M,
    solver: &dyn LpSolver,
    config: &LossOpfConfig,
    initial: M::Losses,
) -> Result<FixedPoint<M::Losses>, OpfError> {
    let mut applied = initial;
    let mut previous = M::total_loss(&applied);
    let mut last_diff = f64::INFINITY;
    let mut history = Vec::with_capacity(config.max_iterations.min(16));

    for iteration in 1..=config.max_iterations {
        model.install_balance(&applied)?;
        let solution = solver.solve(model.lp(), &config.solver)?;
        if !solution.status.is_optimal() {
            return Err(OpfError::Optimization {
                iteration,
                status: solution.status,
            });
        }

        let estimated = model.estimate(&solution)?;
        let current = M::total_loss(&estimated);
        let diff = (current - previous).abs();
        history.push(IterationRecord {
            iteration,
            total_loss: current,
            loss_diff: diff,
            objective: solution.objective,
        });
        debug!(
            iteration,
            total_loss = current,
            loss_diff = diff,
            objective = solution.objective,
            "loss iteration"
        );

        if diff <= config.tolerance {
            info!(iterations = iteration, total_loss = current, "loss iteration converged");
            return Ok(FixedPoint {
                solution,
                applied,
                estimated,
                iterations: iteration,
                history,
            });
        }

        previous = current;
        last_diff = diff;
        applied = estimated;
    }

    Err(OpfError::Convergence {
        iterations: config.max_iterations,
        last_diff,
    })
}

struct SinglePeriod<'a> {
    network: &'a Network,
    model: DispatchModel,
}

impl LossCoupledModel for SinglePeriod<'_> {
    type Losses = LossState;

    fn install_balance(&mut self, losses: &LossState) -> Result<(), OpfError> {
        self.model.install_balance(self.network, losses)
    }

    fn lp(&self) -> &LinearProgram {
        self.model.lp()
    }

    fn estimate(&self, solution: &LpSolution) -> Result<LossState, OpfError> {
        estimate_losses(self.network, |bus| self.model.theta(solution, bus))
    }

    fn total_loss(losses: &LossState) -> f64 {
        losses.total()
    }
}

/// Result of [`LossOpf::solve_loss`].
#[derive(Debug, Clone)]
pub struct LossOpfOutcome {
    pub model: DispatchModel,
    pub solution: LpSolution,
    /// Losses in the final LP; the solution conserves power against these exactly
    pub applied_losses: LossState,
    pub losses: LossState,
    pub iterations: usize,
    pub history: Vec<IterationRecord>,
}

impl LossOpfOutcome {
    pub fn objective(&self) -> f64 {
        self.solution.objective
    }

    /// Converged total loss in MW.
    pub fn total_loss_mw(&self, network: &Network) -> f64 {
        self.applied_losses.total() * network.base_mva.value()
    }

    pub fn report(&self, network: &Network) -> Option<DispatchReport> {
        extract_report(network, &self.model, &self.solution, &self.applied_losses)
    }
}

/// Loss-iterated DC-OPF driver.
#[derive(Clone)]
pub struct LossOpf {
    config: LossOpfConfig,
    solver: Arc<dyn LpSolver>,
}

impl std::fmt::Debug for LossOpf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LossOpf")
            .field("config", &self.config)
            .field("solver", &self.solver.name())
            .finish()
    }
}

impl LossOpf {
    /// Driver using the backend named in `config`.
    pub fn new(config: LossOpfConfig) -> Result<Self, OpfError> {
        let solver = config.backend.solver()?;
        Ok(Self { config, solver })
    }

    pub fn with_solver(config: LossOpfConfig, solver: Arc<dyn LpSolver>) -> Self {
        Self { config, solver }
    }

    pub fn config(&self) -> &LossOpfConfig {
        &self.config
    }

    pub fn solver(&self) -> &dyn LpSolver {
        self.solver.as_ref()
    }

    /// Solve from zero losses. The network is only read.
    pub fn solve_loss(&self, network: &Network) -> Result<LossOpfOutcome, OpfError> {
        self.solve_loss_from(network, LossState::zero(network))
    }

    /// Solve starting from a previous loss estimate.
    pub fn solve_loss_from(
        &self,
        network: &Network,
        initial: LossState,
    ) -> Result<LossOpfOutcome, OpfError> {
        if self.config.objective == OpfObjective::TransmissionCost {
            return Err(OpfError::DataValidation(
                "transmission-cost objective needs a converged dispatch; use solve_transmission"
                    .into(),
            ));
        }
        let model = DispatchModel::build(network, self.config.objective)?;
        let mut coupled = SinglePeriod { network, model };
        let fixed = run_fixed_point(&mut coupled, self.solver.as_ref(), &self.config, initial)?;

        Ok(LossOpfOutcome {
            model: coupled.model,
            solution: fixed.solution,
            applied_losses: fixed.applied,
            losses: fixed.estimated,
            iterations: fixed.iterations,
            history: fixed.history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lp::ClarabelLp;
    use lossopf_core::cases;

    fn driver(config: LossOpfConfig) -> LossOpf {
        LossOpf::with_solver(config, Arc::new(ClarabelLp))
    }

    #[test]
    fn test_three_bus_converges() {
        let net = cases::three_bus();
        let outcome = driver(LossOpfConfig::default()).solve_loss(&net).unwrap();
        assert!(outcome.iterations > 1 && outcome.iterations < 100);
        assert_eq!(outcome.history.len(), outcome.iterations);
        let last = outcome.history.last().unwrap();
        assert!(last.loss_diff <= 1e-6);
        assert!(outcome.losses.is_consistent(1e-12));
    }

    #[test]
    fn test_transmission_objective_is_rejected_here() {
        let net = cases::three_bus();
        let config = LossOpfConfig::default().with_objective(OpfObjective::TransmissionCost);
        let err = driver(config).solve_loss(&net).unwrap_err();
        assert!(matches!(err, OpfError::DataValidation(_)));
    }

    #[test]
    fn test_zero_iterations_is_a_convergence_error() {
        let net = cases::three_bus();
        let err = driver(LossOpfConfig::default().with_max_iterations(0))
            .solve_loss(&net)
            .unwrap_err();
        assert!(err.is_convergence());
    }

    #[test]
    fn test_network_is_not_mutated() {
        let net = cases::three_bus();
        let before = format!("{:?}", net.lines());
        driver(LossOpfConfig::default()).solve_loss(&net).unwrap();
        assert_eq!(format!("{:?}", net.lines()), before);
    }
}
