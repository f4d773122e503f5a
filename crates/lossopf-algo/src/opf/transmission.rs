//! Transmission-cost study.
//!
//! Runs the economic loss iteration, then holds generation, storage,
//! shedding and losses at their converged values and re-solves once with
//! `Σ flow_sign·flow_max·flow` as the objective.

use super::iterative::{LossOpf, LossOpfOutcome};
use super::results::{extract_report, DispatchReport};
use super::types::{LossOpfConfig, OpfObjective};
use crate::OpfError;
use lossopf_core::{LineId, Network};
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Clone)]
pub struct TransmissionOutcome {
    /// The economic solve the study started from
    pub base: LossOpfOutcome,
    /// Line flows of the re-solve in MW
    pub flows: BTreeMap<LineId, f64>,
    /// Transmission objective (per-unit flow weighted by per-unit limits)
    pub objective: f64,
    pub report: Option<DispatchReport>,
}

pub fn solve_transmission(
    network: &Network,
    config: &LossOpfConfig,
) -> Result<TransmissionOutcome, OpfError> {
    let economic = config
        .clone()
        .with_objective(OpfObjective::EconomicDispatch);
    let driver = LossOpf::new(economic)?;
    solve_transmission_with(&driver, network)
}

/// As [`solve_transmission`], with an explicit driver (and solver).
pub fn solve_transmission_with(
    driver: &LossOpf,
    network: &Network,
) -> Result<TransmissionOutcome, OpfError> {
    let base = driver.solve_loss(network)?;
    let mut model = base.model.clone();

    let vars = model.vars.clone();
    let fixed = vars
        .gen
        .values()
        .chain(vars.charge.values())
        .chain(vars.discharge.values())
        .chain(vars.shed.values());
    for var in fixed {
        model.lp_mut().fix(*var, base.solution.value(*var))?;
    }

    // Applied losses match the fixed injections exactly.
    model.install_balance(network, &base.applied_losses)?;
    model.set_transmission_objective(network, &base.losses)?;

    let solution = model.solve(driver.solver(), &driver.config().solver)?;
    if !solution.status.is_optimal() {
        return Err(OpfError::Optimization {
            iteration: 0,
            status: solution.status,
        });
    }

    let b = network.base_mva.value();
    let flows = model
        .vars
        .flow
        .iter()
        .map(|(id, v)| (*id, solution.value(*v) * b))
        .collect();
    info!(objective = solution.objective, "transmission-cost re-solve finished");

    let report = extract_report(network, &model, &solution, &base.applied_losses);
    Ok(TransmissionOutcome {
        objective: solution.objective,
        flows,
        report,
        base,
    })
}
