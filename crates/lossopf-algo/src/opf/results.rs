//! Result extraction into physical units.
//!
//! Primal values are reported in MW and degrees. Duals are converted as
//! follows (all dual signs read "positive means binding and costly"):
//!
//! | Quantity | Source | Unit |
//! |----------|--------|------|
//! | LMP | balance row dual / base | $/MWh |
//! | upper limit price | −∂cost/∂upper / base | $/MWh |
//! | lower limit price | ∂cost/∂lower / base | $/MWh |
//! | angle price | bound dual · π/180 | $/degree |
//!
//! A dual the backend did not report is `None`, serialized as `null`.

use super::builder::DispatchModel;
use super::losses::LossState;
use crate::lp::{LpSolution, LpStatus, VarId};
use lossopf_core::{BusId, GenId, LineId, LoadId, Network, PerUnit, Radians};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Per-line and per-bus values below this (MW) are left out of the summary.
pub const LOSS_REPORT_THRESHOLD_MW: f64 = 1e-9;
pub const CURTAILMENT_THRESHOLD_MW: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossSummary {
    #[serde(rename = "perdas_totais_mw")]
    pub total_mw: f64,
    #[serde(rename = "perdas_por_linha_mw")]
    pub by_line_mw: BTreeMap<LineId, f64>,
    #[serde(rename = "perdas_por_barra_mw")]
    pub by_bus_mw: BTreeMap<BusId, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurtailmentSummary {
    #[serde(rename = "curtailment_total_mw")]
    pub total_mw: f64,
    #[serde(rename = "curtailment_por_gerador")]
    pub by_gen_mw: BTreeMap<GenId, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadShedding {
    #[serde(rename = "nominal_mw")]
    pub nominal_mw: f64,
    #[serde(rename = "cortado_mw")]
    pub shed_mw: f64,
    #[serde(rename = "atendido_mw")]
    pub served_mw: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheddingSummary {
    #[serde(rename = "corte_total_mw")]
    pub total_mw: f64,
    #[serde(rename = "corte_por_carga")]
    pub by_load: BTreeMap<LoadId, LoadShedding>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryDispatch {
    #[serde(rename = "descarga_mw")]
    pub discharge_mw: f64,
    #[serde(rename = "carga_mw")]
    pub charge_mw: f64,
    #[serde(rename = "injecao_liquida_mw")]
    pub net_injection_mw: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimalResults {
    #[serde(rename = "geracao_mw")]
    pub generation_mw: BTreeMap<GenId, f64>,
    #[serde(rename = "bateria")]
    pub battery: BTreeMap<GenId, BatteryDispatch>,
    #[serde(rename = "corte_carga_mw")]
    pub shed_mw: BTreeMap<LoadId, f64>,
    #[serde(rename = "fluxo_mw")]
    pub flow_mw: BTreeMap<LineId, f64>,
    pub theta_deg: BTreeMap<BusId, f64>,
}

/// Upper and lower limit prices for one entity family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "K: Ord + Serialize",
    deserialize = "K: Ord + Deserialize<'de>"
))]
pub struct BoundPrices<K: Ord> {
    #[serde(rename = "limite_superior")]
    pub upper: BTreeMap<K, Option<f64>>,
    #[serde(rename = "limite_inferior")]
    pub lower: BTreeMap<K, Option<f64>>,
}

impl<K: Ord> Default for BoundPrices<K> {
    fn default() -> Self {
        Self {
            upper: BTreeMap::new(),
            lower: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DualResults {
    pub lmp_usd_mwh: BTreeMap<BusId, Option<f64>>,
    #[serde(rename = "fluxo")]
    pub flow: BoundPrices<LineId>,
    #[serde(rename = "geracao")]
    pub generation: BoundPrices<GenId>,
    #[serde(rename = "corte_carga")]
    pub shed: BoundPrices<LoadId>,
    /// $/degree
    pub theta: BoundPrices<BusId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub solver_status: LpStatus,
    /// Generation, shedding and battery cost in $/h
    #[serde(rename = "custo_total")]
    pub total_cost: f64,
    #[serde(rename = "sumario_perdas")]
    pub losses: LossSummary,
    #[serde(rename = "sumario_curtailment")]
    pub curtailment: CurtailmentSummary,
    #[serde(rename = "sumario_corte")]
    pub shedding: SheddingSummary,
    pub primal_results: PrimalResults,
    pub dual_results: DualResults,
}

/// System-wide power balance in MW.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BalanceCheck {
    pub generation_mw: f64,
    pub battery_net_mw: f64,
    pub shed_mw: f64,
    pub demand_mw: f64,
    pub loss_mw: f64,
    /// generation + battery + shed − demand − loss
    pub residual_mw: f64,
}

impl DispatchReport {
    pub fn balance_check(&self) -> BalanceCheck {
        let generation_mw: f64 = self.primal_results.generation_mw.values().sum();
        let battery_net_mw: f64 = self
            .primal_results
            .battery
            .values()
            .map(|b| b.net_injection_mw)
            .sum();
        let shed_mw = self.shedding.total_mw;
        let demand_mw: f64 = self.shedding.by_load.values().map(|l| l.nominal_mw).sum();
        let loss_mw = self.losses.total_mw;
        BalanceCheck {
            generation_mw,
            battery_net_mw,
            shed_mw,
            demand_mw,
            loss_mw,
            residual_mw: generation_mw + battery_net_mw + shed_mw - demand_mw - loss_mw,
        }
    }

    pub fn served_load_mw(&self) -> f64 {
        self.shedding.by_load.values().map(|l| l.served_mw).sum()
    }
}

fn mw(solution: &LpSolution, var: VarId, base: f64) -> f64 {
    solution.value(var) * base
}

fn bound_prices<K: Ord + Copy>(
    solution: &LpSolution,
    vars: &BTreeMap<K, VarId>,
    scale: f64,
) -> BoundPrices<K> {
    let mut prices = BoundPrices::default();
    for (key, var) in vars {
        let dual = solution.bound_dual(*var);
        prices
            .upper
            .insert(*key, dual.map(|d| -d.upper * scale));
        prices.lower.insert(*key, dual.map(|d| d.lower * scale));
    }
    prices
}

/// Build a report from a solved dispatch model.
///
/// Returns `None` (and logs a warning) unless the solution is optimal.
pub fn extract_report(
    network: &Network,
    model: &DispatchModel,
    solution: &LpSolution,
    losses: &LossState,
) -> Option<DispatchReport> {
    if solution.status != LpStatus::Optimal {
        warn!(status = %solution.status, "not extracting results from a non-optimal solution");
        return None;
    }
    let base = network.base_mva;
    let b = base.value();
    let vars = &model.vars;

    let mut generation_mw = BTreeMap::new();
    let mut curtailment = BTreeMap::new();
    let mut total_cost = 0.0;
    for gen in network.generators() {
        let Some(var) = vars.gen.get(&gen.id) else {
            continue;
        };
        let p = mw(solution, *var, b);
        generation_mw.insert(gen.id, p);
        total_cost += gen.cost_per_mwh() * p;
        if gen.is_wind() {
            let curtailed = gen.pmax.value() - p;
            if curtailed > CURTAILMENT_THRESHOLD_MW {
                curtailment.insert(gen.id, curtailed);
            }
        }
    }

    let mut battery = BTreeMap::new();
    for gen in network.generators() {
        let (Some(params), Some(c), Some(d)) = (
            gen.battery_params(),
            vars.charge.get(&gen.id),
            vars.discharge.get(&gen.id),
        ) else {
            continue;
        };
        let charge_mw = mw(solution, *c, b);
        let discharge_mw = mw(solution, *d, b);
        total_cost += params.cost_charge_per_mwh * charge_mw
            + params.cost_discharge_per_mwh * discharge_mw;
        battery.insert(
            gen.id,
            BatteryDispatch {
                discharge_mw,
                charge_mw,
                net_injection_mw: discharge_mw - charge_mw,
            },
        );
    }

    let mut shed_mw = BTreeMap::new();
    let mut by_load = BTreeMap::new();
    for load in network.loads() {
        let shed = vars.shed.get(&load.id).map(|v| mw(solution, *v, b)).unwrap_or(0.0);
        total_cost += load.shed_cost_per_mwh * shed;
        shed_mw.insert(load.id, shed);
        by_load.insert(
            load.id,
            LoadShedding {
                nominal_mw: load.demand.value(),
                shed_mw: shed,
                served_mw: load.demand.value() - shed,
            },
        );
    }

    let flow_mw = vars
        .flow
        .iter()
        .map(|(id, v)| (*id, mw(solution, *v, b)))
        .collect();
    let theta_deg = vars
        .theta
        .iter()
        .map(|(id, v)| (*id, Radians(solution.value(*v)).to_degrees().value()))
        .collect();

    let to_mw = |pu: f64| PerUnit(pu).to_megawatts(base).value();
    let losses_summary = LossSummary {
        total_mw: to_mw(losses.total()),
        by_line_mw: losses
            .line_loss
            .iter()
            .map(|(id, l)| (*id, to_mw(*l)))
            .filter(|(_, l)| *l > LOSS_REPORT_THRESHOLD_MW)
            .collect(),
        by_bus_mw: losses
            .bus_loss
            .iter()
            .map(|(id, l)| (*id, to_mw(*l)))
            .filter(|(_, l)| *l > LOSS_REPORT_THRESHOLD_MW)
            .collect(),
    };

    let lmp_usd_mwh = network
        .buses()
        .iter()
        .map(|bus| {
            let lmp = model
                .balance_row(bus.id)
                .and_then(|row| solution.row_dual(row))
                .map(|d| d / b);
            (bus.id, lmp)
        })
        .collect();

    let per_mw = if b > 0.0 { 1.0 / b } else { 0.0 };
    let dual_results = DualResults {
        lmp_usd_mwh,
        flow: bound_prices(solution, &vars.flow, per_mw),
        generation: bound_prices(solution, &vars.gen, per_mw),
        shed: bound_prices(solution, &vars.shed, per_mw),
        theta: bound_prices(solution, &vars.theta, std::f64::consts::PI / 180.0),
    };

    Some(DispatchReport {
        solver_status: solution.status,
        total_cost,
        losses: losses_summary,
        curtailment: CurtailmentSummary {
            total_mw: curtailment.values().sum(),
            by_gen_mw: curtailment,
        },
        shedding: SheddingSummary {
            total_mw: shed_mw.values().sum(),
            by_load,
        },
        primal_results: PrimalResults {
            generation_mw,
            battery,
            shed_mw,
            flow_mw,
            theta_deg,
        },
        dual_results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opf::OpfObjective;
    use lossopf_core::cases;

    #[test]
    fn test_non_optimal_yields_none() {
        let net = cases::three_bus();
        let model = DispatchModel::build(&net, OpfObjective::EconomicDispatch).unwrap();
        let solution = LpSolution::with_status(LpStatus::Infeasible);
        assert!(extract_report(&net, &model, &solution, &LossState::zero(&net)).is_none());
    }

    #[test]
    fn test_primal_only_solution_has_null_duals() {
        let net = cases::three_bus();
        let mut model = DispatchModel::build(&net, OpfObjective::EconomicDispatch).unwrap();
        let losses = LossState::zero(&net);
        model.install_balance(&net, &losses).unwrap();

        let mut solution = LpSolution::with_status(LpStatus::Optimal);
        solution.values = vec![0.0; model.lp().num_vars()];
        solution.objective = 0.0;
        let report = extract_report(&net, &model, &solution, &losses).unwrap();

        assert!(report.dual_results.lmp_usd_mwh.values().all(Option::is_none));
        assert!(report.dual_results.flow.upper.values().all(Option::is_none));
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["dual_results"]["lmp_usd_mwh"]["3"].is_null());
        assert_eq!(json["solver_status"], "Optimal");
    }
}
