//! Multi-period dispatch with storage dynamics and ramp limits.
//!
//! Each period gets its own block of dispatch variables. Periods are coupled
//! by battery state of charge
//!
//! ```text
//! soc_t = soc_{t-1} + charge_t·η_c − discharge_t/η_d,   0 ≤ soc_t ≤ capacity
//! ```
//!
//! and by thermal ramp limits. Losses are iterated per period with the
//! same fixed-point loop as the single-period model. Periods are one hour.

use super::builder::{add_balance_rows, add_dispatch_block, block_objective, check_network, VarMap};
use super::iterative::{run_fixed_point, LossCoupledModel, LossOpf};
use super::losses::{estimate_losses, LossState};
use super::results::BatteryDispatch;
use super::types::{IterationRecord, LossOpfConfig, OpfObjective};
use crate::lp::{
    ConstraintGroup, ConstraintId, LinearExpr, LinearProgram, LpSolution, Relation, Sense, VarId,
};
use crate::OpfError;
use lossopf_core::{BusId, GenId, GenKind, LoadId, MegawattHours, Megawatts, Network};
use serde::Serialize;
use std::collections::BTreeMap;

/// Time series inputs. Missing series hold the network's own values.
#[derive(Debug, Clone, Default)]
pub struct MultiPeriodStudy {
    pub periods: usize,
    pub load_series: BTreeMap<LoadId, Vec<Megawatts>>,
    /// Available wind power per period
    pub wind_series: BTreeMap<GenId, Vec<Megawatts>>,
    /// Overrides the battery's own `soc`
    pub initial_soc: BTreeMap<GenId, MegawattHours>,
}

impl MultiPeriodStudy {
    pub fn new(periods: usize) -> Self {
        Self {
            periods,
            ..Self::default()
        }
    }

    pub fn with_load_series(mut self, load: LoadId, series: Vec<Megawatts>) -> Self {
        self.load_series.insert(load, series);
        self
    }

    pub fn with_wind_series(mut self, gen: GenId, series: Vec<Megawatts>) -> Self {
        self.wind_series.insert(gen, series);
        self
    }

    pub fn with_initial_soc(mut self, gen: GenId, soc: MegawattHours) -> Self {
        self.initial_soc.insert(gen, soc);
        self
    }

    /// Scale every load and wind unit by per-period multipliers.
    ///
    /// An empty slice means a flat profile. Non-empty slices must have the
    /// same length, which sets the number of periods.
    pub fn from_multipliers(
        network: &Network,
        periods: usize,
        load: &[f64],
        wind: &[f64],
    ) -> Result<Self, OpfError> {
        for (name, profile) in [("load", load), ("wind", wind)] {
            if !profile.is_empty() && profile.len() != periods {
                return Err(OpfError::DataValidation(format!(
                    "{name} profile has {} entries, expected {periods}",
                    profile.len()
                )));
            }
        }
        let mut study = Self::new(periods);
        if !load.is_empty() {
            for l in network.loads() {
                study
                    .load_series
                    .insert(l.id, load.iter().map(|m| l.demand * *m).collect());
            }
        }
        if !wind.is_empty() {
            for g in network.generators().into_iter().filter(|g| g.is_wind()) {
                study
                    .wind_series
                    .insert(g.id, wind.iter().map(|m| g.pmax * *m).collect());
            }
        }
        Ok(study)
    }

    pub fn validate(&self, network: &Network) -> Result<(), OpfError> {
        if self.periods == 0 {
            return Err(OpfError::DataValidation("study needs at least one period".into()));
        }
        for (id, series) in &self.load_series {
            if !network.loads().iter().any(|l| l.id == *id) {
                return Err(OpfError::DataValidation(format!("series for unknown {id}")));
            }
            self.check_len(&id.to_string(), series.len())?;
        }
        for (id, series) in &self.wind_series {
            if !network.generators().iter().any(|g| g.id == *id && g.is_wind()) {
                return Err(OpfError::DataValidation(format!("{id} is not a wind unit")));
            }
            self.check_len(&id.to_string(), series.len())?;
        }
        for (id, soc) in &self.initial_soc {
            let params = network
                .generators()
                .into_iter()
                .find(|g| g.id == *id)
                .and_then(|g| g.battery_params().cloned())
                .ok_or_else(|| OpfError::DataValidation(format!("{id} is not a battery")))?;
            if soc.value() < 0.0 || *soc > params.capacity {
                return Err(OpfError::DataValidation(format!(
                    "initial state of charge {soc} of {id} is outside [0, {}]",
                    params.capacity
                )));
            }
        }
        Ok(())
    }

    fn check_len(&self, what: &str, len: usize) -> Result<(), OpfError> {
        if len != self.periods {
            return Err(OpfError::DataValidation(format!(
                "series for {what} has {len} entries, expected {}",
                self.periods
            )));
        }
        Ok(())
    }

    /// One network per period with the series applied.
    pub fn period_networks(&self, network: &Network) -> Result<Vec<Network>, OpfError> {
        self.validate(network)?;
        let mut nets = Vec::with_capacity(self.periods);
        for t in 0..self.periods {
            let mut net = network.clone();
            for load in net.loads_mut() {
                if let Some(series) = self.load_series.get(&load.id) {
                    load.demand = series[t];
                }
            }
            for gen in net.generators_mut() {
                if let Some(series) = self.wind_series.get(&gen.id) {
                    gen.pmax = series[t];
                }
            }
            nets.push(net);
        }
        Ok(nets)
    }
}

struct MultiPeriodModel {
    networks: Vec<Network>,
    lp: LinearProgram,
    blocks: Vec<VarMap>,
    soc: Vec<BTreeMap<GenId, VarId>>,
    balance: Option<ConstraintGroup>,
    balance_rows: Vec<BTreeMap<BusId, ConstraintId>>,
}

impl MultiPeriodModel {
    fn build(networks: Vec<Network>, study: &MultiPeriodStudy) -> Result<Self, OpfError> {
        let mut lp = LinearProgram::new();
        let mut blocks: Vec<VarMap> = Vec::with_capacity(networks.len());
        let mut soc: Vec<BTreeMap<GenId, VarId>> = Vec::with_capacity(networks.len());
        let mut objective = LinearExpr::new();

        for (t, net) in networks.iter().enumerate() {
            check_network(net)?;
            let tag = format!("_t{t}");
            let vars = add_dispatch_block(&mut lp, net, &tag, false)?;
            block_objective(net, &vars, OpfObjective::EconomicDispatch, &mut objective);
            let base = net.base_mva;

            let mut soc_t = BTreeMap::new();
            for gen in net.generators() {
                let Some(params) = gen.battery_params() else {
                    continue;
                };
                let (Some(charge), Some(discharge)) =
                    (vars.charge.get(&gen.id), vars.discharge.get(&gen.id))
                else {
                    continue;
                };
                let capacity = params.capacity.to_per_unit(base).value();
                let s = lp.add_var(format!("soc_{}{tag}", gen.id.value()), 0.0, capacity)?;

                // soc_t − η_c·charge_t + discharge_t/η_d − soc_{t−1} = 0
                let mut expr = LinearExpr::from(s)
                    .with_term(*charge, -params.efficiency_charge)
                    .with_term(*discharge, 1.0 / params.efficiency_discharge);
                let prior = t
                    .checked_sub(1)
                    .and_then(|p| soc.get(p))
                    .and_then(|prev| prev.get(&gen.id).copied());
                let rhs = match prior {
                    Some(prev) => {
                        expr.add_term(prev, -1.0);
                        0.0
                    }
                    None => study
                        .initial_soc
                        .get(&gen.id)
                        .copied()
                        .unwrap_or(params.soc)
                        .to_per_unit(base)
                        .value(),
                };
                lp.add_constraint(
                    format!("soc_dynamics_{}{tag}", gen.id.value()),
                    expr,
                    Relation::Eq,
                    rhs,
                )?;
                soc_t.insert(gen.id, s);
            }

            if let Some(prev) = blocks.last() {
                for gen in net.generators() {
                    let GenKind::Thermal {
                        ramp_up, ramp_down, ..
                    } = &gen.kind
                    else {
                        continue;
                    };
                    let (Some(p), Some(p_prev)) = (vars.gen.get(&gen.id), prev.gen.get(&gen.id))
                    else {
                        continue;
                    };
                    let up = ramp_up.unwrap_or(gen.pmax).to_per_unit(base).value();
                    let down = ramp_down.unwrap_or(gen.pmax).to_per_unit(base).value();
                    lp.add_constraint(
                        format!("ramp_up_{}{tag}", gen.id.value()),
                        LinearExpr::from(*p).with_term(*p_prev, -1.0),
                        Relation::Le,
                        up,
                    )?;
                    lp.add_constraint(
                        format!("ramp_down_{}{tag}", gen.id.value()),
                        LinearExpr::from(*p_prev).with_term(*p, -1.0),
                        Relation::Le,
                        down,
                    )?;
                }
            }

            blocks.push(vars);
            soc.push(soc_t);
        }

        lp.set_objective(objective, Sense::Minimize)?;
        Ok(Self {
            networks,
            lp,
            blocks,
            soc,
            balance: None,
            balance_rows: Vec::new(),
        })
    }
}

impl LossCoupledModel for MultiPeriodModel {
    type Losses = Vec<LossState>;

    fn install_balance(&mut self, losses: &Vec<LossState>) -> Result<(), OpfError> {
        if let Some(group) = self.balance.take() {
            self.lp.remove_group(group)?;
        }
        let group = self.lp.add_group("nodal_balance");
        let mut rows = Vec::with_capacity(self.networks.len());
        for (t, (net, vars)) in self.networks.iter().zip(&self.blocks).enumerate() {
            let zero;
            let period_losses = match losses.get(t) {
                Some(l) => l,
                None => {
                    zero = LossState::zero(net);
                    &zero
                }
            };
            rows.push(add_balance_rows(
                &mut self.lp,
                group,
                net,
                vars,
                period_losses,
                &format!("_t{t}"),
            )?);
        }
        self.balance_rows = rows;
        self.balance = Some(group);
        Ok(())
    }

    fn lp(&self) -> &LinearProgram {
        &self.lp
    }

    fn estimate(&self, solution: &LpSolution) -> Result<Vec<LossState>, OpfError> {
        self.networks
            .iter()
            .zip(&self.blocks)
            .map(|(net, vars)| {
                estimate_losses(net, |bus| {
                    vars.theta
                        .get(&bus)
                        .map(|v| solution.value(*v))
                        .unwrap_or(f64::NAN)
                })
            })
            .collect()
    }

    fn total_loss(losses: &Vec<LossState>) -> f64 {
        losses.iter().map(LossState::total).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodResult {
    pub period: usize,
    /// Thermal and wind output
    pub generation_mw: BTreeMap<GenId, f64>,
    pub battery: BTreeMap<GenId, BatteryDispatch>,
    /// End-of-period state of charge
    pub battery_soc_mwh: BTreeMap<GenId, f64>,
    pub shed_mw: BTreeMap<LoadId, f64>,
    pub total_loss_mw: f64,
    /// $/MWh; `None` when the backend reports no duals
    pub lmp: BTreeMap<BusId, Option<f64>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MultiPeriodOutcome {
    pub periods: Vec<PeriodResult>,
    /// Summed objective over all periods in $
    pub total_cost: f64,
    pub total_loss_mw: f64,
    pub iterations: usize,
    pub history: Vec<IterationRecord>,
}

pub fn solve_multiperiod(
    network: &Network,
    study: &MultiPeriodStudy,
    config: &LossOpfConfig,
) -> Result<MultiPeriodOutcome, OpfError> {
    let driver = LossOpf::new(config.clone())?;
    solve_multiperiod_with(&driver, network, study)
}

pub fn solve_multiperiod_with(
    driver: &LossOpf,
    network: &Network,
    study: &MultiPeriodStudy,
) -> Result<MultiPeriodOutcome, OpfError> {
    let networks = study.period_networks(network)?;
    let initial: Vec<LossState> = networks.iter().map(LossState::zero).collect();
    let mut model = MultiPeriodModel::build(networks, study)?;
    let fixed = run_fixed_point(&mut model, driver.solver(), driver.config(), initial)?;

    let solution = &fixed.solution;
    let b = network.base_mva.value();
    let mut periods = Vec::with_capacity(model.networks.len());
    for (t, vars) in model.blocks.iter().enumerate() {
        let value_mw = |v: &VarId| solution.value(*v) * b;
        let battery = vars
            .discharge
            .iter()
            .map(|(id, d)| {
                let charge_mw = vars.charge.get(id).map(value_mw).unwrap_or(0.0);
                let discharge_mw = value_mw(d);
                let dispatch = BatteryDispatch {
                    discharge_mw,
                    charge_mw,
                    net_injection_mw: discharge_mw - charge_mw,
                };
                (*id, dispatch)
            })
            .collect();
        let lmp = model
            .balance_rows
            .get(t)
            .map(|rows| {
                rows.iter()
                    .map(|(bus, row)| (*bus, solution.row_dual(*row).map(|d| d / b)))
                    .collect()
            })
            .unwrap_or_default();
        periods.push(PeriodResult {
            period: t,
            generation_mw: vars.gen.iter().map(|(id, v)| (*id, value_mw(v))).collect(),
            battery,
            battery_soc_mwh: model.soc[t]
                .iter()
                .map(|(id, v)| (*id, value_mw(v)))
                .collect(),
            shed_mw: vars.shed.iter().map(|(id, v)| (*id, value_mw(v))).collect(),
            total_loss_mw: fixed.applied.get(t).map(LossState::total).unwrap_or(0.0) * b,
            lmp,
        });
    }

    Ok(MultiPeriodOutcome {
        total_loss_mw: periods.iter().map(|p| p.total_loss_mw).sum(),
        total_cost: solution.objective,
        periods,
        iterations: fixed.iterations,
        history: fixed.history,
    })
}
