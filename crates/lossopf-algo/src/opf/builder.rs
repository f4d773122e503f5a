//! Linear dispatch model (DC approximation).
//!
//! Everything except the nodal balance is created once in
//! [`DispatchModel::build`]. The balance rows live in their own
//! [`ConstraintGroup`] and are swapped by [`DispatchModel::install_balance`]
//! whenever the loss estimate changes.
//!
//! All variables are per-unit on the network base:
//! - `theta_b`: bus angle, `[0, 0]` at the slack, `[-π, π]` elsewhere
//! - `flow_l`: line flow in `[-flow_max, flow_max]`, tied to angles by
//!   `flow = (θ_from − θ_to) / x`
//! - `p_g`: thermal and wind output in `[pmin, pmax]`
//! - `charge_g` / `discharge_g`: battery rates
//! - `shed_d`: load shedding in `[0, demand]`

use super::losses::LossState;
use super::types::OpfObjective;
use crate::lp::{
    ConstraintGroup, ConstraintId, LinearExpr, LinearProgram, LpSolution, LpSolver, Relation,
    Sense, SolverSettings, VarId,
};
use crate::OpfError;
use lossopf_core::{BusId, GenId, GenKind, Line, LineId, LoadId, Network};
use std::collections::BTreeMap;
use std::f64::consts::PI;

/// Entity id → decision variable, owned by the optimization layer.
#[derive(Debug, Clone, Default)]
pub struct VarMap {
    pub theta: BTreeMap<BusId, VarId>,
    pub flow: BTreeMap<LineId, VarId>,
    /// Thermal and wind units
    pub gen: BTreeMap<GenId, VarId>,
    pub charge: BTreeMap<GenId, VarId>,
    pub discharge: BTreeMap<GenId, VarId>,
    pub shed: BTreeMap<LoadId, VarId>,
    pub flow_links: BTreeMap<LineId, ConstraintId>,
}

/// Reject networks the dispatch LP cannot represent.
pub(crate) fn check_network(network: &Network) -> Result<(), OpfError> {
    if network.buses().is_empty() {
        return Err(OpfError::DataValidation("No buses in network".into()));
    }
    for line in network.in_service_lines() {
        check_line(line)?;
    }
    for island in network.islands() {
        let slacks = island
            .iter()
            .filter(|b| network.bus(**b).is_some_and(|bus| bus.is_slack()))
            .count();
        if slacks != 1 {
            let first = island.first().map(|b| b.to_string()).unwrap_or_default();
            return Err(OpfError::DataValidation(format!(
                "island containing {} has {} slack buses, expected exactly one",
                first, slacks
            )));
        }
    }
    for gen in network.generators() {
        if let Some(battery) = gen.battery_params() {
            if battery.soc > battery.capacity {
                return Err(OpfError::DataValidation(format!(
                    "{}: state of charge {} exceeds capacity {}",
                    gen.name, battery.soc, battery.capacity
                )));
            }
        }
    }
    Ok(())
}

fn check_line(line: &Line) -> Result<(), OpfError> {
    if line.has_invalid_impedance() {
        return Err(OpfError::InvalidImpedance {
            line: line.id,
            resistance: line.resistance,
            reactance: line.reactance,
        });
    }
    if line.has_zero_reactance() {
        return Err(OpfError::ZeroReactance { line: line.id });
    }
    Ok(())
}

/// Add one block of dispatch variables and flow links to `lp`.
///
/// `tag` is appended to every name, so several blocks can share a program.
/// With `storage_rows` the single-period state-of-charge limits are added.
pub(crate) fn add_dispatch_block(
    lp: &mut LinearProgram,
    network: &Network,
    tag: &str,
    storage_rows: bool,
) -> Result<VarMap, OpfError> {
    let base = network.base_mva;
    let mut vars = VarMap::default();

    for bus in network.buses() {
        let (lo, hi) = if bus.is_slack() { (0.0, 0.0) } else { (-PI, PI) };
        let v = lp.add_var(format!("theta_{}{tag}", bus.id.value()), lo, hi)?;
        vars.theta.insert(bus.id, v);
    }

    for line in network.in_service_lines() {
        check_line(line)?;
        let limit = line.flow_max.value().abs();
        let flow = lp.add_var(format!("flow_{}{tag}", line.id.value()), -limit, limit)?;
        let theta_from = theta_var(&vars, line.from_bus, &line.name)?;
        let theta_to = theta_var(&vars, line.to_bus, &line.name)?;

        let b = 1.0 / line.reactance;
        let link = LinearExpr::from(flow)
            .with_term(theta_from, -b)
            .with_term(theta_to, b);
        let row = lp.add_constraint(
            format!("flow_link_{}{tag}", line.id.value()),
            link,
            Relation::Eq,
            0.0,
        )?;
        vars.flow.insert(line.id, flow);
        vars.flow_links.insert(line.id, row);
    }

    for gen in network.generators() {
        match &gen.kind {
            GenKind::Thermal { .. } | GenKind::Wind => {
                let v = lp.add_var(
                    format!("p_{}{tag}", gen.id.value()),
                    gen.pmin.to_per_unit(base).value(),
                    gen.pmax.to_per_unit(base).value(),
                )?;
                vars.gen.insert(gen.id, v);
            }
            GenKind::Battery(params) => {
                let charge = lp.add_var(
                    format!("charge_{}{tag}", gen.id.value()),
                    0.0,
                    params.max_charge.to_per_unit(base).value(),
                )?;
                let discharge = lp.add_var(
                    format!("discharge_{}{tag}", gen.id.value()),
                    0.0,
                    params.max_discharge.to_per_unit(base).value(),
                )?;
                if storage_rows {
                    let soc = params.soc.to_per_unit(base).value();
                    let capacity = params.capacity.to_per_unit(base).value();
                    // soc + charge ≤ capacity
                    lp.add_constraint(
                        format!("soc_headroom_{}{tag}", gen.id.value()),
                        LinearExpr::from(charge),
                        Relation::Le,
                        capacity - soc,
                    )?;
                    // soc − discharge ≥ 0
                    lp.add_constraint(
                        format!("soc_floor_{}{tag}", gen.id.value()),
                        LinearExpr::constant(soc).with_term(discharge, -1.0),
                        Relation::Ge,
                        0.0,
                    )?;
                }
                vars.charge.insert(gen.id, charge);
                vars.discharge.insert(gen.id, discharge);
            }
        }
    }

    for load in network.loads() {
        let demand = load.demand.to_per_unit(base).value().max(0.0);
        let v = lp.add_var(format!("shed_{}{tag}", load.id.value()), 0.0, demand)?;
        vars.shed.insert(load.id, v);
    }

    Ok(vars)
}

fn theta_var(vars: &VarMap, bus: BusId, entity: &str) -> Result<VarId, OpfError> {
    vars.theta
        .get(&bus)
        .copied()
        .ok_or_else(|| OpfError::UnknownBus {
            entity: entity.to_string(),
            bus: bus.value(),
        })
}

/// Add one balance row per bus to `group`:
/// `gen + discharge − charge + shed + flow_in − flow_out = demand + loss`.
pub(crate) fn add_balance_rows(
    lp: &mut LinearProgram,
    group: ConstraintGroup,
    network: &Network,
    vars: &VarMap,
    losses: &LossState,
    tag: &str,
) -> Result<BTreeMap<BusId, ConstraintId>, OpfError> {
    let base = network.base_mva;
    let mut exprs: BTreeMap<BusId, LinearExpr> = network
        .buses()
        .iter()
        .map(|b| (b.id, LinearExpr::new()))
        .collect();
    let mut demand: BTreeMap<BusId, f64> = exprs.keys().map(|b| (*b, 0.0)).collect();

    for gen in network.generators() {
        let Some(expr) = exprs.get_mut(&gen.bus) else {
            continue;
        };
        if let Some(p) = vars.gen.get(&gen.id) {
            expr.add_term(*p, 1.0);
        }
        if let Some(d) = vars.discharge.get(&gen.id) {
            expr.add_term(*d, 1.0);
        }
        if let Some(c) = vars.charge.get(&gen.id) {
            expr.add_term(*c, -1.0);
        }
    }

    for load in network.loads() {
        if let Some(expr) = exprs.get_mut(&load.bus) {
            if let Some(s) = vars.shed.get(&load.id) {
                expr.add_term(*s, 1.0);
            }
        }
        if let Some(total) = demand.get_mut(&load.bus) {
            *total += load.demand.to_per_unit(base).value();
        }
    }

    for line in network.in_service_lines() {
        let Some(flow) = vars.flow.get(&line.id) else {
            continue;
        };
        if let Some(expr) = exprs.get_mut(&line.from_bus) {
            expr.add_term(*flow, -1.0);
        }
        if let Some(expr) = exprs.get_mut(&line.to_bus) {
            expr.add_term(*flow, 1.0);
        }
    }

    let mut rows = BTreeMap::new();
    for (bus, expr) in exprs {
        let rhs = demand.get(&bus).copied().unwrap_or(0.0) + losses.bus(bus);
        let row = lp.add_to_group(
            group,
            format!("balance_{}{tag}", bus.value()),
            expr,
            Relation::Eq,
            rhs,
        )?;
        rows.insert(bus, row);
    }
    Ok(rows)
}

/// Objective terms of one dispatch block.
pub(crate) fn block_objective(
    network: &Network,
    vars: &VarMap,
    objective: OpfObjective,
    expr: &mut LinearExpr,
) {
    let base = network.base_mva;
    match objective {
        OpfObjective::EconomicDispatch => {
            for gen in network.generators() {
                if let Some(p) = vars.gen.get(&gen.id) {
                    expr.add_term(*p, base.cost_to_per_unit(gen.cost_per_mwh()));
                }
                if let Some(params) = gen.battery_params() {
                    if let Some(c) = vars.charge.get(&gen.id) {
                        expr.add_term(*c, base.cost_to_per_unit(params.cost_charge_per_mwh));
                    }
                    if let Some(d) = vars.discharge.get(&gen.id) {
                        expr.add_term(*d, base.cost_to_per_unit(params.cost_discharge_per_mwh));
                    }
                }
            }
            for load in network.loads() {
                if let Some(s) = vars.shed.get(&load.id) {
                    expr.add_term(*s, base.cost_to_per_unit(load.shed_cost_per_mwh));
                }
            }
        }
        OpfObjective::MinimizeGeneration => {
            for v in vars.gen.values().chain(vars.discharge.values()) {
                expr.add_term(*v, 1.0);
            }
            for v in vars.shed.values() {
                expr.add_term(*v, 1.0);
            }
        }
        // Set after the economic solve, see `transmission`.
        OpfObjective::TransmissionCost => {}
    }
}

/// Single-period dispatch LP.
#[derive(Debug, Clone)]
pub struct DispatchModel {
    lp: LinearProgram,
    pub vars: VarMap,
    objective: OpfObjective,
    balance: Option<ConstraintGroup>,
    balance_rows: BTreeMap<BusId, ConstraintId>,
}

impl DispatchModel {
    /// Build variables, flow links, storage rows and the objective.
    ///
    /// The balance rows are not present until [`DispatchModel::install_balance`].
    pub fn build(network: &Network, objective: OpfObjective) -> Result<Self, OpfError> {
        check_network(network)?;
        let mut lp = LinearProgram::new();
        let vars = add_dispatch_block(&mut lp, network, "", true)?;

        let mut expr = LinearExpr::new();
        block_objective(network, &vars, objective, &mut expr);
        lp.set_objective(expr, Sense::Minimize)?;

        Ok(Self {
            lp,
            vars,
            objective,
            balance: None,
            balance_rows: BTreeMap::new(),
        })
    }

    /// Replace the balance group with rows using `losses`.
    pub fn install_balance(&mut self, network: &Network, losses: &LossState) -> Result<(), OpfError> {
        if let Some(group) = self.balance.take() {
            self.lp.remove_group(group)?;
        }
        let group = self.lp.add_group("nodal_balance");
        self.balance_rows = add_balance_rows(&mut self.lp, group, network, &self.vars, losses, "")?;
        self.balance = Some(group);
        Ok(())
    }

    /// Replace the objective with `Σ flow_sign·flow_max·flow`.
    ///
    /// Unrated lines contribute nothing.
    pub fn set_transmission_objective(
        &mut self,
        network: &Network,
        losses: &LossState,
    ) -> Result<(), OpfError> {
        let mut expr = LinearExpr::new();
        for line in network.in_service_lines() {
            let limit = line.flow_max.value();
            if !limit.is_finite() {
                continue;
            }
            if let Some(flow) = self.vars.flow.get(&line.id) {
                expr.add_term(*flow, losses.sign(line.id).as_f64() * limit);
            }
        }
        self.lp.set_objective(expr, Sense::Minimize)?;
        self.objective = OpfObjective::TransmissionCost;
        Ok(())
    }

    pub fn solve(
        &self,
        solver: &dyn LpSolver,
        settings: &SolverSettings,
    ) -> Result<LpSolution, OpfError> {
        Ok(solver.solve(&self.lp, settings)?)
    }

    pub fn balance_row(&self, bus: BusId) -> Option<ConstraintId> {
        self.balance_rows.get(&bus).copied()
    }

    pub fn balance_group(&self) -> Option<ConstraintGroup> {
        self.balance
    }

    pub fn flow_link(&self, line: LineId) -> Option<ConstraintId> {
        self.vars.flow_links.get(&line).copied()
    }

    pub fn lp(&self) -> &LinearProgram {
        &self.lp
    }

    pub(crate) fn lp_mut(&mut self) -> &mut LinearProgram {
        &mut self.lp
    }

    pub fn objective(&self) -> OpfObjective {
        self.objective
    }

    /// Solved bus angle in radians; NaN when the bus is unknown.
    pub fn theta(&self, solution: &LpSolution, bus: BusId) -> f64 {
        self.vars
            .theta
            .get(&bus)
            .map(|v| solution.value(*v))
            .unwrap_or(f64::NAN)
    }
}
