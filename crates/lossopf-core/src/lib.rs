//! # lossopf-core: network model for loss-aware DC dispatch
//!
//! Buses, generators and loads are graph nodes; lines are graph edges. The
//! entities are plain data: nothing in this crate knows about decision
//! variables or solver state. The optimization layer (`lossopf-algo`) keeps
//! its own id → variable maps.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lossopf_core::*;
//!
//! let mut network = Network::new();
//! network.add_bus(Bus::slack(BusId::new(1), "Bus 1"))?;
//! network.add_bus(Bus::new(BusId::new(2), "Bus 2"))?;
//!
//! network.add_line(
//!     Line::new(LineId::new(1), "L1-2", BusId::new(1), BusId::new(2), 0.01, 0.1)
//!         .with_flow_max(0.5),
//! )?;
//! network.add_gen(
//!     Gen::thermal(GenId::new(1), "G1", BusId::new(1), 10.0).with_p_limits(0.0, 100.0),
//! )?;
//! network.add_load(Load::new(LoadId::new(1), "D2", BusId::new(2), Megawatts(40.0)))?;
//! # Ok::<(), CoreError>(())
//! ```
//!
//! ## Units
//!
//! Powers and energies are stored in MW/MWh, costs in $/MWh, line parameters
//! in per-unit on [`Network::base_mva`]. See [`units`] for the conversions.

use petgraph::prelude::*;
use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod admittance;
pub mod case;
pub mod cases;
pub mod diagnostics;
pub mod error;
pub mod units;

pub use admittance::AdmittanceMatrix;
pub use case::{load_case, CaseFile};
pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{CoreError, CoreResult};
pub use units::{Degrees, MegavoltAmperes, MegawattHours, Megawatts, PerUnit, Radians};

/// Reactances below this magnitude are treated as zero.
pub const MIN_REACTANCE: f64 = 1e-12;

macro_rules! entity_id {
    ($name:ident, $label:literal) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(usize);

        impl $name {
            #[inline]
            pub fn new(value: usize) -> Self {
                $name(value)
            }
            #[inline]
            pub fn value(&self) -> usize {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{} {}", $label, self.0)
            }
        }
    };
}

entity_id!(BusId, "Bus");
entity_id!(LineId, "Line");
entity_id!(GenId, "Gen");
entity_id!(LoadId, "Load");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusType {
    /// Angle reference; exactly one per island
    Slack,
    #[default]
    Pq,
    Pv,
}

#[derive(Debug, Clone)]
pub struct Bus {
    pub id: BusId,
    pub name: String,
    pub kind: BusType,
    /// Voltage magnitude, held at 1.0 pu by the linearized model
    pub voltage_pu: PerUnit,
}

impl Bus {
    pub fn new(id: BusId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: BusType::Pq,
            voltage_pu: PerUnit::ONE,
        }
    }

    pub fn slack(id: BusId, name: impl Into<String>) -> Self {
        Self::new(id, name).with_kind(BusType::Slack)
    }

    pub fn with_kind(mut self, kind: BusType) -> Self {
        self.kind = kind;
        self
    }

    pub fn is_slack(&self) -> bool {
        self.kind == BusType::Slack
    }
}

#[derive(Debug, Clone)]
pub struct Line {
    pub id: LineId,
    pub name: String,
    pub from_bus: BusId,
    pub to_bus: BusId,
    /// Series resistance (per-unit)
    pub resistance: f64,
    /// Series reactance (per-unit)
    pub reactance: f64,
    /// Total charging susceptance (per-unit)
    pub charging_b: PerUnit,
    /// Off-nominal tap magnitude at the from side; `None` for plain lines
    pub tap_ratio: Option<f64>,
    /// Symmetric active-power flow limit; infinite when unrated
    pub flow_max: PerUnit,
    pub in_service: bool,
}

impl Line {
    pub fn new(
        id: LineId,
        name: impl Into<String>,
        from_bus: BusId,
        to_bus: BusId,
        resistance: f64,
        reactance: f64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            from_bus,
            to_bus,
            resistance,
            reactance,
            charging_b: PerUnit::ZERO,
            tap_ratio: None,
            flow_max: PerUnit(f64::INFINITY),
            in_service: true,
        }
    }

    pub fn with_flow_max(mut self, flow_max_pu: f64) -> Self {
        self.flow_max = PerUnit(flow_max_pu);
        self
    }

    pub fn with_charging(mut self, b_pu: f64) -> Self {
        self.charging_b = PerUnit(b_pu);
        self
    }

    pub fn with_tap(mut self, ratio: f64) -> Self {
        self.tap_ratio = Some(ratio);
        self
    }

    /// Series conductance `g = r / (r² + x²)`, zero for a zero impedance.
    pub fn series_conductance(&self) -> f64 {
        let denom = self.resistance.powi(2) + self.reactance.powi(2);
        if denom == 0.0 {
            0.0
        } else {
            self.resistance / denom
        }
    }

    pub fn has_zero_reactance(&self) -> bool {
        self.reactance.abs() < MIN_REACTANCE
    }

    /// Negative or non-finite resistance, or a non-finite reactance.
    /// Such a line would report a negative or undefined loss.
    pub fn has_invalid_impedance(&self) -> bool {
        !(self.resistance.is_finite() && self.reactance.is_finite()) || self.resistance < 0.0
    }
}

/// Storage parameters for a battery unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatteryParams {
    pub capacity: MegawattHours,
    /// Stored energy at the start of the study
    pub soc: MegawattHours,
    pub max_charge: Megawatts,
    pub max_discharge: Megawatts,
    pub efficiency_charge: f64,
    pub efficiency_discharge: f64,
    /// Negative values pay the unit to absorb energy
    pub cost_charge_per_mwh: f64,
    pub cost_discharge_per_mwh: f64,
}

impl Default for BatteryParams {
    fn default() -> Self {
        Self {
            capacity: MegawattHours(0.0),
            soc: MegawattHours(0.0),
            max_charge: Megawatts(0.0),
            max_discharge: Megawatts(0.0),
            efficiency_charge: 0.95,
            efficiency_discharge: 0.95,
            cost_charge_per_mwh: -1.0,
            cost_discharge_per_mwh: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenKind {
    Thermal {
        cost_per_mwh: f64,
        /// Multi-period ramp limits; `None` means `pmax`
        ramp_up: Option<Megawatts>,
        ramp_down: Option<Megawatts>,
    },
    /// Variable renewable unit; `pmax` is the available power
    Wind,
    Battery(BatteryParams),
}

#[derive(Debug, Clone)]
pub struct Gen {
    pub id: GenId,
    pub name: String,
    pub bus: BusId,
    pub pmin: Megawatts,
    pub pmax: Megawatts,
    pub kind: GenKind,
}

impl Gen {
    pub fn thermal(id: GenId, name: impl Into<String>, bus: BusId, cost_per_mwh: f64) -> Self {
        Self {
            id,
            name: name.into(),
            bus,
            pmin: Megawatts(0.0),
            pmax: Megawatts(0.0),
            kind: GenKind::Thermal {
                cost_per_mwh,
                ramp_up: None,
                ramp_down: None,
            },
        }
    }

    pub fn wind(id: GenId, name: impl Into<String>, bus: BusId, available: Megawatts) -> Self {
        Self {
            id,
            name: name.into(),
            bus,
            pmin: Megawatts(0.0),
            pmax: available,
            kind: GenKind::Wind,
        }
    }

    /// Battery unit; the power limits mirror the charge/discharge rates.
    pub fn battery(id: GenId, name: impl Into<String>, bus: BusId, params: BatteryParams) -> Self {
        Self {
            id,
            name: name.into(),
            bus,
            pmin: -params.max_charge,
            pmax: params.max_discharge,
            kind: GenKind::Battery(params),
        }
    }

    pub fn with_p_limits(mut self, pmin_mw: f64, pmax_mw: f64) -> Self {
        self.pmin = Megawatts(pmin_mw);
        self.pmax = Megawatts(pmax_mw);
        self
    }

    /// Set ramp limits on a thermal unit; ignored for other kinds.
    pub fn with_ramp_limits(mut self, up_mw: f64, down_mw: f64) -> Self {
        if let GenKind::Thermal {
            ramp_up, ramp_down, ..
        } = &mut self.kind
        {
            *ramp_up = Some(Megawatts(up_mw));
            *ramp_down = Some(Megawatts(down_mw));
        }
        self
    }

    pub fn is_thermal(&self) -> bool {
        matches!(self.kind, GenKind::Thermal { .. })
    }

    pub fn is_wind(&self) -> bool {
        matches!(self.kind, GenKind::Wind)
    }

    pub fn battery_params(&self) -> Option<&BatteryParams> {
        match &self.kind {
            GenKind::Battery(params) => Some(params),
            _ => None,
        }
    }

    /// Linear output cost in $/MWh (zero for wind and batteries).
    pub fn cost_per_mwh(&self) -> f64 {
        match self.kind {
            GenKind::Thermal { cost_per_mwh, .. } => cost_per_mwh,
            GenKind::Wind | GenKind::Battery(_) => 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Load {
    pub id: LoadId,
    pub name: String,
    pub bus: BusId,
    /// Nominal active demand
    pub demand: Megawatts,
    pub shed_cost_per_mwh: f64,
}

impl Load {
    pub const DEFAULT_SHED_COST: f64 = 10_000.0;

    pub fn new(id: LoadId, name: impl Into<String>, bus: BusId, demand: Megawatts) -> Self {
        Self {
            id,
            name: name.into(),
            bus,
            demand,
            shed_cost_per_mwh: Self::DEFAULT_SHED_COST,
        }
    }

    pub fn with_shed_cost(mut self, cost_per_mwh: f64) -> Self {
        self.shed_cost_per_mwh = cost_per_mwh;
        self
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    Bus(Bus),
    Gen(Gen),
    Load(Load),
}

impl Node {
    pub fn label(&self) -> &str {
        match self {
            Node::Bus(b) => &b.name,
            Node::Gen(g) => &g.name,
            Node::Load(l) => &l.name,
        }
    }
}

/// The power network graph.
///
/// Generator and load nodes are not connected by edges; they reference their
/// bus by id. Only lines are edges, so topology queries run over buses.
#[derive(Debug, Clone)]
pub struct Network {
    pub base_mva: MegavoltAmperes,
    pub graph: Graph<Node, Line, Undirected>,
    bus_index: HashMap<BusId, NodeIndex>,
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

impl Network {
    pub const DEFAULT_BASE_MVA: f64 = 100.0;

    pub fn new() -> Self {
        Self::with_base_mva(Self::DEFAULT_BASE_MVA)
    }

    pub fn with_base_mva(base_mva: f64) -> Self {
        Self {
            base_mva: MegavoltAmperes(base_mva),
            graph: Graph::new_undirected(),
            bus_index: HashMap::new(),
        }
    }

    pub fn add_bus(&mut self, bus: Bus) -> CoreResult<NodeIndex> {
        if self.bus_index.contains_key(&bus.id) {
            return Err(CoreError::Network(format!("duplicate {}", bus.id)));
        }
        let id = bus.id;
        let idx = self.graph.add_node(Node::Bus(bus));
        self.bus_index.insert(id, idx);
        Ok(idx)
    }

    pub fn add_line(&mut self, line: Line) -> CoreResult<EdgeIndex> {
        if self.lines().iter().any(|l| l.id == line.id) {
            return Err(CoreError::Network(format!("duplicate {}", line.id)));
        }
        let from = self.require_bus(line.from_bus, &line.name)?;
        let to = self.require_bus(line.to_bus, &line.name)?;
        Ok(self.graph.add_edge(from, to, line))
    }

    pub fn add_gen(&mut self, gen: Gen) -> CoreResult<NodeIndex> {
        self.require_bus(gen.bus, &gen.name)?;
        if self.generators().iter().any(|g| g.id == gen.id) {
            return Err(CoreError::Network(format!("duplicate {}", gen.id)));
        }
        Ok(self.graph.add_node(Node::Gen(gen)))
    }

    pub fn add_load(&mut self, load: Load) -> CoreResult<NodeIndex> {
        self.require_bus(load.bus, &load.name)?;
        if self.loads().iter().any(|l| l.id == load.id) {
            return Err(CoreError::Network(format!("duplicate {}", load.id)));
        }
        Ok(self.graph.add_node(Node::Load(load)))
    }

    fn require_bus(&self, bus: BusId, entity: &str) -> CoreResult<NodeIndex> {
        self.bus_index
            .get(&bus)
            .copied()
            .ok_or_else(|| CoreError::UnknownBus {
                entity: entity.to_string(),
                bus: bus.value(),
            })
    }

    pub fn bus(&self, id: BusId) -> Option<&Bus> {
        let idx = self.bus_index.get(&id)?;
        match &self.graph[*idx] {
            Node::Bus(b) => Some(b),
            _ => None,
        }
    }

    pub fn contains_bus(&self, id: BusId) -> bool {
        self.bus_index.contains_key(&id)
    }

    /// All buses in insertion order
    pub fn buses(&self) -> Vec<&Bus> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Bus(b) => Some(b),
                _ => None,
            })
            .collect()
    }

    /// All lines, in service or not, in edge order
    pub fn lines(&self) -> Vec<&Line> {
        self.graph.edge_weights().collect()
    }

    pub fn in_service_lines(&self) -> Vec<&Line> {
        self.graph.edge_weights().filter(|l| l.in_service).collect()
    }

    pub fn generators(&self) -> Vec<&Gen> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Gen(g) => Some(g),
                _ => None,
            })
            .collect()
    }

    pub fn loads(&self) -> Vec<&Load> {
        self.graph
            .node_weights()
            .filter_map(|n| match n {
                Node::Load(l) => Some(l),
                _ => None,
            })
            .collect()
    }

    pub fn generators_at_bus(&self, bus_id: BusId) -> Vec<&Gen> {
        self.generators()
            .into_iter()
            .filter(|g| g.bus == bus_id)
            .collect()
    }

    pub fn loads_at_bus(&self, bus_id: BusId) -> Vec<&Load> {
        self.loads()
            .into_iter()
            .filter(|l| l.bus == bus_id)
            .collect()
    }

    pub fn line_mut(&mut self, id: LineId) -> Option<&mut Line> {
        self.graph.edge_weights_mut().find(|l| l.id == id)
    }

    pub fn gen_mut(&mut self, id: GenId) -> Option<&mut Gen> {
        self.generators_mut().find(|g| g.id == id)
    }

    pub fn load_mut(&mut self, id: LoadId) -> Option<&mut Load> {
        self.loads_mut().find(|l| l.id == id)
    }

    pub fn generators_mut(&mut self) -> impl Iterator<Item = &mut Gen> {
        self.graph.node_weights_mut().filter_map(|n| match n {
            Node::Gen(g) => Some(g),
            _ => None,
        })
    }

    pub fn loads_mut(&mut self) -> impl Iterator<Item = &mut Load> {
        self.graph.node_weights_mut().filter_map(|n| match n {
            Node::Load(l) => Some(l),
            _ => None,
        })
    }

    /// Remove a line from the topology, returning it.
    pub fn remove_line(&mut self, id: LineId) -> Option<Line> {
        let edge = self.graph.edge_indices().find(|e| self.graph[*e].id == id)?;
        self.graph.remove_edge(edge)
    }

    pub fn total_load_mw(&self) -> Megawatts {
        self.loads().iter().map(|l| l.demand).sum()
    }

    /// Sum of maximum outputs; batteries count at their discharge rate.
    pub fn total_capacity_mw(&self) -> Megawatts {
        self.generators()
            .iter()
            .map(|g| g.pmax)
            .filter(|p| p.is_finite())
            .sum()
    }

    /// Group buses into islands connected by in-service lines.
    ///
    /// Islands are ordered by their first bus in insertion order, and buses
    /// within an island keep insertion order.
    pub fn islands(&self) -> Vec<Vec<BusId>> {
        let buses = self.buses();
        let position: HashMap<BusId, usize> =
            buses.iter().enumerate().map(|(i, b)| (b.id, i)).collect();

        let mut sets = UnionFind::<usize>::new(buses.len());
        for line in self.in_service_lines() {
            if let (Some(&a), Some(&b)) = (position.get(&line.from_bus), position.get(&line.to_bus)) {
                sets.union(a, b);
            }
        }

        let mut root_order: Vec<usize> = Vec::new();
        let mut members: HashMap<usize, Vec<BusId>> = HashMap::new();
        for (i, bus) in buses.iter().enumerate() {
            let root = sets.find(i);
            if !members.contains_key(&root) {
                root_order.push(root);
            }
            members.entry(root).or_default().push(bus.id);
        }
        root_order
            .into_iter()
            .filter_map(|root| members.remove(&root))
            .collect()
    }

    pub fn stats(&self) -> NetworkStats {
        let mut stats = NetworkStats::default();
        for node in self.graph.node_weights() {
            match node {
                Node::Bus(_) => stats.num_buses += 1,
                Node::Gen(g) => {
                    stats.num_gens += 1;
                    match g.kind {
                        GenKind::Wind => stats.num_wind += 1,
                        GenKind::Battery(_) => stats.num_batteries += 1,
                        GenKind::Thermal { .. } => {}
                    }
                    if g.pmax.is_finite() {
                        stats.total_gen_capacity_mw += g.pmax.value();
                    }
                }
                Node::Load(l) => {
                    stats.num_loads += 1;
                    stats.total_load_mw += l.demand.value();
                }
            }
        }
        stats.num_lines = self.graph.edge_count();
        stats.num_islands = self.islands().len();
        stats
    }

    /// Check the data for problems that would make the dispatch model
    /// ill-posed. Populates `diag` with every issue found.
    pub fn validate_into(&self, diag: &mut Diagnostics) {
        let stats = self.stats();
        if stats.num_buses == 0 {
            diag.add_error("structure", "Network has no buses");
            return;
        }
        if stats.num_loads == 0 {
            diag.add_warning("structure", "Network has no loads");
        }
        if stats.num_gens == 0 {
            diag.add_error("structure", "Network has no generators");
        }
        if stats.total_gen_capacity_mw < stats.total_load_mw {
            diag.add_warning(
                "capacity",
                &format!(
                    "Total generation capacity ({:.1} MW) is less than total load ({:.1} MW)",
                    stats.total_gen_capacity_mw, stats.total_load_mw
                ),
            );
        }

        for line in self.lines() {
            for bus in [line.from_bus, line.to_bus] {
                if !self.contains_bus(bus) {
                    diag.add_error_with_entity(
                        "reference",
                        &format!("references unknown bus {}", bus.value()),
                        &line.name,
                    );
                }
            }
            if line.has_zero_reactance() {
                diag.add_error_with_entity("parameter", "Line has zero reactance", &line.name);
            }
            if line.has_invalid_impedance() {
                diag.add_error_with_entity(
                    "parameter",
                    "Impedance must be finite with non-negative resistance",
                    &line.name,
                );
            }
            if line.flow_max.value() < 0.0 {
                diag.add_error_with_entity("parameter", "Negative flow limit", &line.name);
            }
        }

        for gen in self.generators() {
            if !self.contains_bus(gen.bus) {
                diag.add_error_with_entity(
                    "reference",
                    &format!("references unknown bus {}", gen.bus.value()),
                    &gen.name,
                );
            }
            if gen.pmin > gen.pmax {
                diag.add_error_with_entity("parameter", "pmin exceeds pmax", &gen.name);
            }
            if let Some(battery) = gen.battery_params() {
                if battery.soc > battery.capacity {
                    diag.add_error_with_entity(
                        "parameter",
                        "State of charge exceeds capacity",
                        &gen.name,
                    );
                }
            }
        }

        for load in self.loads() {
            if !self.contains_bus(load.bus) {
                diag.add_error_with_entity(
                    "reference",
                    &format!("references unknown bus {}", load.bus.value()),
                    &load.name,
                );
            }
        }

        for island in self.islands() {
            let slack_count = island
                .iter()
                .filter(|id| self.bus(**id).is_some_and(Bus::is_slack))
                .count();
            if slack_count != 1 {
                let first = island.first().map(|b| b.to_string()).unwrap_or_default();
                diag.add_error_with_entity(
                    "topology",
                    &format!(
                        "Island of {} bus(es) has {} slack buses, expected exactly one",
                        island.len(),
                        slack_count
                    ),
                    &first,
                );
            }
        }
    }

    /// Run [`Network::validate_into`] and fail on any error-level issue.
    pub fn validate(&self) -> CoreResult<Diagnostics> {
        let mut diag = Diagnostics::new();
        self.validate_into(&mut diag);
        if diag.has_errors() {
            Err(CoreError::Validation(diag.error_summary()))
        } else {
            Ok(diag)
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NetworkStats {
    pub num_buses: usize,
    pub num_lines: usize,
    pub num_gens: usize,
    pub num_wind: usize,
    pub num_batteries: usize,
    pub num_loads: usize,
    pub num_islands: usize,
    pub total_load_mw: f64,
    pub total_gen_capacity_mw: f64,
}

impl std::fmt::Display for NetworkStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} buses, {} lines, {} gens ({} wind, {} battery, {:.0} MW), {} loads ({:.0} MW), {} island(s)",
            self.num_buses,
            self.num_lines,
            self.num_gens,
            self.num_wind,
            self.num_batteries,
            self.total_gen_capacity_mw,
            self.num_loads,
            self.total_load_mw,
            self.num_islands
        )
    }
}
