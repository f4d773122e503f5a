//! JSON case files.
//!
//! ```json
//! {
//!   "base_mva": 100.0,
//!   "buses": [{"id": 1, "kind": "slack"}, {"id": 2}],
//!   "lines": [{"id": 1, "from": 1, "to": 2, "r": 0.01, "x": 0.1, "flow_max": 0.5}],
//!   "generators": [{"id": 1, "bus": 1, "type": "thermal", "cost": 10.0, "pmax_mw": 100.0}],
//!   "loads": [{"id": 1, "bus": 2, "demand_mw": 40.0, "shed_cost": 400.0}]
//! }
//! ```
//!
//! Omitted flow limits mean an unrated line.

use crate::{
    BatteryParams, Bus, BusId, BusType, CoreResult, Gen, GenId, GenKind, Line, LineId, Load,
    LoadId, Megawatts, Network,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseFile {
    #[serde(default = "default_base_mva")]
    pub base_mva: f64,
    pub buses: Vec<CaseBus>,
    #[serde(default)]
    pub lines: Vec<CaseLine>,
    #[serde(default)]
    pub generators: Vec<CaseGen>,
    #[serde(default)]
    pub loads: Vec<CaseLoad>,
}

fn default_base_mva() -> f64 {
    Network::DEFAULT_BASE_MVA
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseBus {
    pub id: usize,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub kind: BusType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseLine {
    pub id: usize,
    #[serde(default)]
    pub name: Option<String>,
    pub from: usize,
    pub to: usize,
    pub r: f64,
    pub x: f64,
    #[serde(default)]
    pub b: f64,
    #[serde(default)]
    pub tap: Option<f64>,
    #[serde(default)]
    pub flow_max: Option<f64>,
    #[serde(default = "in_service_default")]
    pub in_service: bool,
}

fn in_service_default() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CaseGenKind {
    Thermal {
        cost: f64,
        #[serde(default)]
        ramp_up_mw: Option<f64>,
        #[serde(default)]
        ramp_down_mw: Option<f64>,
    },
    Wind,
    Battery(BatteryParams),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseGen {
    pub id: usize,
    #[serde(default)]
    pub name: Option<String>,
    pub bus: usize,
    #[serde(default)]
    pub pmin_mw: f64,
    #[serde(default)]
    pub pmax_mw: f64,
    #[serde(flatten)]
    pub kind: CaseGenKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseLoad {
    pub id: usize,
    #[serde(default)]
    pub name: Option<String>,
    pub bus: usize,
    pub demand_mw: f64,
    #[serde(default)]
    pub shed_cost: Option<f64>,
}

impl CaseFile {
    pub fn from_json(text: &str) -> CoreResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn into_network(self) -> CoreResult<Network> {
        let mut net = Network::with_base_mva(self.base_mva);

        for bus in self.buses {
            let name = bus.name.unwrap_or_else(|| format!("Bus {}", bus.id));
            net.add_bus(Bus::new(BusId::new(bus.id), name).with_kind(bus.kind))?;
        }

        for line in self.lines {
            let name = line.name.unwrap_or_else(|| format!("Line {}", line.id));
            let mut built = Line::new(
                LineId::new(line.id),
                name,
                BusId::new(line.from),
                BusId::new(line.to),
                line.r,
                line.x,
            )
            .with_charging(line.b);
            if let Some(limit) = line.flow_max {
                built = built.with_flow_max(limit);
            }
            if let Some(tap) = line.tap {
                built = built.with_tap(tap);
            }
            built.in_service = line.in_service;
            net.add_line(built)?;
        }

        for gen in self.generators {
            let id = GenId::new(gen.id);
            let bus = BusId::new(gen.bus);
            let name = gen.name.unwrap_or_else(|| format!("Gen {}", gen.id));
            let built = match gen.kind {
                CaseGenKind::Thermal {
                    cost,
                    ramp_up_mw,
                    ramp_down_mw,
                } => {
                    let mut g = Gen::thermal(id, name, bus, cost)
                        .with_p_limits(gen.pmin_mw, gen.pmax_mw);
                    if let GenKind::Thermal {
                        ramp_up, ramp_down, ..
                    } = &mut g.kind
                    {
                        *ramp_up = ramp_up_mw.map(Megawatts);
                        *ramp_down = ramp_down_mw.map(Megawatts);
                    }
                    g
                }
                CaseGenKind::Wind => Gen::wind(id, name, bus, Megawatts(gen.pmax_mw)),
                CaseGenKind::Battery(params) => Gen::battery(id, name, bus, params),
            };
            net.add_gen(built)?;
        }

        for load in self.loads {
            let name = load.name.unwrap_or_else(|| format!("Load {}", load.id));
            let mut built = Load::new(
                LoadId::new(load.id),
                name,
                BusId::new(load.bus),
                Megawatts(load.demand_mw),
            );
            if let Some(cost) = load.shed_cost {
                built = built.with_shed_cost(cost);
            }
            net.add_load(built)?;
        }

        Ok(net)
    }

    /// Snapshot a network back into case form.
    pub fn from_network(network: &Network) -> Self {
        let buses = network
            .buses()
            .iter()
            .map(|b| CaseBus {
                id: b.id.value(),
                name: Some(b.name.clone()),
                kind: b.kind,
            })
            .collect();
        let lines = network
            .lines()
            .iter()
            .map(|l| CaseLine {
                id: l.id.value(),
                name: Some(l.name.clone()),
                from: l.from_bus.value(),
                to: l.to_bus.value(),
                r: l.resistance,
                x: l.reactance,
                b: l.charging_b.value(),
                tap: l.tap_ratio,
                flow_max: l.flow_max.is_finite().then_some(l.flow_max.value()),
                in_service: l.in_service,
            })
            .collect();
        let generators = network
            .generators()
            .iter()
            .map(|g| CaseGen {
                id: g.id.value(),
                name: Some(g.name.clone()),
                bus: g.bus.value(),
                pmin_mw: g.pmin.value(),
                pmax_mw: g.pmax.value(),
                kind: match &g.kind {
                    GenKind::Thermal {
                        cost_per_mwh,
                        ramp_up,
                        ramp_down,
                    } => CaseGenKind::Thermal {
                        cost: *cost_per_mwh,
                        ramp_up_mw: ramp_up.map(Megawatts::value),
                        ramp_down_mw: ramp_down.map(Megawatts::value),
                    },
                    GenKind::Wind => CaseGenKind::Wind,
                    GenKind::Battery(params) => CaseGenKind::Battery(params.clone()),
                },
            })
            .collect();
        let loads = network
            .loads()
            .iter()
            .map(|l| CaseLoad {
                id: l.id.value(),
                name: Some(l.name.clone()),
                bus: l.bus.value(),
                demand_mw: l.demand.value(),
                shed_cost: Some(l.shed_cost_per_mwh),
            })
            .collect();

        Self {
            base_mva: network.base_mva.value(),
            buses,
            lines,
            generators,
            loads,
        }
    }
}

/// Read a JSON case file from disk.
pub fn load_case(path: &Path) -> CoreResult<Network> {
    let text = std::fs::read_to_string(path)?;
    CaseFile::from_json(&text)?.into_network()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MegawattHours;
    use std::io::Write;

    const CASE: &str = r#"{
        "base_mva": 100.0,
        "buses": [{"id": 1, "kind": "slack"}, {"id": 2}],
        "lines": [
            {"id": 1, "from": 1, "to": 2, "r": 0.01, "x": 0.1, "flow_max": 0.5}
        ],
        "generators": [
            {"id": 1, "bus": 1, "type": "thermal", "cost": 10.0, "pmax_mw": 100.0},
            {"id": 2, "bus": 2, "type": "wind", "pmax_mw": 30.0},
            {"id": 3, "bus": 2, "type": "battery", "capacity": 20.0, "soc": 10.0,
             "max_charge": 5.0, "max_discharge": 5.0}
        ],
        "loads": [{"id": 1, "bus": 2, "demand_mw": 40.0, "shed_cost": 400.0}]
    }"#;

    #[test]
    fn test_parse_case() {
        let net = CaseFile::from_json(CASE).unwrap().into_network().unwrap();
        let stats = net.stats();
        assert_eq!(stats.num_buses, 2);
        assert_eq!(stats.num_wind, 1);
        assert_eq!(stats.num_batteries, 1);

        let bus1 = net.bus(BusId::new(1)).unwrap();
        assert!(bus1.is_slack());

        let battery = net.generators()[2].battery_params().unwrap().clone();
        assert_eq!(battery.capacity, MegawattHours(20.0));
        assert_eq!(battery.efficiency_charge, 0.95);
        assert_eq!(battery.cost_charge_per_mwh, -1.0);

        assert_eq!(net.loads()[0].shed_cost_per_mwh, 400.0);
        assert!((net.lines()[0].flow_max.value() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_missing_flow_limit_means_unrated() {
        let text = r#"{"buses": [{"id": 1, "kind": "slack"}, {"id": 2}],
                       "lines": [{"id": 7, "from": 1, "to": 2, "r": 0.0, "x": 0.2}]}"#;
        let net = CaseFile::from_json(text).unwrap().into_network().unwrap();
        assert!(!net.lines()[0].flow_max.is_finite());
        assert_eq!(net.lines()[0].name, "Line 7");
    }

    #[test]
    fn test_unknown_bus_reference_fails() {
        let text = r#"{"buses": [{"id": 1, "kind": "slack"}],
                       "loads": [{"id": 1, "bus": 4, "demand_mw": 1.0}]}"#;
        assert!(CaseFile::from_json(text).unwrap().into_network().is_err());
    }

    #[test]
    fn test_snapshot_round_trips_through_json() {
        let net = CaseFile::from_json(CASE).unwrap().into_network().unwrap();
        let json = serde_json::to_string(&CaseFile::from_network(&net)).unwrap();
        let again = CaseFile::from_json(&json).unwrap().into_network().unwrap();
        assert_eq!(again.stats().num_gens, 3);
        assert_eq!(again.generators()[0].cost_per_mwh(), 10.0);
    }

    #[test]
    fn test_load_case_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CASE.as_bytes()).unwrap();
        let net = load_case(file.path()).unwrap();
        assert_eq!(net.loads().len(), 1);
    }
}
