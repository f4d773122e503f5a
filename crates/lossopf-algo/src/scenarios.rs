//! Stochastic and contingency scenarios.
//!
//! A [`Scenario`] is a set of per-entity multipliers plus line outages. It
//! is always applied to a clone of the base network, never to the base
//! itself.

use crate::OpfError;
use anyhow::{anyhow, Context, Result};
use lossopf_core::{GenId, LineId, LoadId, Network};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

pub const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    /// Demand multiplier per load; missing loads keep nominal demand
    #[serde(default)]
    pub load_scale: BTreeMap<LoadId, f64>,
    /// Available-power multiplier per wind unit
    #[serde(default)]
    pub wind_scale: BTreeMap<GenId, f64>,
    #[serde(default)]
    pub outages: Vec<LineId>,
}

impl Scenario {
    pub fn base() -> Self {
        Self {
            id: "base".to_string(),
            ..Self::default()
        }
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_load_scale(mut self, load: LoadId, scale: f64) -> Self {
        self.load_scale.insert(load, scale);
        self
    }

    pub fn with_wind_scale(mut self, gen: GenId, scale: f64) -> Self {
        self.wind_scale.insert(gen, scale);
        self
    }

    pub fn with_outage(mut self, line: LineId) -> Self {
        self.outages.push(line);
        self
    }

    /// Combine two scenarios; multipliers on the same entity multiply.
    pub fn merge(&self, other: &Scenario) -> Scenario {
        let mut merged = self.clone();
        merged.id = format!("{}+{}", self.id, other.id);
        merged.label = match (&self.label, &other.label) {
            (Some(a), Some(b)) => Some(format!("{a}, {b}")),
            (a, b) => a.clone().or_else(|| b.clone()),
        };
        for (id, s) in &other.load_scale {
            *merged.load_scale.entry(*id).or_insert(1.0) *= s;
        }
        for (id, s) in &other.wind_scale {
            *merged.wind_scale.entry(*id).or_insert(1.0) *= s;
        }
        for line in &other.outages {
            if !merged.outages.contains(line) {
                merged.outages.push(*line);
            }
        }
        merged
    }
}

/// Apply `scenario` to `network` in place.
pub fn apply_scenario(network: &mut Network, scenario: &Scenario) -> Result<(), OpfError> {
    for (id, scale) in &scenario.load_scale {
        let load = network.load_mut(*id).ok_or_else(|| {
            OpfError::DataValidation(format!("scenario '{}': unknown {id}", scenario.id))
        })?;
        load.demand = load.demand * *scale;
    }
    for (id, scale) in &scenario.wind_scale {
        let gen = network
            .gen_mut(*id)
            .filter(|g| g.is_wind())
            .ok_or_else(|| {
                OpfError::DataValidation(format!(
                    "scenario '{}': {id} is not a wind unit",
                    scenario.id
                ))
            })?;
        gen.pmax = gen.pmax * *scale;
    }
    for id in &scenario.outages {
        let line = network.line_mut(*id).ok_or_else(|| {
            OpfError::DataValidation(format!("scenario '{}': unknown {id}", scenario.id))
        })?;
        line.in_service = false;
    }
    Ok(())
}

/// `count` scenarios scaling each wind unit by U(0, 1).
pub fn wind_scenarios(network: &Network, count: usize, seed: u64) -> Vec<Scenario> {
    let mut rng = StdRng::seed_from_u64(seed);
    let wind: Vec<GenId> = network
        .generators()
        .into_iter()
        .filter(|g| g.is_wind())
        .map(|g| g.id)
        .collect();
    (0..count)
        .map(|i| {
            let mut s = Scenario::new(format!("wind-{i}"));
            for id in &wind {
                s.wind_scale.insert(*id, rng.gen::<f64>());
            }
            s
        })
        .collect()
}

/// `count` scenarios scaling each load by U(0.95, 1.10) + U(−0.02, 0.02).
pub fn load_scenarios(network: &Network, count: usize, seed: u64) -> Vec<Scenario> {
    let mut rng = StdRng::seed_from_u64(seed);
    let loads: Vec<LoadId> = network.loads().iter().map(|l| l.id).collect();
    (0..count)
        .map(|i| {
            let mut s = Scenario::new(format!("load-{i}"));
            for id in &loads {
                let trend = rng.gen_range(0.95..1.10);
                let noise = rng.gen_range(-0.02..0.02);
                s.load_scale.insert(*id, trend + noise);
            }
            s
        })
        .collect()
}

/// N-1: one scenario per in-service line.
pub fn contingency_scenarios(network: &Network) -> Vec<Scenario> {
    network
        .in_service_lines()
        .iter()
        .map(|line| {
            Scenario::new(format!("n-1-line-{}", line.id.value()))
                .with_label(format!("outage of {}", line.name))
                .with_outage(line.id)
        })
        .collect()
}

/// Cartesian product of scenario sets; empty sets are skipped.
pub fn combine(sets: &[Vec<Scenario>]) -> Vec<Scenario> {
    let mut product: Vec<Scenario> = Vec::new();
    for set in sets.iter().filter(|s| !s.is_empty()) {
        product = if product.is_empty() {
            set.clone()
        } else {
            product
                .iter()
                .flat_map(|a| set.iter().map(move |b| a.merge(b)))
                .collect()
        };
    }
    if product.is_empty() {
        product.push(Scenario::base());
    }
    product
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioSet {
    pub version: Option<u32>,
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
}

impl ScenarioSet {
    pub fn validate(&self) -> Result<()> {
        if self.scenarios.is_empty() {
            return Err(anyhow!("scenario set contains no scenarios"));
        }
        let mut seen = HashSet::new();
        for scenario in &self.scenarios {
            if scenario.id.trim().is_empty() {
                return Err(anyhow!("scenario id cannot be empty"));
            }
            if !seen.insert(scenario.id.as_str()) {
                return Err(anyhow!("duplicate scenario id '{}' in set", scenario.id));
            }
        }
        Ok(())
    }
}

/// Read a scenario set from JSON or YAML, chosen by extension.
pub fn load_scenarios_from_path(path: &Path) -> Result<Vec<Scenario>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading scenario set '{}'", path.display()))?;
    let set: ScenarioSet = match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            serde_yaml::from_str(&data).context("parsing scenario set yaml")?
        }
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::from_str(&data).context("parsing scenario set json")?
        }
        _ => serde_yaml::from_str(&data)
            .or_else(|_| serde_json::from_str(&data))
            .context("parsing scenario set")?,
    };
    set.validate()
        .with_context(|| format!("validating scenario set '{}'", path.display()))?;
    Ok(set.scenarios)
}
