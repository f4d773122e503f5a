use crate::lp::{LpBackend, SolverSettings};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Static objective of the dispatch LP
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OpfObjective {
    /// Generation, shedding and battery cost
    #[default]
    EconomicDispatch,
    /// Total injected power, a proxy for loss minimization
    MinimizeGeneration,
    /// Flow-sign weighted line utilization with dispatch held fixed
    TransmissionCost,
}

impl fmt::Display for OpfObjective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpfObjective::EconomicDispatch => write!(f, "economic"),
            OpfObjective::MinimizeGeneration => write!(f, "min-generation"),
            OpfObjective::TransmissionCost => write!(f, "transmission"),
        }
    }
}

impl std::str::FromStr for OpfObjective {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "economic" | "economic-dispatch" => Ok(OpfObjective::EconomicDispatch),
            "min-generation" | "minimize-generation" | "loss" => {
                Ok(OpfObjective::MinimizeGeneration)
            }
            "transmission" | "transmission-cost" => Ok(OpfObjective::TransmissionCost),
            _ => Err(format!("Unknown OPF objective: {}", s)),
        }
    }
}

/// Settings for the loss fixed-point loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LossOpfConfig {
    pub max_iterations: usize,
    /// Convergence threshold on |total loss change| (per-unit)
    pub tolerance: f64,
    pub objective: OpfObjective,
    pub solver: SolverSettings,
    pub backend: LpBackend,
}

impl Default for LossOpfConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-6,
            objective: OpfObjective::default(),
            solver: SolverSettings::default(),
            backend: LpBackend::default(),
        }
    }
}

impl LossOpfConfig {
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_objective(mut self, objective: OpfObjective) -> Self {
        self.objective = objective;
        self
    }

    pub fn with_solver_settings(mut self, solver: SolverSettings) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_backend(mut self, backend: LpBackend) -> Self {
        self.backend = backend;
        self
    }
}

/// One pass of the loss loop
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IterationRecord {
    /// 1-based
    pub iteration: usize,
    /// Total loss estimated from this pass's angles (per-unit)
    pub total_loss: f64,
    pub loss_diff: f64,
    pub objective: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_and_builders() {
        let config = LossOpfConfig::default();
        assert_eq!(config.max_iterations, 100);
        assert_eq!(config.tolerance, 1e-6);
        assert_eq!(config.objective, OpfObjective::EconomicDispatch);

        let config = config
            .with_max_iterations(2)
            .with_tolerance(1e-8)
            .with_objective(OpfObjective::MinimizeGeneration);
        assert_eq!(config.max_iterations, 2);
        assert_eq!(config.tolerance, 1e-8);
        assert_eq!(config.objective, OpfObjective::MinimizeGeneration);
    }

    #[test]
    fn test_objective_roundtrips_through_str() {
        for obj in [
            OpfObjective::EconomicDispatch,
            OpfObjective::MinimizeGeneration,
            OpfObjective::TransmissionCost,
        ] {
            assert_eq!(obj.to_string().parse::<OpfObjective>().unwrap(), obj);
        }
        assert!("ac".parse::<OpfObjective>().is_err());
    }
}
