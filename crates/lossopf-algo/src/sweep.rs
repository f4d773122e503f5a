//! Parallel scenario sweep.
//!
//! Every scenario is solved on its own clone of the base network inside a
//! dedicated rayon pool. Non-convergence is an expected outcome and marks
//! the scenario as skipped; any other error marks it as failed. Neither is
//! included in the aggregates.

use crate::opf::{LossOpf, LossOpfConfig};
use crate::scenarios::{apply_scenario, Scenario};
use crate::OpfError;
use anyhow::{Context, Result};
use lossopf_core::Network;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub opf: LossOpfConfig,
    /// 0 uses every core
    pub threads: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScenarioStatus {
    Solved {
        cost: f64,
        total_loss_mw: f64,
        shed_mw: f64,
        curtailment_mw: f64,
        iterations: usize,
    },
    /// Loss iteration did not converge
    Skipped { reason: String },
    Failed { reason: String },
}

impl ScenarioStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioStatus::Solved { .. } => "solved",
            ScenarioStatus::Skipped { .. } => "skipped",
            ScenarioStatus::Failed { .. } => "failed",
        }
    }

    pub fn is_solved(&self) -> bool {
        matches!(self, ScenarioStatus::Solved { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    pub index: usize,
    pub id: String,
    pub status: ScenarioStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepSummary {
    pub results: Vec<ScenarioResult>,
    pub solved: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Over solved scenarios only; `None` when nothing solved
    pub mean_cost: Option<f64>,
    pub mean_loss_mw: Option<f64>,
    pub max_shed_mw: Option<f64>,
}

#[derive(Serialize)]
struct CsvRow<'a> {
    index: usize,
    id: &'a str,
    status: &'a str,
    cost: Option<f64>,
    total_loss_mw: Option<f64>,
    shed_mw: Option<f64>,
    curtailment_mw: Option<f64>,
    iterations: Option<usize>,
    reason: Option<&'a str>,
}

impl SweepSummary {
    fn from_results(mut results: Vec<ScenarioResult>) -> Self {
        results.sort_by_key(|r| r.index);
        let mut costs = Vec::new();
        let mut losses = Vec::new();
        let mut max_shed: Option<f64> = None;
        let (mut skipped, mut failed) = (0, 0);
        for r in &results {
            match &r.status {
                ScenarioStatus::Solved {
                    cost,
                    total_loss_mw,
                    shed_mw,
                    ..
                } => {
                    costs.push(*cost);
                    losses.push(*total_loss_mw);
                    max_shed = Some(max_shed.map_or(*shed_mw, |m| m.max(*shed_mw)));
                }
                ScenarioStatus::Skipped { .. } => skipped += 1,
                ScenarioStatus::Failed { .. } => failed += 1,
            }
        }
        let mean = |v: &[f64]| (!v.is_empty()).then(|| v.iter().sum::<f64>() / v.len() as f64);
        Self {
            solved: costs.len(),
            skipped,
            failed,
            mean_cost: mean(&costs),
            mean_loss_mw: mean(&losses),
            max_shed_mw: max_shed,
            results,
        }
    }

    pub fn to_csv(&self, path: &Path) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)
            .with_context(|| format!("creating CSV writer for {}", path.display()))?;
        for r in &self.results {
            let mut row = CsvRow {
                index: r.index,
                id: &r.id,
                status: r.status.as_str(),
                cost: None,
                total_loss_mw: None,
                shed_mw: None,
                curtailment_mw: None,
                iterations: None,
                reason: None,
            };
            match &r.status {
                ScenarioStatus::Solved {
                    cost,
                    total_loss_mw,
                    shed_mw,
                    curtailment_mw,
                    iterations,
                } => {
                    row.cost = Some(*cost);
                    row.total_loss_mw = Some(*total_loss_mw);
                    row.shed_mw = Some(*shed_mw);
                    row.curtailment_mw = Some(*curtailment_mw);
                    row.iterations = Some(*iterations);
                }
                ScenarioStatus::Skipped { reason } | ScenarioStatus::Failed { reason } => {
                    row.reason = Some(reason);
                }
            }
            wtr.serialize(row).context("writing CSV record")?;
        }
        wtr.flush().context("flushing CSV writer")?;
        Ok(())
    }
}

fn run_scenario(driver: &LossOpf, base: &Network, index: usize, scenario: &Scenario) -> ScenarioResult {
    let solve = || -> Result<ScenarioStatus, OpfError> {
        let mut network = base.clone();
        apply_scenario(&mut network, scenario)?;
        let outcome = driver.solve_loss(&network)?;
        let report = outcome.report(&network).ok_or_else(|| {
            OpfError::DataValidation("converged solution produced no report".into())
        })?;
        Ok(ScenarioStatus::Solved {
            cost: report.total_cost,
            total_loss_mw: report.losses.total_mw,
            shed_mw: report.shedding.total_mw,
            curtailment_mw: report.curtailment.total_mw,
            iterations: outcome.iterations,
        })
    };

    let status = match solve() {
        Ok(status) => status,
        Err(err) if err.is_convergence() => {
            warn!(scenario = %scenario.id, index, "skipping scenario: {err}");
            ScenarioStatus::Skipped {
                reason: err.to_string(),
            }
        }
        Err(err) => {
            warn!(scenario = %scenario.id, index, "scenario failed: {err}");
            ScenarioStatus::Failed {
                reason: err.to_string(),
            }
        }
    };
    ScenarioResult {
        index,
        id: scenario.id.clone(),
        status,
    }
}

pub fn run_sweep(
    network: &Network,
    scenarios: &[Scenario],
    config: &SweepConfig,
) -> Result<SweepSummary> {
    let driver = LossOpf::new(config.opf.clone()).context("selecting LP backend")?;
    run_sweep_with(&driver, network, scenarios, config.threads)
}

pub fn run_sweep_with(
    driver: &LossOpf,
    network: &Network,
    scenarios: &[Scenario],
    threads: usize,
) -> Result<SweepSummary> {
    let thread_count = if threads == 0 { num_cpus::get() } else { threads };
    let pool = ThreadPoolBuilder::new()
        .num_threads(thread_count)
        .build()
        .context("building Rayon thread pool for scenario sweep")?;

    let results: Vec<ScenarioResult> = pool.install(|| {
        scenarios
            .par_iter()
            .enumerate()
            .map(|(index, scenario)| run_scenario(driver, network, index, scenario))
            .collect()
    });

    let summary = SweepSummary::from_results(results);
    info!(
        solved = summary.solved,
        skipped = summary.skipped,
        failed = summary.failed,
        mean_cost = summary.mean_cost,
        "scenario sweep finished"
    );
    Ok(summary)
}
