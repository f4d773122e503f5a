use anyhow::{bail, Context, Result};
use lossopf_algo::{LossOpf, OpfObjective};
use lossopf_cli::NetworkArgs;
use std::path::Path;
use std::time::Instant;
use tracing::info;

use super::{load_network, load_study, write_json};

pub fn handle(args: &NetworkArgs, objective: Option<OpfObjective>, out: Option<&Path>) -> Result<()> {
    let network = load_network(args)?;
    let mut study = load_study(args)?;
    if let Some(objective) = objective {
        study.opf.objective = objective;
    }
    if study.opf.objective == OpfObjective::TransmissionCost {
        bail!("the transmission objective runs through `lossopf transmission`");
    }

    let driver = LossOpf::new(study.opf)?;
    info!(
        backend = driver.solver().name(),
        objective = %driver.config().objective,
        "solving loss-iterated dispatch"
    );
    let start = Instant::now();
    let outcome = driver.solve_loss(&network)?;
    info!(
        iterations = outcome.iterations,
        total_loss_mw = outcome.total_loss_mw(&network),
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "loss iteration converged"
    );

    let report = outcome
        .report(&network)
        .context("converged solve produced no report")?;
    match out {
        Some(path) => {
            report.to_json(path)?;
            info!("wrote report to {}", path.display());
            Ok(())
        }
        None => write_json(&report.to_json_value()?, None),
    }
}
