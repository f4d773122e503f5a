use anyhow::{Context, Result};
use lossopf_algo::opf::{solve_multiperiod, MultiPeriodStudy};
use lossopf_cli::NetworkArgs;
use serde::Deserialize;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tabwriter::TabWriter;
use tracing::info;

use super::{load_network, load_study, write_json};

/// Per-period multipliers; an empty list is a flat profile.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Profile {
    load: Vec<f64>,
    wind: Vec<f64>,
}

fn read_profile(path: &Path) -> Result<Profile> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading profile {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing profile {}", path.display()))
}

pub fn handle(
    args: &NetworkArgs,
    periods: usize,
    profile: Option<&Path>,
    out: Option<&Path>,
) -> Result<()> {
    let network = load_network(args)?;
    let study_config = load_study(args)?;
    let profile = profile.map(read_profile).transpose()?.unwrap_or_default();

    let study = MultiPeriodStudy::from_multipliers(&network, periods, &profile.load, &profile.wind)?;
    let outcome = solve_multiperiod(&network, &study, &study_config.opf)?;
    info!(
        periods = outcome.periods.len(),
        iterations = outcome.iterations,
        total_cost = outcome.total_cost,
        "multi-period dispatch converged"
    );

    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "PERIOD\tGEN MW\tBATTERY MW\tSOC MWH\tSHED MW\tLOSS MW")?;
    for period in &outcome.periods {
        let gen: f64 = period.generation_mw.values().sum();
        let battery: f64 = period.battery.values().map(|b| b.net_injection_mw).sum();
        let soc: f64 = period.battery_soc_mwh.values().sum();
        let shed: f64 = period.shed_mw.values().sum();
        writeln!(
            writer,
            "{}\t{:.3}\t{:.3}\t{:.3}\t{:.3}\t{:.4}",
            period.period, gen, battery, soc, shed, period.total_loss_mw
        )?;
    }
    writer.flush()?;
    println!(
        "total cost {:.2} $, total losses {:.4} MW over {} iterations",
        outcome.total_cost, outcome.total_loss_mw, outcome.iterations
    );

    if let Some(path) = out {
        write_json(&outcome, Some(path))?;
    }
    Ok(())
}
