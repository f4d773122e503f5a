use anyhow::{bail, Result};
use lossopf_algo::scenarios::{
    combine, contingency_scenarios, load_scenarios, load_scenarios_from_path, wind_scenarios,
};
use lossopf_algo::{run_sweep, Scenario, SweepConfig};
use lossopf_cli::{NetworkArgs, SweepSection};
use lossopf_core::Network;
use std::path::Path;
use tracing::info;

use super::{load_network, load_study};

/// Command-line values that take precedence over `[sweep]`.
#[derive(Debug, Default)]
pub struct Overrides {
    pub scenarios: Option<usize>,
    pub seed: Option<u64>,
    pub contingencies: bool,
    pub threads: Option<usize>,
}

impl Overrides {
    fn apply(&self, section: &mut SweepSection) {
        if let Some(n) = self.scenarios {
            section.scenarios = n;
        }
        if let Some(seed) = self.seed {
            section.seed = seed;
        }
        if let Some(threads) = self.threads {
            section.threads = threads;
        }
        section.contingencies |= self.contingencies;
    }
}

fn generate(network: &Network, section: &SweepSection) -> Vec<Scenario> {
    let mut sets = Vec::new();
    let has_wind = network.generators().iter().any(|g| g.is_wind());
    if section.wind_variation && has_wind {
        sets.push(wind_scenarios(network, section.scenarios, section.seed));
    }
    if section.load_variation {
        sets.push(load_scenarios(network, section.scenarios, section.seed));
    }
    if section.contingencies {
        sets.push(contingency_scenarios(network));
    }
    combine(&sets)
}

pub fn handle(
    args: &NetworkArgs,
    overrides: Overrides,
    scenario_file: Option<&Path>,
    out: Option<&Path>,
) -> Result<()> {
    let network = load_network(args)?;
    let mut study = load_study(args)?;
    overrides.apply(&mut study.sweep);

    let scenarios = match scenario_file {
        Some(path) => load_scenarios_from_path(path)?,
        None => generate(&network, &study.sweep),
    };
    if scenarios.is_empty() {
        bail!("no scenarios to run");
    }
    info!(count = scenarios.len(), "running scenario sweep");

    let config = SweepConfig {
        opf: study.opf,
        threads: study.sweep.threads,
    };
    let summary = run_sweep(&network, &scenarios, &config)?;

    let fmt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |x| format!("{x:.4}"));
    println!(
        "{} scenarios: {} solved, {} skipped, {} failed",
        summary.results.len(),
        summary.solved,
        summary.skipped,
        summary.failed
    );
    println!("  mean cost     : {}", fmt(summary.mean_cost));
    println!("  mean loss (MW): {}", fmt(summary.mean_loss_mw));
    println!("  max shed (MW) : {}", fmt(summary.max_shed_mw));

    if let Some(path) = out {
        summary.to_csv(path)?;
        info!("wrote sweep results to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lossopf_core::cases;

    #[test]
    fn test_overrides_take_precedence() {
        let mut section = SweepSection::default();
        Overrides {
            scenarios: Some(3),
            seed: None,
            contingencies: true,
            threads: Some(2),
        }
        .apply(&mut section);
        assert_eq!(section.scenarios, 3);
        assert_eq!(section.seed, 42);
        assert_eq!(section.threads, 2);
        assert!(section.contingencies);
    }

    #[test]
    fn test_generated_sets_are_combined() {
        let net = cases::six_bus_wind_battery();
        let section = SweepSection {
            scenarios: 2,
            contingencies: true,
            ..SweepSection::default()
        };
        // wind × load × N-1
        assert_eq!(generate(&net, &section).len(), 2 * 2 * 8);

        let none = SweepSection {
            wind_variation: false,
            load_variation: false,
            ..SweepSection::default()
        };
        let base = generate(&net, &none);
        assert_eq!(base.len(), 1);
        assert_eq!(base[0], Scenario::base());

        // no wind units, so only the load set remains
        let section = SweepSection {
            scenarios: 3,
            ..SweepSection::default()
        };
        let thermal = generate(&cases::six_bus(), &section);
        assert_eq!(thermal.len(), 3);
    }
}
