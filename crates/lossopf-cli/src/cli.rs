use clap::{Args, CommandFactory, Parser, Subcommand, ValueHint};
use lossopf_algo::lp::LpBackend;
use lossopf_algo::OpfObjective;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Loss-aware DC optimal power flow", long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info", global = true)]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where the network comes from and which study settings apply.
#[derive(Args, Debug, Clone)]
pub struct NetworkArgs {
    /// JSON case file
    #[arg(long, value_hint = ValueHint::FilePath, required_unless_present = "builtin", conflicts_with = "builtin")]
    pub case: Option<PathBuf>,
    /// Built-in system (three-bus, six-bus, six-bus-wind-battery)
    #[arg(long)]
    pub builtin: Option<String>,
    /// Study configuration (TOML with [opf] and [sweep] tables)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    /// LP backend (clarabel, good-lp)
    #[arg(long)]
    pub backend: Option<LpBackend>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Solve the loss-iterated dispatch and print the JSON report
    Solve {
        #[command(flatten)]
        network: NetworkArgs,
        /// Objective (economic, min-generation)
        #[arg(long)]
        objective: Option<OpfObjective>,
        /// Write the report here instead of stdout
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: Option<PathBuf>,
    },
    /// Re-solve a converged dispatch for minimum weighted transmission
    Transmission {
        #[command(flatten)]
        network: NetworkArgs,
        /// Write the transmission report as JSON
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: Option<PathBuf>,
    },
    /// Multi-period dispatch with storage and ramp coupling
    Multiperiod {
        #[command(flatten)]
        network: NetworkArgs,
        /// Number of hourly periods
        #[arg(long, default_value_t = 24)]
        periods: usize,
        /// JSON profile `{"load": [..], "wind": [..]}` of per-period multipliers
        #[arg(long, value_hint = ValueHint::FilePath)]
        profile: Option<PathBuf>,
        /// Write the outcome as JSON
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: Option<PathBuf>,
    },
    /// Run a batch of scenarios in parallel
    Sweep {
        #[command(flatten)]
        network: NetworkArgs,
        /// Scenarios per random set (overrides [sweep].scenarios)
        #[arg(long)]
        scenarios: Option<usize>,
        /// RNG seed (overrides [sweep].seed)
        #[arg(long)]
        seed: Option<u64>,
        /// Include one N-1 outage per in-service line
        #[arg(long)]
        contingencies: bool,
        /// Worker threads, 0 for all cores
        #[arg(long)]
        threads: Option<usize>,
        /// Read scenarios from a JSON or YAML file instead of generating them
        #[arg(long, value_hint = ValueHint::FilePath)]
        scenario_file: Option<PathBuf>,
        /// Write per-scenario results as CSV
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: Option<PathBuf>,
    },
    /// Print network statistics and validation diagnostics
    Inspect {
        #[command(flatten)]
        network: NetworkArgs,
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_definition_is_consistent() {
        build_cli_command().debug_assert();
    }

    #[test]
    fn test_parse_solve_with_builtin() {
        let cli = Cli::try_parse_from([
            "lossopf",
            "solve",
            "--builtin",
            "three-bus",
            "--objective",
            "min-generation",
        ])
        .unwrap();
        match cli.command {
            Commands::Solve {
                network, objective, ..
            } => {
                assert_eq!(network.builtin.as_deref(), Some("three-bus"));
                assert_eq!(objective, Some(OpfObjective::MinimizeGeneration));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_case_and_builtin_conflict() {
        let err = Cli::try_parse_from([
            "lossopf", "inspect", "--case", "net.json", "--builtin", "six-bus",
        ]);
        assert!(err.is_err());
        assert!(Cli::try_parse_from(["lossopf", "inspect"]).is_err());
    }

    #[test]
    fn test_sweep_flags() {
        let cli = Cli::try_parse_from([
            "lossopf",
            "sweep",
            "--builtin",
            "six-bus",
            "--contingencies",
            "--threads",
            "2",
            "--backend",
            "good-lp",
        ])
        .unwrap();
        let Commands::Sweep {
            network,
            contingencies,
            threads,
            scenarios,
            ..
        } = cli.command
        else {
            panic!("expected sweep");
        };
        assert!(contingencies);
        assert_eq!(threads, Some(2));
        assert_eq!(scenarios, None);
        assert_eq!(network.backend, Some(LpBackend::GoodLp));
    }
}
