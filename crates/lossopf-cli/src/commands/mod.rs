use anyhow::{anyhow, Context, Result};
use lossopf_cli::{Commands, NetworkArgs, StudyConfig};
use lossopf_core::{cases, load_case, Network};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

pub mod inspect;
pub mod multiperiod;
pub mod solve;
pub mod sweep;
pub mod transmission;

pub fn run(command: &Commands) -> Result<()> {
    match command {
        Commands::Solve {
            network,
            objective,
            out,
        } => solve::handle(network, *objective, out.as_deref()),
        Commands::Transmission { network, out } => transmission::handle(network, out.as_deref()),
        Commands::Multiperiod {
            network,
            periods,
            profile,
            out,
        } => multiperiod::handle(network, *periods, profile.as_deref(), out.as_deref()),
        Commands::Sweep {
            network,
            scenarios,
            seed,
            contingencies,
            threads,
            scenario_file,
            out,
        } => sweep::handle(
            network,
            sweep::Overrides {
                scenarios: *scenarios,
                seed: *seed,
                contingencies: *contingencies,
                threads: *threads,
            },
            scenario_file.as_deref(),
            out.as_deref(),
        ),
        Commands::Inspect { network, json } => inspect::handle(network, *json),
    }
}

pub fn load_network(args: &NetworkArgs) -> Result<Network> {
    if let Some(name) = &args.builtin {
        return cases::builtin(name).ok_or_else(|| {
            let known: Vec<&str> = cases::BUILTIN.iter().map(|(key, _)| *key).collect();
            anyhow!("unknown built-in case '{name}' (expected one of {})", known.join(", "))
        });
    }
    let path = args
        .case
        .as_deref()
        .context("either --case or --builtin is required")?;
    load_case(path).with_context(|| format!("loading case {}", path.display()))
}

/// Study file with the command-line backend override applied.
pub fn load_study(args: &NetworkArgs) -> Result<StudyConfig> {
    let mut study = StudyConfig::load_or_default(args.config.as_deref())?;
    if let Some(backend) = args.backend {
        study.opf.backend = backend;
    }
    Ok(study)
}

/// Pretty JSON to `out`, or stdout when no path is given.
pub fn write_json<T: Serialize>(value: &T, out: Option<&Path>) -> Result<()> {
    match out {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating output file {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, value).context("serializing JSON output")?;
            writer.flush()?;
            tracing::info!("wrote {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            serde_json::to_writer_pretty(&mut handle, value).context("serializing JSON output")?;
            writeln!(handle)?;
        }
    }
    Ok(())
}
