use anyhow::Result;
use lossopf_algo::{solve_transmission, DispatchReport};
use lossopf_cli::NetworkArgs;
use lossopf_core::LineId;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::Path;
use tabwriter::TabWriter;
use tracing::info;

use super::{load_network, load_study, write_json};

#[derive(Serialize)]
struct TransmissionOutput<'a> {
    objective: f64,
    economic_cost: f64,
    flows_mw: &'a BTreeMap<LineId, f64>,
    report: Option<&'a DispatchReport>,
}

pub fn handle(args: &NetworkArgs, out: Option<&Path>) -> Result<()> {
    let network = load_network(args)?;
    let study = load_study(args)?;
    let outcome = solve_transmission(&network, &study.opf)?;
    info!(
        iterations = outcome.base.iterations,
        objective = outcome.objective,
        "transmission study finished"
    );

    println!("Transmission objective: {:.6}", outcome.objective);
    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "LINE\tFLOW MW\tLIMIT MW")?;
    for line in network.in_service_lines() {
        let flow = outcome.flows.get(&line.id).copied().unwrap_or(0.0);
        writeln!(
            writer,
            "{}\t{:.4}\t{:.4}",
            line.id.value(),
            flow,
            line.flow_max.to_megawatts(network.base_mva).value()
        )?;
    }
    writer.flush()?;

    if let Some(path) = out {
        let output = TransmissionOutput {
            objective: outcome.objective,
            economic_cost: outcome.base.objective(),
            flows_mw: &outcome.flows,
            report: outcome.report.as_ref(),
        };
        write_json(&output, Some(path))?;
    }
    Ok(())
}
