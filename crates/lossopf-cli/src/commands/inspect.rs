//! Network statistics and data checks, without solving anything.

use anyhow::Result;
use lossopf_cli::NetworkArgs;
use lossopf_core::{Diagnostics, NetworkStats};
use serde::Serialize;
use tracing::warn;

use super::{load_network, write_json};

#[derive(Serialize)]
struct InspectOutput {
    stats: NetworkStats,
    ybus_dim: Option<usize>,
    ybus_nnz: Option<usize>,
    island_sizes: Vec<usize>,
    diagnostics: Diagnostics,
}

pub fn handle(args: &NetworkArgs, json: bool) -> Result<()> {
    let network = load_network(args)?;

    let mut diagnostics = Diagnostics::new();
    network.validate_into(&mut diagnostics);
    // zero-impedance lines already show up as diagnostics
    let ybus = match network.admittance_matrix() {
        Ok(ybus) => Some(ybus),
        Err(err) => {
            warn!("skipping Y-bus: {err}");
            None
        }
    };
    let output = InspectOutput {
        stats: network.stats(),
        ybus_dim: ybus.as_ref().map(|y| y.n_bus()),
        ybus_nnz: ybus.as_ref().map(|y| y.nnz()),
        island_sizes: network.islands().iter().map(Vec::len).collect(),
        diagnostics,
    };

    if json {
        return write_json(&output, None);
    }

    println!("{}", output.stats);
    if let (Some(dim), Some(nnz)) = (output.ybus_dim, output.ybus_nnz) {
        println!("  Y-bus         : {dim}x{dim}, {nnz} non-zeros");
    }
    println!("  Island sizes  : {:?}", output.island_sizes);
    if output.diagnostics.issues.is_empty() {
        println!("No issues found");
    } else {
        println!(
            "{} error(s), {} warning(s):",
            output.diagnostics.error_count(),
            output.diagnostics.warning_count()
        );
        for issue in &output.diagnostics.issues {
            println!("  {issue}");
        }
    }
    Ok(())
}
