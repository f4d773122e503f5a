//! JSON export for dispatch reports

use super::results::DispatchReport;
use anyhow::{Context, Result};
use std::path::Path;

impl DispatchReport {
    /// Write the report as pretty-printed JSON
    pub fn to_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("serializing DispatchReport to JSON")?;
        std::fs::write(path, json)
            .with_context(|| format!("writing JSON to {}", path.display()))?;
        Ok(())
    }

    /// Convert to JSON value (for stdout)
    pub fn to_json_value(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).context("converting DispatchReport to JSON value")
    }

    pub fn from_json(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading report {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing report {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use crate::lp::ClarabelLp;
    use crate::opf::{DispatchReport, LossOpf, LossOpfConfig};
    use lossopf_core::cases;
    use std::sync::Arc;

    #[test]
    fn test_report_file_roundtrip() {
        let net = cases::three_bus();
        let outcome = LossOpf::with_solver(LossOpfConfig::default(), Arc::new(ClarabelLp))
            .solve_loss(&net)
            .unwrap();
        let report = outcome.report(&net).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        report.to_json(&path).unwrap();

        let back = DispatchReport::from_json(&path).unwrap();
        assert_eq!(back.primal_results.flow_mw.len(), 3);
        assert!((back.total_cost - report.total_cost).abs() < 1e-9);

        let value = report.to_json_value().unwrap();
        for key in [
            "solver_status",
            "custo_total",
            "sumario_perdas",
            "sumario_curtailment",
            "sumario_corte",
            "primal_results",
            "dual_results",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert!(value["sumario_perdas"]["perdas_totais_mw"].as_f64().unwrap() > 0.0);
    }
}
