//! Study configuration file (`study.toml`).
//!
//! ```toml
//! [opf]
//! max_iterations = 50
//! tolerance = 1e-6
//! objective = "economic-dispatch"
//!
//! [sweep]
//! scenarios = 20
//! seed = 7
//! contingencies = true
//! ```

use anyhow::{Context, Result};
use lossopf_algo::scenarios::DEFAULT_SEED;
use lossopf_algo::LossOpfConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyConfig {
    pub opf: LossOpfConfig,
    pub sweep: SweepSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepSection {
    /// Size of each random scenario set
    pub scenarios: usize,
    pub seed: u64,
    /// 0 uses every core
    pub threads: usize,
    pub contingencies: bool,
    pub wind_variation: bool,
    pub load_variation: bool,
}

impl Default for SweepSection {
    fn default() -> Self {
        Self {
            scenarios: 10,
            seed: DEFAULT_SEED,
            threads: 0,
            contingencies: false,
            wind_variation: true,
            load_variation: true,
        }
    }
}

impl StudyConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("parsing study configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading study configuration {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Defaults when no file is given.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }
}
