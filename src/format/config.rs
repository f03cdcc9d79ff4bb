use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use anyhow::Context;

use crate::grouped::Regime;

/// The description of one comparison table, as read from a TOML file.
///
/// For example:
///
/// ```toml
/// inputs = ["benchmark_results_damgard.txt", "benchmark_results_ec.txt"]
/// phases = ["S", "K", "F", "E", "D"]
/// regimes = ["b=1000", "a=10"]
/// output = "table_ddh.txt"
/// ```
///
/// Every field is optional here. Whatever is missing may be given on the
/// command line instead.
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableConfig {
    /// Benchmark logs, one per column. The first is the primary series.
    #[serde(default)]
    pub inputs: Vec<PathBuf>,
    /// Phase tags, in the order their sections should appear.
    #[serde(default)]
    pub phases: Vec<String>,
    /// Fixed-parameter regimes, in the order they should appear.
    #[serde(default)]
    pub regimes: Vec<Regime>,
    /// Where to write the table. When absent, it goes to stdout.
    pub output: Option<PathBuf>,
    /// Whether missing entries and coverage gaps should fail the run.
    #[serde(default)]
    pub strict: bool,
}

impl TableConfig {
    /// Reads a table config from the TOML file at the given path.
    ///
    /// Relative input and output paths are resolved against the directory
    /// containing the config file, so that a config and its logs can be moved
    /// around together.
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<TableConfig> {
        let path = path.as_ref();
        let data = std::fs::read(path).with_context(|| {
            format!("failed to read table config from {}", path.display())
        })?;
        let data = std::str::from_utf8(&data).with_context(|| {
            format!("data in {} is not valid UTF-8", path.display())
        })?;
        let mut config = TableConfig::from_toml(data).with_context(|| {
            format!("error decoding TOML for {}", path.display())
        })?;
        if let Some(dir) = path.parent() {
            config.resolve(dir);
        }
        Ok(config)
    }

    /// Parses a table config from TOML source. Paths are left as written.
    pub fn from_toml(data: &str) -> anyhow::Result<TableConfig> {
        let config: TableConfig = toml::from_str(data)?;
        validate_phases(&config.phases)?;
        Ok(config)
    }

    /// Joins every relative path in this config onto `dir`.
    fn resolve(&mut self, dir: &Path) {
        for input in self.inputs.iter_mut() {
            if input.is_relative() {
                *input = dir.join(&*input);
            }
        }
        if let Some(ref mut output) = self.output {
            if output.is_relative() {
                *output = dir.join(&*output);
            }
        }
    }
}

/// Checks that every phase tag could actually appear as the first field of a
/// log line, and that no tag is listed twice.
pub fn validate_phases(phases: &[String]) -> anyhow::Result<()> {
    let re = regex!(r"^\S+$");
    let mut seen = BTreeSet::new();
    for phase in phases.iter() {
        anyhow::ensure!(
            re.is_match(phase),
            "phase tag {:?} must be non-empty and contain no whitespace",
            phase,
        );
        anyhow::ensure!(
            seen.insert(phase.as_str()),
            "phase tag '{}' is listed more than once",
            phase,
        );
    }
    Ok(())
}
