use std::io::Write;

use crate::{
    format::record::Series,
    grouped::{self, Join, JoinedRow, Regime},
    util::{colorize_error, colorize_label},
};

/// The rows for one phase in one regime.
#[derive(Clone, Debug)]
pub struct Section {
    pub phase: String,
    pub regime: Regime,
    /// One row per key, in ascending key order.
    pub rows: Vec<JoinedRow>,
}

/// A comparison table across several series.
///
/// Sections are ordered first by regime and then by phase, both in the order
/// given when building the table.
#[derive(Clone, Debug)]
pub struct Table {
    pub sections: Vec<Section>,
    /// The label of each joined series, in column order.
    pub columns: Vec<String>,
}

impl Table {
    /// Builds a table from the given series.
    ///
    /// The first series is the primary one: the keys of each section are the
    /// ones found in it. Every other series is only consulted for durations
    /// at those keys, and gets a missing marker wherever it has none.
    pub fn build(
        series: &[Series],
        phases: &[String],
        regimes: &[Regime],
    ) -> anyhow::Result<Table> {
        let Some(primary) = series.first() else {
            anyhow::bail!("at least one series is required to build a table")
        };
        let join = Join::new(series, regimes);
        log::debug!(
            "joining {} series on {} phases and {} regimes",
            join.len(),
            phases.len(),
            regimes.len(),
        );
        let mut sections = vec![];
        for &regime in regimes.iter() {
            for phase in phases.iter() {
                let keys = grouped::select(primary, phase, regime);
                log::debug!(
                    "phase '{}' with {} has {} keys in {}",
                    phase,
                    regime,
                    keys.len(),
                    primary.label,
                );
                let rows = keys
                    .into_iter()
                    .map(|key| join.row(key, phase, regime))
                    .collect();
                sections.push(Section { phase: phase.clone(), regime, rows });
            }
        }
        let columns = series.iter().map(|s| s.label.clone()).collect();
        Ok(Table { sections, columns })
    }

    /// Returns every missing entry in this table as a human readable
    /// description.
    pub fn missing(&self) -> Vec<String> {
        let mut missing = vec![];
        for section in self.sections.iter() {
            for row in section.rows.iter() {
                for i in row.missing() {
                    missing.push(format!(
                        "{} has no duration for phase '{}' with {} at key {}",
                        self.columns[i], section.phase, section.regime, row.key,
                    ));
                }
            }
        }
        missing
    }

    /// Writes this table as typeset table rows.
    ///
    /// Each section starts with a line containing just the phase tag,
    /// followed by one `key & v1 & ... & vN \\` line per row.
    pub fn write<W: termcolor::WriteColor>(
        &self,
        mut wtr: W,
    ) -> anyhow::Result<()> {
        for section in self.sections.iter() {
            colorize_label(&mut wtr, |w| write!(w, "{}", section.phase))?;
            writeln!(wtr, "")?;
            for row in section.rows.iter() {
                write!(wtr, "{}", row.key)?;
                for value in row.values.iter() {
                    write!(wtr, " & ")?;
                    if value.is_missing() {
                        colorize_error(&mut wtr, |w| write!(w, "{}", value))?;
                    } else {
                        write!(wtr, "{}", value)?;
                    }
                }
                writeln!(wtr, r" \\")?;
            }
        }
        Ok(())
    }
}
