/*!
This module provides the routines for grouping benchmark records and lining
them up across several series.

A comparison table is built one regime at a time. A regime holds one of the two
experiment parameters at a constant value (for example, `b=1000`), which leaves
the other parameter free to vary. Within a regime and a phase, the distinct
values of the varying parameter are the keys of the table rows, and each series
contributes one duration per key.

The averaging path lives here too, since it is also just a grouping of records
by parameter, except that it never crosses series boundaries.
*/

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Context;

use crate::format::record::{Param, Record, Sample, Series};

/// The regimes used when none are given: vary `a` with `b` held at 1000, then
/// vary `b` with `a` held at 10.
pub const DEFAULT_REGIMES: &[Regime] = &[
    Regime { fixed: Param::B, value: 1000 },
    Regime { fixed: Param::A, value: 10 },
];

/// One parameter held at a constant value while the other varies.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Regime {
    pub fixed: Param,
    pub value: u64,
}

impl Regime {
    /// Returns the parameter that varies in this regime.
    pub fn varying(&self) -> Param {
        self.fixed.other()
    }

    /// Returns true when the record's fixed parameter has this regime's
    /// value.
    pub fn contains(&self, record: &Record) -> bool {
        record.param(self.fixed) == self.value
    }

    /// If the record belongs to the given phase and to this regime, then this
    /// returns its value for the varying parameter.
    pub fn key(&self, phase: &str, record: &Record) -> Option<u64> {
        if record.phase == phase && self.contains(record) {
            Some(record.param(self.varying()))
        } else {
            None
        }
    }
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}={}", self.fixed, self.value)
    }
}

impl std::str::FromStr for Regime {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Regime> {
        let re = regex!(
            r"(?x)
                ^
                \s*(?P<param>[aAbB])\s*
                =
                \s*(?P<value>[0-9]+)\s*
                $
            ",
        );
        let caps = match re.captures(s) {
            Some(caps) => caps,
            None => anyhow::bail!(
                "regime '{}' not in '(a|b)=<integer>' format",
                s,
            ),
        };
        let fixed: Param = caps["param"].parse()?;
        let value: u64 = caps["value"]
            .parse()
            .with_context(|| format!("invalid value in regime '{}'", s))?;
        Ok(Regime { fixed, value })
    }
}

impl<'de> serde::Deserialize<'de> for Regime {
    fn deserialize<D>(deserializer: D) -> Result<Regime, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl<'de> serde::de::Visitor<'de> for V {
            type Value = Regime;

            fn expecting(
                &self,
                f: &mut std::fmt::Formatter,
            ) -> std::fmt::Result {
                write!(f, "regime string of the form (a|b)=<integer>")
            }

            fn visit_str<E>(self, s: &str) -> Result<Regime, E>
            where
                E: serde::de::Error,
            {
                s.parse::<Regime>()
                    .map_err(|e| serde::de::Error::custom(e.to_string()))
            }
        }
        deserializer.deserialize_str(V)
    }
}

/// Returns the distinct values of the varying parameter among the records in
/// `series` that belong to `phase` and `regime`, in ascending order.
///
/// An empty result just means the phase was never measured in this regime.
pub fn select(series: &Series, phase: &str, regime: Regime) -> Vec<u64> {
    let keys: BTreeSet<u64> =
        series.records.iter().filter_map(|r| regime.key(phase, r)).collect();
    keys.into_iter().collect()
}

/// A duration looked up from one series, or a marker saying there was no
/// matching record.
///
/// A missing value still occupies its column when rendered, so that rows stay
/// aligned.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    Present(f64),
    Missing,
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(*self, Value::Missing)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            Value::Missing => write!(f, "-"),
            // Whole numbers keep a trailing '.0' so every cell reads as a
            // decimal.
            Value::Present(v) if v.is_finite() && v.fract() == 0.0 => {
                write!(f, "{:.1}", v)
            }
            Value::Present(v) => write!(f, "{}", v),
        }
    }
}

/// One row of a comparison table. There is exactly one value per joined
/// series.
#[derive(Clone, Debug, PartialEq)]
pub struct JoinedRow {
    pub key: u64,
    pub values: Vec<Value>,
}

impl JoinedRow {
    /// Returns the positions of every missing value in this row.
    pub fn missing(&self) -> impl Iterator<Item = usize> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_missing())
            .map(|(i, _)| i)
    }
}

/// A lookup table over one series, built once and then queried per row.
///
/// When several records share a phase, regime and key, the one appearing
/// first in the log is kept.
#[derive(Clone, Debug)]
struct SeriesIndex<'a> {
    by_phase: BTreeMap<&'a str, BTreeMap<(Regime, u64), f64>>,
}

impl<'a> SeriesIndex<'a> {
    fn new(series: &'a Series, regimes: &[Regime]) -> SeriesIndex<'a> {
        use std::collections::btree_map::Entry;

        let mut by_phase: BTreeMap<&'a str, BTreeMap<(Regime, u64), f64>> =
            BTreeMap::new();
        for record in series.records.iter() {
            for &regime in regimes.iter() {
                if !regime.contains(record) {
                    continue;
                }
                let key = record.param(regime.varying());
                let entry = by_phase
                    .entry(record.phase.as_str())
                    .or_default()
                    .entry((regime, key));
                match entry {
                    Entry::Vacant(e) => {
                        e.insert(record.duration);
                    }
                    Entry::Occupied(e) => {
                        log::debug!(
                            "{}: ignoring duplicate record for phase '{}', \
                             {} and key {} (keeping first duration {})",
                            series.label,
                            record.phase,
                            regime,
                            key,
                            e.get(),
                        );
                    }
                }
            }
        }
        SeriesIndex { by_phase }
    }

    fn get(&self, phase: &str, regime: Regime, key: u64) -> Option<f64> {
        self.by_phase.get(phase)?.get(&(regime, key)).copied()
    }
}

/// Lines up durations from several series by phase, regime and key.
///
/// Every series is indexed up front, so building a row costs one lookup per
/// series regardless of how long the logs are.
#[derive(Clone, Debug)]
pub struct Join<'a> {
    indexes: Vec<SeriesIndex<'a>>,
}

impl<'a> Join<'a> {
    /// Index the given series for lookups within any of the given regimes.
    pub fn new(series: &'a [Series], regimes: &[Regime]) -> Join<'a> {
        let indexes =
            series.iter().map(|s| SeriesIndex::new(s, regimes)).collect();
        Join { indexes }
    }

    /// The number of series joined, which is also the number of values in
    /// every row.
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    /// Builds the row for `key`, taking one duration from each series in the
    /// order the series were given. Series without a matching record get
    /// `Value::Missing`.
    ///
    /// Lookups for a regime that was not given to `Join::new` always come
    /// back missing.
    pub fn row(&self, key: u64, phase: &str, regime: Regime) -> JoinedRow {
        let values = self
            .indexes
            .iter()
            .map(|index| match index.get(phase, regime, key) {
                Some(duration) => Value::Present(duration),
                None => Value::Missing,
            })
            .collect();
        JoinedRow { key, values }
    }
}

/// A phase or regime that some series never recorded.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Gap {
    /// The series has no record at all for this phase.
    Phase { series: String, phase: String },
    /// The series has no record whose fixed parameter equals the regime's
    /// value.
    Regime { series: String, regime: Regime },
}

impl std::fmt::Display for Gap {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            Gap::Phase { ref series, ref phase } => {
                write!(f, "{} has no records for phase '{}'", series, phase)
            }
            Gap::Regime { ref series, ref regime } => {
                write!(f, "{} has no records with {}", series, regime)
            }
        }
    }
}

/// Checks that every series mentions every phase and every regime's fixed
/// value at least once.
///
/// Logs produced with a different phase vocabulary or different parameter
/// constants would otherwise just yield empty sections or columns full of
/// missing markers.
pub fn coverage_gaps(
    series: &[Series],
    phases: &[String],
    regimes: &[Regime],
) -> Vec<Gap> {
    let mut gaps = vec![];
    for s in series.iter() {
        let seen: BTreeSet<&str> =
            s.records.iter().map(|r| r.phase.as_str()).collect();
        for phase in phases.iter() {
            if !seen.contains(phase.as_str()) {
                gaps.push(Gap::Phase {
                    series: s.label.clone(),
                    phase: phase.clone(),
                });
            }
        }
        for &regime in regimes.iter() {
            if !s.records.iter().any(|r| regime.contains(r)) {
                gaps.push(Gap::Regime { series: s.label.clone(), regime });
            }
        }
    }
    gaps
}

/// The arithmetic mean of all durations sharing one parameter value.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct AveragedGroup {
    #[serde(rename = "param")]
    pub key: i64,
    pub mean: f64,
    /// Always at least 1.
    pub count: usize,
}

/// Groups samples by parameter and averages the durations in each group.
///
/// Groups are returned in ascending order of parameter.
pub fn average(samples: &[Sample]) -> Vec<AveragedGroup> {
    let mut sums: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
    for sample in samples.iter() {
        let (sum, count) = sums.entry(sample.param).or_insert((0.0, 0));
        *sum += sample.duration;
        *count += 1;
    }
    sums.into_iter()
        .map(|(key, (sum, count))| AveragedGroup {
            key,
            mean: sum / count as f64,
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(label: &str, lines: &[&str]) -> Series {
        Series::from_slice(label, lines.join("\n").as_bytes()).unwrap()
    }

    fn fixed_b() -> Regime {
        Regime { fixed: Param::B, value: 1000 }
    }

    fn fixed_a() -> Regime {
        Regime { fixed: Param::A, value: 10 }
    }

    #[test]
    fn regime_parse() {
        assert_eq!(fixed_b(), "b=1000".parse::<Regime>().unwrap());
        assert_eq!(fixed_a(), " A = 10 ".parse::<Regime>().unwrap());
        assert!("c=10".parse::<Regime>().is_err());
        assert!("a=".parse::<Regime>().is_err());
        assert!("a=-1".parse::<Regime>().is_err());
        assert!("a=99999999999999999999999".parse::<Regime>().is_err());
        assert_eq!("b=1000", fixed_b().to_string());
    }

    #[test]
    fn select_sorted_and_deduplicated() {
        let s = series(
            "s1",
            &[
                "S 40 1000 1",
                "S 10 1000 2",
                "S 20 1000 3",
                "S 10 1000 4",
                "S 30 999 5",
                "K 50 1000 6",
            ],
        );
        let keys = select(&s, "S", fixed_b());
        assert_eq!(vec![10, 20, 40], keys);
        // Selecting again over the same series gives the same thing.
        assert_eq!(keys, select(&s, "S", fixed_b()));
    }

    #[test]
    fn select_fixed_a_varies_b() {
        let s = series(
            "s1",
            &["E 10 2000 1", "E 10 1000 2", "E 20 500 3", "E 10 1000 4"],
        );
        assert_eq!(vec![1000, 2000], select(&s, "E", fixed_a()));
    }

    #[test]
    fn select_empty_group() {
        let s = series("s1", &["S 10 1000 1"]);
        assert!(select(&s, "D", fixed_b()).is_empty());
        assert_eq!(vec![1000], select(&s, "S", fixed_a()));
        assert!(select(&s, "S", Regime { fixed: Param::A, value: 11 })
            .is_empty());
    }

    #[test]
    fn join_basic() {
        let all = vec![
            series("s1", &["S 10 1000 5000", "S 20 1000 7000"]),
            series("s2", &["S 10 1000 6000", "S 20 1000 8000"]),
        ];
        let join = Join::new(&all, &[fixed_b()]);
        assert_eq!(2, join.len());
        let row = join.row(10, "S", fixed_b());
        assert_eq!(
            JoinedRow {
                key: 10,
                values: vec![Value::Present(5.0), Value::Present(6.0)],
            },
            row,
        );
    }

    #[test]
    fn join_first_match_wins() {
        let all = vec![series(
            "s1",
            &["F 10 1000 1000", "F 10 1000 9000", "F 10 1000 4000"],
        )];
        let join = Join::new(&all, DEFAULT_REGIMES);
        let row = join.row(10, "F", fixed_b());
        assert_eq!(vec![Value::Present(1.0)], row.values);
    }

    #[test]
    fn join_missing_entry() {
        let all = vec![
            series("s1", &["S 10 1000 5000", "S 20 1000 7000"]),
            series("s2", &["S 10 1000 6000"]),
        ];
        let join = Join::new(&all, &[fixed_b()]);
        let row = join.row(20, "S", fixed_b());
        assert_eq!(vec![Value::Present(7.0), Value::Missing], row.values);
        assert_eq!(vec![1], row.missing().collect::<Vec<_>>());
    }

    #[test]
    fn join_respects_phase_and_regime() {
        let all = vec![series(
            "s1",
            &["S 10 1000 1000", "K 10 1000 2000", "S 10 10 3000"],
        )];
        let join = Join::new(&all, DEFAULT_REGIMES);
        assert_eq!(
            vec![Value::Present(2.0)],
            join.row(10, "K", fixed_b()).values
        );
        // 'S 10 10' is in the a=10 regime with key b=10.
        assert_eq!(
            vec![Value::Present(3.0)],
            join.row(10, "S", fixed_a()).values
        );
        // 'S 10 1000' is in both regimes.
        assert_eq!(
            vec![Value::Present(1.0)],
            join.row(1000, "S", fixed_a()).values
        );
        assert_eq!(vec![Value::Missing], join.row(10, "D", fixed_b()).values);
    }

    #[test]
    fn join_unindexed_regime_is_missing() {
        let all = vec![series("s1", &["S 10 1000 1000"])];
        let join = Join::new(&all, &[fixed_a()]);
        assert_eq!(vec![Value::Missing], join.row(10, "S", fixed_b()).values);
    }

    #[test]
    fn value_display() {
        assert_eq!("5.0", Value::Present(5.0).to_string());
        assert_eq!("1.234", Value::Present(1.234).to_string());
        assert_eq!("0.001", Value::Present(0.001).to_string());
        assert_eq!("12345.0", Value::Present(12345.0).to_string());
        assert_eq!("-", Value::Missing.to_string());
    }

    #[test]
    fn coverage() {
        let all = vec![
            series("s1", &["S 10 1000 1", "K 10 5 1"]),
            series("s2", &["S 3 1000 1"]),
        ];
        let phases = vec!["S".to_string(), "K".to_string()];
        let gaps = coverage_gaps(&all, &phases, DEFAULT_REGIMES);
        assert_eq!(
            vec![
                Gap::Phase { series: "s2".to_string(), phase: "K".to_string() },
                Gap::Regime { series: "s2".to_string(), regime: fixed_a() },
            ],
            gaps,
        );
    }

    #[test]
    fn coverage_complete() {
        let all = vec![series("s1", &["S 10 1000 1"])];
        let phases = vec!["S".to_string()];
        assert!(coverage_gaps(&all, &phases, DEFAULT_REGIMES).is_empty());
    }

    #[test]
    fn average_basic() {
        let samples = vec![
            Sample { param: 5, duration: 100.0 },
            Sample { param: 5, duration: 300.0 },
        ];
        assert_eq!(
            vec![AveragedGroup { key: 5, mean: 200.0, count: 2 }],
            average(&samples),
        );
    }

    #[test]
    fn average_negative_params() {
        let samples = vec![
            Sample { param: 3, duration: 1.0 },
            Sample { param: -3, duration: 2.0 },
            Sample { param: -3, duration: 4.0 },
        ];
        assert_eq!(
            vec![
                AveragedGroup { key: -3, mean: 3.0, count: 2 },
                AveragedGroup { key: 3, mean: 1.0, count: 1 },
            ],
            average(&samples),
        );
    }

    #[test]
    fn average_sorted_by_param() {
        let samples = vec![
            Sample { param: 9, duration: 1.0 },
            Sample { param: 2, duration: 4.0 },
            Sample { param: 9, duration: 3.0 },
            Sample { param: 2, duration: 2.0 },
            Sample { param: 2, duration: 3.0 },
            Sample { param: 4, duration: 7.5 },
        ];
        let got = average(&samples);
        assert_eq!(
            vec![
                AveragedGroup { key: 2, mean: 3.0, count: 3 },
                AveragedGroup { key: 4, mean: 7.5, count: 1 },
                AveragedGroup { key: 9, mean: 2.0, count: 2 },
            ],
            got,
        );
    }

    #[test]
    fn average_empty() {
        assert!(average(&[]).is_empty());
    }
}
