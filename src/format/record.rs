use std::path::Path;

use {anyhow::Context, bstr::ByteSlice};

/// The number of raw timing units in one display unit.
///
/// The benchmark suite logs durations in microseconds, while every table and
/// plot reports milliseconds.
pub const RAW_PER_DISPLAY: f64 = 1_000.0;

/// Refers to one of the two experiment parameters carried by every record.
///
/// What the parameters mean is up to the benchmarked scheme (vector length,
/// bound on the inputs, number of clients and so on). All we care about is
/// which one is which.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Param {
    A,
    B,
}

impl Param {
    /// Returns the parameter that is not this one.
    pub fn other(self) -> Param {
        match self {
            Param::A => Param::B,
            Param::B => Param::A,
        }
    }
}

impl Default for Param {
    fn default() -> Param {
        Param::A
    }
}

impl std::fmt::Display for Param {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            Param::A => write!(f, "a"),
            Param::B => write!(f, "b"),
        }
    }
}

impl std::str::FromStr for Param {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Param> {
        let param = match s {
            "a" | "A" => Param::A,
            "b" | "B" => Param::B,
            unknown => {
                anyhow::bail!(
                    "unrecognized parameter '{}', must be one of a or b",
                    unknown,
                )
            }
        };
        Ok(param)
    }
}

/// A single timing taken from a benchmark log.
///
/// Each line of a log has the form `<tag> <a> <b> <duration>`, where the tag
/// names the phase of the scheme that was timed and the duration is in raw
/// units. The duration stored here has already been converted to display
/// units.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub phase: String,
    pub a: u64,
    pub b: u64,
    pub duration: f64,
}

impl Record {
    /// Parses a single log line into a record.
    ///
    /// Fields are separated by whitespace. Anything after the fourth field is
    /// ignored.
    pub fn parse(line: &str) -> anyhow::Result<Record> {
        let mut fields = line.split_whitespace();
        let (Some(phase), Some(a), Some(b), Some(raw)) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            anyhow::bail!(
                "expected 4 fields (tag, a, b, duration) but found {}",
                line.split_whitespace().count(),
            );
        };
        let a = parse_int(a, "parameter a")?;
        let b = parse_int(b, "parameter b")?;
        let raw = parse_int(raw, "duration")?;
        Ok(Record {
            phase: phase.to_string(),
            a,
            b,
            duration: raw as f64 / RAW_PER_DISPLAY,
        })
    }

    /// Returns the value of the given parameter for this record.
    pub fn param(&self, which: Param) -> u64 {
        match which {
            Param::A => self.a,
            Param::B => self.b,
        }
    }
}

/// All of the records read from one benchmark log, in file order.
///
/// A series is never modified once loaded.
#[derive(Clone, Debug)]
pub struct Series {
    /// A name for this series, usually the path it was loaded from. It is
    /// only used in messages.
    pub label: String,
    pub records: Vec<Record>,
}

impl Series {
    /// Loads every record from the log at the given path.
    ///
    /// The first line that fails to parse aborts the entire load.
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Series> {
        let path = path.as_ref();
        let data = std::fs::read(path).with_context(|| {
            format!("failed to read benchmark log {}", path.display())
        })?;
        Series::from_slice(path.display().to_string(), &data)
    }

    /// Parses a series from the raw contents of a benchmark log.
    pub fn from_slice(
        label: impl Into<String>,
        data: &[u8],
    ) -> anyhow::Result<Series> {
        let label = label.into();
        let records = read_lines(&label, data, Record::parse)?;
        log::debug!("loaded {} records from {}", records.len(), label);
        Ok(Series { label, records })
    }
}

/// A single timing from a one-dimensional log, where each line has the form
/// `<param> <duration>`.
///
/// These come from the samplers' timing runs, which only vary one parameter.
/// The parameter may be negative since samplers log the values they drew. As
/// with records, the duration is in display units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub param: i64,
    pub duration: f64,
}

impl Sample {
    /// Parses a single `<param> <duration>` line.
    pub fn parse(line: &str) -> anyhow::Result<Sample> {
        let mut fields = line.split_whitespace();
        let (Some(param), Some(raw)) = (fields.next(), fields.next()) else {
            anyhow::bail!(
                "expected 2 fields (param, duration) but found {}",
                line.split_whitespace().count(),
            );
        };
        let param = param.parse::<i64>().with_context(|| {
            format!("parameter '{}' is not an integer", param)
        })?;
        let raw = parse_int(raw, "duration")?;
        Ok(Sample { param, duration: raw as f64 / RAW_PER_DISPLAY })
    }

    /// Reads every sample from the log at the given path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<Sample>> {
        let path = path.as_ref();
        let data = std::fs::read(path).with_context(|| {
            format!("failed to read sample log {}", path.display())
        })?;
        let label = path.display().to_string();
        let samples = read_lines(&label, &data, Sample::parse)?;
        log::debug!("loaded {} samples from {}", samples.len(), label);
        Ok(samples)
    }

    /// Projects the given record onto one of its parameters.
    pub fn from_record(
        record: &Record,
        which: Param,
    ) -> anyhow::Result<Sample> {
        let value = record.param(which);
        let param = i64::try_from(value).with_context(|| {
            format!("parameter {} is too big to average: {}", which, value)
        })?;
        Ok(Sample { param, duration: record.duration })
    }
}

/// Runs `parse` on every non-blank line in `data`, stopping at the first
/// failure. Errors are tagged with `label:line`.
fn read_lines<T>(
    label: &str,
    data: &[u8],
    mut parse: impl FnMut(&str) -> anyhow::Result<T>,
) -> anyhow::Result<Vec<T>> {
    let mut items = vec![];
    for (i, line) in data.lines().enumerate() {
        let lineno = i + 1;
        let line = line.to_str().with_context(|| {
            format!("{}:{}: line is not valid UTF-8", label, lineno)
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let item = parse(line).with_context(|| {
            format!("{}:{}: failed to parse line {:?}", label, lineno, line)
        })?;
        items.push(item);
    }
    Ok(items)
}

fn parse_int(field: &str, what: &str) -> anyhow::Result<u64> {
    field.parse::<u64>().with_context(|| {
        format!("{} '{}' is not a non-negative integer", what, field)
    })
}
