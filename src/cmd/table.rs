use std::{io::Write, path::PathBuf};

use anyhow::Context;

use crate::{
    args::{self, Color, Usage},
    format::{
        config::{validate_phases, TableConfig},
        record::Series,
    },
    grouped::{self, Regime, DEFAULT_REGIMES},
    table::Table,
};

const USAGES: &[Usage] = &[
    Color::USAGE,
    Usage::new(
        "-c, --config <path>",
        "Read the table description from a TOML file.",
        r#"
Read the table description from a TOML file.

The file may set 'inputs' (a list of log paths), 'phases' (a list of phase
tags), 'regimes' (a list of strings like "b=1000"), 'output' (a path) and
'strict' (a boolean). Relative paths are resolved against the directory
containing the config file.

Anything given on the command line takes precedence. Log paths, phases and
regimes given on the command line replace the corresponding list in the config
file rather than adding to it.
"#,
    ),
    Usage::new(
        "-o, --output <path>",
        "Write the table to a file instead of stdout.",
        r#"
Write the table to the given file instead of stdout.

The file is created if it doesn't exist and truncated if it does. Output
written to a file is never colored.
"#,
    ),
    Usage::PHASE,
    Usage::new(
        "-r, --regime <param=value> ...",
        "Hold one parameter fixed, e.g., 'b=1000'.",
        r#"
Add a regime in which one parameter is held fixed.

A regime has the form '<param>=<value>', where param is either 'a' or 'b'
(the second and third fields of each log line). For example, 'b=1000' selects
the records whose b parameter is 1000 and uses their a parameter as the row
key. This flag may be given multiple times, and the table contains one full
set of phase sections for each regime, in the order given.

When no regimes are given, the default is 'b=1000' followed by 'a=10'.
"#,
    ),
    Usage::new(
        "--strict",
        "Fail on missing entries and coverage gaps.",
        r#"
Treat missing entries and coverage gaps as errors.

By default, a series that lacks a duration for some row gets a '-' in that
column, and a series that never mentions one of the phases or one of the
regime values only produces a warning. With this flag, both conditions cause
the command to fail without writing any output. This is useful when every
benchmark is expected to have run the same parameter matrix.
"#,
    ),
];

fn usage_short() -> String {
    format!(
        "\
Build a comparison table from two or more benchmark logs.

USAGE:
    benchtab table [OPTIONS] <log-path> ...

TIP:
    use -h for short docs and --help for long docs

OPTIONS:
{options}
",
        options = Usage::short(USAGES),
    )
    .trim()
    .to_string()
}

fn usage_long() -> String {
    format!(
        "\
Build a comparison table from two or more benchmark logs.

Each log is a series of lines of the form '<tag> <a> <b> <duration>', where
the tag names a phase of the benchmarked scheme, 'a' and 'b' are the two
experiment parameters and the duration is in microseconds. Durations are
reported in milliseconds.

For each regime and each phase, the table has a line with the phase tag
followed by one row per distinct value of the varying parameter:

    <key> & <duration in log 1> & <duration in log 2> & ... \\\\

The keys come from the first log given. If several lines in one log match the
same row, the earliest one is used. A log without a matching line gets '-' in
that column.

USAGE:
    benchtab table [OPTIONS] <log-path> ...

    For example, to compare two DDH based inner product schemes:

        benchtab table -p S -p K -p F -p E -p D \\
            benchmark_results_damgard.txt benchmark_results_ec.txt

TIP:
    use -h for short docs and --help for long docs

OPTIONS:
{options}
",
        options = Usage::long(USAGES),
    )
    .trim()
    .to_string()
}

pub fn run(p: &mut lexopt::Parser) -> anyhow::Result<()> {
    let config = Config::parse(p)?;
    let table = build(&config)?;
    emit(&config, &table)
}

/// Loads every log named by the config and builds the table from them.
///
/// In strict mode, coverage gaps and missing entries are errors. Either way
/// they are logged as warnings.
fn build(config: &Config) -> anyhow::Result<Table> {
    let mut series = vec![];
    for path in config.inputs.iter() {
        series.push(Series::from_path(path)?);
    }

    let gaps =
        grouped::coverage_gaps(&series, &config.phases, &config.regimes);
    for gap in gaps.iter() {
        log::warn!("{}", gap);
    }
    anyhow::ensure!(
        !config.strict || gaps.is_empty(),
        "found {} coverage gap(s) across the given logs (see warnings)",
        gaps.len(),
    );

    let table = Table::build(&series, &config.phases, &config.regimes)?;
    let missing = table.missing();
    for m in missing.iter() {
        log::warn!("{}", m);
    }
    anyhow::ensure!(
        !config.strict || missing.is_empty(),
        "found {} missing entries in the table (see warnings)",
        missing.len(),
    );
    Ok(table)
}

/// Writes the table to the configured output. Only stdout is ever colored.
fn emit(config: &Config, table: &Table) -> anyhow::Result<()> {
    match config.output {
        None => {
            let mut wtr = config.color.stdout();
            table.write(&mut wtr)?;
            wtr.flush()?;
        }
        Some(ref path) => {
            let file = std::fs::File::create(path).with_context(|| {
                format!("failed to create {}", path.display())
            })?;
            let mut wtr =
                termcolor::NoColor::new(std::io::BufWriter::new(file));
            table.write(&mut wtr)?;
            wtr.flush().with_context(|| {
                format!("failed to write {}", path.display())
            })?;
            log::info!(
                "wrote {} sections to {}",
                table.sections.len(),
                path.display(),
            );
        }
    }
    Ok(())
}

/// The arguments for this 'table' command, after merging CLI args with an
/// optional config file.
#[derive(Debug, Default)]
struct Config {
    /// File paths to benchmark logs. The first one is the primary series.
    inputs: Vec<PathBuf>,
    /// Phase tags, in output order.
    phases: Vec<String>,
    /// Fixed-parameter regimes, in output order.
    regimes: Vec<Regime>,
    /// Where to write the table, or stdout if absent.
    output: Option<PathBuf>,
    /// Whether missing entries and gaps are fatal.
    strict: bool,
    /// The user's color choice. We default to 'Auto'.
    color: Color,
}

impl Config {
    /// Parse 'table' args from the given CLI parser.
    fn parse(p: &mut lexopt::Parser) -> anyhow::Result<Config> {
        use lexopt::Arg;

        let mut c = Config::default();
        let mut config_path: Option<PathBuf> = None;
        while let Some(arg) = p.next()? {
            match arg {
                Arg::Value(v) => c.inputs.push(PathBuf::from(v)),
                Arg::Short('h') => anyhow::bail!("{}", usage_short()),
                Arg::Long("help") => anyhow::bail!("{}", usage_long()),
                Arg::Long("color") => {
                    c.color = args::parse(p, "--color")?;
                }
                Arg::Short('c') | Arg::Long("config") => {
                    config_path = Some(PathBuf::from(p.value()?));
                }
                Arg::Short('o') | Arg::Long("output") => {
                    c.output = Some(PathBuf::from(p.value()?));
                }
                Arg::Short('p') | Arg::Long("phase") => {
                    c.phases.push(args::parse(p, "-p/--phase")?);
                }
                Arg::Short('r') | Arg::Long("regime") => {
                    c.regimes.push(args::parse(p, "-r/--regime")?);
                }
                Arg::Long("strict") => {
                    c.strict = true;
                }
                _ => return Err(arg.unexpected().into()),
            }
        }
        if let Some(path) = config_path {
            c.merge(TableConfig::from_path(&path)?);
        }
        validate_phases(&c.phases).context("-p/--phase")?;
        if c.regimes.is_empty() {
            log::debug!("no regimes given, using the defaults");
            c.regimes = DEFAULT_REGIMES.to_vec();
        }
        anyhow::ensure!(!c.inputs.is_empty(), "no benchmark log paths given");
        anyhow::ensure!(
            !c.phases.is_empty(),
            "no phases given, use -p/--phase or a config file",
        );
        Ok(c)
    }

    /// Fill in anything not given on the command line from a config file.
    fn merge(&mut self, file: TableConfig) {
        if self.inputs.is_empty() {
            self.inputs = file.inputs;
        }
        if self.phases.is_empty() {
            self.phases = file.phases;
        }
        if self.regimes.is_empty() {
            self.regimes = file.regimes;
        }
        if self.output.is_none() {
            self.output = file.output;
        }
        self.strict = self.strict || file.strict;
    }
}

#[cfg(test)]
mod tests {
    use crate::format::record::Param;

    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<Config> {
        let mut p = lexopt::Parser::from_args(args.iter().copied());
        Config::parse(&mut p)
    }

    /// Returns a fresh scratch directory for one test.
    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("benchtab-{}-{}", std::process::id(), name));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Writes each log into `dir` and returns a config that reads them and
    /// writes the table to `dir/out.txt`.
    fn config_for(dir: &std::path::Path, logs: &[(&str, &str)]) -> Config {
        let mut inputs = vec![];
        for &(name, contents) in logs.iter() {
            let path = dir.join(name);
            std::fs::write(&path, contents).unwrap();
            inputs.push(path);
        }
        Config {
            inputs,
            phases: vec!["S".to_string()],
            regimes: vec![Regime { fixed: Param::B, value: 1000 }],
            output: Some(dir.join("out.txt")),
            strict: false,
            color: Color::Always,
        }
    }

    fn build_and_emit(config: &Config) -> anyhow::Result<()> {
        let table = build(config)?;
        emit(config, &table)
    }

    #[test]
    fn missing_entry_written_plain() {
        let dir = scratch("missing-plain");
        let config = config_for(
            &dir,
            &[
                ("s1.txt", "S 10 1000 5000\nS 20 1000 7000\n"),
                ("s2.txt", "S 10 1000 6000\n"),
            ],
        );
        build_and_emit(&config).unwrap();
        let got = std::fs::read_to_string(dir.join("out.txt")).unwrap();
        let expected = "\
S
10 & 5.0 & 6.0 \\\\
20 & 7.0 & - \\\\
";
        assert_eq!(expected, got);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn strict_missing_entry_writes_nothing() {
        let dir = scratch("strict-missing");
        let mut config = config_for(
            &dir,
            &[
                ("s1.txt", "S 10 1000 5000\nS 20 1000 7000\n"),
                ("s2.txt", "S 10 1000 6000\n"),
            ],
        );
        config.strict = true;
        let err = build_and_emit(&config).unwrap_err();
        assert!(err.to_string().contains("missing entries"), "{}", err);
        assert!(!dir.join("out.txt").exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn strict_coverage_gap_writes_nothing() {
        let dir = scratch("strict-gap");
        let mut config = config_for(
            &dir,
            &[
                ("s1.txt", "S 10 1000 5000\nK 10 1000 1000\n"),
                ("s2.txt", "S 10 1000 6000\n"),
            ],
        );
        config.phases = vec!["S".to_string(), "K".to_string()];
        config.strict = true;
        let err = build_and_emit(&config).unwrap_err();
        assert!(err.to_string().contains("coverage gap"), "{}", err);
        assert!(!dir.join("out.txt").exists());

        config.strict = false;
        build_and_emit(&config).unwrap();
        assert!(dir.join("out.txt").exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn parse_flags() {
        let c = parse(&[
            "-p", "S", "--phase", "K", "-r", "a=10", "--strict", "-o",
            "out.txt", "one.txt", "two.txt",
        ])
        .unwrap();
        assert_eq!(
            vec![PathBuf::from("one.txt"), PathBuf::from("two.txt")],
            c.inputs
        );
        assert_eq!(vec!["S", "K"], c.phases);
        assert_eq!(vec![Regime { fixed: Param::A, value: 10 }], c.regimes);
        assert_eq!(Some(PathBuf::from("out.txt")), c.output);
        assert!(c.strict);
    }

    #[test]
    fn default_regimes() {
        let c = parse(&["-p", "S", "one.txt"]).unwrap();
        assert_eq!(DEFAULT_REGIMES.to_vec(), c.regimes);
        assert!(!c.strict);
        assert_eq!(None, c.output);
    }

    #[test]
    fn merge_prefers_command_line() {
        let mut c = Config {
            phases: vec!["E".to_string()],
            ..Config::default()
        };
        let file = TableConfig::from_toml(
            r#"
inputs = ["x.txt", "y.txt"]
phases = ["S", "K"]
regimes = ["b=5"]
strict = true
"#,
        )
        .unwrap();
        c.merge(file);
        assert_eq!(vec!["E"], c.phases);
        assert_eq!(
            vec![PathBuf::from("x.txt"), PathBuf::from("y.txt")],
            c.inputs
        );
        assert_eq!(vec![Regime { fixed: Param::B, value: 5 }], c.regimes);
        assert!(c.strict);
    }

    #[test]
    fn error_no_inputs() {
        assert!(parse(&["-p", "S"]).is_err());
    }

    #[test]
    fn error_no_phases() {
        assert!(parse(&["one.txt"]).is_err());
    }

    #[test]
    fn error_bad_regime() {
        assert!(parse(&["-p", "S", "-r", "b:1000", "one.txt"]).is_err());
    }

    #[test]
    fn error_duplicate_phase() {
        assert!(parse(&["-p", "S", "-p", "S", "one.txt"]).is_err());
    }
}
