use std::path::PathBuf;

use unicode_width::UnicodeWidthStr;

use crate::{
    args::{self, Color, Usage},
    format::record::{Param, Sample, Series},
    grouped::{self, AveragedGroup},
    util::write_divider,
};

const USAGES: &[Usage] = &[
    Color::USAGE,
    Usage::new(
        "--csv",
        "Write CSV instead of an aligned table.",
        r#"
Write the averages as CSV with a 'param,mean,count' header instead of an
aligned table. This is the format to hand to a plotting tool.
"#,
    ),
    Usage::new(
        "--param <a|b>",
        "The parameter to group by with --phase.",
        r#"
The record parameter to group by when --phase is given (default: a).
"#,
    ),
    Usage::new(
        "--phase <tag>",
        "Read four field records and keep this phase.",
        r#"
Read the log as four field records ('<tag> <a> <b> <duration>') and average
only the records with this phase tag, grouped by the parameter chosen with
--param.

Without this flag, every line of the log must have the form
'<param> <duration>'.
"#,
    ),
];

fn usage_short() -> String {
    format!(
        "\
Average the timings in one log by parameter.

USAGE:
    benchtab average [OPTIONS] <log-path>

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
Average the timings in one log by parameter.

All timings sharing a parameter value are averaged together with the
arithmetic mean. The output has one row per distinct parameter value, in
ascending order, with the mean duration in milliseconds and the number of
timings that went into it. These two columns are meant to be plotted against
the parameter.

USAGE:
    benchtab average [OPTIONS] <log-path>

    For example, to get the mean sampling time per bound as CSV:

        benchtab average --csv sample/times.txt

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
    let samples = match config.phase {
        None => Sample::from_path(&config.path)?,
        Some(ref phase) => {
            let series = Series::from_path(&config.path)?;
            let samples = series
                .records
                .iter()
                .filter(|r| &r.phase == phase)
                .map(|r| Sample::from_record(r, config.param()))
                .collect::<anyhow::Result<Vec<Sample>>>()?;
            if samples.is_empty() {
                log::warn!(
                    "{} has no records for phase '{}'",
                    series.label,
                    phase,
                );
            }
            samples
        }
    };
    let groups = grouped::average(&samples);
    if config.csv {
        write_csv(std::io::stdout(), &groups)
    } else {
        write_table(config.color.elastic_stdout(), &groups)
    }
}

/// Writes the averaged groups as CSV, one record per group.
fn write_csv<W: std::io::Write>(
    wtr: W,
    groups: &[AveragedGroup],
) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(wtr);
    for group in groups.iter() {
        wtr.serialize(group)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes the averaged groups as an aligned table.
fn write_table<W: termcolor::WriteColor>(
    mut wtr: W,
    groups: &[AveragedGroup],
) -> anyhow::Result<()> {
    let columns = &["param", "mean", "count"];
    writeln!(wtr, "{}", columns.join("\t"))?;
    for (i, label) in columns.iter().enumerate() {
        if i > 0 {
            write!(wtr, "\t")?;
        }
        write_divider(&mut wtr, '-', label.width())?;
    }
    write!(wtr, "\n")?;
    for group in groups.iter() {
        writeln!(wtr, "{}\t{:.3}\t{}", group.key, group.mean, group.count)?;
    }
    wtr.flush()?;
    Ok(())
}

/// The arguments for this 'average' command parsed from CLI args.
#[derive(Debug, Default)]
struct Config {
    /// The log to average.
    path: PathBuf,
    /// When set, the log holds full records and only this phase is used.
    phase: Option<String>,
    /// The record parameter to group by. Only allowed with 'phase'.
    param: Option<Param>,
    /// Whether to write CSV.
    csv: bool,
    /// The user's color choice. We default to 'Auto'.
    color: Color,
}

impl Config {
    /// Parse 'average' args from the given CLI parser.
    fn parse(p: &mut lexopt::Parser) -> anyhow::Result<Config> {
        use lexopt::Arg;

        let mut c = Config::default();
        let mut paths = vec![];
        while let Some(arg) = p.next()? {
            match arg {
                Arg::Value(v) => paths.push(PathBuf::from(v)),
                Arg::Short('h') => anyhow::bail!("{}", usage_short()),
                Arg::Long("help") => anyhow::bail!("{}", usage_long()),
                Arg::Long("color") => {
                    c.color = args::parse(p, "--color")?;
                }
                Arg::Long("csv") => {
                    c.csv = true;
                }
                Arg::Long("param") => {
                    c.param = Some(args::parse(p, "--param")?);
                }
                Arg::Long("phase") => {
                    c.phase = Some(args::parse(p, "--phase")?);
                }
                _ => return Err(arg.unexpected().into()),
            }
        }
        anyhow::ensure!(
            paths.len() == 1,
            "expected exactly one log path, but got {}",
            paths.len(),
        );
        anyhow::ensure!(
            c.param.is_none() || c.phase.is_some(),
            "--param only applies to four field records and requires --phase",
        );
        c.path = paths.pop().unwrap();
        Ok(c)
    }

    /// The record parameter to group by, defaulting to 'a'.
    fn param(&self) -> Param {
        self.param.unwrap_or_default()
    }
}
