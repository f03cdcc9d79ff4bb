/// The benchtab Cargo package version. This environment variable is
/// guaranteed to be made available by Cargo.
pub const BENCHTAB_VERSION: &'static str = env!("CARGO_PKG_VERSION");

/// The commit revision hash that benchtab was built from. This environment
/// variable is set by a custom build script, and is only available when `git`
/// is available.
pub const BENCHTAB_REVISION: Option<&'static str> =
    option_env!("BENCHTAB_REVISION");

/// Returns a complete version string for `benchtab`.
///
/// If `git` was available while building `benchtab`, then this includes the
/// revision hash.
pub fn version() -> String {
    let mut s = BENCHTAB_VERSION.to_string();
    if let Some(rev) = BENCHTAB_REVISION {
        s.push_str(&format!(" (rev {})", rev));
    }
    s
}

/// Write the given divider character `width` times to the given writer.
pub fn write_divider<W: std::io::Write>(
    mut wtr: W,
    divider: char,
    width: usize,
) -> anyhow::Result<()> {
    let div: String = std::iter::repeat(divider).take(width).collect();
    write!(wtr, "{}", div)?;
    Ok(())
}

/// Colorize the given writer in a "label" style.
pub fn colorize_label<W: termcolor::WriteColor>(
    mut wtr: W,
    mut with: impl FnMut(&mut W) -> std::io::Result<()>,
) -> anyhow::Result<()> {
    let mut spec = termcolor::ColorSpec::new();
    spec.set_bold(true);
    wtr.set_color(&spec)?;
    with(&mut wtr)?;
    wtr.reset()?;
    Ok(())
}

/// Colorize the given writer in a "error" style.
pub fn colorize_error<W: termcolor::WriteColor>(
    mut wtr: W,
    mut with: impl FnMut(&mut W) -> std::io::Result<()>,
) -> anyhow::Result<()> {
    let mut spec = termcolor::ColorSpec::new();
    spec.set_fg(Some(termcolor::Color::Red));
    spec.set_bold(true);
    wtr.set_color(&spec)?;
    with(&mut wtr)?;
    wtr.reset()?;
    Ok(())
}
