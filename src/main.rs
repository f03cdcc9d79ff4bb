use std::io::Write;

// helpers and other things
#[macro_use]
mod macros;

mod args;
mod format;
mod grouped;
mod table;
mod util;

// sub-commands
mod cmd;

const USAGE: &'static str = "\
Turn benchmark timing logs into comparison tables and plottable averages.

USAGE:
    benchtab <command> ...

COMMANDS:
    average   Average the timings in one log by parameter.
    table     Build a comparison table from two or more benchmark logs.
    version   Print the version of benchtab.

";

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("warn"),
    )
    .init();
    if let Err(err) = run(&mut lexopt::Parser::from_env()) {
        if std::env::var("RUST_BACKTRACE").map_or(false, |v| v == "1") {
            writeln!(&mut std::io::stderr(), "{:?}", err).unwrap();
        } else {
            writeln!(&mut std::io::stderr(), "{:#}", err).unwrap();
        }
        std::process::exit(1);
    }
    Ok(())
}

fn run(p: &mut lexopt::Parser) -> anyhow::Result<()> {
    let name = args::next_as_command(USAGE, p)?;
    match &*name {
        "average" => cmd::average::run(p),
        "table" => cmd::table::run(p),
        "version" => cmd::version::run(p),
        unk => anyhow::bail!("unrecognized command '{}'", unk),
    }
}
