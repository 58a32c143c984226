use std::{
    fs::{self, File},
    io::{self, BufReader},
    path::PathBuf,
};

use anyhow::Context;
use gbdb::{
    debugger::{CommandTable, Debugger, PRINT_AHEAD},
    syms::SymbolTable,
    tracer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(argh::FromArgs)]
/// Debug gbemu programs based on their trace log.
struct Arguments {
    #[argh(positional)]
    /// trace log to replay, read from stdin when omitted
    trace: Option<PathBuf>,

    #[argh(option, short = 's')]
    /// rgbds symbol file used to label addresses
    symbols: Option<PathBuf>,

    #[argh(option, short = 'a', default = "PRINT_AHEAD")]
    /// instructions shown after each break
    ahead: usize,
}

fn main() -> anyhow::Result<()> {
    // stdout belongs to the prompt
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let Arguments {
        trace,
        symbols,
        ahead,
    } = argh::from_env();

    let steps = match &trace {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            tracer::load(BufReader::new(file))
        }
        None => tracer::load(io::stdin().lock()),
    }
    .context("unable to load trace")?;

    info!("replaying {} steps", steps.len());

    let mut dbg = Debugger::new(steps, CommandTable::builtin(), io::stdout()).with_ahead(ahead);

    if let Some(path) = symbols {
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let table = SymbolTable::from_sym(&text)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        dbg = dbg.with_symbols(table);
    }

    // a fault comes back as an error and ends the process with a failure
    let outcome = dbg.run(&mut io::stdin().lock())?;
    info!("session ended: {:?}", outcome);

    println!("End of program.");

    Ok(())
}
