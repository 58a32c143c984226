use crate::state::Step;
use std::io::Read;

use anyhow::Context;
use tracing::info;

pub mod parser;
pub use parser::{LogParser, ParseError};

/// Parses a whole emulator log. Fails on the first malformed line and
/// never returns a partial trace.
pub fn parse(text: &str) -> Result<Vec<Step>, ParseError> {
    let trace = LogParser::new(text).collect::<Result<Vec<_>, _>>()?;

    info!(
        "parsed {} steps{}",
        trace.len(),
        if trace.last().is_some_and(Step::is_fault) {
            ", ending in a fault"
        } else {
            ""
        }
    );

    Ok(trace)
}

/// Reads everything from `reader` before parsing.
pub fn load<R: Read>(mut reader: R) -> anyhow::Result<Vec<Step>> {
    let mut text = String::new();
    reader
        .read_to_string(&mut text)
        .context("failed to read trace")?;

    Ok(parse(&text)?)
}
