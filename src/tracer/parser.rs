use std::{
    iter::{Filter, Peekable, Zip},
    ops::RangeFrom,
    str::Lines,
};

use thiserror::Error;
use tracing::{debug, trace};

use crate::state::{Sm83State, Step};

const DEBUG_TAG: &str = "DEBUG: ";
const ERROR_TAG: &str = "ERROR: ";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("line {line_no}: unable to parse register state: '{line}'")]
    BadState { line_no: usize, line: String },
    #[error("line {line_no}: unable to parse instruction: '{line}'")]
    BadInstruction { line_no: usize, line: String },
    #[error("line {line_no}: register state without an instruction: '{line}'")]
    MissingInstruction { line_no: usize, line: String },
}

impl ParseError {
    /// The raw text of the offending line.
    pub fn line(&self) -> &str {
        match self {
            ParseError::BadState { line, .. }
            | ParseError::BadInstruction { line, .. }
            | ParseError::MissingInstruction { line, .. } => line,
        }
    }

    pub fn line_no(&self) -> usize {
        match self {
            ParseError::BadState { line_no, .. }
            | ParseError::BadInstruction { line_no, .. }
            | ParseError::MissingInstruction { line_no, .. } => *line_no,
        }
    }
}

/// A log line the emulator tagged for us. Everything else is dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLine<'a> {
    Debug(&'a str),
    Error(&'a str),
}

impl<'a> LogLine<'a> {
    pub fn classify(line: &'a str) -> Option<Self> {
        if let Some((_, payload)) = line.split_once(DEBUG_TAG) {
            Some(LogLine::Debug(payload.trim_end()))
        } else if let Some((_, payload)) = line.split_once(ERROR_TAG) {
            Some(LogLine::Error(payload.trim_end()))
        } else {
            None
        }
    }
}

fn is_tagged(line: &(usize, &str)) -> bool {
    LogLine::classify(line.1).is_some()
}

type Numbered<'a> = Zip<RangeFrom<usize>, Lines<'a>>;
type Tagged<'a> = Filter<Numbered<'a>, fn(&(usize, &'a str)) -> bool>;

/// Turns an emulator log into steps, two tagged lines at a time:
/// the register dump, then the instruction, then optionally an error
/// that ends the trace.
pub struct LogParser<'a> {
    lines: Peekable<Tagged<'a>>,
    /// set after an error or a faulting step
    done: bool,
}

impl<'a> LogParser<'a> {
    pub fn new(text: &'a str) -> Self {
        let lines: Tagged<'a> = (1..)
            .zip(text.lines())
            .filter(is_tagged as fn(&(usize, &'a str)) -> bool);

        Self {
            lines: lines.peekable(),
            done: false,
        }
    }

    fn parse_state(line_no: usize, line: &str) -> Result<Sm83State, ParseError> {
        let bad = || ParseError::BadState {
            line_no,
            line: line.to_string(),
        };

        match LogLine::classify(line) {
            Some(LogLine::Debug(payload)) => payload.parse().map_err(|e| {
                trace!("line {}: {:#}", line_no, e);
                bad()
            }),
            _ => Err(bad()),
        }
    }

    fn parse_mnemonic(line_no: usize, line: &str) -> Result<String, ParseError> {
        match LogLine::classify(line) {
            Some(LogLine::Debug(payload)) if !payload.is_empty() && !payload.starts_with("AF=") => {
                Ok(payload.to_string())
            }
            _ => Err(ParseError::BadInstruction {
                line_no,
                line: line.to_string(),
            }),
        }
    }

    fn next_step(&mut self) -> Option<Result<Step, ParseError>> {
        let (line_no, state_line) = self.lines.next()?;

        let state = match Self::parse_state(line_no, state_line) {
            Ok(s) => s,
            Err(e) => return Some(Err(e)),
        };

        let mnemonic = match self.lines.next() {
            Some((no, line)) => match Self::parse_mnemonic(no, line) {
                Ok(m) => m,
                Err(e) => return Some(Err(e)),
            },
            None => {
                return Some(Err(ParseError::MissingInstruction {
                    line_no,
                    line: state_line.to_string(),
                }))
            }
        };

        let error = match self.lines.peek().and_then(|&(_, l)| LogLine::classify(l)) {
            Some(LogLine::Error(message)) => {
                let message = message.to_string();
                self.lines.next();
                Some(message)
            }
            _ => None,
        };

        Some(Ok(Step {
            state,
            mnemonic,
            error,
            line: line_no,
        }))
    }
}

impl<'a> Iterator for LogParser<'a> {
    type Item = Result<Step, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let item = self.next_step();

        match &item {
            Some(Ok(step)) if step.is_fault() => {
                debug!(
                    "fault at line {}, pc={:04x}: stopping",
                    step.line,
                    step.pc()
                );
                self.done = true;
            }
            Some(Ok(step)) => trace!("{:x?}", step),
            Some(Err(_)) => self.done = true,
            None => (),
        }

        item
    }
}

#[cfg(test)]
mod tests {
    use super::{LogLine, LogParser, ParseError};
    use crate::state::Reg;

    const STATE_0100: &str = "DEBUG: AF=01b0, BC=0013, DE=00d8, HL=014d, SP=fffe, PC=0100";
    const STATE_0101: &str = "DEBUG: AF=01b0, BC=0013, DE=00d8, HL=014d, SP=fffe, PC=0101";
    const STATE_0150: &str = "DEBUG: AF=01b0, BC=0013, DE=00d8, HL=014d, SP=fffe, PC=0150";

    fn parse(text: &str) -> Result<Vec<crate::state::Step>, ParseError> {
        LogParser::new(text).collect()
    }

    #[test]
    fn classify_lines() {
        assert_eq!(
            LogLine::classify("cpu.c:42:step(): DEBUG: NOP"),
            Some(LogLine::Debug("NOP"))
        );
        assert_eq!(
            LogLine::classify("ERROR: illegal opcode 0xd3"),
            Some(LogLine::Error("illegal opcode 0xd3"))
        );
        assert_eq!(LogLine::classify("INFO: loading rom"), None);
        assert_eq!(LogLine::classify(""), None);
    }

    #[test]
    fn pairs_state_with_instruction() {
        let log = [STATE_0100, "DEBUG: NOP", STATE_0101, "DEBUG: JP 0150"].join("\n");

        let steps = parse(&log).unwrap();

        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].pc(), 0x0100);
        assert_eq!(steps[0].mnemonic, "NOP");
        assert_eq!(steps[0].line, 1);
        assert_eq!(steps[1].pc(), 0x0101);
        assert_eq!(steps[1].mnemonic, "JP 0150");
        assert_eq!(steps[1].state.get(Reg::Sp), 0xfffe);
        assert!(steps.iter().all(|s| s.error.is_none()));
    }

    #[test]
    fn skips_untagged_noise() {
        let log = [
            "INFO: loading rom",
            "",
            STATE_0100,
            "WARNING: slow frame",
            "DEBUG: ADD A, B",
            "some unrelated chatter",
        ]
        .join("\n");

        let steps = parse(&log).unwrap();

        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].mnemonic, "ADD A, B");
        assert_eq!(steps[0].line, 3);
    }

    #[test]
    fn empty_input() {
        assert_eq!(parse("").unwrap(), vec![]);
        assert_eq!(parse("INFO: nothing here\n\n").unwrap(), vec![]);
    }

    #[test]
    fn stops_at_error() {
        let log = [
            STATE_0100,
            "DEBUG: NOP",
            STATE_0150,
            "DEBUG: DB d3",
            "ERROR: illegal opcode",
            STATE_0101,
            "DEBUG: NOP",
            "this would not parse either",
            "DEBUG: garbage",
        ]
        .join("\n");

        let steps = parse(&log).unwrap();

        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].pc(), 0x0150);
        assert_eq!(steps[1].error.as_deref(), Some("illegal opcode"));
    }

    #[test]
    fn short_register_field_fails() {
        let bad = "DEBUG: AF=01b, BC=0013, DE=00d8, HL=014d, SP=fffe, PC=0101";
        let log = [STATE_0100, "DEBUG: NOP", bad, "DEBUG: NOP"].join("\n");

        let result = parse(&log);

        assert_eq!(
            result,
            Err(ParseError::BadState {
                line_no: 3,
                line: bad.to_string()
            })
        );
        assert_eq!(result.unwrap_err().line(), bad);
    }

    #[test]
    fn state_where_instruction_expected() {
        let log = [STATE_0100, STATE_0101, "DEBUG: NOP"].join("\n");

        let err = parse(&log).unwrap_err();

        assert!(matches!(err, ParseError::BadInstruction { line_no: 2, .. }));
        assert_eq!(err.line(), STATE_0101);
    }

    #[test]
    fn error_where_state_expected() {
        let log = ["ERROR: too early", STATE_0100, "DEBUG: NOP"].join("\n");

        let err = parse(&log).unwrap_err();

        assert!(matches!(err, ParseError::BadState { line_no: 1, .. }));
    }

    #[test]
    fn trailing_half_pair() {
        let log = [STATE_0100, "DEBUG: NOP", STATE_0101].join("\n");

        let err = parse(&log).unwrap_err();

        assert_eq!(
            err,
            ParseError::MissingInstruction {
                line_no: 3,
                line: STATE_0101.to_string()
            }
        );
    }

    #[test]
    fn iterator_stops_after_failure() {
        let log = ["DEBUG: nonsense", "DEBUG: NOP", STATE_0100, "DEBUG: NOP"].join("\n");

        let mut parser = LogParser::new(&log);

        assert!(matches!(parser.next(), Some(Err(_))));
        assert!(parser.next().is_none());
    }
}
