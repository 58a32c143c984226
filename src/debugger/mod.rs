//! Replays a parsed trace and lets the user poke at it.
//!
//! The engine is a small state machine. It starts paused on the first
//! step, and every command either keeps it paused or lets it advance. It
//! advances one step at a time until it hits a breakpoint, a pending
//! single step, the faulting step of the trace, or the end.

use std::io::{self, BufRead, Write};

use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::{state::Step, syms::SymbolTable};

pub mod commands;
pub use commands::{Command, CommandError, CommandTable, Ctx, Flow, Handler};

pub const PROMPT: &str = "(gbdb) ";

/// Steps shown at a break, and the default for `asm`.
pub const PRINT_AHEAD: usize = 5;

/// How a session ended without a fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// stepped past the last record
    Finished,
    /// `quit`, or the input ran dry
    Quit,
}

#[derive(Error, Debug)]
pub enum DebugError {
    /// The replayed program itself failed. Not a debugger bug.
    #[error("Program ended with error: {message}")]
    RuntimeHalt { address: u16, message: String },
    #[error("terminal i/o failed")]
    Io(#[from] io::Error),
}

/// State shared with command handlers.
pub struct Session {
    pub trace: Vec<Step>,
    pub current: usize,
    pub breakpoints: Vec<u16>,
    pub single_step: bool,
    pub running: bool,
    pub ahead: usize,
    pub symbols: Option<SymbolTable>,
}

impl Session {
    pub fn new(trace: Vec<Step>) -> Self {
        Self {
            trace,
            current: 0,
            breakpoints: Vec::new(),
            single_step: false,
            running: true,
            ahead: PRINT_AHEAD,
            symbols: None,
        }
    }

    /// The step under the cursor. Only valid while paused.
    pub fn step(&self) -> &Step {
        &self.trace[self.current]
    }

    /// Up to `count` steps starting at the cursor.
    pub fn upcoming(&self, count: usize) -> &[Step] {
        let start = self.current.min(self.trace.len());
        let end = self.current.saturating_add(count).min(self.trace.len());
        &self.trace[start..end]
    }
}

pub struct Debugger<W: Write> {
    session: Session,
    commands: CommandTable,
    out: W,
}

impl<W: Write> Debugger<W> {
    pub fn new(trace: Vec<Step>, commands: CommandTable, out: W) -> Self {
        Self {
            session: Session::new(trace),
            commands,
            out,
        }
    }

    pub fn with_symbols(mut self, symbols: SymbolTable) -> Self {
        self.session.symbols = Some(symbols);
        self
    }

    pub fn with_ahead(mut self, ahead: usize) -> Self {
        self.session.ahead = ahead;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Runs until the trace ends, the user quits, or the faulting step is
    /// reached. The last one is reported as [`DebugError::RuntimeHalt`].
    pub fn run<R: BufRead>(&mut self, input: &mut R) -> Result<Outcome, DebugError> {
        if self.session.trace.is_empty() {
            info!("nothing to replay");
            return Ok(Outcome::Finished);
        }

        if self.session.step().is_fault() {
            return Err(self.fault());
        }

        self.pause(input)?;

        while self.session.running {
            self.session.current += 1;

            let Some(step) = self.session.trace.get(self.session.current) else {
                debug!("end of trace after {} steps", self.session.current);
                return Ok(Outcome::Finished);
            };

            if step.is_fault() {
                return Err(self.fault());
            }

            let pc = step.pc();
            if self.session.single_step || self.session.breakpoints.contains(&pc) {
                trace!(
                    "stopping at {:04x} (single step: {})",
                    pc,
                    self.session.single_step
                );
                self.session.single_step = false;
                self.pause(input)?;
            }
        }

        debug!("quit at step {}", self.session.current);
        Ok(Outcome::Quit)
    }

    fn fault(&mut self) -> DebugError {
        let step = self.session.step();
        let address = step.pc();
        let message = step.error.clone().unwrap_or_default();

        warn!("fault at {:04x} (log line {}): {}", address, step.line, message);

        let written = writeln!(self.out, "ERROR! at address: 0x{:04X}:", address)
            .and_then(|_| writeln!(self.out, "{}", message));
        if let Err(e) = written {
            return e.into();
        }

        DebugError::RuntimeHalt { address, message }
    }

    fn print_break(&mut self) -> io::Result<()> {
        let session = &self.session;
        let pc = session.step().pc();

        match session.symbols.as_ref().and_then(|t| t.lookup(pc)) {
            Some(sym) => writeln!(self.out, "Break at address 0x{:04X} <{}>:", pc, sym)?,
            None => writeln!(self.out, "Break at address 0x{:04X}:", pc)?,
        }

        for step in session.upcoming(session.ahead) {
            writeln!(self.out, "\t{}", step)?;
        }

        Ok(())
    }

    /// Prompts for one line. `None` once the input is exhausted.
    fn read_line<R: BufRead>(&mut self, input: &mut R) -> io::Result<Option<String>> {
        write!(self.out, "{}", PROMPT)?;
        self.out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }

    /// Shows where we are and handles commands until one resumes.
    fn pause<R: BufRead>(&mut self, input: &mut R) -> Result<(), DebugError> {
        self.print_break()?;

        loop {
            let Some(line) = self.read_line(input)? else {
                debug!("input closed, quitting");
                writeln!(self.out)?;
                self.session.running = false;
                return Ok(());
            };

            let args: Vec<&str> = line.split_whitespace().collect();
            let Some(command) = args.first().and_then(|name| self.commands.get(name)) else {
                writeln!(self.out, "Invalid command.")?;
                continue;
            };
            let handler = command.handler;

            trace!("{:?}", args);

            let mut ctx = Ctx {
                session: &mut self.session,
                commands: &self.commands,
                out: &mut self.out,
            };

            match handler(&mut ctx, &args) {
                Ok(Flow::Resume) => return Ok(()),
                Ok(Flow::Pause) => (),
                Err(CommandError::InvalidArguments) => {
                    writeln!(self.out, "{}", CommandError::InvalidArguments)?
                }
                Err(CommandError::Io(e)) => return Err(e.into()),
            }
        }
    }
}
