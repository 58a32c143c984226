//! Interactive commands.
//!
//! Every command is a plain function over the paused [`Session`]. The table
//! is built once at startup and handed to the [`Debugger`](super::Debugger);
//! nothing here is global.

use std::{
    io::{self, Write},
    str::FromStr,
};

use itertools::Itertools;
use strum::IntoEnumIterator;
use thiserror::Error;

use super::Session;
use crate::{rstate, state::Reg};

/// What the engine does after a command returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    /// leave the prompt and keep stepping
    Resume,
    /// prompt again at the same step
    Pause,
}

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Invalid arguments.")]
    InvalidArguments,
    #[error("failed to write output")]
    Io(#[from] io::Error),
}

/// Everything a handler may touch, for the length of one call.
pub struct Ctx<'a> {
    pub session: &'a mut Session,
    pub commands: &'a CommandTable,
    pub out: &'a mut dyn Write,
}

/// `args[0]` is the command name itself.
pub type Handler = fn(&mut Ctx<'_>, &[&str]) -> Result<Flow, CommandError>;

#[derive(Clone, Copy)]
pub struct Command {
    pub name: &'static str,
    pub about: &'static str,
    pub handler: Handler,
}

pub struct CommandTable {
    commands: Vec<Command>,
}

impl CommandTable {
    pub fn new(commands: Vec<Command>) -> Self {
        Self { commands }
    }

    pub fn builtin() -> Self {
        Self::new(vec![
            Command {
                name: "help",
                about: "Print this help message.",
                handler: help,
            },
            Command {
                name: "c",
                about: "Continue program execution.",
                handler: cont,
            },
            Command {
                name: "b",
                about: "Set a breakpoint at a given address.",
                handler: break_at,
            },
            Command {
                name: "d",
                about: "Delete a breakpoint.",
                handler: delete,
            },
            Command {
                name: "l",
                about: "List breakpoints.",
                handler: list,
            },
            Command {
                name: "ni",
                about: "Set breakpoint to next instruction and continue.",
                handler: next_instruction,
            },
            Command {
                name: "r",
                about: "Print the value of a register.",
                handler: register,
            },
            Command {
                name: "regs",
                about: "Print all registers and flags.",
                handler: registers,
            },
            Command {
                name: "diff",
                about: "Print the registers changed by the previous instruction.",
                handler: diff,
            },
            Command {
                name: "quit",
                about: "Exit the debugger.",
                handler: quit,
            },
            Command {
                name: "asm",
                about: "Disassemble n instructions starting with the current one (default n is 5).",
                handler: asm,
            },
        ])
    }

    pub fn get(&self, name: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }
}

fn no_arguments(args: &[&str]) -> Result<(), CommandError> {
    if args.len() != 1 {
        return Err(CommandError::InvalidArguments);
    }
    Ok(())
}

fn parse_address(text: &str) -> Result<u16, CommandError> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);

    u16::from_str_radix(digits, 16).map_err(|_| CommandError::InvalidArguments)
}

fn help(ctx: &mut Ctx<'_>, _args: &[&str]) -> Result<Flow, CommandError> {
    for command in ctx.commands.iter() {
        writeln!(ctx.out, "{}: {}", command.name, command.about)?;
    }
    Ok(Flow::Pause)
}

fn cont(_ctx: &mut Ctx<'_>, _args: &[&str]) -> Result<Flow, CommandError> {
    Ok(Flow::Resume)
}

fn break_at(ctx: &mut Ctx<'_>, args: &[&str]) -> Result<Flow, CommandError> {
    let [_, address] = args else {
        return Err(CommandError::InvalidArguments);
    };

    ctx.session.breakpoints.push(parse_address(address)?);
    Ok(Flow::Pause)
}

fn delete(ctx: &mut Ctx<'_>, args: &[&str]) -> Result<Flow, CommandError> {
    let [_, index] = args else {
        return Err(CommandError::InvalidArguments);
    };

    let index = usize::from_str(index).map_err(|_| CommandError::InvalidArguments)?;
    if index >= ctx.session.breakpoints.len() {
        return Err(CommandError::InvalidArguments);
    }

    ctx.session.breakpoints.remove(index);
    Ok(Flow::Pause)
}

fn list(ctx: &mut Ctx<'_>, args: &[&str]) -> Result<Flow, CommandError> {
    no_arguments(args)?;

    for (index, address) in ctx.session.breakpoints.iter().enumerate() {
        writeln!(ctx.out, "{}: {:04X}", index, address)?;
    }
    Ok(Flow::Pause)
}

fn next_instruction(ctx: &mut Ctx<'_>, args: &[&str]) -> Result<Flow, CommandError> {
    no_arguments(args)?;

    ctx.session.single_step = true;
    Ok(Flow::Resume)
}

fn register(ctx: &mut Ctx<'_>, args: &[&str]) -> Result<Flow, CommandError> {
    let [_, name] = args else {
        return Err(CommandError::InvalidArguments);
    };
    let reg = Reg::from_str(name).map_err(|_| CommandError::InvalidArguments)?;

    let value = ctx.session.step().state.get(reg);
    writeln!(ctx.out, "{} = 0x{:04X}", reg, value)?;
    Ok(Flow::Pause)
}

fn registers(ctx: &mut Ctx<'_>, args: &[&str]) -> Result<Flow, CommandError> {
    no_arguments(args)?;

    let state = ctx.session.step().state;
    let regs = Reg::iter()
        .map(|reg| format!("{}={:04X}", reg, state.get(reg)))
        .join(" ");

    writeln!(ctx.out, "{}", regs)?;
    writeln!(ctx.out, "flags={}", state.flags())?;
    Ok(Flow::Pause)
}

fn diff(ctx: &mut Ctx<'_>, args: &[&str]) -> Result<Flow, CommandError> {
    no_arguments(args)?;

    let session = &ctx.session;
    if let Some(previous) = session.current.checked_sub(1) {
        let before = &session.trace[previous].state;
        let after = &session.step().state;
        rstate::diff(before, after).print(ctx.out)?;
    }
    Ok(Flow::Pause)
}

fn quit(ctx: &mut Ctx<'_>, _args: &[&str]) -> Result<Flow, CommandError> {
    ctx.session.running = false;
    Ok(Flow::Resume)
}

fn asm(ctx: &mut Ctx<'_>, args: &[&str]) -> Result<Flow, CommandError> {
    let count = match args {
        [_] => ctx.session.ahead,
        [_, n] => usize::from_str(n).map_err(|_| CommandError::InvalidArguments)?,
        _ => return Err(CommandError::InvalidArguments),
    };

    for step in ctx.session.upcoming(count) {
        writeln!(ctx.out, "\t{}", step)?;
    }
    Ok(Flow::Pause)
}
