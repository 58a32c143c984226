use core::fmt;

pub mod sm83;
pub use sm83::{Reg, Sm83Flags, Sm83State};

/// A single step in the trace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Step {
    /// register state logged together with this instruction
    pub state: Sm83State,
    pub mnemonic: String,
    /// set on the last step of a trace that ended in a fault
    pub error: Option<String>,
    /// input line the register dump came from, 1-based
    pub line: usize,
}

impl Step {
    pub fn pc(&self) -> u16 {
        self.state.pc()
    }

    pub fn is_fault(&self) -> bool {
        self.error.is_some()
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic)
    }
}
