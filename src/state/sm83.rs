use std::{fmt, str::FromStr};

use anyhow::Context;
use bitflags::bitflags;
use lazy_static::lazy_static;
use regex::Regex;
use strum::{Display, EnumCount, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// The six 16-bit register pairs, in the order the emulator logs them.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Display, EnumCount, EnumIter, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum Reg {
    Af,
    Bc,
    De,
    Hl,
    Sp,
    Pc,
}

impl Reg {
    pub fn idx(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

bitflags! {
    /// Flag register, the low byte of `af`. Bits 0-3 always read as zero.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Sm83Flags: u8 {
        const CARRY = 1 << 4;
        const HALF_CARRY = 1 << 5;
        const SUBTRACT = 1 << 6;
        const ZERO = 1 << 7;
    }
}

impl fmt::Display for Sm83Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // z n h c, upper case when set
        let bits = [
            (Self::ZERO, 'z'),
            (Self::SUBTRACT, 'n'),
            (Self::HALF_CARRY, 'h'),
            (Self::CARRY, 'c'),
        ];

        for (flag, name) in bits {
            if self.contains(flag) {
                write!(f, "{}", name.to_ascii_uppercase())?;
            } else {
                write!(f, "{}", name)?;
            }
        }

        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sm83State {
    regs: [u16; Reg::COUNT],
}

impl Sm83State {
    pub fn new(regs: [u16; Reg::COUNT]) -> Self {
        Self { regs }
    }

    pub fn get(&self, reg: Reg) -> u16 {
        self.regs[reg.idx()]
    }

    pub fn pc(&self) -> u16 {
        self.get(Reg::Pc)
    }

    pub fn regs(&self) -> &[u16; Reg::COUNT] {
        &self.regs
    }

    pub fn flags(&self) -> Sm83Flags {
        Sm83Flags::from_bits_truncate(self.get(Reg::Af) as u8)
    }
}

impl fmt::Display for Sm83State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, reg) in Reg::iter().enumerate() {
            if i != 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={:04X}", reg.as_str().to_ascii_uppercase(), self.get(reg))?;
        }
        Ok(())
    }
}

impl FromStr for Sm83State {
    type Err = anyhow::Error;

    /// Parses the register dump without its log tag, e.g.
    /// `AF=01b0, BC=0013, DE=00d8, HL=014d, SP=fffe, PC=0100`.
    fn from_str(input: &str) -> anyhow::Result<Self> {
        lazy_static! {
            static ref RE: Regex = Regex::new(concat!(
                r"^AF=([0-9a-fA-F]{4}), BC=([0-9a-fA-F]{4}), DE=([0-9a-fA-F]{4}), ",
                r"HL=([0-9a-fA-F]{4}), SP=([0-9a-fA-F]{4}), PC=([0-9a-fA-F]{4})\b"
            ))
            .unwrap();
        }

        let captures = RE
            .captures(input.trim())
            .with_context(|| format!("not a register dump: '{}'", input))?;

        let mut regs = [0; Reg::COUNT];
        for (reg, value) in regs.iter_mut().zip(captures.iter().skip(1).flatten()) {
            *reg = u16::from_str_radix(value.as_str(), 16)?;
        }

        Ok(Self { regs })
    }
}

#[cfg(test)]
mod tests {
    use super::{Reg, Sm83Flags, Sm83State};
    use std::str::FromStr;

    #[test]
    fn sm83_state_from_string() {
        let input = "AF=1234, BC=0000, DE=FFFF, HL=00AB, SP=FFFE, PC=0150";

        let result = Sm83State::from_str(input);

        assert!(result.is_ok());

        let state = result.unwrap();
        assert_eq!(
            state,
            Sm83State::new([0x1234, 0x0000, 0xffff, 0x00ab, 0xfffe, 0x0150])
        );
        assert_eq!(state.pc(), 0x0150);
        assert_eq!(state.to_string(), input);
    }

    #[test]
    fn lowercase_digits() {
        let state = Sm83State::from_str("AF=01b0, BC=0013, DE=00d8, HL=014d, SP=fffe, PC=0100")
            .unwrap();

        assert_eq!(state.get(Reg::Af), 0x01b0);
        assert_eq!(state.get(Reg::Hl), 0x014d);
        assert_eq!(state.get(Reg::Sp), 0xfffe);
    }

    #[test]
    fn rejects_short_field() {
        assert!(Sm83State::from_str("AF=123, BC=0000, DE=0000, HL=0000, SP=0000, PC=0000").is_err());
        assert!(Sm83State::from_str("AF=1234, BC=0000, DE=0000, HL=0000, SP=0000, PC=01500").is_err());
        assert!(Sm83State::from_str("BC=0000, AF=1234, DE=0000, HL=0000, SP=0000, PC=0000").is_err());
    }

    #[test]
    fn register_names() {
        assert_eq!(Reg::from_str("pc").unwrap(), Reg::Pc);
        assert_eq!(Reg::from_str("af").unwrap(), Reg::Af);
        assert!(Reg::from_str("xx").is_err());
        assert!(Reg::from_str("").is_err());
        assert_eq!(Reg::Hl.to_string(), "hl");
    }

    #[test]
    fn flags_from_af() {
        let state = Sm83State::new([0x01b0, 0, 0, 0, 0, 0]);

        assert_eq!(
            state.flags(),
            Sm83Flags::ZERO | Sm83Flags::HALF_CARRY | Sm83Flags::CARRY
        );
        assert_eq!(state.flags().to_string(), "ZnHC");

        // unused low nibble is ignored
        let state = Sm83State::new([0x000f, 0, 0, 0, 0, 0]);
        assert_eq!(state.flags(), Sm83Flags::empty());
    }
}
