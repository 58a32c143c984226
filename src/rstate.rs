//! Register state

use std::io::{self, Write};

use strum::{EnumCount, IntoEnumIterator};

use crate::state::{Reg, Sm83Flags, Sm83State};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RDiff<B> {
    Changed { from: B, to: B },
    Unchanged { value: B },
}

impl<X: PartialEq> RDiff<X> {
    pub fn make(before: X, after: X) -> Self {
        if before != after {
            Self::Changed {
                from: before,
                to: after,
            }
        } else {
            Self::Unchanged { value: before }
        }
    }
}

pub struct StateDiff {
    pub regs: [RDiff<u16>; Reg::COUNT],
    pub flags: Vec<(&'static str, RDiff<bool>)>,
}

impl StateDiff {
    pub fn is_empty(&self) -> bool {
        self.regs
            .iter()
            .all(|r| matches!(r, RDiff::Unchanged { .. }))
            && self
                .flags
                .iter()
                .all(|(_, f)| matches!(f, RDiff::Unchanged { .. }))
    }

    /// Writes one line per changed register, then the flag changes.
    /// Returns whether anything was written.
    pub fn print(&self, out: &mut dyn Write) -> io::Result<bool> {
        let diff_regs = Reg::iter()
            .zip(self.regs.iter())
            .filter_map(|(reg, s)| {
                if let RDiff::Changed { from, to } = s {
                    Some((reg, from, to))
                } else {
                    None
                }
            })
            .collect::<Vec<_>>();

        for (reg, a, b) in &diff_regs {
            writeln!(out, "{} <- {:04X} (prev {:04X})", reg, b, a)?;
        }

        let flags = self
            .flags
            .iter()
            .filter_map(|(name, flag)| {
                if let RDiff::Changed { from, to } = flag {
                    debug_assert_ne!(from, to);
                    Some((*name, *from))
                } else {
                    None
                }
            })
            .collect::<Vec<_>>();

        for (name, previous) in &flags {
            if *previous {
                writeln!(out, "flags -{}", name)?;
            } else {
                writeln!(out, "flags +{}", name)?;
            }
        }

        Ok(!diff_regs.is_empty() || !flags.is_empty())
    }
}

pub fn diff(current: &Sm83State, future: &Sm83State) -> StateDiff {
    let mut regs = [RDiff::Unchanged { value: 0 }; Reg::COUNT];
    for (slot, (a, b)) in regs
        .iter_mut()
        .zip(current.regs().iter().zip(future.regs().iter()))
    {
        *slot = RDiff::make(*a, *b);
    }

    let flags: Vec<_> = Sm83Flags::all()
        .iter_names()
        .map(|(name, flag)| {
            let cur = current.flags().contains(flag);
            let fut = future.flags().contains(flag);

            (name, RDiff::make(cur, fut))
        })
        .collect();

    StateDiff { regs, flags }
}
