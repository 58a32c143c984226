use std::fmt::{Display, Formatter};

use anyhow::{anyhow, Context};
use tracing::debug;

#[derive(Debug, PartialEq, Eq)]
pub struct SymbolReference {
    pub symbol: Symbol,
    pub offset: u16, // how much after the start of the symbol
}

impl Display for SymbolReference {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.offset == 0 {
            write!(f, "{}", self.symbol.name)
        } else {
            write!(f, "{}+{:x}", self.symbol.name, self.offset)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub bank: u8,
    pub from: u16,
    // exclusive, start of the next symbol
    to: u32,
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    /// sorted by address
    pub symbols: Vec<Symbol>,
}

// https://rgbds.gbdev.io/sym/
impl SymbolTable {
    /// Parses an RGBDS `.sym` file: one `BB:AAAA Name` per line, `;` starts
    /// a comment.
    pub fn from_sym(text: &str) -> anyhow::Result<Self> {
        let mut symbols = Vec::new();

        for (no, line) in text.lines().enumerate() {
            let line = match line.split_once(';') {
                Some((before, _comment)) => before,
                None => line,
            }
            .trim();

            if line.is_empty() {
                continue;
            }

            let parse = || -> anyhow::Result<Symbol> {
                let (location, name) = line
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| anyhow!("missing symbol name"))?;
                let (bank, address) = location
                    .split_once(':')
                    .ok_or_else(|| anyhow!("expected BB:AAAA"))?;

                Ok(Symbol {
                    name: name.trim().to_string(),
                    bank: u8::from_str_radix(bank, 16)?,
                    from: u16::from_str_radix(address, 16)?,
                    to: 0,
                })
            };

            let symbol = parse().with_context(|| format!("line {}: '{}'", no + 1, line))?;
            symbols.push(symbol);
        }

        // same address in several banks: lowest bank wins the lookup
        symbols.sort_by_key(|s| (s.from, s.bank));

        let starts: Vec<u16> = symbols.iter().map(|s| s.from).collect();
        for sym in symbols.iter_mut() {
            let next = starts.partition_point(|a| *a <= sym.from);
            sym.to = starts.get(next).map(|a| *a as u32).unwrap_or(0x1_0000);
        }

        debug!("loaded {} symbols", symbols.len());

        Ok(Self { symbols })
    }

    pub fn lookup(&self, adr: u16) -> Option<SymbolReference> {
        let idx = self.symbols.partition_point(|s| s.from <= adr);
        if idx == 0 {
            return None;
        }

        // walk back to the first symbol sharing this start address
        let from = self.symbols[idx - 1].from;
        let first = self.symbols.partition_point(|s| s.from < from);

        self.symbols
            .get(first)
            .filter(|s| (adr as u32) < s.to)
            .cloned()
            .map(|s| SymbolReference {
                offset: adr - s.from,
                symbol: s,
            })
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::SymbolTable;

    const SYM: &str = "\
; File generated by rgblink
00:0000 RST_00
00:0100 EntryPoint
00:0150 Main
00:0150 Main.start  ; local label
01:4000 BankedCode
02:4000 OtherBank
";

    #[test]
    fn parse_sym_file() {
        let table = SymbolTable::from_sym(SYM).unwrap();

        assert_eq!(table.symbols.len(), 6);
        assert_eq!(table.symbols[0].name, "RST_00");
        assert_eq!(table.symbols[4].bank, 1);
    }

    #[test]
    fn lookup_closest_preceding() {
        let table = SymbolTable::from_sym(SYM).unwrap();

        assert_eq!(table.lookup(0x0100).unwrap().to_string(), "EntryPoint");
        assert_eq!(table.lookup(0x0103).unwrap().to_string(), "EntryPoint+3");
        assert_eq!(table.lookup(0x0160).unwrap().to_string(), "Main+10");
        assert_eq!(table.lookup(0x4002).unwrap().to_string(), "BankedCode+2");
        assert_eq!(table.lookup(0xc000).unwrap().to_string(), "BankedCode+8000");
    }

    #[test]
    fn lookup_before_first_symbol() {
        let table = SymbolTable::from_sym("00:0100 EntryPoint\n").unwrap();

        assert!(table.lookup(0x00ff).is_none());
        assert!(SymbolTable::default().lookup(0x0100).is_none());
    }

    #[test]
    fn bad_line() {
        let err = SymbolTable::from_sym("00:0100 EntryPoint\nnonsense\n").unwrap_err();

        assert!(format!("{:#}", err).contains("line 2"));
    }
}
