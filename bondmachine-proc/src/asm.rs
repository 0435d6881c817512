//! Assembler, disassembler and the opcode optimizer.
//!
//! Program text is whitespace-tokenized, one instruction per line, `//`
//! comments stripped; blank and comment-only lines do not advance the
//! instruction address. Binary programs are `max_word`-bit `'0'`/`'1'`
//! words, the opcode prefix leftmost.

use crate::arch::{Arch, OpcodeSet};
use crate::bits::{encode_field, field_value};
use crate::error::{ArchError, AsmError};
use crate::machine::Program;
use crate::opcode::{catalog, Opcode, UsageNotify};
use rand::RngCore;

/// Strips a trailing `//` comment and tokenizes a source line.
fn tokenize(line: &str) -> Vec<&str> {
    let code = line.split("//").next().unwrap_or("");
    code.split_whitespace().collect()
}

impl Arch {
    /// Assembles program text into binary slocs, preserving source line
    /// order as instruction order.
    pub fn assemble(&self, source: &str) -> Result<Program, AsmError> {
        let opbits = self.opcodes_bits();
        let mut slocs = Vec::new();

        for (number, line) in source.lines().enumerate() {
            let tokens = tokenize(line);
            let Some((&mnemonic, operand_tokens)) = tokens.split_first() else {
                continue;
            };

            let (index, handler) = self
                .op
                .iter()
                .enumerate()
                .find(|(_, op)| op.name() == mnemonic)
                .ok_or_else(|| {
                    AsmError::UnknownMnemonic(mnemonic.to_string()).at_line(number + 1)
                })?;

            let operands = handler
                .assemble(self, operand_tokens)
                .map_err(|e| e.at_line(number + 1))?;
            let prefix = encode_field(index as u64, opbits).map_err(|e| e.at_line(number + 1))?;
            slocs.push(prefix + &operands);
        }

        if slocs.len() > self.rom_cells() {
            return Err(AsmError::ProgramTooLong {
                len: slocs.len(),
                capacity: self.rom_cells(),
            });
        }

        tracing::debug!(instructions = slocs.len(), "assembled program");
        Ok(Program { slocs })
    }

    /// Disassembles one stored word. The emitted line is
    /// `"<name> <operands>"`.
    pub fn disassemble_word(&self, address: usize, sloc: &str) -> Result<String, AsmError> {
        let width = self.max_word();
        if sloc.len() != width || !sloc.chars().all(|c| c == '0' || c == '1') {
            return Err(AsmError::MalformedWord { address, width });
        }

        let opbits = self.opcodes_bits();
        let index = sloc
            .get(..opbits)
            .and_then(field_value)
            .ok_or(AsmError::MalformedWord { address, width })? as usize;
        let handler = self
            .op
            .get(index)
            .ok_or(AsmError::UnknownEncoding { address })?;

        if handler.instruction_len(self) == opbits {
            return Ok(handler.name().to_string());
        }
        let operands = handler.disassemble(self, &sloc[opbits..]);
        if operands.is_empty() {
            return Err(AsmError::UnknownEncoding { address });
        }
        Ok(format!("{} {}", handler.name(), operands))
    }

    /// Fills a program with random well-formed instructions from a seeded
    /// generator.
    pub fn generate_program(&self, len: usize, rng: &mut dyn RngCore) -> Result<Program, AsmError> {
        if self.op.is_empty() && len > 0 {
            return Err(AsmError::EmptyOpcodeSet);
        }
        if len > self.rom_cells() {
            return Err(AsmError::ProgramTooLong {
                len,
                capacity: self.rom_cells(),
            });
        }

        let opbits = self.opcodes_bits();
        let mut slocs = Vec::with_capacity(len);
        for _ in 0..len {
            let index = (rng.next_u64() % self.op.len() as u64) as usize;
            let handler = self
                .op
                .get(index)
                .ok_or(AsmError::EmptyOpcodeSet)?;
            let prefix = encode_field(index as u64, opbits)?;
            slocs.push(prefix + &handler.generate(self, rng));
        }
        Ok(Program { slocs })
    }

    /// Declarative usage of a whole source program, one notification list
    /// per instruction line. Mnemonics resolve against the catalog, so the
    /// usage can size an architecture before one is frozen.
    pub fn abstract_assemble(&self, source: &str) -> Result<Vec<Vec<UsageNotify>>, AsmError> {
        let mut notifies = Vec::new();
        for (number, line) in source.lines().enumerate() {
            let tokens = tokenize(line);
            let Some((&mnemonic, operand_tokens)) = tokens.split_first() else {
                continue;
            };
            let handler = catalog::lookup(mnemonic).ok_or_else(|| {
                AsmError::UnknownMnemonic(mnemonic.to_string()).at_line(number + 1)
            })?;
            notifies.push(
                handler
                    .abstract_assemble(self, operand_tokens)
                    .map_err(|e| e.at_line(number + 1))?,
            );
        }
        Ok(notifies)
    }
}

/// Derives an opcode set from a source program: each first-seen mnemonic is
/// collected, the result sorted by name. Unknown mnemonics are rejected.
pub fn optimize_opcodes(source: &str) -> Result<OpcodeSet, ArchError> {
    let mut seen: Vec<&'static dyn Opcode> = Vec::new();
    for line in source.lines() {
        let tokens = tokenize(line);
        let Some(&mnemonic) = tokens.first() else {
            continue;
        };
        let handler =
            catalog::lookup(mnemonic).ok_or_else(|| ArchError::UnknownOpcode(mnemonic.into()))?;
        if !seen.iter().any(|op| op.name() == handler.name()) {
            seen.push(handler);
        }
    }
    OpcodeSet::new(seen)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arch(names: &[&str]) -> Arch {
        Arch {
            op: OpcodeSet::from_names(names).unwrap(),
            ..Arch::default()
        }
    }

    #[test]
    fn assembles_the_documented_encoding() {
        // With {clc, jz}: one opcode bit, jz = 1; "jz r0 3" encodes the
        // register in 3 bits and the address in 8.
        let arch = arch(&["jz", "clc"]);
        let program = arch.assemble("jz r0 3\nclc\n").unwrap();
        assert_eq!(program.slocs[0], "100000000011");
        assert_eq!(program.slocs[1], "000000000000");
    }

    #[test]
    fn round_trips_through_the_disassembler() {
        let arch = arch(&["jz", "clc"]);
        let program = arch.assemble("jz r0 3\nclc\n").unwrap();
        assert_eq!(arch.disassemble_word(0, &program.slocs[0]).unwrap(), "jz r0 3");
        assert_eq!(arch.disassemble_word(1, &program.slocs[1]).unwrap(), "clc");
    }

    #[test]
    fn comments_and_blank_lines_do_not_advance_addresses() {
        let arch = arch(&["nop", "clc"]);
        let program = arch
            .assemble("// a comment\n\nnop // trailing\n   \nclc\n")
            .unwrap();
        assert_eq!(program.slocs.len(), 2);
    }

    #[test]
    fn unknown_mnemonic_is_reported_with_its_line() {
        let arch = arch(&["nop"]);
        let err = arch.assemble("nop\nfrob r1\n").unwrap_err();
        assert!(matches!(err, AsmError::AtLine { line: 2, .. }));
    }

    #[test]
    fn field_overflow_is_a_hard_error() {
        let arch = arch(&["jz", "clc"]);
        // 0x1ff does not fit the 8-bit ROM address field.
        assert!(arch.assemble("jz r0 0x1ff\n").is_err());
    }

    #[test]
    fn every_sloc_is_max_word_wide() {
        let arch = arch(&["nop", "clc", "jz", "add", "rset"]);
        let program = arch
            .assemble("nop\nclc\njz r1 2\nadd r0 r1\nrset r2 0xff\n")
            .unwrap();
        for sloc in &program.slocs {
            assert_eq!(sloc.len(), arch.max_word());
        }
    }

    #[test]
    fn optimizer_collects_first_seen_and_sorts() {
        let set = optimize_opcodes("jz r0 0\nclc\njz r1 4\nnop\n").unwrap();
        let names: Vec<_> = set.iter().map(|op| op.name()).collect();
        assert_eq!(names, ["clc", "jz", "nop"]);
    }

    #[test]
    fn optimizer_rejects_unknown_mnemonics() {
        assert!(matches!(
            optimize_opcodes("clc\nfrob\n"),
            Err(ArchError::UnknownOpcode(_))
        ));
    }

    #[test]
    fn generated_programs_are_well_formed() {
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        let arch = arch(&["nop", "clc", "jz", "add", "i2r", "r2o"]);
        let mut rng = StdRng::seed_from_u64(7);
        let program = arch.generate_program(32, &mut rng).unwrap();
        assert_eq!(program.slocs.len(), 32);
        for (address, sloc) in program.slocs.iter().enumerate() {
            arch.disassemble_word(address, sloc).unwrap();
        }
    }
}
