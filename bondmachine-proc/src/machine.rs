//! A machine: an architecture plus the program it runs.

use crate::arch::{Arch, ConstraintReport};
use crate::error::AsmError;
use crate::opcode::RunFlags;
use serde::{Deserialize, Serialize};

/// A sequence of symbolic locations: binary instruction words of
/// `max_word` bits each. The address of instruction `k` is `k`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Program {
    /// The instruction words, `'0'`/`'1'` strings.
    pub slocs: Vec<String>,
}

impl Program {
    /// Instruction count.
    pub fn len(&self) -> usize {
        self.slocs.len()
    }

    /// Whether the program is empty.
    pub fn is_empty(&self) -> bool {
        self.slocs.is_empty()
    }
}

/// Architecture, program and derived runtime information. Mutated only by
/// assembler runs and opcode-set manipulation before freeze; never during
/// simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Machine {
    /// The processor shape.
    pub arch: Arch,
    /// The loaded program.
    pub program: Program,
}

impl Machine {
    /// Couples an architecture with a program, verifying capacity and word
    /// widths.
    pub fn new(arch: Arch, program: Program) -> Result<Self, AsmError> {
        if program.len() > arch.rom_cells() {
            return Err(AsmError::ProgramTooLong {
                len: program.len(),
                capacity: arch.rom_cells(),
            });
        }
        let width = arch.max_word();
        for (address, sloc) in program.slocs.iter().enumerate() {
            if sloc.len() != width || !sloc.chars().all(|c| c == '0' || c == '1') {
                return Err(AsmError::MalformedWord { address, width });
            }
        }
        Ok(Machine { arch, program })
    }

    /// An architecture with no program.
    pub fn bare(arch: Arch) -> Self {
        Machine {
            arch,
            program: Program::default(),
        }
    }

    /// Optional processor state required by the enabled opcodes, e.g.
    /// whether a carry flag exists.
    pub fn run_flags(&self) -> RunFlags {
        self.arch
            .op
            .iter()
            .fold(RunFlags::empty(), |flags, op| flags | op.required_flags())
    }

    /// Architecture constraints plus program-level rules, as one textual
    /// trace.
    pub fn constraint_check(&self) -> ConstraintReport {
        let mut report = self.arch.constraint_check();
        report.rule(
            self.program.len() <= self.arch.rom_cells(),
            format!(
                "program of {} instructions within {} ROM cells",
                self.program.len(),
                self.arch.rom_cells()
            ),
        );
        let width = self.arch.max_word();
        report.rule(
            self.program.slocs.iter().all(|s| s.len() == width),
            format!("every instruction is {width} bits wide"),
        );
        report
    }

    /// The usage-template alias table: one line per enabled opcode.
    pub fn instructions_alias(&self) -> String {
        self.arch
            .op
            .iter()
            .map(|op| op.show_assembler(&self.arch))
            .collect()
    }

    /// Per-instruction alias listing: address, stored word, disassembly.
    pub fn program_alias(&self) -> Result<String, AsmError> {
        let digits = address_digits(self.program.len());
        let mut out = String::new();
        for (address, sloc) in self.program.slocs.iter().enumerate() {
            let text = self.arch.disassemble_word(address, sloc)?;
            out.push_str(&format!("{address:0digits$} {sloc} {text}\n"));
        }
        Ok(out)
    }

    /// Disassembles the whole program; `numeric` prepends zero-padded
    /// addresses.
    pub fn disassemble(&self, numeric: bool) -> Result<String, AsmError> {
        let digits = address_digits(self.program.len());
        let mut out = String::new();
        for (address, sloc) in self.program.slocs.iter().enumerate() {
            let text = self.arch.disassemble_word(address, sloc)?;
            if numeric {
                out.push_str(&format!("{address:0digits$} {text}\n"));
            } else {
                out.push_str(&format!("{text}\n"));
            }
        }
        Ok(out)
    }

    /// The raw binary listing, one word per line.
    pub fn binary_listing(&self, numeric: bool) -> String {
        let digits = address_digits(self.program.len());
        let mut out = String::new();
        for (address, sloc) in self.program.slocs.iter().enumerate() {
            if numeric {
                out.push_str(&format!("{address:0digits$} {sloc}\n"));
            } else {
                out.push_str(&format!("{sloc}\n"));
            }
        }
        out
    }

    /// Loads a machine from its serialized JSON form. Opcodes resolve by
    /// name against the catalog; unknown names and unknown fields fail.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Serializes the machine to JSON; the inverse of [`Machine::from_json`].
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Digits of the largest address, for zero-padded listings.
fn address_digits(len: usize) -> usize {
    match len {
        0 | 1 => 1,
        n => (n - 1).ilog10() as usize + 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::OpcodeSet;

    fn machine(names: &[&str], source: &str) -> Machine {
        let arch = Arch {
            op: OpcodeSet::from_names(names).unwrap(),
            ..Arch::default()
        };
        let program = arch.assemble(source).unwrap();
        Machine::new(arch, program).unwrap()
    }

    #[test]
    fn carry_flag_follows_the_opcode_set() {
        assert!(machine(&["nop"], "nop\n").run_flags().is_empty());
        assert!(machine(&["nop", "clc"], "clc\n")
            .run_flags()
            .contains(RunFlags::CARRY));
    }

    #[test]
    fn json_round_trip_preserves_slocs() {
        let m = machine(&["jz", "clc", "add"], "clc\nadd r0 r1\njz r2 0\n");
        let text = m.to_json().unwrap();
        let again = Machine::from_json(&text).unwrap();
        assert_eq!(m, again);
        assert_eq!(m.program.slocs, again.program.slocs);
    }

    #[test]
    fn unknown_json_fields_are_rejected() {
        let m = machine(&["nop"], "nop\n");
        let mut value: serde_json::Value = serde_json::from_str(&m.to_json().unwrap()).unwrap();
        value["surprise"] = serde_json::json!(1);
        assert!(Machine::from_json(&value.to_string()).is_err());
    }

    #[test]
    fn unknown_opcode_names_fail_to_load() {
        let text = r#"{
            "arch": {
                "rsize": 8, "r": 3, "l": 8, "o": 8, "n": 1, "m": 1,
                "modes": ["ha"], "op": ["frob"], "shared_constraints": []
            },
            "program": { "slocs": [] }
        }"#;
        assert!(Machine::from_json(text).is_err());
    }

    #[test]
    fn listings_carry_addresses() {
        let m = machine(&["nop", "clc"], "nop\nclc\nnop\n");
        let disasm = m.disassemble(true).unwrap();
        assert_eq!(disasm, "0 nop\n1 clc\n2 nop\n");
        assert_eq!(m.disassemble(false).unwrap(), "nop\nclc\nnop\n");

        let alias = m.instructions_alias();
        assert!(alias.contains("nop"));
        assert!(alias.contains("clc"));
    }

    #[test]
    fn malformed_programs_are_rejected() {
        let arch = Arch {
            op: OpcodeSet::from_names(&["nop", "clc"]).unwrap(),
            ..Arch::default()
        };
        let program = Program {
            slocs: vec!["01".to_string()],
        };
        assert!(matches!(
            Machine::new(arch, program),
            Err(AsmError::MalformedWord { .. })
        ));
    }
}
