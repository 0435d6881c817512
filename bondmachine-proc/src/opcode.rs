//! The opcode contract and the process-wide handler catalog.
//!
//! Every instruction is one handler implementing [`Opcode`]: a stateless
//! value that knows how to assemble, disassemble, simulate, randomly
//! generate, and emit the Verilog state-machine fragments for its
//! instruction. Handlers are registered exactly once in [`catalog`]; an
//! architecture enables an ordered subset of them and the position of a
//! handler in that subset is its numeric opcode.

use crate::arch::{Arch, ExecMode};
use crate::bits::{encode_field, field_value, parse_register, process_number, zeros_suffix};
use crate::error::{AsmError, RuntimeError};
use crate::interpreter::Interpreter;
use crate::state::ExecuteState;
use crate::verilog::Flavor;
use rand::RngCore;

bitflags::bitflags! {
    /// Optional pieces of processor state. The flag set of a machine is the
    /// union over its enabled opcodes and gates both simulation state and
    /// the Verilog flag-register declarations.
    pub struct RunFlags: u8 {
        /// A carry/borrow flag register.
        const CARRY = 0b0000_0001;
    }
}

/// A declarative note of what an instruction uses, independent of a frozen
/// architecture. The fabric tooling folds these to size an [`Arch`] before
/// committing to one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UsageNotify {
    /// The mnemonic itself.
    Opcode(&'static str),
    /// Needs at least this many registers.
    Registers(usize),
    /// Needs at least this many RAM cells.
    RamCells(usize),
    /// Needs at least this many ROM cells.
    RomCells(usize),
    /// Needs at least this many input ports.
    Inputs(usize),
    /// Needs at least this many output ports.
    Outputs(usize),
    /// Needs a shared object of this kind.
    Shared(&'static str),
}

/// A named Verilog module emitted next to the processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerilogModule {
    /// Module name.
    pub name: String,
    /// Module source.
    pub source: String,
}

/// The polymorphic capability set every instruction implements.
///
/// `assemble` returns only the operand fields, left-padded per field and
/// right-padded as a whole to `max_word - opcodes_bits`; the assembler
/// prepends the opcode prefix. `disassemble` and `simulate` receive the same
/// operand area (the word with its opcode prefix stripped).
pub trait Opcode: Sync {
    /// Unique lowercase mnemonic.
    fn name(&self) -> &'static str;

    /// One-line documentation.
    fn description(&self) -> &'static str;

    /// Single-line usage template, used for alias tables.
    fn show_assembler(&self, arch: &Arch) -> String;

    /// Bits of the full instruction before right-padding to `max_word`,
    /// opcode prefix included.
    fn instruction_len(&self, arch: &Arch) -> usize;

    /// Encodes operand tokens into the operand area.
    fn assemble(&self, arch: &Arch, tokens: &[&str]) -> Result<String, AsmError>;

    /// Renders the operand area back to operand text. An empty string means
    /// the encoding is invalid for this handler.
    fn disassemble(&self, arch: &Arch, operands: &str) -> String;

    /// Executes one instruction: mutates VM state and advances the program
    /// counter exactly once. The default advance is `pc + 1 mod 2^O`; jumps
    /// override it.
    fn simulate(&self, vm: &mut Interpreter, operands: &str) -> Result<ExecuteState, RuntimeError>;

    /// Produces a random well-formed operand area.
    fn generate(&self, arch: &Arch, rng: &mut dyn RngCore) -> String;

    /// Shared-object kinds this instruction needs bound.
    fn required_shared(&self) -> &'static [&'static str] {
        &[]
    }

    /// Execution modes this instruction needs.
    fn required_modes(&self) -> &'static [ExecMode] {
        &[]
    }

    /// Execution modes this instruction cannot coexist with.
    fn forbidden_modes(&self) -> &'static [ExecMode] {
        &[]
    }

    /// Optional processor state this instruction needs.
    fn required_flags(&self) -> RunFlags {
        RunFlags::empty()
    }

    /// Declarative usage of the instruction, for sizing an architecture
    /// before freezing one.
    fn abstract_assemble(&self, arch: &Arch, tokens: &[&str]) -> Result<Vec<UsageNotify>, AsmError>;

    /// Declarations spliced before the register file.
    fn verilog_header(&self, _arch: &Arch, _flavor: Flavor) -> String {
        String::new()
    }

    /// Statements spliced into the reset branch.
    fn verilog_reset(&self, _arch: &Arch, _flavor: Flavor) -> String {
        String::new()
    }

    /// Module-level blocks spliced after the state machine.
    fn verilog_internal_state(&self, _arch: &Arch, _flavor: Flavor) -> String {
        String::new()
    }

    /// Statements spliced before the opcode dispatch each cycle.
    fn verilog_default_state(&self, _arch: &Arch, _flavor: Flavor) -> String {
        String::new()
    }

    /// The `case` arm keyed by the uppercase mnemonic, with register-wise
    /// sub-cases where a register operand is present.
    fn verilog_state_machine(&self, arch: &Arch, flavor: Flavor) -> String;

    /// Statements spliced after the always block.
    fn verilog_footer(&self, _arch: &Arch, _flavor: Flavor) -> String {
        String::new()
    }

    /// Support modules emitted next to the processor.
    fn verilog_extra_modules(&self, _arch: &Arch, _flavor: Flavor) -> Vec<VerilogModule> {
        Vec::new()
    }

    /// Named splice points reserved for fabric adapters.
    fn verilog_extra_block(&self, _arch: &Arch, _flavor: Flavor, _block: &str) -> String {
        String::new()
    }
}

/// The process-wide opcode catalog.
pub mod catalog {
    use super::Opcode;
    use crate::op;

    /// Every registered handler, ordered by name. Populated at
    /// initialization, immutable thereafter.
    pub static ALL_OPCODES: &[&dyn Opcode] = &[
        &op::Add,
        &op::And,
        &op::Clc,
        &op::Cpy,
        &op::Dec,
        &op::Hlt,
        &op::I2r,
        &op::Inc,
        &op::J,
        &op::Jc,
        &op::Jz,
        &op::M2r,
        &op::Nop,
        &op::Not,
        &op::Or,
        &op::R2m,
        &op::R2o,
        &op::R2s,
        &op::Rset,
        &op::S2r,
        &op::Sub,
        &op::Xor,
    ];

    /// Finds a handler by mnemonic. Lookup is linear; the catalog is small.
    pub fn lookup(name: &str) -> Option<&'static dyn Opcode> {
        ALL_OPCODES.iter().find(|op| op.name() == name).copied()
    }
}

/// Rejects a wrong operand count up front.
pub(crate) fn expect_args(
    mnemonic: &'static str,
    tokens: &[&str],
    expected: usize,
) -> Result<(), AsmError> {
    if tokens.len() != expected {
        return Err(AsmError::WrongArgumentCount {
            mnemonic,
            expected,
            got: tokens.len(),
        });
    }
    Ok(())
}

/// Right-pads assembled operand fields to the operand-area width.
pub(crate) fn pad_operands(arch: &Arch, fields: String) -> String {
    zeros_suffix(arch.max_word() - arch.opcodes_bits(), &fields)
}

/// Encodes a register token into an `R`-bit field.
pub(crate) fn reg_field(arch: &Arch, token: &str) -> Result<String, AsmError> {
    let index = parse_register(token, arch.registers())?;
    encode_field(index as u64, arch.r as usize)
}

/// Encodes a numeric literal token into a fixed-width field.
pub(crate) fn literal_field(_arch: &Arch, token: &str, width: usize) -> Result<String, AsmError> {
    let value = process_number(token)?;
    encode_field(value, width)
}

/// Decodes a fixed-width field out of the operand area.
pub(crate) fn decode_field(
    vm: &Interpreter,
    operands: &str,
    start: usize,
    width: usize,
) -> Result<u64, RuntimeError> {
    operands
        .get(start..start + width)
        .and_then(field_value)
        .ok_or(RuntimeError::ShortWord { pc: vm.pc() })
}

/// Reads a fixed-width field for disassembly; `None` marks the encoding
/// invalid.
pub(crate) fn read_field(operands: &str, start: usize, width: usize) -> Option<u64> {
    operands.get(start..start + width).and_then(field_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;

    #[test]
    fn catalog_is_sorted_and_unique_by_name() {
        let names: Vec<_> = catalog::ALL_OPCODES.iter().map(|op| op.name()).collect();
        let sorted: Vec<_> = names.iter().copied().sorted().dedup().collect();
        assert_eq!(names, sorted);
    }

    #[test]
    fn lookup_finds_registered_handlers() {
        assert_eq!(catalog::lookup("jz").map(|op| op.name()), Some("jz"));
        assert!(catalog::lookup("quux").is_none());
    }

    #[test]
    fn descriptions_are_nonempty() {
        for op in catalog::ALL_OPCODES {
            assert!(!op.description().is_empty(), "{}", op.name());
        }
    }
}
