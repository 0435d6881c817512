//! Shared-channel access instructions.
//!
//! Both require a `channel` shared object bound through the architecture's
//! shared constraints; the object id operand indexes into that binding
//! list.

use crate::arch::Arch;
use crate::bits::{process_number, register_name, fixed_bits};
use crate::error::{AsmError, RuntimeError};
use crate::interpreter::Interpreter;
use crate::op::{abstract_register, field_subcases, register_subcases};
use crate::opcode::{
    decode_field, expect_args, literal_field, pad_operands, read_field, reg_field, Opcode,
    UsageNotify,
};
use crate::state::ExecuteState;
use crate::verilog::Flavor;
use rand::{Rng, RngCore};

/// Read a shared channel into a register.
pub struct S2r;

impl Opcode for S2r {
    fn name(&self) -> &'static str {
        "s2r"
    }

    fn description(&self) -> &'static str {
        "Copy a shared channel into a register"
    }

    fn show_assembler(&self, arch: &Arch) -> String {
        format!(
            "s2r [{}(Reg)] [{}(Channel)]\t// Copy a shared channel into a register [{}]\n",
            arch.r,
            arch.shared_bits(),
            self.instruction_len(arch)
        )
    }

    fn instruction_len(&self, arch: &Arch) -> usize {
        arch.opcodes_bits() + arch.r as usize + arch.shared_bits()
    }

    fn assemble(&self, arch: &Arch, tokens: &[&str]) -> Result<String, AsmError> {
        expect_args("s2r", tokens, 2)?;
        let mut fields = reg_field(arch, tokens[0])?;
        fields += &literal_field(arch, tokens[1], arch.shared_bits())?;
        Ok(pad_operands(arch, fields))
    }

    fn disassemble(&self, arch: &Arch, operands: &str) -> String {
        let r = arch.r as usize;
        match (
            read_field(operands, 0, r),
            read_field(operands, r, arch.shared_bits()),
        ) {
            (Some(a), Some(id)) => format!("{} {}", register_name(a as usize), id),
            _ => String::new(),
        }
    }

    fn simulate(&self, vm: &mut Interpreter, operands: &str) -> Result<ExecuteState, RuntimeError> {
        let r = vm.arch().r as usize;
        let width = vm.arch().shared_bits();
        let ra = decode_field(vm, operands, 0, r)? as usize;
        let id = decode_field(vm, operands, r, width)? as usize;
        let value = vm.shared(id)?;
        vm.set_register(ra, value);
        vm.advance_pc();
        Ok(ExecuteState::Proceed)
    }

    fn generate(&self, arch: &Arch, rng: &mut dyn RngCore) -> String {
        let a = rng.gen_range(0..arch.registers()) as u64;
        let id = rng.gen_range(0..arch.shared_constraints.len().max(1)) as u64;
        let mut fields = fixed_bits(a, arch.r as usize);
        fields += &fixed_bits(id, arch.shared_bits());
        pad_operands(arch, fields)
    }

    fn required_shared(&self) -> &'static [&'static str] {
        &["channel"]
    }

    fn abstract_assemble(
        &self,
        _arch: &Arch,
        tokens: &[&str],
    ) -> Result<Vec<UsageNotify>, AsmError> {
        expect_args("s2r", tokens, 2)?;
        let a = abstract_register(tokens[0])?;
        let _ = process_number(tokens[1])?;
        Ok(vec![
            UsageNotify::Opcode("s2r"),
            UsageNotify::Registers(a + 1),
            UsageNotify::Shared("channel"),
        ])
    }

    fn verilog_state_machine(&self, arch: &Arch, _flavor: Flavor) -> String {
        let channels = arch.shared_constraints.len();
        let mut result = String::new();
        result += "\t\t\t\t\tS2R: begin\n";
        result += &register_subcases(arch, 0, 6, |a| {
            field_subcases(arch, arch.r as usize, arch.shared_bits(), channels, "sh", 8, |id| {
                let mut body = String::new();
                body += &format!("\t\t\t\t\t\t\t\t\t\t_r{a} <= #1 sh{id}_in;\n");
                body += &format!("\t\t\t\t\t\t\t\t\t\t$display(\"S2R R{a} SH{id}\");\n");
                body
            })
        });
        result += "\t\t\t\t\t\t_pc <= #1 _pc + 1'b1;\n";
        result += "\t\t\t\t\tend\n";
        result
    }
}

/// Write a register into a shared channel.
pub struct R2s;

impl Opcode for R2s {
    fn name(&self) -> &'static str {
        "r2s"
    }

    fn description(&self) -> &'static str {
        "Copy a register into a shared channel"
    }

    fn show_assembler(&self, arch: &Arch) -> String {
        format!(
            "r2s [{}(Channel)] [{}(Reg)]\t// Copy a register into a shared channel [{}]\n",
            arch.shared_bits(),
            arch.r,
            self.instruction_len(arch)
        )
    }

    fn instruction_len(&self, arch: &Arch) -> usize {
        arch.opcodes_bits() + arch.shared_bits() + arch.r as usize
    }

    fn assemble(&self, arch: &Arch, tokens: &[&str]) -> Result<String, AsmError> {
        expect_args("r2s", tokens, 2)?;
        let mut fields = literal_field(arch, tokens[0], arch.shared_bits())?;
        fields += &reg_field(arch, tokens[1])?;
        Ok(pad_operands(arch, fields))
    }

    fn disassemble(&self, arch: &Arch, operands: &str) -> String {
        let width = arch.shared_bits();
        match (
            read_field(operands, 0, width),
            read_field(operands, width, arch.r as usize),
        ) {
            (Some(id), Some(a)) => format!("{} {}", id, register_name(a as usize)),
            _ => String::new(),
        }
    }

    fn simulate(&self, vm: &mut Interpreter, operands: &str) -> Result<ExecuteState, RuntimeError> {
        let r = vm.arch().r as usize;
        let width = vm.arch().shared_bits();
        let id = decode_field(vm, operands, 0, width)? as usize;
        let ra = decode_field(vm, operands, width, r)? as usize;
        let value = vm.register(ra);
        vm.set_shared(id, value)?;
        vm.advance_pc();
        Ok(ExecuteState::Proceed)
    }

    fn generate(&self, arch: &Arch, rng: &mut dyn RngCore) -> String {
        let id = rng.gen_range(0..arch.shared_constraints.len().max(1)) as u64;
        let a = rng.gen_range(0..arch.registers()) as u64;
        let mut fields = fixed_bits(id, arch.shared_bits());
        fields += &fixed_bits(a, arch.r as usize);
        pad_operands(arch, fields)
    }

    fn required_shared(&self) -> &'static [&'static str] {
        &["channel"]
    }

    fn abstract_assemble(
        &self,
        _arch: &Arch,
        tokens: &[&str],
    ) -> Result<Vec<UsageNotify>, AsmError> {
        expect_args("r2s", tokens, 2)?;
        let _ = process_number(tokens[0])?;
        let a = abstract_register(tokens[1])?;
        Ok(vec![
            UsageNotify::Opcode("r2s"),
            UsageNotify::Registers(a + 1),
            UsageNotify::Shared("channel"),
        ])
    }

    fn verilog_default_state(&self, arch: &Arch, _flavor: Flavor) -> String {
        (0..arch.shared_constraints.len())
            .map(|id| format!("\t\t\t\tsh{id}_we <= #1 1'b0;\n"))
            .collect()
    }

    fn verilog_state_machine(&self, arch: &Arch, _flavor: Flavor) -> String {
        let channels = arch.shared_constraints.len();
        let mut result = String::new();
        result += "\t\t\t\t\tR2S: begin\n";
        result += &field_subcases(arch, 0, arch.shared_bits(), channels, "sh", 6, |id| {
            register_subcases(arch, arch.shared_bits(), 8, |a| {
                let mut body = String::new();
                body += &format!("\t\t\t\t\t\t\t\t\t\tsh{id}_out <= #1 _r{a};\n");
                body += &format!("\t\t\t\t\t\t\t\t\t\tsh{id}_we <= #1 1'b1;\n");
                body += &format!("\t\t\t\t\t\t\t\t\t\t$display(\"R2S SH{id} R{a}\");\n");
                body
            })
        });
        result += "\t\t\t\t\t\t_pc <= #1 _pc + 1'b1;\n";
        result += "\t\t\t\t\tend\n";
        result
    }
}
