//! Jump instructions. Targets are `O`-bit ROM addresses.

use crate::arch::Arch;
use crate::bits::{register_name, fixed_bits};
use crate::error::{AsmError, RuntimeError};
use crate::interpreter::Interpreter;
use crate::op::{abstract_register, register_subcases, rom_slice};
use crate::opcode::{
    decode_field, expect_args, literal_field, pad_operands, read_field, reg_field, Opcode,
    RunFlags, UsageNotify,
};
use crate::state::ExecuteState;
use crate::verilog::Flavor;
use rand::{Rng, RngCore};

/// Unconditional jump.
pub struct J;

impl Opcode for J {
    fn name(&self) -> &'static str {
        "j"
    }

    fn description(&self) -> &'static str {
        "Unconditional jump"
    }

    fn show_assembler(&self, arch: &Arch) -> String {
        format!(
            "j [{}(ROM Address)]\t// Unconditional jump [{}]\n",
            arch.o,
            self.instruction_len(arch)
        )
    }

    fn instruction_len(&self, arch: &Arch) -> usize {
        arch.opcodes_bits() + arch.o as usize
    }

    fn assemble(&self, arch: &Arch, tokens: &[&str]) -> Result<String, AsmError> {
        expect_args("j", tokens, 1)?;
        let fields = literal_field(arch, tokens[0], arch.o as usize)?;
        Ok(pad_operands(arch, fields))
    }

    fn disassemble(&self, arch: &Arch, operands: &str) -> String {
        match read_field(operands, 0, arch.o as usize) {
            Some(addr) => format!("{addr}"),
            None => String::new(),
        }
    }

    fn simulate(&self, vm: &mut Interpreter, operands: &str) -> Result<ExecuteState, RuntimeError> {
        let o = vm.arch().o as usize;
        let addr = decode_field(vm, operands, 0, o)? as usize;
        vm.set_pc(addr);
        Ok(ExecuteState::Proceed)
    }

    fn generate(&self, arch: &Arch, rng: &mut dyn RngCore) -> String {
        let addr = rng.gen_range(0..arch.rom_cells()) as u64;
        let fields = fixed_bits(addr, arch.o as usize);
        pad_operands(arch, fields)
    }

    fn abstract_assemble(
        &self,
        _arch: &Arch,
        tokens: &[&str],
    ) -> Result<Vec<UsageNotify>, AsmError> {
        expect_args("j", tokens, 1)?;
        let addr = crate::bits::process_number(tokens[0])? as usize;
        Ok(vec![
            UsageNotify::Opcode("j"),
            UsageNotify::RomCells(addr + 1),
        ])
    }

    fn verilog_state_machine(&self, arch: &Arch, _flavor: Flavor) -> String {
        let addr = rom_slice(arch, 0, arch.o as usize);
        let mut result = String::new();
        result += "\t\t\t\t\tJ: begin\n";
        result += &format!("\t\t\t\t\t\t_pc <= #1 {addr};\n");
        result += &format!("\t\t\t\t\t\t$display(\"J \", {addr});\n");
        result += "\t\t\t\t\tend\n";
        result
    }
}

/// Zero conditional jump: taken when the tested register is zero.
pub struct Jz;

impl Opcode for Jz {
    fn name(&self) -> &'static str {
        "jz"
    }

    fn description(&self) -> &'static str {
        "Zero conditional jump"
    }

    fn show_assembler(&self, arch: &Arch) -> String {
        format!(
            "jz [{}(Reg)] [{}(ROM Address)]\t// Conditional jump [{}]\n",
            arch.r,
            arch.o,
            self.instruction_len(arch)
        )
    }

    fn instruction_len(&self, arch: &Arch) -> usize {
        arch.opcodes_bits() + arch.r as usize + arch.o as usize
    }

    fn assemble(&self, arch: &Arch, tokens: &[&str]) -> Result<String, AsmError> {
        expect_args("jz", tokens, 2)?;
        let mut fields = reg_field(arch, tokens[0])?;
        fields += &literal_field(arch, tokens[1], arch.o as usize)?;
        Ok(pad_operands(arch, fields))
    }

    fn disassemble(&self, arch: &Arch, operands: &str) -> String {
        let r = arch.r as usize;
        match (
            read_field(operands, 0, r),
            read_field(operands, r, arch.o as usize),
        ) {
            (Some(a), Some(addr)) => format!("{} {}", register_name(a as usize), addr),
            _ => String::new(),
        }
    }

    fn simulate(&self, vm: &mut Interpreter, operands: &str) -> Result<ExecuteState, RuntimeError> {
        let r = vm.arch().r as usize;
        let o = vm.arch().o as usize;
        let ra = decode_field(vm, operands, 0, r)? as usize;
        let addr = decode_field(vm, operands, r, o)? as usize;
        if vm.register(ra) == 0 {
            vm.set_pc(addr);
        } else {
            vm.advance_pc();
        }
        Ok(ExecuteState::Proceed)
    }

    fn generate(&self, arch: &Arch, rng: &mut dyn RngCore) -> String {
        let a = rng.gen_range(0..arch.registers()) as u64;
        let addr = rng.gen_range(0..arch.rom_cells()) as u64;
        let mut fields = fixed_bits(a, arch.r as usize);
        fields += &fixed_bits(addr, arch.o as usize);
        pad_operands(arch, fields)
    }

    fn abstract_assemble(
        &self,
        _arch: &Arch,
        tokens: &[&str],
    ) -> Result<Vec<UsageNotify>, AsmError> {
        expect_args("jz", tokens, 2)?;
        let a = abstract_register(tokens[0])?;
        let addr = crate::bits::process_number(tokens[1])? as usize;
        Ok(vec![
            UsageNotify::Opcode("jz"),
            UsageNotify::Registers(a + 1),
            UsageNotify::RomCells(addr + 1),
        ])
    }

    fn verilog_state_machine(&self, arch: &Arch, _flavor: Flavor) -> String {
        let addr = rom_slice(arch, arch.r as usize, arch.o as usize);
        let mut result = String::new();
        result += "\t\t\t\t\tJZ: begin\n";
        result += &register_subcases(arch, 0, 6, |a| {
            let mut body = String::new();
            body += &format!("\t\t\t\t\t\t\t\tif (_r{a} == 'b0)\n");
            body += &format!("\t\t\t\t\t\t\t\t\t_pc <= #1 {addr};\n");
            body += "\t\t\t\t\t\t\t\telse\n";
            body += "\t\t\t\t\t\t\t\t\t_pc <= #1 _pc + 1'b1;\n";
            body += &format!("\t\t\t\t\t\t\t\t$display(\"JZ R{a} \", _r{a});\n");
            body
        });
        result += "\t\t\t\t\tend\n";
        result
    }
}

/// Carry conditional jump: taken when the carry flag is set.
pub struct Jc;

impl Opcode for Jc {
    fn name(&self) -> &'static str {
        "jc"
    }

    fn description(&self) -> &'static str {
        "Carry conditional jump"
    }

    fn show_assembler(&self, arch: &Arch) -> String {
        format!(
            "jc [{}(ROM Address)]\t// Jump on carry [{}]\n",
            arch.o,
            self.instruction_len(arch)
        )
    }

    fn instruction_len(&self, arch: &Arch) -> usize {
        arch.opcodes_bits() + arch.o as usize
    }

    fn assemble(&self, arch: &Arch, tokens: &[&str]) -> Result<String, AsmError> {
        expect_args("jc", tokens, 1)?;
        let fields = literal_field(arch, tokens[0], arch.o as usize)?;
        Ok(pad_operands(arch, fields))
    }

    fn disassemble(&self, arch: &Arch, operands: &str) -> String {
        match read_field(operands, 0, arch.o as usize) {
            Some(addr) => format!("{addr}"),
            None => String::new(),
        }
    }

    fn simulate(&self, vm: &mut Interpreter, operands: &str) -> Result<ExecuteState, RuntimeError> {
        let o = vm.arch().o as usize;
        let addr = decode_field(vm, operands, 0, o)? as usize;
        if vm.carry() {
            vm.set_pc(addr);
        } else {
            vm.advance_pc();
        }
        Ok(ExecuteState::Proceed)
    }

    fn generate(&self, arch: &Arch, rng: &mut dyn RngCore) -> String {
        let addr = rng.gen_range(0..arch.rom_cells()) as u64;
        let fields = fixed_bits(addr, arch.o as usize);
        pad_operands(arch, fields)
    }

    fn required_flags(&self) -> RunFlags {
        RunFlags::CARRY
    }

    fn abstract_assemble(
        &self,
        _arch: &Arch,
        tokens: &[&str],
    ) -> Result<Vec<UsageNotify>, AsmError> {
        expect_args("jc", tokens, 1)?;
        let addr = crate::bits::process_number(tokens[0])? as usize;
        Ok(vec![
            UsageNotify::Opcode("jc"),
            UsageNotify::RomCells(addr + 1),
        ])
    }

    fn verilog_state_machine(&self, arch: &Arch, _flavor: Flavor) -> String {
        let addr = rom_slice(arch, 0, arch.o as usize);
        let mut result = String::new();
        result += "\t\t\t\t\tJC: begin\n";
        result += "\t\t\t\t\t\tif (carryflag)\n";
        result += &format!("\t\t\t\t\t\t\t_pc <= #1 {addr};\n");
        result += "\t\t\t\t\t\telse\n";
        result += "\t\t\t\t\t\t\t_pc <= #1 _pc + 1'b1;\n";
        result += &format!("\t\t\t\t\t\t$display(\"JC \", {addr});\n");
        result += "\t\t\t\t\tend\n";
        result
    }
}
