//! RAM load/store instructions.
//!
//! The emitted state machine drives the external RAM port registers
//! (`ram_addr`, `ram_din`, `ram_we`) and reads the asynchronous `ram_dout`.

use crate::arch::Arch;
use crate::bits::{process_number, register_name, fixed_bits};
use crate::error::{AsmError, RuntimeError};
use crate::interpreter::Interpreter;
use crate::op::{abstract_register, register_subcases, rom_slice};
use crate::opcode::{
    decode_field, expect_args, literal_field, pad_operands, read_field, reg_field, Opcode,
    UsageNotify,
};
use crate::state::ExecuteState;
use crate::verilog::Flavor;
use rand::{Rng, RngCore};

/// Load a RAM cell into a register.
pub struct M2r;

impl Opcode for M2r {
    fn name(&self) -> &'static str {
        "m2r"
    }

    fn description(&self) -> &'static str {
        "Copy a RAM cell into a register"
    }

    fn show_assembler(&self, arch: &Arch) -> String {
        format!(
            "m2r [{}(Reg)] [{}(RAM Address)]\t// Copy a RAM cell into a register [{}]\n",
            arch.r,
            arch.l,
            self.instruction_len(arch)
        )
    }

    fn instruction_len(&self, arch: &Arch) -> usize {
        arch.opcodes_bits() + arch.r as usize + arch.l as usize
    }

    fn assemble(&self, arch: &Arch, tokens: &[&str]) -> Result<String, AsmError> {
        expect_args("m2r", tokens, 2)?;
        let mut fields = reg_field(arch, tokens[0])?;
        fields += &literal_field(arch, tokens[1], arch.l as usize)?;
        Ok(pad_operands(arch, fields))
    }

    fn disassemble(&self, arch: &Arch, operands: &str) -> String {
        let r = arch.r as usize;
        match (
            read_field(operands, 0, r),
            read_field(operands, r, arch.l as usize),
        ) {
            (Some(a), Some(addr)) => format!("{} {}", register_name(a as usize), addr),
            _ => String::new(),
        }
    }

    fn simulate(&self, vm: &mut Interpreter, operands: &str) -> Result<ExecuteState, RuntimeError> {
        let r = vm.arch().r as usize;
        let l = vm.arch().l as usize;
        let ra = decode_field(vm, operands, 0, r)? as usize;
        let addr = decode_field(vm, operands, r, l)? as usize;
        let value = vm.ram(addr);
        vm.set_register(ra, value);
        vm.advance_pc();
        Ok(ExecuteState::Proceed)
    }

    fn generate(&self, arch: &Arch, rng: &mut dyn RngCore) -> String {
        let a = rng.gen_range(0..arch.registers()) as u64;
        let addr = rng.gen_range(0..arch.ram_cells()) as u64;
        let mut fields = fixed_bits(a, arch.r as usize);
        fields += &fixed_bits(addr, arch.l as usize);
        pad_operands(arch, fields)
    }

    fn abstract_assemble(
        &self,
        _arch: &Arch,
        tokens: &[&str],
    ) -> Result<Vec<UsageNotify>, AsmError> {
        expect_args("m2r", tokens, 2)?;
        let a = abstract_register(tokens[0])?;
        let addr = process_number(tokens[1])? as usize;
        Ok(vec![
            UsageNotify::Opcode("m2r"),
            UsageNotify::Registers(a + 1),
            UsageNotify::RamCells(addr + 1),
        ])
    }

    fn verilog_state_machine(&self, arch: &Arch, _flavor: Flavor) -> String {
        let addr = rom_slice(arch, arch.r as usize, arch.l as usize);
        let mut result = String::new();
        result += "\t\t\t\t\tM2R: begin\n";
        result += &format!("\t\t\t\t\t\tram_addr <= #1 {addr};\n");
        result += &register_subcases(arch, 0, 6, |a| {
            let mut body = String::new();
            body += &format!("\t\t\t\t\t\t\t\t_r{a} <= #1 ram_dout;\n");
            body += &format!("\t\t\t\t\t\t\t\t$display(\"M2R R{a} \", {addr});\n");
            body
        });
        result += "\t\t\t\t\t\t_pc <= #1 _pc + 1'b1;\n";
        result += "\t\t\t\t\tend\n";
        result
    }
}

/// Store a register into a RAM cell.
pub struct R2m;

impl Opcode for R2m {
    fn name(&self) -> &'static str {
        "r2m"
    }

    fn description(&self) -> &'static str {
        "Copy a register into a RAM cell"
    }

    fn show_assembler(&self, arch: &Arch) -> String {
        format!(
            "r2m [{}(RAM Address)] [{}(Reg)]\t// Copy a register into a RAM cell [{}]\n",
            arch.l,
            arch.r,
            self.instruction_len(arch)
        )
    }

    fn instruction_len(&self, arch: &Arch) -> usize {
        arch.opcodes_bits() + arch.l as usize + arch.r as usize
    }

    fn assemble(&self, arch: &Arch, tokens: &[&str]) -> Result<String, AsmError> {
        expect_args("r2m", tokens, 2)?;
        let mut fields = literal_field(arch, tokens[0], arch.l as usize)?;
        fields += &reg_field(arch, tokens[1])?;
        Ok(pad_operands(arch, fields))
    }

    fn disassemble(&self, arch: &Arch, operands: &str) -> String {
        let l = arch.l as usize;
        match (
            read_field(operands, 0, l),
            read_field(operands, l, arch.r as usize),
        ) {
            (Some(addr), Some(a)) => format!("{} {}", addr, register_name(a as usize)),
            _ => String::new(),
        }
    }

    fn simulate(&self, vm: &mut Interpreter, operands: &str) -> Result<ExecuteState, RuntimeError> {
        let r = vm.arch().r as usize;
        let l = vm.arch().l as usize;
        let addr = decode_field(vm, operands, 0, l)? as usize;
        let ra = decode_field(vm, operands, l, r)? as usize;
        let value = vm.register(ra);
        vm.set_ram(addr, value);
        vm.advance_pc();
        Ok(ExecuteState::Proceed)
    }

    fn generate(&self, arch: &Arch, rng: &mut dyn RngCore) -> String {
        let addr = rng.gen_range(0..arch.ram_cells()) as u64;
        let a = rng.gen_range(0..arch.registers()) as u64;
        let mut fields = fixed_bits(addr, arch.l as usize);
        fields += &fixed_bits(a, arch.r as usize);
        pad_operands(arch, fields)
    }

    fn abstract_assemble(
        &self,
        _arch: &Arch,
        tokens: &[&str],
    ) -> Result<Vec<UsageNotify>, AsmError> {
        expect_args("r2m", tokens, 2)?;
        let addr = process_number(tokens[0])? as usize;
        let a = abstract_register(tokens[1])?;
        Ok(vec![
            UsageNotify::Opcode("r2m"),
            UsageNotify::Registers(a + 1),
            UsageNotify::RamCells(addr + 1),
        ])
    }

    fn verilog_default_state(&self, _arch: &Arch, _flavor: Flavor) -> String {
        "\t\t\t\tram_we <= #1 1'b0;\n".to_string()
    }

    fn verilog_state_machine(&self, arch: &Arch, _flavor: Flavor) -> String {
        let addr = rom_slice(arch, 0, arch.l as usize);
        let mut result = String::new();
        result += "\t\t\t\t\tR2M: begin\n";
        result += &format!("\t\t\t\t\t\tram_addr <= #1 {addr};\n");
        result += "\t\t\t\t\t\tram_we <= #1 1'b1;\n";
        result += &register_subcases(arch, arch.l as usize, 6, |a| {
            let mut body = String::new();
            body += &format!("\t\t\t\t\t\t\t\tram_din <= #1 _r{a};\n");
            body += &format!("\t\t\t\t\t\t\t\t$display(\"R2M \", {addr}, \" R{a}\");\n");
            body
        });
        result += "\t\t\t\t\t\t_pc <= #1 _pc + 1'b1;\n";
        result += "\t\t\t\t\tend\n";
        result
    }
}
