//! Port I/O instructions.

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

/// Load an input port into a register.
pub struct I2r;

impl Opcode for I2r {
    fn name(&self) -> &'static str {
        "i2r"
    }

    fn description(&self) -> &'static str {
        "Copy an input port into a register"
    }

    fn show_assembler(&self, arch: &Arch) -> String {
        format!(
            "i2r [{}(Reg)] [{}(Input)]\t// Copy an input port into a register [{}]\n",
            arch.r,
            arch.input_bits(),
            self.instruction_len(arch)
        )
    }

    fn instruction_len(&self, arch: &Arch) -> usize {
        arch.opcodes_bits() + arch.r as usize + arch.input_bits()
    }

    fn assemble(&self, arch: &Arch, tokens: &[&str]) -> Result<String, AsmError> {
        expect_args("i2r", tokens, 2)?;
        let mut fields = reg_field(arch, tokens[0])?;
        fields += &literal_field(arch, tokens[1], arch.input_bits())?;
        Ok(pad_operands(arch, fields))
    }

    fn disassemble(&self, arch: &Arch, operands: &str) -> String {
        let r = arch.r as usize;
        match (
            read_field(operands, 0, r),
            read_field(operands, r, arch.input_bits()),
        ) {
            (Some(a), Some(port)) => format!("{} {}", register_name(a as usize), port),
            _ => String::new(),
        }
    }

    fn simulate(&self, vm: &mut Interpreter, operands: &str) -> Result<ExecuteState, RuntimeError> {
        let r = vm.arch().r as usize;
        let width = vm.arch().input_bits();
        let ra = decode_field(vm, operands, 0, r)? as usize;
        let port = decode_field(vm, operands, r, width)? as usize;
        let value = vm.input(port)?;
        vm.set_register(ra, value);
        vm.advance_pc();
        Ok(ExecuteState::Proceed)
    }

    fn generate(&self, arch: &Arch, rng: &mut dyn RngCore) -> String {
        let a = rng.gen_range(0..arch.registers()) as u64;
        let port = rng.gen_range(0..arch.inputs().max(1)) as u64;
        let mut fields = fixed_bits(a, arch.r as usize);
        fields += &fixed_bits(port, arch.input_bits());
        pad_operands(arch, fields)
    }

    fn abstract_assemble(
        &self,
        _arch: &Arch,
        tokens: &[&str],
    ) -> Result<Vec<UsageNotify>, AsmError> {
        expect_args("i2r", tokens, 2)?;
        let a = abstract_register(tokens[0])?;
        let port = process_number(tokens[1])? as usize;
        Ok(vec![
            UsageNotify::Opcode("i2r"),
            UsageNotify::Registers(a + 1),
            UsageNotify::Inputs(port + 1),
        ])
    }

    fn verilog_state_machine(&self, arch: &Arch, _flavor: Flavor) -> String {
        let mut result = String::new();
        result += "\t\t\t\t\tI2R: begin\n";
        result += &register_subcases(arch, 0, 6, |a| {
            field_subcases(
                arch,
                arch.r as usize,
                arch.input_bits(),
                arch.inputs(),
                "i",
                8,
                |port| {
                    let mut body = String::new();
                    body += &format!("\t\t\t\t\t\t\t\t\t\t_r{a} <= #1 i{port};\n");
                    body += &format!("\t\t\t\t\t\t\t\t\t\t$display(\"I2R R{a} I{port}\");\n");
                    body
                },
            )
        });
        result += "\t\t\t\t\t\t_pc <= #1 _pc + 1'b1;\n";
        result += "\t\t\t\t\tend\n";
        result
    }
}

/// Store a register into an output port.
pub struct R2o;

impl Opcode for R2o {
    fn name(&self) -> &'static str {
        "r2o"
    }

    fn description(&self) -> &'static str {
        "Copy a register into an output port"
    }

    fn show_assembler(&self, arch: &Arch) -> String {
        format!(
            "r2o [{}(Output)] [{}(Reg)]\t// Copy a register into an output port [{}]\n",
            arch.output_bits(),
            arch.r,
            self.instruction_len(arch)
        )
    }

    fn instruction_len(&self, arch: &Arch) -> usize {
        arch.opcodes_bits() + arch.output_bits() + arch.r as usize
    }

    fn assemble(&self, arch: &Arch, tokens: &[&str]) -> Result<String, AsmError> {
        expect_args("r2o", tokens, 2)?;
        let mut fields = literal_field(arch, tokens[0], arch.output_bits())?;
        fields += &reg_field(arch, tokens[1])?;
        Ok(pad_operands(arch, fields))
    }

    fn disassemble(&self, arch: &Arch, operands: &str) -> String {
        let width = arch.output_bits();
        match (
            read_field(operands, 0, width),
            read_field(operands, width, arch.r as usize),
        ) {
            (Some(port), Some(a)) => format!("{} {}", port, register_name(a as usize)),
            _ => String::new(),
        }
    }

    fn simulate(&self, vm: &mut Interpreter, operands: &str) -> Result<ExecuteState, RuntimeError> {
        let r = vm.arch().r as usize;
        let width = vm.arch().output_bits();
        let port = decode_field(vm, operands, 0, width)? as usize;
        let ra = decode_field(vm, operands, width, r)? as usize;
        let value = vm.register(ra);
        vm.set_output(port, value)?;
        vm.advance_pc();
        Ok(ExecuteState::Proceed)
    }

    fn generate(&self, arch: &Arch, rng: &mut dyn RngCore) -> String {
        let port = rng.gen_range(0..arch.outputs().max(1)) as u64;
        let a = rng.gen_range(0..arch.registers()) as u64;
        let mut fields = fixed_bits(port, arch.output_bits());
        fields += &fixed_bits(a, arch.r as usize);
        pad_operands(arch, fields)
    }

    fn abstract_assemble(
        &self,
        _arch: &Arch,
        tokens: &[&str],
    ) -> Result<Vec<UsageNotify>, AsmError> {
        expect_args("r2o", tokens, 2)?;
        let port = process_number(tokens[0])? as usize;
        let a = abstract_register(tokens[1])?;
        Ok(vec![
            UsageNotify::Opcode("r2o"),
            UsageNotify::Registers(a + 1),
            UsageNotify::Outputs(port + 1),
        ])
    }

    fn verilog_state_machine(&self, arch: &Arch, _flavor: Flavor) -> String {
        let mut result = String::new();
        result += "\t\t\t\t\tR2O: begin\n";
        result += &field_subcases(arch, 0, arch.output_bits(), arch.outputs(), "o", 6, |port| {
            register_subcases(arch, arch.output_bits(), 8, |a| {
                let mut body = String::new();
                body += &format!("\t\t\t\t\t\t\t\t\t\t_o{port} <= #1 _r{a};\n");
                body += &format!("\t\t\t\t\t\t\t\t\t\t$display(\"R2O O{port} R{a}\");\n");
                body
            })
        });
        result += "\t\t\t\t\t\t_pc <= #1 _pc + 1'b1;\n";
        result += "\t\t\t\t\tend\n";
        result
    }
}
