use crate::arch::Arch;
use crate::bits::{register_name, fixed_bits};
use crate::error::{AsmError, RuntimeError};
use crate::interpreter::Interpreter;
use crate::op::{abstract_register, register_subcases};
use crate::opcode::{
    decode_field, expect_args, pad_operands, read_field, reg_field, Opcode, UsageNotify,
};
use crate::state::ExecuteState;
use crate::verilog::Flavor;
use rand::{Rng, RngCore};

/// Copy the second register into the first.
pub struct Cpy;

impl Opcode for Cpy {
    fn name(&self) -> &'static str {
        "cpy"
    }

    fn description(&self) -> &'static str {
        "Copy a register into another"
    }

    fn show_assembler(&self, arch: &Arch) -> String {
        format!(
            "cpy [{}(Reg)] [{}(Reg)]\t// Copy a register into another [{}]\n",
            arch.r,
            arch.r,
            self.instruction_len(arch)
        )
    }

    fn instruction_len(&self, arch: &Arch) -> usize {
        arch.opcodes_bits() + 2 * arch.r as usize
    }

    fn assemble(&self, arch: &Arch, tokens: &[&str]) -> Result<String, AsmError> {
        expect_args("cpy", tokens, 2)?;
        let mut fields = reg_field(arch, tokens[0])?;
        fields += &reg_field(arch, tokens[1])?;
        Ok(pad_operands(arch, fields))
    }

    fn disassemble(&self, arch: &Arch, operands: &str) -> String {
        let r = arch.r as usize;
        match (read_field(operands, 0, r), read_field(operands, r, r)) {
            (Some(a), Some(b)) => format!(
                "{} {}",
                register_name(a as usize),
                register_name(b as usize)
            ),
            _ => String::new(),
        }
    }

    fn simulate(&self, vm: &mut Interpreter, operands: &str) -> Result<ExecuteState, RuntimeError> {
        let r = vm.arch().r as usize;
        let ra = decode_field(vm, operands, 0, r)? as usize;
        let rb = decode_field(vm, operands, r, r)? as usize;
        let value = vm.register(rb);
        vm.set_register(ra, value);
        vm.advance_pc();
        Ok(ExecuteState::Proceed)
    }

    fn generate(&self, arch: &Arch, rng: &mut dyn RngCore) -> String {
        let r = arch.r as usize;
        let a = rng.gen_range(0..arch.registers()) as u64;
        let b = rng.gen_range(0..arch.registers()) as u64;
        let mut fields = fixed_bits(a, r);
        fields += &fixed_bits(b, r);
        pad_operands(arch, fields)
    }

    fn abstract_assemble(
        &self,
        _arch: &Arch,
        tokens: &[&str],
    ) -> Result<Vec<UsageNotify>, AsmError> {
        expect_args("cpy", tokens, 2)?;
        let a = abstract_register(tokens[0])?;
        let b = abstract_register(tokens[1])?;
        Ok(vec![
            UsageNotify::Opcode("cpy"),
            UsageNotify::Registers(a.max(b) + 1),
        ])
    }

    fn verilog_state_machine(&self, arch: &Arch, _flavor: Flavor) -> String {
        let mut result = String::new();
        result += "\t\t\t\t\tCPY: begin\n";
        result += &register_subcases(arch, 0, 6, |a| {
            register_subcases(arch, arch.r as usize, 8, |b| {
                let mut body = String::new();
                body += &format!("\t\t\t\t\t\t\t\t\t\t_r{a} <= #1 _r{b};\n");
                body += &format!("\t\t\t\t\t\t\t\t\t\t$display(\"CPY R{a} R{b}\");\n");
                body
            })
        });
        result += "\t\t\t\t\t\t_pc <= #1 _pc + 1'b1;\n";
        result += "\t\t\t\t\tend\n";
        result
    }
}
