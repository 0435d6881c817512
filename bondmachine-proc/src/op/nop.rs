use crate::arch::Arch;
use crate::error::{AsmError, RuntimeError};
use crate::interpreter::Interpreter;
use crate::opcode::{expect_args, pad_operands, Opcode, UsageNotify};
use crate::state::ExecuteState;
use crate::verilog::Flavor;
use rand::RngCore;

/// No operation.
pub struct Nop;

impl Opcode for Nop {
    fn name(&self) -> &'static str {
        "nop"
    }

    fn description(&self) -> &'static str {
        "No operation"
    }

    fn show_assembler(&self, arch: &Arch) -> String {
        format!("nop\t// No operation [{}]\n", self.instruction_len(arch))
    }

    fn instruction_len(&self, arch: &Arch) -> usize {
        arch.opcodes_bits()
    }

    fn assemble(&self, arch: &Arch, tokens: &[&str]) -> Result<String, AsmError> {
        expect_args("nop", tokens, 0)?;
        Ok(pad_operands(arch, String::new()))
    }

    fn disassemble(&self, _arch: &Arch, _operands: &str) -> String {
        String::new()
    }

    fn simulate(&self, vm: &mut Interpreter, _operands: &str) -> Result<ExecuteState, RuntimeError> {
        vm.advance_pc();
        Ok(ExecuteState::Proceed)
    }

    fn generate(&self, arch: &Arch, _rng: &mut dyn RngCore) -> String {
        pad_operands(arch, String::new())
    }

    fn abstract_assemble(
        &self,
        _arch: &Arch,
        _tokens: &[&str],
    ) -> Result<Vec<UsageNotify>, AsmError> {
        Ok(vec![UsageNotify::Opcode("nop")])
    }

    fn verilog_state_machine(&self, _arch: &Arch, _flavor: Flavor) -> String {
        let mut result = String::new();
        result += "\t\t\t\t\tNOP: begin\n";
        result += "\t\t\t\t\t\t$display(\"NOP\");\n";
        result += "\t\t\t\t\t\t_pc <= #1 _pc + 1'b1;\n";
        result += "\t\t\t\t\tend\n";
        result
    }
}
