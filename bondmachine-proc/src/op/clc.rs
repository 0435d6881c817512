use crate::arch::Arch;
use crate::error::{AsmError, RuntimeError};
use crate::interpreter::Interpreter;
use crate::opcode::{expect_args, pad_operands, Opcode, RunFlags, UsageNotify};
use crate::state::ExecuteState;
use crate::verilog::Flavor;
use rand::RngCore;

/// Clear the carry flag.
pub struct Clc;

impl Opcode for Clc {
    fn name(&self) -> &'static str {
        "clc"
    }

    fn description(&self) -> &'static str {
        "Clear carry-bit"
    }

    fn show_assembler(&self, arch: &Arch) -> String {
        format!(
            "clc\t// Set carry-bit to 0 [{}]\n",
            self.instruction_len(arch)
        )
    }

    fn instruction_len(&self, arch: &Arch) -> usize {
        arch.opcodes_bits()
    }

    fn assemble(&self, arch: &Arch, tokens: &[&str]) -> Result<String, AsmError> {
        expect_args("clc", tokens, 0)?;
        Ok(pad_operands(arch, String::new()))
    }

    fn disassemble(&self, _arch: &Arch, _operands: &str) -> String {
        String::new()
    }

    fn simulate(&self, vm: &mut Interpreter, _operands: &str) -> Result<ExecuteState, RuntimeError> {
        vm.set_carry(false);
        vm.advance_pc();
        Ok(ExecuteState::Proceed)
    }

    fn generate(&self, arch: &Arch, _rng: &mut dyn RngCore) -> String {
        pad_operands(arch, String::new())
    }

    fn required_flags(&self) -> RunFlags {
        RunFlags::CARRY
    }

    fn abstract_assemble(
        &self,
        _arch: &Arch,
        _tokens: &[&str],
    ) -> Result<Vec<UsageNotify>, AsmError> {
        Ok(vec![UsageNotify::Opcode("clc")])
    }

    fn verilog_state_machine(&self, _arch: &Arch, _flavor: Flavor) -> String {
        let mut result = String::new();
        result += "\t\t\t\t\tCLC: begin\n";
        result += "\t\t\t\t\t\tcarryflag <= #1 'b0;\n";
        result += "\t\t\t\t\t\t$display(\"CLC\");\n";
        result += "\t\t\t\t\t\t_pc <= #1 _pc + 1'b1;\n";
        result += "\t\t\t\t\tend\n";
        result
    }
}
