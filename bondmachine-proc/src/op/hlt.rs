use crate::arch::Arch;
use crate::error::{AsmError, RuntimeError};
use crate::interpreter::Interpreter;
use crate::opcode::{expect_args, pad_operands, Opcode, UsageNotify};
use crate::state::ExecuteState;
use crate::verilog::Flavor;
use rand::RngCore;

/// Halt: parks the processor, program counter frozen.
pub struct Hlt;

impl Opcode for Hlt {
    fn name(&self) -> &'static str {
        "hlt"
    }

    fn description(&self) -> &'static str {
        "Halt the processor"
    }

    fn show_assembler(&self, arch: &Arch) -> String {
        format!(
            "hlt\t// Halt the processor [{}]\n",
            self.instruction_len(arch)
        )
    }

    fn instruction_len(&self, arch: &Arch) -> usize {
        arch.opcodes_bits()
    }

    fn assemble(&self, arch: &Arch, tokens: &[&str]) -> Result<String, AsmError> {
        expect_args("hlt", tokens, 0)?;
        Ok(pad_operands(arch, String::new()))
    }

    fn disassemble(&self, _arch: &Arch, _operands: &str) -> String {
        String::new()
    }

    fn simulate(
        &self,
        _vm: &mut Interpreter,
        _operands: &str,
    ) -> Result<ExecuteState, RuntimeError> {
        Ok(ExecuteState::Halt)
    }

    fn generate(&self, arch: &Arch, _rng: &mut dyn RngCore) -> String {
        pad_operands(arch, String::new())
    }

    fn abstract_assemble(
        &self,
        _arch: &Arch,
        _tokens: &[&str],
    ) -> Result<Vec<UsageNotify>, AsmError> {
        Ok(vec![UsageNotify::Opcode("hlt")])
    }

    fn verilog_state_machine(&self, _arch: &Arch, _flavor: Flavor) -> String {
        // The state machine holds: no assignment to _pc keeps the FSM parked.
        let mut result = String::new();
        result += "\t\t\t\t\tHLT: begin\n";
        result += "\t\t\t\t\t\t$display(\"HLT\");\n";
        result += "\t\t\t\t\tend\n";
        result
    }
}
