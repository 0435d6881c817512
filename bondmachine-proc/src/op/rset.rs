use crate::arch::Arch;
use crate::bits::{register_name, fixed_bits};
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

/// Load an immediate value into a register.
pub struct Rset;

impl Opcode for Rset {
    fn name(&self) -> &'static str {
        "rset"
    }

    fn description(&self) -> &'static str {
        "Set a register to an immediate value"
    }

    fn show_assembler(&self, arch: &Arch) -> String {
        format!(
            "rset [{}(Reg)] [{}(Value)]\t// Set a register to an immediate value [{}]\n",
            arch.r,
            arch.rsize,
            self.instruction_len(arch)
        )
    }

    fn instruction_len(&self, arch: &Arch) -> usize {
        arch.opcodes_bits() + arch.r as usize + arch.rsize as usize
    }

    fn assemble(&self, arch: &Arch, tokens: &[&str]) -> Result<String, AsmError> {
        expect_args("rset", tokens, 2)?;
        let mut fields = reg_field(arch, tokens[0])?;
        fields += &literal_field(arch, tokens[1], arch.rsize as usize)?;
        Ok(pad_operands(arch, fields))
    }

    fn disassemble(&self, arch: &Arch, operands: &str) -> String {
        let r = arch.r as usize;
        match (
            read_field(operands, 0, r),
            read_field(operands, r, arch.rsize as usize),
        ) {
            (Some(a), Some(value)) => format!("{} {}", register_name(a as usize), value),
            _ => String::new(),
        }
    }

    fn simulate(&self, vm: &mut Interpreter, operands: &str) -> Result<ExecuteState, RuntimeError> {
        let r = vm.arch().r as usize;
        let rsize = vm.arch().rsize as usize;
        let ra = decode_field(vm, operands, 0, r)? as usize;
        let value = decode_field(vm, operands, r, rsize)?;
        vm.set_register(ra, value);
        vm.advance_pc();
        Ok(ExecuteState::Proceed)
    }

    fn generate(&self, arch: &Arch, rng: &mut dyn RngCore) -> String {
        let a = rng.gen_range(0..arch.registers()) as u64;
        let value = rng.next_u64() & arch.word_mask();
        let mut fields = fixed_bits(a, arch.r as usize);
        fields += &fixed_bits(value, arch.rsize as usize);
        pad_operands(arch, fields)
    }

    fn abstract_assemble(
        &self,
        _arch: &Arch,
        tokens: &[&str],
    ) -> Result<Vec<UsageNotify>, AsmError> {
        expect_args("rset", tokens, 2)?;
        let a = abstract_register(tokens[0])?;
        Ok(vec![
            UsageNotify::Opcode("rset"),
            UsageNotify::Registers(a + 1),
        ])
    }

    fn verilog_state_machine(&self, arch: &Arch, _flavor: Flavor) -> String {
        let value = rom_slice(arch, arch.r as usize, arch.rsize as usize);
        let mut result = String::new();
        result += "\t\t\t\t\tRSET: begin\n";
        result += &register_subcases(arch, 0, 6, |a| {
            let mut body = String::new();
            body += &format!("\t\t\t\t\t\t\t\t_r{a} <= #1 {value};\n");
            body += &format!("\t\t\t\t\t\t\t\t$display(\"RSET R{a} \", {value});\n");
            body
        });
        result += "\t\t\t\t\t\t_pc <= #1 _pc + 1'b1;\n";
        result += "\t\t\t\t\tend\n";
        result
    }
}
