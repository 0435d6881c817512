//! Register-to-register ALU instructions.
//!
//! All of these share one encoding shape (destination register first) and
//! one state-machine shape (register-wise sub-cases), so the handlers are
//! macro-generated.

use crate::arch::Arch;
use crate::bits::{register_name, fixed_bits};
use crate::error::{AsmError, RuntimeError};
use crate::interpreter::Interpreter;
use crate::op::{abstract_register, register_subcases};
use crate::opcode::{
    decode_field, expect_args, pad_operands, read_field, reg_field, Opcode, RunFlags, UsageNotify,
};
use crate::state::ExecuteState;
use crate::verilog::Flavor;
use rand::{Rng, RngCore};

macro_rules! alu_binary_op {
    (
        $(#[$docs:meta])*
        $Name:ident, $mnemonic:literal, $desc:literal,
        verilog: $vexpr:literal, carry: $carry:literal,
        |$a:ident, $b:ident, $mask:ident| $eval:expr
    ) => {
        $(#[$docs])*
        pub struct $Name;

        impl Opcode for $Name {
            fn name(&self) -> &'static str {
                $mnemonic
            }

            fn description(&self) -> &'static str {
                $desc
            }

            fn show_assembler(&self, arch: &Arch) -> String {
                format!(
                    "{} [{}(Reg)] [{}(Reg)]\t// {} [{}]\n",
                    $mnemonic,
                    arch.r,
                    arch.r,
                    $desc,
                    self.instruction_len(arch)
                )
            }

            fn instruction_len(&self, arch: &Arch) -> usize {
                arch.opcodes_bits() + 2 * arch.r as usize
            }

            fn assemble(&self, arch: &Arch, tokens: &[&str]) -> Result<String, AsmError> {
                expect_args($mnemonic, tokens, 2)?;
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

            fn simulate(
                &self,
                vm: &mut Interpreter,
                operands: &str,
            ) -> Result<ExecuteState, RuntimeError> {
                let r = vm.arch().r as usize;
                let ra = decode_field(vm, operands, 0, r)? as usize;
                let rb = decode_field(vm, operands, r, r)? as usize;
                let $mask = vm.arch().word_mask();
                let $a = vm.register(ra);
                let $b = vm.register(rb);
                let (value, carry): (u64, Option<bool>) = $eval;
                vm.set_register(ra, value);
                if let Some(flag) = carry {
                    vm.set_carry(flag);
                }
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

            fn required_flags(&self) -> RunFlags {
                if $carry {
                    RunFlags::CARRY
                } else {
                    RunFlags::empty()
                }
            }

            fn abstract_assemble(
                &self,
                _arch: &Arch,
                tokens: &[&str],
            ) -> Result<Vec<UsageNotify>, AsmError> {
                expect_args($mnemonic, tokens, 2)?;
                let a = abstract_register(tokens[0])?;
                let b = abstract_register(tokens[1])?;
                Ok(vec![
                    UsageNotify::Opcode($mnemonic),
                    UsageNotify::Registers(a.max(b) + 1),
                ])
            }

            fn verilog_state_machine(&self, arch: &Arch, _flavor: Flavor) -> String {
                let label = $mnemonic.to_uppercase();
                let mut result = String::new();
                result += &format!("\t\t\t\t\t{label}: begin\n");
                result += &register_subcases(arch, 0, 6, |a| {
                    register_subcases(arch, arch.r as usize, 8, |b| {
                        let rhs = format!($vexpr, a = a, b = b);
                        let lhs = if $carry {
                            format!("{{carryflag, _r{a}}}")
                        } else {
                            format!("_r{a}")
                        };
                        let mut body = String::new();
                        body += &format!("\t\t\t\t\t\t\t\t\t\t{lhs} <= #1 {rhs};\n");
                        body += &format!(
                            "\t\t\t\t\t\t\t\t\t\t$display(\"{label} R{a} R{b}\");\n"
                        );
                        body
                    })
                });
                result += "\t\t\t\t\t\t_pc <= #1 _pc + 1'b1;\n";
                result += "\t\t\t\t\tend\n";
                result
            }
        }
    };
}

macro_rules! alu_unary_op {
    (
        $(#[$docs:meta])*
        $Name:ident, $mnemonic:literal, $desc:literal,
        verilog: $vexpr:literal, carry: $carry:literal,
        |$a:ident, $mask:ident| $eval:expr
    ) => {
        $(#[$docs])*
        pub struct $Name;

        impl Opcode for $Name {
            fn name(&self) -> &'static str {
                $mnemonic
            }

            fn description(&self) -> &'static str {
                $desc
            }

            fn show_assembler(&self, arch: &Arch) -> String {
                format!(
                    "{} [{}(Reg)]\t// {} [{}]\n",
                    $mnemonic,
                    arch.r,
                    $desc,
                    self.instruction_len(arch)
                )
            }

            fn instruction_len(&self, arch: &Arch) -> usize {
                arch.opcodes_bits() + arch.r as usize
            }

            fn assemble(&self, arch: &Arch, tokens: &[&str]) -> Result<String, AsmError> {
                expect_args($mnemonic, tokens, 1)?;
                let fields = reg_field(arch, tokens[0])?;
                Ok(pad_operands(arch, fields))
            }

            fn disassemble(&self, arch: &Arch, operands: &str) -> String {
                match read_field(operands, 0, arch.r as usize) {
                    Some(a) => register_name(a as usize),
                    None => String::new(),
                }
            }

            fn simulate(
                &self,
                vm: &mut Interpreter,
                operands: &str,
            ) -> Result<ExecuteState, RuntimeError> {
                let r = vm.arch().r as usize;
                let ra = decode_field(vm, operands, 0, r)? as usize;
                let $mask = vm.arch().word_mask();
                let $a = vm.register(ra);
                let (value, carry): (u64, Option<bool>) = $eval;
                vm.set_register(ra, value);
                if let Some(flag) = carry {
                    vm.set_carry(flag);
                }
                vm.advance_pc();
                Ok(ExecuteState::Proceed)
            }

            fn generate(&self, arch: &Arch, rng: &mut dyn RngCore) -> String {
                let a = rng.gen_range(0..arch.registers()) as u64;
                let fields = fixed_bits(a, arch.r as usize);
                pad_operands(arch, fields)
            }

            fn required_flags(&self) -> RunFlags {
                if $carry {
                    RunFlags::CARRY
                } else {
                    RunFlags::empty()
                }
            }

            fn abstract_assemble(
                &self,
                _arch: &Arch,
                tokens: &[&str],
            ) -> Result<Vec<UsageNotify>, AsmError> {
                expect_args($mnemonic, tokens, 1)?;
                let a = abstract_register(tokens[0])?;
                Ok(vec![
                    UsageNotify::Opcode($mnemonic),
                    UsageNotify::Registers(a + 1),
                ])
            }

            fn verilog_state_machine(&self, arch: &Arch, _flavor: Flavor) -> String {
                let label = $mnemonic.to_uppercase();
                let mut result = String::new();
                result += &format!("\t\t\t\t\t{label}: begin\n");
                result += &register_subcases(arch, 0, 6, |a| {
                    let rhs = format!($vexpr, a = a);
                    let lhs = if $carry {
                        format!("{{carryflag, _r{a}}}")
                    } else {
                        format!("_r{a}")
                    };
                    let mut body = String::new();
                    body += &format!("\t\t\t\t\t\t\t\t{lhs} <= #1 {rhs};\n");
                    body += &format!("\t\t\t\t\t\t\t\t$display(\"{label} R{a}\");\n");
                    body
                });
                result += "\t\t\t\t\t\t_pc <= #1 _pc + 1'b1;\n";
                result += "\t\t\t\t\tend\n";
                result
            }
        }
    };
}

alu_binary_op!(
    /// Sum two registers into the first, carry out to the carry flag.
    Add, "add", "Sum two registers",
    verilog: "_r{a} + _r{b}", carry: true,
    |a, b, mask| {
        let sum = (a as u128) + (b as u128);
        ((sum as u64) & mask, Some(sum > mask as u128))
    }
);

alu_binary_op!(
    /// Subtract the second register from the first, borrow to the carry flag.
    Sub, "sub", "Subtract two registers",
    verilog: "_r{a} - _r{b}", carry: true,
    |a, b, mask| (a.wrapping_sub(b) & mask, Some(a < b))
);

alu_binary_op!(
    /// Bitwise AND into the first register.
    And, "and", "Bitwise AND of two registers",
    verilog: "_r{a} & _r{b}", carry: false,
    |a, b, _mask| (a & b, None)
);

alu_binary_op!(
    /// Bitwise OR into the first register.
    Or, "or", "Bitwise OR of two registers",
    verilog: "_r{a} | _r{b}", carry: false,
    |a, b, _mask| (a | b, None)
);

alu_binary_op!(
    /// Bitwise XOR into the first register.
    Xor, "xor", "Bitwise XOR of two registers",
    verilog: "_r{a} ^ _r{b}", carry: false,
    |a, b, _mask| (a ^ b, None)
);

alu_unary_op!(
    /// Increment a register, carry out to the carry flag.
    Inc, "inc", "Increment a register",
    verilog: "_r{a} + 1'b1", carry: true,
    |a, mask| {
        let sum = (a as u128) + 1;
        ((sum as u64) & mask, Some(sum > mask as u128))
    }
);

alu_unary_op!(
    /// Decrement a register, borrow to the carry flag.
    Dec, "dec", "Decrement a register",
    verilog: "_r{a} - 1'b1", carry: true,
    |a, mask| (a.wrapping_sub(1) & mask, Some(a == 0))
);

alu_unary_op!(
    /// Bitwise negation in place.
    Not, "not", "Bitwise negation of a register",
    verilog: "~_r{a}", carry: false,
    |a, mask| ((!a) & mask, None)
);
