//! The registered instruction handlers, one module per instruction family.

use crate::arch::Arch;
use crate::bits::{to_binary, zeros_prefix};
use crate::error::AsmError;

mod alu;
mod clc;
mod cpy;
mod hlt;
mod io;
mod jump;
mod mem;
mod nop;
mod rset;
mod shared;

pub use alu::{Add, And, Dec, Inc, Not, Or, Sub, Xor};
pub use clc::Clc;
pub use cpy::Cpy;
pub use hlt::Hlt;
pub use io::{I2r, R2o};
pub use jump::{J, Jc, Jz};
pub use mem::{M2r, R2m};
pub use nop::Nop;
pub use rset::Rset;
pub use shared::{R2s, S2r};

/// Verilog slice of the ROM word selecting the operand field at `start`
/// (bit offset inside the operand area) of the given width.
pub(crate) fn rom_slice(arch: &Arch, start: usize, width: usize) -> String {
    let hi = arch.max_word() - arch.opcodes_bits() - 1 - start;
    if width == 1 {
        format!("rom_value[{hi}]")
    } else {
        let lo = hi + 1 - width;
        format!("rom_value[{hi}:{lo}]")
    }
}

/// A `case` over an operand field at `start`, one arm per addressable
/// value, bodies produced by `body(index)` with lines already indented
/// deeper than the arm labels. Collapses to the single body when the field
/// has zero width.
pub(crate) fn field_subcases<F>(
    arch: &Arch,
    start: usize,
    width: usize,
    count: usize,
    label: &str,
    indent: usize,
    body: F,
) -> String
where
    F: Fn(usize) -> String,
{
    let tabs = "\t".repeat(indent);
    if width == 0 {
        return body(0);
    }
    let mut out = String::new();
    out.push_str(&format!("{tabs}case ({})\n", rom_slice(arch, start, width)));
    for i in 0..count {
        out.push_str(&format!(
            "{tabs}\t{}'b{} : begin // {}{}\n",
            width,
            zeros_prefix(width, &to_binary(i as u64)),
            label,
            i
        ));
        out.push_str(&body(i));
        out.push_str(&format!("{tabs}\tend\n"));
    }
    out.push_str(&format!("{tabs}endcase\n"));
    out
}

/// [`field_subcases`] over the register operand field at `start`.
pub(crate) fn register_subcases<F>(arch: &Arch, start: usize, indent: usize, body: F) -> String
where
    F: Fn(usize) -> String,
{
    field_subcases(
        arch,
        start,
        arch.r as usize,
        arch.registers(),
        "R",
        indent,
        body,
    )
}

/// Register index named by a token, unbounded by any architecture; used by
/// `abstract_assemble` to size register files.
pub(crate) fn abstract_register(token: &str) -> Result<usize, AsmError> {
    let err = || AsmError::UnknownRegister(token.to_string());
    let digits = token.strip_prefix('r').ok_or_else(err)?;
    if digits.is_empty() || digits.chars().any(|c| !c.is_ascii_digit()) {
        return Err(err());
    }
    digits.parse().map_err(|_| err())
}
