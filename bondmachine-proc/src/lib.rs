//! Parametric processor toolkit: architecture description, an extensible
//! opcode catalog, an assembler/disassembler, a cycle-accurate simulator
//! and a Verilog emitter.
//!
//! The flow mirrors the tooling on top: describe an [`arch::Arch`],
//! assemble a program against it into a [`machine::Machine`], run it on an
//! [`interpreter::Interpreter`] under a simbox schedule, and emit the
//! synthesizable rendition with [`verilog::Emitter`].

#![warn(missing_docs)]

pub mod arch;
pub mod asm;
pub mod bits;
pub mod error;
pub mod interpreter;
pub mod machine;
pub mod op;
pub mod opcode;
pub mod sim;
pub mod state;
pub mod verilog;

pub mod prelude {
    //! Convenience re-exports of the toolkit surface.

    pub use crate::arch::{Arch, ConstraintReport, ExecMode, OpcodeSet};
    pub use crate::asm::optimize_opcodes;
    pub use crate::error::{ArchError, AsmError, RuntimeError, SimError, SlotError};
    pub use crate::interpreter::Interpreter;
    pub use crate::machine::{Machine, Program};
    pub use crate::opcode::{catalog, Opcode, RunFlags, UsageNotify, VerilogModule};
    pub use crate::sim::{simulate, Sample, SimConfig, SimDrive, SimReport};
    pub use crate::state::ExecuteState;
    pub use crate::verilog::{EmitConfig, Emitter, Flavor, Target};

    pub use bondmachine_simbox::{Simbox, Slot, SlotKind, SlotSite};
}
