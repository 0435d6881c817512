//! The cycle-accurate single-processor VM.
//!
//! One call to [`Interpreter::step`] executes exactly one instruction:
//! fetch the word at the program counter, decode the opcode prefix, and
//! dispatch to the handler, which mutates state and advances the program
//! counter exactly once. Per-processor state is owned exclusively by the
//! interpreter; cross-processor visibility exists only through the fabric
//! layer.

use crate::arch::Arch;
use crate::bits::field_value;
use crate::error::{RuntimeError, SlotError};
use crate::machine::Machine;
use crate::state::ExecuteState;
use bondmachine_simbox::SlotKind;
use itertools::Itertools;

/// VM state for one processor: program counter, register file, RAM, I/O
/// ports, carry flag and shared-channel slots, plus the read-only machine
/// it executes.
#[derive(Debug, Clone, PartialEq)]
pub struct Interpreter {
    machine: Machine,
    pc: usize,
    registers: Vec<u64>,
    ram: Vec<u64>,
    inputs: Vec<u64>,
    outputs: Vec<u64>,
    shared: Vec<u64>,
    carry: bool,
    halted: bool,
}

impl Interpreter {
    /// Allocates zeroed state for a machine. The allocation happens once;
    /// stepping never allocates per-processor state.
    pub fn new(machine: Machine) -> Self {
        let arch = &machine.arch;
        let registers = vec![0; arch.registers()];
        let ram = vec![0; arch.ram_cells()];
        let inputs = vec![0; arch.inputs()];
        let outputs = vec![0; arch.outputs()];
        let shared = vec![0; arch.shared_constraints.len()];
        Interpreter {
            machine,
            pc: 0,
            registers,
            ram,
            inputs,
            outputs,
            shared,
            carry: false,
            halted: false,
        }
    }

    /// The machine under execution.
    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    /// The architecture of the machine under execution.
    pub fn arch(&self) -> &Arch {
        &self.machine.arch
    }

    /// Zeroes all state and unparks the VM; the machine is kept.
    pub fn reset(&mut self) {
        self.pc = 0;
        self.registers.iter_mut().for_each(|r| *r = 0);
        self.ram.iter_mut().for_each(|c| *c = 0);
        self.inputs.iter_mut().for_each(|p| *p = 0);
        self.outputs.iter_mut().for_each(|p| *p = 0);
        self.shared.iter_mut().for_each(|s| *s = 0);
        self.carry = false;
        self.halted = false;
    }

    /// Executes one tick. A parked VM stays parked and reports
    /// [`ExecuteState::Halt`].
    pub fn step(&mut self) -> Result<ExecuteState, RuntimeError> {
        if self.halted {
            return Ok(ExecuteState::Halt);
        }

        let len = self.machine.program.slocs.len();
        let sloc = self
            .machine
            .program
            .slocs
            .get(self.pc)
            .ok_or(RuntimeError::PcOutOfProgram { pc: self.pc, len })?
            .clone();

        let opbits = self.machine.arch.opcodes_bits();
        let index = sloc
            .get(..opbits)
            .and_then(field_value)
            .ok_or(RuntimeError::ShortWord { pc: self.pc })? as usize;
        let op = self
            .machine
            .arch
            .op
            .get(index)
            .ok_or(RuntimeError::InvalidOpcode {
                index,
                count: self.machine.arch.op.len(),
            })?;

        tracing::trace!(pc = self.pc, op = op.name(), "step");

        let operands = sloc[opbits..].to_string();
        let state = op.simulate(self, &operands)?;
        if state == ExecuteState::Halt {
            self.halted = true;
        }
        Ok(state)
    }

    /// Whether a `hlt` parked the VM.
    pub fn halted(&self) -> bool {
        self.halted
    }

    /// Current program counter.
    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Jump: used by the jump handlers, which own the wrap policy.
    pub fn set_pc(&mut self, pc: usize) {
        self.pc = pc % self.machine.arch.rom_cells();
    }

    /// The default advance, `pc + 1 mod 2^O`.
    pub fn advance_pc(&mut self) {
        self.pc = (self.pc + 1) % self.machine.arch.rom_cells();
    }

    /// Register value. Register indices decoded from instructions are in
    /// range by construction.
    pub fn register(&self, index: usize) -> u64 {
        self.registers[index]
    }

    /// Writes a register, masked to the register width.
    pub fn set_register(&mut self, index: usize, value: u64) {
        self.registers[index] = value & self.machine.arch.word_mask();
    }

    /// The register file.
    pub fn registers(&self) -> &[u64] {
        &self.registers
    }

    /// RAM cell value.
    pub fn ram(&self, address: usize) -> u64 {
        self.ram[address]
    }

    /// Writes a RAM cell, masked to the cell width.
    pub fn set_ram(&mut self, address: usize, value: u64) {
        self.ram[address] = value & self.machine.arch.word_mask();
    }

    /// Input port value; ports beyond the architecture's `N` don't exist.
    pub fn input(&self, port: usize) -> Result<u64, RuntimeError> {
        self.inputs
            .get(port)
            .copied()
            .ok_or(RuntimeError::NoSuchPort {
                direction: "input",
                index: port,
            })
    }

    /// Drives an input port, masked to the port width.
    pub fn set_input(&mut self, port: usize, value: u64) -> Result<(), RuntimeError> {
        let mask = self.machine.arch.word_mask();
        match self.inputs.get_mut(port) {
            Some(slot) => {
                *slot = value & mask;
                Ok(())
            }
            None => Err(RuntimeError::NoSuchPort {
                direction: "input",
                index: port,
            }),
        }
    }

    /// Output port value.
    pub fn output(&self, port: usize) -> Result<u64, RuntimeError> {
        self.outputs
            .get(port)
            .copied()
            .ok_or(RuntimeError::NoSuchPort {
                direction: "output",
                index: port,
            })
    }

    /// Writes an output port, masked to the port width.
    pub fn set_output(&mut self, port: usize, value: u64) -> Result<(), RuntimeError> {
        let mask = self.machine.arch.word_mask();
        match self.outputs.get_mut(port) {
            Some(slot) => {
                *slot = value & mask;
                Ok(())
            }
            None => Err(RuntimeError::NoSuchPort {
                direction: "output",
                index: port,
            }),
        }
    }

    /// The output ports.
    pub fn outputs(&self) -> &[u64] {
        &self.outputs
    }

    /// Shared-channel value; ids index the architecture's shared
    /// constraints.
    pub fn shared(&self, id: usize) -> Result<u64, RuntimeError> {
        self.shared
            .get(id)
            .copied()
            .ok_or(RuntimeError::UnboundShared {
                index: id,
                count: self.shared.len(),
            })
    }

    /// Writes a shared channel, masked to the channel width.
    pub fn set_shared(&mut self, id: usize, value: u64) -> Result<(), RuntimeError> {
        let mask = self.machine.arch.word_mask();
        let count = self.shared.len();
        match self.shared.get_mut(id) {
            Some(slot) => {
                *slot = value & mask;
                Ok(())
            }
            None => Err(RuntimeError::UnboundShared { index: id, count }),
        }
    }

    /// The shared-channel values.
    pub fn shared_values(&self) -> &[u64] {
        &self.shared
    }

    /// Carry flag.
    pub fn carry(&self) -> bool {
        self.carry
    }

    /// Sets or clears the carry flag.
    pub fn set_carry(&mut self, carry: bool) {
        self.carry = carry;
    }

    /// Reads a reportable slot by kind and local index.
    pub fn read_slot(&self, kind: SlotKind, index: usize) -> Result<u64, SlotError> {
        let out_of_range = |limit: usize| SlotError::OutOfRange {
            slot: format!("{kind}.{index}"),
            limit,
        };
        match kind {
            SlotKind::Pc => Ok(self.pc as u64),
            SlotKind::Register => self
                .registers
                .get(index)
                .copied()
                .ok_or_else(|| out_of_range(self.registers.len())),
            SlotKind::Ram => self
                .ram
                .get(index)
                .copied()
                .ok_or_else(|| out_of_range(self.ram.len())),
            SlotKind::Input => self
                .inputs
                .get(index)
                .copied()
                .ok_or_else(|| out_of_range(self.inputs.len())),
            SlotKind::Output => self
                .outputs
                .get(index)
                .copied()
                .ok_or_else(|| out_of_range(self.outputs.len())),
        }
    }

    /// Writes an injectable slot by kind and local index. Only input ports
    /// and RAM cells are writable from the outside.
    pub fn write_slot(&mut self, kind: SlotKind, index: usize, value: u64) -> Result<(), SlotError> {
        if !kind.is_injectable() {
            return Err(SlotError::NotInjectable(format!("{kind}.{index}")));
        }
        let mask = self.machine.arch.word_mask();
        let (slot, limit) = match kind {
            SlotKind::Input => (self.inputs.get_mut(index), self.machine.arch.inputs()),
            SlotKind::Ram => (self.ram.get_mut(index), self.machine.arch.ram_cells()),
            _ => unreachable!("is_injectable covers the kinds"),
        };
        match slot {
            Some(cell) => {
                *cell = value & mask;
                Ok(())
            }
            None => Err(SlotError::OutOfRange {
                slot: format!("{kind}.{index}"),
                limit,
            }),
        }
    }

    /// One-line register dump for the simulation loop.
    pub fn dump_registers(&self) -> String {
        self.registers
            .iter()
            .enumerate()
            .map(|(i, v)| format!("r{i}:{v}"))
            .join(" ")
    }

    /// One-line I/O dump for the simulation loop.
    pub fn dump_io(&self) -> String {
        format!(
            "in:[{}] out:[{}]",
            self.inputs.iter().join(" "),
            self.outputs.iter().join(" ")
        )
    }
}
