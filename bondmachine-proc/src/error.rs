//! Error types of the processor toolkit.

/// Architecture configuration errors. Fatal before any emission or execution.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ArchError {
    /// An opcode name has no handler in the catalog.
    #[error("unknown opcode {0}")]
    UnknownOpcode(String),
    /// The same mnemonic was enabled twice.
    #[error("duplicate opcode {0}")]
    DuplicateOpcode(String),
    /// More opcodes than the opcode field can address.
    #[error("opcode set of {count} exceeds the {capacity} encodable opcodes")]
    TooManyOpcodes {
        /// Enabled opcode count.
        count: usize,
        /// `2^opcodes_bits`.
        capacity: usize,
    },
    /// No execution mode was declared.
    #[error("architecture declares no execution mode")]
    NoMode,
    /// A mode string wasn't one of `ha`, `vn`, `hy`.
    #[error("unknown execution mode {0}")]
    UnknownMode(String),
    /// A Verilog flavor string names no known target.
    #[error("unknown verilog flavor {0}")]
    UnknownFlavor(String),
    /// Register width outside the supported range.
    #[error("register size {0} is outside 1..=64")]
    BadRegisterSize(u8),
}

/// Assembly and disassembly errors, reported with the offending token.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AsmError {
    /// Token 0 of a line is not an enabled mnemonic.
    #[error("unknown mnemonic {0}")]
    UnknownMnemonic(String),
    /// Operand count doesn't match the instruction template.
    #[error("{mnemonic} takes {expected} operands, got {got}")]
    WrongArgumentCount {
        /// The mnemonic.
        mnemonic: &'static str,
        /// Operands the template declares.
        expected: usize,
        /// Operands on the source line.
        got: usize,
    },
    /// A register token is not a canonical name of this architecture.
    #[error("unknown register name {0}")]
    UnknownRegister(String),
    /// A literal was not decimal, `0x…` hex, or `0b…` binary.
    #[error("unparsable literal {0}")]
    BadLiteral(String),
    /// A literal doesn't fit in its operand field.
    #[error("value {value} overflows the {width}-bit field")]
    FieldOverflow {
        /// Parsed value.
        value: u64,
        /// Field width in bits.
        width: usize,
    },
    /// No opcode is enabled, so nothing can be assembled or generated.
    #[error("the architecture enables no opcodes")]
    EmptyOpcodeSet,
    /// The program doesn't fit in `2^O` ROM cells.
    #[error("program of {len} instructions exceeds the {capacity} ROM cells")]
    ProgramTooLong {
        /// Instruction count.
        len: usize,
        /// `2^O`.
        capacity: usize,
    },
    /// A stored word doesn't decode to any enabled opcode.
    #[error("word at address {address} has no valid opcode prefix")]
    UnknownEncoding {
        /// Zero-based instruction address.
        address: usize,
    },
    /// A stored word has the wrong width or stray characters.
    #[error("word at address {address} is not a {width}-bit binary string")]
    MalformedWord {
        /// Zero-based instruction address.
        address: usize,
        /// Expected width (`max_word`).
        width: usize,
    },
    /// Error context: the source line the error occurred on.
    #[error("line {line}: {source}")]
    AtLine {
        /// One-based source line.
        line: usize,
        /// The underlying error.
        #[source]
        source: Box<AsmError>,
    },
}

impl AsmError {
    /// Attaches a one-based source line to the error.
    pub fn at_line(self, line: usize) -> Self {
        AsmError::AtLine {
            line,
            source: Box::new(self),
        }
    }
}

/// Fatal VM errors, surfaced from `step`.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RuntimeError {
    /// The program counter points past the loaded program.
    #[error("program counter {pc} is outside the {len}-instruction program")]
    PcOutOfProgram {
        /// Current program counter.
        pc: usize,
        /// Program length.
        len: usize,
    },
    /// The fetched word decodes to an opcode index with no handler.
    #[error("opcode index {index} has no handler (enabled opcodes: {count})")]
    InvalidOpcode {
        /// Decoded opcode index.
        index: usize,
        /// Enabled opcode count.
        count: usize,
    },
    /// The fetched word is shorter than the handler expects.
    #[error("word at {pc} is too short for its opcode")]
    ShortWord {
        /// Current program counter.
        pc: usize,
    },
    /// An I/O port index decoded from an instruction doesn't exist.
    #[error("no {direction} port {index}")]
    NoSuchPort {
        /// `input` or `output`.
        direction: &'static str,
        /// Decoded port index.
        index: usize,
    },
    /// A shared-object id decoded from an instruction is not bound.
    #[error("shared object {index} is not bound (constraints: {count})")]
    UnboundShared {
        /// Decoded object id.
        index: usize,
        /// Declared shared constraints.
        count: usize,
    },
}

/// Slot addressing errors of the injectable/reportable surface.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SlotError {
    /// The slot index is outside the machine's shape.
    #[error("slot {slot} is out of range (limit {limit})")]
    OutOfRange {
        /// Offending slot key.
        slot: String,
        /// Exclusive upper bound for this kind.
        limit: usize,
    },
    /// The slot kind is read-only.
    #[error("slot {0} is not injectable")]
    NotInjectable(String),
    /// The slot names a domain this VM doesn't hold.
    #[error("slot {0} addresses a foreign domain")]
    ForeignDomain(String),
}

/// Simulation harness errors.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// Simbox document error.
    #[error(transparent)]
    Simbox(#[from] bondmachine_simbox::SimboxError),
    /// A rule addresses a slot this machine doesn't have.
    #[error(transparent)]
    Slot(#[from] SlotError),
    /// The VM died mid-simulation.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
