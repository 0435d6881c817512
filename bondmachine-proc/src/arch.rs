//! Parametric processor architecture descriptor.

use crate::bits::bits_needed;
use crate::error::ArchError;
use crate::opcode::{catalog, Opcode};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Execution model of the processor.
///
/// The string forms `ha`, `vn`, `hy` are the ones used in serialized
/// machines and on the tooling surface.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    Serialize,
    Deserialize,
)]
pub enum ExecMode {
    /// Separate program and data memories.
    #[strum(serialize = "ha")]
    #[serde(rename = "ha")]
    Harvard,
    /// Program and data share one memory.
    #[strum(serialize = "vn")]
    #[serde(rename = "vn")]
    VonNeumann,
    /// Both address spaces available.
    #[strum(serialize = "hy")]
    #[serde(rename = "hy")]
    Hybrid,
}

/// The enabled opcode handlers of an architecture.
///
/// Unique by name and kept sorted by name; the position of a handler is its
/// numeric opcode. Serializes as the list of names and resolves against the
/// process-wide catalog on load, failing on unknown names.
#[derive(Clone, Default)]
pub struct OpcodeSet(Vec<&'static dyn Opcode>);

impl OpcodeSet {
    /// Builds a set from handler references, sorting by name and rejecting
    /// duplicates.
    pub fn new(mut ops: Vec<&'static dyn Opcode>) -> Result<Self, ArchError> {
        ops.sort_by_key(|op| op.name());
        for pair in ops.windows(2) {
            if pair[0].name() == pair[1].name() {
                return Err(ArchError::DuplicateOpcode(pair[0].name().to_string()));
            }
        }
        Ok(OpcodeSet(ops))
    }

    /// Resolves a list of mnemonics against the catalog.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, ArchError> {
        let ops = names
            .iter()
            .map(|name| {
                catalog::lookup(name.as_ref())
                    .ok_or_else(|| ArchError::UnknownOpcode(name.as_ref().to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(ops)
    }

    /// Numeric opcode of a mnemonic, if enabled.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|op| op.name() == name)
    }

    /// Handler at a numeric opcode.
    pub fn get(&self, index: usize) -> Option<&'static dyn Opcode> {
        self.0.get(index).copied()
    }

    /// Enabled handlers in opcode order.
    pub fn iter(&self) -> impl Iterator<Item = &'static dyn Opcode> + '_ {
        self.0.iter().copied()
    }

    /// Enabled opcode count.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no opcode is enabled.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for OpcodeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.0.iter().map(|op| op.name()))
            .finish()
    }
}

impl PartialEq for OpcodeSet {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(other.0.iter())
                .all(|(a, b)| a.name() == b.name())
    }
}

impl Serialize for OpcodeSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter().map(|op| op.name()))
    }
}

impl<'de> Deserialize<'de> for OpcodeSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let names = Vec::<String>::deserialize(deserializer)?;
        OpcodeSet::from_names(&names).map_err(D::Error::custom)
    }
}

/// Parametric description of one processor's shape and its enabled opcodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Arch {
    /// Bits per register; the same width is used for RAM cells, I/O ports
    /// and ALU operands. Valid range 1..=64.
    pub rsize: u8,
    /// Log2 of the register count.
    pub r: u8,
    /// Log2 of the RAM cell count.
    pub l: u8,
    /// Log2 of the ROM cell count, i.e. the program-address width.
    pub o: u8,
    /// Input port count.
    pub n: u8,
    /// Output port count.
    pub m: u8,
    /// Supported execution models.
    pub modes: Vec<ExecMode>,
    /// Enabled opcode handlers, sorted by name.
    pub op: OpcodeSet,
    /// Declared shared-object bindings, by object kind; the position of an
    /// entry is the object id addressed by shared opcodes.
    pub shared_constraints: Vec<String>,
}

impl Default for Arch {
    fn default() -> Self {
        Arch {
            rsize: 8,
            r: 3,
            l: 8,
            o: 8,
            n: 1,
            m: 1,
            modes: vec![ExecMode::Harvard],
            op: OpcodeSet::default(),
            shared_constraints: Vec::new(),
        }
    }
}

impl Arch {
    /// Bits of the opcode prefix: enough to address every enabled opcode.
    pub fn opcodes_bits(&self) -> usize {
        bits_needed(self.op.len())
    }

    /// Bit width of every instruction: the maximum handler length. Every
    /// encoding is zero-padded on the right to this width.
    pub fn max_word(&self) -> usize {
        self.op
            .iter()
            .map(|op| op.instruction_len(self))
            .max()
            .unwrap_or_else(|| self.opcodes_bits())
    }

    /// Register count, `2^R`.
    pub fn registers(&self) -> usize {
        1 << self.r
    }

    /// RAM cell count, `2^L`.
    pub fn ram_cells(&self) -> usize {
        1 << self.l
    }

    /// ROM cell count, `2^O`; the program capacity.
    pub fn rom_cells(&self) -> usize {
        1 << self.o
    }

    /// Input port count.
    pub fn inputs(&self) -> usize {
        self.n as usize
    }

    /// Output port count.
    pub fn outputs(&self) -> usize {
        self.m as usize
    }

    /// Mask selecting the low `rsize` bits of a word.
    pub fn word_mask(&self) -> u64 {
        if self.rsize >= 64 {
            u64::MAX
        } else {
            (1u64 << self.rsize) - 1
        }
    }

    /// Width of an input-port index field.
    pub fn input_bits(&self) -> usize {
        bits_needed(self.inputs())
    }

    /// Width of an output-port index field.
    pub fn output_bits(&self) -> usize {
        bits_needed(self.outputs())
    }

    /// Width of a shared-object id field.
    pub fn shared_bits(&self) -> usize {
        bits_needed(self.shared_constraints.len())
    }

    /// The execution mode a simulation runs under: the first declared mode.
    pub fn exec_mode(&self) -> Option<ExecMode> {
        self.modes.first().copied()
    }

    /// Parses a comma-separated mode list, e.g. `ha` or `ha,vn`.
    pub fn parse_modes(text: &str) -> Result<Vec<ExecMode>, ArchError> {
        text.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| ExecMode::from_str(s).map_err(|_| ArchError::UnknownMode(s.to_string())))
            .collect()
    }

    /// Verifies the declarative constraints, producing one trace line per
    /// rule. Violations are reported, not thrown, so callers can choose to
    /// proceed or not.
    pub fn constraint_check(&self) -> ConstraintReport {
        let mut report = ConstraintReport::default();

        report.rule(
            (1..=64).contains(&self.rsize),
            format!("register size {} within 1..=64", self.rsize),
        );
        report.rule(!self.modes.is_empty(), "at least one execution mode".into());
        report.rule(
            self.op.len() <= 1 << self.opcodes_bits(),
            format!(
                "{} opcodes addressable by {} opcode bits",
                self.op.len(),
                self.opcodes_bits()
            ),
        );

        for op in self.op.iter() {
            for mode in op.required_modes() {
                report.rule(
                    self.modes.contains(mode),
                    format!("{} requires execution mode {}", op.name(), mode),
                );
            }
            for mode in op.forbidden_modes() {
                report.rule(
                    !self.modes.contains(mode),
                    format!("{} forbids execution mode {}", op.name(), mode),
                );
            }
            for kind in op.required_shared() {
                report.rule(
                    self.shared_constraints.iter().any(|c| c == kind),
                    format!("{} requires a shared {}", op.name(), kind),
                );
            }
        }

        report
    }
}

/// Outcome of a constraint check: one line per rule, pass or fail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstraintReport {
    lines: Vec<String>,
    failures: usize,
}

impl ConstraintReport {
    pub(crate) fn rule(&mut self, pass: bool, what: String) {
        if pass {
            self.lines.push(format!("PASS {what}"));
        } else {
            self.failures += 1;
            self.lines.push(format!("FAIL {what}"));
        }
    }

    pub(crate) fn absorb(&mut self, other: ConstraintReport) {
        self.failures += other.failures;
        self.lines.extend(other.lines);
    }

    /// Whether every rule passed.
    pub fn ok(&self) -> bool {
        self.failures == 0
    }

    /// Trace lines, one per rule.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl fmt::Display for ConstraintReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arch_with(names: &[&str]) -> Arch {
        Arch {
            op: OpcodeSet::from_names(names).unwrap(),
            ..Arch::default()
        }
    }

    #[test]
    fn opcode_bits_grow_with_the_set() {
        assert_eq!(arch_with(&[]).opcodes_bits(), 0);
        assert_eq!(arch_with(&["nop"]).opcodes_bits(), 0);
        assert_eq!(arch_with(&["nop", "clc"]).opcodes_bits(), 1);
        assert_eq!(arch_with(&["nop", "clc", "jz"]).opcodes_bits(), 2);
    }

    #[test]
    fn opcode_set_is_sorted_and_unique() {
        let set = OpcodeSet::from_names(&["jz", "clc", "nop"]).unwrap();
        let names: Vec<_> = set.iter().map(|op| op.name()).collect();
        assert_eq!(names, ["clc", "jz", "nop"]);
        assert_eq!(set.index_of("jz"), Some(1));

        assert!(matches!(
            OpcodeSet::from_names(&["clc", "clc"]),
            Err(ArchError::DuplicateOpcode(_))
        ));
        assert!(matches!(
            OpcodeSet::from_names(&["quux"]),
            Err(ArchError::UnknownOpcode(_))
        ));
    }

    #[test]
    fn max_word_is_the_longest_handler() {
        // jz = 2 opcode bits + 3 register bits + 8 address bits.
        let arch = arch_with(&["nop", "clc", "jz"]);
        assert_eq!(arch.max_word(), 13);
    }

    #[test]
    fn mode_strings() {
        assert_eq!(Arch::parse_modes("ha,vn").unwrap().len(), 2);
        assert!(Arch::parse_modes("qq").is_err());
        assert_eq!(ExecMode::Harvard.to_string(), "ha");
    }

    #[test]
    fn constraint_trace_reports_shared_requirements() {
        let mut arch = arch_with(&["s2r", "r2s", "nop"]);
        let report = arch.constraint_check();
        assert!(!report.ok());
        assert!(report.lines().iter().any(|l| l.starts_with("FAIL")));

        arch.shared_constraints.push("channel".to_string());
        assert!(arch.constraint_check().ok());
    }
}
