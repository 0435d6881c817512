//! Step outcome representation.

/// Resulting state of a single instruction step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExecuteState {
    /// The VM should proceed normally with the execution.
    #[default]
    Proceed,
    /// A `hlt` instruction parked the VM; the program counter is frozen.
    Halt,
}

impl ExecuteState {
    /// Whether the VM should keep stepping.
    pub const fn should_continue(&self) -> bool {
        matches!(self, Self::Proceed)
    }
}
