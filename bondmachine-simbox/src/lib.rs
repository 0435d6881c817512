//! Simulation stimulus and observation documents.
//!
//! A simbox is the declarative schedule that drives a simulation: which VM
//! slots get written at which ticks, which get sampled, and which get printed,
//! either at absolute ticks or periodically. The document is JSON at the
//! boundary and is shared between the single-processor simulator and the
//! fabric simulator.

#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Errors raised while loading or validating a simbox document.
#[derive(Debug, thiserror::Error)]
pub enum SimboxError {
    /// The document isn't valid JSON or doesn't match the schema.
    #[error("malformed simbox document: {0}")]
    Json(#[from] serde_json::Error),
    /// A slot key couldn't be parsed.
    #[error("malformed slot key: {0}")]
    BadSlot(String),
    /// A `set` rule is missing its value.
    #[error("set rule for slot {0} has no value")]
    MissingValue(Slot),
    /// A periodic rule with period zero would never be scheduled.
    #[error("periodic rule for slot {0} has period 0")]
    ZeroPeriod(Slot),
}

/// Where a slot lives: attached to a fabric domain, or fabric-external.
///
/// A bare machine simulation uses domain 0 for all of its slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SlotSite {
    /// Slot of the domain with the given id.
    Domain(usize),
    /// Fabric-external slot.
    External,
}

/// The kind of VM state a slot addresses.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum SlotKind {
    /// An input port. Writable.
    Input,
    /// An output port. Read-only.
    Output,
    /// A general-purpose register. Read-only.
    Register,
    /// A RAM cell. Writable.
    Ram,
    /// The program counter. Read-only; carries no index.
    Pc,
}

impl SlotKind {
    /// Whether a driver may inject into this kind of slot.
    pub const fn is_injectable(&self) -> bool {
        matches!(self, SlotKind::Input | SlotKind::Ram)
    }
}

/// A stable textual key into VM state, like `d0.input.2` or `ext.output.1`.
///
/// The grammar is `d<N>.<kind>.<index>` for domain-attached slots and
/// `ext.<kind>.<index>` for fabric-external ones; `pc` takes no index
/// (`d0.pc`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slot {
    /// Owning site.
    pub site: SlotSite,
    /// Addressed state kind.
    pub kind: SlotKind,
    /// Port, register or cell index. Always 0 for `pc`.
    pub index: usize,
}

impl Slot {
    /// Slot of a domain-attached site.
    pub const fn domain(id: usize, kind: SlotKind, index: usize) -> Self {
        Slot {
            site: SlotSite::Domain(id),
            kind,
            index,
        }
    }

    /// Fabric-external slot.
    pub const fn external(kind: SlotKind, index: usize) -> Self {
        Slot {
            site: SlotSite::External,
            kind,
            index,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.site {
            SlotSite::Domain(id) => write!(f, "d{}.{}", id, self.kind)?,
            SlotSite::External => write!(f, "ext.{}", self.kind)?,
        }
        if !matches!(self.kind, SlotKind::Pc) {
            write!(f, ".{}", self.index)?;
        }
        Ok(())
    }
}

impl FromStr for Slot {
    type Err = SimboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || SimboxError::BadSlot(s.to_string());
        let mut parts = s.split('.');

        let site = match parts.next().ok_or_else(bad)? {
            "ext" => SlotSite::External,
            d if d.starts_with('d') => {
                let id = d[1..].parse::<usize>().map_err(|_| bad())?;
                SlotSite::Domain(id)
            }
            _ => return Err(bad()),
        };

        let kind = parts
            .next()
            .and_then(|k| SlotKind::from_str(k).ok())
            .ok_or_else(bad)?;

        let index = match (kind, parts.next()) {
            (SlotKind::Pc, None) => 0,
            (SlotKind::Pc, Some(_)) => return Err(bad()),
            (_, Some(i)) => i.parse::<usize>().map_err(|_| bad())?,
            (_, None) => return Err(bad()),
        };

        if parts.next().is_some() {
            return Err(bad());
        }

        Ok(Slot { site, kind, index })
    }
}

impl TryFrom<String> for Slot {
    type Error = SimboxError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Slot> for String {
    fn from(slot: Slot) -> Self {
        slot.to_string()
    }
}

/// When a rule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timing {
    /// Fires exactly once, at the given tick.
    Absolute {
        /// Zero-based tick.
        tick: u64,
    },
    /// Fires at every tick the period divides.
    Periodic {
        /// Period in ticks; must be nonzero.
        every: u64,
    },
}

impl Timing {
    /// Whether the rule fires at `tick`.
    pub fn fires_at(&self, tick: u64) -> bool {
        match *self {
            Timing::Absolute { tick: at } => at == tick,
            Timing::Periodic { every } => every != 0 && tick % every == 0,
        }
    }
}

/// What a rule does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Inject a value into a writable slot.
    Set,
    /// Record the slot value into the simulation report.
    Get,
    /// Print the slot value.
    Show,
}

/// One stimulus or observation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    /// What to do.
    pub action: Action,
    /// When to do it.
    pub when: Timing,
    /// Which slot to act on.
    pub slot: Slot,
    /// Value to inject; mandatory for `set`, absent otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<u64>,
}

/// Per-tick display options of the simulation loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DisplayOptions {
    /// Print the program counter before each step.
    pub show_pc: bool,
    /// Print the fetched instruction word before each step.
    pub show_instruction: bool,
    /// Print the register file around each step.
    pub show_registers: bool,
    /// Print the I/O ports around each step.
    pub show_io: bool,
}

/// The simbox document: a rule list plus display options.
///
/// A missing simbox means "no injections, no samples"; [`Simbox::default`]
/// gives that empty schedule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Simbox {
    /// Stimulus and observation rules, in document order.
    pub rules: Vec<Rule>,
    /// Display options for the simulation loop.
    pub options: DisplayOptions,
}

impl Simbox {
    /// Parses and validates a JSON simbox document.
    pub fn from_json(text: &str) -> Result<Self, SimboxError> {
        let simbox: Simbox = serde_json::from_str(text)?;
        simbox.validate()?;
        Ok(simbox)
    }

    /// Serializes the document back to JSON.
    pub fn to_json(&self) -> Result<String, SimboxError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Structural checks not captured by the schema.
    pub fn validate(&self) -> Result<(), SimboxError> {
        for rule in &self.rules {
            if rule.action == Action::Set && rule.value.is_none() {
                return Err(SimboxError::MissingValue(rule.slot));
            }
            if let Timing::Periodic { every: 0 } = rule.when {
                return Err(SimboxError::ZeroPeriod(rule.slot));
            }
        }
        Ok(())
    }

    /// Rules with the given action, in document order.
    pub fn rules_for(&self, action: Action) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(move |r| r.action == action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("d0.input.2", Slot::domain(0, SlotKind::Input, 2))]
    #[case("d12.register.0", Slot::domain(12, SlotKind::Register, 0))]
    #[case("ext.output.1", Slot::external(SlotKind::Output, 1))]
    #[case("d3.pc", Slot::domain(3, SlotKind::Pc, 0))]
    #[case("d0.ram.255", Slot::domain(0, SlotKind::Ram, 255))]
    fn slot_round_trip(#[case] text: &str, #[case] slot: Slot) {
        assert_eq!(text.parse::<Slot>().unwrap(), slot);
        assert_eq!(slot.to_string(), text);
    }

    #[rstest]
    #[case("")]
    #[case("d.input.2")]
    #[case("dx.input.2")]
    #[case("d0.flux.2")]
    #[case("d0.input")]
    #[case("d0.pc.0")]
    #[case("d0.input.2.9")]
    #[case("extinput.2")]
    fn slot_rejects_garbage(#[case] text: &str) {
        assert!(text.parse::<Slot>().is_err());
    }

    #[test]
    fn document_round_trip() {
        let text = r#"{
            "rules": [
                { "action": "set", "when": { "tick": 0 }, "slot": "d0.input.0", "value": 42 },
                { "action": "show", "when": { "every": 5 }, "slot": "d0.register.1" },
                { "action": "get", "when": { "tick": 9 }, "slot": "d0.output.0" }
            ],
            "options": { "show_pc": true }
        }"#;
        let simbox = Simbox::from_json(text).unwrap();
        assert_eq!(simbox.rules.len(), 3);
        assert!(simbox.options.show_pc);
        assert!(!simbox.options.show_io);

        let again = Simbox::from_json(&simbox.to_json().unwrap()).unwrap();
        assert_eq!(simbox, again);
    }

    #[test]
    fn set_without_value_is_rejected() {
        let text = r#"{ "rules": [ { "action": "set", "when": { "tick": 0 }, "slot": "d0.input.0" } ] }"#;
        assert!(matches!(
            Simbox::from_json(text),
            Err(SimboxError::MissingValue(_))
        ));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let text = r#"{ "rules": [], "extra": 1 }"#;
        assert!(Simbox::from_json(text).is_err());
    }

    #[test]
    fn periodic_timing_fires_on_divisors() {
        let timing = Timing::Periodic { every: 4 };
        assert!(timing.fires_at(0));
        assert!(!timing.fires_at(3));
        assert!(timing.fires_at(8));
    }
}
