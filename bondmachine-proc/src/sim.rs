//! Simulation harness: stimulus driver, reporter and the tick loop.
//!
//! The ordering guarantee within one tick is fixed: apply driver
//! injections, execute the instruction, sample the reportables. A missing
//! simbox means no injections and no samples; the loop still runs.

use crate::error::{SimError, SlotError};
use crate::interpreter::Interpreter;
use bondmachine_simbox::{Action, DisplayOptions, Simbox, Slot, SlotKind, SlotSite, Timing};
use std::collections::BTreeMap;

/// What the loop prints each tick, read from the simbox options.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimConfig {
    /// Display options of the loop.
    pub options: DisplayOptions,
}

impl SimConfig {
    /// Options from a simbox, or all-off without one.
    pub fn new(simbox: Option<&Simbox>) -> Self {
        SimConfig {
            options: simbox.map(|s| s.options).unwrap_or_default(),
        }
    }
}

/// Resolves a slot against a bare machine VM: the slot must address domain
/// 0 and fall inside the machine's shape.
fn resolve_slot(vm: &Interpreter, slot: Slot, inject: bool) -> Result<(SlotKind, usize), SimError> {
    match slot.site {
        SlotSite::Domain(0) => {}
        _ => return Err(SlotError::ForeignDomain(slot.to_string()).into()),
    }
    if inject && !slot.kind.is_injectable() {
        return Err(SlotError::NotInjectable(slot.to_string()).into());
    }
    let arch = vm.arch();
    let limit = match slot.kind {
        SlotKind::Input => arch.inputs(),
        SlotKind::Output => arch.outputs(),
        SlotKind::Register => arch.registers(),
        SlotKind::Ram => arch.ram_cells(),
        SlotKind::Pc => 1,
    };
    if slot.index >= limit {
        return Err(SlotError::OutOfRange {
            slot: slot.to_string(),
            limit,
        }
        .into());
    }
    Ok((slot.kind, slot.index))
}

/// The stimulus schedule: absolute and periodic injections, bound to VM
/// slots at init time.
#[derive(Debug, Clone, Default)]
pub struct SimDrive {
    abs_set: BTreeMap<u64, Vec<(SlotKind, usize, u64)>>,
    periodic_set: Vec<(u64, SlotKind, usize, u64)>,
}

impl SimDrive {
    /// Binds the simbox `set` rules to the VM, validating every slot.
    pub fn new(simbox: Option<&Simbox>, vm: &Interpreter) -> Result<Self, SimError> {
        let mut drive = SimDrive::default();
        let Some(simbox) = simbox else {
            return Ok(drive);
        };
        for rule in simbox.rules_for(Action::Set) {
            let (kind, index) = resolve_slot(vm, rule.slot, true)?;
            let value = rule.value.unwrap_or_default();
            match rule.when {
                Timing::Absolute { tick } => {
                    drive.abs_set.entry(tick).or_default().push((kind, index, value));
                }
                Timing::Periodic { every } => {
                    drive.periodic_set.push((every, kind, index, value));
                }
            }
        }
        Ok(drive)
    }

    /// Applies every injection scheduled for a tick.
    pub fn apply(&self, tick: u64, vm: &mut Interpreter) -> Result<(), SimError> {
        if let Some(actions) = self.abs_set.get(&tick) {
            for &(kind, index, value) in actions {
                vm.write_slot(kind, index, value)?;
            }
        }
        for &(every, kind, index, value) in &self.periodic_set {
            if tick % every == 0 {
                vm.write_slot(kind, index, value)?;
            }
        }
        Ok(())
    }
}

/// One recorded observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    /// Tick the value was read at (after that tick's step).
    pub tick: u64,
    /// Observed slot.
    pub slot: Slot,
    /// Observed value.
    pub value: u64,
}

/// The sampling schedule and its accumulated results.
#[derive(Debug, Clone, Default)]
pub struct SimReport {
    abs_get: BTreeMap<u64, Vec<Slot>>,
    per_get: Vec<(u64, Slot)>,
    abs_show: BTreeMap<u64, Vec<Slot>>,
    per_show: Vec<(u64, Slot)>,
    /// Values recorded by `get` rules, in tick order.
    pub samples: Vec<Sample>,
    /// Lines produced by `show` rules and display options.
    pub log: Vec<String>,
}

impl SimReport {
    /// Binds the simbox `get`/`show` rules to the VM, validating every
    /// slot.
    pub fn new(simbox: Option<&Simbox>, vm: &Interpreter) -> Result<Self, SimError> {
        let mut report = SimReport::default();
        let Some(simbox) = simbox else {
            return Ok(report);
        };
        for rule in &simbox.rules {
            match rule.action {
                Action::Set => continue,
                Action::Get => {
                    resolve_slot(vm, rule.slot, false)?;
                    match rule.when {
                        Timing::Absolute { tick } => {
                            report.abs_get.entry(tick).or_default().push(rule.slot);
                        }
                        Timing::Periodic { every } => {
                            report.per_get.push((every, rule.slot));
                        }
                    }
                }
                Action::Show => {
                    resolve_slot(vm, rule.slot, false)?;
                    match rule.when {
                        Timing::Absolute { tick } => {
                            report.abs_show.entry(tick).or_default().push(rule.slot);
                        }
                        Timing::Periodic { every } => {
                            report.per_show.push((every, rule.slot));
                        }
                    }
                }
            }
        }
        Ok(report)
    }

    /// Samples and prints everything scheduled for a tick; called after
    /// the step.
    pub fn observe(&mut self, tick: u64, vm: &Interpreter) -> Result<(), SimError> {
        if let Some(slots) = self.abs_show.get(&tick) {
            for slot in slots {
                let (kind, index) = resolve_slot(vm, *slot, false)?;
                let value = vm.read_slot(kind, index)?;
                self.log.push(format!("{slot} {value}"));
            }
        }
        for &(every, slot) in &self.per_show {
            if tick % every == 0 {
                let (kind, index) = resolve_slot(vm, slot, false)?;
                let value = vm.read_slot(kind, index)?;
                self.log.push(format!("{slot} {value}"));
            }
        }
        let mut recorded = Vec::new();
        if let Some(slots) = self.abs_get.get(&tick) {
            for slot in slots {
                let (kind, index) = resolve_slot(vm, *slot, false)?;
                let value = vm.read_slot(kind, index)?;
                recorded.push(Sample {
                    tick,
                    slot: *slot,
                    value,
                });
            }
        }
        for &(every, slot) in &self.per_get {
            if tick % every == 0 {
                let (kind, index) = resolve_slot(vm, slot, false)?;
                let value = vm.read_slot(kind, index)?;
                recorded.push(Sample { tick, slot, value });
            }
        }
        self.samples.extend(recorded);
        Ok(())
    }
}

/// Runs a bare machine VM for `ticks` ticks under a simbox schedule.
///
/// Each tick: inject, step, sample. Runtime errors abort the simulation.
pub fn simulate(
    vm: &mut Interpreter,
    simbox: Option<&Simbox>,
    ticks: u64,
) -> Result<SimReport, SimError> {
    let config = SimConfig::new(simbox);
    let drive = SimDrive::new(simbox, vm)?;
    let mut report = SimReport::new(simbox, vm)?;

    for tick in 0..ticks {
        if config.options.show_pc {
            report.log.push(format!("tick {tick} pc {}", vm.pc()));
        }
        if config.options.show_instruction {
            if let Some(sloc) = vm.machine().program.slocs.get(vm.pc()) {
                report.log.push(format!("tick {tick} instruction {sloc}"));
            }
        }
        if config.options.show_registers {
            report.log.push(format!("tick {tick} {}", vm.dump_registers()));
        }
        if config.options.show_io {
            report.log.push(format!("tick {tick} {}", vm.dump_io()));
        }

        drive.apply(tick, vm)?;
        vm.step()?;
        report.observe(tick, vm)?;
    }

    tracing::debug!(ticks, samples = report.samples.len(), "simulation finished");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::{Arch, OpcodeSet};
    use crate::machine::Machine;

    fn vm(names: &[&str], source: &str) -> Interpreter {
        let arch = Arch {
            op: OpcodeSet::from_names(names).unwrap(),
            ..Arch::default()
        };
        let program = arch.assemble(source).unwrap();
        Interpreter::new(Machine::new(arch, program).unwrap())
    }

    #[test]
    fn missing_simbox_still_runs() {
        let mut vm = vm(&["nop", "clc"], "nop\nnop\nnop\n");
        let report = simulate(&mut vm, None, 3).unwrap();
        assert!(report.samples.is_empty());
        assert!(report.log.is_empty());
        assert_eq!(vm.pc(), 3);
    }

    #[test]
    fn injection_lands_before_the_step() {
        // i2r r0 0 reads input 0 on the same tick the driver sets it.
        let mut vm = vm(&["i2r", "nop"], "i2r r0 0\n");
        let simbox = Simbox::from_json(
            r#"{ "rules": [
                { "action": "set", "when": { "tick": 0 }, "slot": "d0.input.0", "value": 42 },
                { "action": "get", "when": { "tick": 0 }, "slot": "d0.register.0" }
            ] }"#,
        )
        .unwrap();
        let report = simulate(&mut vm, Some(&simbox), 1).unwrap();
        assert_eq!(report.samples.len(), 1);
        assert_eq!(report.samples[0].value, 42);
    }

    #[test]
    fn unknown_slots_fail_at_init() {
        let mut vm = vm(&["nop", "clc"], "nop\n");
        let simbox = Simbox::from_json(
            r#"{ "rules": [
                { "action": "set", "when": { "tick": 0 }, "slot": "d0.input.9", "value": 1 }
            ] }"#,
        )
        .unwrap();
        assert!(simulate(&mut vm, Some(&simbox), 1).is_err());
    }

    #[test]
    fn reportable_slots_are_read_only() {
        let mut vm = vm(&["nop", "clc"], "nop\n");
        let simbox = Simbox::from_json(
            r#"{ "rules": [
                { "action": "set", "when": { "tick": 0 }, "slot": "d0.register.0", "value": 1 }
            ] }"#,
        )
        .unwrap();
        assert!(matches!(
            simulate(&mut vm, Some(&simbox), 1),
            Err(SimError::Slot(SlotError::NotInjectable(_)))
        ));
    }

    #[test]
    fn periodic_show_fires_on_divisors() {
        let mut vm = vm(&["nop", "clc"], "nop\nnop\nnop\nnop\n");
        let simbox = Simbox::from_json(
            r#"{ "rules": [
                { "action": "show", "when": { "every": 2 }, "slot": "d0.pc" }
            ] }"#,
        )
        .unwrap();
        let report = simulate(&mut vm, Some(&simbox), 4).unwrap();
        // Ticks 0 and 2 fire; pc observed after the step.
        assert_eq!(report.log, vec!["d0.pc 1", "d0.pc 3"]);
    }

    #[test]
    fn determinism_across_identical_runs() {
        let simbox = Simbox::from_json(
            r#"{ "rules": [
                { "action": "set", "when": { "tick": 0 }, "slot": "d0.input.0", "value": 7 },
                { "action": "get", "when": { "every": 1 }, "slot": "d0.register.1" }
            ] }"#,
        )
        .unwrap();
        let source = "i2r r1 0\nadd r1 r1\nnop\nadd r1 r1\n";
        let mut a = vm(&["i2r", "add", "nop"], source);
        let mut b = vm(&["i2r", "add", "nop"], source);
        let ra = simulate(&mut a, Some(&simbox), 4).unwrap();
        let rb = simulate(&mut b, Some(&simbox), 4).unwrap();
        assert_eq!(ra.samples, rb.samples);
        assert_eq!(ra.log, rb.log);
    }
}
