//! Fabric-level simulation harness.
//!
//! The same simbox documents drive a whole fabric: slots carry a domain
//! prefix (`d1.input.0`) or address the fabric's external ports
//! (`ext.input.2`). The per-tick ordering matches the single-processor
//! harness: inject, propagate and step, sample.

use crate::error::FabricError;
use crate::interpreter::Interpreter;
use bondmachine_proc::sim::Sample;
use bondmachine_simbox::{Action, DisplayOptions, Simbox, Slot, SlotKind, SlotSite, Timing};
use std::collections::BTreeMap;

fn check_slot(vm: &Interpreter, slot: Slot, inject: bool) -> Result<(), FabricError> {
    use bondmachine_proc::error::SlotError;

    if inject {
        let injectable = match slot.site {
            SlotSite::Domain(_) => slot.kind.is_injectable(),
            SlotSite::External => slot.kind == SlotKind::Input,
        };
        if !injectable {
            return Err(FabricError::Slot(SlotError::NotInjectable(
                slot.to_string(),
            )));
        }
    }
    // Bounds are checked by resolving the slot once against current
    // state.
    vm.read_slot(slot).map(|_| ())
}

/// The fabric stimulus schedule, bound at init time.
#[derive(Debug, Clone, Default)]
pub struct SimDrive {
    abs_set: BTreeMap<u64, Vec<(Slot, u64)>>,
    periodic_set: Vec<(u64, Slot, u64)>,
}

impl SimDrive {
    /// Binds the simbox `set` rules to the fabric VM.
    pub fn new(simbox: Option<&Simbox>, vm: &Interpreter) -> Result<Self, FabricError> {
        let mut drive = SimDrive::default();
        let Some(simbox) = simbox else {
            return Ok(drive);
        };
        for rule in simbox.rules_for(Action::Set) {
            check_slot(vm, rule.slot, true)?;
            let value = rule.value.unwrap_or_default();
            match rule.when {
                Timing::Absolute { tick } => {
                    drive.abs_set.entry(tick).or_default().push((rule.slot, value));
                }
                Timing::Periodic { every } => {
                    drive.periodic_set.push((every, rule.slot, value));
                }
            }
        }
        Ok(drive)
    }

    /// Applies every injection scheduled for a tick.
    pub fn apply(&self, tick: u64, vm: &mut Interpreter) -> Result<(), FabricError> {
        if let Some(actions) = self.abs_set.get(&tick) {
            for &(slot, value) in actions {
                vm.write_slot(slot, value)?;
            }
        }
        for &(every, slot, value) in &self.periodic_set {
            if tick % every == 0 {
                vm.write_slot(slot, value)?;
            }
        }
        Ok(())
    }
}

/// The fabric sampling schedule and its accumulated results.
#[derive(Debug, Clone, Default)]
pub struct SimReport {
    abs_get: BTreeMap<u64, Vec<Slot>>,
    per_get: Vec<(u64, Slot)>,
    abs_show: BTreeMap<u64, Vec<Slot>>,
    per_show: Vec<(u64, Slot)>,
    /// Values recorded by `get` rules, in tick order.
    pub samples: Vec<Sample>,
    /// Lines produced by `show` rules.
    pub log: Vec<String>,
}

impl SimReport {
    /// Binds the simbox `get`/`show` rules to the fabric VM.
    pub fn new(simbox: Option<&Simbox>, vm: &Interpreter) -> Result<Self, FabricError> {
        let mut report = SimReport::default();
        let Some(simbox) = simbox else {
            return Ok(report);
        };
        for rule in &simbox.rules {
            if rule.action == Action::Set {
                continue;
            }
            check_slot(vm, rule.slot, false)?;
            match (rule.action, rule.when) {
                (Action::Get, Timing::Absolute { tick }) => {
                    report.abs_get.entry(tick).or_default().push(rule.slot);
                }
                (Action::Get, Timing::Periodic { every }) => {
                    report.per_get.push((every, rule.slot));
                }
                (Action::Show, Timing::Absolute { tick }) => {
                    report.abs_show.entry(tick).or_default().push(rule.slot);
                }
                (Action::Show, Timing::Periodic { every }) => {
                    report.per_show.push((every, rule.slot));
                }
                (Action::Set, _) => unreachable!("filtered above"),
            }
        }
        Ok(report)
    }

    /// Samples and prints everything scheduled for a tick.
    pub fn observe(&mut self, tick: u64, vm: &Interpreter) -> Result<(), FabricError> {
        if let Some(slots) = self.abs_show.get(&tick) {
            for slot in slots {
                let value = vm.read_slot(*slot)?;
                self.log.push(format!("{slot} {value}"));
            }
        }
        for &(every, slot) in &self.per_show {
            if tick % every == 0 {
                let value = vm.read_slot(slot)?;
                self.log.push(format!("{slot} {value}"));
            }
        }
        if let Some(slots) = self.abs_get.get(&tick) {
            for slot in slots {
                let value = vm.read_slot(*slot)?;
                self.samples.push(Sample {
                    tick,
                    slot: *slot,
                    value,
                });
            }
        }
        for &(every, slot) in &self.per_get {
            if tick % every == 0 {
                let value = vm.read_slot(slot)?;
                self.samples.push(Sample { tick, slot, value });
            }
        }
        Ok(())
    }
}

/// Runs a fabric for `ticks` ticks under a simbox schedule.
pub fn simulate(
    vm: &mut Interpreter,
    simbox: Option<&Simbox>,
    ticks: u64,
) -> Result<SimReport, FabricError> {
    let options: DisplayOptions = simbox.map(|s| s.options).unwrap_or_default();
    let drive = SimDrive::new(simbox, vm)?;
    let mut report = SimReport::new(simbox, vm)?;

    for tick in 0..ticks {
        if options.show_pc {
            for id in 0..vm.fabric().domains.len() {
                let pc = vm.domain(id)?.pc();
                report.log.push(format!("tick {tick} d{id}.pc {pc}"));
            }
        }
        drive.apply(tick, vm)?;
        vm.step()?;
        report.observe(tick, vm)?;
    }

    tracing::debug!(ticks, samples = report.samples.len(), "fabric simulation finished");
    Ok(report)
}
