//! The fabric VM: one processor VM per domain, stepped in domain-id
//! order, with bond propagation and shared-object mediation per tick.

use crate::error::FabricError;
use crate::fabric::Bondmachine;
use bondmachine_proc::error::SlotError;
use bondmachine_proc::interpreter::Interpreter as ProcInterpreter;
use bondmachine_proc::state::ExecuteState;
use bondmachine_simbox::{Slot, SlotKind, SlotSite};

/// Emulates a whole fabric. Cross-domain visibility happens only through
/// bond propagation and shared objects, both mediated here.
#[derive(Debug, Clone)]
pub struct Interpreter {
    fabric: Bondmachine,
    procs: Vec<ProcInterpreter>,
    ext_inputs: Vec<u64>,
    ext_outputs: Vec<u64>,
    shared: Vec<u64>,
}

impl Interpreter {
    /// Builds one VM per domain and zeroes all fabric-level state.
    pub fn new(fabric: Bondmachine) -> Result<Self, FabricError> {
        fabric.validate()?;
        let procs = fabric
            .domains
            .iter()
            .cloned()
            .map(ProcInterpreter::new)
            .collect();
        let ext_inputs = vec![0; fabric.inputs];
        let ext_outputs = vec![0; fabric.outputs];
        let shared = vec![0; fabric.shared_objects.len()];
        Ok(Interpreter {
            fabric,
            procs,
            ext_inputs,
            ext_outputs,
            shared,
        })
    }

    /// The fabric under emulation.
    pub fn fabric(&self) -> &Bondmachine {
        &self.fabric
    }

    /// A domain's VM.
    pub fn domain(&self, id: usize) -> Result<&ProcInterpreter, FabricError> {
        self.procs.get(id).ok_or(FabricError::UnknownDomain {
            id,
            count: self.procs.len(),
        })
    }

    /// Drives a fabric-external input.
    pub fn set_external_input(&mut self, id: usize, value: u64) -> Result<(), FabricError> {
        match self.ext_inputs.get_mut(id) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(FabricError::UnknownExternal {
                direction: "input",
                id,
            }),
        }
    }

    /// Reads a fabric-external output.
    pub fn external_output(&self, id: usize) -> Result<u64, FabricError> {
        self.ext_outputs
            .get(id)
            .copied()
            .ok_or(FabricError::UnknownExternal {
                direction: "output",
                id,
            })
    }

    /// Copies every producer endpoint onto its consumers: processor
    /// outputs and external inputs flow to processor inputs and external
    /// outputs.
    fn propagate(&mut self) -> Result<(), FabricError> {
        use crate::bond::{Direction, Endpoint};

        for bond in self.fabric.links.clone() {
            let value = match bond.from {
                Endpoint::Processor { domain, index, .. } => self.procs[domain]
                    .output(index)
                    .map_err(|source| FabricError::Domain { domain, source })?,
                Endpoint::External { index, .. } => self.ext_inputs[index],
            };
            match bond.to {
                Endpoint::Processor { domain, index, .. } => {
                    self.procs[domain]
                        .set_input(index, value)
                        .map_err(|source| FabricError::Domain { domain, source })?;
                }
                Endpoint::External {
                    direction: Direction::Output,
                    index,
                } => self.ext_outputs[index] = value,
                Endpoint::External { .. } => {}
            }
        }
        Ok(())
    }

    /// One fabric tick: propagate bonds, then step every domain in
    /// domain-id order, mediating shared channels around each step.
    /// Returns the per-domain step states.
    pub fn step(&mut self) -> Result<Vec<ExecuteState>, FabricError> {
        self.propagate()?;

        let mut states = Vec::with_capacity(self.procs.len());
        for domain in 0..self.procs.len() {
            let links = self.fabric.domain_shared_links(domain);

            // The domain sees the fabric's channel values, including any
            // writes earlier domains made this tick.
            for (slot, link) in links.iter().enumerate() {
                self.procs[domain]
                    .set_shared(slot, self.shared[link.shared])
                    .map_err(|source| FabricError::Domain { domain, source })?;
            }
            let before = self.procs[domain].shared_values().to_vec();

            let state = self.procs[domain]
                .step()
                .map_err(|source| FabricError::Domain { domain, source })?;
            states.push(state);

            // Writes flow back; with several writers in one tick the
            // highest-ordered domain wins.
            let after = self.procs[domain].shared_values().to_vec();
            for (slot, link) in links.iter().enumerate() {
                if after[slot] != before[slot] {
                    self.shared[link.shared] = after[slot];
                }
            }
        }

        tracing::trace!(domains = states.len(), "fabric tick");
        Ok(states)
    }

    /// Reads a reportable slot anywhere in the fabric.
    pub fn read_slot(&self, slot: Slot) -> Result<u64, FabricError> {
        match slot.site {
            SlotSite::Domain(id) => {
                let proc = self.domain(id)?;
                Ok(proc.read_slot(slot.kind, slot.index)?)
            }
            SlotSite::External => match slot.kind {
                SlotKind::Input => {
                    self.ext_inputs
                        .get(slot.index)
                        .copied()
                        .ok_or(FabricError::Slot(SlotError::OutOfRange {
                            slot: slot.to_string(),
                            limit: self.ext_inputs.len(),
                        }))
                }
                SlotKind::Output => {
                    self.ext_outputs
                        .get(slot.index)
                        .copied()
                        .ok_or(FabricError::Slot(SlotError::OutOfRange {
                            slot: slot.to_string(),
                            limit: self.ext_outputs.len(),
                        }))
                }
                _ => Err(FabricError::Slot(SlotError::ForeignDomain(
                    slot.to_string(),
                ))),
            },
        }
    }

    /// Writes an injectable slot anywhere in the fabric: domain inputs
    /// and RAM, or fabric-external inputs.
    pub fn write_slot(&mut self, slot: Slot, value: u64) -> Result<(), FabricError> {
        match slot.site {
            SlotSite::Domain(id) => {
                if id >= self.procs.len() {
                    return Err(FabricError::UnknownDomain {
                        id,
                        count: self.procs.len(),
                    });
                }
                Ok(self.procs[id].write_slot(slot.kind, slot.index, value)?)
            }
            SlotSite::External => match slot.kind {
                SlotKind::Input => self.set_external_input(slot.index, value),
                _ => Err(FabricError::Slot(SlotError::NotInjectable(
                    slot.to_string(),
                ))),
            },
        }
    }
}
