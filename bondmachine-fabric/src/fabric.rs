//! The bondmachine graph: domains, bonds, shared objects and external
//! I/O.
//!
//! Every mutation validates its arguments, preserves the fabric
//! invariants (endpoints exist, one producer per wire, no dangling
//! references) or fails with a diagnostic. Deletions renumber higher ids
//! so the surviving references stay stable.

use crate::bond::{Bond, Direction, Endpoint};
use crate::error::FabricError;
use crate::shared::SharedObject;
use bondmachine_proc::error::AsmError;
use bondmachine_proc::machine::Machine;
use bondmachine_proc::opcode::UsageNotify;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// A binding between a processor and a shared object. The position of a
/// domain's links, in list order, is the local channel slot its shared
/// opcodes address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessorSharedLink {
    /// Domain id.
    pub domain: usize,
    /// Shared-object id.
    pub shared: usize,
}

/// A composition of processor domains connected by explicit wires, shared
/// objects and external I/O.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Bondmachine {
    /// Register size shared by every domain.
    pub rsize: u8,
    /// Processor instances; the index is the domain id.
    pub domains: Vec<Machine>,
    /// Fabric-external input count.
    pub inputs: usize,
    /// Fabric-external output count.
    pub outputs: usize,
    /// Wires, in creation order; the index is the bond id.
    pub links: Vec<Bond>,
    /// Shared objects; the index is the object id.
    pub shared_objects: Vec<SharedObject>,
    /// Processor↔shared bindings, in creation order.
    pub processor_shared_links: Vec<ProcessorSharedLink>,
}

impl Bondmachine {
    /// An empty fabric of the given register size.
    pub fn new(rsize: u8) -> Self {
        Bondmachine {
            rsize,
            domains: Vec::new(),
            inputs: 0,
            outputs: 0,
            links: Vec::new(),
            shared_objects: Vec::new(),
            processor_shared_links: Vec::new(),
        }
    }

    fn domain_at(&self, id: usize) -> Result<&Machine, FabricError> {
        self.domains.get(id).ok_or(FabricError::UnknownDomain {
            id,
            count: self.domains.len(),
        })
    }

    /// Verifies an endpoint against the fabric's current shape.
    pub fn endpoint_exists(&self, endpoint: Endpoint) -> Result<(), FabricError> {
        let missing = || FabricError::UnknownEndpoint(endpoint.to_string());
        match endpoint {
            Endpoint::Processor {
                domain,
                direction,
                index,
            } => {
                let machine = self.domains.get(domain).ok_or_else(missing)?;
                let limit = match direction {
                    Direction::Input => machine.arch.inputs(),
                    Direction::Output => machine.arch.outputs(),
                };
                if index >= limit {
                    return Err(missing());
                }
            }
            Endpoint::External { direction, index } => {
                let limit = match direction {
                    Direction::Input => self.inputs,
                    Direction::Output => self.outputs,
                };
                if index >= limit {
                    return Err(missing());
                }
            }
        }
        Ok(())
    }

    /// Adds a processor domain; its register size must match the fabric.
    pub fn add_domain(&mut self, machine: Machine) -> Result<usize, FabricError> {
        if machine.arch.rsize != self.rsize {
            return Err(FabricError::RegisterSizeMismatch {
                domain: machine.arch.rsize,
                fabric: self.rsize,
            });
        }
        self.domains.push(machine);
        let id = self.domains.len() - 1;
        tracing::debug!(id, "added domain");
        Ok(id)
    }

    /// Removes a domain. Valid ids are `[0, len)`; deletion is refused
    /// while any bond or shared link references the domain. Higher domain
    /// ids are renumbered.
    pub fn del_domain(&mut self, id: usize) -> Result<(), FabricError> {
        self.domain_at(id)?;
        let bonded = self.links.iter().any(|b| b.references_domain(id));
        let linked = self.processor_shared_links.iter().any(|l| l.domain == id);
        if bonded || linked {
            return Err(FabricError::DomainInUse { id });
        }
        self.domains.remove(id);
        for bond in &mut self.links {
            for endpoint in [&mut bond.from, &mut bond.to] {
                if let Endpoint::Processor { domain, .. } = endpoint {
                    if *domain > id {
                        *domain -= 1;
                    }
                }
            }
        }
        for link in &mut self.processor_shared_links {
            if link.domain > id {
                link.domain -= 1;
            }
        }
        tracing::debug!(id, "removed domain");
        Ok(())
    }

    /// Adds one external input, returning its id.
    pub fn add_input(&mut self) -> usize {
        self.inputs += 1;
        self.inputs - 1
    }

    /// Adds one external output, returning its id.
    pub fn add_output(&mut self) -> usize {
        self.outputs += 1;
        self.outputs - 1
    }

    /// Removes an external input. Refused while a bond references it;
    /// higher input ids inside bonds are renumbered. When deleting
    /// several, delete from the highest id to the lowest so the remaining
    /// ids stay stable.
    pub fn del_input(&mut self, id: usize) -> Result<(), FabricError> {
        if id >= self.inputs {
            return Err(FabricError::UnknownExternal {
                direction: "input",
                id,
            });
        }
        let referenced = self.links.iter().any(|b| {
            matches!(
                b.from,
                Endpoint::External {
                    direction: Direction::Input,
                    index
                } if index == id
            )
        });
        if referenced {
            return Err(FabricError::ExternalInUse {
                direction: "input",
                id,
            });
        }
        for bond in &mut self.links {
            if let Endpoint::External {
                direction: Direction::Input,
                index,
            } = &mut bond.from
            {
                if *index > id {
                    *index -= 1;
                }
            }
        }
        self.inputs -= 1;
        Ok(())
    }

    /// Removes an external output; the mirror of [`Bondmachine::del_input`].
    pub fn del_output(&mut self, id: usize) -> Result<(), FabricError> {
        if id >= self.outputs {
            return Err(FabricError::UnknownExternal {
                direction: "output",
                id,
            });
        }
        let referenced = self.links.iter().any(|b| {
            matches!(
                b.to,
                Endpoint::External {
                    direction: Direction::Output,
                    index
                } if index == id
            )
        });
        if referenced {
            return Err(FabricError::ExternalInUse {
                direction: "output",
                id,
            });
        }
        for bond in &mut self.links {
            if let Endpoint::External {
                direction: Direction::Output,
                index,
            } = &mut bond.to
            {
                if *index > id {
                    *index -= 1;
                }
            }
        }
        self.outputs -= 1;
        Ok(())
    }

    /// Bonds two endpoints. The pair is unordered; it must contain one
    /// producer and one consumer, both existing, the consumer not yet
    /// driven.
    pub fn add_bond(&mut self, a: Endpoint, b: Endpoint) -> Result<usize, FabricError> {
        self.endpoint_exists(a)?;
        self.endpoint_exists(b)?;
        let bond = Bond::new(a, b)?;
        if self.links.iter().any(|l| l == &bond) {
            return Err(FabricError::DuplicateBond {
                a: bond.from.to_string(),
                b: bond.to.to_string(),
            });
        }
        if self.links.iter().any(|l| l.to == bond.to) {
            return Err(FabricError::AlreadyDriven(bond.to.to_string()));
        }
        self.links.push(bond);
        tracing::debug!(bond = %bond, "added bond");
        Ok(self.links.len() - 1)
    }

    /// Removes a bond by id.
    pub fn del_bond(&mut self, id: usize) -> Result<(), FabricError> {
        if id >= self.links.len() {
            return Err(FabricError::UnknownBond {
                id,
                count: self.links.len(),
            });
        }
        let bond = self.links.remove(id);
        tracing::debug!(bond = %bond, "removed bond");
        Ok(())
    }

    /// Adds a shared object of the given kind, returning its id.
    pub fn add_shared_object(&mut self, kind: &str) -> Result<usize, FabricError> {
        let object = SharedObject::parse_kind(kind)?;
        self.shared_objects.push(object);
        Ok(self.shared_objects.len() - 1)
    }

    /// Removes a shared object. Refused while linked; higher object ids
    /// inside links are renumbered.
    pub fn del_shared_object(&mut self, id: usize) -> Result<(), FabricError> {
        if id >= self.shared_objects.len() {
            return Err(FabricError::UnknownShared {
                id,
                count: self.shared_objects.len(),
            });
        }
        if self.processor_shared_links.iter().any(|l| l.shared == id) {
            return Err(FabricError::SharedInUse { id });
        }
        self.shared_objects.remove(id);
        for link in &mut self.processor_shared_links {
            if link.shared > id {
                link.shared -= 1;
            }
        }
        Ok(())
    }

    /// Connects a processor to a shared object. The new link's position
    /// among the domain's links must line up with a matching kind in the
    /// domain's shared constraints.
    pub fn connect_processor_shared(
        &mut self,
        domain: usize,
        shared: usize,
    ) -> Result<(), FabricError> {
        let machine = self.domain_at(domain)?;
        let object = *self
            .shared_objects
            .get(shared)
            .ok_or(FabricError::UnknownShared {
                id: shared,
                count: self.shared_objects.len(),
            })?;
        if self
            .processor_shared_links
            .iter()
            .any(|l| l.domain == domain && l.shared == shared)
        {
            return Err(FabricError::DuplicateLink { domain, shared });
        }
        let slot = self.domain_shared_links(domain).len();
        match machine.arch.shared_constraints.get(slot) {
            Some(kind) if kind == object.kind() => {}
            _ => {
                return Err(FabricError::ConstraintMismatch {
                    domain,
                    slot,
                    kind: object.kind(),
                })
            }
        }
        self.processor_shared_links
            .push(ProcessorSharedLink { domain, shared });
        Ok(())
    }

    /// Disconnects a processor from a shared object.
    pub fn disconnect_processor_shared(
        &mut self,
        domain: usize,
        shared: usize,
    ) -> Result<(), FabricError> {
        match self
            .processor_shared_links
            .iter()
            .position(|l| l.domain == domain && l.shared == shared)
        {
            Some(at) => {
                self.processor_shared_links.remove(at);
                Ok(())
            }
            None => Err(FabricError::NotConnected { domain, shared }),
        }
    }

    /// The bond driving a consumer endpoint, if any.
    pub fn driver_of(&self, consumer: Endpoint) -> Option<&Bond> {
        self.links.iter().find(|b| b.to == consumer)
    }

    /// A domain's shared links, in creation order: the position in the
    /// returned list is the local channel slot.
    pub fn domain_shared_links(&self, domain: usize) -> Vec<ProcessorSharedLink> {
        self.processor_shared_links
            .iter()
            .filter(|l| l.domain == domain)
            .copied()
            .collect()
    }

    /// Re-validates every reference of a deserialized fabric.
    pub fn validate(&self) -> Result<(), FabricError> {
        for bond in &self.links {
            self.endpoint_exists(bond.from)?;
            self.endpoint_exists(bond.to)?;
        }
        for link in &self.processor_shared_links {
            self.domain_at(link.domain)?;
            if link.shared >= self.shared_objects.len() {
                return Err(FabricError::UnknownShared {
                    id: link.shared,
                    count: self.shared_objects.len(),
                });
            }
        }
        for machine in &self.domains {
            if machine.arch.rsize != self.rsize {
                return Err(FabricError::RegisterSizeMismatch {
                    domain: machine.arch.rsize,
                    fabric: self.rsize,
                });
            }
        }
        Ok(())
    }

    /// Stable human-readable domain enumeration.
    pub fn list_domains(&self) -> Vec<String> {
        self.domains
            .iter()
            .enumerate()
            .map(|(id, m)| {
                format!(
                    "{id}: rsize {} opcodes [{}] program {} instructions",
                    m.arch.rsize,
                    m.arch.op.iter().map(|op| op.name()).join(","),
                    m.program.len()
                )
            })
            .collect()
    }

    fn describe_consumer(&self, endpoint: Endpoint) -> String {
        match self.driver_of(endpoint) {
            Some(bond) => format!("{endpoint} (driven by {})", bond.from),
            None => format!("{endpoint} (unbound)"),
        }
    }

    /// External inputs with their consumers.
    pub fn list_inputs(&self) -> Vec<String> {
        (0..self.inputs)
            .map(|index| {
                let endpoint = Endpoint::External {
                    direction: Direction::Input,
                    index,
                };
                let consumers: Vec<_> = self
                    .links
                    .iter()
                    .filter(|b| b.from == endpoint)
                    .map(|b| b.to.to_string())
                    .collect();
                if consumers.is_empty() {
                    format!("{endpoint} (unbound)")
                } else {
                    format!("{endpoint} -> {}", consumers.join(", "))
                }
            })
            .collect()
    }

    /// External outputs with their drivers.
    pub fn list_outputs(&self) -> Vec<String> {
        (0..self.outputs)
            .map(|index| {
                self.describe_consumer(Endpoint::External {
                    direction: Direction::Output,
                    index,
                })
            })
            .collect()
    }

    /// All bonds, by id.
    pub fn list_bonds(&self) -> Vec<String> {
        self.links
            .iter()
            .enumerate()
            .map(|(id, b)| format!("{id}: {b}"))
            .collect()
    }

    /// All shared objects, by id.
    pub fn list_shared_objects(&self) -> Vec<String> {
        self.shared_objects
            .iter()
            .enumerate()
            .map(|(id, s)| format!("{id}: {s}"))
            .collect()
    }

    /// All processor↔shared links.
    pub fn list_processor_shared_links(&self) -> Vec<String> {
        self.processor_shared_links
            .iter()
            .map(|l| format!("d{} <-> shared {}", l.domain, l.shared))
            .collect()
    }

    /// Every domain input port with its driver.
    pub fn list_internal_inputs(&self) -> Vec<String> {
        self.domains
            .iter()
            .enumerate()
            .flat_map(|(domain, m)| {
                (0..m.arch.inputs()).map(move |index| Endpoint::Processor {
                    domain,
                    direction: Direction::Input,
                    index,
                })
            })
            .map(|endpoint| self.describe_consumer(endpoint))
            .collect()
    }

    /// Every domain output port with its consumers.
    pub fn list_internal_outputs(&self) -> Vec<String> {
        self.domains
            .iter()
            .enumerate()
            .flat_map(|(domain, m)| {
                (0..m.arch.outputs()).map(move |index| Endpoint::Processor {
                    domain,
                    direction: Direction::Output,
                    index,
                })
            })
            .map(|endpoint| {
                let consumers: Vec<_> = self
                    .links
                    .iter()
                    .filter(|b| b.from == endpoint)
                    .map(|b| b.to.to_string())
                    .collect();
                if consumers.is_empty() {
                    format!("{endpoint} (unbound)")
                } else {
                    format!("{endpoint} -> {}", consumers.join(", "))
                }
            })
            .collect()
    }

    /// Per-domain program alias listings.
    pub fn programs_alias(&self) -> Result<Vec<String>, AsmError> {
        self.domains.iter().map(|m| m.program_alias()).collect()
    }

    /// Per-domain declarative usage, derived by disassembling each
    /// program and abstract-assembling the result.
    pub fn multi_assembly(&self) -> Result<Vec<Vec<Vec<UsageNotify>>>, AsmError> {
        self.domains
            .iter()
            .map(|m| {
                let source = m.disassemble(false)?;
                m.arch.abstract_assemble(&source)
            })
            .collect()
    }

    /// Loads a fabric from its serialized JSON form and validates every
    /// reference.
    pub fn from_json(text: &str) -> Result<Self, FabricError> {
        let fabric: Bondmachine = serde_json::from_str(text)?;
        fabric.validate()?;
        Ok(fabric)
    }

    /// Serializes the fabric to JSON; the inverse of
    /// [`Bondmachine::from_json`].
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
