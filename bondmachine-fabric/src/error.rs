//! Fabric error types.

use bondmachine_proc::error::{RuntimeError, SlotError};

/// Errors of fabric construction, mutation and emulation.
#[derive(Debug, thiserror::Error)]
pub enum FabricError {
    /// Domains must share the fabric's register size.
    #[error("domain register size {domain} differs from the fabric's {fabric}")]
    RegisterSizeMismatch {
        /// The machine's register size.
        domain: u8,
        /// The fabric's register size.
        fabric: u8,
    },
    /// A domain id outside `[0, len)`.
    #[error("no domain {id} (domains: {count})")]
    UnknownDomain {
        /// Requested id.
        id: usize,
        /// Domain count.
        count: usize,
    },
    /// The domain is still referenced by bonds or shared-object links.
    #[error("domain {id} is referenced by bonds or shared links; remove those first")]
    DomainInUse {
        /// The referenced domain.
        id: usize,
    },
    /// An endpoint key couldn't be parsed.
    #[error("malformed endpoint {0}")]
    MalformedEndpoint(String),
    /// An endpoint names a port the fabric doesn't have.
    #[error("endpoint {0} does not exist")]
    UnknownEndpoint(String),
    /// A bond needs exactly one producer and one consumer endpoint.
    #[error("bond {a} - {b} has incompatible directions")]
    IncompatibleBond {
        /// First endpoint.
        a: String,
        /// Second endpoint.
        b: String,
    },
    /// The consumer endpoint is already driven by another bond.
    #[error("endpoint {0} is already driven")]
    AlreadyDriven(String),
    /// The same bond already exists.
    #[error("bond {a} - {b} already exists")]
    DuplicateBond {
        /// Producer endpoint.
        a: String,
        /// Consumer endpoint.
        b: String,
    },
    /// A bond id outside `[0, len)`.
    #[error("no bond {id} (bonds: {count})")]
    UnknownBond {
        /// Requested id.
        id: usize,
        /// Bond count.
        count: usize,
    },
    /// An external port id outside the fabric's shape.
    #[error("no external {direction} {id}")]
    UnknownExternal {
        /// `input` or `output`.
        direction: &'static str,
        /// Requested id.
        id: usize,
    },
    /// The external port is still referenced by a bond.
    #[error("external {direction} {id} is bonded; remove the bond first")]
    ExternalInUse {
        /// `input` or `output`.
        direction: &'static str,
        /// The referenced id.
        id: usize,
    },
    /// An unknown shared-object kind string.
    #[error("unknown shared object kind {0}")]
    UnknownSharedKind(String),
    /// A shared-object id outside `[0, len)`.
    #[error("no shared object {id} (objects: {count})")]
    UnknownShared {
        /// Requested id.
        id: usize,
        /// Object count.
        count: usize,
    },
    /// The shared object is still linked to processors.
    #[error("shared object {id} is linked; disconnect it first")]
    SharedInUse {
        /// The referenced id.
        id: usize,
    },
    /// The processor↔shared link already exists.
    #[error("domain {domain} is already connected to shared object {shared}")]
    DuplicateLink {
        /// Domain id.
        domain: usize,
        /// Shared-object id.
        shared: usize,
    },
    /// The processor↔shared link doesn't exist.
    #[error("domain {domain} is not connected to shared object {shared}")]
    NotConnected {
        /// Domain id.
        domain: usize,
        /// Shared-object id.
        shared: usize,
    },
    /// The domain's shared constraints don't cover the requested link.
    #[error("domain {domain} declares no {kind} constraint at slot {slot}")]
    ConstraintMismatch {
        /// Domain id.
        domain: usize,
        /// Local channel slot the link would take.
        slot: usize,
        /// Required object kind.
        kind: &'static str,
    },
    /// A serialized fabric failed to parse.
    #[error("malformed fabric document: {0}")]
    Load(#[from] serde_json::Error),
    /// An extra module's precondition failed.
    #[error("extra module {module}: {reason}")]
    ExtraModule {
        /// Module name.
        module: &'static str,
        /// Failure description.
        reason: String,
    },
    /// A domain VM died.
    #[error("domain {domain}: {source}")]
    Domain {
        /// The failing domain.
        domain: usize,
        /// The VM error.
        #[source]
        source: RuntimeError,
    },
    /// A simbox slot doesn't resolve against this fabric.
    #[error(transparent)]
    Slot(#[from] SlotError),
    /// Simbox document error.
    #[error(transparent)]
    Simbox(#[from] bondmachine_simbox::SimboxError),
}
