//! Multi-processor fabric composition: wire processor domains together
//! with explicit bonds, shared objects and external I/O, emulate the
//! result tick by tick, render it as a graph, and lower it to Verilog.

#![warn(missing_docs)]

pub mod bond;
pub mod dot;
pub mod error;
pub mod extra;
pub mod fabric;
pub mod interpreter;
pub mod shared;
pub mod sim;
pub mod verilog;

pub mod prelude {
    //! Convenience re-exports of the fabric surface.

    pub use crate::bond::{Bond, Direction, Endpoint};
    pub use crate::dot::dot;
    pub use crate::error::FabricError;
    pub use crate::extra::{BridgeKind, ExtraModule, ExtraPort, NetBridge, SevenSegment, SlowClock};
    pub use crate::fabric::{Bondmachine, ProcessorSharedLink};
    pub use crate::interpreter::Interpreter;
    pub use crate::shared::SharedObject;
    pub use crate::sim::{simulate, SimDrive, SimReport};
    pub use crate::verilog::{write_verilog, VerilogFile};
}
