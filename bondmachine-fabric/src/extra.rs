//! Extra modules: fabric adapters spliced into the emitted Verilog.
//!
//! Each adapter declares a precondition over the fabric, the external I/O
//! indices it occupies (those stop being top-level pins and are wired to
//! the adapter instead), optional extra top-level ports, and its Verilog
//! blocks. Emission order is the order adapters were added.

use crate::error::FabricError;
use crate::fabric::Bondmachine;
use bondmachine_proc::verilog::Flavor;
use std::fmt::Write as _;

/// An extra top-level port contributed by an adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraPort {
    /// Port name.
    pub name: String,
    /// Bit width.
    pub width: usize,
    /// Whether the port is an output of the top module.
    pub output: bool,
}

/// A fabric adapter.
pub trait ExtraModule {
    /// Adapter name, used in diagnostics.
    fn name(&self) -> &'static str;

    /// Precondition over the fabric.
    fn check(&self, fabric: &Bondmachine) -> Result<(), FabricError>;

    /// Fabric-external input indices the adapter occupies.
    fn claimed_inputs(&self) -> Vec<usize> {
        Vec::new()
    }

    /// Fabric-external output indices the adapter occupies.
    fn claimed_outputs(&self) -> Vec<usize> {
        Vec::new()
    }

    /// Extra top-level ports the adapter needs.
    fn extra_ports(&self) -> Vec<ExtraPort> {
        Vec::new()
    }

    /// The clock wire domain instances should run on, when the adapter
    /// replaces the raw board clock.
    fn clock_override(&self) -> Option<&'static str> {
        None
    }

    /// Support module definitions emitted next to the top module.
    fn verilog_modules(&self, _fabric: &Bondmachine, _flavor: Flavor) -> String {
        String::new()
    }

    /// The instantiation block spliced into the top module.
    fn verilog_instance(&self, fabric: &Bondmachine, flavor: Flavor) -> String;
}

/// A clock divider: domains run `factor` times slower than the board
/// clock.
#[derive(Debug, Clone, Copy)]
pub struct SlowClock {
    /// Division factor; 1 passes the clock through.
    pub factor: u32,
}

impl ExtraModule for SlowClock {
    fn name(&self) -> &'static str {
        "slowclock"
    }

    fn check(&self, _fabric: &Bondmachine) -> Result<(), FabricError> {
        if self.factor == 0 {
            return Err(FabricError::ExtraModule {
                module: self.name(),
                reason: "slow factor must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    fn clock_override(&self) -> Option<&'static str> {
        Some("slow_clock")
    }

    fn verilog_modules(&self, _fabric: &Bondmachine, _flavor: Flavor) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "module bm_slowclock(clock_in, reset, clock_out);");
        let _ = writeln!(out, "\tparameter FACTOR = 1;");
        let _ = writeln!(out, "\tinput clock_in;");
        let _ = writeln!(out, "\tinput reset;");
        let _ = writeln!(out, "\toutput reg clock_out;");
        let _ = writeln!(out, "\treg [31:0] counter;");
        let _ = writeln!(out, "\talways @(posedge clock_in) begin");
        let _ = writeln!(out, "\t\tif (reset) begin");
        let _ = writeln!(out, "\t\t\tcounter <= #1 'b0;");
        let _ = writeln!(out, "\t\t\tclock_out <= #1 'b0;");
        let _ = writeln!(out, "\t\tend else if (counter == FACTOR - 1) begin");
        let _ = writeln!(out, "\t\t\tcounter <= #1 'b0;");
        let _ = writeln!(out, "\t\t\tclock_out <= #1 ~clock_out;");
        let _ = writeln!(out, "\t\tend else begin");
        let _ = writeln!(out, "\t\t\tcounter <= #1 counter + 1'b1;");
        let _ = writeln!(out, "\t\tend");
        let _ = writeln!(out, "\tend");
        let _ = writeln!(out, "endmodule");
        out
    }

    fn verilog_instance(&self, _fabric: &Bondmachine, _flavor: Flavor) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "\twire slow_clock;");
        let _ = writeln!(
            out,
            "\tbm_slowclock #(.FACTOR({})) slowclock(.clock_in(clock), .reset(reset), .clock_out(slow_clock));",
            self.factor
        );
        out
    }
}

/// A 7-segment display decoder fed by one fabric output.
#[derive(Debug, Clone, Copy)]
pub struct SevenSegment {
    /// The fabric-external output shown on the display.
    pub mapped_output: usize,
}

impl ExtraModule for SevenSegment {
    fn name(&self) -> &'static str {
        "sevensegment"
    }

    fn check(&self, fabric: &Bondmachine) -> Result<(), FabricError> {
        if self.mapped_output >= fabric.outputs {
            return Err(FabricError::ExtraModule {
                module: self.name(),
                reason: format!(
                    "mapped output {} does not exist (outputs: {})",
                    self.mapped_output, fabric.outputs
                ),
            });
        }
        Ok(())
    }

    fn claimed_outputs(&self) -> Vec<usize> {
        vec![self.mapped_output]
    }

    fn extra_ports(&self) -> Vec<ExtraPort> {
        vec![
            ExtraPort {
                name: "seg".to_string(),
                width: 7,
                output: true,
            },
            ExtraPort {
                name: "an".to_string(),
                width: 4,
                output: true,
            },
        ]
    }

    fn verilog_modules(&self, fabric: &Bondmachine, _flavor: Flavor) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "module bm_sevensegment(value, seg, an);");
        let _ = writeln!(out, "\tinput [{}:0] value;", fabric.rsize - 1);
        let _ = writeln!(out, "\toutput reg [6:0] seg;");
        let _ = writeln!(out, "\toutput [3:0] an;");
        let _ = writeln!(out, "\tassign an = 4'b1110;");
        let _ = writeln!(out, "\talways @(*) begin");
        let _ = writeln!(out, "\t\tcase (value[3:0])");
        for (digit, pattern) in [
            "1000000", "1111001", "0100100", "0110000", "0011001", "0010010", "0000010",
            "1111000", "0000000", "0010000", "0001000", "0000011", "1000110", "0100001",
            "0000110", "0001110",
        ]
        .iter()
        .enumerate()
        {
            let _ = writeln!(out, "\t\t\t4'h{digit:x}: seg = 7'b{pattern};");
        }
        let _ = writeln!(out, "\t\tendcase");
        let _ = writeln!(out, "\tend");
        let _ = writeln!(out, "endmodule");
        out
    }

    fn verilog_instance(&self, _fabric: &Bondmachine, _flavor: Flavor) -> String {
        format!(
            "\tbm_sevensegment sevensegment(.value(w_ext_o{}), .seg(seg), .an(an));\n",
            self.mapped_output
        )
    }
}

/// Which network transport a bridge speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum BridgeKind {
    /// Raw-ethernet transport.
    Ether,
    /// UDP transport.
    Udp,
}

impl BridgeKind {
    fn module(&self) -> &'static str {
        match self {
            BridgeKind::Ether => "etherbond_enc28j60",
            BridgeKind::Udp => "udpbond_esp8266",
        }
    }
}

/// A network bridge connecting fabric I/O to remote peers. Only the
/// integration contract is modeled here: the occupied I/O, the peer
/// identity and the instantiation of the transport module; the transport
/// internals are external IP.
#[derive(Debug, Clone)]
pub struct NetBridge {
    /// Transport family.
    pub kind: BridgeKind,
    /// This fabric's peer id inside the cluster.
    pub peer_id: u32,
    /// External inputs fed by the bridge.
    pub inputs: Vec<usize>,
    /// External outputs published by the bridge.
    pub outputs: Vec<usize>,
}

impl ExtraModule for NetBridge {
    fn name(&self) -> &'static str {
        match self.kind {
            BridgeKind::Ether => "etherbond",
            BridgeKind::Udp => "udpbond",
        }
    }

    fn check(&self, fabric: &Bondmachine) -> Result<(), FabricError> {
        for &id in &self.inputs {
            if id >= fabric.inputs {
                return Err(FabricError::ExtraModule {
                    module: self.name(),
                    reason: format!("claimed input {id} does not exist"),
                });
            }
        }
        for &id in &self.outputs {
            if id >= fabric.outputs {
                return Err(FabricError::ExtraModule {
                    module: self.name(),
                    reason: format!("claimed output {id} does not exist"),
                });
            }
        }
        Ok(())
    }

    fn claimed_inputs(&self) -> Vec<usize> {
        self.inputs.clone()
    }

    fn claimed_outputs(&self) -> Vec<usize> {
        self.outputs.clone()
    }

    fn verilog_instance(&self, _fabric: &Bondmachine, _flavor: Flavor) -> String {
        let mut conns = vec![
            ".clock(clock)".to_string(),
            ".reset(reset)".to_string(),
        ];
        conns.extend(self.inputs.iter().map(|id| format!(".i{id}(w_ext_i{id})")));
        conns.extend(self.outputs.iter().map(|id| format!(".o{id}(w_ext_o{id})")));
        format!(
            "\t{} #(.PEER_ID({})) {}({});\n",
            self.kind.module(),
            self.peer_id,
            self.name(),
            conns.join(", ")
        )
    }
}
