//! Fabric-level Verilog emission: the top module instantiating every
//! domain, bond wiring, shared-channel arbiters, extra-module splices and
//! the simulation testbench.

use crate::bond::{Direction, Endpoint};
use crate::error::FabricError;
use crate::extra::ExtraModule;
use crate::fabric::Bondmachine;
use bondmachine_proc::verilog::{EmitConfig, Emitter, Flavor};
use bondmachine_simbox::{Action, Simbox, SlotKind, SlotSite, Timing};
use itertools::Itertools;
use std::collections::BTreeSet;
use std::fmt::Write as _;

/// One emitted source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerilogFile {
    /// Suggested file name.
    pub name: String,
    /// Verilog source.
    pub source: String,
}

fn vec_decl(width: usize) -> String {
    if width <= 1 {
        String::new()
    } else {
        format!("[{}:0] ", width - 1)
    }
}

/// The wire carrying a producer endpoint's value inside the top module.
fn producer_wire(endpoint: Endpoint) -> String {
    match endpoint {
        Endpoint::Processor { domain, index, .. } => format!("w_d{domain}_o{index}"),
        Endpoint::External { index, .. } => format!("w_ext_i{index}"),
    }
}

/// Lowers a fabric to Verilog: per-domain modules, the top module, and a
/// testbench when the flavor carries the `_simulation` suffix. Extra
/// modules are spliced in the order given.
pub fn write_verilog(
    fabric: &Bondmachine,
    config: EmitConfig,
    flavor: Flavor,
    extras: &[&dyn ExtraModule],
    simbox: Option<&Simbox>,
    ticks: u64,
) -> Result<Vec<VerilogFile>, FabricError> {
    for extra in extras {
        extra.check(fabric)?;
    }
    fabric.validate()?;

    let claimed_inputs: BTreeSet<usize> =
        extras.iter().flat_map(|e| e.claimed_inputs()).collect();
    let claimed_outputs: BTreeSet<usize> =
        extras.iter().flat_map(|e| e.claimed_outputs()).collect();
    let clock = extras
        .iter()
        .find_map(|e| e.clock_override())
        .unwrap_or("clock");

    let mut files = Vec::new();
    for (d, machine) in fabric.domains.iter().enumerate() {
        let emitter = Emitter::new(machine, config, flavor);
        files.push(VerilogFile {
            name: format!("p{d}.v"),
            source: emitter.processor(&format!("p{d}")),
        });
        files.push(VerilogFile {
            name: format!("p{d}rom.v"),
            source: emitter.rom(&format!("p{d}rom")),
        });
        files.push(VerilogFile {
            name: format!("p{d}ram.v"),
            source: emitter.ram(&format!("p{d}ram")),
        });
        files.push(VerilogFile {
            name: format!("a{d}.v"),
            source: emitter.arch_module(
                &format!("a{d}"),
                &format!("p{d}"),
                &format!("p{d}rom"),
                &format!("p{d}ram"),
            ),
        });
    }

    files.push(VerilogFile {
        name: "bondmachine.v".to_string(),
        source: top_module(fabric, flavor, extras, &claimed_inputs, &claimed_outputs, clock),
    });

    if flavor.simulation {
        files.push(VerilogFile {
            name: "testbench.v".to_string(),
            source: testbench(fabric, simbox, &claimed_inputs, &claimed_outputs, ticks),
        });
    }

    tracing::debug!(files = files.len(), flavor = %flavor, "emitted fabric verilog");
    Ok(files)
}

fn top_module(
    fabric: &Bondmachine,
    flavor: Flavor,
    extras: &[&dyn ExtraModule],
    claimed_inputs: &BTreeSet<usize>,
    claimed_outputs: &BTreeSet<usize>,
    clock: &str,
) -> String {
    let rsize = fabric.rsize as usize;
    let mut out = String::new();

    let mut ports = vec!["clock".to_string(), "reset".to_string()];
    ports.extend(
        (0..fabric.inputs)
            .filter(|i| !claimed_inputs.contains(i))
            .map(|i| format!("i{i}")),
    );
    ports.extend(
        (0..fabric.outputs)
            .filter(|o| !claimed_outputs.contains(o))
            .map(|o| format!("o{o}")),
    );
    for extra in extras {
        ports.extend(extra.extra_ports().into_iter().map(|p| p.name));
    }

    let _ = writeln!(out, "module bondmachine({});", ports.iter().join(", "));
    let _ = writeln!(out, "\tinput clock;");
    let _ = writeln!(out, "\tinput reset;");
    for i in (0..fabric.inputs).filter(|i| !claimed_inputs.contains(i)) {
        let _ = writeln!(out, "\tinput {}i{i};", vec_decl(rsize));
    }
    for o in (0..fabric.outputs).filter(|o| !claimed_outputs.contains(o)) {
        let _ = writeln!(out, "\toutput {}o{o};", vec_decl(rsize));
    }
    for extra in extras {
        for port in extra.extra_ports() {
            let kind = if port.output { "output" } else { "input" };
            let _ = writeln!(out, "\t{kind} {}{};", vec_decl(port.width), port.name);
        }
    }
    out.push('\n');

    // External input wires: board pins or adapter-driven.
    for i in 0..fabric.inputs {
        let _ = writeln!(out, "\twire {}w_ext_i{i};", vec_decl(rsize));
        if !claimed_inputs.contains(&i) {
            let _ = writeln!(out, "\tassign w_ext_i{i} = i{i};");
        }
    }
    // Domain output wires.
    for (d, machine) in fabric.domains.iter().enumerate() {
        for k in 0..machine.arch.outputs() {
            let _ = writeln!(out, "\twire {}w_d{d}_o{k};", vec_decl(rsize));
        }
    }
    // Domain input wires, driven by their bonds or tied low.
    for (d, machine) in fabric.domains.iter().enumerate() {
        for k in 0..machine.arch.inputs() {
            let endpoint = Endpoint::Processor {
                domain: d,
                direction: Direction::Input,
                index: k,
            };
            let _ = writeln!(out, "\twire {}w_d{d}_i{k};", vec_decl(rsize));
            match fabric.driver_of(endpoint) {
                Some(bond) => {
                    let _ = writeln!(out, "\tassign w_d{d}_i{k} = {};", producer_wire(bond.from));
                }
                None => {
                    let _ = writeln!(out, "\tassign w_d{d}_i{k} = 'b0;");
                }
            }
        }
    }
    // External output wires.
    for o in 0..fabric.outputs {
        let endpoint = Endpoint::External {
            direction: Direction::Output,
            index: o,
        };
        let _ = writeln!(out, "\twire {}w_ext_o{o};", vec_decl(rsize));
        match fabric.driver_of(endpoint) {
            Some(bond) => {
                let _ = writeln!(out, "\tassign w_ext_o{o} = {};", producer_wire(bond.from));
            }
            None => {
                let _ = writeln!(out, "\tassign w_ext_o{o} = 'b0;");
            }
        }
        if !claimed_outputs.contains(&o) {
            let _ = writeln!(out, "\tassign o{o} = w_ext_o{o};");
        }
    }
    // Shared-channel wires.
    for (s, _) in fabric.shared_objects.iter().enumerate() {
        let _ = writeln!(out, "\twire {}w_sh{s}_value;", vec_decl(rsize));
        for link in fabric
            .processor_shared_links
            .iter()
            .filter(|l| l.shared == s)
        {
            let d = link.domain;
            let _ = writeln!(out, "\twire {}w_sh{s}_d{d}_out;", vec_decl(rsize));
            let _ = writeln!(out, "\twire w_sh{s}_d{d}_we;");
        }
    }
    out.push('\n');

    // Extra-module instances, in the order they were added.
    for extra in extras {
        out.push_str(&extra.verilog_instance(fabric, flavor));
    }
    out.push('\n');

    // Domain instances.
    for (d, machine) in fabric.domains.iter().enumerate() {
        let mut conns = vec![format!(".clock({clock})"), ".reset(reset)".to_string()];
        conns.extend(
            (0..machine.arch.inputs()).map(|k| format!(".i{k}(w_d{d}_i{k})")),
        );
        conns.extend(
            (0..machine.arch.outputs()).map(|k| format!(".o{k}(w_d{d}_o{k})")),
        );
        for (slot, link) in fabric.domain_shared_links(d).iter().enumerate() {
            let s = link.shared;
            conns.push(format!(".sh{slot}_in(w_sh{s}_value)"));
            conns.push(format!(".sh{slot}_out(w_sh{s}_d{d}_out)"));
            conns.push(format!(".sh{slot}_we(w_sh{s}_d{d}_we)"));
        }
        let _ = writeln!(out, "\ta{d} d{d}({});", conns.iter().join(", "));
    }

    // Shared-channel arbiters.
    for (s, _) in fabric.shared_objects.iter().enumerate() {
        let writers: Vec<usize> = fabric
            .processor_shared_links
            .iter()
            .filter(|l| l.shared == s)
            .map(|l| l.domain)
            .sorted()
            .collect();
        let mut conns = vec![".clock(clock)".to_string(), ".reset(reset)".to_string()];
        conns.extend(
            writers
                .iter()
                .map(|d| format!(".we_d{d}(w_sh{s}_d{d}_we), .din_d{d}(w_sh{s}_d{d}_out)")),
        );
        conns.push(format!(".dout(w_sh{s}_value)"));
        let _ = writeln!(out, "\tbm_channel_{s} channel{s}({});", conns.iter().join(", "));
    }

    let _ = writeln!(out, "endmodule");

    // Channel arbiter modules: on conflicting writes in one cycle, the
    // highest-ordered domain wins.
    for (s, _) in fabric.shared_objects.iter().enumerate() {
        let writers: Vec<usize> = fabric
            .processor_shared_links
            .iter()
            .filter(|l| l.shared == s)
            .map(|l| l.domain)
            .sorted()
            .collect();
        out.push('\n');
        let mut ports = vec!["clock".to_string(), "reset".to_string()];
        for d in &writers {
            ports.push(format!("we_d{d}"));
            ports.push(format!("din_d{d}"));
        }
        ports.push("dout".to_string());
        let _ = writeln!(out, "module bm_channel_{s}({});", ports.iter().join(", "));
        let _ = writeln!(out, "\tinput clock;");
        let _ = writeln!(out, "\tinput reset;");
        for d in &writers {
            let _ = writeln!(out, "\tinput we_d{d};");
            let _ = writeln!(out, "\tinput {}din_d{d};", vec_decl(rsize));
        }
        let _ = writeln!(out, "\toutput {}dout;", vec_decl(rsize));
        let _ = writeln!(out, "\treg {}value;", vec_decl(rsize));
        let _ = writeln!(out, "\tassign dout = value;");
        let _ = writeln!(out, "\talways @(posedge clock) begin");
        let _ = writeln!(out, "\t\tif (reset) begin");
        let _ = writeln!(out, "\t\t\tvalue <= #1 'b0;");
        let _ = writeln!(out, "\t\tend else begin");
        for d in &writers {
            let _ = writeln!(out, "\t\t\tif (we_d{d})");
            let _ = writeln!(out, "\t\t\t\tvalue <= #1 din_d{d};");
        }
        let _ = writeln!(out, "\t\tend");
        let _ = writeln!(out, "\tend");
        let _ = writeln!(out, "endmodule");
    }

    // Extra-module support definitions.
    for extra in extras {
        let source = extra.verilog_modules(fabric, flavor);
        if !source.is_empty() {
            out.push('\n');
            out.push_str(&source);
        }
    }

    out
}

fn testbench(
    fabric: &Bondmachine,
    simbox: Option<&Simbox>,
    claimed_inputs: &BTreeSet<usize>,
    claimed_outputs: &BTreeSet<usize>,
    ticks: u64,
) -> String {
    let rsize = fabric.rsize as usize;
    let period = 10u64;
    let free_inputs: Vec<usize> = (0..fabric.inputs)
        .filter(|i| !claimed_inputs.contains(i))
        .collect();
    let free_outputs: Vec<usize> = (0..fabric.outputs)
        .filter(|o| !claimed_outputs.contains(o))
        .collect();

    let mut out = String::new();
    let _ = writeln!(out, "module testbench;");
    let _ = writeln!(out, "\treg clock;");
    let _ = writeln!(out, "\treg reset;");
    for i in &free_inputs {
        let _ = writeln!(out, "\treg {}i{i};", vec_decl(rsize));
    }
    for o in &free_outputs {
        let _ = writeln!(out, "\twire {}o{o};", vec_decl(rsize));
    }
    let mut conns = vec![".clock(clock)".to_string(), ".reset(reset)".to_string()];
    conns.extend(free_inputs.iter().map(|i| format!(".i{i}(i{i})")));
    conns.extend(free_outputs.iter().map(|o| format!(".o{o}(o{o})")));
    let _ = writeln!(out, "\tbondmachine dut({});", conns.iter().join(", "));
    out.push('\n');
    let _ = writeln!(out, "\talways #{} clock = ~clock;", period / 2);
    out.push('\n');
    let _ = writeln!(out, "\tinitial begin");
    let _ = writeln!(out, "\t\tclock = 1'b0;");
    let _ = writeln!(out, "\t\treset = 1'b1;");
    for i in &free_inputs {
        let _ = writeln!(out, "\t\ti{i} = 'b0;");
    }
    let _ = writeln!(out, "\t\t#{period} reset = 1'b0;");

    let mut elapsed = 0;
    if let Some(simbox) = simbox {
        let mut events: Vec<(u64, usize, u64)> = simbox
            .rules_for(Action::Set)
            .filter_map(|rule| match (rule.when, rule.slot.site, rule.slot.kind) {
                (Timing::Absolute { tick }, SlotSite::External, SlotKind::Input)
                    if !claimed_inputs.contains(&rule.slot.index) =>
                {
                    Some((tick, rule.slot.index, rule.value.unwrap_or_default()))
                }
                _ => None,
            })
            .collect();
        events.sort();
        for (tick, port, value) in events {
            let at = tick * period;
            if at > elapsed {
                let _ = writeln!(out, "\t\t#{} ;", at - elapsed);
            }
            let _ = writeln!(out, "\t\ti{port} = {value};");
            elapsed = at.max(elapsed);
        }
    }
    let total = ticks * period + period;
    let _ = writeln!(out, "\t\t#{} $finish;", total.saturating_sub(elapsed));
    let _ = writeln!(out, "\tend");
    out.push('\n');
    if !free_outputs.is_empty() {
        let fmt = free_outputs.iter().map(|o| format!("o{o} %d")).join(" ");
        let args = free_outputs.iter().map(|o| format!("o{o}")).join(", ");
        let _ = writeln!(out, "\talways @(posedge clock)");
        let _ = writeln!(out, "\t\t$display(\"{fmt}\", {args});");
    }
    let _ = writeln!(out, "endmodule");
    out
}
