//! Per-processor Verilog emission.
//!
//! The processor module is stitched from fixed splice points: handler
//! headers, flag and register declarations, per-opcode internal state, an
//! `always` block whose body is a `case` over the opcode prefix built from
//! each handler's state-machine fragment, and handler footers. ROM, RAM,
//! a wrapping architecture module and a simulation testbench are emitted
//! alongside.

use crate::arch::Arch;
use crate::bits::fixed_bits;
use crate::error::ArchError;
use crate::machine::Machine;
use crate::opcode::RunFlags;
use bondmachine_simbox::{Action, Simbox, SlotKind, SlotSite, Timing};
use itertools::Itertools;
use std::fmt::Write as _;
use std::str::FromStr;

/// Device family the emitted Verilog targets. Device-specific template
/// sets hang off this hook; the portable `iverilog` flavor is built in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display, strum::EnumString)]
#[non_exhaustive]
pub enum Target {
    /// Portable Verilog for icarus-style simulators.
    #[default]
    #[strum(serialize = "iverilog")]
    Iverilog,
}

/// Emission flavor: a target plus the `_simulation` switch that turns on
/// testbench generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flavor {
    /// Target device family.
    pub target: Target,
    /// Whether simulation artifacts (testbench) are generated.
    pub simulation: bool,
}

impl FromStr for Flavor {
    type Err = ArchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, simulation) = match s.strip_suffix("_simulation") {
            Some(base) => (base, true),
            None => (s, false),
        };
        let target =
            Target::from_str(name).map_err(|_| ArchError::UnknownFlavor(s.to_string()))?;
        Ok(Flavor { target, simulation })
    }
}

impl std::fmt::Display for Flavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.target)?;
        if self.simulation {
            write!(f, "_simulation")?;
        }
        Ok(())
    }
}

/// Options of the emitter.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmitConfig {
    /// Add banner comments around the spliced sections.
    pub commented: bool,
}

/// Emits the Verilog rendition of one machine.
#[derive(Debug, Clone, Copy)]
pub struct Emitter<'a> {
    machine: &'a Machine,
    config: EmitConfig,
    flavor: Flavor,
}

fn vec_decl(width: usize) -> String {
    if width <= 1 {
        String::new()
    } else {
        format!("[{}:0] ", width - 1)
    }
}

impl<'a> Emitter<'a> {
    /// An emitter over a machine.
    pub fn new(machine: &'a Machine, config: EmitConfig, flavor: Flavor) -> Self {
        Emitter {
            machine,
            config,
            flavor,
        }
    }

    fn arch(&self) -> &Arch {
        &self.machine.arch
    }

    fn banner(&self, out: &mut String, what: &str) {
        if self.config.commented {
            let _ = writeln!(out, "\t// {what}");
        }
    }

    fn uses_ram(&self) -> bool {
        ["m2r", "r2m"]
            .into_iter()
            .any(|n| self.arch().op.index_of(n).is_some())
    }

    /// The processor module: FSM over the enabled opcodes.
    pub fn processor(&self, name: &str) -> String {
        let arch = self.arch();
        let flags = self.machine.run_flags();
        let rsize = arch.rsize as usize;
        let opbits = arch.opcodes_bits();
        let max_word = arch.max_word();
        let uses_ram = self.uses_ram();
        let channels = arch.shared_constraints.len();

        tracing::debug!(module = name, flavor = %self.flavor, "emitting processor");

        let mut ports = vec!["clock".to_string(), "reset".to_string()];
        ports.push("rom_value".to_string());
        ports.push("rom_addr".to_string());
        ports.extend((0..arch.inputs()).map(|i| format!("i{i}")));
        ports.extend((0..arch.outputs()).map(|i| format!("o{i}")));
        if uses_ram {
            ports.extend(
                ["ram_addr", "ram_din", "ram_dout", "ram_we"]
                    .iter()
                    .map(|s| s.to_string()),
            );
        }
        for id in 0..channels {
            ports.push(format!("sh{id}_in"));
            ports.push(format!("sh{id}_out"));
            ports.push(format!("sh{id}_we"));
        }

        let mut out = String::new();
        let _ = writeln!(out, "module {name}({});", ports.iter().join(", "));
        let _ = writeln!(out, "\tinput clock;");
        let _ = writeln!(out, "\tinput reset;");
        let _ = writeln!(out, "\tinput {}rom_value;", vec_decl(max_word));
        let _ = writeln!(out, "\toutput {}rom_addr;", vec_decl(arch.o as usize));
        for i in 0..arch.inputs() {
            let _ = writeln!(out, "\tinput {}i{i};", vec_decl(rsize));
        }
        for i in 0..arch.outputs() {
            let _ = writeln!(out, "\toutput {}o{i};", vec_decl(rsize));
        }
        if uses_ram {
            let _ = writeln!(out, "\toutput reg {}ram_addr;", vec_decl(arch.l as usize));
            let _ = writeln!(out, "\toutput reg {}ram_din;", vec_decl(rsize));
            let _ = writeln!(out, "\tinput {}ram_dout;", vec_decl(rsize));
            let _ = writeln!(out, "\toutput reg ram_we;");
        }
        for id in 0..channels {
            let _ = writeln!(out, "\tinput {}sh{id}_in;", vec_decl(rsize));
            let _ = writeln!(out, "\toutput reg {}sh{id}_out;", vec_decl(rsize));
            let _ = writeln!(out, "\toutput reg sh{id}_we;");
        }
        out.push('\n');

        self.banner(&mut out, "internal state");
        let _ = writeln!(out, "\treg {}_pc;", vec_decl(arch.o as usize));
        for i in 0..arch.registers() {
            let _ = writeln!(out, "\treg {}_r{i};", vec_decl(rsize));
        }
        if flags.contains(RunFlags::CARRY) {
            let _ = writeln!(out, "\treg carryflag;");
        }
        for i in 0..arch.outputs() {
            let _ = writeln!(out, "\treg {}_o{i};", vec_decl(rsize));
            let _ = writeln!(out, "\tassign o{i} = _o{i};");
        }
        let _ = writeln!(out, "\tassign rom_addr = _pc;");
        out.push('\n');

        // Handler headers, deduplicated: several opcodes may declare the
        // same support state.
        let headers: Vec<String> = arch
            .op
            .iter()
            .map(|op| op.verilog_header(arch, self.flavor))
            .filter(|h| !h.is_empty())
            .unique()
            .collect();
        for header in headers {
            out.push_str(&header);
        }

        self.banner(&mut out, "opcode encoding");
        let width = opbits.max(1);
        let params = arch
            .op
            .iter()
            .enumerate()
            .map(|(i, op)| {
                format!(
                    "{} = {}'b{}",
                    op.name().to_uppercase(),
                    width,
                    fixed_bits(i as u64, width)
                )
            })
            .join(",\n\t           ");
        if !arch.op.is_empty() {
            let _ = writeln!(out, "\tlocalparam {params};");
        }
        out.push('\n');

        for op in arch.op.iter() {
            out.push_str(&op.verilog_internal_state(arch, self.flavor));
        }

        self.banner(&mut out, "state machine");
        let _ = writeln!(out, "\talways @(posedge clock) begin");
        let _ = writeln!(out, "\t\tif (reset) begin");
        let _ = writeln!(out, "\t\t\t_pc <= #1 'b0;");
        for i in 0..arch.registers() {
            let _ = writeln!(out, "\t\t\t_r{i} <= #1 'b0;");
        }
        if flags.contains(RunFlags::CARRY) {
            let _ = writeln!(out, "\t\t\tcarryflag <= #1 'b0;");
        }
        for i in 0..arch.outputs() {
            let _ = writeln!(out, "\t\t\t_o{i} <= #1 'b0;");
        }
        if uses_ram {
            let _ = writeln!(out, "\t\t\tram_we <= #1 'b0;");
        }
        for id in 0..channels {
            let _ = writeln!(out, "\t\t\tsh{id}_out <= #1 'b0;");
            let _ = writeln!(out, "\t\t\tsh{id}_we <= #1 'b0;");
        }
        for op in arch.op.iter() {
            out.push_str(&op.verilog_reset(arch, self.flavor));
        }
        let _ = writeln!(out, "\t\tend else begin");
        for op in arch.op.iter() {
            out.push_str(&op.verilog_default_state(arch, self.flavor));
        }

        let opfield = if opbits == 0 {
            "1'b0".to_string()
        } else if opbits == 1 {
            format!("rom_value[{}]", max_word - 1)
        } else {
            format!("rom_value[{}:{}]", max_word - 1, max_word - opbits)
        };
        let _ = writeln!(out, "\t\t\tcase ({opfield})");
        for op in arch.op.iter() {
            out.push_str(&op.verilog_state_machine(arch, self.flavor));
        }
        let _ = writeln!(out, "\t\t\t\tdefault: begin");
        let _ = writeln!(out, "\t\t\t\t\t_pc <= #1 _pc + 1'b1;");
        let _ = writeln!(out, "\t\t\t\tend");
        let _ = writeln!(out, "\t\t\tendcase");
        let _ = writeln!(out, "\t\tend");
        let _ = writeln!(out, "\tend");

        for op in arch.op.iter() {
            out.push_str(&op.verilog_footer(arch, self.flavor));
        }
        let _ = writeln!(out, "endmodule");

        // Support modules requested by handlers, deduplicated by name.
        for module in arch
            .op
            .iter()
            .flat_map(|op| op.verilog_extra_modules(arch, self.flavor))
            .unique_by(|m| m.name.clone())
        {
            out.push('\n');
            out.push_str(&module.source);
        }

        out
    }

    /// The program ROM: a combinational lookup over the stored words.
    pub fn rom(&self, name: &str) -> String {
        let arch = self.arch();
        let width = arch.max_word().max(1);
        let mut out = String::new();
        let _ = writeln!(out, "module {name}(addr, value);");
        let _ = writeln!(out, "\tinput {}addr;", vec_decl(arch.o as usize));
        let _ = writeln!(out, "\toutput reg {}value;", vec_decl(width));
        let _ = writeln!(out, "\talways @(*) begin");
        let _ = writeln!(out, "\t\tcase (addr)");
        for (address, sloc) in self.machine.program.slocs.iter().enumerate() {
            let word = if sloc.is_empty() {
                "0".to_string()
            } else {
                sloc.clone()
            };
            let _ = writeln!(
                out,
                "\t\t\t{}'d{address}: value = {}'b{word};",
                arch.o, width
            );
        }
        let _ = writeln!(out, "\t\t\tdefault: value = {width}'b0;");
        let _ = writeln!(out, "\t\tendcase");
        let _ = writeln!(out, "\tend");
        let _ = writeln!(out, "endmodule");
        out
    }

    /// The data RAM: asynchronous read, synchronous write.
    pub fn ram(&self, name: &str) -> String {
        let arch = self.arch();
        let rsize = arch.rsize as usize;
        let mut out = String::new();
        let _ = writeln!(out, "module {name}(clock, addr, din, we, dout);");
        let _ = writeln!(out, "\tinput clock;");
        let _ = writeln!(out, "\tinput {}addr;", vec_decl(arch.l as usize));
        let _ = writeln!(out, "\tinput {}din;", vec_decl(rsize));
        let _ = writeln!(out, "\tinput we;");
        let _ = writeln!(out, "\toutput {}dout;", vec_decl(rsize));
        let _ = writeln!(
            out,
            "\treg {}mem [0:{}];",
            vec_decl(rsize),
            arch.ram_cells() - 1
        );
        let _ = writeln!(out, "\tassign dout = mem[addr];");
        let _ = writeln!(out, "\talways @(posedge clock) begin");
        let _ = writeln!(out, "\t\tif (we)");
        let _ = writeln!(out, "\t\t\tmem[addr] <= #1 din;");
        let _ = writeln!(out, "\tend");
        let _ = writeln!(out, "endmodule");
        out
    }

    /// The wrapping architecture module: processor + ROM (+ RAM), wired.
    pub fn arch_module(
        &self,
        name: &str,
        proc_name: &str,
        rom_name: &str,
        ram_name: &str,
    ) -> String {
        let arch = self.arch();
        let rsize = arch.rsize as usize;
        let uses_ram = self.uses_ram();
        let channels = arch.shared_constraints.len();

        let mut ports = vec!["clock".to_string(), "reset".to_string()];
        ports.extend((0..arch.inputs()).map(|i| format!("i{i}")));
        ports.extend((0..arch.outputs()).map(|i| format!("o{i}")));
        for id in 0..channels {
            ports.push(format!("sh{id}_in"));
            ports.push(format!("sh{id}_out"));
            ports.push(format!("sh{id}_we"));
        }

        let mut out = String::new();
        let _ = writeln!(out, "module {name}({});", ports.iter().join(", "));
        let _ = writeln!(out, "\tinput clock;");
        let _ = writeln!(out, "\tinput reset;");
        for i in 0..arch.inputs() {
            let _ = writeln!(out, "\tinput {}i{i};", vec_decl(rsize));
        }
        for i in 0..arch.outputs() {
            let _ = writeln!(out, "\toutput {}o{i};", vec_decl(rsize));
        }
        for id in 0..channels {
            let _ = writeln!(out, "\tinput {}sh{id}_in;", vec_decl(rsize));
            let _ = writeln!(out, "\toutput {}sh{id}_out;", vec_decl(rsize));
            let _ = writeln!(out, "\toutput sh{id}_we;");
        }
        out.push('\n');
        let _ = writeln!(out, "\twire {}rom_addr;", vec_decl(arch.o as usize));
        let _ = writeln!(out, "\twire {}rom_value;", vec_decl(arch.max_word().max(1)));
        if uses_ram {
            let _ = writeln!(out, "\twire {}ram_addr;", vec_decl(arch.l as usize));
            let _ = writeln!(out, "\twire {}ram_din;", vec_decl(rsize));
            let _ = writeln!(out, "\twire {}ram_dout;", vec_decl(rsize));
            let _ = writeln!(out, "\twire ram_we;");
        }
        out.push('\n');

        let mut conns = vec![
            ".clock(clock)".to_string(),
            ".reset(reset)".to_string(),
            ".rom_value(rom_value)".to_string(),
            ".rom_addr(rom_addr)".to_string(),
        ];
        conns.extend((0..arch.inputs()).map(|i| format!(".i{i}(i{i})")));
        conns.extend((0..arch.outputs()).map(|i| format!(".o{i}(o{i})")));
        if uses_ram {
            conns.extend(
                [
                    ".ram_addr(ram_addr)",
                    ".ram_din(ram_din)",
                    ".ram_dout(ram_dout)",
                    ".ram_we(ram_we)",
                ]
                .iter()
                .map(|s| s.to_string()),
            );
        }
        for id in 0..channels {
            conns.push(format!(".sh{id}_in(sh{id}_in)"));
            conns.push(format!(".sh{id}_out(sh{id}_out)"));
            conns.push(format!(".sh{id}_we(sh{id}_we)"));
        }
        let _ = writeln!(out, "\t{proc_name} processor({});", conns.iter().join(", "));
        let _ = writeln!(
            out,
            "\t{rom_name} rom(.addr(rom_addr), .value(rom_value));"
        );
        if uses_ram {
            let _ = writeln!(
                out,
                "\t{ram_name} ram(.clock(clock), .addr(ram_addr), .din(ram_din), .we(ram_we), .dout(ram_dout));"
            );
        }
        let _ = writeln!(out, "endmodule");
        out
    }

    /// A simulation testbench driving the architecture module: clock
    /// generation, simbox-driven input stimulus, `$display` observation.
    /// Only meaningful for a `_simulation` flavor.
    pub fn testbench(
        &self,
        name: &str,
        arch_name: &str,
        simbox: Option<&Simbox>,
        ticks: u64,
    ) -> String {
        let arch = self.arch();
        let rsize = arch.rsize as usize;
        let period = 10u64;

        let mut out = String::new();
        let _ = writeln!(out, "module {name};");
        let _ = writeln!(out, "\treg clock;");
        let _ = writeln!(out, "\treg reset;");
        for i in 0..arch.inputs() {
            let _ = writeln!(out, "\treg {}i{i};", vec_decl(rsize));
        }
        for i in 0..arch.outputs() {
            let _ = writeln!(out, "\twire {}o{i};", vec_decl(rsize));
        }
        let mut conns = vec![".clock(clock)".to_string(), ".reset(reset)".to_string()];
        conns.extend((0..arch.inputs()).map(|i| format!(".i{i}(i{i})")));
        conns.extend((0..arch.outputs()).map(|i| format!(".o{i}(o{i})")));
        let _ = writeln!(out, "\t{arch_name} dut({});", conns.iter().join(", "));
        out.push('\n');
        let _ = writeln!(out, "\talways #{} clock = ~clock;", period / 2);
        out.push('\n');
        let _ = writeln!(out, "\tinitial begin");
        let _ = writeln!(out, "\t\tclock = 1'b0;");
        let _ = writeln!(out, "\t\treset = 1'b1;");
        for i in 0..arch.inputs() {
            let _ = writeln!(out, "\t\ti{i} = 'b0;");
        }
        let _ = writeln!(out, "\t\t#{period} reset = 1'b0;");

        // Absolute input injections from the simbox, in tick order.
        if let Some(simbox) = simbox {
            let mut events: Vec<(u64, usize, u64)> = simbox
                .rules_for(Action::Set)
                .filter_map(|rule| match (rule.when, rule.slot.site, rule.slot.kind) {
                    (Timing::Absolute { tick }, SlotSite::Domain(0), SlotKind::Input) => {
                        Some((tick, rule.slot.index, rule.value.unwrap_or_default()))
                    }
                    _ => None,
                })
                .collect();
            events.sort();
            let mut elapsed = 0;
            for (tick, port, value) in events {
                let at = tick * period;
                if at > elapsed {
                    let _ = writeln!(out, "\t\t#{} ;", at - elapsed);
                }
                let _ = writeln!(out, "\t\ti{port} = {value};");
                elapsed = at.max(elapsed);
            }
            let total = ticks * period + period;
            let _ = writeln!(out, "\t\t#{} $finish;", total.saturating_sub(elapsed));
        } else {
            let _ = writeln!(out, "\t\t#{} $finish;", ticks * period + period);
        }
        let _ = writeln!(out, "\tend");
        out.push('\n');
        if arch.outputs() > 0 {
            let fmt = (0..arch.outputs()).map(|i| format!("o{i} %d")).join(" ");
            let args = (0..arch.outputs()).map(|i| format!("o{i}")).join(", ");
            let _ = writeln!(out, "\talways @(posedge clock)");
            let _ = writeln!(out, "\t\t$display(\"{fmt}\", {args});");
        }
        let _ = writeln!(out, "endmodule");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::{Arch, OpcodeSet};

    fn machine(names: &[&str], source: &str) -> Machine {
        let arch = Arch {
            op: OpcodeSet::from_names(names).unwrap(),
            ..Arch::default()
        };
        let program = arch.assemble(source).unwrap();
        Machine::new(arch, program).unwrap()
    }

    #[test]
    fn flavor_strings_round_trip() {
        let plain: Flavor = "iverilog".parse().unwrap();
        assert!(!plain.simulation);
        let sim: Flavor = "iverilog_simulation".parse().unwrap();
        assert!(sim.simulation);
        assert_eq!(sim.to_string(), "iverilog_simulation");
        assert!("de10nano".parse::<Flavor>().is_err());
    }

    #[test]
    fn processor_has_one_case_arm_per_opcode() {
        let m = machine(&["nop", "clc", "jz", "add"], "clc\n");
        let emitter = Emitter::new(&m, EmitConfig::default(), Flavor::default());
        let text = emitter.processor("p0");
        for label in ["NOP:", "CLC:", "JZ:", "ADD:"] {
            assert!(text.contains(label), "missing {label}");
        }
        assert!(text.contains("reg carryflag;"));
        assert!(text.contains("module p0("));
        assert!(text.contains("endmodule"));
    }

    #[test]
    fn carry_register_tracks_the_flag_set() {
        let m = machine(&["nop", "jz"], "nop\n");
        let emitter = Emitter::new(&m, EmitConfig::default(), Flavor::default());
        assert!(!emitter.processor("p0").contains("carryflag"));
    }

    #[test]
    fn rom_encodes_the_program() {
        let m = machine(&["jz", "clc"], "jz r0 3\nclc\n");
        let emitter = Emitter::new(&m, EmitConfig::default(), Flavor::default());
        let text = emitter.rom("p0rom");
        assert!(text.contains("8'd0: value = 12'b100000000011;"));
        assert!(text.contains("default: value = 12'b0;"));
    }

    #[test]
    fn ram_ports_appear_only_with_memory_opcodes() {
        let with = machine(&["m2r", "r2m", "nop"], "nop\n");
        let without = machine(&["nop", "clc"], "nop\n");
        let config = EmitConfig::default();
        assert!(Emitter::new(&with, config, Flavor::default())
            .processor("p0")
            .contains("ram_we"));
        assert!(!Emitter::new(&without, config, Flavor::default())
            .processor("p0")
            .contains("ram_we"));
    }

    #[test]
    fn testbench_injects_simbox_inputs() {
        let m = machine(&["i2r", "r2o", "nop"], "i2r r0 0\nr2o 0 r0\n");
        let simbox = Simbox::from_json(
            r#"{ "rules": [
                { "action": "set", "when": { "tick": 2 }, "slot": "d0.input.0", "value": 42 }
            ] }"#,
        )
        .unwrap();
        let flavor: Flavor = "iverilog_simulation".parse().unwrap();
        let emitter = Emitter::new(&m, EmitConfig::default(), flavor);
        let text = emitter.testbench("testbench", "a0", Some(&simbox), 10);
        assert!(text.contains("i0 = 42;"));
        assert!(text.contains("$finish"));
    }
}
