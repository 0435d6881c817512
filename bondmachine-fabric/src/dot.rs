//! Graphviz rendering of a fabric.

use crate::bond::Endpoint;
use crate::fabric::Bondmachine;
use crate::interpreter::Interpreter;
use itertools::Itertools;
use std::fmt::Write as _;

fn node(endpoint: Endpoint) -> String {
    match endpoint {
        Endpoint::Processor { domain, .. } => format!("d{domain}"),
        Endpoint::External { direction, index } => format!("ext_{direction}{index}"),
    }
}

fn port_label(endpoint: Endpoint) -> String {
    match endpoint {
        Endpoint::Processor {
            direction, index, ..
        } => format!("{direction}{index}"),
        Endpoint::External { direction, index } => format!("{direction}{index}"),
    }
}

/// Renders the fabric as a directed graph in dot format.
///
/// The detail level 1..5 controls what is shown: 1 domains and their
/// wires, 2 adds external I/O nodes, 3 adds port labels on edges, 4 adds
/// shared objects, 5 adds register values (needs `vm`). With both `vm`
/// and `prev`, domains whose registers changed since the previous
/// snapshot are highlighted.
pub fn dot(
    fabric: &Bondmachine,
    detail: u8,
    vm: Option<&Interpreter>,
    prev: Option<&Interpreter>,
) -> String {
    let detail = detail.clamp(1, 5);
    let mut out = String::new();
    let _ = writeln!(out, "digraph bondmachine {{");
    let _ = writeln!(out, "\trankdir=LR;");

    for id in 0..fabric.domains.len() {
        let mut label = format!("d{id}");
        if detail >= 5 {
            if let Some(Ok(proc)) = vm.map(|v| v.domain(id)) {
                let regs = proc
                    .registers()
                    .iter()
                    .enumerate()
                    .map(|(i, v)| format!("r{i}={v}"))
                    .join(" ");
                label = format!("d{id}\\n{regs}");
            }
        }
        let changed = match (vm.map(|v| v.domain(id)), prev.map(|p| p.domain(id))) {
            (Some(Ok(now)), Some(Ok(before))) => now.registers() != before.registers(),
            _ => false,
        };
        let color = if changed {
            ", style=filled, fillcolor=salmon"
        } else {
            ""
        };
        let _ = writeln!(out, "\td{id} [shape=box, label=\"{label}\"{color}];");
    }

    if detail >= 2 {
        for i in 0..fabric.inputs {
            let _ = writeln!(out, "\text_input{i} [shape=circle, label=\"i{i}\"];");
        }
        for o in 0..fabric.outputs {
            let _ = writeln!(out, "\text_output{o} [shape=circle, label=\"o{o}\"];");
        }
    }

    if detail >= 4 {
        for (s, object) in fabric.shared_objects.iter().enumerate() {
            let _ = writeln!(out, "\tsh{s} [shape=diamond, label=\"{object}{s}\"];");
        }
        for link in &fabric.processor_shared_links {
            let _ = writeln!(
                out,
                "\td{} -> sh{} [dir=both, style=dashed];",
                link.domain, link.shared
            );
        }
    }

    for bond in &fabric.links {
        let external = bond.from.domain().is_none() || bond.to.domain().is_none();
        if external && detail < 2 {
            continue;
        }
        if detail >= 3 {
            let _ = writeln!(
                out,
                "\t{} -> {} [label=\"{} -> {}\"];",
                node(bond.from),
                node(bond.to),
                port_label(bond.from),
                port_label(bond.to)
            );
        } else {
            let _ = writeln!(out, "\t{} -> {};", node(bond.from), node(bond.to));
        }
    }

    let _ = writeln!(out, "}}");
    out
}
