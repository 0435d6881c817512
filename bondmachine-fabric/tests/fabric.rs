//! Fabric composition, emulation and emission, end to end.

use bondmachine_fabric::prelude::*;
use bondmachine_proc::prelude::{Arch, Machine, OpcodeSet, Simbox};

fn machine(names: &[&str], source: &str) -> Machine {
    let arch = Arch {
        op: OpcodeSet::from_names(names).unwrap(),
        ..Arch::default()
    };
    let program = arch.assemble(source).unwrap();
    Machine::new(arch, program).unwrap()
}

fn endpoint(text: &str) -> Endpoint {
    text.parse().unwrap()
}

/// D0 copies its input to its output; D1 copies its input into r0. A bond
/// carries D0's output into D1's input.
fn two_domain_fabric() -> Bondmachine {
    let mut fabric = Bondmachine::new(8);
    fabric
        .add_domain(machine(&["i2r", "r2o", "j"], "i2r r0 0\nr2o 0 r0\nj 0\n"))
        .unwrap();
    fabric
        .add_domain(machine(&["i2r", "j"], "i2r r0 0\nj 0\n"))
        .unwrap();
    fabric
        .add_bond(endpoint("d0.output.0"), endpoint("d1.input.0"))
        .unwrap();
    fabric
}

#[test]
fn bond_propagation_carries_a_value_across_domains() {
    let mut vm = Interpreter::new(two_domain_fabric()).unwrap();
    let simbox = Simbox::from_json(
        r#"{ "rules": [
            { "action": "set", "when": { "tick": 0 }, "slot": "d0.input.0", "value": 42 },
            { "action": "get", "when": { "tick": 2 }, "slot": "d1.register.0" }
        ] }"#,
    )
    .unwrap();
    let report = simulate(&mut vm, Some(&simbox), 3).unwrap();
    assert_eq!(report.samples.len(), 1);
    assert_eq!(report.samples[0].value, 42);
    assert_eq!(vm.domain(1).unwrap().register(0), 42);
}

#[test]
fn external_ports_reach_the_domains() {
    let mut fabric = two_domain_fabric();
    assert_eq!(fabric.add_input(), 0);
    assert_eq!(fabric.add_output(), 0);
    fabric
        .add_bond(endpoint("ext.input.0"), endpoint("d0.input.0"))
        .unwrap();
    fabric
        .add_bond(endpoint("d0.output.0"), endpoint("ext.output.0"))
        .unwrap();

    let mut vm = Interpreter::new(fabric).unwrap();
    vm.set_external_input(0, 9).unwrap();
    for _ in 0..3 {
        vm.step().unwrap();
    }
    assert_eq!(vm.external_output(0).unwrap(), 9);
}

#[test]
fn two_consumers_cannot_share_a_direction() {
    let mut fabric = two_domain_fabric();
    assert!(matches!(
        fabric.add_bond(endpoint("d0.input.0"), endpoint("d1.input.0")),
        Err(FabricError::IncompatibleBond { .. })
    ));
}

#[test]
fn one_producer_per_wire() {
    let mut fabric = two_domain_fabric();
    // d1.input.0 is already driven by d0.output.0.
    fabric.add_input();
    assert!(matches!(
        fabric.add_bond(endpoint("ext.input.0"), endpoint("d1.input.0")),
        Err(FabricError::AlreadyDriven(_))
    ));
}

#[test]
fn bonds_require_existing_endpoints() {
    let mut fabric = two_domain_fabric();
    assert!(matches!(
        fabric.add_bond(endpoint("d5.output.0"), endpoint("d1.input.0")),
        Err(FabricError::UnknownEndpoint(_))
    ));
    assert!(matches!(
        fabric.add_bond(endpoint("d0.output.7"), endpoint("d1.input.0")),
        Err(FabricError::UnknownEndpoint(_))
    ));
}

#[test]
fn bonded_domains_cannot_be_deleted() {
    let mut fabric = two_domain_fabric();
    assert!(matches!(
        fabric.del_domain(0),
        Err(FabricError::DomainInUse { id: 0 })
    ));
    fabric.del_bond(0).unwrap();
    fabric.del_domain(0).unwrap();
    assert_eq!(fabric.domains.len(), 1);
}

#[test]
fn domain_ids_are_validated_in_range() {
    let mut fabric = two_domain_fabric();
    assert!(matches!(
        fabric.del_domain(2),
        Err(FabricError::UnknownDomain { id: 2, count: 2 })
    ));
}

#[test]
fn domain_deletion_renumbers_bonds() {
    let mut fabric = two_domain_fabric();
    // A third domain bonded to nothing, then delete the unbonded middle
    // one after clearing its bond.
    fabric
        .add_domain(machine(&["i2r", "j"], "i2r r0 0\nj 0\n"))
        .unwrap();
    fabric.del_bond(0).unwrap();
    fabric
        .add_bond(endpoint("d0.output.0"), endpoint("d2.input.0"))
        .unwrap();
    fabric.del_domain(1).unwrap();
    // d2 became d1; the bond must follow.
    assert_eq!(fabric.links[0].to, endpoint("d1.input.0"));
    fabric.validate().unwrap();
}

#[test]
fn bonded_external_ports_cannot_be_deleted() {
    let mut fabric = two_domain_fabric();
    fabric.add_input();
    fabric
        .add_bond(endpoint("ext.input.0"), endpoint("d0.input.0"))
        .unwrap();
    assert!(matches!(
        fabric.del_input(0),
        Err(FabricError::ExternalInUse { .. })
    ));
}

#[test]
fn input_deletion_renumbers_higher_ids() {
    let mut fabric = two_domain_fabric();
    fabric.add_input();
    fabric.add_input();
    fabric
        .add_bond(endpoint("ext.input.1"), endpoint("d0.input.0"))
        .unwrap();
    fabric.del_input(0).unwrap();
    assert_eq!(fabric.inputs, 1);
    assert_eq!(fabric.links[1].from, endpoint("ext.input.0"));
    fabric.validate().unwrap();
}

#[test]
fn shared_channel_carries_values_between_domains() {
    let mut writer_arch = Arch {
        op: OpcodeSet::from_names(&["rset", "r2s", "j"]).unwrap(),
        ..Arch::default()
    };
    writer_arch.shared_constraints.push("channel".to_string());
    let writer_program = writer_arch.assemble("rset r0 77\nr2s 0 r0\nj 2\n").unwrap();

    let mut reader_arch = Arch {
        op: OpcodeSet::from_names(&["s2r", "j"]).unwrap(),
        ..Arch::default()
    };
    reader_arch.shared_constraints.push("channel".to_string());
    let reader_program = reader_arch.assemble("s2r r1 0\nj 0\n").unwrap();

    let mut fabric = Bondmachine::new(8);
    fabric
        .add_domain(Machine::new(writer_arch, writer_program).unwrap())
        .unwrap();
    fabric
        .add_domain(Machine::new(reader_arch, reader_program).unwrap())
        .unwrap();
    fabric.add_shared_object("channel").unwrap();
    fabric.connect_processor_shared(0, 0).unwrap();
    fabric.connect_processor_shared(1, 0).unwrap();

    let mut vm = Interpreter::new(fabric).unwrap();
    for _ in 0..4 {
        vm.step().unwrap();
    }
    // The writer published 77 on tick 1; the reader's next s2r sees it.
    assert_eq!(vm.domain(1).unwrap().register(1), 77);
}

#[test]
fn shared_links_validate_constraints_and_ids() {
    let mut fabric = two_domain_fabric();
    fabric.add_shared_object("channel").unwrap();
    // Neither domain declares a channel constraint.
    assert!(matches!(
        fabric.connect_processor_shared(0, 0),
        Err(FabricError::ConstraintMismatch { .. })
    ));
    assert!(matches!(
        fabric.connect_processor_shared(0, 3),
        Err(FabricError::UnknownShared { id: 3, .. })
    ));
    assert!(fabric.add_shared_object("semaphore").is_err());
}

#[test]
fn fabric_serialization_round_trips() {
    let fabric = two_domain_fabric();
    let text = fabric.to_json().unwrap();
    let again = Bondmachine::from_json(&text).unwrap();
    assert_eq!(fabric, again);

    // Identical emulation after the round trip.
    let simbox = Simbox::from_json(
        r#"{ "rules": [
            { "action": "set", "when": { "tick": 0 }, "slot": "d0.input.0", "value": 5 },
            { "action": "get", "when": { "every": 1 }, "slot": "d1.register.0" }
        ] }"#,
    )
    .unwrap();
    let mut a = Interpreter::new(fabric).unwrap();
    let mut b = Interpreter::new(again).unwrap();
    let ra = simulate(&mut a, Some(&simbox), 6).unwrap();
    let rb = simulate(&mut b, Some(&simbox), 6).unwrap();
    assert_eq!(ra.samples, rb.samples);
}

#[test]
fn malformed_fabric_documents_are_rejected() {
    let fabric = two_domain_fabric();
    let mut value: serde_json::Value = serde_json::from_str(&fabric.to_json().unwrap()).unwrap();
    value["surprise"] = serde_json::json!(true);
    assert!(Bondmachine::from_json(&value.to_string()).is_err());

    // A dangling bond fails validation on load.
    let mut value: serde_json::Value = serde_json::from_str(&fabric.to_json().unwrap()).unwrap();
    value["links"][0]["to"] = serde_json::json!("d7.input.0");
    assert!(matches!(
        Bondmachine::from_json(&value.to_string()),
        Err(FabricError::UnknownEndpoint(_))
    ));
}

#[test]
fn list_operations_are_stable() {
    let mut fabric = two_domain_fabric();
    fabric.add_input();
    fabric.add_output();
    fabric
        .add_bond(endpoint("d1.output.0"), endpoint("ext.output.0"))
        .unwrap();

    assert_eq!(fabric.list_domains().len(), 2);
    assert_eq!(fabric.list_bonds().len(), 2);
    assert_eq!(fabric.list_inputs(), vec!["ext.input.0 (unbound)"]);
    assert_eq!(
        fabric.list_outputs(),
        vec!["ext.output.0 (driven by d1.output.0)"]
    );
    assert!(fabric
        .list_internal_inputs()
        .contains(&"d1.input.0 (driven by d0.output.0)".to_string()));
}

#[test]
fn dot_rendering_scales_with_detail() {
    let mut fabric = two_domain_fabric();
    fabric.add_input();
    let coarse = dot(&fabric, 1, None, None);
    assert!(coarse.starts_with("digraph bondmachine {"));
    assert!(coarse.contains("d0 -> d1;"));
    assert!(!coarse.contains("ext_input0"));

    let fine = dot(&fabric, 3, None, None);
    assert!(fine.contains("ext_input0"));
    assert!(fine.contains("label=\"output0 -> input0\""));

    let vm = Interpreter::new(fabric).unwrap();
    let mut after = vm.clone();
    let simbox = Simbox::from_json(
        r#"{ "rules": [ { "action": "set", "when": { "tick": 0 }, "slot": "d0.input.0", "value": 3 } ] }"#,
    )
    .unwrap();
    simulate(&mut after, Some(&simbox), 1).unwrap();
    let colored = dot(after.fabric(), 5, Some(&after), Some(&vm));
    assert!(colored.contains("fillcolor=salmon"));
}

#[test]
fn fabric_verilog_covers_every_domain() {
    let mut fabric = two_domain_fabric();
    fabric.add_input();
    fabric.add_output();
    fabric
        .add_bond(endpoint("d1.output.0"), endpoint("ext.output.0"))
        .unwrap();

    let flavor: bondmachine_proc::prelude::Flavor = "iverilog_simulation".parse().unwrap();
    let files = write_verilog(
        &fabric,
        Default::default(),
        flavor,
        &[],
        None,
        16,
    )
    .unwrap();

    let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
    for expected in ["p0.v", "p0rom.v", "a0.v", "p1.v", "bondmachine.v", "testbench.v"] {
        assert!(names.contains(&expected), "missing {expected}");
    }

    let top = &files
        .iter()
        .find(|f| f.name == "bondmachine.v")
        .unwrap()
        .source;
    assert!(top.contains("a0 d0("));
    assert!(top.contains("a1 d1("));
    assert!(top.contains("assign w_d1_i0 = w_d0_o0;"));
    assert!(top.contains("assign w_ext_o0 = w_d1_o0;"));
}

#[test]
fn extra_modules_check_and_claim_io() {
    let mut fabric = two_domain_fabric();
    fabric.add_input();
    fabric.add_output();

    let bad = SlowClock { factor: 0 };
    assert!(bad.check(&fabric).is_err());

    let slow = SlowClock { factor: 4 };
    let seven = SevenSegment { mapped_output: 0 };
    let bridge = NetBridge {
        kind: BridgeKind::Udp,
        peer_id: 3,
        inputs: vec![0],
        outputs: vec![],
    };
    let extras: Vec<&dyn ExtraModule> = vec![&slow, &seven, &bridge];

    let files = write_verilog(
        &fabric,
        Default::default(),
        Default::default(),
        &extras,
        None,
        16,
    )
    .unwrap();
    let top = &files
        .iter()
        .find(|f| f.name == "bondmachine.v")
        .unwrap()
        .source;

    // The divider drives the domains, the display eats output 0, the
    // bridge eats input 0: neither stays a top-level pin.
    assert!(top.contains(".clock(slow_clock)"));
    assert!(top.contains("module bm_slowclock"));
    assert!(top.contains("bm_sevensegment"));
    assert!(top.contains("udpbond_esp8266 #(.PEER_ID(3))"));
    assert!(!top.contains("\tinput i0;"));
    let header = top.lines().next().unwrap();
    assert!(!header.contains("i0"));
    assert!(!header.contains("o0"));
    assert!(header.contains("seg"));

    let seven_bad = SevenSegment { mapped_output: 9 };
    assert!(matches!(
        seven_bad.check(&fabric),
        Err(FabricError::ExtraModule { .. })
    ));
}
