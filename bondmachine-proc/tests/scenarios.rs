//! End-to-end scenarios over assembly, execution and serialization.

use bondmachine_proc::prelude::*;

fn arch(names: &[&str]) -> Arch {
    Arch {
        op: OpcodeSet::from_names(names).unwrap(),
        ..Arch::default()
    }
}

fn build(names: &[&str], source: &str) -> Interpreter {
    let arch = arch(names);
    let program = arch.assemble(source).unwrap();
    Interpreter::new(Machine::new(arch, program).unwrap())
}

#[test]
fn stepping_an_empty_program_is_fatal() {
    let mut vm = Interpreter::new(Machine::bare(arch(&["nop"])));
    assert!(matches!(
        vm.step(),
        Err(RuntimeError::PcOutOfProgram { pc: 0, len: 0 })
    ));
}

#[test]
fn ten_nops_leave_the_registers_alone() {
    let mut vm = build(&["nop"], &"nop\n".repeat(10));
    for _ in 0..10 {
        assert_eq!(vm.step().unwrap(), ExecuteState::Proceed);
    }
    assert_eq!(vm.pc(), 10);
    assert!(vm.registers().iter().all(|&r| r == 0));
}

#[test]
fn clc_clears_the_carry_flag() {
    let mut vm = build(&["clc", "nop"], "clc\n");
    vm.set_carry(true);
    vm.step().unwrap();
    assert!(!vm.carry());
    assert_eq!(vm.pc(), 1);
}

#[test]
fn jz_taken_on_a_zero_register() {
    let mut vm = build(&["jz", "clc"], "clc\njz r0 0\n");
    vm.step().unwrap();
    assert_eq!(vm.pc(), 1);
    vm.step().unwrap();
    assert_eq!(vm.pc(), 0, "r0 == 0, the jump is taken");
}

#[test]
fn jz_not_taken_on_a_nonzero_register() {
    let mut vm = build(&["jz", "clc"], "clc\njz r1 5\n");
    vm.step().unwrap();
    vm.set_register(1, 1);
    vm.step().unwrap();
    assert_eq!(vm.pc(), 2, "r1 != 0, fall through");
}

#[test]
fn documented_jz_encoding() {
    // With {jz, clc}, R=3, O=8: the word is
    // <opcode(jz)><reg 000><address 00000011>, no padding needed.
    let arch = arch(&["jz", "clc"]);
    let program = arch.assemble("jz r0 3\nclc\n").unwrap();
    let opbits = arch.opcodes_bits();
    assert_eq!(opbits, 1);
    assert_eq!(program.slocs[0].len(), arch.max_word());
    assert_eq!(&program.slocs[0][opbits..opbits + 3], "000");
    assert_eq!(&program.slocs[0][opbits + 3..], "00000011");
    assert_eq!(
        arch.disassemble_word(0, &program.slocs[0]).unwrap(),
        "jz r0 3"
    );
}

#[test]
fn halt_parks_the_vm() {
    let mut vm = build(&["hlt", "inc"], "inc r0\nhlt\ninc r0\n");
    vm.step().unwrap();
    assert_eq!(vm.step().unwrap(), ExecuteState::Halt);
    let pc = vm.pc();
    // Further steps keep reporting the halt without touching state.
    assert_eq!(vm.step().unwrap(), ExecuteState::Halt);
    assert_eq!(vm.pc(), pc);
    assert_eq!(vm.register(0), 1);
}

#[test]
fn serialized_machines_replay_identically() {
    let names = &["rset", "add", "jz", "r2o", "nop"];
    let source = "rset r0 3\nrset r1 5\nadd r0 r1\nr2o 0 r0\njz r2 0\n";
    let machine = {
        let arch = arch(names);
        let program = arch.assemble(source).unwrap();
        Machine::new(arch, program).unwrap()
    };

    let reloaded = Machine::from_json(&machine.to_json().unwrap()).unwrap();
    assert_eq!(machine.program.slocs, reloaded.program.slocs);

    let mut a = Interpreter::new(machine);
    let mut b = Interpreter::new(reloaded);
    for _ in 0..16 {
        let sa = a.step().unwrap();
        let sb = b.step().unwrap();
        assert_eq!(sa, sb);
        assert_eq!(a.pc(), b.pc());
        assert_eq!(a.registers(), b.registers());
        assert_eq!(a.outputs(), b.outputs());
    }
    assert_eq!(a.output(0).unwrap(), 8);
}

#[test]
fn arithmetic_wraps_at_the_register_width() {
    let mut vm = build(&["rset", "add", "jc", "nop"], "rset r0 255\nrset r1 2\nadd r0 r1\njc 0\n");
    vm.step().unwrap();
    vm.step().unwrap();
    vm.step().unwrap();
    assert_eq!(vm.register(0), 1, "255 + 2 wraps to 1 at 8 bits");
    assert!(vm.carry());
    vm.step().unwrap();
    assert_eq!(vm.pc(), 0, "jc follows the carry");
}

#[test]
fn ram_round_trips_through_memory_opcodes() {
    let mut vm = build(
        &["rset", "r2m", "m2r", "nop"],
        "rset r0 77\nr2m 9 r0\nm2r r3 9\n",
    );
    for _ in 0..3 {
        vm.step().unwrap();
    }
    assert_eq!(vm.register(3), 77);
}

#[test]
fn shared_channels_require_a_binding() {
    let unbound = arch(&["s2r", "r2s", "nop"]);
    assert!(!Machine::bare(unbound).constraint_check().ok());

    let mut bound = arch(&["s2r", "r2s", "rset", "nop"]);
    bound.shared_constraints.push("channel".to_string());
    assert!(Machine::bare(bound.clone()).constraint_check().ok());

    let program = bound.assemble("rset r0 9\nr2s 0 r0\ns2r r1 0\n").unwrap();
    let mut vm = Interpreter::new(Machine::new(bound, program).unwrap());
    for _ in 0..3 {
        vm.step().unwrap();
    }
    assert_eq!(vm.register(1), 9);
}

#[test]
fn invalid_opcode_prefix_is_fatal() {
    // Hand-build a word whose prefix addresses a hole in the opcode set:
    // 3 opcodes leave prefix 11 unassigned.
    let arch = arch(&["nop", "clc", "jz"]);
    let width = arch.max_word();
    let rogue = format!("{}{}", "11", "0".repeat(width - 2));
    let machine = Machine::new(arch, Program { slocs: vec![rogue] }).unwrap();
    let mut vm = Interpreter::new(machine);
    assert!(matches!(
        vm.step(),
        Err(RuntimeError::InvalidOpcode { index: 3, count: 3 })
    ));
}
