//! Encode/decode properties over the whole opcode catalog.

use bondmachine_proc::prelude::*;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rstest::rstest;

/// An architecture that gives every registered opcode nonempty operand
/// spaces: several ports and two bound channels.
fn full_arch() -> Arch {
    let names: Vec<_> = catalog::ALL_OPCODES.iter().map(|op| op.name()).collect();
    Arch {
        n: 3,
        m: 3,
        shared_constraints: vec!["channel".to_string(), "channel".to_string()],
        op: OpcodeSet::from_names(&names).unwrap(),
        ..Arch::default()
    }
}

proptest! {
    /// Every randomly generated instruction is `max_word` bits wide,
    /// disassembles, and reassembles to the identical word.
    #[test]
    fn generated_words_round_trip(seed in 0u64..256) {
        let arch = full_arch();
        let mut rng = StdRng::seed_from_u64(seed);
        let program = arch.generate_program(arch.op.len(), &mut rng).unwrap();

        for (address, word) in program.slocs.iter().enumerate() {
            prop_assert_eq!(word.len(), arch.max_word());

            let line = arch.disassemble_word(address, word).unwrap();
            let again = arch.assemble(&line).unwrap();
            prop_assert_eq!(&again.slocs[0], word, "line {}", line);
        }
    }

    /// Seeded generation is deterministic.
    #[test]
    fn generation_is_seed_stable(seed in 0u64..256) {
        let arch = full_arch();
        let a = arch
            .generate_program(8, &mut StdRng::seed_from_u64(seed))
            .unwrap();
        let b = arch
            .generate_program(8, &mut StdRng::seed_from_u64(seed))
            .unwrap();
        prop_assert_eq!(a.slocs, b.slocs);
    }
}

#[test]
fn every_opcode_assembles_its_own_template_width() {
    let arch = full_arch();
    let mut rng = StdRng::seed_from_u64(1);
    for op in arch.op.iter() {
        let word = op.generate(&arch, &mut rng);
        assert_eq!(
            word.len() + arch.opcodes_bits(),
            arch.max_word(),
            "{} operand area",
            op.name()
        );
        assert!(op.instruction_len(&arch) <= arch.max_word(), "{}", op.name());
    }
}

#[rstest]
#[case("frob r0 r1")] // unknown mnemonic
#[case("add r0")] // wrong argument count
#[case("add r0 r1 r2")] // wrong argument count
#[case("add r0 r9")] // unknown register (R=3)
#[case("add r0 x1")] // not a register token
#[case("rset r0 0x1ff")] // immediate overflows the 8-bit field
#[case("jz r0 256")] // address overflows the 8-bit field
#[case("rset r0 12three")] // unparsable literal
fn assembly_errors_are_rejected(#[case] line: &str) {
    let arch = full_arch();
    assert!(arch.assemble(line).is_err(), "{line}");
}

#[rstest]
#[case("rset r1 0x2a", "rset r1 42")]
#[case("rset r1 0b101010", "rset r1 42")]
#[case("jz r2 0x10", "jz r2 16")]
fn literal_radices_normalize_to_decimal(#[case] source: &str, #[case] listing: &str) {
    let arch = full_arch();
    let program = arch.assemble(source).unwrap();
    assert_eq!(
        arch.disassemble_word(0, &program.slocs[0]).unwrap(),
        listing
    );
}

#[test]
fn abstract_assembly_reports_usage() {
    let arch = full_arch();
    let notifies = arch
        .abstract_assemble("jz r5 3\ni2r r0 2\nr2s 1 r7\n")
        .unwrap();
    assert_eq!(notifies.len(), 3);
    assert!(notifies[0].contains(&UsageNotify::Registers(6)));
    assert!(notifies[0].contains(&UsageNotify::RomCells(4)));
    assert!(notifies[1].contains(&UsageNotify::Inputs(3)));
    assert!(notifies[2].contains(&UsageNotify::Shared("channel")));
}

#[test]
fn alias_table_covers_every_enabled_opcode() {
    let arch = full_arch();
    let machine = Machine::bare(arch);
    let alias = machine.instructions_alias();
    for op in catalog::ALL_OPCODES {
        assert!(
            alias.lines().any(|l| l.starts_with(op.name())),
            "{} missing from the alias table",
            op.name()
        );
    }
}
