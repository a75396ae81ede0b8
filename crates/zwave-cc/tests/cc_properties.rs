//! Property tests for the CC codec.
//!
//! - Parsing arbitrary bytes never panics, under either unknown-CC policy
//! - Association reports split by any budget merge back to the original
//! - Encapsulation nesting is capped

use proptest::prelude::*;
use zwave_cc::cc::association::AssociationCommand;
use zwave_cc::cc::basic::BasicCommand;
use zwave_cc::{
    CcError, Command, CommandClass, PartialAssembler, StaticContext, UnknownCc,
    MAX_ENCAPSULATION_DEPTH,
};

const NODE: u8 = 7;

fn multi_channel_wrapped(depth: usize) -> Vec<u8> {
    let mut bytes = vec![0x20, 0x02];
    for _ in 0..depth {
        let mut outer = vec![0x60, 0x0D, 0x01, 0x01];
        outer.extend(bytes);
        bytes = outer;
    }
    bytes
}

#[test]
fn prop_parse_never_panics() {
    let ctx = StaticContext::new(1);
    proptest!(|(bytes in proptest::collection::vec(any::<u8>(), 0..80))| {
        let _ = CommandClass::parse(&bytes, NODE, &ctx);
        let _ = CommandClass::parse_with(&bytes, NODE, &ctx, UnknownCc::KeepRaw);
    });
}

#[test]
fn prop_known_prefix_never_panics() {
    let ctx = StaticContext::new(1);
    let known = [0x20u8, 0x25, 0x26, 0x43, 0x56, 0x60, 0x6C, 0x72, 0x84, 0x85, 0x86, 0x8F, 0x98];
    proptest!(|(
        cc in proptest::sample::select(known.to_vec()),
        command in any::<u8>(),
        body in proptest::collection::vec(any::<u8>(), 0..40),
    )| {
        let mut bytes = vec![cc, command];
        bytes.extend(body);
        if let Ok(parsed) = CommandClass::parse(&bytes, NODE, &ctx) {
            // whatever parses must encode again
            let _ = parsed.serialize(&ctx);
        }
    });
}

#[test]
fn prop_fragmented_reports_reassemble() {
    proptest!(|(
        node_ids in proptest::collection::vec(1u8..=232, 0..120),
        budget in 4usize..60,
    )| {
        let report = CommandClass::new(NODE, AssociationCommand::Report {
            group_id: 1,
            max_nodes: 232,
            reports_to_follow: 0,
            node_ids: node_ids.clone(),
        });
        let parts = report.fragment(budget).unwrap();
        let (last, earlier) = parts.split_last().unwrap();

        let mut assembler = PartialAssembler::new();
        for part in earlier {
            prop_assert!(!assembler.assemble(part.clone()).unwrap().is_complete());
        }
        let merged = assembler.assemble(last.clone()).unwrap().into_complete().unwrap();
        prop_assert_eq!(merged, report);
        prop_assert!(assembler.is_empty());
    });
}

#[test]
fn nesting_at_the_cap_parses() {
    let ctx = StaticContext::new(1);
    let cc = CommandClass::parse(&multi_channel_wrapped(MAX_ENCAPSULATION_DEPTH), NODE, &ctx)
        .unwrap();
    assert_eq!(cc.innermost().command, Command::Basic(BasicCommand::Get));
    assert_eq!(cc.innermost().endpoint, 1);
}

#[test]
fn nesting_past_the_cap_is_invalid() {
    let ctx = StaticContext::new(1);
    let err = CommandClass::parse(
        &multi_channel_wrapped(MAX_ENCAPSULATION_DEPTH + 1),
        NODE,
        &ctx,
    )
    .unwrap_err();
    assert!(matches!(err, CcError::InvalidPayload(_)));
}
