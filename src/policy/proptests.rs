//! Property-based tests for policy compilation and quorum evaluation
//!
//! Tests for:
//! - Order independence: declaration order never changes compiled bytes
//! - Agreement: the bytecode machine and the quorum tree give the same answer
//! - Monotonicity: more cosignatures never turn a satisfied quorum unsatisfied
//! - Robustness: arbitrary bytecode evaluates without panicking

use super::{compile_policy, eval_quorum_bytecode, CompiledPolicy, Entity, Policy, Quorum};
use crate::types::{KeyHash, RawPublicKey};
use proptest::prelude::*;
use proptest::sample::Index;
use std::collections::HashSet;

fn witness_key(id: usize) -> RawPublicKey {
    let mut bytes = [0u8; 32];
    bytes[0] = id as u8;
    bytes[31] = 0xaa;
    RawPublicKey::new(bytes)
}

/// Two-level quorum: groups of witness ids, each with its own threshold,
/// combined under an outer threshold.
#[derive(Debug, Clone)]
struct QuorumShape {
    witnesses: usize,
    groups: Vec<(Vec<usize>, usize)>,
    outer_k: usize,
    present: Vec<bool>,
}

fn quorum_shape() -> impl Strategy<Value = QuorumShape> {
    (1usize..8).prop_flat_map(|n| {
        (
            prop::collection::vec(
                (prop::collection::vec(0..n, 1..=n), any::<Index>()),
                1..4,
            ),
            any::<Index>(),
            prop::collection::vec(any::<bool>(), n),
        )
            .prop_map(move |(groups, outer, present)| {
                let groups: Vec<(Vec<usize>, usize)> = groups
                    .into_iter()
                    .map(|(members, k)| {
                        let k = k.index(members.len()) + 1;
                        (members, k)
                    })
                    .collect();
                let outer_k = outer.index(groups.len()) + 1;
                QuorumShape {
                    witnesses: n,
                    groups,
                    outer_k,
                    present,
                }
            })
    })
}

fn build_policy(shape: &QuorumShape) -> Policy {
    let mut builder = Policy::builder();
    builder
        .add_log(Entity::new(RawPublicKey::new([0xee; 32]), None))
        .unwrap();
    let hashes: Vec<KeyHash> = (0..shape.witnesses)
        .map(|i| builder.add_witness(Entity::new(witness_key(i), None)).unwrap())
        .collect();

    let groups = shape
        .groups
        .iter()
        .map(|(members, k)| {
            let members = members.iter().map(|&i| Quorum::single(hashes[i])).collect();
            Quorum::k_of_n(members, *k).unwrap()
        })
        .collect();
    builder
        .set_quorum(Quorum::k_of_n(groups, shape.outer_k).unwrap())
        .unwrap();
    builder.build().unwrap()
}

fn present_set(shape: &QuorumShape) -> HashSet<KeyHash> {
    (0..shape.witnesses)
        .filter(|&i| shape.present[i])
        .map(|i| KeyHash::of(&witness_key(i)))
        .collect()
}

fn found_vector(compiled: &CompiledPolicy, present: &HashSet<KeyHash>) -> Vec<u8> {
    compiled
        .witnesses()
        .iter()
        .map(|k| u8::from(present.contains(&KeyHash::of(k))))
        .collect()
}

proptest! {
    /// Reordering witness declarations and group members yields identical bytes
    #[test]
    fn prop_compile_order_independent(
        ids in Just((0usize..8).collect::<Vec<_>>()).prop_shuffle(),
        members in Just((0usize..8).collect::<Vec<_>>()).prop_shuffle(),
        k in 1usize..=8,
    ) {
        let build = |witness_order: &[usize], member_order: &[usize]| {
            let mut builder = Policy::builder();
            for &i in witness_order {
                builder.add_witness(Entity::new(witness_key(i), None)).unwrap();
            }
            let quorum = member_order
                .iter()
                .map(|&i| Quorum::single(KeyHash::of(&witness_key(i))))
                .collect();
            builder.set_quorum(Quorum::k_of_n(quorum, k).unwrap()).unwrap();
            compile_policy(&builder.build().unwrap()).unwrap()
        };

        let canonical: Vec<usize> = (0..8).collect();
        prop_assert_eq!(build(&ids, &members), build(&canonical, &canonical));
    }

    /// The compiled program and the quorum tree agree on every input
    #[test]
    fn prop_bytecode_matches_tree(shape in quorum_shape()) {
        let policy = build_policy(&shape);
        let compiled = CompiledPolicy::parse(&compile_policy(&policy).unwrap()).unwrap();
        let present = present_set(&shape);

        let found = found_vector(&compiled, &present);
        prop_assert_eq!(compiled.evaluate(&found), policy.is_quorum(&present));
    }

    /// Adding one more cosigning witness never breaks a satisfied quorum
    #[test]
    fn prop_quorum_monotone(shape in quorum_shape(), extra in any::<Index>()) {
        let policy = build_policy(&shape);
        let compiled = CompiledPolicy::parse(&compile_policy(&policy).unwrap()).unwrap();
        let mut found = found_vector(&compiled, &present_set(&shape));

        let before = compiled.evaluate(&found);
        let idx = extra.index(found.len());
        found[idx] = 1;
        let after = compiled.evaluate(&found);
        prop_assert!(!before || after);
    }

    /// Arbitrary bytecode is evaluated without panicking
    #[test]
    fn prop_vm_total(
        program in prop::collection::vec(any::<u8>(), 0..300),
        found in prop::collection::vec(0u8..=1, 0..80),
    ) {
        let _ = eval_quorum_bytecode(&program, found.len(), &found);
    }

    /// Parsing arbitrary bytes as a compiled policy never panics
    #[test]
    fn prop_compiled_parse_total(bytes in prop::collection::vec(any::<u8>(), 0..400)) {
        if let Ok(policy) = CompiledPolicy::parse(&bytes) {
            prop_assert_eq!(policy.to_bytes(), bytes);
        }
    }
}
