//! Property-based tests for the ring's core invariants: bounded count
//! and payload conservation under arbitrary push/pop sequences.

use numakit::Ring;
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Op {
    Push(u64),
    Pop,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![any::<u64>().prop_map(Op::Push), Just(Op::Pop),]
}

proptest! {
    /// INV-SEQ-01: the ring never reports more in-flight items than its
    /// capacity, for any interleaving of push/pop on a single thread.
    #[test]
    fn bounded_count_holds_under_arbitrary_ops(ops in prop::collection::vec(op_strategy(), 0..200)) {
        let ring = Ring::<u64>::create(0, 16).unwrap();
        let mut model: Vec<u64> = Vec::new();

        for op in ops {
            match op {
                Op::Push(v) => {
                    if ring.push(v) {
                        model.push(v);
                    }
                }
                Op::Pop => {
                    if let Some(got) = ring.pop() {
                        let expected = model.remove(0);
                        prop_assert_eq!(got, expected);
                    } else {
                        prop_assert!(model.is_empty());
                    }
                }
            }
            prop_assert!(ring.len() <= ring.capacity());
        }
    }
}

#[test]
fn payload_conservation_under_full_drain() {
    let ring = Ring::<u64>::create(0, 32).unwrap();
    for i in 0..32u64 {
        assert!(ring.push(i));
    }
    assert!(!ring.push(999)); // full at capacity

    let mut drained = Vec::new();
    while let Some(item) = ring.pop() {
        drained.push(item);
    }
    assert_eq!(drained, (0..32u64).collect::<Vec<_>>());
    assert!(ring.is_empty());
}
