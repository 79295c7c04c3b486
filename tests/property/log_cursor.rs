//! Property-based tests for the validation log cursor protocol

use export_manager::log::LogStore;
use proptest::prelude::*;
use std::collections::HashSet;
use tempfile::TempDir;

/// Reads after any cursor only return newer records, ascending, and walking
/// the cursor forward never yields a record twice.
#[test]
fn test_cursor_reads_are_monotonic() {
    let mut runner = proptest::test_runner::TestRunner::new(ProptestConfig::with_cases(32));

    runner
        .run(
            &(
                prop::collection::vec(prop::sample::select(vec![1u64, 2, 3]), 1..40),
                prop::collection::vec(1usize..6, 1..10),
            ),
            |(uids, steps)| {
                let temp = TempDir::new().unwrap();
                let store = LogStore::new(sled::open(temp.path().join("store")).unwrap()).unwrap();
                for (i, uid) in uids.iter().enumerate() {
                    store.append(*uid, format!("line {}", i)).unwrap();
                }

                for uid in [1u64, 2, 3] {
                    let expected = uids.iter().filter(|u| **u == uid).count();
                    let mut cursor = 0;
                    let mut seen = HashSet::new();
                    for take in steps.iter().cycle().take(expected + 1) {
                        let batch = store.read_after(uid, cursor).unwrap();
                        assert!(batch.iter().all(|r| r.id > cursor && r.uid == uid));
                        assert!(batch.windows(2).all(|w| w[0].id < w[1].id));
                        for record in batch.iter().take(*take) {
                            assert!(seen.insert(record.id), "record {} seen twice", record.id);
                            cursor = record.id;
                        }
                    }
                    assert_eq!(seen.len(), expected);
                }
                Ok(())
            },
        )
        .unwrap();
}
