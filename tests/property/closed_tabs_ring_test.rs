//! Property-based tests for the closed-tab undo ring.
//!
//! For any sequence of closes and capacity, the ring stays bounded, keeps the
//! most recent close first and evicts the oldest entries.

use proptest::prelude::*;
use tabstore::managers::closed_tabs::ClosedTabRing;
use tabstore::types::tab::{HistoryEntry, TabId, TabSnapshot};

fn closed(id: i64, private: bool) -> TabSnapshot {
    let mut snap = TabSnapshot::new(TabId(id), private);
    snap.entries
        .push(HistoryEntry::new(&format!("https://t{id}.example"), None));
    snap.index = 1;
    snap
}

fn ids(ring: &ClosedTabRing) -> Vec<i64> {
    ring.entries().iter().map(|t| t.tab_id.0).collect()
}

/// Each element is whether that close was in a private tab.
fn arb_closes() -> impl Strategy<Value = Vec<bool>> {
    proptest::collection::vec(any::<bool>(), 0..40)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn ring_holds_the_most_recent_closes(capacity in 0usize..10, closes in arb_closes()) {
        let mut ring = ClosedTabRing::new(capacity);
        for (i, private) in closes.iter().enumerate() {
            ring.record_close(closed(i as i64, *private));
        }

        prop_assert!(ring.len() <= capacity);
        let expected: Vec<i64> = (0..closes.len() as i64).rev().take(capacity).collect();
        prop_assert_eq!(ids(&ring), expected);
    }

    #[test]
    fn shrinking_keeps_a_prefix(
        capacity in 1usize..10,
        smaller in 0usize..10,
        closes in arb_closes(),
    ) {
        let mut ring = ClosedTabRing::new(capacity);
        for (i, private) in closes.iter().enumerate() {
            ring.record_close(closed(i as i64, *private));
        }
        let before = ids(&ring);

        ring.set_capacity(smaller);
        let after = ids(&ring);
        prop_assert!(after.len() <= smaller);
        prop_assert_eq!(&before[..after.len()], &after[..]);
    }

    #[test]
    fn purging_private_keeps_normal_order(closes in arb_closes()) {
        let mut ring = ClosedTabRing::new(50);
        for (i, private) in closes.iter().enumerate() {
            ring.record_close(closed(i as i64, *private));
        }
        let normal: Vec<i64> = ring
            .entries()
            .iter()
            .filter(|t| !t.is_private)
            .map(|t| t.tab_id.0)
            .collect();

        let removed = ring.purge_private();
        prop_assert_eq!(removed, closes.iter().filter(|p| **p).count());
        prop_assert_eq!(ids(&ring), normal);
        prop_assert!(ring.summaries(true).is_empty());
    }

    #[test]
    fn undo_removes_exactly_one(closes in 1usize..20, pick in 0usize..20) {
        let mut ring = ClosedTabRing::new(20);
        for i in 0..closes {
            ring.record_close(closed(i as i64, false));
        }
        let before = ids(&ring);

        match ring.undo(pick) {
            Some(snap) => {
                prop_assert_eq!(snap.tab_id.0, before[pick]);
                let mut expected = before.clone();
                expected.remove(pick);
                prop_assert_eq!(ids(&ring), expected);
            }
            None => {
                prop_assert!(pick >= before.len());
                prop_assert_eq!(ids(&ring), before);
            }
        }
    }
}
