//! Property-based tests for save debouncing.
//!
//! For any sequence of save requests the scheduler keeps at most one timer,
//! never fires before the interval allows, and a flush is idempotent.

#[path = "../common/mod.rs"]
mod common;

use common::Harness;
use proptest::prelude::*;
use tabstore::managers::save_scheduler::{SaveDecision, SaveScheduler, SaveTimings};
use tabstore::types::tab::TabId;

#[derive(Debug, Clone, Copy)]
struct Step {
    /// Time since the previous step.
    advance_ms: u64,
    private_only: bool,
}

fn arb_steps() -> impl Strategy<Value = Vec<Step>> {
    proptest::collection::vec(
        (0u64..4_000, any::<bool>()).prop_map(|(advance_ms, private_only)| Step {
            advance_ms,
            private_only,
        }),
        1..30,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn deadline_respects_interval_and_fast_path(steps in arb_steps()) {
        let timings = SaveTimings::default();
        let mut s = SaveScheduler::new(timings);
        s.mark_saved(0);
        let mut now = 0u64;

        for step in steps {
            now += step.advance_ms;
            if s.on_timer(now) {
                s.reset();
                s.mark_saved(now);
            }
            let previous = s.deadline_ms();
            let decision = s.request(step.private_only, now);
            let deadline = s.deadline_ms();
            prop_assert!(deadline.is_some(), "a request always leaves a timer armed");
            let deadline = deadline.unwrap_or_default();

            match decision {
                SaveDecision::Armed { delay_ms } => {
                    prop_assert_eq!(previous, None);
                    prop_assert_eq!(deadline, now + delay_ms);
                    if !step.private_only {
                        prop_assert!(delay_ms >= timings.min_delay_ms);
                        prop_assert!(deadline >= s.last_save_ms() + timings.interval_ms);
                    }
                }
                SaveDecision::Rearmed { delay_ms } => {
                    prop_assert!(step.private_only);
                    prop_assert_eq!(delay_ms, timings.private_delay_ms);
                    prop_assert!(Some(deadline) < previous);
                }
                SaveDecision::Absorbed => prop_assert_eq!(Some(deadline), previous),
                SaveDecision::WriteNow => prop_assert!(false, "default timings never write immediately"),
            }
            if step.private_only {
                prop_assert!(deadline <= now + timings.private_delay_ms);
            }
        }
    }

    #[test]
    fn burst_of_changes_writes_once(
        tabs in 1i64..6,
        changes in proptest::collection::vec(0i64..6, 1..20),
    ) {
        let mut h = Harness::new();
        let window = h.start();
        for id in 1..=tabs {
            h.open_tab(window, id, &["https://a.example"]);
        }
        for id in changes {
            let tab = TabId(id % tabs + 1);
            h.content.set_page(tab, &["https://a.example", "https://b.example"], 2);
            h.engine.history_changed(tab).unwrap();
        }

        prop_assert!(h.settle());
        prop_assert_eq!(h.storage.write_count(), 1);
        prop_assert_eq!(h.engine.scheduler().pending(), 0);
        prop_assert_eq!(h.engine.next_deadline(), None);
    }

    #[test]
    fn flush_is_idempotent(changes in 0usize..5) {
        let mut h = Harness::new();
        let window = h.start();
        let tab = h.open_tab(window, 1, &["https://a.example"]);
        for i in 0..changes {
            h.content.set_scroll(tab, 0.0, (i * 100) as f64);
            h.engine.scrolled(tab).unwrap();
        }

        prop_assert!(h.engine.flush_now());
        let writes = h.storage.write_count();
        let file = h.storage.state().current.clone();

        prop_assert!(!h.engine.flush_now());
        prop_assert_eq!(h.storage.write_count(), writes);
        prop_assert_eq!(h.storage.state().current.clone(), file);
    }
}
