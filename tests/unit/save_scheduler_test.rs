use rstest::rstest;
use tabstore::managers::save_scheduler::{SaveDecision, SaveScheduler, SaveTimings};

fn scheduler_saved_at(ms: u64) -> SaveScheduler {
    let mut s = SaveScheduler::default();
    s.mark_saved(ms);
    s
}

#[rstest]
// Long after the last save the minimum delay still applies.
#[case(0, 60_000, 2_000)]
// Shortly after a save the interval dominates.
#[case(10_000, 11_000, 9_000)]
#[case(10_000, 18_500, 2_000)]
fn test_normal_delay(#[case] saved_at: u64, #[case] now: u64, #[case] expected: u64) {
    let mut s = scheduler_saved_at(saved_at);
    assert_eq!(s.request(false, now), SaveDecision::Armed { delay_ms: expected });
}

#[test]
fn test_private_request_uses_fast_delay() {
    let mut s = scheduler_saved_at(0);
    assert_eq!(s.request(true, 100), SaveDecision::Armed { delay_ms: 500 });
    assert_eq!(s.pending_private_only(), 1);
    assert!(s.is_private_only());
}

#[test]
fn test_private_request_pulls_timer_forward() {
    let mut s = scheduler_saved_at(0);
    s.request(false, 0);
    assert_eq!(s.request(true, 1_000), SaveDecision::Rearmed { delay_ms: 500 });
    assert_eq!(s.deadline_ms(), Some(1_500));
    assert!(!s.is_private_only());
}

#[test]
fn test_private_request_close_to_deadline_is_absorbed() {
    let mut s = scheduler_saved_at(0);
    s.request(false, 0);
    assert_eq!(s.request(true, 9_800), SaveDecision::Absorbed);
    assert_eq!(s.deadline_ms(), Some(10_000));
}

#[test]
fn test_zero_delays_write_now() {
    let mut s = SaveScheduler::new(SaveTimings {
        interval_ms: 0,
        min_delay_ms: 0,
        private_delay_ms: 0,
    });
    assert_eq!(s.request(false, 5), SaveDecision::WriteNow);
    assert_eq!(s.deadline_ms(), None);
}

#[test]
fn test_counters_reset_together() {
    let mut s = scheduler_saved_at(0);
    s.request(true, 0);
    s.request(false, 0);
    let ticket = s.begin_write(1);
    assert!(s.write_in_flight());
    assert!(s.finish_write(ticket, true));
    assert_eq!(s.pending(), 0);
    assert_eq!(s.pending_private_only(), 0);
}

#[test]
fn test_failed_write_keeps_counters() {
    let mut s = scheduler_saved_at(0);
    s.request(false, 0);
    let ticket = s.begin_write(1);
    assert!(!s.finish_write(ticket, false));
    assert_eq!(s.pending(), 1);
    assert!(!s.write_in_flight());
}

#[test]
fn test_overlapping_writes_tracked_separately() {
    let mut s = scheduler_saved_at(0);
    s.request(false, 0);
    let first = s.begin_write(0);
    s.record(false);
    let second = s.begin_write(0);
    assert!(first < second);

    assert!(s.finish_write(second, true));
    assert!(s.write_in_flight());
    assert!(!s.finish_write(first, true));
    assert!(!s.write_in_flight());
}

#[test]
fn test_begin_write_moves_interval_reference() {
    let mut s = scheduler_saved_at(0);
    s.begin_write(50_000);
    assert_eq!(s.last_save_ms(), 50_000);
    assert_eq!(s.request(false, 51_000), SaveDecision::Armed { delay_ms: 9_000 });
}

#[test]
fn test_timer_without_pending_does_not_write() {
    let mut s = scheduler_saved_at(0);
    s.request(false, 0);
    s.reset();
    assert!(!s.on_timer(10_000));
    assert_eq!(s.deadline_ms(), None);
}

#[test]
fn test_cancel_timer() {
    let mut s = scheduler_saved_at(0);
    assert!(!s.cancel_timer());
    s.request(false, 0);
    assert!(s.cancel_timer());
    assert_eq!(s.deadline_ms(), None);
}
