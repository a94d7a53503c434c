//! Integration tests for the reliability engine.
//!
//! Uses tokio's paused clock so retransmission timing is deterministic:
//! `tokio::time::advance` moves `Instant::now()` without sleeping.

use std::time::Duration;

use parley_protocol::MessageId;
use parley_reliability::{AckPolicy, DeliveryError, ReliabilityEngine, RetryConfig};
use tokio::time::{self, Instant};

// =========================================================================
// Helpers
// =========================================================================

const INTERVAL: Duration = Duration::from_millis(250);

fn engine_with(max_retries: u8) -> ReliabilityEngine {
    ReliabilityEngine::new(
        RetryConfig {
            interval: INTERVAL,
            max_retries,
        },
        AckPolicy::RemoveOnFirst,
    )
}

/// Advances the clock by one retransmission interval.
async fn step() {
    time::advance(INTERVAL).await;
}

// =========================================================================
// Retransmission
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_nothing_resent_before_interval() {
    let mut engine = engine_with(3);
    engine.track(MessageId(5), vec![0x04, 0x00, 0x05], Instant::now());

    time::advance(INTERVAL - Duration::from_millis(1)).await;
    assert!(engine.tick(Instant::now()).unwrap().is_empty());
    assert!(engine.is_pending(MessageId(5)));

    time::advance(Duration::from_millis(1)).await;
    assert_eq!(engine.tick(Instant::now()).unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_resends_exactly_max_retries_then_fails() {
    let frame = vec![0x04, 0x00, 0x05, b'a', 0, b'b', 0];
    let mut engine = engine_with(3);
    engine.track(MessageId(5), frame.clone(), Instant::now());

    for attempt in 1..=3 {
        step().await;
        let resent = engine.tick(Instant::now()).unwrap();
        assert_eq!(resent.len(), 1, "attempt {attempt} should resend once");
        assert_eq!(resent[0].id, MessageId(5));
        assert_eq!(resent[0].bytes, frame);
        assert_eq!(resent[0].attempt, attempt);
    }

    step().await;
    let err = engine.tick(Instant::now()).unwrap_err();
    assert_eq!(
        err,
        DeliveryError::Exhausted {
            id: MessageId(5),
            retries: 3
        }
    );
    assert!(!engine.has_pending());
    assert_eq!(engine.pending_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_resends_are_spaced_by_interval() {
    let mut engine = engine_with(3);
    engine.track(MessageId(1), vec![1], Instant::now());

    step().await;
    assert_eq!(engine.tick(Instant::now()).unwrap().len(), 1);

    // A tick shortly after a resend must not resend again.
    time::advance(Duration::from_millis(100)).await;
    assert!(engine.tick(Instant::now()).unwrap().is_empty());

    time::advance(Duration::from_millis(150)).await;
    assert_eq!(engine.tick(Instant::now()).unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_zero_retries_fails_on_first_expiry() {
    let mut engine = engine_with(0);
    engine.track(MessageId(2), vec![2], Instant::now());

    step().await;
    assert!(matches!(
        engine.tick(Instant::now()),
        Err(DeliveryError::Exhausted { retries: 0, .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_confirm_stops_retransmission() {
    let mut engine = engine_with(3);
    engine.track(MessageId(7), vec![7], Instant::now());

    step().await;
    assert_eq!(engine.tick(Instant::now()).unwrap().len(), 1);

    engine.acknowledge(MessageId(7));
    for _ in 0..5 {
        step().await;
        assert!(engine.tick(Instant::now()).unwrap().is_empty());
    }
}

#[tokio::test(start_paused = true)]
async fn test_entries_expire_independently() {
    let mut engine = engine_with(1);
    engine.track(MessageId(1), vec![1], Instant::now());
    time::advance(Duration::from_millis(200)).await;
    engine.track(MessageId(2), vec![2], Instant::now());

    // Only the first has aged past the interval.
    time::advance(Duration::from_millis(60)).await;
    let resent = engine.tick(Instant::now()).unwrap();
    assert_eq!(resent.len(), 1);
    assert_eq!(resent[0].id, MessageId(1));

    time::advance(Duration::from_millis(200)).await;
    let resent = engine.tick(Instant::now()).unwrap();
    assert_eq!(resent.len(), 1);
    assert_eq!(resent[0].id, MessageId(2));
}

// =========================================================================
// Duplicate suppression
// =========================================================================

#[test]
fn test_seen_set_never_forgets() {
    let mut engine = engine_with(3);
    for id in 0..100u16 {
        assert!(!engine.dedup(MessageId(id)));
    }
    for id in 0..100u16 {
        assert!(engine.dedup(MessageId(id)));
    }
}

#[test]
fn test_dedup_is_independent_of_pending() {
    let mut engine = engine_with(3);
    engine.track(MessageId(4), vec![4], Instant::now());
    assert!(!engine.dedup(MessageId(4)));
    assert!(engine.is_pending(MessageId(4)));
}
