//! Boundary tests for the sliding-window limiter.

use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;
use vigil_core::ManualClock;
use vigil_rate_limit::{ApiThrottle, SlidingWindowLimiter};

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
    ))
}

#[test]
fn test_exactly_limit_admissions_within_window() {
    let clock = clock();
    let limiter: SlidingWindowLimiter = SlidingWindowLimiter::new(clock.clone());
    let subject = (7, 42);
    let window = Duration::minutes(60);

    for i in 0..5 {
        assert!(limiter.admit(&subject, 5, window), "admission {} refused", i);
        clock.advance(Duration::minutes(1));
    }
    assert!(!limiter.admit(&subject, 5, window));
    assert_eq!(limiter.usage(&subject, window), 5);
}

#[test]
fn test_slot_frees_after_window() {
    let clock = clock();
    let limiter: SlidingWindowLimiter = SlidingWindowLimiter::new(clock.clone());
    let subject = (7, 42);
    let window = Duration::seconds(60);

    assert!(limiter.admit(&subject, 2, window));
    clock.advance(Duration::seconds(10));
    assert!(limiter.admit(&subject, 2, window));

    let refused = limiter
        .try_admit(&subject, 2, window)
        .expect_err("window full");
    assert_eq!(refused.retry_after_secs(), 50);

    // Oldest admission is exactly one window old: still counted.
    clock.advance(Duration::seconds(50));
    assert!(!limiter.admit(&subject, 2, window));

    clock.advance(Duration::seconds(1));
    assert!(limiter.admit(&subject, 2, window));
    assert!(!limiter.admit(&subject, 2, window));
}

#[test]
fn test_subjects_are_independent() {
    let clock = clock();
    let limiter: SlidingWindowLimiter = SlidingWindowLimiter::new(clock);
    let window = Duration::minutes(5);

    assert!(limiter.admit(&(1, 1), 1, window));
    assert!(!limiter.admit(&(1, 1), 1, window));
    assert!(limiter.admit(&(1, 2), 1, window));
    assert!(limiter.admit(&(2, 1), 1, window));
}

#[test]
fn test_prune_drops_idle_subjects() {
    let clock = clock();
    let limiter: SlidingWindowLimiter = SlidingWindowLimiter::new(clock.clone());
    let window = Duration::minutes(1);
    assert!(limiter.admit(&(1, 1), 3, window));
    clock.advance(Duration::minutes(2));
    limiter.prune(window);
    assert_eq!(limiter.usage(&(1, 1), window), 0);
}

#[test]
fn test_concurrent_admissions_never_exceed_limit() {
    let clock = clock();
    let limiter: Arc<SlidingWindowLimiter> = Arc::new(SlidingWindowLimiter::new(clock));
    let window = Duration::minutes(10);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            std::thread::spawn(move || {
                (0..10)
                    .filter(|_| limiter.admit(&(9, 9), 25, window))
                    .count()
            })
        })
        .collect();
    let admitted: usize = handles
        .into_iter()
        .map(|h| h.join().expect("thread"))
        .sum();
    assert_eq!(admitted, 25);
}

#[test]
fn test_zero_quota_means_unthrottled() {
    assert!(ApiThrottle::per_minute(0).is_none());
    assert_eq!(ApiThrottle::per_minute(4).map(|t| t.quota()), Some(4));
}

#[tokio::test]
async fn test_throttle_admits_burst_up_to_quota() {
    let throttle = ApiThrottle::per_minute(60).expect("quota");
    // Governor allows a burst equal to the quota without waiting.
    let started = std::time::Instant::now();
    throttle.acquire().await;
    throttle.acquire().await;
    assert!(started.elapsed() < std::time::Duration::from_secs(5));
}
