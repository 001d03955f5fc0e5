//! Tests for DebounceTimer
//!
//! These tests verify:
//! - The callback runs once after a quiet period
//! - Resets push the deadline out instead of stacking runs
//! - Cancel disarms without running
//! - Dropping the timer stops its thread

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use vibelog_store::queue::DebounceTimer;

fn counting_timer(delay_ms: u64) -> (Arc<AtomicUsize>, DebounceTimer) {
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    let timer = DebounceTimer::spawn(Duration::from_millis(delay_ms), move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();
    (fired, timer)
}

#[test]
fn test_unarmed_timer_never_fires() {
    let (fired, _timer) = counting_timer(50);

    thread::sleep(Duration::from_millis(200));

    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[test]
fn test_fires_once_after_delay() {
    let (fired, timer) = counting_timer(100);

    timer.reset();
    thread::sleep(Duration::from_millis(30));
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    thread::sleep(Duration::from_millis(300));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn test_resets_coalesce_into_one_run() {
    let (fired, timer) = counting_timer(200);

    for _ in 0..5 {
        timer.reset();
        thread::sleep(Duration::from_millis(40));
    }
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    thread::sleep(Duration::from_millis(500));
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn test_can_rearm_after_firing() {
    let (fired, timer) = counting_timer(50);

    timer.reset();
    thread::sleep(Duration::from_millis(250));
    timer.reset();
    thread::sleep(Duration::from_millis(250));

    assert_eq!(fired.load(Ordering::SeqCst), 2);
}

#[test]
fn test_cancel_prevents_run() {
    let (fired, timer) = counting_timer(100);

    timer.reset();
    timer.cancel();
    thread::sleep(Duration::from_millis(300));

    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[test]
fn test_drop_stops_pending_run() {
    let (fired, timer) = counting_timer(100);

    timer.reset();
    drop(timer);
    thread::sleep(Duration::from_millis(300));

    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[test]
fn test_delay_accessor() {
    let (_fired, timer) = counting_timer(1234);
    assert_eq!(timer.delay(), Duration::from_millis(1234));
}
