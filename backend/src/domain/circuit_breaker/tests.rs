//! State transition coverage for the circuit breaker.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use rstest::{fixture, rstest};

use super::*;
use crate::test_support::MutableClock;

fn config(failure_threshold: u32, half_open_max_calls: u32) -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        failure_threshold,
        window: Duration::from_secs(60),
        open_cooldown: Duration::from_secs(30),
        half_open_max_calls,
    }
}

#[fixture]
fn clock() -> Arc<MutableClock> {
    let now = Utc
        .with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
        .single()
        .expect("valid timestamp");
    Arc::new(MutableClock::new(now))
}

fn breaker(clock: &Arc<MutableClock>, config: CircuitBreakerConfig) -> CircuitBreaker {
    CircuitBreaker::new("training-service", config, clock.clone())
}

fn trip(breaker: &CircuitBreaker, failures: u32) {
    for _ in 0..failures {
        assert!(breaker.allow(), "closed breaker admits calls");
        breaker.record_failure();
    }
}

#[rstest]
fn opens_once_threshold_is_reached(clock: Arc<MutableClock>) {
    let breaker = breaker(&clock, config(3, 1));

    trip(&breaker, 2);
    assert_eq!(breaker.state(), CircuitState::Closed);

    trip(&breaker, 1);
    assert_eq!(breaker.state(), CircuitState::Open);
    assert!(!breaker.allow(), "open breaker rejects calls");
}

#[rstest]
fn failures_outside_the_window_age_out(clock: Arc<MutableClock>) {
    let breaker = breaker(&clock, config(3, 1));

    trip(&breaker, 2);
    clock.advance(Duration::from_secs(61));
    trip(&breaker, 2);

    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[rstest]
fn successes_in_closed_state_do_not_reset_the_window(clock: Arc<MutableClock>) {
    let breaker = breaker(&clock, config(2, 1));

    trip(&breaker, 1);
    breaker.record_success();
    trip(&breaker, 1);

    assert_eq!(breaker.state(), CircuitState::Open);
}

#[rstest]
fn cooldown_moves_open_breaker_to_half_open(clock: Arc<MutableClock>) {
    let breaker = breaker(&clock, config(1, 1));
    trip(&breaker, 1);

    clock.advance(Duration::from_secs(29));
    assert!(!breaker.allow());
    assert_eq!(breaker.state(), CircuitState::Open);

    clock.advance(Duration::from_secs(1));
    assert!(breaker.allow(), "first call after cooldown is a trial");
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
}

#[rstest]
fn cooldown_past_the_calendar_end_does_not_panic(clock: Arc<MutableClock>) {
    let breaker = breaker(
        &clock,
        CircuitBreakerConfig {
            open_cooldown: Duration::from_millis(9_000_000_000_000_000),
            ..config(1, 1)
        },
    );
    trip(&breaker, 1);

    assert!(breaker.allow(), "unreachable cooldown end counts as elapsed");
    assert_eq!(breaker.state(), CircuitState::HalfOpen);
}

#[rstest]
#[case::single_trial(1)]
#[case::three_trials(3)]
fn half_open_admits_bounded_trials(clock: Arc<MutableClock>, #[case] trials: u32) {
    let breaker = breaker(&clock, config(1, trials));
    trip(&breaker, 1);
    clock.advance(Duration::from_secs(30));

    for _ in 0..trials {
        assert!(breaker.allow());
    }
    assert!(!breaker.allow(), "trial budget exhausted");
}

#[rstest]
fn trial_success_closes_breaker(clock: Arc<MutableClock>) {
    let breaker = breaker(&clock, config(2, 1));
    trip(&breaker, 2);
    clock.advance(Duration::from_secs(30));

    assert!(breaker.allow());
    breaker.record_success();

    assert_eq!(breaker.state(), CircuitState::Closed);
    trip(&breaker, 1);
    assert_eq!(
        breaker.state(),
        CircuitState::Closed,
        "failure window is cleared on close"
    );
}

#[rstest]
fn trial_failure_reopens_with_fresh_cooldown(clock: Arc<MutableClock>) {
    let breaker = breaker(&clock, config(1, 1));
    trip(&breaker, 1);
    clock.advance(Duration::from_secs(30));

    assert!(breaker.allow());
    breaker.record_failure();
    assert_eq!(breaker.state(), CircuitState::Open);

    clock.advance(Duration::from_secs(29));
    assert!(!breaker.allow(), "cooldown restarted at the failed trial");
    clock.advance(Duration::from_secs(1));
    assert!(breaker.allow());
}

#[rstest]
fn dropped_permit_counts_as_failure(clock: Arc<MutableClock>) {
    let breaker = breaker(&clock, config(1, 1));
    let permit = breaker.try_acquire().expect("closed breaker admits");
    drop(permit);

    assert_eq!(breaker.state(), CircuitState::Open);
}

#[rstest]
fn rejected_acquire_does_not_record_failure(clock: Arc<MutableClock>) {
    let breaker = breaker(&clock, config(1, 1));
    trip(&breaker, 1);
    clock.advance(Duration::from_secs(30));
    let trial = breaker.try_acquire().expect("trial admitted");

    assert!(breaker.try_acquire().is_none());
    trial.success();
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[rstest]
fn neutral_outcome_releases_trial_slot(clock: Arc<MutableClock>) {
    let breaker = breaker(&clock, config(1, 1));
    trip(&breaker, 1);
    clock.advance(Duration::from_secs(30));

    breaker.try_acquire().expect("trial admitted").neutral();

    assert_eq!(breaker.state(), CircuitState::HalfOpen);
    assert!(breaker.allow(), "slot was released");
}

#[rstest]
fn zero_thresholds_are_clamped(clock: Arc<MutableClock>) {
    let breaker = breaker(&clock, config(0, 0));
    trip(&breaker, 1);
    assert_eq!(breaker.state(), CircuitState::Open);
}

#[rstest]
fn concurrent_failures_open_the_breaker_once(clock: Arc<MutableClock>) {
    let breaker = Arc::new(breaker(&clock, config(8, 1)));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let breaker = Arc::clone(&breaker);
            std::thread::spawn(move || {
                if breaker.allow() {
                    breaker.record_failure();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("thread joins");
    }

    assert_eq!(breaker.state(), CircuitState::Open);
}
