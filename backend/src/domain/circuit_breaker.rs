//! Circuit breaker guarding one remote dependency.
//!
//! The breaker is a small state machine shared by every request that talks to
//! the same dependency:
//! - `Closed` admits calls and counts failures inside a rolling window;
//! - `Open` rejects calls until the cooldown elapses;
//! - `HalfOpen` admits a bounded number of trial calls whose outcome decides
//!   whether the breaker closes again or reopens.
//!
//! Time is read from an injected [`Clock`] so transitions are deterministic in
//! tests. The internal lock is never held across an await point.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use tracing::{info, warn};

/// Circuit breaker tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Failures inside `window` that open the breaker.
    pub failure_threshold: u32,
    /// Rolling window in which failures are counted.
    pub window: Duration,
    /// How long the breaker stays open before admitting trials.
    pub open_cooldown: Duration,
    /// Concurrent trial calls admitted while half-open.
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            window: Duration::from_secs(60),
            open_cooldown: Duration::from_secs(30),
            half_open_max_calls: 1,
        }
    }
}

/// Externally visible breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation.
    Closed,
    /// Calls are rejected until the cooldown elapses.
    Open,
    /// A limited number of trial calls are admitted.
    HalfOpen,
}

impl CircuitState {
    /// Lowercase label used in logs and probes.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CircuitInternalState {
    Closed { recent_failures: VecDeque<DateTime<Utc>> },
    Open { opened_at: DateTime<Utc> },
    HalfOpen { trials_in_flight: u32 },
}

impl CircuitInternalState {
    fn closed() -> Self {
        Self::Closed {
            recent_failures: VecDeque::new(),
        }
    }

    fn public(&self) -> CircuitState {
        match self {
            Self::Closed { .. } => CircuitState::Closed,
            Self::Open { .. } => CircuitState::Open,
            Self::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }
}

/// Thread-safe circuit breaker for one named dependency.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<CircuitInternalState>,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl CircuitBreaker {
    /// Build a closed breaker.
    ///
    /// Thresholds below one are raised to one.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    /// use feedback_service::domain::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
    ///
    /// let breaker = CircuitBreaker::new(
    ///     "user-service",
    ///     CircuitBreakerConfig::default(),
    ///     Arc::new(mockable::DefaultClock),
    /// );
    /// assert!(breaker.allow());
    /// assert_eq!(breaker.state(), CircuitState::Closed);
    /// ```
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.into(),
            config: CircuitBreakerConfig {
                failure_threshold: config.failure_threshold.max(1),
                half_open_max_calls: config.half_open_max_calls.max(1),
                ..config
            },
            clock,
            state: Mutex::new(CircuitInternalState::closed()),
        }
    }

    /// Dependency name used in logs.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Snapshot the current state.
    pub fn state(&self) -> CircuitState {
        self.lock().public()
    }

    /// Ask to make one call. Returns `false` when the call must not be attempted.
    pub fn allow(&self) -> bool {
        let now = self.clock.utc();
        let mut state = self.lock();
        match &mut *state {
            CircuitInternalState::Closed { .. } => return true,
            CircuitInternalState::Open { opened_at } => {
                if !is_elapsed(*opened_at, now, self.config.open_cooldown) {
                    return false;
                }
            }
            CircuitInternalState::HalfOpen { trials_in_flight } => {
                if *trials_in_flight >= self.config.half_open_max_calls {
                    return false;
                }
                *trials_in_flight += 1;
                return true;
            }
        }
        self.transition(
            &mut state,
            CircuitInternalState::HalfOpen {
                trials_in_flight: 1,
            },
        );
        true
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        let mut state = self.lock();
        if matches!(*state, CircuitInternalState::HalfOpen { .. }) {
            self.transition(&mut state, CircuitInternalState::closed());
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self) {
        let now = self.clock.utc();
        let mut state = self.lock();
        let should_open = match &mut *state {
            CircuitInternalState::Closed { recent_failures } => {
                if let Some(start) = window_start(now, self.config.window) {
                    while recent_failures.front().is_some_and(|at| *at <= start) {
                        recent_failures.pop_front();
                    }
                }
                recent_failures.push_back(now);
                let failures = u32::try_from(recent_failures.len()).unwrap_or(u32::MAX);
                failures >= self.config.failure_threshold
            }
            CircuitInternalState::HalfOpen { .. } => true,
            CircuitInternalState::Open { .. } => false,
        };
        if should_open {
            self.transition(&mut state, CircuitInternalState::Open { opened_at: now });
        }
    }

    /// Release a half-open trial slot without judging the dependency.
    pub fn record_neutral(&self) {
        let mut state = self.lock();
        if let CircuitInternalState::HalfOpen { trials_in_flight } = &mut *state {
            *trials_in_flight = trials_in_flight.saturating_sub(1);
        }
    }

    /// Acquire a permit that records a failure if dropped unresolved.
    pub fn try_acquire(&self) -> Option<CallPermit<'_>> {
        if self.allow() {
            Some(CallPermit {
                breaker: self,
                settled: false,
            })
        } else {
            None
        }
    }

    fn transition(&self, state: &mut CircuitInternalState, next: CircuitInternalState) {
        let from = state.public();
        let to = next.public();
        *state = next;
        if to == CircuitState::Open {
            warn!(
                dependency = %self.name,
                from = from.as_str(),
                to = to.as_str(),
                "circuit breaker opened"
            );
        } else {
            info!(
                dependency = %self.name,
                from = from.as_str(),
                to = to.as_str(),
                "circuit breaker transition"
            );
        }
    }

    fn lock(&self) -> MutexGuard<'_, CircuitInternalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Admission for one call. Dropping it unresolved counts as a failure so an
/// abandoned call never holds a half-open trial slot forever.
#[must_use = "resolve the permit with success, failure or neutral"]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    settled: bool,
}

impl CallPermit<'_> {
    /// The call succeeded.
    pub fn success(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    /// The call failed.
    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }

    /// The call completed with an outcome that says nothing about health.
    pub fn neutral(mut self) {
        self.settled = true;
        self.breaker.record_neutral();
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.record_failure();
        }
    }
}

fn is_elapsed(since: DateTime<Utc>, now: DateTime<Utc>, period: Duration) -> bool {
    // An unrepresentable cooldown must not hold the breaker open forever.
    let Ok(period) = TimeDelta::from_std(period) else {
        return true;
    };
    since
        .checked_add_signed(period)
        .is_none_or(|end| now >= end)
}

fn window_start(now: DateTime<Utc>, window: Duration) -> Option<DateTime<Utc>> {
    TimeDelta::from_std(window)
        .ok()
        .and_then(|window| now.checked_sub_signed(window))
}

#[cfg(test)]
mod tests;
