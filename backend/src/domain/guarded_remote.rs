//! Guarded remote predicates.
//!
//! Every remote fact this service relies on (user exists, training exists,
//! user enrolled, username resolves) has the same failure shape: run under a
//! circuit breaker with a bounded timeout and no retry, and fail closed. A
//! failed, timed-out or rejected call yields the fallback value, never a
//! confirmation. Only an explicit upstream conflict escapes as an error.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use mockable::Clock;
use tracing::{debug, warn};

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use super::ports::{
    EnrollmentDirectory, IdentityDirectory, TrainingDirectory, UpstreamError, UserDirectory,
};
use super::{FeedbackError, TrainingSessionId, UserId, Username};

/// One remote dependency behind a breaker and a timeout.
#[derive(Debug)]
pub struct GuardedRemote {
    breaker: CircuitBreaker,
    timeout: Duration,
}

impl GuardedRemote {
    /// Guard a dependency called `name`.
    pub fn new(
        name: impl Into<String>,
        breaker_config: CircuitBreakerConfig,
        timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            breaker: CircuitBreaker::new(name, breaker_config, clock),
            timeout,
        }
    }

    /// Dependency name.
    pub fn name(&self) -> &str {
        self.breaker.name()
    }

    /// Current breaker state.
    pub fn state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Run `call`, returning `fallback` when the breaker is open or the call
    /// fails.
    ///
    /// # Errors
    ///
    /// Returns [`FeedbackError::UpstreamConflict`] when the dependency answers
    /// with a conflict. Conflicts do not count against the breaker.
    pub async fn call<T, Fut>(&self, fallback: T, call: Fut) -> Result<T, FeedbackError>
    where
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let Some(permit) = self.breaker.try_acquire() else {
            debug!(dependency = self.name(), "circuit open, failing closed");
            return Ok(fallback);
        };

        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => {
                permit.success();
                Ok(value)
            }
            Ok(Err(UpstreamError::Conflict { message })) => {
                permit.neutral();
                warn!(dependency = self.name(), %message, "upstream reported a conflict");
                Err(FeedbackError::upstream_conflict(self.name(), message))
            }
            Ok(Err(error)) => {
                permit.failure();
                warn!(dependency = self.name(), %error, "remote check failed, failing closed");
                Ok(fallback)
            }
            Err(_) => {
                permit.failure();
                warn!(
                    dependency = self.name(),
                    timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                    "remote check timed out, failing closed"
                );
                Ok(fallback)
            }
        }
    }
}

/// Settings shared by the four guarded dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteCheckSettings {
    /// Per-call timeout.
    pub timeout: Duration,
    /// Breaker tuning, applied to each dependency independently.
    pub breaker: CircuitBreakerConfig,
}

impl Default for RemoteCheckSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// Adapters for the four remote facts.
#[derive(Clone)]
pub struct UpstreamDirectories {
    pub users: Arc<dyn UserDirectory>,
    pub trainings: Arc<dyn TrainingDirectory>,
    pub enrollments: Arc<dyn EnrollmentDirectory>,
    pub identities: Arc<dyn IdentityDirectory>,
}

/// The four remote facts, each with its own breaker.
pub struct RemoteFactCheckers {
    directories: UpstreamDirectories,
    user_exists: GuardedRemote,
    training_exists: GuardedRemote,
    user_enrolled: GuardedRemote,
    identity: GuardedRemote,
}

impl RemoteFactCheckers {
    /// Guard each directory with an independent breaker.
    pub fn new(
        directories: UpstreamDirectories,
        settings: RemoteCheckSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let guard = |name: &str| {
            GuardedRemote::new(name, settings.breaker, settings.timeout, Arc::clone(&clock))
        };
        Self {
            user_exists: guard("user-service"),
            training_exists: guard("training-service"),
            user_enrolled: guard("enrollment-service"),
            identity: guard("auth-service"),
            directories,
        }
    }

    /// Whether the user exists; `false` when unknown or unreachable.
    pub async fn user_exists(&self, user_id: UserId) -> Result<bool, FeedbackError> {
        self.user_exists
            .call(false, self.directories.users.user_exists(user_id))
            .await
    }

    /// Whether the training session exists; `false` when unknown or unreachable.
    pub async fn training_exists(
        &self,
        training_session_id: TrainingSessionId,
    ) -> Result<bool, FeedbackError> {
        self.training_exists
            .call(
                false,
                self.directories.trainings.training_exists(training_session_id),
            )
            .await
    }

    /// Whether the user is enrolled; `false` when not or unreachable.
    pub async fn user_enrolled(
        &self,
        user_id: UserId,
        training_session_id: TrainingSessionId,
    ) -> Result<bool, FeedbackError> {
        self.user_enrolled
            .call(
                false,
                self.directories
                    .enrollments
                    .is_enrolled(user_id, training_session_id),
            )
            .await
    }

    /// Resolve a username; `None` when unknown or unreachable.
    pub async fn resolve_user_id(
        &self,
        username: &Username,
    ) -> Result<Option<UserId>, FeedbackError> {
        self.identity
            .call(None, self.directories.identities.user_id_by_username(username))
            .await
    }

    /// Breaker states keyed by dependency name.
    pub fn breaker_states(&self) -> [(&str, CircuitState); 4] {
        [
            &self.user_exists,
            &self.training_exists,
            &self.user_enrolled,
            &self.identity,
        ]
        .map(|guard| (guard.name(), guard.state()))
    }
}
