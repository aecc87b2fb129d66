//! Ports for the remote services that own users, trainings, enrollments and
//! login identities.
//!
//! Adapters report raw outcomes only. Whether a failure becomes a denial is
//! decided by the guarded remote wrapper in the domain, not here.

use async_trait::async_trait;

use crate::domain::{TrainingSessionId, UserId, Username};

use super::define_port_error;

define_port_error! {
    /// Errors raised by upstream directory adapters.
    pub enum UpstreamError {
        /// The request never produced a response.
        Transport { message: String } => "upstream transport failed: {message}",
        /// No answer arrived within the call timeout.
        Timeout { message: String } => "upstream call timed out: {message}",
        /// The upstream answered with a non-success status.
        Status { status: u16, message: String } => "upstream returned {status}: {message}",
        /// The upstream reported a conflicting state (HTTP 409).
        Conflict { message: String } => "upstream conflict: {message}",
        /// The response body could not be decoded.
        Decode { message: String } => "upstream response could not be decoded: {message}",
    }
}

/// User existence lookups.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Whether the user service knows `user_id`.
    async fn user_exists(&self, user_id: UserId) -> Result<bool, UpstreamError>;
}

/// Training session existence lookups.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrainingDirectory: Send + Sync {
    /// Whether the training service knows `training_session_id`.
    async fn training_exists(
        &self,
        training_session_id: TrainingSessionId,
    ) -> Result<bool, UpstreamError>;
}

/// Enrollment lookups.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EnrollmentDirectory: Send + Sync {
    /// Whether `user_id` is enrolled in `training_session_id`.
    async fn is_enrolled(
        &self,
        user_id: UserId,
        training_session_id: TrainingSessionId,
    ) -> Result<bool, UpstreamError>;
}

/// Resolves login names to internal user ids.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Look up the user id behind `username`; `None` when unknown.
    async fn user_id_by_username(&self, username: &Username)
    -> Result<Option<UserId>, UpstreamError>;
}

/// Fixture directory that confirms every fact and resolves every username to
/// user `1`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureUpstreamDirectory;

#[async_trait]
impl UserDirectory for FixtureUpstreamDirectory {
    async fn user_exists(&self, _user_id: UserId) -> Result<bool, UpstreamError> {
        Ok(true)
    }
}

#[async_trait]
impl TrainingDirectory for FixtureUpstreamDirectory {
    async fn training_exists(
        &self,
        _training_session_id: TrainingSessionId,
    ) -> Result<bool, UpstreamError> {
        Ok(true)
    }
}

#[async_trait]
impl EnrollmentDirectory for FixtureUpstreamDirectory {
    async fn is_enrolled(
        &self,
        _user_id: UserId,
        _training_session_id: TrainingSessionId,
    ) -> Result<bool, UpstreamError> {
        Ok(true)
    }
}

#[async_trait]
impl IdentityDirectory for FixtureUpstreamDirectory {
    async fn user_id_by_username(
        &self,
        _username: &Username,
    ) -> Result<Option<UserId>, UpstreamError> {
        Ok(Some(UserId::new(1)))
    }
}
