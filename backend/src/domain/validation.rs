//! Ordered remote validation with short-circuit on the first denial.
//!
//! Writes check user, then training, then enrollment. Reads acting for the
//! caller resolve the caller's identity first and then check training and
//! enrollment; the caller's own existence follows from authentication.

use std::sync::Arc;

use tracing::warn;

use super::guarded_remote::RemoteFactCheckers;
use super::{FeedbackError, TrainingSessionId, UserId, Username};

/// Runs the remote checks that gate feedback access.
#[derive(Clone)]
pub struct ValidationPipeline {
    checkers: Arc<RemoteFactCheckers>,
}

impl ValidationPipeline {
    /// Build a pipeline over shared checkers.
    pub fn new(checkers: Arc<RemoteFactCheckers>) -> Self {
        Self { checkers }
    }

    /// Confirm a write for `(user_id, training_session_id)` may proceed.
    ///
    /// # Errors
    ///
    /// [`FeedbackError::UserNotFound`], [`FeedbackError::TrainingNotFound`] or
    /// [`FeedbackError::NotEnrolled`] for the first failing check, or
    /// [`FeedbackError::UpstreamConflict`].
    pub async fn authorize_write(
        &self,
        user_id: UserId,
        training_session_id: TrainingSessionId,
    ) -> Result<(), FeedbackError> {
        if !self.checkers.user_exists(user_id).await? {
            warn!(%user_id, "user not found");
            return Err(FeedbackError::UserNotFound);
        }
        self.authorize_session(user_id, training_session_id).await
    }

    /// Resolve the caller and confirm they may read their feedback for
    /// `training_session_id`. Returns the caller's user id.
    ///
    /// # Errors
    ///
    /// [`FeedbackError::Unauthenticated`] when the username does not resolve,
    /// then as for the training and enrollment checks of a write.
    pub async fn authorize_own_read(
        &self,
        username: &Username,
        training_session_id: TrainingSessionId,
    ) -> Result<UserId, FeedbackError> {
        let user_id = self.resolve_caller(username).await?;
        self.authorize_session(user_id, training_session_id).await?;
        Ok(user_id)
    }

    /// Resolve the caller's user id.
    ///
    /// # Errors
    ///
    /// [`FeedbackError::Unauthenticated`] when the username does not resolve.
    pub async fn resolve_caller(&self, username: &Username) -> Result<UserId, FeedbackError> {
        match self.checkers.resolve_user_id(username).await? {
            Some(user_id) => Ok(user_id),
            None => {
                warn!(%username, "caller identity could not be resolved");
                Err(FeedbackError::Unauthenticated)
            }
        }
    }

    async fn authorize_session(
        &self,
        user_id: UserId,
        training_session_id: TrainingSessionId,
    ) -> Result<(), FeedbackError> {
        if !self.checkers.training_exists(training_session_id).await? {
            warn!(%training_session_id, "training session not found");
            return Err(FeedbackError::TrainingNotFound);
        }
        if !self
            .checkers
            .user_enrolled(user_id, training_session_id)
            .await?
        {
            warn!(%user_id, %training_session_id, "user is not enrolled in training session");
            return Err(FeedbackError::NotEnrolled);
        }
        Ok(())
    }
}
