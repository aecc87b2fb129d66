//! Port for feedback persistence.
//!
//! The store enforces one row per `(user_id, training_session_id)`. Writes go
//! through [`FeedbackRepository::upsert`], which either inserts a new row or
//! overwrites the comment and rating of the existing one while keeping its
//! surrogate id.

use async_trait::async_trait;

use crate::domain::{Feedback, FeedbackDraft, TrainingSessionId, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by feedback repository adapters.
    pub enum FeedbackRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "feedback repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "feedback repository query failed: {message}",
        /// A concurrent write on the same natural key won the race.
        Conflict { message: String } =>
            "feedback repository write conflicted: {message}",
    }
}

/// Port for feedback storage and retrieval.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeedbackRepository: Send + Sync {
    /// Insert or replace the feedback for the draft's natural key.
    ///
    /// Returns the stored row. Replacing keeps the original surrogate id.
    async fn upsert(&self, draft: &FeedbackDraft) -> Result<Feedback, FeedbackRepositoryError>;

    /// Fetch the feedback for one natural key.
    async fn find_by_natural_key(
        &self,
        user_id: UserId,
        training_session_id: TrainingSessionId,
    ) -> Result<Option<Feedback>, FeedbackRepositoryError>;

    /// Fetch every feedback left by `user_id`, in no particular order.
    async fn find_all_by_user(&self, user_id: UserId)
    -> Result<Vec<Feedback>, FeedbackRepositoryError>;

    /// Fetch every feedback left for `training_session_id`, in no particular order.
    async fn find_all_by_training(
        &self,
        training_session_id: TrainingSessionId,
    ) -> Result<Vec<Feedback>, FeedbackRepositoryError>;

    /// Delete every feedback owned by `user_id`, returning the number removed.
    ///
    /// Deleting zero rows is a normal outcome.
    async fn delete_all_by_user(&self, user_id: UserId) -> Result<u64, FeedbackRepositoryError>;
}

