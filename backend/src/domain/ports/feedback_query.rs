//! Driving port for feedback reads.
//!
//! "Own" reads act for the authenticated caller and resolve their identity
//! first. Admin reads are trusted store queries and skip remote checks.

use async_trait::async_trait;

use crate::domain::{Error, Feedback, TrainingSessionId, UserId, Username};

/// Domain use-case port for reading feedback.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeedbackQuery: Send + Sync {
    /// The caller's feedback for one session.
    async fn own_feedback_for_session(
        &self,
        username: &Username,
        training_session_id: TrainingSessionId,
    ) -> Result<Feedback, Error>;

    /// Every feedback the caller has left.
    async fn own_feedbacks(&self, username: &Username) -> Result<Vec<Feedback>, Error>;

    /// Every feedback left by `user_id`.
    async fn admin_by_user(&self, user_id: UserId) -> Result<Vec<Feedback>, Error>;

    /// Every feedback left for `training_session_id`.
    async fn admin_by_training(
        &self,
        training_session_id: TrainingSessionId,
    ) -> Result<Vec<Feedback>, Error>;

    /// The feedback for one natural key.
    async fn admin_by_natural_key(
        &self,
        user_id: UserId,
        training_session_id: TrainingSessionId,
    ) -> Result<Feedback, Error>;
}

/// Fixture query with an empty store.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureFeedbackQuery;

#[async_trait]
impl FeedbackQuery for FixtureFeedbackQuery {
    async fn own_feedback_for_session(
        &self,
        _username: &Username,
        _training_session_id: TrainingSessionId,
    ) -> Result<Feedback, Error> {
        Err(Error::not_found("feedback not found"))
    }

    async fn own_feedbacks(&self, _username: &Username) -> Result<Vec<Feedback>, Error> {
        Ok(Vec::new())
    }

    async fn admin_by_user(&self, _user_id: UserId) -> Result<Vec<Feedback>, Error> {
        Ok(Vec::new())
    }

    async fn admin_by_training(
        &self,
        _training_session_id: TrainingSessionId,
    ) -> Result<Vec<Feedback>, Error> {
        Ok(Vec::new())
    }

    async fn admin_by_natural_key(
        &self,
        _user_id: UserId,
        _training_session_id: TrainingSessionId,
    ) -> Result<Feedback, Error> {
        Err(Error::not_found("feedback not found"))
    }
}
