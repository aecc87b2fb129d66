//! Feedback domain service.
//!
//! Implements the driving ports. Input is validated locally before any remote
//! call; remote checks run through the [`ValidationPipeline`]; the store is
//! touched only once every check has passed.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::domain::ports::{
    FeedbackCommand, FeedbackQuery, FeedbackRepository, FeedbackRepositoryError,
    SubmitFeedbackRequest,
};
use crate::domain::{
    Comment, Error, Feedback, FeedbackDraft, FeedbackError, StarRating, TrainingSessionId, UserId,
    Username, ValidationPipeline,
};

/// Feedback service implementing [`FeedbackCommand`] and [`FeedbackQuery`].
#[derive(Clone)]
pub struct FeedbackService<R> {
    repository: Arc<R>,
    pipeline: ValidationPipeline,
}

impl<R> FeedbackService<R> {
    /// Create a service over a repository and a validation pipeline.
    pub fn new(repository: Arc<R>, pipeline: ValidationPipeline) -> Self {
        Self {
            repository,
            pipeline,
        }
    }
}

impl<R> FeedbackService<R>
where
    R: FeedbackRepository,
{
    fn map_repository_error(error: FeedbackRepositoryError) -> FeedbackError {
        match error {
            FeedbackRepositoryError::Connection { message } => {
                FeedbackError::unexpected(format!("feedback store unavailable: {message}"))
            }
            FeedbackRepositoryError::Query { message } => {
                FeedbackError::unexpected(format!("feedback store error: {message}"))
            }
            FeedbackRepositoryError::Conflict { message } => {
                FeedbackError::unexpected(format!("feedback store conflict persisted: {message}"))
            }
        }
    }

    fn draft_from(request: SubmitFeedbackRequest) -> Result<FeedbackDraft, FeedbackError> {
        Ok(FeedbackDraft {
            user_id: request.user_id,
            training_session_id: request.training_session_id,
            comment: Comment::new(request.comment)?,
            star_rating: StarRating::new(request.star_rating)?,
        })
    }

    /// Upsert, retrying once when a concurrent writer won the unique key race.
    async fn upsert_with_retry(&self, draft: &FeedbackDraft) -> Result<Feedback, FeedbackError> {
        match self.repository.upsert(draft).await {
            Err(FeedbackRepositoryError::Conflict { message }) => {
                debug!(
                    user_id = %draft.user_id,
                    training_session_id = %draft.training_session_id,
                    %message,
                    "upsert raced a concurrent writer, retrying once"
                );
                self.repository
                    .upsert(draft)
                    .await
                    .map_err(Self::map_repository_error)
            }
            other => other.map_err(Self::map_repository_error),
        }
    }

    async fn submit_inner(&self, request: SubmitFeedbackRequest) -> Result<Feedback, FeedbackError> {
        info!(
            user_id = %request.user_id,
            training_session_id = %request.training_session_id,
            "creating or updating feedback"
        );
        let draft = Self::draft_from(request).inspect_err(|error| {
            warn!(%error, "feedback payload rejected");
        })?;

        self.pipeline
            .authorize_write(draft.user_id, draft.training_session_id)
            .await?;

        let saved = self.upsert_with_retry(&draft).await?;
        info!(
            feedback_id = %saved.id,
            user_id = %saved.user_id,
            training_session_id = %saved.training_session_id,
            "feedback persisted"
        );
        Ok(saved)
    }

    async fn own_feedback_inner(
        &self,
        username: &Username,
        training_session_id: TrainingSessionId,
    ) -> Result<Feedback, FeedbackError> {
        debug!(%username, %training_session_id, "fetching own feedback");
        let user_id = self
            .pipeline
            .authorize_own_read(username, training_session_id)
            .await?;
        self.repository
            .find_by_natural_key(user_id, training_session_id)
            .await
            .map_err(Self::map_repository_error)?
            .ok_or_else(|| {
                warn!(%user_id, %training_session_id, "no feedback stored for session");
                FeedbackError::FeedbackNotFound
            })
    }

    async fn own_feedbacks_inner(&self, username: &Username) -> Result<Vec<Feedback>, FeedbackError> {
        let user_id = self.pipeline.resolve_caller(username).await?;
        self.repository
            .find_all_by_user(user_id)
            .await
            .map_err(Self::map_repository_error)
    }
}

#[async_trait]
impl<R> FeedbackCommand for FeedbackService<R>
where
    R: FeedbackRepository,
{
    async fn submit(&self, request: SubmitFeedbackRequest) -> Result<Feedback, Error> {
        self.submit_inner(request).await.map_err(Error::from)
    }
}

#[async_trait]
impl<R> FeedbackQuery for FeedbackService<R>
where
    R: FeedbackRepository,
{
    async fn own_feedback_for_session(
        &self,
        username: &Username,
        training_session_id: TrainingSessionId,
    ) -> Result<Feedback, Error> {
        self.own_feedback_inner(username, training_session_id)
            .await
            .map_err(Error::from)
    }

    async fn own_feedbacks(&self, username: &Username) -> Result<Vec<Feedback>, Error> {
        self.own_feedbacks_inner(username).await.map_err(Error::from)
    }

    async fn admin_by_user(&self, user_id: UserId) -> Result<Vec<Feedback>, Error> {
        info!(%user_id, "admin: listing feedback for user");
        self.repository
            .find_all_by_user(user_id)
            .await
            .map_err(|err| Error::from(Self::map_repository_error(err)))
    }

    async fn admin_by_training(
        &self,
        training_session_id: TrainingSessionId,
    ) -> Result<Vec<Feedback>, Error> {
        info!(%training_session_id, "admin: listing feedback for training session");
        self.repository
            .find_all_by_training(training_session_id)
            .await
            .map_err(|err| Error::from(Self::map_repository_error(err)))
    }

    async fn admin_by_natural_key(
        &self,
        user_id: UserId,
        training_session_id: TrainingSessionId,
    ) -> Result<Feedback, Error> {
        info!(%user_id, %training_session_id, "admin: fetching feedback");
        self.repository
            .find_by_natural_key(user_id, training_session_id)
            .await
            .map_err(Self::map_repository_error)?
            .ok_or(FeedbackError::FeedbackNotFound)
            .map_err(Error::from)
    }
}

#[cfg(test)]
#[path = "feedback_service_tests.rs"]
mod tests;
