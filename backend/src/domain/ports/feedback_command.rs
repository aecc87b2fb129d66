//! Driving port for feedback writes.

use async_trait::async_trait;

use crate::domain::{
    Comment, Error, Feedback, FeedbackDraft, FeedbackId, StarRating, TrainingSessionId, UserId,
};

/// Raw write request as received from an inbound adapter.
///
/// Values are unvalidated; the command validates them before any remote
/// check runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitFeedbackRequest {
    pub user_id: UserId,
    pub training_session_id: TrainingSessionId,
    pub comment: String,
    pub star_rating: i64,
}

/// Domain use-case port for creating or replacing feedback.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeedbackCommand: Send + Sync {
    /// Validate and store feedback for the request's natural key.
    async fn submit(&self, request: SubmitFeedbackRequest) -> Result<Feedback, Error>;
}

/// Fixture command that validates the payload and echoes it back.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureFeedbackCommand;

#[async_trait]
impl FeedbackCommand for FixtureFeedbackCommand {
    async fn submit(&self, request: SubmitFeedbackRequest) -> Result<Feedback, Error> {
        let comment =
            Comment::new(request.comment).map_err(|err| Error::invalid_request(err.to_string()))?;
        let star_rating = StarRating::new(request.star_rating)
            .map_err(|err| Error::invalid_request(err.to_string()))?;
        Ok(Feedback::from_draft(
            FeedbackId::new(1),
            FeedbackDraft {
                user_id: request.user_id,
                training_session_id: request.training_session_id,
                comment,
                star_rating,
            },
        ))
    }
}
