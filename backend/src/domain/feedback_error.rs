//! Typed failure kinds for feedback operations.
//!
//! Remote dependency failures never appear here as their own kind: a failed
//! check collapses into the same denial as a confirmed absence. The single
//! exception is an upstream conflict signal, which is reported as
//! [`FeedbackError::UpstreamConflict`].

use serde_json::json;

use super::{Error, FeedbackValidationError};

/// Outcome kinds surfaced by the feedback service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedbackError {
    /// No resolvable identity for the caller.
    #[error("caller identity could not be resolved")]
    Unauthenticated,
    /// The referenced user is absent or its service is unreachable.
    #[error("user not found")]
    UserNotFound,
    /// The referenced training session is absent or its service is unreachable.
    #[error("training session not found")]
    TrainingNotFound,
    /// The enrollment fact is false or unresolved.
    #[error("user is not enrolled in the training session")]
    NotEnrolled,
    /// Validation passed but nothing is stored for the natural key.
    #[error("feedback not found")]
    FeedbackNotFound,
    /// Malformed input.
    #[error("{message}")]
    ValidationFailed { field: String, message: String },
    /// A dependency answered with a conflict.
    #[error("conflict reported by {dependency}: {message}")]
    UpstreamConflict { dependency: String, message: String },
    /// Anything else.
    #[error("unexpected failure: {message}")]
    Unexpected { message: String },
}

impl FeedbackError {
    /// Build an [`FeedbackError::UpstreamConflict`].
    pub fn upstream_conflict(dependency: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UpstreamConflict {
            dependency: dependency.into(),
            message: message.into(),
        }
    }

    /// Build an [`FeedbackError::Unexpected`].
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }

    /// Stable snake_case identifier exposed in error details.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::UserNotFound => "user_not_found",
            Self::TrainingNotFound => "training_not_found",
            Self::NotEnrolled => "not_enrolled",
            Self::FeedbackNotFound => "feedback_not_found",
            Self::ValidationFailed { .. } => "validation_failed",
            Self::UpstreamConflict { .. } => "upstream_conflict",
            Self::Unexpected { .. } => "unexpected",
        }
    }
}

impl From<FeedbackValidationError> for FeedbackError {
    fn from(value: FeedbackValidationError) -> Self {
        Self::ValidationFailed {
            field: value.field().to_owned(),
            message: value.to_string(),
        }
    }
}

impl From<FeedbackError> for Error {
    fn from(value: FeedbackError) -> Self {
        let kind = value.kind();
        let message = value.to_string();
        match value {
            FeedbackError::Unauthenticated => Error::unauthorized(message),
            FeedbackError::UserNotFound
            | FeedbackError::TrainingNotFound
            | FeedbackError::FeedbackNotFound => {
                Error::not_found(message).with_details(json!({ "kind": kind }))
            }
            FeedbackError::NotEnrolled => {
                Error::forbidden(message).with_details(json!({ "kind": kind }))
            }
            FeedbackError::ValidationFailed { field, .. } => Error::invalid_request(message)
                .with_details(json!({ "kind": kind, "field": field })),
            FeedbackError::UpstreamConflict { dependency, .. } => Error::conflict(message)
                .with_details(json!({ "kind": kind, "dependency": dependency })),
            FeedbackError::Unexpected { .. } => Error::internal(message),
        }
    }
}
