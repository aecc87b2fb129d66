//! Feedback HTTP handlers.
//!
//! ```text
//! POST /feedbacks/{userId}/{trainingSessionId}
//! GET  /feedbacks/me
//! GET  /feedbacks/{trainingSessionId}
//! GET  /feedbacks/admin/by-user/{userId}
//! GET  /feedbacks/admin/by-training/{trainingSessionId}
//! GET  /feedbacks/admin/{userId}/{trainingSessionId}
//! POST /feedbacks/admin/events/user-deleted
//! ```

use std::sync::Arc;

use actix_web::{HttpResponse, get, post, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use utoipa::ToSchema;

use crate::domain::ports::{SubmitFeedbackRequest, SubscriptionError};
use crate::domain::{Error, Feedback, TraceId, TrainingSessionId, UserDeletedEvent, UserId};
use crate::inbound::http::ApiResult;
use crate::inbound::http::error::{json_error_handler, path_error_handler};
use crate::inbound::http::principal::Principal;
use crate::inbound::http::state::HttpState;

#[derive(Debug, Deserialize)]
struct FeedbackKeyPath {
    user_id: i64,
    training_session_id: i64,
}

#[derive(Debug, Deserialize)]
struct UserPath {
    user_id: i64,
}

#[derive(Debug, Deserialize)]
struct TrainingPath {
    training_session_id: i64,
}

/// Request payload for creating or replacing feedback.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    #[schema(example = "Great pacing, loved the kata drills")]
    pub comment: String,
    #[schema(example = 5, minimum = 1, maximum = 5)]
    pub star_rating: i64,
}

/// Single feedback record as seen by its author.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackResponse {
    pub comment: String,
    pub star_rating: i64,
}

impl From<&Feedback> for FeedbackResponse {
    fn from(value: &Feedback) -> Self {
        Self {
            comment: value.comment.as_str().to_owned(),
            star_rating: i64::from(value.star_rating),
        }
    }
}

/// Feedback record in list responses.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackListItem {
    pub feedback_id: i64,
    pub user_id: i64,
    pub training_session_id: i64,
    pub comment: String,
    pub star_rating: i64,
}

impl From<Feedback> for FeedbackListItem {
    fn from(value: Feedback) -> Self {
        Self {
            feedback_id: value.id.as_i64(),
            user_id: value.user_id.as_i64(),
            training_session_id: value.training_session_id.as_i64(),
            star_rating: i64::from(value.star_rating),
            comment: value.comment.into(),
        }
    }
}

fn list_items(feedbacks: Vec<Feedback>) -> web::Json<Vec<FeedbackListItem>> {
    web::Json(feedbacks.into_iter().map(FeedbackListItem::from).collect())
}

/// User deletion event pushed by the broker bridge or an operator.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserDeletedEventBody {
    #[schema(example = "8d0f2c1e-user-deleted-42")]
    pub event_id: String,
    #[schema(example = "USER_DELETED")]
    pub event_type: String,
    #[schema(value_type = String, format = DateTime)]
    pub timestamp: DateTime<Utc>,
    #[schema(example = 42)]
    pub user_id: i64,
}

impl TryFrom<UserDeletedEventBody> for UserDeletedEvent {
    type Error = Error;

    fn try_from(value: UserDeletedEventBody) -> Result<Self, Self::Error> {
        let blank = |field: &str| {
            Error::invalid_request(format!("{field} must not be blank"))
                .with_details(json!({ "kind": "validation_failed", "field": field }))
        };
        if value.event_id.trim().is_empty() {
            return Err(blank("eventId"));
        }
        if value.event_type.trim().is_empty() {
            return Err(blank("eventType"));
        }
        Ok(Self {
            event_id: value.event_id,
            event_type: value.event_type,
            timestamp: value.timestamp,
            user_id: UserId::new(value.user_id),
        })
    }
}

/// Outcome of publishing a user deletion event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventAcceptedResponse {
    pub event_id: String,
    /// `false` when the event id had already been enqueued.
    pub enqueued: bool,
}

fn map_subscription_error(err: SubscriptionError) -> Error {
    error!(error = %err, "failed to enqueue user deletion event");
    Error::internal(err.to_string())
}

/// Create or replace the feedback a user left for a training session.
///
/// The write runs on its own task so a client disconnect cannot abandon it
/// between the remote checks and the upsert.
#[utoipa::path(
    post,
    path = "/feedbacks/{user_id}/{training_session_id}",
    params(
        ("user_id" = i64, Path, description = "Author of the feedback"),
        ("training_session_id" = i64, Path, description = "Training session being rated")
    ),
    request_body = FeedbackRequest,
    responses(
        (status = 201, description = "Feedback stored", body = FeedbackResponse),
        (status = 400, description = "Invalid request", body = Error),
        (status = 401, description = "Unauthorised", body = Error),
        (status = 403, description = "Forbidden or not enrolled", body = Error),
        (status = 404, description = "User or training session not found", body = Error),
        (status = 409, description = "Upstream conflict", body = Error),
        (status = 500, description = "Internal server error", body = Error)
    ),
    tags = ["feedback"],
    operation_id = "submitFeedback"
)]
#[post("/feedbacks/{user_id}/{training_session_id}")]
pub async fn submit_feedback(
    state: web::Data<HttpState>,
    caller: Principal,
    path: web::Path<FeedbackKeyPath>,
    payload: web::Json<FeedbackRequest>,
) -> ApiResult<HttpResponse> {
    caller.require_admin()?;
    let FeedbackKeyPath {
        user_id,
        training_session_id,
    } = path.into_inner();
    let FeedbackRequest {
        comment,
        star_rating,
    } = payload.into_inner();
    let request = SubmitFeedbackRequest {
        user_id: UserId::new(user_id),
        training_session_id: TrainingSessionId::new(training_session_id),
        comment,
        star_rating,
    };

    let command = Arc::clone(&state.feedback);
    let trace_id = TraceId::current().unwrap_or_else(TraceId::generate);
    let feedback = tokio::spawn(TraceId::scope(trace_id, async move {
        command.submit(request).await
    }))
    .await
    .map_err(|err| {
        error!(error = %err, "feedback write task did not complete");
        Error::internal("feedback write task did not complete")
    })??;

    Ok(HttpResponse::Created().json(FeedbackResponse::from(&feedback)))
}

/// Every feedback the caller has left.
#[utoipa::path(
    get,
    path = "/feedbacks/me",
    responses(
        (status = 200, description = "Caller's feedback", body = [FeedbackListItem]),
        (status = 401, description = "Unauthorised", body = Error),
        (status = 403, description = "Forbidden", body = Error),
        (status = 500, description = "Internal server error", body = Error)
    ),
    tags = ["feedback"],
    operation_id = "listOwnFeedback"
)]
#[get("/feedbacks/me")]
pub async fn own_feedbacks(
    state: web::Data<HttpState>,
    caller: Principal,
) -> ApiResult<web::Json<Vec<FeedbackListItem>>> {
    let username = caller.require_member()?;
    let feedbacks = state.feedback_query.own_feedbacks(username).await?;
    Ok(list_items(feedbacks))
}

/// The caller's feedback for one training session.
#[utoipa::path(
    get,
    path = "/feedbacks/{training_session_id}",
    params(("training_session_id" = i64, Path, description = "Training session")),
    responses(
        (status = 200, description = "Caller's feedback", body = FeedbackResponse),
        (status = 401, description = "Unauthorised", body = Error),
        (status = 403, description = "Not enrolled", body = Error),
        (status = 404, description = "Training session or feedback not found", body = Error),
        (status = 500, description = "Internal server error", body = Error)
    ),
    tags = ["feedback"],
    operation_id = "getOwnFeedback"
)]
#[get("/feedbacks/{training_session_id}")]
pub async fn own_feedback(
    state: web::Data<HttpState>,
    caller: Principal,
    path: web::Path<TrainingPath>,
) -> ApiResult<web::Json<FeedbackResponse>> {
    let username = caller.require_member()?;
    let training_session_id = TrainingSessionId::new(path.into_inner().training_session_id);
    let feedback = state
        .feedback_query
        .own_feedback_for_session(username, training_session_id)
        .await?;
    Ok(web::Json(FeedbackResponse::from(&feedback)))
}

/// Every feedback left by a user.
#[utoipa::path(
    get,
    path = "/feedbacks/admin/by-user/{user_id}",
    params(("user_id" = i64, Path, description = "Author")),
    responses(
        (status = 200, description = "Feedback by user", body = [FeedbackListItem]),
        (status = 401, description = "Unauthorised", body = Error),
        (status = 403, description = "Forbidden", body = Error),
        (status = 500, description = "Internal server error", body = Error)
    ),
    tags = ["feedback-admin"],
    operation_id = "adminListFeedbackByUser"
)]
#[get("/feedbacks/admin/by-user/{user_id}")]
pub async fn admin_by_user(
    state: web::Data<HttpState>,
    caller: Principal,
    path: web::Path<UserPath>,
) -> ApiResult<web::Json<Vec<FeedbackListItem>>> {
    caller.require_admin()?;
    let feedbacks = state
        .feedback_query
        .admin_by_user(UserId::new(path.into_inner().user_id))
        .await?;
    Ok(list_items(feedbacks))
}

/// Every feedback left for a training session.
#[utoipa::path(
    get,
    path = "/feedbacks/admin/by-training/{training_session_id}",
    params(("training_session_id" = i64, Path, description = "Training session")),
    responses(
        (status = 200, description = "Feedback by training session", body = [FeedbackListItem]),
        (status = 401, description = "Unauthorised", body = Error),
        (status = 403, description = "Forbidden", body = Error),
        (status = 500, description = "Internal server error", body = Error)
    ),
    tags = ["feedback-admin"],
    operation_id = "adminListFeedbackByTraining"
)]
#[get("/feedbacks/admin/by-training/{training_session_id}")]
pub async fn admin_by_training(
    state: web::Data<HttpState>,
    caller: Principal,
    path: web::Path<TrainingPath>,
) -> ApiResult<web::Json<Vec<FeedbackListItem>>> {
    caller.require_admin()?;
    let feedbacks = state
        .feedback_query
        .admin_by_training(TrainingSessionId::new(path.into_inner().training_session_id))
        .await?;
    Ok(list_items(feedbacks))
}

/// The feedback stored for one user and training session.
#[utoipa::path(
    get,
    path = "/feedbacks/admin/{user_id}/{training_session_id}",
    params(
        ("user_id" = i64, Path, description = "Author"),
        ("training_session_id" = i64, Path, description = "Training session")
    ),
    responses(
        (status = 200, description = "Stored feedback", body = FeedbackResponse),
        (status = 401, description = "Unauthorised", body = Error),
        (status = 403, description = "Forbidden", body = Error),
        (status = 404, description = "Feedback not found", body = Error),
        (status = 500, description = "Internal server error", body = Error)
    ),
    tags = ["feedback-admin"],
    operation_id = "adminGetFeedback"
)]
#[get("/feedbacks/admin/{user_id}/{training_session_id}")]
pub async fn admin_by_natural_key(
    state: web::Data<HttpState>,
    caller: Principal,
    path: web::Path<FeedbackKeyPath>,
) -> ApiResult<web::Json<FeedbackResponse>> {
    caller.require_admin()?;
    let FeedbackKeyPath {
        user_id,
        training_session_id,
    } = path.into_inner();
    let feedback = state
        .feedback_query
        .admin_by_natural_key(
            UserId::new(user_id),
            TrainingSessionId::new(training_session_id),
        )
        .await?;
    Ok(web::Json(FeedbackResponse::from(&feedback)))
}

/// Enqueue a user deletion event for the consistency worker.
#[utoipa::path(
    post,
    path = "/feedbacks/admin/events/user-deleted",
    request_body = UserDeletedEventBody,
    responses(
        (status = 202, description = "Event accepted", body = EventAcceptedResponse),
        (status = 400, description = "Invalid request", body = Error),
        (status = 401, description = "Unauthorised", body = Error),
        (status = 403, description = "Forbidden", body = Error),
        (status = 500, description = "Internal server error", body = Error)
    ),
    tags = ["feedback-admin"],
    operation_id = "publishUserDeleted"
)]
#[post("/feedbacks/admin/events/user-deleted")]
pub async fn publish_user_deleted(
    state: web::Data<HttpState>,
    caller: Principal,
    payload: web::Json<UserDeletedEventBody>,
) -> ApiResult<HttpResponse> {
    caller.require_admin()?;
    let event = UserDeletedEvent::try_from(payload.into_inner())?;
    let enqueued = state
        .user_deletions
        .publish(&event)
        .await
        .map_err(map_subscription_error)?;
    info!(
        event_id = %event.event_id,
        user_id = %event.user_id,
        enqueued,
        "user deletion event accepted"
    );
    Ok(HttpResponse::Accepted().json(EventAcceptedResponse {
        event_id: event.event_id,
        enqueued,
    }))
}

/// Register the feedback routes and their extractor error handlers.
///
/// Literal segments are registered before the parameterised routes they
/// would otherwise be captured by.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .app_data(web::PathConfig::default().error_handler(path_error_handler))
        .service(publish_user_deleted)
        .service(admin_by_user)
        .service(admin_by_training)
        .service(admin_by_natural_key)
        .service(own_feedbacks)
        .service(own_feedback)
        .service(submit_feedback);
}

#[cfg(test)]
#[path = "feedback_tests.rs"]
mod tests;
