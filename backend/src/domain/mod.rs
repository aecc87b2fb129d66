//! Domain primitives, services and ports.
//!
//! Purpose: hold the feedback model, the remote validation pipeline, and the
//! consistency worker, independent of HTTP, SQL and queue adapters.
//!
//! Public surface:
//! - Error (alias to `error::Error`): API error response payload.
//! - FeedbackError: typed failure kinds raised by the feedback service.
//! - FeedbackService: driving port implementation for feedback commands and
//!   queries.
//! - ConsistencyWorker: consume loop for user deletion events.

pub mod circuit_breaker;
pub mod consistency_worker;
pub mod error;
pub mod feedback;
pub mod feedback_error;
pub mod feedback_service;
pub mod guarded_remote;
pub mod ports;
pub mod trace_id;
pub mod user_events;
pub mod validation;

pub use self::circuit_breaker::{CallPermit, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use self::consistency_worker::{ConsistencyWorker, ConsistencyWorkerConfig, WorkerStep};
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::feedback::{
    COMMENT_MAX, Comment, Feedback, FeedbackDraft, FeedbackId, FeedbackValidationError,
    STAR_RATING_MAX, STAR_RATING_MIN, StarRating, TrainingSessionId, UserId, Username,
};
pub use self::feedback_error::FeedbackError;
pub use self::feedback_service::FeedbackService;
pub use self::guarded_remote::{
    GuardedRemote, RemoteCheckSettings, RemoteFactCheckers, UpstreamDirectories,
};
pub use self::trace_id::{TRACE_ID_HEADER, TraceId};
pub use self::user_events::{USER_DELETED_EVENT_TYPE, UserDeletedEvent};
pub use self::validation::ValidationPipeline;

/// Convenient API result alias.
///
/// # Examples
/// ```
/// use actix_web::HttpResponse;
/// use feedback_service::domain::{ApiResult, Error};
///
/// fn handler() -> ApiResult<HttpResponse> {
///     Err(Error::forbidden("nope"))
/// }
/// ```
pub type ApiResult<T> = Result<T, Error>;
