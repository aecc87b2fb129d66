//! Events published by the user service that this service reacts to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;

/// Event type carried by user deletion events.
pub const USER_DELETED_EVENT_TYPE: &str = "USER_DELETED";

/// Notification that a user was removed elsewhere in the system.
///
/// Delivered at least once; handlers must be idempotent.
///
/// # Examples
/// ```
/// use feedback_service::domain::UserDeletedEvent;
///
/// let event: UserDeletedEvent = serde_json::from_str(
///     r#"{"eventId":"e-1","eventType":"USER_DELETED","timestamp":"2026-03-01T09:00:00Z","userId":7}"#,
/// )
/// .expect("valid event");
/// assert!(event.is_user_deleted());
/// assert_eq!(event.user_id.as_i64(), 7);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDeletedEvent {
    /// Producer-assigned unique id, used for inbox deduplication.
    pub event_id: String,
    /// Discriminator; [`USER_DELETED_EVENT_TYPE`] for deletions.
    pub event_type: String,
    /// When the deletion happened.
    pub timestamp: DateTime<Utc>,
    /// The deleted user.
    pub user_id: UserId,
}

impl UserDeletedEvent {
    /// Whether the event type is [`USER_DELETED_EVENT_TYPE`].
    pub fn is_user_deleted(&self) -> bool {
        self.event_type == USER_DELETED_EVENT_TYPE
    }
}
