//! Internal Diesel row structs for database operations.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use super::schema::{feedbacks, user_deletion_inbox};

/// Row struct for reading from the feedbacks table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = feedbacks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct FeedbackRow {
    pub feedback_id: i64,
    pub user_id: i64,
    pub training_session_id: i64,
    pub comment: String,
    pub star_rating: i16,
}

/// Insertable struct for feedback upserts.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = feedbacks)]
pub(crate) struct NewFeedbackRow<'a> {
    pub user_id: i64,
    pub training_session_id: i64,
    pub comment: &'a str,
    pub star_rating: i16,
}

/// Row struct for reading claimed inbox entries.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = user_deletion_inbox)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct InboxRow {
    pub event_id: String,
    pub event_type: String,
    pub user_id: i64,
    pub occurred_at: DateTime<Utc>,
    pub attempts: i32,
}

/// Insertable struct for publishing inbox entries.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = user_deletion_inbox)]
pub(crate) struct NewInboxRow<'a> {
    pub event_id: &'a str,
    pub event_type: &'a str,
    pub user_id: i64,
    pub occurred_at: DateTime<Utc>,
}
