//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match `backend/migrations` exactly.

diesel::table! {
    /// One feedback per `(user_id, training_session_id)`.
    feedbacks (feedback_id) {
        /// Surrogate key, stable across upserts.
        feedback_id -> Int8,
        user_id -> Int8,
        training_session_id -> Int8,
        comment -> Text,
        /// Constrained to 1..=5 by a check constraint.
        star_rating -> Int2,
    }
}

diesel::table! {
    /// Durable queue of user deletion events awaiting processing.
    ///
    /// Rows are claimed by setting `leased_until`; acknowledging deletes the
    /// row. An expired lease makes the row claimable again.
    user_deletion_inbox (event_id) {
        event_id -> Text,
        event_type -> Text,
        user_id -> Int8,
        occurred_at -> Timestamptz,
        attempts -> Int4,
        leased_until -> Nullable<Timestamptz>,
        enqueued_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(feedbacks, user_deletion_inbox);
