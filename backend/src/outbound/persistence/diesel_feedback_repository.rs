//! PostgreSQL-backed `FeedbackRepository` implementation using Diesel ORM.
//!
//! Uniqueness of `(user_id, training_session_id)` is enforced by the table;
//! `upsert` relies on `ON CONFLICT .. DO UPDATE` so concurrent writers for the
//! same pair converge on one row.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, RunQueryDsl};
use tracing::debug;

use crate::domain::ports::{FeedbackRepository, FeedbackRepositoryError};
use crate::domain::{
    Comment, Feedback, FeedbackDraft, FeedbackId, FeedbackValidationError, StarRating,
    TrainingSessionId, UserId,
};

use super::diesel_error_mapping::{DieselFailure, classify_diesel_error, pool_error_message};
use super::models::{FeedbackRow, NewFeedbackRow};
use super::pool::{DbPool, PoolError};
use super::schema::feedbacks;

/// Diesel-backed implementation of the `FeedbackRepository` port.
#[derive(Clone)]
pub struct DieselFeedbackRepository {
    pool: DbPool,
}

impl DieselFeedbackRepository {
    /// Create a repository backed by `pool`.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> FeedbackRepositoryError {
    FeedbackRepositoryError::connection(pool_error_message(error))
}

fn map_diesel_error(error: diesel::result::Error) -> FeedbackRepositoryError {
    match classify_diesel_error(error) {
        DieselFailure::Connection(message) => FeedbackRepositoryError::connection(message),
        DieselFailure::UniqueViolation(message) => FeedbackRepositoryError::conflict(message),
        DieselFailure::Query(message) => FeedbackRepositoryError::query(message),
    }
}

fn row_to_feedback(row: FeedbackRow) -> Result<Feedback, FeedbackRepositoryError> {
    let feedback_id = row.feedback_id;
    let invalid = |err: FeedbackValidationError| {
        FeedbackRepositoryError::query(format!("stored feedback {feedback_id} is invalid: {err}"))
    };
    let comment = Comment::new(row.comment).map_err(invalid)?;
    let star_rating = StarRating::new(i64::from(row.star_rating)).map_err(invalid)?;
    Ok(Feedback {
        id: FeedbackId::new(row.feedback_id),
        user_id: UserId::new(row.user_id),
        training_session_id: TrainingSessionId::new(row.training_session_id),
        comment,
        star_rating,
    })
}

fn rows_to_feedback(rows: Vec<FeedbackRow>) -> Result<Vec<Feedback>, FeedbackRepositoryError> {
    rows.into_iter().map(row_to_feedback).collect()
}

#[async_trait]
impl FeedbackRepository for DieselFeedbackRepository {
    async fn upsert(&self, draft: &FeedbackDraft) -> Result<Feedback, FeedbackRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = NewFeedbackRow {
            user_id: draft.user_id.as_i64(),
            training_session_id: draft.training_session_id.as_i64(),
            comment: draft.comment.as_str(),
            star_rating: i16::from(draft.star_rating.value()),
        };

        let stored: FeedbackRow = diesel::insert_into(feedbacks::table)
            .values(&row)
            .on_conflict((feedbacks::user_id, feedbacks::training_session_id))
            .do_update()
            .set((
                feedbacks::comment.eq(excluded(feedbacks::comment)),
                feedbacks::star_rating.eq(excluded(feedbacks::star_rating)),
            ))
            .returning(FeedbackRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        debug!(feedback_id = stored.feedback_id, "feedback row upserted");
        row_to_feedback(stored)
    }

    async fn find_by_natural_key(
        &self,
        user_id: UserId,
        training_session_id: TrainingSessionId,
    ) -> Result<Option<Feedback>, FeedbackRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let row: Option<FeedbackRow> = feedbacks::table
            .filter(feedbacks::user_id.eq(user_id.as_i64()))
            .filter(feedbacks::training_session_id.eq(training_session_id.as_i64()))
            .select(FeedbackRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;

        row.map(row_to_feedback).transpose()
    }

    async fn find_all_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Feedback>, FeedbackRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let rows: Vec<FeedbackRow> = feedbacks::table
            .filter(feedbacks::user_id.eq(user_id.as_i64()))
            .order_by(feedbacks::feedback_id)
            .select(FeedbackRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        rows_to_feedback(rows)
    }

    async fn find_all_by_training(
        &self,
        training_session_id: TrainingSessionId,
    ) -> Result<Vec<Feedback>, FeedbackRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        let rows: Vec<FeedbackRow> = feedbacks::table
            .filter(feedbacks::training_session_id.eq(training_session_id.as_i64()))
            .order_by(feedbacks::feedback_id)
            .select(FeedbackRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;

        rows_to_feedback(rows)
    }

    async fn delete_all_by_user(&self, user_id: UserId) -> Result<u64, FeedbackRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let owner = user_id.as_i64();

        let deleted = conn
            .transaction(|conn| {
                async move {
                    diesel::delete(feedbacks::table.filter(feedbacks::user_id.eq(owner)))
                        .execute(conn)
                        .await
                }
                .scope_boxed()
            })
            .await
            .map_err(map_diesel_error)?;

        Ok(deleted as u64)
    }
}

#[cfg(test)]
mod tests {
    //! Row conversion and error mapping; database behaviour is covered by the
    //! integration suite.

    use super::*;
    use diesel::result::{DatabaseErrorKind, Error as DieselError};
    use rstest::rstest;

    fn row(comment: &str, star_rating: i16) -> FeedbackRow {
        FeedbackRow {
            feedback_id: 9,
            user_id: 1,
            training_session_id: 2,
            comment: comment.to_owned(),
            star_rating,
        }
    }

    #[rstest]
    fn converts_rows_into_domain_feedback() {
        let feedback = row_to_feedback(row("solid session", 4)).expect("valid row");

        assert_eq!(feedback.id, FeedbackId::new(9));
        assert_eq!(feedback.user_id, UserId::new(1));
        assert_eq!(feedback.training_session_id, TrainingSessionId::new(2));
        assert_eq!(feedback.comment.as_str(), "solid session");
        assert_eq!(feedback.star_rating.value(), 4);
    }

    #[rstest]
    #[case::blank_comment(row("  ", 3))]
    #[case::rating_out_of_range(row("fine", 9))]
    fn corrupt_rows_are_query_errors(#[case] corrupt: FeedbackRow) {
        let error = row_to_feedback(corrupt).expect_err("corrupt row");
        assert!(matches!(error, FeedbackRepositoryError::Query { .. }));
    }

    #[rstest]
    fn unique_violation_maps_to_conflict() {
        let error = map_diesel_error(DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new("duplicate key".to_owned()),
        ));
        assert!(
            matches!(error, FeedbackRepositoryError::Conflict { .. }),
            "expected Conflict, got {error:?}"
        );
    }

    #[rstest]
    fn pool_failure_maps_to_connection() {
        let error = map_pool_error(PoolError::checkout("timed out"));
        assert!(matches!(error, FeedbackRepositoryError::Connection { .. }));
    }
}
