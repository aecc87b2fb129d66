//! PostgreSQL inbox backing the user deletion subscription.
//!
//! Rows are claimed with `FOR UPDATE SKIP LOCKED` and a lease. Acknowledging
//! deletes the row; negative acknowledgement clears the lease so the next
//! poll picks it up again. A worker that dies mid-delivery leaves the lease to
//! expire, after which the event is redelivered.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::TimeDelta;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt as _;
use diesel_async::{AsyncConnection as _, RunQueryDsl};
use mockable::Clock;
use tracing::{debug, info};

use crate::domain::ports::{
    DeliveryTag, SubscriptionError, UserDeletionDelivery, UserDeletionPublisher,
    UserDeletionSubscription,
};
use crate::domain::{UserDeletedEvent, UserId};

use super::diesel_error_mapping::{DieselFailure, classify_diesel_error, pool_error_message};
use super::models::{InboxRow, NewInboxRow};
use super::pool::{DbPool, PoolError};
use super::schema::user_deletion_inbox;

/// Polling and lease settings for [`DieselUserDeletionInbox`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboxConfig {
    /// Pause between polls of an empty inbox.
    pub poll_interval: Duration,
    /// How long a claimed row stays invisible to other consumers.
    pub lease: Duration,
}

impl Default for InboxConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            lease: Duration::from_secs(30),
        }
    }
}

/// Durable user deletion queue stored in `user_deletion_inbox`.
///
/// [`UserDeletionSubscription::next_delivery`] polls until a row is available
/// and never reports the subscription as closed.
#[derive(Clone)]
pub struct DieselUserDeletionInbox {
    pool: DbPool,
    clock: Arc<dyn Clock>,
    config: InboxConfig,
}

impl DieselUserDeletionInbox {
    /// Create an inbox that reads lease times from `clock`.
    pub fn new(pool: DbPool, clock: Arc<dyn Clock>, config: InboxConfig) -> Self {
        Self {
            pool,
            clock,
            config,
        }
    }

    /// Claim the oldest available row, if any.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError`] when the database is unavailable.
    pub async fn try_claim(&self) -> Result<Option<UserDeletionDelivery>, SubscriptionError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let now = self.clock.utc();
        let lease =
            TimeDelta::from_std(self.config.lease).unwrap_or_else(|_| TimeDelta::seconds(30));
        let lease_expiry = now.checked_add_signed(lease).unwrap_or(now);

        let claimed: Option<InboxRow> = conn
            .transaction(|conn| {
                async move {
                    let row: Option<InboxRow> = user_deletion_inbox::table
                        .filter(
                            user_deletion_inbox::leased_until
                                .is_null()
                                .or(user_deletion_inbox::leased_until.le(now)),
                        )
                        .order_by((
                            user_deletion_inbox::enqueued_at,
                            user_deletion_inbox::event_id,
                        ))
                        .select(InboxRow::as_select())
                        .for_update()
                        .skip_locked()
                        .first(conn)
                        .await
                        .optional()?;
                    let Some(row) = row else {
                        return Ok(None);
                    };
                    diesel::update(user_deletion_inbox::table.find(row.event_id.as_str()))
                        .set(user_deletion_inbox::leased_until.eq(Some(lease_expiry)))
                        .execute(conn)
                        .await?;
                    Ok(Some(row))
                }
                .scope_boxed()
            })
            .await
            .map_err(map_diesel_error)?;

        Ok(claimed.map(row_to_delivery))
    }
}

fn map_pool_error(error: PoolError) -> SubscriptionError {
    SubscriptionError::connection(pool_error_message(error))
}

fn map_diesel_error(error: diesel::result::Error) -> SubscriptionError {
    match classify_diesel_error(error) {
        DieselFailure::Connection(message) => SubscriptionError::connection(message),
        DieselFailure::UniqueViolation(message) => SubscriptionError::query(message),
        DieselFailure::Query(message) => SubscriptionError::query(message),
    }
}

fn row_to_delivery(row: InboxRow) -> UserDeletionDelivery {
    UserDeletionDelivery {
        tag: DeliveryTag::new(row.event_id.as_str()),
        attempts: u32::try_from(row.attempts).unwrap_or(0),
        event: UserDeletedEvent {
            event_id: row.event_id,
            event_type: row.event_type,
            timestamp: row.occurred_at,
            user_id: UserId::new(row.user_id),
        },
    }
}

#[async_trait]
impl UserDeletionSubscription for DieselUserDeletionInbox {
    async fn next_delivery(&self) -> Result<Option<UserDeletionDelivery>, SubscriptionError> {
        loop {
            if let Some(delivery) = self.try_claim().await? {
                debug!(tag = %delivery.tag, attempts = delivery.attempts, "claimed inbox row");
                return Ok(Some(delivery));
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    async fn ack(&self, tag: &DeliveryTag) -> Result<(), SubscriptionError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let removed = diesel::delete(user_deletion_inbox::table.find(tag.as_str()))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        if removed == 0 {
            return Err(SubscriptionError::unknown_delivery(tag.as_str()));
        }
        Ok(())
    }

    async fn nack(&self, tag: &DeliveryTag) -> Result<(), SubscriptionError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let released = diesel::update(user_deletion_inbox::table.find(tag.as_str()))
            .set((
                user_deletion_inbox::leased_until.eq(None::<chrono::DateTime<chrono::Utc>>),
                user_deletion_inbox::attempts.eq(user_deletion_inbox::attempts + 1),
            ))
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        if released == 0 {
            return Err(SubscriptionError::unknown_delivery(tag.as_str()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserDeletionPublisher for DieselUserDeletionInbox {
    async fn publish(&self, event: &UserDeletedEvent) -> Result<bool, SubscriptionError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = NewInboxRow {
            event_id: event.event_id.as_str(),
            event_type: event.event_type.as_str(),
            user_id: event.user_id.as_i64(),
            occurred_at: event.timestamp,
        };
        let inserted = diesel::insert_into(user_deletion_inbox::table)
            .values(&row)
            .on_conflict(user_deletion_inbox::event_id)
            .do_nothing()
            .execute(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        if inserted == 0 {
            debug!(event_id = %event.event_id, "duplicate user event ignored");
            return Ok(false);
        }
        info!(event_id = %event.event_id, user_id = %event.user_id, "user event enqueued");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    #[rstest]
    fn rows_become_deliveries_tagged_by_event_id() {
        let occurred_at = Utc
            .with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
            .single()
            .expect("valid timestamp");
        let delivery = row_to_delivery(InboxRow {
            event_id: "evt-1".to_owned(),
            event_type: "USER_DELETED".to_owned(),
            user_id: 7,
            occurred_at,
            attempts: 2,
        });

        assert_eq!(delivery.tag, DeliveryTag::new("evt-1"));
        assert_eq!(delivery.attempts, 2);
        assert_eq!(delivery.event.user_id, UserId::new(7));
        assert_eq!(delivery.event.timestamp, occurred_at);
        assert!(delivery.event.is_user_deleted());
    }

    #[rstest]
    fn negative_attempt_counts_read_as_zero() {
        let delivery = row_to_delivery(InboxRow {
            event_id: "evt-2".to_owned(),
            event_type: "USER_DELETED".to_owned(),
            user_id: 7,
            occurred_at: Utc::now(),
            attempts: -1,
        });
        assert_eq!(delivery.attempts, 0);
    }

    #[rstest]
    fn default_config_polls_twice_a_second() {
        let config = InboxConfig::default();
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.lease, Duration::from_secs(30));
    }
}
