//! Consume loop that removes feedback owned by deleted users.
//!
//! Deliveries arrive at least once. Each one is handled by deleting every
//! feedback row for the user and acknowledging only after the delete
//! committed; a failed delete is negatively acknowledged so the event comes
//! back. Deleting an already-empty set is a success, which makes redelivery
//! harmless.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use super::TraceId;
use super::ports::{
    FeedbackRepository, SubscriptionError, UserDeletionDelivery, UserDeletionSubscription,
};

/// Outcome of handling one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStep {
    /// Feedback was deleted and the delivery acknowledged.
    Processed { deleted: u64 },
    /// The event was not a user deletion; acknowledged without action.
    Skipped,
    /// The delete failed and the delivery was returned for redelivery.
    Redelivered,
    /// The subscription is closed.
    Closed,
}

/// Worker tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsistencyWorkerConfig {
    /// Pause after a failed delivery or subscription error.
    pub retry_backoff: Duration,
}

impl Default for ConsistencyWorkerConfig {
    fn default() -> Self {
        Self {
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// Applies user deletion events to the feedback store.
pub struct ConsistencyWorker {
    repository: Arc<dyn FeedbackRepository>,
    subscription: Arc<dyn UserDeletionSubscription>,
    config: ConsistencyWorkerConfig,
}

impl ConsistencyWorker {
    /// Build a worker that drains `subscription` into `repository`.
    pub fn new(
        repository: Arc<dyn FeedbackRepository>,
        subscription: Arc<dyn UserDeletionSubscription>,
        config: ConsistencyWorkerConfig,
    ) -> Self {
        Self {
            repository,
            subscription,
            config,
        }
    }

    /// Run until `shutdown` flips to `true`, its sender is dropped, or the
    /// subscription closes.
    ///
    /// A delivery interrupted by shutdown is left unacknowledged and will be
    /// redelivered.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("consistency worker started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            let step = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                step = self.process_next() => step,
            };
            match step {
                Ok(WorkerStep::Closed) => break,
                Ok(WorkerStep::Redelivered) => self.pause(&mut shutdown).await,
                Ok(_) => {}
                Err(err) => {
                    error!(error = %err, "user deletion subscription failed");
                    self.pause(&mut shutdown).await;
                }
            }
        }
        info!("consistency worker stopped");
    }

    /// Receive and handle a single delivery.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError`] when receiving, acknowledging or
    /// negatively acknowledging fails. An unacknowledged delivery is
    /// redelivered by the subscription.
    pub async fn process_next(&self) -> Result<WorkerStep, SubscriptionError> {
        let Some(delivery) = self.subscription.next_delivery().await? else {
            return Ok(WorkerStep::Closed);
        };
        TraceId::scope(TraceId::generate(), self.handle(delivery)).await
    }

    async fn handle(&self, delivery: UserDeletionDelivery) -> Result<WorkerStep, SubscriptionError> {
        let UserDeletionDelivery {
            tag,
            event,
            attempts,
        } = delivery;
        if !event.is_user_deleted() {
            warn!(
                event_id = %event.event_id,
                event_type = %event.event_type,
                "ignoring unrelated user event"
            );
            self.subscription.ack(&tag).await?;
            return Ok(WorkerStep::Skipped);
        }

        let user_id = event.user_id;
        info!(%user_id, event_id = %event.event_id, attempts, "received user deleted event");
        match self.repository.delete_all_by_user(user_id).await {
            Ok(deleted) => {
                self.subscription.ack(&tag).await?;
                info!(%user_id, deleted, "deleted feedback for user");
                Ok(WorkerStep::Processed { deleted })
            }
            Err(err) => {
                warn!(%user_id, error = %err, "feedback deletion failed, requesting redelivery");
                self.subscription.nack(&tag).await?;
                Ok(WorkerStep::Redelivered)
            }
        }
    }

    async fn pause(&self, shutdown: &mut watch::Receiver<bool>) {
        tokio::select! {
            _ = shutdown.changed() => {}
            () = tokio::time::sleep(self.config.retry_backoff) => {}
        }
    }
}

#[cfg(test)]
#[path = "consistency_worker_tests.rs"]
mod tests;
