//! In-process user deletion queue.
//!
//! Implements both sides of the user deletion stream over a mutex-guarded
//! deque. Unacknowledged deliveries are tracked by tag so `nack` can requeue
//! them; event ids are remembered so republishing an event is a no-op. Used
//! by tests and when the service runs without the database inbox.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::debug;

use crate::domain::UserDeletedEvent;
use crate::domain::ports::{
    DeliveryTag, SubscriptionError, UserDeletionDelivery, UserDeletionPublisher,
    UserDeletionSubscription,
};

#[derive(Default)]
struct QueueState {
    pending: VecDeque<(UserDeletedEvent, u32)>,
    unacked: HashMap<DeliveryTag, (UserDeletedEvent, u32)>,
    seen: HashSet<String>,
    closed: bool,
}

/// In-memory user deletion queue with at-least-once delivery.
#[derive(Default)]
pub struct InMemoryUserDeletionQueue {
    state: Mutex<QueueState>,
    ready: Notify,
}

impl InMemoryUserDeletionQueue {
    /// Create an empty, open queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop handing out deliveries once the pending queue drains.
    pub fn close(&self) {
        self.lock_state().closed = true;
        self.ready.notify_waiters();
    }

    /// Events waiting for delivery.
    pub fn pending_len(&self) -> usize {
        self.lock_state().pending.len()
    }

    /// Deliveries handed out but not yet settled.
    pub fn in_flight_len(&self) -> usize {
        self.lock_state().unacked.len()
    }

    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_next(&self) -> Option<Option<UserDeletionDelivery>> {
        let mut state = self.lock_state();
        if let Some((event, attempts)) = state.pending.pop_front() {
            let tag = DeliveryTag::new(event.event_id.as_str());
            state.unacked.insert(tag.clone(), (event.clone(), attempts));
            return Some(Some(UserDeletionDelivery {
                tag,
                event,
                attempts,
            }));
        }
        state.closed.then_some(None)
    }
}

#[async_trait]
impl UserDeletionSubscription for InMemoryUserDeletionQueue {
    async fn next_delivery(&self) -> Result<Option<UserDeletionDelivery>, SubscriptionError> {
        loop {
            let notified = self.ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Some(outcome) = self.take_next() {
                return Ok(outcome);
            }
            notified.await;
        }
    }

    async fn ack(&self, tag: &DeliveryTag) -> Result<(), SubscriptionError> {
        self.lock_state()
            .unacked
            .remove(tag)
            .map(|_| ())
            .ok_or_else(|| SubscriptionError::unknown_delivery(tag.as_str()))
    }

    async fn nack(&self, tag: &DeliveryTag) -> Result<(), SubscriptionError> {
        {
            let mut state = self.lock_state();
            let (event, attempts) = state
                .unacked
                .remove(tag)
                .ok_or_else(|| SubscriptionError::unknown_delivery(tag.as_str()))?;
            state.pending.push_back((event, attempts.saturating_add(1)));
        }
        debug!(%tag, "delivery requeued");
        self.ready.notify_one();
        Ok(())
    }
}

#[async_trait]
impl UserDeletionPublisher for InMemoryUserDeletionQueue {
    async fn publish(&self, event: &UserDeletedEvent) -> Result<bool, SubscriptionError> {
        {
            let mut state = self.lock_state();
            if !state.seen.insert(event.event_id.clone()) {
                return Ok(false);
            }
            state.pending.push_back((event.clone(), 0));
        }
        self.ready.notify_one();
        Ok(true)
    }
}
