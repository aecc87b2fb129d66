//! Ports for the durable user deletion stream.
//!
//! Delivery is at least once. A delivery stays pending until it is acked;
//! a nack (or a consumer crash before ack) makes it available again.

use async_trait::async_trait;

use crate::domain::UserDeletedEvent;

use super::define_port_error;

define_port_error! {
    /// Errors raised by subscription adapters.
    pub enum SubscriptionError {
        /// The backing store or broker could not be reached.
        Connection { message: String } => "subscription connection failed: {message}",
        /// A claim, ack or nack statement failed.
        Query { message: String } => "subscription operation failed: {message}",
        /// The delivery tag does not name a pending delivery.
        UnknownDelivery { tag: String } => "no pending delivery for tag {tag}",
    }
}

/// Opaque handle used to ack or nack one delivery.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeliveryTag(String);

impl DeliveryTag {
    /// Wrap an adapter-specific tag.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrow the raw tag.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for DeliveryTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One delivery of a user deletion event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDeletionDelivery {
    pub tag: DeliveryTag,
    pub event: UserDeletedEvent,
    /// Previous delivery attempts, zero on first delivery.
    pub attempts: u32,
}

/// Consumer side of the stream.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDeletionSubscription: Send + Sync {
    /// Wait for the next delivery; `None` once the subscription is closed.
    async fn next_delivery(&self) -> Result<Option<UserDeletionDelivery>, SubscriptionError>;

    /// Confirm a delivery was fully processed.
    async fn ack(&self, tag: &DeliveryTag) -> Result<(), SubscriptionError>;

    /// Return a delivery for redelivery.
    async fn nack(&self, tag: &DeliveryTag) -> Result<(), SubscriptionError>;
}

/// Producer side of the stream.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDeletionPublisher: Send + Sync {
    /// Enqueue an event. Returns `false` when the event id was already enqueued.
    async fn publish(&self, event: &UserDeletedEvent) -> Result<bool, SubscriptionError>;
}
