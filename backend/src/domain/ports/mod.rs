//! Domain ports and supporting types for the hexagonal boundary.
//!
//! Driven ports (`*Directory`, [`FeedbackRepository`], the user deletion
//! subscription) are implemented by outbound adapters. Driving ports
//! ([`FeedbackCommand`], [`FeedbackQuery`]) are implemented by the domain and
//! consumed by inbound adapters.

mod macros;
pub(crate) use macros::define_port_error;

mod feedback_command;
mod feedback_query;
mod feedback_repository;
mod upstream_directory;
mod user_deletion_subscription;

pub use feedback_command::{FeedbackCommand, FixtureFeedbackCommand, SubmitFeedbackRequest};
#[cfg(test)]
pub use feedback_command::MockFeedbackCommand;
pub use feedback_query::{FeedbackQuery, FixtureFeedbackQuery};
#[cfg(test)]
pub use feedback_query::MockFeedbackQuery;
pub use feedback_repository::{FeedbackRepository, FeedbackRepositoryError};
#[cfg(test)]
pub use feedback_repository::MockFeedbackRepository;
pub use upstream_directory::{
    EnrollmentDirectory, FixtureUpstreamDirectory, IdentityDirectory, TrainingDirectory,
    UpstreamError, UserDirectory,
};
#[cfg(test)]
pub use upstream_directory::{
    MockEnrollmentDirectory, MockIdentityDirectory, MockTrainingDirectory, MockUserDirectory,
};
pub use user_deletion_subscription::{
    DeliveryTag, SubscriptionError, UserDeletionDelivery, UserDeletionPublisher,
    UserDeletionSubscription,
};
#[cfg(test)]
pub use user_deletion_subscription::{MockUserDeletionPublisher, MockUserDeletionSubscription};
