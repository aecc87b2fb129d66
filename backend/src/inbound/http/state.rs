//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on domain ports (use-cases) and remain testable without I/O.

use std::sync::Arc;

use crate::domain::RemoteFactCheckers;
use crate::domain::ports::{
    FeedbackCommand, FeedbackQuery, FixtureFeedbackCommand, FixtureFeedbackQuery,
    UserDeletionPublisher,
};

/// Parameter object bundling all port implementations for HTTP handlers.
#[derive(Clone)]
pub struct HttpStatePorts {
    pub feedback: Arc<dyn FeedbackCommand>,
    pub feedback_query: Arc<dyn FeedbackQuery>,
    pub user_deletions: Arc<dyn UserDeletionPublisher>,
    /// Guarded remote checks, reported by the readiness probe.
    pub dependencies: Arc<RemoteFactCheckers>,
}

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    pub feedback: Arc<dyn FeedbackCommand>,
    pub feedback_query: Arc<dyn FeedbackQuery>,
    pub user_deletions: Arc<dyn UserDeletionPublisher>,
    pub dependencies: Arc<RemoteFactCheckers>,
}

impl From<HttpStatePorts> for HttpState {
    fn from(ports: HttpStatePorts) -> Self {
        Self::new(ports)
    }
}

impl HttpState {
    /// Construct state from a ports bundle.
    pub fn new(ports: HttpStatePorts) -> Self {
        let HttpStatePorts {
            feedback,
            feedback_query,
            user_deletions,
            dependencies,
        } = ports;
        Self {
            feedback,
            feedback_query,
            user_deletions,
            dependencies,
        }
    }

    /// State backed by fixtures and the given publisher.
    ///
    /// # Examples
    /// ```
    /// use std::sync::Arc;
    ///
    /// use feedback_service::inbound::http::state::HttpState;
    /// use feedback_service::outbound::queue::InMemoryUserDeletionQueue;
    ///
    /// let state = HttpState::with_fixtures(Arc::new(InMemoryUserDeletionQueue::new()));
    /// let _query = state.feedback_query.clone();
    /// ```
    pub fn with_fixtures(user_deletions: Arc<dyn UserDeletionPublisher>) -> Self {
        use crate::domain::ports::FixtureUpstreamDirectory;
        use crate::domain::{RemoteCheckSettings, UpstreamDirectories};

        let directory = Arc::new(FixtureUpstreamDirectory::default());
        let directories = UpstreamDirectories {
            users: directory.clone(),
            trainings: directory.clone(),
            enrollments: directory.clone(),
            identities: directory,
        };
        Self::new(HttpStatePorts {
            feedback: Arc::new(FixtureFeedbackCommand),
            feedback_query: Arc::new(FixtureFeedbackQuery),
            user_deletions,
            dependencies: Arc::new(RemoteFactCheckers::new(
                directories,
                RemoteCheckSettings::default(),
                Arc::new(mockable::DefaultClock),
            )),
        })
    }
}
