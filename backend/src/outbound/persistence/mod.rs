//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Concrete implementations of the feedback repository port and the durable
//! user deletion inbox, backed by `diesel-async` connections pooled with
//! `bb8`.
//!
//! Row structs (`models.rs`) and table definitions (`schema.rs`) stay private
//! to this module; adapters translate them into domain types.
//!
//! # Example
//!
//! ```ignore
//! use feedback_service::outbound::persistence::{DbPool, DieselFeedbackRepository, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/feedback")).await?;
//! let repo = DieselFeedbackRepository::new(pool);
//! ```

mod diesel_error_mapping;
mod diesel_feedback_repository;
mod diesel_user_deletion_inbox;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_feedback_repository::DieselFeedbackRepository;
pub use diesel_user_deletion_inbox::{DieselUserDeletionInbox, InboxConfig};
pub use migrations::{MIGRATIONS, MigrationError, run_pending_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
