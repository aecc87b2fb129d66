//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **persistence**: PostgreSQL repository and user deletion inbox (Diesel)
//! - **queue**: in-process user deletion queue
//! - **upstream**: reqwest clients for the user, training, enrollment and
//!   auth services
//!
//! Adapters translate between domain types and infrastructure
//! representations. They contain no business logic.

pub mod persistence;
pub mod queue;
pub mod upstream;
