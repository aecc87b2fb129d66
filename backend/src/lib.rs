//! Feedback service library modules.
//!
//! The crate follows a hexagonal layout: [`domain`] holds value types, the
//! remote-check guards, the feedback use-cases and the consistency worker;
//! [`inbound`] and [`outbound`] hold the adapters at either edge.

pub mod doc;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
#[cfg(test)]
mod test_support;

/// Public OpenAPI surface used by Swagger UI and tooling.
pub use doc::ApiDoc;
pub use domain::TraceId;
pub use middleware::Trace;
