//! HTTP adapters for the upstream directory ports.
//!
//! Each adapter performs one GET against its service and reports the raw
//! outcome; breaker and fail-closed handling live in the domain.

mod http_directory;

pub use http_directory::{
    HttpEnrollmentDirectory, HttpIdentityDirectory, HttpTrainingDirectory, HttpUserDirectory,
    UpstreamHttpClient,
};
