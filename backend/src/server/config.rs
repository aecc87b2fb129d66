//! Service settings loaded via OrthoConfig.
//!
//! Values layer CLI flags over `FEEDBACK_*` environment variables over
//! configuration files. Every field is optional; accessors supply defaults
//! and validate what cannot be checked by the deserializer.

use std::net::SocketAddr;
use std::time::Duration;

use feedback_service::domain::{CircuitBreakerConfig, RemoteCheckSettings};
use feedback_service::outbound::persistence::{InboxConfig, PoolConfig};
use ortho_config::OrthoConfig;
use serde::Deserialize;
use url::Url;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_USER_SERVICE_URL: &str = "http://user-service:8080";
const DEFAULT_TRAINING_SERVICE_URL: &str = "http://training-service:8080";
const DEFAULT_ENROLLMENT_SERVICE_URL: &str = "http://enrollment-service:8080";
const DEFAULT_AUTH_SERVICE_URL: &str = "http://auth-service:8080";

/// Startup configuration problems.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("{field} is required")]
    Missing { field: &'static str },
    #[error("{field} is not a valid socket address: {value}")]
    InvalidAddress { field: &'static str, value: String },
    #[error("{field} is not a valid URL ({value}): {reason}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        reason: String,
    },
}

/// Base URLs of the four upstream services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamUrls {
    pub users: Url,
    pub trainings: Url,
    pub enrollments: Url,
    pub identities: Url,
}

/// Configuration values for the feedback service.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "FEEDBACK")]
pub struct FeedbackServiceSettings {
    /// Socket address the HTTP server binds to.
    pub bind_addr: Option<String>,
    /// PostgreSQL connection string.
    pub database_url: Option<String>,
    /// Upper bound on pooled connections.
    pub database_max_connections: Option<u32>,
    pub user_service_url: Option<String>,
    pub training_service_url: Option<String>,
    pub enrollment_service_url: Option<String>,
    pub auth_service_url: Option<String>,
    /// Per-call timeout for upstream checks, in milliseconds.
    pub upstream_timeout_ms: Option<u64>,
    pub breaker_failure_threshold: Option<u32>,
    pub breaker_window_ms: Option<u64>,
    pub breaker_cooldown_ms: Option<u64>,
    pub breaker_half_open_calls: Option<u32>,
    pub inbox_poll_interval_ms: Option<u64>,
    pub inbox_lease_ms: Option<u64>,
    /// Run the consistency worker inside this process.
    pub worker_enabled: Option<bool>,
}

fn parse_url(field: &'static str, raw: Option<&str>, default: &str) -> Result<Url, SettingsError> {
    let value = raw.unwrap_or(default);
    Url::parse(value).map_err(|err| SettingsError::InvalidUrl {
        field,
        value: value.to_owned(),
        reason: err.to_string(),
    })
}

impl FeedbackServiceSettings {
    /// Parsed bind address.
    pub fn bind_addr(&self) -> Result<SocketAddr, SettingsError> {
        let value = self.bind_addr.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
        value.parse().map_err(|_| SettingsError::InvalidAddress {
            field: "bind_addr",
            value: value.to_owned(),
        })
    }

    /// Pool settings; fails when no database URL is configured.
    pub fn pool_config(&self) -> Result<PoolConfig, SettingsError> {
        let url = self
            .database_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or(SettingsError::Missing {
                field: "database_url",
            })?;
        Ok(PoolConfig::new(url).with_max_size(
            self.database_max_connections
                .unwrap_or(DEFAULT_MAX_CONNECTIONS),
        ))
    }

    /// Upstream base URLs, defaulting to in-cluster service names.
    pub fn upstream_urls(&self) -> Result<UpstreamUrls, SettingsError> {
        Ok(UpstreamUrls {
            users: parse_url(
                "user_service_url",
                self.user_service_url.as_deref(),
                DEFAULT_USER_SERVICE_URL,
            )?,
            trainings: parse_url(
                "training_service_url",
                self.training_service_url.as_deref(),
                DEFAULT_TRAINING_SERVICE_URL,
            )?,
            enrollments: parse_url(
                "enrollment_service_url",
                self.enrollment_service_url.as_deref(),
                DEFAULT_ENROLLMENT_SERVICE_URL,
            )?,
            identities: parse_url(
                "auth_service_url",
                self.auth_service_url.as_deref(),
                DEFAULT_AUTH_SERVICE_URL,
            )?,
        })
    }

    /// Timeout and breaker tuning shared by the remote checks.
    pub fn remote_check_settings(&self) -> RemoteCheckSettings {
        let defaults = RemoteCheckSettings::default();
        let breaker = defaults.breaker;
        RemoteCheckSettings {
            timeout: self
                .upstream_timeout_ms
                .map_or(defaults.timeout, Duration::from_millis),
            breaker: CircuitBreakerConfig {
                failure_threshold: self
                    .breaker_failure_threshold
                    .unwrap_or(breaker.failure_threshold),
                window: self
                    .breaker_window_ms
                    .map_or(breaker.window, Duration::from_millis),
                open_cooldown: self
                    .breaker_cooldown_ms
                    .map_or(breaker.open_cooldown, Duration::from_millis),
                half_open_max_calls: self
                    .breaker_half_open_calls
                    .unwrap_or(breaker.half_open_max_calls),
            },
        }
    }

    /// Inbox polling and lease settings.
    pub fn inbox_config(&self) -> InboxConfig {
        let defaults = InboxConfig::default();
        InboxConfig {
            poll_interval: self
                .inbox_poll_interval_ms
                .map_or(defaults.poll_interval, Duration::from_millis),
            lease: self
                .inbox_lease_ms
                .map_or(defaults.lease, Duration::from_millis),
        }
    }

    /// Whether to run the consistency worker; defaults to `true`.
    pub fn worker_enabled(&self) -> bool {
        self.worker_enabled.unwrap_or(true)
    }
}
