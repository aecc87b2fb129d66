//! Reqwest-backed directory adapters.
//!
//! Endpoints:
//! - user service: `GET /users/{id}/exists` returning a JSON boolean
//! - training service: `GET /internal/trainings/{id}/exists`
//! - enrollment service: `GET /internal/enrollments/enrolled/{userId}/{sessionId}`
//! - auth service: `GET /internal/users/username/by-id/{username}` returning a
//!   user id, or `null`/an empty body when the username is unknown
//!
//! A `null` boolean is read as `false`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::domain::ports::{
    EnrollmentDirectory, IdentityDirectory, TrainingDirectory, UpstreamError, UserDirectory,
};
use crate::domain::{TrainingSessionId, UserId, Username};

/// Shared GET-and-decode plumbing for one upstream base URL.
#[derive(Debug, Clone)]
pub struct UpstreamHttpClient {
    client: Client,
    base: Url,
}

impl UpstreamHttpClient {
    /// Build a client with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(base: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base })
    }

    /// Reuse an existing reqwest client.
    pub fn with_client(client: Client, base: Url) -> Self {
        Self { client, base }
    }

    fn url_for(&self, segments: &[&str]) -> Result<Url, UpstreamError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| {
                UpstreamError::transport(format!("base url {} cannot carry a path", self.base))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET `segments` below the base URL and decode an optional JSON value.
    async fn get_optional<T>(&self, segments: &[&str]) -> Result<Option<T>, UpstreamError>
    where
        T: DeserializeOwned,
    {
        let url = self.url_for(segments)?;
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }
        decode_optional(body.as_ref())
    }
}

fn decode_optional<T>(body: &[u8]) -> Result<Option<T>, UpstreamError>
where
    T: DeserializeOwned,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice::<Option<T>>(body).map_err(|error| {
        UpstreamError::decode(format!(
            "invalid upstream JSON payload: {error}; body={}",
            body_preview(body)
        ))
    })
}

/// User service adapter.
#[derive(Debug, Clone)]
pub struct HttpUserDirectory(UpstreamHttpClient);

impl HttpUserDirectory {
    /// Wrap a client pointed at the user service.
    pub fn new(client: UpstreamHttpClient) -> Self {
        Self(client)
    }
}

#[async_trait]
impl UserDirectory for HttpUserDirectory {
    async fn user_exists(&self, user_id: UserId) -> Result<bool, UpstreamError> {
        let id = user_id.to_string();
        let exists = self.0.get_optional::<bool>(&["users", &id, "exists"]).await?;
        Ok(exists.unwrap_or(false))
    }
}

/// Training service adapter.
#[derive(Debug, Clone)]
pub struct HttpTrainingDirectory(UpstreamHttpClient);

impl HttpTrainingDirectory {
    /// Wrap a client pointed at the training service.
    pub fn new(client: UpstreamHttpClient) -> Self {
        Self(client)
    }
}

#[async_trait]
impl TrainingDirectory for HttpTrainingDirectory {
    async fn training_exists(
        &self,
        training_session_id: TrainingSessionId,
    ) -> Result<bool, UpstreamError> {
        let id = training_session_id.to_string();
        let exists = self
            .0
            .get_optional::<bool>(&["internal", "trainings", &id, "exists"])
            .await?;
        Ok(exists.unwrap_or(false))
    }
}

/// Enrollment service adapter.
#[derive(Debug, Clone)]
pub struct HttpEnrollmentDirectory(UpstreamHttpClient);

impl HttpEnrollmentDirectory {
    /// Wrap a client pointed at the enrollment service.
    pub fn new(client: UpstreamHttpClient) -> Self {
        Self(client)
    }
}

#[async_trait]
impl EnrollmentDirectory for HttpEnrollmentDirectory {
    async fn is_enrolled(
        &self,
        user_id: UserId,
        training_session_id: TrainingSessionId,
    ) -> Result<bool, UpstreamError> {
        let user = user_id.to_string();
        let session = training_session_id.to_string();
        let enrolled = self
            .0
            .get_optional::<bool>(&["internal", "enrollments", "enrolled", &user, &session])
            .await?;
        Ok(enrolled.unwrap_or(false))
    }
}

/// Auth service adapter resolving usernames to user ids.
#[derive(Debug, Clone)]
pub struct HttpIdentityDirectory(UpstreamHttpClient);

impl HttpIdentityDirectory {
    /// Wrap a client pointed at the auth service.
    pub fn new(client: UpstreamHttpClient) -> Self {
        Self(client)
    }
}

#[async_trait]
impl IdentityDirectory for HttpIdentityDirectory {
    async fn user_id_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<UserId>, UpstreamError> {
        let id = self
            .0
            .get_optional::<i64>(&["internal", "users", "username", "by-id", username.as_str()])
            .await?;
        Ok(id.map(UserId::new))
    }
}

fn map_transport_error(error: reqwest::Error) -> UpstreamError {
    if error.is_timeout() {
        UpstreamError::timeout(error.to_string())
    } else {
        UpstreamError::transport(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> UpstreamError {
    let body_preview = body_preview(body);
    let message = if body_preview.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {}", status.as_u16(), body_preview)
    };

    match status {
        StatusCode::CONFLICT => UpstreamError::conflict(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            UpstreamError::timeout(message)
        }
        _ => UpstreamError::status(status.as_u16(), message),
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}
