//! Caller identity supplied by the trusted gateway.
//!
//! The gateway authenticates the caller and forwards the login name in
//! `X-User-Name` and the granted roles in `X-User-Roles` (comma separated,
//! optionally `ROLE_` prefixed). Handlers never see raw headers; they ask a
//! [`Principal`] for the role they need.

use std::collections::BTreeSet;

use actix_web::http::header::HeaderMap;
use actix_web::{FromRequest, HttpRequest, dev::Payload};
use futures_util::future::{Ready, ready};
use tracing::warn;

use crate::domain::{Error, Username};

/// Header carrying the authenticated login name.
pub const USER_NAME_HEADER: &str = "x-user-name";
/// Header carrying the granted roles.
pub const USER_ROLES_HEADER: &str = "x-user-roles";

/// Roles understood by the feedback endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    /// Regular member; may read their own feedback.
    User,
    /// Administrator; may write feedback and read anyone's.
    Admin,
}

impl Role {
    fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let name = match trimmed.get(..5) {
            Some(prefix) if prefix.eq_ignore_ascii_case("ROLE_") => trimmed.get(5..).unwrap_or(""),
            _ => trimmed,
        };
        if name.eq_ignore_ascii_case("USER") {
            Some(Self::User)
        } else if name.eq_ignore_ascii_case("ADMIN") {
            Some(Self::Admin)
        } else {
            None
        }
    }
}

/// Authenticated caller, or the absence of one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Principal {
    username: Option<Username>,
    roles: BTreeSet<Role>,
}

impl Principal {
    /// Build a principal from the gateway headers.
    ///
    /// Unreadable or blank names yield an anonymous principal; unknown roles
    /// are ignored.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let username = headers
            .get(USER_NAME_HEADER)
            .and_then(|value| match value.to_str() {
                Ok(raw) => Some(raw),
                Err(error) => {
                    warn!(%error, "ignoring non-ASCII user name header");
                    None
                }
            })
            .and_then(|raw| Username::new(raw.trim()).ok());
        let roles = headers
            .get_all(USER_ROLES_HEADER)
            .filter_map(|value| value.to_str().ok())
            .flat_map(|raw| raw.split(','))
            .filter_map(Role::parse)
            .collect();
        Self { username, roles }
    }

    /// The caller's login name, if any.
    pub fn username(&self) -> Option<&Username> {
        self.username.as_ref()
    }

    /// Whether the caller holds `role`.
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Require an authenticated caller or return `401 Unauthorized`.
    pub fn require_authenticated(&self) -> Result<&Username, Error> {
        self.username
            .as_ref()
            .ok_or_else(|| Error::unauthorized("authentication required"))
    }

    /// Require the `ADMIN` role.
    pub fn require_admin(&self) -> Result<&Username, Error> {
        let username = self.require_authenticated()?;
        if self.has_role(Role::Admin) {
            Ok(username)
        } else {
            Err(Error::forbidden("administrator role required"))
        }
    }

    /// Require `USER` or `ADMIN`.
    pub fn require_member(&self) -> Result<&Username, Error> {
        let username = self.require_authenticated()?;
        if self.has_role(Role::User) || self.has_role(Role::Admin) {
            Ok(username)
        } else {
            Err(Error::forbidden("user role required"))
        }
    }
}

impl FromRequest for Principal {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Ok(Self::from_headers(req.headers())))
    }
}
