//! The authenticated (or anonymous) user as established by the authentication layer.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticationLevel {
    #[default]
    NotAuthenticated,
    OneFactor,
    TwoFactor,
}

impl fmt::Display for AuthenticationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthenticationLevel::NotAuthenticated => write!(f, "not_authenticated"),
            AuthenticationLevel::OneFactor => write!(f, "one_factor"),
            AuthenticationLevel::TwoFactor => write!(f, "two_factor"),
        }
    }
}

/// User session handed over by the authentication layer.
///
/// The authentication layer inserts this into the request extensions; a
/// request without one is treated as anonymous.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    pub username: String,
    pub authentication_level: AuthenticationLevel,
}

impl UserSession {
    pub fn new(username: impl Into<String>, authentication_level: AuthenticationLevel) -> Self {
        Self {
            username: username.into(),
            authentication_level,
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_anonymous(&self) -> bool {
        self.username.is_empty()
            || self.authentication_level == AuthenticationLevel::NotAuthenticated
    }
}

impl<S> FromRequestParts<S> for UserSession
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<UserSession>()
            .cloned()
            .unwrap_or_default())
    }
}
