//! Client consent policy.
//!
//! Clients are loaded from configuration and are read-only to the consent engine.

use crate::config::ClientConfig;
use crate::oauth2::user_session::AuthenticationLevel;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use time::Duration;

/// How a client obtains consent from the user.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConsentMode {
    /// The user always acts on the consent screen.
    #[default]
    Explicit,
    /// Consent is granted without user interaction.
    Implicit,
    /// The user may remember a decision for a limited period.
    PreConfigured,
}

impl fmt::Display for ConsentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsentMode::Explicit => write!(f, "explicit"),
            ConsentMode::Implicit => write!(f, "implicit"),
            ConsentMode::PreConfigured => write!(f, "pre-configured"),
        }
    }
}

/// Authentication level a client requires before consent may be shown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationPolicy {
    OneFactor,
    #[default]
    TwoFactor,
}

impl AuthorizationPolicy {
    pub fn required_level(self) -> AuthenticationLevel {
        match self {
            AuthorizationPolicy::OneFactor => AuthenticationLevel::OneFactor,
            AuthorizationPolicy::TwoFactor => AuthenticationLevel::TwoFactor,
        }
    }
}

impl fmt::Display for AuthorizationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthorizationPolicy::OneFactor => write!(f, "one_factor"),
            AuthorizationPolicy::TwoFactor => write!(f, "two_factor"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Client {
    pub id: String,
    pub description: String,
    pub sector_identifier: String,
    pub redirect_uris: Vec<String>,
    pub policy: AuthorizationPolicy,
    pub consent_mode: ConsentMode,
    pub pre_configured_consent_duration: Duration,
}

impl Client {
    pub fn is_authentication_level_sufficient(&self, level: AuthenticationLevel) -> bool {
        level >= self.policy.required_level()
    }

    /// Only registered URIs, compared exactly, may receive error redirects.
    pub fn is_redirect_uri_allowed(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|allowed| allowed == uri)
    }
}

impl From<&ClientConfig> for Client {
    fn from(config: &ClientConfig) -> Self {
        Self {
            id: config.id.clone(),
            description: config
                .description
                .clone()
                .unwrap_or_else(|| config.id.clone()),
            sector_identifier: config.sector_identifier.clone(),
            redirect_uris: config.redirect_uris.clone(),
            policy: config.authorization_policy,
            consent_mode: config.consent_mode,
            pre_configured_consent_duration: Duration::seconds(
                config.pre_configured_consent_duration,
            ),
        }
    }
}

/// Registered clients keyed by client id.
#[derive(Clone, Debug, Default)]
pub struct ClientRegistry {
    clients: HashMap<String, Client>,
}

impl ClientRegistry {
    pub fn from_config(configs: &[ClientConfig]) -> Self {
        configs.iter().map(Client::from).collect()
    }

    pub fn get(&self, id: &str) -> Option<&Client> {
        self.clients.get(id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl FromIterator<Client> for ClientRegistry {
    fn from_iter<I: IntoIterator<Item = Client>>(iter: I) -> Self {
        Self {
            clients: iter.into_iter().map(|c| (c.id.clone(), c)).collect(),
        }
    }
}
