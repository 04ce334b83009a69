use crate::oauth2::client::{AuthorizationPolicy, ConsentMode};
use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    pub oidc: OidcConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct OidcConfig {
    /// Public base URL of the identity provider; redirects are joined onto it.
    pub issuer_url: String,
    #[serde(default)]
    pub clients: Vec<ClientConfig>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ClientConfig {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Exact URIs authorization errors may be redirected to.
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    /// Clients sharing a sector identifier observe the same subject for a user.
    #[serde(default)]
    pub sector_identifier: String,
    #[serde(default)]
    pub authorization_policy: AuthorizationPolicy,
    #[serde(default)]
    pub consent_mode: ConsentMode,
    /// Lifetime in seconds of a remembered (pre-configured) consent.
    #[serde(default = "default_pre_configured_consent_duration")]
    pub pre_configured_consent_duration: i64,
}

fn default_listen_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_pre_configured_consent_duration() -> i64 {
    // one week
    604_800
}

/// Load application configuration from `config.yaml` + environment overrides.
///
/// Any variable matching the key path separated by double underscores
/// (e.g. `OIDC__ISSUER_URL`) overrides the file value.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let cfg = Config::builder()
        .add_source(File::with_name("config.yaml"))
        .add_source(Environment::default().separator("__"))
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    check_config(&app)?;
    Ok(app)
}

/// Structural checks only; everything else is owned by the deployment.
pub fn check_config(app: &AppConfig) -> Result<(), ConfigError> {
    url::Url::parse(&app.oidc.issuer_url)
        .map_err(|e| ConfigError::Validation(format!("oidc.issuer_url is not a URL: {e}")))?;

    let mut seen = HashSet::new();
    for client in &app.oidc.clients {
        if !seen.insert(client.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "oidc.clients contains duplicate id '{}'",
                client.id
            )));
        }
    }

    Ok(())
}

/// Convenience helper for binaries wanting panic-on-error behaviour.
pub fn load_config_or_panic() -> AppConfig {
    match load_config() {
        Ok(c) => c,
        Err(e) => panic!("Failed to load configuration: {e}"),
    }
}
