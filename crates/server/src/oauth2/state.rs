//! OAuth2 state management.
//!
//! Provides the state shared by the authorization and consent endpoints.

use crate::config::OidcConfig;
use crate::oauth2::client::ClientRegistry;
use crate::oauth2::consent::ConsentEngine;
use crate::oauth2::redirect::RedirectBuilder;
use crate::storage::{ConsentStore, DbConsentStore};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

#[derive(Clone)]
pub struct OAuth2State {
    pub engine: ConsentEngine,
    pub clients: Arc<ClientRegistry>,
}

impl OAuth2State {
    pub fn new(db: Arc<DatabaseConnection>, config: &OidcConfig) -> Result<Self, url::ParseError> {
        let store: Arc<dyn ConsentStore> = Arc::new(DbConsentStore::new(db));
        Ok(Self::with_store(
            store,
            RedirectBuilder::new(&config.issuer_url)?,
            ClientRegistry::from_config(&config.clients),
        ))
    }

    pub fn with_store(
        store: Arc<dyn ConsentStore>,
        redirects: RedirectBuilder,
        clients: ClientRegistry,
    ) -> Self {
        Self {
            engine: ConsentEngine::new(store, redirects),
            clients: Arc::new(clients),
        }
    }
}
