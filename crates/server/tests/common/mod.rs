//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use oidc_consent::error::StorageError;
use oidc_consent::oauth2::redirect::RedirectBuilder;
use oidc_consent::oauth2::{
    AuthorizationPolicy, Client, ClientRegistry, ConsentEngine, ConsentMode, ConsentSession,
    OAuth2State,
};
use oidc_consent::storage::{ConsentStore, DbConsentStore};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr, Statement};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use time::Duration;
use uuid::Uuid;

pub const ISSUER: &str = "https://auth.example.com";
pub const REDIRECT_URI: &str = "https://app.example.com/callback";

/// Create an in-memory database with the consent tables
pub async fn create_consent_test_db() -> Arc<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await.expect("connect");

    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        r#"CREATE TABLE user_opaque_identifier (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            service TEXT NOT NULL,
            sector_id TEXT NOT NULL,
            username TEXT NOT NULL,
            identifier TEXT NOT NULL UNIQUE,
            UNIQUE (service, sector_id, username)
        );"#,
    ))
    .await
    .expect("create user_opaque_identifier table");

    db.execute(Statement::from_string(
        DbBackend::Sqlite,
        r#"CREATE TABLE oauth2_consent_session (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            challenge_id TEXT NOT NULL UNIQUE,
            client_id TEXT NOT NULL,
            subject TEXT NULL,
            signature TEXT NULL,
            responded INTEGER NOT NULL DEFAULT 0,
            granted INTEGER NOT NULL DEFAULT 0,
            pre_configured INTEGER NOT NULL DEFAULT 0,
            consumed INTEGER NOT NULL DEFAULT 0,
            requested_at TEXT NOT NULL,
            responded_at TEXT NULL,
            expires_at TEXT NULL,
            requested_scopes TEXT NOT NULL,
            granted_scopes TEXT NOT NULL,
            requested_audience TEXT NOT NULL,
            granted_audience TEXT NOT NULL,
            form_data TEXT NOT NULL
        );"#,
    ))
    .await
    .expect("create oauth2_consent_session table");

    Arc::new(db)
}

pub fn client(id: &str, policy: AuthorizationPolicy, consent_mode: ConsentMode) -> Client {
    Client {
        id: id.to_string(),
        description: format!("{id} application"),
        sector_identifier: String::new(),
        redirect_uris: vec![REDIRECT_URI.to_string()],
        policy,
        consent_mode,
        pre_configured_consent_duration: Duration::days(7),
    }
}

/// One client per consent mode, all requiring one factor, plus a two-factor client.
pub fn test_clients() -> ClientRegistry {
    [
        client("explicit-app", AuthorizationPolicy::OneFactor, ConsentMode::Explicit),
        client("implicit-app", AuthorizationPolicy::OneFactor, ConsentMode::Implicit),
        client(
            "preconf-app",
            AuthorizationPolicy::OneFactor,
            ConsentMode::PreConfigured,
        ),
        client("strict-app", AuthorizationPolicy::TwoFactor, ConsentMode::Explicit),
    ]
    .into_iter()
    .collect()
}

pub fn redirects() -> RedirectBuilder {
    RedirectBuilder::new(ISSUER).expect("valid issuer")
}

pub async fn create_test_engine() -> (ConsentEngine, Arc<CountingStore>) {
    let store = Arc::new(CountingStore::new(DbConsentStore::new(
        create_consent_test_db().await,
    )));
    (ConsentEngine::new(store.clone(), redirects()), store)
}

pub async fn create_test_state() -> (OAuth2State, Arc<CountingStore>) {
    let store = Arc::new(CountingStore::new(DbConsentStore::new(
        create_consent_test_db().await,
    )));
    let state = OAuth2State::with_store(store.clone(), redirects(), test_clients());
    (state, store)
}

/// Wraps a store and counts every call made through it.
pub struct CountingStore {
    inner: DbConsentStore,
    calls: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: DbConsentStore) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConsentStore for CountingStore {
    async fn load_subject(
        &self,
        sector_id: &str,
        username: &str,
    ) -> Result<Option<Uuid>, StorageError> {
        self.hit();
        self.inner.load_subject(sector_id, username).await
    }

    async fn create_subject(
        &self,
        sector_id: &str,
        username: &str,
        subject: Uuid,
    ) -> Result<Uuid, StorageError> {
        self.hit();
        self.inner.create_subject(sector_id, username, subject).await
    }

    async fn save_consent_session(&self, consent: &mut ConsentSession) -> Result<(), StorageError> {
        self.hit();
        self.inner.save_consent_session(consent).await
    }

    async fn save_consent_session_subject(
        &self,
        consent: &ConsentSession,
    ) -> Result<Option<Uuid>, StorageError> {
        self.hit();
        self.inner.save_consent_session_subject(consent).await
    }

    async fn save_consent_session_response(
        &self,
        consent: &ConsentSession,
    ) -> Result<(), StorageError> {
        self.hit();
        self.inner.save_consent_session_response(consent).await
    }

    async fn save_consent_session_consumed(
        &self,
        consent: &ConsentSession,
    ) -> Result<bool, StorageError> {
        self.hit();
        self.inner.save_consent_session_consumed(consent).await
    }

    async fn load_consent_session_by_challenge_id(
        &self,
        challenge_id: Uuid,
    ) -> Result<ConsentSession, StorageError> {
        self.hit();
        self.inner
            .load_consent_session_by_challenge_id(challenge_id)
            .await
    }

    async fn load_pre_configured_consent_sessions(
        &self,
        signature: &str,
    ) -> Result<Vec<ConsentSession>, StorageError> {
        self.hit();
        self.inner
            .load_pre_configured_consent_sessions(signature)
            .await
    }
}

/// Which store operation should fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailOn {
    Subject,
    Save,
    Consume,
    PreConfigured,
}

/// Delegates to a real store except for the operation picked by [`FailOn`].
pub struct FailingStore {
    inner: DbConsentStore,
    fail_on: FailOn,
}

impl FailingStore {
    pub async fn new(fail_on: FailOn) -> Self {
        Self {
            inner: DbConsentStore::new(create_consent_test_db().await),
            fail_on,
        }
    }

    fn fail(&self, op: FailOn) -> Result<(), StorageError> {
        if self.fail_on == op {
            Err(StorageError::Database(DbErr::Custom(
                "connection reset".to_string(),
            )))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ConsentStore for FailingStore {
    async fn load_subject(
        &self,
        sector_id: &str,
        username: &str,
    ) -> Result<Option<Uuid>, StorageError> {
        self.fail(FailOn::Subject)?;
        self.inner.load_subject(sector_id, username).await
    }

    async fn create_subject(
        &self,
        sector_id: &str,
        username: &str,
        subject: Uuid,
    ) -> Result<Uuid, StorageError> {
        self.fail(FailOn::Subject)?;
        self.inner.create_subject(sector_id, username, subject).await
    }

    async fn save_consent_session(&self, consent: &mut ConsentSession) -> Result<(), StorageError> {
        self.fail(FailOn::Save)?;
        self.inner.save_consent_session(consent).await
    }

    async fn save_consent_session_subject(
        &self,
        consent: &ConsentSession,
    ) -> Result<Option<Uuid>, StorageError> {
        self.inner.save_consent_session_subject(consent).await
    }

    async fn save_consent_session_response(
        &self,
        consent: &ConsentSession,
    ) -> Result<(), StorageError> {
        self.inner.save_consent_session_response(consent).await
    }

    async fn save_consent_session_consumed(
        &self,
        consent: &ConsentSession,
    ) -> Result<bool, StorageError> {
        self.fail(FailOn::Consume)?;
        self.inner.save_consent_session_consumed(consent).await
    }

    async fn load_consent_session_by_challenge_id(
        &self,
        challenge_id: Uuid,
    ) -> Result<ConsentSession, StorageError> {
        self.inner
            .load_consent_session_by_challenge_id(challenge_id)
            .await
    }

    async fn load_pre_configured_consent_sessions(
        &self,
        signature: &str,
    ) -> Result<Vec<ConsentSession>, StorageError> {
        self.fail(FailOn::PreConfigured)?;
        self.inner
            .load_pre_configured_consent_sessions(signature)
            .await
    }
}
