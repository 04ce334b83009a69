//! Consent session domain type.

use crate::oauth2::requester::AuthorizeRequester;
use base64::Engine;
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// One user's consent decision (or pending decision) for one authorization request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsentSession {
    /// Internal row id; zero until persisted. Never exposed in redirects.
    pub id: i32,
    pub challenge_id: Uuid,
    pub client_id: String,
    /// `None` until resolved. Once set it never changes.
    pub subject: Option<Uuid>,
    pub requested_scopes: Vec<String>,
    pub granted_scopes: Vec<String>,
    pub requested_audience: Vec<String>,
    pub granted_audience: Vec<String>,
    pub form: Vec<(String, String)>,
    pub responded: bool,
    /// Only meaningful when `responded` is set.
    pub granted: bool,
    pub pre_configured: bool,
    /// Set once a granted session has been redeemed through its challenge id.
    pub consumed: bool,
    pub expires_at: Option<OffsetDateTime>,
    pub requested_at: OffsetDateTime,
    pub responded_at: Option<OffsetDateTime>,
}

impl ConsentSession {
    /// Start a new consent session for the request with a fresh challenge id.
    ///
    /// A nil subject is treated as unresolved.
    pub fn new(subject: Option<Uuid>, requester: &dyn AuthorizeRequester) -> Self {
        Self {
            id: 0,
            challenge_id: Uuid::new_v4(),
            client_id: requester.client_id().to_string(),
            subject: subject.filter(|s| !s.is_nil()),
            requested_scopes: requester.requested_scopes().to_vec(),
            granted_scopes: Vec::new(),
            requested_audience: requester.requested_audience().to_vec(),
            granted_audience: Vec::new(),
            form: requester.request_form().to_vec(),
            responded: false,
            granted: false,
            pre_configured: false,
            consumed: false,
            expires_at: None,
            requested_at: OffsetDateTime::now_utc(),
            responded_at: None,
        }
    }

    /// Record a full grant: everything requested is granted.
    pub fn grant(&mut self) {
        self.responded = true;
        self.granted = true;
        self.responded_at = Some(OffsetDateTime::now_utc());
        self.granted_scopes = self.requested_scopes.clone();
        self.granted_audience = expected_audience(&self.client_id, &self.requested_audience);
    }

    pub fn reject(&mut self) {
        self.responded = true;
        self.granted = false;
        self.responded_at = Some(OffsetDateTime::now_utc());
        self.granted_scopes.clear();
        self.granted_audience.clear();
    }

    /// Remember this decision until `now + duration`.
    pub fn pre_configure(&mut self, duration: Duration, now: OffsetDateTime) {
        self.pre_configured = true;
        self.expires_at = Some(now + duration);
    }

    pub fn is_authorized(&self) -> bool {
        self.responded && self.granted
    }

    /// A stored decision may be reused only while granted, bound and unexpired.
    pub fn is_valid_pre_configuration(&self, now: OffsetDateTime) -> bool {
        self.pre_configured
            && self.is_authorized()
            && self.subject.is_some()
            && self.expires_at.is_some_and(|exp| exp > now)
    }

    /// Lookup key for remembered decisions; `None` while the subject is unresolved.
    pub fn signature(&self) -> Option<String> {
        self.subject
            .map(|subject| consent_signature(&self.client_id, subject, &self.requested_scopes))
    }

    /// Whether `scopes` names the same scope set this session was requested for.
    pub fn matches_scopes(&self, scopes: &[String]) -> bool {
        canonical_scopes(&self.requested_scopes) == canonical_scopes(scopes)
    }

    /// Add any audience the current request asks for that the stored grant lacks.
    pub fn attach_audience(&mut self, audience: &[String]) {
        for aud in expected_audience(&self.client_id, audience) {
            if !self.granted_audience.contains(&aud) {
                self.granted_audience.push(aud);
            }
        }
    }
}

/// The audience a grant covers always includes the client itself.
pub fn expected_audience(client_id: &str, audience: &[String]) -> Vec<String> {
    let mut expected = audience.to_vec();
    if !expected.iter().any(|a| a == client_id) {
        expected.push(client_id.to_string());
    }
    expected
}

/// Deterministic key over client, subject and the canonical (sorted, deduplicated) scope set.
pub fn consent_signature(client_id: &str, subject: Uuid, scopes: &[String]) -> String {
    let canonical = canonical_scopes(scopes);

    let mut hasher = Sha256::new();
    hasher.update(client_id.as_bytes());
    hasher.update(b"\n");
    hasher.update(subject.as_hyphenated().to_string().as_bytes());
    hasher.update(b"\n");
    hasher.update(canonical.join(" ").as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize())
}

fn canonical_scopes(scopes: &[String]) -> Vec<&str> {
    let mut canonical: Vec<&str> = scopes.iter().map(String::as_str).collect();
    canonical.sort_unstable();
    canonical.dedup();
    canonical
}
