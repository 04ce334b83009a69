//! Redirect URL construction for the login workflow, consent UI and authorization endpoints.
//!
//! All paths are relative and joined onto the issuer URL, which is normalized
//! to end in a path separator.

use crate::oauth2::consent_session::ConsentSession;
use crate::oauth2::requester::QUERY_ARG_CONSENT_ID;
use url::Url;
use uuid::Uuid;

pub const ENDPOINT_PATH_AUTHORIZATION: &str = "api/oidc/authorization";
pub const ENDPOINT_PATH_CONSENT: &str = "consent/openid";

pub const QUERY_ARG_ID: &str = "id";
pub const QUERY_ARG_WORKFLOW: &str = "workflow";
pub const QUERY_ARG_WORKFLOW_ID: &str = "workflow_id";
pub const QUERY_ARG_RETURN_TO: &str = "rd";

pub const WORKFLOW_OPENID_CONNECT: &str = "openid_connect";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedirectBuilder {
    issuer: Url,
}

impl RedirectBuilder {
    pub fn new(issuer: &str) -> Result<Self, url::ParseError> {
        Ok(Self::from_url(Url::parse(issuer)?))
    }

    pub fn from_url(issuer: Url) -> Self {
        Self {
            issuer: normalize_issuer(issuer),
        }
    }

    pub fn issuer(&self) -> &Url {
        &self.issuer
    }

    /// Consent UI entry point for a pending consent session.
    pub fn consent_url(&self, challenge_id: Uuid) -> Url {
        let mut location = self.join(ENDPOINT_PATH_CONSENT);
        location
            .query_pairs_mut()
            .append_pair(QUERY_ARG_ID, &challenge_id.to_string());
        location
    }

    /// Authorization endpoint replaying `form`, optionally carrying a consent challenge.
    pub fn authorization_url(&self, form: &[(String, String)], consent_id: Option<Uuid>) -> Url {
        let mut location = self.join(ENDPOINT_PATH_AUTHORIZATION);
        {
            let mut query = location.query_pairs_mut();
            query.extend_pairs(form.iter().map(|(k, v)| (k.as_str(), v.as_str())));
            if let Some(id) = consent_id {
                query.append_pair(QUERY_ARG_CONSENT_ID, &id.to_string());
            }
        }
        if location.query() == Some("") {
            location.set_query(None);
        }
        location
    }

    /// Login workflow entry point.
    ///
    /// Carries the challenge id of `consent` when there is one and, when `form`
    /// is given, the authorization URL to return to after authenticating.
    pub fn workflow_url(
        &self,
        consent: Option<&ConsentSession>,
        form: Option<&[(String, String)]>,
    ) -> Url {
        let mut location = self.issuer.clone();
        let return_to = form.map(|form| self.authorization_url(form, None));
        {
            let mut query = location.query_pairs_mut();
            query.append_pair(QUERY_ARG_WORKFLOW, WORKFLOW_OPENID_CONNECT);
            if let Some(consent) = consent {
                query.append_pair(QUERY_ARG_WORKFLOW_ID, &consent.challenge_id.to_string());
            }
            if let Some(rd) = &return_to {
                query.append_pair(QUERY_ARG_RETURN_TO, rd.as_str());
            }
        }
        location
    }

    fn join(&self, path: &str) -> Url {
        let mut location = self.issuer.clone();
        location.set_query(None);
        location.set_path(&format!("{}{}", self.issuer.path(), path));
        location
    }
}

fn normalize_issuer(mut issuer: Url) -> Url {
    if !issuer.path().ends_with('/') {
        let path = format!("{}/", issuer.path());
        issuer.set_path(&path);
    }
    issuer
}
