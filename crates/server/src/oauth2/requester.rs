//! Read-only view of a parsed OAuth2/OIDC authorization request.

use thiserror::Error;
use url::form_urlencoded;

/// Query argument carrying the challenge id of a consent session back to the
/// authorization endpoint.
pub const QUERY_ARG_CONSENT_ID: &str = "consent_id";

/// The incoming authorization request as seen by the consent engine.
pub trait AuthorizeRequester: Send + Sync {
    /// Per-request identifier used for log correlation.
    fn id(&self) -> &str;
    fn client_id(&self) -> &str;
    fn requested_scopes(&self) -> &[String];
    fn requested_audience(&self) -> &[String];
    /// The original request parameters, replayed after a round trip through login or consent.
    fn request_form(&self) -> &[(String, String)];
    fn redirect_uri(&self) -> Option<&str>;
    fn state(&self) -> Option<&str>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("The request is missing the required parameter '{0}'")]
    MissingParameter(&'static str),
}

/// Authorization request parsed from its query/form parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizeRequest {
    id: String,
    client_id: String,
    scopes: Vec<String>,
    audience: Vec<String>,
    redirect_uri: Option<String>,
    state: Option<String>,
    consent_id: Option<String>,
    form: Vec<(String, String)>,
}

impl AuthorizeRequest {
    /// Parse the request parameters.
    ///
    /// `consent_id` is split off the replayable form so it never gets embedded
    /// into a stored consent session or a login redirect.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, RequestError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut consent_id = None;
        let form: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(k, v)| {
                if k == QUERY_ARG_CONSENT_ID {
                    consent_id = Some(v.clone());
                    false
                } else {
                    true
                }
            })
            .collect();

        let get = |key: &str| {
            form.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .filter(|v| !v.is_empty())
        };

        let client_id = get("client_id").ok_or(RequestError::MissingParameter("client_id"))?;

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            client_id,
            scopes: split_list(get("scope").as_deref()),
            audience: split_list(get("audience").as_deref()),
            redirect_uri: get("redirect_uri"),
            state: get("state"),
            consent_id: consent_id.filter(|v| !v.is_empty()),
            form,
        })
    }

    pub fn from_query(query: &str) -> Result<Self, RequestError> {
        Self::from_pairs(form_urlencoded::parse(query.as_bytes()).into_owned())
    }

    pub fn consent_id(&self) -> Option<&str> {
        self.consent_id.as_deref()
    }
}

impl AuthorizeRequester for AuthorizeRequest {
    fn id(&self) -> &str {
        &self.id
    }

    fn client_id(&self) -> &str {
        &self.client_id
    }

    fn requested_scopes(&self) -> &[String] {
        &self.scopes
    }

    fn requested_audience(&self) -> &[String] {
        &self.audience
    }

    fn request_form(&self) -> &[(String, String)] {
        &self.form
    }

    fn redirect_uri(&self) -> Option<&str> {
        self.redirect_uri.as_deref()
    }

    fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }
}

pub(crate) fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| v.split_whitespace().map(String::from).collect())
        .unwrap_or_default()
}

pub(crate) fn encode_form(form: &[(String, String)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(form.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .finish()
}

pub(crate) fn decode_form(encoded: &str) -> Vec<(String, String)> {
    form_urlencoded::parse(encoded.as_bytes())
        .into_owned()
        .collect()
}
