//! OpenID Connect authorization and consent endpoints.
//!
//! - Authorization endpoint: runs the consent decision and either redirects
//!   the user agent, writes an OAuth2 error, or hands off to issuance
//! - Consent endpoints: the API behind the consent UI

use crate::error::{AuthorizeError, StorageError};
use crate::logging::wide_events::WideEvent;
use crate::oauth2::client::{Client, ConsentMode};
use crate::oauth2::consent::ConsentOutcome;
use crate::oauth2::consent_session::ConsentSession;
use crate::oauth2::guard::verify_user_authorized_for_consent;
use crate::oauth2::requester::{AuthorizeRequest, AuthorizeRequester};
use crate::oauth2::user_session::UserSession;
use crate::oauth2::{OAUTH2_TAG, state::OAuth2State};
use axum::{
    Json,
    extract::{Query, RawQuery, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::Instrument;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};
use uuid::Uuid;

/// Creates the OpenID Connect router.
pub fn router(state: OAuth2State) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(authorization))
        .routes(routes!(consent_details, consent_response))
        .with_state(state)
}

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

/// Signal to the issuance layer that consent is resolved.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IssuanceHandoff {
    pub consent_id: Uuid,
    pub client_id: String,
    pub granted_scopes: Vec<String>,
    pub granted_audience: Vec<String>,
}

impl From<&ConsentSession> for IssuanceHandoff {
    fn from(consent: &ConsentSession) -> Self {
        Self {
            consent_id: consent.challenge_id,
            client_id: consent.client_id.clone(),
            granted_scopes: consent.granted_scopes.clone(),
            granted_audience: consent.granted_audience.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ConsentQuery {
    pub id: String,
}

/// What the consent UI shows the user.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConsentDetails {
    pub client_id: String,
    pub client_description: String,
    pub scopes: Vec<String>,
    pub audience: Vec<String>,
    /// Whether the user may ask for this decision to be remembered
    pub pre_configuration: bool,
}

/// The user's decision as submitted by the consent UI.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConsentResponseRequest {
    pub id: String,
    pub client_id: String,
    pub consent: bool,
    #[serde(default)]
    pub pre_configure: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConsentResponseBody {
    /// Where the user agent continues the authorization flow
    pub redirect_uri: String,
}

// =============================================================================
// Endpoints
// =============================================================================

/// OpenID Connect authorization endpoint.
#[tracing::instrument(skip(state, user, query))]
#[utoipa::path(
    get,
    path = "/authorization",
    tag = OAUTH2_TAG,
    operation_id = "OIDC Authorization",
    summary = "Decide how consent is obtained for an authorization request",
    description = "Runs the consent decision for the request.\n\n\
                   - Anonymous users are redirected to the login workflow with a return URL.\n\
                   - Users needing to consent are redirected to the consent UI.\n\
                   - Resolved consent returns a handoff body for the issuance layer.\n\n\
                   Failures are reported to the client's `redirect_uri` as OAuth2 errors.",
    params(
        ("client_id" = String, Query, description = "The client identifier."),
        ("scope" = Option<String>, Query, description = "Space-separated list of requested scopes."),
        ("audience" = Option<String>, Query, description = "Space-separated list of requested audience."),
        ("redirect_uri" = Option<String>, Query, description = "Client redirect URI, used for error responses."),
        ("state" = Option<String>, Query, description = "Opaque value returned with error responses."),
        ("consent_id" = Option<String>, Query, description = "Challenge id of a consent session the user responded to."),
    ),
    responses(
        (status = 200, description = "Consent resolved; continue to issuance", body = IssuanceHandoff),
        (status = 302, description = "Redirect to login, consent UI, or the client with an error"),
        (status = 400, description = "Malformed request or unknown client", body = ErrorResponse),
    )
)]
pub async fn authorization(
    State(state): State<OAuth2State>,
    user: UserSession,
    RawQuery(query): RawQuery,
) -> Response {
    let request = match AuthorizeRequest::from_query(query.as_deref().unwrap_or_default()) {
        Ok(request) => request,
        Err(e) => {
            return json_error(StatusCode::BAD_REQUEST, "invalid_request", Some(e.to_string()));
        }
    };

    let Some(client) = state.clients.get(request.client_id()) else {
        return json_error(
            StatusCode::BAD_REQUEST,
            "invalid_client",
            Some("Client not found".to_string()),
        );
    };

    let evt = WideEvent::new("oidc_authorization", "oidc_consent::oauth2::endpoints");
    evt.add("request_id", request.id());
    evt.add("client_id", &client.id);
    evt.add("consent_mode", client.consent_mode);

    let outcome = state
        .engine
        .decide(&user, client, &request, request.consent_id())
        .instrument(evt.span().clone())
        .await;

    evt.add("outcome", outcome.kind());
    evt.add_opt("challenge_id", outcome.consent().map(|c| c.challenge_id));

    match outcome {
        ConsentOutcome::Proceed(consent) => {
            evt.info("authorization consent resolved");
            Json(IssuanceHandoff::from(&consent)).into_response()
        }
        ConsentOutcome::Redirect { location, .. } => {
            evt.info("authorization redirected");
            found(location.as_str())
        }
        ConsentOutcome::Rejected(err) => {
            evt.add("error", err.error);
            evt.warn("authorization rejected");
            write_authorize_error(client, &request, &err)
        }
    }
}

/// Consent session details for the consent UI.
#[tracing::instrument(skip(state, user))]
#[utoipa::path(
    get,
    path = "/consent",
    tag = OAUTH2_TAG,
    operation_id = "OIDC Consent Details",
    summary = "Get the pending consent session",
    description = "Returns what the client is requesting so the consent UI can render it. \
                   Only the user the consent session belongs to may load it.",
    params(
        ("id" = String, Query, description = "Challenge id of the consent session."),
    ),
    responses(
        (status = 200, description = "Consent details", body = ConsentDetails),
        (status = 400, description = "Malformed id or session already responded to", body = ErrorResponse),
        (status = 401, description = "User is not authenticated", body = ErrorResponse),
        (status = 403, description = "Session belongs to another user", body = ErrorResponse),
        (status = 404, description = "Unknown consent session", body = ErrorResponse),
    )
)]
pub async fn consent_details(
    State(state): State<OAuth2State>,
    user: UserSession,
    Query(params): Query<ConsentQuery>,
) -> Response {
    let consent = match load_owned_consent(&state, &user, &params.id).await {
        Ok(consent) => consent,
        Err(response) => return response,
    };

    let Some(client) = state.clients.get(&consent.client_id) else {
        return json_error(StatusCode::BAD_REQUEST, "invalid_client", None);
    };

    Json(ConsentDetails {
        client_id: client.id.clone(),
        client_description: client.description.clone(),
        scopes: consent.requested_scopes,
        audience: consent.requested_audience,
        pre_configuration: client.consent_mode == ConsentMode::PreConfigured,
    })
    .into_response()
}

/// Record the user's consent decision.
#[tracing::instrument(skip(state, user, body))]
#[utoipa::path(
    post,
    path = "/consent",
    tag = OAUTH2_TAG,
    operation_id = "OIDC Consent Response",
    summary = "Accept or reject a consent session",
    description = "Records the user's decision. When the client allows it and `pre_configure` is set, \
                   the decision is remembered for the client's configured duration. The response \
                   tells the user agent where to resume the authorization flow.",
    request_body(content = ConsentResponseRequest, content_type = "application/json"),
    responses(
        (status = 200, description = "Decision recorded", body = ConsentResponseBody),
        (status = 400, description = "Malformed request, client mismatch or already responded", body = ErrorResponse),
        (status = 401, description = "User is not authenticated", body = ErrorResponse),
        (status = 403, description = "Session belongs to another user", body = ErrorResponse),
        (status = 404, description = "Unknown consent session", body = ErrorResponse),
    )
)]
pub async fn consent_response(
    State(state): State<OAuth2State>,
    user: UserSession,
    Json(body): Json<ConsentResponseRequest>,
) -> Response {
    let mut consent = match load_owned_consent(&state, &user, &body.id).await {
        Ok(consent) => consent,
        Err(response) => return response,
    };

    if consent.client_id != body.client_id {
        tracing::warn!(
            challenge_id = %consent.challenge_id,
            client_id = %body.client_id,
            "Consent response client does not match the consent session"
        );
        return json_error(StatusCode::BAD_REQUEST, "invalid_request", None);
    }

    let Some(client) = state.clients.get(&consent.client_id) else {
        return json_error(StatusCode::BAD_REQUEST, "invalid_client", None);
    };

    if body.consent {
        consent.grant();
        if body.pre_configure && client.consent_mode == ConsentMode::PreConfigured {
            consent.pre_configure(
                client.pre_configured_consent_duration,
                OffsetDateTime::now_utc(),
            );
        }
    } else {
        consent.reject();
    }

    match state
        .engine
        .store()
        .save_consent_session_response(&consent)
        .await
    {
        Ok(()) => {}
        Err(StorageError::ConsentSessionAlreadyResponded(_)) => {
            return json_error(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                Some("Consent has already been responded to".to_string()),
            );
        }
        Err(e) => {
            tracing::error!(challenge_id = %consent.challenge_id, error = %e, "Failed to save consent response");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, "server_error", None);
        }
    }

    tracing::info!(
        challenge_id = %consent.challenge_id,
        client_id = %consent.client_id,
        granted = consent.granted,
        pre_configured = consent.pre_configured,
        "User responded to consent"
    );

    let redirect_uri = state
        .engine
        .redirects()
        .authorization_url(&consent.form, Some(consent.challenge_id));

    Json(ConsentResponseBody {
        redirect_uri: redirect_uri.to_string(),
    })
    .into_response()
}

/// Load a pending consent session and check it belongs to `user`.
async fn load_owned_consent(
    state: &OAuth2State,
    user: &UserSession,
    id: &str,
) -> Result<ConsentSession, Response> {
    if user.is_anonymous() {
        return Err(json_error(StatusCode::UNAUTHORIZED, "login_required", None));
    }

    let challenge_id = match Uuid::parse_str(id) {
        Ok(id) if !id.is_nil() => id,
        _ => return Err(json_error(StatusCode::BAD_REQUEST, "invalid_request", None)),
    };

    let store = state.engine.store();
    let mut consent = match store.load_consent_session_by_challenge_id(challenge_id).await {
        Ok(consent) => consent,
        Err(StorageError::ConsentSessionNotFound(_)) => {
            return Err(json_error(StatusCode::NOT_FOUND, "not_found", None));
        }
        Err(e) => {
            tracing::error!(%challenge_id, error = %e, "Failed to load consent session");
            return Err(json_error(StatusCode::INTERNAL_SERVER_ERROR, "server_error", None));
        }
    };

    let Some(client) = state.clients.get(&consent.client_id) else {
        return Err(json_error(StatusCode::BAD_REQUEST, "invalid_client", None));
    };

    if let Err(e) = verify_user_authorized_for_consent(
        store,
        state.engine.subjects(),
        client,
        user,
        &mut consent,
        None,
    )
    .await
    {
        tracing::error!(%challenge_id, client_id = %client.id, error = %e, "Consent ownership check failed");
        return Err(if e.is_storage() {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "server_error", None)
        } else {
            json_error(StatusCode::FORBIDDEN, "access_denied", None)
        });
    }

    if consent.responded {
        return Err(json_error(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            Some("Consent has already been responded to".to_string()),
        ));
    }

    Ok(consent)
}

// =============================================================================
// Helpers
// =============================================================================

/// 302 Found to `location`.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

fn json_error(status: StatusCode, error: &str, description: Option<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            error_description: description,
        }),
    )
        .into_response()
}

/// Write an OAuth2 authorization error back to the client.
///
/// Redirects to the request's `redirect_uri` only when it is registered for
/// the client, otherwise answers with a JSON body.
fn write_authorize_error(
    client: &Client,
    requester: &dyn AuthorizeRequester,
    err: &AuthorizeError,
) -> Response {
    let description = err.description_with_hint();

    let redirect = requester
        .redirect_uri()
        .filter(|uri| client.is_redirect_uri_allowed(uri))
        .and_then(|uri| url::Url::parse(uri).ok());

    match redirect {
        Some(mut redirect_url) => {
            {
                let mut query = redirect_url.query_pairs_mut();
                query.append_pair("error", err.error);
                query.append_pair("error_description", &description);
                if let Some(state) = requester.state() {
                    query.append_pair("state", state);
                }
            }
            found(redirect_url.as_str())
        }
        None => json_error(StatusCode::BAD_REQUEST, err.error, Some(description)),
    }
}
