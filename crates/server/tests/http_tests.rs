//! OpenID Connect endpoint tests.
//!
//! Drives the authorization and consent endpoints through an in-process server.

mod common;

use axum::{
    Extension, Router,
    http::{HeaderValue, StatusCode, header},
};
use axum_test::TestServer;
use common::{REDIRECT_URI, create_test_state};
use oidc_consent::api;
use oidc_consent::oauth2::{AuthenticationLevel, OAuth2State, UserSession, router};
use serde_json::{Value, json};
use url::Url;

fn create_test_server(state: OAuth2State, user: Option<UserSession>) -> TestServer {
    let (app, _api) = router(state).split_for_parts();
    let app: Router = match user {
        Some(user) => app.layer(Extension(user)),
        None => app,
    };
    TestServer::new(app).expect("create test server")
}

fn john() -> Option<UserSession> {
    Some(UserSession::new("john", AuthenticationLevel::TwoFactor))
}

fn location(response: &axum_test::TestResponse) -> Url {
    let header = response.header("location");
    Url::parse(header.to_str().expect("ascii location")).expect("absolute location")
}

fn query_value(location: &Url, key: &str) -> Option<String> {
    location
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Start an explicit flow and return the challenge id from the consent UI redirect.
async fn start_explicit_flow(server: &TestServer) -> String {
    let response = server
        .get("/authorization")
        .add_query_param("response_type", "code")
        .add_query_param("client_id", "explicit-app")
        .add_query_param("scope", "openid profile")
        .add_query_param("redirect_uri", REDIRECT_URI)
        .add_query_param("state", "af0ifjsldkj")
        .await;

    response.assert_status(StatusCode::FOUND);
    let location = location(&response);
    assert_eq!(location.path(), "/consent/openid");
    query_value(&location, "id").expect("challenge id")
}

// =============================================================================
// Authorization Endpoint Tests
// =============================================================================

#[tokio::test]
async fn test_authorization_unknown_client() {
    let (state, _store) = create_test_state().await;
    let server = create_test_server(state, john());

    let response = server
        .get("/authorization")
        .add_query_param("client_id", "nonexistent-client")
        .add_query_param("redirect_uri", REDIRECT_URI)
        .await;

    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["error"], "invalid_client");
}

#[tokio::test]
async fn test_authorization_missing_client_id() {
    let (state, _store) = create_test_state().await;
    let server = create_test_server(state, john());

    let response = server
        .get("/authorization")
        .add_query_param("scope", "openid")
        .await;

    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn test_authorization_anonymous_redirects_to_login() {
    let (state, store) = create_test_state().await;
    let server = create_test_server(state, None);

    let response = server
        .get("/authorization")
        .add_query_param("client_id", "explicit-app")
        .add_query_param("scope", "openid")
        .add_query_param("redirect_uri", REDIRECT_URI)
        .await;

    response.assert_status(StatusCode::FOUND);
    let location = location(&response);
    assert_eq!(
        query_value(&location, "workflow").as_deref(),
        Some("openid_connect")
    );
    let rd = query_value(&location, "rd").expect("return-to");
    assert!(rd.starts_with("https://auth.example.com/api/oidc/authorization?"));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_authorization_implicit_hands_off_to_issuance() {
    let (state, _store) = create_test_state().await;
    let server = create_test_server(state, john());

    let response = server
        .get("/authorization")
        .add_query_param("client_id", "implicit-app")
        .add_query_param("scope", "openid profile")
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["client_id"], "implicit-app");
    assert_eq!(body["granted_scopes"], json!(["openid", "profile"]));
    assert_eq!(body["granted_audience"], json!(["implicit-app"]));
    assert!(body["consent_id"].is_string());
}

#[tokio::test]
async fn test_authorization_error_redirects_to_client() {
    let (state, _store) = create_test_state().await;
    let server = create_test_server(state, john());

    let response = server
        .get("/authorization")
        .add_query_param("client_id", "explicit-app")
        .add_query_param("scope", "openid")
        .add_query_param("redirect_uri", REDIRECT_URI)
        .add_query_param("state", "af0ifjsldkj")
        .add_query_param("consent_id", "not-a-challenge")
        .await;

    response.assert_status(StatusCode::FOUND);
    let location = location(&response);
    assert!(location.as_str().starts_with(REDIRECT_URI));
    assert_eq!(query_value(&location, "error").as_deref(), Some("server_error"));
    assert_eq!(query_value(&location, "state").as_deref(), Some("af0ifjsldkj"));
    let description = query_value(&location, "error_description").unwrap();
    assert!(!description.contains("not-a-challenge"));
}

#[tokio::test]
async fn test_authorization_error_without_redirect_uri_is_json() {
    let (state, _store) = create_test_state().await;
    let server = create_test_server(state, john());

    let response = server
        .get("/authorization")
        .add_query_param("client_id", "explicit-app")
        .add_query_param("scope", "openid")
        .add_query_param("consent_id", "not-a-challenge")
        .await;

    response.assert_status_bad_request();
    let body: Value = response.json();
    assert_eq!(body["error"], "server_error");
}

#[tokio::test]
async fn test_authorization_error_to_unregistered_redirect_uri_is_json() {
    let (state, _store) = create_test_state().await;
    let server = create_test_server(state, john());

    for redirect_uri in [
        "https://attacker.example/steal",
        "https://app.example.com/callback/../steal",
        "https://app.example.com/callback?next=https://attacker.example",
    ] {
        let response = server
            .get("/authorization")
            .add_query_param("client_id", "explicit-app")
            .add_query_param("scope", "openid")
            .add_query_param("redirect_uri", redirect_uri)
            .add_query_param("state", "af0ifjsldkj")
            .add_query_param("consent_id", "garbage")
            .await;

        response.assert_status_bad_request();
        assert!(response.headers().get("location").is_none());
        let body: Value = response.json();
        assert_eq!(body["error"], "server_error");
    }
}

// =============================================================================
// Consent Endpoint Tests
// =============================================================================

#[tokio::test]
async fn test_consent_flow_grant() {
    let (state, _store) = create_test_state().await;
    let server = create_test_server(state, john());

    let challenge = start_explicit_flow(&server).await;

    let response = server.get("/consent").add_query_param("id", &challenge).await;
    response.assert_status_ok();
    let details: Value = response.json();
    assert_eq!(details["client_id"], "explicit-app");
    assert_eq!(details["client_description"], "explicit-app application");
    assert_eq!(details["scopes"], json!(["openid", "profile"]));
    assert_eq!(details["pre_configuration"], false);

    let response = server
        .post("/consent")
        .json(&json!({
            "id": challenge,
            "client_id": "explicit-app",
            "consent": true,
        }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let redirect_uri = Url::parse(body["redirect_uri"].as_str().unwrap()).unwrap();
    assert_eq!(redirect_uri.path(), "/api/oidc/authorization");
    assert_eq!(
        query_value(&redirect_uri, "consent_id").as_deref(),
        Some(challenge.as_str())
    );
    assert_eq!(
        query_value(&redirect_uri, "state").as_deref(),
        Some("af0ifjsldkj")
    );

    // Replay the authorization request the consent UI sends the user back to
    let response = server
        .get("/authorization")
        .add_query_params(
            redirect_uri
                .query_pairs()
                .into_owned()
                .collect::<Vec<(String, String)>>(),
        )
        .await;
    response.assert_status_ok();
    let handoff: Value = response.json();
    assert_eq!(handoff["consent_id"], challenge.as_str());
    assert_eq!(handoff["granted_scopes"], json!(["openid", "profile"]));

    // A second response is refused
    let response = server
        .post("/consent")
        .json(&json!({
            "id": challenge,
            "client_id": "explicit-app",
            "consent": false,
        }))
        .await;
    response.assert_status_bad_request();
}

#[tokio::test]
async fn test_consent_flow_reject() {
    let (state, _store) = create_test_state().await;
    let server = create_test_server(state, john());

    let challenge = start_explicit_flow(&server).await;

    let response = server
        .post("/consent")
        .json(&json!({
            "id": challenge,
            "client_id": "explicit-app",
            "consent": false,
        }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let redirect_uri = Url::parse(body["redirect_uri"].as_str().unwrap()).unwrap();

    let response = server
        .get("/authorization")
        .add_query_params(
            redirect_uri
                .query_pairs()
                .into_owned()
                .collect::<Vec<(String, String)>>(),
        )
        .await;
    response.assert_status(StatusCode::FOUND);
    let location = location(&response);
    assert_eq!(query_value(&location, "error").as_deref(), Some("access_denied"));
}

#[tokio::test]
async fn test_consent_pre_configure_is_remembered() {
    let (state, _store) = create_test_state().await;
    let server = create_test_server(state, john());

    let response = server
        .get("/authorization")
        .add_query_param("client_id", "preconf-app")
        .add_query_param("scope", "openid profile")
        .await;
    response.assert_status(StatusCode::FOUND);
    let challenge = query_value(&location(&response), "id").unwrap();

    let details: Value = server
        .get("/consent")
        .add_query_param("id", &challenge)
        .await
        .json();
    assert_eq!(details["pre_configuration"], true);

    server
        .post("/consent")
        .json(&json!({
            "id": challenge,
            "client_id": "preconf-app",
            "consent": true,
            "pre_configure": true,
        }))
        .await
        .assert_status_ok();

    // A later request with the same scopes skips the consent screen
    let response = server
        .get("/authorization")
        .add_query_param("client_id", "preconf-app")
        .add_query_param("scope", "profile openid")
        .await;
    response.assert_status_ok();
    let handoff: Value = response.json();
    assert_eq!(handoff["consent_id"], challenge.as_str());
}

#[tokio::test]
async fn test_consent_requires_authentication() {
    let (state, _store) = create_test_state().await;
    let server = create_test_server(state, None);

    let response = server
        .get("/consent")
        .add_query_param("id", uuid::Uuid::new_v4().to_string())
        .await;
    response.assert_status_unauthorized();
}

#[tokio::test]
async fn test_consent_unknown_and_malformed_ids() {
    let (state, _store) = create_test_state().await;
    let server = create_test_server(state, john());

    server
        .get("/consent")
        .add_query_param("id", uuid::Uuid::new_v4().to_string())
        .await
        .assert_status_not_found();

    server
        .get("/consent")
        .add_query_param("id", "not-a-uuid")
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn test_consent_of_another_user_is_forbidden() {
    let (state, _store) = create_test_state().await;

    let john_server = create_test_server(state.clone(), john());
    let challenge = start_explicit_flow(&john_server).await;

    let jane = UserSession::new("jane", AuthenticationLevel::TwoFactor);
    let jane_server = create_test_server(state, Some(jane));

    jane_server
        .get("/consent")
        .add_query_param("id", &challenge)
        .await
        .assert_status_forbidden();

    jane_server
        .post("/consent")
        .json(&json!({
            "id": challenge,
            "client_id": "explicit-app",
            "consent": true,
        }))
        .await
        .assert_status_forbidden();
}

#[tokio::test]
async fn test_consent_response_client_mismatch() {
    let (state, _store) = create_test_state().await;
    let server = create_test_server(state, john());

    let challenge = start_explicit_flow(&server).await;

    server
        .post("/consent")
        .json(&json!({
            "id": challenge,
            "client_id": "implicit-app",
            "consent": true,
        }))
        .await
        .assert_status_bad_request();
}

// =============================================================================
// Application Router Tests
// =============================================================================

#[tokio::test]
async fn test_app_serves_health_and_nested_routes() {
    let (state, _store) = create_test_state().await;
    let server = TestServer::new(api::app(state)).expect("create test server");

    server.get("/healthz").await.assert_status_ok();

    server
        .get("/api/oidc/authorization")
        .add_query_param("client_id", "explicit-app")
        .await
        .assert_status(StatusCode::FOUND);
}

#[tokio::test]
async fn test_app_does_not_grant_cross_origin_access() {
    let (state, _store) = create_test_state().await;
    let server = TestServer::new(api::app(state)).expect("create test server");

    let response = server
        .post("/api/oidc/consent")
        .add_header(header::ORIGIN, HeaderValue::from_static("https://attacker.example"))
        .json(&json!({
            "id": "0b7f4c8e-1d2a-4b3c-9e8f-7a6b5c4d3e2f",
            "client_id": "explicit-app",
            "consent": true,
        }))
        .await;

    assert!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none()
    );

    let preflight = server
        .method(axum::http::Method::OPTIONS, "/api/oidc/consent")
        .add_header(header::ORIGIN, HeaderValue::from_static("https://attacker.example"))
        .add_header(
            header::ACCESS_CONTROL_REQUEST_METHOD,
            HeaderValue::from_static("POST"),
        )
        .await;

    assert!(
        preflight
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none()
    );
}
