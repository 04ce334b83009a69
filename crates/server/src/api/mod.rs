//! API module providing the HTTP surface.
//!
//! - `/api/oidc/*` - Authorization and consent endpoints (see [`crate::oauth2`])
//! - `health` - Health check endpoint (/healthz)
//! - `openapi` - OpenAPI/Utoipa configuration

pub mod health;
pub mod openapi;

pub use health::MISC_TAG;

use crate::oauth2::{self, OAuth2State};
use axum::Router;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_axum::{router::OpenApiRouter, routes};
use utoipa_redoc::{Redoc, Servable};

/// Builds the application router with all routes and middleware layers.
pub fn app(oauth2_state: OAuth2State) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(openapi::ApiDoc::openapi())
        .nest("/api/oidc", oauth2::router(oauth2_state))
        .routes(routes!(health::health))
        .layer(TraceLayer::new_for_http())
        .split_for_parts();

    router.merge(Redoc::with_url("/api-docs", api))
}

/// Starts the web server on `listen_address`.
#[tracing::instrument(skip(oauth2_state))]
pub async fn start_webserver(
    oauth2_state: OAuth2State,
    listen_address: &str,
) -> color_eyre::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen_address).await?;
    tracing::info!(addr = listen_address, "Server running");
    axum::serve(listener, app(oauth2_state))
        .await
        .map_err(|e| color_eyre::Report::msg(format!("Failed to start server: {e}")))?;

    Ok(())
}
