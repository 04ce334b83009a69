use oidc_consent::api::start_webserver;
use oidc_consent::config::load_config_or_panic;
use oidc_consent::oauth2::OAuth2State;
use sea_orm::Database;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_standard_tracing() {
    let default_directives = "oidc_consent=info,sea_orm=info,tower_http=info";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    initialize_standard_tracing();

    let config = load_config_or_panic();

    let db = Arc::new(Database::connect(&config.database_url).await?);

    let oauth2_state = OAuth2State::new(db, &config.oidc)?;
    tracing::info!(
        issuer = %oauth2_state.engine.redirects().issuer(),
        clients = oauth2_state.clients.len(),
        "OpenID Connect consent configuration"
    );

    start_webserver(oauth2_state, &config.listen_address).await
}
