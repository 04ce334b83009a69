//! OpenAPI/Utoipa configuration.

use crate::api::health::MISC_TAG;
use crate::oauth2::OAUTH2_TAG;
use utoipa::OpenApi;

/// OpenAPI documentation configuration.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "OIDC Consent API",
        version = "1.0.0",
        description = "Authorization consent decisions and the consent UI API."
    ),
    tags(
        (name = MISC_TAG, description = "Miscellaneous endpoints"),
        (name = OAUTH2_TAG, description = "OpenID Connect authorization and consent endpoints")
    )
)]
pub struct ApiDoc;
