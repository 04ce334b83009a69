//! OpenID Connect authorization consent.
//!
//! Decides, for each authorization request, whether and how end-user consent
//! must be obtained before the issuance layer may act on it.
//!
//! ## Components
//!
//! - [`subject`] - pairwise subject identifiers per (sector, username)
//! - [`consent`] - the decision engine
//! - [`modes`] - explicit, implicit and pre-configured strategies
//! - [`guard`] - consent session ownership checks
//! - [`redirect`] - login workflow, consent UI and authorization URLs
//!
//! ## Endpoints
//!
//! - `GET /api/oidc/authorization` - Authorization consent decision
//! - `GET /api/oidc/consent` - Pending consent session details
//! - `POST /api/oidc/consent` - Consent response

pub mod client;
pub mod consent;
pub mod consent_session;
pub mod endpoints;
pub mod guard;
mod modes;
pub mod redirect;
pub mod requester;
mod state;
pub mod subject;
pub mod user_session;

pub use client::{AuthorizationPolicy, Client, ClientRegistry, ConsentMode};
pub use consent::{ConsentEngine, ConsentOutcome};
pub use consent_session::ConsentSession;
pub use endpoints::router;
pub use requester::{AuthorizeRequest, AuthorizeRequester};
pub use state::OAuth2State;
pub use subject::SubjectResolver;
pub use user_session::{AuthenticationLevel, UserSession};

/// OpenAPI tag for OpenID Connect endpoints
pub const OAUTH2_TAG: &str = "OpenID Connect";
