//! SeaORM entities backing the consent store.

pub mod oauth2_consent_session;
pub mod user_opaque_identifier;
