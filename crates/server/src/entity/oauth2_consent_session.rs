//! OAuth2 Consent Session entity - one row per authorization request that needed consent.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "oauth2_consent_session")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Opaque identifier used in redirects
    #[sea_orm(unique)]
    pub challenge_id: String,
    pub client_id: String,
    /// Opaque subject identifier, NULL until bound
    pub subject: Option<String>,
    /// Pre-configured consent lookup key, NULL until the subject is known
    pub signature: Option<String>,
    pub responded: bool,
    pub granted: bool,
    pub pre_configured: bool,
    /// Granted session already redeemed by an authorization request
    pub consumed: bool,
    pub requested_at: OffsetDateTime,
    pub responded_at: Option<OffsetDateTime>,
    pub expires_at: Option<OffsetDateTime>,
    /// Space-separated list of requested scopes
    pub requested_scopes: String,
    /// Space-separated list of granted scopes
    pub granted_scopes: String,
    /// Space-separated list of requested audience
    pub requested_audience: String,
    /// Space-separated list of granted audience
    pub granted_audience: String,
    /// URL-encoded original authorization request form
    pub form_data: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
