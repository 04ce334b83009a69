//! Storage boundary for the consent engine.
//!
//! [`ConsentStore`] is everything the engine needs from persistence.
//! [`DbConsentStore`] implements it with SeaORM over SQLite or PostgreSQL.

use crate::entity::{oauth2_consent_session, user_opaque_identifier};
use crate::error::StorageError;
use crate::oauth2::consent_session::ConsentSession;
use crate::oauth2::requester::{decode_form, encode_form, split_list};
use async_trait::async_trait;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ActiveValue::Set, ColumnTrait, DatabaseConnection,
    DbErr, EntityTrait, QueryFilter, QueryOrder,
};
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

/// Service name recorded against opaque identifiers issued for OpenID Connect.
pub const SUBJECT_SERVICE_OPENID: &str = "openid";

#[async_trait]
pub trait ConsentStore: Send + Sync {
    /// Fetch the subject for `(sector_id, username)` if one was issued.
    async fn load_subject(&self, sector_id: &str, username: &str)
    -> Result<Option<Uuid>, StorageError>;

    /// Insert `subject` for `(sector_id, username)` unless one exists already.
    ///
    /// Returns whichever subject is stored afterwards, so concurrent creators
    /// converge on a single value.
    async fn create_subject(
        &self,
        sector_id: &str,
        username: &str,
        subject: Uuid,
    ) -> Result<Uuid, StorageError>;

    /// Persist a new consent session and record its row id on `consent`.
    async fn save_consent_session(&self, consent: &mut ConsentSession) -> Result<(), StorageError>;

    /// Bind `consent.subject` to the stored session if the stored subject is still NULL.
    ///
    /// Returns the subject stored afterwards; this differs from the requested one
    /// when another request bound the session first.
    async fn save_consent_session_subject(
        &self,
        consent: &ConsentSession,
    ) -> Result<Option<Uuid>, StorageError>;

    /// Record the user's response. Fails if the session was already responded to.
    async fn save_consent_session_response(
        &self,
        consent: &ConsentSession,
    ) -> Result<(), StorageError>;

    /// Mark a granted session as redeemed. Returns `false` if it was redeemed already.
    async fn save_consent_session_consumed(
        &self,
        consent: &ConsentSession,
    ) -> Result<bool, StorageError>;

    async fn load_consent_session_by_challenge_id(
        &self,
        challenge_id: Uuid,
    ) -> Result<ConsentSession, StorageError>;

    /// Granted, unexpired, pre-configured sessions matching `signature`, newest first.
    async fn load_pre_configured_consent_sessions(
        &self,
        signature: &str,
    ) -> Result<Vec<ConsentSession>, StorageError>;
}

/// Database-backed consent store.
#[derive(Clone)]
pub struct DbConsentStore {
    db: Arc<DatabaseConnection>,
}

impl DbConsentStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ConsentStore for DbConsentStore {
    #[tracing::instrument(skip(self))]
    async fn load_subject(
        &self,
        sector_id: &str,
        username: &str,
    ) -> Result<Option<Uuid>, StorageError> {
        let row = user_opaque_identifier::Entity::find()
            .filter(user_opaque_identifier::Column::Service.eq(SUBJECT_SERVICE_OPENID))
            .filter(user_opaque_identifier::Column::SectorId.eq(sector_id))
            .filter(user_opaque_identifier::Column::Username.eq(username))
            .one(self.db.as_ref())
            .await?;

        row.map(|r| parse_uuid("identifier", &r.identifier))
            .transpose()
    }

    #[tracing::instrument(skip(self))]
    async fn create_subject(
        &self,
        sector_id: &str,
        username: &str,
        subject: Uuid,
    ) -> Result<Uuid, StorageError> {
        let row = user_opaque_identifier::ActiveModel {
            id: NotSet,
            service: Set(SUBJECT_SERVICE_OPENID.to_string()),
            sector_id: Set(sector_id.to_string()),
            username: Set(username.to_string()),
            identifier: Set(subject.to_string()),
        };

        let insert = user_opaque_identifier::Entity::insert(row).on_conflict(
            OnConflict::columns([
                user_opaque_identifier::Column::Service,
                user_opaque_identifier::Column::SectorId,
                user_opaque_identifier::Column::Username,
            ])
            .do_nothing()
            .to_owned(),
        );

        match insert.exec_without_returning(self.db.as_ref()).await {
            Ok(_) | Err(DbErr::RecordNotInserted) => {}
            Err(e) => return Err(e.into()),
        }

        self.load_subject(sector_id, username)
            .await?
            .ok_or_else(|| StorageError::SubjectNotCreated {
                sector_id: sector_id.to_string(),
            })
    }

    #[tracing::instrument(skip(self, consent), fields(challenge_id = %consent.challenge_id))]
    async fn save_consent_session(&self, consent: &mut ConsentSession) -> Result<(), StorageError> {
        let row = oauth2_consent_session::ActiveModel {
            id: NotSet,
            challenge_id: Set(consent.challenge_id.to_string()),
            client_id: Set(consent.client_id.clone()),
            subject: Set(consent.subject.map(|s| s.to_string())),
            signature: Set(consent.signature()),
            responded: Set(consent.responded),
            granted: Set(consent.granted),
            pre_configured: Set(consent.pre_configured),
            consumed: Set(consent.consumed),
            requested_at: Set(consent.requested_at),
            responded_at: Set(consent.responded_at),
            expires_at: Set(consent.expires_at),
            requested_scopes: Set(consent.requested_scopes.join(" ")),
            granted_scopes: Set(consent.granted_scopes.join(" ")),
            requested_audience: Set(consent.requested_audience.join(" ")),
            granted_audience: Set(consent.granted_audience.join(" ")),
            form_data: Set(encode_form(&consent.form)),
        };

        let model = row.insert(self.db.as_ref()).await?;
        consent.id = model.id;
        Ok(())
    }

    #[tracing::instrument(skip(self, consent), fields(challenge_id = %consent.challenge_id))]
    async fn save_consent_session_subject(
        &self,
        consent: &ConsentSession,
    ) -> Result<Option<Uuid>, StorageError> {
        if let Some(subject) = consent.subject {
            let result = oauth2_consent_session::Entity::update_many()
                .col_expr(
                    oauth2_consent_session::Column::Subject,
                    Expr::value(subject.to_string()),
                )
                .col_expr(
                    oauth2_consent_session::Column::Signature,
                    Expr::value(consent.signature()),
                )
                .filter(oauth2_consent_session::Column::Id.eq(consent.id))
                .filter(oauth2_consent_session::Column::Subject.is_null())
                .exec(self.db.as_ref())
                .await?;

            if result.rows_affected == 1 {
                return Ok(Some(subject));
            }
        }

        let stored = oauth2_consent_session::Entity::find_by_id(consent.id)
            .one(self.db.as_ref())
            .await?
            .ok_or(StorageError::ConsentSessionNotFound(consent.challenge_id))?;

        stored
            .subject
            .as_deref()
            .map(|s| parse_uuid("subject", s))
            .transpose()
    }

    #[tracing::instrument(skip(self, consent), fields(challenge_id = %consent.challenge_id))]
    async fn save_consent_session_response(
        &self,
        consent: &ConsentSession,
    ) -> Result<(), StorageError> {
        use oauth2_consent_session::Column;

        let result = oauth2_consent_session::Entity::update_many()
            .col_expr(Column::Responded, Expr::value(true))
            .col_expr(Column::Granted, Expr::value(consent.granted))
            .col_expr(Column::RespondedAt, Expr::value(consent.responded_at))
            .col_expr(
                Column::GrantedScopes,
                Expr::value(consent.granted_scopes.join(" ")),
            )
            .col_expr(
                Column::GrantedAudience,
                Expr::value(consent.granted_audience.join(" ")),
            )
            .col_expr(Column::PreConfigured, Expr::value(consent.pre_configured))
            .col_expr(Column::ExpiresAt, Expr::value(consent.expires_at))
            .col_expr(Column::Signature, Expr::value(consent.signature()))
            .filter(Column::Id.eq(consent.id))
            .filter(Column::Responded.eq(false))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            return Err(StorageError::ConsentSessionAlreadyResponded(
                consent.challenge_id,
            ));
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, consent), fields(challenge_id = %consent.challenge_id))]
    async fn save_consent_session_consumed(
        &self,
        consent: &ConsentSession,
    ) -> Result<bool, StorageError> {
        use oauth2_consent_session::Column;

        let result = oauth2_consent_session::Entity::update_many()
            .col_expr(Column::Consumed, Expr::value(true))
            .filter(Column::Id.eq(consent.id))
            .filter(Column::Responded.eq(true))
            .filter(Column::Granted.eq(true))
            .filter(Column::Consumed.eq(false))
            .exec(self.db.as_ref())
            .await?;

        Ok(result.rows_affected == 1)
    }

    #[tracing::instrument(skip(self))]
    async fn load_consent_session_by_challenge_id(
        &self,
        challenge_id: Uuid,
    ) -> Result<ConsentSession, StorageError> {
        let model = oauth2_consent_session::Entity::find()
            .filter(oauth2_consent_session::Column::ChallengeId.eq(challenge_id.to_string()))
            .one(self.db.as_ref())
            .await?
            .ok_or(StorageError::ConsentSessionNotFound(challenge_id))?;

        ConsentSession::try_from(model)
    }

    #[tracing::instrument(skip(self))]
    async fn load_pre_configured_consent_sessions(
        &self,
        signature: &str,
    ) -> Result<Vec<ConsentSession>, StorageError> {
        let models = oauth2_consent_session::Entity::find()
            .filter(oauth2_consent_session::Column::Signature.eq(signature))
            .filter(oauth2_consent_session::Column::PreConfigured.eq(true))
            .filter(oauth2_consent_session::Column::Granted.eq(true))
            .order_by_desc(oauth2_consent_session::Column::Id)
            .all(self.db.as_ref())
            .await?;

        let now = OffsetDateTime::now_utc();
        models
            .into_iter()
            .map(ConsentSession::try_from)
            .filter(|r| {
                r.as_ref()
                    .map_or(true, |consent| consent.is_valid_pre_configuration(now))
            })
            .collect()
    }
}

impl TryFrom<oauth2_consent_session::Model> for ConsentSession {
    type Error = StorageError;

    fn try_from(model: oauth2_consent_session::Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            challenge_id: parse_uuid("challenge_id", &model.challenge_id)?,
            client_id: model.client_id,
            subject: model
                .subject
                .as_deref()
                .map(|s| parse_uuid("subject", s))
                .transpose()?,
            requested_scopes: split_list(Some(&model.requested_scopes)),
            granted_scopes: split_list(Some(&model.granted_scopes)),
            requested_audience: split_list(Some(&model.requested_audience)),
            granted_audience: split_list(Some(&model.granted_audience)),
            form: decode_form(&model.form_data),
            responded: model.responded,
            granted: model.granted,
            pre_configured: model.pre_configured,
            consumed: model.consumed,
            expires_at: model.expires_at,
            requested_at: model.requested_at,
            responded_at: model.responded_at,
        })
    }
}

fn parse_uuid(column: &'static str, value: &str) -> Result<Uuid, StorageError> {
    Uuid::parse_str(value).map_err(|_| StorageError::InvalidIdentifier {
        column,
        value: value.to_string(),
    })
}
