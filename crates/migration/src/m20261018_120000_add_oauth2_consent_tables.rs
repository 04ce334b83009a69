//! Migration to add the OpenID Connect consent tables.
//!
//! Creates tables for:
//! - user_opaque_identifier: Pairwise subject per (service, sector, username)
//! - oauth2_consent_session: Consent decisions and pending consent challenges

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 1. Opaque subject identifiers
        manager
            .create_table(
                Table::create()
                    .table(UserOpaqueIdentifier::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UserOpaqueIdentifier::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(UserOpaqueIdentifier::Service)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserOpaqueIdentifier::SectorId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserOpaqueIdentifier::Username)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UserOpaqueIdentifier::Identifier)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .to_owned(),
            )
            .await?;

        // Concurrent first use converges on one subject through this constraint
        manager
            .create_index(
                Index::create()
                    .name("idx_user_opaque_identifier_lookup")
                    .table(UserOpaqueIdentifier::Table)
                    .col(UserOpaqueIdentifier::Service)
                    .col(UserOpaqueIdentifier::SectorId)
                    .col(UserOpaqueIdentifier::Username)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // 2. Consent sessions
        manager
            .create_table(
                Table::create()
                    .table(OAuth2ConsentSession::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OAuth2ConsentSession::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OAuth2ConsentSession::ChallengeId)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(OAuth2ConsentSession::ClientId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(OAuth2ConsentSession::Subject).string().null())
                    .col(
                        ColumnDef::new(OAuth2ConsentSession::Signature)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2ConsentSession::Responded)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(OAuth2ConsentSession::Granted)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(OAuth2ConsentSession::PreConfigured)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(OAuth2ConsentSession::Consumed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(OAuth2ConsentSession::RequestedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2ConsentSession::RespondedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2ConsentSession::ExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2ConsentSession::RequestedScopes)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2ConsentSession::GrantedScopes)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2ConsentSession::RequestedAudience)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2ConsentSession::GrantedAudience)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2ConsentSession::FormData)
                            .text()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_oauth2_consent_session_signature")
                    .table(OAuth2ConsentSession::Table)
                    .col(OAuth2ConsentSession::Signature)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OAuth2ConsentSession::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(UserOpaqueIdentifier::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum UserOpaqueIdentifier {
    Table,
    Id,
    Service,
    SectorId,
    Username,
    Identifier,
}

#[derive(DeriveIden)]
enum OAuth2ConsentSession {
    #[sea_orm(iden = "oauth2_consent_session")]
    Table,
    Id,
    ChallengeId,
    ClientId,
    Subject,
    Signature,
    Responded,
    Granted,
    PreConfigured,
    Consumed,
    RequestedAt,
    RespondedAt,
    ExpiresAt,
    RequestedScopes,
    GrantedScopes,
    RequestedAudience,
    GrantedAudience,
    FormData,
}
