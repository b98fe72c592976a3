//! Creates the tables owned by the credential and token authority.
//!
//! - oauth2_client: registered clients (hashed secret, redirect URI)
//! - oauth2_user: end users, unique on the lower-cased username
//! - oauth2_scope: the seeded scope catalogue
//! - oauth2_authorization_code: single-use codes (short-lived)
//! - oauth2_access_token / oauth2_refresh_token: issued tokens
//!
//! Codes and tokens reference their client and user with `ON DELETE CASCADE`.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OAuth2Client::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OAuth2Client::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OAuth2Client::Secret)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(OAuth2Client::RedirectUri).text().null())
                    .col(
                        ColumnDef::new(OAuth2Client::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2Client::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OAuth2User::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OAuth2User::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OAuth2User::Username).string().not_null())
                    .col(
                        ColumnDef::new(OAuth2User::UsernameNormalized)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(OAuth2User::PasswordHash)
                            .string_len(255)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2User::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2User::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OAuth2Scope::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OAuth2Scope::Name)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OAuth2Scope::IsDefault)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(OAuth2Scope::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OAuth2AuthorizationCode::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OAuth2AuthorizationCode::Code)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OAuth2AuthorizationCode::ClientId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2AuthorizationCode::UserId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2AuthorizationCode::RedirectUri)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2AuthorizationCode::Scope)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2AuthorizationCode::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2AuthorizationCode::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_oauth2_authorization_code_client")
                            .from(
                                OAuth2AuthorizationCode::Table,
                                OAuth2AuthorizationCode::ClientId,
                            )
                            .to(OAuth2Client::Table, OAuth2Client::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_oauth2_authorization_code_user")
                            .from(
                                OAuth2AuthorizationCode::Table,
                                OAuth2AuthorizationCode::UserId,
                            )
                            .to(OAuth2User::Table, OAuth2User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OAuth2AccessToken::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OAuth2AccessToken::Token)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OAuth2AccessToken::ClientId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(OAuth2AccessToken::UserId).string().null())
                    .col(ColumnDef::new(OAuth2AccessToken::Scope).text().not_null())
                    .col(
                        ColumnDef::new(OAuth2AccessToken::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2AccessToken::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_oauth2_access_token_client")
                            .from(OAuth2AccessToken::Table, OAuth2AccessToken::ClientId)
                            .to(OAuth2Client::Table, OAuth2Client::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_oauth2_access_token_user")
                            .from(OAuth2AccessToken::Table, OAuth2AccessToken::UserId)
                            .to(OAuth2User::Table, OAuth2User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OAuth2RefreshToken::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OAuth2RefreshToken::Token)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OAuth2RefreshToken::ClientId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(OAuth2RefreshToken::UserId).string().null())
                    .col(
                        ColumnDef::new(OAuth2RefreshToken::AccessToken)
                            .string()
                            .null(),
                    )
                    .col(ColumnDef::new(OAuth2RefreshToken::Scope).text().not_null())
                    .col(
                        ColumnDef::new(OAuth2RefreshToken::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2RefreshToken::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_oauth2_refresh_token_client")
                            .from(OAuth2RefreshToken::Table, OAuth2RefreshToken::ClientId)
                            .to(OAuth2Client::Table, OAuth2Client::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_oauth2_refresh_token_user")
                            .from(OAuth2RefreshToken::Table, OAuth2RefreshToken::UserId)
                            .to(OAuth2User::Table, OAuth2User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_oauth2_refresh_token_access_token")
                            .from(
                                OAuth2RefreshToken::Table,
                                OAuth2RefreshToken::AccessToken,
                            )
                            .to(OAuth2AccessToken::Table, OAuth2AccessToken::Token)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_oauth2_authorization_code_expires_at")
                    .table(OAuth2AuthorizationCode::Table)
                    .col(OAuth2AuthorizationCode::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_oauth2_access_token_client_user")
                    .table(OAuth2AccessToken::Table)
                    .col(OAuth2AccessToken::ClientId)
                    .col(OAuth2AccessToken::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_oauth2_access_token_expires_at")
                    .table(OAuth2AccessToken::Table)
                    .col(OAuth2AccessToken::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_oauth2_refresh_token_user_id")
                    .table(OAuth2RefreshToken::Table)
                    .col(OAuth2RefreshToken::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_oauth2_refresh_token_expires_at")
                    .table(OAuth2RefreshToken::Table)
                    .col(OAuth2RefreshToken::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for index in [
            "idx_oauth2_refresh_token_expires_at",
            "idx_oauth2_refresh_token_user_id",
            "idx_oauth2_access_token_expires_at",
            "idx_oauth2_access_token_client_user",
            "idx_oauth2_authorization_code_expires_at",
        ] {
            manager
                .drop_index(Index::drop().name(index).to_owned())
                .await?;
        }

        // Children before parents
        manager
            .drop_table(Table::drop().table(OAuth2RefreshToken::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OAuth2AccessToken::Table).to_owned())
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(OAuth2AuthorizationCode::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(OAuth2Scope::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OAuth2User::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OAuth2Client::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum OAuth2Client {
    #[sea_orm(iden = "oauth2_client")]
    Table,
    Id,
    Secret,
    RedirectUri,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum OAuth2User {
    #[sea_orm(iden = "oauth2_user")]
    Table,
    Id,
    Username,
    UsernameNormalized,
    PasswordHash,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum OAuth2Scope {
    #[sea_orm(iden = "oauth2_scope")]
    Table,
    Name,
    IsDefault,
    CreatedAt,
}

#[derive(DeriveIden)]
enum OAuth2AuthorizationCode {
    #[sea_orm(iden = "oauth2_authorization_code")]
    Table,
    Code,
    ClientId,
    UserId,
    RedirectUri,
    Scope,
    ExpiresAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum OAuth2AccessToken {
    #[sea_orm(iden = "oauth2_access_token")]
    Table,
    Token,
    ClientId,
    UserId,
    Scope,
    ExpiresAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum OAuth2RefreshToken {
    #[sea_orm(iden = "oauth2_refresh_token")]
    Table,
    Token,
    ClientId,
    UserId,
    AccessToken,
    Scope,
    ExpiresAt,
    CreatedAt,
}
