//! OAuth2 User entity - end users that grant access to clients.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "oauth2_user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Username as entered at registration (case preserved)
    pub username: String,
    /// Lower-cased username, the uniqueness and lookup key
    #[sea_orm(unique)]
    pub username_normalized: String,
    /// Argon2id PHC string (None for users without a local credential)
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::oauth2_authorization_code::Entity")]
    AuthorizationCodes,
    #[sea_orm(has_many = "super::oauth2_access_token::Entity")]
    AccessTokens,
    #[sea_orm(has_many = "super::oauth2_refresh_token::Entity")]
    RefreshTokens,
}

impl Related<super::oauth2_authorization_code::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AuthorizationCodes.def()
    }
}

impl Related<super::oauth2_access_token::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AccessTokens.def()
    }
}

impl Related<super::oauth2_refresh_token::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RefreshTokens.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Whether the user has a local password at all
    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }
}

/// Canonical form used for case-insensitive username uniqueness and lookup.
pub fn normalize_username(username: &str) -> String {
    username.to_lowercase()
}
