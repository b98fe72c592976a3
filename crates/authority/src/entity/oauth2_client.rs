//! OAuth2 Client entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "oauth2_client")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Argon2id PHC string of the client secret, never the secret itself
    #[serde(skip_serializing)]
    pub secret: String,
    /// Registered redirect URI (None for clients that never use the code flow)
    pub redirect_uri: Option<String>,
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
    /// Check if a redirect URI is the one registered for this client
    pub fn is_redirect_uri_allowed(&self, uri: &str) -> bool {
        self.redirect_uri.as_deref() == Some(uri)
    }
}
