//! Client directory: registration and authentication of OAuth2 clients.

use crate::entity::oauth2_client;
use crate::error::{OAuth2Error, Result};
use crate::oauth2::password::SecretHasher;
use crate::store;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, DatabaseConnection, EntityTrait};
use std::sync::Arc;
use time::OffsetDateTime;

#[derive(Clone)]
pub struct ClientDirectory {
    db: Arc<DatabaseConnection>,
    hasher: SecretHasher,
}

impl ClientDirectory {
    pub fn new(db: Arc<DatabaseConnection>, hasher: SecretHasher) -> Self {
        Self { db, hasher }
    }

    /// Register a confidential client. Only the secret's digest is stored.
    ///
    /// An empty `redirect_uri` registers a client without one.
    #[tracing::instrument(skip(self, secret))]
    pub async fn create_client(
        &self,
        id: &str,
        secret: &str,
        redirect_uri: &str,
    ) -> Result<oauth2_client::Model> {
        if id.trim().is_empty() {
            return Err(OAuth2Error::InvalidRequest("client id must not be empty"));
        }
        if secret.is_empty() {
            return Err(OAuth2Error::InvalidRequest("client secret must not be empty"));
        }

        if oauth2_client::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .is_some()
        {
            return Err(OAuth2Error::DuplicateClient);
        }

        let now = OffsetDateTime::now_utc();
        let client = oauth2_client::ActiveModel {
            id: Set(id.to_string()),
            secret: Set(self.hasher.hash(secret)?),
            redirect_uri: Set((!redirect_uri.is_empty()).then(|| redirect_uri.to_string())),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let client = client
            .insert(self.db.as_ref())
            .await
            .map_err(store::unique_violation_as(OAuth2Error::DuplicateClient))?;
        tracing::info!(client_id = %client.id, "Registered OAuth2 client");
        Ok(client)
    }

    /// Plain lookup by client id; not a credential check.
    #[tracing::instrument(skip(self))]
    pub async fn find_client_by_id(&self, id: &str) -> Result<oauth2_client::Model> {
        oauth2_client::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or(OAuth2Error::ClientNotFound)
    }

    /// Authenticate a client by id and secret.
    ///
    /// An unknown id still pays for one secret verification, and both
    /// failures render identically, so callers cannot probe for client ids.
    #[tracing::instrument(skip(self, secret))]
    pub async fn auth_client(&self, id: &str, secret: &str) -> Result<oauth2_client::Model> {
        let client = match self.find_client_by_id(id).await {
            Ok(client) => client,
            Err(OAuth2Error::ClientNotFound) => {
                self.hasher.verify_dummy(secret);
                tracing::warn!(client_id = id, "Client authentication failed");
                return Err(OAuth2Error::ClientNotFound);
            }
            Err(e) => return Err(e),
        };

        if self.hasher.verify(&client.secret, secret).is_err() {
            tracing::warn!(client_id = id, "Client authentication failed");
            return Err(OAuth2Error::InvalidClientSecret);
        }

        Ok(client)
    }

    /// Replace a client's secret, returning the updated record.
    #[tracing::instrument(skip(self, client, new_secret), fields(client_id = %client.id))]
    pub async fn rotate_secret(
        &self,
        client: &oauth2_client::Model,
        new_secret: &str,
    ) -> Result<oauth2_client::Model> {
        if new_secret.is_empty() {
            return Err(OAuth2Error::InvalidRequest("client secret must not be empty"));
        }

        let mut active: oauth2_client::ActiveModel = client.clone().into();
        active.secret = Set(self.hasher.hash(new_secret)?);
        active.updated_at = Set(OffsetDateTime::now_utc());
        let updated = active.update(self.db.as_ref()).await.map_err(|e| match e {
            sea_orm::DbErr::RecordNotUpdated => OAuth2Error::ClientNotFound,
            other => OAuth2Error::Storage(other),
        })?;

        tracing::info!("Rotated client secret");
        Ok(updated)
    }
}
