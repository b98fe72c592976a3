//! User directory: registration, lookup and password authentication.
//!
//! Usernames keep the case they were registered with, but uniqueness and
//! lookup go through [`normalize_username`], backed by a unique index on the
//! normalized column.

use crate::entity::oauth2_user::{self, normalize_username};
use crate::error::{OAuth2Error, Result};
use crate::oauth2::password::SecretHasher;
use crate::oauth2::token::{RevocationCounts, TokenAuthority};
use crate::store;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, TransactionTrait,
};
use std::sync::Arc;
use time::OffsetDateTime;

#[derive(Clone)]
pub struct UserDirectory {
    db: Arc<DatabaseConnection>,
    hasher: SecretHasher,
}

impl UserDirectory {
    pub fn new(db: Arc<DatabaseConnection>, hasher: SecretHasher) -> Self {
        Self { db, hasher }
    }

    /// Create a user. An empty password creates a user without a local
    /// credential (e.g. one that signs in through an external provider).
    pub async fn create_user(&self, username: &str, password: &str) -> Result<oauth2_user::Model> {
        self.create_user_on(self.db.as_ref(), username, password)
            .await
    }

    /// [`create_user`](Self::create_user) against a caller-supplied
    /// connection, typically an open transaction.
    #[tracing::instrument(skip(self, conn, password))]
    pub async fn create_user_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        username: &str,
        password: &str,
    ) -> Result<oauth2_user::Model> {
        if username.trim().is_empty() {
            return Err(OAuth2Error::InvalidRequest("username must not be empty"));
        }

        let normalized = normalize_username(username);
        if find_by_normalized(conn, &normalized).await?.is_some() {
            return Err(OAuth2Error::DuplicateUser);
        }

        let password_hash = if password.is_empty() {
            None
        } else {
            Some(self.hasher.hash(password)?)
        };

        let now = OffsetDateTime::now_utc();
        let user = oauth2_user::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            username: Set(username.to_string()),
            username_normalized: Set(normalized),
            password_hash: Set(password_hash),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let user = user
            .insert(conn)
            .await
            .map_err(store::unique_violation_as(OAuth2Error::DuplicateUser))?;
        tracing::info!(user_id = %user.id, "Created user");
        Ok(user)
    }

    /// Set or reset a user's password, returning the updated record.
    #[tracing::instrument(skip(self, user, password), fields(user_id = %user.id))]
    pub async fn set_password(
        &self,
        user: &oauth2_user::Model,
        password: &str,
    ) -> Result<oauth2_user::Model> {
        if password.trim().is_empty() {
            return Err(OAuth2Error::EmptyPassword);
        }

        let mut active: oauth2_user::ActiveModel = user.clone().into();
        active.password_hash = Set(Some(self.hasher.hash(password)?));
        active.updated_at = Set(OffsetDateTime::now_utc());
        let updated = active
            .update(self.db.as_ref())
            .await
            .map_err(|e| match e {
                DbErr::RecordNotUpdated => OAuth2Error::UserNotFound,
                other => OAuth2Error::Storage(other),
            })?;

        tracing::info!("Password updated");
        Ok(updated)
    }

    /// Authenticate a user by username and password.
    ///
    /// Unknown user, missing password and wrong password stay distinct
    /// variants but cost the same and render the same message.
    #[tracing::instrument(skip(self, password))]
    pub async fn auth_user(&self, username: &str, password: &str) -> Result<oauth2_user::Model> {
        let user = match self.find_user_by_username(username).await {
            Ok(user) => user,
            Err(OAuth2Error::UserNotFound) => {
                self.hasher.verify_dummy(password);
                tracing::debug!("User authentication failed: unknown user");
                return Err(OAuth2Error::UserNotFound);
            }
            Err(e) => return Err(e),
        };

        let Some(hash) = user.password_hash.as_deref() else {
            self.hasher.verify_dummy(password);
            tracing::debug!(user_id = %user.id, "User authentication failed: no password set");
            return Err(OAuth2Error::PasswordNotSet);
        };

        if self.hasher.verify(hash, password).is_err() {
            tracing::warn!(user_id = %user.id, "User authentication failed");
            return Err(OAuth2Error::InvalidCredential);
        }

        Ok(user)
    }

    /// Case-insensitive lookup by username.
    #[tracing::instrument(skip(self))]
    pub async fn find_user_by_username(&self, username: &str) -> Result<oauth2_user::Model> {
        find_by_normalized(self.db.as_ref(), &normalize_username(username))
            .await?
            .ok_or(OAuth2Error::UserNotFound)
    }

    #[tracing::instrument(skip(self))]
    pub async fn find_user_by_id(&self, id: &str) -> Result<oauth2_user::Model> {
        oauth2_user::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or(OAuth2Error::UserNotFound)
    }

    /// Existence probe; any lookup failure counts as absent.
    pub async fn user_exists(&self, username: &str) -> bool {
        self.find_user_by_username(username).await.is_ok()
    }

    /// Hard-delete a user together with every code and token held on their
    /// behalf, in one transaction.
    #[tracing::instrument(skip(self))]
    pub async fn delete_user(&self, user_id: &str) -> Result<RevocationCounts> {
        let txn = self.db.begin().await?;
        let revoked = TokenAuthority::revoke_all_for_user_on(&txn, user_id).await?;
        Self::delete_user_on(&txn, user_id).await?;
        txn.commit().await?;
        tracing::info!(revoked = revoked.total(), "Deleted user");
        Ok(revoked)
    }

    /// Delete the user row only; the caller owns the transaction and the
    /// user's codes and tokens.
    pub(crate) async fn delete_user_on<C: ConnectionTrait>(conn: &C, user_id: &str) -> Result<()> {
        let deleted = oauth2_user::Entity::delete_by_id(user_id)
            .exec(conn)
            .await?
            .rows_affected;
        if deleted == 0 {
            return Err(OAuth2Error::UserNotFound);
        }
        Ok(())
    }
}

async fn find_by_normalized<C: ConnectionTrait>(
    conn: &C,
    normalized: &str,
) -> Result<Option<oauth2_user::Model>, DbErr> {
    oauth2_user::Entity::find()
        .filter(oauth2_user::Column::UsernameNormalized.eq(normalized))
        .one(conn)
        .await
}
