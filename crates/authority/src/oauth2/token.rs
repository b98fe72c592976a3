//! Token authority: authorization codes, access tokens and refresh tokens.
//!
//! Every artifact moves `issued -> valid -> (expired | consumed | revoked)`
//! and never back. Deletion is the only revocation mechanism: a row that is
//! gone is invalid.
//!
//! Single use is enforced by the storage layer, not by in-process locks.
//! Redemption and rotation run in one transaction and delete the consumed
//! row by key, checking the affected row count; a concurrent attempt that
//! loses the race sees zero rows and reports `CodeNotFound` /
//! `TokenNotFound`.

use crate::config::OAuth2Config;
use crate::entity::{
    oauth2_access_token, oauth2_authorization_code, oauth2_client, oauth2_refresh_token,
    oauth2_user,
};
use crate::error::{OAuth2Error, Result};
use crate::oauth2::password::generate_token;
use crate::oauth2::scope::ScopeRegistry;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, TransactionTrait,
};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

/// How long each artifact stays valid after issuance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenLifetimes {
    pub authorization_code: Duration,
    pub access_token: Duration,
    pub refresh_token: Duration,
}

impl From<&OAuth2Config> for TokenLifetimes {
    fn from(config: &OAuth2Config) -> Self {
        Self {
            authorization_code: Duration::seconds(config.authorization_code_lifetime),
            access_token: Duration::seconds(config.access_token_lifetime),
            refresh_token: Duration::seconds(config.refresh_token_lifetime),
        }
    }
}

/// An access token and the refresh token issued alongside it.
#[derive(Clone, Debug, PartialEq)]
pub struct TokenPair {
    pub access_token: oauth2_access_token::Model,
    pub refresh_token: oauth2_refresh_token::Model,
}

/// Rows removed by a bulk revocation or purge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RevocationCounts {
    pub authorization_codes: u64,
    pub access_tokens: u64,
    pub refresh_tokens: u64,
}

impl RevocationCounts {
    pub fn total(&self) -> u64 {
        self.authorization_codes + self.access_tokens + self.refresh_tokens
    }
}

#[derive(Clone)]
pub struct TokenAuthority {
    db: Arc<DatabaseConnection>,
    scopes: ScopeRegistry,
    lifetimes: TokenLifetimes,
}

impl TokenAuthority {
    pub fn new(db: Arc<DatabaseConnection>, scopes: ScopeRegistry, lifetimes: TokenLifetimes) -> Self {
        Self {
            db,
            scopes,
            lifetimes,
        }
    }

    pub fn scopes(&self) -> &ScopeRegistry {
        &self.scopes
    }

    pub fn lifetimes(&self) -> TokenLifetimes {
        self.lifetimes
    }

    // =========================================================================
    // Authorization codes
    // =========================================================================

    /// Issue a single-use authorization code for an approved request.
    ///
    /// The requested scope is resolved against the catalogue (empty means
    /// the default set).
    #[tracing::instrument(skip(self, client, user), fields(client_id = %client.id, user_id = %user.id))]
    pub async fn issue_authorization_code(
        &self,
        client: &oauth2_client::Model,
        user: &oauth2_user::Model,
        scope: &str,
        redirect_uri: &str,
    ) -> Result<oauth2_authorization_code::Model> {
        if redirect_uri.is_empty() {
            return Err(OAuth2Error::InvalidRequest("redirect_uri is required"));
        }
        let scope = self.scopes.resolve(scope)?;

        let now = OffsetDateTime::now_utc();
        let code = oauth2_authorization_code::ActiveModel {
            code: Set(generate_token()?),
            client_id: Set(client.id.clone()),
            user_id: Set(user.id.clone()),
            redirect_uri: Set(redirect_uri.to_string()),
            scope: Set(scope),
            expires_at: Set(now + self.lifetimes.authorization_code),
            created_at: Set(now),
        };

        let code = code.insert(self.db.as_ref()).await?;
        tracing::debug!(scope = %code.scope, "Issued authorization code");
        Ok(code)
    }

    /// Exchange an authorization code for an access/refresh pair.
    ///
    /// Deleting the code and minting the pair commit together; of several
    /// concurrent redemptions of one code at most one succeeds. An expired
    /// code is deleted on touch. Mismatches leave the code in place.
    #[tracing::instrument(skip(self, code, client), fields(client_id = %client.id))]
    pub async fn redeem_authorization_code(
        &self,
        code: &str,
        client: &oauth2_client::Model,
        redirect_uri: &str,
    ) -> Result<TokenPair> {
        let txn = self.db.begin().await?;

        let auth = oauth2_authorization_code::Entity::find_by_id(code)
            .one(&txn)
            .await?
            .ok_or(OAuth2Error::CodeNotFound)?;

        let now = OffsetDateTime::now_utc();
        if auth.is_expired_at(now) {
            oauth2_authorization_code::Entity::delete_by_id(code)
                .exec(&txn)
                .await?;
            txn.commit().await?;
            tracing::warn!("Authorization code expired");
            return Err(OAuth2Error::CodeExpired);
        }

        if auth.client_id != client.id {
            tracing::warn!(issued_to = %auth.client_id, "Authorization code presented by another client");
            return Err(OAuth2Error::ClientMismatch);
        }

        if auth.redirect_uri != redirect_uri {
            return Err(OAuth2Error::RedirectMismatch);
        }

        let consumed = oauth2_authorization_code::Entity::delete_by_id(code)
            .exec(&txn)
            .await?
            .rows_affected;
        if consumed == 0 {
            tracing::warn!("Authorization code already redeemed");
            return Err(OAuth2Error::CodeNotFound);
        }

        let pair = self
            .mint_pair(&txn, &client.id, Some(auth.user_id.as_str()), &auth.scope, now)
            .await?;
        txn.commit().await?;

        tracing::info!(user_id = %auth.user_id, scope = %auth.scope, "Authorization code redeemed");
        Ok(pair)
    }

    // =========================================================================
    // Access and refresh tokens
    // =========================================================================

    /// Issue an access token. `user` is None for client credentials grants.
    #[tracing::instrument(skip(self, client, user), fields(client_id = %client.id))]
    pub async fn issue_access_token(
        &self,
        client: &oauth2_client::Model,
        user: Option<&oauth2_user::Model>,
        scope: &str,
    ) -> Result<oauth2_access_token::Model> {
        let scope = self.scopes.resolve(scope)?;
        self.insert_access_token(
            self.db.as_ref(),
            &client.id,
            user.map(|u| u.id.as_str()),
            &scope,
            OffsetDateTime::now_utc(),
        )
        .await
    }

    /// Issue a refresh token paired with an already-issued access token.
    #[tracing::instrument(skip(self, client, user, paired), fields(client_id = %client.id))]
    pub async fn issue_refresh_token(
        &self,
        client: &oauth2_client::Model,
        user: Option<&oauth2_user::Model>,
        scope: &str,
        paired: &oauth2_access_token::Model,
    ) -> Result<oauth2_refresh_token::Model> {
        let scope = self.scopes.resolve(scope)?;
        insert_refresh_token(
            self.db.as_ref(),
            &client.id,
            user.map(|u| u.id.as_str()),
            Some(&paired.token),
            &scope,
            OffsetDateTime::now_utc() + self.lifetimes.refresh_token,
        )
        .await
    }

    /// Issue an access token and its refresh token in one transaction.
    #[tracing::instrument(skip(self, client, user), fields(client_id = %client.id))]
    pub async fn issue_token_pair(
        &self,
        client: &oauth2_client::Model,
        user: Option<&oauth2_user::Model>,
        scope: &str,
    ) -> Result<TokenPair> {
        let scope = self.scopes.resolve(scope)?;
        let txn = self.db.begin().await?;
        let pair = self
            .mint_pair(
                &txn,
                &client.id,
                user.map(|u| u.id.as_str()),
                &scope,
                OffsetDateTime::now_utc(),
            )
            .await?;
        txn.commit().await?;
        Ok(pair)
    }

    /// Look up an access token and check it has not expired.
    #[tracing::instrument(skip(self, token))]
    pub async fn validate_access_token(&self, token: &str) -> Result<oauth2_access_token::Model> {
        let access = oauth2_access_token::Entity::find_by_id(token)
            .one(self.db.as_ref())
            .await?
            .ok_or(OAuth2Error::TokenNotFound)?;

        if access.is_expired() {
            return Err(OAuth2Error::TokenExpired);
        }
        Ok(access)
    }

    /// Exchange a refresh token for a fresh pair.
    ///
    /// The old refresh token and its paired access token are deleted in the
    /// same transaction that mints the new pair. `requested_scope` may narrow
    /// the scope; it can never widen it.
    #[tracing::instrument(skip(self, token, client), fields(client_id = %client.id))]
    pub async fn rotate_refresh_token(
        &self,
        token: &str,
        client: &oauth2_client::Model,
        requested_scope: Option<&str>,
    ) -> Result<TokenPair> {
        let txn = self.db.begin().await?;

        let old = oauth2_refresh_token::Entity::find_by_id(token)
            .one(&txn)
            .await?
            .ok_or(OAuth2Error::TokenNotFound)?;

        let now = OffsetDateTime::now_utc();
        if old.is_expired_at(now) {
            delete_refresh_with_pair(&txn, &old).await?;
            txn.commit().await?;
            return Err(OAuth2Error::TokenExpired);
        }

        if old.client_id != client.id {
            tracing::warn!(issued_to = %old.client_id, "Refresh token presented by another client");
            return Err(OAuth2Error::ClientMismatch);
        }

        let scope = match requested_scope.filter(|s| !s.trim().is_empty()) {
            Some(requested) => {
                let requested = self.scopes.resolve(requested)?;
                if !ScopeRegistry::is_subset(&requested, &old.scope) {
                    return Err(OAuth2Error::InvalidScope(requested));
                }
                requested
            }
            None => old.scope.clone(),
        };

        if delete_refresh_with_pair(&txn, &old).await? == 0 {
            tracing::warn!("Refresh token already rotated");
            return Err(OAuth2Error::TokenNotFound);
        }

        let pair = self
            .mint_pair(&txn, &client.id, old.user_id.as_deref(), &scope, now)
            .await?;
        txn.commit().await?;

        tracing::info!(scope = %scope, "Refresh token rotated");
        Ok(pair)
    }

    // =========================================================================
    // Revocation
    // =========================================================================

    /// Revoke an access token or a refresh token by value.
    ///
    /// Revoking a refresh token also revokes its paired access token.
    /// Returns whether anything was revoked.
    #[tracing::instrument(skip(self, token))]
    pub async fn revoke_token(&self, token: &str) -> Result<bool> {
        self.revoke(token, None).await
    }

    /// Like [`revoke_token`](Self::revoke_token), but only touches tokens
    /// issued to `client`.
    #[tracing::instrument(skip(self, token, client), fields(client_id = %client.id))]
    pub async fn revoke_client_token(
        &self,
        token: &str,
        client: &oauth2_client::Model,
    ) -> Result<bool> {
        self.revoke(token, Some(&client.id)).await
    }

    async fn revoke(&self, token: &str, client_id: Option<&str>) -> Result<bool> {
        let txn = self.db.begin().await?;

        let mut access = oauth2_access_token::Entity::delete_many()
            .filter(oauth2_access_token::Column::Token.eq(token));
        let mut refresh = oauth2_refresh_token::Entity::find_by_id(token);
        if let Some(client_id) = client_id {
            access = access.filter(oauth2_access_token::Column::ClientId.eq(client_id));
            refresh = refresh.filter(oauth2_refresh_token::Column::ClientId.eq(client_id));
        }

        let mut revoked = access.exec(&txn).await?.rows_affected;
        if let Some(refresh) = refresh.one(&txn).await? {
            revoked += delete_refresh_with_pair(&txn, &refresh).await?;
        }

        txn.commit().await?;
        tracing::debug!(revoked, "Token revocation processed");
        Ok(revoked > 0)
    }

    /// Revoke every code and token held on behalf of a user.
    #[tracing::instrument(skip(self))]
    pub async fn revoke_all_for_user(&self, user_id: &str) -> Result<RevocationCounts> {
        let txn = self.db.begin().await?;
        let counts = Self::revoke_all_for_user_on(&txn, user_id).await?;
        txn.commit().await?;
        tracing::info!(total = counts.total(), "Revoked all credentials for user");
        Ok(counts)
    }

    pub(crate) async fn revoke_all_for_user_on<C: ConnectionTrait>(
        conn: &C,
        user_id: &str,
    ) -> Result<RevocationCounts> {
        Ok(RevocationCounts {
            refresh_tokens: oauth2_refresh_token::Entity::delete_many()
                .filter(oauth2_refresh_token::Column::UserId.eq(user_id))
                .exec(conn)
                .await?
                .rows_affected,
            access_tokens: oauth2_access_token::Entity::delete_many()
                .filter(oauth2_access_token::Column::UserId.eq(user_id))
                .exec(conn)
                .await?
                .rows_affected,
            authorization_codes: oauth2_authorization_code::Entity::delete_many()
                .filter(oauth2_authorization_code::Column::UserId.eq(user_id))
                .exec(conn)
                .await?
                .rows_affected,
        })
    }

    /// Revoke every code and token issued to a client.
    #[tracing::instrument(skip(self))]
    pub async fn revoke_all_for_client(&self, client_id: &str) -> Result<RevocationCounts> {
        let txn = self.db.begin().await?;
        let counts = RevocationCounts {
            refresh_tokens: oauth2_refresh_token::Entity::delete_many()
                .filter(oauth2_refresh_token::Column::ClientId.eq(client_id))
                .exec(&txn)
                .await?
                .rows_affected,
            access_tokens: oauth2_access_token::Entity::delete_many()
                .filter(oauth2_access_token::Column::ClientId.eq(client_id))
                .exec(&txn)
                .await?
                .rows_affected,
            authorization_codes: oauth2_authorization_code::Entity::delete_many()
                .filter(oauth2_authorization_code::Column::ClientId.eq(client_id))
                .exec(&txn)
                .await?
                .rows_affected,
        };
        txn.commit().await?;
        tracing::info!(total = counts.total(), "Revoked all credentials for client");
        Ok(counts)
    }

    /// Delete every expired code and token. Storage hygiene only: lookups
    /// already treat expired rows as invalid.
    #[tracing::instrument(skip(self))]
    pub async fn purge_expired(&self) -> Result<RevocationCounts> {
        let now = OffsetDateTime::now_utc();
        let db = self.db.as_ref();
        Ok(RevocationCounts {
            authorization_codes: oauth2_authorization_code::Entity::delete_many()
                .filter(oauth2_authorization_code::Column::ExpiresAt.lte(now))
                .exec(db)
                .await?
                .rows_affected,
            refresh_tokens: oauth2_refresh_token::Entity::delete_many()
                .filter(oauth2_refresh_token::Column::ExpiresAt.lte(now))
                .exec(db)
                .await?
                .rows_affected,
            access_tokens: oauth2_access_token::Entity::delete_many()
                .filter(oauth2_access_token::Column::ExpiresAt.lte(now))
                .exec(db)
                .await?
                .rows_affected,
        })
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn mint_pair<C: ConnectionTrait>(
        &self,
        conn: &C,
        client_id: &str,
        user_id: Option<&str>,
        scope: &str,
        now: OffsetDateTime,
    ) -> Result<TokenPair> {
        let access_token = self
            .insert_access_token(conn, client_id, user_id, scope, now)
            .await?;
        let refresh_token = insert_refresh_token(
            conn,
            client_id,
            user_id,
            Some(&access_token.token),
            scope,
            now + self.lifetimes.refresh_token,
        )
        .await?;
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Insert an access token, first clearing this client/user's expired
    /// ones.
    async fn insert_access_token<C: ConnectionTrait>(
        &self,
        conn: &C,
        client_id: &str,
        user_id: Option<&str>,
        scope: &str,
        now: OffsetDateTime,
    ) -> Result<oauth2_access_token::Model> {
        let owner = match user_id {
            Some(id) => oauth2_access_token::Column::UserId.eq(id),
            None => oauth2_access_token::Column::UserId.is_null(),
        };
        oauth2_access_token::Entity::delete_many()
            .filter(oauth2_access_token::Column::ClientId.eq(client_id))
            .filter(owner)
            .filter(oauth2_access_token::Column::ExpiresAt.lte(now))
            .exec(conn)
            .await?;

        let token = oauth2_access_token::ActiveModel {
            token: Set(generate_token()?),
            client_id: Set(client_id.to_string()),
            user_id: Set(user_id.map(String::from)),
            scope: Set(scope.to_string()),
            expires_at: Set(now + self.lifetimes.access_token),
            created_at: Set(now),
        };
        Ok(token.insert(conn).await?)
    }
}

async fn insert_refresh_token<C: ConnectionTrait>(
    conn: &C,
    client_id: &str,
    user_id: Option<&str>,
    access_token: Option<&str>,
    scope: &str,
    expires_at: OffsetDateTime,
) -> Result<oauth2_refresh_token::Model> {
    let token = oauth2_refresh_token::ActiveModel {
        token: Set(generate_token()?),
        client_id: Set(client_id.to_string()),
        user_id: Set(user_id.map(String::from)),
        access_token: Set(access_token.map(String::from)),
        scope: Set(scope.to_string()),
        expires_at: Set(expires_at),
        created_at: Set(OffsetDateTime::now_utc()),
    };
    Ok(token.insert(conn).await?)
}

/// Delete a refresh token and its paired access token.
///
/// Returns the number of refresh token rows removed (0 if another caller
/// got there first).
async fn delete_refresh_with_pair<C: ConnectionTrait>(
    conn: &C,
    refresh: &oauth2_refresh_token::Model,
) -> Result<u64> {
    let deleted = oauth2_refresh_token::Entity::delete_by_id(refresh.token.as_str())
        .exec(conn)
        .await?
        .rows_affected;
    if let Some(access) = refresh.access_token.as_deref() {
        oauth2_access_token::Entity::delete_by_id(access)
            .exec(conn)
            .await?;
    }
    Ok(deleted)
}
