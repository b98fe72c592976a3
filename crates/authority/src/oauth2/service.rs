//! Service facade composing the directories and the token authority.
//!
//! This is the surface a grant-dispatching HTTP layer calls. Every grant
//! authenticates the client before touching codes or tokens.

use crate::config::AppConfig;
use crate::entity::{oauth2_access_token, oauth2_authorization_code, oauth2_client, oauth2_user};
use crate::error::{OAuth2Error, Result};
use crate::oauth2::client::ClientDirectory;
use crate::oauth2::password::SecretHasher;
use crate::oauth2::reaper;
use crate::oauth2::scope::ScopeRegistry;
use crate::oauth2::token::{RevocationCounts, TokenAuthority, TokenLifetimes, TokenPair};
use crate::oauth2::user::UserDirectory;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::task::JoinHandle;

/// Successful token endpoint response (RFC 6749 section 5.1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub scope: String,
}

impl TokenResponse {
    fn from_access(access: &oauth2_access_token::Model, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access.token.clone(),
            token_type: "Bearer".to_string(),
            expires_in: access.expires_in(OffsetDateTime::now_utc()),
            refresh_token,
            scope: access.scope.clone(),
        }
    }
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self::from_access(&pair.access_token, Some(pair.refresh_token.token))
    }
}

/// The credential and token authority, wired and ready to serve grants.
#[derive(Clone)]
pub struct OAuth2Service {
    clients: ClientDirectory,
    users: UserDirectory,
    tokens: TokenAuthority,
}

impl OAuth2Service {
    /// Wire up the components and seed the scope catalogue.
    ///
    /// The schema must already be migrated.
    #[tracing::instrument(skip_all)]
    pub async fn bootstrap(db: Arc<DatabaseConnection>, config: &AppConfig) -> Result<Self> {
        let hasher = SecretHasher::new(&config.password_hashing)?;
        let scopes = ScopeRegistry::seed(db.as_ref(), &config.scopes).await?;
        tracing::info!(
            scopes = scopes.names().count(),
            default_scope = %scopes.default_scope(),
            "OAuth2 authority ready"
        );

        Ok(Self {
            clients: ClientDirectory::new(db.clone(), hasher.clone()),
            users: UserDirectory::new(db.clone(), hasher),
            tokens: TokenAuthority::new(db, scopes, TokenLifetimes::from(&config.oauth2)),
        })
    }

    pub fn clients(&self) -> &ClientDirectory {
        &self.clients
    }

    pub fn users(&self) -> &UserDirectory {
        &self.users
    }

    pub fn tokens(&self) -> &TokenAuthority {
        &self.tokens
    }

    pub fn scopes(&self) -> &ScopeRegistry {
        self.tokens.scopes()
    }

    /// Start the expired-credential reaper if the configuration enables it.
    pub fn spawn_reaper(&self, config: &AppConfig) -> Option<JoinHandle<()>> {
        reaper::spawn_reaper(self.tokens.clone(), &config.reaper)
    }

    // =========================================================================
    // Administration
    // =========================================================================

    pub async fn register_client(
        &self,
        id: &str,
        secret: &str,
        redirect_uri: &str,
    ) -> Result<oauth2_client::Model> {
        self.clients.create_client(id, secret, redirect_uri).await
    }

    pub async fn register_user(&self, username: &str, password: &str) -> Result<oauth2_user::Model> {
        self.users.create_user(username, password).await
    }

    /// Set the password of the user with this (case-insensitive) username.
    pub async fn set_password(&self, username: &str, password: &str) -> Result<oauth2_user::Model> {
        let user = self.users.find_user_by_username(username).await?;
        self.users.set_password(&user, password).await
    }

    pub async fn delete_user(&self, user_id: &str) -> Result<RevocationCounts> {
        self.users.delete_user(user_id).await
    }

    /// Delete a client's outstanding codes and tokens.
    pub async fn revoke_client(&self, client_id: &str) -> Result<RevocationCounts> {
        self.tokens.revoke_all_for_client(client_id).await
    }

    // =========================================================================
    // Grants
    // =========================================================================

    /// Issue an authorization code for a request the user has approved.
    ///
    /// Without an explicit redirect URI the client's registered one is used.
    /// An explicit URI must equal the registered one when there is one.
    #[tracing::instrument(skip(self, redirect_uri))]
    pub async fn authorize(
        &self,
        client_id: &str,
        user_id: &str,
        scope: &str,
        redirect_uri: Option<&str>,
    ) -> Result<oauth2_authorization_code::Model> {
        let client = self.clients.find_client_by_id(client_id).await?;
        let user = self.users.find_user_by_id(user_id).await?;

        let redirect_uri = match redirect_uri.filter(|uri| !uri.is_empty()) {
            Some(uri) => {
                if client.redirect_uri.is_some() && !client.is_redirect_uri_allowed(uri) {
                    tracing::warn!("Redirect URI does not match registration");
                    return Err(OAuth2Error::RedirectMismatch);
                }
                uri.to_string()
            }
            None => client
                .redirect_uri
                .clone()
                .ok_or(OAuth2Error::InvalidRequest("redirect_uri is required"))?,
        };

        self.tokens
            .issue_authorization_code(&client, &user, scope, &redirect_uri)
            .await
    }

    /// `grant_type=authorization_code`
    #[tracing::instrument(skip(self, client_secret, code, redirect_uri))]
    pub async fn exchange_authorization_code(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse> {
        let client = self.clients.auth_client(client_id, client_secret).await?;
        let pair = self
            .tokens
            .redeem_authorization_code(code, &client, redirect_uri)
            .await?;
        Ok(pair.into())
    }

    /// `grant_type=password`
    #[tracing::instrument(skip(self, client_secret, password))]
    pub async fn password_grant(
        &self,
        client_id: &str,
        client_secret: &str,
        username: &str,
        password: &str,
        scope: &str,
    ) -> Result<TokenResponse> {
        let client = self.clients.auth_client(client_id, client_secret).await?;
        let user = self.users.auth_user(username, password).await?;
        let pair = self
            .tokens
            .issue_token_pair(&client, Some(&user), scope)
            .await?;
        Ok(pair.into())
    }

    /// `grant_type=client_credentials`. No user, no refresh token.
    #[tracing::instrument(skip(self, client_secret))]
    pub async fn client_credentials_grant(
        &self,
        client_id: &str,
        client_secret: &str,
        scope: &str,
    ) -> Result<TokenResponse> {
        let client = self.clients.auth_client(client_id, client_secret).await?;
        let access = self.tokens.issue_access_token(&client, None, scope).await?;
        Ok(TokenResponse::from_access(&access, None))
    }

    /// `grant_type=refresh_token`
    #[tracing::instrument(skip(self, client_secret, refresh_token))]
    pub async fn refresh_token_grant(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
        scope: Option<&str>,
    ) -> Result<TokenResponse> {
        let client = self.clients.auth_client(client_id, client_secret).await?;
        let pair = self
            .tokens
            .rotate_refresh_token(refresh_token, &client, scope)
            .await?;
        Ok(pair.into())
    }

    // =========================================================================
    // Resource access
    // =========================================================================

    /// Validate a bearer token and check it carries `required_scope`.
    #[tracing::instrument(skip(self, token))]
    pub async fn authorize_bearer(
        &self,
        token: &str,
        required_scope: &str,
    ) -> Result<oauth2_access_token::Model> {
        let access = self.tokens.validate_access_token(token).await?;
        if !access.has_scope(required_scope) {
            return Err(OAuth2Error::InvalidScope(required_scope.to_string()));
        }
        Ok(access)
    }

    /// Revoke a token on behalf of an authenticated client (RFC 7009).
    /// Unknown tokens, and tokens issued to other clients, are not an error.
    #[tracing::instrument(skip(self, client_secret, token))]
    pub async fn revoke(&self, client_id: &str, client_secret: &str, token: &str) -> Result<bool> {
        let client = self.clients.auth_client(client_id, client_secret).await?;
        self.tokens.revoke_client_token(token, &client).await
    }
}
