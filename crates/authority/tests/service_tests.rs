//! Service facade tests: grant orchestration end to end.

mod common;

use common::{CLIENT_ID, CLIENT_SECRET, PASSWORD, REDIRECT_URI, USERNAME, setup};
use oauth2_authority::OAuth2Error;
use oauth2_authority::oauth2::TokenResponse;

#[tokio::test]
async fn test_authorization_code_grant() {
    let fx = setup().await;
    let code = fx
        .service
        .authorize(CLIENT_ID, &fx.user.id, "", None)
        .await
        .expect("authorize");
    assert_eq!(code.redirect_uri, REDIRECT_URI);

    let response = fx
        .service
        .exchange_authorization_code(CLIENT_ID, CLIENT_SECRET, &code.code, REDIRECT_URI)
        .await
        .expect("exchange");
    assert_eq!(response.token_type, "Bearer");
    assert_eq!(response.scope, "read");
    assert!(response.refresh_token.is_some());
    assert!(response.expires_in > 3500 && response.expires_in <= 3600);

    let access = fx
        .service
        .authorize_bearer(&response.access_token, "read")
        .await
        .expect("bearer");
    assert_eq!(access.user_id.as_deref(), Some(fx.user.id.as_str()));
}

#[tokio::test]
async fn test_authorize_redirect_uri_rules() {
    let fx = setup().await;
    assert!(matches!(
        fx.service
            .authorize(CLIENT_ID, &fx.user.id, "", Some("https://evil.example.com"))
            .await,
        Err(OAuth2Error::RedirectMismatch)
    ));

    fx.service
        .register_client("bare", "bare_secret", "")
        .await
        .expect("create");
    assert!(matches!(
        fx.service.authorize("bare", &fx.user.id, "", None).await,
        Err(OAuth2Error::InvalidRequest(_))
    ));
    let code = fx
        .service
        .authorize("bare", &fx.user.id, "", Some("https://app.example.com/cb"))
        .await
        .expect("explicit uri");
    assert_eq!(code.redirect_uri, "https://app.example.com/cb");

    assert!(matches!(
        fx.service.authorize("ghost", &fx.user.id, "", None).await,
        Err(OAuth2Error::ClientNotFound)
    ));
    assert!(matches!(
        fx.service.authorize(CLIENT_ID, "ghost", "", None).await,
        Err(OAuth2Error::UserNotFound)
    ));
}

#[tokio::test]
async fn test_exchange_requires_client_authentication() {
    let fx = setup().await;
    let code = fx
        .service
        .authorize(CLIENT_ID, &fx.user.id, "", None)
        .await
        .expect("authorize");

    let err = fx
        .service
        .exchange_authorization_code(CLIENT_ID, "wrong", &code.code, REDIRECT_URI)
        .await
        .unwrap_err();
    assert_eq!(err.oauth_error_code(), "invalid_client");

    // The failed attempt did not consume the code
    fx.service
        .exchange_authorization_code(CLIENT_ID, CLIENT_SECRET, &code.code, REDIRECT_URI)
        .await
        .expect("exchange");
}

#[tokio::test]
async fn test_password_grant() {
    let fx = setup().await;
    let response = fx
        .service
        .password_grant(CLIENT_ID, CLIENT_SECRET, "TEST@username", PASSWORD, "read_write")
        .await
        .expect("grant");
    assert_eq!(response.scope, "read_write");
    assert!(response.refresh_token.is_some());

    let err = fx
        .service
        .password_grant(CLIENT_ID, CLIENT_SECRET, USERNAME, "wrong", "")
        .await
        .unwrap_err();
    assert_eq!(err.oauth_error_code(), "invalid_grant");
    let err = fx
        .service
        .password_grant(CLIENT_ID, CLIENT_SECRET, USERNAME, PASSWORD, "admin")
        .await
        .unwrap_err();
    assert_eq!(err.oauth_error_code(), "invalid_scope");
}

#[tokio::test]
async fn test_client_credentials_grant() {
    let fx = setup().await;
    let response = fx
        .service
        .client_credentials_grant(CLIENT_ID, CLIENT_SECRET, "")
        .await
        .expect("grant");
    assert!(response.refresh_token.is_none());
    assert_eq!(response.scope, "read");

    let access = fx
        .service
        .tokens()
        .validate_access_token(&response.access_token)
        .await
        .expect("valid");
    assert!(access.user_id.is_none());
}

#[tokio::test]
async fn test_refresh_token_grant() {
    let fx = setup().await;
    let first = fx
        .service
        .password_grant(CLIENT_ID, CLIENT_SECRET, USERNAME, PASSWORD, "read read_write")
        .await
        .expect("grant");
    let refresh = first.refresh_token.clone().expect("refresh token");

    let second = fx
        .service
        .refresh_token_grant(CLIENT_ID, CLIENT_SECRET, &refresh, Some("read"))
        .await
        .expect("refresh");
    assert_eq!(second.scope, "read");
    assert_ne!(second.access_token, first.access_token);

    assert!(matches!(
        fx.service.authorize_bearer(&first.access_token, "read").await,
        Err(OAuth2Error::TokenNotFound)
    ));
    assert!(matches!(
        fx.service
            .refresh_token_grant(CLIENT_ID, CLIENT_SECRET, &refresh, None)
            .await,
        Err(OAuth2Error::TokenNotFound)
    ));
}

#[tokio::test]
async fn test_authorize_bearer_checks_scope() {
    let fx = setup().await;
    let response = fx
        .service
        .client_credentials_grant(CLIENT_ID, CLIENT_SECRET, "read")
        .await
        .expect("grant");
    assert!(matches!(
        fx.service
            .authorize_bearer(&response.access_token, "read_write")
            .await,
        Err(OAuth2Error::InvalidScope(_))
    ));
}

#[tokio::test]
async fn test_revoke_is_bound_to_the_client() {
    let fx = setup().await;
    fx.service
        .register_client("other", "other_secret", "")
        .await
        .expect("create");
    let response = fx
        .service
        .password_grant(CLIENT_ID, CLIENT_SECRET, USERNAME, PASSWORD, "")
        .await
        .expect("grant");

    let revoked = fx
        .service
        .revoke("other", "other_secret", &response.access_token)
        .await
        .expect("revoke");
    assert!(!revoked);
    assert!(fx.service.authorize_bearer(&response.access_token, "read").await.is_ok());

    let revoked = fx
        .service
        .revoke(CLIENT_ID, CLIENT_SECRET, response.refresh_token.as_deref().expect("refresh"))
        .await
        .expect("revoke");
    assert!(revoked);
    assert!(fx.service.authorize_bearer(&response.access_token, "read").await.is_err());
}

#[tokio::test]
async fn test_revoke_client() {
    let fx = setup().await;
    let response = fx
        .service
        .client_credentials_grant(CLIENT_ID, CLIENT_SECRET, "")
        .await
        .expect("grant");
    let counts = fx.service.revoke_client(CLIENT_ID).await.expect("revoke");
    assert_eq!(counts.access_tokens, 1);
    assert!(fx.service.authorize_bearer(&response.access_token, "read").await.is_err());
}

#[test]
fn test_token_response_serialization() {
    let response = TokenResponse {
        access_token: "abc".into(),
        token_type: "Bearer".into(),
        expires_in: 3600,
        refresh_token: None,
        scope: "read".into(),
    };
    let json = serde_json::to_value(&response).expect("serialize");
    assert_eq!(
        json,
        serde_json::json!({
            "access_token": "abc",
            "token_type": "Bearer",
            "expires_in": 3600,
            "scope": "read",
        })
    );

    let with_refresh = TokenResponse {
        refresh_token: Some("def".into()),
        ..response
    };
    let json = serde_json::to_value(&with_refresh).expect("serialize");
    assert_eq!(json["refresh_token"], "def");
}
