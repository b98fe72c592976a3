//! Client directory tests.

mod common;

use common::{CLIENT_ID, CLIENT_SECRET, REDIRECT_URI, setup};
use oauth2_authority::{ErrorKind, OAuth2Error};

#[tokio::test]
async fn test_auth_client() {
    let fx = setup().await;
    let client = fx
        .service
        .clients()
        .auth_client(CLIENT_ID, CLIENT_SECRET)
        .await
        .expect("auth");
    assert_eq!(client.id, CLIENT_ID);
    assert_eq!(client.redirect_uri.as_deref(), Some(REDIRECT_URI));
}

#[tokio::test]
async fn test_secret_is_hashed_and_never_serialized() {
    let fx = setup().await;
    assert_ne!(fx.client.secret, CLIENT_SECRET);
    assert!(fx.client.secret.starts_with("$argon2id$"));

    let json = serde_json::to_value(&fx.client).expect("serialize");
    assert!(json.get("secret").is_none());
    assert_eq!(json["id"], CLIENT_ID);
}

#[tokio::test]
async fn test_unknown_client_and_wrong_secret_look_the_same() {
    let fx = setup().await;
    let clients = fx.service.clients();

    let missing = clients.auth_client("nope", CLIENT_SECRET).await.unwrap_err();
    let wrong = clients.auth_client(CLIENT_ID, "nope").await.unwrap_err();

    assert!(matches!(missing, OAuth2Error::ClientNotFound));
    assert!(matches!(wrong, OAuth2Error::InvalidClientSecret));
    assert_eq!(missing.to_string(), wrong.to_string());
    assert_eq!(missing.oauth_error_code(), "invalid_client");
    assert_eq!(wrong.oauth_error_code(), "invalid_client");
    assert!(missing.is_authentication_failure() && wrong.is_authentication_failure());
}

#[tokio::test]
async fn test_duplicate_client() {
    let fx = setup().await;
    let err = fx
        .service
        .register_client(CLIENT_ID, "other", "https://other.example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, OAuth2Error::DuplicateClient));
    assert_eq!(err.kind(), ErrorKind::Duplicate);
}

#[tokio::test]
async fn test_create_client_validation() {
    let fx = setup().await;
    let clients = fx.service.clients();

    assert!(matches!(
        clients.create_client("", "secret", REDIRECT_URI).await,
        Err(OAuth2Error::InvalidRequest(_))
    ));
    assert!(matches!(
        clients.create_client("c2", "", REDIRECT_URI).await,
        Err(OAuth2Error::InvalidRequest(_))
    ));

    let bare = clients
        .create_client("machine", "machine_secret", "")
        .await
        .expect("create");
    assert!(bare.redirect_uri.is_none());
}

#[tokio::test]
async fn test_find_client_by_id() {
    let fx = setup().await;
    let clients = fx.service.clients();
    assert_eq!(
        clients.find_client_by_id(CLIENT_ID).await.expect("find").id,
        CLIENT_ID
    );
    assert!(matches!(
        clients.find_client_by_id("ghost").await,
        Err(OAuth2Error::ClientNotFound)
    ));
}

#[tokio::test]
async fn test_rotate_secret() {
    let fx = setup().await;
    let clients = fx.service.clients();

    let rotated = clients
        .rotate_secret(&fx.client, "rotated_secret")
        .await
        .expect("rotate");
    assert_ne!(rotated.secret, fx.client.secret);
    assert!(rotated.updated_at >= fx.client.updated_at);

    assert!(clients.auth_client(CLIENT_ID, "rotated_secret").await.is_ok());
    assert!(matches!(
        clients.auth_client(CLIENT_ID, CLIENT_SECRET).await,
        Err(OAuth2Error::InvalidClientSecret)
    ));
    assert!(matches!(
        clients.rotate_secret(&rotated, "").await,
        Err(OAuth2Error::InvalidRequest(_))
    ));
}

#[tokio::test]
async fn test_registered_redirect_uri_check() {
    let fx = setup().await;
    assert!(fx.client.is_redirect_uri_allowed(REDIRECT_URI));
    assert!(!fx.client.is_redirect_uri_allowed("https://evil.example.com"));
}
