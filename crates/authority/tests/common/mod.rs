//! Shared fixture: a fresh in-memory database seeded with the reference
//! scenario (client `test_client`, user `test@username`, scopes `read` and
//! `read_write`).

#![allow(dead_code)]

use oauth2_authority::OAuth2Service;
use oauth2_authority::config::{AppConfig, OAuth2Config, PasswordHashConfig, ReaperConfig, ScopeSeed};
use oauth2_authority::entity::{oauth2_client, oauth2_user};
use oauth2_authority::store;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

pub const CLIENT_ID: &str = "test_client";
pub const CLIENT_SECRET: &str = "test_secret";
pub const REDIRECT_URI: &str = "https://www.example.com";
pub const USERNAME: &str = "test@username";
pub const PASSWORD: &str = "test_password";

pub struct Fixture {
    pub db: Arc<DatabaseConnection>,
    pub service: OAuth2Service,
    pub client: oauth2_client::Model,
    pub user: oauth2_user::Model,
}

/// Test configuration with a cheap Argon2 cost.
pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        oauth2: OAuth2Config::default(),
        password_hashing: PasswordHashConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        },
        scopes: vec![
            ScopeSeed {
                name: "read".into(),
                is_default: true,
            },
            ScopeSeed {
                name: "read_write".into(),
                is_default: false,
            },
        ],
        reaper: ReaperConfig::default(),
    }
}

/// A migrated, empty in-memory database.
pub async fn create_test_db() -> Arc<DatabaseConnection> {
    let db = store::connect("sqlite::memory:").await.expect("connect");
    store::migrate(&db).await.expect("migrate");
    Arc::new(db)
}

/// A bootstrapped service without any clients or users.
pub async fn empty_service() -> (Arc<DatabaseConnection>, OAuth2Service) {
    let db = create_test_db().await;
    let service = OAuth2Service::bootstrap(db.clone(), &test_config())
        .await
        .expect("bootstrap");
    (db, service)
}

pub async fn setup() -> Fixture {
    let (db, service) = empty_service().await;
    let client = service
        .register_client(CLIENT_ID, CLIENT_SECRET, REDIRECT_URI)
        .await
        .expect("create client");
    let user = service
        .register_user(USERNAME, PASSWORD)
        .await
        .expect("create user");

    Fixture {
        db,
        service,
        client,
        user,
    }
}
