//! Scope registry tests against the database.

mod common;

use common::{create_test_db, empty_service, test_config};
use oauth2_authority::OAuth2Error;
use oauth2_authority::config::ScopeSeed;
use oauth2_authority::entity::oauth2_scope;
use oauth2_authority::oauth2::ScopeRegistry;
use sea_orm::{EntityTrait, PaginatorTrait};

#[tokio::test]
async fn test_bootstrap_seeds_catalogue() {
    let (db, service) = empty_service().await;
    let scopes = service.scopes();

    assert_eq!(scopes.default_scope(), "read");
    assert!(scopes.scope_exists("read"));
    assert!(scopes.scope_exists("read read_write"));
    assert!(!scopes.scope_exists("admin"));
    assert!(!scopes.scope_exists("read admin"));
    assert!(!scopes.scope_exists(""));

    let rows = oauth2_scope::Entity::find().count(db.as_ref()).await.expect("count");
    assert_eq!(rows, 2);
}

#[tokio::test]
async fn test_seeding_is_idempotent() {
    let db = create_test_db().await;
    let seeds = test_config().scopes;

    ScopeRegistry::seed(db.as_ref(), &seeds).await.expect("first seed");
    let again = ScopeRegistry::seed(db.as_ref(), &seeds).await.expect("second seed");

    assert_eq!(again.names().collect::<Vec<_>>(), vec!["read", "read_write"]);
    let rows = oauth2_scope::Entity::find().count(db.as_ref()).await.expect("count");
    assert_eq!(rows, 2);
}

#[tokio::test]
async fn test_seed_adds_new_scopes_and_load_sees_them() {
    let db = create_test_db().await;
    ScopeRegistry::seed(db.as_ref(), &test_config().scopes)
        .await
        .expect("seed");

    let mut seeds = test_config().scopes;
    seeds.push(ScopeSeed {
        name: "profile".into(),
        is_default: true,
    });
    ScopeRegistry::seed(db.as_ref(), &seeds).await.expect("reseed");

    let loaded = ScopeRegistry::load(db.as_ref()).await.expect("load");
    assert_eq!(loaded.default_scope(), "profile read");
    assert!(loaded.scope_exists("profile"));
}

#[tokio::test]
async fn test_resolve_against_seeded_catalogue() {
    let (_db, service) = empty_service().await;
    let scopes = service.scopes();

    assert_eq!(scopes.resolve("").expect("default"), "read");
    assert_eq!(
        scopes.resolve("read_write read read_write").expect("dedupe"),
        "read_write read"
    );
    match scopes.resolve("read admin") {
        Err(OAuth2Error::InvalidScope(token)) => assert_eq!(token, "admin"),
        other => panic!("expected InvalidScope, got {other:?}"),
    }
}
