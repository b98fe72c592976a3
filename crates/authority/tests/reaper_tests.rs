//! Expired credential reaper tests.

mod common;

use common::{REDIRECT_URI, setup, test_config};
use oauth2_authority::config::ReaperConfig;
use oauth2_authority::entity::oauth2_authorization_code;
use oauth2_authority::oauth2::reaper::{reap_once, spawn_reaper};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait, PaginatorTrait};
use time::{Duration, OffsetDateTime};

async fn backdated_code(fx: &common::Fixture) {
    let code = fx
        .service
        .tokens()
        .issue_authorization_code(&fx.client, &fx.user, "", REDIRECT_URI)
        .await
        .expect("issue");
    let mut active: oauth2_authorization_code::ActiveModel = code.into();
    active.expires_at = Set(OffsetDateTime::now_utc() - Duration::minutes(5));
    active.update(fx.db.as_ref()).await.expect("backdate");
}

async fn code_count(fx: &common::Fixture) -> u64 {
    oauth2_authorization_code::Entity::find()
        .count(fx.db.as_ref())
        .await
        .expect("count")
}

#[tokio::test]
async fn test_reap_once_removes_expired_codes() {
    let fx = setup().await;
    backdated_code(&fx).await;
    assert_eq!(code_count(&fx).await, 1);

    reap_once(fx.service.tokens()).await;
    assert_eq!(code_count(&fx).await, 0);
}

#[tokio::test]
async fn test_disabled_reaper_does_not_spawn() {
    let fx = setup().await;
    assert!(fx.service.spawn_reaper(&test_config()).is_none());
}

#[tokio::test]
async fn test_spawned_reaper_runs() {
    let fx = setup().await;
    backdated_code(&fx).await;

    let handle = spawn_reaper(
        fx.service.tokens().clone(),
        &ReaperConfig {
            enabled: true,
            interval_secs: 1,
        },
    )
    .expect("spawned");

    // The first tick fires immediately
    for _ in 0..50 {
        if code_count(&fx).await == 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    handle.abort();
    assert_eq!(code_count(&fx).await, 0);
}
