//! Background deletion of expired codes and tokens.

use crate::config::ReaperConfig;
use crate::oauth2::token::TokenAuthority;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Run one purge pass, logging the outcome. Failures are logged and
/// swallowed; the next tick tries again.
#[tracing::instrument(skip(authority))]
pub async fn reap_once(authority: &TokenAuthority) {
    match authority.purge_expired().await {
        Ok(counts) if counts.total() > 0 => tracing::info!(
            authorization_codes = counts.authorization_codes,
            access_tokens = counts.access_tokens,
            refresh_tokens = counts.refresh_tokens,
            "Purged expired credentials"
        ),
        Ok(_) => tracing::debug!("No expired credentials to purge"),
        Err(e) => tracing::warn!(error = %e, source = ?e, "Expired credential purge failed"),
    }
}

/// Spawn a background task that purges expired codes and tokens on a fixed
/// interval. Returns None when the reaper is disabled.
#[tracing::instrument(skip(authority))]
pub fn spawn_reaper(authority: TokenAuthority, config: &ReaperConfig) -> Option<JoinHandle<()>> {
    if !config.enabled || config.interval_secs == 0 {
        return None;
    }
    let period = Duration::from_secs(config.interval_secs);
    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            reap_once(&authority).await;
        }
    }))
}
