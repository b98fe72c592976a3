use color_eyre::eyre::WrapErr;
use oauth2_authority::OAuth2Service;
use oauth2_authority::config::load_config_or_panic;
use oauth2_authority::store;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_standard_tracing() {
    let default_directives = "oauth2_authority=info,sea_orm=warn";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    initialize_standard_tracing();

    // Load config
    let config = load_config_or_panic();

    let db = Arc::new(
        store::connect(&config.database_url)
            .await
            .wrap_err("Failed to connect to database")?,
    );
    store::migrate(&db)
        .await
        .wrap_err("Failed to run database migrations")?;

    let service = OAuth2Service::bootstrap(db, &config)
        .await
        .wrap_err("Failed to bootstrap OAuth2 authority")?;

    let reaper = service.spawn_reaper(&config);
    tracing::info!(
        reaper = reaper.is_some(),
        access_token_lifetime = config.oauth2.access_token_lifetime,
        refresh_token_lifetime = config.oauth2.refresh_token_lifetime,
        "OAuth2 authority running"
    );

    tokio::signal::ctrl_c()
        .await
        .wrap_err("Failed to listen for shutdown signal")?;

    if let Some(reaper) = reaper {
        reaper.abort();
    }
    tracing::info!("Shutting down");
    Ok(())
}
