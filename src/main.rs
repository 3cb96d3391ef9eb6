use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cinematch_api::{
    config::Config,
    db::{create_redis_client, Cache},
    routes::{create_router, AppState},
    services::{CatalogSource, TmdbCatalog},
};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        tracing::error!(error = %e, "Fatal error");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let redis_client =
        create_redis_client(&config.redis_url).context("Failed to create Redis client")?;
    let (cache, cache_writer) = Cache::new(redis_client);

    let catalog: Arc<dyn CatalogSource> = Arc::new(TmdbCatalog::new(
        cache,
        config.tmdb_api_key.clone(),
        config.tmdb_api_url.clone(),
        config.watch_region.clone(),
        config.language.clone(),
    ));

    let settings = config.queue_settings();
    tracing::info!(
        catalog = catalog.name(),
        region = %config.watch_region,
        low_water_mark = settings.low_water_mark,
        target_batch_size = settings.target_batch_size,
        max_pages_per_refill = settings.max_pages_per_refill,
        page_timeout = ?settings.page_timeout,
        "Catalog configured"
    );

    let state = Arc::new(AppState::new(catalog, settings));
    spawn_session_sweeper(Arc::clone(&state), config.session_idle_timeout());
    let app = create_router(state);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    tracing::info!(address = %address, "Server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    cache_writer.shutdown().await;
    tracing::info!("Server stopped");
    Ok(())
}

/// Periodically drops sessions nobody has touched within `max_idle`
fn spawn_session_sweeper(state: Arc<AppState>, max_idle: Duration) {
    let period = (max_idle / 4).max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            state.evict_idle(max_idle).await;
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
