use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::{net::TcpListener, signal, sync::watch};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use energy_monitor_service::{
    api::{self, AppState},
    collector::Collector,
    config::Config,
    db,
    db::store::EnergyStore,
    reading_cache::ReadingCache,
    tuya::TuyaClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env (ignore error if file absent — env vars may be set externally)
    let _ = dotenvy::dotenv();

    // Initialise tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    // Load config
    let config = Config::from_env()?;

    // Open the store and bring the schema up to date
    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    info!("Database ready");

    let store = EnergyStore::new(pool.clone());

    // Shared in-memory cache of the latest reading
    let cache = ReadingCache::new();

    // Build shared Tuya client
    let tuya = TuyaClient::new(&config);

    // Spawn the collection loop with a stop signal for clean shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    {
        let collector = Collector::new(
            store.clone(),
            tuya.clone(),
            cache.clone(),
            config.tuya_device_id.clone(),
            Duration::from_secs(config.poll_interval_secs),
        );
        tokio::spawn(collector.run(shutdown_rx));
    }

    let state = AppState {
        store,
        tuya,
        cache,
        device_id: config.tuya_device_id.clone(),
        unit_price: config.unit_price_per_kwh,
        started_at: Instant::now(),
    };

    // Start HTTP server
    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop scheduling ticks, then flush the store
    let _ = shutdown_tx.send(true);
    pool.close().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
