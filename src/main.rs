use anyhow::{Context, Result};
use std::sync::Arc;
use stormwatch::config::StormwatchConfig;
use stormwatch::generator::AlertGenerator;
use stormwatch::hub::NotificationHub;
use stormwatch::scheduler::Scheduler;
use stormwatch::store::{AlertStore, MemoryStore, OrderDirectory};
use stormwatch::weather::{OpenWeatherClient, WeatherProvider};
use stormwatch::ObservationCache;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = StormwatchConfig::from_env().context("Failed to load configuration")?;

    let cache = Arc::new(
        ObservationCache::open(&config.cache.location, &config.cache)
            .context("Failed to open observation cache")?,
    );
    // Missing provider credential fails here, at startup
    let provider: Arc<dyn WeatherProvider> = Arc::new(
        OpenWeatherClient::new(&config.provider).context("Failed to build weather client")?,
    );
    let store = Arc::new(MemoryStore::new());
    let hub = Arc::new(NotificationHub::new());

    let generator = Arc::new(AlertGenerator::new(
        provider.clone(),
        cache.clone(),
        store.clone(),
        hub.clone(),
    ));

    let alerts: Arc<dyn AlertStore> = store.clone();
    let orders: Arc<dyn OrderDirectory> = store.clone();
    let scheduler = Scheduler::new(
        config.scheduler.clone(),
        generator,
        provider,
        cache,
        alerts,
        orders,
    );
    let handles = scheduler.spawn();
    info!(
        "Stormwatch {} running with {} scheduled tasks",
        stormwatch::VERSION,
        handles.len()
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received, stopping scheduled tasks");
    for handle in &handles {
        handle.abort();
    }
    let _ = futures::future::join_all(handles).await;

    Ok(())
}
