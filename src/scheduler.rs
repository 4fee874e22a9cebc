//! Periodic task scheduling
//!
//! Four independently ticking tasks: bulk polling, active-order
//! monitoring, severe weather sweep, and retention cleanup. Each task owns
//! its cadence and batch bound, catches its own per-item errors, and never
//! blocks another - a failure at one location or order is logged and the
//! batch continues. A task never overlaps itself: the next interval tick
//! is awaited only after the previous tick body returns.
//!
//! Tick bodies are free functions over the component set so tests can
//! drive a single tick directly without standing up the timers.

use crate::cache::{CacheKind, ObservationCache};
use crate::config::SchedulerConfig;
use crate::generator::AlertGenerator;
use crate::models::SeverityLevel;
use crate::severity;
use crate::store::{AlertStore, OrderDirectory};
use crate::weather::WeatherProvider;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{debug, error, info, warn};

/// Owns the scheduled task set and its configuration
pub struct Scheduler {
    config: SchedulerConfig,
    generator: Arc<AlertGenerator>,
    provider: Arc<dyn WeatherProvider>,
    cache: Arc<ObservationCache>,
    alerts: Arc<dyn AlertStore>,
    orders: Arc<dyn OrderDirectory>,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        generator: Arc<AlertGenerator>,
        provider: Arc<dyn WeatherProvider>,
        cache: Arc<ObservationCache>,
        alerts: Arc<dyn AlertStore>,
        orders: Arc<dyn OrderDirectory>,
    ) -> Self {
        Self {
            config,
            generator,
            provider,
            cache,
            alerts,
            orders,
        }
    }

    /// Spawn the four periodic tasks and return their handles
    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(4);

        // Task 1: bulk weather polling
        let poll_generator = self.generator.clone();
        let poll_alerts = self.alerts.clone();
        let poll_orders = self.orders.clone();
        let poll_config = self.config.clone();
        handles.push(tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(poll_config.poll_interval_secs));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let polled = run_bulk_poll(
                    &poll_generator,
                    poll_alerts.as_ref(),
                    poll_orders.as_ref(),
                    poll_config.poll_batch_limit,
                    Duration::from_millis(poll_config.poll_delay_ms),
                )
                .await;
                info!("Bulk poll refreshed {} locations", polled);
            }
        }));

        // Task 2: active-order monitoring
        let monitor_generator = self.generator.clone();
        let monitor_orders = self.orders.clone();
        let monitor_config = self.config.clone();
        handles.push(tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(monitor_config.monitor_interval_secs));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let checked = run_order_monitor(
                    &monitor_generator,
                    monitor_orders.as_ref(),
                    monitor_config.monitor_order_limit,
                )
                .await;
                debug!("Order monitor checked {} parties", checked);
            }
        }));

        // Task 3: severe weather sweep
        let sweep_generator = self.generator.clone();
        let sweep_provider = self.provider.clone();
        let sweep_cache = self.cache.clone();
        let sweep_orders = self.orders.clone();
        let sweep_config = self.config.clone();
        handles.push(tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(sweep_config.sweep_interval_secs));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let broadcasts = run_severe_sweep(
                    &sweep_generator,
                    sweep_provider.as_ref(),
                    &sweep_cache,
                    sweep_orders.as_ref(),
                    sweep_config.sweep_location_limit,
                    sweep_config.broadcast_radius_km,
                )
                .await;
                if broadcasts > 0 {
                    warn!("Severe sweep issued {} emergency broadcasts", broadcasts);
                }
            }
        }));

        // Task 4: retention cleanup
        let cleanup_alerts = self.alerts.clone();
        let cleanup_config = self.config.clone();
        handles.push(tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(cleanup_config.cleanup_interval_secs));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed =
                    run_retention_cleanup(cleanup_alerts.as_ref(), cleanup_config.retention_days)
                        .await;
                info!("Retention cleanup removed {} alerts", removed);
            }
        }));

        handles
    }
}

/// One bulk poll tick: refresh weather for the distinct active location
/// set, sequentially, with a fixed inter-call delay to respect provider
/// rate limits. Returns the number of locations refreshed.
pub async fn run_bulk_poll(
    generator: &AlertGenerator,
    alerts: &dyn AlertStore,
    orders: &dyn OrderDirectory,
    batch_limit: usize,
    inter_call_delay: Duration,
) -> usize {
    let mut locations = match orders.active_locations(batch_limit).await {
        Ok(keys) => keys,
        Err(e) => {
            error!("Bulk poll could not load active locations: {}", e);
            return 0;
        }
    };

    // Locations with recent alert activity stay warm too
    match alerts
        .recent_alert_locations(ChronoDuration::hours(1), batch_limit)
        .await
    {
        Ok(recent) => {
            for key in recent {
                if !locations.contains(&key) {
                    locations.push(key);
                }
            }
        }
        Err(e) => warn!("Bulk poll could not load recent alert locations: {}", e),
    }
    locations.truncate(batch_limit);

    debug!("Polling weather for {} locations", locations.len());

    let mut refreshed = 0;
    for key in locations {
        match generator.refresh_location(key.latitude(), key.longitude()).await {
            Ok(_) => {
                refreshed += 1;
                // Sequential by design: provider-quota safety over latency
                sleep(inter_call_delay).await;
            }
            Err(e) => {
                error!("Error refreshing weather for {}: {}", key, e);
            }
        }
    }
    refreshed
}

/// One monitoring tick: check conditions at every active order's
/// destination for each interested party. Returns the number of
/// party-level checks performed.
pub async fn run_order_monitor(
    generator: &AlertGenerator,
    orders: &dyn OrderDirectory,
    order_limit: usize,
) -> usize {
    let active = match orders.active_orders(order_limit).await {
        Ok(active) => active,
        Err(e) => {
            error!("Order monitor could not load active orders: {}", e);
            return 0;
        }
    };

    let mut checked = 0;
    for order in active {
        let lat = order.destination.latitude;
        let lon = order.destination.longitude;
        let place = order.destination.place_name.as_deref();

        let mut parties = vec![order.customer_id.clone()];
        if let Some(provider_id) = &order.provider_id {
            parties.push(provider_id.clone());
        }

        for party in parties {
            match generator.check_and_generate(&party, lat, lon, place).await {
                Ok(_) => checked += 1,
                Err(e) => {
                    // One failing order never halts the batch
                    error!("Error monitoring order {} for {}: {}", order.id, party, e);
                }
            }
        }
    }
    checked
}

/// One severe sweep tick: fetch fresh conditions for the bounded location
/// set, bypassing the cache, and broadcast an area alert wherever an
/// emergency is observed. A short-lived cache marker suppresses repeat
/// broadcasts for the same location while it lives. Returns the number of
/// broadcasts issued.
pub async fn run_severe_sweep(
    generator: &AlertGenerator,
    provider: &dyn WeatherProvider,
    cache: &ObservationCache,
    orders: &dyn OrderDirectory,
    location_limit: usize,
    radius_km: f64,
) -> usize {
    let locations = match orders.active_locations(location_limit).await {
        Ok(keys) => keys,
        Err(e) => {
            error!("Severe sweep could not load locations: {}", e);
            return 0;
        }
    };

    let mut broadcasts = 0;
    for key in locations {
        let (lat, lon) = (key.latitude(), key.longitude());

        // Freshness over cache economy on this path
        let observation = match provider.fetch_current(lat, lon).await {
            Ok(observation) => observation,
            Err(e) => {
                error!("Error checking severe weather at {}: {}", key, e);
                continue;
            }
        };

        if severity::classify(&observation) != Some(SeverityLevel::Emergency) {
            continue;
        }

        if cache
            .get::<bool>(CacheKind::AreaAlerts, lat, lon)
            .await
            .is_some()
        {
            debug!("Emergency at {} already broadcast recently", key);
            continue;
        }

        let description = format!(
            "Dangerous {} conditions detected. Seek shelter immediately.",
            observation.condition
        );
        match generator
            .broadcast_area_alert(
                lat,
                lon,
                radius_km,
                SeverityLevel::Emergency,
                "🚨 EMERGENCY: Severe Weather",
                &description,
            )
            .await
        {
            Ok(_) => {
                cache.put(CacheKind::AreaAlerts, lat, lon, true).await;
                broadcasts += 1;
            }
            Err(e) => error!("Error broadcasting emergency at {}: {}", key, e),
        }
    }
    broadcasts
}

/// One retention tick: reap alerts past the horizon that are acknowledged
/// or below the severity floor. Unacknowledged Warning/Emergency alerts
/// are retained indefinitely - they represent unresolved safety signals.
pub async fn run_retention_cleanup(alerts: &dyn AlertStore, retention_days: i64) -> usize {
    match alerts
        .purge_expired(
            ChronoDuration::days(retention_days),
            SeverityLevel::Warning,
            Utc::now(),
        )
        .await
    {
        Ok(removed) => removed,
        Err(e) => {
            error!("Retention cleanup failed: {}", e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::hub::NotificationHub;
    use crate::models::{ForecastBundle, Location, Observation, WeatherCondition};
    use crate::store::{ActiveOrder, MemoryStore};
    use crate::{Result, StormwatchError};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Provider whose answers are scripted per 2-decimal location key
    struct ScriptedProvider {
        conditions: HashMap<String, WeatherCondition>,
        current_calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(entries: &[(f64, f64, WeatherCondition)]) -> Self {
            let conditions = entries
                .iter()
                .map(|(lat, lon, c)| (format!("{lat:.2}:{lon:.2}"), *c))
                .collect();
            Self {
                conditions,
                current_calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.current_calls.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl WeatherProvider for ScriptedProvider {
        async fn fetch_current(&self, lat: f64, lon: f64) -> Result<Observation> {
            self.current_calls.fetch_add(1, Ordering::Relaxed);
            let condition = self
                .conditions
                .get(&format!("{lat:.2}:{lon:.2}"))
                .copied()
                .ok_or_else(|| StormwatchError::provider("scripted location unavailable"))?;
            Ok(Observation {
                temperature: 70.0,
                feels_like: 68.0,
                humidity: 50,
                pressure: 1013.0,
                wind_speed: 10.0,
                wind_direction: 180,
                visibility_miles: 10.0,
                cloud_cover_pct: 20,
                condition,
                description: condition.as_str().to_string(),
                icon: "01d".to_string(),
                fetched_at: Utc::now(),
            })
        }

        async fn fetch_forecast(&self, _lat: f64, _lon: f64, _hours: u32) -> Result<ForecastBundle> {
            Ok(ForecastBundle::default())
        }
    }

    struct Fixture {
        generator: Arc<AlertGenerator>,
        provider: Arc<ScriptedProvider>,
        cache: Arc<ObservationCache>,
        store: Arc<MemoryStore>,
        hub: Arc<NotificationHub>,
        _dir: TempDir,
    }

    fn fixture(entries: &[(f64, f64, WeatherCondition)]) -> Fixture {
        let dir = TempDir::new().unwrap();
        let cache = Arc::new(
            ObservationCache::open(dir.path().join("cache"), &CacheConfig::default()).unwrap(),
        );
        let provider = Arc::new(ScriptedProvider::new(entries));
        let store = Arc::new(MemoryStore::new());
        let hub = Arc::new(NotificationHub::new());
        let generator = Arc::new(AlertGenerator::new(
            provider.clone(),
            cache.clone(),
            store.clone(),
            hub.clone(),
        ));
        Fixture {
            generator,
            provider,
            cache,
            store,
            hub,
            _dir: dir,
        }
    }

    async fn add_order(store: &MemoryStore, id: &str, customer: &str, provider: Option<&str>, lat: f64, lon: f64) {
        store
            .add_order(ActiveOrder {
                id: id.to_string(),
                customer_id: customer.to_string(),
                provider_id: provider.map(String::from),
                destination: Location::new(lat, lon),
            })
            .await;
    }

    #[tokio::test]
    async fn test_order_monitor_checks_both_parties() {
        let fx = fixture(&[(40.71, -74.01, WeatherCondition::Thunderstorm)]);
        add_order(&fx.store, "o1", "customer-1", Some("provider-1"), 40.71, -74.01).await;

        let checked = run_order_monitor(&fx.generator, fx.store.as_ref(), 50).await;
        assert_eq!(checked, 2);
        assert_eq!(fx.store.alert_count().await, 2);
    }

    #[tokio::test]
    async fn test_order_monitor_isolates_failures() {
        // First order's location is unscripted and fails; second succeeds
        let fx = fixture(&[(34.05, -118.24, WeatherCondition::Thunderstorm)]);
        add_order(&fx.store, "o1", "c1", None, 40.71, -74.01).await;
        add_order(&fx.store, "o2", "c2", None, 34.05, -118.24).await;

        let checked = run_order_monitor(&fx.generator, fx.store.as_ref(), 50).await;
        assert_eq!(checked, 1);
        assert_eq!(fx.store.alert_count().await, 1);
    }

    #[tokio::test]
    async fn test_order_monitor_creates_nothing_for_benign_weather() {
        let fx = fixture(&[(40.71, -74.01, WeatherCondition::Clear)]);
        add_order(&fx.store, "o1", "c1", None, 40.71, -74.01).await;

        let checked = run_order_monitor(&fx.generator, fx.store.as_ref(), 50).await;
        assert_eq!(checked, 1);
        assert_eq!(fx.store.alert_count().await, 0);
    }

    #[tokio::test]
    async fn test_severe_sweep_broadcasts_once_per_marker_window() {
        let fx = fixture(&[(40.71, -74.01, WeatherCondition::Tornado)]);
        add_order(&fx.store, "o1", "c1", None, 40.71, -74.01).await;

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let conn = fx.hub.register(tx);
        fx.hub.subscribe_location(conn, 40.71, -74.01);

        let first = run_severe_sweep(
            &fx.generator,
            fx.provider.as_ref(),
            &fx.cache,
            fx.store.as_ref(),
            20,
            10.0,
        )
        .await;
        assert_eq!(first, 1);
        assert_eq!(rx.try_recv().unwrap().event, "weather_alert");

        // Marker is still live: no repeat broadcast, but conditions were
        // re-fetched for freshness
        let second = run_severe_sweep(
            &fx.generator,
            fx.provider.as_ref(),
            &fx.cache,
            fx.store.as_ref(),
            20,
            10.0,
        )
        .await;
        assert_eq!(second, 0);
        assert!(rx.try_recv().is_err());
        assert_eq!(fx.provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_severe_sweep_ignores_non_emergency_conditions() {
        let fx = fixture(&[(40.71, -74.01, WeatherCondition::Thunderstorm)]);
        add_order(&fx.store, "o1", "c1", None, 40.71, -74.01).await;

        let broadcasts = run_severe_sweep(
            &fx.generator,
            fx.provider.as_ref(),
            &fx.cache,
            fx.store.as_ref(),
            20,
            10.0,
        )
        .await;
        assert_eq!(broadcasts, 0);
    }

    #[tokio::test]
    async fn test_bulk_poll_respects_batch_limit() {
        let fx = fixture(&[
            (40.71, -74.01, WeatherCondition::Clear),
            (34.05, -118.24, WeatherCondition::Clear),
            (41.88, -87.63, WeatherCondition::Clear),
        ]);
        add_order(&fx.store, "o1", "c1", None, 40.71, -74.01).await;
        add_order(&fx.store, "o2", "c2", None, 34.05, -118.24).await;
        add_order(&fx.store, "o3", "c3", None, 41.88, -87.63).await;

        let refreshed = run_bulk_poll(
            &fx.generator,
            fx.store.as_ref(),
            fx.store.as_ref(),
            2,
            Duration::ZERO,
        )
        .await;
        assert_eq!(refreshed, 2);
        assert_eq!(fx.provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_retention_cleanup_reports_removed_count() {
        let fx = fixture(&[]);
        assert_eq!(run_retention_cleanup(fx.store.as_ref(), 30).await, 0);
    }
}
