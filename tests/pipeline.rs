//! End-to-end pipeline tests over the in-memory store, a scripted
//! provider, and a real cache database in a temporary directory

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use stormwatch::cache::{CacheKind, ObservationCache};
use stormwatch::config::CacheConfig;
use stormwatch::generator::AlertGenerator;
use stormwatch::hub::NotificationHub;
use stormwatch::models::{ForecastBundle, Location, Observation, SeverityLevel, WeatherCondition};
use stormwatch::scheduler::{run_bulk_poll, run_retention_cleanup};
use stormwatch::store::{ActiveOrder, AlertStore, MemoryStore, UserAlertQuery};
use stormwatch::weather::WeatherProvider;
use stormwatch::{Result, StormwatchError};
use tempfile::TempDir;

fn observation(condition: WeatherCondition, wind_speed: f64) -> Observation {
    Observation {
        temperature: 70.0,
        feels_like: 68.0,
        humidity: 50,
        pressure: 1013.0,
        wind_speed,
        wind_direction: 180,
        visibility_miles: 10.0,
        cloud_cover_pct: 20,
        condition,
        description: condition.as_str().to_string(),
        icon: "10d".to_string(),
        fetched_at: Utc::now(),
    }
}

/// Provider with scripted answers per 2-decimal location and a call counter
struct ScriptedProvider {
    answers: HashMap<String, Observation>,
    current_calls: AtomicUsize,
}

impl ScriptedProvider {
    fn new(entries: Vec<(f64, f64, Observation)>) -> Self {
        let answers = entries
            .into_iter()
            .map(|(lat, lon, obs)| (format!("{lat:.2}:{lon:.2}"), obs))
            .collect();
        Self {
            answers,
            current_calls: AtomicUsize::new(0),
        }
    }

    fn current_calls(&self) -> usize {
        self.current_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl WeatherProvider for ScriptedProvider {
    async fn fetch_current(&self, lat: f64, lon: f64) -> Result<Observation> {
        self.current_calls.fetch_add(1, Ordering::Relaxed);
        self.answers
            .get(&format!("{lat:.2}:{lon:.2}"))
            .cloned()
            .ok_or_else(|| StormwatchError::provider("scripted location unavailable"))
    }

    async fn fetch_forecast(&self, _lat: f64, _lon: f64, _hours: u32) -> Result<ForecastBundle> {
        Ok(ForecastBundle::default())
    }
}

struct Pipeline {
    generator: Arc<AlertGenerator>,
    provider: Arc<ScriptedProvider>,
    cache: Arc<ObservationCache>,
    store: Arc<MemoryStore>,
    hub: Arc<NotificationHub>,
    _dir: TempDir,
}

fn pipeline(entries: Vec<(f64, f64, Observation)>) -> Pipeline {
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
    Pipeline {
        generator,
        provider,
        cache,
        store,
        hub,
        _dir: dir,
    }
}

#[tokio::test]
async fn bulk_poll_hits_cache_before_the_provider() {
    let locations = [(40.71, -74.01), (34.05, -118.24), (41.88, -87.63)];
    let px = pipeline(
        locations
            .iter()
            .map(|(lat, lon)| (*lat, *lon, observation(WeatherCondition::Clear, 5.0)))
            .collect(),
    );

    for (i, (lat, lon)) in locations.iter().enumerate() {
        px.store
            .add_order(ActiveOrder {
                id: format!("o{i}"),
                customer_id: format!("c{i}"),
                provider_id: None,
                destination: Location::new(*lat, *lon),
            })
            .await;
    }

    // Warm the cache for the second location only
    px.cache
        .put(
            CacheKind::Current,
            34.05,
            -118.24,
            observation(WeatherCondition::Clear, 5.0),
        )
        .await;

    let refreshed = run_bulk_poll(
        &px.generator,
        px.store.as_ref(),
        px.store.as_ref(),
        100,
        Duration::ZERO,
    )
    .await;

    assert_eq!(refreshed, 3);
    // One lookup per location; the warm location never reaches the provider
    assert_eq!(px.cache.stats().lookups, 3);
    assert_eq!(px.cache.stats().hits, 1);
    assert_eq!(px.provider.current_calls(), 2);
}

#[tokio::test]
async fn benign_conditions_create_no_alert() {
    let px = pipeline(vec![(40.71, -74.01, observation(WeatherCondition::Clear, 5.0))]);

    let alert = px
        .generator
        .check_and_generate("u1", 40.71, -74.01, None)
        .await
        .unwrap();
    assert!(alert.is_none());
    assert_eq!(px.store.alert_count().await, 0);
}

#[tokio::test]
async fn alert_flows_from_observation_to_delivery() {
    // Rain with 30 mph wind classifies as an advisory
    let px = pipeline(vec![(40.71, -74.01, observation(WeatherCondition::Rain, 30.0))]);

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let conn = px.hub.register(tx);
    px.hub.identify(conn, "u1");
    assert_eq!(rx.try_recv().unwrap().event, "identified");

    let alert = px
        .generator
        .check_and_generate("u1", 40.71, -74.01, Some("Central Park"))
        .await
        .unwrap()
        .expect("advisory conditions should alert");

    assert_eq!(alert.severity, SeverityLevel::Advisory);
    assert_eq!(alert.location.place_name.as_deref(), Some("Central Park"));
    assert!(alert.description.contains("Wind: 30 mph"));
    assert!(alert.delivered_at.is_some());

    let pushed = rx.try_recv().unwrap();
    assert_eq!(pushed.event, "weather_alert");
    assert_eq!(pushed.payload["severity"], "advisory");

    let stored = px.store.get_alert(&alert.id).await.unwrap().unwrap();
    assert!(stored.delivered_at.is_some());
    assert!(stored.acknowledged_at.is_none());
}

#[tokio::test]
async fn repeated_checks_inside_the_window_stay_deduplicated() {
    let px = pipeline(vec![(40.71, -74.01, observation(WeatherCondition::Rain, 30.0))]);

    let first = px
        .generator
        .check_and_generate("u1", 40.71, -74.01, None)
        .await
        .unwrap()
        .unwrap();
    let second = px
        .generator
        .check_and_generate("u1", 40.71, -74.01, None)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(px.store.alert_count().await, 1);

    // A different user at the same location still gets their own alert
    let other = px
        .generator
        .check_and_generate("u2", 40.71, -74.01, None)
        .await
        .unwrap()
        .unwrap();
    assert_ne!(other.id, first.id);
    assert_eq!(px.store.alert_count().await, 2);
}

#[tokio::test]
async fn acknowledgement_is_a_single_transition() {
    let px = pipeline(vec![(40.71, -74.01, observation(WeatherCondition::Rain, 30.0))]);
    let alert = px
        .generator
        .check_and_generate("u1", 40.71, -74.01, None)
        .await
        .unwrap()
        .unwrap();

    assert!(px.generator.acknowledge(&alert.id, "u1").await.unwrap());
    let acknowledged_at = px
        .store
        .get_alert(&alert.id)
        .await
        .unwrap()
        .unwrap()
        .acknowledged_at
        .unwrap();

    // Second acknowledgement is a benign no-op
    assert!(!px.generator.acknowledge(&alert.id, "u1").await.unwrap());
    let unchanged = px
        .store
        .get_alert(&alert.id)
        .await
        .unwrap()
        .unwrap()
        .acknowledged_at
        .unwrap();
    assert_eq!(acknowledged_at, unchanged);

    // Unknown ids are benign too
    assert!(!px.generator.acknowledge("missing", "u1").await.unwrap());
}

#[tokio::test]
async fn acknowledged_alerts_stop_suppressing_duplicates() {
    let px = pipeline(vec![(40.71, -74.01, observation(WeatherCondition::Rain, 30.0))]);

    let first = px
        .generator
        .check_and_generate("u1", 40.71, -74.01, None)
        .await
        .unwrap()
        .unwrap();
    px.generator.acknowledge(&first.id, "u1").await.unwrap();

    let second = px
        .generator
        .check_and_generate("u1", 40.71, -74.01, None)
        .await
        .unwrap()
        .unwrap();
    assert_ne!(second.id, first.id);
}

#[tokio::test]
async fn feedback_overwrites_on_resubmission() {
    let px = pipeline(vec![(40.71, -74.01, observation(WeatherCondition::Rain, 30.0))]);
    let alert = px
        .generator
        .check_and_generate("u1", 40.71, -74.01, None)
        .await
        .unwrap()
        .unwrap();

    assert!(px
        .generator
        .submit_feedback(&alert.id, "u1", 2, Some("too noisy".to_string()))
        .await
        .unwrap());
    assert!(px
        .generator
        .submit_feedback(&alert.id, "u1", 5, None)
        .await
        .unwrap());

    let stored = px.store.get_alert(&alert.id).await.unwrap().unwrap();
    assert_eq!(stored.feedback_rating, Some(5));
    assert_eq!(stored.feedback_text, None);

    let invalid = px.generator.submit_feedback(&alert.id, "u1", 6, None).await;
    assert!(matches!(invalid, Err(StormwatchError::Validation { .. })));
}

#[tokio::test]
async fn area_broadcast_respects_the_radius() {
    let px = pipeline(vec![]);

    let (near_tx, mut near_rx) = tokio::sync::mpsc::unbounded_channel();
    let near = px.hub.register(near_tx);
    px.hub.subscribe_location(near, 40.72, -74.00);

    let (far_tx, mut far_rx) = tokio::sync::mpsc::unbounded_channel();
    let far = px.hub.register(far_tx);
    px.hub.subscribe_location(far, 34.05, -118.24);

    let notified = px
        .generator
        .broadcast_area_alert(
            40.71,
            -74.01,
            10.0,
            SeverityLevel::Emergency,
            "🚨 EMERGENCY: Severe Weather",
            "Dangerous tornado conditions detected. Seek shelter immediately.",
        )
        .await
        .unwrap();

    assert_eq!(notified, 1);
    assert_eq!(near_rx.try_recv().unwrap().event, "weather_alert");
    assert!(far_rx.try_recv().is_err());
}

#[tokio::test]
async fn user_alert_listing_supports_acknowledged_filter() {
    let px = pipeline(vec![(40.71, -74.01, observation(WeatherCondition::Rain, 30.0))]);
    let alert = px
        .generator
        .check_and_generate("u1", 40.71, -74.01, None)
        .await
        .unwrap()
        .unwrap();
    px.generator.acknowledge(&alert.id, "u1").await.unwrap();

    let acknowledged = px
        .generator
        .get_user_alerts(
            "u1",
            UserAlertQuery {
                acknowledged: Some(true),
                ..UserAlertQuery::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(acknowledged.len(), 1);

    let open = px
        .generator
        .get_user_alerts(
            "u1",
            UserAlertQuery {
                acknowledged: Some(false),
                ..UserAlertQuery::default()
            },
        )
        .await
        .unwrap();
    assert!(open.is_empty());
}

#[tokio::test]
async fn retention_pass_runs_against_the_store() {
    let px = pipeline(vec![(40.71, -74.01, observation(WeatherCondition::Rain, 30.0))]);
    px.generator
        .check_and_generate("u1", 40.71, -74.01, None)
        .await
        .unwrap();

    // Nothing is old enough to reap yet
    assert_eq!(run_retention_cleanup(px.store.as_ref(), 30).await, 0);
    assert_eq!(px.store.alert_count().await, 1);
}
