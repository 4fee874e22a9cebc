//! Alert generation and lifecycle orchestration
//!
//! Glues the pipeline together for a single (user, location) pair: resolve
//! an observation through the cache, classify it, persist a deduplicated
//! alert, and hand it to the hub for delivery. Also hosts the lifecycle
//! entry points the CRUD layer wraps: acknowledge, feedback, per-user
//! queries, and the administrative area broadcast.

use crate::cache::{CacheKind, ObservationCache};
use crate::hub::NotificationHub;
use crate::models::{
    Alert, ForecastBundle, Location, NewAlert, Observation, SeverityLevel, WeatherReport,
    WeatherType,
};
use crate::severity;
use crate::store::{AlertStore, UserAlertQuery};
use crate::weather::WeatherProvider;
use crate::{Result, StormwatchError};
use chrono::{Duration, Utc};
use rand::RngExt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Forecast horizon requested during combined lookups
const FORECAST_HOURS: u32 = 48;

/// Default validity window for a freshly created alert
fn default_validity() -> Duration {
    Duration::hours(1)
}

/// Orchestrates classification, dedup, persistence, and delivery
pub struct AlertGenerator {
    provider: Arc<dyn WeatherProvider>,
    cache: Arc<ObservationCache>,
    store: Arc<dyn AlertStore>,
    hub: Arc<NotificationHub>,
}

impl AlertGenerator {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        cache: Arc<ObservationCache>,
        store: Arc<dyn AlertStore>,
        hub: Arc<NotificationHub>,
    ) -> Self {
        Self {
            provider,
            cache,
            store,
            hub,
        }
    }

    /// Resolve current conditions for a coordinate pair, cache-then-fetch
    pub async fn current_conditions(&self, lat: f64, lon: f64) -> Result<Observation> {
        if let Some(cached) = self.cache.get::<Observation>(CacheKind::Current, lat, lon).await {
            return Ok(cached);
        }

        let observation = self.provider.fetch_current(lat, lon).await?;
        self.cache
            .put(CacheKind::Current, lat, lon, observation.clone())
            .await;
        Ok(observation)
    }

    /// Resolve the forecast for a coordinate pair, cache-then-fetch
    pub async fn forecast(&self, lat: f64, lon: f64) -> Result<ForecastBundle> {
        if let Some(cached) = self
            .cache
            .get::<ForecastBundle>(CacheKind::Forecast, lat, lon)
            .await
        {
            return Ok(cached);
        }

        let bundle = self.provider.fetch_forecast(lat, lon, FORECAST_HOURS).await?;
        self.cache
            .put(CacheKind::Forecast, lat, lon, bundle.clone())
            .await;
        Ok(bundle)
    }

    /// Refresh current conditions for a polled location and push the
    /// result to that location's live subscribers
    pub async fn refresh_location(&self, lat: f64, lon: f64) -> Result<Observation> {
        let observation = self.current_conditions(lat, lon).await?;
        let payload = serde_json::to_value(&observation).unwrap_or(serde_json::Value::Null);
        self.hub.broadcast_weather_update(lat, lon, payload);
        Ok(observation)
    }

    /// Combined current-plus-forecast answer for the CRUD layer
    pub async fn full_weather(&self, lat: f64, lon: f64) -> Result<WeatherReport> {
        let current = self.current_conditions(lat, lon).await?;
        let forecast = self.forecast(lat, lon).await?;
        Ok(WeatherReport {
            location: Location::new(lat, lon),
            current,
            forecast,
            fetched_at: Utc::now(),
        })
    }

    /// Check conditions at a location and generate an alert for the user
    /// when the severity policy warrants one. Benign conditions return
    /// `Ok(None)` - "no alert needed" is not an error.
    #[instrument(skip(self))]
    pub async fn check_and_generate(
        &self,
        user_id: &str,
        lat: f64,
        lon: f64,
        place_name: Option<&str>,
    ) -> Result<Option<Alert>> {
        let observation = self.current_conditions(lat, lon).await?;

        let Some(level) = severity::classify(&observation) else {
            return Ok(None);
        };

        let location = match place_name {
            Some(name) => Location::with_place_name(lat, lon, name),
            None => Location::new(lat, lon),
        };

        let alert = self
            .create_alert(NewAlert {
                user_id: user_id.to_string(),
                order_id: None,
                location,
                severity: level,
                weather_type: WeatherType::from(observation.condition),
                title: None,
                description: build_description(&observation, level),
                recommendation: None,
                valid_from: None,
                valid_until: None,
            })
            .await?;

        Ok(Some(alert))
    }

    /// Persist an alert and request delivery.
    ///
    /// Idempotent against an open duplicate: when an unacknowledged alert
    /// with the same (user, rounded location, severity) fingerprint is
    /// still inside its validity window, that alert is returned unchanged
    /// and nothing new is created or delivered.
    pub async fn create_alert(&self, input: NewAlert) -> Result<Alert> {
        let now = Utc::now();
        let valid_from = input.valid_from.unwrap_or(now);
        let valid_until = input
            .valid_until
            .unwrap_or(valid_from + default_validity());
        if valid_until <= valid_from {
            return Err(StormwatchError::validation(
                "alert validity window must end after it starts",
            ));
        }

        let profile = input.severity.profile();
        let mut alert = Alert {
            id: new_alert_id(),
            user_id: input.user_id,
            order_id: input.order_id,
            location: input.location,
            severity: input.severity,
            weather_type: input.weather_type,
            title: input.title.unwrap_or_else(|| profile.title.to_string()),
            description: input.description,
            recommendation: input
                .recommendation
                .unwrap_or_else(|| profile.recommendation.to_string()),
            valid_from,
            valid_until,
            delivered_at: None,
            acknowledged_at: None,
            feedback_rating: None,
            feedback_text: None,
            created_at: now,
        };

        if let Some(existing) = self.store.find_open_alert(&alert.fingerprint(), now).await? {
            debug!(
                "Open {} alert {} already covers user {} at {}, skipping duplicate",
                existing.severity,
                existing.id,
                existing.user_id,
                existing.location.grid_key()
            );
            return Ok(existing);
        }

        self.store.insert_alert(alert.clone()).await?;
        info!(
            "Created {} alert {} for user {}",
            alert.severity, alert.id, alert.user_id
        );

        let payload = serde_json::to_value(&alert).unwrap_or(serde_json::Value::Null);
        if self.hub.notify_user(&alert.user_id, "weather_alert", payload) {
            let delivered_at = Utc::now();
            self.store.mark_delivered(&alert.id, delivered_at).await?;
            alert.delivered_at = Some(delivered_at);
        }

        Ok(alert)
    }

    /// Acknowledge an alert on behalf of its owner.
    /// Returns false for unknown ids and repeated acknowledgements - both
    /// are benign races, not failures.
    pub async fn acknowledge(&self, alert_id: &str, user_id: &str) -> Result<bool> {
        let acknowledged = self.store.acknowledge(alert_id, user_id, Utc::now()).await?;
        if acknowledged {
            info!("Alert {} acknowledged by {}", alert_id, user_id);
        }
        Ok(acknowledged)
    }

    /// Attach feedback to an alert; allowed at any lifecycle stage and
    /// overwrites prior feedback on resubmission
    pub async fn submit_feedback(
        &self,
        alert_id: &str,
        user_id: &str,
        rating: u8,
        text: Option<String>,
    ) -> Result<bool> {
        if !(1..=5).contains(&rating) {
            return Err(StormwatchError::validation("rating must be between 1 and 5"));
        }
        let recorded = self
            .store
            .set_feedback(alert_id, user_id, rating, text)
            .await?;
        if recorded {
            info!("Feedback {} recorded for alert {}", rating, alert_id);
        }
        Ok(recorded)
    }

    /// Alerts for a user, newest first
    pub async fn get_user_alerts(
        &self,
        user_id: &str,
        query: UserAlertQuery,
    ) -> Result<Vec<Alert>> {
        self.store.alerts_for_user(user_id, query).await
    }

    /// Administrative broadcast to every live subscriber within
    /// `radius_km` of the center, bypassing per-user classification.
    /// Returns the number of connections notified.
    #[instrument(skip(self, title, description))]
    pub async fn broadcast_area_alert(
        &self,
        lat: f64,
        lon: f64,
        radius_km: f64,
        level: SeverityLevel,
        title: &str,
        description: &str,
    ) -> Result<usize> {
        let now = Utc::now();
        let payload = serde_json::json!({
            "id": new_alert_id(),
            "location": { "latitude": lat, "longitude": lon },
            "severity": level,
            "weather_type": WeatherType::Other,
            "title": title,
            "description": description,
            "recommendation": level.profile().recommendation,
            "valid_from": now,
            "valid_until": now + default_validity(),
            "created_at": now,
        });

        let notified = self
            .hub
            .notify_within_radius(lat, lon, radius_km, "weather_alert", payload);
        if notified == 0 {
            warn!(
                "Area alert at {:.2},{:.2} reached no subscribers",
                lat, lon
            );
        }
        Ok(notified)
    }
}

/// Human-readable summary of the observation behind an alert
fn build_description(observation: &Observation, level: SeverityLevel) -> String {
    let mut lines = vec![
        format!("Current conditions: {}", observation.description),
        format!(
            "Temperature: {:.0}°F (feels like {:.0}°F)",
            observation.temperature, observation.feels_like
        ),
    ];

    if observation.wind_speed > 15.0 {
        lines.push(format!("Wind: {:.0} mph", observation.wind_speed));
    }
    if observation.visibility_miles < 5.0 {
        lines.push(format!(
            "Visibility: {:.1} miles",
            observation.visibility_miles
        ));
    }
    if level >= SeverityLevel::Warning {
        lines.push("Conditions may be hazardous for outdoor activities.".to_string());
    }

    lines.join(". ")
}

fn new_alert_id() -> String {
    let token: u64 = rand::rng().random_range(0..u64::MAX);
    format!("alt-{token:016x}")
}
