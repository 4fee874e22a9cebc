//! Weather provider client
//!
//! Wraps the OpenWeatherMap current-conditions and 5-day/3-hour forecast
//! endpoints behind the `WeatherProvider` trait. Requests are made in
//! imperial units and the one remaining provider-native unit (visibility
//! in meters) is converted here, so downstream consumers see a single unit
//! system. The client itself holds no state beyond the HTTP stack; caching
//! is the caller's concern.

use crate::config::ProviderConfig;
use crate::models::{ForecastBundle, Observation};
use crate::{Result, StormwatchError};
use async_trait::async_trait;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument, warn};

mod open_weather;

/// Provider seam for fetching observations and forecasts
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Fetch current conditions for a coordinate pair
    async fn fetch_current(&self, lat: f64, lon: f64) -> Result<Observation>;

    /// Fetch the hourly/daily forecast covering roughly `hours` ahead
    async fn fetch_forecast(&self, lat: f64, lon: f64, hours: u32) -> Result<ForecastBundle>;
}

/// OpenWeatherMap HTTP client with transient-failure retry
#[derive(Debug)]
pub struct OpenWeatherClient {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: String,
}

impl OpenWeatherClient {
    /// Create a new provider client
    ///
    /// Fails with a configuration error when no API key is configured -
    /// checked once here at startup, never per request.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                StormwatchError::config("OPENWEATHERMAP_API_KEY is not configured")
            })?;

        let inner = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.into()))
            .user_agent(concat!("stormwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StormwatchError::config(format!("failed to build HTTP client: {e}")))?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries);
        let client = ClientBuilder::new(inner)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, what: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| StormwatchError::provider(format!("{what} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Provider returned {} for {}", status, what);
            return Err(StormwatchError::provider(format!(
                "{what} request returned {status}"
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| StormwatchError::provider(format!("malformed {what} payload: {e}")))
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherClient {
    #[instrument(skip(self))]
    async fn fetch_current(&self, lat: f64, lon: f64) -> Result<Observation> {
        let url = format!(
            "{}/weather?lat={}&lon={}&appid={}&units=imperial",
            self.base_url, lat, lon, self.api_key
        );

        let response: open_weather::CurrentResponse =
            self.get_json(&url, "current weather").await?;
        let observation = open_weather::observation_from(response)?;

        debug!(
            "Fetched current conditions for {:.4},{:.4}: {}",
            lat, lon, observation.condition
        );
        Ok(observation)
    }

    #[instrument(skip(self))]
    async fn fetch_forecast(&self, lat: f64, lon: f64, hours: u32) -> Result<ForecastBundle> {
        let url = format!(
            "{}/forecast?lat={}&lon={}&appid={}&units=imperial",
            self.base_url, lat, lon, self.api_key
        );

        let response: open_weather::ForecastResponse = self.get_json(&url, "forecast").await?;
        let bundle = open_weather::forecast_from(response, hours);

        debug!(
            "Fetched forecast for {:.4},{:.4}: {} hourly slots, {} days",
            lat,
            lon,
            bundle.hourly.len(),
            bundle.daily.len()
        );
        Ok(bundle)
    }
}
