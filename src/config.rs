//! Configuration management for the Stormwatch service
//!
//! Handles loading configuration from environment variables and provides
//! validation for all configuration settings. The provider credential is
//! checked once at startup; a missing key is a fatal configuration error,
//! never a per-request failure.

use crate::{Result, StormwatchError};
use serde::{Deserialize, Serialize};
use std::env;

/// Root configuration structure for the Stormwatch service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StormwatchConfig {
    /// Weather provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Observation cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// Scheduled task configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Weather provider API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// OpenWeatherMap API key (required to construct the client)
    pub api_key: Option<String>,
    /// Base URL for the provider API
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_provider_timeout")]
    pub timeout_seconds: u32,
    /// Maximum number of retries for transient request failures
    #[serde(default = "default_provider_max_retries")]
    pub max_retries: u32,
}

/// Observation cache settings
///
/// TTLs are per data kind: current conditions turn over fastest during
/// active weather, forecasts are stabler, and area alerts must stay fresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache directory location
    #[serde(default = "default_cache_location")]
    pub location: String,
    /// TTL for current-conditions entries in seconds
    #[serde(default = "default_current_ttl")]
    pub current_ttl_secs: u64,
    /// TTL for forecast entries in seconds
    #[serde(default = "default_forecast_ttl")]
    pub forecast_ttl_secs: u64,
    /// TTL for area-alert entries in seconds
    #[serde(default = "default_area_alert_ttl")]
    pub area_alert_ttl_secs: u64,
}

/// Cadence and batch bounds for the scheduled tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Bulk poll interval in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Maximum distinct locations refreshed per bulk poll tick
    #[serde(default = "default_poll_batch_limit")]
    pub poll_batch_limit: usize,
    /// Sequential delay between provider calls within a bulk poll tick,
    /// in milliseconds (provider quota safety, not parallel fan-out)
    #[serde(default = "default_poll_delay_ms")]
    pub poll_delay_ms: u64,
    /// Active-order monitoring interval in seconds
    #[serde(default = "default_monitor_interval")]
    pub monitor_interval_secs: u64,
    /// Maximum orders checked per monitoring tick
    #[serde(default = "default_monitor_order_limit")]
    pub monitor_order_limit: usize,
    /// Severe weather sweep interval in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Maximum distinct locations swept per tick
    #[serde(default = "default_sweep_location_limit")]
    pub sweep_location_limit: usize,
    /// Radius for emergency area broadcasts in kilometers
    #[serde(default = "default_broadcast_radius")]
    pub broadcast_radius_km: f64,
    /// Retention cleanup interval in seconds
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
    /// Age in days after which acknowledged or low-severity alerts are reaped
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

// Default value functions
fn default_provider_base_url() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}

fn default_provider_timeout() -> u32 {
    30
}

fn default_provider_max_retries() -> u32 {
    3
}

fn default_cache_location() -> String {
    "./stormwatch-cache".to_string()
}

fn default_current_ttl() -> u64 {
    300
}

fn default_forecast_ttl() -> u64 {
    600
}

fn default_area_alert_ttl() -> u64 {
    60
}

fn default_poll_interval() -> u64 {
    300
}

fn default_poll_batch_limit() -> usize {
    100
}

fn default_poll_delay_ms() -> u64 {
    200
}

fn default_monitor_interval() -> u64 {
    60
}

fn default_monitor_order_limit() -> usize {
    50
}

fn default_sweep_interval() -> u64 {
    30
}

fn default_sweep_location_limit() -> usize {
    20
}

fn default_broadcast_radius() -> f64 {
    10.0
}

fn default_cleanup_interval() -> u64 {
    86_400
}

fn default_retention_days() -> i64 {
    30
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_provider_base_url(),
            timeout_seconds: default_provider_timeout(),
            max_retries: default_provider_max_retries(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            location: default_cache_location(),
            current_ttl_secs: default_current_ttl(),
            forecast_ttl_secs: default_forecast_ttl(),
            area_alert_ttl_secs: default_area_alert_ttl(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            poll_batch_limit: default_poll_batch_limit(),
            poll_delay_ms: default_poll_delay_ms(),
            monitor_interval_secs: default_monitor_interval(),
            monitor_order_limit: default_monitor_order_limit(),
            sweep_interval_secs: default_sweep_interval(),
            sweep_location_limit: default_sweep_location_limit(),
            broadcast_radius_km: default_broadcast_radius(),
            cleanup_interval_secs: default_cleanup_interval(),
            retention_days: default_retention_days(),
        }
    }
}

impl Default for StormwatchConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            cache: CacheConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl StormwatchConfig {
    /// Load configuration from environment variables on top of defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(key) = env::var("OPENWEATHERMAP_API_KEY") {
            if !key.is_empty() {
                config.provider.api_key = Some(key);
            }
        }
        if let Ok(url) = env::var("STORMWATCH_PROVIDER_URL") {
            config.provider.base_url = url;
        }
        if let Ok(dir) = env::var("STORMWATCH_CACHE_DIR") {
            config.cache.location = dir;
        }
        if let Ok(secs) = env::var("STORMWATCH_POLL_INTERVAL_SECS") {
            config.scheduler.poll_interval_secs = parse_env("STORMWATCH_POLL_INTERVAL_SECS", &secs)?;
        }
        if let Ok(ms) = env::var("STORMWATCH_POLL_DELAY_MS") {
            config.scheduler.poll_delay_ms = parse_env("STORMWATCH_POLL_DELAY_MS", &ms)?;
        }
        if let Ok(days) = env::var("STORMWATCH_RETENTION_DAYS") {
            config.scheduler.retention_days = parse_env("STORMWATCH_RETENTION_DAYS", &days)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<()> {
        if self.provider.timeout_seconds == 0 {
            return Err(StormwatchError::config("provider timeout must be non-zero"));
        }
        if self.scheduler.poll_interval_secs == 0
            || self.scheduler.monitor_interval_secs == 0
            || self.scheduler.sweep_interval_secs == 0
        {
            return Err(StormwatchError::config("task intervals must be non-zero"));
        }
        if self.scheduler.retention_days <= 0 {
            return Err(StormwatchError::config("retention horizon must be positive"));
        }
        if self.scheduler.broadcast_radius_km <= 0.0 {
            return Err(StormwatchError::config("broadcast radius must be positive"));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| StormwatchError::config(format!("invalid value for {name}: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = StormwatchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cache.current_ttl_secs, 300);
        assert_eq!(config.cache.forecast_ttl_secs, 600);
        assert_eq!(config.cache.area_alert_ttl_secs, 60);
        assert_eq!(config.scheduler.poll_interval_secs, 300);
        assert_eq!(config.scheduler.poll_delay_ms, 200);
    }

    #[test]
    fn test_validation_rejects_zero_interval() {
        let mut config = StormwatchConfig::default();
        config.scheduler.sweep_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_negative_retention() {
        let mut config = StormwatchConfig::default();
        config.scheduler.retention_days = 0;
        assert!(config.validate().is_err());
    }
}
