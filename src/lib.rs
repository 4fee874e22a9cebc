//! Stormwatch - weather alert monitoring and push notification service
//!
//! This library provides the core pipeline: scheduled polling of a weather
//! provider, short-TTL observation caching, severity classification, alert
//! lifecycle management, and publish/subscribe fanout to live subscribers.

pub mod cache;
pub mod config;
pub mod error;
pub mod generator;
pub mod hub;
pub mod models;
pub mod scheduler;
pub mod severity;
pub mod store;
pub mod weather;

// Re-export core types for public API
pub use cache::{CacheKind, CacheStats, ObservationCache};
pub use config::StormwatchConfig;
pub use error::StormwatchError;
pub use generator::AlertGenerator;
pub use hub::{ConnectionId, NotificationHub, PushMessage};
pub use models::{
    Alert, DeliveryChannel, ForecastBundle, Location, LocationKey, Observation, SeverityLevel,
    WeatherCondition, WeatherType,
};
pub use scheduler::Scheduler;
pub use store::{AlertStore, MemoryStore, OrderDirectory};
pub use weather::{OpenWeatherClient, WeatherProvider};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, StormwatchError>;
