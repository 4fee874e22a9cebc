//! Data models for the Stormwatch service
//!
//! This module contains the core domain models organized by concern:
//! - Location: Geographic coordinates and rounded location keys
//! - Weather: Observations and forecast collections
//! - Alert: Alert records, severity levels, and delivery channels

pub mod alert;
pub mod location;
pub mod weather;

// Re-export all public types for convenient access
pub use alert::{
    Alert, AlertFingerprint, DeliveryChannel, NewAlert, SeverityLevel, SeverityProfile, WeatherType,
};
pub use location::{Location, LocationKey, distance_km};
pub use weather::{
    DailyForecast, ForecastBundle, HourlyForecast, Observation, WeatherCondition, WeatherReport,
};
