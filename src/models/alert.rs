//! Alert records, severity levels, and delivery channel tagging

use crate::models::{Location, LocationKey, WeatherCondition};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Alert severity, ordered from informational to emergency
///
/// The order is total and meaningful: retention and channel selection both
/// compare levels, and Emergency is terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SeverityLevel {
    Info,
    Advisory,
    Warning,
    Emergency,
}

impl SeverityLevel {
    /// Numeric level (1-4) as stored and exposed to clients
    #[must_use]
    pub fn level(self) -> u8 {
        match self {
            Self::Info => 1,
            Self::Advisory => 2,
            Self::Warning => 3,
            Self::Emergency => 4,
        }
    }

    #[must_use]
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(Self::Info),
            2 => Some(Self::Advisory),
            3 => Some(Self::Warning),
            4 => Some(Self::Emergency),
            _ => None,
        }
    }

    /// Default title, recommendation, and channel set for this level
    #[must_use]
    pub fn profile(self) -> SeverityProfile {
        match self {
            Self::Info => SeverityProfile {
                title: "🌤️ Weather Update",
                recommendation: "Consider preparing backup plans.",
                channels: &[DeliveryChannel::Push],
            },
            Self::Advisory => SeverityProfile {
                title: "⚠️ Weather Advisory",
                recommendation: "Take precautions and monitor conditions.",
                channels: &[DeliveryChannel::Push, DeliveryChannel::Email],
            },
            Self::Warning => SeverityProfile {
                title: "⚠️ Weather Warning",
                recommendation: "Strongly consider postponing outdoor activities.",
                channels: &[
                    DeliveryChannel::Push,
                    DeliveryChannel::Sms,
                    DeliveryChannel::Email,
                ],
            },
            Self::Emergency => SeverityProfile {
                title: "🚨 EMERGENCY ALERT",
                recommendation: "Seek shelter immediately!",
                channels: &[
                    DeliveryChannel::Push,
                    DeliveryChannel::Sms,
                    DeliveryChannel::Email,
                ],
            },
        }
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Info => "info",
            Self::Advisory => "advisory",
            Self::Warning => "warning",
            Self::Emergency => "emergency",
        };
        f.write_str(name)
    }
}

/// Outbound channels an alert should be dispatched on
///
/// Dispatch itself lives in the transport layer; the core only tags which
/// channels apply for a severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryChannel {
    Push,
    Sms,
    Email,
}

/// Static per-severity defaults
#[derive(Debug, Clone, Copy)]
pub struct SeverityProfile {
    pub title: &'static str,
    pub recommendation: &'static str,
    pub channels: &'static [DeliveryChannel],
}

/// Weather category attached to an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherType {
    Clear,
    Clouds,
    Rain,
    Snow,
    Thunderstorm,
    Tornado,
    Hurricane,
    Flood,
    Wind,
    Heat,
    Cold,
    Other,
}

impl From<WeatherCondition> for WeatherType {
    fn from(condition: WeatherCondition) -> Self {
        match condition {
            WeatherCondition::Clear => Self::Clear,
            WeatherCondition::Clouds => Self::Clouds,
            WeatherCondition::Rain | WeatherCondition::Drizzle => Self::Rain,
            WeatherCondition::Snow => Self::Snow,
            WeatherCondition::Thunderstorm => Self::Thunderstorm,
            WeatherCondition::Tornado => Self::Tornado,
            WeatherCondition::Hurricane => Self::Hurricane,
            WeatherCondition::Mist
            | WeatherCondition::Fog
            | WeatherCondition::Haze
            | WeatherCondition::Other => Self::Other,
        }
    }
}

/// A weather alert addressed to one user for one location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub id: String,
    pub user_id: String,
    pub order_id: Option<String>,
    pub location: Location,
    pub severity: SeverityLevel,
    pub weather_type: WeatherType,
    pub title: String,
    pub description: String,
    pub recommendation: String,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub feedback_rating: Option<u8>,
    pub feedback_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    /// Dedup identity: same user, same rounded location, same severity
    #[must_use]
    pub fn fingerprint(&self) -> AlertFingerprint {
        AlertFingerprint {
            user_id: self.user_id.clone(),
            location: self.location.grid_key(),
            severity: self.severity,
        }
    }

    /// Whether this alert still suppresses a duplicate at `now`:
    /// validity window open and not yet acknowledged
    #[must_use]
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.acknowledged_at.is_none() && self.valid_from <= now && now < self.valid_until
    }
}

/// Identity used to suppress duplicate alerts within an open validity window
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlertFingerprint {
    pub user_id: String,
    pub location: LocationKey,
    pub severity: SeverityLevel,
}

/// Input for creating an alert; unset fields fall back to the severity
/// profile and the default validity window
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub user_id: String,
    pub order_id: Option<String>,
    pub location: Location,
    pub severity: SeverityLevel,
    pub weather_type: WeatherType,
    pub title: Option<String>,
    pub description: String,
    pub recommendation: Option<String>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
}
