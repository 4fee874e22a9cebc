//! Weather observation and forecast models
//!
//! All measurements use the imperial baseline the provider is queried in:
//! temperatures in Fahrenheit, wind speeds in mph, visibility in miles.
//! Unit conversion happens once at the provider boundary so downstream
//! consumers see a single unit system.

use crate::models::Location;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad weather condition reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeatherCondition {
    Clear,
    Clouds,
    Mist,
    Fog,
    Haze,
    Drizzle,
    Rain,
    Snow,
    Thunderstorm,
    Tornado,
    Hurricane,
    Other,
}

impl WeatherCondition {
    /// Parse a provider condition string (case-insensitive, unknown -> Other)
    #[must_use]
    pub fn from_provider(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "clear" => Self::Clear,
            "clouds" => Self::Clouds,
            "mist" => Self::Mist,
            "fog" => Self::Fog,
            "haze" => Self::Haze,
            "drizzle" => Self::Drizzle,
            "rain" => Self::Rain,
            "snow" => Self::Snow,
            "thunderstorm" => Self::Thunderstorm,
            "tornado" => Self::Tornado,
            "hurricane" => Self::Hurricane,
            _ => Self::Other,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Clouds => "clouds",
            Self::Mist => "mist",
            Self::Fog => "fog",
            Self::Haze => "haze",
            Self::Drizzle => "drizzle",
            Self::Rain => "rain",
            Self::Snow => "snow",
            Self::Thunderstorm => "thunderstorm",
            Self::Tornado => "tornado",
            Self::Hurricane => "hurricane",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for WeatherCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable snapshot of current conditions at one location
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Observation {
    /// Temperature in Fahrenheit
    pub temperature: f64,
    /// Apparent temperature in Fahrenheit
    pub feels_like: f64,
    /// Relative humidity percentage (0-100)
    pub humidity: u8,
    /// Atmospheric pressure in hPa
    pub pressure: f64,
    /// Wind speed in mph
    pub wind_speed: f64,
    /// Wind direction in degrees (0-360, where 0/360 is North)
    pub wind_direction: u16,
    /// Visibility in miles
    pub visibility_miles: f64,
    /// Cloud cover percentage (0-100)
    pub cloud_cover_pct: u8,
    /// Broad condition category
    pub condition: WeatherCondition,
    /// Human-readable description of conditions
    pub description: String,
    /// Provider icon code
    pub icon: String,
    /// When this snapshot was fetched
    pub fetched_at: DateTime<Utc>,
}

impl Observation {
    pub fn wind_direction_to_cardinal(degrees: u16) -> &'static str {
        match degrees {
            0..=11 | 349..=360 => "N",
            12..=33 => "NNE",
            34..=56 => "NE",
            57..=78 => "ENE",
            79..=101 => "E",
            102..=123 => "ESE",
            124..=146 => "SE",
            147..=168 => "SSE",
            169..=191 => "S",
            192..=213 => "SSW",
            214..=236 => "SW",
            237..=258 => "WSW",
            259..=281 => "W",
            282..=303 => "WNW",
            304..=326 => "NW",
            327..=348 => "NNW",
            _ => "Unknown",
        }
    }

    /// Format temperature with unit
    #[must_use]
    pub fn format_temperature(&self) -> String {
        format!("{:.0}°F", self.temperature)
    }

    /// Format wind information
    #[must_use]
    pub fn format_wind(&self) -> String {
        let direction = Self::wind_direction_to_cardinal(self.wind_direction);
        format!("{:.0} mph {}", self.wind_speed, direction)
    }
}

/// One forecast slot (the provider reports 3-hour intervals)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HourlyForecast {
    pub datetime: DateTime<Utc>,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: u8,
    pub wind_speed: f64,
    pub condition: WeatherCondition,
    pub icon: String,
    /// Precipitation probability percentage (0-100)
    pub precipitation_probability: f64,
}

/// Daily aggregate of the forecast slots for one calendar day
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity: u8,
    /// Peak wind speed across the day's slots in mph
    pub wind_speed: f64,
    pub condition: WeatherCondition,
    pub description: String,
    pub icon: String,
    /// Peak precipitation probability percentage (0-100)
    pub precipitation_probability: f64,
}

/// Hourly and daily forecast for one location
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct ForecastBundle {
    pub hourly: Vec<HourlyForecast>,
    pub daily: Vec<DailyForecast>,
}

/// Combined current-plus-forecast answer for one location
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WeatherReport {
    pub location: Location,
    pub current: Observation,
    pub forecast: ForecastBundle,
    pub fetched_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_parsing_is_case_insensitive() {
        assert_eq!(WeatherCondition::from_provider("Rain"), WeatherCondition::Rain);
        assert_eq!(
            WeatherCondition::from_provider("THUNDERSTORM"),
            WeatherCondition::Thunderstorm
        );
        assert_eq!(WeatherCondition::from_provider("smoke"), WeatherCondition::Other);
    }

    #[test]
    fn test_wind_direction_cardinals() {
        assert_eq!(Observation::wind_direction_to_cardinal(0), "N");
        assert_eq!(Observation::wind_direction_to_cardinal(90), "E");
        assert_eq!(Observation::wind_direction_to_cardinal(180), "S");
        assert_eq!(Observation::wind_direction_to_cardinal(270), "W");
        assert_eq!(Observation::wind_direction_to_cardinal(350), "N");
    }
}
