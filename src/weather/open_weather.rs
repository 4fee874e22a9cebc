//! OpenWeatherMap API response structures and conversion utilities

use crate::models::{
    DailyForecast, ForecastBundle, HourlyForecast, Observation, WeatherCondition,
};
use crate::{Result, StormwatchError};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

const METERS_PER_MILE: f64 = 1609.34;

// Full visibility per the provider's documented cap
const DEFAULT_VISIBILITY_METERS: f64 = 10_000.0;

/// Current weather response
#[derive(Debug, Deserialize)]
pub struct CurrentResponse {
    pub weather: Vec<ConditionEntry>,
    pub main: MainReadings,
    /// Visibility in meters, capped at 10 km
    pub visibility: Option<f64>,
    pub wind: WindReadings,
    pub clouds: CloudReadings,
}

/// 5-day/3-hour forecast response
#[derive(Debug, Deserialize)]
pub struct ForecastResponse {
    pub list: Vec<ForecastSlot>,
}

#[derive(Debug, Deserialize)]
pub struct ConditionEntry {
    pub main: String,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Deserialize)]
pub struct MainReadings {
    pub temp: f64,
    pub feels_like: f64,
    pub pressure: f64,
    pub humidity: u8,
}

#[derive(Debug, Deserialize)]
pub struct WindReadings {
    pub speed: f64,
    /// Degrees; some provider payloads report fractional values
    #[serde(default)]
    pub deg: f64,
}

#[derive(Debug, Deserialize)]
pub struct CloudReadings {
    pub all: u8,
}

#[derive(Debug, Deserialize)]
pub struct ForecastSlot {
    /// Unix timestamp of the slot
    pub dt: i64,
    pub main: MainReadings,
    pub weather: Vec<ConditionEntry>,
    pub wind: WindReadings,
    /// Precipitation probability (0.0-1.0)
    #[serde(default)]
    pub pop: f64,
}

/// Convert a current-weather response into an observation
pub(super) fn observation_from(response: CurrentResponse) -> Result<Observation> {
    let condition = response
        .weather
        .first()
        .ok_or_else(|| StormwatchError::provider("current weather payload has no condition"))?;

    Ok(Observation {
        temperature: response.main.temp,
        feels_like: response.main.feels_like,
        humidity: response.main.humidity,
        pressure: response.main.pressure,
        wind_speed: response.wind.speed,
        wind_direction: response.wind.deg.rem_euclid(360.0).round() as u16,
        visibility_miles: response.visibility.unwrap_or(DEFAULT_VISIBILITY_METERS)
            / METERS_PER_MILE,
        cloud_cover_pct: response.clouds.all,
        condition: WeatherCondition::from_provider(&condition.main),
        description: condition.description.clone(),
        icon: condition.icon.clone(),
        fetched_at: Utc::now(),
    })
}

/// Convert a forecast response into hourly slots plus per-day aggregates
pub(super) fn forecast_from(response: ForecastResponse, hours: u32) -> ForecastBundle {
    // Provider slots span 3 hours each
    let slot_count = (hours as usize).div_ceil(3);

    let hourly: Vec<HourlyForecast> = response
        .list
        .iter()
        .take(slot_count)
        .filter_map(|slot| {
            let entry = slot.weather.first()?;
            Some(HourlyForecast {
                datetime: slot_datetime(slot.dt),
                temperature: slot.main.temp,
                feels_like: slot.main.feels_like,
                humidity: slot.main.humidity,
                wind_speed: slot.wind.speed,
                condition: WeatherCondition::from_provider(&entry.main),
                icon: entry.icon.clone(),
                precipitation_probability: slot.pop * 100.0,
            })
        })
        .collect();

    // Group every slot by calendar day; BTreeMap keeps days ordered
    let mut by_day: BTreeMap<NaiveDate, Vec<&ForecastSlot>> = BTreeMap::new();
    for slot in &response.list {
        by_day
            .entry(slot_datetime(slot.dt).date_naive())
            .or_default()
            .push(slot);
    }

    let daily: Vec<DailyForecast> = by_day
        .into_iter()
        .filter_map(|(date, slots)| {
            // Midday slot stands in for the day's overall conditions
            let midday = slots.get(slots.len() / 2)?;
            let entry = midday.weather.first()?;
            let temps = slots.iter().map(|s| s.main.temp);

            Some(DailyForecast {
                date,
                temp_min: temps.clone().fold(f64::INFINITY, f64::min),
                temp_max: temps.fold(f64::NEG_INFINITY, f64::max),
                humidity: midday.main.humidity,
                wind_speed: slots
                    .iter()
                    .map(|s| s.wind.speed)
                    .fold(0.0, f64::max),
                condition: WeatherCondition::from_provider(&entry.main),
                description: entry.description.clone(),
                icon: entry.icon.clone(),
                precipitation_probability: slots
                    .iter()
                    .map(|s| s.pop)
                    .fold(0.0, f64::max)
                    * 100.0,
            })
        })
        .collect();

    ForecastBundle { hourly, daily }
}

fn slot_datetime(unix_secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(unix_secs, 0).unwrap_or_else(Utc::now)
}
