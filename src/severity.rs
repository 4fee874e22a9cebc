//! Severity classification and dispatch scoring
//!
//! Both functions are pure: the same observation always yields the same
//! severity and the same score. The classifier is an ordered cascade where
//! the first matching rule wins - the order encodes priority, not just
//! condition membership (a thunderstorm with 60 mph wind is a Warning, not
//! an Emergency, because the thunderstorm rule matches first).

use crate::models::{Observation, SeverityLevel, WeatherCondition};

/// Classify an observation into a severity level, or `None` when conditions
/// do not warrant an alert
#[must_use]
pub fn classify(observation: &Observation) -> Option<SeverityLevel> {
    let condition = observation.condition;

    if matches!(
        condition,
        WeatherCondition::Tornado | WeatherCondition::Hurricane
    ) {
        return Some(SeverityLevel::Emergency);
    }

    if condition == WeatherCondition::Thunderstorm || observation.wind_speed > 50.0 {
        return Some(SeverityLevel::Warning);
    }

    let precipitating = matches!(condition, WeatherCondition::Rain | WeatherCondition::Snow);
    if (precipitating && observation.wind_speed > 25.0)
        || observation.visibility_miles < 1.0
        || observation.temperature > 105.0
        || observation.temperature < 10.0
    {
        return Some(SeverityLevel::Advisory);
    }

    if matches!(
        condition,
        WeatherCondition::Rain | WeatherCondition::Snow | WeatherCondition::Drizzle
    ) || observation.wind_speed > 15.0
        || observation.visibility_miles < 3.0
    {
        return Some(SeverityLevel::Info);
    }

    None
}

/// Dispatch safety score in [0, 100], independent of severity
///
/// Base score comes from the condition; wind, visibility, and temperature
/// extremes apply tiered penalties. Unknown conditions score 75.
#[must_use]
pub fn score(observation: &Observation) -> u8 {
    let mut score: i32 = match observation.condition {
        WeatherCondition::Clear => 100,
        WeatherCondition::Clouds => 85,
        WeatherCondition::Mist => 70,
        WeatherCondition::Fog => 60,
        WeatherCondition::Drizzle => 65,
        WeatherCondition::Rain => 50,
        WeatherCondition::Snow => 45,
        WeatherCondition::Thunderstorm => 20,
        WeatherCondition::Tornado | WeatherCondition::Hurricane => 0,
        WeatherCondition::Haze | WeatherCondition::Other => 75,
    };

    if observation.wind_speed > 25.0 {
        score -= 20;
    } else if observation.wind_speed > 15.0 {
        score -= 10;
    } else if observation.wind_speed > 10.0 {
        score -= 5;
    }

    if observation.visibility_miles < 1.0 {
        score -= 25;
    } else if observation.visibility_miles < 3.0 {
        score -= 15;
    } else if observation.visibility_miles < 5.0 {
        score -= 5;
    }

    if observation.temperature > 100.0 || observation.temperature < 20.0 {
        score -= 15;
    } else if observation.temperature > 95.0 || observation.temperature < 32.0 {
        score -= 10;
    }

    score.clamp(0, 100) as u8
}
