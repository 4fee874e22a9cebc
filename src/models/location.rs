//! Location model for geographic coordinates and rounded location keys

use haversine::{Location as HaversineLocation, Units, distance};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Location coordinates with an optional human-readable place name
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Location {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// Place name (city, venue, etc.)
    pub place_name: Option<String>,
}

impl Location {
    /// Create a new location
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            place_name: None,
        }
    }

    /// Create location with a place name
    #[must_use]
    pub fn with_place_name(latitude: f64, longitude: f64, place_name: impl Into<String>) -> Self {
        Self {
            latitude,
            longitude,
            place_name: Some(place_name.into()),
        }
    }

    /// Round coordinates to the given decimal precision
    #[must_use]
    pub fn rounded_coordinates(&self, precision: u32) -> (f64, f64) {
        let multiplier = 10_f64.powi(i32::try_from(precision).unwrap_or(4));
        let lat = (self.latitude * multiplier).round() / multiplier;
        let lon = (self.longitude * multiplier).round() / multiplier;
        (lat, lon)
    }

    /// Grouping key for this location (2-decimal precision)
    #[must_use]
    pub fn grid_key(&self) -> LocationKey {
        LocationKey::new(self.latitude, self.longitude)
    }
}

/// Rounded location key used for scheduling groups, channel identity,
/// and alert deduplication
///
/// Coordinates are stored as hundredths of a degree so the key is hashable
/// and two points within roughly a kilometer collapse to one entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Hash, PartialEq, Eq)]
pub struct LocationKey {
    lat_centi: i32,
    lon_centi: i32,
}

impl LocationKey {
    /// Create a key from raw coordinates, rounding to 2 decimal places
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            lat_centi: (latitude * 100.0).round() as i32,
            lon_centi: (longitude * 100.0).round() as i32,
        }
    }

    /// Latitude of the key's grid center
    #[must_use]
    pub fn latitude(&self) -> f64 {
        f64::from(self.lat_centi) / 100.0
    }

    /// Longitude of the key's grid center
    #[must_use]
    pub fn longitude(&self) -> f64 {
        f64::from(self.lon_centi) / 100.0
    }

    /// Channel name for location-scoped fanout
    #[must_use]
    pub fn channel(&self) -> String {
        format!("location:{:.2}:{:.2}", self.latitude(), self.longitude())
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}:{:.2}", self.latitude(), self.longitude())
    }
}

/// Great-circle distance between two coordinate pairs in kilometers
#[must_use]
pub fn distance_km(from_lat: f64, from_lon: f64, to_lat: f64, to_lon: f64) -> f64 {
    let from = HaversineLocation {
        latitude: from_lat,
        longitude: from_lon,
    };
    let to = HaversineLocation {
        latitude: to_lat,
        longitude: to_lon,
    };
    distance(from, to, Units::Kilometers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_rounded_coordinates() {
        let location = Location::new(46.818_234, 8.227_456);
        let (lat, lon) = location.rounded_coordinates(2);
        assert_eq!(lat, 46.82);
        assert_eq!(lon, 8.23);
    }

    #[test]
    fn test_nearby_points_share_a_key() {
        let a = LocationKey::new(40.7128, -74.0060);
        let b = LocationKey::new(40.7131, -74.0055);
        assert_eq!(a, b);
        assert_eq!(a.channel(), "location:40.71:-74.01");
    }

    #[test]
    fn test_distinct_points_get_distinct_keys() {
        let a = LocationKey::new(40.71, -74.01);
        let b = LocationKey::new(40.78, -74.01);
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_round_trips_grid_center() {
        let key = LocationKey::new(51.507, -0.128);
        assert_eq!(key.latitude(), 51.51);
        assert_eq!(key.longitude(), -0.13);
    }

    #[test]
    fn test_distance_between_known_cities() {
        // New York to Philadelphia is roughly 130 km
        let d = distance_km(40.7128, -74.0060, 39.9526, -75.1652);
        assert!(d > 120.0 && d < 140.0, "unexpected distance: {d}");
    }
}
