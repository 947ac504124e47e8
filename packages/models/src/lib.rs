#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Record, envelope and query types for the world map backend API.
//!
//! These types mirror the JSON the backend returns. Records are immutable
//! once fetched: every filter change produces a fresh collection rather
//! than patching an existing one.

pub mod query;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub use query::QueryParams;

/// Identifier of a city known to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CityId(pub i64);

impl std::fmt::Display for CityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for CityId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// A disaster event as returned by `/disasters`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisasterRecord {
    /// Backend row ID.
    pub id: i64,
    /// Disaster type (e.g. `"earthquake"`, `"volcanic_eruption"`).
    pub disaster_type: String,
    /// Short headline.
    #[serde(default)]
    pub title: Option<String>,
    /// Longer free-text description.
    #[serde(default)]
    pub description: Option<String>,
    /// Latitude (WGS84). A null coordinate is read as `0.0`.
    #[serde(default, deserialize_with = "lenient_coordinate")]
    pub latitude: f64,
    /// Longitude (WGS84). A null coordinate is read as `0.0`.
    #[serde(default, deserialize_with = "lenient_coordinate")]
    pub longitude: f64,
    /// When the event occurred.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub occurred_at: Option<DateTime<Utc>>,
    /// Magnitude, for event types that have one.
    #[serde(default)]
    pub magnitude: Option<f64>,
    /// Free-text severity as reported by the ingest source.
    #[serde(default)]
    pub severity: Option<String>,
    /// Event status (e.g. `"ongoing"`).
    #[serde(default)]
    pub status: Option<String>,
    /// Upstream data provider.
    #[serde(default)]
    pub source: Option<String>,
    /// Identifier of the event at the upstream provider.
    #[serde(default)]
    pub source_id: Option<String>,
    /// Link to the upstream event page.
    #[serde(default)]
    pub url: Option<String>,
}

/// Pollutant concentrations attached to an AQI measurement.
///
/// Each value is a non-negative concentration or absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pollutants {
    /// Fine particulate matter, µg/m³.
    #[serde(default)]
    pub pm25: Option<f64>,
    /// Coarse particulate matter, µg/m³.
    #[serde(default)]
    pub pm10: Option<f64>,
    /// Ozone, ppb.
    #[serde(default)]
    pub o3: Option<f64>,
    /// Nitrogen dioxide, ppb.
    #[serde(default)]
    pub no2: Option<f64>,
    /// Carbon monoxide, ppm.
    #[serde(default)]
    pub co: Option<f64>,
    /// Sulphur dioxide, ppb.
    #[serde(default)]
    pub so2: Option<f64>,
}

impl Pollutants {
    /// Returns the present readings as `(label, value, unit)` triples in
    /// display order.
    #[must_use]
    pub fn readings(&self) -> Vec<(&'static str, f64, &'static str)> {
        [
            ("PM2.5", self.pm25, "µg/m³"),
            ("PM10", self.pm10, "µg/m³"),
            ("O₃", self.o3, "ppb"),
            ("NO₂", self.no2, "ppb"),
            ("CO", self.co, "ppm"),
            ("SO₂", self.so2, "ppb"),
        ]
        .into_iter()
        .filter_map(|(label, value, unit)| value.map(|v| (label, v, unit)))
        .collect()
    }
}

/// An air-quality measurement as returned by `/aqi/latest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQualityRecord {
    /// Backend row ID.
    pub id: i64,
    /// City this measurement belongs to, if linked.
    #[serde(default)]
    pub city_id: Option<CityId>,
    /// City display name.
    #[serde(default)]
    pub city_name: Option<String>,
    /// Latitude (WGS84). A null coordinate is read as `0.0`.
    #[serde(default, deserialize_with = "lenient_coordinate")]
    pub latitude: f64,
    /// Longitude (WGS84). A null coordinate is read as `0.0`.
    #[serde(default, deserialize_with = "lenient_coordinate")]
    pub longitude: f64,
    /// When the measurement was taken.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub measured_at: Option<DateTime<Utc>>,
    /// Air Quality Index value (0-500 nominal).
    #[serde(default)]
    pub aqi_value: Option<i32>,
    /// Category label as stored by the backend.
    #[serde(default)]
    pub aqi_category: Option<String>,
    /// Pollutant concentrations.
    #[serde(flatten)]
    pub pollutants: Pollutants,
    /// Upstream data provider.
    #[serde(default)]
    pub source: Option<String>,
    /// Link to the upstream station page.
    #[serde(default)]
    pub url: Option<String>,
}

/// A city as returned by `/cities`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityRecord {
    /// City ID.
    pub id: CityId,
    /// City name.
    pub name: String,
    /// Country name.
    pub country: String,
    /// ISO country code.
    #[serde(default)]
    pub country_code: Option<String>,
    /// Latitude (WGS84). A null coordinate is read as `0.0`.
    #[serde(default, deserialize_with = "lenient_coordinate")]
    pub latitude: f64,
    /// Longitude (WGS84). A null coordinate is read as `0.0`.
    #[serde(default, deserialize_with = "lenient_coordinate")]
    pub longitude: f64,
    /// Population, when known.
    #[serde(default)]
    pub population: Option<u64>,
    /// IANA timezone name.
    #[serde(default)]
    pub timezone: Option<String>,
}

/// The `{success, data}` envelope wrapping most backend responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    /// Whether the backend handled the request.
    #[serde(default)]
    pub success: bool,
    /// Payload, present on success.
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    /// Short error text on failure.
    #[serde(default)]
    pub error: Option<String>,
    /// Detailed error text on failure.
    #[serde(default)]
    pub message: Option<String>,
    /// Number of records in `data`.
    #[serde(default)]
    pub count: Option<u64>,
    /// Total number of matching records before pagination.
    #[serde(default)]
    pub total: Option<u64>,
}

impl<T> ApiEnvelope<T> {
    /// Returns the most descriptive failure text the backend supplied.
    #[must_use]
    pub fn failure_message(&self) -> String {
        match (&self.error, &self.message) {
            (Some(error), Some(message)) => format!("{error}: {message}"),
            (Some(text), None) | (None, Some(text)) => text.clone(),
            (None, None) => "backend reported failure".to_string(),
        }
    }
}

/// Latest measurement for one city inside a comparison response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitySnapshot {
    /// City ID.
    pub city_id: CityId,
    /// City display name.
    #[serde(default)]
    pub city_name: Option<String>,
    /// AQI value.
    #[serde(default)]
    pub aqi_value: Option<i32>,
    /// Category label as stored by the backend.
    #[serde(default)]
    pub aqi_category: Option<String>,
    /// Pollutant concentrations.
    #[serde(flatten)]
    pub pollutants: Pollutants,
    /// When the measurement was taken.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub measured_at: Option<DateTime<Utc>>,
}

/// Statistics object as computed by the backend.
///
/// The backend sends `{}` when none of the cities had an AQI value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendStatistics {
    /// Highest AQI among compared cities.
    #[serde(default)]
    pub highest_aqi: Option<f64>,
    /// Lowest AQI among compared cities.
    #[serde(default)]
    pub lowest_aqi: Option<f64>,
    /// Mean AQI among compared cities.
    #[serde(default)]
    pub average_aqi: Option<f64>,
}

/// Response body of `/comparison/aqi`.
#[derive(Debug, Clone, Deserialize)]
pub struct ComparisonResponse {
    /// Whether the backend handled the request.
    #[serde(default)]
    pub success: bool,
    /// Date the comparison refers to.
    #[serde(default)]
    pub comparison_date: Option<String>,
    /// Per-city snapshots, in backend order.
    #[serde(default)]
    pub cities: Vec<CitySnapshot>,
    /// Backend-side statistics.
    #[serde(default)]
    pub statistics: BackendStatistics,
    /// Error text on failure.
    #[serde(default)]
    pub error: Option<String>,
}

/// Response body of `/health`.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    /// Reported status string (e.g. `"healthy"`).
    #[serde(default)]
    pub status: Option<String>,
    /// Reported service name.
    #[serde(default)]
    pub service: Option<String>,
}

/// Parses a timestamp that may be RFC 3339 or a naive ISO 8601 string.
///
/// Naive timestamps are interpreted as UTC. Absent or unparseable values
/// become `None`.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// The backend writes a coordinate of exactly zero as `null`.
fn lenient_coordinate<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}
