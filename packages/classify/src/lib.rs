#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Classification of AQI values and disaster types for map rendering.
//!
//! Pure functions only: every value maps to a display category, a color
//! and a severity tier. Absent or unrecognized inputs map to an explicit
//! "unknown" bucket rather than an error.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Neutral color for markers without a usable value.
pub const UNKNOWN_COLOR: &str = "#999999";

/// Color for disaster types missing from the color table.
pub const DEFAULT_DISASTER_COLOR: &str = "#888888";

/// AQI values strictly above this get a [`MarkerSize::Large`] marker.
pub const LARGE_MARKER_AQI_THRESHOLD: i32 = 150;

/// EPA Air Quality Index category.
///
/// Bucket boundaries are inclusive at the upper end: 50 is
/// [`AqiCategory::Good`], 51 is [`AqiCategory::Moderate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AqiCategory {
    /// 0-50
    Good,
    /// 51-100
    Moderate,
    /// 101-150
    UnhealthyForSensitiveGroups,
    /// 151-200
    Unhealthy,
    /// 201-300
    VeryUnhealthy,
    /// Above 300
    Hazardous,
    /// No AQI value (or a negative one).
    Unknown,
}

impl AqiCategory {
    /// Maps an optional AQI value to its category.
    #[must_use]
    pub const fn classify(aqi: Option<i32>) -> Self {
        match aqi {
            None => Self::Unknown,
            Some(v) if v < 0 => Self::Unknown,
            Some(0..=50) => Self::Good,
            Some(51..=100) => Self::Moderate,
            Some(101..=150) => Self::UnhealthyForSensitiveGroups,
            Some(151..=200) => Self::Unhealthy,
            Some(201..=300) => Self::VeryUnhealthy,
            Some(_) => Self::Hazardous,
        }
    }

    /// Human-readable category name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Moderate => "Moderate",
            Self::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            Self::Unhealthy => "Unhealthy",
            Self::VeryUnhealthy => "Very Unhealthy",
            Self::Hazardous => "Hazardous",
            Self::Unknown => "Unknown",
        }
    }

    /// Hex color from the six-tier AQI palette.
    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::Good => "#00E400",
            Self::Moderate => "#FFFF00",
            Self::UnhealthyForSensitiveGroups => "#FF7E00",
            Self::Unhealthy => "#FF0000",
            Self::VeryUnhealthy => "#8F3F97",
            Self::Hazardous => "#7E0023",
            Self::Unknown => UNKNOWN_COLOR,
        }
    }

    /// Severity tier from 1 (good) to 6 (hazardous), 0 when unknown.
    #[must_use]
    pub const fn tier(self) -> u8 {
        match self {
            Self::Good => 1,
            Self::Moderate => 2,
            Self::UnhealthyForSensitiveGroups => 3,
            Self::Unhealthy => 4,
            Self::VeryUnhealthy => 5,
            Self::Hazardous => 6,
            Self::Unknown => 0,
        }
    }

    /// Returns the six defined buckets followed by [`AqiCategory::Unknown`].
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Good,
            Self::Moderate,
            Self::UnhealthyForSensitiveGroups,
            Self::Unhealthy,
            Self::VeryUnhealthy,
            Self::Hazardous,
            Self::Unknown,
        ]
    }
}

impl std::fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Marker diameter class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerSize {
    /// Default marker.
    Regular,
    /// Emphasized marker for unhealthy air.
    Large,
}

impl MarkerSize {
    /// Marker size for an AQI reading.
    #[must_use]
    pub const fn for_aqi(aqi: Option<i32>) -> Self {
        match aqi {
            Some(v) if v > LARGE_MARKER_AQI_THRESHOLD => Self::Large,
            _ => Self::Regular,
        }
    }

    /// Diameter in pixels.
    #[must_use]
    pub const fn pixels(self) -> u32 {
        match self {
            Self::Regular => 12,
            Self::Large => 16,
        }
    }
}

/// Disaster types the dashboard knows how to filter and label.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DisasterType {
    /// Seismic event.
    Earthquake,
    /// River or coastal flooding.
    Flood,
    /// Wildland fire.
    Wildfire,
    /// Atlantic / east Pacific tropical cyclone.
    Hurricane,
    /// Indian Ocean / south Pacific tropical cyclone.
    Cyclone,
    /// Tornado.
    Tornado,
    /// Other severe storm.
    Storm,
    /// Tsunami.
    Tsunami,
    /// Volcanic eruption.
    VolcanicEruption,
}

impl DisasterType {
    /// Returns all variants in filter-panel order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Earthquake,
            Self::Flood,
            Self::Wildfire,
            Self::Hurricane,
            Self::Cyclone,
            Self::Tornado,
            Self::Storm,
            Self::Tsunami,
            Self::VolcanicEruption,
        ]
    }

    /// Human-readable label (e.g. `"Volcanic eruption"`).
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Earthquake => "Earthquake",
            Self::Flood => "Flood",
            Self::Wildfire => "Wildfire",
            Self::Hurricane => "Hurricane",
            Self::Cyclone => "Cyclone",
            Self::Tornado => "Tornado",
            Self::Storm => "Storm",
            Self::Tsunami => "Tsunami",
            Self::VolcanicEruption => "Volcanic eruption",
        }
    }

    /// Marker color, if this type has an entry in the color table.
    #[must_use]
    pub const fn color(self) -> Option<&'static str> {
        match self {
            Self::Earthquake => Some("#FF0000"),
            Self::Flood => Some("#0066FF"),
            Self::Wildfire => Some("#FF6600"),
            Self::Hurricane | Self::Cyclone => Some("#9900FF"),
            Self::Tornado => Some("#FF0066"),
            Self::Storm => Some("#00CCFF"),
            Self::Tsunami | Self::VolcanicEruption => None,
        }
    }
}

/// Marker color for a raw disaster type string from the backend.
#[must_use]
pub fn disaster_color(raw: &str) -> &'static str {
    raw.parse::<DisasterType>()
        .ok()
        .and_then(DisasterType::color)
        .unwrap_or(DEFAULT_DISASTER_COLOR)
}

/// Display label for a raw disaster type string from the backend.
///
/// Unknown types are shown with their first letter capitalized and
/// underscores replaced by spaces.
#[must_use]
pub fn disaster_label(raw: &str) -> String {
    if let Ok(kind) = raw.parse::<DisasterType>() {
        return kind.label().to_string();
    }
    let spaced = raw.replace('_', " ");
    let mut chars = spaced.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Coarse disaster severity parsed from the free-text `severity` field.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "title_case")]
pub enum SeverityTier {
    /// Missing or unrecognized severity.
    Unknown = 0,
    /// Minor event.
    Low = 1,
    /// Moderate event (`"medium"` also maps here).
    Moderate = 2,
    /// Major event.
    High = 3,
    /// Extreme event (`"critical"`, `"extreme"`, `"severe"`).
    VeryHigh = 4,
}

impl SeverityTier {
    /// Parses the severity text written by the various ingest sources.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::Unknown;
        };
        let normalized = raw.trim().to_ascii_lowercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "low" | "minor" => Self::Low,
            "moderate" | "medium" => Self::Moderate,
            "high" | "major" => Self::High,
            "very high" | "critical" | "extreme" | "severe" => Self::VeryHigh,
            _ => Self::Unknown,
        }
    }

    /// Numeric tier value (0-4).
    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aqi_boundaries_are_inclusive_at_upper_end() {
        let cases = [
            (0, AqiCategory::Good),
            (50, AqiCategory::Good),
            (51, AqiCategory::Moderate),
            (100, AqiCategory::Moderate),
            (101, AqiCategory::UnhealthyForSensitiveGroups),
            (150, AqiCategory::UnhealthyForSensitiveGroups),
            (151, AqiCategory::Unhealthy),
            (200, AqiCategory::Unhealthy),
            (201, AqiCategory::VeryUnhealthy),
            (300, AqiCategory::VeryUnhealthy),
            (301, AqiCategory::Hazardous),
            (999, AqiCategory::Hazardous),
        ];
        for (value, expected) in cases {
            assert_eq!(AqiCategory::classify(Some(value)), expected, "aqi {value}");
        }
    }

    #[test]
    fn absent_or_negative_aqi_is_unknown() {
        assert_eq!(AqiCategory::classify(None), AqiCategory::Unknown);
        assert_eq!(AqiCategory::classify(Some(-3)), AqiCategory::Unknown);
        assert_eq!(AqiCategory::Unknown.color(), UNKNOWN_COLOR);
        assert_eq!(AqiCategory::Unknown.tier(), 0);
    }

    #[test]
    fn very_unhealthy_reading() {
        let category = AqiCategory::classify(Some(275));
        assert_eq!(category.label(), "Very Unhealthy");
        assert_eq!(category.color(), "#8F3F97");
        assert_eq!(MarkerSize::for_aqi(Some(275)), MarkerSize::Large);
    }

    #[test]
    fn marker_size_threshold_is_exclusive() {
        assert_eq!(MarkerSize::for_aqi(Some(150)), MarkerSize::Regular);
        assert_eq!(MarkerSize::for_aqi(Some(151)), MarkerSize::Large);
        assert_eq!(MarkerSize::for_aqi(None), MarkerSize::Regular);
        assert!(MarkerSize::Large.pixels() > MarkerSize::Regular.pixels());
    }

    #[test]
    fn tiers_increase_with_severity() {
        let tiers: Vec<u8> = AqiCategory::all()[..6].iter().map(|c| c.tier()).collect();
        assert_eq!(tiers, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn disaster_colors_fall_back_to_default() {
        assert_eq!(disaster_color("earthquake"), "#FF0000");
        assert_eq!(disaster_color("cyclone"), disaster_color("hurricane"));
        assert_eq!(disaster_color("tsunami"), DEFAULT_DISASTER_COLOR);
        assert_eq!(disaster_color("meteor"), DEFAULT_DISASTER_COLOR);
    }

    #[test]
    fn disaster_labels() {
        assert_eq!(disaster_label("volcanic_eruption"), "Volcanic eruption");
        assert_eq!(disaster_label("landslide_event"), "Landslide event");
        assert_eq!(disaster_label(""), "");
        assert_eq!(DisasterType::VolcanicEruption.to_string(), "volcanic_eruption");
    }

    #[test]
    fn parses_source_severity_text() {
        assert_eq!(SeverityTier::parse(Some("very_high")), SeverityTier::VeryHigh);
        assert_eq!(SeverityTier::parse(Some("Very High")), SeverityTier::VeryHigh);
        assert_eq!(SeverityTier::parse(Some("critical")), SeverityTier::VeryHigh);
        assert_eq!(SeverityTier::parse(Some("medium")), SeverityTier::Moderate);
        assert_eq!(SeverityTier::parse(Some("Unknown")), SeverityTier::Unknown);
        assert_eq!(SeverityTier::parse(None), SeverityTier::Unknown);
        assert_eq!(SeverityTier::VeryHigh.to_string(), "Very High");
    }
}
