//! Marker descriptors and popup formatting.
//!
//! Popup text is HTML. Every value taken from a record is escaped before
//! it is embedded, since records come from external feeds.

use std::fmt::Write as _;

use serde::Serialize;
use world_map_classify::{AqiCategory, MarkerSize, disaster_color, disaster_label};
use world_map_models::{AirQualityRecord, DisasterRecord};

/// Placeholder for an absent value.
pub const NOT_AVAILABLE: &str = "N/A";

/// Placeholder for an absent or unparseable timestamp.
pub const UNKNOWN_TIME: &str = "Unknown time";

/// Placeholder for a measurement without a city name.
pub const UNKNOWN_CITY: &str = "Unknown City";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

/// WGS84 position of a marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

/// Visual style of a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MarkerStyle {
    /// Fill color as `#RRGGBB`.
    pub color: &'static str,
    /// Size class.
    pub size: MarkerSize,
}

impl MarkerStyle {
    /// Diameter in pixels.
    #[must_use]
    pub const fn pixels(&self) -> u32 {
        self.size.pixels()
    }
}

/// Everything a renderer needs to draw one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerDescriptor {
    /// ID of the record the marker represents.
    pub id: i64,
    /// Where to draw it.
    pub position: Position,
    /// How to draw it.
    pub style: MarkerStyle,
    /// Sanitized HTML summary of the record.
    pub popup: String,
}

/// Escapes `&`, `<`, `>`, `"` and `'` for embedding in HTML text or
/// attribute values.
#[must_use]
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn format_time(at: Option<&chrono::DateTime<chrono::Utc>>) -> String {
    at.map_or_else(|| UNKNOWN_TIME.to_string(), |t| t.format(TIME_FORMAT).to_string())
}

pub(crate) fn disaster_style(record: &DisasterRecord) -> MarkerStyle {
    MarkerStyle {
        color: disaster_color(&record.disaster_type),
        size: MarkerSize::Regular,
    }
}

pub(crate) fn disaster_popup(record: &DisasterRecord) -> String {
    let mut html = String::from("<div class=\"popup disaster\">");
    let _ = write!(
        html,
        "<h3>{}</h3>",
        escape_html(&disaster_label(&record.disaster_type))
    );
    if let Some(title) = record.title.as_deref().filter(|t| !t.is_empty()) {
        let _ = write!(html, "<p class=\"title\">{}</p>", escape_html(title));
    }
    if let Some(magnitude) = record.magnitude {
        let _ = write!(html, "<p>Magnitude: {magnitude:.1}</p>");
    }
    if let Some(severity) = record.severity.as_deref().filter(|s| !s.is_empty()) {
        let _ = write!(html, "<p>Severity: {}</p>", escape_html(severity));
    }
    let _ = write!(
        html,
        "<p class=\"time\">{}</p>",
        format_time(record.occurred_at.as_ref())
    );
    if let Some(source) = record.source.as_deref().filter(|s| !s.is_empty()) {
        let _ = write!(html, "<p class=\"source\">Source: {}</p>", escape_html(source));
    }
    html.push_str("</div>");
    html
}

pub(crate) fn air_quality_style(record: &AirQualityRecord) -> MarkerStyle {
    MarkerStyle {
        color: AqiCategory::classify(record.aqi_value).color(),
        size: MarkerSize::for_aqi(record.aqi_value),
    }
}

pub(crate) fn air_quality_popup(record: &AirQualityRecord) -> String {
    let category = AqiCategory::classify(record.aqi_value);
    let city = record
        .city_name
        .as_deref()
        .filter(|c| !c.is_empty())
        .unwrap_or(UNKNOWN_CITY);
    let aqi = record
        .aqi_value
        .map_or_else(|| NOT_AVAILABLE.to_string(), |v| v.to_string());

    let mut html = String::from("<div class=\"popup aqi\">");
    let _ = write!(html, "<h3>{}</h3>", escape_html(city));
    let _ = write!(
        html,
        "<span class=\"badge\" style=\"background-color: {}\">AQI: {aqi} - {}</span>",
        category.color(),
        category.label()
    );
    let readings = record.pollutants.readings();
    if !readings.is_empty() {
        html.push_str("<ul class=\"pollutants\">");
        for (label, value, unit) in readings {
            let _ = write!(html, "<li>{label}: {value:.1} {unit}</li>");
        }
        html.push_str("</ul>");
    }
    let _ = write!(
        html,
        "<p class=\"time\">{}</p>",
        format_time(record.measured_at.as_ref())
    );
    html.push_str("</div>");
    html
}
