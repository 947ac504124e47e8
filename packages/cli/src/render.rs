//! Plain-text rendering of dashboard output.

use std::fmt::Write as _;

use world_map_classify::{AqiCategory, MarkerSize, SeverityTier, disaster_color, disaster_label};
use world_map_comparison::ComparisonResult;
use world_map_models::{AirQualityRecord, CityRecord, DisasterRecord};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

fn time_or_unknown(at: Option<&chrono::DateTime<chrono::Utc>>) -> String {
    at.map_or_else(
        || "Unknown time".to_string(),
        |t| t.format(TIME_FORMAT).to_string(),
    )
}

/// One line per disaster marker.
pub fn disaster_line(record: &DisasterRecord) -> String {
    let mut line = format!(
        "#{:<6} {:<18} {:>8.3}, {:>9.3}  {}  {}",
        record.id,
        disaster_label(&record.disaster_type),
        record.latitude,
        record.longitude,
        disaster_color(&record.disaster_type),
        time_or_unknown(record.occurred_at.as_ref()),
    );
    if let Some(magnitude) = record.magnitude {
        let _ = write!(line, "  M{magnitude:.1}");
    }
    let severity = SeverityTier::parse(record.severity.as_deref());
    if severity != SeverityTier::Unknown {
        let _ = write!(line, "  severity {severity}");
    }
    if let Some(title) = record.title.as_deref().filter(|t| !t.is_empty()) {
        let _ = write!(line, "  {title}");
    }
    line
}

/// One line per air-quality marker.
pub fn air_quality_line(record: &AirQualityRecord) -> String {
    let category = AqiCategory::classify(record.aqi_value);
    let aqi = record
        .aqi_value
        .map_or_else(|| "N/A".to_string(), |v| v.to_string());
    let size = match MarkerSize::for_aqi(record.aqi_value) {
        MarkerSize::Regular => "",
        MarkerSize::Large => " (large)",
    };
    format!(
        "#{:<6} {:<18} {:>8.3}, {:>9.3}  AQI {:>3} {:<30} {}{size}  {}",
        record.id,
        record.city_name.as_deref().unwrap_or("Unknown City"),
        record.latitude,
        record.longitude,
        aqi,
        category.label(),
        category.color(),
        time_or_unknown(record.measured_at.as_ref()),
    )
}

/// One line per city.
pub fn city_line(city: &CityRecord) -> String {
    let code = city
        .country_code
        .as_deref()
        .map_or_else(String::new, |c| format!(" ({c})"));
    format!(
        "{:>6}  {}, {}{code}  [{:.3}, {:.3}]",
        city.id, city.name, city.country, city.latitude, city.longitude
    )
}

/// Comparison table followed by statistics and any missing cities.
pub fn comparison_table(result: &ComparisonResult) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "AQI comparison for {}",
        result.comparison_date.as_deref().unwrap_or("latest measurements")
    );
    let _ = writeln!(out, "{:<20} {:>5}  {:<30} {:>8}", "City", "AQI", "Category", "PM2.5");

    for city in &result.cities {
        let category = AqiCategory::classify(city.aqi_value);
        let name = city
            .city_name
            .clone()
            .unwrap_or_else(|| format!("City {}", city.city_id));
        let aqi = city
            .aqi_value
            .map_or_else(|| "N/A".to_string(), |v| v.to_string());
        let pm25 = city
            .pollutants
            .pm25
            .map_or_else(|| "N/A".to_string(), |v| format!("{v:.1}"));
        let _ = writeln!(out, "{name:<20} {aqi:>5}  {:<30} {pm25:>8}", category.label());
    }

    match &result.statistics {
        Some(stats) => {
            let _ = writeln!(
                out,
                "Highest {} | Lowest {} | Mean {:.1} ({} of {} cities)",
                stats.max,
                stats.min,
                stats.mean,
                stats.sample_size,
                result.cities.len() + result.missing_cities.len()
            );
        }
        None => {
            let _ = writeln!(out, "No AQI values available for these cities");
        }
    }

    if result.is_partial() {
        let ids: Vec<String> = result
            .missing_cities
            .iter()
            .map(ToString::to_string)
            .collect();
        let _ = writeln!(
            out,
            "Partial result: no data for city ID(s) {}",
            ids.join(", ")
        );
    }
    out
}
