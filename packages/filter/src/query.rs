//! Translation of a [`FilterState`] into backend query parameters.
//!
//! The same rules feed the map layers and the export pipeline. Unset
//! filter values are omitted from the query entirely.

use world_map_models::QueryParams;

use crate::FilterState;

/// Format used for `start_date` / `end_date`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Builds the `/disasters` query: `disaster_type`, `start_date`,
/// `end_date`.
///
/// The backend filters on a single type per request, so only the first
/// selected type (in selection order) is sent even when several are
/// selected.
#[must_use]
pub fn disaster_query(filters: &FilterState) -> QueryParams {
    let mut params = QueryParams::new();
    params.push_opt("disaster_type", filters.disaster_types.first());
    params.push_opt(
        "start_date",
        filters.date_range.start.map(|d| d.format(DATE_FORMAT)),
    );
    params.push_opt(
        "end_date",
        filters.date_range.end.map(|d| d.format(DATE_FORMAT)),
    );
    params
}

/// Builds the `/aqi/latest` query: `city_name`, `min_aqi`, `max_aqi`.
///
/// How `city_name` matches (substring, prefix) is up to the backend.
#[must_use]
pub fn air_quality_query(filters: &FilterState) -> QueryParams {
    let mut params = QueryParams::new();
    let search = filters.city_search.trim();
    if !search.is_empty() {
        params.push("city_name", search);
    }
    params.push_opt("min_aqi", filters.aqi_range.min);
    params.push_opt("max_aqi", filters.aqi_range.max);
    params
}
