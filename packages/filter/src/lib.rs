#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared filter state for the world map dashboard.
//!
//! A single [`FilterStore`] owns the [`FilterState`] for the whole session.
//! Every consumer (map layers, comparison, export) reads it; only the
//! store's own entry points mutate it, and every mutation synchronously
//! notifies all subscribers with one consistent snapshot.
//!
//! The [`query`] module translates a snapshot into backend query
//! parameters for each data type.

pub mod query;
pub mod store;

use chrono::NaiveDate;
use world_map_models::CityId;

pub use store::{FilterStore, SelectionChange, Subscription};

/// Maximum number of cities that can be selected for comparison.
pub const MAX_SELECTED_CITIES: usize = 5;

/// Minimum number of cities a comparison needs.
pub const MIN_SELECTED_CITIES: usize = 2;

/// Inclusive date window. Either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    /// First day included.
    pub start: Option<NaiveDate>,
    /// Last day included.
    pub end: Option<NaiveDate>,
}

impl DateRange {
    /// Creates a range with both ends set.
    #[must_use]
    pub const fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Returns `true` if neither end is set.
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Inclusive AQI window. Either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AqiRange {
    /// Lowest AQI included.
    pub min: Option<u32>,
    /// Highest AQI included.
    pub max: Option<u32>,
}

impl AqiRange {
    /// Returns `true` if neither end is set.
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// The dashboard's filter state.
///
/// Every field is independently optional; the default (all empty) state
/// requests unfiltered data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    /// Selected disaster types, in selection order, without duplicates.
    pub disaster_types: Vec<String>,
    /// Disaster occurrence window.
    pub date_range: DateRange,
    /// AQI value window.
    pub aqi_range: AqiRange,
    /// Free-text city name search.
    pub city_search: String,
    /// Cities selected for comparison, in selection order, at most
    /// [`MAX_SELECTED_CITIES`] unique entries.
    pub selected_cities: Vec<CityId>,
}

impl FilterState {
    /// Returns `true` if any filter that restricts fetched data is set.
    ///
    /// City selection only drives comparisons and is not counted.
    #[must_use]
    pub fn has_active_filters(&self) -> bool {
        !self.disaster_types.is_empty()
            || !self.date_range.is_unbounded()
            || !self.aqi_range.is_unbounded()
            || !self.city_search.trim().is_empty()
    }

    /// Replaces every field present in `patch`, wholesale.
    pub(crate) fn apply(&mut self, patch: FilterPatch) {
        let FilterPatch {
            disaster_types,
            date_range,
            aqi_range,
            city_search,
            selected_cities,
        } = patch;

        if let Some(types) = disaster_types {
            self.disaster_types = dedup_preserving_order(types);
        }
        if let Some(range) = date_range {
            self.date_range = range;
        }
        if let Some(range) = aqi_range {
            self.aqi_range = range;
        }
        if let Some(search) = city_search {
            self.city_search = search;
        }
        if let Some(cities) = selected_cities {
            let mut cities = dedup_preserving_order(cities);
            if cities.len() > MAX_SELECTED_CITIES {
                log::warn!(
                    "Selection of {} cities exceeds the limit of {MAX_SELECTED_CITIES}, keeping the first {MAX_SELECTED_CITIES}",
                    cities.len()
                );
                cities.truncate(MAX_SELECTED_CITIES);
            }
            self.selected_cities = cities;
        }
    }
}

/// A partial update for [`FilterStore::merge`].
///
/// Each `Some` field replaces the corresponding state field entirely;
/// nested ranges are never deep-merged. To change only the start of the
/// date range, pass the whole [`DateRange`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterPatch {
    /// Replacement disaster type selection.
    pub disaster_types: Option<Vec<String>>,
    /// Replacement date window.
    pub date_range: Option<DateRange>,
    /// Replacement AQI window.
    pub aqi_range: Option<AqiRange>,
    /// Replacement city search text.
    pub city_search: Option<String>,
    /// Replacement comparison selection.
    pub selected_cities: Option<Vec<CityId>>,
}

impl FilterPatch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the disaster type selection.
    #[must_use]
    pub fn disaster_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disaster_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the date window.
    #[must_use]
    pub const fn date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    /// Sets the AQI window.
    #[must_use]
    pub const fn aqi_range(mut self, range: AqiRange) -> Self {
        self.aqi_range = Some(range);
        self
    }

    /// Sets the city search text.
    #[must_use]
    pub fn city_search(mut self, search: impl Into<String>) -> Self {
        self.city_search = Some(search.into());
        self
    }

    /// Sets the comparison selection.
    #[must_use]
    pub fn selected_cities<I>(mut self, cities: I) -> Self
    where
        I: IntoIterator<Item = CityId>,
    {
        self.selected_cities = Some(cities.into_iter().collect());
        self
    }
}

fn dedup_preserving_order<T: PartialEq>(items: Vec<T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}
