#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Side-by-side AQI comparison of a handful of cities.
//!
//! The selection is validated before any request is made. Statistics are
//! recomputed from the snapshots the backend actually returned, and cities
//! the backend left out are reported rather than silently dropped.

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use world_map_client::{ApiClient, ClientError};
use world_map_filter::{FilterStore, MAX_SELECTED_CITIES, MIN_SELECTED_CITIES, query::DATE_FORMAT};
use world_map_models::{BackendStatistics, CityId, CitySnapshot};

/// Errors from [`ComparisonEngine`].
#[derive(Debug, Error)]
pub enum ComparisonError {
    /// The selection does not hold between
    /// [`MIN_SELECTED_CITIES`] and [`MAX_SELECTED_CITIES`] unique cities.
    #[error(
        "Please select between {min} and {max} cities to compare ({count} selected)",
        min = MIN_SELECTED_CITIES,
        max = MAX_SELECTED_CITIES
    )]
    CityCount {
        /// Number of unique cities given.
        count: usize,
    },

    /// The comparison request failed.
    #[error("Error comparing cities: {source}")]
    Request {
        /// Underlying client error.
        #[from]
        source: ClientError,
    },
}

/// AQI statistics over the cities that reported a value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AqiStatistics {
    /// Highest AQI.
    pub max: i32,
    /// Lowest AQI.
    pub min: i32,
    /// Mean AQI.
    pub mean: f64,
    /// Number of cities the statistics cover.
    pub sample_size: usize,
}

impl AqiStatistics {
    /// Computes statistics over the snapshots that carry an AQI value.
    ///
    /// Returns `None` if no snapshot does.
    #[must_use]
    pub fn from_snapshots(snapshots: &[CitySnapshot]) -> Option<Self> {
        let values: Vec<i32> = snapshots.iter().filter_map(|s| s.aqi_value).collect();
        let max = *values.iter().max()?;
        let min = *values.iter().min()?;
        let sum: i64 = values.iter().copied().map(i64::from).sum();
        #[allow(clippy::cast_precision_loss)]
        let mean = sum as f64 / values.len() as f64;

        Some(Self {
            max,
            min,
            mean,
            sample_size: values.len(),
        })
    }
}

/// Outcome of a successful comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    /// Date the comparison refers to, as reported by the backend.
    pub comparison_date: Option<String>,
    /// Per-city snapshots, in backend order.
    pub cities: Vec<CitySnapshot>,
    /// Statistics over `cities`; `None` if no city had an AQI value.
    pub statistics: Option<AqiStatistics>,
    /// Requested cities the backend returned no snapshot for.
    pub missing_cities: Vec<CityId>,
    /// Statistics as computed by the backend, kept for reference.
    pub backend_statistics: BackendStatistics,
}

impl ComparisonResult {
    /// Returns `true` if some requested cities are absent from the result,
    /// so the statistics cover fewer cities than were selected.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.missing_cities.is_empty()
    }

    /// Snapshots without an AQI value; they do not contribute to the
    /// statistics.
    pub fn cities_without_aqi(&self) -> impl Iterator<Item = &CitySnapshot> {
        self.cities.iter().filter(|c| c.aqi_value.is_none())
    }
}

/// Deduplicates `city_ids` (keeping first occurrences) and checks the
/// unique count is within bounds.
///
/// # Errors
///
/// Returns [`ComparisonError::CityCount`] if fewer than
/// [`MIN_SELECTED_CITIES`] or more than [`MAX_SELECTED_CITIES`] unique
/// cities remain.
pub fn validate_selection(city_ids: &[CityId]) -> Result<Vec<CityId>, ComparisonError> {
    let mut unique = Vec::with_capacity(city_ids.len());
    for id in city_ids {
        if !unique.contains(id) {
            unique.push(*id);
        }
    }
    if (MIN_SELECTED_CITIES..=MAX_SELECTED_CITIES).contains(&unique.len()) {
        Ok(unique)
    } else {
        Err(ComparisonError::CityCount {
            count: unique.len(),
        })
    }
}

/// Compares the latest AQI of 2 to 5 cities.
#[derive(Debug, Clone)]
pub struct ComparisonEngine {
    client: ApiClient,
}

impl ComparisonEngine {
    /// Creates an engine backed by `client`.
    #[must_use]
    pub const fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Compares the latest measurements of `city_ids`.
    ///
    /// # Errors
    ///
    /// Returns [`ComparisonError::CityCount`] without making a request if
    /// the selection is out of bounds, or [`ComparisonError::Request`] if
    /// the backend call fails.
    pub async fn compare(&self, city_ids: &[CityId]) -> Result<ComparisonResult, ComparisonError> {
        self.compare_on(city_ids, None).await
    }

    /// Compares the cities currently selected in `store`.
    ///
    /// # Errors
    ///
    /// See [`Self::compare`].
    pub async fn compare_selected(
        &self,
        store: &FilterStore,
    ) -> Result<ComparisonResult, ComparisonError> {
        let selected = store.get().selected_cities;
        self.compare(&selected).await
    }

    /// Compares `city_ids` as of `date`, or their latest measurements if
    /// `date` is `None`.
    ///
    /// # Errors
    ///
    /// See [`Self::compare`].
    pub async fn compare_on(
        &self,
        city_ids: &[CityId],
        date: Option<NaiveDate>,
    ) -> Result<ComparisonResult, ComparisonError> {
        let city_ids = validate_selection(city_ids)?;
        let date = date.map(|d| d.format(DATE_FORMAT).to_string());

        log::debug!("Comparing {} cities (date: {date:?})", city_ids.len());
        let response = self
            .client
            .compare_aqi(&city_ids, date.as_deref())
            .await
            .inspect_err(|e| log::error!("City comparison failed: {e}"))?;

        let missing_cities: Vec<CityId> = city_ids
            .iter()
            .copied()
            .filter(|id| !response.cities.iter().any(|c| c.city_id == *id))
            .collect();
        if !missing_cities.is_empty() {
            log::warn!(
                "Backend returned no data for {} of {} cities: {missing_cities:?}",
                missing_cities.len(),
                city_ids.len()
            );
        }

        let statistics = AqiStatistics::from_snapshots(&response.cities);

        Ok(ComparisonResult {
            comparison_date: response.comparison_date,
            cities: response.cities,
            statistics,
            missing_cities,
            backend_statistics: response.statistics,
        })
    }
}
