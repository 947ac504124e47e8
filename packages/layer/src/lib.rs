#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Map layers that keep a record collection in sync with the filters.
//!
//! One generic [`GeospatialDataLayer`] holds the fetch, loading-state and
//! supersession logic; a [`LayerKind`] supplies everything that differs
//! between record kinds (endpoint, query translation, marker style and
//! popup). [`DisasterLayer`] and [`AirQualityLayer`] are the two
//! instantiations the dashboard uses.

pub mod kind;
pub mod layer;
pub mod marker;

use thiserror::Error;
use world_map_client::ClientError;

pub use kind::{AirQuality, Disasters, LayerKind};
pub use layer::{GeospatialDataLayer, RefreshOutcome};
pub use marker::{MarkerDescriptor, MarkerStyle, Position};

/// Layer of disaster events.
pub type DisasterLayer = GeospatialDataLayer<Disasters>;

/// Layer of latest air-quality measurements.
pub type AirQualityLayer = GeospatialDataLayer<AirQuality>;

/// Errors from layer operations.
#[derive(Debug, Error)]
pub enum LayerError {
    /// The backend request for the latest refresh failed. The previously
    /// held collection is unchanged.
    #[error("Failed to load {layer}: {source}")]
    Fetch {
        /// Layer name.
        layer: &'static str,
        /// Underlying client error.
        source: ClientError,
    },

    /// A held record could not be converted to GeoJSON properties.
    #[error("Failed to convert {layer} record {id} to GeoJSON: {source}")]
    GeoJson {
        /// Layer name.
        layer: &'static str,
        /// Record ID.
        id: i64,
        /// Underlying serialization error.
        source: serde_json::Error,
    },
}
