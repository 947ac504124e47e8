//! Per-kind behavior plugged into [`crate::GeospatialDataLayer`].

use serde::{Serialize, de::DeserializeOwned};
use world_map_client::api::{AQI_LATEST_PATH, DISASTERS_PATH};
use world_map_filter::{
    FilterState,
    query::{air_quality_query, disaster_query},
};
use world_map_models::{AirQualityRecord, DisasterRecord, QueryParams};

use crate::marker::{
    MarkerDescriptor, MarkerStyle, Position, air_quality_popup, air_quality_style,
    disaster_popup, disaster_style,
};

/// Everything that differs between the record kinds a layer can hold.
pub trait LayerKind: Send + Sync + 'static {
    /// Record type fetched from [`Self::ENDPOINT`].
    type Record: DeserializeOwned + Serialize + Clone + Send + Sync + 'static;

    /// Name used in logs and errors.
    const NAME: &'static str;

    /// API path the records are fetched from.
    const ENDPOINT: &'static str;

    /// Translates the filters into this kind's query parameters.
    fn query(filters: &FilterState) -> QueryParams;

    /// Backend ID of `record`.
    fn id(record: &Self::Record) -> i64;

    /// Position of `record`.
    fn position(record: &Self::Record) -> Position;

    /// Marker style of `record`.
    fn style(record: &Self::Record) -> MarkerStyle;

    /// Sanitized HTML popup of `record`.
    fn popup(record: &Self::Record) -> String;

    /// Builds the full marker descriptor of `record`.
    fn marker(record: &Self::Record) -> MarkerDescriptor {
        MarkerDescriptor {
            id: Self::id(record),
            position: Self::position(record),
            style: Self::style(record),
            popup: Self::popup(record),
        }
    }
}

/// Disaster events from `/disasters`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Disasters;

impl LayerKind for Disasters {
    type Record = DisasterRecord;

    const NAME: &'static str = "disasters";
    const ENDPOINT: &'static str = DISASTERS_PATH;

    fn query(filters: &FilterState) -> QueryParams {
        disaster_query(filters)
    }

    fn id(record: &DisasterRecord) -> i64 {
        record.id
    }

    fn position(record: &DisasterRecord) -> Position {
        Position {
            lat: record.latitude,
            lon: record.longitude,
        }
    }

    fn style(record: &DisasterRecord) -> MarkerStyle {
        disaster_style(record)
    }

    fn popup(record: &DisasterRecord) -> String {
        disaster_popup(record)
    }
}

/// Latest air-quality measurements from `/aqi/latest`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AirQuality;

impl LayerKind for AirQuality {
    type Record = AirQualityRecord;

    const NAME: &'static str = "air quality";
    const ENDPOINT: &'static str = AQI_LATEST_PATH;

    fn query(filters: &FilterState) -> QueryParams {
        air_quality_query(filters)
    }

    fn id(record: &AirQualityRecord) -> i64 {
        record.id
    }

    fn position(record: &AirQualityRecord) -> Position {
        Position {
            lat: record.latitude,
            lon: record.longitude,
        }
    }

    fn style(record: &AirQualityRecord) -> MarkerStyle {
        air_quality_style(record)
    }

    fn popup(record: &AirQualityRecord) -> String {
        air_quality_popup(record)
    }
}
