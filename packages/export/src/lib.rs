#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Export of filtered disaster and AQI data.
//!
//! The backend renders the file; this crate only builds the request from
//! the active filters and passes the response bytes through unchanged.
//! Failed downloads are reported once and never resumed or retried.

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;
use world_map_client::{
    ApiClient, ClientError,
    api::{DOWNLOAD_AQI_PATH, DOWNLOAD_DISASTERS_PATH},
};
use world_map_filter::{
    FilterState, FilterStore,
    query::{DATE_FORMAT, air_quality_query, disaster_query},
};
use world_map_models::QueryParams;

/// Errors from [`ExportPipeline`].
#[derive(Debug, Error)]
pub enum ExportError {
    /// The download request failed.
    #[error("Error downloading {data_type} data: {source}")]
    Request {
        /// Data set requested.
        data_type: DataType,
        /// Underlying client error.
        source: ClientError,
    },

    /// The payload could not be written to disk.
    #[error("Failed to write {}: {source}", path.display())]
    Io {
        /// Destination path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Data set to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum DataType {
    /// Disaster events.
    Disasters,
    /// Air-quality measurements.
    #[strum(to_string = "aqi", serialize = "air_quality")]
    AirQuality,
}

impl DataType {
    /// Returns every data type.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Disasters, Self::AirQuality]
    }

    /// File name stem, also the backend's name for the data set.
    #[must_use]
    pub const fn stem(self) -> &'static str {
        match self {
            Self::Disasters => "disasters",
            Self::AirQuality => "aqi",
        }
    }

    /// Download endpoint for this data set.
    #[must_use]
    pub const fn endpoint(self) -> &'static str {
        match self {
            Self::Disasters => DOWNLOAD_DISASTERS_PATH,
            Self::AirQuality => DOWNLOAD_AQI_PATH,
        }
    }

    /// Translates `filters` with the same rules the map layer for this
    /// data set uses.
    #[must_use]
    pub fn filter_query(self, filters: &FilterState) -> QueryParams {
        match self {
            Self::Disasters => disaster_query(filters),
            Self::AirQuality => air_quality_query(filters),
        }
    }
}

/// File format rendered by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ExportFormat {
    /// Comma-separated values.
    #[default]
    Csv,
    /// JSON array.
    Json,
    /// GeoJSON `FeatureCollection`.
    GeoJson,
}

impl ExportFormat {
    /// Returns every format.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Csv, Self::Json, Self::GeoJson]
    }

    /// File extension, also the `format` query value.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::GeoJson => "geojson",
        }
    }
}

/// Builds the download query: `format` followed by the data set's filter
/// parameters. With empty filters only `format` is sent.
#[must_use]
pub fn export_query(data_type: DataType, format: ExportFormat, filters: &FilterState) -> QueryParams {
    let mut params = QueryParams::new().with("format", format.extension());
    for (key, value) in data_type.filter_query(filters).as_pairs() {
        params.push(*key, value);
    }
    params
}

/// File name for an export requested on `date`:
/// `<stem>_<YYYY-MM-DD>.<extension>`.
#[must_use]
pub fn file_name(data_type: DataType, format: ExportFormat, date: NaiveDate) -> String {
    format!(
        "{}_{}.{}",
        data_type.stem(),
        date.format(DATE_FORMAT),
        format.extension()
    )
}

/// A downloaded export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPayload {
    /// Suggested file name.
    pub file_name: String,
    /// Response body, unmodified.
    pub bytes: Vec<u8>,
}

/// Requests filtered files from the backend.
#[derive(Debug, Clone)]
pub struct ExportPipeline {
    client: ApiClient,
}

impl ExportPipeline {
    /// Creates a pipeline backed by `client`.
    #[must_use]
    pub const fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Downloads `data_type` in `format`, restricted by `filters`.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Request`] if the download fails.
    pub async fn export(
        &self,
        data_type: DataType,
        format: ExportFormat,
        filters: &FilterState,
    ) -> Result<ExportPayload, ExportError> {
        let query = export_query(data_type, format, filters);
        if !filters.has_active_filters() {
            log::info!("No filters active, exporting all {data_type} data");
        }
        log::debug!("Exporting {data_type} as {format}: {query}");

        let bytes = self
            .client
            .download(data_type.endpoint(), &query)
            .await
            .map_err(|source| {
                log::error!("Error downloading {data_type} data: {source}");
                ExportError::Request { data_type, source }
            })?;

        Ok(ExportPayload {
            file_name: file_name(data_type, format, Utc::now().date_naive()),
            bytes,
        })
    }

    /// Like [`Self::export`], reading the filters from `store`.
    ///
    /// # Errors
    ///
    /// See [`Self::export`].
    pub async fn export_current(
        &self,
        data_type: DataType,
        format: ExportFormat,
        store: &FilterStore,
    ) -> Result<ExportPayload, ExportError> {
        self.export(data_type, format, &store.get()).await
    }

    /// Downloads an export and writes it into `dir` under its suggested
    /// file name. Returns the written path.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Request`] if the download fails, or
    /// [`ExportError::Io`] if the file cannot be written.
    pub async fn save(
        &self,
        data_type: DataType,
        format: ExportFormat,
        filters: &FilterState,
        dir: &Path,
    ) -> Result<PathBuf, ExportError> {
        let payload = self.export(data_type, format, filters).await?;

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| ExportError::Io {
                path: dir.to_path_buf(),
                source,
            })?;

        let path = dir.join(&payload.file_name);
        tokio::fs::write(&path, &payload.bytes)
            .await
            .map_err(|source| ExportError::Io {
                path: path.clone(),
                source,
            })?;

        log::info!(
            "Wrote {} byte(s) of {data_type} data to {}",
            payload.bytes.len(),
            path.display()
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use world_map_client::Backend;
    use world_map_filter::{AqiRange, DateRange, FilterPatch};

    use super::*;

    /// Returns `body` for every download and records requests.
    struct FakeDownloadBackend {
        body: Result<Vec<u8>, u16>,
        requests: Mutex<Vec<(String, QueryParams)>>,
    }

    impl FakeDownloadBackend {
        fn new(body: Result<Vec<u8>, u16>) -> Arc<Self> {
            Arc::new(Self {
                body,
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Backend for FakeDownloadBackend {
        async fn get_json(
            &self,
            _: &str,
            _: &QueryParams,
        ) -> Result<serde_json::Value, ClientError> {
            unreachable!("exports only download bytes")
        }

        async fn get_bytes(&self, path: &str, query: &QueryParams) -> Result<Vec<u8>, ClientError> {
            self.requests
                .lock()
                .unwrap()
                .push((path.to_string(), query.clone()));
            self.body.clone().map_err(|status| ClientError::Status {
                url: path.to_string(),
                status,
                message: "Internal Server Error".to_string(),
            })
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn unfiltered_export_sends_only_format() {
        let backend = FakeDownloadBackend::new(Ok(b"id,type\n".to_vec()));
        let pipeline = ExportPipeline::new(ApiClient::new(backend.clone()));

        let payload = pipeline
            .export(DataType::Disasters, ExportFormat::GeoJson, &FilterState::default())
            .await
            .unwrap();

        let requests = backend.requests.lock().unwrap();
        let (path, query) = &requests[0];
        assert_eq!(path, DOWNLOAD_DISASTERS_PATH);
        assert_eq!(query.keys(), vec!["format"]);
        assert_eq!(query.get("format"), Some("geojson"));
        assert_eq!(payload.bytes, b"id,type\n");
    }

    #[test]
    fn export_query_uses_the_data_set_filters() {
        let store = FilterStore::new();
        store.merge(
            FilterPatch::new()
                .disaster_types(["wildfire", "flood"])
                .date_range(DateRange::between(date(2024, 1, 1), date(2024, 6, 1)))
                .aqi_range(AqiRange {
                    min: Some(100),
                    max: None,
                })
                .city_search("Lima"),
        );
        let filters = store.get();

        let disasters = export_query(DataType::Disasters, ExportFormat::Csv, &filters);
        assert_eq!(
            disasters.keys(),
            vec!["format", "disaster_type", "start_date", "end_date"]
        );
        assert_eq!(disasters.get("disaster_type"), Some("wildfire"));

        let aqi = export_query(DataType::AirQuality, ExportFormat::Json, &filters);
        assert_eq!(aqi.to_string(), "format=json&city_name=Lima&min_aqi=100");
    }

    #[test]
    fn file_names_follow_stem_date_extension() {
        let day = date(2024, 5, 1);
        assert_eq!(
            file_name(DataType::Disasters, ExportFormat::Csv, day),
            "disasters_2024-05-01.csv"
        );
        assert_eq!(
            file_name(DataType::AirQuality, ExportFormat::GeoJson, day),
            "aqi_2024-05-01.geojson"
        );
    }

    #[test]
    fn parses_data_types_and_formats() {
        assert_eq!("aqi".parse::<DataType>().unwrap(), DataType::AirQuality);
        assert_eq!("disasters".parse::<DataType>().unwrap(), DataType::Disasters);
        assert_eq!("geojson".parse::<ExportFormat>().unwrap(), ExportFormat::GeoJson);
        assert!("xlsx".parse::<ExportFormat>().is_err());
    }

    #[tokio::test]
    async fn save_writes_payload_unmodified() {
        let body = b"{\"type\":\"FeatureCollection\",\"features\":[]}".to_vec();
        let backend = FakeDownloadBackend::new(Ok(body.clone()));
        let pipeline = ExportPipeline::new(ApiClient::new(backend));
        let dir = tempfile::tempdir().unwrap();

        let path = pipeline
            .save(
                DataType::AirQuality,
                ExportFormat::GeoJson,
                &FilterState::default(),
                dir.path(),
            )
            .await
            .unwrap();

        assert_eq!(path.parent().unwrap(), dir.path());
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("aqi_") && name.ends_with(".geojson"));
        assert_eq!(std::fs::read(&path).unwrap(), body);
    }

    #[tokio::test]
    async fn failed_download_writes_nothing() {
        let backend = FakeDownloadBackend::new(Err(500));
        let pipeline = ExportPipeline::new(ApiClient::new(backend));
        let dir = tempfile::tempdir().unwrap();

        let err = pipeline
            .save(
                DataType::Disasters,
                ExportFormat::Csv,
                &FilterState::default(),
                dir.path(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ExportError::Request {
                data_type: DataType::Disasters,
                source: ClientError::Status { status: 500, .. }
            }
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
