//! Typed endpoints of the backend API.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use world_map_models::{
    ApiEnvelope, AirQualityRecord, CityId, CityRecord, ComparisonResponse, DisasterRecord,
    HealthStatus, QueryParams,
};

use crate::http::HttpBackend;
use crate::{Backend, ClientConfig, ClientError};

/// Disaster events.
pub const DISASTERS_PATH: &str = "/disasters";
/// Distinct disaster types present in the backend.
pub const DISASTER_TYPES_PATH: &str = "/disasters/types";
/// Latest AQI measurement per city.
pub const AQI_LATEST_PATH: &str = "/aqi/latest";
/// City catalog.
pub const CITIES_PATH: &str = "/cities";
/// Multi-city AQI comparison.
pub const COMPARISON_PATH: &str = "/comparison/aqi";
/// Filtered disaster export.
pub const DOWNLOAD_DISASTERS_PATH: &str = "/download/disasters";
/// Filtered AQI export.
pub const DOWNLOAD_AQI_PATH: &str = "/download/aqi";
/// Liveness probe.
pub const HEALTH_PATH: &str = "/health";

/// Number of cities the comparison picker loads.
pub const DEFAULT_CITY_LIMIT: u32 = 50;

/// Parameters for [`ApiClient::cities`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CityQuery {
    /// Maximum number of cities to return.
    pub limit: u32,
    /// Case-insensitive match on city or country name.
    pub search: Option<String>,
    /// Case-insensitive match on country name.
    pub country: Option<String>,
}

impl Default for CityQuery {
    fn default() -> Self {
        Self {
            limit: DEFAULT_CITY_LIMIT,
            search: None,
            country: None,
        }
    }
}

impl CityQuery {
    fn params(&self) -> QueryParams {
        let mut params = QueryParams::new().with("limit", self.limit);
        params.push_opt("search", self.search.as_deref());
        params.push_opt("country", self.country.as_deref());
        params
    }
}

/// Typed access to the backend, shared by every dashboard component.
///
/// Cheap to clone; clones share the same [`Backend`].
#[derive(Clone)]
pub struct ApiClient {
    backend: Arc<dyn Backend>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient").finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Wraps an existing backend.
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Builds a client that talks HTTP according to `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        Ok(Self::new(Arc::new(HttpBackend::new(config)?)))
    }

    /// Fetches a `{success, data: [...]}` collection from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Backend`] when the backend reports failure or
    /// omits `data`, and propagates transport and decode errors.
    pub async fn records<T>(&self, path: &str, query: &QueryParams) -> Result<Vec<T>, ClientError>
    where
        T: DeserializeOwned,
    {
        self.enveloped(path, query).await
    }

    /// Fetches disasters matching `query`.
    ///
    /// # Errors
    ///
    /// See [`Self::records`].
    pub async fn disasters(&self, query: &QueryParams) -> Result<Vec<DisasterRecord>, ClientError> {
        self.records(DISASTERS_PATH, query).await
    }

    /// Fetches a single disaster by ID.
    ///
    /// # Errors
    ///
    /// See [`Self::records`].
    pub async fn disaster(&self, id: i64) -> Result<DisasterRecord, ClientError> {
        self.enveloped(&format!("{DISASTERS_PATH}/{id}"), &QueryParams::new())
            .await
    }

    /// Fetches the distinct disaster types the backend holds.
    ///
    /// # Errors
    ///
    /// See [`Self::records`].
    pub async fn disaster_types(&self) -> Result<Vec<String>, ClientError> {
        self.records(DISASTER_TYPES_PATH, &QueryParams::new()).await
    }

    /// Fetches the latest AQI measurement per city matching `query`.
    ///
    /// # Errors
    ///
    /// See [`Self::records`].
    pub async fn latest_air_quality(
        &self,
        query: &QueryParams,
    ) -> Result<Vec<AirQualityRecord>, ClientError> {
        self.records(AQI_LATEST_PATH, query).await
    }

    /// Fetches the city catalog.
    ///
    /// # Errors
    ///
    /// See [`Self::records`].
    pub async fn cities(&self, query: &CityQuery) -> Result<Vec<CityRecord>, ClientError> {
        self.records(CITIES_PATH, &query.params()).await
    }

    /// Fetches the latest AQI snapshot of each city in `city_ids`,
    /// optionally restricted to a single `date` (`YYYY-MM-DD`).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Backend`] when the backend reports failure,
    /// and propagates transport and decode errors.
    pub async fn compare_aqi(
        &self,
        city_ids: &[CityId],
        date: Option<&str>,
    ) -> Result<ComparisonResponse, ClientError> {
        let joined = city_ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let mut query = QueryParams::new().with("city_ids", joined);
        query.push_opt("date", date);

        let value = self.backend.get_json(COMPARISON_PATH, &query).await?;
        let response: ComparisonResponse = serde_json::from_value(value)?;
        if !response.success {
            return Err(ClientError::Backend {
                message: response
                    .error
                    .unwrap_or_else(|| "comparison failed".to_string()),
            });
        }
        Ok(response)
    }

    /// Downloads the raw bytes of an export endpoint.
    ///
    /// # Errors
    ///
    /// Propagates transport and status errors.
    pub async fn download(&self, path: &str, query: &QueryParams) -> Result<Vec<u8>, ClientError> {
        self.backend.get_bytes(path, query).await
    }

    /// Calls the liveness probe.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode errors.
    pub async fn health(&self) -> Result<HealthStatus, ClientError> {
        let value = self.backend.get_json(HEALTH_PATH, &QueryParams::new()).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn enveloped<T>(&self, path: &str, query: &QueryParams) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
    {
        let value = self.backend.get_json(path, query).await?;
        let envelope: ApiEnvelope<T> = serde_json::from_value(value)?;
        if !envelope.success {
            return Err(ClientError::Backend {
                message: envelope.failure_message(),
            });
        }
        envelope.data.ok_or_else(|| ClientError::Backend {
            message: format!("response from {path} carried no data"),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;

    /// Answers every request with a fixed body and records the queries.
    struct StaticBackend {
        body: serde_json::Value,
        requests: Mutex<Vec<(String, QueryParams)>>,
    }

    impl StaticBackend {
        fn new(body: serde_json::Value) -> Arc<Self> {
            Arc::new(Self {
                body,
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Backend for StaticBackend {
        async fn get_json(
            &self,
            path: &str,
            query: &QueryParams,
        ) -> Result<serde_json::Value, ClientError> {
            self.requests
                .lock()
                .unwrap()
                .push((path.to_string(), query.clone()));
            Ok(self.body.clone())
        }

        async fn get_bytes(
            &self,
            path: &str,
            query: &QueryParams,
        ) -> Result<Vec<u8>, ClientError> {
            self.requests
                .lock()
                .unwrap()
                .push((path.to_string(), query.clone()));
            Ok(self.body.to_string().into_bytes())
        }
    }

    #[tokio::test]
    async fn decodes_enveloped_collections() {
        let backend = StaticBackend::new(json!({
            "success": true,
            "count": 1,
            "data": [{
                "id": 3,
                "disaster_type": "earthquake",
                "latitude": 35.0,
                "longitude": 139.0,
                "occurred_at": "2024-01-01T07:10:00",
                "magnitude": 7.5
            }]
        }));
        let client = ApiClient::new(backend.clone());

        let records = client.disasters(&QueryParams::new()).await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].magnitude, Some(7.5));
        assert_eq!(backend.requests.lock().unwrap()[0].0, DISASTERS_PATH);
    }

    #[tokio::test]
    async fn null_coordinate_does_not_reject_the_collection() {
        let backend = StaticBackend::new(json!({
            "success": true,
            "data": [
                {
                    "id": 1,
                    "disaster_type": "earthquake",
                    "latitude": 35.0,
                    "longitude": 139.0
                },
                {
                    "id": 2,
                    "disaster_type": "storm",
                    "latitude": 5.5,
                    "longitude": null
                }
            ]
        }));
        let client = ApiClient::new(backend);

        let records = client.disasters(&QueryParams::new()).await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].latitude, 5.5);
        assert_eq!(records[1].longitude, 0.0);
    }

    #[tokio::test]
    async fn success_false_is_a_backend_error() {
        let client = ApiClient::new(StaticBackend::new(json!({
            "success": false,
            "error": "database unavailable"
        })));

        let err = client
            .latest_air_quality(&QueryParams::new())
            .await
            .unwrap_err();

        match err {
            ClientError::Backend { message } => assert_eq!(message, "database unavailable"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_data_is_a_backend_error() {
        let client = ApiClient::new(StaticBackend::new(json!({ "success": true })));
        let err = client.disaster_types().await.unwrap_err();
        assert!(matches!(err, ClientError::Backend { .. }));
    }

    #[tokio::test]
    async fn comparison_joins_city_ids_with_commas() {
        let backend = StaticBackend::new(json!({
            "success": true,
            "comparison_date": "2024-05-01",
            "cities": [],
            "statistics": {}
        }));
        let client = ApiClient::new(backend.clone());

        client
            .compare_aqi(&[CityId(4), CityId(9), CityId(1)], None)
            .await
            .unwrap();

        let requests = backend.requests.lock().unwrap();
        let (path, query) = &requests[0];
        assert_eq!(path, COMPARISON_PATH);
        assert_eq!(query.get("city_ids"), Some("4,9,1"));
        assert_eq!(query.get("date"), None);
    }

    #[tokio::test]
    async fn city_catalog_sends_default_limit() {
        let backend = StaticBackend::new(json!({ "success": true, "data": [] }));
        let client = ApiClient::new(backend.clone());

        client.cities(&CityQuery::default()).await.unwrap();

        let requests = backend.requests.lock().unwrap();
        assert_eq!(requests[0].1.keys(), vec!["limit"]);
        assert_eq!(requests[0].1.get("limit"), Some("50"));
    }
}
