#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! The dashboard's data flow.
//!
//! Filter edits go to the [`FilterStore`]. Once [`Dashboard::attach`]ed,
//! every store notification spawns one refresh per map layer; the
//! refreshes race independently and each layer keeps only the result of
//! its latest request. Comparison and export read the store on demand.
//!
//! Failures never escape to the caller of a background refresh: they are
//! logged and recorded as [`Notice`]s, and the affected layer keeps its
//! last good data.

pub mod notice;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use world_map_client::ApiClient;
use world_map_comparison::{ComparisonEngine, ComparisonError, ComparisonResult};
use world_map_export::{DataType, ExportError, ExportFormat, ExportPipeline};
use world_map_filter::{FilterState, FilterStore, Subscription};
use world_map_layer::{
    AirQualityLayer, DisasterLayer, GeospatialDataLayer, LayerKind, RefreshOutcome,
};

pub use notice::{Notice, NoticeKind, NoticeLog, NoticeSource};

/// Filter store, both map layers, comparison and export, sharing one
/// [`ApiClient`].
pub struct Dashboard {
    store: FilterStore,
    disasters: Arc<DisasterLayer>,
    air_quality: Arc<AirQualityLayer>,
    comparison: ComparisonEngine,
    export: ExportPipeline,
    notices: Arc<NoticeLog>,
    subscription: Mutex<Option<Subscription>>,
    pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl std::fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("store", &self.store)
            .field("disasters", &self.disasters)
            .field("air_quality", &self.air_quality)
            .field("attached", &self.is_attached())
            .finish_non_exhaustive()
    }
}

impl Dashboard {
    /// Creates a detached dashboard with empty filters and layers.
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self {
            store: FilterStore::new(),
            disasters: Arc::new(DisasterLayer::new(client.clone())),
            air_quality: Arc::new(AirQualityLayer::new(client.clone())),
            comparison: ComparisonEngine::new(client.clone()),
            export: ExportPipeline::new(client),
            notices: Arc::new(NoticeLog::default()),
            subscription: Mutex::new(None),
            pending: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The filter store.
    #[must_use]
    pub const fn store(&self) -> &FilterStore {
        &self.store
    }

    /// The disaster layer.
    #[must_use]
    pub const fn disasters(&self) -> &Arc<DisasterLayer> {
        &self.disasters
    }

    /// The air-quality layer.
    #[must_use]
    pub const fn air_quality(&self) -> &Arc<AirQualityLayer> {
        &self.air_quality
    }

    /// Subscribes both layers to the store. Each notification spawns one
    /// refresh task per layer on `runtime`.
    ///
    /// Attaching an already attached dashboard does nothing.
    pub fn attach(&self, runtime: Handle) {
        let mut subscription = lock(&self.subscription);
        if subscription.is_some() {
            return;
        }

        let disasters = Arc::clone(&self.disasters);
        let air_quality = Arc::clone(&self.air_quality);
        let notices = Arc::clone(&self.notices);
        let pending = Arc::clone(&self.pending);

        *subscription = Some(self.store.subscribe(move |filters| {
            let tasks = [
                spawn_refresh(&runtime, &disasters, filters, &notices),
                spawn_refresh(&runtime, &air_quality, filters, &notices),
            ];
            let mut pending = lock(&pending);
            pending.retain(|task| !task.is_finished());
            pending.extend(tasks);
        }));
        log::debug!("Dashboard attached to filter store");
    }

    /// Stops refreshing on filter changes. Refreshes already in flight
    /// still complete.
    pub fn detach(&self) {
        if let Some(subscription) = lock(&self.subscription).take() {
            subscription.unsubscribe();
            log::debug!("Dashboard detached from filter store");
        }
    }

    /// Returns `true` while subscribed to the store.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        lock(&self.subscription).is_some()
    }

    /// Waits for every refresh spawned by notifications so far.
    pub async fn settle(&self) {
        let tasks: Vec<JoinHandle<()>> = lock(&self.pending).drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                log::error!("Layer refresh task failed: {e}");
            }
        }
    }

    /// Refreshes both layers with the current filters, concurrently, and
    /// returns their outcomes. Failures are recorded as notices.
    pub async fn refresh_all(&self) -> (Option<RefreshOutcome>, Option<RefreshOutcome>) {
        let filters = self.store.get();
        tokio::join!(
            refresh_layer(&self.disasters, &filters, &self.notices),
            refresh_layer(&self.air_quality, &filters, &self.notices),
        )
    }

    /// Compares the cities selected in the store.
    ///
    /// # Errors
    ///
    /// Returns the [`ComparisonError`] after recording it as an alert.
    pub async fn compare_selected(&self) -> Result<ComparisonResult, ComparisonError> {
        self.comparison
            .compare_selected(&self.store)
            .await
            .inspect_err(|e| self.alert(NoticeSource::Comparison, e.to_string()))
    }

    /// Exports `data_type` in `format` with the current filters into `dir`.
    ///
    /// # Errors
    ///
    /// Returns the [`ExportError`] after recording it as an alert.
    pub async fn export(
        &self,
        data_type: DataType,
        format: ExportFormat,
        dir: &Path,
    ) -> Result<PathBuf, ExportError> {
        self.export
            .save(data_type, format, &self.store.get(), dir)
            .await
            .inspect_err(|e| self.alert(NoticeSource::Export, e.to_string()))
    }

    /// The comparison engine.
    #[must_use]
    pub const fn comparison(&self) -> &ComparisonEngine {
        &self.comparison
    }

    /// The export pipeline.
    #[must_use]
    pub const fn export_pipeline(&self) -> &ExportPipeline {
        &self.export
    }

    /// All recorded notices, oldest first.
    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.snapshot()
    }

    /// Removes and returns all recorded notices.
    pub fn take_notices(&self) -> Vec<Notice> {
        self.notices.drain()
    }

    fn alert(&self, source: NoticeSource, message: String) {
        self.notices.push(Notice {
            source,
            kind: NoticeKind::Alert,
            message,
        });
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.detach();
    }
}

fn spawn_refresh<K: LayerKind>(
    runtime: &Handle,
    layer: &Arc<GeospatialDataLayer<K>>,
    filters: &FilterState,
    notices: &Arc<NoticeLog>,
) -> JoinHandle<()> {
    let layer = Arc::clone(layer);
    let notices = Arc::clone(notices);
    let filters = filters.clone();
    runtime.spawn(async move {
        refresh_layer(&layer, &filters, &notices).await;
    })
}

async fn refresh_layer<K: LayerKind>(
    layer: &GeospatialDataLayer<K>,
    filters: &FilterState,
    notices: &NoticeLog,
) -> Option<RefreshOutcome> {
    match layer.refresh(filters).await {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            notices.push(Notice {
                source: NoticeSource::Layer(layer.name()),
                kind: NoticeKind::Inline,
                message: e.to_string(),
            });
            None
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use serde_json::json;
    use world_map_client::{Backend, ClientError, api};
    use world_map_filter::FilterPatch;
    use world_map_models::{CityId, QueryParams};

    use super::*;

    /// Serves every endpoint with canned data, or fails everything while
    /// `failing` is set.
    #[derive(Default)]
    struct FakeBackend {
        failing: AtomicBool,
        requests: Mutex<Vec<(String, QueryParams)>>,
    }

    impl FakeBackend {
        fn requests_to(&self, path: &str) -> Vec<QueryParams> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|(p, _)| p == path)
                .map(|(_, q)| q.clone())
                .collect()
        }

        fn check(&self, path: &str, query: &QueryParams) -> Result<(), ClientError> {
            self.requests
                .lock()
                .unwrap()
                .push((path.to_string(), query.clone()));
            if self.failing.load(Ordering::SeqCst) {
                return Err(ClientError::Status {
                    url: path.to_string(),
                    status: 503,
                    message: "unavailable".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Backend for FakeBackend {
        async fn get_json(
            &self,
            path: &str,
            query: &QueryParams,
        ) -> Result<serde_json::Value, ClientError> {
            self.check(path, query)?;
            Ok(match path {
                api::DISASTERS_PATH => json!({
                    "success": true,
                    "data": [{
                        "id": 1,
                        "disaster_type": query.get("disaster_type").unwrap_or("storm"),
                        "latitude": 5.0,
                        "longitude": 6.0
                    }]
                }),
                api::AQI_LATEST_PATH => json!({
                    "success": true,
                    "data": [{
                        "id": 2,
                        "city_name": query.get("city_name").unwrap_or("Anywhere"),
                        "latitude": 1.0,
                        "longitude": 2.0,
                        "aqi_value": 42
                    }]
                }),
                api::COMPARISON_PATH => json!({
                    "success": true,
                    "comparison_date": "2024-05-01",
                    "cities": [
                        { "city_id": 1, "aqi_value": 30 },
                        { "city_id": 2, "aqi_value": 90 }
                    ],
                    "statistics": { "highest_aqi": 90, "lowest_aqi": 30, "average_aqi": 60 }
                }),
                other => panic!("unexpected path {other}"),
            })
        }

        async fn get_bytes(&self, path: &str, query: &QueryParams) -> Result<Vec<u8>, ClientError> {
            self.check(path, query)?;
            Ok(b"id,name\n".to_vec())
        }
    }

    fn dashboard() -> (Dashboard, Arc<FakeBackend>) {
        let backend = Arc::new(FakeBackend::default());
        (Dashboard::new(ApiClient::new(backend.clone())), backend)
    }

    #[tokio::test]
    async fn filter_change_refreshes_both_layers() {
        let (dashboard, backend) = dashboard();
        dashboard.attach(Handle::current());

        dashboard.store().merge(
            FilterPatch::new()
                .disaster_types(["flood", "earthquake"])
                .city_search("Lagos"),
        );
        dashboard.settle().await;

        assert_eq!(
            backend.requests_to(api::DISASTERS_PATH)[0].get("disaster_type"),
            Some("flood")
        );
        assert_eq!(
            backend.requests_to(api::AQI_LATEST_PATH)[0].get("city_name"),
            Some("Lagos")
        );
        assert_eq!(dashboard.disasters().records()[0].disaster_type, "flood");
        assert_eq!(dashboard.air_quality().markers().len(), 1);
        assert!(dashboard.notices().is_empty());
    }

    #[tokio::test]
    async fn refresh_failures_become_inline_notices() {
        let (dashboard, backend) = dashboard();
        dashboard.refresh_all().await;
        assert_eq!(dashboard.air_quality().len(), 1);

        backend.failing.store(true, Ordering::SeqCst);
        dashboard.attach(Handle::current());
        dashboard.store().set_city_search("Nowhere");
        dashboard.settle().await;

        let notices = dashboard.take_notices();
        assert_eq!(notices.len(), 2);
        assert!(notices.iter().all(|n| n.kind == NoticeKind::Inline));
        assert!(notices
            .iter()
            .any(|n| n.source == NoticeSource::Layer("air quality")));
        assert_eq!(
            dashboard.air_quality().records()[0].city_name.as_deref(),
            Some("Anywhere")
        );
    }

    #[tokio::test]
    async fn detach_stops_refreshing() {
        let (dashboard, backend) = dashboard();
        dashboard.attach(Handle::current());
        dashboard.attach(Handle::current());
        assert_eq!(dashboard.store().subscriber_count(), 1);

        dashboard.detach();
        dashboard.store().reset();
        dashboard.settle().await;

        assert!(!dashboard.is_attached());
        assert!(backend.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_comparison_raises_an_alert_without_a_request() {
        let (dashboard, backend) = dashboard();
        dashboard.store().toggle_city(CityId(1));

        let err = dashboard.compare_selected().await.unwrap_err();

        assert!(matches!(err, ComparisonError::CityCount { count: 1 }));
        assert_eq!(dashboard.notices()[0].kind, NoticeKind::Alert);
        assert_eq!(dashboard.notices()[0].source, NoticeSource::Comparison);
        assert!(backend.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn comparison_reads_selected_cities() {
        let (dashboard, backend) = dashboard();
        dashboard.store().toggle_city(CityId(1));
        dashboard.store().toggle_city(CityId(2));

        let result = dashboard.compare_selected().await.unwrap();

        assert_eq!(result.statistics.unwrap().max, 90);
        assert_eq!(
            backend.requests_to(api::COMPARISON_PATH)[0].get("city_ids"),
            Some("1,2")
        );
    }

    #[tokio::test]
    async fn export_uses_current_filters() {
        let (dashboard, backend) = dashboard();
        dashboard.store().set_city_search("Lima");
        let dir = tempfile::tempdir().unwrap();

        let path = dashboard
            .export(DataType::AirQuality, ExportFormat::Csv, dir.path())
            .await
            .unwrap();

        assert!(path.exists());
        let query = &backend.requests_to(api::DOWNLOAD_AQI_PATH)[0];
        assert_eq!(query.to_string(), "format=csv&city_name=Lima");
    }

    #[tokio::test]
    async fn failed_export_raises_an_alert() {
        let (dashboard, backend) = dashboard();
        backend.failing.store(true, Ordering::SeqCst);
        let dir = tempfile::tempdir().unwrap();

        dashboard
            .export(DataType::Disasters, ExportFormat::Json, dir.path())
            .await
            .unwrap_err();

        let notices = dashboard.notices();
        assert_eq!(notices[0].source, NoticeSource::Export);
        assert_eq!(notices[0].kind, NoticeKind::Alert);
    }
}
