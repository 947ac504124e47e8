//! The generic fetch-hold-render layer.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, feature::Id};
use world_map_client::ApiClient;
use world_map_filter::FilterState;

use crate::{LayerError, LayerKind, MarkerDescriptor};

/// What happened to the response of one [`GeospatialDataLayer::refresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The response was the latest issued and replaced the collection.
    Applied {
        /// Sequence number of the request.
        seq: u64,
        /// Number of records now held.
        count: usize,
    },
    /// A newer request was issued while this one was in flight; the
    /// response was discarded.
    Superseded {
        /// Sequence number of the discarded request.
        seq: u64,
        /// Latest sequence number issued when it arrived.
        latest: u64,
    },
}

struct LayerState<R> {
    records: Arc<Vec<R>>,
    /// Sequence number of the most recently issued request.
    issued: u64,
    /// Sequence number of the most recently settled latest request.
    settled: u64,
    last_error: Option<String>,
    visible: bool,
}

/// Holds the most recent successful result of a filtered fetch.
///
/// Every [`refresh`](Self::refresh) is tagged with a sequence number. A
/// response is only committed if its request is still the latest issued
/// one when it arrives, so a slow response to an older filter state can
/// never overwrite the result of a newer one. Superseded requests are not
/// aborted; their responses are dropped on arrival.
///
/// A failed refresh keeps the previous collection.
pub struct GeospatialDataLayer<K: LayerKind> {
    client: ApiClient,
    state: Mutex<LayerState<K::Record>>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: LayerKind> std::fmt::Debug for GeospatialDataLayer<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("GeospatialDataLayer")
            .field("kind", &K::NAME)
            .field("records", &state.records.len())
            .field("issued", &state.issued)
            .field("settled", &state.settled)
            .field("visible", &state.visible)
            .finish_non_exhaustive()
    }
}

impl<K: LayerKind> GeospatialDataLayer<K> {
    /// Creates an empty, visible layer.
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            state: Mutex::new(LayerState {
                records: Arc::new(Vec::new()),
                issued: 0,
                settled: 0,
                last_error: None,
                visible: true,
            }),
            _kind: PhantomData,
        }
    }

    /// Layer name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        K::NAME
    }

    /// Fetches the records matching `filters` and, if this is still the
    /// latest request when the response arrives, replaces the collection.
    ///
    /// # Errors
    ///
    /// Returns [`LayerError::Fetch`] if the latest request failed. The held
    /// collection is left as it was. Failures of superseded requests are
    /// reported as [`RefreshOutcome::Superseded`].
    pub async fn refresh(&self, filters: &FilterState) -> Result<RefreshOutcome, LayerError> {
        let query = K::query(filters);
        let seq = {
            let mut state = self.lock();
            state.issued += 1;
            state.issued
        };
        log::debug!("Refreshing {} layer (request #{seq}): {query}", K::NAME);

        let result = self
            .client
            .records::<K::Record>(K::ENDPOINT, &query)
            .await;

        let mut state = self.lock();
        if seq != state.issued {
            log::debug!(
                "Discarding {} response #{seq}: request #{} is newer",
                K::NAME,
                state.issued
            );
            return Ok(RefreshOutcome::Superseded {
                seq,
                latest: state.issued,
            });
        }
        state.settled = seq;

        match result {
            Ok(records) => {
                let count = records.len();
                log::debug!("{} layer now holds {count} record(s)", K::NAME);
                state.records = Arc::new(records);
                state.last_error = None;
                Ok(RefreshOutcome::Applied { seq, count })
            }
            Err(source) => {
                log::error!("Failed to refresh {} layer: {source}", K::NAME);
                state.last_error = Some(source.to_string());
                Err(LayerError::Fetch {
                    layer: K::NAME,
                    source,
                })
            }
        }
    }

    /// Returns `true` while the latest issued request has not settled.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        let state = self.lock();
        state.settled < state.issued
    }

    /// The held collection.
    #[must_use]
    pub fn records(&self) -> Arc<Vec<K::Record>> {
        Arc::clone(&self.lock().records)
    }

    /// Number of held records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    /// Returns `true` if no records are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Error text of the latest settled request, if it failed.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    /// Empties the held collection.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.records = Arc::new(Vec::new());
        state.last_error = None;
    }

    /// Shows or hides the layer. Hidden layers keep refreshing.
    pub fn set_visible(&self, visible: bool) {
        self.lock().visible = visible;
    }

    /// Returns `true` if the layer is shown.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.lock().visible
    }

    /// Marker descriptors for every held record, or none if hidden.
    #[must_use]
    pub fn markers(&self) -> Vec<MarkerDescriptor> {
        let records = {
            let state = self.lock();
            if !state.visible {
                return Vec::new();
            }
            Arc::clone(&state.records)
        };
        records.iter().map(K::marker).collect()
    }

    /// Converts the held records into GeoJSON `Point` features.
    ///
    /// Coordinates are `[lon, lat]`; every other record field becomes a
    /// property, plus `marker-color`.
    ///
    /// # Errors
    ///
    /// Returns [`LayerError::GeoJson`] if a record cannot be serialized.
    pub fn to_feature_collection(&self) -> Result<FeatureCollection, LayerError> {
        let records = self.records();
        let features = records
            .iter()
            .map(to_feature::<K>)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        })
    }

    fn lock(&self) -> MutexGuard<'_, LayerState<K::Record>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn to_feature<K: LayerKind>(record: &K::Record) -> Result<Feature, LayerError> {
    let id = K::id(record);
    let position = K::position(record);

    let mut properties = match serde_json::to_value(record) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(_) => JsonObject::new(),
        Err(source) => {
            return Err(LayerError::GeoJson {
                layer: K::NAME,
                id,
                source,
            });
        }
    };
    properties.remove("latitude");
    properties.remove("longitude");
    properties.insert(
        "marker-color".to_string(),
        serde_json::Value::from(K::style(record).color),
    );

    Ok(Feature {
        bbox: None,
        geometry: Some(Geometry::new(geojson::Value::Point(vec![
            position.lon,
            position.lat,
        ]))),
        id: Some(Id::Number(id.into())),
        properties: Some(properties),
        foreign_members: None,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, VecDeque};

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::{mpsc, oneshot};
    use world_map_client::{Backend, ClientError};
    use world_map_models::QueryParams;

    use super::*;
    use crate::{AirQualityLayer, DisasterLayer};

    type Reply = Result<serde_json::Value, ClientError>;

    fn aqi_envelope(city: &str, aqi: i32) -> serde_json::Value {
        json!({
            "success": true,
            "data": [{
                "id": aqi,
                "city_name": city,
                "latitude": 10.0,
                "longitude": 20.0,
                "measured_at": "2024-05-01T08:00:00",
                "aqi_value": aqi
            }]
        })
    }

    fn searching(city: &str) -> FilterState {
        FilterState {
            city_search: city.to_string(),
            ..FilterState::default()
        }
    }

    /// Replies to requests in order from a fixed script.
    struct ScriptedBackend {
        replies: Mutex<VecDeque<Reply>>,
        queries: Mutex<Vec<QueryParams>>,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<Reply>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                queries: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Backend for ScriptedBackend {
        async fn get_json(&self, _path: &str, query: &QueryParams) -> Reply {
            self.queries.lock().unwrap().push(query.clone());
            self.replies.lock().unwrap().pop_front().unwrap()
        }

        async fn get_bytes(&self, _: &str, _: &QueryParams) -> Result<Vec<u8>, ClientError> {
            unreachable!("layers never download")
        }
    }

    /// Holds each request until the test releases it, keyed by the
    /// `city_name` query value.
    struct GatedBackend {
        started: mpsc::UnboundedSender<String>,
        gates: Mutex<BTreeMap<String, oneshot::Receiver<Reply>>>,
    }

    #[async_trait]
    impl Backend for GatedBackend {
        async fn get_json(&self, _path: &str, query: &QueryParams) -> Reply {
            let key = query.get("city_name").unwrap_or_default().to_string();
            let gate = self.gates.lock().unwrap().remove(&key).unwrap();
            self.started.send(key).unwrap();
            gate.await.unwrap()
        }

        async fn get_bytes(&self, _: &str, _: &QueryParams) -> Result<Vec<u8>, ClientError> {
            unreachable!("layers never download")
        }
    }

    struct Gated {
        layer: Arc<AirQualityLayer>,
        started: mpsc::UnboundedReceiver<String>,
        releases: BTreeMap<String, oneshot::Sender<Reply>>,
    }

    fn gated(keys: &[&str]) -> Gated {
        let (started_tx, started) = mpsc::unbounded_channel();
        let mut gates = BTreeMap::new();
        let mut releases = BTreeMap::new();
        for key in keys {
            let (tx, rx) = oneshot::channel();
            gates.insert((*key).to_string(), rx);
            releases.insert((*key).to_string(), tx);
        }
        let backend = Arc::new(GatedBackend {
            started: started_tx,
            gates: Mutex::new(gates),
        });
        Gated {
            layer: Arc::new(AirQualityLayer::new(ApiClient::new(backend))),
            started,
            releases,
        }
    }

    fn spawn_refresh(
        layer: &Arc<AirQualityLayer>,
        filters: FilterState,
    ) -> tokio::task::JoinHandle<Result<RefreshOutcome, LayerError>> {
        let layer = Arc::clone(layer);
        tokio::spawn(async move { layer.refresh(&filters).await })
    }

    fn held_cities(layer: &AirQualityLayer) -> Vec<String> {
        layer
            .records()
            .iter()
            .filter_map(|r| r.city_name.clone())
            .collect()
    }

    #[tokio::test]
    async fn newer_request_wins_when_older_response_arrives_last() {
        let mut g = gated(&["Lima", "Oslo"]);

        let first = spawn_refresh(&g.layer, searching("Lima"));
        assert_eq!(g.started.recv().await.unwrap(), "Lima");
        let second = spawn_refresh(&g.layer, searching("Oslo"));
        assert_eq!(g.started.recv().await.unwrap(), "Oslo");
        assert!(g.layer.is_loading());

        g.releases.remove("Oslo").unwrap().send(Ok(aqi_envelope("Oslo", 20))).unwrap();
        assert_eq!(
            second.await.unwrap().unwrap(),
            RefreshOutcome::Applied { seq: 2, count: 1 }
        );
        assert!(!g.layer.is_loading());

        g.releases.remove("Lima").unwrap().send(Ok(aqi_envelope("Lima", 80))).unwrap();
        assert_eq!(
            first.await.unwrap().unwrap(),
            RefreshOutcome::Superseded { seq: 1, latest: 2 }
        );

        assert_eq!(held_cities(&g.layer), vec!["Oslo"]);
    }

    #[tokio::test]
    async fn older_response_arriving_first_is_still_discarded() {
        let mut g = gated(&["Lima", "Oslo"]);

        let first = spawn_refresh(&g.layer, searching("Lima"));
        g.started.recv().await.unwrap();
        let second = spawn_refresh(&g.layer, searching("Oslo"));
        g.started.recv().await.unwrap();

        g.releases.remove("Lima").unwrap().send(Ok(aqi_envelope("Lima", 80))).unwrap();
        assert!(matches!(
            first.await.unwrap().unwrap(),
            RefreshOutcome::Superseded { seq: 1, .. }
        ));
        assert!(g.layer.is_empty());
        assert!(g.layer.is_loading());

        g.releases.remove("Oslo").unwrap().send(Ok(aqi_envelope("Oslo", 20))).unwrap();
        second.await.unwrap().unwrap();

        assert_eq!(held_cities(&g.layer), vec!["Oslo"]);
        assert!(!g.layer.is_loading());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_collection() {
        let backend = ScriptedBackend::new(vec![
            Ok(aqi_envelope("Accra", 42)),
            Err(ClientError::Backend {
                message: "database unavailable".to_string(),
            }),
        ]);
        let layer = AirQualityLayer::new(ApiClient::new(backend));

        layer.refresh(&FilterState::default()).await.unwrap();
        let err = layer.refresh(&searching("Quito")).await.unwrap_err();

        assert!(matches!(err, LayerError::Fetch { layer: "air quality", .. }));
        assert_eq!(held_cities(&layer), vec!["Accra"]);
        assert!(!layer.is_loading());
        assert!(layer.last_error().unwrap().contains("database unavailable"));
    }

    #[tokio::test]
    async fn disaster_refresh_sends_first_type_only() {
        let backend = ScriptedBackend::new(vec![Ok(json!({ "success": true, "data": [] }))]);
        let layer = DisasterLayer::new(ApiClient::new(backend.clone()));
        let filters = FilterState {
            disaster_types: vec!["flood".to_string(), "earthquake".to_string()],
            ..FilterState::default()
        };

        layer.refresh(&filters).await.unwrap();

        let queries = backend.queries.lock().unwrap();
        assert_eq!(queries[0].keys(), vec!["disaster_type"]);
        assert_eq!(queries[0].get("disaster_type"), Some("flood"));
    }

    #[tokio::test]
    async fn empty_filters_send_no_query_keys() {
        let backend = ScriptedBackend::new(vec![Ok(json!({ "success": true, "data": [] }))]);
        let layer = AirQualityLayer::new(ApiClient::new(backend.clone()));

        layer.refresh(&FilterState::default()).await.unwrap();

        assert!(backend.queries.lock().unwrap()[0].is_empty());
    }

    #[tokio::test]
    async fn hidden_layer_yields_no_markers_but_keeps_records() {
        let backend = ScriptedBackend::new(vec![Ok(aqi_envelope("Delhi", 275))]);
        let layer = AirQualityLayer::new(ApiClient::new(backend));
        layer.refresh(&FilterState::default()).await.unwrap();

        let markers = layer.markers();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].style.color, "#8F3F97");
        assert_eq!(markers[0].style.pixels(), 16);

        layer.set_visible(false);
        assert!(layer.markers().is_empty());
        assert_eq!(layer.len(), 1);

        layer.clear();
        layer.set_visible(true);
        assert!(layer.markers().is_empty());
    }

    #[tokio::test]
    async fn feature_collection_uses_lon_lat_order() {
        let backend = ScriptedBackend::new(vec![Ok(aqi_envelope("Delhi", 275))]);
        let layer = AirQualityLayer::new(ApiClient::new(backend));
        layer.refresh(&FilterState::default()).await.unwrap();

        let collection = layer.to_feature_collection().unwrap();

        let feature = &collection.features[0];
        let geometry = feature.geometry.as_ref().unwrap();
        assert_eq!(geometry.value, geojson::Value::Point(vec![20.0, 10.0]));
        let properties = feature.properties.as_ref().unwrap();
        assert_eq!(properties["city_name"], "Delhi");
        assert_eq!(properties["marker-color"], "#8F3F97");
        assert!(!properties.contains_key("latitude"));
    }

    #[tokio::test]
    async fn record_on_the_prime_meridian_is_still_drawn() {
        let backend = ScriptedBackend::new(vec![Ok(json!({
            "success": true,
            "data": [
                { "id": 1, "disaster_type": "flood", "latitude": 51.5, "longitude": null },
                { "id": 2, "disaster_type": "storm", "latitude": 10.0, "longitude": 20.0 }
            ]
        }))]);
        let layer = DisasterLayer::new(ApiClient::new(backend));

        let outcome = layer.refresh(&FilterState::default()).await.unwrap();

        assert_eq!(outcome, RefreshOutcome::Applied { seq: 1, count: 2 });
        let markers = layer.markers();
        assert_eq!(markers[0].position.lon, 0.0);
        let collection = layer.to_feature_collection().unwrap();
        assert_eq!(
            collection.features[0].geometry.as_ref().unwrap().value,
            geojson::Value::Point(vec![0.0, 51.5])
        );
    }

    #[test]
    fn each_kind_reads_only_its_own_filters() {
        let state = searching("  Paris ");

        assert_eq!(
            <crate::AirQuality as LayerKind>::query(&state).get("city_name"),
            Some("Paris")
        );
        assert!(<crate::Disasters as LayerKind>::query(&state).is_empty());
    }
}
