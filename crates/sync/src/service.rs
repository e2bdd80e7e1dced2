use std::sync::Arc;

use cluster::{ClusterIndex, PointFeature};
use foundation::handles::Handle;
use foundation::ids::Generation;
use model::entity::{EntityKey, EntityKind, Member, Pin};
use model::normalize::{normalize, NormalizedDataset};
use runtime::event_bus::{Notice, NoticeBus, NoticeLevel};
use runtime::metrics::Metrics;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::fetch::{DataSource, FetchOutcome, PendingFetch};
use crate::list::ListView;
use crate::machine::{DataState, DisplayState, SyncEvent, SyncMachine, Transition};
use crate::reconcile::{MarkerAction, MarkerTarget, ReconcileReport, Reconciler};
use crate::renderer::{MarkerRenderer, Navigator, MAP_ROUTE};
use crate::viewport::{Viewport, ViewportStore};

/// The map synchronization service.
///
/// One instance per map view, owned by whoever owns the view and passed to
/// every consumer. It owns the sync machine, the current dataset, the
/// cluster index and the render handles; nothing else mutates them.
///
/// Fetches are not spawned here. Each entry into `Loading` leaves a
/// [`PendingFetch`] behind; the caller drives it on its executor and feeds
/// the [`FetchOutcome`] back through [`MapSync::complete_fetch`], or uses
/// [`MapSync::run_pending_fetch`] to do both.
pub struct MapSync {
    config: SyncConfig,
    machine: SyncMachine,
    source: Arc<dyn DataSource>,
    store: Box<dyn ViewportStore>,
    navigator: Box<dyn Navigator>,
    renderer: Option<Box<dyn MarkerRenderer>>,
    dataset: NormalizedDataset,
    index: ClusterIndex<EntityKey>,
    reconciler: Reconciler,
    visible: Vec<EntityKey>,
    highlighted: Option<EntityKey>,
    viewport: Viewport,
    pending: Option<PendingFetch>,
    notices: NoticeBus,
    metrics: Metrics,
}

impl MapSync {
    pub fn new(
        config: SyncConfig,
        source: Arc<dyn DataSource>,
        store: Box<dyn ViewportStore>,
        navigator: Box<dyn Navigator>,
    ) -> Self {
        let machine = SyncMachine::new();
        let viewport = Viewport::restore(store.as_ref(), config.default_viewport);
        let pending = Some(PendingFetch::new(machine.generation(), source.clone()));
        let index = ClusterIndex::new(config.cluster);
        Self {
            config,
            machine,
            source,
            store,
            navigator,
            renderer: None,
            dataset: NormalizedDataset::default(),
            index,
            reconciler: Reconciler::new(),
            visible: Vec::new(),
            highlighted: None,
            viewport,
            pending,
            notices: NoticeBus::new(),
            metrics: Metrics::new(),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn data(&self) -> DataState {
        self.machine.data()
    }

    pub fn display(&self) -> DisplayState {
        self.machine.display()
    }

    pub fn generation(&self) -> Generation {
        self.machine.generation()
    }

    /// Viewport to open the map at; tracks the camera while mounted.
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn viewport_store(&self) -> &dyn ViewportStore {
        self.store.as_ref()
    }

    pub fn dataset(&self) -> &NormalizedDataset {
        &self.dataset
    }

    pub fn index(&self) -> &ClusterIndex<EntityKey> {
        &self.index
    }

    /// Entities under the markers currently drawn.
    pub fn visible(&self) -> &[EntityKey] {
        &self.visible
    }

    pub fn handle_count(&self) -> usize {
        self.reconciler.handle_count()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn notices(&self) -> &[Notice] {
        self.notices.notices()
    }

    pub fn dismiss_notice(&mut self, id: u64) -> bool {
        self.notices.dismiss(id)
    }

    /// Attaches the map widget. A second mount replaces the first and counts
    /// as a re-initialization.
    pub fn mount(&mut self, mut renderer: Box<dyn MarkerRenderer>) {
        if let Some(old) = self.renderer.as_deref_mut() {
            self.reconciler.clear(old);
            old.unsubscribe_movement();
        }
        renderer.subscribe_movement();
        self.renderer = Some(renderer);

        let event = if self.machine.display() == DisplayState::None {
            SyncEvent::Render
        } else {
            SyncEvent::Repoint
        };
        self.machine.send(event);
        self.settle();
    }

    /// Detaches the map widget, erasing every marker it shows.
    pub fn unmount(&mut self) -> Option<Box<dyn MarkerRenderer>> {
        let mut renderer = self.renderer.take()?;
        self.reconciler.clear(renderer.as_mut());
        renderer.unsubscribe_movement();
        self.visible.clear();
        self.highlighted = None;
        self.machine.send(SyncEvent::Rerender);
        Some(renderer)
    }

    /// Refetches both collections. The current dataset stays displayed until
    /// the new one lands.
    pub fn reload(&mut self) {
        self.machine.send(SyncEvent::Reload);
        self.pending = Some(PendingFetch::new(
            self.machine.generation(),
            self.source.clone(),
        ));
        self.settle();
    }

    /// Tears down every marker and re-clusters from scratch.
    pub fn rerender(&mut self) {
        if let Some(renderer) = self.renderer.as_deref_mut() {
            self.reconciler.clear(renderer);
        }
        self.machine.send(SyncEvent::Rerender);
        if self.renderer.is_some() {
            self.machine.send(SyncEvent::Render);
        }
        self.settle();
    }

    /// The fetch pair issued by the latest entry into `Loading`, if nobody
    /// has taken it yet.
    pub fn take_pending_fetch(&mut self) -> Option<PendingFetch> {
        self.pending.take()
    }

    pub fn complete_fetch(&mut self, outcome: FetchOutcome) -> Transition {
        let generation = outcome.generation;
        let transition = match outcome.result {
            Ok(batch) => {
                let transition = self.machine.send(SyncEvent::FetchSucceeded { generation });
                if transition == Transition::Applied {
                    let dataset =
                        normalize(&batch.events, &batch.members, &self.config.dedup);
                    self.metrics.inc("records.dropped", dataset.report.len() as u64);
                    self.metrics.inc("fetch.completed", 1);
                    info!(
                        %generation,
                        pins = dataset.pins.len(),
                        members = dataset.members.len(),
                        "dataset loaded"
                    );
                    self.dataset = dataset;
                }
                transition
            }
            Err(err) => {
                let transition = self.machine.send(SyncEvent::FetchFailed { generation });
                if transition == Transition::Applied {
                    warn!(%generation, status = ?err.status(), %err, "fetch failed");
                    self.metrics.inc("fetch.failed", 1);
                    if let Some(status) = err.status() {
                        self.metrics.set_gauge("fetch.last_status", i64::from(status));
                    }
                    self.notices.emit(
                        generation,
                        NoticeLevel::Error,
                        "fetch",
                        format!("Could not load map data: {err}"),
                    );
                }
                transition
            }
        };

        if transition == Transition::Stale {
            self.metrics.inc("fetch.stale", 1);
            debug!(%generation, current = %self.machine.generation(), "discarding stale fetch");
        }
        self.settle();
        transition
    }

    /// Drives the pending fetch to completion and applies it.
    pub async fn run_pending_fetch(&mut self) -> Option<Transition> {
        let pending = self.pending.take()?;
        let outcome = pending.run().await;
        Some(self.complete_fetch(outcome))
    }

    /// `move`: persist the camera.
    pub fn on_move(&mut self) {
        let Some(camera) = self.renderer.as_deref().and_then(|r| r.camera()) else {
            return;
        };
        self.viewport = Viewport {
            lng: camera.center.lng,
            lat: camera.center.lat,
            zoom: camera.zoom,
        };
        if let Err(err) = self.viewport.persist(self.store.as_mut()) {
            warn!(%err, "could not persist viewport");
        }
    }

    /// `moveend`: redraw markers and recompute the visible set.
    pub fn on_move_end(&mut self) -> Option<ReconcileReport> {
        self.refresh()
    }

    pub fn on_marker_click(&mut self, handle: Handle) -> Option<MarkerAction> {
        let Some(action) = self.reconciler.action_for(handle, &self.index) else {
            debug!(?handle, "click on stale marker");
            return None;
        };
        match &action {
            MarkerAction::Expand { center, zoom } => {
                if let Some(renderer) = self.renderer.as_deref_mut() {
                    renderer.ease_to(*center, *zoom);
                }
            }
            MarkerAction::Navigate(path) => self.navigator.navigate(path),
        }
        Some(action)
    }

    /// Hover enter (`Some`) or leave (`None`). Returns the highlighted entity.
    pub fn on_marker_hover(&mut self, handle: Option<Handle>) -> Option<&EntityKey> {
        self.highlighted = handle
            .and_then(|h| self.reconciler.target(h))
            .and_then(|target| match target {
                MarkerTarget::Entity(key) => Some(key.clone()),
                MarkerTarget::Cluster { .. } => None,
            });
        self.highlighted.as_ref()
    }

    pub fn list_view(&self) -> ListView {
        ListView::build(
            self.machine.data(),
            &self.dataset,
            &self.visible,
            self.highlighted.as_ref(),
        )
    }

    pub fn pin_details(&self, id: &str) -> Option<&Pin> {
        self.dataset.pin(id)
    }

    pub fn member_profile(&self, id: &str) -> Option<&Member> {
        self.dataset.member(id).filter(|m| m.show_location)
    }

    /// Navigates to the detail route of `key`, or back to the map when the
    /// current dataset has no such entity. Returns whether it was found.
    pub fn open_details(&mut self, key: &EntityKey) -> bool {
        let found = match key.kind {
            EntityKind::Pin => self.pin_details(&key.id).is_some(),
            EntityKind::Member => self.member_profile(&key.id).is_some(),
        };
        let path = if found {
            key.route()
        } else {
            debug!(%key.kind, id = %key.id, "detail lookup missed");
            MAP_ROUTE.to_string()
        };
        self.navigator.navigate(&path);
        found
    }

    /// Runs the joint gate: with data loaded and the display waiting, rebuild
    /// the index from the current dataset, redraw, and go interactive.
    fn settle(&mut self) {
        if !self.machine.joint_ready() || self.renderer.is_none() {
            return;
        }

        let points: Vec<PointFeature<EntityKey>> = self
            .dataset
            .pins
            .iter()
            .filter(|p| !p.is_virtual)
            .map(|p| PointFeature::new(p.key(), p.coordinates.to_lng_lat()))
            .chain(
                self.dataset
                    .members
                    .iter()
                    .filter(|m| m.show_location)
                    .map(|m| PointFeature::new(m.key(), m.coordinates.to_lng_lat())),
            )
            .collect();
        self.index.load(points);
        self.metrics.set_gauge("index.points", self.index.len() as i64);
        info!(
            generation = %self.machine.generation(),
            points = self.index.len(),
            "cluster index rebuilt"
        );

        self.refresh();
        self.machine.send(SyncEvent::Point);
    }

    fn refresh(&mut self) -> Option<ReconcileReport> {
        let renderer = self.renderer.as_deref_mut()?;
        if !self.index.is_loaded() {
            return None;
        }
        let Some(camera) = renderer.camera() else {
            self.reconciler.clear(renderer);
            self.visible.clear();
            return None;
        };

        let report = self.reconciler.reconcile(renderer, &self.index, &camera);
        self.metrics.inc("reconcile.passes", 1);
        self.metrics.set_gauge("markers.live", report.markers as i64);
        self.visible = report.visible.clone();
        if self
            .highlighted
            .as_ref()
            .is_some_and(|key| !self.visible.contains(key))
        {
            self.highlighted = None;
        }
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::MapSync;
    use crate::config::SyncConfig;
    use crate::fetch::{DataSource, FetchError, Resource, StaticDataSource};
    use crate::list::ListStatus;
    use crate::machine::{DataState, DisplayState, Transition};
    use crate::reconcile::MarkerAction;
    use crate::renderer::testing::{RecordingNavigator, RecordingRenderer};
    use crate::renderer::MarkerSpec;
    use crate::viewport::{InMemoryViewportStore, KEY_LAT, KEY_LNG, KEY_ZOOM};
    use foundation::bounds::{LngLat, LngLatBbox};
    use model::dedup::spiral_offset;
    use model::entity::EntityKey;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn event(id: &str, lat: f64, lng: f64) -> Value {
        json!({
            "id": id,
            "type": "MonkeDAO Meet-up",
            "name": format!("Meetup {id}"),
            "location": { "coordinates": [lng, lat], "text": "Somewhere" }
        })
    }

    fn user(wallet: &str, lat: f64, lng: f64) -> Value {
        json!({
            "walletId": wallet,
            "nickName": format!("monke {wallet}"),
            "monkeNumber": "42",
            "location": { "latitude": lat.to_string(), "longitude": lng.to_string(), "text": "Town" }
        })
    }

    struct Harness {
        sync: MapSync,
        source: Arc<StaticDataSource>,
        renderer: RecordingRenderer,
        navigator: RecordingNavigator,
    }

    fn harness(events: Vec<Value>, members: Vec<Value>) -> Harness {
        let source = Arc::new(StaticDataSource::new(events, members));
        let navigator = RecordingNavigator::default();
        let dyn_source: Arc<dyn DataSource> = source.clone();
        let sync = MapSync::new(
            SyncConfig::default(),
            dyn_source,
            Box::new(InMemoryViewportStore::new()),
            Box::new(navigator.clone()),
        );
        Harness {
            sync,
            source,
            renderer: RecordingRenderer::default(),
            navigator,
        }
    }

    fn seattle() -> LngLatBbox {
        LngLatBbox::new(-123.0, 47.0, -122.0, 48.0)
    }

    #[tokio::test]
    async fn co_located_pins_render_at_distinct_spiral_positions() {
        let mut h = harness(
            vec![event("p1", 47.6496, -122.3926), event("p2", 47.6496, -122.3926)],
            vec![],
        );
        h.renderer.set_camera(seattle(), 17.0);
        h.sync.mount(Box::new(h.renderer.clone()));
        assert_eq!(h.sync.run_pending_fetch().await, Some(Transition::Applied));
        assert_eq!(h.sync.display(), DisplayState::Interactive);

        let log = h.renderer.0.borrow();
        let mut positions: Vec<(String, LngLat)> = log
            .live
            .values()
            .filter_map(|spec| match spec {
                MarkerSpec::Entity { position, key } => Some((key.id.clone(), *position)),
                MarkerSpec::Cluster { .. } => None,
            })
            .collect();
        positions.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(positions.len(), 2);

        let (along_cos, along_sin) = spiral_offset(1, SyncConfig::default().dedup.pin_scale);
        assert_eq!(positions[0].1, LngLat::new(-122.3926, 47.6496));
        assert_eq!(
            positions[1].1,
            LngLat::new(-122.3926 + along_cos, 47.6496 + along_sin)
        );
        assert!((positions[1].1.lng - -122.392_673_736_887_82).abs() < 1e-12);
        assert!((positions[1].1.lat - 47.649_667_549_029_424).abs() < 1e-12);
    }

    #[tokio::test]
    async fn nothing_is_clustered_before_both_regions_are_ready() {
        let mut h = harness(vec![event("p1", 47.6, -122.3)], vec![]);

        // Data first, no map.
        let pending = h.sync.take_pending_fetch().expect("pending");
        h.sync.complete_fetch(pending.run().await);
        assert_eq!(h.sync.data(), DataState::Loaded);
        assert_eq!(h.sync.display(), DisplayState::None);
        assert!(!h.sync.index().is_loaded());

        // Map arrives: gate opens.
        h.renderer.set_camera(seattle(), 10.0);
        h.sync.mount(Box::new(h.renderer.clone()));
        assert_eq!(h.sync.display(), DisplayState::Interactive);
        assert_eq!(h.sync.index().len(), 1);
        assert_eq!(h.sync.visible(), &[EntityKey::pin("p1")]);
    }

    #[tokio::test]
    async fn map_before_data_waits_for_the_fetch() {
        let mut h = harness(vec![event("p1", 47.6, -122.3)], vec![]);
        h.renderer.set_camera(seattle(), 10.0);
        h.sync.mount(Box::new(h.renderer.clone()));
        assert_eq!(h.sync.display(), DisplayState::Rendering);
        assert_eq!(h.sync.handle_count(), 0);
        assert_eq!(h.sync.list_view().status, ListStatus::Loading);

        h.sync.run_pending_fetch().await;
        assert_eq!(h.sync.display(), DisplayState::Interactive);
        assert_eq!(h.sync.handle_count(), 1);
        assert_eq!(h.sync.list_view().status, ListStatus::Populated);
    }

    #[tokio::test]
    async fn member_failure_keeps_previous_pins() {
        let mut h = harness(vec![event("p1", 47.6, -122.3)], vec![]);
        h.renderer.set_camera(seattle(), 10.0);
        h.sync.mount(Box::new(h.renderer.clone()));
        h.sync.run_pending_fetch().await;

        h.source.set(Resource::Members, Err(FetchError::Status {
            resource: Resource::Members,
            status: 500,
        }));
        h.source.set(Resource::Events, Ok(vec![event("p1", 47.6, -122.3), event("p2", 47.7, -122.2)]));
        h.sync.reload();
        assert_eq!(h.sync.run_pending_fetch().await, Some(Transition::Applied));

        assert_eq!(h.sync.data(), DataState::Error);
        assert_eq!(h.sync.display(), DisplayState::Rendering);
        assert_eq!(h.sync.index().len(), 1);
        assert!(h.sync.dataset().members.is_empty());
        assert_eq!(h.sync.notices().len(), 1);
        assert_eq!(h.sync.metrics().counter("fetch.failed"), 1);
        assert_eq!(h.sync.metrics().gauge("fetch.last_status"), Some(500));

        // Still drawn, and still redrawn on movement.
        assert_eq!(h.renderer.0.borrow().live.len(), 1);
        let report = h.sync.on_move_end().expect("report");
        assert_eq!(report.visible, vec![EntityKey::pin("p1")]);
    }

    #[tokio::test]
    async fn reload_replaces_every_render_handle() {
        let mut h = harness(
            vec![event("p1", 47.6, -122.3), event("p2", 47.61, -122.31)],
            vec![user("w1", 47.5, -122.5)],
        );
        h.renderer.set_camera(seattle(), 10.0);
        h.sync.mount(Box::new(h.renderer.clone()));
        h.sync.run_pending_fetch().await;
        assert_eq!(h.sync.display(), DisplayState::Interactive);
        let before: Vec<_> = h.renderer.0.borrow().live.keys().copied().collect();
        assert!(!before.is_empty());

        h.sync.reload();
        assert_eq!(h.sync.display(), DisplayState::Rendering);
        assert_eq!(h.sync.data(), DataState::Loading);
        h.sync.run_pending_fetch().await;
        assert_eq!(h.sync.display(), DisplayState::Interactive);

        let log = h.renderer.0.borrow();
        assert!(before.iter().all(|old| !log.live.contains_key(old)));
        assert_eq!(log.live.len(), before.len());
        assert_eq!(log.erased, before.len());
        drop(log);
        for old in before {
            assert_eq!(h.sync.on_marker_click(old), None);
        }
    }

    #[tokio::test]
    async fn stale_fetch_completions_are_discarded() {
        let mut h = harness(vec![event("old", 47.6, -122.3)], vec![]);
        let first = h.sync.take_pending_fetch().expect("first");

        h.source.set(Resource::Events, Ok(vec![event("new", 47.6, -122.3)]));
        h.sync.reload();
        let second = h.sync.take_pending_fetch().expect("second");

        assert_eq!(h.sync.complete_fetch(second.run().await), Transition::Applied);
        assert_eq!(h.sync.complete_fetch(first.run().await), Transition::Stale);
        assert!(h.sync.pin_details("new").is_some());
        assert!(h.sync.pin_details("old").is_none());
        assert_eq!(h.sync.metrics().counter("fetch.stale"), 1);
    }

    #[tokio::test]
    async fn clicks_expand_clusters_and_navigate_to_entities() {
        let mut h = harness(
            vec![event("p1", 47.6, -122.3), event("p2", 47.6001, -122.3001)],
            vec![user("w1", 47.9, -122.9)],
        );
        h.renderer.set_camera(seattle(), 9.0);
        h.sync.mount(Box::new(h.renderer.clone()));
        h.sync.run_pending_fetch().await;

        let markers: Vec<_> = h
            .renderer
            .0
            .borrow()
            .live
            .iter()
            .map(|(h, s)| (*h, s.clone()))
            .collect();
        assert_eq!(markers.len(), 2);
        for (handle, spec) in markers {
            match (spec, h.sync.on_marker_click(handle)) {
                (MarkerSpec::Cluster { position, label, .. }, Some(MarkerAction::Expand { center, zoom })) => {
                    assert_eq!(label, "2");
                    assert_eq!(center, position);
                    assert_eq!(h.renderer.0.borrow().eased, vec![(center, zoom)]);
                }
                (MarkerSpec::Entity { key, .. }, Some(MarkerAction::Navigate(path))) => {
                    assert_eq!(key, EntityKey::member("w1"));
                    assert_eq!(path, "/monke/w1");
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(h.navigator.0.borrow().as_slice(), ["/monke/w1".to_string()]);
        assert_eq!(
            h.sync.visible(),
            &[EntityKey::pin("p1"), EntityKey::pin("p2"), EntityKey::member("w1")]
        );
    }

    #[tokio::test]
    async fn hover_highlights_the_list_row() {
        let mut h = harness(vec![event("p1", 47.6, -122.3)], vec![]);
        h.renderer.set_camera(seattle(), 12.0);
        h.sync.mount(Box::new(h.renderer.clone()));
        h.sync.run_pending_fetch().await;

        let handle = *h.renderer.0.borrow().live.keys().next().expect("marker");
        assert_eq!(h.sync.on_marker_hover(Some(handle)), Some(&EntityKey::pin("p1")));
        let view = h.sync.list_view();
        assert_eq!(view.highlighted().map(|r| r.key.clone()), Some(EntityKey::pin("p1")));
        assert_eq!(h.sync.on_marker_hover(None), None);
    }

    #[tokio::test]
    async fn moving_persists_and_panning_away_empties_the_list() {
        let mut h = harness(vec![event("p1", 47.6, -122.3)], vec![]);
        h.renderer.set_camera(seattle(), 10.0);
        h.sync.mount(Box::new(h.renderer.clone()));
        h.sync.run_pending_fetch().await;

        h.renderer.set_camera(LngLatBbox::new(2.0, 48.0, 3.0, 49.0), 11.25);
        h.sync.on_move();
        let store = h.sync.viewport_store();
        assert_eq!(store.get(KEY_LNG), Ok(Some("2.5000".to_string())));
        assert_eq!(store.get(KEY_LAT), Ok(Some("48.5000".to_string())));
        assert_eq!(store.get(KEY_ZOOM), Ok(Some("11.2500".to_string())));

        // Moving alone does not re-cluster.
        assert_eq!(h.sync.visible(), &[EntityKey::pin("p1")]);
        h.sync.on_move_end();
        assert!(h.sync.visible().is_empty());
        assert_eq!(h.sync.list_view().status, ListStatus::Empty);
    }

    #[tokio::test]
    async fn unmount_tears_everything_down() {
        let mut h = harness(vec![event("p1", 47.6, -122.3)], vec![]);
        h.renderer.set_camera(seattle(), 10.0);
        h.sync.mount(Box::new(h.renderer.clone()));
        h.sync.run_pending_fetch().await;
        assert!(h.renderer.0.borrow().subscribed);

        assert!(h.sync.unmount().is_some());
        let log = h.renderer.0.borrow();
        assert!(!log.subscribed);
        assert!(log.live.is_empty());
        assert_eq!(h.sync.display(), DisplayState::None);
        assert_eq!(h.sync.handle_count(), 0);
        drop(log);

        // Remounting re-clusters the loaded data.
        h.sync.mount(Box::new(h.renderer.clone()));
        assert_eq!(h.sync.display(), DisplayState::Interactive);
        assert_eq!(h.renderer.0.borrow().live.len(), 1);
    }

    #[tokio::test]
    async fn detail_lookups() {
        let mut h = harness(vec![event("p1", 47.6, -122.3)], vec![user("w1", 1.0, 1.0)]);
        h.sync.run_pending_fetch().await;
        assert_eq!(h.sync.pin_details("p1").map(|p| p.name.as_str()), Some("Meetup p1"));
        assert!(h.sync.pin_details("nope").is_none());
        assert!(h.sync.member_profile("w1").is_some());
    }

    #[tokio::test]
    async fn missed_detail_lookups_fall_back_to_the_map() {
        let mut h = harness(vec![event("p1", 47.6, -122.3)], vec![user("w1", 1.0, 1.0)]);
        h.sync.run_pending_fetch().await;

        assert!(h.sync.open_details(&EntityKey::pin("p1")));
        assert!(h.sync.open_details(&EntityKey::member("w1")));
        assert!(!h.sync.open_details(&EntityKey::pin("gone")));
        assert!(!h.sync.open_details(&EntityKey::member("p1")));
        assert_eq!(
            *h.navigator.0.borrow(),
            vec!["/map/p1", "/monke/w1", "/map", "/map"]
        );
    }

    #[tokio::test]
    async fn remounting_moves_every_marker_to_the_new_map() {
        let mut h = harness(
            vec![event("p1", 47.6, -122.3), event("p2", 47.61, -122.31)],
            vec![user("w1", 47.5, -122.5)],
        );
        h.renderer.set_camera(seattle(), 10.0);
        h.sync.mount(Box::new(h.renderer.clone()));
        h.sync.run_pending_fetch().await;
        assert_eq!(h.sync.display(), DisplayState::Interactive);
        let old: Vec<_> = h.renderer.0.borrow().live.keys().copied().collect();
        assert!(!old.is_empty());

        let second = RecordingRenderer::with_camera(seattle(), 10.0);
        h.sync.mount(Box::new(second.clone()));

        let first_log = h.renderer.0.borrow();
        assert!(first_log.live.is_empty());
        assert!(!first_log.subscribed);
        assert_eq!(first_log.erased, old.len());
        drop(first_log);

        let second_log = second.0.borrow();
        assert!(second_log.subscribed);
        assert_eq!(second_log.live.len(), old.len());
        drop(second_log);

        assert_eq!(h.sync.display(), DisplayState::Interactive);
        assert_eq!(h.sync.handle_count(), old.len());
        for handle in old {
            assert_eq!(h.sync.on_marker_click(handle), None);
        }
    }

    #[tokio::test]
    async fn rerender_replaces_every_render_handle() {
        let mut h = harness(
            vec![event("p1", 47.6, -122.3), event("p2", 47.61, -122.31)],
            vec![user("w1", 47.5, -122.5)],
        );
        h.renderer.set_camera(seattle(), 10.0);
        h.sync.mount(Box::new(h.renderer.clone()));
        h.sync.run_pending_fetch().await;
        let before: Vec<_> = h.renderer.0.borrow().live.keys().copied().collect();
        assert!(!before.is_empty());
        assert_eq!(h.sync.metrics().counter("reconcile.passes"), 1);

        h.sync.rerender();

        assert_eq!(h.sync.display(), DisplayState::Interactive);
        assert_eq!(h.sync.data(), DataState::Loaded);
        assert_eq!(h.sync.metrics().counter("reconcile.passes"), 2);
        let log = h.renderer.0.borrow();
        assert!(before.iter().all(|old| !log.live.contains_key(old)));
        assert_eq!(log.erased, before.len());
        assert_eq!(log.live.len(), before.len());
    }

    #[tokio::test]
    async fn unauthenticated_fetch_surfaces_a_notice() {
        let mut h = harness(vec![], vec![]);
        h.source.set(Resource::Events, Err(FetchError::Unauthenticated));
        h.sync.run_pending_fetch().await;
        assert_eq!(h.sync.data(), DataState::Error);
        let id = h.sync.notices()[0].id;
        assert!(h.sync.dismiss_notice(id));
        assert!(h.sync.notices().is_empty());
    }
}
