use std::collections::BTreeMap;

use cluster::{ClusterId, ClusterIndex, Feature, LeafSet};
use foundation::bounds::LngLat;
use foundation::handles::{Handle, HandleAllocator};
use model::entity::EntityKey;
use tracing::{debug, warn};

use crate::renderer::{Camera, MarkerRenderer, MarkerSpec};

/// What a live marker stands for.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkerTarget {
    Cluster {
        cluster_id: ClusterId,
        position: LngLat,
    },
    Entity(EntityKey),
}

/// Reaction to a marker click.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkerAction {
    /// Ease the camera to where the cluster splits.
    Expand { center: LngLat, zoom: f64 },
    Navigate(String),
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub markers: usize,
    pub clusters: usize,
    /// Every entity under a drawn marker, in load order.
    pub visible: Vec<EntityKey>,
}

/// Owns the render handles.
///
/// Every pass erases all live markers and redraws from the index. Handles are
/// generational, so events that arrive for a marker from an earlier pass
/// resolve to nothing.
#[derive(Debug, Default)]
pub struct Reconciler {
    handles: HandleAllocator,
    live: BTreeMap<Handle, MarkerTarget>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_count(&self) -> usize {
        self.live.len()
    }

    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.live.keys().copied()
    }

    /// Live target of `handle`; `None` for stale or unknown handles.
    pub fn target(&self, handle: Handle) -> Option<&MarkerTarget> {
        if !self.handles.is_current(handle) {
            return None;
        }
        self.live.get(&handle)
    }

    /// Erases every live marker and retires their handles.
    pub fn clear(&mut self, renderer: &mut dyn MarkerRenderer) {
        for handle in std::mem::take(&mut self.live).into_keys() {
            renderer.erase_marker(handle);
        }
        self.handles.advance();
    }

    pub fn reconcile(
        &mut self,
        renderer: &mut dyn MarkerRenderer,
        index: &ClusterIndex<EntityKey>,
        camera: &Camera,
    ) -> ReconcileReport {
        self.clear(renderer);

        let features = index.clusters(camera.bounds, camera.zoom);
        let mut report = ReconcileReport::default();
        let mut visible = LeafSet::with_capacity(index.len());

        for feature in features {
            let handle = self.handles.alloc();
            let (spec, target) = match feature {
                Feature::Cluster(c) => {
                    match index.leaf_indices(c.cluster_id, usize::MAX) {
                        Ok(leaves) => visible.extend(leaves),
                        Err(err) => warn!(%err, "cluster without leaves"),
                    }
                    report.clusters += 1;
                    (
                        MarkerSpec::Cluster {
                            position: c.position,
                            point_count: c.point_count,
                            label: c.abbreviated_count(),
                        },
                        MarkerTarget::Cluster {
                            cluster_id: c.cluster_id,
                            position: c.position,
                        },
                    )
                }
                Feature::Leaf(l) => {
                    visible.insert(l.index);
                    (
                        MarkerSpec::Entity {
                            position: l.position,
                            key: l.key.clone(),
                        },
                        MarkerTarget::Entity(l.key),
                    )
                }
            };
            renderer.draw_marker(handle, &spec);
            self.live.insert(handle, target);
        }

        report.markers = self.live.len();
        report.visible = cluster::leaf_keys(index, &visible);
        debug!(
            markers = report.markers,
            clusters = report.clusters,
            visible = report.visible.len(),
            zoom = camera.zoom,
            "reconciled markers"
        );
        report
    }

    /// Click reaction for `handle`, or `None` if it is stale.
    pub fn action_for(
        &self,
        handle: Handle,
        index: &ClusterIndex<EntityKey>,
    ) -> Option<MarkerAction> {
        match self.target(handle)? {
            MarkerTarget::Entity(key) => Some(MarkerAction::Navigate(key.route())),
            MarkerTarget::Cluster {
                cluster_id,
                position,
            } => match index.expansion_zoom(*cluster_id) {
                Ok(zoom) => Some(MarkerAction::Expand {
                    center: *position,
                    zoom: f64::from(zoom),
                }),
                Err(err) => {
                    warn!(%err, "cannot expand cluster");
                    None
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MarkerAction, MarkerTarget, Reconciler};
    use crate::renderer::testing::RecordingRenderer;
    use crate::renderer::MarkerRenderer;
    use cluster::{ClusterIndex, ClusterOptions, PointFeature};
    use foundation::bounds::{LngLat, LngLatBbox};
    use model::entity::EntityKey;
    use pretty_assertions::assert_eq;

    fn index() -> ClusterIndex<EntityKey> {
        let mut index = ClusterIndex::new(ClusterOptions::default());
        index.load(vec![
            PointFeature::new(EntityKey::pin("a"), LngLat::new(-74.0, 40.7)),
            PointFeature::new(EntityKey::pin("b"), LngLat::new(-74.0005, 40.7005)),
            PointFeature::new(EntityKey::member("w"), LngLat::new(-73.5, 40.9)),
            PointFeature::new(EntityKey::pin("far"), LngLat::new(139.7, 35.7)),
        ]);
        index
    }

    #[test]
    fn draws_clusters_and_leaves_and_reports_visible_keys() {
        let index = index();
        let mut renderer =
            RecordingRenderer::with_camera(LngLatBbox::new(-75.0, 40.0, -73.0, 41.5), 9.0);
        let camera = renderer.camera().expect("camera");
        let mut rec = Reconciler::new();
        let report = rec.reconcile(&mut renderer, &index, &camera);

        assert_eq!(report.markers, 2);
        assert_eq!(report.clusters, 1);
        assert_eq!(
            report.visible,
            vec![EntityKey::pin("a"), EntityKey::pin("b"), EntityKey::member("w")]
        );
        assert_eq!(renderer.0.borrow().live.len(), 2);
    }

    #[test]
    fn each_pass_replaces_every_handle() {
        let index = index();
        let mut renderer = RecordingRenderer::with_camera(LngLatBbox::world(), 0.0);
        let camera = renderer.camera().expect("camera");
        let mut rec = Reconciler::new();
        rec.reconcile(&mut renderer, &index, &camera);
        let first: Vec<_> = rec.handles().collect();

        rec.reconcile(&mut renderer, &index, &camera);
        let second: Vec<_> = rec.handles().collect();

        assert!(first.iter().all(|h| !second.contains(h)));
        assert!(first.iter().all(|h| rec.target(*h).is_none()));
        let log = renderer.0.borrow();
        assert_eq!(log.erased, first.len());
        assert_eq!(log.live.len(), second.len());
    }

    #[test]
    fn clicks_resolve_to_actions() {
        let index = index();
        let mut renderer =
            RecordingRenderer::with_camera(LngLatBbox::new(-75.0, 40.0, -73.0, 41.5), 9.0);
        let camera = renderer.camera().expect("camera");
        let mut rec = Reconciler::new();
        rec.reconcile(&mut renderer, &index, &camera);

        let handles: Vec<_> = rec.handles().collect();
        let mut saw_expand = false;
        let mut saw_navigate = false;
        for h in handles {
            match (rec.target(h).cloned(), rec.action_for(h, &index)) {
                (Some(MarkerTarget::Cluster { position, .. }), Some(MarkerAction::Expand { center, zoom })) => {
                    assert_eq!(center, position);
                    assert!(zoom > 9.0);
                    saw_expand = true;
                }
                (Some(MarkerTarget::Entity(key)), Some(MarkerAction::Navigate(path))) => {
                    assert_eq!(key, EntityKey::member("w"));
                    assert_eq!(path, "/monke/w");
                    saw_navigate = true;
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert!(saw_expand && saw_navigate);
    }

    #[test]
    fn clear_erases_everything() {
        let index = index();
        let mut renderer = RecordingRenderer::with_camera(LngLatBbox::world(), 3.0);
        let camera = renderer.camera().expect("camera");
        let mut rec = Reconciler::new();
        rec.reconcile(&mut renderer, &index, &camera);
        assert!(rec.handle_count() > 0);
        rec.clear(&mut renderer);
        assert_eq!(rec.handle_count(), 0);
        assert!(renderer.0.borrow().live.is_empty());
    }
}
