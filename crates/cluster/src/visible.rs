use foundation::bounds::LngLatBbox;

use crate::error::ClusterError;
use crate::feature::Feature;
use crate::index::ClusterIndex;
use crate::leaf_set::LeafSet;

/// Every leaf reachable from what [`ClusterIndex::clusters`] draws for
/// `bbox` at `zoom`: direct leaves plus all leaves of each cluster.
pub fn visible_leaves<K: Clone>(
    index: &ClusterIndex<K>,
    bbox: LngLatBbox,
    zoom: f64,
) -> Result<LeafSet, ClusterError> {
    let features = index.clusters(bbox, zoom);
    visible_leaves_of(index, &features)
}

/// Same as [`visible_leaves`] for an already computed feature list.
pub fn visible_leaves_of<K: Clone>(
    index: &ClusterIndex<K>,
    features: &[Feature<K>],
) -> Result<LeafSet, ClusterError> {
    let mut set = LeafSet::with_capacity(index.len());
    for feature in features {
        match feature {
            Feature::Cluster(c) => set.extend(index.leaf_indices(c.cluster_id, usize::MAX)?),
            Feature::Leaf(l) => {
                set.insert(l.index);
            }
        }
    }
    Ok(set)
}

/// Payload keys of `set`, in leaf order.
pub fn leaf_keys<K: Clone>(index: &ClusterIndex<K>, set: &LeafSet) -> Vec<K> {
    set.iter()
        .filter_map(|leaf| index.point(leaf).map(|p| p.key.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{leaf_keys, visible_leaves};
    use crate::feature::PointFeature;
    use crate::index::{ClusterIndex, ClusterOptions};
    use foundation::bounds::{LngLat, LngLatBbox};
    use pretty_assertions::assert_eq;

    fn index() -> ClusterIndex<&'static str> {
        let mut index = ClusterIndex::new(ClusterOptions::default());
        index.load(vec![
            PointFeature::new("a", LngLat::new(-74.0, 40.7)),
            PointFeature::new("b", LngLat::new(-74.001, 40.701)),
            PointFeature::new("c", LngLat::new(-73.999, 40.699)),
            PointFeature::new("d", LngLat::new(2.35, 48.85)),
        ]);
        index
    }

    #[test]
    fn expands_clusters_into_their_leaves() {
        let index = index();
        let set = visible_leaves(&index, LngLatBbox::new(-75.0, 40.0, -73.0, 41.0), 5.0)
            .expect("visible");
        assert_eq!(leaf_keys(&index, &set), vec!["a", "b", "c"]);
    }

    #[test]
    fn world_view_covers_everything() {
        let index = index();
        let set = visible_leaves(&index, LngLatBbox::world(), 0.0).expect("visible");
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn empty_viewport_is_empty() {
        let index = index();
        let set = visible_leaves(&index, LngLatBbox::new(100.0, -10.0, 110.0, 0.0), 3.0)
            .expect("visible");
        assert!(set.is_empty());
    }
}
