use foundation::bounds::LngLat;

/// Opaque cluster identifier; only meaningful for the index snapshot that
/// produced it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClusterId(pub usize);

impl std::fmt::Display for ClusterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a leaf in the snapshot's point list.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LeafIndex(pub u32);

/// Input to [`crate::ClusterIndex::load`]: one point with its payload key.
#[derive(Debug, Clone, PartialEq)]
pub struct PointFeature<K> {
    pub key: K,
    pub position: LngLat,
}

impl<K> PointFeature<K> {
    pub fn new(key: K, position: LngLat) -> Self {
        Self { key, position }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeafFeature<K> {
    pub index: LeafIndex,
    pub key: K,
    pub position: LngLat,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ClusterFeature {
    pub cluster_id: ClusterId,
    pub point_count: usize,
    /// Weighted centroid of the merged points.
    pub position: LngLat,
}

impl ClusterFeature {
    /// Short marker label: `"950"`, `"3.4k"`, `"12k"`.
    pub fn abbreviated_count(&self) -> String {
        abbreviate_count(self.point_count)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Feature<K> {
    Cluster(ClusterFeature),
    Leaf(LeafFeature<K>),
}

impl<K> Feature<K> {
    pub fn position(&self) -> LngLat {
        match self {
            Feature::Cluster(c) => c.position,
            Feature::Leaf(l) => l.position,
        }
    }

    pub fn point_count(&self) -> usize {
        match self {
            Feature::Cluster(c) => c.point_count,
            Feature::Leaf(_) => 1,
        }
    }

    pub fn is_cluster(&self) -> bool {
        matches!(self, Feature::Cluster(_))
    }
}

pub fn abbreviate_count(count: usize) -> String {
    if count >= 10_000 {
        format!("{}k", (count as f64 / 1000.0).round())
    } else if count >= 1000 {
        format!("{}k", (count as f64 / 100.0).round() / 10.0)
    } else {
        count.to_string()
    }
}
