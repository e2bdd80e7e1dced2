use foundation::bounds::{Aabb2, LngLat, LngLatBbox};
use foundation::math::mercator::{lat_to_y, lng_to_x, project, unproject};
use serde::Deserialize;
use tracing::debug;

use crate::error::ClusterError;
use crate::feature::{ClusterFeature, ClusterId, Feature, LeafFeature, LeafIndex, PointFeature};
use crate::kdtree::KdTree;

/// Highest supported `max_zoom`; cluster ids reserve five bits for the zoom.
pub const MAX_SUPPORTED_ZOOM: u8 = 30;

#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClusterOptions {
    pub min_zoom: u8,
    /// Last zoom at which points are merged; `max_zoom + 1` shows every leaf.
    pub max_zoom: u8,
    /// Fewest points that may form a cluster.
    pub min_points: usize,
    /// Merge radius in pixels at tile `extent`.
    pub radius: f64,
    /// Tile extent in pixels; the radius is relative to it.
    pub extent: f64,
    /// Leaf bucket size of the k-d trees.
    pub node_size: usize,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            min_zoom: 0,
            max_zoom: 16,
            min_points: 2,
            radius: 20.0,
            extent: 512.0,
            node_size: 64,
        }
    }
}

impl ClusterOptions {
    fn sanitized(mut self) -> Self {
        self.max_zoom = self.max_zoom.min(MAX_SUPPORTED_ZOOM);
        self.min_zoom = self.min_zoom.min(self.max_zoom);
        self.min_points = self.min_points.max(2);
        if !(self.radius.is_finite() && self.radius >= 0.0) {
            self.radius = 0.0;
        }
        if !(self.extent.is_finite() && self.extent > 0.0) {
            self.extent = 512.0;
        }
        self.node_size = self.node_size.max(1);
        self
    }
}

const UNVISITED: u8 = u8::MAX;

#[derive(Debug, Copy, Clone)]
struct Node {
    xy: [f64; 2],
    /// Lowest zoom that already consumed this node.
    last_zoom: u8,
    /// Leaf position for single points, cluster id otherwise.
    id: usize,
    parent: Option<ClusterId>,
    num_points: usize,
}

impl Node {
    fn carried(&self) -> Self {
        Node {
            last_zoom: UNVISITED,
            parent: None,
            ..*self
        }
    }
}

#[derive(Debug)]
struct Level {
    tree: KdTree,
    nodes: Vec<Node>,
}

impl Level {
    fn build(nodes: Vec<Node>, node_size: usize) -> Self {
        let xy: Vec<[f64; 2]> = nodes.iter().map(|n| n.xy).collect();
        Self {
            tree: KdTree::build(&xy, node_size),
            nodes,
        }
    }
}

/// Hierarchical greedy point clustering.
///
/// One level per integer zoom in `[min_zoom, max_zoom + 1]`. The leaf level
/// holds every point; each lower level merges the nodes of the level above
/// that fall within `radius` pixels of each other at that zoom. The whole
/// structure is rebuilt by [`ClusterIndex::load`]; there is no incremental
/// update.
#[derive(Debug)]
pub struct ClusterIndex<K> {
    options: ClusterOptions,
    points: Vec<PointFeature<K>>,
    levels: Vec<Option<Level>>,
}

impl<K: Clone> ClusterIndex<K> {
    pub fn new(options: ClusterOptions) -> Self {
        let options = options.sanitized();
        Self {
            options,
            points: Vec::new(),
            levels: Vec::new(),
        }
    }

    pub fn options(&self) -> &ClusterOptions {
        &self.options
    }

    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn is_loaded(&self) -> bool {
        !self.levels.is_empty()
    }

    /// Zoom at which no points are merged.
    pub fn leaf_zoom(&self) -> u8 {
        self.options.max_zoom + 1
    }

    pub fn point(&self, index: LeafIndex) -> Option<&PointFeature<K>> {
        self.points.get(index.0 as usize)
    }

    pub fn points(&self) -> &[PointFeature<K>] {
        &self.points
    }

    /// Replaces the index contents. Points with non-finite coordinates are
    /// skipped.
    pub fn load(&mut self, features: Vec<PointFeature<K>>) {
        let total = features.len();
        self.points = features
            .into_iter()
            .filter(|f| f.position.is_finite())
            .collect();
        if self.points.len() != total {
            debug!(
                skipped = total - self.points.len(),
                "skipping points with non-finite coordinates"
            );
        }

        let opts = self.options;
        let leaf_zoom = usize::from(opts.max_zoom) + 1;
        self.levels = (0..=leaf_zoom).map(|_| None).collect();

        let nodes: Vec<Node> = self
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| Node {
                xy: project(p.position),
                last_zoom: UNVISITED,
                id: i,
                parent: None,
                num_points: 1,
            })
            .collect();

        let mut level = Level::build(nodes, opts.node_size);
        for zoom in (opts.min_zoom..=opts.max_zoom).rev() {
            let next = self.merge_level(&mut level, zoom);
            self.levels[usize::from(zoom) + 1] = Some(level);
            level = Level::build(next, opts.node_size);
        }
        self.levels[usize::from(opts.min_zoom)] = Some(level);

        debug!(
            points = self.points.len(),
            clusters_at_min_zoom = self.levels[usize::from(opts.min_zoom)]
                .as_ref()
                .map_or(0, |l| l.nodes.len()),
            "cluster index loaded"
        );
    }

    /// Greedily merges the nodes of `level` (zoom + 1) into the nodes of `zoom`.
    fn merge_level(&self, level: &mut Level, zoom: u8) -> Vec<Node> {
        let opts = &self.options;
        let r = opts.radius / (opts.extent * 2f64.powi(i32::from(zoom)));
        let mut next: Vec<Node> = Vec::new();

        for i in 0..level.nodes.len() {
            if level.nodes[i].last_zoom <= zoom {
                continue;
            }
            level.nodes[i].last_zoom = zoom;

            let origin = level.nodes[i];
            let neighbors = level.tree.within(origin.xy, r);

            let mut num_points = origin.num_points;
            for &n in &neighbors {
                let node = &level.nodes[n];
                if node.last_zoom > zoom {
                    num_points += node.num_points;
                }
            }

            if num_points > origin.num_points && num_points >= opts.min_points {
                let mut wx = origin.xy[0] * origin.num_points as f64;
                let mut wy = origin.xy[1] * origin.num_points as f64;
                let id = ClusterId((i << 5) + usize::from(zoom) + 1 + self.points.len());

                for &n in &neighbors {
                    let node = &mut level.nodes[n];
                    if node.last_zoom <= zoom {
                        continue;
                    }
                    node.last_zoom = zoom;
                    wx += node.xy[0] * node.num_points as f64;
                    wy += node.xy[1] * node.num_points as f64;
                    node.parent = Some(id);
                }

                level.nodes[i].parent = Some(id);
                next.push(Node {
                    xy: [wx / num_points as f64, wy / num_points as f64],
                    last_zoom: UNVISITED,
                    id: id.0,
                    parent: None,
                    num_points,
                });
            } else {
                next.push(origin.carried());
                if num_points > 1 {
                    // Too few to merge: claim the neighbors anyway so they
                    // are carried unmerged instead of joining another seed.
                    for &n in &neighbors {
                        let node = &mut level.nodes[n];
                        if node.last_zoom <= zoom {
                            continue;
                        }
                        node.last_zoom = zoom;
                        next.push(node.carried());
                    }
                }
            }
        }

        next
    }

    fn level_for_zoom(&self, zoom: f64) -> Option<&Level> {
        if zoom.is_nan() {
            return None;
        }
        let min = f64::from(self.options.min_zoom);
        let max = f64::from(self.options.max_zoom) + 1.0;
        let z = zoom.floor().clamp(min, max) as usize;
        self.levels.get(z).and_then(Option::as_ref)
    }

    fn node_feature(&self, node: &Node) -> Feature<K> {
        if node.num_points > 1 {
            Feature::Cluster(ClusterFeature {
                cluster_id: ClusterId(node.id),
                point_count: node.num_points,
                position: unproject(node.xy),
            })
        } else {
            let p = &self.points[node.id];
            Feature::Leaf(LeafFeature {
                index: LeafIndex(node.id as u32),
                key: p.key.clone(),
                position: p.position,
            })
        }
    }

    /// Clusters and leaves to draw for `bbox` at `zoom`.
    ///
    /// Degenerate boxes, NaN zooms and an unloaded index yield an empty
    /// result. Boxes crossing the antimeridian are split in two.
    pub fn clusters(&self, bbox: LngLatBbox, zoom: f64) -> Vec<Feature<K>> {
        if bbox.is_degenerate() || self.points.is_empty() {
            return Vec::new();
        }

        let mut min_lng = (bbox.min_lng + 180.0).rem_euclid(360.0) - 180.0;
        let min_lat = bbox.min_lat.clamp(-90.0, 90.0);
        let mut max_lng = if bbox.max_lng == 180.0 {
            180.0
        } else {
            (bbox.max_lng + 180.0).rem_euclid(360.0) - 180.0
        };
        let max_lat = bbox.max_lat.clamp(-90.0, 90.0);

        if bbox.max_lng - bbox.min_lng >= 360.0 {
            min_lng = -180.0;
            max_lng = 180.0;
        } else if min_lng > max_lng {
            let mut eastern =
                self.clusters(LngLatBbox::new(min_lng, min_lat, 180.0, max_lat), zoom);
            let western =
                self.clusters(LngLatBbox::new(-180.0, min_lat, max_lng, max_lat), zoom);
            eastern.extend(western);
            return eastern;
        }

        let Some(level) = self.level_for_zoom(zoom) else {
            return Vec::new();
        };

        let query = Aabb2::new(
            [lng_to_x(min_lng), lat_to_y(max_lat)],
            [lng_to_x(max_lng), lat_to_y(min_lat)],
        );
        level
            .tree
            .range(&query)
            .into_iter()
            .map(|i| self.node_feature(&level.nodes[i]))
            .collect()
    }

    fn origin_of(&self, cluster_id: ClusterId) -> Result<(usize, usize), ClusterError> {
        let offset = cluster_id
            .0
            .checked_sub(self.points.len())
            .ok_or(ClusterError::UnknownCluster(cluster_id))?;
        Ok((offset >> 5, offset % 32))
    }

    fn child_nodes(&self, cluster_id: ClusterId) -> Result<Vec<&Node>, ClusterError> {
        let unknown = ClusterError::UnknownCluster(cluster_id);
        let (origin_id, origin_zoom) = self.origin_of(cluster_id)?;
        let level = self
            .levels
            .get(origin_zoom)
            .and_then(Option::as_ref)
            .ok_or(unknown.clone())?;
        let origin = level.nodes.get(origin_id).ok_or(unknown.clone())?;

        let opts = &self.options;
        let r = opts.radius / (opts.extent * 2f64.powi(origin_zoom as i32 - 1));
        let children: Vec<&Node> = level
            .tree
            .within(origin.xy, r)
            .into_iter()
            .map(|i| &level.nodes[i])
            .filter(|n| n.parent == Some(cluster_id))
            .collect();

        if children.is_empty() {
            return Err(unknown);
        }
        Ok(children)
    }

    /// Direct children of a cluster, one zoom level up.
    pub fn children(&self, cluster_id: ClusterId) -> Result<Vec<Feature<K>>, ClusterError> {
        Ok(self
            .child_nodes(cluster_id)?
            .into_iter()
            .map(|n| self.node_feature(n))
            .collect())
    }

    /// Original points under a cluster, depth first, skipping the first
    /// `offset` and returning at most `limit`.
    pub fn leaves(
        &self,
        cluster_id: ClusterId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LeafFeature<K>>, ClusterError> {
        let mut out = Vec::new();
        self.append_leaf_indices(&mut out, cluster_id, limit, offset, 0)?;
        Ok(out
            .into_iter()
            .map(|index| {
                let p = &self.points[index.0 as usize];
                LeafFeature {
                    index,
                    key: p.key.clone(),
                    position: p.position,
                }
            })
            .collect())
    }

    /// Like [`ClusterIndex::leaves`] but without cloning payloads.
    pub fn leaf_indices(
        &self,
        cluster_id: ClusterId,
        limit: usize,
    ) -> Result<Vec<LeafIndex>, ClusterError> {
        let mut out = Vec::new();
        self.append_leaf_indices(&mut out, cluster_id, limit, 0, 0)?;
        Ok(out)
    }

    fn append_leaf_indices(
        &self,
        out: &mut Vec<LeafIndex>,
        cluster_id: ClusterId,
        limit: usize,
        offset: usize,
        mut skipped: usize,
    ) -> Result<usize, ClusterError> {
        if limit == 0 {
            return Ok(skipped);
        }
        for child in self.child_nodes(cluster_id)? {
            if child.num_points > 1 {
                if skipped + child.num_points <= offset {
                    skipped += child.num_points;
                } else {
                    skipped = self.append_leaf_indices(
                        out,
                        ClusterId(child.id),
                        limit,
                        offset,
                        skipped,
                    )?;
                }
            } else if skipped < offset {
                skipped += 1;
            } else {
                out.push(LeafIndex(child.id as u32));
            }
            if out.len() >= limit {
                break;
            }
        }
        Ok(skipped)
    }

    /// Smallest zoom at which the cluster splits into more than one child.
    pub fn expansion_zoom(&self, cluster_id: ClusterId) -> Result<u8, ClusterError> {
        let (_, origin_zoom) = self.origin_of(cluster_id)?;
        let mut zoom = origin_zoom as i64 - 1;
        let mut id = cluster_id;
        while zoom <= i64::from(self.options.max_zoom) {
            let children = self.child_nodes(id)?;
            zoom += 1;
            match children.as_slice() {
                [only] if only.num_points > 1 => id = ClusterId(only.id),
                _ => break,
            }
        }
        Ok(zoom.clamp(0, i64::from(self.leaf_zoom())) as u8)
    }

    /// Centroid of a cluster, as reported in its feature.
    pub fn cluster_position(&self, cluster_id: ClusterId) -> Result<LngLat, ClusterError> {
        let unknown = ClusterError::UnknownCluster(cluster_id);
        let (_, origin_zoom) = self.origin_of(cluster_id)?;
        // The cluster node is created one level below the children it merges.
        let level = origin_zoom
            .checked_sub(1)
            .and_then(|z| self.levels.get(z))
            .and_then(Option::as_ref)
            .ok_or(unknown.clone())?;
        level
            .nodes
            .iter()
            .find(|n| n.num_points > 1 && n.id == cluster_id.0)
            .map(|n| unproject(n.xy))
            .ok_or(unknown)
    }
}
