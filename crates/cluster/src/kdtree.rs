use foundation::bounds::Aabb2;
use foundation::math::precision::stable_total_cmp_f64;

/// Static 2D k-d tree over points in projected space.
///
/// Built once, never mutated. Query results are item indices (positions in
/// the slice passed to [`KdTree::build`]) in traversal order, which is fully
/// determined by the input.
#[derive(Debug, Clone)]
pub struct KdTree {
    node_size: usize,
    items: Vec<Item>,
}

#[derive(Debug, Copy, Clone, PartialEq)]
struct Item {
    index: usize,
    xy: [f64; 2],
}

impl KdTree {
    pub fn build(points: &[[f64; 2]], node_size: usize) -> Self {
        let mut items: Vec<Item> = points
            .iter()
            .enumerate()
            .map(|(index, xy)| Item { index, xy: *xy })
            .collect();
        let node_size = node_size.max(1);
        sort_kd(&mut items, node_size, 0);
        Self { node_size, items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items inside `query` (edges inclusive).
    pub fn range(&self, query: &Aabb2) -> Vec<usize> {
        let mut hits = Vec::new();
        if self.items.is_empty() {
            return hits;
        }

        let mut stack: Vec<(usize, usize, usize)> = vec![(0, self.items.len() - 1, 0)];
        while let Some((left, right, axis)) = stack.pop() {
            if right - left <= self.node_size {
                for item in &self.items[left..=right] {
                    if query.contains(item.xy) {
                        hits.push(item.index);
                    }
                }
                continue;
            }

            let m = left + (right - left) / 2;
            let pivot = self.items[m];
            if query.contains(pivot.xy) {
                hits.push(pivot.index);
            }

            let next_axis = 1 - axis;
            if query.min[axis] <= pivot.xy[axis] && m > left {
                stack.push((left, m - 1, next_axis));
            }
            if query.max[axis] >= pivot.xy[axis] {
                stack.push((m + 1, right, next_axis));
            }
        }
        hits
    }

    /// Items within euclidean distance `r` of `center` (inclusive).
    pub fn within(&self, center: [f64; 2], r: f64) -> Vec<usize> {
        let mut hits = Vec::new();
        if self.items.is_empty() {
            return hits;
        }

        let r2 = r * r;
        let mut stack: Vec<(usize, usize, usize)> = vec![(0, self.items.len() - 1, 0)];
        while let Some((left, right, axis)) = stack.pop() {
            if right - left <= self.node_size {
                for item in &self.items[left..=right] {
                    if dist_sq(item.xy, center) <= r2 {
                        hits.push(item.index);
                    }
                }
                continue;
            }

            let m = left + (right - left) / 2;
            let pivot = self.items[m];
            if dist_sq(pivot.xy, center) <= r2 {
                hits.push(pivot.index);
            }

            let next_axis = 1 - axis;
            if center[axis] - r <= pivot.xy[axis] && m > left {
                stack.push((left, m - 1, next_axis));
            }
            if center[axis] + r >= pivot.xy[axis] {
                stack.push((m + 1, right, next_axis));
            }
        }
        hits
    }
}

// Median split on alternating axes; the pivot of `items[l..=r]` lands at
// `l + (r - l) / 2`, matching the query traversal.
fn sort_kd(items: &mut [Item], node_size: usize, axis: usize) {
    if items.len() <= node_size + 1 {
        return;
    }
    let m = (items.len() - 1) / 2;
    items.select_nth_unstable_by(m, |a, b| {
        stable_total_cmp_f64(a.xy[axis], b.xy[axis]).then_with(|| a.index.cmp(&b.index))
    });
    let (left, rest) = items.split_at_mut(m);
    sort_kd(left, node_size, 1 - axis);
    sort_kd(&mut rest[1..], node_size, 1 - axis);
}

fn dist_sq(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}
