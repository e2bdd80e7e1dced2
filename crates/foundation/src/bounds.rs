/// A geographic position in degrees, longitude first (GeoJSON order).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    pub fn is_finite(&self) -> bool {
        self.lng.is_finite() && self.lat.is_finite()
    }
}

/// Viewport rectangle in degrees: `[min_lng, min_lat, max_lng, max_lat]`.
///
/// `min_lng > max_lng` is legal and means the box crosses the antimeridian.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LngLatBbox {
    pub min_lng: f64,
    pub min_lat: f64,
    pub max_lng: f64,
    pub max_lat: f64,
}

impl LngLatBbox {
    pub fn new(min_lng: f64, min_lat: f64, max_lng: f64, max_lat: f64) -> Self {
        Self {
            min_lng,
            min_lat,
            max_lng,
            max_lat,
        }
    }

    pub fn world() -> Self {
        Self::new(-180.0, -90.0, 180.0, 90.0)
    }

    /// True when the box cannot describe a visible area: a non-finite edge,
    /// zero width, or zero/negative height.
    pub fn is_degenerate(&self) -> bool {
        let finite = self.min_lng.is_finite()
            && self.min_lat.is_finite()
            && self.max_lng.is_finite()
            && self.max_lat.is_finite();
        !finite || self.min_lng == self.max_lng || self.max_lat <= self.min_lat
    }

    pub fn contains(&self, p: LngLat) -> bool {
        if self.is_degenerate() || !p.is_finite() {
            return false;
        }
        if p.lat < self.min_lat || p.lat > self.max_lat {
            return false;
        }
        if self.max_lng - self.min_lng >= 360.0 {
            return true;
        }
        if self.min_lng <= self.max_lng {
            p.lng >= self.min_lng && p.lng <= self.max_lng
        } else {
            p.lng >= self.min_lng || p.lng <= self.max_lng
        }
    }
}

/// Axis-aligned box in projected (unit-square) space.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb2 {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl Aabb2 {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        Aabb2 { min, max }
    }

    pub fn contains(&self, p: [f64; 2]) -> bool {
        p[0] >= self.min[0] && p[0] <= self.max[0] && p[1] >= self.min[1] && p[1] <= self.max[1]
    }
}

#[cfg(test)]
mod tests {
    use super::{Aabb2, LngLat, LngLatBbox};

    #[test]
    fn zero_size_and_nan_boxes_are_degenerate() {
        assert!(LngLatBbox::new(0.0, 0.0, 0.0, 0.0).is_degenerate());
        assert!(LngLatBbox::new(-10.0, 5.0, 10.0, 5.0).is_degenerate());
        assert!(LngLatBbox::new(f64::NAN, 0.0, 1.0, 1.0).is_degenerate());
        assert!(!LngLatBbox::world().is_degenerate());
    }

    #[test]
    fn contains_handles_antimeridian_crossing() {
        let b = LngLatBbox::new(170.0, -10.0, -170.0, 10.0);
        assert!(b.contains(LngLat::new(175.0, 0.0)));
        assert!(b.contains(LngLat::new(-175.0, 0.0)));
        assert!(!b.contains(LngLat::new(0.0, 0.0)));
    }

    #[test]
    fn aabb_contains_is_inclusive() {
        let b = Aabb2::new([0.0, 0.0], [1.0, 1.0]);
        assert!(b.contains([1.0, 0.0]));
        assert!(!b.contains([1.0, 1.5]));
    }
}
