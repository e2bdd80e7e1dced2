//! Spherical Web Mercator mapped onto the unit square.
//!
//! `x` grows eastward from 0 at -180° to 1 at +180°; `y` grows southward
//! from 0 at the northern Mercator limit to 1 at the southern limit.

use std::f64::consts::PI;

use crate::bounds::LngLat;

pub fn lng_to_x(lng: f64) -> f64 {
    lng / 360.0 + 0.5
}

/// Latitudes beyond the Mercator limit clamp to the square's edge.
pub fn lat_to_y(lat: f64) -> f64 {
    let sin = (lat * PI / 180.0).sin();
    let y = 0.5 - 0.25 * ((1.0 + sin) / (1.0 - sin)).ln() / PI;
    if y < 0.0 {
        0.0
    } else if y > 1.0 {
        1.0
    } else {
        y
    }
}

pub fn x_to_lng(x: f64) -> f64 {
    (x - 0.5) * 360.0
}

pub fn y_to_lat(y: f64) -> f64 {
    let y2 = (180.0 - y * 360.0) * PI / 180.0;
    360.0 * y2.exp().atan() / PI - 90.0
}

pub fn project(p: LngLat) -> [f64; 2] {
    [lng_to_x(p.lng), lat_to_y(p.lat)]
}

pub fn unproject(xy: [f64; 2]) -> LngLat {
    LngLat::new(x_to_lng(xy[0]), y_to_lat(xy[1]))
}

#[cfg(test)]
mod tests {
    use super::{lat_to_y, lng_to_x, project, unproject, x_to_lng, y_to_lat};
    use crate::bounds::LngLat;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn origin_maps_to_square_center() {
        assert_close(lng_to_x(0.0), 0.5, 1e-12);
        assert_close(lat_to_y(0.0), 0.5, 1e-12);
        assert_close(x_to_lng(0.5), 0.0, 1e-12);
        assert_close(y_to_lat(0.5), 0.0, 1e-12);
    }

    #[test]
    fn poles_clamp_to_edges() {
        assert_eq!(lat_to_y(90.0), 0.0);
        assert_eq!(lat_to_y(-90.0), 1.0);
    }

    #[test]
    fn unproject_inverts_project_inside_mercator_limits() {
        let p = LngLat::new(-122.3926, 47.6496);
        let back = unproject(project(p));
        assert_close(back.lng, p.lng, 1e-9);
        assert_close(back.lat, p.lat, 1e-9);
    }
}
