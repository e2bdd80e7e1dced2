use std::collections::HashMap;

use foundation::math::precision::coordinate_key;
use serde::Deserialize;

use crate::entity::Locatable;

/// Offset scales in degrees, one per population.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub pin_scale: f64,
    pub member_scale: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            pin_scale: 1e-4,
            member_scale: 5e-5,
        }
    }
}

/// Plane golden angle, `π·(3 − √5)`.
pub fn golden_angle() -> f64 {
    std::f64::consts::PI * (3.0 - 5f64.sqrt())
}

/// Spiral offset of the `i`-th item in a coordinate group as the
/// `(r·cos θ·s, r·sin θ·s)` pair; [`Locatable::SPIRAL_AXES`] maps it onto
/// lat/lng. Slot 0 is never moved.
pub fn spiral_offset(i: usize, scale: f64) -> (f64, f64) {
    let r = i as f64;
    let theta = r * golden_angle();
    (r * theta.cos() * scale, r * theta.sin() * scale)
}

/// Spreads items that share an exact coordinate along a golden-angle spiral.
///
/// Output order matches input order. Items are grouped by their canonical
/// `"lat,lng"` key; within a group the slot is the item's position among the
/// group's participating items. Non-participating items are returned as is.
pub fn deduplicate<T: Locatable>(mut items: Vec<T>, scale: f64) -> Vec<T> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    for item in items.iter_mut().filter(|item| item.participates()) {
        let base = item.coordinates();
        let slot = slots.entry(coordinate_key(base.lat, base.lng)).or_insert(0);
        let i = *slot;
        *slot += 1;
        if i == 0 {
            continue;
        }
        item.set_coordinates(T::SPIRAL_AXES.apply(base, spiral_offset(i, scale)));
    }
    items
}

#[cfg(test)]
mod tests {
    use super::{deduplicate, spiral_offset, DedupConfig};
    use crate::entity::tests::{member, pin};
    use crate::entity::Coordinates;
    use pretty_assertions::assert_eq;

    #[test]
    fn identical_pins_are_spread() {
        let scale = DedupConfig::default().pin_scale;
        let out = deduplicate(
            vec![pin("a", 47.6496, -122.3926), pin("b", 47.6496, -122.3926)],
            scale,
        );
        assert_eq!(out[0].coordinates, Coordinates::new(47.6496, -122.3926));
        let (along_cos, along_sin) = spiral_offset(1, scale);
        assert_eq!(
            out[1].coordinates,
            Coordinates::new(47.6496 + along_sin, -122.3926 + along_cos)
        );
        assert!((out[1].coordinates.lat - 47.649_667_549_029_424).abs() < 1e-12);
        assert!((out[1].coordinates.lng - -122.392_673_736_887_82).abs() < 1e-12);
    }

    #[test]
    fn members_take_the_cosine_on_latitude() {
        let scale = DedupConfig::default().member_scale;
        let out = deduplicate(
            vec![member("a", 3.0, 4.0, true), member("b", 3.0, 4.0, true)],
            scale,
        );
        let (along_cos, along_sin) = spiral_offset(1, scale);
        assert_eq!(
            out[1].coordinates,
            Coordinates::new(3.0 + along_cos, 4.0 + along_sin)
        );
    }

    #[test]
    fn group_members_get_distinct_coordinates() {
        let items: Vec<_> = (0..12).map(|i| pin(&i.to_string(), 10.0, 20.0)).collect();
        let out = deduplicate(items, 1e-4);
        for (i, a) in out.iter().enumerate() {
            for b in &out[i + 1..] {
                assert_ne!(a.coordinates, b.coordinates);
            }
        }
    }

    #[test]
    fn singletons_and_order_are_preserved() {
        let out = deduplicate(
            vec![pin("x", 1.0, 1.0), pin("y", 2.0, 2.0), pin("z", 1.0, 1.0)],
            1e-4,
        );
        let ids: Vec<&str> = out.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y", "z"]);
        assert_eq!(out[1].coordinates, Coordinates::new(2.0, 2.0));
        assert_ne!(out[2].coordinates, Coordinates::new(1.0, 1.0));
    }

    #[test]
    fn deterministic() {
        let input = vec![pin("a", 5.0, 5.0), pin("b", 5.0, 5.0), pin("c", 5.0, 5.0)];
        let a = deduplicate(input.clone(), 1e-4);
        let b = deduplicate(input, 1e-4);
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.coordinates.lat.to_bits(), y.coordinates.lat.to_bits());
            assert_eq!(x.coordinates.lng.to_bits(), y.coordinates.lng.to_bits());
        }
    }

    #[test]
    fn hidden_members_neither_move_nor_take_slots() {
        let out = deduplicate(
            vec![
                member("hidden", 3.0, 3.0, false),
                member("first", 3.0, 3.0, true),
                member("second", 3.0, 3.0, true),
            ],
            5e-5,
        );
        assert_eq!(out[0].coordinates, Coordinates::new(3.0, 3.0));
        assert_eq!(out[1].coordinates, Coordinates::new(3.0, 3.0));
        assert_ne!(out[2].coordinates, Coordinates::new(3.0, 3.0));
    }

    #[test]
    fn negative_zero_shares_a_group() {
        let out = deduplicate(vec![pin("a", 0.0, 0.0), pin("b", -0.0, 0.0)], 1e-4);
        assert_ne!(out[1].coordinates, Coordinates::new(0.0, 0.0));
    }
}
