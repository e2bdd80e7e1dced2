//! Contracts of the map widget and the router.

use foundation::bounds::{LngLat, LngLatBbox};
use foundation::handles::Handle;
use model::entity::EntityKey;

/// Current camera of the map widget.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Camera {
    pub center: LngLat,
    pub zoom: f64,
    pub bounds: LngLatBbox,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarkerSpec {
    Cluster {
        position: LngLat,
        point_count: usize,
        /// Abbreviated count shown on the marker.
        label: String,
    },
    Entity {
        position: LngLat,
        key: EntityKey,
    },
}

impl MarkerSpec {
    pub fn position(&self) -> LngLat {
        match self {
            MarkerSpec::Cluster { position, .. } | MarkerSpec::Entity { position, .. } => {
                *position
            }
        }
    }
}

/// The substrate that paints markers.
///
/// Only [`crate::Reconciler`] draws or erases markers. Click, hover and
/// movement callbacks are delivered back through [`crate::MapSync`].
pub trait MarkerRenderer {
    /// `None` until the widget has a size and a camera.
    fn camera(&self) -> Option<Camera>;
    fn draw_marker(&mut self, handle: Handle, spec: &MarkerSpec);
    fn erase_marker(&mut self, handle: Handle);
    fn ease_to(&mut self, center: LngLat, zoom: f64);
    /// Start delivering `move` and `moveend`.
    fn subscribe_movement(&mut self);
    fn unsubscribe_movement(&mut self);
}

pub trait Navigator {
    fn navigate(&mut self, path: &str);
}

/// Route used when a detail lookup misses.
pub const MAP_ROUTE: &str = "/map";
