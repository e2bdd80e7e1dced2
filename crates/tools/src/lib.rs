//! Headless pieces of the `mapsync` CLI.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

use foundation::bounds::{LngLat, LngLatBbox};
use foundation::handles::Handle;
use model::entity::EntityKind;
use serde::Serialize;
use serde_json::Value;
use sync::renderer::{Camera, MarkerRenderer, MarkerSpec};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("bbox must be minLng,minLat,maxLng,maxLat: {0}")]
    Bbox(String),
    #[error("{path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("{path}: expected a JSON array of records: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
}

pub fn parse_bbox(s: &str) -> Result<LngLatBbox, ToolError> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| ToolError::Bbox(s.to_string()))?;
    let &[min_lng, min_lat, max_lng, max_lat] = parts.as_slice() else {
        return Err(ToolError::Bbox(s.to_string()));
    };
    Ok(LngLatBbox::new(min_lng, min_lat, max_lng, max_lat))
}

pub async fn read_records(path: &Path) -> Result<Vec<Value>, ToolError> {
    let display = path.display().to_string();
    let bytes = tokio::fs::read(path).await.map_err(|source| ToolError::Io {
        path: display.clone(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| ToolError::Json {
        path: display,
        source,
    })
}

/// A renderer with a fixed camera that keeps the markers it is asked to draw.
#[derive(Debug, Clone)]
pub struct HeadlessRenderer {
    camera: Camera,
    markers: Rc<RefCell<BTreeMap<Handle, MarkerSpec>>>,
}

impl HeadlessRenderer {
    pub fn new(bounds: LngLatBbox, zoom: f64) -> Self {
        let center = LngLat::new(
            (bounds.min_lng + bounds.max_lng) / 2.0,
            (bounds.min_lat + bounds.max_lat) / 2.0,
        );
        Self {
            camera: Camera {
                center,
                zoom,
                bounds,
            },
            markers: Rc::default(),
        }
    }

    /// Markers currently drawn, in handle order.
    pub fn markers(&self) -> Vec<MarkerOut> {
        self.markers.borrow().values().map(MarkerOut::from).collect()
    }
}

impl MarkerRenderer for HeadlessRenderer {
    fn camera(&self) -> Option<Camera> {
        Some(self.camera)
    }

    fn draw_marker(&mut self, handle: Handle, spec: &MarkerSpec) {
        self.markers.borrow_mut().insert(handle, spec.clone());
    }

    fn erase_marker(&mut self, handle: Handle) {
        self.markers.borrow_mut().remove(&handle);
    }

    fn ease_to(&mut self, _center: LngLat, _zoom: f64) {}

    fn subscribe_movement(&mut self) {}

    fn unsubscribe_movement(&mut self) {}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MarkerOut {
    #[serde(rename_all = "camelCase")]
    Cluster {
        lng: f64,
        lat: f64,
        point_count: usize,
        label: String,
    },
    Entity {
        lng: f64,
        lat: f64,
        kind: EntityKind,
        id: String,
    },
}

impl From<&MarkerSpec> for MarkerOut {
    fn from(spec: &MarkerSpec) -> Self {
        match spec {
            MarkerSpec::Cluster {
                position,
                point_count,
                label,
            } => MarkerOut::Cluster {
                lng: position.lng,
                lat: position.lat,
                point_count: *point_count,
                label: label.clone(),
            },
            MarkerSpec::Entity { position, key } => MarkerOut::Entity {
                lng: position.lng,
                lat: position.lat,
                kind: key.kind,
                id: key.id.clone(),
            },
        }
    }
}
