use chrono::{DateTime, FixedOffset};
use foundation::bounds::LngLat;
use serde::{Deserialize, Serialize};

/// Closed set of event venue/channel types.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PinCategory {
    #[serde(rename = "MonkeDAO Discord")]
    Discord,
    #[serde(rename = "Monke_Talks Podcast")]
    Podcast,
    #[serde(rename = "Monke Country Club")]
    CountryClub,
    #[serde(rename = "MonkeDAO Twitter")]
    Twitter,
    #[serde(rename = "MonkeDAO Meet-up")]
    MeetUp,
    #[serde(rename = "Mainstream Event")]
    MainstreamEvent,
    #[serde(rename = "MonkeDAO Event")]
    CommunityEvent,
}

impl PinCategory {
    pub const ALL: [PinCategory; 7] = [
        PinCategory::Discord,
        PinCategory::Podcast,
        PinCategory::CountryClub,
        PinCategory::Twitter,
        PinCategory::MeetUp,
        PinCategory::MainstreamEvent,
        PinCategory::CommunityEvent,
    ];

    /// Wire label, as sent by the backend.
    pub fn label(self) -> &'static str {
        match self {
            PinCategory::Discord => "MonkeDAO Discord",
            PinCategory::Podcast => "Monke_Talks Podcast",
            PinCategory::CountryClub => "Monke Country Club",
            PinCategory::Twitter => "MonkeDAO Twitter",
            PinCategory::MeetUp => "MonkeDAO Meet-up",
            PinCategory::MainstreamEvent => "Mainstream Event",
            PinCategory::CommunityEvent => "MonkeDAO Event",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }
}

/// A `[latitude, longitude]` pair in degrees.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }

    /// Both components inside the geographic ranges, edges included.
    pub fn in_range(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }

    pub fn to_lng_lat(self) -> LngLat {
        LngLat::new(self.lng, self.lat)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pin {
    pub id: String,
    pub category: PinCategory,
    pub name: String,
    pub location_text: String,
    pub coordinates: Coordinates,
    pub description: String,
    /// Virtual events are listed but never placed on the map.
    pub is_virtual: bool,
    pub start: Option<DateTime<FixedOffset>>,
    pub end: Option<DateTime<FixedOffset>>,
    pub link: Option<String>,
    pub extra_link: Option<String>,
    pub contacts: Vec<String>,
}

/// Display format for event start times, e.g. `Friday, June 03, 2022, 06:30 PM`.
pub const START_FORMAT: &str = "%A, %B %d, %Y, %I:%M %p";

impl Pin {
    pub fn key(&self) -> EntityKey {
        EntityKey::pin(&self.id)
    }

    /// Start time in the event's own offset.
    pub fn formatted_start(&self) -> Option<String> {
        self.start.map(|t| t.format(START_FORMAT).to_string())
    }

    /// Secondary link with an `http://` scheme added when it has none.
    pub fn normalized_extra_link(&self) -> Option<String> {
        let link = self.extra_link.as_deref()?.trim();
        if link.is_empty() {
            None
        } else if link.starts_with("http") {
            Some(link.to_string())
        } else {
            Some(format!("http://{link}"))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    /// Wallet address.
    pub id: String,
    pub show_location: bool,
    pub coordinates: Coordinates,
    pub nick_name: String,
    pub monke_number: Option<String>,
    pub twitter: Option<String>,
    pub github: Option<String>,
    pub telegram: Option<String>,
    pub discord: Option<String>,
    pub location_text: String,
}

impl Member {
    pub fn key(&self) -> EntityKey {
        EntityKey::member(&self.id)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Pin,
    Member,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Pin => f.write_str("pin"),
            EntityKind::Member => f.write_str("member"),
        }
    }
}

/// Stable identity of a map entity: variant tag plus id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityKey {
    pub fn pin(id: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Pin,
            id: id.into(),
        }
    }

    pub fn member(id: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Member,
            id: id.into(),
        }
    }

    /// Detail route for the entity.
    pub fn route(&self) -> String {
        match self.kind {
            EntityKind::Pin => format!("/map/{}", self.id),
            EntityKind::Member => format!("/monke/{}", self.id),
        }
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "markerType", rename_all = "camelCase")]
pub enum Entity {
    Pin(Pin),
    Member(Member),
}

impl Entity {
    pub fn key(&self) -> EntityKey {
        match self {
            Entity::Pin(p) => p.key(),
            Entity::Member(m) => m.key(),
        }
    }

    pub fn coordinates(&self) -> Coordinates {
        match self {
            Entity::Pin(p) => p.coordinates,
            Entity::Member(m) => m.coordinates,
        }
    }

    /// Whether the entity belongs on the physical map layer.
    pub fn is_mappable(&self) -> bool {
        match self {
            Entity::Pin(p) => !p.is_virtual,
            Entity::Member(m) => m.show_location,
        }
    }
}

/// Anything the coordinate deduplicator can move.
/// Which axis takes the cosine term of a spiral offset.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SpiralAxes {
    /// `Δlat = r·cos θ·s`, `Δlng = r·sin θ·s`.
    CosOnLat,
    /// `Δlng = r·cos θ·s`, `Δlat = r·sin θ·s`. Events are offset on their
    /// `[lng, lat]` wire pair, so the cosine lands on longitude.
    CosOnLng,
}

impl SpiralAxes {
    /// Moves `base` by a `(cos, sin)` offset pair.
    pub fn apply(self, base: Coordinates, (along_cos, along_sin): (f64, f64)) -> Coordinates {
        match self {
            SpiralAxes::CosOnLat => Coordinates::new(base.lat + along_cos, base.lng + along_sin),
            SpiralAxes::CosOnLng => Coordinates::new(base.lat + along_sin, base.lng + along_cos),
        }
    }
}

pub trait Locatable {
    const SPIRAL_AXES: SpiralAxes = SpiralAxes::CosOnLat;

    fn coordinates(&self) -> Coordinates;
    fn set_coordinates(&mut self, coordinates: Coordinates);

    /// Items that do not participate keep their coordinates and do not
    /// occupy a slot in their coordinate group.
    fn participates(&self) -> bool {
        true
    }
}

impl Locatable for Pin {
    const SPIRAL_AXES: SpiralAxes = SpiralAxes::CosOnLng;

    fn coordinates(&self) -> Coordinates {
        self.coordinates
    }

    fn set_coordinates(&mut self, coordinates: Coordinates) {
        self.coordinates = coordinates;
    }
}

impl Locatable for Member {
    fn coordinates(&self) -> Coordinates {
        self.coordinates
    }

    fn set_coordinates(&mut self, coordinates: Coordinates) {
        self.coordinates = coordinates;
    }

    fn participates(&self) -> bool {
        self.show_location
    }
}
