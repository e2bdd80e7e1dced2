use std::collections::HashSet;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::dedup::{deduplicate, DedupConfig};
use crate::entity::{Coordinates, EntityKind, Member, Pin, PinCategory};
use crate::raw::{RawEvent, RawMember, RawNumber};

/// Why a single raw record was dropped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("record is not a valid object: {0}")]
    Undecodable(String),
    #[error("missing id")]
    MissingId,
    #[error("missing coordinates")]
    MissingCoordinates,
    #[error("coordinates are not finite numbers")]
    InvalidCoordinates,
    #[error("coordinates out of range (lat {lat}, lng {lng})")]
    OutOfRange { lat: f64, lng: f64 },
    #[error("unknown category {0:?}")]
    UnknownCategory(String),
    #[error("duplicate id")]
    DuplicateId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DroppedRecord {
    pub kind: EntityKind,
    /// Position in the raw batch.
    pub position: usize,
    pub id: Option<String>,
    pub reason: RecordError,
}

/// Records dropped during one normalization pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DropReport {
    dropped: Vec<DroppedRecord>,
}

impl DropReport {
    pub fn len(&self) -> usize {
        self.dropped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dropped.is_empty()
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.dropped.iter().filter(|d| d.kind == kind).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DroppedRecord> {
        self.dropped.iter()
    }

    fn push(&mut self, record: DroppedRecord) {
        warn!(
            kind = %record.kind,
            position = record.position,
            id = record.id.as_deref().unwrap_or(""),
            reason = %record.reason,
            "dropping malformed record"
        );
        self.dropped.push(record);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedDataset {
    pub pins: Vec<Pin>,
    pub members: Vec<Member>,
    pub report: DropReport,
}

impl NormalizedDataset {
    pub fn pin(&self, id: &str) -> Option<&Pin> {
        self.pins.iter().find(|p| p.id == id)
    }

    pub fn member(&self, id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.id == id)
    }
}

/// Maps raw event and member records into entities and spreads co-located
/// ones.
///
/// Each record is decoded on its own, so one malformed record never fails
/// the batch; it is dropped and reported. When two records share an id the
/// first one wins.
pub fn normalize(
    raw_events: &[Value],
    raw_members: &[Value],
    config: &DedupConfig,
) -> NormalizedDataset {
    let mut report = DropReport::default();

    let mut seen = HashSet::new();
    let mut pins = Vec::with_capacity(raw_events.len());
    for (position, value) in raw_events.iter().enumerate() {
        let result = serde_json::from_value::<RawEvent>(value.clone())
            .map_err(|e| (None, RecordError::Undecodable(e.to_string())))
            .and_then(pin_from_raw)
            .and_then(|pin| claim_id(&mut seen, pin.id.clone()).map(|_| pin));
        match result {
            Ok(pin) => pins.push(pin),
            Err((id, reason)) => report.push(DroppedRecord {
                kind: EntityKind::Pin,
                position,
                id,
                reason,
            }),
        }
    }

    let mut seen = HashSet::new();
    let mut members = Vec::with_capacity(raw_members.len());
    for (position, value) in raw_members.iter().enumerate() {
        let result = serde_json::from_value::<RawMember>(value.clone())
            .map_err(|e| (None, RecordError::Undecodable(e.to_string())))
            .and_then(member_from_raw)
            .and_then(|member| claim_id(&mut seen, member.id.clone()).map(|_| member));
        match result {
            Ok(member) => members.push(member),
            Err((id, reason)) => report.push(DroppedRecord {
                kind: EntityKind::Member,
                position,
                id,
                reason,
            }),
        }
    }

    let pins = deduplicate(pins, config.pin_scale);
    let members = deduplicate(members, config.member_scale);

    info!(
        pins = pins.len(),
        members = members.len(),
        dropped = report.len(),
        "normalized dataset"
    );

    NormalizedDataset {
        pins,
        members,
        report,
    }
}

type Rejected = (Option<String>, RecordError);

fn claim_id(seen: &mut HashSet<String>, id: String) -> Result<(), Rejected> {
    if seen.contains(&id) {
        return Err((Some(id), RecordError::DuplicateId));
    }
    seen.insert(id);
    Ok(())
}

fn required_id(id: Option<String>) -> Result<String, Rejected> {
    match id {
        Some(id) if !id.trim().is_empty() => Ok(id),
        _ => Err((None, RecordError::MissingId)),
    }
}

fn checked_coordinates(
    id: &str,
    lat: Option<&RawNumber>,
    lng: Option<&RawNumber>,
) -> Result<Coordinates, Rejected> {
    let reject = |reason| Err((Some(id.to_string()), reason));
    let (Some(lat), Some(lng)) = (lat, lng) else {
        return reject(RecordError::MissingCoordinates);
    };
    let c = Coordinates::new(lat.as_f64(), lng.as_f64());
    if !c.is_finite() {
        return reject(RecordError::InvalidCoordinates);
    }
    if !c.in_range() {
        return reject(RecordError::OutOfRange {
            lat: c.lat,
            lng: c.lng,
        });
    }
    Ok(c)
}

const LOCAL_DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// ISO 8601 timestamps. Date-times without an offset and bare dates are
/// taken as UTC; a bare date is its midnight.
fn parse_time(s: Option<&str>) -> Option<DateTime<FixedOffset>> {
    let s = s?.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t);
    }
    let local = LOCAL_DATE_TIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    Some(local.and_utc().fixed_offset())
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}

fn pin_from_raw(raw: RawEvent) -> Result<Pin, Rejected> {
    let id = required_id(raw.id)?;
    let location = raw.location.unwrap_or_default();
    // Wire order is [lng, lat]; reversed exactly once here.
    let coords = location.coordinates.unwrap_or_default();
    let coordinates = checked_coordinates(&id, coords.get(1), coords.first())?;

    let label = raw.category.unwrap_or_default();
    let Some(category) = PinCategory::from_label(&label) else {
        return Err((Some(id), RecordError::UnknownCategory(label)));
    };

    let start = parse_time(raw.start_date.as_deref());
    let end = parse_time(raw.end_date.as_deref());
    if start.is_none() && raw.start_date.is_some() {
        warn!(%id, "unparsable event start date");
    }

    Ok(Pin {
        id,
        category,
        name: raw.name.unwrap_or_default(),
        location_text: location.text.unwrap_or_default(),
        coordinates,
        description: raw.description.unwrap_or_default(),
        is_virtual: raw.is_virtual.unwrap_or(false),
        start,
        end,
        link: non_empty(location.link),
        extra_link: non_empty(raw.extra_link),
        contacts: raw.contacts.unwrap_or_default(),
    })
}

fn member_from_raw(raw: RawMember) -> Result<Member, Rejected> {
    let id = required_id(raw.wallet_id)?;
    let location = raw.location.unwrap_or_default();
    let coordinates =
        checked_coordinates(&id, location.latitude.as_ref(), location.longitude.as_ref())?;

    let location_text = location.text.unwrap_or_default();
    let nick_name = raw.nick_name.unwrap_or_default();
    let show_location = !location_text.is_empty()
        && !nick_name.is_empty()
        && raw.monke_number.as_ref().is_some_and(RawNumber::is_truthy);

    Ok(Member {
        id,
        show_location,
        coordinates,
        nick_name,
        monke_number: raw.monke_number.as_ref().map(RawNumber::to_text),
        twitter: non_empty(raw.twitter),
        github: non_empty(raw.github),
        telegram: non_empty(raw.telegram),
        discord: non_empty(raw.discord),
        location_text,
    })
}
