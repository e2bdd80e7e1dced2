//! Wire records as returned by the events and users endpoints.
//!
//! Every field is optional here; the normalizer decides what is required.

use serde::Deserialize;

/// A JSON value that should be a number but is sometimes sent as a string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawNumber {
    Num(f64),
    Text(String),
}

impl RawNumber {
    /// Numeric value; unparsable or empty text is NaN.
    pub fn as_f64(&self) -> f64 {
        match self {
            RawNumber::Num(n) => *n,
            RawNumber::Text(s) => s.trim().parse().unwrap_or(f64::NAN),
        }
    }

    /// Zero, NaN and empty strings are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            RawNumber::Num(n) => *n != 0.0 && !n.is_nan(),
            RawNumber::Text(s) => !s.is_empty(),
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            RawNumber::Num(n) => n.to_string(),
            RawNumber::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub category: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<RawEventLocation>,
    #[serde(rename = "virtual")]
    pub is_virtual: Option<bool>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub extra_link: Option<String>,
    pub contacts: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawEventLocation {
    /// GeoJSON order: `[lng, lat]`.
    pub coordinates: Option<Vec<RawNumber>>,
    pub text: Option<String>,
    pub link: Option<String>,
    pub has_link: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawMember {
    pub wallet_id: Option<String>,
    pub nick_name: Option<String>,
    pub monke_number: Option<RawNumber>,
    pub twitter: Option<String>,
    pub github: Option<String>,
    pub telegram: Option<String>,
    pub discord: Option<String>,
    pub location: Option<RawMemberLocation>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawMemberLocation {
    pub latitude: Option<RawNumber>,
    pub longitude: Option<RawNumber>,
    pub text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::{RawEvent, RawMember, RawNumber};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn numbers_accept_strings() {
        let n: RawNumber = serde_json::from_value(json!("40.25")).expect("text");
        assert_eq!(n.as_f64(), 40.25);
        let n: RawNumber = serde_json::from_value(json!(-3.5)).expect("num");
        assert_eq!(n.as_f64(), -3.5);
        assert!(RawNumber::Text("abc".into()).as_f64().is_nan());
        assert!(!RawNumber::Text(String::new()).is_truthy());
        assert!(!RawNumber::Num(0.0).is_truthy());
    }

    #[test]
    fn event_fields_are_renamed() {
        let raw: RawEvent = serde_json::from_value(json!({
            "id": "e1",
            "type": "MonkeDAO Meet-up",
            "virtual": true,
            "startDate": "2022-06-03T18:30:00Z",
            "location": { "coordinates": [-122.3926, 47.6496], "text": "Seattle" },
            "status": "approved"
        }))
        .expect("event");
        assert_eq!(raw.category.as_deref(), Some("MonkeDAO Meet-up"));
        assert_eq!(raw.is_virtual, Some(true));
        assert_eq!(raw.location.and_then(|l| l.coordinates).map(|c| c.len()), Some(2));
    }

    #[test]
    fn member_tolerates_missing_fields() {
        let raw: RawMember = serde_json::from_value(json!({ "walletId": "w1" })).expect("member");
        assert_eq!(raw.wallet_id.as_deref(), Some("w1"));
        assert_eq!(raw.location, None);
    }
}
