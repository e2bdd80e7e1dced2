use std::collections::HashSet;

use model::entity::{EntityKey, Member, Pin};
use model::normalize::NormalizedDataset;
use serde::Serialize;

use crate::machine::DataState;

/// Message shown when nothing is in view.
pub const EMPTY_MESSAGE: &str = "No visible pins.";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ListStatus {
    Loading,
    Empty,
    Populated,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRow {
    pub key: EntityKey,
    pub title: String,
    pub subtitle: String,
    pub highlighted: bool,
}

impl ListRow {
    fn pin(p: &Pin, highlighted: Option<&EntityKey>) -> Self {
        let key = p.key();
        Self {
            highlighted: highlighted == Some(&key),
            key,
            title: p.name.clone(),
            subtitle: p
                .formatted_start()
                .unwrap_or_else(|| p.location_text.clone()),
        }
    }

    fn member(m: &Member, highlighted: Option<&EntityKey>) -> Self {
        let key = m.key();
        Self {
            highlighted: highlighted == Some(&key),
            key,
            title: m.nick_name.clone(),
            subtitle: m.location_text.clone(),
        }
    }
}

/// The off-map list panel.
///
/// `rows` holds the entities under the markers currently drawn, pins first,
/// each group in dataset order. Virtual events never have a marker and are
/// listed separately.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListView {
    pub status: ListStatus,
    pub rows: Vec<ListRow>,
    pub virtual_rows: Vec<ListRow>,
}

impl ListView {
    pub fn build(
        data: DataState,
        dataset: &NormalizedDataset,
        visible: &[EntityKey],
        highlighted: Option<&EntityKey>,
    ) -> Self {
        let visible: HashSet<&EntityKey> = visible.iter().collect();

        let mut rows: Vec<ListRow> = dataset
            .pins
            .iter()
            .filter(|p| !p.is_virtual && visible.contains(&p.key()))
            .map(|p| ListRow::pin(p, highlighted))
            .collect();
        rows.extend(
            dataset
                .members
                .iter()
                .filter(|m| m.show_location && visible.contains(&m.key()))
                .map(|m| ListRow::member(m, highlighted)),
        );

        let virtual_rows = dataset
            .pins
            .iter()
            .filter(|p| p.is_virtual)
            .map(|p| ListRow::pin(p, highlighted))
            .collect();

        let status = match data {
            DataState::Loading => ListStatus::Loading,
            _ if rows.is_empty() => ListStatus::Empty,
            _ => ListStatus::Populated,
        };

        Self {
            status,
            rows,
            virtual_rows,
        }
    }

    pub fn message(&self) -> Option<&'static str> {
        match self.status {
            ListStatus::Loading => Some("Loading..."),
            ListStatus::Empty => Some(EMPTY_MESSAGE),
            ListStatus::Populated => None,
        }
    }

    pub fn highlighted(&self) -> Option<&ListRow> {
        self.rows.iter().find(|r| r.highlighted)
    }
}
