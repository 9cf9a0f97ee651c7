//! Row projection for the pantry list: location names, age buckets, ordering.

use crate::entities::{location, pantry_item};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder shown for an absent location or an item never scanned.
pub const PLACEHOLDER: &str = "-";

const SECS_PER_MINUTE: i64 = 60;
const MINUTES_PER_HOUR: i64 = 60;
const HOURS_SHOWN_BEFORE_DAYS: i64 = 48;

/// Coarsened time since an item was last scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgeBucket {
    Never,
    Seconds(i64),
    Minutes(i64),
    Hours(i64),
    Days(i64),
}

impl AgeBucket {
    /// Picks the finest unit whose magnitude stays under its threshold:
    /// seconds below 60, minutes below 60, hours below 48, days otherwise.
    pub fn since(last_scanned: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        let Some(last) = last_scanned else {
            return AgeBucket::Never;
        };

        // A timestamp from the future (clock skew between instances) reads as fresh.
        let seconds = (now - last).num_seconds().max(0);
        if seconds < SECS_PER_MINUTE {
            return AgeBucket::Seconds(seconds);
        }
        let minutes = seconds / SECS_PER_MINUTE;
        if minutes < MINUTES_PER_HOUR {
            return AgeBucket::Minutes(minutes);
        }
        let hours = minutes / MINUTES_PER_HOUR;
        if hours < HOURS_SHOWN_BEFORE_DAYS {
            return AgeBucket::Hours(hours);
        }
        AgeBucket::Days(hours / 24)
    }
}

impl fmt::Display for AgeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgeBucket::Never => f.write_str(PLACEHOLDER),
            AgeBucket::Seconds(n) => write!(f, "{n}s"),
            AgeBucket::Minutes(n) => write!(f, "{n}m"),
            AgeBucket::Hours(n) => write!(f, "{n}h"),
            AgeBucket::Days(n) => write!(f, "{n}d"),
        }
    }
}

/// Which rows the pantry list shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationFilter {
    #[default]
    All,
    Only(i32),
}

impl LocationFilter {
    pub fn location_id(&self) -> Option<i32> {
        match self {
            LocationFilter::All => None,
            LocationFilter::Only(id) => Some(*id),
        }
    }

    /// Human readable label, given the name of the filtered location if known.
    pub fn label(&self, location_name: Option<&str>) -> String {
        match (self, location_name) {
            (LocationFilter::All, _) => "All locations".to_string(),
            (LocationFilter::Only(_), Some(name)) => name.to_string(),
            (LocationFilter::Only(id), None) => format!("Location #{id}"),
        }
    }
}

impl From<Option<i32>> for LocationFilter {
    fn from(id: Option<i32>) -> Self {
        id.map_or(LocationFilter::All, LocationFilter::Only)
    }
}

/// A pantry row as presented to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryRow {
    pub barcode: String,
    pub name: String,
    pub quantity: i32,
    pub last_scanned: Option<DateTime<Utc>>,
    pub location_id: Option<i32>,
    pub location_name: Option<String>,
    pub age: AgeBucket,
}

impl InventoryRow {
    pub fn location_label(&self) -> &str {
        self.location_name.as_deref().unwrap_or(PLACEHOLDER)
    }
}

/// Builds rows from items joined with their (optional) location.
pub struct InventoryView;

impl InventoryView {
    /// Filters to `filter`, annotates ages relative to `now` and sorts by name,
    /// case-insensitively, with the barcode breaking ties.
    pub fn project(
        pairs: Vec<(pantry_item::Model, Option<location::Model>)>,
        filter: LocationFilter,
        now: DateTime<Utc>,
    ) -> Vec<InventoryRow> {
        let mut rows: Vec<InventoryRow> = pairs
            .into_iter()
            .filter(|(item, _)| match filter {
                LocationFilter::All => true,
                LocationFilter::Only(id) => item.location_id == Some(id),
            })
            .map(|(item, location)| InventoryRow {
                age: AgeBucket::since(item.last_scanned, now),
                location_name: location.map(|l| l.name),
                barcode: item.barcode,
                name: item.name,
                quantity: item.quantity,
                last_scanned: item.last_scanned,
                location_id: item.location_id,
            })
            .collect();

        rows.sort_by_cached_key(|row| (row.name.to_lowercase(), row.barcode.clone()));
        rows
    }
}
