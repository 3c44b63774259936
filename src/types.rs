use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::Deserialize;

/// Display format for event timestamps (seconds precision, space separated).
pub const DISPLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The two marketplace event kinds the bot forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Bid,
    Sale,
}

impl EventKind {
    pub const ALL: [EventKind; 2] = [EventKind::Bid, EventKind::Sale];

    /// Default `event_type` query value for the events endpoint.
    pub fn api_event_type(self) -> &'static str {
        match self {
            EventKind::Bid => "bid",
            EventKind::Sale => "successful",
        }
    }

    /// JSON field carrying the monetary amount for this kind.
    pub fn amount_field(self) -> &'static str {
        match self {
            EventKind::Bid => "bid_amount",
            EventKind::Sale => "total_price",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EventKind::Bid => "BID",
            EventKind::Sale => "SALE",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Bid => f.write_str("bid"),
            EventKind::Sale => f.write_str("sale"),
        }
    }
}

/// A bid or a sale for one asset at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Token identifier, unique per collection+kind snapshot.
    pub asset_id: String,
    /// Source-provided creation time (naive, as served by the API).
    pub timestamp: NaiveDateTime,
    pub asset_name: String,
    /// Amount in the payment token's smallest denomination.
    pub price_raw: u128,
    pub price_decimals: u32,
    pub price_symbol: String,
    pub image_url: Option<String>,
}

impl Event {
    /// Human price: `price_raw / 10^price_decimals`.
    ///
    /// Exact via `Decimal` when the amount fits, otherwise an f64 approximation.
    /// Whole amounts keep one decimal place (`1.0`).
    pub fn display_price(&self) -> String {
        let exact = i128::try_from(self.price_raw)
            .ok()
            .and_then(|raw| Decimal::try_from_i128_with_scale(raw, self.price_decimals).ok());
        match exact {
            Some(d) => {
                let d = d.normalize();
                if d.scale() == 0 {
                    format!("{d}.0")
                } else {
                    d.to_string()
                }
            }
            None => {
                let scaled = self.price_raw as f64 / 10f64.powi(self.price_decimals as i32);
                if scaled.fract() == 0.0 {
                    format!("{scaled:.1}")
                } else {
                    scaled.to_string()
                }
            }
        }
    }

    /// One-line rendering used for both chat messages and console summaries.
    pub fn format_line(&self, kind: EventKind) -> String {
        format!(
            "[ {} @ {} ]\t{}\tfor\t{} {}",
            kind.label(),
            self.timestamp.format(DISPLAY_TIME_FORMAT),
            self.asset_name,
            self.display_price(),
            self.price_symbol,
        )
    }
}

/// How to resolve several events for the same asset within one fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Keep the first event in API response order, whatever its timestamp.
    #[default]
    FirstSeen,
    /// Keep the event with the greatest timestamp; ties keep the earlier one.
    LatestTimestamp,
}

/// Latest known event per asset for one collection and one kind.
///
/// Iteration follows insertion order, which is API response order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: Vec<Event>,
    index: HashMap<String, usize>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from events in response order.
    pub fn from_events(events: impl IntoIterator<Item = Event>, policy: DuplicatePolicy) -> Self {
        let mut snapshot = Self::new();
        for event in events {
            snapshot.insert(event, policy);
        }
        snapshot
    }

    /// Insert an event, resolving a clash on `asset_id` according to `policy`.
    pub fn insert(&mut self, event: Event, policy: DuplicatePolicy) {
        match self.index.get(&event.asset_id).copied() {
            None => {
                self.index.insert(event.asset_id.clone(), self.entries.len());
                self.entries.push(event);
            }
            Some(pos) => {
                if policy == DuplicatePolicy::LatestTimestamp
                    && let Some(existing) = self.entries.get_mut(pos)
                    && event.timestamp > existing.timestamp
                {
                    *existing = event;
                }
            }
        }
    }

    pub fn get(&self, asset_id: &str) -> Option<&Event> {
        self.index
            .get(asset_id)
            .and_then(|&pos| self.entries.get(pos))
    }

    pub fn contains(&self, asset_id: &str) -> bool {
        self.index.contains_key(asset_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.entries.iter()
    }

    pub fn asset_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.asset_id.as_str())
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Entries of `current` that are absent from `previous` or differ from it in any field.
///
/// Pure function of its inputs; result keeps `current`'s order.
pub fn delta(previous: &Snapshot, current: &Snapshot) -> Snapshot {
    let mut changed = Snapshot::new();
    for event in current {
        if previous.get(&event.asset_id) != Some(event) {
            changed.insert(event.clone(), DuplicatePolicy::FirstSeen);
        }
    }
    changed
}
