use std::future::Future;

use chrono::NaiveDateTime;
use serde::Deserialize;
use tracing::debug;

use crate::error::TrackerError;
use crate::types::{DuplicatePolicy, Event, EventKind, Snapshot};

/// `created_date` format served by the events endpoint: exactly six fraction digits, no zone.
pub const CREATED_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.%6f";

/// Anything that can produce the latest event per asset for a collection.
pub trait EventSource {
    fn fetch(
        &self,
        collection: &str,
        kind: EventKind,
    ) -> impl Future<Output = Result<Snapshot, TrackerError>> + Send;
}

/// HTTP client for the OpenSea events endpoint.
#[derive(Debug, Clone)]
pub struct OpenSeaClient {
    http: reqwest::Client,
    events_url: String,
    api_key: Option<String>,
    bid_event_type: String,
    policy: DuplicatePolicy,
}

impl OpenSeaClient {
    pub fn new(http: reqwest::Client, events_url: impl Into<String>) -> Self {
        Self {
            http,
            events_url: events_url.into(),
            api_key: None,
            bid_event_type: EventKind::Bid.api_event_type().to_string(),
            policy: DuplicatePolicy::default(),
        }
    }

    /// Send `X-API-KEY` with every request.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    /// Override the `event_type` used for bids (e.g. `offer_entered`).
    pub fn with_bid_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.bid_event_type = event_type.into();
        self
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    fn event_type(&self, kind: EventKind) -> &str {
        match kind {
            EventKind::Bid => &self.bid_event_type,
            EventKind::Sale => kind.api_event_type(),
        }
    }
}

impl EventSource for OpenSeaClient {
    /// One GET per call: no retries, client-default timeouts.
    async fn fetch(&self, collection: &str, kind: EventKind) -> Result<Snapshot, TrackerError> {
        let mut req = self.http.get(&self.events_url).query(&[
            ("asset_contract_address", collection),
            ("event_type", self.event_type(kind)),
            ("format", "json"),
        ]);
        if let Some(key) = &self.api_key {
            req = req.header("X-API-KEY", key);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TrackerError::Status {
                url: resp.url().to_string(),
                status,
            });
        }
        let body = resp.text().await?;
        let snapshot = parse_events(&body, kind, self.policy)?;
        debug!(
            "Fetched {} {kind} event(s) for {collection}",
            snapshot.len()
        );
        Ok(snapshot)
    }
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    asset_events: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    created_date: String,
    asset: Option<RawAsset>,
    #[serde(default)]
    bid_amount: Option<IntOrString>,
    #[serde(default)]
    total_price: Option<IntOrString>,
    payment_token: Option<RawPaymentToken>,
}

#[derive(Debug, Deserialize)]
struct RawAsset {
    #[serde(default)]
    name: Option<String>,
    token_id: IntOrString,
    #[serde(default)]
    image_thumbnail_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPaymentToken {
    decimals: IntOrString,
    symbol: String,
}

/// The API serves integers either as JSON strings or JSON numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IntOrString {
    Number(u64),
    Text(String),
}

impl IntOrString {
    fn text(&self) -> String {
        match self {
            IntOrString::Number(n) => n.to_string(),
            IntOrString::Text(s) => s.trim().to_string(),
        }
    }

    fn parse<T: std::str::FromStr>(&self, field: &str) -> Result<T, TrackerError> {
        let text = self.text();
        text.parse()
            .map_err(|_| TrackerError::Parse(format!("{field}: not an integer: {text:?}")))
    }
}

pub fn parse_created_date(value: &str) -> Result<NaiveDateTime, TrackerError> {
    NaiveDateTime::parse_from_str(value, CREATED_DATE_FORMAT).map_err(|source| {
        TrackerError::Timestamp {
            value: value.to_string(),
            source,
        }
    })
}

/// Parse an events response body into a snapshot, in response order.
///
/// Any malformed event fails the whole parse.
pub fn parse_events(
    body: &str,
    kind: EventKind,
    policy: DuplicatePolicy,
) -> Result<Snapshot, TrackerError> {
    let response: EventsResponse = serde_json::from_str(body)?;
    let events = response
        .asset_events
        .into_iter()
        .map(|raw| convert_event(raw, kind))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Snapshot::from_events(events, policy))
}

fn convert_event(raw: RawEvent, kind: EventKind) -> Result<Event, TrackerError> {
    let asset = raw
        .asset
        .ok_or_else(|| TrackerError::Parse("event without asset".into()))?;
    let payment = raw
        .payment_token
        .ok_or_else(|| TrackerError::Parse("event without payment_token".into()))?;
    let amount = match kind {
        EventKind::Bid => raw.bid_amount,
        EventKind::Sale => raw.total_price,
    }
    .ok_or_else(|| TrackerError::Parse(format!("event without {}", kind.amount_field())))?;

    let asset_id = asset.token_id.text();
    let asset_name = asset.name.unwrap_or_else(|| format!("#{asset_id}"));

    Ok(Event {
        timestamp: parse_created_date(&raw.created_date)?,
        price_raw: amount.parse(kind.amount_field())?,
        price_decimals: payment.decimals.parse("payment_token.decimals")?,
        price_symbol: payment.symbol,
        image_url: asset.image_thumbnail_url.filter(|u| !u.is_empty()),
        asset_name,
        asset_id,
    })
}
