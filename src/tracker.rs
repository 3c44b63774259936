use tracing::info;

use crate::api::EventSource;
use crate::error::TrackerError;
use crate::types::{EventKind, Snapshot, delta};

/// Fetch history for one tracked collection.
///
/// Holds the last snapshot seen per kind; the baseline taken at
/// initialization is never reported as new.
#[derive(Debug, Clone)]
pub struct CollectionTracker {
    collection: String,
    last_bids: Snapshot,
    last_sales: Snapshot,
}

/// Result of one consolidated poll: one fetch per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    pub bids: Snapshot,
    pub sales: Snapshot,
    pub new_bids: Snapshot,
    pub new_sales: Snapshot,
}

impl PollReport {
    pub fn snapshot(&self, kind: EventKind) -> &Snapshot {
        match kind {
            EventKind::Bid => &self.bids,
            EventKind::Sale => &self.sales,
        }
    }

    pub fn new_events(&self, kind: EventKind) -> &Snapshot {
        match kind {
            EventKind::Bid => &self.new_bids,
            EventKind::Sale => &self.new_sales,
        }
    }
}

impl CollectionTracker {
    /// Fetch the baseline for both kinds.
    pub async fn initialize<S: EventSource>(
        source: &S,
        collection: impl Into<String>,
    ) -> Result<Self, TrackerError> {
        let collection = collection.into();
        let last_bids = source.fetch(&collection, EventKind::Bid).await?;
        let last_sales = source.fetch(&collection, EventKind::Sale).await?;
        info!(
            "Tracking {collection}: baseline {} bid(s), {} sale(s)",
            last_bids.len(),
            last_sales.len()
        );
        Ok(Self::with_baseline(collection, last_bids, last_sales))
    }

    pub fn with_baseline(collection: String, last_bids: Snapshot, last_sales: Snapshot) -> Self {
        Self {
            collection,
            last_bids,
            last_sales,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Last stored snapshot for `kind`.
    pub fn last(&self, kind: EventKind) -> &Snapshot {
        match kind {
            EventKind::Bid => &self.last_bids,
            EventKind::Sale => &self.last_sales,
        }
    }

    fn last_mut(&mut self, kind: EventKind) -> &mut Snapshot {
        match kind {
            EventKind::Bid => &mut self.last_bids,
            EventKind::Sale => &mut self.last_sales,
        }
    }

    /// Fresh snapshot without touching stored state.
    pub async fn current<S: EventSource>(
        &self,
        source: &S,
        kind: EventKind,
    ) -> Result<Snapshot, TrackerError> {
        source.fetch(&self.collection, kind).await
    }

    pub async fn current_bids<S: EventSource>(&self, source: &S) -> Result<Snapshot, TrackerError> {
        self.current(source, EventKind::Bid).await
    }

    pub async fn current_sales<S: EventSource>(&self, source: &S) -> Result<Snapshot, TrackerError> {
        self.current(source, EventKind::Sale).await
    }

    /// Fetch, store the fresh snapshot, and return what changed since the last one.
    ///
    /// On fetch failure the stored snapshot is left as it was.
    pub async fn new_events<S: EventSource>(
        &mut self,
        source: &S,
        kind: EventKind,
    ) -> Result<Snapshot, TrackerError> {
        let fresh = source.fetch(&self.collection, kind).await?;
        Ok(self.apply(kind, fresh))
    }

    pub async fn new_bids<S: EventSource>(&mut self, source: &S) -> Result<Snapshot, TrackerError> {
        self.new_events(source, EventKind::Bid).await
    }

    pub async fn new_sales<S: EventSource>(&mut self, source: &S) -> Result<Snapshot, TrackerError> {
        self.new_events(source, EventKind::Sale).await
    }

    /// Replace the stored snapshot for `kind` with `fresh`, returning the delta.
    pub fn apply(&mut self, kind: EventKind, fresh: Snapshot) -> Snapshot {
        let slot = self.last_mut(kind);
        let changed = delta(slot, &fresh);
        *slot = fresh;
        changed
    }

    /// One fetch per kind; the full snapshots and the deltas come from the same data.
    ///
    /// Both kinds are fetched before either is stored, so a failed fetch
    /// leaves the tracker untouched.
    pub async fn poll<S: EventSource>(&mut self, source: &S) -> Result<PollReport, TrackerError> {
        let bids = source.fetch(&self.collection, EventKind::Bid).await?;
        let sales = source.fetch(&self.collection, EventKind::Sale).await?;
        let new_bids = self.apply(EventKind::Bid, bids.clone());
        let new_sales = self.apply(EventKind::Sale, sales.clone());
        Ok(PollReport {
            bids,
            sales,
            new_bids,
            new_sales,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::types::DuplicatePolicy;
    use crate::types::tests::{make_event, ts};

    /// Serves queued snapshots per (collection, kind); `None` entries fail.
    #[derive(Default)]
    pub(crate) struct ScriptedSource {
        responses: Mutex<HashMap<(String, EventKind), VecDeque<Option<Snapshot>>>>,
        pub calls: AtomicUsize,
    }

    impl ScriptedSource {
        pub(crate) fn push(&self, collection: &str, kind: EventKind, snapshot: Option<Snapshot>) {
            self.responses
                .lock()
                .unwrap()
                .entry((collection.to_string(), kind))
                .or_default()
                .push_back(snapshot);
        }
    }

    impl EventSource for ScriptedSource {
        async fn fetch(&self, collection: &str, kind: EventKind) -> Result<Snapshot, TrackerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self
                .responses
                .lock()
                .unwrap()
                .get_mut(&(collection.to_string(), kind))
                .and_then(|q| q.pop_front());
            match next {
                Some(Some(snapshot)) => Ok(snapshot),
                Some(None) => Err(TrackerError::Parse("scripted failure".into())),
                None => Err(TrackerError::Parse(format!("nothing scripted for {collection} {kind}"))),
            }
        }
    }

    pub(crate) fn snap(events: Vec<crate::types::Event>) -> Snapshot {
        Snapshot::from_events(events, DuplicatePolicy::FirstSeen)
    }

    const COLL: &str = "0xabc";

    async fn tracker_with(source: &ScriptedSource, bids: Snapshot, sales: Snapshot) -> CollectionTracker {
        source.push(COLL, EventKind::Bid, Some(bids));
        source.push(COLL, EventKind::Sale, Some(sales));
        CollectionTracker::initialize(source, COLL).await.unwrap()
    }

    #[tokio::test]
    async fn baseline_is_never_reported() {
        let source = ScriptedSource::default();
        let v1 = make_event("A", ts(1, 0, 0), 1);
        let mut t = tracker_with(&source, snap(vec![v1.clone()]), snap(vec![])).await;
        assert_eq!(t.last(EventKind::Bid), &snap(vec![v1.clone()]));

        source.push(COLL, EventKind::Bid, Some(snap(vec![v1])));
        assert!(t.new_bids(&source).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn new_asset_is_reported_and_stored() {
        let source = ScriptedSource::default();
        let v1 = make_event("A", ts(1, 0, 0), 1);
        let v2 = make_event("B", ts(1, 5, 0), 2);
        let mut t = tracker_with(&source, snap(vec![v1.clone()]), snap(vec![])).await;

        source.push(COLL, EventKind::Bid, Some(snap(vec![v1.clone(), v2.clone()])));
        let new = t.new_bids(&source).await.unwrap();
        assert_eq!(new, snap(vec![v2.clone()]));
        assert_eq!(t.last(EventKind::Bid), &snap(vec![v1, v2]));
    }

    #[tokio::test]
    async fn timestamp_only_change_is_reported() {
        let source = ScriptedSource::default();
        let v1 = make_event("A", ts(1, 0, 0), 1);
        let mut v1b = v1.clone();
        v1b.timestamp = ts(1, 0, 1);
        let mut t = tracker_with(&source, snap(vec![v1]), snap(vec![])).await;

        source.push(COLL, EventKind::Bid, Some(snap(vec![v1b.clone()])));
        assert_eq!(t.new_bids(&source).await.unwrap(), snap(vec![v1b]));
    }

    #[tokio::test]
    async fn current_does_not_mutate() {
        let source = ScriptedSource::default();
        let v1 = make_event("A", ts(1, 0, 0), 1);
        let v2 = make_event("B", ts(1, 0, 0), 1);
        let t = tracker_with(&source, snap(vec![]), snap(vec![v1.clone()])).await;

        source.push(COLL, EventKind::Sale, Some(snap(vec![v1.clone(), v2.clone()])));
        let current = t.current_sales(&source).await.unwrap();
        assert_eq!(current.len(), 2);
        assert_eq!(t.last(EventKind::Sale), &snap(vec![v1]));
    }

    #[tokio::test]
    async fn failed_fetch_keeps_stored_state() {
        let source = ScriptedSource::default();
        let v1 = make_event("A", ts(1, 0, 0), 1);
        let mut t = tracker_with(&source, snap(vec![]), snap(vec![v1.clone()])).await;

        source.push(COLL, EventKind::Sale, None);
        assert!(t.new_sales(&source).await.is_err());
        assert_eq!(t.last(EventKind::Sale), &snap(vec![v1]));
    }

    #[tokio::test]
    async fn poll_fetches_once_per_kind() {
        let source = ScriptedSource::default();
        let a = make_event("A", ts(1, 0, 0), 1);
        let s = make_event("S", ts(1, 0, 0), 7);
        let mut t = tracker_with(&source, snap(vec![a.clone()]), snap(vec![])).await;
        let before = source.calls.load(Ordering::SeqCst);

        let b = make_event("B", ts(2, 0, 0), 2);
        source.push(COLL, EventKind::Bid, Some(snap(vec![a.clone(), b.clone()])));
        source.push(COLL, EventKind::Sale, Some(snap(vec![s.clone()])));
        let report = t.poll(&source).await.unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst) - before, 2);
        assert_eq!(report.bids.len(), 2);
        assert_eq!(report.new_bids, snap(vec![b]));
        assert_eq!(report.new_events(EventKind::Sale), &snap(vec![s]));
        assert_eq!(t.last(EventKind::Bid), report.snapshot(EventKind::Bid));
    }

    #[tokio::test]
    async fn poll_is_all_or_nothing() {
        let source = ScriptedSource::default();
        let a = make_event("A", ts(1, 0, 0), 1);
        let mut t = tracker_with(&source, snap(vec![a.clone()]), snap(vec![])).await;

        source.push(COLL, EventKind::Bid, Some(snap(vec![])));
        source.push(COLL, EventKind::Sale, None);
        assert!(t.poll(&source).await.is_err());
        assert_eq!(t.last(EventKind::Bid), &snap(vec![a]));
    }

    #[tokio::test]
    async fn initialize_propagates_fetch_errors() {
        let source = ScriptedSource::default();
        source.push(COLL, EventKind::Bid, None);
        let err = CollectionTracker::initialize(&source, COLL).await.unwrap_err();
        assert!(err.is_parse());
    }
}
