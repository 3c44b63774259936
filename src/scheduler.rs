use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::api::EventSource;
use crate::config::SettingsConfig;
use crate::error::TrackerError;
use crate::notifier::Notifier;
use crate::reporter::ConsoleSummary;
use crate::tracker::CollectionTracker;
use crate::types::EventKind;

/// Counters for one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub trackers_ok: usize,
    pub trackers_failed: usize,
    pub notified: usize,
    pub delivery_failures: usize,
}

/// Totals over the scheduler's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub notified: u64,
    pub tracker_failures: u64,
}

/// Drives every tracker on a fixed interval and routes deltas to the notifier.
///
/// Cycles run inline in the timer loop, so at most one is in flight; ticks
/// that fall due while a cycle is still running are skipped.
pub struct PollScheduler<S, N> {
    source: S,
    notifier: N,
    trackers: Vec<CollectionTracker>,
    interval: Duration,
    print_sales: bool,
    print_bids: bool,
}

/// Short label for a poll failure in logs.
fn failure_kind(e: &TrackerError) -> &'static str {
    if e.is_network() {
        "network"
    } else if e.is_parse() {
        "parse"
    } else {
        "other"
    }
}

/// Take the baseline for each collection, in configured order.
///
/// Any failure aborts startup.
pub async fn initialize_trackers<S: EventSource>(
    source: &S,
    collections: &[String],
) -> Result<Vec<CollectionTracker>, TrackerError> {
    let mut trackers = Vec::with_capacity(collections.len());
    for collection in collections {
        trackers.push(CollectionTracker::initialize(source, collection.as_str()).await?);
    }
    Ok(trackers)
}

impl<S: EventSource, N: Notifier> PollScheduler<S, N> {
    pub fn new(
        source: S,
        notifier: N,
        trackers: Vec<CollectionTracker>,
        interval: Duration,
        settings: &SettingsConfig,
    ) -> Self {
        Self {
            source,
            notifier,
            trackers,
            interval,
            print_sales: settings.print_sales_to_console,
            print_bids: settings.print_bids_to_console,
        }
    }

    pub fn trackers(&self) -> &[CollectionTracker] {
        &self.trackers
    }

    /// One pass over all trackers.
    ///
    /// A tracker whose fetch fails is skipped for this cycle with its state
    /// untouched; a failed delivery is logged and the next event proceeds.
    pub async fn run_cycle(&mut self) -> CycleStats {
        let mut stats = CycleStats::default();
        let mut summary = ConsoleSummary::new();

        for tracker in &mut self.trackers {
            let report = match tracker.poll(&self.source).await {
                Ok(report) => report,
                Err(e) => {
                    warn!(
                        "Poll failed for {} ({}): {e}",
                        tracker.collection(),
                        failure_kind(&e)
                    );
                    stats.trackers_failed += 1;
                    continue;
                }
            };
            stats.trackers_ok += 1;
            summary.add(EventKind::Sale, &report.sales);
            summary.add(EventKind::Bid, &report.bids);

            for kind in EventKind::ALL {
                for event in report.new_events(kind) {
                    match self.notifier.notify(kind, event).await {
                        Ok(()) => stats.notified += 1,
                        Err(e) => {
                            warn!(
                                "Failed to deliver {kind} for {} ({}): {e}",
                                event.asset_name,
                                tracker.collection()
                            );
                            stats.delivery_failures += 1;
                        }
                    }
                }
            }
        }

        summary.print(self.print_sales, self.print_bids);
        if stats.notified > 0 || stats.trackers_failed > 0 {
            info!(
                "Cycle done: {} notification(s), {} tracker failure(s)",
                stats.notified, stats.trackers_failed
            );
        }
        stats
    }

    /// Wait for the notifier, then poll until `shutdown` resolves.
    pub async fn run<F: Future<Output = ()>>(mut self, shutdown: F) -> Result<RunSummary, TrackerError> {
        let mut summary = RunSummary::default();
        tokio::pin!(shutdown);

        info!("Launching...");
        tokio::select! {
            ready = self.notifier.wait_until_ready() => ready?,
            _ = &mut shutdown => {
                info!("Shutdown signal received before startup completed");
                return Ok(summary);
            }
        }

        info!(
            "Entering polling loop (interval: {:?}, {} collection(s))",
            self.interval,
            self.trackers.len()
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
                _ = ticker.tick() => {
                    let stats = self.run_cycle().await;
                    summary.cycles += 1;
                    summary.notified += stats.notified as u64;
                    summary.tracker_failures += stats.trackers_failed as u64;
                }
            }
        }

        info!(
            "Stopped after {} cycle(s), {} notification(s) sent",
            summary.cycles, summary.notified
        );
        Ok(summary)
    }
}
