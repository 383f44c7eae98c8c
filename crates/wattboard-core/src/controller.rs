//! Filter-driven fetch orchestration with stale-response protection.
//!
//! [`SyncController`] owns one table's worth of dashboard state: the
//! visible result set, its KPI summary, pagination, and the loading/error
//! flags. Each call to [`SyncController::sync`] tags a new fetch with the
//! next sequence number; when the fetch settles, its outcome is committed
//! only if no newer fetch has been issued in the meantime. The check and
//! the commit happen under the same lock, so a stale response can never
//! overwrite a newer one regardless of arrival order.
//!
//! State is published through a [`tokio::sync::watch`] channel. Views hold a
//! receiver and re-render on change.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use wattboard_types::{FilterSet, ResourceKind};

use crate::config::ControllerConfig;
use crate::derive::DerivedSummary;
use crate::error::Error;
use crate::events::{EventDispatcher, EventReceiver, SyncEvent};
use crate::paginate::{Page, PageView, paginate};
use crate::sequencer::RequestSequencer;
use crate::traits::{DataSource, Record};

/// Lifecycle of the visible result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Nothing fetched yet.
    Idle,
    /// A fetch is in flight; previous data (if any) is still shown.
    Loading,
    /// The latest fetch returned at least one row.
    Resolved,
    /// The latest fetch returned no rows.
    Empty,
    /// The latest fetch failed; previous data is still shown.
    Failed,
}

impl SyncStatus {
    /// Lowercase name, e.g. `"loading"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Loading => "loading",
            SyncStatus::Resolved => "resolved",
            SyncStatus::Empty => "empty",
            SyncStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one fetch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    /// Issued, not yet settled.
    InFlight,
    /// Settled while current and committed.
    Resolved,
    /// Settled while current with an error.
    Failed,
    /// Superseded before it settled.
    Discarded,
}

/// One dispatched fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncCycle {
    /// Sequence tag issued at dispatch.
    pub sequence: u64,
    /// Selection the fetch was issued for.
    pub filters: FilterSet,
    /// Where the cycle is in its lifecycle.
    pub status: CycleStatus,
}

/// Everything a view needs to render one table.
#[derive(Debug, Clone)]
pub struct SyncState<R> {
    /// Coarse status of the visible data.
    pub status: SyncStatus,
    /// Whether the current cycle is still in flight.
    pub loading: bool,
    /// Error from the latest settled cycle, cleared when a new one starts.
    pub error: Option<Error>,
    /// Rows of the last successful cycle.
    pub records: Arc<Vec<R>>,
    /// KPI tiles for `records`.
    pub summary: Arc<DerivedSummary>,
    /// Current page, 1-based.
    pub page_index: usize,
    /// Rows per page.
    pub page_size: usize,
    /// Cycle whose rows are visible.
    pub committed: Option<SyncCycle>,
    /// Most recently dispatched cycle.
    pub cycle: Option<SyncCycle>,
}

impl<R> SyncState<R> {
    fn new(page_size: usize) -> Self {
        Self {
            status: SyncStatus::Idle,
            loading: false,
            error: None,
            records: Arc::new(Vec::new()),
            summary: Arc::new(DerivedSummary::default()),
            page_index: 1,
            page_size: page_size.max(1),
            committed: None,
            cycle: None,
        }
    }

    /// The visible page of rows.
    pub fn page(&self) -> Page<'_, R> {
        paginate(&self.records, self.page_index, self.page_size)
    }

    /// Position of the visible page.
    pub fn page_view(&self) -> PageView {
        PageView::new(self.records.len(), self.page_index, self.page_size)
    }

    /// Whether any fetch has ever been committed.
    pub fn has_data(&self) -> bool {
        self.committed.is_some()
    }

    /// Status to fall back to when the in-flight cycle is abandoned.
    fn settled_status(&self) -> SyncStatus {
        match &self.committed {
            None => SyncStatus::Idle,
            Some(_) if self.records.is_empty() => SyncStatus::Empty,
            Some(_) => SyncStatus::Resolved,
        }
    }
}

enum Outcome {
    Committed(usize),
    Failed(String),
    Discarded(u64),
}

struct ControllerInner<R: Record, S: DataSource> {
    source: Arc<S>,
    kind: ResourceKind,
    sequencer: RequestSequencer,
    state: watch::Sender<SyncState<R>>,
    last_requested: Mutex<Option<FilterSet>>,
    events: EventDispatcher,
    tasks: TaskTracker,
}

/// Fetches rows of type `R` from `S` whenever asked, keeping only the
/// latest-issued response.
///
/// Cloning is cheap and yields a handle to the same controller.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use wattboard_core::{ControllerConfig, MockSource, SyncController, SyncStatus};
/// use wattboard_types::{FilterSet, MeterReading};
///
/// #[tokio::main]
/// async fn main() {
///     let source = Arc::new(MockSource::new());
///     let controller: SyncController<MeterReading, _> =
///         SyncController::new(source, &ControllerConfig::default());
///
///     controller.sync(FilterSet::new().with_institution("A"));
///     controller.wait_idle().await;
///     assert_eq!(controller.snapshot().status, SyncStatus::Empty);
/// }
/// ```
pub struct SyncController<R: Record, S: DataSource> {
    inner: Arc<ControllerInner<R, S>>,
}

impl<R: Record, S: DataSource> Clone for SyncController<R, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Record, S: DataSource> std::fmt::Debug for SyncController<R, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncController")
            .field("kind", &self.inner.kind)
            .field("source", &self.inner.source.describe())
            .field("latest_sequence", &self.inner.sequencer.latest())
            .field("in_flight", &self.inner.tasks.len())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<R: Record, S: DataSource> SyncController<R, S> {
    /// Create a controller with its own event channel.
    pub fn new(source: Arc<S>, config: &ControllerConfig) -> Self {
        Self::with_events(source, config, EventDispatcher::new(config.event_capacity))
    }

    /// Create a controller publishing to a shared event channel.
    pub fn with_events(source: Arc<S>, config: &ControllerConfig, events: EventDispatcher) -> Self {
        let (state, _) = watch::channel(SyncState::new(config.page_size));
        Self {
            inner: Arc::new(ControllerInner {
                source,
                kind: R::KIND,
                sequencer: RequestSequencer::new(),
                state,
                last_requested: Mutex::new(None),
                events,
                tasks: TaskTracker::new(),
            }),
        }
    }

    /// Resource this controller fetches.
    pub fn kind(&self) -> ResourceKind {
        self.inner.kind
    }

    /// Fetch rows for `filters`.
    ///
    /// Does nothing when no institution is selected. Otherwise the state
    /// flips to loading immediately (previous rows stay visible) and the
    /// fetch runs on a background task. Its outcome is committed only if no
    /// newer `sync` has been issued by the time it settles.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn sync(&self, filters: FilterSet) {
        let inner = &self.inner;
        let filters = filters.normalized();
        if !filters.has_institution() {
            debug!("No institution selected, skipping {} sync", inner.kind);
            inner.events.send(SyncEvent::Skipped { kind: inner.kind });
            return;
        }

        *lock(&inner.last_requested) = Some(filters.clone());

        // Issue the tag under the state lock so dispatch order and tag order agree.
        let mut sequence = 0;
        inner.state.send_modify(|s| {
            sequence = inner.sequencer.next();
            s.status = SyncStatus::Loading;
            s.loading = true;
            s.error = None;
            s.cycle = Some(SyncCycle {
                sequence,
                filters: filters.clone(),
                status: CycleStatus::InFlight,
            });
        });

        debug!(
            "Dispatching {} fetch #{} (institution={:?}, device={:?})",
            inner.kind,
            sequence,
            filters.institution(),
            filters.device()
        );
        inner.events.send(SyncEvent::Dispatched {
            kind: inner.kind,
            sequence,
            filters: filters.clone(),
        });

        let task = Arc::clone(inner);
        inner.tasks.spawn(async move {
            task.run_cycle(sequence, filters).await;
        });
    }

    /// Re-issue the most recently requested selection.
    ///
    /// Returns `false` when nothing was ever requested.
    pub fn retry(&self) -> bool {
        let last = lock(&self.inner.last_requested).clone();
        match last {
            Some(filters) => {
                info!("Retrying {} fetch", self.inner.kind);
                self.sync(filters);
                true
            }
            None => false,
        }
    }

    /// Invalidate the in-flight cycle, if any, and leave the loading state.
    ///
    /// Used when the selection no longer permits a fetch (institution
    /// cleared) so that a late response cannot repopulate the table.
    pub fn abandon(&self) {
        let inner = &self.inner;
        inner.state.send_if_modified(|s| {
            let latest = inner.sequencer.next();
            if !s.loading {
                return false;
            }
            debug!("Abandoning {} fetch, sequence now {}", inner.kind, latest);
            s.loading = false;
            s.status = s.settled_status();
            if let Some(cycle) = s.cycle.as_mut() {
                cycle.status = CycleStatus::Discarded;
            }
            true
        });
    }

    /// Move to page `index`, clamped into range.
    pub fn set_page_index(&self, index: usize) {
        self.inner.state.send_if_modified(|s| {
            let view = PageView::new(s.records.len(), index, s.page_size);
            if view.page_index == s.page_index {
                return false;
            }
            s.page_index = view.page_index;
            true
        });
    }

    /// Change rows per page, keeping the current page when it still exists.
    pub fn set_page_size(&self, size: usize) {
        let size = size.max(1);
        self.inner.state.send_if_modified(|s| {
            let index = PageView::new(s.records.len(), s.page_index, size).page_index;
            if s.page_size == size && s.page_index == index {
                return false;
            }
            s.page_size = size;
            s.page_index = index;
            true
        });
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<SyncState<R>> {
        self.inner.state.subscribe()
    }

    /// Receiver for lifecycle events.
    pub fn subscribe_events(&self) -> EventReceiver {
        self.inner.events.subscribe()
    }

    /// Copy of the current state. Rows and summary are shared, not cloned.
    pub fn snapshot(&self) -> SyncState<R> {
        self.inner.state.borrow().clone()
    }

    /// Position of the visible page.
    pub fn page_view(&self) -> PageView {
        self.inner.state.borrow().page_view()
    }

    /// Most recently issued sequence tag.
    pub fn latest_sequence(&self) -> u64 {
        self.inner.sequencer.latest()
    }

    /// Number of fetches not yet settled, stale ones included.
    pub fn in_flight(&self) -> usize {
        self.inner.tasks.len()
    }

    /// Wait until every dispatched fetch, stale ones included, has settled.
    pub async fn wait_idle(&self) {
        let tasks = &self.inner.tasks;
        tasks.close();
        tasks.wait().await;
        tasks.reopen();
    }
}

impl<R: Record, S: DataSource> ControllerInner<R, S> {
    async fn run_cycle(&self, sequence: u64, filters: FilterSet) {
        let started = Instant::now();
        let result = self.source.fetch_list::<R>(self.kind, &filters).await;

        let mut outcome = Outcome::Discarded(0);
        self.state.send_if_modified(|s| {
            if !self.sequencer.is_current(sequence) {
                outcome = Outcome::Discarded(self.sequencer.latest());
                return false;
            }
            match result {
                Ok(records) => {
                    outcome = Outcome::Committed(records.len());
                    s.summary = Arc::new(R::summarize(&records));
                    s.status = if records.is_empty() {
                        SyncStatus::Empty
                    } else {
                        SyncStatus::Resolved
                    };
                    s.records = Arc::new(records);
                    s.page_index = 1;
                    s.error = None;
                    if let Some(cycle) = s.cycle.as_mut() {
                        cycle.status = CycleStatus::Resolved;
                    }
                    s.committed = s.cycle.clone();
                }
                Err(err) => {
                    outcome = Outcome::Failed(err.to_string());
                    s.status = SyncStatus::Failed;
                    s.error = Some(err);
                    if let Some(cycle) = s.cycle.as_mut() {
                        cycle.status = CycleStatus::Failed;
                    }
                }
            }
            s.loading = false;
            true
        });

        let elapsed = started.elapsed();
        let kind = self.kind;
        match outcome {
            Outcome::Committed(records) => {
                info!(
                    "Committed {} {} rows from fetch #{} in {:?}",
                    records, kind, sequence, elapsed
                );
                self.events.send(SyncEvent::Committed {
                    kind,
                    sequence,
                    records,
                });
            }
            Outcome::Failed(error) => {
                warn!("{} fetch #{} failed: {}", kind, sequence, error);
                self.events.send(SyncEvent::Failed {
                    kind,
                    sequence,
                    error,
                });
            }
            Outcome::Discarded(latest) => {
                debug!(
                    "Discarding stale {} response #{} (latest is #{})",
                    kind, sequence, latest
                );
                self.events.send(SyncEvent::Discarded {
                    kind,
                    sequence,
                    latest,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use wattboard_types::{MeterReading, ymd};

    use crate::mock::MockSource;

    fn meter(day: u8, imported: f64) -> MeterReading {
        let mut r = MeterReading::new(ymd(2024, 6, day).unwrap());
        r.imported_energy = Some(imported);
        r
    }

    fn controller(source: &Arc<MockSource>) -> SyncController<MeterReading, MockSource> {
        SyncController::new(Arc::clone(source), &ControllerConfig::default())
    }

    #[tokio::test]
    async fn test_sync_without_institution_is_noop() {
        let source = Arc::new(MockSource::new());
        let c = controller(&source);
        let mut events = c.subscribe_events();

        c.sync(FilterSet::new());
        c.sync(FilterSet::new().with_institution("  "));

        let s = c.snapshot();
        assert_eq!(s.status, SyncStatus::Idle);
        assert!(!s.loading);
        assert_eq!(c.latest_sequence(), 0);
        assert_eq!(source.call_count(), 0);
        assert!(matches!(events.recv().await, Ok(SyncEvent::Skipped { .. })));
        assert!(!c.retry());
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_keeps_previous_rows() {
        let source = Arc::new(MockSource::new());
        source.set_dataset(ResourceKind::MeterIndicators, "A", &[meter(1, 1.0), meter(2, 2.0)]);
        source.set_latency(Duration::from_millis(100));
        let c = controller(&source);

        c.sync(FilterSet::new().with_institution("A"));
        c.wait_idle().await;
        assert_eq!(c.snapshot().records.len(), 2);

        c.sync(FilterSet::new().with_institution("A").with_device("D"));
        let s = c.snapshot();
        assert!(s.loading);
        assert_eq!(s.status, SyncStatus::Loading);
        assert_eq!(s.records.len(), 2);
        assert_eq!(s.cycle.as_ref().map(|c| c.status), Some(CycleStatus::InFlight));
        c.wait_idle().await;
    }

    #[tokio::test]
    async fn test_success_commits_rows_summary_and_resets_page() {
        let source = Arc::new(MockSource::new());
        let rows: Vec<_> = (1..=25).map(|d| meter(d, 1.0)).collect();
        source.set_dataset(ResourceKind::MeterIndicators, "A", &rows);
        let c = controller(&source);

        c.sync(FilterSet::new().with_institution("A"));
        c.wait_idle().await;
        c.set_page_index(2);
        assert_eq!(c.page_view().page_index, 2);

        c.sync(FilterSet::new().with_institution("A"));
        c.wait_idle().await;
        let s = c.snapshot();
        assert_eq!(s.status, SyncStatus::Resolved);
        assert_eq!(s.records.len(), 25);
        assert_eq!(s.page_index, 1);
        assert_eq!(s.summary.value(crate::derive::keys::TOTAL_IMPORTED), Some(25.0));
        assert_eq!(s.committed.as_ref().map(|c| c.sequence), Some(2));
    }

    #[tokio::test]
    async fn test_empty_result_is_not_an_error() {
        let source = Arc::new(MockSource::new());
        let c = controller(&source);

        c.sync(FilterSet::new().with_institution("nobody"));
        c.wait_idle().await;
        let s = c.snapshot();
        assert_eq!(s.status, SyncStatus::Empty);
        assert!(s.error.is_none());
        assert!(s.summary.is_empty());
        assert_eq!(s.page_view().total_pages, 1);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_rows_and_retry_recovers() {
        let source = Arc::new(MockSource::new());
        source.set_dataset(ResourceKind::MeterIndicators, "A", &[meter(1, 5.0)]);
        let c = controller(&source);

        c.sync(FilterSet::new().with_institution("A"));
        c.wait_idle().await;

        source.fail_next(Error::transport("mock://A", "connection reset"));
        c.sync(FilterSet::new().with_institution("A").with_device("D"));
        c.wait_idle().await;

        let s = c.snapshot();
        assert_eq!(s.status, SyncStatus::Failed);
        assert!(!s.loading);
        assert_eq!(s.records.len(), 1);
        assert!(s.error.as_ref().is_some_and(Error::is_retryable));

        assert!(c.retry());
        c.wait_idle().await;
        let s = c.snapshot();
        assert!(s.error.is_none());
        assert_eq!(
            s.committed.as_ref().and_then(|c| c.filters.device().map(String::from)),
            Some("D".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_response_is_discarded() {
        let source = Arc::new(MockSource::new());
        source.set_dataset(ResourceKind::MeterIndicators, "A", &[meter(1, 1.0)]);
        source.set_dataset(ResourceKind::MeterIndicators, "B", &[meter(1, 2.0), meter(2, 2.0)]);
        source.set_institution_latency("A", Duration::from_millis(500));
        source.set_institution_latency("B", Duration::from_millis(50));
        let c = controller(&source);
        let mut events = c.subscribe_events();

        c.sync(FilterSet::new().with_institution("A"));
        c.sync(FilterSet::new().with_institution("B"));
        c.wait_idle().await;

        let s = c.snapshot();
        assert_eq!(s.records.len(), 2);
        assert_eq!(
            s.committed.as_ref().and_then(|c| c.filters.institution().map(String::from)),
            Some("B".to_string())
        );

        let mut discarded = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let SyncEvent::Discarded { sequence, latest, .. } = event {
                discarded.push((sequence, latest));
            }
        }
        assert_eq!(discarded, vec![(1, 2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_response_while_newer_in_flight_keeps_loading() {
        let source = Arc::new(MockSource::new());
        source.set_dataset(ResourceKind::MeterIndicators, "C", &[meter(1, 3.0), meter(2, 3.0), meter(3, 3.0)]);
        source.set_dataset(ResourceKind::MeterIndicators, "A", &[meter(1, 1.0)]);
        source.set_dataset(ResourceKind::MeterIndicators, "B", &[meter(1, 2.0), meter(2, 2.0)]);
        source.set_institution_latency("A", Duration::from_millis(50));
        source.set_institution_latency("B", Duration::from_millis(500));
        let c = controller(&source);

        c.sync(FilterSet::new().with_institution("C"));
        c.wait_idle().await;
        assert_eq!(c.snapshot().records.len(), 3);

        c.sync(FilterSet::new().with_institution("A"));
        c.sync(FilterSet::new().with_institution("B"));
        tokio::time::sleep(Duration::from_millis(100)).await;

        // A has settled, B has not.
        assert_eq!(c.in_flight(), 1);
        let s = c.snapshot();
        assert!(s.loading);
        assert_eq!(s.status, SyncStatus::Loading);
        assert_eq!(s.records.len(), 3);
        assert_eq!(
            s.committed.as_ref().and_then(|c| c.filters.institution().map(String::from)),
            Some("C".to_string())
        );
        assert_eq!(
            s.cycle.as_ref().map(|c| (c.sequence, c.status)),
            Some((3, CycleStatus::InFlight))
        );

        tokio::time::sleep(Duration::from_millis(500)).await;
        c.wait_idle().await;
        let s = c.snapshot();
        assert!(!s.loading);
        assert_eq!(s.status, SyncStatus::Resolved);
        assert_eq!(s.records.len(), 2);
        assert_eq!(s.committed.as_ref().map(|c| c.sequence), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_failure_is_discarded() {
        let source = Arc::new(MockSource::new());
        source.set_dataset(ResourceKind::MeterIndicators, "B", &[meter(1, 2.0)]);
        source.set_institution_latency("A", Duration::from_millis(500));
        source.fail_institution("A", Error::from_status(500, "boom"));
        let c = controller(&source);

        c.sync(FilterSet::new().with_institution("A"));
        c.sync(FilterSet::new().with_institution("B"));
        c.wait_idle().await;

        let s = c.snapshot();
        assert_eq!(s.status, SyncStatus::Resolved);
        assert!(s.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandon_drops_in_flight_cycle() {
        let source = Arc::new(MockSource::new());
        source.set_dataset(ResourceKind::MeterIndicators, "A", &[meter(1, 1.0)]);
        source.set_latency(Duration::from_millis(100));
        let c = controller(&source);

        c.sync(FilterSet::new().with_institution("A"));
        c.abandon();
        let s = c.snapshot();
        assert!(!s.loading);
        assert_eq!(s.status, SyncStatus::Idle);

        c.wait_idle().await;
        assert!(c.snapshot().records.is_empty());
    }

    #[tokio::test]
    async fn test_page_controls_clamp() {
        let source = Arc::new(MockSource::new());
        let rows: Vec<_> = (1..=28).map(|d| meter(d, 1.0)).collect();
        source.set_dataset(ResourceKind::MeterIndicators, "A", &rows);
        let c = controller(&source);
        c.sync(FilterSet::new().with_institution("A"));
        c.wait_idle().await;

        c.set_page_index(99);
        assert_eq!(c.page_view().page_index, 2);
        assert_eq!(c.snapshot().page().items.len(), 8);

        c.set_page_size(10);
        let view = c.page_view();
        assert_eq!(view.page_index, 2);
        assert_eq!(view.total_pages, 3);

        c.set_page_index(3);
        c.set_page_size(25);
        let view = c.page_view();
        assert_eq!(view.page_index, 2);
        assert_eq!(view.total_pages, 2);

        c.set_page_size(0);
        assert_eq!(c.page_view().page_size, 1);
    }

    #[tokio::test]
    async fn test_page_size_change_keeps_page_in_range() {
        let source = Arc::new(MockSource::new());
        let rows: Vec<_> = (1..=47).map(|d| meter(d, 1.0)).collect();
        source.set_dataset(ResourceKind::MeterIndicators, "A", &rows);
        let c = controller(&source);
        c.sync(FilterSet::new().with_institution("A"));
        c.wait_idle().await;

        c.set_page_size(10);
        c.set_page_index(3);
        assert_eq!(c.page_view().page_index, 3);

        c.set_page_size(20);
        let view = c.page_view();
        assert_eq!(view.page_index, 3);
        assert_eq!(view.total_pages, 3);
        assert_eq!(c.snapshot().page().items.len(), 7);

        c.set_page_size(50);
        let view = c.page_view();
        assert_eq!(view.page_index, 1);
        assert_eq!(view.total_pages, 1);
    }

    #[tokio::test]
    async fn test_subscriber_sees_changes() {
        let source = Arc::new(MockSource::new());
        source.set_dataset(ResourceKind::MeterIndicators, "A", &[meter(1, 1.0)]);
        let c = controller(&source);
        let mut rx = c.subscribe();

        c.sync(FilterSet::new().with_institution("A"));
        let state = rx
            .wait_for(|s| s.status == SyncStatus::Resolved)
            .await
            .unwrap()
            .clone();
        assert_eq!(state.records.len(), 1);
    }
}
