//! One dashboard view: filters, device cascade, debounce, and table sync.
//!
//! [`Dashboard`] is the handle a view layer talks to. It wires the pieces
//! together in this order for every filter change:
//!
//! 1. an institution change drops the device and reloads the device list
//!    ([`CascadeResolver`]);
//! 2. selections identical to the applied one are ignored ([`ChangeGate`]);
//! 3. the fetch is delayed until changes stop ([`DebounceScheduler`]),
//!    except for the very first institution selection, which fires at once;
//! 4. the fetch runs and only the latest one commits ([`SyncController`]).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use time::{Date, OffsetDateTime};
use tokio::sync::watch;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use wattboard_types::{Device, FilterSet, TimeGranularity};

use crate::cascade::{CascadeResolver, DeviceListRequest, DeviceListState};
use crate::config::ControllerConfig;
use crate::controller::{SyncController, SyncState};
use crate::debounce::DebounceScheduler;
use crate::error::{Error, Result};
use crate::events::{EventDispatcher, EventReceiver, SyncEvent};
use crate::gate::ChangeGate;
use crate::paginate::PageView;
use crate::traits::{DataSource, Record};

struct DashboardInner<R: Record, S: DataSource> {
    source: Arc<S>,
    config: ControllerConfig,
    filters: watch::Sender<FilterSet>,
    gate: Mutex<ChangeGate>,
    cascade: CascadeResolver,
    debounce: DebounceScheduler,
    controller: SyncController<R, S>,
    events: EventDispatcher,
    cascade_tasks: TaskTracker,
}

/// Handle to one dashboard view over rows of type `R`.
///
/// Cloning is cheap and yields a handle to the same dashboard.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use wattboard_core::{ControllerConfig, Dashboard, MockSource};
/// use wattboard_types::{FilterSet, MeterReading, ResourceKind, ymd};
///
/// #[tokio::main]
/// async fn main() -> wattboard_core::Result<()> {
///     let source = Arc::new(MockSource::new());
///     source.set_dataset(
///         ResourceKind::MeterIndicators,
///         "A",
///         &[MeterReading::new(ymd(2024, 6, 1).unwrap())],
///     );
///
///     let dashboard: Dashboard<MeterReading, _> =
///         Dashboard::with_filters(source, ControllerConfig::default(), FilterSet::new())?;
///     dashboard.mount();
///     dashboard.set_institution(Some("A"))?;
///     dashboard.settle().await;
///
///     assert_eq!(dashboard.state().records.len(), 1);
///     Ok(())
/// }
/// ```
pub struct Dashboard<R: Record, S: DataSource> {
    inner: Arc<DashboardInner<R, S>>,
}

impl<R: Record, S: DataSource> Clone for Dashboard<R, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Record, S: DataSource> std::fmt::Debug for Dashboard<R, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("filters", &*self.inner.filters.borrow())
            .field("controller", &self.inner.controller)
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Today's date in UTC.
pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

impl<R: Record, S: DataSource> Dashboard<R, S> {
    /// Create a dashboard whose filters start as the default trailing window
    /// ending today, with nothing selected.
    pub fn new(source: Arc<S>, config: ControllerConfig) -> Result<Self> {
        let initial = FilterSet::trailing_window(today(), config.window_days);
        Self::with_filters(source, config, initial)
    }

    /// Create a dashboard with explicit initial filters (not yet applied;
    /// see [`Dashboard::mount`]).
    pub fn with_filters(source: Arc<S>, config: ControllerConfig, initial: FilterSet) -> Result<Self> {
        config.validate()?;
        let events = EventDispatcher::new(config.event_capacity);
        let controller = SyncController::with_events(Arc::clone(&source), &config, events.clone());
        let cascade = CascadeResolver::new(events.clone()).for_kind(R::KIND.device_kind());
        let (filters, _) = watch::channel(initial.normalized());

        Ok(Self {
            inner: Arc::new(DashboardInner {
                source,
                debounce: DebounceScheduler::new(config.debounce),
                config,
                filters,
                gate: Mutex::new(ChangeGate::new()),
                cascade,
                controller,
                events,
                cascade_tasks: TaskTracker::new(),
            }),
        })
    }

    /// Apply the initial filters as-is: load the device list for the
    /// initial institution (keeping the initial device) and fetch at once.
    ///
    /// Call once, before any setter.
    pub fn mount(&self) {
        let initial = self.filters();
        info!(
            "Mounting {} dashboard (institution={:?}, device={:?})",
            R::KIND,
            initial.institution(),
            initial.device()
        );
        lock(&self.inner.gate).admit(&initial);
        if let Some(request) = self.inner.cascade.begin(initial.institution()) {
            self.spawn_device_list(request);
        }
        self.inner.controller.sync(initial);
    }

    /// Replace the whole selection.
    ///
    /// Returns `Ok(true)` when the change was accepted and a fetch scheduled
    /// (or, for a cleared institution, the table frozen), `Ok(false)` when
    /// it matched the applied selection.
    pub fn set_filters(&self, next: FilterSet) -> Result<bool> {
        self.update_filters(|_| Some(next))
    }

    /// Select an institution (or clear it with `None`).
    pub fn set_institution(&self, institution: Option<&str>) -> Result<bool> {
        let institution = institution.map(str::to_string);
        self.update_filters(|current| {
            let mut next = current.clone();
            next.institution_id = institution;
            Some(next)
        })
    }

    /// Select a device (or clear it with `None`).
    pub fn set_device(&self, device: Option<&str>) -> Result<bool> {
        let device = device.map(str::to_string);
        self.update_filters(|current| {
            let mut next = current.clone();
            next.device_id = device;
            Some(next)
        })
    }

    /// Change the aggregation granularity.
    pub fn set_granularity(&self, granularity: TimeGranularity) -> Result<bool> {
        self.update_filters(|current| Some(current.clone().with_granularity(granularity)))
    }

    /// Change the date range. Rejects a start after the end.
    pub fn set_date_range(&self, start: Option<Date>, end: Option<Date>) -> Result<bool> {
        self.update_filters(|current| Some(current.clone().with_range(start, end)))
    }

    /// Move to page `index` (clamped).
    pub fn set_page_index(&self, index: usize) {
        self.inner.controller.set_page_index(index);
    }

    /// Change rows per page.
    pub fn set_page_size(&self, size: usize) {
        self.inner.controller.set_page_size(size);
    }

    /// Re-issue the last requested fetch. Returns `false` if there is none.
    pub fn retry(&self) -> bool {
        self.inner.controller.retry()
    }

    /// Stop all pending work: cancel the debounce timer and drop any
    /// in-flight fetch or device-list response.
    pub fn shutdown(&self) {
        debug!("Shutting down {} dashboard", R::KIND);
        self.inner.debounce.cancel();
        self.inner.controller.abandon();
        self.inner.cascade.abandon();
    }

    /// Wait until no timer, device-list request, or fetch is outstanding.
    pub async fn settle(&self) {
        let inner = &self.inner;
        loop {
            inner.debounce.wait_idle().await;
            inner.cascade_tasks.close();
            inner.cascade_tasks.wait().await;
            inner.cascade_tasks.reopen();
            inner.controller.wait_idle().await;

            if !inner.debounce.is_pending()
                && inner.cascade_tasks.is_empty()
                && inner.controller.in_flight() == 0
            {
                break;
            }
        }
    }

    fn spawn_device_list(&self, request: DeviceListRequest) {
        let dashboard = self.clone();
        self.inner.cascade_tasks.spawn(async move {
            let institution = request.institution.clone();
            let source = Arc::clone(&dashboard.inner.source);
            if let Some(device_id) = dashboard.inner.cascade.fetch(&*source, request).await {
                dashboard.auto_select(&institution, &device_id);
            }
        });
    }

    /// Derive the next selection from the applied one and apply it.
    ///
    /// `build` runs under the gate lock, so no other change can land between
    /// reading the applied selection and admitting the new one. Returning
    /// `None` leaves everything untouched.
    fn update_filters(&self, build: impl FnOnce(&FilterSet) -> Option<FilterSet>) -> Result<bool> {
        let mut gate = lock(&self.inner.gate);
        let previous = gate.applied().cloned().unwrap_or_else(|| self.filters());
        let Some(next) = build(&previous) else {
            return Ok(false);
        };
        let mut next = next.normalized();
        if !next.has_valid_range() {
            return Err(Error::invalid_filter(format!(
                "start date {:?} is after end date {:?}",
                next.start_date, next.end_date
            )));
        }

        let change = next
            .institution_changed(&previous)
            .then(|| self.inner.cascade.on_institution_changed(&mut next));

        if !gate.admit(&next) {
            debug!("Filters unchanged, not syncing");
            return Ok(false);
        }
        self.inner.filters.send_replace(next.clone());
        drop(gate);

        if let Some(request) = change.as_ref().and_then(|c| c.request.clone()) {
            self.spawn_device_list(request);
        }

        if !next.has_institution() {
            debug!("Institution cleared, freezing table");
            self.inner.debounce.cancel();
            self.inner.controller.abandon();
            return Ok(true);
        }

        let first_selection = change.is_some() && !previous.has_institution();
        let controller = self.inner.controller.clone();
        self.inner
            .debounce
            .schedule(first_selection, move || controller.sync(next));
        Ok(true)
    }

    /// Select `device_id` if `institution` is still selected and no device
    /// has been picked in the meantime.
    fn auto_select(&self, institution: &str, device_id: &str) -> bool {
        let applied = self.update_filters(|current| {
            (current.institution() == Some(institution) && current.device().is_none())
                .then(|| current.clone().with_device(device_id))
        });
        match applied {
            Ok(true) => {
                info!(
                    "Auto-selecting device {} for institution {}",
                    device_id, institution
                );
                self.inner.events.send(SyncEvent::DeviceAutoSelected {
                    institution: institution.to_string(),
                    device_id: device_id.to_string(),
                });
                true
            }
            Ok(false) => {
                debug!(
                    "Selection moved on, not auto-selecting device {} for institution {}",
                    device_id, institution
                );
                false
            }
            Err(e) => {
                warn!("Failed to auto-select device {}: {}", device_id, e);
                false
            }
        }
    }

    // --- Observation ---

    /// Currently applied filters.
    pub fn filters(&self) -> FilterSet {
        self.inner.filters.borrow().clone()
    }

    /// Copy of the table state.
    pub fn state(&self) -> SyncState<R> {
        self.inner.controller.snapshot()
    }

    /// Position of the visible page.
    pub fn page_view(&self) -> PageView {
        self.inner.controller.page_view()
    }

    /// Device list state for the selected institution.
    pub fn device_list(&self) -> DeviceListState {
        self.inner.cascade.snapshot()
    }

    /// Devices for the selected institution.
    pub fn devices(&self) -> Arc<Vec<Device>> {
        self.inner.cascade.devices()
    }

    /// Receiver for table state changes.
    pub fn subscribe(&self) -> watch::Receiver<SyncState<R>> {
        self.inner.controller.subscribe()
    }

    /// Receiver for filter changes.
    pub fn subscribe_filters(&self) -> watch::Receiver<FilterSet> {
        self.inner.filters.subscribe()
    }

    /// Receiver for device list changes.
    pub fn subscribe_devices(&self) -> watch::Receiver<DeviceListState> {
        self.inner.cascade.subscribe()
    }

    /// Receiver for lifecycle events.
    pub fn subscribe_events(&self) -> EventReceiver {
        self.inner.events.subscribe()
    }

    /// The underlying table controller.
    pub fn controller(&self) -> &SyncController<R, S> {
        &self.inner.controller
    }

    /// Configuration this dashboard was built with.
    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }
}
