//! In-memory data source for testing and demos.
//!
//! [`MockSource`] implements [`DataSource`] over canned JSON rows, so it
//! exercises the same decoding path as the HTTP source.
//!
//! # Features
//!
//! - **Per-institution datasets**: Rows are keyed by resource and institution
//! - **Server-side filtering**: Device and date-range filters are applied when
//!   rows carry `device_id` / `date` fields
//! - **Latency simulation**: Global or per-institution delays, to stage races
//! - **Failure injection**: One-shot failures, persistent failures, and
//!   per-institution failures
//! - **Call log**: Every request is recorded for assertions

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use wattboard_types::{FilterSet, ResourceKind, format_date, parse_date};

use crate::error::{Error, Result};
use crate::traits::DataSource;

/// Key used for datasets that apply to every institution.
const ANY_INSTITUTION: &str = "";

/// One request observed by a [`MockSource`].
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    /// Resource requested.
    pub kind: ResourceKind,
    /// Filters sent with the request.
    pub filters: FilterSet,
}

/// A scriptable [`DataSource`] for tests.
///
/// # Example
///
/// ```
/// use wattboard_core::{DataSource, MockSource};
/// use wattboard_types::{Device, FilterSet, ResourceKind};
///
/// #[tokio::main]
/// async fn main() {
///     let source = MockSource::new();
///     source.set_dataset(ResourceKind::Devices, "A", &[Device::new("d1", "Main meter")]);
///
///     let devices: Vec<Device> = source
///         .fetch_list(ResourceKind::Devices, &FilterSet::new().with_institution("A"))
///         .await
///         .unwrap();
///     assert_eq!(devices.len(), 1);
/// }
/// ```
#[derive(Default)]
pub struct MockSource {
    datasets: RwLock<HashMap<(ResourceKind, String), Vec<Value>>>,
    institution_latency: RwLock<HashMap<String, Duration>>,
    institution_failures: RwLock<HashMap<String, Error>>,
    /// Simulated latency in milliseconds (0 = no delay).
    latency_ms: AtomicU64,
    /// Failures queued for the next requests, in order.
    queued_failures: Mutex<Vec<Error>>,
    /// Failure returned by every request while set.
    persistent_failure: RwLock<Option<Error>>,
    calls: Mutex<Vec<MockCall>>,
    call_count: AtomicU32,
}

impl std::fmt::Debug for MockSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSource")
            .field("datasets", &read(&self.datasets).len())
            .field("latency_ms", &self.latency_ms.load(Ordering::Relaxed))
            .field("call_count", &self.call_count.load(Ordering::Relaxed))
            .finish()
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockSource {
    /// Create an empty source; every request returns no rows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source builder.
    pub fn builder() -> MockSourceBuilder {
        MockSourceBuilder::new()
    }

    // --- Test control methods ---

    /// Replace the rows served for `kind` under `institution`.
    ///
    /// An empty `institution` registers rows served for every institution
    /// without a dataset of its own. Rows that fail to serialize are
    /// skipped.
    pub fn set_dataset<T: Serialize>(&self, kind: ResourceKind, institution: &str, rows: &[T]) {
        let values = rows
            .iter()
            .filter_map(|r| serde_json::to_value(r).ok())
            .collect();
        self.set_raw_dataset(kind, institution, values);
    }

    /// Replace the rows served for `kind` under `institution` with raw JSON.
    pub fn set_raw_dataset(&self, kind: ResourceKind, institution: &str, rows: Vec<Value>) {
        write(&self.datasets).insert((kind, institution.trim().to_string()), rows);
    }

    /// Set simulated latency for every request.
    ///
    /// Set to `Duration::ZERO` to disable latency simulation.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Set simulated latency for requests scoped to `institution`,
    /// overriding the global latency.
    pub fn set_institution_latency(&self, institution: &str, latency: Duration) {
        write(&self.institution_latency).insert(institution.to_string(), latency);
    }

    /// Fail the next request with `error`. Calls queue up in order.
    pub fn fail_next(&self, error: Error) {
        lock(&self.queued_failures).push(error);
    }

    /// Fail every request with `error` until cleared with `None`.
    pub fn set_should_fail(&self, error: Option<Error>) {
        *write(&self.persistent_failure) = error;
    }

    /// Fail every request scoped to `institution`.
    pub fn fail_institution(&self, institution: &str, error: Error) {
        write(&self.institution_failures).insert(institution.to_string(), error);
    }

    /// Stop failing requests scoped to `institution`.
    pub fn clear_institution_failure(&self, institution: &str) {
        write(&self.institution_failures).remove(institution);
    }

    /// Number of requests served (including failed ones).
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Every request observed so far, oldest first.
    pub fn calls(&self) -> Vec<MockCall> {
        lock(&self.calls).clone()
    }

    /// Requests observed for `kind`.
    pub fn calls_for(&self, kind: ResourceKind) -> Vec<MockCall> {
        lock(&self.calls)
            .iter()
            .filter(|c| c.kind == kind)
            .cloned()
            .collect()
    }

    /// Forget the call log.
    pub fn reset_calls(&self) {
        lock(&self.calls).clear();
        self.call_count.store(0, Ordering::Relaxed);
    }

    fn latency_for(&self, institution: Option<&str>) -> Duration {
        institution
            .and_then(|i| read(&self.institution_latency).get(i).copied())
            .unwrap_or_else(|| Duration::from_millis(self.latency_ms.load(Ordering::Relaxed)))
    }

    fn check_should_fail(&self, institution: Option<&str>) -> Result<()> {
        let queued = {
            let mut queue = lock(&self.queued_failures);
            (!queue.is_empty()).then(|| queue.remove(0))
        };
        if let Some(err) = queued {
            return Err(err);
        }
        if let Some(err) = read(&self.persistent_failure).clone() {
            return Err(err);
        }
        if let Some(err) = institution.and_then(|i| read(&self.institution_failures).get(i).cloned())
        {
            return Err(err);
        }
        Ok(())
    }

    fn rows_for(&self, kind: ResourceKind, filters: &FilterSet) -> Vec<Value> {
        let datasets = read(&self.datasets);
        let rows = filters
            .institution()
            .and_then(|i| datasets.get(&(kind, i.to_string())))
            .or_else(|| datasets.get(&(kind, ANY_INSTITUTION.to_string())));
        let Some(rows) = rows else {
            return Vec::new();
        };
        rows.iter()
            .filter(|row| matches_filters(row, filters))
            .cloned()
            .collect()
    }
}

/// Apply device and date-range filters to a JSON row. Rows lacking the
/// relevant field pass.
fn matches_filters(row: &Value, filters: &FilterSet) -> bool {
    if let Some(device) = filters.device()
        && let Some(row_device) = row.get("device_id").and_then(id_string)
        && row_device != device
    {
        return false;
    }
    if let Some(date) = row
        .get("date")
        .and_then(Value::as_str)
        .and_then(|s| parse_date(s).ok())
    {
        if filters.start_date.is_some_and(|start| date < start) {
            return false;
        }
        if filters.end_date.is_some_and(|end| date > end) {
            return false;
        }
    }
    true
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl DataSource for MockSource {
    async fn fetch_list<T>(&self, kind: ResourceKind, filters: &FilterSet) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        lock(&self.calls).push(MockCall {
            kind,
            filters: filters.clone(),
        });

        let latency = self.latency_for(filters.institution());
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.check_should_fail(filters.institution())?;

        let rows = self.rows_for(kind, filters);
        debug!(
            "Mock serving {} {} rows (range {:?}..{:?})",
            rows.len(),
            kind,
            filters.start_date.map(format_date),
            filters.end_date.map(format_date)
        );
        Ok(serde_json::from_value(Value::Array(rows))?)
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

/// Builder for creating mock sources with custom settings.
#[derive(Debug, Default)]
pub struct MockSourceBuilder {
    datasets: Vec<(ResourceKind, String, Vec<Value>)>,
    latency: Duration,
    institution_latency: Vec<(String, Duration)>,
}

impl MockSourceBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `rows` for `kind` under `institution`.
    #[must_use]
    pub fn dataset<T: Serialize>(mut self, kind: ResourceKind, institution: &str, rows: &[T]) -> Self {
        let values = rows
            .iter()
            .filter_map(|r| serde_json::to_value(r).ok())
            .collect();
        self.datasets.push((kind, institution.to_string(), values));
        self
    }

    /// Set the global latency.
    #[must_use]
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Set the latency for one institution.
    #[must_use]
    pub fn institution_latency(mut self, institution: &str, latency: Duration) -> Self {
        self.institution_latency
            .push((institution.to_string(), latency));
        self
    }

    /// Build the mock source.
    #[must_use]
    pub fn build(self) -> MockSource {
        let source = MockSource::new();
        for (kind, institution, rows) in self.datasets {
            source.set_raw_dataset(kind, &institution, rows);
        }
        source.set_latency(self.latency);
        for (institution, latency) in self.institution_latency {
            source.set_institution_latency(&institution, latency);
        }
        source
    }
}
