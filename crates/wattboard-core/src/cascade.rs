//! Institution → device dependent selection.
//!
//! A device only makes sense under the institution it was picked from.
//! When the institution changes, the current device selection is dropped at
//! once and the new institution's device list is requested. If that list
//! holds exactly one device, it is offered for automatic selection.
//!
//! Device-list requests go through their own [`RequestSequencer`], so a slow
//! list for a previously selected institution can never replace the list of
//! the current one.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use wattboard_types::{Device, DeviceKind, FilterSet, ResourceKind};

use crate::error::{Error, Result};
use crate::events::{EventDispatcher, SyncEvent};
use crate::sequencer::RequestSequencer;
use crate::traits::DataSource;

/// Device list for the currently selected institution.
#[derive(Debug, Clone, Default)]
pub struct DeviceListState {
    /// Institution the list belongs to.
    pub institution: Option<String>,
    /// Devices, empty while loading or after a failure.
    pub devices: Arc<Vec<Device>>,
    /// Whether the list request is in flight.
    pub loading: bool,
    /// Error from the last list request. Independent of the table's error.
    pub error: Option<Error>,
}

impl DeviceListState {
    /// Whether `device_id` is in the list.
    pub fn contains(&self, device_id: &str) -> bool {
        self.devices.iter().any(|d| d.id == device_id)
    }
}

/// A device-list request issued by [`CascadeResolver::begin`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceListRequest {
    /// Institution to list devices for.
    pub institution: String,
    /// Sequence tag; the response is committed only while it is current.
    pub sequence: u64,
}

impl DeviceListRequest {
    /// Filters sent with the request.
    pub fn filters(&self) -> FilterSet {
        FilterSet::new().with_institution(self.institution.clone())
    }
}

/// Result of reacting to an institution change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstitutionChange {
    /// Request to run, or `None` when the institution was cleared.
    pub request: Option<DeviceListRequest>,
    /// Whether a device selection was dropped.
    pub cleared_device: bool,
}

/// Keeps the device list consistent with the selected institution.
#[derive(Debug)]
pub struct CascadeResolver {
    state: watch::Sender<DeviceListState>,
    sequencer: RequestSequencer,
    events: EventDispatcher,
    device_kind: Option<DeviceKind>,
}

impl CascadeResolver {
    /// Create a resolver publishing to `events`.
    pub fn new(events: EventDispatcher) -> Self {
        let (state, _) = watch::channel(DeviceListState::default());
        Self {
            state,
            sequencer: RequestSequencer::new(),
            events,
            device_kind: None,
        }
    }

    /// Only list devices of `kind`. Devices whose kind is unknown are kept.
    #[must_use]
    pub fn for_kind(mut self, kind: Option<DeviceKind>) -> Self {
        self.device_kind = kind;
        self
    }

    /// React to `next` carrying a new institution: drop its device and
    /// start a list request for the new institution.
    ///
    /// The caller is responsible for only calling this when the institution
    /// actually changed.
    pub fn on_institution_changed(&self, next: &mut FilterSet) -> InstitutionChange {
        let cleared_device = next.device_id.take().is_some();
        if cleared_device {
            debug!("Institution changed, clearing device selection");
        }
        InstitutionChange {
            request: self.begin(next.institution()),
            cleared_device,
        }
    }

    /// Start tracking the device list for `institution` without touching any
    /// device selection. Passing `None` clears the list.
    ///
    /// Any request still in flight becomes stale.
    pub fn begin(&self, institution: Option<&str>) -> Option<DeviceListRequest> {
        let mut request = None;
        self.state.send_modify(|s| {
            let sequence = self.sequencer.next();
            s.institution = institution.map(str::to_string);
            s.devices = Arc::new(Vec::new());
            s.error = None;
            s.loading = institution.is_some();
            request = institution.map(|i| DeviceListRequest {
                institution: i.to_string(),
                sequence,
            });
        });
        request
    }

    /// Commit the outcome of `request` if it is still current.
    ///
    /// Returns the id of the only device when the list has exactly one
    /// entry; `None` otherwise, on failure, or when the response is stale.
    pub fn complete(&self, request: &DeviceListRequest, result: Result<Vec<Device>>) -> Option<String> {
        let mut committed = None;
        self.state.send_if_modified(|s| {
            if !self.sequencer.is_current(request.sequence) {
                return false;
            }
            s.loading = false;
            match result {
                Ok(devices) => {
                    let devices: Vec<Device> = devices
                        .into_iter()
                        .filter(|d| match (self.device_kind, d.kind) {
                            (Some(wanted), Some(kind)) => wanted == kind,
                            _ => true,
                        })
                        .collect();
                    committed = Some(Ok(devices.clone()));
                    s.devices = Arc::new(devices);
                    s.error = None;
                }
                Err(err) => {
                    committed = Some(Err(err.to_string()));
                    s.devices = Arc::new(Vec::new());
                    s.error = Some(err);
                }
            }
            true
        });

        let institution = request.institution.clone();
        match committed {
            None => {
                debug!(
                    "Discarding stale device list #{} for institution {}",
                    request.sequence, institution
                );
                None
            }
            Some(Ok(devices)) => {
                info!("Loaded {} devices for institution {}", devices.len(), institution);
                self.events.send(SyncEvent::DevicesLoaded {
                    institution,
                    count: devices.len(),
                });
                match devices.as_slice() {
                    [only] => Some(only.id.clone()),
                    _ => None,
                }
            }
            Some(Err(error)) => {
                warn!("Device list for institution {} failed: {}", institution, error);
                self.events.send(SyncEvent::DevicesFailed { institution, error });
                None
            }
        }
    }

    /// Run `request` against `source` and commit it.
    pub async fn fetch<S: DataSource>(&self, source: &S, request: DeviceListRequest) -> Option<String> {
        let result = source
            .fetch_list::<Device>(ResourceKind::Devices, &request.filters())
            .await;
        self.complete(&request, result)
    }

    /// Invalidate any in-flight request without changing the list.
    pub fn abandon(&self) {
        self.state.send_if_modified(|s| {
            self.sequencer.next();
            std::mem::replace(&mut s.loading, false)
        });
    }

    /// Receiver that observes every device-list change.
    pub fn subscribe(&self) -> watch::Receiver<DeviceListState> {
        self.state.subscribe()
    }

    /// Copy of the current device list state.
    pub fn snapshot(&self) -> DeviceListState {
        self.state.borrow().clone()
    }

    /// Devices for the current institution.
    pub fn devices(&self) -> Arc<Vec<Device>> {
        Arc::clone(&self.state.borrow().devices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSource;

    fn resolver() -> CascadeResolver {
        CascadeResolver::new(EventDispatcher::default())
    }

    #[test]
    fn test_institution_change_clears_device_and_requests_list() {
        let cascade = resolver();
        let mut next = FilterSet::new().with_institution("B").with_device("D1");

        let change = cascade.on_institution_changed(&mut next);
        assert!(change.cleared_device);
        assert_eq!(next.device(), None);
        let request = change.request.unwrap();
        assert_eq!(request.institution, "B");
        assert!(cascade.snapshot().loading);
        assert!(cascade.devices().is_empty());
    }

    #[test]
    fn test_cleared_institution_requests_nothing() {
        let cascade = resolver();
        let mut next = FilterSet::new();
        let change = cascade.on_institution_changed(&mut next);
        assert_eq!(change.request, None);
        assert!(!change.cleared_device);
        assert!(!cascade.snapshot().loading);
    }

    #[test]
    fn test_single_device_is_offered() {
        let cascade = resolver();
        let request = cascade.begin(Some("A")).unwrap();
        let offered = cascade.complete(&request, Ok(vec![Device::new("d1", "Only")]));
        assert_eq!(offered.as_deref(), Some("d1"));
        assert!(cascade.snapshot().contains("d1"));
    }

    #[test]
    fn test_multiple_or_zero_devices_are_not_offered() {
        let cascade = resolver();
        let request = cascade.begin(Some("A")).unwrap();
        let offered = cascade.complete(
            &request,
            Ok(vec![Device::new("d1", "One"), Device::new("d2", "Two")]),
        );
        assert_eq!(offered, None);
        assert_eq!(cascade.devices().len(), 2);

        let request = cascade.begin(Some("B")).unwrap();
        assert_eq!(cascade.complete(&request, Ok(Vec::new())), None);
    }

    #[test]
    fn test_stale_list_is_discarded() {
        let cascade = resolver();
        let old = cascade.begin(Some("A")).unwrap();
        let new = cascade.begin(Some("B")).unwrap();

        assert_eq!(cascade.complete(&old, Ok(vec![Device::new("a1", "A")])), None);
        assert!(cascade.devices().is_empty());
        assert!(cascade.snapshot().loading);

        cascade.complete(&new, Ok(vec![Device::new("b1", "B"), Device::new("b2", "B")]));
        let state = cascade.snapshot();
        assert_eq!(state.institution.as_deref(), Some("B"));
        assert_eq!(state.devices.len(), 2);
    }

    #[test]
    fn test_failure_sets_independent_error() {
        let cascade = resolver();
        let request = cascade.begin(Some("A")).unwrap();
        let offered = cascade.complete(&request, Err(Error::from_status(500, "boom")));
        assert_eq!(offered, None);
        let state = cascade.snapshot();
        assert!(!state.loading);
        assert!(state.error.is_some());
    }

    #[test]
    fn test_kind_filter_keeps_unknown_kinds() {
        let cascade = resolver().for_kind(Some(DeviceKind::Meter));
        let request = cascade.begin(Some("A")).unwrap();
        let offered = cascade.complete(
            &request,
            Ok(vec![
                Device::new("inv", "Inverter").with_kind(DeviceKind::Inverter),
                Device::new("m1", "Meter").with_kind(DeviceKind::Meter),
            ]),
        );
        assert_eq!(offered.as_deref(), Some("m1"));

        let request = cascade.begin(Some("B")).unwrap();
        cascade.complete(
            &request,
            Ok(vec![
                Device::new("x", "Unknown"),
                Device::new("m2", "Meter").with_kind(DeviceKind::Meter),
            ]),
        );
        assert_eq!(cascade.devices().len(), 2);
    }

    #[test]
    fn test_abandon_invalidates_in_flight() {
        let cascade = resolver();
        let request = cascade.begin(Some("A")).unwrap();
        cascade.abandon();
        assert!(!cascade.snapshot().loading);
        assert_eq!(cascade.complete(&request, Ok(vec![Device::new("a", "A")])), None);
    }

    #[tokio::test]
    async fn test_fetch_through_source() {
        let source = MockSource::new();
        source.set_dataset(ResourceKind::Devices, "A", &[Device::new("d1", "Only")]);
        let cascade = resolver();
        let mut events = cascade.events.subscribe();

        let request = cascade.begin(Some("A")).unwrap();
        let offered = cascade.fetch(&source, request).await;
        assert_eq!(offered.as_deref(), Some("d1"));

        let calls = source.calls_for(ResourceKind::Devices);
        assert_eq!(calls[0].filters.institution(), Some("A"));
        assert!(matches!(
            events.recv().await,
            Ok(SyncEvent::DevicesLoaded { count: 1, .. })
        ));
    }
}
