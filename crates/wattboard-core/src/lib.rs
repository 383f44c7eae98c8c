//! Filter-driven data synchronization for the Wattboard energy dashboard.
//!
//! This crate keeps a paginated indicator table and its KPI tiles in step
//! with the operator's filter selection, against a REST backend whose
//! responses may arrive in any order.
//!
//! # Features
//!
//! - **Change gating**: identical selections never trigger a fetch
//! - **Dependent selection**: changing the institution drops the device and
//!   reloads the device list; a lone device is selected automatically
//! - **Debouncing**: bursts of filter changes produce one fetch
//! - **Stale-response protection**: only the latest-issued fetch commits
//! - **Derivations**: totals, latest values, PV estimates, wind direction
//! - **Pagination**: clamped client-side paging of the committed rows
//! - **Events**: every fetch lifecycle step is broadcast for observers
//!
//! # Components
//!
//! | Component | Role |
//! |-----------|------|
//! | [`ChangeGate`] | Suppresses no-op filter changes |
//! | [`CascadeResolver`] | Institution → device dependency |
//! | [`DebounceScheduler`] | Trailing-edge delay of fetches |
//! | [`RequestSequencer`] | Tags fetches, identifies stale ones |
//! | [`SyncController`] | Runs fetches and owns table state |
//! | [`derive`](crate::derive) | KPI derivation engine |
//! | [`paginate()`] | Page slicing and clamping |
//! | [`Dashboard`] | Wires all of the above for one view |
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use wattboard_core::{ControllerConfig, Dashboard, MockSource};
//! use wattboard_types::{FilterSet, MeterReading};
//!
//! #[tokio::main]
//! async fn main() -> wattboard_core::Result<()> {
//!     let source = Arc::new(MockSource::new());
//!     let dashboard: Dashboard<MeterReading, _> =
//!         Dashboard::with_filters(source, ControllerConfig::default(), FilterSet::new())?;
//!
//!     dashboard.mount();
//!     dashboard.set_institution(Some("42"))?;
//!     dashboard.settle().await;
//!
//!     let state = dashboard.state();
//!     println!("{} rows, page {:?}", state.records.len(), state.page_view());
//!     Ok(())
//! }
//! ```

pub mod cascade;
pub mod config;
pub mod controller;
pub mod dashboard;
pub mod debounce;
pub mod derive;
pub mod error;
pub mod events;
pub mod gate;
pub mod mock;
pub mod paginate;
pub mod sequencer;
pub mod traits;

#[cfg(feature = "http-source")]
pub mod client;

// Re-export types
pub use wattboard_types;

pub use cascade::{CascadeResolver, DeviceListRequest, DeviceListState, InstitutionChange};
pub use config::{ControllerConfig, DEFAULT_DEBOUNCE, DEFAULT_PAGE_SIZE};
pub use controller::{CycleStatus, SyncController, SyncCycle, SyncState, SyncStatus};
pub use dashboard::{Dashboard, today};
pub use debounce::DebounceScheduler;
pub use derive::{
    CompassDirection, DerivedSummary, IrradianceLevel, Kpi, PowerFactorQuality, WindClass,
};
pub use error::{Error, ErrorKind, Result};
pub use events::{EventDispatcher, EventReceiver, EventSender, SyncEvent};
pub use gate::{ChangeGate, should_sync};
pub use mock::{MockCall, MockSource, MockSourceBuilder};
pub use paginate::{Page, PageView, clamp_page, paginate, total_pages};
pub use sequencer::RequestSequencer;
pub use traits::{DataSource, Record};

#[cfg(feature = "http-source")]
pub use client::HttpSource;
