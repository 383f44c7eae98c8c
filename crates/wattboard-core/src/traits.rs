//! Trait abstractions for dashboard data.
//!
//! [`DataSource`] abstracts over the REST backend and the in-memory mock so
//! that controllers can be exercised without a network. [`Record`] ties an
//! indicator row type to the resource it is fetched from and to the KPI
//! derivation applied to it.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use wattboard_types::{Dated, FilterSet, ResourceKind};

use crate::derive::DerivedSummary;
use crate::error::Result;

/// Anything that can answer "list the rows of `kind` matching `filters`".
///
/// Implementations perform no retries and no caching. Every call is one
/// logical request; ordering between concurrent calls is the caller's
/// problem (see [`crate::RequestSequencer`]).
///
/// # Example
///
/// ```ignore
/// use wattboard_core::{DataSource, Result};
/// use wattboard_types::{FilterSet, MeterReading, ResourceKind};
///
/// async fn count_rows<S: DataSource>(source: &S, filters: &FilterSet) -> Result<usize> {
///     let rows: Vec<MeterReading> = source
///         .fetch_list(ResourceKind::MeterIndicators, filters)
///         .await?;
///     Ok(rows.len())
/// }
/// ```
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    /// Fetch every row of `kind` matching `filters`.
    async fn fetch_list<T>(&self, kind: ResourceKind, filters: &FilterSet) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send + 'static;

    /// Short description used in log lines.
    fn describe(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

#[async_trait]
impl<S: DataSource> DataSource for Arc<S> {
    async fn fetch_list<T>(&self, kind: ResourceKind, filters: &FilterSet) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        (**self).fetch_list(kind, filters).await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// An indicator row the dashboard can fetch, page, and summarize.
pub trait Record: Dated + Clone + Send + Sync + DeserializeOwned + 'static {
    /// Resource the rows are fetched from.
    const KIND: ResourceKind;

    /// Compute KPI tiles for a result set. Must be pure and total: an empty
    /// slice yields a zero-valued summary.
    fn summarize(records: &[Self]) -> DerivedSummary;
}
