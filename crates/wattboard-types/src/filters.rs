//! The operator's current data selection.

use time::{Date, Duration};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::types::{TimeGranularity, format_date};

/// Default length of the trailing date window, in days.
pub const DEFAULT_WINDOW_DAYS: u32 = 10;

/// Query parameter names understood by the backend.
pub mod params {
    pub const INSTITUTION_ID: &str = "institution_id";
    pub const DEVICE_ID: &str = "device_id";
    pub const START_DATE: &str = "start_date";
    pub const END_DATE: &str = "end_date";
    pub const TIME_RANGE: &str = "time_range";
}

/// Current selection: institution, device, granularity, and date range.
///
/// Identifiers are plain strings; `None`, `""` and whitespace-only values all
/// mean "unset". Compare selections with [`FilterSet::same_selection`] (or
/// compare [`FilterSet::normalized`] copies) so that representation
/// differences do not count as changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FilterSet {
    /// Selected institution.
    #[cfg_attr(feature = "serde", serde(default))]
    pub institution_id: Option<String>,
    /// Selected device, only meaningful for the institution it was picked under.
    #[cfg_attr(feature = "serde", serde(default))]
    pub device_id: Option<String>,
    /// Aggregation bucket.
    #[cfg_attr(feature = "serde", serde(default))]
    pub granularity: TimeGranularity,
    /// Inclusive start of the range.
    #[cfg_attr(
        feature = "serde",
        serde(default, with = "crate::types::iso_date::option")
    )]
    pub start_date: Option<Date>,
    /// Inclusive end of the range.
    #[cfg_attr(
        feature = "serde",
        serde(default, with = "crate::types::iso_date::option")
    )]
    pub end_date: Option<Date>,
}

/// Collapse empty identifiers to `None` and trim the rest.
fn normalize_id(id: Option<&str>) -> Option<String> {
    id.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl FilterSet {
    /// Create an empty selection (no institution, no dates, daily).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the mount-time default: a trailing window of `days` days ending
    /// at `today`, daily granularity, nothing selected.
    ///
    /// # Examples
    ///
    /// ```
    /// use wattboard_types::{FilterSet, ymd};
    ///
    /// let today = ymd(2024, 6, 15).unwrap();
    /// let f = FilterSet::trailing_window(today, 10);
    /// assert_eq!(f.start_date, ymd(2024, 6, 5));
    /// assert_eq!(f.end_date, Some(today));
    /// assert!(f.institution_id.is_none());
    /// ```
    #[must_use]
    pub fn trailing_window(today: Date, days: u32) -> Self {
        let start = today
            .checked_sub(Duration::days(i64::from(days)))
            .unwrap_or(Date::MIN);
        Self {
            start_date: Some(start),
            end_date: Some(today),
            ..Self::default()
        }
    }

    /// Set the institution. Does not touch the device.
    #[must_use]
    pub fn with_institution(mut self, institution_id: impl Into<String>) -> Self {
        self.institution_id = normalize_id(Some(&institution_id.into()));
        self
    }

    /// Set the device.
    #[must_use]
    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = normalize_id(Some(&device_id.into()));
        self
    }

    /// Set the granularity.
    #[must_use]
    pub fn with_granularity(mut self, granularity: TimeGranularity) -> Self {
        self.granularity = granularity;
        self
    }

    /// Set both ends of the date range.
    #[must_use]
    pub fn with_range(mut self, start: Option<Date>, end: Option<Date>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    /// Copy with identifiers normalized (`""` and whitespace become `None`).
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            institution_id: normalize_id(self.institution_id.as_deref()),
            device_id: normalize_id(self.device_id.as_deref()),
            granularity: self.granularity,
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }

    /// Whether two selections are equal once identifiers are normalized.
    #[must_use]
    pub fn same_selection(&self, other: &FilterSet) -> bool {
        self.normalized() == other.normalized()
    }

    /// Normalized institution id, if one is selected.
    #[must_use]
    pub fn institution(&self) -> Option<&str> {
        self.institution_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Normalized device id, if one is selected.
    #[must_use]
    pub fn device(&self) -> Option<&str> {
        self.device_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Whether an institution is selected.
    #[must_use]
    pub fn has_institution(&self) -> bool {
        self.institution().is_some()
    }

    /// Whether the institution differs from `other`'s after normalization.
    #[must_use]
    pub fn institution_changed(&self, other: &FilterSet) -> bool {
        self.institution() != other.institution()
    }

    /// Whether the date range is usable (both ends unset, one end set, or
    /// start not after end).
    #[must_use]
    pub fn has_valid_range(&self) -> bool {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => start <= end,
            _ => true,
        }
    }

    /// Serialize the selection as backend query parameters.
    ///
    /// Unset values are omitted; `time_range` is always present.
    ///
    /// # Examples
    ///
    /// ```
    /// use wattboard_types::{FilterSet, ymd};
    ///
    /// let f = FilterSet::new()
    ///     .with_institution("7")
    ///     .with_range(ymd(2024, 1, 1), ymd(2024, 1, 31));
    /// let params = f.query_params();
    /// assert_eq!(params[0], ("institution_id", "7".to_string()));
    /// assert!(params.iter().all(|(k, _)| *k != "device_id"));
    /// assert!(params.contains(&("time_range", "daily".to_string())));
    /// ```
    #[must_use]
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::with_capacity(5);
        if let Some(id) = self.institution() {
            out.push((params::INSTITUTION_ID, id.to_string()));
        }
        if let Some(id) = self.device() {
            out.push((params::DEVICE_ID, id.to_string()));
        }
        if let Some(start) = self.start_date {
            out.push((params::START_DATE, format_date(start)));
        }
        if let Some(end) = self.end_date {
            out.push((params::END_DATE, format_date(end)));
        }
        out.push((params::TIME_RANGE, self.granularity.as_str().to_string()));
        out
    }
}
