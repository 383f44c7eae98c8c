//! Tuning knobs for a dashboard controller.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default quiet period before a filter change triggers a fetch.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(400);

/// Default number of rows per table page.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Upper bound accepted for the debounce delay.
const MAX_DEBOUNCE: Duration = Duration::from_secs(10);

/// Configuration for [`crate::Dashboard`] and [`crate::SyncController`].
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use wattboard_core::ControllerConfig;
///
/// let config = ControllerConfig::default()
///     .debounce(Duration::from_millis(250))
///     .page_size(50);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Quiet period applied to filter changes.
    #[serde(with = "duration_ms")]
    pub debounce: Duration,
    /// Length of the default trailing date window.
    pub window_days: u32,
    /// Initial rows per page.
    pub page_size: usize,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            window_days: wattboard_types::DEFAULT_WINDOW_DAYS,
            page_size: DEFAULT_PAGE_SIZE,
            event_capacity: 100,
        }
    }
}

impl ControllerConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the debounce quiet period.
    #[must_use]
    pub fn debounce(mut self, delay: Duration) -> Self {
        self.debounce = delay;
        self
    }

    /// Set the default window length in days.
    #[must_use]
    pub fn window_days(mut self, days: u32) -> Self {
        self.window_days = days;
        self
    }

    /// Set the initial page size.
    #[must_use]
    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    /// Set the event channel capacity.
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Check the configuration for values the controller cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::invalid_config("page_size must be greater than 0"));
        }
        if self.window_days == 0 {
            return Err(Error::invalid_config("window_days must be greater than 0"));
        }
        if self.debounce > MAX_DEBOUNCE {
            return Err(Error::invalid_config(format!(
                "debounce must not exceed {:?}, got {:?}",
                MAX_DEBOUNCE, self.debounce
            )));
        }
        if self.event_capacity == 0 {
            return Err(Error::invalid_config(
                "event_capacity must be greater than 0",
            ));
        }
        Ok(())
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.debounce, Duration::from_millis(400));
        assert_eq!(config.window_days, 10);
        assert_eq!(config.page_size, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_page_size() {
        let err = ControllerConfig::default().page_size(0).validate().unwrap_err();
        assert!(err.to_string().contains("page_size"));
    }

    #[test]
    fn test_validate_rejects_long_debounce() {
        let config = ControllerConfig::default().debounce(Duration::from_secs(60));
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_serde_uses_milliseconds() {
        let json = serde_json::to_value(ControllerConfig::default()).unwrap();
        assert_eq!(json["debounce"], 400);

        let back: ControllerConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, ControllerConfig::default());
    }
}
