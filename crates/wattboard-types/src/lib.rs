//! Platform-agnostic types for the Wattboard energy dashboard.
//!
//! This crate provides the data shared between the synchronization core
//! (wattboard-core) and any view layer built on top of it.
//!
//! # Features
//!
//! - [`FilterSet`]: the operator's selection and its query-string encoding
//! - Indicator rows for meters, inverters, and weather stations
//! - Institution and device descriptors
//! - Lenient date and number parsing for loosely typed REST payloads
//!
//! # Example
//!
//! ```
//! use wattboard_types::{FilterSet, TimeGranularity, ymd};
//!
//! let filters = FilterSet::trailing_window(ymd(2024, 6, 15).unwrap(), 10)
//!     .with_institution("42")
//!     .with_granularity(TimeGranularity::Daily);
//! assert!(filters.has_institution());
//! ```

pub mod error;
pub mod filters;
pub mod types;

pub use error::{ParseError, ParseResult};
pub use filters::{DEFAULT_WINDOW_DAYS, FilterSet};
pub use types::{
    Dated, Device, DeviceKind, Institution, InverterReading, MeterReading, ResourceKind,
    TimeGranularity, WeatherReading, days_in_month, format_date, month_start, parse_date, ymd,
};

#[cfg(test)]
mod tests {
    use super::*;

    // --- Date parsing ---

    #[test]
    fn test_parse_date_plain() {
        assert_eq!(parse_date("2024-02-29"), Ok(ymd(2024, 2, 29).unwrap()));
    }

    #[test]
    fn test_parse_date_month_only() {
        assert_eq!(parse_date("2024-11"), Ok(ymd(2024, 11, 1).unwrap()));
    }

    #[test]
    fn test_parse_date_naive_timestamp() {
        assert_eq!(
            parse_date("2024-07-04T13:45:00"),
            Ok(ymd(2024, 7, 4).unwrap())
        );
        assert_eq!(
            parse_date("2024-07-04 13:45:00"),
            Ok(ymd(2024, 7, 4).unwrap())
        );
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert!(matches!(parse_date("04/07/2024"), Err(ParseError::InvalidDate(_))));
        assert!(parse_date("2024-13-01").is_err());
        assert!(parse_date("").is_err());
    }

    #[test]
    fn test_format_date_pads() {
        assert_eq!(format_date(ymd(987, 3, 4).unwrap()), "0987-03-04");
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(ymd(2024, 2, 10).unwrap()), 29);
        assert_eq!(days_in_month(ymd(2023, 2, 10).unwrap()), 28);
        assert_eq!(month_start(ymd(2023, 2, 10).unwrap()), ymd(2023, 2, 1).unwrap());
    }

    #[test]
    fn test_ymd_rejects_impossible_dates() {
        assert!(ymd(2023, 2, 29).is_none());
        assert!(ymd(2023, 0, 1).is_none());
    }

    // --- Granularity and resource names ---

    #[test]
    fn test_granularity_roundtrip_names() {
        for g in [TimeGranularity::Daily, TimeGranularity::Monthly] {
            assert_eq!(g.as_str().parse::<TimeGranularity>(), Ok(g));
        }
    }

    #[test]
    fn test_resource_kind_paths() {
        assert_eq!(ResourceKind::MeterIndicators.path(), "meters/indicators");
        assert_eq!(ResourceKind::Devices.path(), "devices");
        assert_eq!("weather".parse(), Ok(ResourceKind::WeatherIndicators));
        assert_eq!(
            ResourceKind::InverterIndicators.device_kind(),
            Some(DeviceKind::Inverter)
        );
        assert_eq!(ResourceKind::Institutions.device_kind(), None);
    }

    // --- Lenient payload decoding ---

    #[cfg(feature = "serde")]
    #[test]
    fn test_meter_reading_accepts_string_numbers_and_missing_fields() {
        let json = r#"{
            "date": "2024-05-02",
            "imported_energy": "12.5",
            "exported_energy": 3,
            "power_factor": null
        }"#;
        let r: MeterReading = serde_json::from_str(json).unwrap();
        assert_eq!(r.date, ymd(2024, 5, 2).unwrap());
        assert_eq!(r.imported_energy, Some(12.5));
        assert_eq!(r.exported_energy, Some(3.0));
        assert_eq!(r.power_factor, None);
        assert_eq!(r.voltage, None);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_unparseable_number_becomes_none() {
        let json = r#"{"date": "2024-05", "irradiance": "n/a"}"#;
        let r: WeatherReading = serde_json::from_str(json).unwrap();
        assert_eq!(r.date, ymd(2024, 5, 1).unwrap());
        assert_eq!(r.irradiance, None);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_device_accepts_numeric_ids() {
        let json = r#"{"id": 17, "name": "Main meter", "institution_id": 3, "kind": "meter"}"#;
        let d: Device = serde_json::from_str(json).unwrap();
        assert_eq!(d.id, "17");
        assert_eq!(d.institution_id.as_deref(), Some("3"));
        assert_eq!(d.kind, Some(DeviceKind::Meter));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_record_serializes_iso_date() {
        let r = InverterReading::new(ymd(2024, 1, 9).unwrap());
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["date"], "2024-01-09");
    }
}
