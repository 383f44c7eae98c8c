//! Core types for Wattboard dashboard data.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::{Date, Month, OffsetDateTime};

use crate::error::ParseError;

/// Time bucket the backend aggregates indicator rows into.
///
/// Serialized as the `time_range` query parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TimeGranularity {
    /// One row per day.
    #[default]
    Daily,
    /// One row per calendar month.
    Monthly,
}

impl TimeGranularity {
    /// Query-string value for this granularity.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeGranularity::Daily => "daily",
            TimeGranularity::Monthly => "monthly",
        }
    }
}

impl fmt::Display for TimeGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeGranularity {
    type Err = ParseError;

    /// Parse a granularity name (case-insensitive).
    ///
    /// # Examples
    ///
    /// ```
    /// use wattboard_types::TimeGranularity;
    ///
    /// assert_eq!("daily".parse(), Ok(TimeGranularity::Daily));
    /// assert_eq!("Monthly".parse(), Ok(TimeGranularity::Monthly));
    /// assert!("weekly".parse::<TimeGranularity>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" | "day" | "d" => Ok(TimeGranularity::Daily),
            "monthly" | "month" | "m" => Ok(TimeGranularity::Monthly),
            _ => Err(ParseError::UnknownGranularity(s.to_string())),
        }
    }
}

/// Kind of list resource the backend exposes.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new resources
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[non_exhaustive]
pub enum ResourceKind {
    /// Electrical meter indicator rows.
    MeterIndicators,
    /// Weather station indicator rows.
    WeatherIndicators,
    /// Inverter indicator rows.
    InverterIndicators,
    /// Devices belonging to an institution.
    Devices,
    /// Institutions visible to the operator.
    Institutions,
}

impl ResourceKind {
    /// Path segment under the API root.
    #[must_use]
    pub fn path(&self) -> &'static str {
        match self {
            ResourceKind::MeterIndicators => "meters/indicators",
            ResourceKind::WeatherIndicators => "weather/indicators",
            ResourceKind::InverterIndicators => "inverters/indicators",
            ResourceKind::Devices => "devices",
            ResourceKind::Institutions => "institutions",
        }
    }

    /// Short identifier used in logs and CLI arguments.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::MeterIndicators => "meters",
            ResourceKind::WeatherIndicators => "weather",
            ResourceKind::InverterIndicators => "inverters",
            ResourceKind::Devices => "devices",
            ResourceKind::Institutions => "institutions",
        }
    }

    /// Device kind whose readings this resource returns, if any.
    #[must_use]
    pub fn device_kind(&self) -> Option<DeviceKind> {
        match self {
            ResourceKind::MeterIndicators => Some(DeviceKind::Meter),
            ResourceKind::WeatherIndicators => Some(DeviceKind::WeatherStation),
            ResourceKind::InverterIndicators => Some(DeviceKind::Inverter),
            ResourceKind::Devices | ResourceKind::Institutions => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "meters" | "meter" => Ok(ResourceKind::MeterIndicators),
            "weather" => Ok(ResourceKind::WeatherIndicators),
            "inverters" | "inverter" => Ok(ResourceKind::InverterIndicators),
            "devices" => Ok(ResourceKind::Devices),
            "institutions" => Ok(ResourceKind::Institutions),
            _ => Err(ParseError::UnknownResource(s.to_string())),
        }
    }
}

/// Category of monitored device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[non_exhaustive]
pub enum DeviceKind {
    /// Electrical energy meter.
    Meter,
    /// Photovoltaic inverter.
    Inverter,
    /// Weather station (irradiance, temperature, wind).
    WeatherStation,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Meter => write!(f, "Meter"),
            DeviceKind::Inverter => write!(f, "Inverter"),
            DeviceKind::WeatherStation => write!(f, "Weather station"),
        }
    }
}

/// An institution (site owner) the operator can browse.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Institution {
    /// Backend identifier.
    #[cfg_attr(feature = "serde", serde(deserialize_with = "lenient::id"))]
    pub id: String,
    /// Display name.
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: String,
}

/// A device installed at an institution.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Device {
    /// Backend identifier.
    #[cfg_attr(feature = "serde", serde(deserialize_with = "lenient::id"))]
    pub id: String,
    /// Display name.
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: String,
    /// Owning institution, when the backend reports it.
    #[cfg_attr(
        feature = "serde",
        serde(
            default,
            deserialize_with = "lenient::opt_id",
            skip_serializing_if = "Option::is_none"
        )
    )]
    pub institution_id: Option<String>,
    /// Device category, when the backend reports it.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub kind: Option<DeviceKind>,
}

impl Device {
    /// Create a device with only an id and a name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            institution_id: None,
            kind: None,
        }
    }

    /// Set the owning institution.
    #[must_use]
    pub fn with_institution(mut self, institution_id: impl Into<String>) -> Self {
        self.institution_id = Some(institution_id.into());
        self
    }

    /// Set the device kind.
    #[must_use]
    pub fn with_kind(mut self, kind: DeviceKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

/// Anything in a result set that carries a calendar date.
pub trait Dated {
    /// Date of the row (day for daily rows, first of month for monthly rows).
    fn date(&self) -> Date;
}

/// One aggregated row from an electrical meter.
///
/// Every numeric field is optional: the backend omits columns a meter does
/// not measure, and derivations treat a missing value as zero.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MeterReading {
    /// Date of the row.
    #[cfg_attr(feature = "serde", serde(with = "iso_date"))]
    pub date: Date,
    /// Imported (consumed) active energy in kWh.
    #[cfg_attr(feature = "serde", serde(default, deserialize_with = "lenient::number"))]
    pub imported_energy: Option<f64>,
    /// Exported (injected) active energy in kWh.
    #[cfg_attr(feature = "serde", serde(default, deserialize_with = "lenient::number"))]
    pub exported_energy: Option<f64>,
    /// Mean active power in kW.
    #[cfg_attr(feature = "serde", serde(default, deserialize_with = "lenient::number"))]
    pub active_power: Option<f64>,
    /// Mean reactive power in kVAr.
    #[cfg_attr(feature = "serde", serde(default, deserialize_with = "lenient::number"))]
    pub reactive_power: Option<f64>,
    /// Mean power factor (0-1).
    #[cfg_attr(feature = "serde", serde(default, deserialize_with = "lenient::number"))]
    pub power_factor: Option<f64>,
    /// Mean line voltage in V.
    #[cfg_attr(feature = "serde", serde(default, deserialize_with = "lenient::number"))]
    pub voltage: Option<f64>,
    /// Mean line current in A.
    #[cfg_attr(feature = "serde", serde(default, deserialize_with = "lenient::number"))]
    pub current: Option<f64>,
}

impl MeterReading {
    /// Create an empty row for `date`.
    #[must_use]
    pub fn new(date: Date) -> Self {
        Self {
            date,
            imported_energy: None,
            exported_energy: None,
            active_power: None,
            reactive_power: None,
            power_factor: None,
            voltage: None,
            current: None,
        }
    }
}

impl Dated for MeterReading {
    fn date(&self) -> Date {
        self.date
    }
}

/// One aggregated row from a weather station.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WeatherReading {
    /// Date of the row.
    #[cfg_attr(feature = "serde", serde(with = "iso_date"))]
    pub date: Date,
    /// Mean ambient temperature in °C.
    #[cfg_attr(feature = "serde", serde(default, deserialize_with = "lenient::number"))]
    pub temperature: Option<f64>,
    /// Mean relative humidity in %.
    #[cfg_attr(feature = "serde", serde(default, deserialize_with = "lenient::number"))]
    pub humidity: Option<f64>,
    /// Mean global horizontal irradiance in W/m².
    #[cfg_attr(feature = "serde", serde(default, deserialize_with = "lenient::number"))]
    pub irradiance: Option<f64>,
    /// Mean wind speed in m/s.
    #[cfg_attr(feature = "serde", serde(default, deserialize_with = "lenient::number"))]
    pub wind_speed: Option<f64>,
    /// Prevailing wind direction in degrees (0 = north, clockwise).
    #[cfg_attr(feature = "serde", serde(default, deserialize_with = "lenient::number"))]
    pub wind_direction: Option<f64>,
    /// Accumulated precipitation in mm.
    #[cfg_attr(feature = "serde", serde(default, deserialize_with = "lenient::number"))]
    pub precipitation: Option<f64>,
}

impl WeatherReading {
    /// Create an empty row for `date`.
    #[must_use]
    pub fn new(date: Date) -> Self {
        Self {
            date,
            temperature: None,
            humidity: None,
            irradiance: None,
            wind_speed: None,
            wind_direction: None,
            precipitation: None,
        }
    }
}

impl Dated for WeatherReading {
    fn date(&self) -> Date {
        self.date
    }
}

/// One aggregated row from a PV inverter.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InverterReading {
    /// Date of the row.
    #[cfg_attr(feature = "serde", serde(with = "iso_date"))]
    pub date: Date,
    /// Energy generated during the period in kWh.
    #[cfg_attr(feature = "serde", serde(default, deserialize_with = "lenient::number"))]
    pub energy_generated: Option<f64>,
    /// Mean AC output power in kW.
    #[cfg_attr(feature = "serde", serde(default, deserialize_with = "lenient::number"))]
    pub ac_power: Option<f64>,
    /// Mean DC input power in kW.
    #[cfg_attr(feature = "serde", serde(default, deserialize_with = "lenient::number"))]
    pub dc_power: Option<f64>,
    /// Mean heatsink temperature in °C.
    #[cfg_attr(feature = "serde", serde(default, deserialize_with = "lenient::number"))]
    pub temperature: Option<f64>,
}

impl InverterReading {
    /// Create an empty row for `date`.
    #[must_use]
    pub fn new(date: Date) -> Self {
        Self {
            date,
            energy_generated: None,
            ac_power: None,
            dc_power: None,
            temperature: None,
        }
    }
}

impl Dated for InverterReading {
    fn date(&self) -> Date {
        self.date
    }
}

/// Parse a calendar date from the formats the backend and users produce.
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM` (first day of the month), RFC3339
/// timestamps, and `YYYY-MM-DDTHH:MM:SS` without offset (date part only).
///
/// # Examples
///
/// ```
/// use time::{Date, Month};
/// use wattboard_types::parse_date;
///
/// let d = Date::from_calendar_date(2024, Month::March, 5).unwrap();
/// assert_eq!(parse_date("2024-03-05"), Ok(d));
/// assert_eq!(parse_date("2024-03-05T10:00:00Z"), Ok(d));
/// assert_eq!(parse_date("2024-03").unwrap().day(), 1);
/// assert!(parse_date("yesterday").is_err());
/// ```
pub fn parse_date(s: &str) -> Result<Date, ParseError> {
    let s = s.trim();
    let ymd = time::macros::format_description!("[year]-[month]-[day]");

    if let Ok(date) = Date::parse(s, &ymd) {
        return Ok(date);
    }

    if let Ok(dt) = OffsetDateTime::parse(s, &time::format_description::well_known::Rfc3339) {
        return Ok(dt.date());
    }

    // YYYY-MM
    if s.len() == 7
        && let Ok(date) = Date::parse(&format!("{}-01", s), &ymd)
    {
        return Ok(date);
    }

    // Timestamp without offset: keep the date part
    if s.len() > 10
        && s.is_char_boundary(10)
        && matches!(s.as_bytes()[10], b'T' | b' ')
        && let Ok(date) = Date::parse(&s[..10], &ymd)
    {
        return Ok(date);
    }

    Err(ParseError::InvalidDate(s.to_string()))
}

/// Format a date as `YYYY-MM-DD`.
#[must_use]
pub fn format_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

/// First day of the month containing `date`.
#[must_use]
pub fn month_start(date: Date) -> Date {
    date.replace_day(1).unwrap_or(date)
}

/// Number of days in the month containing `date`.
#[must_use]
pub fn days_in_month(date: Date) -> u8 {
    time::util::days_in_month(date.month(), date.year())
}

/// Convenience constructor used by tests and demo data.
///
/// Returns `None` for impossible dates instead of panicking.
#[must_use]
pub fn ymd(year: i32, month: u8, day: u8) -> Option<Date> {
    let month = Month::try_from(month).ok()?;
    Date::from_calendar_date(year, month, day).ok()
}

/// Serde adapter for `YYYY-MM-DD` dates that also accepts the lenient
/// inputs understood by [`parse_date`].
#[cfg(feature = "serde")]
pub mod iso_date {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::Date;

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_date(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_date(&s).map_err(serde::de::Error::custom)
    }

    /// Same as the parent module for `Option<Date>`.
    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use time::Date;

        pub fn serialize<S: Serializer>(
            date: &Option<Date>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match date {
                Some(d) => serializer.serialize_some(&crate::types::format_date(*d)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Date>, D::Error> {
            let s = Option::<String>::deserialize(deserializer)?;
            match s.as_deref().map(str::trim) {
                None | Some("") => Ok(None),
                Some(s) => crate::types::parse_date(s)
                    .map(Some)
                    .map_err(serde::de::Error::custom),
            }
        }
    }
}

/// Deserializers that accept the loose JSON shapes REST backends emit:
/// numbers encoded as strings, numeric identifiers, and `null`.
#[cfg(feature = "serde")]
mod lenient {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        Text(String),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdRepr {
        Int(i64),
        Text(String),
    }

    pub fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        let value = Option::<NumberOrString>::deserialize(deserializer)?;
        Ok(match value {
            Some(NumberOrString::Number(n)) if n.is_finite() => Some(n),
            Some(NumberOrString::Text(s)) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        })
    }

    pub fn id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(match IdRepr::deserialize(deserializer)? {
            IdRepr::Int(n) => n.to_string(),
            IdRepr::Text(s) => s,
        })
    }

    pub fn opt_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        Ok(match Option::<IdRepr>::deserialize(deserializer)? {
            Some(IdRepr::Int(n)) => Some(n.to_string()),
            Some(IdRepr::Text(s)) if !s.trim().is_empty() => Some(s),
            _ => None,
        })
    }
}
