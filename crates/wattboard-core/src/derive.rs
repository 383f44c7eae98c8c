//! KPI derivation for committed result sets.
//!
//! Every function here is pure and total: empty inputs, missing fields and
//! non-finite values never panic and never produce NaN. Missing values are
//! skipped when aggregating, and an empty result set yields a summary whose
//! tiles are all zero.
//!
//! # Photovoltaic estimate
//!
//! The theoretical PV output for a weather record uses a single reference
//! panel:
//!
//! ```text
//! P = G × A × η × (1 + γ × (T − 25 °C))
//! ```
//!
//! with `A` = [`PANEL_AREA_M2`], `η` = [`PANEL_EFFICIENCY`] and
//! `γ` = [`TEMPERATURE_COEFFICIENT`]. Peak sun hours are
//! `G × 24 h / 1000 W/m²`, i.e. the hours of standard-test-condition sun
//! delivering the same daily energy as the recorded mean irradiance.

use serde::Serialize;
use time::Date;

use wattboard_types::{
    Dated, InverterReading, MeterReading, ResourceKind, WeatherReading,
};

use crate::traits::Record;

/// Reference panel surface in m².
pub const PANEL_AREA_M2: f64 = 1.6;

/// Reference panel efficiency at standard test conditions.
pub const PANEL_EFFICIENCY: f64 = 0.18;

/// Power temperature coefficient per °C above the reference temperature.
pub const TEMPERATURE_COEFFICIENT: f64 = -0.004;

/// Cell temperature at standard test conditions, in °C.
pub const REFERENCE_TEMPERATURE_C: f64 = 25.0;

/// Irradiance at standard test conditions, in W/m².
pub const STANDARD_IRRADIANCE: f64 = 1000.0;

/// Stable keys for the KPI tiles.
pub mod keys {
    pub const TOTAL_IMPORTED: &str = "total_imported";
    pub const TOTAL_EXPORTED: &str = "total_exported";
    pub const NET_ENERGY: &str = "net_energy";
    pub const PEAK_ACTIVE_POWER: &str = "peak_active_power";
    pub const LATEST_POWER_FACTOR: &str = "latest_power_factor";
    pub const LATEST_VOLTAGE: &str = "latest_voltage";

    pub const LATEST_TEMPERATURE: &str = "latest_temperature";
    pub const LATEST_HUMIDITY: &str = "latest_humidity";
    pub const LATEST_IRRADIANCE: &str = "latest_irradiance";
    pub const THEORETICAL_PV_POWER: &str = "theoretical_pv_power";
    pub const PEAK_SUN_HOURS: &str = "peak_sun_hours";
    pub const MEAN_WIND_SPEED: &str = "mean_wind_speed";
    pub const PREDOMINANT_WIND_DIRECTION: &str = "predominant_wind_direction";
    pub const TOTAL_PRECIPITATION: &str = "total_precipitation";

    pub const TOTAL_ENERGY_GENERATED: &str = "total_energy_generated";
    pub const PEAK_AC_POWER: &str = "peak_ac_power";
    pub const LATEST_AC_POWER: &str = "latest_ac_power";
    pub const CONVERSION_EFFICIENCY: &str = "conversion_efficiency";
    pub const MAX_INVERTER_TEMPERATURE: &str = "max_inverter_temperature";
}

/// One headline figure shown above the table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpi {
    /// Stable identifier, one of [`keys`].
    pub key: &'static str,
    /// Human-readable title.
    pub label: &'static str,
    /// Numeric value; 0 when there is nothing to aggregate.
    pub value: f64,
    /// Display unit.
    pub unit: &'static str,
    /// Qualitative annotation, when the value warrants one.
    pub note: Option<String>,
}

impl Kpi {
    fn new(key: &'static str, label: &'static str, value: f64, unit: &'static str) -> Self {
        Self {
            key,
            label,
            value: finite_or_zero(value),
            unit,
            note: None,
        }
    }

    fn with_note(mut self, note: Option<impl Into<String>>) -> Self {
        self.note = note.map(Into::into);
        self
    }
}

/// KPI tiles computed from one committed result set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DerivedSummary {
    /// Tiles in display order.
    pub tiles: Vec<Kpi>,
    /// Number of rows the summary was computed from.
    pub record_count: usize,
    /// Date of the latest row, if any.
    #[serde(with = "wattboard_types::types::iso_date::option")]
    pub latest_date: Option<Date>,
}

impl DerivedSummary {
    /// Look up a tile by key.
    pub fn get(&self, key: &str) -> Option<&Kpi> {
        self.tiles.iter().find(|k| k.key == key)
    }

    /// Value of the tile with `key`.
    pub fn value(&self, key: &str) -> Option<f64> {
        self.get(key).map(|k| k.value)
    }

    /// Whether the summary was computed from an empty set.
    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }
}

/// Summarize `records` with the derivation registered for their type.
pub fn derive<R: Record>(records: &[R]) -> DerivedSummary {
    R::summarize(records)
}

// --- Aggregation helpers ---

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

fn values<'a, R>(
    records: &'a [R],
    field: impl Fn(&R) -> Option<f64> + 'a,
) -> impl Iterator<Item = f64> + 'a {
    records
        .iter()
        .filter_map(field)
        .filter(|v| v.is_finite())
}

/// Sum of present values; 0 when none are present.
pub fn sum<R>(records: &[R], field: impl Fn(&R) -> Option<f64>) -> f64 {
    values(records, field).sum()
}

/// Arithmetic mean of present values.
pub fn mean<R>(records: &[R], field: impl Fn(&R) -> Option<f64>) -> Option<f64> {
    let (total, count) = values(records, field).fold((0.0, 0usize), |(t, c), v| (t + v, c + 1));
    (count > 0).then(|| total / count as f64)
}

/// Maximum of present values.
pub fn max<R>(records: &[R], field: impl Fn(&R) -> Option<f64>) -> Option<f64> {
    values(records, field).fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
}

/// The record with the greatest date. Ties go to the earliest position.
pub fn latest<R: Dated>(records: &[R]) -> Option<&R> {
    records.iter().fold(None, |best, r| match best {
        Some(b) if b.date() >= r.date() => Some(b),
        _ => Some(r),
    })
}

// --- Physical models ---

/// Theoretical output of the reference panel, in W.
///
/// Negative results (very hot cells, negative irradiance) clamp to 0.
///
/// # Examples
///
/// ```
/// use wattboard_core::derive::theoretical_pv_power;
///
/// let p = theoretical_pv_power(1000.0, 25.0);
/// assert!((p - 288.0).abs() < 1e-9);
/// assert_eq!(theoretical_pv_power(-5.0, 25.0), 0.0);
/// ```
pub fn theoretical_pv_power(irradiance: f64, temperature: f64) -> f64 {
    if !irradiance.is_finite() || !temperature.is_finite() {
        return 0.0;
    }
    let derate = 1.0 + TEMPERATURE_COEFFICIENT * (temperature - REFERENCE_TEMPERATURE_C);
    (irradiance.max(0.0) * PANEL_AREA_M2 * PANEL_EFFICIENCY * derate).max(0.0)
}

/// Peak sun hours for a day whose mean irradiance is `mean_irradiance` W/m².
pub fn peak_sun_hours(mean_irradiance: f64) -> f64 {
    finite_or_zero(mean_irradiance).max(0.0) * 24.0 / STANDARD_IRRADIANCE
}

// --- Classifications ---

/// One of the eight principal compass sectors, each 45° wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CompassDirection {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl CompassDirection {
    /// All sectors, clockwise from north.
    pub const ALL: [CompassDirection; 8] = [
        CompassDirection::N,
        CompassDirection::NE,
        CompassDirection::E,
        CompassDirection::SE,
        CompassDirection::S,
        CompassDirection::SW,
        CompassDirection::W,
        CompassDirection::NW,
    ];

    /// Sector containing `degrees`. North covers [337.5°, 22.5°).
    ///
    /// Returns `None` for non-finite input.
    pub fn from_degrees(degrees: f64) -> Option<Self> {
        if !degrees.is_finite() {
            return None;
        }
        let normalized = degrees.rem_euclid(360.0);
        let index = ((normalized + 22.5) / 45.0).floor() as usize % 8;
        Some(Self::ALL[index])
    }

    /// Clockwise position, N = 0.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Bearing of the sector's center.
    pub fn center_degrees(self) -> f64 {
        self.index() as f64 * 45.0
    }

    /// Abbreviation, e.g. `"NE"`.
    pub fn as_str(self) -> &'static str {
        match self {
            CompassDirection::N => "N",
            CompassDirection::NE => "NE",
            CompassDirection::E => "E",
            CompassDirection::SE => "SE",
            CompassDirection::S => "S",
            CompassDirection::SW => "SW",
            CompassDirection::W => "W",
            CompassDirection::NW => "NW",
        }
    }
}

impl std::fmt::Display for CompassDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Most frequent sector among `degrees`. Ties go to the sector that comes
/// first clockwise from north.
///
/// # Examples
///
/// ```
/// use wattboard_core::derive::{CompassDirection, predominant_direction};
///
/// assert_eq!(
///     predominant_direction([10.0, 15.0, 200.0]),
///     Some(CompassDirection::N)
/// );
/// assert_eq!(predominant_direction([]), None);
/// ```
pub fn predominant_direction(degrees: impl IntoIterator<Item = f64>) -> Option<CompassDirection> {
    let mut counts = [0usize; 8];
    for sector in degrees.into_iter().filter_map(CompassDirection::from_degrees) {
        counts[sector.index()] += 1;
    }
    let (index, &count) = counts
        .iter()
        .enumerate()
        .fold((0, &0), |best, cur| if cur.1 > best.1 { cur } else { best });
    (count > 0).then_some(CompassDirection::ALL[index])
}

/// Solar resource category for an irradiance value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IrradianceLevel {
    /// Below 200 W/m².
    Low,
    /// 200–500 W/m².
    Moderate,
    /// 500–800 W/m².
    High,
    /// 800 W/m² and above.
    VeryHigh,
}

impl IrradianceLevel {
    /// Classify an irradiance value in W/m².
    pub fn from_irradiance(irradiance: f64) -> Self {
        match irradiance {
            v if v < 200.0 => IrradianceLevel::Low,
            v if v < 500.0 => IrradianceLevel::Moderate,
            v if v < 800.0 => IrradianceLevel::High,
            _ => IrradianceLevel::VeryHigh,
        }
    }

    /// Human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            IrradianceLevel::Low => "Low - overcast or low sun",
            IrradianceLevel::Moderate => "Moderate - partly cloudy",
            IrradianceLevel::High => "High - good generation conditions",
            IrradianceLevel::VeryHigh => "Very high - near peak generation",
        }
    }
}

/// Power-factor quality band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PowerFactorQuality {
    /// 0.95 and above.
    Excellent,
    /// 0.90–0.95.
    Acceptable,
    /// Below 0.90.
    Poor,
}

impl PowerFactorQuality {
    /// Classify a power factor; the sign (leading/lagging) is ignored.
    pub fn from_power_factor(pf: f64) -> Self {
        match pf.abs() {
            v if v >= 0.95 => PowerFactorQuality::Excellent,
            v if v >= 0.90 => PowerFactorQuality::Acceptable,
            _ => PowerFactorQuality::Poor,
        }
    }

    /// Human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            PowerFactorQuality::Excellent => "Excellent",
            PowerFactorQuality::Acceptable => "Acceptable",
            PowerFactorQuality::Poor => "Poor - reactive power penalty likely",
        }
    }
}

/// Wind strength category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WindClass {
    /// Below 0.5 m/s.
    Calm,
    /// 0.5–5.5 m/s.
    Breeze,
    /// 5.5–10.8 m/s.
    Windy,
    /// 10.8 m/s and above.
    Strong,
}

impl WindClass {
    /// Classify a wind speed in m/s.
    pub fn from_speed(speed: f64) -> Self {
        match speed {
            v if v < 0.5 => WindClass::Calm,
            v if v < 5.5 => WindClass::Breeze,
            v if v < 10.8 => WindClass::Windy,
            _ => WindClass::Strong,
        }
    }

    /// Human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            WindClass::Calm => "Calm",
            WindClass::Breeze => "Light to moderate breeze",
            WindClass::Windy => "Windy",
            WindClass::Strong => "Strong wind",
        }
    }
}

// --- Per-resource summaries ---

fn net_energy_note(net: f64) -> &'static str {
    if net > 0.0 {
        "Net importer"
    } else if net < 0.0 {
        "Net exporter"
    } else {
        "Balanced"
    }
}

/// KPI tiles for meter rows.
pub fn summarize_meters(records: &[MeterReading]) -> DerivedSummary {
    let latest = latest(records);
    let imported = sum(records, |r| r.imported_energy);
    let exported = sum(records, |r| r.exported_energy);
    let net = imported - exported;
    let power_factor = latest.and_then(|r| r.power_factor).filter(|v| v.is_finite());

    DerivedSummary {
        tiles: vec![
            Kpi::new(keys::TOTAL_IMPORTED, "Imported energy", imported, "kWh"),
            Kpi::new(keys::TOTAL_EXPORTED, "Exported energy", exported, "kWh"),
            Kpi::new(keys::NET_ENERGY, "Net energy", net, "kWh")
                .with_note((!records.is_empty()).then(|| net_energy_note(net))),
            Kpi::new(
                keys::PEAK_ACTIVE_POWER,
                "Peak active power",
                max(records, |r| r.active_power).unwrap_or(0.0),
                "kW",
            ),
            Kpi::new(
                keys::LATEST_POWER_FACTOR,
                "Power factor",
                power_factor.unwrap_or(0.0),
                "",
            )
            .with_note(power_factor.map(|pf| PowerFactorQuality::from_power_factor(pf).description())),
            Kpi::new(
                keys::LATEST_VOLTAGE,
                "Voltage",
                latest.and_then(|r| r.voltage).unwrap_or(0.0),
                "V",
            ),
        ],
        record_count: records.len(),
        latest_date: latest.map(Dated::date),
    }
}

/// KPI tiles for weather-station rows.
pub fn summarize_weather(records: &[WeatherReading]) -> DerivedSummary {
    let latest = latest(records);
    let irradiance = latest.and_then(|r| r.irradiance).filter(|v| v.is_finite());
    let temperature = latest.and_then(|r| r.temperature).filter(|v| v.is_finite());
    let wind_speed = mean(records, |r| r.wind_speed);
    let direction = predominant_direction(records.iter().filter_map(|r| r.wind_direction));

    let pv_power = irradiance
        .map(|g| theoretical_pv_power(g, temperature.unwrap_or(REFERENCE_TEMPERATURE_C)))
        .unwrap_or(0.0);

    DerivedSummary {
        tiles: vec![
            Kpi::new(
                keys::LATEST_TEMPERATURE,
                "Temperature",
                temperature.unwrap_or(0.0),
                "°C",
            ),
            Kpi::new(
                keys::LATEST_HUMIDITY,
                "Humidity",
                latest.and_then(|r| r.humidity).unwrap_or(0.0),
                "%",
            ),
            Kpi::new(
                keys::LATEST_IRRADIANCE,
                "Irradiance",
                irradiance.unwrap_or(0.0),
                "W/m²",
            )
            .with_note(irradiance.map(|g| IrradianceLevel::from_irradiance(g).description())),
            Kpi::new(
                keys::THEORETICAL_PV_POWER,
                "Theoretical PV power",
                pv_power,
                "W",
            ),
            Kpi::new(
                keys::PEAK_SUN_HOURS,
                "Peak sun hours",
                irradiance.map(peak_sun_hours).unwrap_or(0.0),
                "h",
            ),
            Kpi::new(
                keys::MEAN_WIND_SPEED,
                "Mean wind speed",
                wind_speed.unwrap_or(0.0),
                "m/s",
            )
            .with_note(wind_speed.map(|v| WindClass::from_speed(v).description())),
            Kpi::new(
                keys::PREDOMINANT_WIND_DIRECTION,
                "Predominant wind",
                direction.map(CompassDirection::center_degrees).unwrap_or(0.0),
                "°",
            )
            .with_note(direction.map(CompassDirection::as_str)),
            Kpi::new(
                keys::TOTAL_PRECIPITATION,
                "Precipitation",
                sum(records, |r| r.precipitation),
                "mm",
            ),
        ],
        record_count: records.len(),
        latest_date: latest.map(Dated::date),
    }
}

/// KPI tiles for inverter rows.
pub fn summarize_inverters(records: &[InverterReading]) -> DerivedSummary {
    let latest = latest(records);

    // Only rows reporting both sides count toward the conversion ratio.
    let paired: Vec<(f64, f64)> = records
        .iter()
        .filter_map(|r| Some((r.ac_power?, r.dc_power?)))
        .filter(|(ac, dc)| ac.is_finite() && dc.is_finite())
        .collect();
    let ac_total: f64 = paired.iter().map(|(ac, _)| ac).sum();
    let dc_total: f64 = paired.iter().map(|(_, dc)| dc).sum();
    let efficiency = (dc_total > 0.0).then(|| ac_total / dc_total * 100.0);

    DerivedSummary {
        tiles: vec![
            Kpi::new(
                keys::TOTAL_ENERGY_GENERATED,
                "Energy generated",
                sum(records, |r| r.energy_generated),
                "kWh",
            ),
            Kpi::new(
                keys::PEAK_AC_POWER,
                "Peak AC power",
                max(records, |r| r.ac_power).unwrap_or(0.0),
                "kW",
            ),
            Kpi::new(
                keys::LATEST_AC_POWER,
                "AC power",
                latest.and_then(|r| r.ac_power).unwrap_or(0.0),
                "kW",
            ),
            Kpi::new(
                keys::CONVERSION_EFFICIENCY,
                "DC/AC efficiency",
                efficiency.unwrap_or(0.0),
                "%",
            )
            .with_note(efficiency.map(|e| {
                if e >= 95.0 {
                    "Nominal"
                } else if e >= 90.0 {
                    "Slightly degraded"
                } else {
                    "Check inverter"
                }
            })),
            Kpi::new(
                keys::MAX_INVERTER_TEMPERATURE,
                "Max temperature",
                max(records, |r| r.temperature).unwrap_or(0.0),
                "°C",
            ),
        ],
        record_count: records.len(),
        latest_date: latest.map(Dated::date),
    }
}

impl Record for MeterReading {
    const KIND: ResourceKind = ResourceKind::MeterIndicators;

    fn summarize(records: &[Self]) -> DerivedSummary {
        summarize_meters(records)
    }
}

impl Record for WeatherReading {
    const KIND: ResourceKind = ResourceKind::WeatherIndicators;

    fn summarize(records: &[Self]) -> DerivedSummary {
        summarize_weather(records)
    }
}

impl Record for InverterReading {
    const KIND: ResourceKind = ResourceKind::InverterIndicators;

    fn summarize(records: &[Self]) -> DerivedSummary {
        summarize_inverters(records)
    }
}
