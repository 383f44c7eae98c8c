//! Deterministic demo data for `--demo`.
//!
//! Two institutions are served from an in-memory [`MockSource`]:
//!
//! - `1` (Campus Norte): two meters, an inverter and a weather station
//! - `2` (Escuela Rural): one device of each kind, so views auto-select it;
//!   its responses are slower, which makes stale-response handling visible
//!   when switching institutions in `wattboard browse`
//!
//! Rows cover the last [`DEMO_DAYS`] days up to today and are generated from
//! fixed seeds, so the same day always shows the same values.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_json::Value;
use time::Date;
use wattboard_core::{MockSource, today};
use wattboard_types::{
    Device, DeviceKind, Institution, InverterReading, MeterReading, ResourceKind, WeatherReading,
};

/// Number of days of generated history.
pub const DEMO_DAYS: i64 = 120;

const BASE_LATENCY: Duration = Duration::from_millis(150);
const SLOW_LATENCY: Duration = Duration::from_millis(600);

struct DemoSite {
    id: &'static str,
    name: &'static str,
    devices: &'static [(&'static str, &'static str, DeviceKind)],
}

const SITES: [DemoSite; 2] = [
    DemoSite {
        id: "1",
        name: "Campus Norte",
        devices: &[
            ("m-101", "Main building meter", DeviceKind::Meter),
            ("m-102", "Laboratory meter", DeviceKind::Meter),
            ("inv-201", "Rooftop inverter", DeviceKind::Inverter),
            ("ws-301", "Rooftop weather station", DeviceKind::WeatherStation),
        ],
    },
    DemoSite {
        id: "2",
        name: "Escuela Rural",
        devices: &[
            ("m-110", "School meter", DeviceKind::Meter),
            ("inv-210", "Carport inverter", DeviceKind::Inverter),
            ("ws-310", "Field weather station", DeviceKind::WeatherStation),
        ],
    },
];

/// Build the demo source with data ending today.
pub fn source() -> MockSource {
    source_until(today())
}

/// Build the demo source with data ending at `end`.
pub fn source_until(end: Date) -> MockSource {
    let source = MockSource::new();
    source.set_latency(BASE_LATENCY);
    source.set_institution_latency(SITES[1].id, SLOW_LATENCY);

    let institutions: Vec<Institution> = SITES
        .iter()
        .map(|s| Institution {
            id: s.id.to_string(),
            name: s.name.to_string(),
        })
        .collect();
    source.set_dataset(ResourceKind::Institutions, "", &institutions);

    for (site_index, site) in SITES.iter().enumerate() {
        let devices: Vec<Device> = site
            .devices
            .iter()
            .map(|(id, name, kind)| Device::new(*id, *name).with_institution(site.id).with_kind(*kind))
            .collect();
        source.set_dataset(ResourceKind::Devices, site.id, &devices);

        let mut meters = Vec::new();
        let mut weather = Vec::new();
        let mut inverters = Vec::new();
        for (device_index, (id, _, kind)) in site.devices.iter().enumerate() {
            let seed = (site_index as u64 + 1) * 1000 + device_index as u64;
            let mut rng = StdRng::seed_from_u64(seed);
            match kind {
                DeviceKind::Meter => meters.extend(tagged(&meter_rows(&mut rng, end), id)),
                DeviceKind::WeatherStation => {
                    weather.extend(tagged(&weather_rows(&mut rng, end), id))
                }
                DeviceKind::Inverter => inverters.extend(tagged(&inverter_rows(&mut rng, end), id)),
                _ => {}
            }
        }
        source.set_raw_dataset(ResourceKind::MeterIndicators, site.id, meters);
        source.set_raw_dataset(ResourceKind::WeatherIndicators, site.id, weather);
        source.set_raw_dataset(ResourceKind::InverterIndicators, site.id, inverters);
    }

    source
}

/// Serialize rows and tag each with the device it came from.
fn tagged<T: Serialize>(rows: &[T], device_id: &str) -> Vec<Value> {
    rows.iter()
        .filter_map(|row| serde_json::to_value(row).ok())
        .map(|mut value| {
            if let Value::Object(map) = &mut value {
                map.insert("device_id".to_string(), Value::String(device_id.to_string()));
            }
            value
        })
        .collect()
}

fn days(end: Date) -> impl Iterator<Item = Date> {
    (0..DEMO_DAYS)
        .rev()
        .filter_map(move |back| end.checked_sub(time::Duration::days(back)))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn meter_rows(rng: &mut StdRng, end: Date) -> Vec<MeterReading> {
    days(end)
        .map(|date| {
            let mut r = MeterReading::new(date);
            r.imported_energy = Some(round2(rng.random_range(80.0..140.0)));
            r.exported_energy = Some(round2(rng.random_range(5.0..40.0)));
            r.active_power = Some(round2(rng.random_range(3.0..12.0)));
            r.reactive_power = Some(round2(rng.random_range(0.5..3.0)));
            r.power_factor = Some(round2(rng.random_range(0.82..0.99)));
            r.voltage = Some(round2(rng.random_range(225.0..235.0)));
            r.current = Some(round2(rng.random_range(10.0..40.0)));
            r
        })
        .collect()
}

fn weather_rows(rng: &mut StdRng, end: Date) -> Vec<WeatherReading> {
    days(end)
        .map(|date| {
            let mut r = WeatherReading::new(date);
            r.temperature = Some(round2(rng.random_range(12.0..32.0)));
            r.humidity = Some(round2(rng.random_range(35.0..90.0)));
            r.irradiance = Some(round2(rng.random_range(150.0..950.0)));
            r.wind_speed = Some(round2(rng.random_range(0.5..9.0)));
            // Prevailing south-westerly with occasional shifts
            let direction = if rng.random_bool(0.7) {
                rng.random_range(200.0..250.0)
            } else {
                rng.random_range(0.0..360.0)
            };
            r.wind_direction = Some(round2(direction));
            r.precipitation = Some(if rng.random_bool(0.2) {
                round2(rng.random_range(0.2..12.0))
            } else {
                0.0
            });
            r
        })
        .collect()
}

fn inverter_rows(rng: &mut StdRng, end: Date) -> Vec<InverterReading> {
    days(end)
        .map(|date| {
            let ac_power: f64 = rng.random_range(3.0..8.0);
            let efficiency: f64 = rng.random_range(0.94..0.98);
            let mut r = InverterReading::new(date);
            r.energy_generated = Some(round2(rng.random_range(20.0..45.0)));
            r.ac_power = Some(round2(ac_power));
            r.dc_power = Some(round2(ac_power / efficiency));
            r.temperature = Some(round2(rng.random_range(30.0..55.0)));
            r
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wattboard_core::DataSource;
    use wattboard_types::{FilterSet, ymd};

    fn end() -> Date {
        ymd(2024, 6, 30).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_devices_per_institution() {
        let source = source_until(end());
        let devices: Vec<Device> = source
            .fetch_list(ResourceKind::Devices, &FilterSet::new().with_institution("2"))
            .await
            .unwrap();
        assert_eq!(devices.len(), 3);
        assert!(devices.iter().all(|d| d.institution_id.as_deref() == Some("2")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rows_follow_device_and_range_filters() {
        let source = source_until(end());
        let filters = FilterSet::new()
            .with_institution("1")
            .with_range(ymd(2024, 6, 21), ymd(2024, 6, 30));

        let all: Vec<MeterReading> = source
            .fetch_list(ResourceKind::MeterIndicators, &filters)
            .await
            .unwrap();
        assert_eq!(all.len(), 20);

        let one: Vec<MeterReading> = source
            .fetch_list(ResourceKind::MeterIndicators, &filters.clone().with_device("m-102"))
            .await
            .unwrap();
        assert_eq!(one.len(), 10);
    }

    #[test]
    fn test_generation_is_deterministic() {
        let mut a = StdRng::seed_from_u64(1000);
        let mut b = StdRng::seed_from_u64(1000);
        assert_eq!(weather_rows(&mut a, end()), weather_rows(&mut b, end()));
    }

    #[test]
    fn test_generated_values_are_plausible() {
        let mut rng = StdRng::seed_from_u64(7);
        let rows = inverter_rows(&mut rng, end());
        assert_eq!(rows.len(), DEMO_DAYS as usize);
        assert_eq!(rows.last().map(|r| r.date), Some(end()));
        for r in rows {
            let (ac, dc) = (r.ac_power.unwrap(), r.dc_power.unwrap());
            assert!(ac < dc, "AC power must stay below DC power");
        }
    }
}
