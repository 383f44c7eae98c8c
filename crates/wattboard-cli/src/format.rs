//! Output formatting utilities for text, JSON, and CSV output.

use anyhow::Result;
use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::builder::Builder;
use wattboard_core::{DerivedSummary, Error, Kpi, PageView, Record, SyncEvent, SyncStatus};
use wattboard_types::{
    Device, FilterSet, Institution, InverterReading, MeterReading, WeatherReading, format_date,
};

use crate::cli::StyleMode;
use crate::style;

/// Formatting options for output.
#[derive(Debug, Clone, Copy)]
pub struct FormatOptions {
    /// Disable colored output.
    pub no_color: bool,
    /// Omit header row in CSV output.
    pub no_header: bool,
    /// Use compact JSON output (no pretty-printing).
    pub compact: bool,
    /// Visual styling mode.
    pub style: StyleMode,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            no_color: false,
            no_header: false,
            compact: false,
            style: StyleMode::Rich,
        }
    }
}

impl FormatOptions {
    pub fn new(no_color: bool, style: StyleMode) -> Self {
        // Plain mode automatically disables colors for pipe-friendliness
        Self {
            no_color: no_color || style == StyleMode::Plain,
            no_header: false,
            compact: false,
            style,
        }
    }

    /// Check if rich styling is enabled.
    pub fn is_rich(&self) -> bool {
        self.style == StyleMode::Rich
    }

    /// Check if plain styling is enabled (no decorations).
    pub fn is_plain(&self) -> bool {
        self.style == StyleMode::Plain
    }

    /// Create with no_header option for CSV output.
    pub fn with_no_header(mut self, no_header: bool) -> Self {
        self.no_header = no_header;
        self
    }

    /// Create with compact JSON option.
    pub fn with_compact(mut self, compact: bool) -> Self {
        self.compact = compact;
        self
    }

    /// Serialize value to JSON string, respecting compact option.
    pub fn as_json<T: Serialize>(&self, value: &T) -> Result<String> {
        let json = if self.compact {
            serde_json::to_string(value)?
        } else {
            serde_json::to_string_pretty(value)?
        };
        Ok(json + "\n")
    }
}

/// Escape a string for CSV output.
/// Wraps the value in quotes if it contains commas, quotes, or newlines.
/// Double quotes are escaped by doubling them.
#[must_use]
pub fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Format a number for display with two decimals.
#[must_use]
pub fn format_number(value: f64) -> String {
    format!("{:.2}", value)
}

/// Format a sync status badge.
#[must_use]
pub fn format_status(status: SyncStatus, no_color: bool) -> String {
    let label = status.as_str().to_uppercase();
    if no_color {
        return format!("[{}]", label);
    }
    match status {
        SyncStatus::Resolved => format!("[{}]", label.green()),
        SyncStatus::Loading => format!("[{}]", label.cyan()),
        SyncStatus::Empty => format!("[{}]", label.yellow()),
        SyncStatus::Failed => format!("[{}]", label.red()),
        SyncStatus::Idle => format!("[{}]", label.dimmed()),
    }
}

/// Describe a failed fetch, with a hint for the error kinds users can act on.
#[must_use]
pub fn format_fetch_error(err: &Error) -> String {
    if err.is_authorization() {
        format!(
            "{}\nYour session is no longer authorized. Set a fresh token with \
             --token, WATTBOARD_TOKEN, or 'wattboard config set token <TOKEN>'.",
            err
        )
    } else if err.is_retryable() {
        format!("{}\nThe backend may be temporarily unavailable; try again.", err)
    } else {
        err.to_string()
    }
}

/// One-line description of the active filters.
#[must_use]
pub fn format_filters(filters: &FilterSet) -> String {
    let range = match (filters.start_date, filters.end_date) {
        (Some(start), Some(end)) => format!("{} to {}", format_date(start), format_date(end)),
        (Some(start), None) => format!("from {}", format_date(start)),
        (None, Some(end)) => format!("until {}", format_date(end)),
        (None, None) => "all dates".to_string(),
    };
    format!(
        "institution {} | device {} | {} | {}",
        filters.institution().unwrap_or("-"),
        filters.device().unwrap_or("all"),
        filters.granularity,
        range
    )
}

/// One line per lifecycle event, for `browse --events`.
#[must_use]
pub fn format_event(event: &SyncEvent, no_color: bool) -> String {
    let text = match event {
        SyncEvent::Skipped { kind } => format!("{} skipped: no institution selected", kind),
        SyncEvent::Dispatched {
            kind,
            sequence,
            filters,
        } => format!("{} #{} dispatched ({})", kind, sequence, format_filters(filters)),
        SyncEvent::Committed {
            kind,
            sequence,
            records,
        } => format!("{} #{} committed {} records", kind, sequence, records),
        SyncEvent::Discarded {
            kind,
            sequence,
            latest,
        } => format!("{} #{} discarded (superseded by #{})", kind, sequence, latest),
        SyncEvent::Failed {
            kind,
            sequence,
            error,
        } => format!("{} #{} failed: {}", kind, sequence, error),
        SyncEvent::DevicesLoaded { institution, count } => {
            format!("devices for institution {}: {}", institution, count)
        }
        SyncEvent::DevicesFailed { institution, error } => {
            format!("devices for institution {} failed: {}", institution, error)
        }
        SyncEvent::DeviceAutoSelected {
            institution,
            device_id,
        } => format!("selected {}, the only device of institution {}", device_id, institution),
        other => format!("{:?}", other),
    };
    let prefix = "event:";
    if no_color {
        format!("{} {}", prefix, text)
    } else {
        match event {
            SyncEvent::Failed { .. } | SyncEvent::DevicesFailed { .. } => {
                format!("{} {}", prefix.red(), text)
            }
            SyncEvent::Discarded { .. } => format!("{} {}", prefix.yellow(), text),
            _ => format!("{} {}", prefix.dimmed(), text),
        }
    }
}

// ============================================================================
// Indicator rows
// ============================================================================

/// A record type that renders as a table row.
pub trait TableRow: Record + Serialize {
    /// Table title.
    const TITLE: &'static str;
    /// `(table header, CSV column)` for every value column after the date.
    const COLUMNS: &'static [(&'static str, &'static str)];

    /// Values in [`TableRow::COLUMNS`] order.
    fn values(&self) -> Vec<Option<f64>>;
}

impl TableRow for MeterReading {
    const TITLE: &'static str = "Meter indicators";
    const COLUMNS: &'static [(&'static str, &'static str)] = &[
        ("Imported (kWh)", "imported_energy"),
        ("Exported (kWh)", "exported_energy"),
        ("Active (kW)", "active_power"),
        ("Reactive (kVAr)", "reactive_power"),
        ("PF", "power_factor"),
        ("Voltage (V)", "voltage"),
        ("Current (A)", "current"),
    ];

    fn values(&self) -> Vec<Option<f64>> {
        vec![
            self.imported_energy,
            self.exported_energy,
            self.active_power,
            self.reactive_power,
            self.power_factor,
            self.voltage,
            self.current,
        ]
    }
}

impl TableRow for WeatherReading {
    const TITLE: &'static str = "Weather indicators";
    const COLUMNS: &'static [(&'static str, &'static str)] = &[
        ("Temp (C)", "temperature"),
        ("Humidity (%)", "humidity"),
        ("Irradiance (W/m2)", "irradiance"),
        ("Wind (m/s)", "wind_speed"),
        ("Wind dir (deg)", "wind_direction"),
        ("Rain (mm)", "precipitation"),
    ];

    fn values(&self) -> Vec<Option<f64>> {
        vec![
            self.temperature,
            self.humidity,
            self.irradiance,
            self.wind_speed,
            self.wind_direction,
            self.precipitation,
        ]
    }
}

impl TableRow for InverterReading {
    const TITLE: &'static str = "Inverter indicators";
    const COLUMNS: &'static [(&'static str, &'static str)] = &[
        ("Energy (kWh)", "energy_generated"),
        ("AC (kW)", "ac_power"),
        ("DC (kW)", "dc_power"),
        ("Temp (C)", "temperature"),
    ];

    fn values(&self) -> Vec<Option<f64>> {
        vec![self.energy_generated, self.ac_power, self.dc_power, self.temperature]
    }
}

#[must_use]
pub fn format_rows_text<R: TableRow>(rows: &[R], opts: &FormatOptions) -> String {
    if rows.is_empty() {
        return "No records found for this selection.\n".to_string();
    }

    let mut builder = Builder::default();
    builder.push_record(std::iter::once("Date").chain(R::COLUMNS.iter().map(|(h, _)| *h)));
    for row in rows {
        builder.push_record(
            std::iter::once(format_date(row.date())).chain(
                row.values()
                    .into_iter()
                    .map(|v| v.map(format_number).unwrap_or_else(|| "-".to_string())),
            ),
        );
    }

    let mut table = builder.build();
    style::apply_table_style(&mut table, opts.style);
    format!("{}\n", table)
}

#[must_use]
pub fn format_rows_csv<R: TableRow>(rows: &[R], opts: &FormatOptions) -> String {
    let mut output = String::new();
    if !opts.no_header {
        let header: Vec<&str> = std::iter::once("date")
            .chain(R::COLUMNS.iter().map(|(_, c)| *c))
            .collect();
        output.push_str(&header.join(","));
        output.push('\n');
    }
    for row in rows {
        let line: Vec<String> = std::iter::once(format_date(row.date()))
            .chain(row.values().into_iter().map(|v| v.map(|v| v.to_string()).unwrap_or_default()))
            .collect();
        output.push_str(&line.join(","));
        output.push('\n');
    }
    output
}

/// Pagination footer, e.g. `Page 2 of 3 (47 records)`.
#[must_use]
pub fn format_page_footer(view: &PageView, opts: &FormatOptions) -> String {
    let text = format!(
        "Page {} of {} ({} records)",
        view.page_index, view.total_pages, view.total_items
    );
    let mut output = if opts.no_color {
        text
    } else {
        format!("{}", text.dimmed())
    };
    if view.has_next() && !opts.is_plain() {
        output.push_str(&format!("  next: --page {}", view.page_index + 1));
    }
    output.push('\n');
    output
}

// ============================================================================
// KPI tiles
// ============================================================================

fn format_tile_value(kpi: &Kpi) -> String {
    if kpi.unit.is_empty() {
        format_number(kpi.value)
    } else {
        format!("{} {}", format_number(kpi.value), kpi.unit)
    }
}

#[must_use]
pub fn format_summary_text(title: &str, summary: &DerivedSummary, opts: &FormatOptions) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Indicator", "Value", "Note"]);
    for kpi in &summary.tiles {
        let value = format_tile_value(kpi);
        builder.push_record([
            kpi.label.to_string(),
            if opts.no_color || !opts.is_rich() {
                value
            } else {
                format!("{}", value.bold())
            },
            kpi.note.clone().unwrap_or_default(),
        ]);
    }
    let mut table = builder.build();
    style::apply_table_style(&mut table, opts.style);

    let latest = summary
        .latest_date
        .map(|d| format!(", latest {}", format_date(d)))
        .unwrap_or_default();
    format!(
        "{}\n{}\n",
        style::format_title(
            &format!("{} ({} records{})", title, summary.record_count, latest),
            opts.no_color
        ),
        table
    )
}

#[must_use]
pub fn format_summary_csv(summary: &DerivedSummary, opts: &FormatOptions) -> String {
    let mut output = if opts.no_header {
        String::new()
    } else {
        "key,label,value,unit,note\n".to_string()
    };
    for kpi in &summary.tiles {
        output.push_str(&format!(
            "{},{},{},{},{}\n",
            kpi.key,
            csv_escape(kpi.label),
            kpi.value,
            kpi.unit,
            csv_escape(kpi.note.as_deref().unwrap_or(""))
        ));
    }
    output
}

/// JSON document for one indicator view.
#[derive(Debug, Serialize)]
pub struct ViewJson<'a, R: Serialize> {
    pub status: SyncStatus,
    pub filters: &'a FilterSet,
    pub summary: &'a DerivedSummary,
    pub page: PageView,
    pub rows: &'a [R],
}

pub fn format_view_json<R: Serialize>(view: &ViewJson<'_, R>, opts: &FormatOptions) -> Result<String> {
    opts.as_json(view)
}

// ============================================================================
// Institutions and devices
// ============================================================================

#[must_use]
pub fn format_institutions_text(institutions: &[Institution], opts: &FormatOptions) -> String {
    if institutions.is_empty() {
        return "No institutions found.\n".to_string();
    }
    let mut builder = Builder::default();
    builder.push_record(["ID", "Name"]);
    for i in institutions {
        let name = if opts.no_color {
            i.name.clone()
        } else {
            format!("{}", i.name.cyan())
        };
        builder.push_record([i.id.clone(), name]);
    }
    let mut table = builder.build();
    style::apply_table_style(&mut table, opts.style);
    format!("{}\n", table)
}

#[must_use]
pub fn format_institutions_csv(institutions: &[Institution], opts: &FormatOptions) -> String {
    let mut output = if opts.no_header {
        String::new()
    } else {
        "id,name\n".to_string()
    };
    for i in institutions {
        output.push_str(&format!("{},{}\n", csv_escape(&i.id), csv_escape(&i.name)));
    }
    output
}

pub fn format_institutions_json(institutions: &[Institution], opts: &FormatOptions) -> Result<String> {
    #[derive(Serialize)]
    struct InstitutionList<'a> {
        count: usize,
        institutions: &'a [Institution],
    }
    opts.as_json(&InstitutionList {
        count: institutions.len(),
        institutions,
    })
}

fn kind_label(device: &Device) -> String {
    device
        .kind
        .map(|k| k.to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

#[must_use]
pub fn format_devices_text(devices: &[Device], opts: &FormatOptions) -> String {
    if devices.is_empty() {
        return "No devices found.\n".to_string();
    }
    let mut builder = Builder::default();
    builder.push_record(["ID", "Name", "Type"]);
    for d in devices {
        let name = if opts.no_color {
            d.name.clone()
        } else {
            format!("{}", d.name.cyan())
        };
        builder.push_record([d.id.clone(), name, kind_label(d)]);
    }
    let mut table = builder.build();
    style::apply_table_style(&mut table, opts.style);
    format!("{}\n", table)
}

#[must_use]
pub fn format_devices_csv(devices: &[Device], opts: &FormatOptions) -> String {
    let mut output = if opts.no_header {
        String::new()
    } else {
        "id,name,type\n".to_string()
    };
    for d in devices {
        output.push_str(&format!(
            "{},{},{}\n",
            csv_escape(&d.id),
            csv_escape(&d.name),
            csv_escape(&kind_label(d))
        ));
    }
    output
}

pub fn format_devices_json(institution: &str, devices: &[Device], opts: &FormatOptions) -> Result<String> {
    #[derive(Serialize)]
    struct DeviceList<'a> {
        institution: &'a str,
        count: usize,
        devices: &'a [Device],
    }
    opts.as_json(&DeviceList {
        institution,
        count: devices.len(),
        devices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wattboard_core::derive::{keys, summarize_meters};
    use wattboard_types::{DeviceKind, ymd};

    fn plain() -> FormatOptions {
        FormatOptions::new(true, StyleMode::Plain)
    }

    fn meter(day: u8, imported: Option<f64>) -> MeterReading {
        let mut r = MeterReading::new(ymd(2024, 1, day).unwrap());
        r.imported_energy = imported;
        r
    }

    #[test]
    fn test_csv_escape() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_plain_style_disables_color() {
        let opts = FormatOptions::new(false, StyleMode::Plain);
        assert!(opts.no_color);
        assert!(opts.is_plain());
        assert!(!FormatOptions::new(false, StyleMode::Rich).no_color);
    }

    #[test]
    fn test_format_status_no_color() {
        assert_eq!(format_status(SyncStatus::Resolved, true), "[RESOLVED]");
        assert_eq!(format_status(SyncStatus::Failed, true), "[FAILED]");
        assert!(format_status(SyncStatus::Empty, false).contains("EMPTY"));
    }

    #[test]
    fn test_rows_csv_leaves_missing_values_empty() {
        let rows = [meter(1, Some(12.5)), meter(2, None)];
        let csv = format_rows_csv(&rows, &FormatOptions::default());
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "date,imported_energy,exported_energy,active_power,reactive_power,power_factor,voltage,current"
        );
        assert_eq!(lines[1], "2024-01-01,12.5,,,,,,");
        assert_eq!(lines[2], "2024-01-02,,,,,,,");
    }

    #[test]
    fn test_rows_csv_no_header() {
        let csv = format_rows_csv(&[meter(1, Some(1.0))], &plain().with_no_header(true));
        assert!(csv.starts_with("2024-01-01,"));
    }

    #[test]
    fn test_rows_text_shows_dash_for_missing() {
        let text = format_rows_text(&[meter(3, None)], &plain());
        assert!(text.contains("2024-01-03"));
        assert!(text.contains('-'));
        assert!(text.contains("Imported (kWh)"));
    }

    #[test]
    fn test_rows_text_empty() {
        let rows: Vec<WeatherReading> = Vec::new();
        assert_eq!(
            format_rows_text(&rows, &plain()),
            "No records found for this selection.\n"
        );
    }

    #[test]
    fn test_page_footer() {
        let view = PageView::new(47, 2, 20);
        let footer = format_page_footer(&view, &FormatOptions::new(true, StyleMode::Rich));
        assert!(footer.starts_with("Page 2 of 3 (47 records)"));
        assert!(footer.contains("--page 3"));

        let last = PageView::new(47, 3, 20);
        assert!(!format_page_footer(&last, &plain()).contains("--page"));
    }

    #[test]
    fn test_summary_text_and_csv() {
        let summary = summarize_meters(&[meter(1, Some(10.0)), meter(2, Some(5.5))]);
        let text = format_summary_text("Meters", &summary, &plain());
        assert!(text.contains("Meters (2 records, latest 2024-01-02)"));
        assert!(text.contains("15.50 kWh"));

        let csv = format_summary_csv(&summary, &plain());
        assert!(csv.starts_with("key,label,value,unit,note\n"));
        assert!(csv.contains(&format!("{},Imported energy,15.5,kWh,", keys::TOTAL_IMPORTED)));
    }

    #[test]
    fn test_view_json_shape() {
        let rows = [meter(1, Some(2.0))];
        let summary = summarize_meters(&rows);
        let filters = FilterSet::new().with_institution("1");
        let json = format_view_json(
            &ViewJson {
                status: SyncStatus::Resolved,
                filters: &filters,
                summary: &summary,
                page: PageView::new(1, 1, 20),
                rows: &rows,
            },
            &FormatOptions::default().with_compact(true),
        )
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["filters"]["institution_id"], "1");
        assert_eq!(value["page"]["total_pages"], 1);
        assert_eq!(value["rows"][0]["date"], "2024-01-01");
        assert!(!json.trim_end().contains('\n'));
    }

    #[test]
    fn test_devices_formats() {
        let devices = [
            Device::new("m-1", "Main, north").with_kind(DeviceKind::Meter),
            Device::new("x", "Mystery"),
        ];
        let csv = format_devices_csv(&devices, &plain());
        assert!(csv.contains("m-1,\"Main, north\",Meter"));
        assert!(csv.contains("x,Mystery,Unknown"));

        let text = format_devices_text(&devices, &plain());
        assert!(text.contains("Mystery"));
        assert_eq!(format_devices_text(&[], &plain()), "No devices found.\n");

        let json = format_devices_json("1", &devices, &plain()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["count"], 2);
    }

    #[test]
    fn test_institutions_formats() {
        let institutions = [Institution {
            id: "1".to_string(),
            name: "Campus Norte".to_string(),
        }];
        assert_eq!(
            format_institutions_csv(&institutions, &plain()),
            "id,name\n1,Campus Norte\n"
        );
        assert!(format_institutions_text(&institutions, &plain()).contains("Campus Norte"));
    }

    #[test]
    fn test_fetch_error_hints() {
        let auth = format_fetch_error(&Error::from_status(401, "expired"));
        assert!(auth.contains("token"));
        let transient = format_fetch_error(&Error::from_status(503, "down"));
        assert!(transient.contains("try again"));
    }

    #[test]
    fn test_format_event() {
        use wattboard_types::ResourceKind;
        let discarded = SyncEvent::Discarded {
            kind: ResourceKind::MeterIndicators,
            sequence: 1,
            latest: 2,
        };
        let line = format_event(&discarded, true);
        assert!(line.starts_with("event: "));
        assert!(line.contains("#1 discarded (superseded by #2)"));

        let auto = SyncEvent::DeviceAutoSelected {
            institution: "2".to_string(),
            device_id: "m-110".to_string(),
        };
        assert!(format_event(&auto, true).contains("selected m-110"));
    }

    #[test]
    fn test_format_filters() {
        let filters = FilterSet::new()
            .with_institution("1")
            .with_range(ymd(2024, 1, 1), ymd(2024, 1, 31));
        assert_eq!(
            format_filters(&filters),
            "institution 1 | device all | daily | 2024-01-01 to 2024-01-31"
        );
    }
}
