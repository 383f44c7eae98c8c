//! KPI tiles of every indicator family side by side.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use serde::Serialize;
use wattboard_core::{ControllerConfig, Dashboard, DataSource, DerivedSummary, SyncStatus};
use wattboard_types::{FilterSet, InverterReading, MeterReading, ResourceKind, WeatherReading};

use crate::cli::OutputFormat;
use crate::format::{
    FormatOptions, TableRow, csv_escape, format_fetch_error, format_filters, format_status,
    format_summary_csv, format_summary_text,
};
use crate::style;
use crate::util::{load_dashboard, require_institution, show_progress, write_output};

/// Arguments for the overview.
pub struct OverviewArgs<'a> {
    pub filters: FilterSet,
    pub format: OutputFormat,
    pub output: Option<&'a PathBuf>,
    pub quiet: bool,
    pub opts: &'a FormatOptions,
}

/// Outcome for one indicator family.
#[derive(Debug, Serialize)]
struct Section {
    kind: ResourceKind,
    #[serde(skip)]
    title: &'static str,
    status: SyncStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    summary: DerivedSummary,
}

#[derive(Debug, Serialize)]
struct OverviewJson<'a> {
    filters: &'a FilterSet,
    sections: &'a [Section],
}

async fn section<R: TableRow, S: DataSource>(
    source: Arc<S>,
    config: ControllerConfig,
    filters: FilterSet,
) -> Result<Section> {
    let dashboard: Dashboard<R, S> = load_dashboard(source, config, filters, false).await?;
    let state = dashboard.state();
    Ok(Section {
        kind: R::KIND,
        title: R::TITLE,
        status: state.status,
        device_id: dashboard.filters().device_id,
        error: state.error.as_ref().map(format_fetch_error),
        summary: (*state.summary).clone(),
    })
}

/// Load meter, weather and inverter indicators concurrently for one
/// institution and print their tiles.
///
/// A family that fails is reported in its section; the command only fails
/// when every family does.
pub async fn cmd_overview<S: DataSource>(
    source: Arc<S>,
    config: ControllerConfig,
    args: OverviewArgs<'_>,
) -> Result<()> {
    let OverviewArgs {
        filters,
        format,
        output,
        quiet,
        opts,
    } = args;
    let institution = require_institution(filters.institution().map(str::to_string))?;
    if filters.device().is_some() {
        bail!("overview covers every device family; drop --device or use a single view");
    }

    let spinner = show_progress(quiet, format)
        .then(|| style::loading_spinner(&format!("Loading overview of institution {}...", institution)));
    let (meters, weather, inverters) = futures::try_join!(
        section::<MeterReading, S>(Arc::clone(&source), config.clone(), filters.clone()),
        section::<WeatherReading, S>(Arc::clone(&source), config.clone(), filters.clone()),
        section::<InverterReading, S>(source, config, filters.clone()),
    )?;
    if let Some(sp) = spinner {
        sp.finish_and_clear();
    }
    let sections = [meters, weather, inverters];

    if sections.iter().all(|s| s.error.is_some()) {
        let reason = sections[0].error.as_deref().unwrap_or("unknown error");
        bail!("Failed to load overview of institution {}: {}", institution, reason);
    }

    let content = match format {
        OutputFormat::Json => opts.as_json(&OverviewJson {
            filters: &filters,
            sections: &sections,
        })?,
        OutputFormat::Csv => format_overview_csv(&sections, opts),
        OutputFormat::Text => format_overview_text(&filters, &sections, opts),
    };
    write_output(output, &content)
}

fn format_overview_text(filters: &FilterSet, sections: &[Section], opts: &FormatOptions) -> String {
    let mut output = format!("{}\n\n", format_filters(filters));
    for section in sections {
        let device = section
            .device_id
            .as_deref()
            .map(|d| format!(" (device {})", d))
            .unwrap_or_default();
        output.push_str(&format!(
            "{} {}{}\n",
            format_status(section.status, opts.no_color),
            section.kind,
            device
        ));
        match &section.error {
            Some(err) => {
                output.push_str(&style::format_warning(err, opts.no_color));
                output.push_str("\n\n");
            }
            None => {
                output.push_str(&format_summary_text(section.title, &section.summary, opts));
                output.push('\n');
            }
        }
    }
    output
}

fn format_overview_csv(sections: &[Section], opts: &FormatOptions) -> String {
    let mut output = if opts.no_header {
        String::new()
    } else {
        "kind,key,label,value,unit,note\n".to_string()
    };
    let rows = opts.with_no_header(true);
    for section in sections.iter().filter(|s| s.error.is_none()) {
        let kind = csv_escape(&section.kind.to_string());
        for line in format_summary_csv(&section.summary, &rows).lines() {
            output.push_str(&format!("{},{}\n", kind, line));
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::StyleMode;
    use serde_json::json;
    use wattboard_core::{Error, MockSource};
    use wattboard_types::ymd;

    fn filters() -> FilterSet {
        FilterSet::new()
            .with_institution("1")
            .with_range(ymd(2024, 6, 1), ymd(2024, 6, 30))
    }

    fn source() -> Arc<MockSource> {
        let source = Arc::new(MockSource::new());
        source.set_raw_dataset(
            ResourceKind::MeterIndicators,
            "1",
            vec![
                json!({"date": "2024-06-01", "imported_energy": 10.0, "exported_energy": 2.0}),
                json!({"date": "2024-06-02", "imported_energy": 12.0, "exported_energy": 1.0}),
            ],
        );
        source.set_raw_dataset(
            ResourceKind::WeatherIndicators,
            "1",
            vec![json!({"date": "2024-06-02", "irradiance": 5.2, "temperature": 21.5})],
        );
        source
    }

    fn args<'a>(format: OutputFormat, output: &'a PathBuf, opts: &'a FormatOptions) -> OverviewArgs<'a> {
        OverviewArgs {
            filters: filters(),
            format,
            output: Some(output),
            quiet: true,
            opts,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_overview_json_has_every_family() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overview.json");
        let opts = FormatOptions::default();

        cmd_overview(source(), ControllerConfig::default(), args(OutputFormat::Json, &path, &opts))
            .await
            .unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let sections = value["sections"].as_array().unwrap();
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0]["kind"], "meter_indicators");
        assert_eq!(sections[0]["status"], "resolved");
        assert_eq!(sections[0]["summary"]["record_count"], 2);
        assert_eq!(sections[1]["summary"]["record_count"], 1);
        assert_eq!(sections[2]["status"], "empty");
    }

    #[tokio::test(start_paused = true)]
    async fn test_overview_csv_prefixes_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overview.csv");
        let opts = FormatOptions::new(true, StyleMode::Plain);

        cmd_overview(source(), ControllerConfig::default(), args(OutputFormat::Csv, &path, &opts))
            .await
            .unwrap();

        let csv = std::fs::read_to_string(&path).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("kind,key,label,value,unit,note"));
        assert!(lines.all(|l| !l.starts_with("key,")));
        assert!(csv.contains(&format!("{},", ResourceKind::MeterIndicators)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overview_fails_only_when_every_family_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overview.txt");
        let opts = FormatOptions::new(true, StyleMode::Plain);

        let failing = Arc::new(MockSource::new());
        failing.set_should_fail(Some(Error::from_status(503, "maintenance")));
        let err = cmd_overview(failing, ControllerConfig::default(), args(OutputFormat::Text, &path, &opts))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("maintenance"));

        cmd_overview(source(), ControllerConfig::default(), args(OutputFormat::Text, &path, &opts))
            .await
            .unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("institution 1"));
        assert!(text.contains("[RESOLVED]"));
        assert!(text.contains("[EMPTY]"));
    }

    #[tokio::test]
    async fn test_overview_rejects_device() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overview.txt");
        let opts = FormatOptions::default();
        let mut overview = args(OutputFormat::Text, &path, &opts);
        overview.filters = filters().with_device("m-1");

        let err = cmd_overview(source(), ControllerConfig::default(), overview)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("--device"));
    }
}
