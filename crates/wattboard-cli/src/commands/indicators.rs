//! Meter, weather and inverter views: KPI tiles plus one page of rows.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use wattboard_core::{ControllerConfig, Dashboard, DataSource, SyncState};
use wattboard_types::FilterSet;

use crate::cli::OutputFormat;
use crate::format::{
    FormatOptions, TableRow, ViewJson, format_fetch_error, format_filters, format_page_footer,
    format_rows_csv, format_rows_text, format_status, format_summary_text, format_view_json,
};
use crate::style;
use crate::util::{load_dashboard, require_institution, show_progress, write_output};

/// Arguments for an indicator view.
pub struct ViewArgs<'a> {
    pub filters: FilterSet,
    pub page: usize,
    pub page_size: Option<usize>,
    pub all: bool,
    pub format: OutputFormat,
    pub output: Option<&'a PathBuf>,
    pub quiet: bool,
    pub opts: &'a FormatOptions,
}

pub async fn cmd_view<R: TableRow, S: DataSource>(
    source: Arc<S>,
    config: ControllerConfig,
    args: ViewArgs<'_>,
) -> Result<()> {
    let ViewArgs {
        filters,
        page,
        page_size,
        all,
        format,
        output,
        quiet,
        opts,
    } = args;
    require_institution(filters.institution().map(str::to_string))?;
    let requested_device = filters.device_id.clone();

    let dashboard: Dashboard<R, S> =
        load_dashboard(source, config, filters, show_progress(quiet, format)).await?;
    if let Some(size) = page_size {
        dashboard.set_page_size(size);
    }
    dashboard.set_page_index(page);

    let state = dashboard.state();
    if let Some(err) = &state.error {
        bail!("Failed to load {}: {}", R::KIND, format_fetch_error(err));
    }

    let filters = dashboard.filters();
    if !quiet && format == OutputFormat::Text {
        if requested_device.is_none()
            && let Some(device) = filters.device()
        {
            eprintln!(
                "{}",
                style::format_info(
                    &format!("Selected {}, the only device of this institution", device),
                    opts.no_color
                )
            );
        }
        if let Some(err) = &dashboard.device_list().error {
            eprintln!(
                "{}",
                style::format_warning(&format!("Device list unavailable: {}", err), opts.no_color)
            );
        }
    }

    let content = match format {
        OutputFormat::Json => {
            let page = state.page();
            format_view_json(
                &ViewJson {
                    status: state.status,
                    filters: &filters,
                    summary: &state.summary,
                    page: page.view,
                    rows: if all { state.records.as_slice() } else { page.items },
                },
                opts,
            )?
        }
        OutputFormat::Csv => {
            let page = state.page();
            format_rows_csv(if all { state.records.as_slice() } else { page.items }, opts)
        }
        OutputFormat::Text => render_text(&filters, &state, all, opts),
    };
    write_output(output, &content)
}

/// Text rendering of one view: header, KPI tiles, rows, and page footer.
pub(crate) fn render_text<R: TableRow>(
    filters: &FilterSet,
    state: &SyncState<R>,
    all: bool,
    opts: &FormatOptions,
) -> String {
    let mut output = format!(
        "{} {}\n\n",
        format_status(state.status, opts.no_color),
        format_filters(filters)
    );
    output.push_str(&format_summary_text(R::TITLE, &state.summary, opts));
    output.push('\n');

    if all {
        output.push_str(&format_rows_text(state.records.as_slice(), opts));
    } else {
        let page = state.page();
        output.push_str(&format_rows_text(page.items, opts));
        output.push_str(&format_page_footer(&page.view, opts));
    }
    output
}
