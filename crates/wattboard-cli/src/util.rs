//! Utility functions for CLI operations.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use indicatif::ProgressBar;
use wattboard_core::{ControllerConfig, Dashboard, DataSource, Record, today};
use wattboard_types::{FilterSet, TimeGranularity};

use crate::cli::{FilterArgs, OutputFormat};
use crate::config::{Config, resolve_institution};
use crate::style;

/// Get institution id, with helpful error message.
pub fn require_institution(institution: Option<String>) -> Result<String> {
    institution.ok_or_else(|| {
        anyhow::anyhow!(
            "No institution specified. Use --institution <ID> or set WATTBOARD_INSTITUTION environment variable.\n\
             Run 'wattboard institutions' to list the available ones."
        )
    })
}

/// Build the filter selection for a view from its arguments.
///
/// Without `--from`, the range is a trailing window of `--days` (or the
/// configured window) ending at `--to` (or today).
pub fn build_filters(args: &FilterArgs, config: &Config, window_days: u32) -> Result<FilterSet> {
    let end = args.to.unwrap_or_else(today);
    let days = args.days.unwrap_or(window_days);
    let start = match args.from {
        Some(from) => from,
        None => FilterSet::trailing_window(end, days)
            .start_date
            .unwrap_or(end),
    };
    if start > end {
        bail!(
            "Invalid date range: --from {} is after --to {}",
            wattboard_types::format_date(start),
            wattboard_types::format_date(end)
        );
    }

    let mut filters = FilterSet::new()
        .with_granularity(TimeGranularity::from(args.granularity))
        .with_range(Some(start), Some(end));
    if let Some(institution) = resolve_institution(args.institution.institution.clone(), config) {
        filters = filters.with_institution(institution);
    }
    if let Some(device) = &args.device {
        if !filters.has_institution() {
            bail!("--device requires an institution (use --institution)");
        }
        filters = filters.with_device(device.clone());
    }
    Ok(filters)
}

/// Whether a spinner should be drawn for this invocation.
pub fn show_progress(quiet: bool, format: OutputFormat) -> bool {
    !quiet && format == OutputFormat::Text && io::stderr().is_terminal()
}

/// Mount a dashboard on `filters` and wait until every fetch it triggers
/// (including automatic device selection) has settled.
pub async fn load_dashboard<R: Record, S: DataSource>(
    source: std::sync::Arc<S>,
    config: ControllerConfig,
    filters: FilterSet,
    progress: bool,
) -> Result<Dashboard<R, S>> {
    let dashboard = Dashboard::with_filters(source, config, filters)
        .context("Failed to create dashboard")?;

    let spinner: Option<ProgressBar> =
        progress.then(|| style::loading_spinner(&format!("Loading {}...", R::KIND)));
    dashboard.mount();
    dashboard.settle().await;
    if let Some(sp) = spinner {
        sp.finish_and_clear();
    }
    Ok(dashboard)
}

/// Write output to file or stdout
pub fn write_output(output: Option<&PathBuf>, content: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write to {}", path.display()))?;
        }
        None => {
            print!("{}", content);
            io::stdout().flush()?;
        }
    }
    Ok(())
}
