//! Institution and device listing.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use wattboard_core::{CascadeResolver, DataSource, EventDispatcher};
use wattboard_types::{DeviceKind, FilterSet, Institution, ResourceKind};

use crate::cli::OutputFormat;
use crate::format::{
    FormatOptions, format_devices_csv, format_devices_json, format_devices_text,
    format_fetch_error, format_institutions_csv, format_institutions_json,
    format_institutions_text,
};
use crate::style;
use crate::util::{show_progress, write_output};

pub async fn cmd_institutions<S: DataSource>(
    source: &S,
    format: OutputFormat,
    output: Option<&PathBuf>,
    quiet: bool,
    opts: &FormatOptions,
) -> Result<()> {
    let spinner = show_progress(quiet, format).then(|| style::loading_spinner("Loading institutions..."));
    let result: wattboard_core::Result<Vec<Institution>> = source
        .fetch_list(ResourceKind::Institutions, &FilterSet::new())
        .await;
    if let Some(sp) = spinner {
        sp.finish_and_clear();
    }
    let institutions = result
        .map_err(|e| anyhow::anyhow!(format_fetch_error(&e)))
        .context("Failed to load institutions")?;

    let content = match format {
        OutputFormat::Json => format_institutions_json(&institutions, opts)?,
        OutputFormat::Text => format_institutions_text(&institutions, opts),
        OutputFormat::Csv => format_institutions_csv(&institutions, opts),
    };
    write_output(output, &content)
}

/// List the devices of `institution` through the same resolver the
/// dashboard uses, so kind filtering matches what views would offer.
pub async fn cmd_devices<S: DataSource>(
    source: &S,
    institution: &str,
    kind: Option<DeviceKind>,
    format: OutputFormat,
    output: Option<&PathBuf>,
    quiet: bool,
    opts: &FormatOptions,
) -> Result<()> {
    let cascade = CascadeResolver::new(EventDispatcher::default()).for_kind(kind);
    let Some(request) = cascade.begin(Some(institution)) else {
        bail!("No institution specified");
    };

    let spinner = show_progress(quiet, format)
        .then(|| style::loading_spinner(&format!("Loading devices of institution {}...", institution)));
    cascade.fetch(source, request).await;
    if let Some(sp) = spinner {
        sp.finish_and_clear();
    }

    let state = cascade.snapshot();
    if let Some(err) = &state.error {
        bail!(
            "Failed to load devices of institution {}: {}",
            institution,
            format_fetch_error(err)
        );
    }

    let content = match format {
        OutputFormat::Json => format_devices_json(institution, &state.devices, opts)?,
        OutputFormat::Text => format_devices_text(&state.devices, opts),
        OutputFormat::Csv => format_devices_csv(&state.devices, opts),
    };
    write_output(output, &content)
}
