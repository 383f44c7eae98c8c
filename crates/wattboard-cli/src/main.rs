use std::io;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;
use wattboard_types::{InverterReading, MeterReading, WeatherReading};

mod backend;
mod cli;
mod commands;
mod config;
mod demo;
mod format;
mod style;
mod util;

use backend::Backend;
use cli::{Cli, Commands, Indicator, OutputArgs};
use commands::{
    BrowseArgs, OverviewArgs, ViewArgs, cmd_browse, cmd_config, cmd_devices, cmd_institutions,
    cmd_overview, cmd_view,
};
use config::{Config, resolve_format, resolve_institution};
use format::FormatOptions;
use util::{build_filters, require_institution, write_output};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle completions command early (before tracing init)
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "wattboard", &mut io::stdout());
        return Ok(());
    }

    let config = Config::load();

    // When quiet mode is enabled, suppress info-level logging
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let opts = FormatOptions::new(cli.no_color || config.no_color, cli.style).with_compact(cli.compact);
    let output = cli.output.as_ref();
    let quiet = cli.quiet;
    let json = cli.json;
    let format_for = |args: &OutputArgs| resolve_format(args.format, json, &config);

    if let Commands::Config { action } = cli.command {
        let content = cmd_config(action, &Config::path(), &opts)?;
        return write_output(output, &content);
    }

    let backend = Backend::resolve(cli.demo, cli.url.as_deref(), cli.token.as_deref(), &config)?;
    if backend.is_demo() {
        tracing::debug!("Serving generated demo data");
    }
    let controller = config.controller_config()?;
    let view_kind = match &cli.command {
        Commands::Weather { .. } => Indicator::Weather,
        Commands::Inverters { .. } => Indicator::Inverters,
        _ => Indicator::Meters,
    };

    match cli.command {
        Commands::Institutions { output: out } => {
            let opts = opts.with_no_header(out.no_header);
            cmd_institutions(&backend, format_for(&out), output, quiet, &opts).await?;
        }
        Commands::Devices {
            institution,
            kind,
            output: out,
        } => {
            let institution = require_institution(resolve_institution(institution.institution, &config))?;
            let opts = opts.with_no_header(out.no_header);
            cmd_devices(
                &backend,
                &institution,
                kind.map(Into::into),
                format_for(&out),
                output,
                quiet,
                &opts,
            )
            .await?;
        }
        Commands::Meters {
            filters,
            page,
            output: out,
        }
        | Commands::Weather {
            filters,
            page,
            output: out,
        }
        | Commands::Inverters {
            filters,
            page,
            output: out,
        } => {
            let opts = opts.with_no_header(out.no_header);
            let args = ViewArgs {
                filters: build_filters(&filters, &config, controller.window_days)?,
                page: page.page,
                page_size: page.page_size,
                all: page.all,
                format: format_for(&out),
                output,
                quiet,
                opts: &opts,
            };
            let source = std::sync::Arc::new(backend);
            match view_kind {
                Indicator::Meters => cmd_view::<MeterReading, _>(source, controller, args).await?,
                Indicator::Weather => cmd_view::<WeatherReading, _>(source, controller, args).await?,
                Indicator::Inverters => cmd_view::<InverterReading, _>(source, controller, args).await?,
            }
        }
        Commands::Overview {
            filters,
            output: out,
        } => {
            let opts = opts.with_no_header(out.no_header);
            let args = OverviewArgs {
                filters: build_filters(&filters, &config, controller.window_days)?,
                format: format_for(&out),
                output,
                quiet,
                opts: &opts,
            };
            cmd_overview(std::sync::Arc::new(backend), controller, args).await?;
        }
        Commands::Browse {
            kind,
            filters,
            events,
        } => {
            let args = BrowseArgs {
                filters: build_filters(&filters, &config, controller.window_days)?,
                events,
                json,
                opts: &opts,
            };
            let source = std::sync::Arc::new(backend);
            match kind {
                Indicator::Meters => cmd_browse::<MeterReading, _>(source, controller, args).await?,
                Indicator::Weather => cmd_browse::<WeatherReading, _>(source, controller, args).await?,
                Indicator::Inverters => cmd_browse::<InverterReading, _>(source, controller, args).await?,
            }
        }
        Commands::Config { .. } | Commands::Completions { .. } => {
            // Already handled above
            unreachable!()
        }
    }

    Ok(())
}
