//! Interactive browsing session.
//!
//! Reads one command per line (from a terminal or a piped script) and
//! drives a live [`Dashboard`] with it, so debouncing, cascading device
//! selection and stale-response discarding can be observed as they happen.

use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use time::Date;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;
use wattboard_core::{ControllerConfig, Dashboard, DataSource, EventReceiver, SyncEvent};
use wattboard_types::{FilterSet, TimeGranularity, parse_date};

use super::indicators::render_text;
use crate::format::{
    FormatOptions, TableRow, format_devices_text, format_event, format_fetch_error,
    format_filters, format_page_footer, format_status,
};
use crate::style;

const HELP: &str = "\
Commands:
  institution <id|->    select (or clear) the institution
  device <id|->         select (or clear) the device
  granularity <g>       daily or monthly
  from <date|->         start of the range (YYYY-MM-DD)
  to <date|->           end of the range
  page <n> | next | prev
  size <n>              rows per page
  retry                 repeat the last fetch
  show                  wait for pending fetches, then print the view
  status                one-line summary, without waiting
  devices               device list of the selected institution
  wait                  wait for pending fetches
  help | quit
";

/// One line of a browse session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowseCommand {
    Institution(Option<String>),
    Device(Option<String>),
    Granularity(TimeGranularity),
    From(Option<Date>),
    To(Option<Date>),
    Page(usize),
    Next,
    Prev,
    Size(usize),
    Retry,
    Show,
    Status,
    Devices,
    Wait,
    Help,
    Quit,
}

fn optional(arg: Option<&str>, name: &str) -> Result<Option<String>, String> {
    match arg {
        None => Err(format!("'{}' needs an argument (use '-' to clear)", name)),
        Some("-") | Some("none") => Ok(None),
        Some(value) => Ok(Some(value.to_string())),
    }
}

fn optional_date(arg: Option<&str>, name: &str) -> Result<Option<Date>, String> {
    optional(arg, name)?
        .map(|s| parse_date(&s).map_err(|e| format!("invalid date '{}': {}", s, e)))
        .transpose()
}

fn number(arg: Option<&str>, name: &str) -> Result<usize, String> {
    let arg = arg.ok_or_else(|| format!("'{}' needs a number", name))?;
    match arg.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("'{}' must be a positive number, got '{}'", name, arg)),
    }
}

impl FromStr for BrowseCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let command = words.next().ok_or("empty command")?.to_ascii_lowercase();
        let arg = words.next();
        if let Some(extra) = words.next() {
            return Err(format!("unexpected argument '{}'", extra));
        }

        Ok(match command.as_str() {
            "institution" | "inst" | "i" => Self::Institution(optional(arg, "institution")?),
            "device" | "dev" | "d" => Self::Device(optional(arg, "device")?),
            "granularity" | "g" => {
                let arg = arg.ok_or("'granularity' needs daily or monthly")?;
                Self::Granularity(arg.parse::<TimeGranularity>().map_err(|e| e.to_string())?)
            }
            "from" => Self::From(optional_date(arg, "from")?),
            "to" => Self::To(optional_date(arg, "to")?),
            "page" | "p" => Self::Page(number(arg, "page")?),
            "next" | "n" => Self::Next,
            "prev" => Self::Prev,
            "size" => Self::Size(number(arg, "size")?),
            "retry" => Self::Retry,
            "show" | "s" => Self::Show,
            "status" => Self::Status,
            "devices" => Self::Devices,
            "wait" => Self::Wait,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => return Err(format!("unknown command '{}' (try 'help')", other)),
        })
    }
}

/// Arguments for a browse session.
pub struct BrowseArgs<'a> {
    pub filters: FilterSet,
    /// Print lifecycle events to stderr.
    pub events: bool,
    /// Events as JSON lines instead of text.
    pub json: bool,
    pub opts: &'a FormatOptions,
}

/// Run a session on stdin, printing views to stdout.
pub async fn cmd_browse<R: TableRow, S: DataSource>(
    source: Arc<S>,
    config: ControllerConfig,
    args: BrowseArgs<'_>,
) -> Result<()> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    run_session::<R, S, _, _>(source, config, args, stdin, &mut stdout).await
}

async fn run_session<R, S, I, W>(
    source: Arc<S>,
    config: ControllerConfig,
    args: BrowseArgs<'_>,
    input: I,
    out: &mut W,
) -> Result<()>
where
    R: TableRow,
    S: DataSource,
    I: AsyncBufRead + Unpin,
    W: Write,
{
    let BrowseArgs {
        filters,
        events,
        json,
        opts,
    } = args;
    let dashboard: Dashboard<R, S> =
        Dashboard::with_filters(source, config, filters).context("Failed to create dashboard")?;

    let printer = events.then(|| spawn_event_printer(dashboard.subscribe_events(), json, opts.no_color));
    dashboard.mount();

    let mut lines = input.lines();
    let mut quit = false;
    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let command = match line.parse::<BrowseCommand>() {
            Ok(command) => command,
            Err(e) => {
                eprintln!("{}", style::format_warning(&e, opts.no_color));
                continue;
            }
        };
        debug!("browse: {:?}", command);
        if command == BrowseCommand::Quit {
            quit = true;
            break;
        }
        if let Err(e) = apply(&dashboard, command, opts, out).await {
            eprintln!("{}", style::format_warning(&e.to_string(), opts.no_color));
        }
        out.flush()?;
    }

    if !quit {
        dashboard.settle().await;
    }
    dashboard.shutdown();

    if let Some((stop, handle)) = printer {
        let _ = stop.send(());
        let _ = handle.await;
    }
    Ok(())
}

async fn apply<R: TableRow, S: DataSource, W: Write>(
    dashboard: &Dashboard<R, S>,
    command: BrowseCommand,
    opts: &FormatOptions,
    out: &mut W,
) -> Result<()> {
    match command {
        BrowseCommand::Institution(id) => {
            report_change(dashboard.set_institution(id.as_deref())?, opts);
        }
        BrowseCommand::Device(id) => {
            if id.is_some() && !dashboard.filters().has_institution() {
                anyhow::bail!("select an institution first");
            }
            report_change(dashboard.set_device(id.as_deref())?, opts);
        }
        BrowseCommand::Granularity(granularity) => {
            report_change(dashboard.set_granularity(granularity)?, opts);
        }
        BrowseCommand::From(start) => {
            report_change(dashboard.set_date_range(start, dashboard.filters().end_date)?, opts);
        }
        BrowseCommand::To(end) => {
            report_change(dashboard.set_date_range(dashboard.filters().start_date, end)?, opts);
        }
        BrowseCommand::Page(index) => {
            dashboard.set_page_index(index);
            write!(out, "{}", format_page_footer(&dashboard.page_view(), opts))?;
        }
        BrowseCommand::Next => {
            dashboard.set_page_index(dashboard.page_view().page_index + 1);
            write!(out, "{}", format_page_footer(&dashboard.page_view(), opts))?;
        }
        BrowseCommand::Prev => {
            let current = dashboard.page_view().page_index;
            dashboard.set_page_index(current.saturating_sub(1).max(1));
            write!(out, "{}", format_page_footer(&dashboard.page_view(), opts))?;
        }
        BrowseCommand::Size(size) => {
            dashboard.set_page_size(size);
            write!(out, "{}", format_page_footer(&dashboard.page_view(), opts))?;
        }
        BrowseCommand::Retry => {
            if !dashboard.retry() {
                anyhow::bail!("nothing to retry yet");
            }
        }
        BrowseCommand::Show => {
            dashboard.settle().await;
            let state = dashboard.state();
            writeln!(out, "{}", render_text(&dashboard.filters(), &state, false, opts))?;
            if let Some(err) = &state.error {
                eprintln!("{}", style::format_warning(&format_fetch_error(err), opts.no_color));
            }
        }
        BrowseCommand::Status => {
            let state = dashboard.state();
            let view = state.page_view();
            writeln!(
                out,
                "{} {} | {} records | page {} of {}{}",
                format_status(state.status, opts.no_color),
                format_filters(&dashboard.filters()),
                state.records.len(),
                view.page_index,
                view.total_pages,
                if state.loading { " | loading" } else { "" }
            )?;
        }
        BrowseCommand::Devices => {
            let list = dashboard.device_list();
            if list.institution.is_none() {
                anyhow::bail!("no institution selected");
            }
            if list.loading {
                writeln!(out, "{}", style::format_info("Device list is loading", opts.no_color))?;
            } else if let Some(err) = &list.error {
                anyhow::bail!("device list unavailable: {}", format_fetch_error(err));
            } else {
                write!(out, "{}", format_devices_text(&list.devices, opts))?;
            }
        }
        BrowseCommand::Wait => dashboard.settle().await,
        BrowseCommand::Help => write!(out, "{}", HELP)?,
        BrowseCommand::Quit => {}
    }
    Ok(())
}

fn report_change(changed: bool, opts: &FormatOptions) {
    if !changed {
        eprintln!("{}", style::format_info("Selection unchanged", opts.no_color));
    }
}

fn print_event(event: &SyncEvent, json: bool, no_color: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => eprintln!("{}", line),
            Err(e) => debug!("Failed to serialize event: {}", e),
        }
    } else {
        eprintln!("{}", format_event(event, no_color));
    }
}

/// Print events until stopped; on stop, drain what is already queued.
fn spawn_event_printer(
    mut rx: EventReceiver,
    json: bool,
    no_color: bool,
) -> (oneshot::Sender<()>, JoinHandle<()>) {
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Ok(event) => print_event(&event, json, no_color),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        eprintln!("{}", style::format_warning(&format!("{} events dropped", n), no_color));
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = &mut stop_rx => {
                    while let Ok(event) = rx.try_recv() {
                        print_event(&event, json, no_color);
                    }
                    break;
                }
            }
        }
    });
    (stop_tx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::StyleMode;
    use wattboard_core::MockSource;
    use wattboard_types::{Device, DeviceKind, MeterReading, ResourceKind, ymd};

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            "institution 7".parse(),
            Ok(BrowseCommand::Institution(Some("7".to_string())))
        );
        assert_eq!("inst -".parse(), Ok(BrowseCommand::Institution(None)));
        assert_eq!("device none".parse(), Ok(BrowseCommand::Device(None)));
        assert_eq!(
            "g Monthly".parse(),
            Ok(BrowseCommand::Granularity(TimeGranularity::Monthly))
        );
        assert_eq!("from 2024-03-01".parse(), Ok(BrowseCommand::From(ymd(2024, 3, 1))));
        assert_eq!("to -".parse(), Ok(BrowseCommand::To(None)));
        assert_eq!("page 4".parse(), Ok(BrowseCommand::Page(4)));
        assert_eq!("  NEXT ".parse(), Ok(BrowseCommand::Next));
        assert_eq!("q".parse(), Ok(BrowseCommand::Quit));
    }

    #[test]
    fn test_parse_errors() {
        assert!("institution".parse::<BrowseCommand>().is_err());
        assert!("page 0".parse::<BrowseCommand>().is_err());
        assert!("size ten".parse::<BrowseCommand>().is_err());
        assert!("from 2024-13-45".parse::<BrowseCommand>().is_err());
        assert!("granularity weekly".parse::<BrowseCommand>().is_err());
        assert!("show now please".parse::<BrowseCommand>().is_err());
        let err = "launch".parse::<BrowseCommand>().unwrap_err();
        assert!(err.contains("unknown command"));
    }

    fn source() -> Arc<MockSource> {
        let source = Arc::new(MockSource::new());
        let start = ymd(2024, 1, 1).unwrap();
        let rows: Vec<MeterReading> = (0..30)
            .map(|i| MeterReading::new(start + time::Duration::days(i)))
            .collect();
        source.set_dataset(ResourceKind::MeterIndicators, "", &rows);
        source.set_dataset(
            ResourceKind::Devices,
            "2",
            &[Device::new("m-9", "Main meter").with_kind(DeviceKind::Meter)],
        );
        source
    }

    async fn session(script: &str) -> String {
        let opts = FormatOptions::new(true, StyleMode::Plain);
        let args = BrowseArgs {
            filters: FilterSet::new().with_range(ymd(2024, 1, 1), ymd(2024, 12, 31)),
            events: false,
            json: false,
            opts: &opts,
        };
        let mut out = Vec::new();
        run_session::<MeterReading, _, _, _>(
            source(),
            ControllerConfig::default(),
            args,
            script.as_bytes(),
            &mut out,
        )
        .await
        .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_shows_selected_institution() {
        let out = session("# comment\n\ninstitution 1\nshow\nnext\nnext\nnext\n").await;
        assert!(out.contains("[RESOLVED] institution 1"));
        assert!(out.contains("Page 1 of 2 (30 records)"));
        assert!(out.contains("Page 2 of 2 (30 records)"));
        assert!(!out.contains("Page 3"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_auto_selects_lone_device() {
        let out = session("institution 2\nwait\nstatus\ndevices\nquit\nshow\n").await;
        assert!(out.contains("device m-9"));
        assert!(out.contains("Main meter"));
        assert!(!out.contains("Meter indicators"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_keeps_going_after_bad_lines() {
        let out = session("bogus\ndevice m-1\nsize 25\ninstitution 1\nwait\nsize 25\n").await;
        assert!(out.contains("Page 1 of 1 (0 records)"));
        assert!(out.contains("Page 1 of 2 (30 records)"));
    }
}
