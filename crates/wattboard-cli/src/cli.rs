//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use time::Date;
use wattboard_types::{DeviceKind, TimeGranularity, parse_date};

/// Output format for commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

impl OutputFormat {
    /// Parse a format name as stored in the config file.
    pub fn from_config(value: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(value, true).ok()
    }
}

/// Visual styling mode for output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum StyleMode {
    /// Standard styling with colors
    Minimal,
    /// Rich styling with rounded tables and colored tiles (default)
    #[default]
    Rich,
    /// Plain text with no decorations (for scripting)
    Plain,
}

/// Indicator family shown by a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Indicator {
    Meters,
    Weather,
    Inverters,
}

/// Granularity argument (maps onto [`TimeGranularity`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum GranularityArg {
    #[default]
    Daily,
    Monthly,
}

impl From<GranularityArg> for TimeGranularity {
    fn from(value: GranularityArg) -> Self {
        match value {
            GranularityArg::Daily => TimeGranularity::Daily,
            GranularityArg::Monthly => TimeGranularity::Monthly,
        }
    }
}

/// Device kind argument for the `devices` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DeviceKindArg {
    Meter,
    Inverter,
    Weather,
}

impl From<DeviceKindArg> for DeviceKind {
    fn from(value: DeviceKindArg) -> Self {
        match value {
            DeviceKindArg::Meter => DeviceKind::Meter,
            DeviceKindArg::Inverter => DeviceKind::Inverter,
            DeviceKindArg::Weather => DeviceKind::WeatherStation,
        }
    }
}

/// Reusable institution selection argument
#[derive(Debug, Clone, Args)]
pub struct InstitutionArgs {
    /// Institution id, or use WATTBOARD_INSTITUTION env var
    #[arg(short, long, env = "WATTBOARD_INSTITUTION")]
    pub institution: Option<String>,
}

/// Reusable filter arguments
#[derive(Debug, Clone, Args)]
pub struct FilterArgs {
    #[command(flatten)]
    pub institution: InstitutionArgs,

    /// Device id (must belong to the institution)
    #[arg(short, long)]
    pub device: Option<String>,

    /// Time bucket of each row
    #[arg(short, long, value_enum, default_value = "daily")]
    pub granularity: GranularityArg,

    /// First date of the range (YYYY-MM-DD or YYYY-MM)
    #[arg(long, value_parser = parse_date_arg)]
    pub from: Option<Date>,

    /// Last date of the range (YYYY-MM-DD or YYYY-MM)
    #[arg(long, value_parser = parse_date_arg)]
    pub to: Option<Date>,

    /// Length of the trailing window when --from is omitted
    #[arg(long)]
    pub days: Option<u32>,
}

/// Reusable paging arguments
#[derive(Debug, Clone, Args)]
pub struct PageArgs {
    /// Page to show (1-based, clamped to the last page)
    #[arg(short, long, default_value = "1")]
    pub page: usize,

    /// Rows per page (defaults to config, then 20)
    #[arg(short = 's', long)]
    pub page_size: Option<usize>,

    /// Print every row instead of one page
    #[arg(long, conflicts_with = "page")]
    pub all: bool,
}

/// Reusable output format arguments
#[derive(Debug, Clone, Args)]
pub struct OutputArgs {
    /// Output format (defaults to config, then text)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Omit header row in CSV output (useful for appending)
    #[arg(long)]
    pub no_header: bool,
}

#[derive(Parser)]
#[command(name = "wattboard")]
#[command(author, version, about = "CLI for the Wattboard energy dashboard", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output as JSON (shorthand for --format json)
    #[arg(long, global = true)]
    pub json: bool,

    /// Output compact JSON (no pretty-printing)
    #[arg(long, global = true)]
    pub compact: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Visual styling mode (minimal, rich, plain)
    #[arg(
        long,
        global = true,
        value_enum,
        default_value = "rich",
        env = "WATTBOARD_STYLE"
    )]
    pub style: StyleMode,

    /// Backend base URL, or use WATTBOARD_URL env var
    #[arg(long, global = true, env = "WATTBOARD_URL")]
    pub url: Option<String>,

    /// Bearer token, or use WATTBOARD_TOKEN env var
    #[arg(long, global = true, env = "WATTBOARD_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Serve generated demo data instead of contacting a backend
    #[arg(long, global = true)]
    pub demo: bool,

    /// Write output to file instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List institutions
    Institutions {
        #[command(flatten)]
        output: OutputArgs,
    },

    /// List the devices of an institution
    Devices {
        #[command(flatten)]
        institution: InstitutionArgs,

        /// Only list devices of this kind
        #[arg(short, long, value_enum)]
        kind: Option<DeviceKindArg>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Show meter indicators
    Meters {
        #[command(flatten)]
        filters: FilterArgs,

        #[command(flatten)]
        page: PageArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Show weather indicators
    Weather {
        #[command(flatten)]
        filters: FilterArgs,

        #[command(flatten)]
        page: PageArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Show inverter indicators
    Inverters {
        #[command(flatten)]
        filters: FilterArgs,

        #[command(flatten)]
        page: PageArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// KPI tiles of every indicator family for one institution
    Overview {
        #[command(flatten)]
        filters: FilterArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Interactive session: read filter commands from stdin
    Browse {
        /// Indicator family to browse
        #[arg(short, long, value_enum, default_value = "meters")]
        kind: Indicator,

        #[command(flatten)]
        filters: FilterArgs,

        /// Print every fetch lifecycle event to stderr
        #[arg(long)]
        events: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Configuration keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigKey {
    /// Backend base URL
    BaseUrl,
    /// Bearer token
    Token,
    /// Default institution id
    Institution,
    /// Rows per page
    PageSize,
    /// Debounce delay in milliseconds (browse)
    DebounceMs,
    /// Default output format
    Format,
    /// Disable colored output
    NoColor,
}

/// Configuration subcommands
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Get a configuration value
    Get {
        /// Configuration key
        #[arg(value_enum)]
        key: ConfigKey,
    },

    /// Set a configuration value
    Set {
        /// Configuration key
        #[arg(value_enum)]
        key: ConfigKey,
        /// Configuration value
        value: String,
    },

    /// Unset (remove) a configuration value
    Unset {
        /// Configuration key to remove
        #[arg(value_enum)]
        key: ConfigKey,
    },

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init,
}

/// Parse a date argument with the same leniency as the backend.
fn parse_date_arg(s: &str) -> Result<Date, String> {
    parse_date(s).map_err(|_| format!("Invalid date '{}'. Use YYYY-MM-DD or YYYY-MM", s))
}

/// Parse boolean argument with flexible input
pub fn parse_bool_arg(s: &str) -> Result<bool, String> {
    match s.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" | "enable" | "enabled" => Ok(true),
        "false" | "no" | "off" | "0" | "disable" | "disabled" => Ok(false),
        _ => Err(format!(
            "Invalid boolean value '{}'. Use: true/false, yes/no, on/off, 1/0",
            s
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use wattboard_types::ymd;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_meters_with_filters() {
        let cli = Cli::try_parse_from([
            "wattboard",
            "--demo",
            "meters",
            "-i",
            "1",
            "--from",
            "2024-01-01",
            "--to",
            "2024-01",
            "-p",
            "2",
        ])
        .unwrap();
        assert!(cli.demo);
        match cli.command {
            Commands::Meters { filters, page, .. } => {
                assert_eq!(filters.institution.institution.as_deref(), Some("1"));
                assert_eq!(filters.from, ymd(2024, 1, 1));
                assert_eq!(filters.to, ymd(2024, 1, 1));
                assert_eq!(page.page, 2);
            }
            _ => panic!("expected meters"),
        }
    }

    #[test]
    fn test_invalid_date_is_rejected() {
        let result = Cli::try_parse_from(["wattboard", "meters", "--from", "yesterday"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_bool_arg() {
        assert_eq!(parse_bool_arg("Yes"), Ok(true));
        assert_eq!(parse_bool_arg("off"), Ok(false));
        assert!(parse_bool_arg("maybe").is_err());
    }

    #[test]
    fn test_output_format_from_config() {
        assert_eq!(OutputFormat::from_config("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_config("xml"), None);
    }
}
