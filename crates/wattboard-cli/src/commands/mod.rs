//! Command implementations for the CLI.

mod browse;
mod config;
mod indicators;
mod list;
mod overview;

pub use browse::{BrowseArgs, BrowseCommand, cmd_browse};
pub use config::cmd_config;
pub use indicators::{ViewArgs, cmd_view};
pub use list::{cmd_devices, cmd_institutions};
pub use overview::{OverviewArgs, cmd_overview};
