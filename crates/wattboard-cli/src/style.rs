//! Visual styling utilities for the CLI.
//!
//! Spinners for fetches, table styles per [`StyleMode`], and the small
//! message prefixes shared by every command.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

use crate::cli::StyleMode;

/// Standard spinner tick characters (Braille dots animation)
const SPINNER_TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Standard spinner tick interval
const SPINNER_TICK_MS: u64 = 80;

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars(SPINNER_TICK_CHARS)
}

/// Create a spinner shown while a fetch is in flight.
pub fn loading_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(spinner_style());
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
    pb
}

/// Format a success message.
pub fn format_success(message: &str, no_color: bool) -> String {
    if no_color {
        format!("[OK] {}", message)
    } else {
        format!("{} {}", "[OK]".green(), message)
    }
}

/// Format an info message.
pub fn format_info(message: &str, no_color: bool) -> String {
    if no_color {
        format!("[--] {}", message)
    } else {
        format!("{} {}", "[--]".cyan(), message)
    }
}

/// Format a warning message.
pub fn format_warning(message: &str, no_color: bool) -> String {
    if no_color {
        format!("[!!] {}", message)
    } else {
        format!("{} {}", "[!!]".yellow(), message)
    }
}

/// Format a title header.
pub fn format_title(title: &str, no_color: bool) -> String {
    let rule = "━".repeat(title.chars().count());
    if no_color {
        format!("{}\n{}", title, rule)
    } else {
        format!("{}\n{}", title.bold(), rule.dimmed())
    }
}

/// Apply table style based on StyleMode.
pub fn apply_table_style(table: &mut tabled::Table, style: StyleMode) {
    use tabled::settings::Style;
    match style {
        StyleMode::Rich => {
            table.with(Style::rounded());
        }
        StyleMode::Minimal => {
            table.with(Style::psql());
        }
        StyleMode::Plain => {
            table.with(Style::blank());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_without_color() {
        assert_eq!(format_success("saved", true), "[OK] saved");
        assert_eq!(format_info("note", true), "[--] note");
        assert_eq!(format_warning("careful", true), "[!!] careful");
    }

    #[test]
    fn test_colored_messages_keep_text() {
        assert!(format_success("saved", false).contains("saved"));
        assert!(format_warning("careful", false).contains("[!!]"));
    }

    #[test]
    fn test_title_rule_matches_width() {
        assert_eq!(format_title("Meters", true), "Meters\n━━━━━━");
    }

    fn table() -> tabled::Table {
        let mut builder = tabled::builder::Builder::default();
        builder.push_record(["a", "b"]);
        builder.build()
    }

    #[test]
    fn test_table_styles() {
        let mut plain = table();
        apply_table_style(&mut plain, StyleMode::Plain);
        assert!(!plain.to_string().contains('│'));

        let mut rich = table();
        apply_table_style(&mut rich, StyleMode::Rich);
        assert!(rich.to_string().contains('╭'));
    }
}
