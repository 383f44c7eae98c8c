//! Configuration file commands.

use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::cli::{ConfigAction, ConfigKey};
use crate::config::Config;
use crate::format::FormatOptions;
use crate::style;

/// Run a `config` subcommand against the file at `path` and return what
/// should be printed.
pub fn cmd_config(action: ConfigAction, path: &Path, opts: &FormatOptions) -> Result<String> {
    match action {
        ConfigAction::Show => {
            let mut config = Config::load_from(path);
            if config.token.is_some() {
                config.token = Some("(set)".to_string());
            }
            let body = toml::to_string_pretty(&config).context("Failed to serialize config")?;
            let header = if path.exists() {
                format!("# {}\n", path.display())
            } else {
                format!("# {} (not created yet, showing defaults)\n", path.display())
            };
            Ok(format!("{}{}", header, body))
        }
        ConfigAction::Get { key } => {
            let config = Config::load_from(path);
            Ok(format!(
                "{}\n",
                config.get(key).unwrap_or_else(|| "(not set)".to_string())
            ))
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load_from(path);
            config.set(key, &value)?;
            config.save_to(path)?;
            let shown = if key == ConfigKey::Token {
                "(set)".to_string()
            } else {
                config.get(key).unwrap_or_default()
            };
            Ok(format!(
                "{}\n",
                style::format_success(&format!("{} = {}", key_name(key), shown), opts.no_color)
            ))
        }
        ConfigAction::Unset { key } => {
            let mut config = Config::load_from(path);
            config.unset(key);
            config.save_to(path)?;
            Ok(format!(
                "{}\n",
                style::format_success(&format!("{} unset", key_name(key)), opts.no_color)
            ))
        }
        ConfigAction::Path => Ok(format!("{}\n", path.display())),
        ConfigAction::Init => {
            if path.exists() {
                bail!(
                    "Config file already exists at {}. Use 'wattboard config set' to change it.",
                    path.display()
                );
            }
            Config::default().save_to(path)?;
            Ok(format!(
                "{}\n",
                style::format_success(
                    &format!("Created config file at {}", path.display()),
                    opts.no_color
                )
            ))
        }
    }
}

fn key_name(key: ConfigKey) -> &'static str {
    match key {
        ConfigKey::BaseUrl => "base-url",
        ConfigKey::Token => "token",
        ConfigKey::Institution => "institution",
        ConfigKey::PageSize => "page-size",
        ConfigKey::DebounceMs => "debounce-ms",
        ConfigKey::Format => "format",
        ConfigKey::NoColor => "no-color",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> FormatOptions {
        FormatOptions::new(true, crate::cli::StyleMode::Plain)
    }

    #[test]
    fn test_set_get_unset_round() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let out = cmd_config(
            ConfigAction::Set {
                key: ConfigKey::BaseUrl,
                value: "https://api.example.org/".to_string(),
            },
            &path,
            &opts(),
        )
        .unwrap();
        assert_eq!(out, "[OK] base-url = https://api.example.org\n");

        let out = cmd_config(ConfigAction::Get { key: ConfigKey::BaseUrl }, &path, &opts()).unwrap();
        assert_eq!(out, "https://api.example.org\n");

        cmd_config(ConfigAction::Unset { key: ConfigKey::BaseUrl }, &path, &opts()).unwrap();
        let out = cmd_config(ConfigAction::Get { key: ConfigKey::BaseUrl }, &path, &opts()).unwrap();
        assert_eq!(out, "(not set)\n");
    }

    #[test]
    fn test_show_masks_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        cmd_config(
            ConfigAction::Set {
                key: ConfigKey::Token,
                value: "s3cret".to_string(),
            },
            &path,
            &opts(),
        )
        .unwrap();

        let out = cmd_config(ConfigAction::Show, &path, &opts()).unwrap();
        assert!(out.contains("token = \"(set)\""));
        assert!(!out.contains("s3cret"));
        assert!(std::fs::read_to_string(&path).unwrap().contains("s3cret"));
    }

    #[test]
    fn test_invalid_value_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let err = cmd_config(
            ConfigAction::Set {
                key: ConfigKey::PageSize,
                value: "0".to_string(),
            },
            &path,
            &opts(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("page size"));
        assert!(!path.exists());
    }

    #[test]
    fn test_init_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        cmd_config(ConfigAction::Init, &path, &opts()).unwrap();
        assert!(path.exists());
        assert!(cmd_config(ConfigAction::Init, &path, &opts()).is_err());
    }

    #[test]
    fn test_path_and_show_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let out = cmd_config(ConfigAction::Path, &path, &opts()).unwrap();
        assert_eq!(out.trim(), path.display().to_string());

        let out = cmd_config(ConfigAction::Show, &path, &opts()).unwrap();
        assert!(out.contains("not created yet"));
        assert!(out.contains("no_color = false"));
    }
}
