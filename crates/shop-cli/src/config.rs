//! CLI configuration.
//!
//! Read from `config/shop.toml` when present, then overridden by the
//! `SHOP_DATABASE` and `SHOP_LOG` environment variables (a `.env` file is
//! honoured), then by command-line flags.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/shop.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ShopConfig {
    pub database: DatabaseConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/shop.db"),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ShopConfig {
    /// Load the file at `path`, or defaults if it does not exist. An
    /// explicitly requested file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path, true),
            None => (Path::new(DEFAULT_CONFIG_PATH), false),
        };

        if !required && !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `SHOP_DATABASE` and `SHOP_LOG`.
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var("SHOP_DATABASE").ok(),
            std::env::var("SHOP_LOG").ok(),
        );
    }

    fn apply_overrides(&mut self, database: Option<String>, log: Option<String>) {
        if let Some(database) = database.filter(|v| !v.trim().is_empty()) {
            self.database.path = PathBuf::from(database);
        }
        if let Some(level) = log.filter(|v| !v.trim().is_empty()) {
            self.log.level = level;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        assert_eq!(ShopConfig::parse("").unwrap(), ShopConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = ShopConfig::parse("[log]\nlevel = \"debug\"\n").unwrap();
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.database.path, PathBuf::from("data/shop.db"));
    }

    #[test]
    fn overrides_win_unless_blank() {
        let mut config = ShopConfig::default();
        config.apply_overrides(Some("/tmp/other.db".into()), Some("  ".into()));
        assert_eq!(config.database.path, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn missing_default_file_is_fine_but_explicit_is_not() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(ShopConfig::load(Some(missing.as_path())).is_err());

        let present = dir.path().join("shop.toml");
        std::fs::write(&present, "[database]\npath = \"x.db\"\n").unwrap();
        let config = ShopConfig::load(Some(present.as_path())).unwrap();
        assert_eq!(config.database.path, PathBuf::from("x.db"));
    }
}
