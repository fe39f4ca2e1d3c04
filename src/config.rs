use serde::{Deserialize, Serialize};
use std::{
    fs::{read_to_string, write},
    path::PathBuf,
};

use crate::{error::CacheError, sorting::SortOrder};

const CACHE_TABLE: &str = "cache";

/// Settings a host application may persist for its page caches.
///
/// ```toml
/// [cache]
/// debug = true
/// sort-order = "created-when"
/// default-highlight-color = "yellow"
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CacheConfig {
    /// Log cache anomalies at warn rather than debug level
    pub debug: bool,
    pub sort_order: SortOrder,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_highlight_color: Option<String>,
}

pub trait CacheConfigProvider: Send + Sync {
    fn get_config(&self) -> Result<CacheConfig, CacheError>;
    fn set_config(&self, config: &CacheConfig) -> Result<(), CacheError>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TomlConfigProvider {
    path: PathBuf,
}

impl TomlConfigProvider {
    pub fn new(path: PathBuf) -> Self {
        TomlConfigProvider { path }
    }

    fn read_table(&self) -> Result<toml::Table, CacheError> {
        if !self.path.exists() {
            return Ok(toml::Table::new());
        }
        let content = read_to_string(&self.path)?;
        Ok(toml::from_str(&content)?)
    }
}

impl CacheConfigProvider for TomlConfigProvider {
    fn get_config(&self) -> Result<CacheConfig, CacheError> {
        tracing::debug!("Attempting to read cache config from: {:?}", &self.path);
        if !self.path.exists() {
            tracing::debug!("Config file not found, using default cache config.");
            return Ok(CacheConfig::default());
        }
        match self.read_table()?.remove(CACHE_TABLE) {
            Some(table) => Ok(table.try_into()?),
            None => {
                tracing::debug!("No [{CACHE_TABLE}] table in config, using defaults.");
                Ok(CacheConfig::default())
            }
        }
    }

    /// Rewrites the `[cache]` table, leaving any other tables in the file alone.
    fn set_config(&self, config: &CacheConfig) -> Result<(), CacheError> {
        tracing::debug!("Attempting to write cache config to: {:?}", &self.path);
        let mut table = self.read_table()?;
        table.insert(CACHE_TABLE.to_string(), toml::Value::try_from(config)?);
        let toml_string = toml::to_string(&table)?;
        write(&self.path, toml_string)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let provider = TomlConfigProvider::new(dir.path().join("absent.toml"));
        assert_eq!(provider.get_config().unwrap(), CacheConfig::default());
    }

    #[test]
    fn reads_cache_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[cache]\ndebug = true\nsort-order = \"last-edited\"\n\n[other]\nkeep = 1\n",
        )
        .unwrap();

        let config = TomlConfigProvider::new(path).get_config().unwrap();
        assert!(config.debug);
        assert_eq!(config.sort_order, SortOrder::LastEdited);
        assert_eq!(config.default_highlight_color, None);
    }

    #[test]
    fn set_config_preserves_other_tables() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[other]\nkeep = 1\n").unwrap();
        let provider = TomlConfigProvider::new(path.clone());

        let config = CacheConfig {
            debug: false,
            sort_order: SortOrder::CreatedWhen,
            default_highlight_color: Some("yellow".to_string()),
        };
        provider.set_config(&config).unwrap();
        assert_eq!(provider.get_config().unwrap(), config);

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("[other]"));
        assert!(written.contains("sort-order = \"created-when\""));
    }

    #[test]
    fn malformed_file_is_a_serialization_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[cache]\nsort-order = \"sideways\"\n").unwrap();
        assert!(matches!(
            TomlConfigProvider::new(path).get_config(),
            Err(CacheError::Serialization(_))
        ));
    }
}
