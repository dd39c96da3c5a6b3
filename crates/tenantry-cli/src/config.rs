//! Configuration file loading.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tenantry_db::DbConfig;
use tenantry_service::ServiceConfig;

use crate::error::CliError;

pub const DEFAULT_LOG_FILTER: &str = "tenantry=info";

/// Contents of the TOML config file. Every section is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub db: DbConfig,
    pub service: ServiceConfig,
    /// `EnvFilter` directives, e.g. `tenantry_db=debug,info`.
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db: DbConfig::default(),
            service: ServiceConfig::default(),
            log_filter: DEFAULT_LOG_FILTER.into(),
        }
    }
}

impl AppConfig {
    /// Reads `path`, or returns the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, CliError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = fs::read_to_string(path).map_err(|source| CliError::ReadConfig {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, CliError> {
        Ok(toml::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenantry_core::models::deletion::DeletableTable;

    #[test]
    fn empty_file_yields_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
        assert_eq!(config.db.namespace, "tenantry");
        assert_eq!(config.service.max_page_size, 500);
    }

    #[test]
    fn sections_override_individual_fields() {
        let config = AppConfig::from_toml(
            r#"
            log_filter = "debug"

            [db]
            url = "mem://"
            username = ""

            [service]
            default_project_url_code = "main"
            protected_tables = ["experiment", "flag_trigger"]
            "#,
        )
        .unwrap();
        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.db.url, "mem://");
        assert_eq!(config.db.database, "main");
        assert!(config.db.username.is_empty());
        assert_eq!(config.service.default_project_url_code, "main");
        assert_eq!(config.service.default_page_size, 50);
        assert_eq!(
            config.service.protected_tables,
            vec![DeletableTable::Experiment, DeletableTable::FlagTrigger]
        );
    }

    #[test]
    fn unknown_table_names_are_rejected() {
        let err =
            AppConfig::from_toml("[service]\nprotected_tables = [\"environment\"]").unwrap_err();
        assert!(matches!(err, CliError::ParseConfig(_)));
    }
}
