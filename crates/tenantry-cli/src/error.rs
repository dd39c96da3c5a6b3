//! Operator binary error types.

use tenantry_core::error::TenantryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("cannot read config file '{path}': {source}")]
    ReadConfig {
        path: String,
        source: std::io::Error,
    },

    #[error("cannot parse config: {0}")]
    ParseConfig(#[from] toml::de::Error),

    #[error("invalid log filter: {0}")]
    LogFilter(String),

    #[error("database connection failed: {0}")]
    Connect(#[from] surrealdb::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] tenantry_db::DbError),

    #[error("{status}: {0}", status = .0.status().as_str())]
    Operation(#[from] TenantryError),

    #[error("cannot encode output: {0}")]
    Output(#[from] serde_json::Error),
}
