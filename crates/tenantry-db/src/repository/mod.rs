//! SurrealDB storage implementations.
//!
//! Every storage borrows a [`QueryExecutor`](crate::transaction::QueryExecutor):
//! the database handle for standalone calls or a
//! [`Transaction`](crate::transaction::Transaction) inside
//! `run_in_transaction`.

mod account;
mod environment;
mod environment_data;
mod organization;
mod project;

pub use account::SurrealAccountStorage;
pub use environment::SurrealEnvironmentStorage;
pub use environment_data::SurrealEnvironmentDataStorage;
pub use organization::SurrealOrganizationStorage;
pub use project::SurrealProjectStorage;

use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

fn parse_uuid(field: &str, value: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(value).map_err(|e| DbError::Decode(format!("invalid {field} UUID: {e}")))
}
