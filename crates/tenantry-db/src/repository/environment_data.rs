//! Rows of the environment-scoped tables listed in [`DeletableTable`].
//!
//! Table names reach statement text only through
//! [`DeletableTable::as_str`]; string input is parsed into the enum first.

use std::collections::BTreeMap;

use surrealdb_types::SurrealValue;
use tenantry_core::error::TenantryResult;
use tenantry_core::models::deletion::{DeletableTable, EnvironmentRecord};
use tracing::debug;
use uuid::Uuid;

use super::{CountRow, parse_uuid};
use crate::error::DbError;
use crate::transaction::{QueryExecutor, Statement};

#[derive(Debug, SurrealValue)]
struct RecordRow {
    record_id: String,
    environment_id: String,
    name: String,
    created_at: i64,
}

pub struct SurrealEnvironmentDataStorage<'a, E: QueryExecutor> {
    executor: &'a E,
}

impl<'a, E: QueryExecutor> SurrealEnvironmentDataStorage<'a, E> {
    pub fn new(executor: &'a E) -> Self {
        Self { executor }
    }

    pub async fn insert(
        &self,
        table: DeletableTable,
        record: &EnvironmentRecord,
    ) -> TenantryResult<()> {
        let statement = Statement::new(
            table.as_str(),
            format!(
                "CREATE type::record('{table}', $id) SET \
                 environment_id = $environment_id, name = $name, created_at = $created_at"
            ),
        )
        .bind("id", record.id.as_str())
        .bind("environment_id", record.environment_id.to_string())
        .bind("name", record.name.as_str())
        .bind("created_at", record.created_at);
        self.executor.execute(statement).await?;
        Ok(())
    }

    pub async fn list_by_environment(
        &self,
        table: DeletableTable,
        environment_id: Uuid,
    ) -> TenantryResult<Vec<EnvironmentRecord>> {
        let mut result = self
            .executor
            .client()
            .query(&format!(
                "SELECT meta::id(id) AS record_id, * FROM {table} \
                 WHERE environment_id = $environment_id ORDER BY id ASC"
            ))
            .bind(("environment_id", environment_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<RecordRow> = result.take(0).map_err(DbError::from)?;
        let records = rows
            .into_iter()
            .map(|row| {
                Ok(EnvironmentRecord {
                    id: row.record_id,
                    environment_id: parse_uuid("environment", &row.environment_id)?,
                    name: row.name,
                    created_at: row.created_at,
                })
            })
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(records)
    }

    pub async fn count_by_environment(
        &self,
        table: DeletableTable,
        environment_id: Uuid,
    ) -> TenantryResult<u64> {
        let mut result = self
            .executor
            .client()
            .query(&format!(
                "SELECT count() AS total FROM {table} \
                 WHERE environment_id = $environment_id GROUP ALL"
            ))
            .bind(("environment_id", environment_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }

    /// Counts every table, zeros included.
    pub async fn count_all(
        &self,
        environment_id: Uuid,
    ) -> TenantryResult<BTreeMap<DeletableTable, u64>> {
        let mut counts = BTreeMap::new();
        for table in DeletableTable::ALL {
            let count = self.count_by_environment(table, environment_id).await?;
            debug!(%environment_id, table = table.as_str(), count, "Counted rows");
            counts.insert(table, count);
        }
        Ok(counts)
    }

    pub async fn delete_by_environment(
        &self,
        table: DeletableTable,
        environment_id: Uuid,
    ) -> TenantryResult<()> {
        let statement = Statement::new(
            table.as_str(),
            format!("DELETE {table} WHERE environment_id = $environment_id"),
        )
        .bind("environment_id", environment_id.to_string());
        self.executor.execute(statement).await?;
        Ok(())
    }

    /// Parses `table` before anything is staged; unknown names fail with
    /// `DisallowedTable`.
    pub async fn delete_by_table_name(
        &self,
        table: &str,
        environment_id: Uuid,
    ) -> TenantryResult<()> {
        let table: DeletableTable = table.parse()?;
        self.delete_by_environment(table, environment_id).await
    }
}
