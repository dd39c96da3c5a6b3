//! Organization-scoped account records.

use surrealdb_types::SurrealValue;
use tenantry_core::error::TenantryResult;
use tenantry_core::models::account::Account;
use uuid::Uuid;

use super::{CountRow, parse_uuid};
use crate::error::DbError;
use crate::transaction::{QueryExecutor, Statement};

#[derive(Debug, SurrealValue)]
struct AccountRow {
    email: String,
    organization_id: String,
    name: String,
    created_at: i64,
}

pub struct SurrealAccountStorage<'a, E: QueryExecutor> {
    executor: &'a E,
}

impl<'a, E: QueryExecutor> SurrealAccountStorage<'a, E> {
    pub fn new(executor: &'a E) -> Self {
        Self { executor }
    }

    pub async fn create(&self, account: &Account) -> TenantryResult<()> {
        let statement = Statement::new(
            "account",
            "CREATE account SET organization_id = $organization_id, \
             email = $email, name = $name, created_at = $created_at",
        )
        .bind("organization_id", account.organization_id.to_string())
        .bind("email", account.email.as_str())
        .bind("name", account.name.as_str())
        .bind("created_at", account.created_at);
        self.executor.execute(statement).await?;
        Ok(())
    }

    pub async fn list_by_organization(
        &self,
        organization_id: Uuid,
    ) -> TenantryResult<Vec<Account>> {
        let mut result = self
            .executor
            .client()
            .query(
                "SELECT * FROM account WHERE organization_id = $organization_id \
                 ORDER BY email ASC",
            )
            .bind(("organization_id", organization_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<AccountRow> = result.take(0).map_err(DbError::from)?;
        let accounts = rows
            .into_iter()
            .map(|row| {
                Ok(Account {
                    email: row.email,
                    organization_id: parse_uuid("organization", &row.organization_id)?,
                    name: row.name,
                    created_at: row.created_at,
                })
            })
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(accounts)
    }

    pub async fn count_by_organization(&self, organization_id: Uuid) -> TenantryResult<u64> {
        let mut result = self
            .executor
            .client()
            .query(
                "SELECT count() AS total FROM account \
                 WHERE organization_id = $organization_id GROUP ALL",
            )
            .bind(("organization_id", organization_id.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }

    pub async fn delete_by_organization(&self, organization_id: Uuid) -> TenantryResult<()> {
        let statement = Statement::new(
            "account",
            "DELETE account WHERE organization_id = $organization_id",
        )
        .bind("organization_id", organization_id.to_string());
        self.executor.execute(statement).await?;
        Ok(())
    }
}
