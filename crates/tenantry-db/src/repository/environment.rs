//! SurrealDB implementation of [`EnvironmentRepository`].
//!
//! Reads project the number of `feature` rows scoped to each environment
//! into `feature_flag_count`.

use surrealdb_types::SurrealValue;
use tenantry_core::error::{TenantryError, TenantryResult};
use tenantry_core::models::environment::{AutoArchive, Environment};
use tenantry_core::repository::{EnvironmentRepository, ListOptions, PaginatedResult};
use uuid::Uuid;

use super::{CountRow, parse_uuid};
use crate::error::DbError;
use crate::query::{build_count, build_select};
use crate::transaction::{QueryExecutor, Statement};

const PROJECTION: &str = "\
SELECT meta::id(id) AS record_id, *, \
array::len((SELECT VALUE id FROM feature \
WHERE environment_id = meta::id($parent.id))) AS feature_flag_count";

const INSERT_ENVIRONMENT: &str = "\
CREATE type::record('environment', $id) SET \
project_id = $project_id, organization_id = $organization_id, \
name = $name, url_code = $url_code, description = $description, \
archived = $archived, require_comment = $require_comment, \
auto_archive = $auto_archive, created_at = $created_at, \
updated_at = $updated_at";

const UPDATE_ENVIRONMENT: &str = "\
UPDATE type::record('environment', $id) SET \
name = $name, url_code = $url_code, description = $description, \
archived = $archived, require_comment = $require_comment, \
auto_archive = $auto_archive, updated_at = $updated_at RETURN AFTER";

const DELETE_ENVIRONMENT: &str = "DELETE type::record('environment', $id) RETURN BEFORE";

#[derive(Debug, SurrealValue)]
struct EnvironmentRow {
    record_id: String,
    project_id: String,
    organization_id: String,
    name: String,
    url_code: String,
    description: String,
    archived: bool,
    require_comment: bool,
    auto_archive: serde_json::Value,
    feature_flag_count: u64,
    created_at: i64,
    updated_at: i64,
}

impl EnvironmentRow {
    fn try_into_environment(self) -> Result<Environment, DbError> {
        let auto_archive: AutoArchive = serde_json::from_value(self.auto_archive)
            .map_err(|e| DbError::Decode(format!("invalid auto_archive: {e}")))?;
        Ok(Environment {
            id: parse_uuid("environment", &self.record_id)?,
            project_id: parse_uuid("project", &self.project_id)?,
            organization_id: parse_uuid("organization", &self.organization_id)?,
            name: self.name,
            url_code: self.url_code,
            description: self.description,
            archived: self.archived,
            require_comment: self.require_comment,
            auto_archive,
            feature_flag_count: self.feature_flag_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn auto_archive_value(settings: &AutoArchive) -> serde_json::Value {
    serde_json::json!({
        "enabled": settings.enabled,
        "unused_days": settings.unused_days,
        "check_code_refs": settings.check_code_refs,
    })
}

/// Environment storage over any [`QueryExecutor`].
pub struct SurrealEnvironmentStorage<'a, E: QueryExecutor> {
    executor: &'a E,
}

impl<'a, E: QueryExecutor> SurrealEnvironmentStorage<'a, E> {
    pub fn new(executor: &'a E) -> Self {
        Self { executor }
    }

    /// Removes the environment row. A missing row fails the whole batch
    /// with `NotFound`.
    pub async fn delete(&self, id: Uuid) -> TenantryResult<()> {
        let statement = Statement::new("environment", DELETE_ENVIRONMENT)
            .bind("id", id.to_string())
            .must_exist(id);
        self.executor.execute(statement).await?;
        Ok(())
    }

    async fn fetch(
        &self,
        text: &str,
        binds: Vec<(String, serde_json::Value)>,
    ) -> TenantryResult<Vec<Environment>> {
        let mut query = self.executor.client().query(text);
        for bind in binds {
            query = query.bind(bind);
        }
        let mut result = query.await.map_err(DbError::from)?;
        let rows: Vec<EnvironmentRow> = result.take(0).map_err(DbError::from)?;
        let environments = rows
            .into_iter()
            .map(EnvironmentRow::try_into_environment)
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(environments)
    }
}

impl<E: QueryExecutor> EnvironmentRepository for SurrealEnvironmentStorage<'_, E> {
    async fn create(&self, environment: &Environment) -> TenantryResult<()> {
        let statement = Statement::new("environment", INSERT_ENVIRONMENT)
            .bind("id", environment.id.to_string())
            .bind("project_id", environment.project_id.to_string())
            .bind("organization_id", environment.organization_id.to_string())
            .bind("name", environment.name.as_str())
            .bind("url_code", environment.url_code.as_str())
            .bind("description", environment.description.as_str())
            .bind("archived", environment.archived)
            .bind("require_comment", environment.require_comment)
            .bind("auto_archive", auto_archive_value(&environment.auto_archive))
            .bind("created_at", environment.created_at)
            .bind("updated_at", environment.updated_at);
        self.executor.execute(statement).await?;
        Ok(())
    }

    async fn update(&self, environment: &Environment) -> TenantryResult<()> {
        let statement = Statement::new("environment", UPDATE_ENVIRONMENT)
            .bind("id", environment.id.to_string())
            .bind("name", environment.name.as_str())
            .bind("url_code", environment.url_code.as_str())
            .bind("description", environment.description.as_str())
            .bind("archived", environment.archived)
            .bind("require_comment", environment.require_comment)
            .bind("auto_archive", auto_archive_value(&environment.auto_archive))
            .bind("updated_at", environment.updated_at)
            .expect_one(environment.id);
        self.executor.execute(statement).await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> TenantryResult<Environment> {
        self.fetch(
            &format!("{PROJECTION} FROM type::record('environment', $id)"),
            vec![("id".into(), id.to_string().into())],
        )
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| TenantryError::not_found("environment", id))
    }

    async fn get_by_url_code(
        &self,
        project_id: Uuid,
        url_code: &str,
    ) -> TenantryResult<Environment> {
        self.fetch(
            &format!(
                "{PROJECTION} FROM environment \
                 WHERE project_id = $project_id AND url_code = $url_code"
            ),
            vec![
                ("project_id".into(), project_id.to_string().into()),
                ("url_code".into(), url_code.into()),
            ],
        )
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| TenantryError::not_found("environment", format!("url_code={url_code}")))
    }

    async fn list(&self, options: &ListOptions) -> TenantryResult<PaginatedResult<Environment>> {
        let total = self.count(options).await?;
        let select = build_select(&format!("{PROJECTION} FROM environment"), options)?;
        let items = self.fetch(&select.text, select.binds).await?;
        Ok(PaginatedResult::new(items, total, options.offset))
    }

    async fn count(&self, options: &ListOptions) -> TenantryResult<u64> {
        let count = build_count("environment", options)?;
        let mut query = self.executor.client().query(&count.text);
        for bind in count.binds {
            query = query.bind(bind);
        }
        let mut result = query.await.map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }
}
