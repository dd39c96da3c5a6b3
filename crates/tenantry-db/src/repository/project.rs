//! SurrealDB implementation of [`ProjectRepository`].

use surrealdb_types::SurrealValue;
use tenantry_core::error::{TenantryError, TenantryResult};
use tenantry_core::models::project::Project;
use tenantry_core::repository::{ListOptions, PaginatedResult, ProjectRepository};
use uuid::Uuid;

use super::{CountRow, parse_uuid};
use crate::error::DbError;
use crate::query::{build_count, build_select};
use crate::transaction::{QueryExecutor, Statement};

const SELECT_PROJECT: &str = "SELECT meta::id(id) AS record_id, * FROM project";

const INSERT_PROJECT: &str = "\
CREATE type::record('project', $id) SET \
organization_id = $organization_id, name = $name, url_code = $url_code, \
description = $description, disabled = $disabled, trial = $trial, \
creator_email = $creator_email, created_at = $created_at, \
updated_at = $updated_at";

const UPDATE_PROJECT: &str = "\
UPDATE type::record('project', $id) SET \
name = $name, url_code = $url_code, description = $description, \
disabled = $disabled, trial = $trial, updated_at = $updated_at \
RETURN AFTER";

const DELETE_PROJECTS_BY_ORGANIZATION: &str =
    "DELETE project WHERE organization_id = $organization_id";

#[derive(Debug, SurrealValue)]
struct ProjectRow {
    record_id: String,
    organization_id: String,
    name: String,
    url_code: String,
    description: String,
    disabled: bool,
    trial: bool,
    creator_email: String,
    created_at: i64,
    updated_at: i64,
}

impl ProjectRow {
    fn try_into_project(self) -> Result<Project, DbError> {
        Ok(Project {
            id: parse_uuid("project", &self.record_id)?,
            organization_id: parse_uuid("organization", &self.organization_id)?,
            name: self.name,
            url_code: self.url_code,
            description: self.description,
            disabled: self.disabled,
            trial: self.trial,
            creator_email: self.creator_email,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Project storage over any [`QueryExecutor`].
pub struct SurrealProjectStorage<'a, E: QueryExecutor> {
    executor: &'a E,
}

impl<'a, E: QueryExecutor> SurrealProjectStorage<'a, E> {
    pub fn new(executor: &'a E) -> Self {
        Self { executor }
    }

    /// Removes every project of an organization. Environments are not
    /// touched; callers delete them first.
    pub async fn delete_by_organization(&self, organization_id: Uuid) -> TenantryResult<()> {
        let statement = Statement::new("project", DELETE_PROJECTS_BY_ORGANIZATION)
            .bind("organization_id", organization_id.to_string());
        self.executor.execute(statement).await?;
        Ok(())
    }

    async fn fetch(
        &self,
        text: &str,
        binds: Vec<(String, serde_json::Value)>,
    ) -> TenantryResult<Vec<Project>> {
        let mut query = self.executor.client().query(text);
        for bind in binds {
            query = query.bind(bind);
        }
        let mut result = query.await.map_err(DbError::from)?;
        let rows: Vec<ProjectRow> = result.take(0).map_err(DbError::from)?;
        let projects = rows
            .into_iter()
            .map(ProjectRow::try_into_project)
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(projects)
    }
}

impl<E: QueryExecutor> ProjectRepository for SurrealProjectStorage<'_, E> {
    async fn create(&self, project: &Project) -> TenantryResult<()> {
        let statement = Statement::new("project", INSERT_PROJECT)
            .bind("id", project.id.to_string())
            .bind("organization_id", project.organization_id.to_string())
            .bind("name", project.name.as_str())
            .bind("url_code", project.url_code.as_str())
            .bind("description", project.description.as_str())
            .bind("disabled", project.disabled)
            .bind("trial", project.trial)
            .bind("creator_email", project.creator_email.as_str())
            .bind("created_at", project.created_at)
            .bind("updated_at", project.updated_at);
        self.executor.execute(statement).await?;
        Ok(())
    }

    async fn update(&self, project: &Project) -> TenantryResult<()> {
        let statement = Statement::new("project", UPDATE_PROJECT)
            .bind("id", project.id.to_string())
            .bind("name", project.name.as_str())
            .bind("url_code", project.url_code.as_str())
            .bind("description", project.description.as_str())
            .bind("disabled", project.disabled)
            .bind("trial", project.trial)
            .bind("updated_at", project.updated_at)
            .expect_one(project.id);
        self.executor.execute(statement).await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> TenantryResult<Project> {
        self.fetch(
            "SELECT meta::id(id) AS record_id, * FROM type::record('project', $id)",
            vec![("id".into(), id.to_string().into())],
        )
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| TenantryError::not_found("project", id))
    }

    async fn get_by_url_code(
        &self,
        organization_id: Uuid,
        url_code: &str,
    ) -> TenantryResult<Project> {
        self.fetch(
            "SELECT meta::id(id) AS record_id, * FROM project \
             WHERE organization_id = $organization_id AND url_code = $url_code",
            vec![
                ("organization_id".into(), organization_id.to_string().into()),
                ("url_code".into(), url_code.into()),
            ],
        )
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| TenantryError::not_found("project", format!("url_code={url_code}")))
    }

    async fn list(&self, options: &ListOptions) -> TenantryResult<PaginatedResult<Project>> {
        let total = self.count(options).await?;
        let select = build_select(SELECT_PROJECT, options)?;
        let items = self.fetch(&select.text, select.binds).await?;
        Ok(PaginatedResult::new(items, total, options.offset))
    }

    async fn count(&self, options: &ListOptions) -> TenantryResult<u64> {
        let count = build_count("project", options)?;
        let mut query = self.executor.client().query(&count.text);
        for bind in count.binds {
            query = query.bind(bind);
        }
        let mut result = query.await.map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }
}
