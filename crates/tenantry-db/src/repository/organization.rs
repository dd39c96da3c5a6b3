//! SurrealDB implementation of [`OrganizationRepository`].

use surrealdb_types::SurrealValue;
use tenantry_core::error::{TenantryError, TenantryResult};
use tenantry_core::models::organization::{AuthenticationSettings, AuthenticationType, Organization};
use tenantry_core::repository::{ListOptions, OrganizationRepository, PaginatedResult};
use uuid::Uuid;

use super::{CountRow, parse_uuid};
use crate::error::DbError;
use crate::query::{build_count, build_select};
use crate::transaction::{QueryExecutor, Statement};

const SELECT_ORGANIZATION: &str = "SELECT meta::id(id) AS record_id, * FROM organization";

const INSERT_ORGANIZATION: &str = "\
CREATE type::record('organization', $id) SET \
name = $name, url_code = $url_code, owner_email = $owner_email, \
description = $description, disabled = $disabled, archived = $archived, \
trial = $trial, system_admin = $system_admin, \
enabled_auth_types = $enabled_auth_types, \
created_at = $created_at, updated_at = $updated_at";

const UPDATE_ORGANIZATION: &str = "\
UPDATE type::record('organization', $id) SET \
name = $name, url_code = $url_code, owner_email = $owner_email, \
description = $description, disabled = $disabled, archived = $archived, \
trial = $trial, enabled_auth_types = $enabled_auth_types, \
updated_at = $updated_at RETURN AFTER";

const DELETE_ORGANIZATION: &str = "DELETE type::record('organization', $id) RETURN BEFORE";

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct OrganizationRow {
    record_id: String,
    name: String,
    url_code: String,
    owner_email: String,
    description: String,
    disabled: bool,
    archived: bool,
    trial: bool,
    system_admin: bool,
    enabled_auth_types: Vec<String>,
    created_at: i64,
    updated_at: i64,
}

impl OrganizationRow {
    fn try_into_organization(self) -> Result<Organization, DbError> {
        let auth_types = self
            .enabled_auth_types
            .iter()
            .map(|s| {
                AuthenticationType::parse(s)
                    .ok_or_else(|| DbError::Decode(format!("unknown authentication type {s}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Organization {
            id: parse_uuid("organization", &self.record_id)?,
            name: self.name,
            url_code: self.url_code,
            owner_email: self.owner_email,
            description: self.description,
            disabled: self.disabled,
            archived: self.archived,
            trial: self.trial,
            system_admin: self.system_admin,
            authentication_settings: AuthenticationSettings::new(auth_types),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn auth_types(organization: &Organization) -> Vec<&'static str> {
    organization
        .authentication_settings
        .enabled_types()
        .map(|t| t.as_str())
        .collect()
}

/// Organization storage over any [`QueryExecutor`].
pub struct SurrealOrganizationStorage<'a, E: QueryExecutor> {
    executor: &'a E,
}

impl<'a, E: QueryExecutor> SurrealOrganizationStorage<'a, E> {
    pub fn new(executor: &'a E) -> Self {
        Self { executor }
    }

    /// Removes the organization row. Fails the batch with `NotFound` when
    /// nothing matched.
    pub async fn delete(&self, id: Uuid) -> TenantryResult<()> {
        let statement = Statement::new("organization", DELETE_ORGANIZATION)
            .bind("id", id.to_string())
            .must_exist(id);
        self.executor.execute(statement).await?;
        Ok(())
    }

    async fn fetch(
        &self,
        text: &str,
        binds: Vec<(String, serde_json::Value)>,
    ) -> TenantryResult<Vec<Organization>> {
        let mut query = self.executor.client().query(text);
        for bind in binds {
            query = query.bind(bind);
        }
        let mut result = query.await.map_err(DbError::from)?;
        let rows: Vec<OrganizationRow> = result.take(0).map_err(DbError::from)?;
        let organizations = rows
            .into_iter()
            .map(OrganizationRow::try_into_organization)
            .collect::<Result<Vec<_>, DbError>>()?;
        Ok(organizations)
    }

    async fn fetch_one(
        &self,
        text: &str,
        binds: Vec<(String, serde_json::Value)>,
        not_found_id: String,
    ) -> TenantryResult<Organization> {
        self.fetch(text, binds)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| TenantryError::not_found("organization", not_found_id))
    }
}

impl<E: QueryExecutor> OrganizationRepository for SurrealOrganizationStorage<'_, E> {
    async fn create(&self, organization: &Organization) -> TenantryResult<()> {
        let statement = Statement::new("organization", INSERT_ORGANIZATION)
            .bind("id", organization.id.to_string())
            .bind("name", organization.name.as_str())
            .bind("url_code", organization.url_code.as_str())
            .bind("owner_email", organization.owner_email.as_str())
            .bind("description", organization.description.as_str())
            .bind("disabled", organization.disabled)
            .bind("archived", organization.archived)
            .bind("trial", organization.trial)
            .bind("system_admin", organization.system_admin)
            .bind("enabled_auth_types", auth_types(organization))
            .bind("created_at", organization.created_at)
            .bind("updated_at", organization.updated_at);
        self.executor.execute(statement).await?;
        Ok(())
    }

    async fn update(&self, organization: &Organization) -> TenantryResult<()> {
        let statement = Statement::new("organization", UPDATE_ORGANIZATION)
            .bind("id", organization.id.to_string())
            .bind("name", organization.name.as_str())
            .bind("url_code", organization.url_code.as_str())
            .bind("owner_email", organization.owner_email.as_str())
            .bind("description", organization.description.as_str())
            .bind("disabled", organization.disabled)
            .bind("archived", organization.archived)
            .bind("trial", organization.trial)
            .bind("enabled_auth_types", auth_types(organization))
            .bind("updated_at", organization.updated_at)
            .expect_one(organization.id);
        self.executor.execute(statement).await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> TenantryResult<Organization> {
        self.fetch_one(
            "SELECT meta::id(id) AS record_id, * FROM type::record('organization', $id)",
            vec![("id".into(), id.to_string().into())],
            id.to_string(),
        )
        .await
    }

    async fn get_by_url_code(&self, url_code: &str) -> TenantryResult<Organization> {
        self.fetch_one(
            "SELECT meta::id(id) AS record_id, * FROM organization WHERE url_code = $url_code",
            vec![("url_code".into(), url_code.into())],
            format!("url_code={url_code}"),
        )
        .await
    }

    async fn get_system_admin(&self) -> TenantryResult<Option<Organization>> {
        let organizations = self
            .fetch(
                "SELECT meta::id(id) AS record_id, * FROM organization \
                 WHERE system_admin = true LIMIT 1",
                Vec::new(),
            )
            .await?;
        Ok(organizations.into_iter().next())
    }

    async fn list(&self, options: &ListOptions) -> TenantryResult<PaginatedResult<Organization>> {
        let total = self.count(options).await?;
        let select = build_select(SELECT_ORGANIZATION, options)?;
        let items = self.fetch(&select.text, select.binds).await?;
        Ok(PaginatedResult::new(items, total, options.offset))
    }

    async fn count(&self, options: &ListOptions) -> TenantryResult<u64> {
        let count = build_count("organization", options)?;
        let mut query = self.executor.client().query(&count.text);
        for bind in count.binds {
            query = query.bind(bind);
        }
        let mut result = query.await.map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }
}
