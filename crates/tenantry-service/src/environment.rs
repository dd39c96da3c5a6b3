//! Environment operations.

use serde::Deserialize;
use surrealdb::{Connection, Surreal};
use tenantry_core::command::{EnvironmentCommand, EnvironmentCommandHandler};
use tenantry_core::error::{PreconditionError, TenantryError, TenantryResult, ValidationError};
use tenantry_core::event::Editor;
use tenantry_core::models::environment::{CreateEnvironment, Environment, UpdateEnvironment};
use tenantry_core::publisher::{EventBuffer, EventPublisher};
use tenantry_core::repository::{
    EnvironmentRepository, ListOptions, PaginatedResult, ProjectRepository,
};
use tenantry_db::repository::{SurrealEnvironmentStorage, SurrealProjectStorage};
use tenantry_db::run_in_transaction;
use tracing::info;
use uuid::Uuid;

use crate::config::ServiceConfig;
use crate::events::deliver;
use crate::listing::{PageRequest, resolve_page};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentOrderBy {
    #[default]
    Default,
    Name,
    UrlCode,
    FeatureFlagCount,
    CreatedAt,
    UpdatedAt,
}

impl EnvironmentOrderBy {
    fn column(&self) -> &'static str {
        match self {
            Self::Default | Self::Name => "name",
            Self::UrlCode => "url_code",
            Self::FeatureFlagCount => "feature_flag_count",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListEnvironmentsRequest {
    pub page: PageRequest,
    pub order_by: EnvironmentOrderBy,
    pub project_ids: Vec<Uuid>,
    pub organization_id: Option<Uuid>,
    pub archived: Option<bool>,
}

pub struct EnvironmentService<C: Connection, P: EventPublisher> {
    db: Surreal<C>,
    publisher: P,
    config: ServiceConfig,
}

impl<C: Connection, P: EventPublisher> EnvironmentService<C, P> {
    pub fn new(db: Surreal<C>, publisher: P, config: ServiceConfig) -> Self {
        Self {
            db,
            publisher,
            config,
        }
    }

    /// Creates an environment in an enabled project. The organization is
    /// taken from the project.
    pub async fn create(
        &self,
        editor: &Editor,
        input: CreateEnvironment,
    ) -> TenantryResult<Environment> {
        input.validate()?;

        let buffer = &EventBuffer::new();
        let environment = run_in_transaction(&self.db, |tx| async move {
            let project = SurrealProjectStorage::new(&tx).get(input.project_id).await?;
            if project.disabled {
                return Err(PreconditionError::ProjectDisabled.into());
            }
            let mut environment = Environment::new(input, project.organization_id)?;

            EnvironmentCommandHandler::new(editor, &mut environment, buffer)
                .handle(EnvironmentCommand::Create)?;
            SurrealEnvironmentStorage::new(&tx).create(&environment).await?;

            Ok::<_, TenantryError>(environment)
        })
        .await?;
        deliver(&self.publisher, buffer).await?;

        info!(
            environment_id = %environment.id,
            project_id = %environment.project_id,
            url_code = %environment.url_code,
            "Environment created"
        );
        Ok(environment)
    }

    pub async fn get(&self, id: Uuid) -> TenantryResult<Environment> {
        SurrealEnvironmentStorage::new(&self.db).get(id).await
    }

    pub async fn get_by_url_code(
        &self,
        project_id: Uuid,
        url_code: &str,
    ) -> TenantryResult<Environment> {
        SurrealEnvironmentStorage::new(&self.db)
            .get_by_url_code(project_id, url_code)
            .await
    }

    pub async fn list(
        &self,
        request: &ListEnvironmentsRequest,
    ) -> TenantryResult<PaginatedResult<Environment>> {
        let (page_size, cursor) = resolve_page(&self.config, &request.page)?;

        let mut options = ListOptions::new();
        if !request.project_ids.is_empty() {
            options =
                options.in_list("project_id", request.project_ids.iter().map(Uuid::to_string));
        }
        if let Some(organization_id) = request.organization_id {
            options = options.eq("organization_id", organization_id.to_string());
        }
        if let Some(archived) = request.archived {
            options = options.eq("archived", archived);
        }
        let options = options
            .search(&["name", "url_code", "description"], &request.page.search_keyword)
            .order_by(request.order_by.column(), request.page.direction)
            .page(page_size, cursor);

        SurrealEnvironmentStorage::new(&self.db).list(&options).await
    }

    pub async fn update(
        &self,
        editor: &Editor,
        id: Uuid,
        input: UpdateEnvironment,
    ) -> TenantryResult<Environment> {
        self.apply(editor, id, EnvironmentCommand::Update(input)).await
    }

    pub async fn archive(&self, editor: &Editor, id: Uuid) -> TenantryResult<Environment> {
        self.apply(editor, id, EnvironmentCommand::Archive).await
    }

    pub async fn unarchive(&self, editor: &Editor, id: Uuid) -> TenantryResult<Environment> {
        self.apply(editor, id, EnvironmentCommand::Unarchive).await
    }

    pub async fn handle(
        &self,
        editor: &Editor,
        id: Uuid,
        kind: &str,
        payload: serde_json::Value,
    ) -> TenantryResult<Environment> {
        let command = EnvironmentCommand::decode(kind, payload)?;
        self.apply(editor, id, command).await
    }

    async fn apply(
        &self,
        editor: &Editor,
        id: Uuid,
        command: EnvironmentCommand,
    ) -> TenantryResult<Environment> {
        if command == EnvironmentCommand::Create {
            return Err(ValidationError::MalformedCommand {
                kind: command.kind().into(),
                reason: "environments are created through create".into(),
            }
            .into());
        }
        command.validate()?;
        let kind = command.kind();

        let buffer = &EventBuffer::new();
        let environment = run_in_transaction(&self.db, |tx| async move {
            let storage = SurrealEnvironmentStorage::new(&tx);
            let mut environment = storage.get(id).await?;

            EnvironmentCommandHandler::new(editor, &mut environment, buffer)
                .handle(command)?;
            storage.update(&environment).await?;

            Ok::<_, TenantryError>(environment)
        })
        .await?;
        deliver(&self.publisher, buffer).await?;

        info!(environment_id = %id, command = kind, "Environment updated");
        Ok(environment)
    }
}
