//! Project operations.

use serde::Deserialize;
use surrealdb::{Connection, Surreal};
use tenantry_core::command::{ProjectCommand, ProjectCommandHandler};
use tenantry_core::error::{TenantryError, TenantryResult, ValidationError};
use tenantry_core::event::Editor;
use tenantry_core::models::project::{CreateProject, Project, UpdateProject};
use tenantry_core::publisher::{EventBuffer, EventPublisher};
use tenantry_core::repository::{
    ListOptions, OrganizationRepository, PaginatedResult, ProjectRepository,
};
use tenantry_db::repository::{SurrealOrganizationStorage, SurrealProjectStorage};
use tenantry_db::run_in_transaction;
use tracing::info;
use uuid::Uuid;

use crate::config::ServiceConfig;
use crate::events::deliver;
use crate::listing::{PageRequest, resolve_page};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectOrderBy {
    #[default]
    Default,
    Name,
    UrlCode,
    CreatedAt,
    UpdatedAt,
}

impl ProjectOrderBy {
    fn column(&self) -> &'static str {
        match self {
            Self::Default | Self::Name => "name",
            Self::UrlCode => "url_code",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListProjectsRequest {
    pub page: PageRequest,
    pub order_by: ProjectOrderBy,
    pub organization_ids: Vec<Uuid>,
    pub disabled: Option<bool>,
}

pub struct ProjectService<C: Connection, P: EventPublisher> {
    db: Surreal<C>,
    publisher: P,
    config: ServiceConfig,
}

impl<C: Connection, P: EventPublisher> ProjectService<C, P> {
    pub fn new(db: Surreal<C>, publisher: P, config: ServiceConfig) -> Self {
        Self {
            db,
            publisher,
            config,
        }
    }

    /// Creates a project in an existing organization.
    pub async fn create(&self, editor: &Editor, input: CreateProject) -> TenantryResult<Project> {
        let mut project = Project::new(input)?;

        let buffer = &EventBuffer::new();
        let project = run_in_transaction(&self.db, |tx| async move {
            SurrealOrganizationStorage::new(&tx)
                .get(project.organization_id)
                .await?;

            ProjectCommandHandler::new(editor, &mut project, buffer)
                .handle(ProjectCommand::Create)?;
            SurrealProjectStorage::new(&tx).create(&project).await?;

            Ok::<_, TenantryError>(project)
        })
        .await?;
        deliver(&self.publisher, buffer).await?;

        info!(
            project_id = %project.id,
            organization_id = %project.organization_id,
            url_code = %project.url_code,
            "Project created"
        );
        Ok(project)
    }

    pub async fn get(&self, id: Uuid) -> TenantryResult<Project> {
        SurrealProjectStorage::new(&self.db).get(id).await
    }

    pub async fn get_by_url_code(
        &self,
        organization_id: Uuid,
        url_code: &str,
    ) -> TenantryResult<Project> {
        SurrealProjectStorage::new(&self.db)
            .get_by_url_code(organization_id, url_code)
            .await
    }

    pub async fn list(
        &self,
        request: &ListProjectsRequest,
    ) -> TenantryResult<PaginatedResult<Project>> {
        let (page_size, cursor) = resolve_page(&self.config, &request.page)?;

        let mut options = ListOptions::new();
        if !request.organization_ids.is_empty() {
            options = options.in_list(
                "organization_id",
                request.organization_ids.iter().map(Uuid::to_string),
            );
        }
        if let Some(disabled) = request.disabled {
            options = options.eq("disabled", disabled);
        }
        let options = options
            .search(&["name", "url_code"], &request.page.search_keyword)
            .order_by(request.order_by.column(), request.page.direction)
            .page(page_size, cursor);

        SurrealProjectStorage::new(&self.db).list(&options).await
    }

    pub async fn update(
        &self,
        editor: &Editor,
        id: Uuid,
        input: UpdateProject,
    ) -> TenantryResult<Project> {
        self.apply(editor, id, ProjectCommand::Update(input)).await
    }

    pub async fn enable(&self, editor: &Editor, id: Uuid) -> TenantryResult<Project> {
        self.apply(editor, id, ProjectCommand::Enable).await
    }

    pub async fn disable(&self, editor: &Editor, id: Uuid) -> TenantryResult<Project> {
        self.apply(editor, id, ProjectCommand::Disable).await
    }

    pub async fn convert_trial(&self, editor: &Editor, id: Uuid) -> TenantryResult<Project> {
        self.apply(editor, id, ProjectCommand::ConvertTrial).await
    }

    pub async fn handle(
        &self,
        editor: &Editor,
        id: Uuid,
        kind: &str,
        payload: serde_json::Value,
    ) -> TenantryResult<Project> {
        let command = ProjectCommand::decode(kind, payload)?;
        self.apply(editor, id, command).await
    }

    async fn apply(
        &self,
        editor: &Editor,
        id: Uuid,
        command: ProjectCommand,
    ) -> TenantryResult<Project> {
        if command == ProjectCommand::Create {
            return Err(ValidationError::MalformedCommand {
                kind: command.kind().into(),
                reason: "projects are created through create".into(),
            }
            .into());
        }
        command.validate()?;
        let kind = command.kind();

        let buffer = &EventBuffer::new();
        let project = run_in_transaction(&self.db, |tx| async move {
            let storage = SurrealProjectStorage::new(&tx);
            let mut project = storage.get(id).await?;

            ProjectCommandHandler::new(editor, &mut project, buffer)
                .handle(command)?;
            storage.update(&project).await?;

            Ok::<_, TenantryError>(project)
        })
        .await?;
        deliver(&self.publisher, buffer).await?;

        info!(project_id = %id, command = kind, "Project updated");
        Ok(project)
    }
}
