//! Organization operations.
//!
//! Creating an organization also creates its default project in the same
//! transaction. At most one system-admin organization may exist.

use serde::Deserialize;
use surrealdb::{Connection, Surreal};
use tenantry_core::command::{
    OrganizationCommand, OrganizationCommandHandler, ProjectCommand, ProjectCommandHandler,
};
use tenantry_core::error::{TenantryError, TenantryResult, ValidationError};
use tenantry_core::event::Editor;
use tenantry_core::models::organization::{CreateOrganization, Organization, UpdateOrganization};
use tenantry_core::models::project::{CreateProject, Project};
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
pub enum OrganizationOrderBy {
    #[default]
    Default,
    Name,
    UrlCode,
    CreatedAt,
    UpdatedAt,
}

impl OrganizationOrderBy {
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
pub struct ListOrganizationsRequest {
    pub page: PageRequest,
    pub order_by: OrganizationOrderBy,
    pub disabled: Option<bool>,
    pub archived: Option<bool>,
}

pub struct OrganizationService<C: Connection, P: EventPublisher> {
    db: Surreal<C>,
    publisher: P,
    config: ServiceConfig,
}

impl<C: Connection, P: EventPublisher> OrganizationService<C, P> {
    pub fn new(db: Surreal<C>, publisher: P, config: ServiceConfig) -> Self {
        Self {
            db,
            publisher,
            config,
        }
    }

    /// Creates the organization and its default project.
    ///
    /// A second system-admin organization fails with `AlreadyExists`.
    pub async fn create(
        &self,
        editor: &Editor,
        input: CreateOrganization,
    ) -> TenantryResult<Organization> {
        let mut organization = Organization::new(input)?;
        let mut project = Project::new(CreateProject {
            organization_id: organization.id,
            name: self.config.default_project_name.clone(),
            url_code: self.config.default_project_url_code.clone(),
            description: String::new(),
            creator_email: organization.owner_email.clone(),
            trial: organization.trial,
        })?;

        let buffer = &EventBuffer::new();
        let organization = run_in_transaction(&self.db, |tx| async move {
            let organizations = SurrealOrganizationStorage::new(&tx);
            if organization.system_admin && organizations.get_system_admin().await?.is_some() {
                return Err(TenantryError::AlreadyExists {
                    entity: "organization".into(),
                });
            }

            OrganizationCommandHandler::new(editor, &mut organization, buffer)
                .handle(OrganizationCommand::Create)?;
            organizations.create(&organization).await?;

            ProjectCommandHandler::new(editor, &mut project, buffer)
                .handle(ProjectCommand::Create)?;
            SurrealProjectStorage::new(&tx).create(&project).await?;

            Ok::<_, TenantryError>(organization)
        })
        .await?;
        deliver(&self.publisher, buffer).await?;

        info!(
            organization_id = %organization.id,
            url_code = %organization.url_code,
            system_admin = organization.system_admin,
            "Organization created"
        );
        Ok(organization)
    }

    pub async fn get(&self, id: Uuid) -> TenantryResult<Organization> {
        SurrealOrganizationStorage::new(&self.db).get(id).await
    }

    pub async fn get_by_url_code(&self, url_code: &str) -> TenantryResult<Organization> {
        SurrealOrganizationStorage::new(&self.db)
            .get_by_url_code(url_code)
            .await
    }

    pub async fn list(
        &self,
        request: &ListOrganizationsRequest,
    ) -> TenantryResult<PaginatedResult<Organization>> {
        let (page_size, cursor) = resolve_page(&self.config, &request.page)?;

        let mut options = ListOptions::new();
        if let Some(disabled) = request.disabled {
            options = options.eq("disabled", disabled);
        }
        if let Some(archived) = request.archived {
            options = options.eq("archived", archived);
        }
        let options = options
            .search(&["name", "url_code"], &request.page.search_keyword)
            .order_by(request.order_by.column(), request.page.direction)
            .page(page_size, cursor);

        SurrealOrganizationStorage::new(&self.db).list(&options).await
    }

    pub async fn update(
        &self,
        editor: &Editor,
        id: Uuid,
        input: UpdateOrganization,
    ) -> TenantryResult<Organization> {
        self.apply(editor, id, OrganizationCommand::Update(input)).await
    }

    pub async fn enable(&self, editor: &Editor, id: Uuid) -> TenantryResult<Organization> {
        self.apply(editor, id, OrganizationCommand::Enable).await
    }

    /// Fails with `CannotDisableSystemAdmin` for the system-admin organization.
    pub async fn disable(&self, editor: &Editor, id: Uuid) -> TenantryResult<Organization> {
        self.apply(editor, id, OrganizationCommand::Disable).await
    }

    /// Fails with `CannotArchiveSystemAdmin` for the system-admin organization.
    pub async fn archive(&self, editor: &Editor, id: Uuid) -> TenantryResult<Organization> {
        self.apply(editor, id, OrganizationCommand::Archive).await
    }

    pub async fn unarchive(&self, editor: &Editor, id: Uuid) -> TenantryResult<Organization> {
        self.apply(editor, id, OrganizationCommand::Unarchive).await
    }

    pub async fn convert_trial(&self, editor: &Editor, id: Uuid) -> TenantryResult<Organization> {
        self.apply(editor, id, OrganizationCommand::ConvertTrial).await
    }

    /// Decodes a transport command and applies it to an existing
    /// organization.
    pub async fn handle(
        &self,
        editor: &Editor,
        id: Uuid,
        kind: &str,
        payload: serde_json::Value,
    ) -> TenantryResult<Organization> {
        let command = OrganizationCommand::decode(kind, payload)?;
        self.apply(editor, id, command).await
    }

    async fn apply(
        &self,
        editor: &Editor,
        id: Uuid,
        command: OrganizationCommand,
    ) -> TenantryResult<Organization> {
        if command == OrganizationCommand::Create {
            return Err(ValidationError::MalformedCommand {
                kind: command.kind().into(),
                reason: "organizations are created through create".into(),
            }
            .into());
        }
        command.validate()?;
        let kind = command.kind();

        let buffer = &EventBuffer::new();
        let organization = run_in_transaction(&self.db, |tx| async move {
            let storage = SurrealOrganizationStorage::new(&tx);
            let mut organization = storage.get(id).await?;

            OrganizationCommandHandler::new(editor, &mut organization, buffer)
                .handle(command)?;
            storage.update(&organization).await?;

            Ok::<_, TenantryError>(organization)
        })
        .await?;
        deliver(&self.publisher, buffer).await?;

        info!(organization_id = %id, command = kind, "Organization updated");
        Ok(organization)
    }
}
