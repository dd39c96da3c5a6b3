//! Project domain model.
//!
//! Projects group environments inside an organization. Every organization
//! is created together with its default project.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::unix_now;
use crate::error::ValidationError;
use crate::validation::{EntityKind, validate_email, validate_name, validate_url_code};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    /// Unique within the owning organization.
    pub url_code: String,
    pub description: String,
    pub disabled: bool,
    pub trial: bool,
    pub creator_email: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProject {
    pub organization_id: Uuid,
    pub name: String,
    pub url_code: String,
    pub description: String,
    pub creator_email: String,
    pub trial: bool,
}

impl CreateProject {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.organization_id.is_nil() {
            return Err(ValidationError::MissingId("organization_id"));
        }
        validate_name(EntityKind::Project, &self.name)?;
        validate_url_code(EntityKind::Project, &self.url_code)?;
        validate_email(&self.creator_email)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub url_code: Option<String>,
    pub description: Option<String>,
}

impl UpdateProject {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if *self == Self::default() {
            return Err(ValidationError::NothingToUpdate);
        }
        if let Some(name) = &self.name {
            validate_name(EntityKind::Project, name)?;
        }
        if let Some(url_code) = &self.url_code {
            validate_url_code(EntityKind::Project, url_code)?;
        }
        Ok(())
    }
}

impl Project {
    pub fn new(input: CreateProject) -> Result<Self, ValidationError> {
        input.validate()?;
        let now = unix_now();
        Ok(Self {
            id: Uuid::new_v4(),
            organization_id: input.organization_id,
            name: validate_name(EntityKind::Project, &input.name)?,
            url_code: input.url_code,
            description: input.description,
            disabled: false,
            trial: input.trial,
            creator_email: input.creator_email,
            created_at: now,
            updated_at: now,
        })
    }

    fn touch(&mut self) {
        self.updated_at = unix_now();
    }

    pub fn rename(&mut self, name: &str) -> Result<(), ValidationError> {
        self.name = validate_name(EntityKind::Project, name)?;
        self.touch();
        Ok(())
    }

    pub fn change_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
        self.touch();
    }

    pub fn enable(&mut self) {
        self.disabled = false;
        self.touch();
    }

    pub fn disable(&mut self) {
        self.disabled = true;
        self.touch();
    }

    pub fn convert_trial(&mut self) {
        self.trial = false;
        self.touch();
    }

    pub fn update(&self, input: &UpdateProject) -> Result<Project, ValidationError> {
        input.validate()?;
        let mut next = self.clone();
        if let Some(name) = &input.name {
            next.name = validate_name(EntityKind::Project, name)?;
        }
        if let Some(url_code) = &input.url_code {
            next.url_code = url_code.clone();
        }
        if let Some(description) = &input.description {
            next.description = description.clone();
        }
        next.touch();
        Ok(next)
    }
}
