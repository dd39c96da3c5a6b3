//! Environment domain model.
//!
//! Environments isolate feature data inside a project (dev/staging/prod).
//! They are either active or archived; both transitions are unconditional
//! and reversible. Environments are hard-deleted through the cascade
//! deletion workflow only.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::unix_now;
use crate::error::ValidationError;
use crate::validation::{EntityKind, validate_auto_archive, validate_name, validate_url_code};

/// Automatic archival of feature flags that went unused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AutoArchive {
    pub enabled: bool,
    /// Days without evaluations before a flag is archived.
    pub unused_days: u32,
    /// Skip flags that still have code references.
    pub check_code_refs: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub id: Uuid,
    pub project_id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    /// Unique within the owning project.
    pub url_code: String,
    pub description: String,
    pub archived: bool,
    pub require_comment: bool,
    pub auto_archive: AutoArchive,
    /// Read-only projection, filled by storage reads.
    pub feature_flag_count: u64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEnvironment {
    pub project_id: Uuid,
    pub name: String,
    pub url_code: String,
    pub description: String,
    pub require_comment: bool,
    pub auto_archive: AutoArchive,
}

impl CreateEnvironment {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.project_id.is_nil() {
            return Err(ValidationError::MissingId("project_id"));
        }
        validate_name(EntityKind::Environment, &self.name)?;
        validate_url_code(EntityKind::Environment, &self.url_code)?;
        validate_auto_archive(&self.auto_archive)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct UpdateEnvironment {
    pub name: Option<String>,
    pub url_code: Option<String>,
    pub description: Option<String>,
    pub require_comment: Option<bool>,
    pub auto_archive: Option<AutoArchive>,
}

impl UpdateEnvironment {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if *self == Self::default() {
            return Err(ValidationError::NothingToUpdate);
        }
        if let Some(name) = &self.name {
            validate_name(EntityKind::Environment, name)?;
        }
        if let Some(url_code) = &self.url_code {
            validate_url_code(EntityKind::Environment, url_code)?;
        }
        if let Some(settings) = &self.auto_archive {
            validate_auto_archive(settings)?;
        }
        Ok(())
    }
}

impl Environment {
    /// `organization_id` is taken from the owning project by the caller.
    pub fn new(input: CreateEnvironment, organization_id: Uuid) -> Result<Self, ValidationError> {
        input.validate()?;
        if organization_id.is_nil() {
            return Err(ValidationError::MissingId("organization_id"));
        }
        let now = unix_now();
        Ok(Self {
            id: Uuid::new_v4(),
            project_id: input.project_id,
            organization_id,
            name: validate_name(EntityKind::Environment, &input.name)?,
            url_code: input.url_code,
            description: input.description,
            archived: false,
            require_comment: input.require_comment,
            auto_archive: input.auto_archive,
            feature_flag_count: 0,
            created_at: now,
            updated_at: now,
        })
    }

    fn touch(&mut self) {
        self.updated_at = unix_now();
    }

    pub fn rename(&mut self, name: &str) -> Result<(), ValidationError> {
        self.name = validate_name(EntityKind::Environment, name)?;
        self.touch();
        Ok(())
    }

    pub fn change_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
        self.touch();
    }

    pub fn change_require_comment(&mut self, require_comment: bool) {
        self.require_comment = require_comment;
        self.touch();
    }

    pub fn change_auto_archive(&mut self, settings: AutoArchive) -> Result<(), ValidationError> {
        validate_auto_archive(&settings)?;
        self.auto_archive = settings;
        self.touch();
        Ok(())
    }

    pub fn archive(&mut self) {
        self.archived = true;
        self.touch();
    }

    pub fn unarchive(&mut self) {
        self.archived = false;
        self.touch();
    }

    pub fn update(&self, input: &UpdateEnvironment) -> Result<Environment, ValidationError> {
        input.validate()?;
        let mut next = self.clone();
        if let Some(name) = &input.name {
            next.name = validate_name(EntityKind::Environment, name)?;
        }
        if let Some(url_code) = &input.url_code {
            next.url_code = url_code.clone();
        }
        if let Some(description) = &input.description {
            next.description = description.clone();
        }
        if let Some(require_comment) = input.require_comment {
            next.require_comment = require_comment;
        }
        if let Some(settings) = input.auto_archive {
            next.auto_archive = settings;
        }
        next.touch();
        Ok(next)
    }
}
