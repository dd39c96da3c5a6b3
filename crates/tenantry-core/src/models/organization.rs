//! Organization domain model.
//!
//! Organizations are the top-level entity in the tenancy hierarchy. They
//! own projects and organization-scoped accounts. Exactly one organization
//! may carry the `system_admin` flag; it is set at creation and can never
//! be disabled or archived.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::unix_now;
use crate::error::{PreconditionError, ValidationError};
use crate::validation::{EntityKind, validate_email, validate_name, validate_url_code};

/// Sign-in mechanisms an organization accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AuthenticationType {
    Google,
    Password,
}

impl AuthenticationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "Google",
            Self::Password => "Password",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Google" => Some(Self::Google),
            "Password" => Some(Self::Password),
            _ => None,
        }
    }
}

/// Enabled authentication types. Google is always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationSettings {
    enabled_types: BTreeSet<AuthenticationType>,
}

impl AuthenticationSettings {
    pub fn new(types: impl IntoIterator<Item = AuthenticationType>) -> Self {
        let mut enabled_types: BTreeSet<_> = types.into_iter().collect();
        enabled_types.insert(AuthenticationType::Google);
        Self { enabled_types }
    }

    pub fn enabled_types(&self) -> impl Iterator<Item = AuthenticationType> + '_ {
        self.enabled_types.iter().copied()
    }

    pub fn is_enabled(&self, auth_type: AuthenticationType) -> bool {
        self.enabled_types.contains(&auth_type)
    }
}

impl Default for AuthenticationSettings {
    fn default() -> Self {
        Self::new([])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    /// URL-safe identifier, unique across all organizations.
    pub url_code: String,
    pub owner_email: String,
    pub description: String,
    pub disabled: bool,
    pub archived: bool,
    pub trial: bool,
    pub system_admin: bool,
    pub authentication_settings: AuthenticationSettings,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields required to create a new organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrganization {
    pub name: String,
    pub url_code: String,
    pub owner_email: String,
    pub description: String,
    pub trial: bool,
    pub system_admin: bool,
}

impl CreateOrganization {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(EntityKind::Organization, &self.name)?;
        validate_url_code(EntityKind::Organization, &self.url_code)?;
        validate_email(&self.owner_email)
    }
}

/// Partial update; `None` leaves a field untouched.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct UpdateOrganization {
    pub name: Option<String>,
    pub url_code: Option<String>,
    pub description: Option<String>,
    pub owner_email: Option<String>,
    pub authentication_settings: Option<AuthenticationSettings>,
}

impl UpdateOrganization {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::NothingToUpdate);
        }
        if let Some(name) = &self.name {
            validate_name(EntityKind::Organization, name)?;
        }
        if let Some(url_code) = &self.url_code {
            validate_url_code(EntityKind::Organization, url_code)?;
        }
        if let Some(email) = &self.owner_email {
            validate_email(email)?;
        }
        Ok(())
    }
}

impl Organization {
    pub fn new(input: CreateOrganization) -> Result<Self, ValidationError> {
        input.validate()?;
        let now = unix_now();
        Ok(Self {
            id: Uuid::new_v4(),
            name: validate_name(EntityKind::Organization, &input.name)?,
            url_code: input.url_code,
            owner_email: input.owner_email,
            description: input.description,
            disabled: false,
            archived: false,
            trial: input.trial,
            system_admin: input.system_admin,
            authentication_settings: AuthenticationSettings::default(),
            created_at: now,
            updated_at: now,
        })
    }

    fn touch(&mut self) {
        self.updated_at = unix_now();
    }

    pub fn rename(&mut self, name: &str) -> Result<(), ValidationError> {
        self.name = validate_name(EntityKind::Organization, name)?;
        self.touch();
        Ok(())
    }

    pub fn change_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
        self.touch();
    }

    pub fn change_owner_email(&mut self, email: &str) -> Result<(), ValidationError> {
        validate_email(email)?;
        self.owner_email = email.to_string();
        self.touch();
        Ok(())
    }

    pub fn change_authentication_settings(&mut self, settings: AuthenticationSettings) {
        // Re-normalise so Google survives deserialised input.
        self.authentication_settings = AuthenticationSettings::new(settings.enabled_types());
        self.touch();
    }

    pub fn enable(&mut self) {
        self.disabled = false;
        self.touch();
    }

    pub fn disable(&mut self) -> Result<(), PreconditionError> {
        if self.system_admin {
            return Err(PreconditionError::CannotDisableSystemAdmin);
        }
        self.disabled = true;
        self.touch();
        Ok(())
    }

    pub fn archive(&mut self) -> Result<(), PreconditionError> {
        if self.system_admin {
            return Err(PreconditionError::CannotArchiveSystemAdmin);
        }
        self.archived = true;
        self.touch();
        Ok(())
    }

    pub fn unarchive(&mut self) {
        self.archived = false;
        self.touch();
    }

    pub fn convert_trial(&mut self) {
        self.trial = false;
        self.touch();
    }

    /// Returns an updated copy; `self` is left as the "before" snapshot.
    pub fn update(&self, input: &UpdateOrganization) -> Result<Organization, ValidationError> {
        input.validate()?;
        let mut next = self.clone();
        if let Some(name) = &input.name {
            next.name = validate_name(EntityKind::Organization, name)?;
        }
        if let Some(url_code) = &input.url_code {
            next.url_code = url_code.clone();
        }
        if let Some(description) = &input.description {
            next.description = description.clone();
        }
        if let Some(email) = &input.owner_email {
            next.owner_email = email.clone();
        }
        if let Some(settings) = &input.authentication_settings {
            next.authentication_settings = AuthenticationSettings::new(settings.enabled_types());
        }
        next.touch();
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_input(system_admin: bool) -> CreateOrganization {
        CreateOrganization {
            name: "Acme".into(),
            url_code: "acme".into(),
            owner_email: "owner@acme.io".into(),
            description: "".into(),
            trial: true,
            system_admin,
        }
    }

    #[test]
    fn new_organization_has_google_auth_and_is_active() {
        let org = Organization::new(create_input(false)).unwrap();
        assert!(!org.disabled);
        assert!(!org.archived);
        assert!(org.trial);
        assert!(org.authentication_settings.is_enabled(AuthenticationType::Google));
        assert_eq!(org.created_at, org.updated_at);
    }

    #[test]
    fn new_rejects_bad_url_code() {
        let mut input = create_input(false);
        input.url_code = "Acme Corp".into();
        assert_eq!(
            Organization::new(input),
            Err(ValidationError::InvalidOrganizationUrlCode)
        );
    }

    #[test]
    fn system_admin_cannot_be_disabled_or_archived() {
        let mut org = Organization::new(create_input(true)).unwrap();
        let before = org.clone();

        assert_eq!(
            org.disable(),
            Err(PreconditionError::CannotDisableSystemAdmin)
        );
        assert_eq!(
            org.archive(),
            Err(PreconditionError::CannotArchiveSystemAdmin)
        );
        assert_eq!(org, before);
    }

    #[test]
    fn regular_organization_toggles_flags() {
        let mut org = Organization::new(create_input(false)).unwrap();
        org.disable().unwrap();
        org.archive().unwrap();
        org.convert_trial();
        assert!(org.disabled && org.archived && !org.trial);

        org.enable();
        org.unarchive();
        assert!(!org.disabled && !org.archived);
    }

    #[test]
    fn update_returns_new_snapshot_and_keeps_omitted_fields() {
        let org = Organization::new(create_input(false)).unwrap();
        let updated = org
            .update(&UpdateOrganization {
                name: Some("Acme Inc".into()),
                authentication_settings: Some(AuthenticationSettings::new([
                    AuthenticationType::Password,
                ])),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(org.name, "Acme");
        assert_eq!(updated.name, "Acme Inc");
        assert_eq!(updated.url_code, org.url_code);
        assert_eq!(updated.owner_email, org.owner_email);
        assert!(updated.authentication_settings.is_enabled(AuthenticationType::Google));
        assert!(updated.authentication_settings.is_enabled(AuthenticationType::Password));
    }

    #[test]
    fn empty_update_is_rejected() {
        let org = Organization::new(create_input(false)).unwrap();
        assert_eq!(
            org.update(&UpdateOrganization::default()),
            Err(ValidationError::NothingToUpdate)
        );
    }
}
