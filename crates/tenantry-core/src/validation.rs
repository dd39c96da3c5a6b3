//! Field validators shared by constructors, update inputs and services.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ValidationError;
use crate::models::environment::AutoArchive;

pub const MAX_NAME_LENGTH: usize = 50;

static URL_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9-]{1,50}$").expect("url code pattern compiles"));

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles"));

/// The aggregate a name or url code belongs to; selects the error variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Organization,
    Project,
    Environment,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::Project => "project",
            Self::Environment => "environment",
        }
    }

    fn name_required(&self) -> ValidationError {
        match self {
            Self::Organization => ValidationError::OrganizationNameRequired,
            Self::Project => ValidationError::ProjectNameRequired,
            Self::Environment => ValidationError::EnvironmentNameRequired,
        }
    }

    fn invalid_name(&self) -> ValidationError {
        match self {
            Self::Organization => ValidationError::InvalidOrganizationName,
            Self::Project => ValidationError::InvalidProjectName,
            Self::Environment => ValidationError::InvalidEnvironmentName,
        }
    }

    fn invalid_url_code(&self) -> ValidationError {
        match self {
            Self::Organization => ValidationError::InvalidOrganizationUrlCode,
            Self::Project => ValidationError::InvalidProjectUrlCode,
            Self::Environment => ValidationError::InvalidEnvironmentUrlCode,
        }
    }
}

/// Validates a display name and returns it trimmed.
pub fn validate_name(kind: EntityKind, name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(kind.name_required());
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err(kind.invalid_name());
    }
    Ok(trimmed.to_string())
}

pub fn validate_url_code(kind: EntityKind, url_code: &str) -> Result<(), ValidationError> {
    if URL_CODE.is_match(url_code) {
        Ok(())
    } else {
        Err(kind.invalid_url_code())
    }
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if EMAIL.is_match(email) {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail)
    }
}

pub fn validate_auto_archive(settings: &AutoArchive) -> Result<(), ValidationError> {
    if settings.enabled && settings.unused_days == 0 {
        return Err(ValidationError::InvalidAutoArchiveUnusedDays);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_trimmed_before_checks() {
        assert_eq!(
            validate_name(EntityKind::Environment, "  prod  ").unwrap(),
            "prod"
        );
        assert_eq!(
            validate_name(EntityKind::Environment, "   "),
            Err(ValidationError::EnvironmentNameRequired)
        );
    }

    #[test]
    fn name_longer_than_fifty_chars_is_rejected() {
        let fifty = "a".repeat(50);
        assert!(validate_name(EntityKind::Project, &fifty).is_ok());
        assert_eq!(
            validate_name(EntityKind::Project, &"a".repeat(51)),
            Err(ValidationError::InvalidProjectName)
        );
    }

    #[test]
    fn url_code_must_be_lowercase_kebab() {
        assert!(validate_url_code(EntityKind::Environment, "prod-eu-1").is_ok());
        for bad in ["URLCODE", "", "under_score", "with space", &"a".repeat(51)] {
            assert_eq!(
                validate_url_code(EntityKind::Environment, bad),
                Err(ValidationError::InvalidEnvironmentUrlCode),
                "{bad:?}"
            );
        }
        assert_eq!(
            validate_url_code(EntityKind::Organization, "Acme"),
            Err(ValidationError::InvalidOrganizationUrlCode)
        );
    }

    #[test]
    fn email_needs_user_and_domain() {
        assert!(validate_email("owner@example.com").is_ok());
        assert!(validate_email("owner@localhost").is_err());
        assert!(validate_email("@example.com").is_err());
    }

    #[test]
    fn auto_archive_enabled_requires_days() {
        let mut settings = AutoArchive {
            enabled: true,
            unused_days: 0,
            check_code_refs: false,
        };
        assert_eq!(
            validate_auto_archive(&settings),
            Err(ValidationError::InvalidAutoArchiveUnusedDays)
        );
        settings.unused_days = 90;
        assert!(validate_auto_archive(&settings).is_ok());
        assert!(validate_auto_archive(&AutoArchive::default()).is_ok());
    }
}
