//! Error types for the Tenantry system.
//!
//! Every variant of [`TenantryError`] maps to exactly one externally
//! visible [`StatusCode`]. Validation and precondition failures carry a
//! distinguished inner enum so callers can match on the precise cause
//! without parsing messages.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TenantryError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Unexpected affected rows: {entity} with id {id}")]
    UnexpectedAffectedRows { entity: String, id: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(#[from] ValidationError),

    #[error("Failed precondition: {0}")]
    FailedPrecondition(#[from] PreconditionError),

    #[error("Permission denied: {reason}")]
    PermissionDenied { reason: String },

    #[error("Unauthenticated")]
    Unauthenticated,

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Event publish failed: {0}")]
    Publish(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type TenantryResult<T> = Result<T, TenantryError>;

impl TenantryError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// The stable status this error is reported with at the transport
    /// boundary.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NotFound,
            Self::AlreadyExists { .. } => StatusCode::AlreadyExists,
            Self::UnexpectedAffectedRows { .. } => StatusCode::Aborted,
            Self::InvalidArgument(_) => StatusCode::InvalidArgument,
            Self::FailedPrecondition(_) => StatusCode::FailedPrecondition,
            Self::PermissionDenied { .. } => StatusCode::PermissionDenied,
            Self::Unauthenticated => StatusCode::Unauthenticated,
            Self::UnknownCommand(_) => StatusCode::Unimplemented,
            Self::Publish(_) => StatusCode::Unavailable,
            Self::Internal(_) => StatusCode::Internal,
        }
    }
}

/// Externally visible status, one per error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    NotFound,
    AlreadyExists,
    Aborted,
    InvalidArgument,
    FailedPrecondition,
    PermissionDenied,
    Unauthenticated,
    Unimplemented,
    Unavailable,
    Internal,
}

impl StatusCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::Aborted => "ABORTED",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::FailedPrecondition => "FAILED_PRECONDITION",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Unimplemented => "UNIMPLEMENTED",
            Self::Unavailable => "UNAVAILABLE",
            Self::Internal => "INTERNAL",
        }
    }
}

/// Field-level validation failures, detected before any transaction opens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("environment name is required")]
    EnvironmentNameRequired,
    #[error("environment name must be at most 50 characters")]
    InvalidEnvironmentName,
    #[error("environment url code must match ^[a-z0-9-]{{1,50}}$")]
    InvalidEnvironmentUrlCode,

    #[error("project name is required")]
    ProjectNameRequired,
    #[error("project name must be at most 50 characters")]
    InvalidProjectName,
    #[error("project url code must match ^[a-z0-9-]{{1,50}}$")]
    InvalidProjectUrlCode,

    #[error("organization name is required")]
    OrganizationNameRequired,
    #[error("organization name must be at most 50 characters")]
    InvalidOrganizationName,
    #[error("organization url code must match ^[a-z0-9-]{{1,50}}$")]
    InvalidOrganizationUrlCode,

    #[error("invalid email address")]
    InvalidEmail,
    #[error("auto-archive unused days must be greater than zero when enabled")]
    InvalidAutoArchiveUnusedDays,

    #[error("{0} is required")]
    MissingId(&'static str),
    #[error("at least one environment id is required")]
    EnvironmentIdsRequired,
    #[error("at least one organization id is required")]
    OrganizationIdsRequired,

    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
    #[error("page size must be at most {max}")]
    PageSizeTooLarge { max: u64 },
    #[error("invalid column identifier: {0}")]
    InvalidColumn(String),
    #[error("table is not deletable: {0}")]
    DisallowedTable(String),

    #[error("update request contains no fields")]
    NothingToUpdate,
    #[error("malformed command payload for {kind}: {reason}")]
    MalformedCommand { kind: String, reason: String },
}

/// Business-rule violations that depend on current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("cannot disable the system admin organization")]
    CannotDisableSystemAdmin,
    #[error("cannot archive the system admin organization")]
    CannotArchiveSystemAdmin,
    #[error("cannot delete the system admin organization")]
    CannotDeleteSystemAdmin,
    #[error("project is disabled")]
    ProjectDisabled,
    #[error("{table} still holds {count} rows; retry with force to delete")]
    ProtectedDataPresent { table: String, count: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_stable_status() {
        let cases = [
            (TenantryError::not_found("environment", "x"), "NOT_FOUND"),
            (
                TenantryError::AlreadyExists {
                    entity: "project".into(),
                },
                "ALREADY_EXISTS",
            ),
            (
                TenantryError::UnexpectedAffectedRows {
                    entity: "project".into(),
                    id: "x".into(),
                },
                "ABORTED",
            ),
            (
                ValidationError::InvalidEnvironmentUrlCode.into(),
                "INVALID_ARGUMENT",
            ),
            (
                PreconditionError::CannotDisableSystemAdmin.into(),
                "FAILED_PRECONDITION",
            ),
            (TenantryError::Unauthenticated, "UNAUTHENTICATED"),
            (TenantryError::Publish("down".into()), "UNAVAILABLE"),
            (TenantryError::Internal("boom".into()), "INTERNAL"),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status().as_str(), expected, "{err}");
        }
    }
}
