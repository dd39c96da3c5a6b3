//! Database-specific error types and conversions.

use tenantry_core::error::{TenantryError, ValidationError};
use tracing::error;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Record already exists: {entity}")]
    AlreadyExists { entity: String },

    #[error("Unexpected affected rows: {entity} with id {id}")]
    UnexpectedAffectedRows { entity: String, id: String },

    #[error("Batch failed: {0}")]
    Batch(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(#[from] ValidationError),

    #[error("Row decoding failed: {0}")]
    Decode(String),
}

impl From<DbError> for TenantryError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => TenantryError::NotFound { entity, id },
            DbError::AlreadyExists { entity } => TenantryError::AlreadyExists { entity },
            DbError::UnexpectedAffectedRows { entity, id } => {
                TenantryError::UnexpectedAffectedRows { entity, id }
            }
            DbError::InvalidQuery(e) => TenantryError::InvalidArgument(e),
            other => {
                // Statement text and table names stay in the log.
                error!(error = %other, "Storage operation failed");
                TenantryError::Internal("storage operation failed".into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_details_are_not_returned() {
        let err: TenantryError =
            DbError::Batch("DELETE feature WHERE environment_id = $id: boom".into()).into();
        match err {
            TenantryError::Internal(msg) => {
                assert!(!msg.contains("feature"));
                assert!(!msg.contains("DELETE"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn sentinels_pass_through() {
        let err: TenantryError = DbError::UnexpectedAffectedRows {
            entity: "environment".into(),
            id: "e1".into(),
        }
        .into();
        assert!(matches!(err, TenantryError::UnexpectedAffectedRows { .. }));

        let err: TenantryError =
            DbError::InvalidQuery(ValidationError::InvalidColumn("a;b".into())).into();
        assert!(matches!(err, TenantryError::InvalidArgument(_)));
    }
}
