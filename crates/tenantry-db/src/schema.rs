//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode. UUIDs are stored as strings
//! (the record key and every `*_id` reference). Timestamps are unix seconds.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "tenancy_hierarchy",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        name: "environment_scoped_tables",
        sql: SCHEMA_V2,
    },
];

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Organizations
-- =======================================================================
DEFINE TABLE organization SCHEMAFULL;
DEFINE FIELD name ON TABLE organization TYPE string;
DEFINE FIELD url_code ON TABLE organization TYPE string;
DEFINE FIELD owner_email ON TABLE organization TYPE string;
DEFINE FIELD description ON TABLE organization TYPE string DEFAULT '';
DEFINE FIELD disabled ON TABLE organization TYPE bool DEFAULT false;
DEFINE FIELD archived ON TABLE organization TYPE bool DEFAULT false;
DEFINE FIELD trial ON TABLE organization TYPE bool DEFAULT false;
DEFINE FIELD system_admin ON TABLE organization TYPE bool DEFAULT false;
DEFINE FIELD enabled_auth_types ON TABLE organization TYPE array;
DEFINE FIELD enabled_auth_types.* ON TABLE organization TYPE string \
    ASSERT $value IN ['Google', 'Password'];
DEFINE FIELD created_at ON TABLE organization TYPE int;
DEFINE FIELD updated_at ON TABLE organization TYPE int;
DEFINE INDEX idx_organization_url_code ON TABLE organization \
    COLUMNS url_code UNIQUE;
DEFINE INDEX idx_organization_system_admin ON TABLE organization \
    COLUMNS system_admin;

-- =======================================================================
-- Projects (organization scope)
-- =======================================================================
DEFINE TABLE project SCHEMAFULL;
DEFINE FIELD organization_id ON TABLE project TYPE string;
DEFINE FIELD name ON TABLE project TYPE string;
DEFINE FIELD url_code ON TABLE project TYPE string;
DEFINE FIELD description ON TABLE project TYPE string DEFAULT '';
DEFINE FIELD disabled ON TABLE project TYPE bool DEFAULT false;
DEFINE FIELD trial ON TABLE project TYPE bool DEFAULT false;
DEFINE FIELD creator_email ON TABLE project TYPE string;
DEFINE FIELD created_at ON TABLE project TYPE int;
DEFINE FIELD updated_at ON TABLE project TYPE int;
DEFINE INDEX idx_project_org_url_code ON TABLE project \
    COLUMNS organization_id, url_code UNIQUE;

-- =======================================================================
-- Environments (project scope)
-- =======================================================================
DEFINE TABLE environment SCHEMAFULL;
DEFINE FIELD project_id ON TABLE environment TYPE string;
DEFINE FIELD organization_id ON TABLE environment TYPE string;
DEFINE FIELD name ON TABLE environment TYPE string;
DEFINE FIELD url_code ON TABLE environment TYPE string;
DEFINE FIELD description ON TABLE environment TYPE string DEFAULT '';
DEFINE FIELD archived ON TABLE environment TYPE bool DEFAULT false;
DEFINE FIELD require_comment ON TABLE environment TYPE bool \
    DEFAULT false;
DEFINE FIELD auto_archive ON TABLE environment TYPE object;
DEFINE FIELD auto_archive.enabled ON TABLE environment TYPE bool \
    DEFAULT false;
DEFINE FIELD auto_archive.unused_days ON TABLE environment TYPE int \
    DEFAULT 0;
DEFINE FIELD auto_archive.check_code_refs ON TABLE environment \
    TYPE bool DEFAULT false;
DEFINE FIELD created_at ON TABLE environment TYPE int;
DEFINE FIELD updated_at ON TABLE environment TYPE int;
DEFINE INDEX idx_environment_project_url_code ON TABLE environment \
    COLUMNS project_id, url_code UNIQUE;
DEFINE INDEX idx_environment_org ON TABLE environment \
    COLUMNS organization_id;

-- =======================================================================
-- Accounts (organization scope)
-- =======================================================================
DEFINE TABLE account SCHEMAFULL;
DEFINE FIELD organization_id ON TABLE account TYPE string;
DEFINE FIELD email ON TABLE account TYPE string;
DEFINE FIELD name ON TABLE account TYPE string;
DEFINE FIELD created_at ON TABLE account TYPE int;
DEFINE INDEX idx_account_org_email ON TABLE account \
    COLUMNS organization_id, email UNIQUE;
";

const SCHEMA_V2: &str = "\
-- =======================================================================
-- Environment-scoped tables, removed with their environment
-- =======================================================================
DEFINE TABLE feature SCHEMAFULL;
DEFINE FIELD environment_id ON TABLE feature TYPE string;
DEFINE FIELD name ON TABLE feature TYPE string;
DEFINE FIELD created_at ON TABLE feature TYPE int;
DEFINE INDEX idx_feature_env ON TABLE feature COLUMNS environment_id;

DEFINE TABLE experiment SCHEMAFULL;
DEFINE FIELD environment_id ON TABLE experiment TYPE string;
DEFINE FIELD name ON TABLE experiment TYPE string;
DEFINE FIELD created_at ON TABLE experiment TYPE int;
DEFINE INDEX idx_experiment_env ON TABLE experiment COLUMNS environment_id;

DEFINE TABLE goal SCHEMAFULL;
DEFINE FIELD environment_id ON TABLE goal TYPE string;
DEFINE FIELD name ON TABLE goal TYPE string;
DEFINE FIELD created_at ON TABLE goal TYPE int;
DEFINE INDEX idx_goal_env ON TABLE goal COLUMNS environment_id;

DEFINE TABLE subscription SCHEMAFULL;
DEFINE FIELD environment_id ON TABLE subscription TYPE string;
DEFINE FIELD name ON TABLE subscription TYPE string;
DEFINE FIELD created_at ON TABLE subscription TYPE int;
DEFINE INDEX idx_subscription_env ON TABLE subscription \
    COLUMNS environment_id;

DEFINE TABLE push SCHEMAFULL;
DEFINE FIELD environment_id ON TABLE push TYPE string;
DEFINE FIELD name ON TABLE push TYPE string;
DEFINE FIELD created_at ON TABLE push TYPE int;
DEFINE INDEX idx_push_env ON TABLE push COLUMNS environment_id;

DEFINE TABLE tag SCHEMAFULL;
DEFINE FIELD environment_id ON TABLE tag TYPE string;
DEFINE FIELD name ON TABLE tag TYPE string;
DEFINE FIELD created_at ON TABLE tag TYPE int;
DEFINE INDEX idx_tag_env ON TABLE tag COLUMNS environment_id;

DEFINE TABLE segment SCHEMAFULL;
DEFINE FIELD environment_id ON TABLE segment TYPE string;
DEFINE FIELD name ON TABLE segment TYPE string;
DEFINE FIELD created_at ON TABLE segment TYPE int;
DEFINE INDEX idx_segment_env ON TABLE segment COLUMNS environment_id;

DEFINE TABLE flag_trigger SCHEMAFULL;
DEFINE FIELD environment_id ON TABLE flag_trigger TYPE string;
DEFINE FIELD name ON TABLE flag_trigger TYPE string;
DEFINE FIELD created_at ON TABLE flag_trigger TYPE int;
DEFINE INDEX idx_flag_trigger_env ON TABLE flag_trigger \
    COLUMNS environment_id;

DEFINE TABLE api_key SCHEMAFULL;
DEFINE FIELD environment_id ON TABLE api_key TYPE string;
DEFINE FIELD name ON TABLE api_key TYPE string;
DEFINE FIELD created_at ON TABLE api_key TYPE int;
DEFINE INDEX idx_api_key_env ON TABLE api_key COLUMNS environment_id;

DEFINE TABLE auto_ops_rule SCHEMAFULL;
DEFINE FIELD environment_id ON TABLE auto_ops_rule TYPE string;
DEFINE FIELD name ON TABLE auto_ops_rule TYPE string;
DEFINE FIELD created_at ON TABLE auto_ops_rule TYPE int;
DEFINE INDEX idx_auto_ops_rule_env ON TABLE auto_ops_rule \
    COLUMNS environment_id;

DEFINE TABLE feature_last_used_info SCHEMAFULL;
DEFINE FIELD environment_id ON TABLE feature_last_used_info TYPE string;
DEFINE FIELD name ON TABLE feature_last_used_info TYPE string;
DEFINE FIELD created_at ON TABLE feature_last_used_info TYPE int;
DEFINE INDEX idx_feature_last_used_info_env ON TABLE \
    feature_last_used_info COLUMNS environment_id;
";

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            db.query(migration.sql).await?.check().map_err(|e| {
                DbError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;

            db.query(
                "CREATE _migration SET version = $version, \
                 name = $name",
            )
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

            info!(
                version = migration.version,
                "Migration applied successfully"
            );
        }
    }

    Ok(())
}

/// Latest schema version known to this build.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}
