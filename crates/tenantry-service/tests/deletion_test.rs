//! Integration tests for cascade deletion using in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use tenantry_core::error::{PreconditionError, TenantryError, ValidationError};
use tenantry_core::event::Editor;
use tenantry_core::models::account::Account;
use tenantry_core::models::deletion::{DeletableTable, EnvironmentRecord};
use tenantry_core::models::environment::{AutoArchive, CreateEnvironment, Environment};
use tenantry_core::models::organization::{CreateOrganization, Organization};
use tenantry_core::publisher::MemoryPublisher;
use tenantry_core::repository::{ListOptions, ProjectRepository};
use tenantry_db::repository::{
    SurrealAccountStorage, SurrealEnvironmentDataStorage, SurrealProjectStorage,
};
use tenantry_service::{
    DeletionService, EnvironmentService, OrganizationService, ProjectService, ServiceConfig,
};
use uuid::Uuid;

struct Fixture {
    db: Surreal<Db>,
    organizations: OrganizationService<Db, MemoryPublisher>,
    projects: ProjectService<Db, MemoryPublisher>,
    environments: EnvironmentService<Db, MemoryPublisher>,
    editor: Editor,
}

async fn setup() -> Fixture {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    tenantry_db::run_migrations(&db).await.unwrap();

    let publisher = MemoryPublisher::new();
    let config = ServiceConfig::default();
    Fixture {
        organizations: OrganizationService::new(db.clone(), publisher.clone(), config.clone()),
        projects: ProjectService::new(db.clone(), publisher.clone(), config.clone()),
        environments: EnvironmentService::new(db.clone(), publisher, config),
        db,
        editor: Editor::admin("ops@acme.io"),
    }
}

fn deleter(db: &Surreal<Db>, protected_tables: Vec<DeletableTable>) -> DeletionService<Db> {
    DeletionService::new(
        db.clone(),
        ServiceConfig {
            protected_tables,
            ..ServiceConfig::default()
        },
    )
}

async fn organization(f: &Fixture, url_code: &str, system_admin: bool) -> Organization {
    f.organizations
        .create(
            &f.editor,
            CreateOrganization {
                name: url_code.to_uppercase(),
                url_code: url_code.into(),
                owner_email: "owner@acme.io".into(),
                description: String::new(),
                trial: false,
                system_admin,
            },
        )
        .await
        .unwrap()
}

async fn environment(f: &Fixture, organization: &Organization, url_code: &str) -> Environment {
    let project = f
        .projects
        .get_by_url_code(organization.id, "default")
        .await
        .unwrap();
    f.environments
        .create(
            &f.editor,
            CreateEnvironment {
                project_id: project.id,
                name: url_code.to_uppercase(),
                url_code: url_code.into(),
                description: String::new(),
                require_comment: false,
                auto_archive: AutoArchive::default(),
            },
        )
        .await
        .unwrap()
}

/// Inserts `n` rows into each table, with ids unique to the environment.
async fn seed(db: &Surreal<Db>, environment_id: Uuid, tables: &[(DeletableTable, usize)]) {
    let data = SurrealEnvironmentDataStorage::new(db);
    for (table, n) in tables {
        for i in 0..*n {
            let record =
                EnvironmentRecord::new(format!("{environment_id}-{i}"), environment_id, "row");
            data.insert(*table, &record).await.unwrap();
        }
    }
}

#[tokio::test]
async fn empty_environment_ids_are_rejected() {
    let f = setup().await;
    let err = deleter(&f.db, Vec::new())
        .delete_environment_data(&[], false, false)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TenantryError::InvalidArgument(ValidationError::EnvironmentIdsRequired)
    ));
}

#[tokio::test]
async fn dry_run_reports_the_counts_a_real_delete_removes() {
    let f = setup().await;
    let org = organization(&f, "acme", false).await;
    let env = environment(&f, &org, "dev").await;
    let bystander = environment(&f, &org, "prod").await;
    seed(
        &f.db,
        env.id,
        &[
            (DeletableTable::Feature, 3),
            (DeletableTable::Segment, 2),
            (DeletableTable::AutoOpsRule, 1),
        ],
    )
    .await;
    seed(&f.db, bystander.id, &[(DeletableTable::Feature, 1)]).await;

    let service = deleter(&f.db, Vec::new());
    let dry = service
        .delete_environment_data(&[env.id], true, false)
        .await
        .unwrap();
    assert_eq!(dry.len(), 1);
    assert_eq!(dry[0].features, 3);
    assert_eq!(dry[0].segments, 2);
    assert_eq!(dry[0].operations, 1);
    assert_eq!(dry[0].total(), 6);
    // Nothing moved.
    assert_eq!(f.environments.get(env.id).await.unwrap().feature_flag_count, 3);

    let real = service
        .delete_environment_data(&[env.id], false, false)
        .await
        .unwrap();
    assert_eq!(real, dry);

    let err = f.environments.get(env.id).await.unwrap_err();
    assert!(matches!(err, TenantryError::NotFound { .. }));
    let remaining = SurrealEnvironmentDataStorage::new(&f.db)
        .count_all(env.id)
        .await
        .unwrap();
    assert!(remaining.values().all(|count| *count == 0));

    assert_eq!(
        f.environments.get(bystander.id).await.unwrap().feature_flag_count,
        1
    );
}

#[tokio::test]
async fn one_row_in_every_dependent_table_is_counted_and_removed() {
    let f = setup().await;
    let org = organization(&f, "acme", false).await;
    let env = environment(&f, &org, "dev").await;
    let every_table: Vec<(DeletableTable, usize)> =
        DeletableTable::ALL.iter().map(|table| (*table, 1)).collect();
    seed(&f.db, env.id, &every_table).await;

    let summaries = deleter(&f.db, Vec::new())
        .delete_environment_data(&[env.id], false, false)
        .await
        .unwrap();

    assert_eq!(summaries.len(), 1);
    let summary = &summaries[0];
    assert_eq!(summary.environment_id, env.id);
    assert_eq!(summary.features, 1);
    assert_eq!(summary.experiments, 1);
    assert_eq!(summary.goals, 1);
    assert_eq!(summary.subscriptions, 1);
    assert_eq!(summary.pushes, 1);
    assert_eq!(summary.tags, 1);
    assert_eq!(summary.segments, 1);
    assert_eq!(summary.flag_triggers, 1);
    assert_eq!(summary.api_keys, 1);
    assert_eq!(summary.operations, 1);
    assert_eq!(summary.feature_last_used_infos, 1);
    assert_eq!(summary.total(), 11);

    let remaining = SurrealEnvironmentDataStorage::new(&f.db)
        .count_all(env.id)
        .await
        .unwrap();
    assert_eq!(remaining.len(), DeletableTable::ALL.len());
    for (table, count) in &remaining {
        assert_eq!(*count, 0, "{table:?} still holds rows");
    }

    let err = f.environments.get(env.id).await.unwrap_err();
    assert!(
        matches!(&err, TenantryError::NotFound { entity, .. } if entity == "environment"),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn environments_without_dependent_rows_still_get_a_summary() {
    let f = setup().await;
    let org = organization(&f, "acme", false).await;
    let env = environment(&f, &org, "empty").await;

    let summaries = deleter(&f.db, Vec::new())
        .delete_environment_data(&[env.id, env.id], false, false)
        .await
        .unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].environment_id, env.id);
    assert_eq!(summaries[0].total(), 0);
}

#[tokio::test]
async fn missing_environment_cancels_the_whole_batch() {
    let f = setup().await;
    let org = organization(&f, "acme", false).await;
    let env = environment(&f, &org, "dev").await;
    seed(&f.db, env.id, &[(DeletableTable::Tag, 2)]).await;
    let ghost = Uuid::new_v4();

    let err = deleter(&f.db, Vec::new())
        .delete_environment_data(&[env.id, ghost], false, false)
        .await
        .unwrap_err();
    assert!(
        matches!(&err, TenantryError::NotFound { id, .. } if *id == ghost.to_string()),
        "unexpected error: {err:?}"
    );

    assert!(f.environments.get(env.id).await.is_ok());
    let tags = SurrealEnvironmentDataStorage::new(&f.db)
        .count_by_environment(DeletableTable::Tag, env.id)
        .await
        .unwrap();
    assert_eq!(tags, 2);
}

#[tokio::test]
async fn protected_tables_block_deletion_unless_forced() {
    let f = setup().await;
    let org = organization(&f, "acme", false).await;
    let env = environment(&f, &org, "dev").await;
    seed(&f.db, env.id, &[(DeletableTable::Experiment, 1)]).await;

    let service = deleter(&f.db, vec![DeletableTable::Experiment]);

    let err = service
        .delete_environment_data(&[env.id], false, false)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TenantryError::FailedPrecondition(PreconditionError::ProtectedDataPresent {
            ref table,
            count: 1,
        }) if table == "experiment"
    ));
    assert!(f.environments.get(env.id).await.is_ok());

    // A dry run reports without checking protection.
    let dry = service
        .delete_environment_data(&[env.id], true, false)
        .await
        .unwrap();
    assert_eq!(dry[0].experiments, 1);

    service
        .delete_environment_data(&[env.id], false, true)
        .await
        .unwrap();
    assert!(f.environments.get(env.id).await.is_err());
}

#[tokio::test]
async fn organization_deletion_cascades_to_everything_it_owns() {
    let f = setup().await;
    let org = organization(&f, "acme", false).await;
    let other = organization(&f, "other", false).await;
    let dev = environment(&f, &org, "dev").await;
    let prod = environment(&f, &org, "prod").await;
    let kept = environment(&f, &other, "dev").await;
    seed(&f.db, dev.id, &[(DeletableTable::Feature, 2)]).await;
    seed(&f.db, prod.id, &[(DeletableTable::ApiKey, 1)]).await;
    seed(&f.db, kept.id, &[(DeletableTable::Feature, 1)]).await;

    let accounts = SurrealAccountStorage::new(&f.db);
    accounts.create(&Account::new(org.id, "a@acme.io", "A")).await.unwrap();
    accounts.create(&Account::new(other.id, "b@other.io", "B")).await.unwrap();

    let service = deleter(&f.db, Vec::new());
    let dry = service
        .delete_organization_data(&[org.id], true)
        .await
        .unwrap();
    assert_eq!(dry.len(), 1);
    assert_eq!(dry[0].projects, 1);
    assert_eq!(dry[0].environments, 2);
    assert_eq!(dry[0].accounts, 1);
    let rows: u64 = dry[0].environment_summaries.iter().map(|s| s.total()).sum();
    assert_eq!(rows, 3);
    assert!(f.organizations.get(org.id).await.is_ok());

    let real = service
        .delete_organization_data(&[org.id], false)
        .await
        .unwrap();
    assert_eq!(real, dry);

    assert!(f.organizations.get(org.id).await.is_err());
    assert!(f.environments.get(dev.id).await.is_err());
    assert!(f.environments.get(prod.id).await.is_err());
    let projects = SurrealProjectStorage::new(&f.db)
        .count(&ListOptions::new().eq("organization_id", org.id.to_string()))
        .await
        .unwrap();
    assert_eq!(projects, 0);
    assert_eq!(accounts.count_by_organization(org.id).await.unwrap(), 0);

    assert_eq!(f.environments.get(kept.id).await.unwrap().feature_flag_count, 1);
    assert_eq!(accounts.count_by_organization(other.id).await.unwrap(), 1);
}

#[tokio::test]
async fn system_admin_organization_is_never_deleted() {
    let f = setup().await;
    let admin = organization(&f, "root", true).await;
    let regular = organization(&f, "acme", false).await;

    let err = deleter(&f.db, Vec::new())
        .delete_organization_data(&[regular.id, admin.id], false)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TenantryError::FailedPrecondition(PreconditionError::CannotDeleteSystemAdmin)
    ));
    assert!(f.organizations.get(admin.id).await.is_ok());
    assert!(f.organizations.get(regular.id).await.is_ok());
}

#[tokio::test]
async fn empty_organization_ids_are_rejected() {
    let f = setup().await;
    let err = deleter(&f.db, Vec::new())
        .delete_organization_data(&[], true)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TenantryError::InvalidArgument(ValidationError::OrganizationIdsRequired)
    ));
}
