//! Integration tests for batched writes through `run_in_transaction`.

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use tenantry_core::error::TenantryError;
use tenantry_core::models::deletion::{DeletableTable, EnvironmentRecord};
use tenantry_core::models::organization::{CreateOrganization, Organization};
use tenantry_core::repository::{ListOptions, OrganizationRepository};
use tenantry_db::repository::{
    SurrealEnvironmentDataStorage, SurrealEnvironmentStorage, SurrealOrganizationStorage,
};
use tenantry_db::{QueryExecutor, Statement, run_in_transaction};
use uuid::Uuid;

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    tenantry_db::run_migrations(&db).await.unwrap();
    db
}

fn organization(url_code: &str) -> Organization {
    Organization::new(CreateOrganization {
        name: url_code.to_uppercase(),
        url_code: url_code.into(),
        owner_email: "owner@acme.io".into(),
        description: String::new(),
        trial: false,
        system_admin: false,
    })
    .unwrap()
}

async fn organization_count(db: &Surreal<Db>) -> u64 {
    SurrealOrganizationStorage::new(db)
        .count(&ListOptions::new())
        .await
        .unwrap()
}

#[tokio::test]
async fn ok_closure_commits_every_staged_write() {
    let db = setup().await;
    let first = organization("first");
    let second = organization("second");

    let staged = run_in_transaction(&db, |tx| {
        let (first, second) = (first.clone(), second.clone());
        async move {
            let storage = SurrealOrganizationStorage::new(&tx);
            storage.create(&first).await?;
            storage.create(&second).await?;
            Ok::<_, TenantryError>(tx.staged_len())
        }
    })
    .await
    .unwrap();

    assert_eq!(staged, 2);
    assert_eq!(organization_count(&db).await, 2);
}

#[tokio::test]
async fn err_closure_commits_nothing() {
    let db = setup().await;
    let org = organization("doomed");

    let err = run_in_transaction(&db, |tx| {
        let org = org.clone();
        async move {
            SurrealOrganizationStorage::new(&tx).create(&org).await?;
            Err::<(), _>(TenantryError::Internal("stop".into()))
        }
    })
    .await
    .unwrap_err();

    assert!(matches!(err, TenantryError::Internal(_)));
    assert_eq!(organization_count(&db).await, 0);
}

#[tokio::test]
async fn missing_row_rolls_back_the_whole_batch() {
    let db = setup().await;
    let env_id = Uuid::new_v4();
    let data = SurrealEnvironmentDataStorage::new(&db);
    data.insert(DeletableTable::Tag, &EnvironmentRecord::new("t1", env_id, "beta"))
        .await
        .unwrap();

    // The environment row itself was never created, so its delete fails.
    let err = run_in_transaction(&db, |tx| async move {
        SurrealEnvironmentDataStorage::new(&tx)
            .delete_by_environment(DeletableTable::Tag, env_id)
            .await?;
        SurrealEnvironmentStorage::new(&tx).delete(env_id).await?;
        Ok::<_, TenantryError>(())
    })
    .await
    .unwrap_err();

    assert!(
        matches!(
            &err,
            TenantryError::NotFound { entity, id }
                if entity == "environment" && *id == env_id.to_string()
        ),
        "unexpected error: {err:?}"
    );
    assert_eq!(
        data.count_by_environment(DeletableTable::Tag, env_id).await.unwrap(),
        1,
        "tag rows survive the cancelled batch"
    );
}

#[tokio::test]
async fn unique_violation_in_batch_is_already_exists() {
    let db = setup().await;
    let a = organization("same");
    let b = organization("same");

    let err = run_in_transaction(&db, |tx| {
        let (a, b) = (a.clone(), b.clone());
        async move {
            let storage = SurrealOrganizationStorage::new(&tx);
            storage.create(&a).await?;
            storage.create(&b).await?;
            Ok::<_, TenantryError>(())
        }
    })
    .await
    .unwrap_err();

    assert!(matches!(err, TenantryError::AlreadyExists { .. }));
    assert_eq!(organization_count(&db).await, 0);
}

#[tokio::test]
async fn row_deleted_after_load_fails_the_update_at_commit() {
    let db = setup().await;
    let org = organization("vanishing");
    SurrealOrganizationStorage::new(&db).create(&org).await.unwrap();

    let other_writer = db.clone();
    let err = run_in_transaction(&db, |tx| async move {
        let storage = SurrealOrganizationStorage::new(&tx);
        let mut loaded = storage.get(org.id).await?;
        SurrealOrganizationStorage::new(&other_writer)
            .delete(org.id)
            .await?;

        loaded.disable()?;
        storage.update(&loaded).await?;
        Ok::<_, TenantryError>(())
    })
    .await
    .unwrap_err();

    assert!(
        matches!(err, TenantryError::UnexpectedAffectedRows { .. }),
        "unexpected error: {err:?}"
    );
    assert_eq!(organization_count(&db).await, 0);
}

#[tokio::test]
async fn reads_inside_a_transaction_do_not_see_staged_writes() {
    let db = setup().await;
    let org = organization("pending");

    let seen = run_in_transaction(&db, |tx| {
        let org = org.clone();
        async move {
            let storage = SurrealOrganizationStorage::new(&tx);
            storage.create(&org).await?;
            storage.count(&ListOptions::new()).await
        }
    })
    .await
    .unwrap();

    assert_eq!(seen, 0);
    assert_eq!(organization_count(&db).await, 1);
}

#[tokio::test]
async fn database_executor_commits_each_statement() {
    let db = setup().await;
    let storage = SurrealOrganizationStorage::new(&db);
    storage.create(&organization("direct")).await.unwrap();
    assert_eq!(organization_count(&db).await, 1);
}

#[tokio::test]
async fn statement_parameters_do_not_collide() {
    let db = setup().await;

    run_in_transaction(&db, |tx| async move {
        for name in ["a", "b"] {
            tx.execute(
                Statement::new(
                    "tag",
                    "CREATE tag SET environment_id = 'e', name = $name, created_at = 0",
                )
                .bind("name", name),
            )
            .await?;
        }
        Ok::<_, TenantryError>(())
    })
    .await
    .unwrap();

    let mut result = db.query("SELECT VALUE name FROM tag").await.unwrap();
    let mut names: Vec<String> = result.take(0).unwrap();
    names.sort();
    assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
}
