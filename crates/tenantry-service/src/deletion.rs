//! Cascade deletion of environments and organizations.
//!
//! Every run counts the dependent rows first. A dry run stops there and
//! reports the counts; a real run deletes everything it counted inside one
//! transaction, so either all requested targets go or none do.

use surrealdb::{Connection, Surreal};
use tenantry_core::error::{PreconditionError, TenantryError, TenantryResult, ValidationError};
use tenantry_core::models::deletion::{
    DeletableTable, EnvironmentDeletionSummary, OrganizationDeletionSummary,
};
use tenantry_core::repository::{
    EnvironmentRepository, ListOptions, OrganizationRepository, ProjectRepository,
};
use tenantry_db::repository::{
    SurrealAccountStorage, SurrealEnvironmentDataStorage, SurrealEnvironmentStorage,
    SurrealOrganizationStorage, SurrealProjectStorage,
};
use tenantry_db::{Transaction, run_in_transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ServiceConfig;

pub struct DeletionService<C: Connection> {
    db: Surreal<C>,
    config: ServiceConfig,
}

impl<C: Connection> DeletionService<C> {
    pub fn new(db: Surreal<C>, config: ServiceConfig) -> Self {
        Self { db, config }
    }

    /// Deletes the dependent rows of each environment and then the
    /// environment itself.
    ///
    /// Returns one summary per distinct requested id, in request order.
    /// Rows in a protected table fail the call unless `force` is set. A
    /// dry run never checks protection and never writes.
    ///
    /// The summary holds the counts taken before the batch is staged, so a
    /// real run reports what a dry run would. Counting happens outside the
    /// deleting transaction: rows inserted between the count and the commit
    /// are deleted but not reported.
    pub async fn delete_environment_data(
        &self,
        environment_ids: &[Uuid],
        dry_run: bool,
        force: bool,
    ) -> TenantryResult<Vec<EnvironmentDeletionSummary>> {
        if environment_ids.is_empty() {
            return Err(ValidationError::EnvironmentIdsRequired.into());
        }
        let environment_ids = distinct(environment_ids);

        let summaries = self.count_environments(&environment_ids).await?;
        if dry_run {
            info!(
                environments = summaries.len(),
                rows = summaries.iter().map(EnvironmentDeletionSummary::total).sum::<u64>(),
                "Dry run of environment deletion"
            );
            return Ok(summaries);
        }
        if !force {
            self.check_protected(&summaries)?;
        }

        run_in_transaction(&self.db, |tx| {
            let environment_ids = &environment_ids;
            async move {
                for id in environment_ids {
                    stage_environment_deletion(&tx, *id).await?;
                }
                debug!(statements = tx.staged_len(), "Environment deletion staged");
                Ok::<_, TenantryError>(())
            }
        })
        .await?;

        for summary in &summaries {
            info!(
                environment_id = %summary.environment_id,
                rows = summary.total(),
                forced = force,
                "Environment data deleted"
            );
        }
        Ok(summaries)
    }

    /// Deletes each organization with its projects, their environments
    /// (dependent rows included) and the organization's accounts.
    ///
    /// The system-admin organization is refused before anything is counted.
    /// Counts are taken before the batch is staged, as for environments.
    pub async fn delete_organization_data(
        &self,
        organization_ids: &[Uuid],
        dry_run: bool,
    ) -> TenantryResult<Vec<OrganizationDeletionSummary>> {
        if organization_ids.is_empty() {
            return Err(ValidationError::OrganizationIdsRequired.into());
        }
        let organization_ids = distinct(organization_ids);

        let organizations = SurrealOrganizationStorage::new(&self.db);
        for id in &organization_ids {
            if organizations.get(*id).await?.system_admin {
                warn!(organization_id = %id, "Refusing to delete the system-admin organization");
                return Err(PreconditionError::CannotDeleteSystemAdmin.into());
            }
        }

        let mut plans = Vec::with_capacity(organization_ids.len());
        for id in &organization_ids {
            plans.push(self.plan_organization(*id).await?);
        }
        let summaries: Vec<OrganizationDeletionSummary> =
            plans.iter().map(|plan| plan.summary.clone()).collect();
        if dry_run {
            info!(organizations = summaries.len(), "Dry run of organization deletion");
            return Ok(summaries);
        }

        run_in_transaction(&self.db, |tx| {
            let plans = &plans;
            async move {
                for plan in plans {
                    let organization_id = plan.summary.organization_id;
                    for environment_id in &plan.environment_ids {
                        stage_environment_deletion(&tx, *environment_id).await?;
                    }
                    SurrealProjectStorage::new(&tx)
                        .delete_by_organization(organization_id)
                        .await?;
                    SurrealAccountStorage::new(&tx)
                        .delete_by_organization(organization_id)
                        .await?;
                    SurrealOrganizationStorage::new(&tx)
                        .delete(organization_id)
                        .await?;
                }
                debug!(statements = tx.staged_len(), "Organization deletion staged");
                Ok::<_, TenantryError>(())
            }
        })
        .await?;

        for summary in &summaries {
            info!(
                organization_id = %summary.organization_id,
                projects = summary.projects,
                environments = summary.environments,
                accounts = summary.accounts,
                "Organization data deleted"
            );
        }
        Ok(summaries)
    }

    async fn count_environments(
        &self,
        ids: &[Uuid],
    ) -> TenantryResult<Vec<EnvironmentDeletionSummary>> {
        let data = SurrealEnvironmentDataStorage::new(&self.db);
        let mut summaries = Vec::with_capacity(ids.len());
        for id in ids {
            let counts = data.count_all(*id).await?;
            summaries.push(EnvironmentDeletionSummary::from_counts(*id, &counts));
        }
        Ok(summaries)
    }

    fn check_protected(&self, summaries: &[EnvironmentDeletionSummary]) -> TenantryResult<()> {
        for summary in summaries {
            for table in &self.config.protected_tables {
                let count = summary.count(*table);
                if count > 0 {
                    warn!(
                        environment_id = %summary.environment_id,
                        table = table.as_str(),
                        count,
                        "Protected data present"
                    );
                    return Err(PreconditionError::ProtectedDataPresent {
                        table: table.as_str().to_string(),
                        count,
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    async fn plan_organization(&self, organization_id: Uuid) -> TenantryResult<OrganizationPlan> {
        let scope = ListOptions::new().eq("organization_id", organization_id.to_string());

        let projects = SurrealProjectStorage::new(&self.db).count(&scope).await?;
        let environment_ids: Vec<Uuid> = SurrealEnvironmentStorage::new(&self.db)
            .list(&scope)
            .await?
            .items
            .into_iter()
            .map(|environment| environment.id)
            .collect();
        let accounts = SurrealAccountStorage::new(&self.db)
            .count_by_organization(organization_id)
            .await?;
        let environment_summaries = self.count_environments(&environment_ids).await?;

        Ok(OrganizationPlan {
            summary: OrganizationDeletionSummary {
                organization_id,
                projects,
                environments: environment_ids.len() as u64,
                accounts,
                environment_summaries,
            },
            environment_ids,
        })
    }
}

struct OrganizationPlan {
    summary: OrganizationDeletionSummary,
    environment_ids: Vec<Uuid>,
}

/// Stages the dependent-table deletes and the guarded environment delete.
async fn stage_environment_deletion<C: Connection>(
    tx: &Transaction<C>,
    environment_id: Uuid,
) -> TenantryResult<()> {
    let data = SurrealEnvironmentDataStorage::new(tx);
    for table in DeletableTable::ALL {
        data.delete_by_environment(table, environment_id).await?;
    }
    SurrealEnvironmentStorage::new(tx).delete(environment_id).await
}

/// Drops repeated ids, keeping first occurrences in order.
fn distinct(ids: &[Uuid]) -> Vec<Uuid> {
    let mut out: Vec<Uuid> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(id) {
            out.push(*id);
        }
    }
    out
}
