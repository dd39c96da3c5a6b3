//! Tenantry operator binary: schema migrations, organization bootstrap and
//! cascade deletions.

mod config;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tenantry_core::event::Editor;
use tenantry_core::models::organization::CreateOrganization;
use tenantry_core::publisher::LogPublisher;
use tenantry_db::{DbManager, latest_version, run_migrations};
use tenantry_service::{DeletionService, OrganizationService};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::CliError;

#[derive(Parser)]
#[command(name = "tenantry")]
#[command(about = "Operator tooling for the Tenantry lifecycle engine")]
struct Cli {
    /// TOML config file; defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Overrides `db.url` from the config file.
    #[arg(long, global = true)]
    url: Option<String>,
    /// Overrides `log_filter` from the config file and `RUST_LOG`.
    #[arg(long, global = true)]
    log_filter: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Applies pending schema migrations.
    Migrate,
    /// Creates an organization together with its default project.
    CreateOrganization {
        #[arg(long)]
        name: String,
        #[arg(long)]
        url_code: String,
        #[arg(long)]
        owner_email: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        trial: bool,
        #[arg(long)]
        system_admin: bool,
    },
    /// Deletes environments and every row scoped to them.
    DeleteEnvironmentData {
        #[arg(long = "environment-id")]
        environment_ids: Vec<Uuid>,
        /// Only count what would be deleted.
        #[arg(long)]
        dry_run: bool,
        /// Delete even when protected tables hold rows.
        #[arg(long)]
        force: bool,
    },
    /// Deletes organizations with their projects, environments and accounts.
    DeleteOrganizationData {
        #[arg(long = "organization-id")]
        organization_ids: Vec<Uuid>,
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(url) = cli.url {
        config.db.url = url;
    }

    if let Err(err) = init_tracing(cli.log_filter.as_deref(), &config.log_filter) {
        eprintln!("{err}");
        return ExitCode::FAILURE;
    }

    match run(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "Command failed");
            ExitCode::FAILURE
        }
    }
}

/// JSON logs. The flag wins over `RUST_LOG`, which wins over the config file.
fn init_tracing(flag: Option<&str>, configured: &str) -> Result<(), CliError> {
    let filter = match flag {
        Some(directives) => EnvFilter::try_new(directives),
        None => EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(configured)),
    }
    .map_err(|e| CliError::LogFilter(e.to_string()))?;

    tracing_subscriber::fmt().with_env_filter(filter).json().init();
    Ok(())
}

async fn run(command: Command, config: AppConfig) -> Result<(), CliError> {
    let manager = DbManager::connect(&config.db).await?;
    let db = manager.client().clone();

    match command {
        Command::Migrate => {
            run_migrations(&db).await?;
            info!(version = latest_version(), "Schema is up to date");
        }
        Command::CreateOrganization {
            name,
            url_code,
            owner_email,
            description,
            trial,
            system_admin,
        } => {
            let editor = Editor::admin(owner_email.clone());
            let service = OrganizationService::new(db, LogPublisher, config.service);
            let organization = service
                .create(
                    &editor,
                    CreateOrganization {
                        name,
                        url_code,
                        owner_email,
                        description,
                        trial,
                        system_admin,
                    },
                )
                .await?;
            print_json(&organization)?;
        }
        Command::DeleteEnvironmentData {
            environment_ids,
            dry_run,
            force,
        } => {
            let summaries = DeletionService::new(db, config.service)
                .delete_environment_data(&environment_ids, dry_run, force)
                .await?;
            print_json(&summaries)?;
        }
        Command::DeleteOrganizationData {
            organization_ids,
            dry_run,
        } => {
            let summaries = DeletionService::new(db, config.service)
                .delete_organization_data(&organization_ids, dry_run)
                .await?;
            print_json(&summaries)?;
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
