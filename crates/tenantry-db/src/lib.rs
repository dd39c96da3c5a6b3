//! Tenantry Database: SurrealDB connection management, migrations,
//! query construction, scoped transactions and storage implementations.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - Rendering of list options into SurrealQL ([`query`])
//! - Batched all-or-nothing writes ([`run_in_transaction`])
//! - Storages implementing the `tenantry-core` repository traits

mod connection;
mod error;
pub mod query;
pub mod repository;
mod schema;
pub mod transaction;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use schema::{latest_version, run_migrations};
pub use transaction::{QueryExecutor, Statement, Transaction, run_in_transaction};
