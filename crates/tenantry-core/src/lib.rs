//! Tenantry Core: domain model, commands, domain events and repository
//! contracts for the Organization → Project → Environment hierarchy.

pub mod command;
pub mod error;
pub mod event;
pub mod models;
pub mod publisher;
pub mod repository;
pub mod validation;

pub use error::{TenantryError, TenantryResult};
