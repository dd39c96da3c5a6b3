//! Tenantry Service: the operation surface over the storage layer.
//!
//! Each mutation validates its input, then runs inside one scoped
//! transaction: load the aggregate, apply the command through its handler,
//! stage the write, commit. The events collected by the handler are
//! delivered once the commit has succeeded.

pub mod config;
pub mod deletion;
pub mod environment;
mod events;
pub mod listing;
pub mod organization;
pub mod project;

pub use config::ServiceConfig;
pub use deletion::DeletionService;
pub use environment::{EnvironmentOrderBy, EnvironmentService, ListEnvironmentsRequest};
pub use listing::PageRequest;
pub use organization::{ListOrganizationsRequest, OrganizationOrderBy, OrganizationService};
pub use project::{ListProjectsRequest, ProjectOrderBy, ProjectService};
