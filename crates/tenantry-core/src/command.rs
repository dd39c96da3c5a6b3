//! Commands and their handlers, one closed enum per aggregate.
//!
//! A handler is built around an editor, the aggregate loaded inside the
//! active transaction, and an [`EventSink`](crate::publisher::EventSink).
//! `handle` mutates the aggregate through its domain methods and publishes
//! exactly one event before returning. Handlers do not deduplicate retried
//! commands.

pub mod environment;
pub mod organization;
pub mod project;

use serde::de::DeserializeOwned;

use crate::error::{TenantryError, TenantryResult, ValidationError};

pub use environment::{EnvironmentCommand, EnvironmentCommandHandler};
pub use organization::{OrganizationCommand, OrganizationCommandHandler};
pub use project::{ProjectCommand, ProjectCommandHandler};

/// Checks `kind` against the known kinds before decoding its payload.
fn decode_payload<T: DeserializeOwned>(
    known: &[&str],
    kind: &str,
    payload: serde_json::Value,
) -> TenantryResult<T> {
    if !known.contains(&kind) {
        return Err(TenantryError::UnknownCommand(kind.to_string()));
    }
    serde_json::from_value(payload).map_err(|e| {
        ValidationError::MalformedCommand {
            kind: kind.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

/// Payload of commands that carry no data.
#[derive(serde::Deserialize)]
struct Empty {}

#[derive(serde::Deserialize)]
struct Name {
    name: String,
}

#[derive(serde::Deserialize)]
struct Description {
    description: String,
}
