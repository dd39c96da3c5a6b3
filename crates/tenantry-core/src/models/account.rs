//! Organization-scoped account records.
//!
//! Accounts are owned by the account service; this crate only needs to
//! store, count and cascade-delete them with their organization.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::unix_now;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub email: String,
    pub organization_id: Uuid,
    pub name: String,
    pub created_at: i64,
}

impl Account {
    pub fn new(organization_id: Uuid, email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            organization_id,
            name: name.into(),
            created_at: unix_now(),
        }
    }
}
