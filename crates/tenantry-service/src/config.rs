//! Service configuration.

use serde::Deserialize;
use tenantry_core::models::deletion::DeletableTable;

/// Configuration shared by the lifecycle services and the cascade deleter.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Page size used when a list request asks for 0 (default: 50).
    pub default_page_size: u64,
    /// Largest page a list request may ask for (default: 500).
    pub max_page_size: u64,
    /// Name of the project created with every organization.
    pub default_project_name: String,
    /// URL code of the project created with every organization.
    pub default_project_url_code: String,
    /// Tables whose rows block environment deletion unless it is forced.
    pub protected_tables: Vec<DeletableTable>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_page_size: 50,
            max_page_size: 500,
            default_project_name: "Default".into(),
            default_project_url_code: "default".into(),
            protected_tables: Vec::new(),
        }
    }
}
