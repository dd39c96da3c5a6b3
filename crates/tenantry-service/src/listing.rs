//! Paging and ordering inputs shared by the list operations.

use serde::Deserialize;
use tenantry_core::error::{TenantryResult, ValidationError};
use tenantry_core::repository::{Cursor, Direction};

use crate::config::ServiceConfig;

/// Paging window, free-text keyword and sort direction of a list request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PageRequest {
    /// 0 selects the configured default.
    pub page_size: u64,
    /// Opaque cursor from a previous page; empty for the first page.
    pub cursor: String,
    pub search_keyword: String,
    pub direction: Direction,
}

/// Resolves the page size and cursor. Runs before any query is issued.
pub(crate) fn resolve_page(
    config: &ServiceConfig,
    page: &PageRequest,
) -> TenantryResult<(u64, Cursor)> {
    if page.page_size > config.max_page_size {
        return Err(ValidationError::PageSizeTooLarge {
            max: config.max_page_size,
        }
        .into());
    }
    let page_size = if page.page_size == 0 {
        config.default_page_size
    } else {
        page.page_size
    };
    Ok((page_size, Cursor::parse(&page.cursor)?))
}
