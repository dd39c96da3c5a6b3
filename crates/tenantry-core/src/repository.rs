//! Repository trait definitions and list options.
//!
//! All repository operations are async. Storage implementations live in
//! `tenantry-db`; they may run against the database directly or inside a
//! scoped transaction, so the traits only describe the data access.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{TenantryResult, ValidationError};
use crate::models::{environment::Environment, organization::Organization, project::Project};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub operator: Operator,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InFilter {
    pub column: String,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NullFilter {
    pub column: String,
    pub is_null: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonFunc {
    /// The value at the path is an array containing the argument.
    Contains,
    Equals,
}

/// Filter on a nested value of an object column.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonFilter {
    pub column: String,
    pub path: Vec<String>,
    pub func: JsonFunc,
    pub value: Value,
}

/// Case-insensitive substring match over several columns, ORed together.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub columns: Vec<String>,
    pub keyword: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

/// Everything a list query may be narrowed by. All conditions are ANDed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListOptions {
    pub filters: Vec<Filter>,
    pub in_filters: Vec<InFilter>,
    pub null_filters: Vec<NullFilter>,
    pub json_filters: Vec<JsonFilter>,
    pub search: Option<SearchQuery>,
    pub orders: Vec<Order>,
    /// `None` returns every matching row.
    pub limit: Option<u64>,
    pub offset: u64,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, column: &str, operator: Operator, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            column: column.to_string(),
            operator,
            value: value.into(),
        });
        self
    }

    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(column, Operator::Eq, value)
    }

    pub fn in_list<V: Into<Value>>(
        mut self,
        column: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.in_filters.push(InFilter {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn is_null(mut self, column: &str, is_null: bool) -> Self {
        self.null_filters.push(NullFilter {
            column: column.to_string(),
            is_null,
        });
        self
    }

    pub fn json(
        mut self,
        column: &str,
        path: &[&str],
        func: JsonFunc,
        value: impl Into<Value>,
    ) -> Self {
        self.json_filters.push(JsonFilter {
            column: column.to_string(),
            path: path.iter().map(|s| s.to_string()).collect(),
            func,
            value: value.into(),
        });
        self
    }

    /// Blank keywords are ignored.
    pub fn search(mut self, columns: &[&str], keyword: &str) -> Self {
        let keyword = keyword.trim();
        if !keyword.is_empty() {
            self.search = Some(SearchQuery {
                columns: columns.iter().map(|s| s.to_string()).collect(),
                keyword: keyword.to_string(),
            });
        }
        self
    }

    pub fn order_by(mut self, column: &str, direction: Direction) -> Self {
        self.orders.push(Order {
            column: column.to_string(),
            direction,
        });
        self
    }

    /// A page size of zero means "no limit".
    pub fn page(mut self, page_size: u64, cursor: Cursor) -> Self {
        self.limit = (page_size > 0).then_some(page_size);
        self.offset = cursor.offset();
        self
    }

    /// Same conditions, without ordering or paging.
    pub fn without_paging(&self) -> Self {
        Self {
            orders: Vec::new(),
            limit: None,
            offset: 0,
            ..self.clone()
        }
    }
}

/// Opaque paging position. Encoded as the decimal row offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor(u64);

impl Cursor {
    /// An empty string is the first page.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        if s.is_empty() {
            return Ok(Self(0));
        }
        s.parse::<u64>()
            .map(Self)
            .map_err(|_| ValidationError::InvalidCursor(s.to_string()))
    }

    pub fn from_offset(offset: u64) -> Self {
        Self(offset)
    }

    pub fn offset(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A paginated result set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    /// Rows matching the conditions, ignoring paging.
    pub total: u64,
    pub offset: u64,
    pub next_cursor: String,
}

impl<T> PaginatedResult<T> {
    pub fn new(items: Vec<T>, total: u64, offset: u64) -> Self {
        let next_cursor = Cursor::from_offset(offset + items.len() as u64).to_string();
        Self {
            items,
            total,
            offset,
            next_cursor,
        }
    }
}

pub trait OrganizationRepository: Send + Sync {
    fn create(&self, organization: &Organization)
    -> impl Future<Output = TenantryResult<()>> + Send;
    /// Fails with `UnexpectedAffectedRows` unless exactly one row changes.
    fn update(&self, organization: &Organization)
    -> impl Future<Output = TenantryResult<()>> + Send;
    fn get(&self, id: Uuid) -> impl Future<Output = TenantryResult<Organization>> + Send;
    fn get_by_url_code(
        &self,
        url_code: &str,
    ) -> impl Future<Output = TenantryResult<Organization>> + Send;
    fn get_system_admin(&self) -> impl Future<Output = TenantryResult<Option<Organization>>> + Send;
    fn list(
        &self,
        options: &ListOptions,
    ) -> impl Future<Output = TenantryResult<PaginatedResult<Organization>>> + Send;
    fn count(&self, options: &ListOptions) -> impl Future<Output = TenantryResult<u64>> + Send;
}

pub trait ProjectRepository: Send + Sync {
    fn create(&self, project: &Project) -> impl Future<Output = TenantryResult<()>> + Send;
    fn update(&self, project: &Project) -> impl Future<Output = TenantryResult<()>> + Send;
    fn get(&self, id: Uuid) -> impl Future<Output = TenantryResult<Project>> + Send;
    fn get_by_url_code(
        &self,
        organization_id: Uuid,
        url_code: &str,
    ) -> impl Future<Output = TenantryResult<Project>> + Send;
    fn list(
        &self,
        options: &ListOptions,
    ) -> impl Future<Output = TenantryResult<PaginatedResult<Project>>> + Send;
    fn count(&self, options: &ListOptions) -> impl Future<Output = TenantryResult<u64>> + Send;
}

pub trait EnvironmentRepository: Send + Sync {
    fn create(&self, environment: &Environment) -> impl Future<Output = TenantryResult<()>> + Send;
    fn update(&self, environment: &Environment) -> impl Future<Output = TenantryResult<()>> + Send;
    /// Includes the feature flag count projection.
    fn get(&self, id: Uuid) -> impl Future<Output = TenantryResult<Environment>> + Send;
    fn get_by_url_code(
        &self,
        project_id: Uuid,
        url_code: &str,
    ) -> impl Future<Output = TenantryResult<Environment>> + Send;
    fn list(
        &self,
        options: &ListOptions,
    ) -> impl Future<Output = TenantryResult<PaginatedResult<Environment>>> + Send;
    fn count(&self, options: &ListOptions) -> impl Future<Output = TenantryResult<u64>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_parses_offsets_and_rejects_garbage() {
        assert_eq!(Cursor::parse("").unwrap().offset(), 0);
        assert_eq!(Cursor::parse("40").unwrap().offset(), 40);
        assert_eq!(
            Cursor::parse("abc"),
            Err(ValidationError::InvalidCursor("abc".into()))
        );
        assert!(Cursor::parse("-1").is_err());
    }

    #[test]
    fn next_cursor_is_offset_plus_page_length() {
        let page = PaginatedResult::new(vec![1, 2, 3], 10, 4);
        assert_eq!(page.next_cursor, "7");
        assert_eq!(Cursor::parse(&page.next_cursor).unwrap().offset(), 7);
    }

    #[test]
    fn page_size_zero_means_unlimited() {
        let opts = ListOptions::new().page(0, Cursor::from_offset(5));
        assert_eq!(opts.limit, None);
        assert_eq!(opts.offset, 5);
    }

    #[test]
    fn without_paging_keeps_conditions() {
        let opts = ListOptions::new()
            .eq("archived", false)
            .search(&["name"], "prod")
            .order_by("name", Direction::Desc)
            .page(10, Cursor::from_offset(20));
        let count = opts.without_paging();
        assert_eq!(count.filters, opts.filters);
        assert_eq!(count.search, opts.search);
        assert!(count.orders.is_empty());
        assert_eq!(count.limit, None);
        assert_eq!(count.offset, 0);
    }

    #[test]
    fn blank_search_keyword_is_ignored() {
        assert!(ListOptions::new().search(&["name"], "   ").search.is_none());
    }
}
