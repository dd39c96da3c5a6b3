//! Renders [`ListOptions`] into SurrealQL.
//!
//! Only column identifiers are interpolated, and only after matching
//! [`COLUMN_PATTERN`]. Every value is bound as `$p0`, `$p1`, ... in the
//! order the conditions are rendered, so identical options always produce
//! identical text.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tenantry_core::error::ValidationError;
use tenantry_core::repository::{JsonFunc, ListOptions};

use crate::error::DbError;

pub const COLUMN_PATTERN: &str = r"^[a-z_][a-z0-9_]*(\.[a-z_][a-z0-9_]*)*$";

static COLUMN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(COLUMN_PATTERN).expect("column pattern compiles"));

/// Statement text plus its named parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub text: String,
    pub binds: Vec<(String, Value)>,
}

pub fn validate_column(column: &str) -> Result<(), ValidationError> {
    if COLUMN.is_match(column) {
        Ok(())
    } else {
        Err(ValidationError::InvalidColumn(column.to_string()))
    }
}

#[derive(Default)]
struct Params(Vec<(String, Value)>);

impl Params {
    fn push(&mut self, value: Value) -> String {
        let name = format!("p{}", self.0.len());
        let placeholder = format!("${name}");
        self.0.push((name, value));
        placeholder
    }
}

/// `select` is a fixed projection such as
/// `SELECT meta::id(id) AS record_id, * FROM environment`.
pub fn build_select(select: &str, options: &ListOptions) -> Result<BuiltQuery, DbError> {
    let mut params = Params::default();
    let mut text = String::from(select);
    text.push_str(&where_clause(options, &mut params)?);

    let mut orders = Vec::with_capacity(options.orders.len() + 1);
    for order in &options.orders {
        validate_column(&order.column)?;
        orders.push(format!("{} {}", order.column, order.direction.as_sql()));
    }
    orders.push("id ASC".to_string());
    text.push_str(" ORDER BY ");
    text.push_str(&orders.join(", "));

    if let Some(limit) = options.limit {
        let p = params.push(Value::from(limit));
        text.push_str(&format!(" LIMIT {p}"));
    }
    if options.offset > 0 {
        let p = params.push(Value::from(options.offset));
        text.push_str(&format!(" START {p}"));
    }

    Ok(BuiltQuery {
        text,
        binds: params.0,
    })
}

/// Count query sharing the conditions of [`build_select`]; ordering and
/// paging are dropped.
pub fn build_count(table: &str, options: &ListOptions) -> Result<BuiltQuery, DbError> {
    let mut params = Params::default();
    let text = format!(
        "SELECT count() AS total FROM {table}{} GROUP ALL",
        where_clause(options, &mut params)?
    );
    Ok(BuiltQuery {
        text,
        binds: params.0,
    })
}

fn where_clause(options: &ListOptions, params: &mut Params) -> Result<String, DbError> {
    let mut conditions = Vec::new();

    for filter in &options.filters {
        validate_column(&filter.column)?;
        let p = params.push(filter.value.clone());
        conditions.push(format!("{} {} {p}", filter.column, filter.operator.as_sql()));
    }

    for filter in &options.in_filters {
        validate_column(&filter.column)?;
        let p = params.push(Value::Array(filter.values.clone()));
        conditions.push(format!("{} IN {p}", filter.column));
    }

    for filter in &options.null_filters {
        validate_column(&filter.column)?;
        let op = if filter.is_null { "=" } else { "!=" };
        conditions.push(format!("{} {op} NONE", filter.column));
    }

    for filter in &options.json_filters {
        let mut path = filter.column.clone();
        for segment in &filter.path {
            path.push('.');
            path.push_str(segment);
        }
        validate_column(&path)?;
        let p = params.push(filter.value.clone());
        let op = match filter.func {
            JsonFunc::Contains => "CONTAINS",
            JsonFunc::Equals => "=",
        };
        conditions.push(format!("{path} {op} {p}"));
    }

    if let Some(search) = options.search.as_ref().filter(|s| !s.columns.is_empty()) {
        for column in &search.columns {
            validate_column(column)?;
        }
        let p = params.push(Value::from(search.keyword.to_lowercase()));
        let ors: Vec<String> = search
            .columns
            .iter()
            .map(|c| format!("string::contains(string::lowercase({c}), {p})"))
            .collect();
        conditions.push(format!("({})", ors.join(" OR ")));
    }

    if conditions.is_empty() {
        Ok(String::new())
    } else {
        Ok(format!(" WHERE {}", conditions.join(" AND ")))
    }
}
