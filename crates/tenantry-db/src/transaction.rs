//! Scoped transactions over SurrealDB.
//!
//! A [`Transaction`] stages write [`Statement`]s while the caller's closure
//! runs; reads go to the database immediately. When the closure returns
//! `Ok`, the staged statements are sent as one
//! `BEGIN TRANSACTION ... COMMIT TRANSACTION` batch. On `Err`, a panic, or
//! a dropped future nothing is sent.
//!
//! Row-count guards are compiled into the batch as `IF ... { THROW }`, so
//! a guard failure cancels every statement in it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use surrealdb::{Connection, Surreal};
use tenantry_core::error::TenantryResult;
use tracing::{debug, warn};

use crate::error::DbError;

const GUARD_MARKER: &str = "tenantry_guard:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardKind {
    /// Zero or several rows fail with `UnexpectedAffectedRows`.
    AffectedExactlyOne,
    /// Zero rows fail with `NotFound`.
    MustExist,
}

#[derive(Debug, Clone, PartialEq)]
struct Guard {
    kind: GuardKind,
    id: String,
}

/// One write: statement text, its named parameters and an optional
/// row-count guard.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    entity: &'static str,
    text: String,
    binds: Vec<(String, Value)>,
    guard: Option<Guard>,
}

impl Statement {
    pub fn new(entity: &'static str, text: impl Into<String>) -> Self {
        Self {
            entity,
            text: text.into(),
            binds: Vec::new(),
            guard: None,
        }
    }

    pub fn bind(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.binds.push((name.to_string(), value.into()));
        self
    }

    pub fn bind_all(mut self, binds: impl IntoIterator<Item = (String, Value)>) -> Self {
        self.binds.extend(binds);
        self
    }

    /// The statement must yield exactly one row, so its text needs a
    /// `RETURN BEFORE` or `RETURN AFTER` clause.
    pub fn expect_one(mut self, id: impl ToString) -> Self {
        self.guard = Some(Guard {
            kind: GuardKind::AffectedExactlyOne,
            id: id.to_string(),
        });
        self
    }

    pub fn must_exist(mut self, id: impl ToString) -> Self {
        self.guard = Some(Guard {
            kind: GuardKind::MustExist,
            id: id.to_string(),
        });
        self
    }

    pub fn entity(&self) -> &'static str {
        self.entity
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Something statements can be executed through: the database itself
/// (each write commits on its own) or a [`Transaction`] (writes are
/// staged).
pub trait QueryExecutor: Send + Sync {
    type Conn: Connection;

    /// Client for reads, which are never staged.
    fn client(&self) -> &Surreal<Self::Conn>;

    fn execute(&self, statement: Statement) -> impl Future<Output = Result<(), DbError>> + Send;
}

impl<C: Connection> QueryExecutor for Surreal<C> {
    type Conn = C;

    fn client(&self) -> &Surreal<C> {
        self
    }

    async fn execute(&self, statement: Statement) -> Result<(), DbError> {
        commit(self, vec![statement]).await
    }
}

/// Handle passed into [`run_in_transaction`] closures. Cheap to clone;
/// clones share the staged batch.
pub struct Transaction<C: Connection> {
    db: Surreal<C>,
    staged: Arc<Mutex<Vec<Statement>>>,
}

impl<C: Connection> Clone for Transaction<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            staged: Arc::clone(&self.staged),
        }
    }
}

impl<C: Connection> Transaction<C> {
    fn new(db: &Surreal<C>) -> Self {
        Self {
            db: db.clone(),
            staged: Arc::default(),
        }
    }

    pub fn stage(&self, statement: Statement) {
        debug!(entity = statement.entity, "Staging statement");
        self.staged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(statement);
    }

    pub fn staged_len(&self) -> usize {
        self.staged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn take(&self) -> Vec<Statement> {
        std::mem::take(&mut *self.staged.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl<C: Connection> QueryExecutor for Transaction<C> {
    type Conn = C;

    fn client(&self) -> &Surreal<C> {
        &self.db
    }

    async fn execute(&self, statement: Statement) -> Result<(), DbError> {
        self.stage(statement);
        Ok(())
    }
}

/// Runs `f` with a fresh transaction and commits what it staged if it
/// returns `Ok`. A failed commit is returned instead of `f`'s value.
pub async fn run_in_transaction<C, F, Fut, T>(db: &Surreal<C>, f: F) -> TenantryResult<T>
where
    C: Connection,
    F: FnOnce(Transaction<C>) -> Fut,
    Fut: Future<Output = TenantryResult<T>>,
{
    let tx = Transaction::new(db);
    let result = f(tx.clone()).await;
    let staged = tx.take();
    match result {
        Ok(value) => {
            commit(db, staged).await?;
            Ok(value)
        }
        Err(err) => {
            debug!(discarded = staged.len(), error = %err, "Transaction rolled back");
            Err(err)
        }
    }
}

async fn commit<C: Connection>(db: &Surreal<C>, statements: Vec<Statement>) -> Result<(), DbError> {
    if statements.is_empty() {
        return Ok(());
    }
    let (text, binds) = compile(&statements);
    debug!(statements = statements.len(), "Committing batch");

    let mut query = db.query(&text);
    for bind in binds {
        query = query.bind(bind);
    }
    let mut response = query.await?;

    let errors: HashMap<usize, surrealdb::Error> = response.take_errors();
    if errors.is_empty() {
        return Ok(());
    }
    let mut messages: Vec<(usize, String)> = errors
        .into_iter()
        .map(|(index, err)| (index, err.to_string()))
        .collect();
    messages.sort();
    let messages: Vec<String> = messages.into_iter().map(|(_, m)| m).collect();

    let err = classify(&statements, &messages);
    warn!(error = %err, "Batch cancelled");
    Err(err)
}

/// Builds the batch text. Parameters of statement `n` are renamed to
/// `s{n}_{name}` so that statements never see each other's values.
fn compile(statements: &[Statement]) -> (String, Vec<(String, Value)>) {
    let mut text = String::from("BEGIN TRANSACTION;\n");
    let mut binds = Vec::new();

    for (n, statement) in statements.iter().enumerate() {
        let prefix = format!("s{n}_");
        let names: Vec<&str> = statement.binds.iter().map(|(k, _)| k.as_str()).collect();
        let body = scope_params(&statement.text, &names, &prefix);

        match &statement.guard {
            None => {
                text.push_str(&body);
                text.push_str(";\n");
            }
            Some(_) => {
                text.push_str(&format!(
                    "LET ${prefix}rows = ({body});\n\
                     IF array::len(${prefix}rows) != 1 {{ THROW \"{GUARD_MARKER}{n}\" }};\n"
                ));
            }
        }

        binds.extend(
            statement
                .binds
                .iter()
                .map(|(k, v)| (format!("{prefix}{k}"), v.clone())),
        );
    }

    text.push_str("COMMIT TRANSACTION;");
    (text, binds)
}

/// Rewrites `$name` to `${prefix}name` for every bound name.
fn scope_params(text: &str, names: &[&str], prefix: &str) -> String {
    let mut out = String::with_capacity(text.len() + names.len() * prefix.len());
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let start = i + 1;
        let mut end = start;
        while let Some(&(j, d)) = chars.peek() {
            if d.is_ascii_alphanumeric() || d == '_' {
                end = j + d.len_utf8();
                chars.next();
            } else {
                break;
            }
        }
        let ident = &text[start..end];
        out.push('$');
        if names.contains(&ident) {
            out.push_str(prefix);
        }
        out.push_str(ident);
    }
    out
}

fn guard_index(message: &str) -> Option<usize> {
    let start = message.find(GUARD_MARKER)? + GUARD_MARKER.len();
    let digits: String = message[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn classify(statements: &[Statement], messages: &[String]) -> DbError {
    for message in messages {
        let Some(statement) = guard_index(message).and_then(|n| statements.get(n)) else {
            continue;
        };
        if let Some(guard) = &statement.guard {
            let entity = statement.entity.to_string();
            let id = guard.id.clone();
            return match guard.kind {
                GuardKind::MustExist => DbError::NotFound { entity, id },
                GuardKind::AffectedExactlyOne => DbError::UnexpectedAffectedRows { entity, id },
            };
        }
    }

    for message in messages {
        if message.contains("already contains") || message.contains("already exists") {
            let entity = statements
                .iter()
                .map(|s| s.entity)
                .find(|e| message.contains(e))
                .unwrap_or("record");
            return DbError::AlreadyExists {
                entity: entity.to_string(),
            };
        }
    }

    DbError::Batch(messages.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn params_are_scoped_per_statement() {
        let scoped = scope_params(
            "UPDATE type::record('project', $id) SET name = $name WHERE $id != NONE AND x = $value",
            &["id", "name"],
            "s3_",
        );
        assert_eq!(
            scoped,
            "UPDATE type::record('project', $s3_id) SET name = $s3_name \
             WHERE $s3_id != NONE AND x = $value"
        );
    }

    #[test]
    fn prefix_of_a_longer_name_is_not_rewritten() {
        assert_eq!(
            scope_params("$id $id_list $identifier", &["id"], "s0_"),
            "$s0_id $id_list $identifier"
        );
    }

    #[test]
    fn compile_wraps_guards_and_renames_binds() {
        let statements = vec![
            Statement::new("feature", "DELETE feature WHERE environment_id = $environment_id")
                .bind("environment_id", "e1"),
            Statement::new(
                "environment",
                "DELETE type::record('environment', $id) RETURN BEFORE",
            )
            .bind("id", "e1")
            .must_exist("e1"),
        ];
        let (text, binds) = compile(&statements);
        assert_eq!(
            text,
            "BEGIN TRANSACTION;\n\
             DELETE feature WHERE environment_id = $s0_environment_id;\n\
             LET $s1_rows = (DELETE type::record('environment', $s1_id) RETURN BEFORE);\n\
             IF array::len($s1_rows) != 1 { THROW \"tenantry_guard:1\" };\n\
             COMMIT TRANSACTION;"
        );
        assert_eq!(
            binds,
            vec![
                ("s0_environment_id".to_string(), json!("e1")),
                ("s1_id".to_string(), json!("e1")),
            ]
        );
    }

    #[test]
    fn guard_failures_are_classified_by_kind() {
        let statements = vec![
            Statement::new("project", "UPDATE x RETURN AFTER").expect_one("p1"),
            Statement::new("environment", "DELETE y RETURN BEFORE").must_exist("e9"),
        ];
        let messages = vec![
            "The query was not executed due to a failed transaction".to_string(),
            "An error occurred: tenantry_guard:1".to_string(),
        ];
        match classify(&statements, &messages) {
            DbError::NotFound { entity, id } => {
                assert_eq!(entity, "environment");
                assert_eq!(id, "e9");
            }
            other => panic!("unexpected {other:?}"),
        }

        let messages = vec!["An error occurred: tenantry_guard:0".to_string()];
        assert!(matches!(
            classify(&statements, &messages),
            DbError::UnexpectedAffectedRows { .. }
        ));
    }

    #[test]
    fn unique_violations_become_already_exists() {
        let statements = vec![
            Statement::new("organization", "CREATE a"),
            Statement::new("project", "CREATE b"),
        ];
        let messages = vec![
            "Database index `idx_project_org_url_code` already contains ['o', 'default']"
                .to_string(),
        ];
        match classify(&statements, &messages) {
            DbError::AlreadyExists { entity } => assert_eq!(entity, "project"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn other_failures_stay_backend_errors() {
        let statements = vec![Statement::new("goal", "DELETE goal")];
        let messages = vec!["Parse error".to_string()];
        assert!(matches!(classify(&statements, &messages), DbError::Batch(_)));
    }
}
