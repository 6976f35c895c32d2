//! Driver abstraction.
//!
//! The registry, catalog, executor and canceller are generic over [`Driver`]
//! so they run unchanged against the sqlx MySQL backend and an in-memory
//! driver in tests.

use crate::db::types::NativeType;
use crate::error::DbResult;
use crate::models::Credentials;
use futures_util::future::BoxFuture;
use serde_json::Value as JsonValue;
use std::future::Future;

/// A database backend able to create, hand out and close session pools.
pub trait Driver: Send + Sync + 'static {
    /// Shared pool handle; cloning must be cheap.
    type Pool: Clone + Send + Sync + 'static;
    /// A connection checked out of a pool. Dropping it returns it to the pool.
    type Connection: SessionConnection + 'static;

    /// Create a pool and establish at least one connection.
    fn create_pool(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = DbResult<Self::Pool>> + Send;

    /// Create a single-connection pool for out-of-band work (query cancellation).
    fn create_dedicated_pool(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = DbResult<Self::Pool>> + Send;

    fn acquire(&self, pool: &Self::Pool) -> impl Future<Output = DbResult<Self::Connection>> + Send;

    /// Close the pool, waiting for checked-out connections to come back.
    fn close(&self, pool: &Self::Pool) -> impl Future<Output = ()> + Send;
}

/// One live connection.
pub trait SessionConnection: Send {
    /// Run a single statement.
    ///
    /// With no `params` the statement goes over the text protocol, otherwise
    /// it is prepared and the params bound as strings.
    fn query(
        &mut self,
        sql: &str,
        params: &[String],
    ) -> impl Future<Output = DbResult<QueryOutcome>> + Send;
}

/// Operation run against a checked-out connection.
pub type ConnectionOp<'c, R> = BoxFuture<'c, DbResult<R>>;

/// Column of a raw driver result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawColumn {
    pub name: String,
    pub native: NativeType,
}

impl RawColumn {
    pub fn new(name: impl Into<String>, native: NativeType) -> Self {
        Self {
            name: name.into(),
            native,
        }
    }
}

/// Rows returned by the driver, cells already decoded to JSON.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    pub columns: Vec<RawColumn>,
    pub rows: Vec<Vec<JsonValue>>,
}

impl RowSet {
    pub fn new(columns: Vec<RawColumn>, rows: Vec<Vec<JsonValue>>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Position of a column, compared case-insensitively.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        self.rows.iter().map(move |values| Record { set: self, values })
    }

    pub fn first(&self) -> Option<Record<'_>> {
        self.records().next()
    }
}

/// Borrowed view of one row with by-name accessors.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    set: &'a RowSet,
    values: &'a [JsonValue],
}

impl<'a> Record<'a> {
    pub fn get(&self, column: &str) -> Option<&'a JsonValue> {
        self.set
            .column_index(column)
            .and_then(|idx| self.values.get(idx))
    }

    /// Value as text; numbers and booleans are stringified, NULL is `None`.
    pub fn text(&self, column: &str) -> Option<String> {
        match self.get(column)? {
            JsonValue::Null => None,
            JsonValue::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Non-empty text.
    pub fn non_empty_text(&self, column: &str) -> Option<String> {
        self.text(column).filter(|s| !s.is_empty())
    }

    /// Value as an unsigned integer; numeric strings are accepted.
    pub fn u64(&self, column: &str) -> Option<u64> {
        match self.get(column)? {
            JsonValue::Number(n) => n.as_u64(),
            JsonValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Raw outcome of one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Rows(RowSet),
    /// Mutation acknowledgment: no columns, only an affected-row count.
    Affected(u64),
}

impl QueryOutcome {
    /// Rows of the outcome; an acknowledgment has none.
    pub fn into_rows(self) -> RowSet {
        match self {
            QueryOutcome::Rows(rows) => rows,
            QueryOutcome::Affected(_) => RowSet::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::types::code;
    use serde_json::json;

    fn sample() -> RowSet {
        RowSet::new(
            vec![
                RawColumn::new("TABLE_NAME", NativeType::text(code::VAR_STRING)),
                RawColumn::new("TABLE_ROWS", NativeType::text(code::LONGLONG)),
                RawColumn::new("TABLE_COMMENT", NativeType::text(code::VAR_STRING)),
            ],
            vec![
                vec![json!("orders"), json!(42), json!("")],
                vec![json!("items"), json!("7"), JsonValue::Null],
            ],
        )
    }

    #[test]
    fn test_record_accessors() {
        let rows = sample();
        let first = rows.first().unwrap();
        assert_eq!(first.text("table_name").as_deref(), Some("orders"));
        assert_eq!(first.u64("TABLE_ROWS"), Some(42));
        assert_eq!(first.non_empty_text("TABLE_COMMENT"), None);

        let second = rows.records().nth(1).unwrap();
        assert_eq!(second.u64("TABLE_ROWS"), Some(7));
        assert_eq!(second.text("TABLE_COMMENT"), None);
        assert_eq!(second.text("MISSING"), None);
    }

    #[test]
    fn test_affected_has_no_rows() {
        assert!(QueryOutcome::Affected(3).into_rows().is_empty());
    }
}
