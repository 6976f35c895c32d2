//! Query execution engine.
//!
//! Runs a statement on a checked-out connection and normalizes the driver
//! outcome into a [`ResultSet`]:
//! - a mutation acknowledgment becomes `Affected`
//! - anything with result columns becomes `Rows`, each column typed through
//!   the protocol type table
//!
//! Statements go over the text protocol and are never retried.

use crate::db::driver::{QueryOutcome, SessionConnection};
use crate::error::DbResult;
use crate::models::{ResultColumn, ResultSet};
use crate::notify::{Notification, Notifier};
use std::time::Instant;
use tracing::{debug, warn};

/// Query executor that handles ad-hoc statement execution.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryExecutor;

impl QueryExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Run `sql` and normalize the outcome, propagating driver errors.
    pub async fn execute<C: SessionConnection>(
        &self,
        conn: &mut C,
        sql: &str,
    ) -> DbResult<ResultSet> {
        let start = Instant::now();
        debug!(sql = %sql, "Executing query");

        let outcome = conn.query(sql, &[]).await?;
        let result = normalize(outcome)?;

        debug!(
            rows = result.row_count(),
            affected = ?result.records_affected(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Query complete"
        );
        Ok(result)
    }

    /// Run `text`; on failure notify the caller's hook and yield no data.
    pub async fn execute_query<C, N>(
        &self,
        conn: &mut C,
        text: &str,
        notifier: &N,
    ) -> Option<ResultSet>
    where
        C: SessionConnection,
        N: Notifier + ?Sized,
    {
        match self.execute(conn, text).await {
            Ok(result) => Some(result),
            Err(e) => {
                warn!(error = %e, "Query failed");
                notifier.notify(Notification::error("Query failed", e.detail()));
                None
            }
        }
    }
}

/// Convert a raw driver outcome into a [`ResultSet`].
///
/// A row set with neither columns nor rows is treated as an acknowledgment.
pub fn normalize(outcome: QueryOutcome) -> DbResult<ResultSet> {
    match outcome {
        QueryOutcome::Affected(count) => Ok(ResultSet::affected(count)),
        QueryOutcome::Rows(set) if set.columns.is_empty() && set.rows.is_empty() => {
            Ok(ResultSet::affected(0))
        }
        QueryOutcome::Rows(set) => {
            let columns = set
                .columns
                .iter()
                .map(|col| ResultColumn::new(&col.name, col.native.semantic()))
                .collect();
            ResultSet::rows(columns, set.rows, None)
        }
    }
}
