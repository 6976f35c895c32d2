//! Running-query tracking and server-side cancellation.
//!
//! The last text submitted under each request id is remembered. Cancelling
//! looks the text up in `SHOW FULL PROCESSLIST` over a dedicated short-lived
//! connection and kills the first process of the same user running exactly
//! that text. Two identical queries from the same user cannot be told apart;
//! the first one listed is killed.

use crate::db::driver::{Driver, RowSet, SessionConnection};
use crate::error::DbResult;
use crate::models::Credentials;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub const PROCESSLIST_SQL: &str = "SHOW FULL PROCESSLIST";

struct RunningQuery {
    text: String,
    session: String,
    ticket: u64,
    started_at: DateTime<Utc>,
}

/// Metadata about a tracked query (for listing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunningQuerySummary {
    pub request_id: String,
    pub session: String,
    pub started_at: DateTime<Utc>,
}

pub struct QueryCanceller<D: Driver> {
    driver: Arc<D>,
    running: Arc<RwLock<HashMap<String, RunningQuery>>>,
    next_ticket: Arc<AtomicU64>,
}

impl<D: Driver> Clone for QueryCanceller<D> {
    fn clone(&self) -> Self {
        Self {
            driver: Arc::clone(&self.driver),
            running: Arc::clone(&self.running),
            next_ticket: Arc::clone(&self.next_ticket),
        }
    }
}

impl<D: Driver> QueryCanceller<D> {
    pub fn new(driver: Arc<D>) -> Self {
        Self {
            driver,
            running: Arc::new(RwLock::new(HashMap::new())),
            next_ticket: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Remember `text` as the latest query of `request_id`, replacing any earlier one.
    ///
    /// The returned ticket identifies this submission for [`Self::complete`].
    pub async fn record(&self, request_id: &str, text: &str, session: &str) -> u64 {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let entry = RunningQuery {
            text: text.to_string(),
            session: session.to_string(),
            ticket,
            started_at: Utc::now(),
        };
        let replaced = {
            let mut running = self.running.write().await;
            running.insert(request_id.to_string(), entry)
        };
        debug!(
            request_id = %request_id,
            session = %session,
            replaced = replaced.is_some(),
            "Tracking running query"
        );
        ticket
    }

    /// Forget a submission once it finished; newer submissions under the id are kept.
    pub async fn complete(&self, request_id: &str, ticket: u64) {
        let mut running = self.running.write().await;
        if running
            .get(request_id)
            .is_some_and(|entry| entry.ticket == ticket)
        {
            running.remove(request_id);
        }
    }

    pub async fn is_running(&self, request_id: &str) -> bool {
        self.running.read().await.contains_key(request_id)
    }

    /// Session the tracked query was submitted on.
    pub async fn session_of(&self, request_id: &str) -> Option<String> {
        let running = self.running.read().await;
        running.get(request_id).map(|entry| entry.session.clone())
    }

    /// Stop tracking `request_id` without touching the server.
    pub async fn discard(&self, request_id: &str) -> bool {
        self.running.write().await.remove(request_id).is_some()
    }

    /// Tracked queries, oldest first.
    pub async fn running(&self) -> Vec<RunningQuerySummary> {
        let running = self.running.read().await;
        let mut list: Vec<RunningQuerySummary> = running
            .iter()
            .map(|(id, entry)| RunningQuerySummary {
                request_id: id.clone(),
                session: entry.session.clone(),
                started_at: entry.started_at,
            })
            .collect();
        list.sort_by_key(|q| q.started_at);
        list
    }

    /// Best-effort cancellation of the query tracked under `request_id`.
    ///
    /// The entry is removed first. Nothing tracked or no matching process is a
    /// silent no-op. Failures are logged, never returned.
    pub async fn cancel(&self, request_id: &str, credentials: &Credentials) {
        let entry = {
            let mut running = self.running.write().await;
            running.remove(request_id)
        };
        let Some(entry) = entry else {
            debug!(request_id = %request_id, "No running query to cancel");
            return;
        };

        info!(
            request_id = %request_id,
            session = %entry.session,
            "Cancelling query"
        );

        match self.kill_matching(&entry.text, credentials).await {
            Ok(Some(process_id)) => {
                info!(request_id = %request_id, process_id, "Killed server process");
            }
            Ok(None) => {
                debug!(request_id = %request_id, "No matching server process");
            }
            Err(e) => {
                warn!(request_id = %request_id, error = %e, "Query cancellation failed");
            }
        }
    }

    async fn kill_matching(&self, text: &str, credentials: &Credentials) -> DbResult<Option<u64>> {
        let pool = self.driver.create_dedicated_pool(credentials).await?;
        let result = self.kill_on_pool(&pool, text, &credentials.user).await;
        self.driver.close(&pool).await;
        result
    }

    async fn kill_on_pool(&self, pool: &D::Pool, text: &str, user: &str) -> DbResult<Option<u64>> {
        let mut conn = self.driver.acquire(pool).await?;
        let processes = conn.query(PROCESSLIST_SQL, &[]).await?.into_rows();
        let Some(process_id) = find_process(&processes, user, text) else {
            return Ok(None);
        };
        conn.query(&format!("KILL {}", process_id), &[]).await?;
        Ok(Some(process_id))
    }
}

/// Id of the first process owned by `user` whose `Info` equals `text` exactly.
pub fn find_process(processes: &RowSet, user: &str, text: &str) -> Option<u64> {
    processes.records().find_map(|process| {
        let same_user = process.text("User").is_some_and(|u| u == user);
        let same_text = process.text("Info").is_some_and(|info| info == text);
        if same_user && same_text {
            process.u64("Id")
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::driver::RawColumn;
    use crate::db::types::{NativeType, code};
    use serde_json::{Value as JsonValue, json};

    fn processlist(rows: Vec<Vec<JsonValue>>) -> RowSet {
        RowSet::new(
            ["Id", "User", "Host", "db", "Command", "Time", "State", "Info"]
                .iter()
                .map(|c| RawColumn::new(*c, NativeType::text(code::VAR_STRING)))
                .collect(),
            rows,
        )
    }

    fn process(id: u64, user: &str, info: Option<&str>) -> Vec<JsonValue> {
        vec![
            json!(id),
            json!(user),
            json!("localhost:5000"),
            json!("sales"),
            json!("Query"),
            json!(3),
            json!("executing"),
            info.map(|i| json!(i)).unwrap_or(JsonValue::Null),
        ]
    }

    #[test]
    fn test_find_process_matches_user_and_exact_text() {
        let list = processlist(vec![
            process(7, "other", Some("SELECT SLEEP(10)")),
            process(8, "app", Some("SELECT SLEEP(10) ")),
            process(9, "app", Some("SELECT SLEEP(10)")),
            process(10, "app", Some("SELECT SLEEP(10)")),
        ]);
        assert_eq!(find_process(&list, "app", "SELECT SLEEP(10)"), Some(9));
    }

    #[test]
    fn test_find_process_ignores_idle_connections() {
        let list = processlist(vec![process(3, "app", None)]);
        assert_eq!(find_process(&list, "app", "SELECT 1"), None);
    }
}
