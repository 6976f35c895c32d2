//! Scripted in-memory driver shared by the integration tests.
//!
//! Every statement is answered by a responder closure and recorded, and the
//! driver counts pool creations, acquisitions and releases.

#![allow(dead_code)]

use mysql_explorer::db::types::{NativeType, code};
use mysql_explorer::db::{Driver, QueryOutcome, RawColumn, RowSet, SessionConnection};
use mysql_explorer::error::{DbError, DbResult};
use mysql_explorer::models::Credentials;
use mysql_explorer::notify::{Notification, Notifier};
use serde_json::Value as JsonValue;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Host that refuses every connection.
pub const UNREACHABLE_HOST: &str = "unreachable.invalid";

pub type Responder = dyn Fn(&str, &[String]) -> DbResult<QueryOutcome> + Send + Sync;

#[derive(Default)]
pub struct Stats {
    pub pools_created: AtomicUsize,
    pub dedicated_pools: AtomicUsize,
    pub pools_closed: AtomicUsize,
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
    executed: Mutex<Vec<(String, Vec<String>)>>,
}

impl Stats {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn pools_created(&self) -> usize {
        Self::count(&self.pools_created)
    }

    pub fn dedicated_pools(&self) -> usize {
        Self::count(&self.dedicated_pools)
    }

    pub fn pools_closed(&self) -> usize {
        Self::count(&self.pools_closed)
    }

    pub fn acquired(&self) -> usize {
        Self::count(&self.acquired)
    }

    pub fn released(&self) -> usize {
        Self::count(&self.released)
    }

    /// Statements run so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }

    /// Statements with their bound parameters.
    pub fn executed_with_params(&self) -> Vec<(String, Vec<String>)> {
        self.executed.lock().unwrap().clone()
    }

    pub fn ran(&self, fragment: &str) -> bool {
        self.executed().iter().any(|sql| sql.contains(fragment))
    }

    /// Wait for background pool closes to settle at `expected`.
    pub async fn closed_eventually(&self, expected: usize) -> bool {
        for _ in 0..500 {
            if self.pools_closed() >= expected {
                return self.pools_closed() == expected;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        false
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockPool {
    pub id: usize,
    pub dedicated: bool,
}

pub struct MockConnection {
    responder: Arc<Responder>,
    stats: Arc<Stats>,
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.stats.released.fetch_add(1, Ordering::SeqCst);
    }
}

impl SessionConnection for MockConnection {
    async fn query(&mut self, sql: &str, params: &[String]) -> DbResult<QueryOutcome> {
        self.stats
            .executed
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        (self.responder)(sql, params)
    }
}

pub struct MockDriver {
    responder: Arc<Responder>,
    stats: Arc<Stats>,
    close_gate: Option<Arc<Notify>>,
}

impl MockDriver {
    pub fn new<F>(responder: F) -> (Self, Arc<Stats>)
    where
        F: Fn(&str, &[String]) -> DbResult<QueryOutcome> + Send + Sync + 'static,
    {
        let stats = Arc::new(Stats::default());
        (
            Self {
                responder: Arc::new(responder),
                stats: Arc::clone(&stats),
                close_gate: None,
            },
            stats,
        )
    }

    /// Driver answering every statement with an empty acknowledgment.
    pub fn silent() -> (Self, Arc<Stats>) {
        Self::new(|_, _| Ok(QueryOutcome::Affected(0)))
    }

    /// Make every `close` wait for a permit on `gate`, like a pool with a
    /// connection still checked out.
    pub fn with_close_gate(mut self, gate: Arc<Notify>) -> Self {
        self.close_gate = Some(gate);
        self
    }

    fn check(credentials: &Credentials) -> DbResult<()> {
        credentials.port_number()?;
        if credentials.host == UNREACHABLE_HOST {
            return Err(DbError::connection(
                format!("Can't connect to MySQL server on '{}'", credentials.host),
                "Check that the server is running",
            ));
        }
        Ok(())
    }
}

impl Driver for MockDriver {
    type Pool = MockPool;
    type Connection = MockConnection;

    async fn create_pool(&self, credentials: &Credentials) -> DbResult<MockPool> {
        Self::check(credentials)?;
        let id = self.stats.pools_created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MockPool {
            id,
            dedicated: false,
        })
    }

    async fn create_dedicated_pool(&self, credentials: &Credentials) -> DbResult<MockPool> {
        Self::check(credentials)?;
        let id = self.stats.dedicated_pools.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MockPool {
            id,
            dedicated: true,
        })
    }

    async fn acquire(&self, _pool: &MockPool) -> DbResult<MockConnection> {
        self.stats.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(MockConnection {
            responder: Arc::clone(&self.responder),
            stats: Arc::clone(&self.stats),
        })
    }

    async fn close(&self, _pool: &MockPool) {
        if let Some(gate) = &self.close_gate {
            gate.notified().await;
        }
        self.stats.pools_closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Notifier keeping everything it receives.
#[derive(Default)]
pub struct RecordingNotifier {
    received: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn received(&self) -> Vec<Notification> {
        self.received.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.received.lock().unwrap().push(notification);
    }
}

pub fn creds() -> Credentials {
    Credentials::new("db.local", "3306", "app", "secret")
}

/// Row set whose columns are all text.
pub fn text_rows(columns: &[&str], rows: Vec<Vec<JsonValue>>) -> QueryOutcome {
    typed_rows(
        &columns
            .iter()
            .map(|c| (*c, NativeType::text(code::VAR_STRING)))
            .collect::<Vec<_>>(),
        rows,
    )
}

pub fn typed_rows(columns: &[(&str, NativeType)], rows: Vec<Vec<JsonValue>>) -> QueryOutcome {
    QueryOutcome::Rows(RowSet::new(
        columns
            .iter()
            .map(|(name, native)| RawColumn::new(*name, *native))
            .collect(),
        rows,
    ))
}

pub fn empty_rows() -> QueryOutcome {
    QueryOutcome::Rows(RowSet::default())
}

pub fn server_error(message: &str) -> DbError {
    DbError::query(message, Some("42S02".to_string()), "Check the SQL")
}
