//! sqlx MySQL backend.

use crate::config::PoolOptions;
use crate::db::driver::{Driver, QueryOutcome, RawColumn, RowSet, SessionConnection};
use crate::db::types::{self, NativeType};
use crate::error::{DbError, DbResult};
use crate::models::Credentials;
use futures_util::TryStreamExt;
use futures_util::stream::BoxStream;
use sqlx::mysql::{
    MySqlConnectOptions, MySqlPoolOptions, MySqlQueryResult, MySqlRow, MySqlSslMode,
};
use sqlx::pool::PoolConnection;
use sqlx::{Column, Either, Executor, MySql, MySqlPool, Row, TypeInfo};
use tracing::{debug, info};

/// Driver backed by `sqlx::MySqlPool`.
#[derive(Debug, Clone, Default)]
pub struct MySqlDriver {
    pool_options: PoolOptions,
}

impl MySqlDriver {
    pub fn new(pool_options: PoolOptions) -> Self {
        Self { pool_options }
    }

    pub fn pool_options(&self) -> &PoolOptions {
        &self.pool_options
    }

    fn connect_options(credentials: &Credentials) -> DbResult<MySqlConnectOptions> {
        let mut options = MySqlConnectOptions::new()
            .host(&credentials.host)
            .port(credentials.port_number()?)
            .username(&credentials.user)
            .password(&credentials.password)
            .ssl_mode(MySqlSslMode::Disabled)
            .charset("utf8mb4");
        if let Some(db) = credentials.default_database() {
            options = options.database(db);
        }
        Ok(options)
    }

    async fn build_pool(
        &self,
        credentials: &Credentials,
        pool_opts: &PoolOptions,
    ) -> DbResult<MySqlPool> {
        let options = Self::connect_options(credentials)?;

        debug!(
            target_db = %credentials.target(),
            max_connections = pool_opts.max_connections_or_default(),
            "Opening MySQL pool"
        );

        MySqlPoolOptions::new()
            .min_connections(pool_opts.min_connections_or_default())
            .max_connections(pool_opts.max_connections_or_default())
            .acquire_timeout(pool_opts.acquire_timeout_or_default())
            .idle_timeout(Some(pool_opts.idle_timeout_or_default()))
            .test_before_acquire(pool_opts.test_before_acquire_or_default())
            .connect_with(options)
            .await
            .map_err(|e| DbError::connection(driver_message(&e), connection_suggestion(&e)))
    }
}

impl Driver for MySqlDriver {
    type Pool = MySqlPool;
    type Connection = MySqlSessionConnection;

    async fn create_pool(&self, credentials: &Credentials) -> DbResult<MySqlPool> {
        let pool = self.build_pool(credentials, &self.pool_options).await?;
        info!(target_db = %credentials.target(), "Connected");
        Ok(pool)
    }

    async fn create_dedicated_pool(&self, credentials: &Credentials) -> DbResult<MySqlPool> {
        self.build_pool(credentials, &self.pool_options.single_connection())
            .await
    }

    async fn acquire(&self, pool: &MySqlPool) -> DbResult<MySqlSessionConnection> {
        Ok(MySqlSessionConnection(pool.acquire().await?))
    }

    async fn close(&self, pool: &MySqlPool) {
        pool.close().await;
    }
}

/// A connection checked out of a session pool.
#[derive(Debug)]
pub struct MySqlSessionConnection(PoolConnection<MySql>);

type ResultStream<'c> = BoxStream<'c, Result<Either<MySqlQueryResult, MySqlRow>, sqlx::Error>>;

impl MySqlSessionConnection {
    /// Drain a batch's stream into the rows of its first row-bearing result
    /// set and the affected count of every statement.
    async fn drain(mut stream: ResultStream<'_>) -> DbResult<(Vec<MySqlRow>, u64)> {
        let mut batch = FirstResultSet::default();
        while let Some(item) = stream.try_next().await? {
            match item {
                Either::Left(done) => batch.finish_statement(done.rows_affected()),
                Either::Right(row) => batch.row(row),
            }
        }
        if batch.skipped > 0 {
            debug!(skipped = batch.skipped, "Ignored rows of later result sets");
        }
        Ok((batch.rows, batch.affected))
    }

    /// Result columns of a statement; `None` when it cannot be prepared.
    async fn described_columns(&mut self, sql: &str) -> Option<Vec<RawColumn>> {
        match (&mut *self.0).describe(sql).await {
            Ok(describe) => Some(
                describe
                    .columns()
                    .iter()
                    .map(|col| {
                        RawColumn::new(
                            col.name(),
                            NativeType::from_type_name(col.type_info().name()),
                        )
                    })
                    .collect(),
            ),
            Err(e) => {
                debug!(error = %e, "Could not describe statement");
                None
            }
        }
    }
}

impl SessionConnection for MySqlSessionConnection {
    async fn query(&mut self, sql: &str, params: &[String]) -> DbResult<QueryOutcome> {
        // When params is empty, use raw SQL so the text protocol is used
        let (rows, affected) = if params.is_empty() {
            Self::drain((&mut *self.0).fetch_many(sql)).await?
        } else {
            let query = params
                .iter()
                .fold(sqlx::query(sql), |query, param| query.bind(param.as_str()));
            Self::drain((&mut *self.0).fetch_many(query)).await?
        };

        if !rows.is_empty() {
            return Ok(QueryOutcome::Rows(decode_rows(&rows)));
        }

        // Unpreparable statements (most SHOW forms, batches) fall back to
        // their leading keyword.
        match self.described_columns(sql).await {
            Some(columns) if !columns.is_empty() => {
                Ok(QueryOutcome::Rows(RowSet::new(columns, Vec::new())))
            }
            None if returns_rows(sql) => Ok(QueryOutcome::Rows(RowSet::default())),
            _ => Ok(QueryOutcome::Affected(affected)),
        }
    }
}

/// Accumulates a statement batch. Rows are kept until the completion of the
/// first result set that produced any; later result sets are only counted.
#[derive(Debug)]
struct FirstResultSet<R> {
    rows: Vec<R>,
    affected: u64,
    sealed: bool,
    skipped: usize,
}

impl<R> Default for FirstResultSet<R> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            affected: 0,
            sealed: false,
            skipped: 0,
        }
    }
}

impl<R> FirstResultSet<R> {
    fn row(&mut self, row: R) {
        if self.sealed {
            self.skipped += 1;
        } else {
            self.rows.push(row);
        }
    }

    fn finish_statement(&mut self, rows_affected: u64) {
        self.affected += rows_affected;
        self.sealed |= !self.rows.is_empty();
    }
}

/// Whether the statement's leading keyword produces a result set.
fn returns_rows(sql: &str) -> bool {
    let keyword: String = sql
        .trim_start_matches(|c: char| c.is_whitespace() || c == '(')
        .chars()
        .take_while(char::is_ascii_alphabetic)
        .collect();
    matches!(
        keyword.to_ascii_uppercase().as_str(),
        "SELECT" | "SHOW" | "DESCRIBE" | "DESC" | "EXPLAIN" | "WITH" | "VALUES" | "TABLE" | "HELP"
    )
}

/// Decode rows into a column-aligned [`RowSet`]; columns come from the first row.
fn decode_rows(rows: &[MySqlRow]) -> RowSet {
    let columns: Vec<RawColumn> = rows
        .first()
        .map(|row| {
            row.columns()
                .iter()
                .map(|col| {
                    RawColumn::new(
                        col.name(),
                        NativeType::from_type_name(col.type_info().name()),
                    )
                })
                .collect()
        })
        .unwrap_or_default();

    let data = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .enumerate()
                .map(|(idx, col)| types::mysql::decode_column(row, idx, col.native))
                .collect()
        })
        .collect();

    RowSet::new(columns, data)
}

/// The server's own message for database errors, the display text otherwise.
fn driver_message(error: &sqlx::Error) -> String {
    match error {
        sqlx::Error::Database(db_err) => db_err.message().to_string(),
        other => other.to_string(),
    }
}

/// Generate a helpful suggestion for connection errors.
fn connection_suggestion(error: &sqlx::Error) -> String {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") {
        return "Check that the MySQL server is running and accessible".to_string();
    }

    if error_str.contains("access denied") || error_str.contains("password") {
        return "Verify the user name and password of the session".to_string();
    }

    if error_str.contains("unknown database") {
        return "Check that the default database exists".to_string();
    }

    if error_str.contains("timed out") {
        return "Check the host and port, or raise the acquire timeout".to_string();
    }

    if error_str.contains("failed to lookup address") || error_str.contains("name or service") {
        return "Check the host name".to_string();
    }

    "Verify the host, port, user and password of the session".to_string()
}
