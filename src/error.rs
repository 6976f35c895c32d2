//! Error types for the explorer backend.
//!
//! All fallible operations return [`DbResult`]. Driver errors are folded into
//! the two categories the host cares about: the connection could not be
//! established (`Connection`) or the server rejected a statement (`Query`).

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    /// Recovered by the router through lazy pool creation; never reaches the host.
    #[error("No connection pool for session '{session}'")]
    PoolNotFound { session: String },

    #[error("Query failed: {message}")]
    Query {
        message: String,
        /// e.g., "42S02" for an unknown table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// The session could not be established.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn pool_not_found(session: impl Into<String>) -> Self {
        Self::PoolNotFound {
            session: session.into(),
        }
    }

    pub fn query(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Query {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Query { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// Stable identifier used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "connection",
            Self::PoolNotFound { .. } => "pool_not_found",
            Self::Query { .. } => "query",
            Self::InvalidInput { .. } => "invalid_input",
            Self::Internal { .. } => "internal",
        }
    }

    /// The underlying driver message, without the category prefix.
    pub fn detail(&self) -> String {
        match self {
            Self::Connection { message, .. } => message.clone(),
            Self::Query {
                message,
                sql_state: Some(code),
                ..
            } => format!("{} (SQLSTATE: {})", message, code),
            Self::Query { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_pool_not_found(&self) -> bool {
        matches!(self, Self::PoolNotFound { .. })
    }
}

/// Server error numbers that mean the session itself was refused.
const LOGIN_ERRORS: &[u16] = &[1040, 1044, 1045, 1049, 1130];

fn query_suggestion(number: Option<u16>) -> &'static str {
    match number {
        Some(1064) => "Check the SQL syntax near the quoted fragment",
        Some(1146) => "The table does not exist; refresh the schema tree",
        Some(1054) => "Check the column names against the table structure",
        Some(1142 | 1143 | 1370) => "The session user lacks the privilege for this statement",
        Some(1317) => "The statement was interrupted, usually by a cancellation",
        Some(1205 | 1213) => "The statement hit a lock; run it again",
        _ => "Check the SQL syntax and referenced objects",
    }
}

fn login_suggestion(number: u16) -> &'static str {
    match number {
        1040 => "The server has too many connections; close idle sessions",
        1049 => "Check that the default database exists",
        _ => "Verify the user name and password of the session",
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let number = db_err
                    .try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>()
                    .map(|e| e.number());
                match number {
                    Some(n) if LOGIN_ERRORS.contains(&n) => {
                        DbError::connection(db_err.message(), login_suggestion(n))
                    }
                    _ => DbError::query(
                        db_err.message(),
                        db_err.code().map(|c| c.into_owned()),
                        query_suggestion(number),
                    ),
                }
            }
            sqlx::Error::RowNotFound => {
                DbError::query("No rows returned", None, "Verify the object still exists")
            }
            sqlx::Error::PoolTimedOut => DbError::connection(
                "Timed out waiting for a pooled connection",
                "Check that the server is reachable or raise the acquire timeout",
            ),
            sqlx::Error::PoolClosed => {
                DbError::connection("Session pool is closed", "Connect the session again")
            }
            sqlx::Error::Io(io_err) => DbError::connection(
                io_err.to_string(),
                "Check that the MySQL server is running and accessible",
            ),
            sqlx::Error::Configuration(_) | sqlx::Error::Tls(_) | sqlx::Error::Protocol(_) => {
                DbError::connection(
                    err.to_string(),
                    "Verify the host, port, user and password of the session",
                )
            }
            sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_) => DbError::internal(err.to_string()),
            other => DbError::internal(format!("Driver error: {}", other)),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Wire representation of an error returned to the host.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl From<&DbError> for ErrorPayload {
    fn from(err: &DbError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            suggestion: err.suggestion().map(str::to_string),
        }
    }
}
