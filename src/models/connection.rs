//! Connection-related data models.
//!
//! This module defines the credentials a session is created from. They travel
//! inside node contexts so the router can recreate a pool on demand.

use crate::error::{DbError, DbResult};
use serde::{Deserialize, Deserializer, Serialize};

/// Default MySQL server port.
pub const DEFAULT_MYSQL_PORT: u16 = 3306;

/// Connection credentials for a session.
///
/// Every field is a plain string on the wire; `database` may be empty.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub host: String,
    #[serde(deserialize_with = "string_or_number")]
    pub port: String,
    pub user: String,
    /// Contains sensitive data - never log
    #[serde(default)]
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

impl Credentials {
    /// Create credentials without a default database.
    pub fn new(
        host: impl Into<String>,
        port: impl ToString,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: port.to_string(),
            user: user.into(),
            password: password.into(),
            database: None,
        }
    }

    /// Set the default database.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Parse the port, falling back to 3306 when it is blank.
    pub fn port_number(&self) -> DbResult<u16> {
        let trimmed = self.port.trim();
        if trimmed.is_empty() {
            return Ok(DEFAULT_MYSQL_PORT);
        }
        match trimmed.parse::<u16>() {
            Ok(0) | Err(_) => Err(DbError::connection(
                format!("Invalid port '{}'", self.port),
                "Use a TCP port between 1 and 65535",
            )),
            Ok(port) => Ok(port),
        }
    }

    /// The default database, treating an empty string as absent.
    pub fn default_database(&self) -> Option<&str> {
        self.database
            .as_deref()
            .map(str::trim)
            .filter(|db| !db.is_empty())
    }

    /// Display-safe target description (no password).
    pub fn target(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.port)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"****")
            .field("database", &self.database)
            .finish()
    }
}

/// Accept `"3306"` as well as `3306` for the port.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Text(String),
        Number(u64),
    }

    Ok(match Port::deserialize(deserializer)? {
        Port::Text(s) => s,
        Port::Number(n) => n.to_string(),
    })
}
