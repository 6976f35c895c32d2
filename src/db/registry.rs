//! Session pool registry.
//!
//! One pool per session name, created lazily on first use and shared by every
//! request of that session until the session is removed or the registry cleared.

use crate::db::driver::{ConnectionOp, Driver};
use crate::error::{DbError, DbResult};
use crate::models::Credentials;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

struct PoolEntry<P> {
    pool: P,
    credentials: Credentials,
}

/// Public view of a registered session (no password).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub session: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

pub struct SessionRegistry<D: Driver> {
    driver: Arc<D>,
    pools: Arc<RwLock<HashMap<String, PoolEntry<D::Pool>>>>,
}

impl<D: Driver> Clone for SessionRegistry<D> {
    fn clone(&self) -> Self {
        Self {
            driver: Arc::clone(&self.driver),
            pools: Arc::clone(&self.pools),
        }
    }
}

impl<D: Driver> std::fmt::Debug for SessionRegistry<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry").finish_non_exhaustive()
    }
}

impl<D: Driver> SessionRegistry<D> {
    pub fn new(driver: Arc<D>) -> Self {
        Self {
            driver,
            pools: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn driver(&self) -> &Arc<D> {
        &self.driver
    }

    /// Return the session's pool, creating and registering it when absent.
    ///
    /// Creation is not single-flight: when two callers race, the last
    /// successful creation is kept and the displaced pool is closed in the
    /// background.
    pub async fn ensure(&self, session: &str, credentials: &Credentials) -> DbResult<D::Pool> {
        {
            let pools = self.pools.read().await;
            if let Some(entry) = pools.get(session) {
                return Ok(entry.pool.clone());
            }
        }

        info!(session = %session, target_db = %credentials.target(), "Creating session pool");
        self.install(session, credentials).await
    }

    /// Create a fresh pool for the session, replacing any existing one.
    ///
    /// Returns as soon as the new pool is registered; the displaced pool
    /// drains its checked-out connections and closes on its own task.
    pub async fn connect(&self, session: &str, credentials: &Credentials) -> DbResult<D::Pool> {
        info!(session = %session, target_db = %credentials.target(), "Connecting session");
        self.install(session, credentials).await
    }

    async fn install(&self, session: &str, credentials: &Credentials) -> DbResult<D::Pool> {
        let pool = self.driver.create_pool(credentials).await?;

        let displaced = {
            let mut pools = self.pools.write().await;
            pools.insert(
                session.to_string(),
                PoolEntry {
                    pool: pool.clone(),
                    credentials: credentials.clone(),
                },
            )
        }; // Lock released here

        if let Some(old) = displaced {
            debug!(session = %session, "Closing displaced pool");
            let driver = Arc::clone(&self.driver);
            let pool = old.pool;
            tokio::spawn(async move {
                driver.close(&pool).await;
            });
        }

        Ok(pool)
    }

    /// Look up a session's pool.
    pub async fn pool(&self, session: &str) -> DbResult<D::Pool> {
        let pools = self.pools.read().await;
        pools
            .get(session)
            .map(|entry| entry.pool.clone())
            .ok_or_else(|| DbError::pool_not_found(session))
    }

    /// Credentials the session's pool was created with.
    pub async fn credentials(&self, session: &str) -> Option<Credentials> {
        let pools = self.pools.read().await;
        pools.get(session).map(|entry| entry.credentials.clone())
    }

    /// Run `op` on a connection of the session's pool.
    ///
    /// The connection goes back to the pool on every exit path before the
    /// result (or error) is returned. A missing pool is `PoolNotFound`.
    pub async fn with_connection<R, F>(&self, session: &str, op: F) -> DbResult<R>
    where
        R: Send,
        F: for<'c> FnOnce(&'c mut D::Connection) -> ConnectionOp<'c, R> + Send,
    {
        let pool = self.pool(session).await?;
        let mut conn = self.driver.acquire(&pool).await?;
        let result = op(&mut conn).await;
        drop(conn);
        if let Err(e) = &result {
            debug!(session = %session, error = %e, "Session operation failed");
        }
        result
    }

    /// Remove a session and close its pool. Returns whether it existed.
    pub async fn remove(&self, session: &str) -> bool {
        let removed = {
            let mut pools = self.pools.write().await;
            pools.remove(session)
        };
        match removed {
            Some(entry) => {
                info!(session = %session, "Closing session pool");
                self.driver.close(&entry.pool).await;
                true
            }
            None => false,
        }
    }

    /// Close every pool and forget all sessions.
    pub async fn clear(&self) {
        let drained: Vec<(String, PoolEntry<D::Pool>)> = {
            let mut pools = self.pools.write().await;
            pools.drain().collect()
        };
        for (session, entry) in drained {
            info!(session = %session, "Closing session pool");
            self.driver.close(&entry.pool).await;
        }
        info!("All session pools closed");
    }

    pub async fn contains(&self, session: &str) -> bool {
        self.pools.read().await.contains_key(session)
    }

    pub async fn len(&self) -> usize {
        self.pools.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pools.read().await.is_empty()
    }

    /// Registered sessions, sorted by name.
    pub async fn sessions(&self) -> Vec<SessionSummary> {
        let pools = self.pools.read().await;
        let mut sessions: Vec<SessionSummary> = pools
            .iter()
            .map(|(name, entry)| SessionSummary {
                session: name.clone(),
                target: entry.credentials.target(),
                database: entry.credentials.default_database().map(str::to_string),
            })
            .collect();
        sessions.sort_by(|a, b| a.session.cmp(&b.session));
        sessions
    }
}
