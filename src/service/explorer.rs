//! Explorer service.
//!
//! Owns the session registry and the query canceller for the lifetime of the
//! backend and exposes the entry points the transport calls.

use crate::config::Config;
use crate::db::catalog::{MetadataCatalog, StructureTarget};
use crate::db::driver::Driver;
use crate::db::executor::QueryExecutor;
use crate::db::mysql::MySqlDriver;
use crate::db::{QueryCanceller, RunningQuerySummary, SessionRegistry, SessionSummary};
use crate::error::{DbError, DbResult};
use crate::models::{ActionKind, Credentials, MetadataNode, NodeAction, NodeContext, ResultSet};
use crate::notify::{Notification, Notifier};
use crate::service::router::{RequestRouter, Routed};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ExplorerService<D: Driver = MySqlDriver> {
    registry: SessionRegistry<D>,
    canceller: QueryCanceller<D>,
    router: RequestRouter<D>,
    catalog: MetadataCatalog,
    executor: QueryExecutor,
    notifier: Arc<dyn Notifier>,
}

impl<D: Driver> Clone for ExplorerService<D> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            canceller: self.canceller.clone(),
            router: self.router.clone(),
            catalog: self.catalog,
            executor: self.executor,
            notifier: Arc::clone(&self.notifier),
        }
    }
}

impl ExplorerService<MySqlDriver> {
    /// Build a MySQL-backed service from the command-line configuration.
    pub fn from_config(config: &Config, notifier: Arc<dyn Notifier>) -> Result<Self, String> {
        let driver = MySqlDriver::new(config.pool_options()?);
        let catalog = MetadataCatalog::new(config.preview_limit(), config.show_system_schemas);
        Ok(Self::new(driver, catalog, notifier))
    }
}

impl<D: Driver> ExplorerService<D> {
    pub fn new(driver: D, catalog: MetadataCatalog, notifier: Arc<dyn Notifier>) -> Self {
        let driver = Arc::new(driver);
        let registry = SessionRegistry::new(Arc::clone(&driver));
        let canceller = QueryCanceller::new(driver);
        let router = RequestRouter::new(registry.clone(), catalog);
        Self {
            registry,
            canceller,
            router,
            catalog,
            executor: QueryExecutor::new(),
            notifier,
        }
    }

    pub fn registry(&self) -> &SessionRegistry<D> {
        &self.registry
    }

    pub fn canceller(&self) -> &QueryCanceller<D> {
        &self.canceller
    }

    /// Surface connection and query failures to the host as well.
    fn report<T>(&self, result: DbResult<T>) -> DbResult<T> {
        if let Err(e) = &result {
            match e {
                DbError::Connection { .. } => self
                    .notifier
                    .notify(Notification::error("Connection failed", e.detail())),
                DbError::Query { .. } => self
                    .notifier
                    .notify(Notification::error("Query failed", e.detail())),
                _ => {}
            }
        }
        result
    }

    /// Credentials from the request, else the ones the session was opened with.
    async fn resolve_credentials(
        &self,
        session: &str,
        credentials: Option<Credentials>,
    ) -> Option<Credentials> {
        match credentials {
            Some(credentials) => Some(credentials),
            None => self.registry.credentials(session).await,
        }
    }

    // -------------------------------------------------------------------------
    // Sessions
    // -------------------------------------------------------------------------

    /// Open (or reopen) a session with new credentials.
    pub async fn connect(&self, session: &str, credentials: &Credentials) -> DbResult<()> {
        let result = self.registry.connect(session, credentials).await.map(|_| ());
        if result.is_ok() {
            self.notifier.notify(Notification::info(
                "Connected",
                format!("{} ({})", session, credentials.target()),
            ));
        }
        self.report(result)
    }

    pub async fn disconnect(&self, session: &str) -> bool {
        self.registry.remove(session).await
    }

    pub async fn sessions(&self) -> Vec<SessionSummary> {
        self.registry.sessions().await
    }

    pub async fn running_queries(&self) -> Vec<RunningQuerySummary> {
        self.canceller.running().await
    }

    /// Close every pool and forget every session.
    pub async fn clear(&self) {
        self.registry.clear().await;
    }

    // -------------------------------------------------------------------------
    // Tree
    // -------------------------------------------------------------------------

    /// Root of the tree: the schemas visible to the session.
    pub async fn schemas(
        &self,
        session: &str,
        credentials: Option<Credentials>,
    ) -> DbResult<Vec<MetadataNode>> {
        let credentials = self.resolve_credentials(session, credentials).await;
        let root = Arc::new(NodeContext::session(session, credentials.clone()));
        let catalog = self.catalog;
        let result = self
            .router
            .with_recovery(session, credentials.as_ref(), move |conn| {
                let root = Arc::clone(&root);
                Box::pin(async move { catalog.list_schemas(conn, &root).await })
            })
            .await;
        self.report(result)
    }

    /// Children of a clicked node, or the definition of a leaf entity.
    pub async fn expand(&self, session: &str, ctx: &NodeContext) -> DbResult<Option<Routed>> {
        let result = self.router.route(session, ctx).await;
        self.report(result)
    }

    /// Default result for a selected node: a preview for tables and views,
    /// the definition for everything else.
    pub async fn select(&self, session: &str, ctx: &NodeContext) -> DbResult<Option<ResultSet>> {
        let Some(target) = StructureTarget::from_context(ctx) else {
            debug!(session = %session, "Selection has no entity");
            return Ok(None);
        };
        let action = if target.previewable().is_some() {
            ActionKind::Preview
        } else {
            ActionKind::Structure
        };
        self.run_action(session, ctx, target, action).await.map(Some)
    }

    /// Run a node action.
    pub async fn action(
        &self,
        session: &str,
        action: ActionKind,
        ctx: &NodeContext,
    ) -> DbResult<ResultSet> {
        let target = StructureTarget::from_context(ctx).ok_or_else(|| {
            DbError::invalid_input(format!("Action '{:?}' needs an entity", action))
        })?;
        self.run_action(session, ctx, target, action).await
    }

    async fn run_action(
        &self,
        session: &str,
        ctx: &NodeContext,
        target: StructureTarget,
        action: ActionKind,
    ) -> DbResult<ResultSet> {
        if action == ActionKind::Preview && target.previewable().is_none() {
            return Err(DbError::invalid_input(
                "Only tables and views can be previewed",
            ));
        }

        let catalog = self.catalog;
        let executor = self.executor;
        let target = Arc::new(target);
        let result = self
            .router
            .with_recovery(session, ctx.connection.as_ref(), move |conn| {
                let target = Arc::clone(&target);
                Box::pin(async move {
                    match (action, target.previewable()) {
                        (ActionKind::Preview, Some((database, table))) => {
                            catalog.preview(conn, &executor, database, table).await
                        }
                        _ => catalog.structure(conn, &target).await,
                    }
                })
            })
            .await;
        self.report(result)
    }

    /// Rebuild one node from fresh metadata; `None` when it no longer exists.
    pub async fn refresh(
        &self,
        session: &str,
        ctx: &NodeContext,
        name: &str,
        actions: Option<Vec<NodeAction>>,
    ) -> DbResult<Option<MetadataNode>> {
        let catalog = self.catalog;
        let job = Arc::new((ctx.clone(), name.to_string(), actions));
        let result = self
            .router
            .with_recovery(session, ctx.connection.as_ref(), move |conn| {
                let job = Arc::clone(&job);
                Box::pin(async move {
                    let (ctx, name, actions) = &*job;
                    catalog.refresh(conn, ctx, name, actions.clone()).await
                })
            })
            .await;
        self.report(result)
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Run an ad-hoc statement tracked under `request_id`.
    ///
    /// A rejected statement is notified and yields `Ok(None)`; a session that
    /// cannot be reached is an error.
    pub async fn execute_query(
        &self,
        session: &str,
        request_id: &str,
        text: &str,
        credentials: Option<Credentials>,
    ) -> DbResult<Option<ResultSet>> {
        let credentials = self.resolve_credentials(session, credentials).await;
        let ticket = self.canceller.record(request_id, text, session).await;

        let executor = self.executor;
        let notifier = Arc::clone(&self.notifier);
        let text: Arc<str> = Arc::from(text);
        let result = self
            .router
            .with_recovery(session, credentials.as_ref(), move |conn| {
                let notifier = Arc::clone(&notifier);
                let text = Arc::clone(&text);
                Box::pin(async move { Ok(executor.execute_query(conn, &text, &notifier).await) })
            })
            .await;

        self.canceller.complete(request_id, ticket).await;
        self.report(result)
    }

    /// Best-effort cancellation of the query tracked under `request_id`.
    ///
    /// Without request credentials the running query's session credentials
    /// are used. Produces no value; failures are only logged.
    pub async fn cancel(&self, request_id: &str, credentials: Option<Credentials>) {
        let credentials = match credentials {
            Some(credentials) => Some(credentials),
            None => match self.canceller.session_of(request_id).await {
                Some(session) => self.registry.credentials(&session).await,
                None => None,
            },
        };

        match credentials {
            Some(credentials) => self.canceller.cancel(request_id, &credentials).await,
            None => {
                if self.canceller.discard(request_id).await {
                    warn!(request_id = %request_id, "No credentials to cancel with");
                } else {
                    debug!(request_id = %request_id, "No running query to cancel");
                }
            }
        }
    }

    /// Tear down on shutdown.
    pub async fn shutdown(&self) {
        info!("Closing all session pools");
        self.clear().await;
    }
}
