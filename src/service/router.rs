//! Request routing.
//!
//! A node context echoed back by the host is classified into a [`RequestKind`]
//! with first-match precedence, then dispatched by an exhaustive `match` to
//! the catalog. Missing session pools are created on demand from the
//! credentials embedded in the context.

use crate::db::catalog::{MetadataCatalog, StructureTarget};
use crate::db::driver::{ConnectionOp, Driver, SessionConnection};
use crate::db::registry::SessionRegistry;
use crate::error::{DbError, DbResult};
use crate::models::node::non_empty;
use crate::models::{Credentials, MetadataNode, NodeContext, ResultSet, RoutineKind, Topic};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// What a node interaction asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    SchemaTopics { database: String },
    TableList { database: String },
    TableItem { database: String, table: String },
    ViewList { database: String },
    ViewItem { database: String, view: String },
    FunctionList { database: String },
    ProcedureList { database: String },
    RoutineItem {
        database: String,
        kind: RoutineKind,
        name: String,
    },
    EventList { database: String },
    EventItem { database: String, event: String },
    TriggerList { database: String },
    TriggerItem { database: String, trigger: String },
}

impl NodeContext {
    /// Classify this context. The first matching rule wins; `None` is a no-op.
    ///
    /// Rule order: schema selected, table list, table, view list, view,
    /// function list, procedure list, routine, event list, event, trigger
    /// list, trigger.
    pub fn classify(&self) -> Option<RequestKind> {
        let database = self.database_name()?.to_string();

        if self.has_no_entity() {
            return Some(RequestKind::SchemaTopics { database });
        }
        if self.topic == Some(Topic::Tables) {
            return Some(RequestKind::TableList { database });
        }
        if let Some(table) = non_empty(&self.table) {
            return Some(RequestKind::TableItem {
                database,
                table: table.to_string(),
            });
        }
        if self.topic == Some(Topic::Views) {
            return Some(RequestKind::ViewList { database });
        }
        if let Some(view) = non_empty(&self.view) {
            return Some(RequestKind::ViewItem {
                database,
                view: view.to_string(),
            });
        }
        if self.topic == Some(Topic::Functions) {
            return Some(RequestKind::FunctionList { database });
        }
        if self.topic == Some(Topic::Procedures) {
            return Some(RequestKind::ProcedureList { database });
        }
        if let (Some(name), Some(kind)) = (non_empty(&self.routine), self.routine_kind) {
            return Some(RequestKind::RoutineItem {
                database,
                kind,
                name: name.to_string(),
            });
        }
        if self.topic == Some(Topic::Events) {
            return Some(RequestKind::EventList { database });
        }
        if let Some(event) = non_empty(&self.event) {
            return Some(RequestKind::EventItem {
                database,
                event: event.to_string(),
            });
        }
        if self.topic == Some(Topic::Triggers) {
            return Some(RequestKind::TriggerList { database });
        }
        if let Some(trigger) = non_empty(&self.trigger) {
            return Some(RequestKind::TriggerItem {
                database,
                trigger: trigger.to_string(),
            });
        }
        None
    }
}

/// Outcome of a routed request: child nodes, or a result for leaf entities.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Routed {
    Nodes(Vec<MetadataNode>),
    Result(ResultSet),
}

impl Routed {
    pub fn nodes(&self) -> Option<&[MetadataNode]> {
        match self {
            Routed::Nodes(nodes) => Some(nodes),
            Routed::Result(_) => None,
        }
    }
}

/// Run one classified request on a connection.
pub async fn handle<C: SessionConnection>(
    catalog: &MetadataCatalog,
    conn: &mut C,
    ctx: &NodeContext,
    kind: &RequestKind,
) -> DbResult<Routed> {
    let routed = match kind {
        RequestKind::SchemaTopics { database } => {
            Routed::Nodes(catalog.schema_topics(ctx, database))
        }
        RequestKind::TableList { database } => {
            Routed::Nodes(catalog.list_tables(conn, ctx, database).await?)
        }
        RequestKind::TableItem { database, table } => {
            Routed::Nodes(catalog.table_contents(conn, ctx, database, table).await?)
        }
        RequestKind::ViewList { database } => {
            Routed::Nodes(catalog.list_views(conn, ctx, database).await?)
        }
        RequestKind::ViewItem { database, view } => {
            Routed::Nodes(catalog.list_columns(conn, ctx, database, view).await?)
        }
        RequestKind::FunctionList { database } => Routed::Nodes(
            catalog
                .list_routines(conn, ctx, database, RoutineKind::Function)
                .await?,
        ),
        RequestKind::ProcedureList { database } => Routed::Nodes(
            catalog
                .list_routines(conn, ctx, database, RoutineKind::Procedure)
                .await?,
        ),
        RequestKind::RoutineItem {
            database,
            kind,
            name,
        } => {
            let target = StructureTarget::Routine {
                database: database.clone(),
                kind: *kind,
                name: name.clone(),
            };
            Routed::Result(catalog.structure(conn, &target).await?)
        }
        RequestKind::EventList { database } => {
            Routed::Nodes(catalog.list_events(conn, ctx, database).await?)
        }
        RequestKind::EventItem { database, event } => {
            let target = StructureTarget::Event {
                database: database.clone(),
                event: event.clone(),
            };
            Routed::Result(catalog.structure(conn, &target).await?)
        }
        RequestKind::TriggerList { database } => {
            Routed::Nodes(catalog.list_triggers(conn, ctx, database, None).await?)
        }
        RequestKind::TriggerItem { database, trigger } => {
            let target = StructureTarget::Trigger {
                database: database.clone(),
                trigger: trigger.clone(),
            };
            Routed::Result(catalog.structure(conn, &target).await?)
        }
    };
    Ok(routed)
}

pub struct RequestRouter<D: Driver> {
    registry: SessionRegistry<D>,
    catalog: MetadataCatalog,
}

impl<D: Driver> Clone for RequestRouter<D> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            catalog: self.catalog,
        }
    }
}

impl<D: Driver> RequestRouter<D> {
    pub fn new(registry: SessionRegistry<D>, catalog: MetadataCatalog) -> Self {
        Self { registry, catalog }
    }

    /// Classify and dispatch a node interaction.
    pub async fn route(&self, session: &str, ctx: &NodeContext) -> DbResult<Option<Routed>> {
        let Some(kind) = ctx.classify() else {
            debug!(session = %session, "Context matches no handler");
            return Ok(None);
        };
        debug!(session = %session, kind = ?kind, "Routing request");

        if let RequestKind::SchemaTopics { database } = &kind {
            return Ok(Some(Routed::Nodes(
                self.catalog.schema_topics(ctx, database),
            )));
        }

        let catalog = self.catalog;
        let job = Arc::new((ctx.clone(), kind));
        let routed = self
            .with_recovery(session, ctx.connection.as_ref(), move |conn| {
                let job = Arc::clone(&job);
                Box::pin(async move { handle(&catalog, conn, &job.0, &job.1).await })
            })
            .await?;
        Ok(Some(routed))
    }

    /// Run `op` on the session; on a missing pool, create it and retry once.
    ///
    /// Without credentials a missing pool is reported as a connection error.
    pub async fn with_recovery<R, F>(
        &self,
        session: &str,
        credentials: Option<&Credentials>,
        op: F,
    ) -> DbResult<R>
    where
        R: Send,
        F: for<'c> Fn(&'c mut D::Connection) -> ConnectionOp<'c, R> + Send + Sync,
    {
        match self.registry.with_connection(session, &op).await {
            Err(e) if e.is_pool_not_found() => {
                let credentials = credentials.ok_or_else(|| not_connected(session))?;
                info!(session = %session, "No pool for session, creating one");
                self.registry.ensure(session, credentials).await?;
                self.registry
                    .with_connection(session, &op)
                    .await
                    .map_err(|e| {
                        if e.is_pool_not_found() {
                            not_connected(session)
                        } else {
                            e
                        }
                    })
            }
            other => other,
        }
    }
}

fn not_connected(session: &str) -> DbError {
    DbError::connection(
        format!("Session '{}' is not connected", session),
        "Connect the session first or include its credentials in the request",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> NodeContext {
        NodeContext::default().with_database("sales")
    }

    #[test]
    fn test_schema_selected_routes_to_topics() {
        assert_eq!(
            schema().classify(),
            Some(RequestKind::SchemaTopics {
                database: "sales".into()
            })
        );
    }

    #[test]
    fn test_no_database_is_no_op() {
        assert_eq!(NodeContext::default().classify(), None);
        assert_eq!(NodeContext::default().with_table("orders").classify(), None);
    }

    #[test]
    fn test_table_wins_over_view() {
        let ctx = schema().with_table("orders").with_view("v_orders");
        assert_eq!(
            ctx.classify(),
            Some(RequestKind::TableItem {
                database: "sales".into(),
                table: "orders".into()
            })
        );
    }

    #[test]
    fn test_topic_lists() {
        let cases = [
            (Topic::Tables, "TableList"),
            (Topic::Views, "ViewList"),
            (Topic::Functions, "FunctionList"),
            (Topic::Procedures, "ProcedureList"),
            (Topic::Events, "EventList"),
            (Topic::Triggers, "TriggerList"),
        ];
        for (topic, expected) in cases {
            let kind = schema().with_topic(topic).classify().unwrap();
            assert!(format!("{:?}", kind).starts_with(expected), "{topic:?}");
        }
    }

    #[test]
    fn test_table_list_topic_wins_over_table_item() {
        let ctx = schema().with_topic(Topic::Tables).with_table("orders");
        assert_eq!(
            ctx.classify(),
            Some(RequestKind::TableList {
                database: "sales".into()
            })
        );
    }

    #[test]
    fn test_routine_needs_kind_tag() {
        let mut ctx = schema();
        ctx.routine = Some("archive".into());
        assert_eq!(ctx.classify(), None);

        let ctx = schema().with_routine(RoutineKind::Function, "total");
        assert_eq!(
            ctx.classify(),
            Some(RequestKind::RoutineItem {
                database: "sales".into(),
                kind: RoutineKind::Function,
                name: "total".into()
            })
        );
    }

    #[test]
    fn test_event_wins_over_trigger() {
        let ctx = schema().with_event("purge").with_trigger("trg");
        assert!(matches!(ctx.classify(), Some(RequestKind::EventItem { .. })));
    }

    #[test]
    fn test_column_context_is_no_op() {
        assert_eq!(schema().with_column("id").classify(), None);
    }
}
