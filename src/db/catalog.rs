//! Metadata catalog.
//!
//! Turns `information_schema` rows into navigation nodes and `SHOW CREATE`
//! output into structure results.
//!
//! # Architecture
//!
//! SQL is kept in the `queries` submodule. Every list query has a single-entity
//! twin returning the same columns, so one row-to-node builder serves both the
//! list operation and [`MetadataCatalog::refresh`].

use crate::db::driver::{Record, RowSet, SessionConnection};
use crate::db::executor::QueryExecutor;
use crate::error::{DbError, DbResult};
use crate::models::node::non_empty;
use crate::models::{
    ColumnKey, DEFAULT_PREVIEW_LIMIT, Icon, MAX_PREVIEW_LIMIT, MetadataNode, NodeAction,
    NodeContext, NodeKind, ResultSet, RoutineKind, Topic,
};
use humansize::{DECIMAL, format_size};
use tracing::debug;

/// Schemas hidden from the tree unless configured otherwise.
pub const SYSTEM_SCHEMAS: &[&str] = &["information_schema", "mysql", "performance_schema", "sys"];

// =============================================================================
// SQL Query Templates
// =============================================================================

mod queries {
    pub const LIST_SCHEMAS: &str = r#"
        SELECT
            CONVERT(SCHEMA_NAME USING utf8mb4) AS SCHEMA_NAME,
            CONVERT(DEFAULT_CHARACTER_SET_NAME USING utf8mb4) AS CHARSET_NAME,
            CONVERT(DEFAULT_COLLATION_NAME USING utf8mb4) AS COLLATION_NAME
        FROM information_schema.SCHEMATA
        ORDER BY SCHEMA_NAME
        "#;

    pub const GET_SCHEMA: &str = r#"
        SELECT
            CONVERT(SCHEMA_NAME USING utf8mb4) AS SCHEMA_NAME,
            CONVERT(DEFAULT_CHARACTER_SET_NAME USING utf8mb4) AS CHARSET_NAME,
            CONVERT(DEFAULT_COLLATION_NAME USING utf8mb4) AS COLLATION_NAME
        FROM information_schema.SCHEMATA
        WHERE SCHEMA_NAME = ?
        "#;

    pub const LIST_TABLES: &str = r#"
        SELECT
            CONVERT(TABLE_NAME USING utf8mb4) AS TABLE_NAME,
            CONVERT(TABLE_COMMENT USING utf8mb4) AS TABLE_COMMENT,
            TABLE_ROWS AS ROW_COUNT,
            CAST(COALESCE(DATA_LENGTH, 0) + COALESCE(INDEX_LENGTH, 0) AS UNSIGNED) AS TOTAL_SIZE
        FROM information_schema.TABLES
        WHERE TABLE_SCHEMA = ?
        AND TABLE_TYPE = 'BASE TABLE'
        ORDER BY TABLE_NAME
        "#;

    pub const GET_TABLE: &str = r#"
        SELECT
            CONVERT(TABLE_NAME USING utf8mb4) AS TABLE_NAME,
            CONVERT(TABLE_COMMENT USING utf8mb4) AS TABLE_COMMENT,
            TABLE_ROWS AS ROW_COUNT,
            CAST(COALESCE(DATA_LENGTH, 0) + COALESCE(INDEX_LENGTH, 0) AS UNSIGNED) AS TOTAL_SIZE
        FROM information_schema.TABLES
        WHERE TABLE_SCHEMA = ?
        AND TABLE_TYPE = 'BASE TABLE'
        AND TABLE_NAME = ?
        "#;

    pub const LIST_VIEWS: &str = r#"
        SELECT
            CONVERT(TABLE_NAME USING utf8mb4) AS TABLE_NAME,
            CONVERT(IS_UPDATABLE USING utf8mb4) AS IS_UPDATABLE
        FROM information_schema.VIEWS
        WHERE TABLE_SCHEMA = ?
        ORDER BY TABLE_NAME
        "#;

    pub const GET_VIEW: &str = r#"
        SELECT
            CONVERT(TABLE_NAME USING utf8mb4) AS TABLE_NAME,
            CONVERT(IS_UPDATABLE USING utf8mb4) AS IS_UPDATABLE
        FROM information_schema.VIEWS
        WHERE TABLE_SCHEMA = ?
        AND TABLE_NAME = ?
        "#;

    /// Columns with a foreign-key count from KEY_COLUMN_USAGE.
    pub const LIST_COLUMNS: &str = r#"
        SELECT
            CONVERT(c.COLUMN_NAME USING utf8mb4) AS COLUMN_NAME,
            CONVERT(c.COLUMN_TYPE USING utf8mb4) AS COLUMN_TYPE,
            CONVERT(c.IS_NULLABLE USING utf8mb4) AS IS_NULLABLE,
            CONVERT(c.COLUMN_DEFAULT USING utf8mb4) AS COLUMN_DEFAULT,
            CONVERT(c.COLUMN_KEY USING utf8mb4) AS COLUMN_KEY,
            CONVERT(c.EXTRA USING utf8mb4) AS EXTRA,
            CONVERT(c.COLUMN_COMMENT USING utf8mb4) AS COLUMN_COMMENT,
            (
                SELECT COUNT(*)
                FROM information_schema.KEY_COLUMN_USAGE k
                WHERE k.TABLE_SCHEMA = c.TABLE_SCHEMA
                AND k.TABLE_NAME = c.TABLE_NAME
                AND k.COLUMN_NAME = c.COLUMN_NAME
                AND k.REFERENCED_TABLE_NAME IS NOT NULL
            ) AS FK_COUNT
        FROM information_schema.COLUMNS c
        WHERE c.TABLE_SCHEMA = ?
        AND c.TABLE_NAME = ?
        ORDER BY c.ORDINAL_POSITION
        "#;

    pub const LIST_ROUTINES: &str = r#"
        SELECT
            CONVERT(ROUTINE_NAME USING utf8mb4) AS ROUTINE_NAME,
            CONVERT(DTD_IDENTIFIER USING utf8mb4) AS RETURN_TYPE,
            CONVERT(ROUTINE_COMMENT USING utf8mb4) AS ROUTINE_COMMENT
        FROM information_schema.ROUTINES
        WHERE ROUTINE_SCHEMA = ?
        AND ROUTINE_TYPE = ?
        ORDER BY ROUTINE_NAME
        "#;

    pub const GET_ROUTINE: &str = r#"
        SELECT
            CONVERT(ROUTINE_NAME USING utf8mb4) AS ROUTINE_NAME,
            CONVERT(DTD_IDENTIFIER USING utf8mb4) AS RETURN_TYPE,
            CONVERT(ROUTINE_COMMENT USING utf8mb4) AS ROUTINE_COMMENT
        FROM information_schema.ROUTINES
        WHERE ROUTINE_SCHEMA = ?
        AND ROUTINE_TYPE = ?
        AND ROUTINE_NAME = ?
        "#;

    pub const LIST_TRIGGERS: &str = r#"
        SELECT
            CONVERT(TRIGGER_NAME USING utf8mb4) AS TRIGGER_NAME,
            CONVERT(ACTION_TIMING USING utf8mb4) AS ACTION_TIMING,
            CONVERT(EVENT_MANIPULATION USING utf8mb4) AS EVENT_MANIPULATION,
            CONVERT(EVENT_OBJECT_TABLE USING utf8mb4) AS EVENT_OBJECT_TABLE
        FROM information_schema.TRIGGERS
        WHERE TRIGGER_SCHEMA = ?
        ORDER BY TRIGGER_NAME
        "#;

    pub const LIST_TABLE_TRIGGERS: &str = r#"
        SELECT
            CONVERT(TRIGGER_NAME USING utf8mb4) AS TRIGGER_NAME,
            CONVERT(ACTION_TIMING USING utf8mb4) AS ACTION_TIMING,
            CONVERT(EVENT_MANIPULATION USING utf8mb4) AS EVENT_MANIPULATION,
            CONVERT(EVENT_OBJECT_TABLE USING utf8mb4) AS EVENT_OBJECT_TABLE
        FROM information_schema.TRIGGERS
        WHERE TRIGGER_SCHEMA = ?
        AND EVENT_OBJECT_TABLE = ?
        ORDER BY ACTION_ORDER, TRIGGER_NAME
        "#;

    pub const GET_TRIGGER: &str = r#"
        SELECT
            CONVERT(TRIGGER_NAME USING utf8mb4) AS TRIGGER_NAME,
            CONVERT(ACTION_TIMING USING utf8mb4) AS ACTION_TIMING,
            CONVERT(EVENT_MANIPULATION USING utf8mb4) AS EVENT_MANIPULATION,
            CONVERT(EVENT_OBJECT_TABLE USING utf8mb4) AS EVENT_OBJECT_TABLE
        FROM information_schema.TRIGGERS
        WHERE TRIGGER_SCHEMA = ?
        AND TRIGGER_NAME = ?
        "#;

    pub const LIST_EVENTS: &str = r#"
        SELECT
            CONVERT(EVENT_NAME USING utf8mb4) AS EVENT_NAME,
            CONVERT(STATUS USING utf8mb4) AS STATUS,
            CONVERT(EVENT_TYPE USING utf8mb4) AS EVENT_TYPE,
            CONVERT(EXECUTE_AT USING utf8mb4) AS EXECUTE_AT,
            CONVERT(INTERVAL_VALUE USING utf8mb4) AS INTERVAL_VALUE,
            CONVERT(INTERVAL_FIELD USING utf8mb4) AS INTERVAL_FIELD
        FROM information_schema.EVENTS
        WHERE EVENT_SCHEMA = ?
        ORDER BY EVENT_NAME
        "#;

    pub const GET_EVENT: &str = r#"
        SELECT
            CONVERT(EVENT_NAME USING utf8mb4) AS EVENT_NAME,
            CONVERT(STATUS USING utf8mb4) AS STATUS,
            CONVERT(EVENT_TYPE USING utf8mb4) AS EVENT_TYPE,
            CONVERT(EXECUTE_AT USING utf8mb4) AS EXECUTE_AT,
            CONVERT(INTERVAL_VALUE USING utf8mb4) AS INTERVAL_VALUE,
            CONVERT(INTERVAL_FIELD USING utf8mb4) AS INTERVAL_FIELD
        FROM information_schema.EVENTS
        WHERE EVENT_SCHEMA = ?
        AND EVENT_NAME = ?
        "#;
}

// =============================================================================
// Identifiers and Structure Targets
// =============================================================================

/// Backtick-quote an identifier, doubling embedded backticks.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Bounded preview statement for a table or view.
pub fn preview_sql(database: &str, table: &str, limit: u32) -> String {
    format!(
        "SELECT * FROM {}.{} LIMIT {}",
        quote_ident(database),
        quote_ident(table),
        limit
    )
}

/// Entity whose `SHOW CREATE` text can be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructureTarget {
    Database(String),
    Table { database: String, table: String },
    View { database: String, view: String },
    Routine {
        database: String,
        kind: RoutineKind,
        name: String,
    },
    Trigger { database: String, trigger: String },
    Event { database: String, event: String },
}

impl StructureTarget {
    /// Resolve the entity a node context points at.
    ///
    /// Same precedence as routing: table, view, routine, event, trigger, then
    /// the schema itself when nothing below it is selected.
    pub fn from_context(ctx: &NodeContext) -> Option<Self> {
        let database = ctx.database_name()?.to_string();

        if let Some(table) = non_empty(&ctx.table) {
            return Some(Self::Table {
                database,
                table: table.to_string(),
            });
        }
        if let Some(view) = non_empty(&ctx.view) {
            return Some(Self::View {
                database,
                view: view.to_string(),
            });
        }
        if let (Some(name), Some(kind)) = (non_empty(&ctx.routine), ctx.routine_kind) {
            return Some(Self::Routine {
                database,
                kind,
                name: name.to_string(),
            });
        }
        if let Some(event) = non_empty(&ctx.event) {
            return Some(Self::Event {
                database,
                event: event.to_string(),
            });
        }
        if let Some(trigger) = non_empty(&ctx.trigger) {
            return Some(Self::Trigger {
                database,
                trigger: trigger.to_string(),
            });
        }
        ctx.has_no_entity().then_some(Self::Database(database))
    }

    /// The `SHOW CREATE` statement and the result column holding the DDL.
    pub fn show_create(&self) -> (String, &'static str) {
        match self {
            Self::Database(db) => (
                format!("SHOW CREATE DATABASE {}", quote_ident(db)),
                "Create Database",
            ),
            Self::Table { database, table } => (
                format!(
                    "SHOW CREATE TABLE {}.{}",
                    quote_ident(database),
                    quote_ident(table)
                ),
                "Create Table",
            ),
            Self::View { database, view } => (
                format!(
                    "SHOW CREATE VIEW {}.{}",
                    quote_ident(database),
                    quote_ident(view)
                ),
                "Create View",
            ),
            Self::Routine {
                database,
                kind,
                name,
            } => (
                format!(
                    "SHOW CREATE {} {}.{}",
                    kind.show_create_keyword(),
                    quote_ident(database),
                    quote_ident(name)
                ),
                kind.create_column(),
            ),
            Self::Trigger { database, trigger } => (
                format!(
                    "SHOW CREATE TRIGGER {}.{}",
                    quote_ident(database),
                    quote_ident(trigger)
                ),
                "SQL Original Statement",
            ),
            Self::Event { database, event } => (
                format!(
                    "SHOW CREATE EVENT {}.{}",
                    quote_ident(database),
                    quote_ident(event)
                ),
                "Create Event",
            ),
        }
    }

    /// Table or view that can be previewed.
    pub fn previewable(&self) -> Option<(&str, &str)> {
        match self {
            Self::Table { database, table } => Some((database, table)),
            Self::View { database, view } => Some((database, view)),
            _ => None,
        }
    }

    fn display_name(&self) -> &str {
        match self {
            Self::Database(db) => db,
            Self::Table { table, .. } => table,
            Self::View { view, .. } => view,
            Self::Routine { name, .. } => name,
            Self::Trigger { trigger, .. } => trigger,
            Self::Event { event, .. } => event,
        }
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// Introspection settings; the catalog itself is stateless.
#[derive(Debug, Clone, Copy)]
pub struct MetadataCatalog {
    preview_limit: u32,
    show_system_schemas: bool,
}

impl Default for MetadataCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_PREVIEW_LIMIT, false)
    }
}

impl MetadataCatalog {
    pub fn new(preview_limit: u32, show_system_schemas: bool) -> Self {
        Self {
            preview_limit: preview_limit.clamp(1, MAX_PREVIEW_LIMIT),
            show_system_schemas,
        }
    }

    pub fn preview_limit(&self) -> u32 {
        self.preview_limit
    }

    async fn fetch<C: SessionConnection>(
        conn: &mut C,
        sql: &str,
        params: &[&str],
    ) -> DbResult<RowSet> {
        let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();
        Ok(conn.query(sql, &params).await?.into_rows())
    }

    // -------------------------------------------------------------------------
    // Schemas
    // -------------------------------------------------------------------------

    /// Schema nodes, the root of the tree.
    pub async fn list_schemas<C: SessionConnection>(
        &self,
        conn: &mut C,
        root: &NodeContext,
    ) -> DbResult<Vec<MetadataNode>> {
        let rows = Self::fetch(conn, queries::LIST_SCHEMAS, &[]).await?;
        let nodes: Vec<MetadataNode> = rows
            .records()
            .filter_map(|r| schema_node(root, r))
            .filter(|node| self.show_system_schemas || !is_system_schema(&node.name))
            .collect();
        debug!(count = nodes.len(), "Listed schemas");
        Ok(nodes)
    }

    /// Static topic folders under a schema. No round trip.
    pub fn schema_topics(&self, ctx: &NodeContext, database: &str) -> Vec<MetadataNode> {
        Topic::ALL
            .iter()
            .map(|&topic| topic_node(ctx, database, topic))
            .collect()
    }

    // -------------------------------------------------------------------------
    // Tables and views
    // -------------------------------------------------------------------------

    pub async fn list_tables<C: SessionConnection>(
        &self,
        conn: &mut C,
        ctx: &NodeContext,
        database: &str,
    ) -> DbResult<Vec<MetadataNode>> {
        let rows = Self::fetch(conn, queries::LIST_TABLES, &[database]).await?;
        let nodes: Vec<MetadataNode> = rows
            .records()
            .filter_map(|r| table_node(ctx, database, r))
            .collect();
        debug!(database = %database, count = nodes.len(), "Listed tables");
        Ok(nodes)
    }

    pub async fn list_views<C: SessionConnection>(
        &self,
        conn: &mut C,
        ctx: &NodeContext,
        database: &str,
    ) -> DbResult<Vec<MetadataNode>> {
        let rows = Self::fetch(conn, queries::LIST_VIEWS, &[database]).await?;
        let nodes: Vec<MetadataNode> = rows
            .records()
            .filter_map(|r| view_node(ctx, database, r))
            .collect();
        debug!(database = %database, count = nodes.len(), "Listed views");
        Ok(nodes)
    }

    /// Columns of a table or view, each classified once by key role.
    pub async fn list_columns<C: SessionConnection>(
        &self,
        conn: &mut C,
        ctx: &NodeContext,
        database: &str,
        table: &str,
    ) -> DbResult<Vec<MetadataNode>> {
        let rows = Self::fetch(conn, queries::LIST_COLUMNS, &[database, table]).await?;
        Ok(rows
            .records()
            .filter_map(|r| column_node(ctx, database, r))
            .collect())
    }

    /// Children of a table node: its columns followed by its triggers.
    pub async fn table_contents<C: SessionConnection>(
        &self,
        conn: &mut C,
        ctx: &NodeContext,
        database: &str,
        table: &str,
    ) -> DbResult<Vec<MetadataNode>> {
        let mut nodes = self.list_columns(conn, ctx, database, table).await?;
        nodes.extend(self.list_triggers(conn, ctx, database, Some(table)).await?);
        Ok(nodes)
    }

    // -------------------------------------------------------------------------
    // Routines, triggers and events
    // -------------------------------------------------------------------------

    /// Functions or procedures; the kind selects the `ROUTINE_TYPE` filter.
    pub async fn list_routines<C: SessionConnection>(
        &self,
        conn: &mut C,
        ctx: &NodeContext,
        database: &str,
        kind: RoutineKind,
    ) -> DbResult<Vec<MetadataNode>> {
        let rows = Self::fetch(
            conn,
            queries::LIST_ROUTINES,
            &[database, kind.routine_type()],
        )
        .await?;
        Ok(rows
            .records()
            .filter_map(|r| routine_node(ctx, database, kind, r))
            .collect())
    }

    /// Triggers of a schema, or of one table.
    pub async fn list_triggers<C: SessionConnection>(
        &self,
        conn: &mut C,
        ctx: &NodeContext,
        database: &str,
        table: Option<&str>,
    ) -> DbResult<Vec<MetadataNode>> {
        let rows = match table {
            Some(table) => {
                Self::fetch(conn, queries::LIST_TABLE_TRIGGERS, &[database, table]).await?
            }
            None => Self::fetch(conn, queries::LIST_TRIGGERS, &[database]).await?,
        };
        Ok(rows
            .records()
            .filter_map(|r| trigger_node(ctx, database, r))
            .collect())
    }

    pub async fn list_events<C: SessionConnection>(
        &self,
        conn: &mut C,
        ctx: &NodeContext,
        database: &str,
    ) -> DbResult<Vec<MetadataNode>> {
        let rows = Self::fetch(conn, queries::LIST_EVENTS, &[database]).await?;
        Ok(rows
            .records()
            .filter_map(|r| event_node(ctx, database, r))
            .collect())
    }

    // -------------------------------------------------------------------------
    // Structure and preview
    // -------------------------------------------------------------------------

    /// `SHOW CREATE ...` text of an entity.
    pub async fn structure<C: SessionConnection>(
        &self,
        conn: &mut C,
        target: &StructureTarget,
    ) -> DbResult<ResultSet> {
        let (sql, column) = target.show_create();
        let rows = Self::fetch(conn, &sql, &[]).await?;
        rows.first()
            .and_then(|r| r.non_empty_text(column))
            .map(ResultSet::structure)
            .ok_or_else(|| {
                DbError::query(
                    format!("No definition available for '{}'", target.display_name()),
                    None,
                    "Check that the object exists and that the user may see its definition",
                )
            })
    }

    /// First rows of a table or view, carrying the generated statement.
    pub async fn preview<C: SessionConnection>(
        &self,
        conn: &mut C,
        executor: &QueryExecutor,
        database: &str,
        table: &str,
    ) -> DbResult<ResultSet> {
        let sql = preview_sql(database, table, self.preview_limit);
        let result = executor.execute(conn, &sql).await?;
        Ok(result.with_query(sql))
    }

    // -------------------------------------------------------------------------
    // Refresh
    // -------------------------------------------------------------------------

    /// Rebuild a single node from fresh metadata.
    ///
    /// The rebuilt node keeps `name` and, when given, the original `actions`.
    /// Returns `None` when the entity no longer exists, or for a column whose
    /// context does not name its table.
    pub async fn refresh<C: SessionConnection>(
        &self,
        conn: &mut C,
        ctx: &NodeContext,
        name: &str,
        actions: Option<Vec<NodeAction>>,
    ) -> DbResult<Option<MetadataNode>> {
        let database = ctx
            .database_name()
            .ok_or_else(|| DbError::invalid_input("Cannot refresh a node without a database"))?;

        let node = if let Some(column) = non_empty(&ctx.column) {
            // Column contexts only locate their column when they name the table.
            match non_empty(&ctx.table) {
                Some(table) => self
                    .list_columns(conn, ctx, database, table)
                    .await?
                    .into_iter()
                    .find(|node| node.label == column),
                None => None,
            }
        } else if let Some(table) = non_empty(&ctx.table) {
            let rows = Self::fetch(conn, queries::GET_TABLE, &[database, table]).await?;
            rows.first().and_then(|r| table_node(ctx, database, r))
        } else if let Some(view) = non_empty(&ctx.view) {
            let rows = Self::fetch(conn, queries::GET_VIEW, &[database, view]).await?;
            rows.first().and_then(|r| view_node(ctx, database, r))
        } else if let (Some(routine), Some(kind)) = (non_empty(&ctx.routine), ctx.routine_kind) {
            let rows = Self::fetch(
                conn,
                queries::GET_ROUTINE,
                &[database, kind.routine_type(), routine],
            )
            .await?;
            rows.first()
                .and_then(|r| routine_node(ctx, database, kind, r))
        } else if let Some(event) = non_empty(&ctx.event) {
            let rows = Self::fetch(conn, queries::GET_EVENT, &[database, event]).await?;
            rows.first().and_then(|r| event_node(ctx, database, r))
        } else if let Some(trigger) = non_empty(&ctx.trigger) {
            let rows = Self::fetch(conn, queries::GET_TRIGGER, &[database, trigger]).await?;
            rows.first().and_then(|r| trigger_node(ctx, database, r))
        } else if let Some(topic) = ctx.topic {
            let exists = !Self::fetch(conn, queries::GET_SCHEMA, &[database])
                .await?
                .is_empty();
            exists.then(|| topic_node(ctx, database, topic))
        } else {
            let rows = Self::fetch(conn, queries::GET_SCHEMA, &[database]).await?;
            rows.first().and_then(|r| schema_node(ctx, r))
        };

        Ok(node.map(|mut node| {
            node.name = name.to_string();
            if actions.is_some() {
                node.actions = actions;
            }
            node
        }))
    }
}

pub fn is_system_schema(name: &str) -> bool {
    SYSTEM_SCHEMAS
        .iter()
        .any(|system| system.eq_ignore_ascii_case(name))
}

// =============================================================================
// Node Builders
// =============================================================================

fn schema_node(ctx: &NodeContext, r: Record<'_>) -> Option<MetadataNode> {
    let name = r.non_empty_text("SCHEMA_NAME")?;
    let details = match (r.non_empty_text("CHARSET_NAME"), r.non_empty_text("COLLATION_NAME")) {
        (Some(charset), Some(collation)) => Some(format!("{} / {}", charset, collation)),
        (charset, collation) => charset.or(collation),
    };
    Some(
        MetadataNode::new(
            NodeKind::Schema,
            &name,
            Icon::Database,
            ctx.root().with_database(&name),
        )
        .with_details(details)
        .expandable()
        .with_actions(vec![NodeAction::structure()]),
    )
}

fn topic_node(ctx: &NodeContext, database: &str, topic: Topic) -> MetadataNode {
    MetadataNode::new(
        NodeKind::Folder,
        topic.label(),
        Icon::Folder,
        ctx.root().with_database(database).with_topic(topic),
    )
    .expandable()
}

fn table_node(ctx: &NodeContext, database: &str, r: Record<'_>) -> Option<MetadataNode> {
    let name = r.non_empty_text("TABLE_NAME")?;
    Some(
        MetadataNode::new(
            NodeKind::Table,
            &name,
            Icon::Table,
            ctx.root().with_database(database).with_table(&name),
        )
        .with_details(table_details(
            r.non_empty_text("TABLE_COMMENT"),
            r.u64("ROW_COUNT"),
            r.u64("TOTAL_SIZE"),
        ))
        .expandable()
        .with_actions(vec![NodeAction::preview(), NodeAction::structure()]),
    )
}

/// The table comment, or the approximate row count and on-disk size.
pub fn table_details(
    comment: Option<String>,
    row_count: Option<u64>,
    total_size: Option<u64>,
) -> Option<String> {
    if let Some(comment) = comment.filter(|c| !c.trim().is_empty()) {
        return Some(comment);
    }
    match (row_count, total_size) {
        (Some(rows), Some(size)) => Some(format!("~{} rows, {}", rows, format_size(size, DECIMAL))),
        (Some(rows), None) => Some(format!("~{} rows", rows)),
        (None, Some(size)) => Some(format_size(size, DECIMAL)),
        (None, None) => None,
    }
}

fn view_node(ctx: &NodeContext, database: &str, r: Record<'_>) -> Option<MetadataNode> {
    let name = r.non_empty_text("TABLE_NAME")?;
    let read_only = r
        .text("IS_UPDATABLE")
        .is_some_and(|v| v.eq_ignore_ascii_case("NO"));
    Some(
        MetadataNode::new(
            NodeKind::View,
            &name,
            Icon::View,
            ctx.root().with_database(database).with_view(&name),
        )
        .with_details(read_only.then(|| "read-only".to_string()))
        .expandable()
        .with_actions(vec![NodeAction::preview(), NodeAction::structure()]),
    )
}

fn column_node(ctx: &NodeContext, database: &str, r: Record<'_>) -> Option<MetadataNode> {
    let name = r.non_empty_text("COLUMN_NAME")?;
    let key = column_key(
        r.text("COLUMN_KEY").as_deref(),
        r.u64("FK_COUNT").unwrap_or(0),
    );
    Some(
        MetadataNode::new(
            NodeKind::Column,
            &name,
            key.icon(),
            ctx.root().with_database(database).with_column(&name),
        )
        .with_details(Some(column_details(&r))),
    )
}

/// Primary key wins over foreign key; anything else is plain.
pub fn column_key(column_key: Option<&str>, fk_count: u64) -> ColumnKey {
    if column_key.is_some_and(|k| k.eq_ignore_ascii_case("PRI")) {
        ColumnKey::PrimaryKey
    } else if fk_count > 0 {
        ColumnKey::ForeignKey
    } else {
        ColumnKey::Plain
    }
}

fn column_details(r: &Record<'_>) -> String {
    let mut details = r.text("COLUMN_TYPE").unwrap_or_default();
    if r
        .text("IS_NULLABLE")
        .is_some_and(|v| v.eq_ignore_ascii_case("NO"))
    {
        details.push_str(" NOT NULL");
    }
    if let Some(default) = r.text("COLUMN_DEFAULT") {
        details.push_str(&format!(" DEFAULT {}", default));
    }
    if let Some(extra) = r.non_empty_text("EXTRA") {
        details.push(' ');
        details.push_str(&extra);
    }
    if let Some(comment) = r.non_empty_text("COLUMN_COMMENT") {
        details.push_str(&format!(" ({})", comment));
    }
    details
}

fn routine_node(
    ctx: &NodeContext,
    database: &str,
    kind: RoutineKind,
    r: Record<'_>,
) -> Option<MetadataNode> {
    let name = r.non_empty_text("ROUTINE_NAME")?;
    let details = match kind {
        RoutineKind::Function => r
            .non_empty_text("RETURN_TYPE")
            .map(|t| format!("returns {}", t)),
        RoutineKind::Procedure => r.non_empty_text("ROUTINE_COMMENT"),
    };
    Some(
        MetadataNode::new(
            NodeKind::Routine,
            &name,
            kind.icon(),
            ctx.root().with_database(database).with_routine(kind, &name),
        )
        .with_details(details)
        .with_actions(vec![NodeAction::structure()]),
    )
}

fn trigger_node(ctx: &NodeContext, database: &str, r: Record<'_>) -> Option<MetadataNode> {
    let name = r.non_empty_text("TRIGGER_NAME")?;
    let details = match (
        r.non_empty_text("ACTION_TIMING"),
        r.non_empty_text("EVENT_MANIPULATION"),
        r.non_empty_text("EVENT_OBJECT_TABLE"),
    ) {
        (Some(timing), Some(event), Some(table)) => {
            Some(format!("{} {} ON {}", timing, event, table))
        }
        _ => None,
    };
    Some(
        MetadataNode::new(
            NodeKind::Trigger,
            &name,
            Icon::Trigger,
            ctx.root().with_database(database).with_trigger(&name),
        )
        .with_details(details)
        .with_actions(vec![NodeAction::structure()]),
    )
}

fn event_node(ctx: &NodeContext, database: &str, r: Record<'_>) -> Option<MetadataNode> {
    let name = r.non_empty_text("EVENT_NAME")?;
    let schedule = if r
        .text("EVENT_TYPE")
        .is_some_and(|t| t.eq_ignore_ascii_case("RECURRING"))
    {
        match (r.text("INTERVAL_VALUE"), r.text("INTERVAL_FIELD")) {
            (Some(value), Some(field)) => Some(format!("every {} {}", value, field)),
            _ => None,
        }
    } else {
        r.text("EXECUTE_AT").map(|at| format!("at {}", at))
    };
    let details = match (r.non_empty_text("STATUS"), schedule) {
        (Some(status), Some(schedule)) => Some(format!("{}, {}", status, schedule)),
        (status, schedule) => status.or(schedule),
    };
    Some(
        MetadataNode::new(
            NodeKind::Event,
            &name,
            Icon::Event,
            ctx.root().with_database(database).with_event(&name),
        )
        .with_details(details)
        .with_actions(vec![NodeAction::structure()]),
    )
}
