//! Metadata tree models.
//!
//! A [`MetadataNode`] is one entry of the navigation tree. Its `datasets`
//! context is echoed back by the host on the next interaction with the node,
//! which is how the router knows what was clicked.

use crate::models::Credentials;
use serde::{Deserialize, Serialize};

/// Icon key resolved to an asset by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Icon {
    Database,
    Folder,
    Table,
    View,
    Function,
    Procedure,
    Trigger,
    Event,
    Column,
    ColumnPrimaryKey,
    ColumnForeignKey,
    Preview,
    Structure,
}

/// Internal marker of what a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Schema,
    Folder,
    Table,
    View,
    Routine,
    Trigger,
    Event,
    Column,
}

/// Folder shown under a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    Tables,
    Views,
    Functions,
    Procedures,
    Triggers,
    Events,
}

impl Topic {
    /// Folder order under a schema node.
    pub const ALL: [Topic; 6] = [
        Topic::Tables,
        Topic::Views,
        Topic::Functions,
        Topic::Procedures,
        Topic::Triggers,
        Topic::Events,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Topic::Tables => "Tables",
            Topic::Views => "Views",
            Topic::Functions => "Functions",
            Topic::Procedures => "Procedures",
            Topic::Triggers => "Triggers",
            Topic::Events => "Events",
        }
    }
}

/// Function or procedure; both share one node shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutineKind {
    Function,
    Procedure,
}

impl RoutineKind {
    /// Value of `information_schema.ROUTINES.ROUTINE_TYPE`.
    pub fn routine_type(self) -> &'static str {
        match self {
            RoutineKind::Function => "FUNCTION",
            RoutineKind::Procedure => "PROCEDURE",
        }
    }

    /// Keyword used in `SHOW CREATE <kind>`.
    pub fn show_create_keyword(self) -> &'static str {
        self.routine_type()
    }

    /// Column of the `SHOW CREATE` result holding the DDL.
    pub fn create_column(self) -> &'static str {
        match self {
            RoutineKind::Function => "Create Function",
            RoutineKind::Procedure => "Create Procedure",
        }
    }

    pub fn icon(self) -> Icon {
        match self {
            RoutineKind::Function => Icon::Function,
            RoutineKind::Procedure => Icon::Procedure,
        }
    }

    pub fn topic(self) -> Topic {
        match self {
            RoutineKind::Function => Topic::Functions,
            RoutineKind::Procedure => Topic::Procedures,
        }
    }
}

/// Key role of a column, decided once per column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKey {
    PrimaryKey,
    ForeignKey,
    Plain,
}

impl ColumnKey {
    pub fn icon(self) -> Icon {
        match self {
            ColumnKey::PrimaryKey => Icon::ColumnPrimaryKey,
            ColumnKey::ForeignKey => Icon::ColumnForeignKey,
            ColumnKey::Plain => Icon::Column,
        }
    }
}

/// Context attached to a node and echoed back by the host.
///
/// Which fields are populated decides how the next interaction is routed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<Credentials>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<Topic>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routine_kind: Option<RoutineKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

impl NodeContext {
    /// Root context for a session.
    pub fn session(session: impl Into<String>, credentials: Option<Credentials>) -> Self {
        Self {
            session: Some(session.into()),
            connection: credentials,
            ..Default::default()
        }
    }

    /// Keep only the session part (credentials and session name).
    pub fn root(&self) -> Self {
        Self {
            connection: self.connection.clone(),
            session: self.session.clone(),
            ..Default::default()
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_topic(mut self, topic: Topic) -> Self {
        self.topic = Some(topic);
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_view(mut self, view: impl Into<String>) -> Self {
        self.view = Some(view.into());
        self
    }

    pub fn with_routine(mut self, kind: RoutineKind, name: impl Into<String>) -> Self {
        self.routine_kind = Some(kind);
        self.routine = Some(name.into());
        self
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    pub fn with_trigger(mut self, trigger: impl Into<String>) -> Self {
        self.trigger = Some(trigger.into());
        self
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    /// The schema this context points into, ignoring empty strings.
    pub fn database_name(&self) -> Option<&str> {
        non_empty(&self.database)
    }

    /// True when no entity below the schema is selected.
    pub(crate) fn has_no_entity(&self) -> bool {
        self.topic.is_none()
            && non_empty(&self.table).is_none()
            && non_empty(&self.view).is_none()
            && non_empty(&self.routine).is_none()
            && self.routine_kind.is_none()
            && non_empty(&self.event).is_none()
            && non_empty(&self.trigger).is_none()
            && non_empty(&self.column).is_none()
    }
}

pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Action offered on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Preview,
    Structure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeAction {
    pub name: ActionKind,
    pub icon: Icon,
    pub description: &'static str,
}

impl NodeAction {
    pub fn preview() -> Self {
        Self {
            name: ActionKind::Preview,
            icon: Icon::Preview,
            description: "Preview the first rows",
        }
    }

    pub fn structure() -> Self {
        Self {
            name: ActionKind::Structure,
            icon: Icon::Structure,
            description: "Show the CREATE statement",
        }
    }
}

impl From<ActionKind> for NodeAction {
    fn from(kind: ActionKind) -> Self {
        match kind {
            ActionKind::Preview => Self::preview(),
            ActionKind::Structure => Self::structure(),
        }
    }
}

/// One node of the navigation tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataNode {
    pub label: String,
    pub name: String,
    pub icon: Icon,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub collapsed: bool,
    pub datasets: NodeContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<NodeAction>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<MetadataNode>>,
    #[serde(skip)]
    pub kind: NodeKind,
}

impl MetadataNode {
    /// Create a leaf node whose label equals its name.
    pub fn new(kind: NodeKind, name: impl Into<String>, icon: Icon, datasets: NodeContext) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            icon,
            details: None,
            collapsed: false,
            datasets,
            actions: None,
            children: None,
            kind,
        }
    }

    pub fn with_details(mut self, details: Option<String>) -> Self {
        self.details = details.filter(|d| !d.is_empty());
        self
    }

    /// Mark the node as expandable (rendered collapsed).
    pub fn expandable(mut self) -> Self {
        self.collapsed = true;
        self
    }

    pub fn with_actions(mut self, actions: Vec<NodeAction>) -> Self {
        self.actions = Some(actions);
        self
    }

    pub fn with_children(mut self, children: Vec<MetadataNode>) -> Self {
        self.children = Some(children);
        self
    }

    /// Action names offered by this node, in order.
    pub fn action_names(&self) -> Vec<ActionKind> {
        self.actions
            .iter()
            .flatten()
            .map(|action| action.name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_context_serializes_camel_case_and_skips_empty() {
        let ctx = NodeContext::default()
            .with_database("sales")
            .with_routine(RoutineKind::Procedure, "archive");
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(
            json,
            json!({ "database": "sales", "routine": "archive", "routineKind": "procedure" })
        );
    }

    #[test]
    fn test_context_round_trips_through_host() {
        let ctx = NodeContext::session("conn-A", None)
            .with_database("sales")
            .with_topic(Topic::Tables);
        let echoed: NodeContext =
            serde_json::from_str(&serde_json::to_string(&ctx).unwrap()).unwrap();
        assert_eq!(echoed, ctx);
    }

    #[test]
    fn test_has_no_entity_ignores_empty_strings() {
        let mut ctx = NodeContext::default().with_database("sales");
        ctx.table = Some(String::new());
        assert!(ctx.has_no_entity());
        assert!(!ctx.with_table("orders").has_no_entity());
    }

    #[test]
    fn test_node_serialization_omits_kind_and_absent_fields() {
        let node = MetadataNode::new(NodeKind::Table, "orders", Icon::Table, NodeContext::default())
            .expandable()
            .with_actions(vec![NodeAction::preview()]);
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["icon"], "table");
        assert_eq!(json["collapsed"], true);
        assert_eq!(json["actions"][0]["name"], "preview");
        assert!(json.get("kind").is_none());
        assert!(json.get("children").is_none());
        assert!(json.get("details").is_none());
    }

    #[test]
    fn test_column_key_icons() {
        let icon = serde_json::to_value(ColumnKey::PrimaryKey.icon()).unwrap();
        assert_eq!(icon, "column-primary-key");
        assert_eq!(ColumnKey::Plain.icon(), Icon::Column);
    }

    #[test]
    fn test_routine_kind_keywords() {
        assert_eq!(RoutineKind::Function.routine_type(), "FUNCTION");
        assert_eq!(RoutineKind::Procedure.create_column(), "Create Procedure");
        assert_eq!(RoutineKind::Procedure.topic(), Topic::Procedures);
    }
}
