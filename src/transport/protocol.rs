//! JSON-lines wire protocol.
//!
//! Requests are one object per line, `{"id": .., "op": .., ...}`. Each gets
//! exactly one response line carrying the same id with either `result` or
//! `error`. Notifications are interleaved as `{"notification": {..}}` lines.

use crate::db::driver::Driver;
use crate::error::{DbError, DbResult, ErrorPayload};
use crate::models::{ActionKind, Credentials, NodeAction, NodeContext};
use crate::notify::Notification;
use crate::service::ExplorerService;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Operation {
    Connect {
        session: String,
        connection: Credentials,
    },
    Disconnect {
        session: String,
    },
    Schemas {
        session: String,
        #[serde(default)]
        connection: Option<Credentials>,
    },
    Expand {
        session: String,
        context: NodeContext,
    },
    Select {
        session: String,
        context: NodeContext,
    },
    Action {
        session: String,
        action: ActionKind,
        context: NodeContext,
    },
    Refresh {
        session: String,
        context: NodeContext,
        name: String,
        #[serde(default)]
        actions: Option<Vec<ActionKind>>,
    },
    Query {
        session: String,
        #[serde(rename = "requestId")]
        request_id: String,
        sql: String,
        #[serde(default)]
        connection: Option<Credentials>,
    },
    Cancel {
        #[serde(rename = "requestId")]
        request_id: String,
        #[serde(default)]
        connection: Option<Credentials>,
    },
    Sessions,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Connect { .. } => "connect",
            Operation::Disconnect { .. } => "disconnect",
            Operation::Schemas { .. } => "schemas",
            Operation::Expand { .. } => "expand",
            Operation::Select { .. } => "select",
            Operation::Action { .. } => "action",
            Operation::Refresh { .. } => "refresh",
            Operation::Query { .. } => "query",
            Operation::Cancel { .. } => "cancel",
            Operation::Sessions => "sessions",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub id: JsonValue,
    #[serde(flatten)]
    pub op: Operation,
}

/// One line written to stdout.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Outgoing {
    Result { id: JsonValue, result: JsonValue },
    Error { id: JsonValue, error: ErrorPayload },
    Notification { notification: Notification },
}

impl Outgoing {
    pub fn result(id: JsonValue, result: JsonValue) -> Self {
        Self::Result { id, result }
    }

    pub fn error(id: JsonValue, err: &DbError) -> Self {
        Self::Error {
            id,
            error: ErrorPayload::from(err),
        }
    }

    pub fn notification(notification: Notification) -> Self {
        Self::Notification { notification }
    }
}

/// Parse one input line, or produce the error response for it.
pub fn parse_request(line: &str) -> Result<Request, Outgoing> {
    let value: JsonValue = serde_json::from_str(line).map_err(|e| {
        Outgoing::error(
            JsonValue::Null,
            &DbError::invalid_input(format!("Malformed request: {}", e)),
        )
    })?;
    let id = value.get("id").cloned().unwrap_or(JsonValue::Null);
    serde_json::from_value(value).map_err(|e| {
        Outgoing::error(id, &DbError::invalid_input(format!("Invalid request: {}", e)))
    })
}

/// Run a request against the service and build its response.
pub async fn respond<D: Driver>(service: &ExplorerService<D>, request: Request) -> Outgoing {
    let Request { id, op } = request;
    debug!(id = %id, op = op.name(), "Handling request");
    match execute(service, op).await {
        Ok(result) => Outgoing::result(id, result),
        Err(e) => Outgoing::error(id, &e),
    }
}

async fn execute<D: Driver>(service: &ExplorerService<D>, op: Operation) -> DbResult<JsonValue> {
    match op {
        Operation::Connect {
            session,
            connection,
        } => {
            service.connect(&session, &connection).await?;
            Ok(json!({ "session": session, "target": connection.target() }))
        }
        Operation::Disconnect { session } => {
            let removed = service.disconnect(&session).await;
            Ok(json!({ "session": session, "removed": removed }))
        }
        Operation::Schemas {
            session,
            connection,
        } => to_json(&service.schemas(&session, connection).await?),
        Operation::Expand { session, context } => {
            to_json(&service.expand(&session, &context).await?)
        }
        Operation::Select { session, context } => {
            to_json(&service.select(&session, &context).await?)
        }
        Operation::Action {
            session,
            action,
            context,
        } => to_json(&service.action(&session, action, &context).await?),
        Operation::Refresh {
            session,
            context,
            name,
            actions,
        } => {
            let actions = actions.map(|kinds| kinds.into_iter().map(NodeAction::from).collect());
            to_json(&service.refresh(&session, &context, &name, actions).await?)
        }
        Operation::Query {
            session,
            request_id,
            sql,
            connection,
        } => to_json(
            &service
                .execute_query(&session, &request_id, &sql, connection)
                .await?,
        ),
        Operation::Cancel {
            request_id,
            connection,
        } => {
            service.cancel(&request_id, connection).await;
            Ok(JsonValue::Null)
        }
        Operation::Sessions => to_json(&service.sessions().await),
    }
}

fn to_json<T: Serialize>(value: &T) -> DbResult<JsonValue> {
    serde_json::to_value(value)
        .map_err(|e| DbError::internal(format!("Failed to serialize response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Topic;

    #[test]
    fn test_parse_expand_request() {
        let line = r#"{"id":7,"op":"expand","session":"s1","context":{"database":"sales","topic":"tables"}}"#;
        let request = parse_request(line).unwrap();
        assert_eq!(request.id, json!(7));
        match request.op {
            Operation::Expand { session, context } => {
                assert_eq!(session, "s1");
                assert_eq!(context.topic, Some(Topic::Tables));
            }
            other => panic!("unexpected op {:?}", other),
        }
    }

    #[test]
    fn test_parse_query_request_with_numeric_port() {
        let line = r#"{"id":"a","op":"query","session":"s1","requestId":"q1","sql":"SELECT 1",
            "connection":{"host":"db","port":3306,"user":"app","password":"pw"}}"#;
        let request = parse_request(&line.replace('\n', "")).unwrap();
        match request.op {
            Operation::Query {
                request_id,
                connection: Some(creds),
                ..
            } => {
                assert_eq!(request_id, "q1");
                assert_eq!(creds.port, "3306");
            }
            other => panic!("unexpected op {:?}", other),
        }
    }

    #[test]
    fn test_sessions_has_no_fields() {
        let request = parse_request(r#"{"id":1,"op":"sessions"}"#).unwrap();
        assert_eq!(request.op, Operation::Sessions);
    }

    #[test]
    fn test_malformed_line_has_null_id() {
        let response = parse_request("{not json").unwrap_err();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["id"], JsonValue::Null);
        assert_eq!(json["error"]["kind"], "invalid_input");
    }

    #[test]
    fn test_unknown_op_keeps_id() {
        let response = parse_request(r#"{"id":3,"op":"drop_everything"}"#).unwrap_err();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["error"]["kind"], "invalid_input");
    }

    #[test]
    fn test_notification_line_shape() {
        let line = Outgoing::notification(Notification::error("Query failed", "boom"));
        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(json["notification"]["level"], "error");
        assert_eq!(json["notification"]["detail"], "boom");
        assert!(json.get("id").is_none());
    }

    #[test]
    fn test_null_result_is_kept() {
        let json = serde_json::to_value(Outgoing::result(json!(1), JsonValue::Null)).unwrap();
        assert!(json.as_object().unwrap().contains_key("result"));
    }
}
