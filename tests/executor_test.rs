//! Integration tests for ad-hoc query execution and result normalization.

mod common;

use common::{MockDriver, RecordingNotifier, creds, server_error, text_rows, typed_rows};
use mysql_explorer::db::types::{NativeType, code};
use mysql_explorer::db::{MetadataCatalog, QueryOutcome};
use mysql_explorer::models::{NodeContext, ResultSet, SemanticType};
use mysql_explorer::service::ExplorerService;
use serde_json::json;
use std::sync::Arc;

fn responder(sql: &str, _params: &[String]) -> mysql_explorer::DbResult<QueryOutcome> {
    let sql = sql.trim();
    if sql.starts_with("UPDATE") {
        return Ok(QueryOutcome::Affected(3));
    }
    if sql.starts_with("SELECT * FROM `sales`.`orders`") || sql.starts_with("SELECT id") {
        return Ok(typed_rows(
            &[
                ("id", NativeType::text(code::LONG)),
                ("placed_at", NativeType::text(code::DATETIME)),
                ("paid", NativeType::text(code::BIT)),
                ("receipt", NativeType::new(code::BLOB, true)),
                ("note", NativeType::text(code::BLOB)),
            ],
            vec![
                vec![
                    json!(1),
                    json!("2024-05-01T10:00:00"),
                    json!(true),
                    json!("AAEC"),
                    json!("first"),
                ],
                vec![json!(2), json!(null), json!(false), json!(null), json!(null)],
            ],
        ));
    }
    if sql.starts_with("SELECT nothing") {
        return Ok(typed_rows(&[("n", NativeType::text(code::LONGLONG))], vec![]));
    }
    if sql.starts_with("SHOW CREATE TABLE") {
        return Ok(text_rows(
            &["Table", "Create Table"],
            vec![vec![json!("orders"), json!("CREATE TABLE `orders` (`id` int)")]],
        ));
    }
    Err(server_error("You have an error in your SQL syntax"))
}

fn service() -> (
    ExplorerService<MockDriver>,
    Arc<common::Stats>,
    Arc<RecordingNotifier>,
) {
    let (driver, stats) = MockDriver::new(responder);
    let notifier = Arc::new(RecordingNotifier::default());
    let service = ExplorerService::new(driver, MetadataCatalog::new(25, false), notifier.clone());
    (service, stats, notifier)
}

#[tokio::test]
async fn test_mutation_yields_affected_only() {
    let (service, _, _) = service();

    let result = service
        .execute_query("conn-A", "q1", "UPDATE orders SET paid = 1", Some(creds()))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(result, ResultSet::affected(3));
    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        json!({ "recordsAffected": 3 })
    );
}

#[tokio::test]
async fn test_rows_are_aligned_and_typed() {
    let (service, stats, _) = service();

    let result = service
        .execute_query("conn-A", "q1", "SELECT id FROM orders", Some(creds()))
        .await
        .unwrap()
        .unwrap();

    assert!(result.is_well_formed());
    match &result {
        ResultSet::Rows { columns, data, query } => {
            let types: Vec<SemanticType> = columns.iter().map(|c| c.column_type).collect();
            assert_eq!(
                types,
                vec![
                    SemanticType::Number,
                    SemanticType::Date,
                    SemanticType::Boolean,
                    SemanticType::Binary,
                    SemanticType::Text,
                ]
            );
            assert!(data.iter().all(|row| row.len() == columns.len()));
            assert!(query.is_none());
        }
        other => panic!("expected rows, got {:?}", other),
    }
    assert_eq!(stats.released(), stats.acquired());
}

#[tokio::test]
async fn test_empty_result_keeps_columns() {
    let (service, _, _) = service();

    let result = service
        .execute_query("conn-A", "q1", "SELECT nothing", Some(creds()))
        .await
        .unwrap()
        .unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["columns"], json!([{ "name": "n", "type": "number" }]));
    assert_eq!(json["data"], json!([]));
}

#[tokio::test]
async fn test_failed_query_notifies_and_yields_nothing() {
    let (service, stats, notifier) = service();

    let result = service
        .execute_query("conn-A", "q1", "SELEC 1", Some(creds()))
        .await
        .unwrap();

    assert!(result.is_none());
    let received = notifier.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].title, "Query failed");
    assert!(received[0].detail.contains("error in your SQL syntax"));
    // Never retried.
    assert_eq!(stats.executed().len(), 1);
}

#[tokio::test]
async fn test_query_is_untracked_after_completion() {
    let (service, _, _) = service();

    service
        .execute_query("conn-A", "q1", "SELECT id FROM orders", Some(creds()))
        .await
        .unwrap();

    assert!(!service.canceller().is_running("q1").await);
    assert!(service.running_queries().await.is_empty());
}

#[tokio::test]
async fn test_select_table_previews_with_limit() {
    let (service, stats, _) = service();

    let ctx = NodeContext::session("conn-A", Some(creds()))
        .with_database("sales")
        .with_table("orders");
    let result = service.select("conn-A", &ctx).await.unwrap().unwrap();

    let expected = "SELECT * FROM `sales`.`orders` LIMIT 25";
    assert_eq!(stats.executed(), vec![expected.to_string()]);
    match result {
        ResultSet::Rows { query, data, .. } => {
            assert_eq!(query.as_deref(), Some(expected));
            assert_eq!(data.len(), 2);
        }
        other => panic!("expected rows, got {:?}", other),
    }
}

#[tokio::test]
async fn test_structure_action_on_table() {
    let (service, _, _) = service();

    let ctx = NodeContext::session("conn-A", Some(creds()))
        .with_database("sales")
        .with_table("orders");
    let result = service
        .action("conn-A", mysql_explorer::models::ActionKind::Structure, &ctx)
        .await
        .unwrap();

    assert_eq!(result, ResultSet::structure("CREATE TABLE `orders` (`id` int)"));
}

#[tokio::test]
async fn test_preview_action_rejected_for_routine() {
    let (service, stats, _) = service();

    let ctx = NodeContext::session("conn-A", Some(creds()))
        .with_database("sales")
        .with_routine(mysql_explorer::models::RoutineKind::Procedure, "archive");
    let err = service
        .action("conn-A", mysql_explorer::models::ActionKind::Preview, &ctx)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "invalid_input");
    assert_eq!(stats.acquired(), 0);
}
