//! Integration tests for running-query tracking and cancellation.

mod common;

use common::{MockDriver, UNREACHABLE_HOST, creds, text_rows};
use mysql_explorer::db::{MetadataCatalog, QueryCanceller, QueryOutcome};
use mysql_explorer::models::Credentials;
use mysql_explorer::notify::TracingNotifier;
use mysql_explorer::service::ExplorerService;
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;

const SLOW: &str = "SELECT SLEEP(30)";

fn process(id: u64, user: &str, info: Option<&str>) -> Vec<JsonValue> {
    vec![
        json!(id),
        json!(user),
        json!("10.0.0.5:51234"),
        json!("sales"),
        json!(if info.is_some() { "Query" } else { "Sleep" }),
        json!(12),
        json!("User sleep"),
        info.map(|i| json!(i)).unwrap_or(JsonValue::Null),
    ]
}

/// Driver whose process list holds the given processes.
fn driver_with(processes: Vec<Vec<JsonValue>>) -> (MockDriver, Arc<common::Stats>) {
    MockDriver::new(move |sql, _| {
        if sql == "SHOW FULL PROCESSLIST" {
            return Ok(text_rows(
                &["Id", "User", "Host", "db", "Command", "Time", "State", "Info"],
                processes.clone(),
            ));
        }
        Ok(QueryOutcome::Affected(0))
    })
}

fn canceller(driver: MockDriver) -> QueryCanceller<MockDriver> {
    QueryCanceller::new(Arc::new(driver))
}

#[tokio::test]
async fn test_cancel_without_matching_process_issues_no_kill() {
    let (driver, stats) = driver_with(vec![process(5, "app", Some("SELECT 2"))]);
    let canceller = canceller(driver);

    canceller.record("q1", "SELECT 1", "conn-A").await;
    canceller.cancel("q1", &creds()).await;

    assert_eq!(stats.executed(), vec!["SHOW FULL PROCESSLIST".to_string()]);
    assert!(!stats.ran("KILL"));
    assert!(!canceller.is_running("q1").await);
    assert_eq!(stats.dedicated_pools(), 1);
    assert_eq!(stats.pools_closed(), 1);
}

#[tokio::test]
async fn test_cancel_kills_first_matching_process_of_same_user() {
    let (driver, stats) = driver_with(vec![
        process(3, "admin", Some(SLOW)),
        process(4, "app", None),
        process(7, "app", Some(SLOW)),
        process(9, "app", Some(SLOW)),
    ]);
    let canceller = canceller(driver);

    canceller.record("q1", SLOW, "conn-A").await;
    canceller.cancel("q1", &creds()).await;

    let executed = stats.executed();
    assert_eq!(executed.last().map(String::as_str), Some("KILL 7"));
    assert_eq!(executed.iter().filter(|sql| sql.starts_with("KILL")).count(), 1);
}

#[tokio::test]
async fn test_cancel_untracked_request_is_silent() {
    let (driver, stats) = driver_with(vec![process(7, "app", Some(SLOW))]);
    let canceller = canceller(driver);

    canceller.cancel("never-ran", &creds()).await;

    assert_eq!(stats.dedicated_pools(), 0);
    assert!(stats.executed().is_empty());
}

#[tokio::test]
async fn test_cancel_failure_is_only_logged() {
    let (driver, stats) = driver_with(vec![]);
    let canceller = canceller(driver);

    canceller.record("q1", SLOW, "conn-A").await;
    let bad = Credentials::new(UNREACHABLE_HOST, "3306", "app", "pw");
    canceller.cancel("q1", &bad).await;

    assert!(!canceller.is_running("q1").await);
    assert!(stats.executed().is_empty());
}

#[tokio::test]
async fn test_record_overwrites_and_complete_respects_ticket() {
    let (driver, stats) = driver_with(vec![
        process(7, "app", Some("SELECT 1")),
        process(8, "app", Some("SELECT 2")),
    ]);
    let canceller = canceller(driver);

    let first = canceller.record("q1", "SELECT 1", "conn-A").await;
    let _second = canceller.record("q1", "SELECT 2", "conn-A").await;

    // The first submission finishing must not untrack the second.
    canceller.complete("q1", first).await;
    assert!(canceller.is_running("q1").await);
    assert_eq!(canceller.running().await.len(), 1);

    canceller.cancel("q1", &creds()).await;
    assert!(stats.ran("KILL 8"));
    assert!(!stats.ran("KILL 7"));
}

#[tokio::test]
async fn test_service_cancel_falls_back_to_session_credentials() {
    let (driver, stats) = driver_with(vec![process(11, "app", Some(SLOW))]);
    let service = ExplorerService::new(
        driver,
        MetadataCatalog::default(),
        Arc::new(TracingNotifier),
    );
    service.connect("conn-A", &creds()).await.unwrap();

    service.canceller().record("q1", SLOW, "conn-A").await;
    service.cancel("q1", None).await;

    assert!(stats.ran("KILL 11"));
    assert_eq!(stats.dedicated_pools(), 1);
}

#[tokio::test]
async fn test_service_cancel_without_any_credentials_untracks() {
    let (driver, stats) = driver_with(vec![process(11, "app", Some(SLOW))]);
    let service = ExplorerService::new(
        driver,
        MetadataCatalog::default(),
        Arc::new(TracingNotifier),
    );

    service.canceller().record("q1", SLOW, "conn-A").await;
    service.cancel("q1", None).await;

    assert!(!service.canceller().is_running("q1").await);
    assert_eq!(stats.dedicated_pools(), 0);
}
