//! E2E tests for the metrics and health endpoints

mod common;

use chirpstream::event::Event;
use common::TestServer;

#[tokio::test]
async fn test_health_reports_connection_state() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(server.url("/health"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["connection"], "disconnected");
    assert_eq!(body["accounts"], 0);
}

#[tokio::test]
async fn test_metrics_expose_published_events() {
    let server = TestServer::new().await;
    server
        .app
        .state
        .bus
        .publish(Event::Info("hello".to_string()))
        .unwrap();

    let response = server
        .client
        .get(server.url("/metrics"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("chirpstream_events_published_total"));
    assert!(body.contains(r#"kind="info""#));
}

#[tokio::test]
async fn test_404_for_unknown_routes() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(server.url("/unknown/route"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
}
