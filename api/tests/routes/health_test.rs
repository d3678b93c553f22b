use crate::helpers::{body_json, make_test_app, send};
use axum::http::{Method, StatusCode};
use serial_test::serial;

#[tokio::test]
#[serial]
async fn health_check_reports_status_and_uptime() {
    let app = make_test_app().await;

    let response = send(&app, Method::GET, "/api/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["status"], "OK");
    assert!(json["data"]["uptimeSeconds"].as_i64().is_some_and(|s| s >= 0));
    assert_eq!(json["message"], "Health check passed");
}
