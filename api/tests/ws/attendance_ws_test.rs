use crate::helpers::{make_test_app, send};
use axum::http::{Method, StatusCode};
use db::models::user::Role;
use serial_test::serial;

#[tokio::test]
#[serial]
async fn feeds_require_authentication() {
    let app = make_test_app().await;

    let response = send(&app, Method::GET, "/ws/attendance/me", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
async fn all_events_feed_is_staff_only() {
    let app = make_test_app().await;
    let student = app.login_as("S-001", Role::Student).await;

    let response = send(&app, Method::GET, "/ws/attendance", Some(&student), None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
