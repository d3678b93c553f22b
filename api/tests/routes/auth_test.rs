use crate::helpers::{body_json, make_test_app, send};
use axum::http::{Method, StatusCode};
use db::models::user::Role;
use serde_json::json;
use serial_test::serial;
use util::config::AppConfig;

fn registration(subject_id: &str, email: &str, password: &str) -> serde_json::Value {
    json!({
        "subject_id": subject_id,
        "display_name": "Ada Lovelace",
        "email": email,
        "password": password,
    })
}

#[tokio::test]
#[serial]
async fn test_register_success() {
    let app = make_test_app().await;

    let response = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(registration("S-001", "ada@school.test", "securepassword")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["subject_id"], "S-001");
    assert_eq!(json["data"]["role"], "student");
    assert!(json["data"]["token"].as_str().is_some());
}

#[tokio::test]
#[serial]
async fn test_register_rejects_short_password() {
    let app = make_test_app().await;

    let response = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(registration("S-001", "ada@school.test", "short")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert!(
        json["message"]
            .as_str()
            .unwrap()
            .contains("Password must be at least 8 characters")
    );
}

#[tokio::test]
#[serial]
async fn test_register_refuses_staff_roles() {
    let app = make_test_app().await;

    for role in ["teacher", "admin"] {
        let mut body = registration("T-001", "t@school.test", "securepassword");
        body["role"] = json!(role);
        let response = send(&app, Method::POST, "/api/auth/register", None, Some(body)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{role}");
    }

    let mut body = registration("T-001", "t@school.test", "securepassword");
    body["role"] = json!("janitor");
    let response = send(&app, Method::POST, "/api/auth/register", None, Some(body)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let login = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"login": "T-001", "password": "securepassword"})),
    )
    .await;
    assert_eq!(login.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
async fn test_self_registered_student_cannot_scan() {
    let app = make_test_app().await;

    let mut body = registration("S-009", "s9@school.test", "securepassword");
    body["role"] = json!("student");
    let response = send(&app, Method::POST, "/api/auth/register", None, Some(body)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let token = body_json(response).await["data"]["token"].as_str().unwrap().to_owned();

    let scan = send(
        &app,
        Method::POST,
        "/api/attendance/scan",
        Some(&token),
        Some(json!({ "payload": "{}" })),
    )
    .await;
    assert_eq!(scan.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[serial]
async fn test_register_duplicate_subject() {
    let app = make_test_app().await;
    app.login_as("S-001", Role::Student).await;

    let response = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(registration("S-001", "other@school.test", "securepassword")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[serial]
async fn test_login_by_subject_and_bad_password() {
    let app = make_test_app().await;
    app.login_as("S-001", Role::Student).await;

    let ok = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"login": "S-001", "password": "password123"})),
    )
    .await;
    assert_eq!(ok.status(), StatusCode::OK);
    let token = body_json(ok).await["data"]["token"].as_str().unwrap().to_owned();

    let me = send(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(me.status(), StatusCode::OK);
    assert_eq!(body_json(me).await["data"]["subject_id"], "S-001");

    let bad = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"login": "S-001", "password": "wrong-password"})),
    )
    .await;
    assert_eq!(bad.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
async fn test_token_signed_with_rotated_secret_is_rejected() {
    let app = make_test_app().await;
    let token = app.login_as("S-001", Role::Student).await;

    AppConfig::set_jwt_secret("rotated-jwt-secret");
    let me = send(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
}
