use crate::helpers::{body_json, make_test_app, send};
use axum::http::{Method, StatusCode};
use db::models::user::Role;
use serde_json::{Value, json};
use serial_test::serial;

fn teacher_account() -> Value {
    json!({
        "subject_id": "T-002",
        "display_name": "Grace Hopper",
        "email": "grace@school.test",
        "password": "securepassword",
        "role": "teacher",
    })
}

#[tokio::test]
#[serial]
async fn admin_provisions_teacher_who_can_scan() {
    let app = make_test_app().await;
    let admin = app.login_as("A-001", Role::Admin).await;

    let response = send(&app, Method::POST, "/api/users", Some(&admin), Some(teacher_account())).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["role"], "teacher");
    assert!(json["data"].get("password_hash").is_none());

    let login = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"login": "T-002", "password": "securepassword"})),
    )
    .await;
    assert_eq!(login.status(), StatusCode::OK);
    let token = body_json(login).await["data"]["token"].as_str().unwrap().to_owned();

    let scan = send(
        &app,
        Method::POST,
        "/api/attendance/scan",
        Some(&token),
        Some(json!({ "payload": "#42" })),
    )
    .await;
    assert_eq!(scan.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(scan).await["data"]["code"], "MalformedPayload");
}

#[tokio::test]
#[serial]
async fn non_admins_cannot_provision() {
    let app = make_test_app().await;
    let teacher = app.login_as("T-001", Role::Teacher).await;
    let student = app.login_as("S-001", Role::Student).await;

    for token in [&teacher, &student] {
        let response = send(&app, Method::POST, "/api/users", Some(token), Some(teacher_account())).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    let anonymous = send(&app, Method::POST, "/api/users", None, Some(teacher_account())).await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
async fn admin_cannot_provision_admins_or_duplicates() {
    let app = make_test_app().await;
    let admin = app.login_as("A-001", Role::Admin).await;

    let mut body = teacher_account();
    body["role"] = json!("admin");
    let response = send(&app, Method::POST, "/api/users", Some(&admin), Some(body)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let first = send(&app, Method::POST, "/api/users", Some(&admin), Some(teacher_account())).await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let again = send(&app, Method::POST, "/api/users", Some(&admin), Some(teacher_account())).await;
    assert_eq!(again.status(), StatusCode::CONFLICT);
}
