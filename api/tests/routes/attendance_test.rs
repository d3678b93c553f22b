use crate::helpers::{TestApp, body_json, make_test_app, send};
use axum::http::{Method, StatusCode};
use db::models::user::Role;
use serde_json::{Value, json};
use serial_test::serial;

async fn issue(app: &TestApp, token: &str) -> Value {
    let response = send(app, Method::POST, "/api/attendance/qr", Some(token), Some(json!({}))).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"].clone()
}

async fn scan(app: &TestApp, staff: &str, payload: Value) -> axum::response::Response {
    send(
        app,
        Method::POST,
        "/api/attendance/scan",
        Some(staff),
        Some(json!({ "payload": payload })),
    )
    .await
}

#[tokio::test]
#[serial]
async fn issuing_requires_authentication() {
    let app = make_test_app().await;
    let response = send(&app, Method::POST, "/api/attendance/qr", None, Some(json!({}))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[serial]
async fn student_can_issue_token() {
    let app = make_test_app().await;
    let student = app.login_as("S-001", Role::Student).await;

    let data = issue(&app, &student).await;
    assert_eq!(data["subjectId"], "S-001");
    assert_eq!(data["sessionId"].as_str().unwrap().len(), 64);
    assert_eq!(data["token"]["subjectId"], "S-001");
    assert!(data["payload"].as_str().unwrap().contains("integrityTag"));
    assert!(data["expiresAt"].as_str().is_some());

    let encoded: Value = serde_json::from_str(data["payload"].as_str().unwrap()).unwrap();
    assert_eq!(encoded, data["token"]);
}

#[tokio::test]
#[serial]
async fn zero_duration_is_rejected() {
    let app = make_test_app().await;
    let student = app.login_as("S-001", Role::Student).await;

    let response = send(
        &app,
        Method::POST,
        "/api/attendance/qr",
        Some(&student),
        Some(json!({ "duration_seconds": 0 })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["data"]["code"], "InvalidRequest");
}

#[tokio::test]
#[serial]
async fn duration_above_cap_is_rejected() {
    let app = make_test_app().await;
    let student = app.login_as("S-001", Role::Student).await;

    for duration in [json!(3601), json!(3_153_600_000_i64), json!(i64::MAX)] {
        let response = send(
            &app,
            Method::POST,
            "/api/attendance/qr",
            Some(&student),
            Some(json!({ "duration_seconds": duration })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["data"]["code"], "InvalidRequest");
    }

    let capped = send(
        &app,
        Method::POST,
        "/api/attendance/qr",
        Some(&student),
        Some(json!({ "duration_seconds": 3600 })),
    )
    .await;
    assert_eq!(capped.status(), StatusCode::CREATED);
}

#[tokio::test]
#[serial]
async fn scan_checks_in_once_then_reports_replay() {
    let app = make_test_app().await;
    let student = app.login_as("S-001", Role::Student).await;
    let teacher = app.login_as("T-001", Role::Teacher).await;
    let data = issue(&app, &student).await;

    let first = scan(&app, &teacher, data["payload"].clone()).await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let json = body_json(first).await;
    assert_eq!(json["data"]["code"], "CheckedIn");
    assert_eq!(json["data"]["record"]["subjectId"], "S-001");
    assert_eq!(json["data"]["record"]["sourceSessionId"], data["sessionId"]);

    let replay = scan(&app, &teacher, data["payload"].clone()).await;
    assert_eq!(replay.status(), StatusCode::CONFLICT);
    let json = body_json(replay).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["data"]["code"], "SessionAlreadyUsed");
    assert!(json["data"]["consumedAt"].as_str().is_some());
}

#[tokio::test]
#[serial]
async fn scan_accepts_token_object() {
    let app = make_test_app().await;
    let student = app.login_as("S-001", Role::Student).await;
    let teacher = app.login_as("T-001", Role::Teacher).await;
    let data = issue(&app, &student).await;

    let response = scan(&app, &teacher, data["token"].clone()).await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
#[serial]
async fn students_cannot_scan() {
    let app = make_test_app().await;
    let student = app.login_as("S-001", Role::Student).await;
    let data = issue(&app, &student).await;

    let response = scan(&app, &student, data["payload"].clone()).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[serial]
async fn verify_is_a_dry_run() {
    let app = make_test_app().await;
    let student = app.login_as("S-001", Role::Student).await;
    let teacher = app.login_as("T-001", Role::Teacher).await;
    let data = issue(&app, &student).await;

    for _ in 0..2 {
        let response = send(
            &app,
            Method::POST,
            "/api/attendance/verify",
            Some(&teacher),
            Some(json!({ "payload": data["payload"] })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["data"]["code"], "Eligible");
    }
}

#[tokio::test]
#[serial]
async fn tampered_and_malformed_tokens_are_rejected() {
    let app = make_test_app().await;
    let student = app.login_as("S-001", Role::Student).await;
    let teacher = app.login_as("T-001", Role::Teacher).await;
    let data = issue(&app, &student).await;

    let mut forged = data["token"].clone();
    forged["subjectId"] = json!("T-001");
    let response = scan(&app, &teacher, forged).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["data"]["code"], "IntegrityFailure");

    let response = scan(&app, &teacher, json!("#42")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["data"]["code"], "MalformedPayload");
}

#[tokio::test]
#[serial]
async fn unknown_subject_is_not_found() {
    let app = make_test_app().await;
    let teacher = app.login_as("T-001", Role::Teacher).await;

    let issued = send(
        &app,
        Method::POST,
        "/api/attendance/subjects/S-404/qr",
        Some(&teacher),
        Some(json!({})),
    )
    .await;
    assert_eq!(issued.status(), StatusCode::CREATED);
    let payload = body_json(issued).await["data"]["payload"].clone();

    let response = scan(&app, &teacher, payload).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["data"]["code"], "UnknownSubject");
}

#[tokio::test]
#[serial]
async fn check_out_flow_and_today_status() {
    let app = make_test_app().await;
    let student = app.login_as("S-001", Role::Student).await;
    let teacher = app.login_as("T-001", Role::Teacher).await;

    let none = send(&app, Method::POST, "/api/attendance/check-out", Some(&student), None).await;
    assert_eq!(none.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(none).await["data"]["code"], "NoOpenSession");

    let today = send(&app, Method::GET, "/api/attendance/me/today", Some(&student), None).await;
    assert_eq!(body_json(today).await["data"]["state"], "notCheckedIn");

    let data = issue(&app, &student).await;
    assert_eq!(scan(&app, &teacher, data["payload"].clone()).await.status(), StatusCode::CREATED);

    let today = send(&app, Method::GET, "/api/attendance/me/today", Some(&student), None).await;
    assert_eq!(body_json(today).await["data"]["state"], "checkedIn");

    let out = send(&app, Method::POST, "/api/attendance/check-out", Some(&student), None).await;
    assert_eq!(out.status(), StatusCode::OK);
    let json = body_json(out).await;
    assert_eq!(json["data"]["code"], "CheckedOut");
    assert!(json["data"]["record"]["durationMinutes"].as_i64().is_some());

    let today = send(&app, Method::GET, "/api/attendance/me/today", Some(&student), None).await;
    assert_eq!(body_json(today).await["data"]["state"], "checkedOut");
}

#[tokio::test]
#[serial]
async fn history_for_self_and_staff_only_for_others() {
    let app = make_test_app().await;
    let student = app.login_as("S-001", Role::Student).await;
    let teacher = app.login_as("T-001", Role::Teacher).await;
    let data = issue(&app, &student).await;
    scan(&app, &teacher, data["payload"].clone()).await;

    let mine = send(&app, Method::GET, "/api/attendance/me/history?per_page=5", Some(&student), None).await;
    assert_eq!(mine.status(), StatusCode::OK);
    let json = body_json(mine).await;
    assert_eq!(json["data"]["total"], 1);
    assert_eq!(json["data"]["perPage"], 5);
    assert_eq!(json["data"]["records"][0]["subjectId"], "S-001");

    let theirs = send(&app, Method::GET, "/api/attendance/subjects/S-001/history", Some(&teacher), None).await;
    assert_eq!(theirs.status(), StatusCode::OK);
    assert_eq!(body_json(theirs).await["data"]["total"], 1);

    let denied = send(&app, Method::GET, "/api/attendance/subjects/T-001/history", Some(&student), None).await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[serial]
async fn history_rejects_out_of_range_page() {
    let app = make_test_app().await;
    let student = app.login_as("S-001", Role::Student).await;

    let response = send(
        &app,
        Method::GET,
        "/api/attendance/me/history?page=18446744073709551615",
        Some(&student),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["data"]["code"], "InvalidRequest");

    let empty = send(&app, Method::GET, "/api/attendance/me/history?page=50", Some(&student), None).await;
    assert_eq!(empty.status(), StatusCode::OK);
    assert_eq!(body_json(empty).await["data"]["records"], json!([]));
}
