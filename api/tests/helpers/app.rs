use api::{auth::generate_jwt, routes::routes, ws::ws_routes};
use axum::{
    Router,
    body::Body,
    extract::connect_info::MockConnectInfo,
    http::{Method, Request, header::AUTHORIZATION, header::CONTENT_TYPE},
    response::Response,
};
use db::models::user::{Model as User, Role};
use db::test_utils::setup_test_db;
use serde_json::Value;
use std::net::SocketAddr;
use tower::ServiceExt;
use util::{config::AppConfig, state::AppState, ws::WebSocketManager};

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    /// Creates a user and returns a bearer token for them.
    pub async fn login_as(&self, subject_id: &str, role: Role) -> String {
        let email = format!("{}@school.test", subject_id.to_lowercase());
        User::create(self.state.db(), subject_id, subject_id, &email, "password123", role)
            .await
            .expect("seed user");
        generate_jwt(subject_id, role).expect("sign jwt").0
    }
}

fn seed_env() {
    unsafe {
        std::env::set_var("DATABASE_PATH", "sqlite::memory:");
        std::env::set_var("JWT_SECRET", "api-test-jwt-secret");
        std::env::set_var("QR_SIGNING_SECRET", "api-test-qr-secret");
        std::env::set_var("QR_SESSION_SECONDS", "300");
        std::env::set_var("QR_MAX_SESSION_SECONDS", "3600");
    }
}

pub async fn make_test_app() -> TestApp {
    seed_env();
    AppConfig::reset();

    let state = AppState::new(setup_test_db().await, WebSocketManager::new());
    let router = Router::new()
        .nest("/api", routes(state.clone()))
        .nest("/ws", ws_routes(state.clone()))
        .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))));

    TestApp { router, state }
}

pub async fn send(
    app: &TestApp,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&json).unwrap())
        }
        None => Body::empty(),
    };

    app.router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
