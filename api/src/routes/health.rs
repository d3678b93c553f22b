use crate::response::ApiResponse;
use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use chrono::Utc;
use serde::Serialize;
use util::state::AppState;

/// `GET /health`, public.
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Health {
    status: &'static str,
    uptime_seconds: i64,
}

/// GET /health
///
/// ### Response
/// - `200 OK`
///
/// ```json
/// { "success": true, "data": { "status": "OK", "uptimeSeconds": 42 }, "message": "Health check passed" }
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let health = Health {
        status: "OK",
        uptime_seconds: state.uptime_seconds(Utc::now()),
    };
    Json(ApiResponse::success(health, "Health check passed"))
}
