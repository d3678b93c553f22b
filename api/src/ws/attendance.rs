//! Live attendance feeds.
//!
//! - `GET /ws/attendance` → every check-in/out (staff)
//! - `GET /ws/attendance/me` → the caller's own events

use axum::{
    Extension, Router,
    extract::{State, WebSocketUpgrade},
    middleware::from_fn,
    response::IntoResponse,
    routing::get,
};
use services::notifier::{ALL_TOPIC, subject_topic};
use util::state::AppState;
use util::ws::serve::{WsServerOptions, serve_topic};

use crate::auth::{AuthUser, guards::allow_staff};

pub fn ws_attendance_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(all_events_ws_handler).route_layer(from_fn(allow_staff)))
        .route("/me", get(my_events_ws_handler))
}

pub async fn all_events_ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> impl IntoResponse {
    tracing::info!(subject_id = %claims.sub, "Staff attendance feed opened");
    let manager = app_state.ws().clone();
    ws.on_upgrade(move |socket| {
        serve_topic(socket, manager, ALL_TOPIC.to_owned(), WsServerOptions::default())
    })
}

pub async fn my_events_ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> impl IntoResponse {
    let manager = app_state.ws().clone();
    let topic = subject_topic(&claims.sub);
    ws.on_upgrade(move |socket| serve_topic(socket, manager, topic, WsServerOptions::default()))
}
