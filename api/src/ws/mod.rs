use axum::{Router, middleware::from_fn};
use util::state::AppState;

use crate::{auth::guards::allow_authenticated, ws::attendance::ws_attendance_routes};

pub mod attendance;

pub fn ws_routes(app_state: AppState) -> Router {
    Router::new()
        .nest("/attendance", ws_attendance_routes())
        .route_layer(from_fn(allow_authenticated))
        .with_state(app_state)
}
