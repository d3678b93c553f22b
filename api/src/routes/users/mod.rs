//! `/users` routes: staff account provisioning (admin only).

pub mod post;

use axum::{Router, routing::post};
use util::state::AppState;

use post::create_user;

/// - `POST /users` → `create_user`
pub fn users_routes() -> Router<AppState> {
    Router::new().route("/", post(create_user))
}
