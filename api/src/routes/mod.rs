//! HTTP route entry point for `/api/...`.
//!
//! - `/health` → health check (public)
//! - `/auth` → register, login, current user
//! - `/attendance` → QR tokens, scanning, check-in/out and history (authenticated)
//! - `/users` → staff account provisioning (admin)

use crate::auth::guards::{allow_admin, allow_authenticated};
use crate::routes::{
    attendance::attendance_routes, auth::auth_routes, health::health_routes, users::users_routes,
};
use axum::{Router, middleware::from_fn};
use util::state::AppState;

pub mod attendance;
pub mod auth;
pub mod common;
pub mod health;
pub mod users;

/// Builds the `/api` router with its state already applied.
pub fn routes(app_state: AppState) -> Router {
    Router::new()
        .nest("/health", health_routes())
        .nest("/auth", auth_routes())
        .nest(
            "/attendance",
            attendance_routes().route_layer(from_fn(allow_authenticated)),
        )
        .nest("/users", users_routes().route_layer(from_fn(allow_admin)))
        .with_state(app_state)
}
