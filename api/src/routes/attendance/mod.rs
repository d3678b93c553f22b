//! `/attendance` routes.
//!
//! Every route requires a valid token; scanner and cross-subject routes
//! additionally require a staff role.

use axum::{
    Router,
    middleware::from_fn,
    routing::{get, post},
};
use util::state::AppState;

mod common;
mod get;
mod post;

pub use common::status_for;
pub use get::{my_history, my_today, subject_history, subject_today};
pub use post::{check_out, check_out_subject, issue_qr, issue_qr_for_subject, scan, verify_token};

use crate::auth::guards::allow_staff;

pub fn attendance_routes() -> Router<AppState> {
    let staff = Router::new()
        .route("/verify", post(verify_token))
        .route("/scan", post(scan))
        .route("/subjects/{subject_id}/qr", post(issue_qr_for_subject))
        .route("/subjects/{subject_id}/today", get(subject_today))
        .route("/subjects/{subject_id}/history", get(subject_history))
        .route("/subjects/{subject_id}/check-out", post(check_out_subject))
        .route_layer(from_fn(allow_staff));

    Router::new()
        .route("/qr", post(issue_qr))
        .route("/check-out", post(check_out))
        .route("/me/today", get(my_today))
        .route("/me/history", get(my_history))
        .merge(staff)
}
