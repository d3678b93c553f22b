use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use db::models::user::Model as User;
use serde::Serialize;
use util::state::AppState;

use crate::auth::AuthUser;
use crate::response::ApiResponse;

#[derive(Debug, Serialize, Default)]
pub struct MeResponse {
    pub id: i64,
    pub subject_id: String,
    pub display_name: String,
    pub email: String,
    pub role: String,
}

/// GET /auth/me
///
/// ### Responses
/// - `200 OK` with the caller's profile
/// - `404 Not Found` if the account was removed after the token was issued
pub async fn get_me(
    State(state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> impl IntoResponse {
    match User::find_by_subject_id(state.db(), &claims.sub).await {
        Ok(Some(user)) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                MeResponse {
                    id: user.id,
                    subject_id: user.subject_id,
                    display_name: user.display_name,
                    email: user.email,
                    role: user.role.to_string(),
                },
                "User data retrieved successfully",
            )),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<MeResponse>::error("User not found")),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Database error: {e}"))),
        ),
    }
}
