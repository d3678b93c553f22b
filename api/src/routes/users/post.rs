use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use db::models::user::{Model as User, Role};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use util::state::AppState;
use validator::Validate;

use crate::response::ApiResponse;
use crate::routes::auth::post::{NewAccount, SUBJECT_ID_REGEX, create_account};
use crate::routes::common::format_validation_errors;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(regex(
        path = *SUBJECT_ID_REGEX,
        message = "Subject id must be 1-32 letters, digits, '-' or '_'"
    ))]
    pub subject_id: String,

    #[validate(length(min = 1, max = 100, message = "Display name must be 1-100 characters"))]
    pub display_name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    /// `student` or `teacher`.
    pub role: String,
}

#[derive(Debug, Serialize, Default)]
pub struct AccountResponse {
    pub id: i64,
    pub subject_id: String,
    pub display_name: String,
    pub email: String,
    pub role: String,
}

impl From<User> for AccountResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            subject_id: user.subject_id,
            display_name: user.display_name,
            email: user.email,
            role: user.role.to_string(),
        }
    }
}

/// POST /api/users
///
/// Creates a single **non-admin** account. Admin-only access.
///
/// ### Request Body
/// ```json
/// {
///   "subject_id": "T-001",
///   "display_name": "Grace Hopper",
///   "email": "grace@school.test",
///   "password": "securepassword",
///   "role": "teacher"
/// }
/// ```
///
/// ### Responses
/// - `201 Created` with the account (no password, no token)
/// - `400 Bad Request` on validation failure or a role other than `student`/`teacher`
/// - `409 Conflict` when the subject id or email is taken
pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> impl IntoResponse {
    if let Err(validation_errors) = req.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<AccountResponse>::error(format_validation_errors(
                &validation_errors,
            ))),
        );
    }

    let role = match Role::from_str(req.role.trim()) {
        Ok(role @ (Role::Student | Role::Teacher)) => role,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error("Role must be 'student' or 'teacher'")),
            );
        }
    };

    let account = NewAccount {
        subject_id: &req.subject_id,
        display_name: &req.display_name,
        email: &req.email,
        password: &req.password,
        role,
    };
    match create_account(state.db(), account).await {
        Ok(user) => {
            tracing::info!(subject_id = %user.subject_id, role = %user.role, "Provisioned account");
            (
                StatusCode::CREATED,
                Json(ApiResponse::success(AccountResponse::from(user), "User created successfully")),
            )
        }
        Err((status, message)) => (status, Json(ApiResponse::error(message))),
    }
}
