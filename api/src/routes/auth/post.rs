use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use db::models::user::{self, Model as User, Role};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use util::state::AppState;
use validator::Validate;

use crate::auth::generate_jwt;
use crate::response::ApiResponse;
use crate::routes::common::format_validation_errors;

lazy_static::lazy_static! {
    pub(crate) static ref SUBJECT_ID_REGEX: regex::Regex = regex::Regex::new("^[A-Za-z0-9][A-Za-z0-9_-]{0,31}$").unwrap();
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
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

    /// Only `student` is accepted; staff accounts come from `POST /api/users`.
    pub role: Option<String>,
}

#[derive(Debug, Serialize, Default)]
pub struct UserResponse {
    pub id: i64,
    pub subject_id: String,
    pub display_name: String,
    pub email: String,
    pub role: String,
    pub token: String,
    pub expires_at: String,
}

fn with_token(user: User) -> Result<UserResponse, jsonwebtoken::errors::Error> {
    let (token, expires_at) = generate_jwt(&user.subject_id, user.role)?;
    Ok(UserResponse {
        id: user.id,
        subject_id: user.subject_id,
        display_name: user.display_name,
        email: user.email,
        role: user.role.to_string(),
        token,
        expires_at,
    })
}

fn token_failure(e: jsonwebtoken::errors::Error) -> (StatusCode, Json<ApiResponse<UserResponse>>) {
    tracing::error!(error = %e, "Failed to sign JWT");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::error("Failed to issue token")),
    )
}

/// POST /auth/register
///
/// ### Request Body
/// ```json
/// {
///   "subject_id": "S-001",
///   "display_name": "Ada Lovelace",
///   "email": "ada@school.test",
///   "password": "strongpassword"
/// }
/// ```
///
/// ### Responses
/// - `201 Created` with the user and a JWT
/// - `400 Bad Request` on validation failure or an unknown role
/// - `403 Forbidden` when a staff role is requested
/// - `409 Conflict` when the subject id or email is taken
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    if let Err(validation_errors) = req.validate() {
        let error_message = format_validation_errors(&validation_errors);
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<UserResponse>::error(error_message)),
        );
    }

    match req.role.as_deref().map(Role::from_str) {
        None | Some(Ok(Role::Student)) => {}
        Some(Ok(role)) => {
            tracing::warn!(subject_id = %req.subject_id, %role, "Refused self-registration with a staff role");
            return (
                StatusCode::FORBIDDEN,
                Json(ApiResponse::error("Staff accounts are created by an administrator")),
            );
        }
        Some(Err(_)) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::error("Role must be 'student'")),
            );
        }
    }

    let account = NewAccount {
        subject_id: &req.subject_id,
        display_name: &req.display_name,
        email: &req.email,
        password: &req.password,
        role: Role::Student,
    };
    match create_account(state.db(), account).await {
        Ok(user) => match with_token(user) {
            Ok(body) => (
                StatusCode::CREATED,
                Json(ApiResponse::success(body, "User registered successfully")),
            ),
            Err(e) => token_failure(e),
        },
        Err((status, message)) => (status, Json(ApiResponse::error(message))),
    }
}

pub(crate) struct NewAccount<'a> {
    pub subject_id: &'a str,
    pub display_name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub role: Role,
}

/// Inserts a user after checking subject id and email are free.
///
/// Errors carry the status and message the caller should reply with.
pub(crate) async fn create_account(
    db: &DatabaseConnection,
    account: NewAccount<'_>,
) -> Result<User, (StatusCode, String)> {
    let conflict = |what: &str| {
        (
            StatusCode::CONFLICT,
            format!("A user with this {what} already exists"),
        )
    };

    if let Ok(Some(_)) = User::find_by_subject_id(db, account.subject_id).await {
        return Err(conflict("subject id"));
    }
    if let Ok(Some(_)) = user::Entity::find()
        .filter(user::Column::Email.eq(account.email))
        .one(db)
        .await
    {
        return Err(conflict("email"));
    }

    User::create(
        db,
        account.subject_id,
        account.display_name,
        account.email,
        account.password,
        account.role,
    )
    .await
    .map_err(|e| {
        let msg = e.to_string();
        if msg.contains("UNIQUE") {
            conflict("subject id or email")
        } else {
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {msg}"))
        }
    })
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Subject id or email.
    #[validate(length(min = 1, message = "Login is required"))]
    pub login: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// POST /auth/login
///
/// ### Request Body
/// ```json
/// { "login": "S-001", "password": "strongpassword" }
/// ```
///
/// ### Responses
/// - `200 OK` with the user and a JWT
/// - `400 Bad Request` on missing fields
/// - `401 Unauthorized` on bad credentials
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    if let Err(validation_errors) = req.validate() {
        let error_message = format_validation_errors(&validation_errors);
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<UserResponse>::error(error_message)),
        );
    }

    match User::verify_credentials(state.db(), req.login.trim(), &req.password).await {
        Ok(Some(user)) => match with_token(user) {
            Ok(body) => (
                StatusCode::OK,
                Json(ApiResponse::success(body, "Login successful")),
            ),
            Err(e) => token_failure(e),
        },
        Ok(None) => (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::error("Invalid credentials")),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Database error: {e}"))),
        ),
    }
}
