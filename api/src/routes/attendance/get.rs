use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use services::attendance::{AttendanceService, HistoryQuery, MAX_PER_PAGE};
use util::state::AppState;

use super::common::{HistoryParams, HistoryResponse, failure, misconfigured, settings};
use crate::{auth::AuthUser, response::ApiResponse};

fn ledger(state: &AppState) -> Result<AttendanceService, Response> {
    settings()
        .map(|s| AttendanceService::new(state.db().clone(), s))
        .map_err(misconfigured)
}

async fn today_for(state: &AppState, subject_id: &str) -> Response {
    let ledger = match ledger(state) {
        Ok(l) => l,
        Err(resp) => return resp,
    };

    match ledger.today_status(subject_id, Utc::now()).await {
        Ok(status) => (
            StatusCode::OK,
            Json(ApiResponse::success(status, "Today's attendance retrieved")),
        )
            .into_response(),
        Err(e) => failure(&e).into_response(),
    }
}

async fn history_for(state: &AppState, subject_id: &str, params: HistoryParams) -> Response {
    let ledger = match ledger(state) {
        Ok(l) => l,
        Err(resp) => return resp,
    };
    let query = HistoryQuery::from(params);

    match ledger.history(subject_id, &query).await {
        Ok((records, total)) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                HistoryResponse {
                    records,
                    page: query.page.max(1),
                    per_page: query.per_page.clamp(1, MAX_PER_PAGE),
                    total,
                },
                "Attendance history retrieved",
            )),
        )
            .into_response(),
        Err(e) => failure(&e).into_response(),
    }
}

/// GET /api/attendance/me/today
///
/// ### Response
/// ```json
/// { "success": true, "data": { "state": "checkedIn", "timeIn": "…", "status": "present" }, "message": "…" }
/// ```
/// `state` is one of `notCheckedIn`, `checkedIn`, `checkedOut`.
pub async fn my_today(
    State(state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> Response {
    today_for(&state, &claims.sub).await
}

/// GET /api/attendance/me/history?from=2024-01-01&to=2024-01-31&page=1&per_page=20
///
/// Most recent first. `per_page` is capped at 100.
pub async fn my_history(
    State(state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Query(params): Query<HistoryParams>,
) -> Response {
    history_for(&state, &claims.sub, params).await
}

/// GET /api/attendance/subjects/{subject_id}/today (staff)
pub async fn subject_today(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
) -> Response {
    today_for(&state, &subject_id).await
}

/// GET /api/attendance/subjects/{subject_id}/history (staff)
pub async fn subject_history(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Response {
    history_for(&state, &subject_id, params).await
}
