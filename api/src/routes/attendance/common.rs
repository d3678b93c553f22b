use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, NaiveDate, Utc};
use db::models::attendance_record::Model as AttendanceRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use services::attendance::{AttendanceService, HistoryQuery};
use services::directory::DbUserDirectory;
use services::error::{AttendanceError, ResultCode};
use services::notifier::BroadcastNotifier;
use services::qr_session::QrSessionService;
use services::settings::{AttendanceSettings, SettingsError};
use services::token::AttendanceToken;
use services::verifier::{VerificationResult, VerifierService};
use std::sync::Arc;
use util::config::AppConfig;
use util::state::AppState;

use crate::response::ApiResponse;

pub type AttendanceReply<T> = (StatusCode, Json<ApiResponse<T>>);

pub fn settings() -> Result<AttendanceSettings, SettingsError> {
    AttendanceSettings::from_config(&AppConfig::global())
}

/// Wires the attendance services onto the shared connection and WS hub.
pub fn verifier(state: &AppState) -> Result<VerifierService, SettingsError> {
    let settings = settings()?;
    let ledger = AttendanceService::new(state.db().clone(), settings.clone())
        .with_notifier(Arc::new(BroadcastNotifier::new(state.ws().clone())));

    Ok(VerifierService::new(
        QrSessionService::new(state.db().clone(), settings),
        ledger,
        Arc::new(DbUserDirectory::new(state.db().clone())),
    ))
}

pub fn misconfigured(err: SettingsError) -> Response {
    tracing::error!(error = %err, "Attendance settings are invalid");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::<()>::error("Attendance is not configured correctly")),
    )
        .into_response()
}

pub fn status_for(code: ResultCode) -> StatusCode {
    match code {
        ResultCode::Eligible | ResultCode::CheckedOut => StatusCode::OK,
        ResultCode::CheckedIn => StatusCode::CREATED,
        ResultCode::MalformedPayload
        | ResultCode::IntegrityFailure
        | ResultCode::InvalidRequest => StatusCode::BAD_REQUEST,
        ResultCode::SessionNotFound | ResultCode::UnknownSubject => StatusCode::NOT_FOUND,
        ResultCode::SessionExpired => StatusCode::GONE,
        ResultCode::SessionAlreadyUsed
        | ResultCode::AlreadyMarkedToday
        | ResultCode::AlreadyCheckedIn
        | ResultCode::NoOpenSession => StatusCode::CONFLICT,
        ResultCode::InvalidTimeOrder => StatusCode::UNPROCESSABLE_ENTITY,
        ResultCode::PersistenceError => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub fn failure(err: &AttendanceError) -> AttendanceReply<VerificationResult> {
    let result = VerificationResult::failure(err);
    let message = result.message.clone();
    (status_for(result.code), Json(ApiResponse::failure(result, message)))
}

pub fn outcome(result: VerificationResult) -> AttendanceReply<VerificationResult> {
    let message = result.message.clone();
    (status_for(result.code), Json(ApiResponse::success(result, message)))
}

#[derive(Debug, Default, Deserialize)]
pub struct IssueQrReq {
    pub duration_seconds: Option<i64>,
}

/// Accepts the token either as the scanned string or as the decoded object.
#[derive(Debug, Deserialize)]
pub struct PayloadReq {
    pub payload: Value,
}

impl PayloadReq {
    pub fn raw(&self) -> String {
        match &self.payload {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QrIssueResponse {
    pub session_id: String,
    pub subject_id: String,
    /// Exactly what the QR code should encode.
    pub payload: String,
    pub token: AttendanceToken,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl From<HistoryParams> for HistoryQuery {
    fn from(p: HistoryParams) -> Self {
        let defaults = HistoryQuery::default();
        HistoryQuery {
            from: p.from,
            to: p.to,
            page: p.page.unwrap_or(defaults.page),
            per_page: p.per_page.unwrap_or(defaults.per_page),
        }
    }
}

#[derive(Debug, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub records: Vec<AttendanceRecord>,
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
}
